use parking_lot::Mutex;
use tracing::info;

use crate::model::types::{MinimizeReason, WindowId};

/// The ability runtime: owns application lifecycles. Minimizing goes through
/// it so a minimized application stays resumable.
pub trait AbilityManager: Send + Sync {
    fn minimize_ability(&self, window: WindowId, reason: MinimizeReason);

    fn recover_ability(&self, window: WindowId);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbilityEvent {
    Minimized(WindowId, MinimizeReason),
    Recovered(WindowId),
}

#[derive(Default)]
pub struct RecordingAbilityManager {
    events: Mutex<Vec<AbilityEvent>>,
}

impl RecordingAbilityManager {
    pub fn events(&self) -> Vec<AbilityEvent> { self.events.lock().clone() }

    pub fn minimized(&self) -> Vec<WindowId> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                AbilityEvent::Minimized(id, _) => Some(*id),
                AbilityEvent::Recovered(_) => None,
            })
            .collect()
    }
}

impl AbilityManager for RecordingAbilityManager {
    fn minimize_ability(&self, window: WindowId, reason: MinimizeReason) {
        info!(window_id = %window, %reason, "minimize ability");
        self.events.lock().push(AbilityEvent::Minimized(window, reason));
    }

    fn recover_ability(&self, window: WindowId) {
        info!(window_id = %window, "recover ability");
        self.events.lock().push(AbilityEvent::Recovered(window));
    }
}
