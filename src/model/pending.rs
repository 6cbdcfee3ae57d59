//! Side effects requested by the model while it mutates the tree. They are
//! drained and executed by the controller once the operation has finished.

use crate::model::types::{DisplayId, MinimizeReason, WindowId, WindowMode};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitBroadcast {
    CreateDivider { display: DisplayId },
    DestroyDivider { display: DisplayId },
    ShowRecent { display: DisplayId, window: WindowId },
    CreatePlaceholder { display: DisplayId, mode: WindowMode },
    DestroyPlaceholder { display: DisplayId },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingAction {
    Minimize { window: WindowId, reason: MinimizeReason },
    Recover { window: WindowId },
    Split(SplitBroadcast),
}

#[derive(Debug, Default)]
pub struct PendingActions(Vec<PendingAction>);

impl PendingActions {
    pub fn new() -> Self { Self::default() }

    pub fn minimize(&mut self, window: WindowId, reason: MinimizeReason) {
        let dup = self.0.iter().any(
            |a| matches!(a, PendingAction::Minimize { window: w, .. } if *w == window),
        );
        if !dup {
            self.0.push(PendingAction::Minimize { window, reason });
        }
    }

    pub fn recover(&mut self, window: WindowId) { self.0.push(PendingAction::Recover { window }); }

    pub fn broadcast(&mut self, msg: SplitBroadcast) { self.0.push(PendingAction::Split(msg)); }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn take(&mut self) -> Vec<PendingAction> { std::mem::take(&mut self.0) }

    pub fn iter(&self) -> impl Iterator<Item = &PendingAction> { self.0.iter() }

    pub fn minimized(&self) -> impl Iterator<Item = (WindowId, MinimizeReason)> + '_ {
        self.0.iter().filter_map(|a| match a {
            PendingAction::Minimize { window, reason } => Some((*window, *reason)),
            _ => None,
        })
    }

    pub fn broadcasts(&self) -> impl Iterator<Item = SplitBroadcast> + '_ {
        self.0.iter().filter_map(|a| match a {
            PendingAction::Split(msg) => Some(*msg),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_window_is_minimized_at_most_once_per_drain() {
        let mut pending = PendingActions::new();
        pending.minimize(WindowId(1), MinimizeReason::LayoutTile);
        pending.minimize(WindowId(1), MinimizeReason::SplitQuit);
        pending.recover(WindowId(2));
        assert_eq!(pending.minimized().count(), 1);
        assert_eq!(pending.take().len(), 2);
        assert!(pending.is_empty());
    }
}
