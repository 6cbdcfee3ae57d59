//! Registry of external window-manager observers, grouped by the kind of
//! notification they subscribed to.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::common::collections::HashMap;
use crate::model::error::{WmError, WmResult};
use crate::model::types::{DisplayId, SystemBarRegionTint};
use crate::sys::client::{
    AccessibilityWindowInfo, FocusChangeInfo, WindowManagerAgent, WindowManagerAgentType,
    WindowUpdateType, WindowVisibilityInfo,
};

#[derive(Default)]
pub struct WindowManagerAgentController {
    agents: Mutex<HashMap<WindowManagerAgentType, Vec<Arc<dyn WindowManagerAgent>>>>,
}

impl std::fmt::Debug for WindowManagerAgentController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: Vec<_> = self.agents.lock().iter().map(|(ty, v)| (*ty, v.len())).collect();
        f.debug_struct("WindowManagerAgentController").field("agents", &counts).finish()
    }
}

impl WindowManagerAgentController {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    pub fn register_agent(
        &self,
        ty: WindowManagerAgentType,
        agent: Arc<dyn WindowManagerAgent>,
    ) -> WmResult<()> {
        let mut agents = self.agents.lock();
        let list = agents.entry(ty).or_default();
        if list.iter().any(|a| Arc::ptr_eq(a, &agent)) {
            return Err(WmError::RepeatOperation);
        }
        list.push(agent);
        debug!(?ty, count = list.len(), "register agent");
        Ok(())
    }

    pub fn unregister_agent(
        &self,
        ty: WindowManagerAgentType,
        agent: &Arc<dyn WindowManagerAgent>,
    ) -> WmResult<()> {
        let mut agents = self.agents.lock();
        let Some(list) = agents.get_mut(&ty) else {
            return Err(WmError::InvalidParam);
        };
        let before = list.len();
        list.retain(|a| !Arc::ptr_eq(a, agent));
        if list.len() == before {
            return Err(WmError::InvalidParam);
        }
        Ok(())
    }

    /// Snapshot of the subscribers so callbacks run without the lock held.
    fn agents_of(&self, ty: WindowManagerAgentType) -> Vec<Arc<dyn WindowManagerAgent>> {
        self.agents.lock().get(&ty).cloned().unwrap_or_default()
    }

    pub fn update_focus_change_info(&self, info: &FocusChangeInfo, focused: bool) {
        trace!(window_id = %info.window_id, focused, "focus change");
        for agent in self.agents_of(WindowManagerAgentType::Focus) {
            agent.update_focus_change_info(info, focused);
        }
    }

    pub fn update_system_bar_region_tints(&self, display_id: DisplayId, tints: &[SystemBarRegionTint]) {
        trace!(display = %display_id, count = tints.len(), "system bar tints");
        for agent in self.agents_of(WindowManagerAgentType::SystemBar) {
            agent.update_system_bar_region_tints(display_id, tints);
        }
    }

    pub fn update_window_visibility_info(&self, infos: &[WindowVisibilityInfo]) {
        if infos.is_empty() {
            return;
        }
        for agent in self.agents_of(WindowManagerAgentType::WindowVisibility) {
            agent.update_window_visibility_info(infos);
        }
    }

    pub fn notify_accessibility_window_info(
        &self,
        infos: &[AccessibilityWindowInfo],
        ty: WindowUpdateType,
    ) {
        if infos.is_empty() {
            return;
        }
        for agent in self.agents_of(WindowManagerAgentType::WindowUpdate) {
            agent.notify_accessibility_window_info(infos, ty);
        }
    }
}
