//! Client-facing boundaries: the per-window token the server calls back
//! into, and the external observers (window-manager agents).

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::model::types::{
    AvoidArea, AvoidAreaType, DisplayId, SystemBarRegionTint, WindowId, WindowMode,
    WindowSizeChangeReason, WindowType, pid_t,
};
use crate::sys::geometry::Rect;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowState {
    Shown,
    Hidden,
    Destroyed,
}

/// Client-side window token. Every call is a one-way notification.
pub trait WindowAgent: Send + Sync {
    fn update_window_rect(&self, rect: Rect, decorated: bool, reason: WindowSizeChangeReason);

    fn update_window_mode(&self, mode: WindowMode);

    fn update_focus_status(&self, focused: bool);

    fn update_active_status(&self, active: bool);

    fn update_avoid_area(&self, _area: &AvoidArea, _ty: AvoidAreaType) {}

    fn update_window_state(&self, _state: WindowState) {}

    fn notify_destroy(&self) {}
}

#[derive(Clone, Debug, PartialEq)]
pub enum ClientEvent {
    Rect(Rect, bool, WindowSizeChangeReason),
    Mode(WindowMode),
    Focus(bool),
    Active(bool),
    AvoidArea(AvoidAreaType, AvoidArea),
    State(WindowState),
    Destroyed,
}

/// Window token that records every notification it receives.
#[derive(Default)]
pub struct RecordingWindowAgent {
    events: Mutex<Vec<ClientEvent>>,
}

impl RecordingWindowAgent {
    pub fn events(&self) -> Vec<ClientEvent> { self.events.lock().clone() }

    pub fn take_events(&self) -> Vec<ClientEvent> { std::mem::take(&mut *self.events.lock()) }

    pub fn last_rect(&self) -> Option<Rect> {
        self.events.lock().iter().rev().find_map(|e| match e {
            ClientEvent::Rect(rect, ..) => Some(*rect),
            _ => None,
        })
    }

    pub fn last_mode(&self) -> Option<WindowMode> {
        self.events.lock().iter().rev().find_map(|e| match e {
            ClientEvent::Mode(mode) => Some(*mode),
            _ => None,
        })
    }

    fn push(&self, event: ClientEvent) { self.events.lock().push(event); }
}

impl WindowAgent for RecordingWindowAgent {
    fn update_window_rect(&self, rect: Rect, decorated: bool, reason: WindowSizeChangeReason) {
        self.push(ClientEvent::Rect(rect, decorated, reason));
    }

    fn update_window_mode(&self, mode: WindowMode) { self.push(ClientEvent::Mode(mode)); }

    fn update_focus_status(&self, focused: bool) { self.push(ClientEvent::Focus(focused)); }

    fn update_active_status(&self, active: bool) { self.push(ClientEvent::Active(active)); }

    fn update_avoid_area(&self, area: &AvoidArea, ty: AvoidAreaType) {
        self.push(ClientEvent::AvoidArea(ty, *area));
    }

    fn update_window_state(&self, state: WindowState) { self.push(ClientEvent::State(state)); }

    fn notify_destroy(&self) { self.push(ClientEvent::Destroyed); }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FocusChangeInfo {
    pub window_id: WindowId,
    pub display_id: DisplayId,
    pub pid: pid_t,
    pub uid: i32,
    pub window_type: WindowType,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct WindowVisibilityInfo {
    pub window_id: WindowId,
    pub pid: pid_t,
    pub uid: i32,
    pub visible: bool,
    pub window_type: WindowType,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AccessibilityWindowInfo {
    pub window_id: WindowId,
    pub display_id: DisplayId,
    pub rect: Rect,
    pub layer: u32,
    pub mode: WindowMode,
    pub window_type: WindowType,
    pub focused: bool,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum WindowUpdateType {
    Added,
    Removed,
    Focused,
    Bounds,
    Active,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WindowManagerAgentType {
    Focus,
    SystemBar,
    WindowUpdate,
    WindowVisibility,
}

/// External observer of window-manager state. Each notification carries only
/// the delta.
pub trait WindowManagerAgent: Send + Sync {
    fn update_focus_change_info(&self, _info: &FocusChangeInfo, _focused: bool) {}

    fn update_system_bar_region_tints(&self, _display: DisplayId, _tints: &[SystemBarRegionTint]) {}

    fn update_window_visibility_info(&self, _infos: &[WindowVisibilityInfo]) {}

    fn notify_accessibility_window_info(
        &self,
        _infos: &[AccessibilityWindowInfo],
        _ty: WindowUpdateType,
    ) {
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AgentEvent {
    Focus(FocusChangeInfo, bool),
    Tints(DisplayId, Vec<SystemBarRegionTint>),
    Visibility(Vec<WindowVisibilityInfo>),
    Accessibility(Vec<AccessibilityWindowInfo>, WindowUpdateType),
}

#[derive(Default)]
pub struct RecordingManagerAgent {
    events: Mutex<Vec<AgentEvent>>,
}

impl RecordingManagerAgent {
    pub fn events(&self) -> Vec<AgentEvent> { self.events.lock().clone() }

    pub fn take_events(&self) -> Vec<AgentEvent> { std::mem::take(&mut *self.events.lock()) }

    pub fn focus_events(&self) -> Vec<(WindowId, bool)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                AgentEvent::Focus(info, focused) => Some((info.window_id, *focused)),
                _ => None,
            })
            .collect()
    }
}

impl WindowManagerAgent for RecordingManagerAgent {
    fn update_focus_change_info(&self, info: &FocusChangeInfo, focused: bool) {
        self.events.lock().push(AgentEvent::Focus(info.clone(), focused));
    }

    fn update_system_bar_region_tints(&self, display: DisplayId, tints: &[SystemBarRegionTint]) {
        self.events.lock().push(AgentEvent::Tints(display, tints.to_vec()));
    }

    fn update_window_visibility_info(&self, infos: &[WindowVisibilityInfo]) {
        self.events.lock().push(AgentEvent::Visibility(infos.to_vec()));
    }

    fn notify_accessibility_window_info(
        &self,
        infos: &[AccessibilityWindowInfo],
        ty: WindowUpdateType,
    ) {
        self.events.lock().push(AgentEvent::Accessibility(infos.to_vec(), ty));
    }
}
