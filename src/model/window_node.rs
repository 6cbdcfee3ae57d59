//! One live window and the id-indexed arena that owns all of them.
//!
//! Parent and child links are plain [`WindowId`]s into the arena; the arena
//! is the only owner.

use std::ops::{Index, IndexMut};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::common::collections::{HashMap, VecDeque};
use crate::model::types::{
    DisplayId, WindowFlags, WindowId, WindowMode, WindowSizeChangeReason, WindowType, pid_t,
};
use crate::model::window_property::WindowProperty;
use crate::sys::client::WindowAgent;
use crate::sys::geometry::Rect;
use crate::sys::render::SurfaceRef;

/// The three logical roots of a display's window forest, in z-order.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RootKind {
    BelowApp,
    App,
    AboveApp,
}

impl RootKind {
    pub const BOTTOM_UP: [RootKind; 3] = [RootKind::BelowApp, RootKind::App, RootKind::AboveApp];
    pub const TOP_DOWN: [RootKind; 3] = [RootKind::AboveApp, RootKind::App, RootKind::BelowApp];
}

/// Ordered children of the three roots of one display.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WindowRoots {
    pub below_app: Vec<WindowId>,
    pub app: Vec<WindowId>,
    pub above_app: Vec<WindowId>,
}

impl WindowRoots {
    pub fn children(&self, root: RootKind) -> &Vec<WindowId> {
        match root {
            RootKind::BelowApp => &self.below_app,
            RootKind::App => &self.app,
            RootKind::AboveApp => &self.above_app,
        }
    }

    pub fn children_mut(&mut self, root: RootKind) -> &mut Vec<WindowId> {
        match root {
            RootKind::BelowApp => &mut self.below_app,
            RootKind::App => &mut self.app,
            RootKind::AboveApp => &mut self.above_app,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParentRef {
    Root(RootKind),
    Window(WindowId),
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, strum_macros::Display)]
pub enum WindowNodeState {
    #[default]
    Initial,
    ShowAnimationPlaying,
    ShowAnimationDone,
    HideAnimationPlaying,
    HideAnimationDone,
}

impl WindowNodeState {
    pub fn is_animating(self) -> bool {
        matches!(
            self,
            WindowNodeState::ShowAnimationPlaying | WindowNodeState::HideAnimationPlaying
        )
    }
}

/// A state change deferred while the node is mid-animation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateTask {
    Show,
    Hide,
    Destroy,
}

pub struct WindowNode {
    pub id: WindowId,
    pub property: WindowProperty,
    pub surface: Option<SurfaceRef>,
    pub client: Option<Arc<dyn WindowAgent>>,
    pub parent: Option<ParentRef>,
    pub children: Vec<WindowId>,
    pub priority: i32,
    pub z_order: u32,
    pub pid: pid_t,
    pub uid: i32,
    pub current_visibility: bool,
    pub requested_visibility: bool,
    pub is_covered: bool,
    pub is_play_animation_show: bool,
    pub is_play_animation_hide: bool,
    pub has_decorated: bool,
    pub size_change_reason: WindowSizeChangeReason,
    pub state: WindowNodeState,
    pub state_tasks: VecDeque<StateTask>,
    /// Remote animation tasks still running on this node.
    pub animation_tasks: u32,
}

impl std::fmt::Debug for WindowNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowNode")
            .field("id", &self.id)
            .field("type", &self.window_type())
            .field("mode", &self.mode())
            .field("rect", &self.rect())
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("priority", &self.priority)
            .field("z_order", &self.z_order)
            .finish_non_exhaustive()
    }
}

impl WindowNode {
    pub fn new(
        property: WindowProperty,
        surface: Option<SurfaceRef>,
        client: Option<Arc<dyn WindowAgent>>,
        pid: pid_t,
        uid: i32,
    ) -> Self {
        WindowNode {
            id: property.window_id(),
            property,
            surface,
            client,
            parent: None,
            children: Vec::new(),
            priority: 0,
            z_order: 0,
            pid,
            uid,
            current_visibility: false,
            requested_visibility: false,
            is_covered: false,
            is_play_animation_show: false,
            is_play_animation_hide: false,
            has_decorated: false,
            size_change_reason: WindowSizeChangeReason::Undefined,
            state: WindowNodeState::Initial,
            state_tasks: VecDeque::new(),
            animation_tasks: 0,
        }
    }

    pub fn window_type(&self) -> WindowType { self.property.window_type() }

    pub fn mode(&self) -> WindowMode { self.property.mode() }

    pub fn display_id(&self) -> DisplayId { self.property.display_id() }

    pub fn rect(&self) -> Rect { self.property.window_rect() }

    pub fn request_rect(&self) -> Rect { self.property.request_rect() }

    pub fn has_flag(&self, flag: WindowFlags) -> bool { self.property.has_flag(flag) }

    pub fn is_split_mode(&self) -> bool { self.mode().is_split() }

    pub fn parent_window(&self) -> Option<WindowId> {
        match self.parent {
            Some(ParentRef::Window(id)) => Some(id),
            _ => None,
        }
    }

    pub fn is_visible(&self) -> bool { self.current_visibility }

    pub fn set_visibility(&mut self, visible: bool) {
        self.current_visibility = visible;
        self.requested_visibility = visible;
    }

    /// Applies a computed layout rect to the property and the surface.
    pub fn set_window_rect(&mut self, rect: Rect) {
        self.property.set_window_rect(rect);
        if let Some(surface) = &self.surface {
            surface.set_bounds(rect);
        }
    }

    pub fn notify_rect(&self) {
        if let Some(client) = &self.client {
            client.update_window_rect(self.rect(), self.has_decorated, self.size_change_reason);
        }
    }

    pub fn notify_mode(&self) {
        if let Some(client) = &self.client {
            client.update_window_mode(self.mode());
        }
    }
}

#[derive(Default, Debug)]
pub struct WindowNodeMap(HashMap<WindowId, WindowNode>);

impl WindowNodeMap {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, node: WindowNode) -> Option<WindowNode> { self.0.insert(node.id, node) }

    pub fn remove(&mut self, id: WindowId) -> Option<WindowNode> { self.0.remove(&id) }

    pub fn get(&self, id: WindowId) -> Option<&WindowNode> { self.0.get(&id) }

    pub fn get_mut(&mut self, id: WindowId) -> Option<&mut WindowNode> { self.0.get_mut(&id) }

    pub fn contains(&self, id: WindowId) -> bool { self.0.contains_key(&id) }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn values(&self) -> impl Iterator<Item = &WindowNode> { self.0.values() }

    pub fn ids(&self) -> impl Iterator<Item = WindowId> + '_ { self.0.keys().copied() }

    /// True if `id` is a sub-window (directly) of `parent`.
    pub fn is_child_of(&self, id: WindowId, parent: WindowId) -> bool {
        self.get(id).and_then(|n| n.parent_window()) == Some(parent)
    }

    /// The node and every descendant, parent first.
    pub fn subtree(&self, id: WindowId) -> Vec<WindowId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.get(next) {
                out.push(next);
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }
}

impl Index<WindowId> for WindowNodeMap {
    type Output = WindowNode;

    #[track_caller]
    fn index(&self, id: WindowId) -> &WindowNode {
        match self.0.get(&id) {
            Some(node) => node,
            None => panic!("window {id} is not in the node map"),
        }
    }
}

impl IndexMut<WindowId> for WindowNodeMap {
    #[track_caller]
    fn index_mut(&mut self, id: WindowId) -> &mut WindowNode {
        match self.0.get_mut(&id) {
            Some(node) => node,
            None => panic!("window {id} is not in the node map"),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_node(id: u32, ty: WindowType, mode: WindowMode) -> WindowNode {
    let mut property = WindowProperty::new(format!("w{id}"), ty);
    property.set_window_id(WindowId(id));
    property.set_mode(mode);
    WindowNode::new(property, None, None, 100, 1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtree_lists_parent_before_children() {
        let mut map = WindowNodeMap::new();
        let mut parent = test_node(1, WindowType::AppMainWindow, WindowMode::Fullscreen);
        parent.children = vec![WindowId(2), WindowId(3)];
        map.insert(parent);
        for id in [2, 3] {
            let mut child = test_node(id, WindowType::AppSubWindow, WindowMode::Floating);
            child.parent = Some(ParentRef::Window(WindowId(1)));
            map.insert(child);
        }
        assert_eq!(map.subtree(WindowId(1)), vec![WindowId(1), WindowId(2), WindowId(3)]);
        assert!(map.is_child_of(WindowId(3), WindowId(1)));
        assert!(!map.is_child_of(WindowId(1), WindowId(3)));
    }

    #[test]
    fn set_window_rect_pushes_bounds_to_surface() {
        let surface = crate::sys::render::SurfaceNode::new(1, "w");
        let mut node = test_node(1, WindowType::AppMainWindow, WindowMode::Floating);
        node.surface = Some(surface.clone());
        node.set_window_rect(Rect::new(1, 2, 30, 40));
        assert_eq!(surface.bounds(), Rect::new(1, 2, 30, 40));
        assert_eq!(node.rect(), Rect::new(1, 2, 30, 40));
    }
}
