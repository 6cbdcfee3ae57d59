//! The window forest of one display.
//!
//! Nodes live in the shared [`WindowNodeMap`]; the container only keeps the
//! ordered root lists and per-display state (focus, split pair, layout
//! policy, avoid areas, system-bar tints). Every mutating operation either
//! validates and fails before touching anything or runs to completion.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, trace, warn};

use crate::actor::agents::WindowManagerAgentController;
use crate::common::collections::BTreeMap;
use crate::common::config::LayoutSettings;
use crate::layout_engine::{LayoutContext, LayoutPolicy, LayoutPolicyKind};
use crate::model::avoid_area::{AvoidAreaController, AvoidControlType, is_avoid_area_type};
use crate::model::error::{WmError, WmResult, WmStatus};
use crate::model::pending::PendingActions;
use crate::model::types::{
    AvoidArea, AvoidAreaType, DisplayId, MinimizeReason, Orientation, SystemBarProperty,
    SystemBarRegionTint, WindowFlags, WindowId, WindowLayoutMode, WindowMode, WindowType,
    WindowUpdateReason,
};
use crate::model::window_node::{ParentRef, RootKind, WindowNode, WindowNodeMap, WindowRoots};
use crate::model::window_pair::{WindowPair, WindowPairStatus};
use crate::model::zorder_policy;
use crate::sys::client::{
    AccessibilityWindowInfo, FocusChangeInfo, WindowUpdateType, WindowVisibilityInfo,
};
use crate::sys::display::{DisplayInfo, DisplayManager, UNDEFINED_BRIGHTNESS};
use crate::sys::render::{AnimationTiming, RenderService, WINDOW_TRANSITION};

/// Collaborators shared by every container of a window root.
#[derive(Clone)]
pub struct ContainerDeps {
    pub render: Arc<dyn RenderService>,
    pub display_manager: Arc<dyn DisplayManager>,
    pub agents: Arc<WindowManagerAgentController>,
}

impl std::fmt::Debug for ContainerDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerDeps").finish_non_exhaustive()
    }
}

const SYSTEM_BARS: [WindowType; 2] = [WindowType::StatusBar, WindowType::NavigationBar];

macro_rules! layout_ctx {
    ($self:ident, $nodes:expr, $pending:expr) => {
        &mut LayoutContext {
            nodes: &mut *$nodes,
            roots: &$self.roots,
            pair: &$self.pair,
            pending: &mut *$pending,
        }
    };
}

pub struct WindowNodeContainer {
    display: DisplayInfo,
    settings: LayoutSettings,
    roots: WindowRoots,
    pair: WindowPair,
    policy: LayoutPolicyKind,
    avoid: AvoidAreaController,
    avoid_changes: Arc<Mutex<Vec<(AvoidAreaType, AvoidArea)>>>,
    focused: WindowId,
    active: WindowId,
    last_tints: BTreeMap<WindowType, SystemBarRegionTint>,
    display_brightness: f32,
    orientation: Orientation,
    window_animation: bool,
    deps: ContainerDeps,
}

impl std::fmt::Debug for WindowNodeContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowNodeContainer")
            .field("display", &self.display.id)
            .field("roots", &self.roots)
            .field("pair", &self.pair)
            .field("focused", &self.focused)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

fn position_for(list: &[WindowId], nodes: &WindowNodeMap, priority: i32) -> usize {
    list.iter()
        .position(|c| nodes.get(*c).is_some_and(|n| n.priority > priority))
        .unwrap_or(list.len())
}

fn visibility_info(node: &WindowNode, visible: bool) -> WindowVisibilityInfo {
    WindowVisibilityInfo {
        window_id: node.id,
        pid: node.pid,
        uid: node.uid,
        visible,
        window_type: node.window_type(),
    }
}

impl WindowNodeContainer {
    pub fn new(
        display: DisplayInfo,
        layout_mode: WindowLayoutMode,
        settings: LayoutSettings,
        window_animation: bool,
        deps: ContainerDeps,
    ) -> Self {
        let avoid_changes = Arc::new(Mutex::new(Vec::new()));
        let mut avoid = AvoidAreaController::new(display.rect, display.cutouts.clone());
        let sink = avoid_changes.clone();
        avoid.set_callback(Box::new(move |ty, area| sink.lock().push((ty, *area))));
        WindowNodeContainer {
            policy: LayoutPolicyKind::new(layout_mode, settings.clone(), display.clone()),
            pair: WindowPair::new(display.id),
            display,
            settings,
            roots: WindowRoots::default(),
            avoid,
            avoid_changes,
            focused: WindowId::INVALID,
            active: WindowId::INVALID,
            last_tints: BTreeMap::new(),
            display_brightness: UNDEFINED_BRIGHTNESS,
            orientation: Orientation::Unspecified,
            window_animation,
            deps,
        }
    }

    pub fn launch(&mut self, nodes: &mut WindowNodeMap, pending: &mut PendingActions) {
        self.policy.launch(layout_ctx!(self, nodes, pending));
    }

    pub fn display_id(&self) -> DisplayId { self.display.id }

    pub fn display(&self) -> &DisplayInfo { &self.display }

    pub fn roots(&self) -> &WindowRoots { &self.roots }

    pub fn pair(&self) -> &WindowPair { &self.pair }

    pub fn policy(&self) -> &LayoutPolicyKind { &self.policy }

    pub fn layout_mode(&self) -> WindowLayoutMode { self.policy.layout_mode() }

    pub fn focused_window(&self) -> WindowId { self.focused }

    pub fn active_window(&self) -> WindowId { self.active }

    pub fn avoid_area(&self, ty: AvoidAreaType) -> AvoidArea { self.avoid.avoid_area(ty) }

    pub fn last_tints(&self) -> impl Iterator<Item = &SystemBarRegionTint> { self.last_tints.values() }

    pub fn set_window_animation(&mut self, enabled: bool) { self.window_animation = enabled; }

    pub fn is_empty(&self) -> bool {
        RootKind::BOTTOM_UP.iter().all(|r| self.roots.children(*r).is_empty())
    }

    /// True if the node is a root child or a sub-window of one.
    pub fn contains(&self, nodes: &WindowNodeMap, id: WindowId) -> bool {
        match nodes.get(id).and_then(|n| n.parent) {
            Some(ParentRef::Root(root)) => self.roots.children(root).contains(&id),
            Some(ParentRef::Window(parent)) => self.contains(nodes, parent),
            None => false,
        }
    }

    fn push_z_order(nodes: &WindowNodeMap, id: WindowId, out: &mut Vec<WindowId>) {
        let Some(node) = nodes.get(id) else { return };
        let (below, above): (Vec<WindowId>, Vec<WindowId>) = node
            .children
            .iter()
            .partition(|c| nodes.get(**c).is_some_and(|n| n.priority < 0));
        for child in below {
            Self::push_z_order(nodes, child, out);
        }
        out.push(id);
        for child in above {
            Self::push_z_order(nodes, child, out);
        }
    }

    /// Every node in the forest, bottom-most first.
    pub fn z_ordered(&self, nodes: &WindowNodeMap) -> Vec<WindowId> {
        let mut out = Vec::new();
        for root in RootKind::BOTTOM_UP {
            for id in self.roots.children(root) {
                Self::push_z_order(nodes, *id, &mut out);
            }
        }
        out
    }

    /// Numbers every node bottom-up and pushes the result to its surface.
    pub fn assign_z_order(&mut self, nodes: &mut WindowNodeMap) {
        let order = self.z_ordered(nodes);
        for (z, id) in order.iter().enumerate() {
            let Some(node) = nodes.get_mut(*id) else { continue };
            node.z_order = z as u32 + 1;
            if let Some(surface) = &node.surface {
                surface.set_position_z(node.z_order as f32);
            }
        }
        trace!(display_id = %self.display.id, count = order.len(), "assign z-order");
    }

    pub fn is_keyguard_showing(&self, nodes: &WindowNodeMap) -> bool {
        self.roots.above_app.iter().any(|id| {
            nodes
                .get(*id)
                .is_some_and(|n| n.window_type() == WindowType::Keyguard && n.is_visible())
        })
    }

    fn is_show_when_locked_main(node: &WindowNode) -> bool {
        node.window_type().is_main_window() && node.has_flag(WindowFlags::SHOW_WHEN_LOCKED)
    }

    fn root_for_node(node: &WindowNode, keyguard: bool) -> RootKind {
        if keyguard && Self::is_show_when_locked_main(node) {
            RootKind::AboveApp
        } else {
            zorder_policy::root_for(node.window_type())
        }
    }

    fn priority_for(node: &WindowNode, keyguard: bool) -> i32 {
        let ty = node.window_type();
        keyguard
            .then(|| zorder_policy::keyguard_priority(ty, Self::is_show_when_locked_main(node)))
            .flatten()
            .unwrap_or_else(|| zorder_policy::priority(ty))
    }

    /// Re-files a root child into `root` under its current priority.
    fn refile(&mut self, nodes: &mut WindowNodeMap, id: WindowId, root: RootKind) {
        for kind in RootKind::BOTTOM_UP {
            self.roots.children_mut(kind).retain(|c| *c != id);
        }
        let priority = nodes.get(id).map_or(0, |n| n.priority);
        let pos = position_for(self.roots.children(root), nodes, priority);
        self.roots.children_mut(root).insert(pos, id);
        if let Some(node) = nodes.get_mut(id) {
            node.parent = Some(ParentRef::Root(root));
        }
    }

    /// Moves show-when-locked main windows above the keyguard and lifts
    /// the floating input method over it.
    fn raise_for_keyguard(&mut self, nodes: &mut WindowNodeMap) {
        let candidates: Vec<WindowId> = self
            .roots
            .app
            .iter()
            .chain(self.roots.above_app.iter())
            .copied()
            .collect();
        for id in candidates {
            let Some(node) = nodes.get_mut(id) else { continue };
            let Some(priority) = zorder_policy::keyguard_priority(
                node.window_type(),
                Self::is_show_when_locked_main(node),
            ) else {
                continue;
            };
            node.priority = priority;
            debug!(window_id = %id, priority, "raise above keyguard");
            self.refile(nodes, id, RootKind::AboveApp);
        }
    }

    fn drop_after_keyguard(&mut self, nodes: &mut WindowNodeMap) {
        for id in self.roots.above_app.clone() {
            let Some(node) = nodes.get_mut(id) else { continue };
            let ty = node.window_type();
            if zorder_policy::keyguard_priority(ty, Self::is_show_when_locked_main(node)).is_none() {
                continue;
            }
            node.priority = zorder_policy::priority(ty);
            let root = zorder_policy::root_for(ty);
            debug!(window_id = %id, ?root, "drop back below keyguard");
            self.refile(nodes, id, root);
        }
    }

    fn animation(&self) -> Option<AnimationTiming> {
        self.window_animation.then_some(WINDOW_TRANSITION)
    }

    fn attach_surfaces(&self, nodes: &WindowNodeMap, ids: &[WindowId]) {
        for node in ids.iter().filter_map(|id| nodes.get(*id)) {
            let (Some(surface), true) = (&node.surface, node.is_visible()) else { continue };
            let animation = if node.is_play_animation_show { None } else { self.animation() };
            self.deps.render.attach(self.display.id, surface, animation);
        }
    }

    /// Detaches surfaces unless a remote animation still owns them; the
    /// animation's finish callback detaches those.
    fn detach_surfaces(&self, nodes: &WindowNodeMap, ids: &[WindowId]) {
        for node in ids.iter().filter_map(|id| nodes.get(*id)) {
            let Some(surface) = &node.surface else { continue };
            if node.animation_tasks > 0 {
                trace!(window_id = %node.id, tasks = node.animation_tasks, "defer detach");
                continue;
            }
            let animation = if node.is_play_animation_hide { None } else { self.animation() };
            self.deps.render.detach(self.display.id, surface, animation);
        }
    }

    #[instrument(level = "debug", skip(self, nodes, pending), fields(display_id = %self.display.id))]
    pub fn add_window_node(
        &mut self,
        nodes: &mut WindowNodeMap,
        pending: &mut PendingActions,
        id: WindowId,
        parent: Option<WindowId>,
    ) -> WmResult<()> {
        let keyguard = self.is_keyguard_showing(nodes);
        let node = nodes.get(id).ok_or(WmError::NullPtr)?;
        if node.surface.is_none() {
            warn!(window_id = %id, "window has no surface");
            return Err(WmError::NullPtr);
        }
        if node.parent.is_some() {
            warn!(window_id = %id, "window is already in the tree");
            return Err(WmError::InvalidOperation);
        }
        let ty = node.window_type();
        let priority = Self::priority_for(node, keyguard);
        let visible = match parent {
            Some(parent_id) => {
                let Some(parent_node) = nodes.get(parent_id) else {
                    warn!(window_id = %id, %parent_id, "parent window not found");
                    return Err(WmError::InvalidParam);
                };
                if !matches!(parent_node.parent, Some(ParentRef::Root(_))) {
                    warn!(window_id = %id, %parent_id, "parent is not a top-level window");
                    return Err(WmError::InvalidParam);
                }
                parent_node.is_visible()
            }
            None => true,
        };
        let root = Self::root_for_node(node, keyguard);

        match parent {
            Some(parent_id) => {
                let pos = position_for(&nodes[parent_id].children, nodes, priority);
                nodes[parent_id].children.insert(pos, id);
            }
            None => {
                let pos = position_for(self.roots.children(root), nodes, priority);
                self.roots.children_mut(root).insert(pos, id);
            }
        }
        let node = &mut nodes[id];
        node.priority = priority;
        node.parent = Some(match parent {
            Some(parent_id) => ParentRef::Window(parent_id),
            None => ParentRef::Root(root),
        });
        node.current_visibility = visible;
        node.requested_visibility = true;

        // Sub-windows hidden with this node come back with it.
        let subtree = nodes.subtree(id);
        for child in subtree.iter().skip(1) {
            if let Some(child) = nodes.get_mut(*child) {
                child.current_visibility = visible && child.requested_visibility;
            }
        }

        if ty == WindowType::Keyguard {
            self.raise_for_keyguard(nodes);
        }
        self.pair.update_if_split_related(nodes, pending, id);
        self.attach_surfaces(nodes, &subtree);
        self.assign_z_order(nodes);
        self.policy.add_window_node(layout_ctx!(self, nodes, pending), id);

        if is_avoid_area_type(ty) {
            let rect = nodes[id].rect();
            if let Err(err) = self.avoid.avoid_control(id, ty, rect, AvoidControlType::Add) {
                warn!(window_id = %id, %err, "avoid area add failed");
            }
            self.flush_avoid_changes(nodes);
        }
        self.notify_if_system_bar_tint_changed(nodes);
        if visible {
            let infos: Vec<_> = subtree
                .iter()
                .filter_map(|c| nodes.get(*c))
                .filter(|n| n.is_visible())
                .map(|n| visibility_info(n, true))
                .collect();
            self.deps.agents.update_window_visibility_info(&infos);
            self.notify_accessibility(nodes, &[id], WindowUpdateType::Added);
        }
        self.update_preferred_orientation(nodes);
        self.deps.render.flush();
        info!(window_id = %id, %ty, ?root, priority, "window added");
        Ok(())
    }

    #[instrument(level = "debug", skip(self, nodes, pending), fields(display_id = %self.display.id))]
    pub fn remove_window_node(
        &mut self,
        nodes: &mut WindowNodeMap,
        pending: &mut PendingActions,
        id: WindowId,
    ) -> WmResult<()> {
        let node = nodes.get(id).ok_or(WmError::NullPtr)?;
        let Some(parent) = node.parent else {
            debug!(window_id = %id, "window is not in the tree");
            return Ok(());
        };
        let ty = node.window_type();
        let subtree = nodes.subtree(id);
        let was_visible: Vec<WindowVisibilityInfo> = subtree
            .iter()
            .filter_map(|c| nodes.get(*c))
            .filter(|n| n.is_visible())
            .map(|n| visibility_info(n, false))
            .collect();
        self.notify_accessibility(nodes, &[id], WindowUpdateType::Removed);

        match parent {
            ParentRef::Root(root) => self.roots.children_mut(root).retain(|c| *c != id),
            ParentRef::Window(parent_id) => {
                if let Some(parent_node) = nodes.get_mut(parent_id) {
                    parent_node.children.retain(|c| *c != id);
                }
            }
        }
        for member in &subtree {
            if let Some(n) = nodes.get_mut(*member) {
                n.current_visibility = false;
            }
        }
        if let Some(n) = nodes.get_mut(id) {
            n.requested_visibility = false;
        }
        self.deps.agents.update_window_visibility_info(&was_visible);
        self.detach_surfaces(nodes, &subtree);

        self.policy.remove_window_node(layout_ctx!(self, nodes, pending), id);
        let pair_before = self.pair.status();
        self.pair.handle_remove_window(nodes, pending, id);
        if pair_before != WindowPairStatus::Empty && self.pair.status() == WindowPairStatus::Empty {
            self.policy.layout_window_tree(layout_ctx!(self, nodes, pending));
        }
        if self.avoid.is_avoid_area_node(id) {
            let rect = nodes[id].rect();
            if let Err(err) = self.avoid.avoid_control(id, ty, rect, AvoidControlType::Remove) {
                warn!(window_id = %id, %err, "avoid area remove failed");
            }
            self.flush_avoid_changes(nodes);
        }
        if let Some(n) = nodes.get_mut(id) {
            n.parent = None;
        }
        if ty == WindowType::Keyguard {
            self.drop_after_keyguard(nodes);
        }
        self.assign_z_order(nodes);
        self.notify_if_system_bar_tint_changed(nodes);

        if subtree.contains(&self.focused) {
            let next = self.next_focusable_window(nodes, &subtree);
            debug!(window_id = %id, next = %next, "focus moves on remove");
            self.set_focus_window(nodes, next)?;
        }
        if subtree.contains(&self.active) {
            let next = self.next_active_window(nodes, &subtree);
            self.set_active_window(nodes, next)?;
        }
        self.update_preferred_orientation(nodes);
        self.deps.render.flush();
        info!(window_id = %id, %ty, "window removed");
        Ok(())
    }

    #[instrument(level = "debug", skip(self, nodes, pending), fields(display_id = %self.display.id))]
    pub fn update_window_node(
        &mut self,
        nodes: &mut WindowNodeMap,
        pending: &mut PendingActions,
        id: WindowId,
        reason: WindowUpdateReason,
    ) -> WmResult<()> {
        let node = nodes.get(id).ok_or(WmError::NullPtr)?;
        if node.parent.is_none() {
            trace!(window_id = %id, "hidden window, layout deferred to show");
            return Ok(());
        }
        let ty = node.window_type();
        if ty.is_main_window() && reason.is_switch_cascade() {
            self.switch_layout_policy(nodes, pending, WindowLayoutMode::Cascade, false);
        }
        match reason {
            WindowUpdateReason::Mode | WindowUpdateReason::All => {
                self.pair.update_if_split_related(nodes, pending, id);
                self.policy.layout_window_tree(layout_ctx!(self, nodes, pending));
            }
            _ => self.policy.update_window_node(layout_ctx!(self, nodes, pending), id, false),
        }
        if self.avoid.is_avoid_area_node(id) {
            self.refresh_avoid_nodes(nodes);
        }
        self.notify_if_system_bar_tint_changed(nodes);
        self.notify_accessibility(nodes, &[id], WindowUpdateType::Bounds);
        if reason == WindowUpdateReason::Mode {
            self.update_preferred_orientation(nodes);
        }
        Ok(())
    }

    fn raise_in_list(list: &mut Vec<WindowId>, nodes: &WindowNodeMap, id: WindowId) {
        list.retain(|c| *c != id);
        let priority = nodes.get(id).map_or(0, |n| n.priority);
        let pos = position_for(list, nodes, priority);
        list.insert(pos, id);
    }

    fn raise_top_level(&mut self, nodes: &WindowNodeMap, id: WindowId) {
        let members = if self.pair.find(id) {
            self.pair.ordered_pair(nodes, id)
        } else {
            vec![id]
        };
        for member in members {
            let Some(ParentRef::Root(root)) = nodes.get(member).and_then(|n| n.parent) else {
                continue;
            };
            Self::raise_in_list(self.roots.children_mut(root), nodes, member);
        }
    }

    /// Moves an app window (and its split partners) to the top of its tier.
    pub fn raise_z_order_for_app_window(
        &mut self,
        nodes: &mut WindowNodeMap,
        id: WindowId,
    ) -> WmResult<()> {
        let node = nodes.get(id).ok_or(WmError::NullPtr)?;
        if self.roots.app.last() == Some(&id) || self.roots.above_app.last() == Some(&id) {
            debug!(window_id = %id, "window is already on top");
            return Err(WmError::InvalidType);
        }
        let parent = node.parent;
        let before = self.z_ordered(nodes);
        match parent {
            Some(ParentRef::Window(parent_id)) => {
                let mut children = nodes.get(parent_id).map(|p| p.children.clone()).unwrap_or_default();
                Self::raise_in_list(&mut children, nodes, id);
                if let Some(parent_node) = nodes.get_mut(parent_id) {
                    parent_node.children = children;
                }
                self.raise_top_level(nodes, parent_id);
            }
            Some(ParentRef::Root(_)) => self.raise_top_level(nodes, id),
            None => return Err(WmError::InvalidParam),
        }
        // Already the top of its own group and tier.
        if self.z_ordered(nodes) == before {
            debug!(window_id = %id, "raise left the order unchanged");
            return Err(WmError::InvalidType);
        }
        self.assign_z_order(nodes);
        self.deps.render.flush();
        Ok(())
    }

    fn focus_info(&self, node: &WindowNode) -> FocusChangeInfo {
        FocusChangeInfo {
            window_id: node.id,
            display_id: self.display.id,
            pid: node.pid,
            uid: node.uid,
            window_type: node.window_type(),
        }
    }

    pub fn set_focus_window(&mut self, nodes: &WindowNodeMap, id: WindowId) -> WmResult<WmStatus> {
        if self.focused == id {
            debug!(window_id = %id, "already focused");
            return Ok(WmStatus::DoNothing);
        }
        if id.is_valid() && !nodes.contains(id) {
            return Err(WmError::InvalidWindow);
        }
        let old = std::mem::replace(&mut self.focused, id);
        if let Some(node) = nodes.get(old) {
            if let Some(client) = &node.client {
                client.update_focus_status(false);
            }
            self.deps.agents.update_focus_change_info(&self.focus_info(node), false);
        }
        if let Some(node) = nodes.get(id) {
            if let Some(client) = &node.client {
                client.update_focus_status(true);
            }
            self.deps.agents.update_focus_change_info(&self.focus_info(node), true);
            self.notify_accessibility(nodes, &[id], WindowUpdateType::Focused);
        }
        info!(from = %old, to = %id, "focus changed");
        Ok(WmStatus::Ok)
    }

    pub fn set_active_window(&mut self, nodes: &WindowNodeMap, id: WindowId) -> WmResult<WmStatus> {
        if self.active == id {
            return Ok(WmStatus::DoNothing);
        }
        if id.is_valid() && !nodes.contains(id) {
            return Err(WmError::InvalidWindow);
        }
        let old = std::mem::replace(&mut self.active, id);
        if let Some(client) = nodes.get(old).and_then(|n| n.client.as_ref()) {
            client.update_active_status(false);
        }
        if let Some(client) = nodes.get(id).and_then(|n| n.client.as_ref()) {
            client.update_active_status(true);
        }
        self.update_brightness(nodes);
        debug!(from = %old, to = %id, "active window changed");
        Ok(WmStatus::Ok)
    }

    /// Applies the active window's brightness, or hands brightness back to
    /// the system when it asks for none.
    pub fn update_brightness(&mut self, nodes: &WindowNodeMap) {
        let requested = nodes
            .get(self.active)
            .filter(|n| n.window_type().is_app_window())
            .map_or(UNDEFINED_BRIGHTNESS, |n| n.property.brightness());
        if requested == UNDEFINED_BRIGHTNESS {
            if self.display_brightness != UNDEFINED_BRIGHTNESS {
                self.deps.display_manager.restore_brightness(self.display.id);
                self.display_brightness = UNDEFINED_BRIGHTNESS;
            }
        } else if requested != self.display_brightness {
            self.deps.display_manager.set_brightness_override(self.display.id, requested);
            self.display_brightness = requested;
        }
    }

    /// Top-most visible focusable window not in `exclude`.
    pub fn next_focusable_window(&self, nodes: &WindowNodeMap, exclude: &[WindowId]) -> WindowId {
        self.z_ordered(nodes)
            .into_iter()
            .rev()
            .filter(|id| !exclude.contains(id))
            .find(|id| {
                nodes
                    .get(*id)
                    .is_some_and(|n| n.is_visible() && n.property.focusable())
            })
            .unwrap_or(WindowId::INVALID)
    }

    fn next_active_window(&self, nodes: &WindowNodeMap, exclude: &[WindowId]) -> WindowId {
        self.roots
            .app
            .iter()
            .chain(self.roots.above_app.iter())
            .rev()
            .filter(|id| !exclude.contains(id))
            .find(|id| {
                nodes
                    .get(**id)
                    .is_some_and(|n| n.is_visible() && n.window_type().is_main_window())
            })
            .copied()
            .unwrap_or(WindowId::INVALID)
    }

    pub fn top_main_app_window<'a>(&self, nodes: &'a WindowNodeMap) -> Option<&'a WindowNode> {
        self.roots
            .app
            .iter()
            .rev()
            .filter_map(|id| nodes.get(*id))
            .find(|n| n.is_visible() && n.window_type().is_main_window())
    }

    /// The top main app window decides the display orientation; none left
    /// means unspecified.
    pub fn update_preferred_orientation(&mut self, nodes: &WindowNodeMap) {
        let orientation = self
            .top_main_app_window(nodes)
            .map_or(Orientation::Unspecified, |n| n.property.orientation());
        if orientation != self.orientation {
            info!(display_id = %self.display.id, ?orientation, "preferred orientation");
            self.orientation = orientation;
            self.deps.display_manager.set_orientation(self.display.id, orientation);
        }
    }

    /// The bar properties the top-most relevant window asks for.
    fn expected_system_bar_props(&self, nodes: &WindowNodeMap) -> BTreeMap<WindowType, SystemBarProperty> {
        let mut props: BTreeMap<WindowType, SystemBarProperty> =
            SYSTEM_BARS.iter().map(|bar| (*bar, SystemBarProperty::default())).collect();
        let ceiling = zorder_policy::system_bar_ceiling();
        for root in RootKind::TOP_DOWN {
            for node in self.roots.children(root).iter().rev().filter_map(|id| nodes.get(*id)) {
                if !node.is_visible() || node.window_type().is_system_bar() {
                    continue;
                }
                if root == RootKind::AboveApp && node.priority > ceiling {
                    continue;
                }
                let ty = node.window_type();
                let immersive = node.mode() == WindowMode::Fullscreen
                    && !node.has_flag(WindowFlags::NEED_AVOID)
                    && ty != WindowType::Panel;
                let split = node.is_split_mode() || ty == WindowType::DockSlice;
                if immersive || split {
                    for (bar, prop) in props.iter_mut() {
                        *prop = node.property.sys_bar_prop(*bar);
                        if split {
                            prop.enable = false;
                        }
                    }
                    trace!(window_id = %node.id, immersive, split, "system bar props from");
                    return props;
                }
            }
        }
        props
    }

    fn bar_region(&self, nodes: &WindowNodeMap, bar: WindowType) -> crate::sys::geometry::Rect {
        self.roots
            .above_app
            .iter()
            .filter_map(|id| nodes.get(*id))
            .find(|n| n.window_type() == bar && n.is_visible())
            .map(|n| n.rect())
            .unwrap_or_default()
    }

    /// Broadcasts bar tints whose property or region differ from the last
    /// broadcast.
    pub fn notify_if_system_bar_tint_changed(&mut self, nodes: &WindowNodeMap) {
        let props = self.expected_system_bar_props(nodes);
        let mut changed = Vec::new();
        for (bar, prop) in props {
            let tint = SystemBarRegionTint {
                bar_type: bar,
                prop,
                region: self.bar_region(nodes, bar),
            };
            if self.last_tints.get(&bar) != Some(&tint) {
                self.last_tints.insert(bar, tint);
                changed.push(tint);
            }
        }
        if !changed.is_empty() {
            debug!(display_id = %self.display.id, count = changed.len(), "system bar tints changed");
            self.deps.agents.update_system_bar_region_tints(self.display.id, &changed);
        }
    }

    fn notify_accessibility(&self, nodes: &WindowNodeMap, ids: &[WindowId], ty: WindowUpdateType) {
        let infos: Vec<_> = ids
            .iter()
            .filter_map(|id| nodes.get(*id))
            .map(|n| AccessibilityWindowInfo {
                window_id: n.id,
                display_id: self.display.id,
                rect: n.rect(),
                layer: n.z_order,
                mode: n.mode(),
                window_type: n.window_type(),
                focused: n.id == self.focused,
            })
            .collect();
        self.deps.agents.notify_accessibility_window_info(&infos, ty);
    }

    /// Pushes changed avoid areas to every visible app window.
    fn flush_avoid_changes(&self, nodes: &WindowNodeMap) {
        let changes = std::mem::take(&mut *self.avoid_changes.lock());
        if changes.is_empty() {
            return;
        }
        for node in self
            .z_ordered(nodes)
            .into_iter()
            .filter_map(|id| nodes.get(id))
            .filter(|n| n.is_visible() && n.window_type().is_app_window())
        {
            let Some(client) = &node.client else { continue };
            for (ty, area) in &changes {
                client.update_avoid_area(area, *ty);
            }
        }
    }

    fn refresh_avoid_nodes(&mut self, nodes: &WindowNodeMap) {
        for id in self.roots.above_app.clone() {
            if !self.avoid.is_avoid_area_node(id) {
                continue;
            }
            let Some(node) = nodes.get(id) else { continue };
            if let Err(err) =
                self.avoid.avoid_control(id, node.window_type(), node.rect(), AvoidControlType::Update)
            {
                warn!(window_id = %id, %err, "avoid area update failed");
            }
        }
        self.flush_avoid_changes(nodes);
    }

    /// Swaps the layout policy. Reordering re-arranges every main window
    /// under the new policy and dissolves a split pair first.
    pub fn switch_layout_policy(
        &mut self,
        nodes: &mut WindowNodeMap,
        pending: &mut PendingActions,
        mode: WindowLayoutMode,
        reorder: bool,
    ) -> WmStatus {
        let changed = self.policy.layout_mode() != mode;
        if !changed && !reorder {
            debug!(?mode, "layout mode unchanged");
            return WmStatus::DoNothing;
        }
        if (reorder || mode == WindowLayoutMode::Tile) && self.pair.status() != WindowPairStatus::Empty {
            self.pair.clear(nodes, pending);
        }
        if changed {
            info!(display_id = %self.display.id, ?mode, "switch layout policy");
            self.policy = LayoutPolicyKind::new(mode, self.settings.clone(), self.display.clone());
            self.policy.launch(layout_ctx!(self, nodes, pending));
        }
        if reorder {
            self.policy.reorder(layout_ctx!(self, nodes, pending));
        }
        self.notify_if_system_bar_tint_changed(nodes);
        WmStatus::Ok
    }

    pub fn process_display_change(
        &mut self,
        nodes: &mut WindowNodeMap,
        pending: &mut PendingActions,
        info: DisplayInfo,
    ) {
        info!(display_id = %info.id, rect = %info.rect, vpr = info.virtual_pixel_ratio, "display changed");
        self.display = info.clone();
        self.avoid.update_display(info.rect, info.cutouts.clone());
        self.policy.update_display(layout_ctx!(self, nodes, pending), info);
        self.refresh_avoid_nodes(nodes);
        self.notify_if_system_bar_tint_changed(nodes);
    }

    /// Queues every visible main app window for minimizing and returns them.
    pub fn minimize_all_app_windows(
        &self,
        nodes: &WindowNodeMap,
        pending: &mut PendingActions,
    ) -> Vec<WindowId> {
        let ids: Vec<WindowId> = self
            .roots
            .app
            .iter()
            .filter(|id| {
                nodes
                    .get(**id)
                    .is_some_and(|n| n.is_visible() && n.window_type().is_main_window())
            })
            .copied()
            .collect();
        for id in &ids {
            pending.minimize(*id, MinimizeReason::MinimizeAll);
        }
        ids
    }

    /// Finishes a divider drag; releasing it at either clamp edge leaves
    /// split mode.
    pub fn handle_divider_release(
        &mut self,
        nodes: &mut WindowNodeMap,
        pending: &mut PendingActions,
        id: WindowId,
    ) -> bool {
        if self.pair.divider() != Some(id) {
            return false;
        }
        let Some(rect) = nodes.get(id).map(|n| n.rect()) else { return false };
        let (lo, hi) = self.policy.base().exit_split_points(&rect);
        let pos = if rect.width < rect.height { rect.x } else { rect.y };
        if pos > lo && pos < hi {
            return false;
        }
        info!(window_id = %id, pos, lo, hi, "divider released at edge, exit split");
        self.pair.exit_split_mode(nodes, pending);
        self.policy.layout_window_tree(layout_ctx!(self, nodes, pending));
        self.notify_if_system_bar_tint_changed(nodes);
        true
    }

    pub fn is_forbid_divider_move(&self, nodes: &WindowNodeMap) -> bool {
        self.pair.is_forbid_divider_move(nodes)
    }

    pub fn describe_layout(&self) -> String { self.policy.describe() }
}
