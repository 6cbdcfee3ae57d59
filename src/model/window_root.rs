//! Every display's window forest plus the node arena they share.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::common::collections::{BTreeMap, BTreeSet, HashMap};
use crate::common::config::LayoutSettings;
use crate::model::error::{WmError, WmResult, WmStatus};
use crate::model::node_container::{ContainerDeps, WindowNodeContainer};
use crate::model::pending::{PendingAction, PendingActions};
use crate::model::types::{
    AvoidArea, AvoidAreaType, DisplayId, WindowId, WindowLayoutMode, WindowType,
    WindowUpdateReason, pid_t,
};
use crate::model::window_node::{ParentRef, WindowNode, WindowNodeMap};
use crate::model::window_property::WindowProperty;
use crate::sys::client::WindowAgent;
use crate::sys::display::DisplayInfo;
use crate::sys::render::SurfaceRef;

#[derive(Debug)]
pub struct WindowRoot {
    nodes: WindowNodeMap,
    containers: BTreeMap<DisplayId, WindowNodeContainer>,
    pending: PendingActions,
    last_window_id: u32,
    windows_by_pid: HashMap<pid_t, BTreeSet<WindowId>>,
    layout_mode: WindowLayoutMode,
    settings: LayoutSettings,
    window_animation: bool,
    deps: ContainerDeps,
}

impl WindowRoot {
    pub fn new(
        layout_mode: WindowLayoutMode,
        settings: LayoutSettings,
        window_animation: bool,
        deps: ContainerDeps,
    ) -> Self {
        WindowRoot {
            nodes: WindowNodeMap::new(),
            containers: BTreeMap::new(),
            pending: PendingActions::new(),
            last_window_id: 0,
            windows_by_pid: HashMap::default(),
            layout_mode,
            settings,
            window_animation,
            deps,
        }
    }

    pub fn add_display(&mut self, info: DisplayInfo) -> WmResult<()> {
        if self.containers.contains_key(&info.id) {
            return Err(WmError::RepeatOperation);
        }
        info!(display_id = %info.id, rect = %info.rect, "add display");
        let id = info.id;
        let mut container = WindowNodeContainer::new(
            info,
            self.layout_mode,
            self.settings.clone(),
            self.window_animation,
            self.deps.clone(),
        );
        container.launch(&mut self.nodes, &mut self.pending);
        self.containers.insert(id, container);
        Ok(())
    }

    /// Drops a display together with every window created on it.
    pub fn remove_display(&mut self, display_id: DisplayId) -> WmResult<Vec<WindowId>> {
        if !self.containers.contains_key(&display_id) {
            return Err(WmError::InvalidDisplay);
        }
        let ids: Vec<WindowId> = self
            .nodes
            .values()
            .filter(|n| n.display_id() == display_id)
            .map(|n| n.id)
            .collect();
        let mut destroyed = Vec::new();
        for id in ids {
            if self.nodes.contains(id) {
                destroyed.extend(self.destroy_window(id, false)?);
            }
        }
        self.containers.remove(&display_id);
        info!(display_id = %display_id, windows = destroyed.len(), "remove display");
        Ok(destroyed)
    }

    pub fn display_ids(&self) -> Vec<DisplayId> { self.containers.keys().copied().collect() }

    pub fn container(&self, display: DisplayId) -> Option<&WindowNodeContainer> {
        self.containers.get(&display)
    }

    pub fn containers(&self) -> impl Iterator<Item = &WindowNodeContainer> { self.containers.values() }

    pub fn container_of(&self, id: WindowId) -> Option<&WindowNodeContainer> {
        self.nodes.get(id).and_then(|n| self.containers.get(&n.display_id()))
    }

    pub fn nodes(&self) -> &WindowNodeMap { &self.nodes }

    pub fn node(&self, id: WindowId) -> Option<&WindowNode> { self.nodes.get(id) }

    pub fn node_mut(&mut self, id: WindowId) -> Option<&mut WindowNode> { self.nodes.get_mut(id) }

    pub fn pending_mut(&mut self) -> &mut PendingActions { &mut self.pending }

    pub fn take_pending(&mut self) -> Vec<PendingAction> { self.pending.take() }

    pub fn layout_mode(&self) -> WindowLayoutMode { self.layout_mode }

    pub fn set_window_animation(&mut self, enabled: bool) {
        self.window_animation = enabled;
        for container in self.containers.values_mut() {
            container.set_window_animation(enabled);
        }
    }

    fn generate_window_id(&mut self) -> WindowId {
        self.last_window_id += 1;
        WindowId(self.last_window_id)
    }

    fn check_create(&self, property: &WindowProperty) -> WmResult<()> {
        let ty = property.window_type();
        if !self.containers.contains_key(&property.display_id()) {
            warn!(display_id = %property.display_id(), "create on unknown display");
            return Err(WmError::InvalidDisplay);
        }
        let name = property.name();
        if !name.is_empty() && self.nodes.values().any(|n| n.property.name() == name) {
            warn!(%name, "duplicate window name");
            return Err(WmError::RepeatOperation);
        }
        if ty == WindowType::FloatCamera
            && self.nodes.values().any(|n| n.window_type() == WindowType::FloatCamera)
        {
            warn!("camera float window already exists");
            return Err(WmError::RepeatOperation);
        }
        if ty.needs_parent() {
            let parent_ok = self
                .nodes
                .get(property.parent_id())
                .is_some_and(|p| p.window_type().is_main_window());
            if !parent_ok {
                warn!(parent_id = %property.parent_id(), %ty, "sub-window needs a main window parent");
                return Err(WmError::InvalidParent);
            }
        }
        Ok(())
    }

    /// Registers a new window in the arena. It is not shown until
    /// [`WindowRoot::add_window_node`].
    pub fn create_window(
        &mut self,
        mut property: WindowProperty,
        surface: Option<SurfaceRef>,
        client: Option<Arc<dyn WindowAgent>>,
        pid: pid_t,
        uid: i32,
    ) -> WmResult<WindowId> {
        self.check_create(&property)?;
        let id = self.generate_window_id();
        property.set_window_id(id);
        let ty = property.window_type();
        let node = WindowNode::new(property, surface, client, pid, uid);
        self.nodes.insert(node);
        self.windows_by_pid.entry(pid).or_default().insert(id);
        info!(window_id = %id, %ty, pid, "window created");
        Ok(id)
    }

    fn display_of(&self, id: WindowId) -> WmResult<DisplayId> {
        let node = self.nodes.get(id).ok_or(WmError::InvalidWindow)?;
        let display = node.display_id();
        if self.containers.contains_key(&display) {
            Ok(display)
        } else {
            Err(WmError::InvalidDisplay)
        }
    }

    pub fn add_window_node(&mut self, id: WindowId) -> WmResult<()> {
        let display = self.display_of(id)?;
        let parent = self.nodes[id].property.parent_id();
        let parent = parent.is_valid().then_some(parent);
        let Some(container) = self.containers.get_mut(&display) else {
            return Err(WmError::InvalidDisplay);
        };
        container.add_window_node(&mut self.nodes, &mut self.pending, id, parent)
    }

    pub fn remove_window_node(&mut self, id: WindowId) -> WmResult<()> {
        let display = self.display_of(id)?;
        let Some(container) = self.containers.get_mut(&display) else {
            return Err(WmError::InvalidDisplay);
        };
        container.remove_window_node(&mut self.nodes, &mut self.pending, id)
    }

    pub fn update_window_node(&mut self, id: WindowId, reason: WindowUpdateReason) -> WmResult<()> {
        let display = self.display_of(id)?;
        let Some(container) = self.containers.get_mut(&display) else {
            return Err(WmError::InvalidDisplay);
        };
        container.update_window_node(&mut self.nodes, &mut self.pending, id, reason)
    }

    /// Removes the window from its tree and the arena. Sub-windows go with
    /// it unless `only_self`, in which case they stay alive but hidden.
    pub fn destroy_window(&mut self, id: WindowId, only_self: bool) -> WmResult<Vec<WindowId>> {
        let node = self.nodes.get(id).ok_or(WmError::DestroyedObject)?;
        let children = node.children.clone();
        if node.parent.is_some() {
            self.remove_window_node(id)?;
        }

        let mut destroyed = Vec::new();
        for child in children {
            if only_self {
                if let Some(c) = self.nodes.get_mut(child) {
                    c.parent = None;
                    c.current_visibility = false;
                }
            } else if self.nodes.contains(child) {
                destroyed.extend(self.destroy_window(child, false)?);
            }
        }
        if let Some(parent_id) = self.nodes.get(id).and_then(|n| n.parent_window()) {
            if let Some(parent) = self.nodes.get_mut(parent_id) {
                parent.children.retain(|c| *c != id);
            }
        }

        let Some(node) = self.nodes.remove(id) else {
            return Ok(destroyed);
        };
        if let Some(client) = &node.client {
            client.notify_destroy();
        }
        if let Some(ids) = self.windows_by_pid.get_mut(&node.pid) {
            ids.remove(&id);
            if ids.is_empty() {
                self.windows_by_pid.remove(&node.pid);
            }
        }
        info!(window_id = %id, ty = %node.window_type(), "window destroyed");
        destroyed.push(id);
        Ok(destroyed)
    }

    pub fn windows_of_pid(&self, pid: pid_t) -> Vec<WindowId> {
        self.windows_by_pid.get(&pid).map(|ids| ids.iter().copied().collect()).unwrap_or_default()
    }

    /// A client process died: every window it created goes away.
    pub fn on_remote_died(&mut self, pid: pid_t) -> Vec<WindowId> {
        let ids = self.windows_of_pid(pid);
        info!(pid, windows = ids.len(), "client died");
        let mut destroyed = Vec::new();
        for id in ids {
            if !self.nodes.contains(id) {
                continue;
            }
            match self.destroy_window(id, false) {
                Ok(ids) => destroyed.extend(ids),
                Err(err) => warn!(window_id = %id, %err, "destroy after client death failed"),
            }
        }
        destroyed
    }

    pub fn raise_z_order_for_app_window(&mut self, id: WindowId) -> WmResult<()> {
        let display = self.display_of(id)?;
        let Some(container) = self.containers.get_mut(&display) else {
            return Err(WmError::InvalidDisplay);
        };
        container.raise_z_order_for_app_window(&mut self.nodes, id)
    }

    pub fn request_focus(&mut self, id: WindowId) -> WmResult<WmStatus> {
        let display = self.display_of(id)?;
        let node = &self.nodes[id];
        if !node.is_visible() || !node.property.focusable() {
            debug!(window_id = %id, visible = node.is_visible(), "window cannot take focus");
            return Err(WmError::InvalidOperation);
        }
        let Some(container) = self.containers.get_mut(&display) else {
            return Err(WmError::InvalidDisplay);
        };
        container.set_focus_window(&self.nodes, id)
    }

    pub fn request_active(&mut self, id: WindowId) -> WmResult<WmStatus> {
        let display = self.display_of(id)?;
        let Some(container) = self.containers.get_mut(&display) else {
            return Err(WmError::InvalidDisplay);
        };
        container.set_active_window(&self.nodes, id)
    }

    pub fn focused_window(&self, display: DisplayId) -> WindowId {
        self.containers.get(&display).map_or(WindowId::INVALID, |c| c.focused_window())
    }

    pub fn update_brightness(&mut self, id: WindowId) -> WmResult<()> {
        let display = self.display_of(id)?;
        if let Some(container) = self.containers.get_mut(&display) {
            container.update_brightness(&self.nodes);
        }
        Ok(())
    }

    pub fn update_orientation(&mut self, id: WindowId) -> WmResult<()> {
        let display = self.display_of(id)?;
        if let Some(container) = self.containers.get_mut(&display) {
            container.update_preferred_orientation(&self.nodes);
        }
        Ok(())
    }

    pub fn notify_system_bar_tints(&mut self, id: WindowId) -> WmResult<()> {
        let display = self.display_of(id)?;
        if let Some(container) = self.containers.get_mut(&display) {
            container.notify_if_system_bar_tint_changed(&self.nodes);
        }
        Ok(())
    }

    pub fn minimize_all_app_windows(&mut self, display: DisplayId) -> WmResult<Vec<WindowId>> {
        let container = self.containers.get(&display).ok_or(WmError::InvalidDisplay)?;
        Ok(container.minimize_all_app_windows(&self.nodes, &mut self.pending))
    }

    /// Switches every display; reorders so existing windows follow the new
    /// policy.
    pub fn set_window_layout_mode(&mut self, mode: WindowLayoutMode) -> WmStatus {
        self.layout_mode = mode;
        let mut status = WmStatus::DoNothing;
        for container in self.containers.values_mut() {
            if container.switch_layout_policy(&mut self.nodes, &mut self.pending, mode, true)
                == WmStatus::Ok
            {
                status = WmStatus::Ok;
            }
        }
        status
    }

    pub fn process_display_change(&mut self, info: DisplayInfo) -> WmResult<()> {
        let Some(container) = self.containers.get_mut(&info.id) else {
            return Err(WmError::InvalidDisplay);
        };
        container.process_display_change(&mut self.nodes, &mut self.pending, info);
        Ok(())
    }

    pub fn handle_divider_release(&mut self, id: WindowId) -> WmResult<bool> {
        let display = self.display_of(id)?;
        let Some(container) = self.containers.get_mut(&display) else {
            return Err(WmError::InvalidDisplay);
        };
        Ok(container.handle_divider_release(&mut self.nodes, &mut self.pending, id))
    }

    pub fn is_forbid_divider_move(&self, id: WindowId) -> bool {
        self.container_of(id).is_some_and(|c| c.is_forbid_divider_move(&self.nodes))
    }

    pub fn avoid_area(&self, id: WindowId, ty: AvoidAreaType) -> WmResult<AvoidArea> {
        let container = self.container_of(id).ok_or(WmError::InvalidWindow)?;
        Ok(container.avoid_area(ty))
    }

    /// The top-level window the node hangs off.
    pub fn top_level_of(&self, id: WindowId) -> WindowId {
        match self.nodes.get(id).and_then(|n| n.parent) {
            Some(ParentRef::Window(parent)) => parent,
            _ => id,
        }
    }

    /// Window of `ty` on `display`, shown or not.
    pub fn find_window(&self, display: DisplayId, ty: WindowType) -> Option<WindowId> {
        self.nodes
            .values()
            .filter(|n| n.display_id() == display && n.window_type() == ty)
            .map(|n| n.id)
            .min()
    }
}
