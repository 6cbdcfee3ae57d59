//! Per-request façade over the window root.
//!
//! Every public operation runs on the service worker, applies its change to
//! the model, starts remote animations where they apply and finally drains
//! the side effects the model queued (minimize, recover, split broadcasts).

use std::sync::Arc;

use tracing::{debug, info, instrument, trace, warn};

use crate::actor::agents::WindowManagerAgentController;
use crate::actor::inner_manager::InnerRequest;
use crate::actor::remote_animation::{self, FinishHook, RemoteAnimation, RemoteAnimationRunner};
use crate::common::config::Config;
use crate::model::error::{WmError, WmResult, WmStatus};
use crate::model::node_container::ContainerDeps;
use crate::model::pending::PendingAction;
use crate::model::types::{
    AvoidArea, AvoidAreaType, DisplayId, PropertyChangeAction, WindowId, WindowLayoutMode,
    WindowMode, WindowSizeChangeReason, WindowType, WindowUpdateReason, pid_t,
};
use crate::model::window_node::StateTask;
use crate::model::window_property::WindowProperty;
use crate::model::window_root::WindowRoot;
use crate::sys::ability::{AbilityManager, RecordingAbilityManager};
use crate::sys::client::{WindowAgent, WindowState};
use crate::sys::display::{DisplayInfo, DisplayManager, RecordingDisplayManager};
use crate::sys::render::{InMemoryRenderService, RenderService, SurfaceRef};

/// Each drain round may queue further actions (a minimize removes a node,
/// which can dissolve a split pair); this bounds the cascade.
const MAX_DRAIN_ROUNDS: usize = 16;

#[derive(Clone)]
pub struct Collaborators {
    pub render: Arc<dyn RenderService>,
    pub display_manager: Arc<dyn DisplayManager>,
    pub ability: Arc<dyn AbilityManager>,
    pub animation_runner: Option<Arc<dyn RemoteAnimationRunner>>,
}

impl Collaborators {
    /// In-memory render tree and logging sinks, no remote animator.
    pub fn headless() -> Self {
        Collaborators {
            render: InMemoryRenderService::new(),
            display_manager: Arc::new(RecordingDisplayManager::default()),
            ability: Arc::new(RecordingAbilityManager::default()),
            animation_runner: None,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("animation_runner", &self.animation_runner.is_some())
            .finish_non_exhaustive()
    }
}

fn takes_focus_on_show(ty: WindowType) -> bool {
    !ty.is_below_app()
        && !ty.is_system_bar()
        && !matches!(
            ty,
            WindowType::DockSlice
                | WindowType::Placeholder
                | WindowType::Toast
                | WindowType::Pointer
                | WindowType::BootAnimation
                | WindowType::NavigationIndicator
                | WindowType::DraggingEffect
                | WindowType::FreezeDisplay
        )
}

pub struct WindowController {
    root: WindowRoot,
    render: Arc<dyn RenderService>,
    ability: Arc<dyn AbilityManager>,
    agents: Arc<WindowManagerAgentController>,
    animation: RemoteAnimation,
    split_tx: Option<crossbeam_channel::Sender<InnerRequest>>,
}

impl std::fmt::Debug for WindowController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowController")
            .field("root", &self.root)
            .field("animation", &self.animation)
            .finish_non_exhaustive()
    }
}

impl WindowController {
    pub fn new(
        config: &Config,
        collaborators: Collaborators,
        agents: Arc<WindowManagerAgentController>,
        finished: FinishHook,
    ) -> Self {
        let window_animation = config.settings.window_animation_enabled();
        let deps = ContainerDeps {
            render: collaborators.render.clone(),
            display_manager: collaborators.display_manager,
            agents: agents.clone(),
        };
        info!(
            layout_mode = ?config.settings.layout_mode,
            remote_animation = config.settings.remote_animation,
            window_animation,
            "window controller"
        );
        WindowController {
            root: WindowRoot::new(
                config.settings.layout_mode,
                config.layout.clone(),
                window_animation,
                deps,
            ),
            render: collaborators.render,
            ability: collaborators.ability,
            agents,
            animation: RemoteAnimation::new(
                config.settings.remote_animation,
                collaborators.animation_runner,
                finished,
            ),
            split_tx: None,
        }
    }

    /// Where split broadcasts go; without one they are only logged.
    pub fn set_split_sink(&mut self, tx: crossbeam_channel::Sender<InnerRequest>) {
        self.split_tx = Some(tx);
    }

    pub fn root(&self) -> &WindowRoot { &self.root }

    pub fn render(&self) -> &Arc<dyn RenderService> { &self.render }

    pub fn agents(&self) -> &Arc<WindowManagerAgentController> { &self.agents }

    pub fn set_remote_animation_enabled(&mut self, enabled: bool) {
        self.animation.set_enabled(enabled);
    }

    pub fn add_display(&mut self, info: DisplayInfo) -> WmResult<()> {
        let result = self.root.add_display(info);
        self.drain_pending();
        result
    }

    #[instrument(name = "controller::remove_display", skip(self, display_id), fields(display = ?display_id))]
    pub fn remove_display(&mut self, display_id: DisplayId) -> WmResult<Vec<WindowId>> {
        let result = self.root.remove_display(display_id);
        self.drain_pending();
        result
    }

    #[instrument(
        name = "controller::create_window",
        skip(self, client, property, surface),
        fields(name = %property.name(), ty = %property.window_type())
    )]
    pub fn create_window(
        &mut self,
        client: Option<Arc<dyn WindowAgent>>,
        property: WindowProperty,
        surface: Option<SurfaceRef>,
        pid: pid_t,
        uid: i32,
    ) -> WmResult<WindowId> {
        self.root.create_window(property, surface, client, pid, uid)
    }

    /// Defers `task` if the window is mid-animation. Returns true if deferred.
    fn defer_if_animating(&mut self, id: WindowId, task: StateTask) -> bool {
        let Some(node) = self.root.node_mut(id) else { return false };
        if !node.state.is_animating() {
            return false;
        }
        debug!(window_id = %id, ?task, state = %node.state, "window is animating, task deferred");
        node.state_tasks.push_back(task);
        true
    }

    fn notify_state(&self, id: WindowId, state: WindowState) {
        if let Some(client) = self.root.node(id).and_then(|n| n.client.as_ref()) {
            client.update_window_state(state);
        }
    }

    /// Shows a created window.
    #[instrument(name = "controller::add_window", skip(self))]
    pub fn add_window(&mut self, id: WindowId) -> WmResult<()> {
        let node = self.root.node(id).ok_or(WmError::InvalidWindow)?;
        let (ty, display) = (node.window_type(), node.display_id());
        if self.defer_if_animating(id, StateTask::Show) {
            return Ok(());
        }
        let animate = self.animation.is_enabled() && ty.is_main_window();
        let from = animate
            .then(|| {
                self.root
                    .container(display)
                    .and_then(|c| c.top_main_app_window(self.root.nodes()))
                    .map(|n| n.id)
            })
            .flatten();
        if animate {
            // The compositor animates this one; the local transition is skipped.
            if let Some(node) = self.root.node_mut(id) {
                node.is_play_animation_show = true;
            }
        }

        if let Err(err) = self.root.add_window_node(id) {
            warn!(window_id = %id, %err, "add window failed");
            if let Some(node) = self.root.node_mut(id) {
                node.is_play_animation_show = false;
            }
            self.drain_pending();
            return Err(err);
        }
        if animate && let Err(err) = self.animation.notify_transition(&mut self.root, from, id) {
            warn!(window_id = %id, %err, "remote transition not started");
        }
        self.notify_state(id, WindowState::Shown);
        self.focus_shown_window(id, ty);
        self.drain_pending();
        Ok(())
    }

    fn focus_shown_window(&mut self, id: WindowId, ty: WindowType) {
        let Some(node) = self.root.node(id) else { return };
        if !node.is_visible() || !node.property.focusable() || !takes_focus_on_show(ty) {
            return;
        }
        if let Err(err) = self.root.request_focus(id) {
            debug!(window_id = %id, %err, "shown window not focused");
        }
        if ty.is_main_window()
            && let Err(err) = self.root.request_active(id)
        {
            debug!(window_id = %id, %err, "shown window not activated");
        }
    }

    /// Hides a shown window; it stays alive and can be shown again.
    #[instrument(name = "controller::remove_window", skip(self))]
    pub fn remove_window(&mut self, id: WindowId) -> WmResult<()> {
        if self.root.node(id).is_none() {
            return Err(WmError::InvalidWindow);
        }
        if self.defer_if_animating(id, StateTask::Hide) {
            return Ok(());
        }
        let result = self.root.remove_window_node(id);
        if result.is_ok() {
            self.notify_state(id, WindowState::Hidden);
        }
        self.drain_pending();
        result
    }

    #[instrument(name = "controller::destroy_window", skip(self))]
    pub fn destroy_window(&mut self, id: WindowId, only_self: bool) -> WmResult<()> {
        let node = self.root.node(id).ok_or(WmError::DestroyedObject)?;
        let animate = self.animation.is_enabled()
            && node.window_type().is_main_window()
            && node.is_visible();
        if self.defer_if_animating(id, StateTask::Destroy) {
            return Ok(());
        }
        if animate && self.animation.notify_close(&mut self.root, id).is_ok() {
            // Hidden now, destroyed once the close animation has finished.
            if let Some(node) = self.root.node_mut(id) {
                node.state_tasks.push_back(StateTask::Destroy);
            }
            let result = self.root.remove_window_node(id);
            self.drain_pending();
            return result;
        }
        let result = self.root.destroy_window(id, only_self).map(|destroyed| {
            debug!(window_id = %id, count = destroyed.len(), "destroyed");
        });
        self.drain_pending();
        result
    }

    fn with_property(&mut self, id: WindowId, f: impl FnOnce(&mut WindowProperty)) -> WmResult<()> {
        let node = self.root.node_mut(id).ok_or(WmError::InvalidWindow)?;
        f(&mut node.property);
        Ok(())
    }

    /// Applies the fields of `property` that belong to `action`, and only
    /// those.
    #[instrument(name = "controller::update_property", skip(self, property), fields(window_id = %property.window_id()))]
    pub fn update_property(
        &mut self,
        property: &WindowProperty,
        action: PropertyChangeAction,
    ) -> WmResult<WmStatus> {
        let id = property.window_id();
        if self.root.node(id).is_none() {
            return Err(WmError::InvalidWindow);
        }
        use PropertyChangeAction::*;
        let result = match action {
            UpdateRect => {
                return self.resize_rect(id, property.request_rect(), WindowSizeChangeReason::Resize);
            }
            UpdateMode => return self.set_window_mode(id, property.mode()),
            UpdateFlags => self
                .with_property(id, |p| p.set_flags(property.flags()))
                .and_then(|()| self.root.update_window_node(id, WindowUpdateReason::Flags)),
            UpdateOtherProps => self
                .with_property(id, |p| {
                    p.set_alpha(property.alpha());
                    p.set_privacy_mode(property.privacy_mode());
                    for (bar, prop) in property.sys_bar_props() {
                        p.set_sys_bar_prop(*bar, *prop);
                    }
                })
                .and_then(|()| self.root.update_window_node(id, WindowUpdateReason::OtherProps)),
            UpdateFocusable => self
                .with_property(id, |p| p.set_focusable(property.focusable()))
                .map(|()| self.hand_off_focus_if_unfocusable(id)),
            UpdateTouchable => self.with_property(id, |p| p.set_touchable(property.touchable())),
            UpdateCallingWindow => {
                self.with_property(id, |p| p.set_calling_window(property.calling_window()))
            }
            UpdateOrientation => self
                .with_property(id, |p| p.set_orientation(property.orientation()))
                .and_then(|()| self.root.update_orientation(id)),
            UpdateTurnScreenOn => self
                .with_property(id, |p| p.set_turn_screen_on(property.turn_screen_on()))
                .map(|()| info!(window_id = %id, on = property.turn_screen_on(), "turn screen on")),
            UpdateKeepScreenOn => self
                .with_property(id, |p| p.set_keep_screen_on(property.keep_screen_on()))
                .map(|()| info!(window_id = %id, on = property.keep_screen_on(), "keep screen on")),
            UpdateSetBrightness => self
                .with_property(id, |p| p.set_brightness(property.brightness()))
                .and_then(|()| self.root.update_brightness(id)),
            UpdateModeSupportInfo => {
                let support = property.mode_support();
                self.with_property(id, |p| p.set_mode_support(support)).map(|()| {
                    if let Some(node) = self.root.node(id)
                        && !support.supports(node.mode())
                    {
                        warn!(window_id = %id, mode = %node.mode(), "current mode no longer supported");
                    }
                })
            }
            UpdateWindowLimits => self
                .with_property(id, |p| p.set_size_limits(property.size_limits()))
                .and_then(|()| self.root.update_window_node(id, WindowUpdateReason::Rect)),
            UpdateDecorEnable => self
                .with_property(id, |p| p.set_decor_enable(property.decor_enable()))
                .and_then(|()| self.root.update_window_node(id, WindowUpdateReason::Rect)),
        };
        self.drain_pending();
        result.map(|()| WmStatus::Ok)
    }

    fn hand_off_focus_if_unfocusable(&mut self, id: WindowId) {
        let Some(node) = self.root.node(id) else { return };
        let display = node.display_id();
        if node.property.focusable() || self.root.focused_window(display) != id {
            return;
        }
        let next = self
            .root
            .container(display)
            .map_or(WindowId::INVALID, |c| c.next_focusable_window(self.root.nodes(), &[id]));
        if next.is_valid()
            && let Err(err) = self.root.request_focus(next)
        {
            debug!(window_id = %next, %err, "focus hand-off failed");
        }
    }

    #[instrument(name = "controller::resize_rect", skip(self))]
    pub fn resize_rect(
        &mut self,
        id: WindowId,
        rect: crate::sys::geometry::Rect,
        reason: WindowSizeChangeReason,
    ) -> WmResult<WmStatus> {
        let node = self.root.node(id).ok_or(WmError::InvalidWindow)?;
        if node.mode() == WindowMode::Fullscreen {
            warn!(window_id = %id, "fullscreen window cannot be resized");
            return Err(WmError::InvalidOperation);
        }
        let is_divider = node.window_type() == WindowType::DockSlice;
        if is_divider && self.root.is_forbid_divider_move(id) {
            debug!(window_id = %id, "divider move is forbidden");
            return Ok(WmStatus::DoNothing);
        }
        if let Some(node) = self.root.node_mut(id) {
            node.property.set_request_rect(rect);
            node.size_change_reason = reason;
        }
        let mut result = self.root.update_window_node(id, WindowUpdateReason::Rect);
        if result.is_ok() && is_divider && reason == WindowSizeChangeReason::DragEnd {
            result = self.root.handle_divider_release(id).map(|_| ());
        }
        self.drain_pending();
        result.map(|()| WmStatus::Ok)
    }

    #[instrument(name = "controller::set_window_mode", skip(self))]
    pub fn set_window_mode(&mut self, id: WindowId, mode: WindowMode) -> WmResult<WmStatus> {
        let node = self.root.node(id).ok_or(WmError::InvalidWindow)?;
        let old = node.mode();
        if old == mode {
            return Ok(WmStatus::DoNothing);
        }
        if !node.property.mode_support().supports(mode) {
            warn!(window_id = %id, %mode, "mode not supported by window");
            return Err(WmError::InvalidWindowModeOrSize);
        }
        if let Some(node) = self.root.node_mut(id) {
            node.property.set_mode(mode);
            node.size_change_reason = if mode.is_fullscreen() {
                WindowSizeChangeReason::Maximize
            } else if old.is_fullscreen() {
                WindowSizeChangeReason::Recover
            } else {
                node.size_change_reason
            };
            node.notify_mode();
        }
        info!(window_id = %id, %old, %mode, "window mode");
        let result = self.root.update_window_node(id, WindowUpdateReason::Mode);
        self.drain_pending();
        result.map(|()| WmStatus::Ok)
    }

    #[instrument(name = "controller::request_focus", skip(self))]
    pub fn request_focus(&mut self, id: WindowId) -> WmResult<WmStatus> {
        self.root.request_focus(id)
    }

    #[instrument(name = "controller::raise_to_app_top", skip(self))]
    pub fn raise_to_app_top(&mut self, id: WindowId) -> WmResult<()> {
        let node = self.root.node(id).ok_or(WmError::InvalidWindow)?;
        if !node.window_type().is_app_window() {
            return Err(WmError::InvalidType);
        }
        self.root.raise_z_order_for_app_window(id)
    }

    /// A touch landed on the window: bring it forward and give it focus.
    #[instrument(name = "controller::process_point_down", skip(self))]
    pub fn process_point_down(&mut self, id: WindowId) {
        let Some(node) = self.root.node(id) else {
            debug!(window_id = %id, "point down on unknown window");
            return;
        };
        if !node.is_visible() {
            return;
        }
        let (ty, focusable) = (node.window_type(), node.property.focusable());
        if ty.is_app_window() {
            match self.root.raise_z_order_for_app_window(id) {
                Ok(()) | Err(WmError::InvalidType) => {}
                Err(err) => debug!(window_id = %id, %err, "raise on point down failed"),
            }
        }
        if focusable && let Err(err) = self.root.request_focus(id) {
            debug!(window_id = %id, %err, "focus on point down failed");
        }
        let top = self.root.top_level_of(id);
        if self.root.node(top).is_some_and(|n| n.window_type().is_main_window())
            && let Err(err) = self.root.request_active(top)
        {
            debug!(window_id = %top, %err, "activate on point down failed");
        }
        self.drain_pending();
    }

    /// A touch was released; a dragged divider settles or ends the split.
    #[instrument(name = "controller::process_point_up", skip(self))]
    pub fn process_point_up(&mut self, id: WindowId) {
        let Some(node) = self.root.node_mut(id) else { return };
        if node.window_type() != WindowType::DockSlice {
            return;
        }
        node.size_change_reason = WindowSizeChangeReason::DragEnd;
        if let Err(err) = self.root.update_window_node(id, WindowUpdateReason::Rect) {
            warn!(window_id = %id, %err, "divider relayout failed");
        }
        match self.root.handle_divider_release(id) {
            Ok(exited) => debug!(window_id = %id, exited, "divider released"),
            Err(err) => warn!(window_id = %id, %err, "divider release failed"),
        }
        self.drain_pending();
    }

    #[instrument(name = "controller::minimize_all_app_windows", skip(self, display_id), fields(display = ?display_id))]
    pub fn minimize_all_app_windows(&mut self, display_id: DisplayId) -> WmResult<Vec<WindowId>> {
        let ids = self.root.minimize_all_app_windows(display_id)?;
        if self.animation.is_enabled()
            && !ids.is_empty()
            && let Err(err) = self.animation.notify_by_home(&mut self.root, &ids)
        {
            warn!(%err, "back-to-home animation not started");
        }
        self.drain_pending();
        Ok(ids)
    }

    /// Minimizes one window, through the compositor when remote animation
    /// is on.
    #[instrument(name = "controller::minimize_window", skip(self))]
    pub fn minimize_window(&mut self, id: WindowId) -> WmResult<()> {
        let node = self.root.node(id).ok_or(WmError::InvalidWindow)?;
        if !node.window_type().is_main_window() {
            return Err(WmError::InvalidType);
        }
        if node.is_visible()
            && self.animation.is_enabled()
            && let Err(err) = self.animation.notify_minimize(&mut self.root, id)
        {
            warn!(window_id = %id, %err, "minimize animation not started");
        }
        self.root
            .pending_mut()
            .minimize(id, crate::model::types::MinimizeReason::MinimizeButton);
        self.drain_pending();
        Ok(())
    }

    #[instrument(name = "controller::set_window_layout_mode", skip(self))]
    pub fn set_window_layout_mode(&mut self, mode: WindowLayoutMode) -> WmStatus {
        let status = self.root.set_window_layout_mode(mode);
        self.drain_pending();
        status
    }

    #[instrument(name = "controller::process_display_change", skip(self, info), fields(display_id = %info.id))]
    pub fn process_display_change(&mut self, info: DisplayInfo) -> WmResult<()> {
        let result = self.root.process_display_change(info);
        self.drain_pending();
        result
    }

    /// Death recipient of a client process.
    #[instrument(name = "controller::on_remote_died", skip(self))]
    pub fn on_remote_died(&mut self, pid: pid_t) -> Vec<WindowId> {
        // Nothing will finish those animations any more.
        for id in self.root.windows_of_pid(pid) {
            if let Some(node) = self.root.node_mut(id) {
                node.animation_tasks = 0;
                node.state_tasks.clear();
            }
        }
        let destroyed = self.root.on_remote_died(pid);
        self.drain_pending();
        destroyed
    }

    pub fn get_avoid_area(&self, id: WindowId, ty: AvoidAreaType) -> WmResult<AvoidArea> {
        self.root.avoid_area(id, ty)
    }

    /// The surface to capture for a snapshot of `id`.
    pub fn snapshot_surface(&self, id: WindowId) -> WmResult<SurfaceRef> {
        let node = self.root.node(id).ok_or(WmError::InvalidWindow)?;
        node.surface.clone().ok_or(WmError::NullPtr)
    }

    /// Creates and shows a window the server owns itself (divider,
    /// placeholder).
    #[instrument(name = "controller::create_system_window", skip(self, display_id), fields(display = ?display_id))]
    pub fn create_system_window(
        &mut self,
        display_id: DisplayId,
        ty: WindowType,
        mode: WindowMode,
        name: &str,
    ) -> WmResult<WindowId> {
        let mut property = WindowProperty::new(name, ty);
        property.set_display_id(display_id);
        property.set_mode(mode);
        property.set_focusable(false);
        let surface = self.render.create_surface(name);
        let pid = std::process::id() as pid_t;
        let id = self.root.create_window(property, Some(surface), None, pid, 0)?;
        if let Err(err) = self.add_window(id) {
            if let Err(cleanup) = self.root.destroy_window(id, false) {
                warn!(window_id = %id, %cleanup, "could not drop half-created system window");
            }
            return Err(err);
        }
        Ok(id)
    }

    /// Runs on the worker when the compositor has finished animations on
    /// `ids`.
    #[instrument(name = "controller::on_animation_finished", skip(self))]
    pub fn on_animation_finished(&mut self, ids: &[WindowId]) {
        for id in remote_animation::settle(&mut self.root, ids) {
            let Some(node) = self.root.node(id) else { continue };
            if node.parent.is_none()
                && let Some(surface) = &node.surface
            {
                self.render.detach(node.display_id(), surface, None);
            }
            self.replay_state_tasks(id);
        }
        self.render.flush();
        self.drain_pending();
    }

    fn replay_state_tasks(&mut self, id: WindowId) {
        loop {
            let Some(node) = self.root.node_mut(id) else { return };
            if node.state.is_animating() {
                return;
            }
            let Some(task) = node.state_tasks.pop_front() else { return };
            debug!(window_id = %id, ?task, "replay deferred task");
            let result = match task {
                StateTask::Show => self.add_window(id),
                StateTask::Hide => self.remove_window(id),
                StateTask::Destroy => self.destroy_window(id, false),
            };
            if let Err(err) = result {
                warn!(window_id = %id, ?task, %err, "deferred task failed");
            }
        }
    }

    /// Executes the side effects the model queued. Each round may queue more.
    pub fn drain_pending(&mut self) {
        for _ in 0..MAX_DRAIN_ROUNDS {
            let actions = self.root.take_pending();
            if actions.is_empty() {
                return;
            }
            for action in actions {
                self.execute(action);
            }
        }
        warn!("pending actions still queued after {MAX_DRAIN_ROUNDS} rounds");
    }

    fn execute(&mut self, action: PendingAction) {
        trace!(?action, "pending action");
        match action {
            PendingAction::Minimize { window, reason } => {
                self.ability.minimize_ability(window, reason);
                let in_tree = self.root.node(window).is_some_and(|n| n.parent.is_some());
                if !in_tree {
                    return;
                }
                match self.root.remove_window_node(window) {
                    Ok(()) => self.notify_state(window, WindowState::Hidden),
                    Err(err) => warn!(window_id = %window, %err, "minimize failed"),
                }
            }
            // The ability runtime brings the window back through add_window.
            PendingAction::Recover { window } => self.ability.recover_ability(window),
            PendingAction::Split(msg) => match &self.split_tx {
                Some(tx) => {
                    if tx.send(InnerRequest::from(msg)).is_err() {
                        warn!(?msg, "inner manager is gone, split broadcast lost");
                    }
                }
                None => debug!(?msg, "no split sink"),
            },
        }
    }
}

#[cfg(test)]
mod tests;
