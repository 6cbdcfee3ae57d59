//! The window manager service: one worker thread owns the
//! [`WindowController`] and runs every request in arrival order.
//!
//! Callers on other threads post closures to the worker. `post_sync` blocks
//! the caller until the closure has run; it must never be called from the
//! worker itself.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use crate::actor;
use crate::actor::agents::WindowManagerAgentController;
use crate::actor::controller::{Collaborators, WindowController};
use crate::actor::inner_manager::{self, WindowInnerManager};
use crate::actor::remote_animation::FinishHook;
use crate::actor::snapshot::take_snapshot;
use crate::common::config::Config;
use crate::ipc::dump;
use crate::model::error::{WmError, WmResult, WmStatus};
use crate::model::types::{
    AvoidArea, AvoidAreaType, DisplayId, PropertyChangeAction, WindowId, WindowLayoutMode,
    WindowMode, WindowSizeChangeReason, pid_t,
};
use crate::model::window_property::WindowProperty;
use crate::sys::client::WindowAgent;
use crate::sys::display::DisplayInfo;
use crate::sys::geometry::Rect;
use crate::sys::render::{RenderService, Snapshot, SurfaceRef};

pub type Task = Box<dyn FnOnce(&mut WindowController) + Send>;

enum Message {
    Run(Task),
    Stop,
}

/// Cheap handle for posting work to the service worker.
#[derive(Clone, Debug)]
pub struct ServiceHandle {
    tx: actor::Sender<Message>,
}

impl ServiceHandle {
    /// Queues `f` and returns immediately.
    pub fn post_async(&self, f: impl FnOnce(&mut WindowController) + Send + 'static) {
        self.tx.send(Message::Run(Box::new(f)));
    }

    /// Queues `f` and waits for its result.
    pub fn post_sync<R: Send + 'static>(
        &self,
        f: impl FnOnce(&mut WindowController) -> R + Send + 'static,
    ) -> WmResult<R> {
        let (reply, rx) = oneshot::channel();
        let task: Task = Box::new(move |ctrl| {
            _ = reply.send(f(ctrl));
        });
        if self.tx.try_send(Message::Run(task)).is_err() {
            return Err(WmError::DestroyedObject);
        }
        rx.blocking_recv().map_err(|_| WmError::DestroyedObject)
    }

    fn call<R: Send + 'static>(
        &self,
        f: impl FnOnce(&mut WindowController) -> WmResult<R> + Send + 'static,
    ) -> WmResult<R> {
        self.post_sync(f).and_then(|result| result)
    }
}

fn run_worker(mut controller: WindowController, mut rx: actor::Receiver<Message>) {
    debug!("service worker started");
    while let Some((span, message)) = rx.blocking_recv() {
        let _guard = span.enter();
        match message {
            Message::Run(task) => task(&mut controller),
            Message::Stop => break,
        }
    }
    debug!("service worker stopped");
}

pub struct WindowManagerService {
    handle: ServiceHandle,
    worker: Option<JoinHandle<()>>,
    inner: Option<WindowInnerManager>,
    agents: Arc<WindowManagerAgentController>,
    render: Arc<dyn RenderService>,
    snapshot_timeout: Duration,
}

impl std::fmt::Debug for WindowManagerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowManagerService")
            .field("running", &self.worker.is_some())
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl WindowManagerService {
    /// Builds the controller, registers the default display from `config`
    /// and starts the worker and the inner manager.
    pub fn start(config: &Config, collaborators: Collaborators) -> anyhow::Result<Self> {
        let (tx, rx) = actor::channel();
        let handle = ServiceHandle { tx };
        let agents = WindowManagerAgentController::new();

        let finish_handle = handle.clone();
        let finished: FinishHook = Arc::new(move |ids: Vec<WindowId>| {
            finish_handle.post_async(move |ctrl| ctrl.on_animation_finished(&ids));
        });
        let render = collaborators.render.clone();
        let mut controller = WindowController::new(config, collaborators, agents.clone(), finished);

        let (inner_tx, inner_rx) = inner_manager::channel();
        controller.set_split_sink(inner_tx.clone());
        let display = DisplayInfo::from_settings(DisplayId::DEFAULT, &config.display);
        controller.add_display(display).context("registering the default display")?;

        let inner = WindowInnerManager::spawn(inner_tx, inner_rx, handle.clone())
            .context("spawning the inner manager")?;
        let worker = thread::Builder::new()
            .name("wms-worker".to_string())
            .spawn(move || run_worker(controller, rx))
            .context("spawning the service worker")?;
        info!(
            width = config.display.width,
            height = config.display.height,
            "window manager service started"
        );

        Ok(WindowManagerService {
            handle,
            worker: Some(worker),
            inner: Some(inner),
            agents,
            render,
            snapshot_timeout: Duration::from_millis(config.settings.snapshot_timeout_ms),
        })
    }

    pub fn handle(&self) -> ServiceHandle { self.handle.clone() }

    pub fn agents(&self) -> &Arc<WindowManagerAgentController> { &self.agents }

    pub fn create_window(
        &self,
        client: Option<Arc<dyn WindowAgent>>,
        property: WindowProperty,
        surface: Option<SurfaceRef>,
        pid: pid_t,
        uid: i32,
    ) -> WmResult<WindowId> {
        self.handle.call(move |c| c.create_window(client, property, surface, pid, uid))
    }

    pub fn add_window(&self, id: WindowId) -> WmResult<()> {
        self.handle.call(move |c| c.add_window(id))
    }

    pub fn remove_window(&self, id: WindowId) -> WmResult<()> {
        self.handle.call(move |c| c.remove_window(id))
    }

    pub fn destroy_window(&self, id: WindowId, only_self: bool) -> WmResult<()> {
        self.handle.call(move |c| c.destroy_window(id, only_self))
    }

    pub fn update_property(
        &self,
        property: WindowProperty,
        action: PropertyChangeAction,
    ) -> WmResult<WmStatus> {
        self.handle.call(move |c| c.update_property(&property, action))
    }

    pub fn resize_rect(
        &self,
        id: WindowId,
        rect: Rect,
        reason: WindowSizeChangeReason,
    ) -> WmResult<WmStatus> {
        self.handle.call(move |c| c.resize_rect(id, rect, reason))
    }

    pub fn set_window_mode(&self, id: WindowId, mode: WindowMode) -> WmResult<WmStatus> {
        self.handle.call(move |c| c.set_window_mode(id, mode))
    }

    pub fn request_focus(&self, id: WindowId) -> WmResult<WmStatus> {
        self.handle.call(move |c| c.request_focus(id))
    }

    pub fn raise_to_app_top(&self, id: WindowId) -> WmResult<()> {
        self.handle.call(move |c| c.raise_to_app_top(id))
    }

    pub fn minimize_window(&self, id: WindowId) -> WmResult<()> {
        self.handle.call(move |c| c.minimize_window(id))
    }

    pub fn minimize_all_app_windows(&self, display: DisplayId) -> WmResult<Vec<WindowId>> {
        self.handle.call(move |c| c.minimize_all_app_windows(display))
    }

    pub fn set_window_layout_mode(&self, mode: WindowLayoutMode) -> WmResult<WmStatus> {
        self.handle.post_sync(move |c| c.set_window_layout_mode(mode))
    }

    pub fn set_remote_animation_enabled(&self, enabled: bool) -> WmResult<()> {
        self.handle.post_sync(move |c| c.set_remote_animation_enabled(enabled))
    }

    pub fn add_display(&self, info: DisplayInfo) -> WmResult<()> {
        self.handle.call(move |c| c.add_display(info))
    }

    pub fn remove_display(&self, display: DisplayId) -> WmResult<Vec<WindowId>> {
        self.handle.call(move |c| c.remove_display(display))
    }

    /// Input events do not wait for the worker.
    pub fn process_point_down(&self, id: WindowId) {
        self.handle.post_async(move |c| c.process_point_down(id));
    }

    pub fn process_point_up(&self, id: WindowId) {
        self.handle.post_async(move |c| c.process_point_up(id));
    }

    pub fn process_display_change(&self, info: DisplayInfo) {
        self.handle.post_async(move |c| {
            if let Err(err) = c.process_display_change(info) {
                warn!(%err, "display change ignored");
            }
        });
    }

    pub fn on_remote_died(&self, pid: pid_t) -> WmResult<Vec<WindowId>> {
        self.handle.post_sync(move |c| c.on_remote_died(pid))
    }

    pub fn get_avoid_area(&self, id: WindowId, ty: AvoidAreaType) -> WmResult<AvoidArea> {
        self.handle.call(move |c| c.get_avoid_area(id, ty))
    }

    /// Captures the window's surface. The wait for the renderer happens on
    /// the calling thread so the worker keeps serving requests meanwhile.
    #[instrument(name = "service::snapshot", skip(self))]
    pub fn snapshot(&self, id: WindowId) -> WmResult<Snapshot> {
        let surface = self.handle.call(move |c| c.snapshot_surface(id))?;
        take_snapshot(&*self.render, &surface, self.snapshot_timeout)
    }

    /// Runs a dump command against the current window tree.
    pub fn dump(&self, args: Vec<String>) -> WmResult<String> {
        self.handle.post_sync(move |c| dump::execute(c.root(), &args))
    }

    /// Divider the inner manager created for `display`, if any.
    pub fn divider_of(&self, display: DisplayId) -> Option<WindowId> {
        self.inner.as_ref().and_then(|inner| inner.divider_of(display))
    }

    pub fn placeholder_of(&self, display: DisplayId) -> Option<WindowId> {
        self.inner.as_ref().and_then(|inner| inner.placeholder_of(display))
    }

    /// Stops the inner manager, then the worker. Requests posted afterwards
    /// fail with [`WmError::DestroyedObject`].
    pub fn shutdown(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            inner.stop();
        }
        let Some(worker) = self.worker.take() else { return };
        self.handle.tx.send(Message::Stop);
        if worker.join().is_err() {
            warn!("service worker panicked");
        }
        info!("window manager service stopped");
    }
}

impl Drop for WindowManagerService {
    fn drop(&mut self) { self.shutdown(); }
}
