//! Thread that owns the server's own decoration windows: the split divider
//! and the placeholder shown in the empty half of a split.
//!
//! It receives split broadcasts from the worker and calls back into the
//! worker to create or destroy windows, so it must never run on the worker
//! itself.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::actor::service::ServiceHandle;
use crate::common::collections::HashMap;
use crate::model::pending::SplitBroadcast;
use crate::model::types::{DisplayId, WindowId, WindowMode, WindowType};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InnerRequest {
    CreateDivider { display: DisplayId },
    DestroyDivider { display: DisplayId },
    CreatePlaceholder { display: DisplayId, mode: WindowMode },
    DestroyPlaceholder { display: DisplayId },
    ShowRecent { display: DisplayId, window: WindowId },
    Stop,
}

impl From<SplitBroadcast> for InnerRequest {
    fn from(msg: SplitBroadcast) -> Self {
        match msg {
            SplitBroadcast::CreateDivider { display } => InnerRequest::CreateDivider { display },
            SplitBroadcast::DestroyDivider { display } => InnerRequest::DestroyDivider { display },
            SplitBroadcast::ShowRecent { display, window } => {
                InnerRequest::ShowRecent { display, window }
            }
            SplitBroadcast::CreatePlaceholder { display, mode } => {
                InnerRequest::CreatePlaceholder { display, mode }
            }
            SplitBroadcast::DestroyPlaceholder { display } => {
                InnerRequest::DestroyPlaceholder { display }
            }
        }
    }
}

/// Queue from the service worker to the inner manager. It is unbounded:
/// the worker must never block on it, and a dropped divider broadcast would
/// leave the divider out of step with the split pair.
pub fn channel() -> (Sender<InnerRequest>, Receiver<InnerRequest>) {
    crossbeam_channel::unbounded()
}

#[derive(Default, Debug)]
struct DecorWindows {
    dividers: HashMap<DisplayId, WindowId>,
    placeholders: HashMap<DisplayId, WindowId>,
}

#[derive(Clone, Copy, Debug)]
enum Decor {
    Divider,
    Placeholder,
}

impl Decor {
    fn window_type(self) -> WindowType {
        match self {
            Decor::Divider => WindowType::DockSlice,
            Decor::Placeholder => WindowType::Placeholder,
        }
    }

    fn name(self, display: DisplayId) -> String {
        match self {
            Decor::Divider => format!("divider_{display}"),
            Decor::Placeholder => format!("placeholder_{display}"),
        }
    }
}

impl DecorWindows {
    fn slot(&mut self, decor: Decor) -> &mut HashMap<DisplayId, WindowId> {
        match decor {
            Decor::Divider => &mut self.dividers,
            Decor::Placeholder => &mut self.placeholders,
        }
    }
}

pub struct WindowInnerManager {
    tx: Sender<InnerRequest>,
    thread: Option<JoinHandle<()>>,
    windows: Arc<Mutex<DecorWindows>>,
}

impl std::fmt::Debug for WindowInnerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowInnerManager").field("windows", &*self.windows.lock()).finish()
    }
}

struct Worker {
    service: ServiceHandle,
    windows: Arc<Mutex<DecorWindows>>,
}

impl WindowInnerManager {
    pub fn spawn(
        tx: Sender<InnerRequest>,
        rx: Receiver<InnerRequest>,
        service: ServiceHandle,
    ) -> std::io::Result<Self> {
        let windows = Arc::new(Mutex::new(DecorWindows::default()));
        let worker = Worker { service, windows: windows.clone() };
        let thread = thread::Builder::new()
            .name("wms-inner".to_string())
            .spawn(move || worker.run(rx))?;
        Ok(WindowInnerManager { tx, thread: Some(thread), windows })
    }

    pub fn divider_of(&self, display: DisplayId) -> Option<WindowId> {
        self.windows.lock().dividers.get(&display).copied()
    }

    pub fn placeholder_of(&self, display: DisplayId) -> Option<WindowId> {
        self.windows.lock().placeholders.get(&display).copied()
    }

    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else { return };
        if self.tx.send(InnerRequest::Stop).is_err() {
            debug!("inner manager already gone");
        }
        if thread.join().is_err() {
            warn!("inner manager thread panicked");
        }
    }
}

impl Drop for WindowInnerManager {
    fn drop(&mut self) { self.stop(); }
}

impl Worker {
    fn run(self, rx: Receiver<InnerRequest>) {
        debug!("inner manager started");
        while let Ok(request) = rx.recv() {
            debug!(?request, "inner request");
            match request {
                InnerRequest::Stop => break,
                InnerRequest::CreateDivider { display } => {
                    self.destroy(Decor::Placeholder, display);
                    self.create(Decor::Divider, display, WindowMode::Floating);
                }
                InnerRequest::DestroyDivider { display } => self.destroy(Decor::Divider, display),
                InnerRequest::CreatePlaceholder { display, mode } => {
                    self.create(Decor::Placeholder, display, mode)
                }
                InnerRequest::DestroyPlaceholder { display } => {
                    self.destroy(Decor::Placeholder, display)
                }
                InnerRequest::ShowRecent { display: display_id, window } => {
                    info!(display_id = %display_id, window_id = %window, "show recent tasks");
                }
            }
        }
        debug!("inner manager stopped");
    }

    fn create(&self, decor: Decor, display_id: DisplayId, mode: WindowMode) {
        if self.windows.lock().slot(decor).contains_key(&display_id) {
            debug!(?decor, display_id = %display_id, "already shown");
            return;
        }
        let name = decor.name(display_id);
        let ty = decor.window_type();
        let created = self
            .service
            .post_sync(move |ctrl| ctrl.create_system_window(display_id, ty, mode, &name))
            .and_then(|result| result);
        match created {
            Ok(id) => {
                info!(?decor, display_id = %display_id, window_id = %id, "decoration window created");
                self.windows.lock().slot(decor).insert(display_id, id);
            }
            Err(err) => warn!(?decor, display_id = %display_id, %err, "decoration window not created"),
        }
    }

    fn destroy(&self, decor: Decor, display_id: DisplayId) {
        // Forget it first: destroying it may broadcast another destroy.
        let Some(id) = self.windows.lock().slot(decor).remove(&display_id) else { return };
        let destroyed = self
            .service
            .post_sync(move |ctrl| ctrl.destroy_window(id, false))
            .and_then(|result| result);
        match destroyed {
            Ok(()) => info!(?decor, display_id = %display_id, window_id = %id, "decoration window destroyed"),
            Err(err) => warn!(?decor, display_id = %display_id, window_id = %id, %err, "destroy failed"),
        }
    }
}
