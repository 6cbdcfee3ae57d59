//! Bounded wait for an asynchronous surface capture.

use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use tracing::{debug, warn};

use crate::model::error::{WmError, WmResult};
use crate::sys::render::{RenderService, Snapshot, SurfaceRef};

/// Asks the renderer for a capture of `surface` and blocks the calling
/// thread until it answers or `timeout` expires.
///
/// Never call this on the service worker: the renderer may need the worker
/// to make progress.
pub fn take_snapshot(
    render: &dyn RenderService,
    surface: &SurfaceRef,
    timeout: Duration,
) -> WmResult<Snapshot> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    render.request_snapshot(surface, tx);
    match rx.recv_timeout(timeout) {
        Ok(Some(shot)) => {
            debug!(surface = surface.id(), shot.width, shot.height, "snapshot taken");
            Ok(shot)
        }
        Ok(None) => {
            warn!(surface = surface.id(), "renderer could not capture surface");
            Err(WmError::NullPtr)
        }
        Err(RecvTimeoutError::Timeout) => {
            warn!(surface = surface.id(), ?timeout, "snapshot timed out");
            Err(WmError::Timeout)
        }
        Err(RecvTimeoutError::Disconnected) => {
            warn!(surface = surface.id(), "renderer dropped the snapshot request");
            Err(WmError::NullPtr)
        }
    }
}
