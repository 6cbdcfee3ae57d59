//! Render tree boundary.
//!
//! The window manager never draws. It positions surfaces (bounds, z), and
//! attaches/detaches them from a display's render tree, optionally inside an
//! animated implicit transaction.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::model::types::DisplayId;
use crate::sys::geometry::Rect;

pub type SurfaceId = u64;

#[derive(Debug, Default, Clone, PartialEq)]
struct SurfaceState {
    bounds: Rect,
    position_z: f32,
    attached_to: Option<DisplayId>,
}

/// A render surface shared between the window manager (geometry and tree
/// membership) and whoever draws into it.
#[derive(Debug)]
pub struct SurfaceNode {
    id: SurfaceId,
    name: String,
    state: Mutex<SurfaceState>,
}

pub type SurfaceRef = Arc<SurfaceNode>;

impl SurfaceNode {
    pub fn new(id: SurfaceId, name: impl Into<String>) -> SurfaceRef {
        Arc::new(SurfaceNode {
            id,
            name: name.into(),
            state: Mutex::new(SurfaceState::default()),
        })
    }

    pub fn id(&self) -> SurfaceId { self.id }

    pub fn name(&self) -> &str { &self.name }

    pub fn set_bounds(&self, bounds: Rect) { self.state.lock().bounds = bounds; }

    pub fn bounds(&self) -> Rect { self.state.lock().bounds }

    pub fn set_position_z(&self, z: f32) { self.state.lock().position_z = z; }

    pub fn position_z(&self) -> f32 { self.state.lock().position_z }

    pub fn attached_display(&self) -> Option<DisplayId> { self.state.lock().attached_to }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Curve {
    Linear,
    EaseOut,
}

/// Timing protocol for an animated implicit transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnimationTiming {
    pub duration: Duration,
    pub curve: Curve,
}

/// Used for every animated attach/detach of a window surface.
pub const WINDOW_TRANSITION: AnimationTiming = AnimationTiming {
    duration: Duration::from_millis(350),
    curve: Curve::EaseOut,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub surface: SurfaceId,
    pub width: u32,
    pub height: u32,
}

pub type SnapshotReply = crossbeam_channel::Sender<Option<Snapshot>>;

pub trait RenderService: Send + Sync {
    fn create_surface(&self, name: &str) -> SurfaceRef;

    fn attach(&self, display: DisplayId, surface: &SurfaceRef, animation: Option<AnimationTiming>);

    fn detach(&self, display: DisplayId, surface: &SurfaceRef, animation: Option<AnimationTiming>);

    fn flush(&self);

    /// Captures the surface asynchronously; the result (or `None` on
    /// failure) is delivered on `reply`, possibly from another thread.
    fn request_snapshot(&self, surface: &SurfaceRef, reply: SnapshotReply);
}

/// Render service that keeps the render tree in memory. Used by the headless
/// binary and by tests.
#[derive(Default)]
pub struct InMemoryRenderService {
    next_id: AtomicU64,
    trees: DashMap<DisplayId, Vec<SurfaceId>>,
    animated_transactions: AtomicUsize,
    flushes: AtomicUsize,
    snapshots_disabled: AtomicBool,
    parked: Mutex<Vec<SnapshotReply>>,
}

impl InMemoryRenderService {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    /// Surfaces currently attached to `display`, in attach order.
    pub fn tree(&self, display: DisplayId) -> Vec<SurfaceId> {
        self.trees.get(&display).map(|t| t.value().clone()).unwrap_or_default()
    }

    pub fn is_attached(&self, display: DisplayId, surface: SurfaceId) -> bool {
        self.trees.get(&display).is_some_and(|t| t.contains(&surface))
    }

    pub fn animated_transactions(&self) -> usize {
        self.animated_transactions.load(Ordering::Relaxed)
    }

    pub fn flushes(&self) -> usize { self.flushes.load(Ordering::Relaxed) }

    /// Makes snapshot requests go unanswered. The reply channels are kept
    /// open so waiters run into their timeout.
    pub fn set_snapshots_disabled(&self, disabled: bool) {
        self.snapshots_disabled.store(disabled, Ordering::Relaxed);
    }

    fn note_animation(&self, animation: Option<AnimationTiming>) {
        if let Some(timing) = animation {
            trace!(?timing, "animated transaction");
            self.animated_transactions.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl RenderService for InMemoryRenderService {
    fn create_surface(&self, name: &str) -> SurfaceRef {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        SurfaceNode::new(id, name)
    }

    fn attach(&self, display_id: DisplayId, surface: &SurfaceRef, animation: Option<AnimationTiming>) {
        self.note_animation(animation);
        let mut tree = self.trees.entry(display_id).or_default();
        if !tree.contains(&surface.id()) {
            tree.push(surface.id());
        }
        surface.state.lock().attached_to = Some(display_id);
        debug!(surface = surface.id(), display = %display_id, "attached surface");
    }

    fn detach(&self, display_id: DisplayId, surface: &SurfaceRef, animation: Option<AnimationTiming>) {
        self.note_animation(animation);
        if let Some(mut tree) = self.trees.get_mut(&display_id) {
            tree.retain(|id| *id != surface.id());
        }
        let mut state = surface.state.lock();
        if state.attached_to == Some(display_id) {
            state.attached_to = None;
        }
        debug!(surface = surface.id(), display = %display_id, "detached surface");
    }

    fn flush(&self) { self.flushes.fetch_add(1, Ordering::Relaxed); }

    fn request_snapshot(&self, surface: &SurfaceRef, reply: SnapshotReply) {
        if self.snapshots_disabled.load(Ordering::Relaxed) {
            self.parked.lock().push(reply);
            return;
        }
        let bounds = surface.bounds();
        _ = reply.send(Some(Snapshot {
            surface: surface.id(),
            width: bounds.width,
            height: bounds.height,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_and_detach_track_tree_membership() {
        let render = InMemoryRenderService::new();
        let a = render.create_surface("a");
        let b = render.create_surface("b");
        let display = DisplayId::DEFAULT;

        render.attach(display, &a, None);
        render.attach(display, &b, Some(WINDOW_TRANSITION));
        render.attach(display, &a, None);
        assert_eq!(render.tree(display), vec![a.id(), b.id()]);
        assert_eq!(a.attached_display(), Some(display));
        assert_eq!(render.animated_transactions(), 1);

        render.detach(display, &a, None);
        assert!(!render.is_attached(display, a.id()));
        assert_eq!(a.attached_display(), None);
    }

    #[test]
    fn snapshot_replies_with_surface_bounds() {
        let render = InMemoryRenderService::new();
        let surface = render.create_surface("shot");
        surface.set_bounds(Rect::new(0, 0, 300, 200));
        let (tx, rx) = crossbeam_channel::bounded(1);
        render.request_snapshot(&surface, tx);
        let shot = rx.recv().unwrap().unwrap();
        assert_eq!((shot.width, shot.height), (300, 200));
    }
}
