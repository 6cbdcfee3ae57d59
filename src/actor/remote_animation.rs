//! Compositor-driven transitions.
//!
//! The window manager hands each transition to a [`RemoteAnimationRunner`]
//! together with a finish callback. Every request bumps the node's
//! `animation_tasks`; a hidden node leaves the render tree only when the
//! last of them has finished, so overlapping animations on one node never
//! cut each other short. Finish callbacks arrive on the compositor's thread
//! and are routed back to the service worker through a [`FinishHook`].

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::model::error::{WmError, WmResult};
use crate::model::types::{DisplayId, WindowId};
use crate::model::window_node::{WindowNode, WindowNodeState};
use crate::model::window_root::WindowRoot;
use crate::sys::geometry::Rect;
use crate::sys::render::SurfaceRef;

pub type FinishCallback = Box<dyn FnOnce() + Send>;

/// Re-enters the owner of the window tree with the windows whose animation
/// finished.
pub type FinishHook = Arc<dyn Fn(Vec<WindowId>) + Send + Sync>;

const DEFAULT_CORNER_RADIUS: f32 = 16.0;

/// What the compositor needs to animate one window.
#[derive(Clone, Debug)]
pub struct AnimationTarget {
    pub bundle_name: String,
    pub ability_name: String,
    pub window_id: WindowId,
    pub display_id: DisplayId,
    pub surface: Option<SurfaceRef>,
    pub bounds: Rect,
    pub corner_radius: f32,
}

impl AnimationTarget {
    pub fn of(node: &WindowNode) -> Self {
        let corner_radius = if node.mode().is_floating() { DEFAULT_CORNER_RADIUS } else { 0.0 };
        AnimationTarget {
            bundle_name: node.property.bundle_name(),
            ability_name: node.property.ability_name(),
            window_id: node.id,
            display_id: node.display_id(),
            surface: node.surface.clone(),
            bounds: node.rect(),
            corner_radius,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum AnimationKind {
    Transition,
    Minimize,
    Close,
    ByHome,
}

pub trait RemoteAnimationRunner: Send + Sync {
    fn on_transition(
        &self,
        from: Option<&AnimationTarget>,
        to: &AnimationTarget,
        finish: FinishCallback,
    );

    fn on_minimize(&self, target: &AnimationTarget, finish: FinishCallback);

    fn on_close(&self, target: &AnimationTarget, finish: FinishCallback);

    fn on_by_home(&self, targets: &[AnimationTarget], finish: FinishCallback);
}

/// Runner that keeps every animation running until told to finish it.
#[derive(Default)]
pub struct RecordingAnimationRunner {
    started: Mutex<Vec<(AnimationKind, Vec<WindowId>)>>,
    running: Mutex<Vec<FinishCallback>>,
}

impl RecordingAnimationRunner {
    pub fn started(&self) -> Vec<(AnimationKind, Vec<WindowId>)> { self.started.lock().clone() }

    pub fn running(&self) -> usize { self.running.lock().len() }

    /// Fires every pending finish callback; returns how many ran.
    pub fn finish_all(&self) -> usize {
        let callbacks = std::mem::take(&mut *self.running.lock());
        let count = callbacks.len();
        for finish in callbacks {
            finish();
        }
        count
    }

    fn record(&self, kind: AnimationKind, targets: &[&AnimationTarget], finish: FinishCallback) {
        let ids = targets.iter().map(|t| t.window_id).collect();
        self.started.lock().push((kind, ids));
        self.running.lock().push(finish);
    }
}

impl RemoteAnimationRunner for RecordingAnimationRunner {
    fn on_transition(
        &self,
        _from: Option<&AnimationTarget>,
        to: &AnimationTarget,
        finish: FinishCallback,
    ) {
        self.record(AnimationKind::Transition, &[to], finish);
    }

    fn on_minimize(&self, target: &AnimationTarget, finish: FinishCallback) {
        self.record(AnimationKind::Minimize, &[target], finish);
    }

    fn on_close(&self, target: &AnimationTarget, finish: FinishCallback) {
        self.record(AnimationKind::Close, &[target], finish);
    }

    fn on_by_home(&self, targets: &[AnimationTarget], finish: FinishCallback) {
        let targets: Vec<&AnimationTarget> = targets.iter().collect();
        self.record(AnimationKind::ByHome, &targets, finish);
    }
}

pub struct RemoteAnimation {
    runner: Option<Arc<dyn RemoteAnimationRunner>>,
    enabled: bool,
    finished: FinishHook,
}

impl std::fmt::Debug for RemoteAnimation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteAnimation")
            .field("enabled", &self.enabled)
            .field("runner", &self.runner.is_some())
            .finish()
    }
}

impl RemoteAnimation {
    pub fn new(
        enabled: bool,
        runner: Option<Arc<dyn RemoteAnimationRunner>>,
        finished: FinishHook,
    ) -> Self {
        RemoteAnimation { runner, enabled, finished }
    }

    pub fn is_enabled(&self) -> bool { self.enabled && self.runner.is_some() }

    pub fn set_enabled(&mut self, enabled: bool) { self.enabled = enabled; }

    fn runner(&self) -> WmResult<&Arc<dyn RemoteAnimationRunner>> {
        match &self.runner {
            Some(runner) if self.enabled => Ok(runner),
            _ => Err(WmError::NoRemoteAnimation),
        }
    }

    fn finish_callback(&self, ids: Vec<WindowId>) -> FinishCallback {
        let hook = self.finished.clone();
        Box::new(move || hook(ids))
    }

    /// Starts one more animation task on each node and snapshots it.
    fn begin(
        root: &mut WindowRoot,
        ids: &[WindowId],
        state: WindowNodeState,
    ) -> WmResult<Vec<AnimationTarget>> {
        if ids.iter().any(|id| root.node(*id).is_none()) {
            return Err(WmError::InvalidWindow);
        }
        let mut targets = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(node) = root.node_mut(*id) else { continue };
            node.animation_tasks += 1;
            node.state = state;
            match state {
                WindowNodeState::ShowAnimationPlaying => node.is_play_animation_show = true,
                WindowNodeState::HideAnimationPlaying => node.is_play_animation_hide = true,
                _ => {}
            }
            trace!(window_id = %id, tasks = node.animation_tasks, %state, "animation task started");
            targets.push(AnimationTarget::of(node));
        }
        Ok(targets)
    }

    pub fn notify_transition(
        &self,
        root: &mut WindowRoot,
        from: Option<WindowId>,
        to: WindowId,
    ) -> WmResult<()> {
        let runner = self.runner()?.clone();
        let from = from.and_then(|id| root.node(id)).map(AnimationTarget::of);
        let targets = Self::begin(root, &[to], WindowNodeState::ShowAnimationPlaying)?;
        info!(window_id = %to, from = ?from.as_ref().map(|t| t.window_id), "remote transition");
        runner.on_transition(from.as_ref(), &targets[0], self.finish_callback(vec![to]));
        Ok(())
    }

    pub fn notify_minimize(&self, root: &mut WindowRoot, id: WindowId) -> WmResult<()> {
        let runner = self.runner()?.clone();
        let targets = Self::begin(root, &[id], WindowNodeState::HideAnimationPlaying)?;
        info!(window_id = %id, "remote minimize");
        runner.on_minimize(&targets[0], self.finish_callback(vec![id]));
        Ok(())
    }

    pub fn notify_close(&self, root: &mut WindowRoot, id: WindowId) -> WmResult<()> {
        let runner = self.runner()?.clone();
        let targets = Self::begin(root, &[id], WindowNodeState::HideAnimationPlaying)?;
        info!(window_id = %id, "remote close");
        runner.on_close(&targets[0], self.finish_callback(vec![id]));
        Ok(())
    }

    pub fn notify_by_home(&self, root: &mut WindowRoot, ids: &[WindowId]) -> WmResult<()> {
        let runner = self.runner()?.clone();
        let targets = Self::begin(root, ids, WindowNodeState::HideAnimationPlaying)?;
        info!(windows = ids.len(), "remote back to home");
        runner.on_by_home(&targets, self.finish_callback(ids.to_vec()));
        Ok(())
    }
}

/// Settles one finished animation task per window. Returns the windows that
/// have no task left; windows destroyed in the meantime are skipped.
pub fn settle(root: &mut WindowRoot, ids: &[WindowId]) -> Vec<WindowId> {
    let mut settled = Vec::new();
    for id in ids {
        let Some(node) = root.node_mut(*id) else {
            debug!(window_id = %id, "animation finished for a destroyed window");
            continue;
        };
        node.animation_tasks = node.animation_tasks.saturating_sub(1);
        if node.animation_tasks > 0 {
            trace!(window_id = %id, tasks = node.animation_tasks, "animation still running");
            continue;
        }
        node.state = match node.state {
            WindowNodeState::ShowAnimationPlaying => WindowNodeState::ShowAnimationDone,
            WindowNodeState::HideAnimationPlaying => WindowNodeState::HideAnimationDone,
            state => state,
        };
        node.is_play_animation_show = false;
        node.is_play_animation_hide = false;
        settled.push(*id);
    }
    settled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::agents::WindowManagerAgentController;
    use crate::common::config::LayoutSettings;
    use crate::model::node_container::ContainerDeps;
    use crate::model::types::{WindowLayoutMode, WindowType};
    use crate::model::window_property::WindowProperty;
    use crate::sys::display::{DisplayInfo, RecordingDisplayManager};
    use crate::sys::render::{InMemoryRenderService, RenderService};

    type Finished = Arc<Mutex<Vec<Vec<WindowId>>>>;

    fn setup() -> (WindowRoot, WindowId, Finished, RemoteAnimation, Arc<RecordingAnimationRunner>) {
        let render = InMemoryRenderService::new();
        let deps = ContainerDeps {
            render: render.clone(),
            display_manager: Arc::new(RecordingDisplayManager::default()),
            agents: WindowManagerAgentController::new(),
        };
        let mut root =
            WindowRoot::new(WindowLayoutMode::Cascade, LayoutSettings::default(), false, deps);
        root.add_display(DisplayInfo::new(DisplayId::DEFAULT, 1080, 2340, 1.0)).unwrap();
        let id = root
            .create_window(
                WindowProperty::new("app", WindowType::AppMainWindow),
                Some(render.create_surface("app")),
                None,
                1,
                1,
            )
            .unwrap();
        let finished = Arc::new(Mutex::new(Vec::new()));
        let sink = finished.clone();
        let runner = Arc::new(RecordingAnimationRunner::default());
        let animation = RemoteAnimation::new(
            true,
            Some(runner.clone()),
            Arc::new(move |ids: Vec<WindowId>| sink.lock().push(ids)),
        );
        (root, id, finished, animation, runner)
    }

    #[test]
    fn overlapping_tasks_settle_only_after_the_last_finish() {
        let (mut root, id, finished, animation, runner) = setup();
        animation.notify_minimize(&mut root, id).unwrap();
        animation.notify_close(&mut root, id).unwrap();
        assert_eq!(root.node(id).unwrap().animation_tasks, 2);
        assert!(root.node(id).unwrap().state.is_animating());

        assert_eq!(runner.finish_all(), 2);
        let batches = std::mem::take(&mut *finished.lock());
        assert_eq!(batches, vec![vec![id], vec![id]]);

        assert!(settle(&mut root, &batches[0]).is_empty());
        assert_eq!(settle(&mut root, &batches[1]), vec![id]);
        let node = root.node(id).unwrap();
        assert_eq!(node.state, WindowNodeState::HideAnimationDone);
        assert!(!node.is_play_animation_hide);
    }

    #[test]
    fn disabled_animation_is_reported() {
        let (mut root, id, _, mut animation, runner) = setup();
        animation.set_enabled(false);
        assert!(!animation.is_enabled());
        assert_eq!(animation.notify_minimize(&mut root, id), Err(WmError::NoRemoteAnimation));
        assert!(runner.started().is_empty());
        assert_eq!(root.node(id).unwrap().animation_tasks, 0);
    }

    #[test]
    fn by_home_animates_every_window_at_once() {
        let (mut root, id, _, animation, runner) = setup();
        assert_eq!(
            animation.notify_by_home(&mut root, &[id, WindowId(99)]),
            Err(WmError::InvalidWindow)
        );
        animation.notify_by_home(&mut root, &[id]).unwrap();
        assert_eq!(runner.started(), vec![(AnimationKind::ByHome, vec![id])]);
        assert_eq!(runner.running(), 1);
    }
}
