use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use test_log::test;

use super::*;
use crate::actor::inner_manager;
use crate::actor::remote_animation::{AnimationKind, RecordingAnimationRunner};
use crate::model::pending::SplitBroadcast;
use crate::model::types::{WindowFlags, WindowModeSupport};
use crate::sys::client::{ClientEvent, RecordingWindowAgent};
use crate::sys::geometry::Rect;

type Finished = Arc<Mutex<Vec<Vec<WindowId>>>>;

struct Harness {
    ctrl: WindowController,
    render: Arc<InMemoryRenderService>,
    ability: Arc<RecordingAbilityManager>,
    runner: Arc<RecordingAnimationRunner>,
    finished: Finished,
}

impl Harness {
    fn new(mode: WindowLayoutMode, width: u32, height: u32, remote_animation: bool) -> Self {
        let mut config = Config::default();
        config.settings.layout_mode = mode;
        config.settings.remote_animation = remote_animation;
        config.settings.window_animation_sentinel = PathBuf::from("/nonexistent/wmserver/sentinel");

        let render = InMemoryRenderService::new();
        let ability = Arc::new(RecordingAbilityManager::default());
        let runner = Arc::new(RecordingAnimationRunner::default());
        let finished: Finished = Arc::new(Mutex::new(Vec::new()));
        let sink = finished.clone();
        let collaborators = Collaborators {
            render: render.clone(),
            display_manager: Arc::new(RecordingDisplayManager::default()),
            ability: ability.clone(),
            animation_runner: Some(runner.clone()),
        };
        let mut ctrl = WindowController::new(
            &config,
            collaborators,
            WindowManagerAgentController::new(),
            Arc::new(move |ids: Vec<WindowId>| sink.lock().push(ids)),
        );
        ctrl.add_display(DisplayInfo::new(DisplayId::DEFAULT, width, height, 1.0)).unwrap();
        Harness { ctrl, render, ability, runner, finished }
    }

    fn phone() -> Self { Self::new(WindowLayoutMode::Cascade, 1080, 2340, false) }

    fn create(&mut self, name: &str, ty: WindowType, mode: WindowMode) -> WindowId {
        let mut property = WindowProperty::new(name, ty);
        property.set_mode(mode);
        let surface = self.render.create_surface(name);
        self.ctrl.create_window(None, property, Some(surface), 100, 1000).unwrap()
    }

    fn show(&mut self, name: &str, ty: WindowType, mode: WindowMode) -> WindowId {
        let id = self.create(name, ty, mode);
        self.ctrl.add_window(id).unwrap();
        id
    }

    fn node(&self, id: WindowId) -> &crate::model::window_node::WindowNode {
        self.ctrl.root().node(id).unwrap()
    }

    /// Completes every running remote animation and delivers the finish
    /// notifications the way the service worker would.
    fn finish_animations(&mut self) -> usize {
        let count = self.runner.finish_all();
        let batches = std::mem::take(&mut *self.finished.lock());
        for ids in batches {
            self.ctrl.on_animation_finished(&ids);
        }
        count
    }
}

#[test]
fn cascade_windows_open_at_stepped_rects() {
    let mut h = Harness::phone();
    let first = h.show("first", WindowType::AppMainWindow, WindowMode::Floating);
    let second = h.show("second", WindowType::AppMainWindow, WindowMode::Floating);

    assert_eq!(h.node(first).rect(), Rect::new(135, 292, 810, 1755));
    assert_eq!(h.node(second).rect(), Rect::new(172, 329, 810, 1755));
    assert_eq!(h.ctrl.root().focused_window(DisplayId::DEFAULT), second);
    assert!(h.render.is_attached(DisplayId::DEFAULT, h.node(second).surface.as_ref().unwrap().id()));
}

#[test]
fn shown_and_hidden_windows_tell_their_client() {
    let mut h = Harness::phone();
    let client = Arc::new(RecordingWindowAgent::default());
    let property = WindowProperty::new("app", WindowType::AppMainWindow);
    let surface = h.render.create_surface("app");
    let id = h
        .ctrl
        .create_window(Some(client.clone()), property, Some(surface), 100, 1000)
        .unwrap();

    h.ctrl.add_window(id).unwrap();
    h.ctrl.remove_window(id).unwrap();

    let states: Vec<ClientEvent> = client
        .events()
        .into_iter()
        .filter(|e| matches!(e, ClientEvent::State(_)))
        .collect();
    assert_eq!(
        states,
        vec![ClientEvent::State(WindowState::Shown), ClientEvent::State(WindowState::Hidden)]
    );
    assert!(!h.node(id).is_visible());
}

#[test]
fn pairing_split_windows_asks_for_a_divider() {
    let mut h = Harness::phone();
    let (tx, rx) = inner_manager::channel();
    h.ctrl.set_split_sink(tx);

    h.show("primary", WindowType::AppMainWindow, WindowMode::SplitPrimary);
    let requests: Vec<InnerRequest> = rx.try_iter().collect();
    assert!(requests.contains(&InnerRequest::CreatePlaceholder {
        display: DisplayId::DEFAULT,
        mode: WindowMode::SplitSecondary,
    }));
    assert!(!requests.contains(&InnerRequest::CreateDivider { display: DisplayId::DEFAULT }));

    h.show("secondary", WindowType::AppMainWindow, WindowMode::SplitSecondary);
    let requests: Vec<InnerRequest> = rx.try_iter().collect();
    assert!(requests.contains(&InnerRequest::CreateDivider { display: DisplayId::DEFAULT }));
}

#[test]
fn split_broadcasts_are_never_dropped_while_the_inner_manager_lags() {
    let mut h = Harness::phone();
    let (tx, rx) = inner_manager::channel();
    h.ctrl.set_split_sink(tx);

    for _ in 0..200 {
        h.ctrl.execute(PendingAction::Split(SplitBroadcast::CreateDivider {
            display: DisplayId::DEFAULT,
        }));
        h.ctrl.execute(PendingAction::Split(SplitBroadcast::DestroyDivider {
            display: DisplayId::DEFAULT,
        }));
    }
    let requests: Vec<InnerRequest> = rx.try_iter().collect();
    assert_eq!(requests.len(), 400);
    assert_eq!(
        requests.last(),
        Some(&InnerRequest::DestroyDivider { display: DisplayId::DEFAULT })
    );
}

#[test]
fn tile_overflow_minimizes_the_oldest_window() {
    let mut h = Harness::new(WindowLayoutMode::Tile, 1280, 800, false);
    let ids: Vec<WindowId> = (1..=4)
        .map(|n| h.show(&format!("app{n}"), WindowType::AppMainWindow, WindowMode::Fullscreen))
        .collect();

    assert_eq!(h.ability.minimized(), vec![ids[0]]);
    assert!(!h.node(ids[0]).is_visible());
    assert!(h.node(ids[0]).parent.is_none());
    for id in &ids[1..] {
        assert!(h.node(*id).is_visible());
        assert_eq!(h.node(*id).mode(), WindowMode::Floating);
    }
}

#[test]
fn dragging_a_tiled_window_drops_the_display_back_to_cascade() {
    let mut h = Harness::new(WindowLayoutMode::Tile, 1280, 800, false);
    let a = h.show("a", WindowType::AppMainWindow, WindowMode::Floating);
    let b = h.show("b", WindowType::AppMainWindow, WindowMode::Floating);

    let target = Rect::new(100, 120, 500, 400);
    assert_eq!(h.ctrl.resize_rect(a, target, WindowSizeChangeReason::Drag), Ok(WmStatus::Ok));

    let container = h.ctrl.root().container(DisplayId::DEFAULT).unwrap();
    assert_eq!(container.layout_mode(), WindowLayoutMode::Cascade);
    assert_eq!(h.node(a).rect(), target);
    assert!(h.node(b).is_visible());
}

#[test]
fn destroy_during_show_animation_waits_for_close_animation() {
    let mut h = Harness::new(WindowLayoutMode::Cascade, 1080, 2340, true);
    let id = h.show("app", WindowType::AppMainWindow, WindowMode::Floating);
    let surface = h.node(id).surface.as_ref().unwrap().id();
    assert!(h.node(id).state.is_animating());

    h.ctrl.destroy_window(id, false).unwrap();
    assert!(h.ctrl.root().node(id).is_some(), "destroy must wait for the show animation");

    assert_eq!(h.finish_animations(), 1);
    assert!(h.ctrl.root().node(id).is_some(), "close animation still running");
    assert!(!h.node(id).is_visible());

    assert_eq!(h.finish_animations(), 1);
    assert!(h.ctrl.root().node(id).is_none());
    assert!(!h.render.is_attached(DisplayId::DEFAULT, surface));
    let kinds: Vec<AnimationKind> = h.runner.started().into_iter().map(|(kind, _)| kind).collect();
    assert_eq!(kinds, vec![AnimationKind::Transition, AnimationKind::Close]);
}

#[test]
fn back_to_home_animates_and_minimizes_every_app_window() {
    let mut h = Harness::new(WindowLayoutMode::Cascade, 1080, 2340, true);
    let a = h.show("a", WindowType::AppMainWindow, WindowMode::Floating);
    let b = h.show("b", WindowType::AppMainWindow, WindowMode::Floating);
    h.finish_animations();

    let mut minimized = h.ctrl.minimize_all_app_windows(DisplayId::DEFAULT).unwrap();
    minimized.sort();
    assert_eq!(minimized, vec![a, b]);
    let mut by_ability = h.ability.minimized();
    by_ability.sort();
    assert_eq!(by_ability, vec![a, b]);
    assert!(matches!(h.runner.started().last(), Some((AnimationKind::ByHome, ids)) if ids.len() == 2));

    h.finish_animations();
    assert!(!h.node(a).is_visible());
    assert!(!h.node(b).state.is_animating());
}

#[test]
fn fullscreen_windows_cannot_be_resized() {
    let mut h = Harness::phone();
    let id = h.show("app", WindowType::AppMainWindow, WindowMode::Fullscreen);
    assert_eq!(
        h.ctrl.resize_rect(id, Rect::new(0, 0, 500, 500), WindowSizeChangeReason::Resize),
        Err(WmError::InvalidOperation)
    );
}

#[test]
fn floating_resize_updates_the_window_rect() {
    let mut h = Harness::phone();
    let id = h.show("app", WindowType::AppMainWindow, WindowMode::Floating);
    let status = h
        .ctrl
        .resize_rect(id, Rect::new(100, 200, 600, 900), WindowSizeChangeReason::Resize)
        .unwrap();
    assert_eq!(status, WmStatus::Ok);
    assert_eq!(h.node(id).request_rect(), Rect::new(100, 200, 600, 900));
}

#[test]
fn mode_changes_check_support_and_repeats() {
    let mut h = Harness::phone();
    let mut property = WindowProperty::new("fixed", WindowType::AppMainWindow);
    property.set_mode_support(WindowModeSupport::FULLSCREEN);
    let surface = h.render.create_surface("fixed");
    let fixed = h.ctrl.create_window(None, property, Some(surface), 100, 1000).unwrap();
    h.ctrl.add_window(fixed).unwrap();

    assert_eq!(h.ctrl.set_window_mode(fixed, WindowMode::Fullscreen), Ok(WmStatus::DoNothing));
    assert_eq!(
        h.ctrl.set_window_mode(fixed, WindowMode::Floating),
        Err(WmError::InvalidWindowModeOrSize)
    );

    let free = h.show("free", WindowType::AppMainWindow, WindowMode::Fullscreen);
    assert_eq!(h.ctrl.set_window_mode(free, WindowMode::Floating), Ok(WmStatus::Ok));
    assert_eq!(h.node(free).mode(), WindowMode::Floating);
}

#[test]
fn property_update_applies_only_its_own_fields() {
    let mut h = Harness::phone();
    let id = h.show("app", WindowType::AppMainWindow, WindowMode::Floating);
    let mut update = h.node(id).property.clone();
    update.set_flags(WindowFlags::NEED_AVOID);
    update.set_alpha(0.5);
    update.set_touchable(false);

    assert_eq!(h.ctrl.update_property(&update, PropertyChangeAction::UpdateFlags), Ok(WmStatus::Ok));
    assert!(h.node(id).has_flag(WindowFlags::NEED_AVOID));
    assert_eq!(h.node(id).property.alpha(), 1.0);
    assert!(h.node(id).property.touchable());

    h.ctrl.update_property(&update, PropertyChangeAction::UpdateOtherProps).unwrap();
    assert_eq!(h.node(id).property.alpha(), 0.5);
    assert!(h.node(id).property.touchable());
}

#[test]
fn losing_focusability_hands_focus_to_the_next_window() {
    let mut h = Harness::phone();
    let below = h.show("below", WindowType::AppMainWindow, WindowMode::Floating);
    let top = h.show("top", WindowType::AppMainWindow, WindowMode::Floating);
    assert_eq!(h.ctrl.root().focused_window(DisplayId::DEFAULT), top);

    let mut update = h.node(top).property.clone();
    update.set_focusable(false);
    h.ctrl.update_property(&update, PropertyChangeAction::UpdateFocusable).unwrap();
    assert_eq!(h.ctrl.root().focused_window(DisplayId::DEFAULT), below);
}

#[test]
fn point_down_raises_and_focuses_the_window() {
    let mut h = Harness::phone();
    let a = h.show("a", WindowType::AppMainWindow, WindowMode::Floating);
    let b = h.show("b", WindowType::AppMainWindow, WindowMode::Floating);
    assert!(h.node(b).z_order > h.node(a).z_order);

    h.ctrl.process_point_down(a);
    assert_eq!(h.ctrl.root().focused_window(DisplayId::DEFAULT), a);
    assert!(h.node(a).z_order > h.node(b).z_order);
}

#[test]
fn raising_a_system_window_is_rejected() {
    let mut h = Harness::phone();
    let bar = h.show("status", WindowType::StatusBar, WindowMode::Floating);
    assert_eq!(h.ctrl.raise_to_app_top(bar), Err(WmError::InvalidType));
}

#[test]
fn destroying_an_unknown_window_reports_destroyed_object() {
    let mut h = Harness::phone();
    assert_eq!(h.ctrl.destroy_window(WindowId(77), false), Err(WmError::DestroyedObject));
    assert_eq!(h.ctrl.add_window(WindowId(77)), Err(WmError::InvalidWindow));
}

#[test]
fn client_death_destroys_only_its_windows() {
    let mut h = Harness::phone();
    let mut property = WindowProperty::new("other", WindowType::AppMainWindow);
    property.set_mode(WindowMode::Floating);
    let surface = h.render.create_surface("other");
    let other = h.ctrl.create_window(None, property, Some(surface), 7, 1000).unwrap();
    h.ctrl.add_window(other).unwrap();
    let mine = h.show("mine", WindowType::AppMainWindow, WindowMode::Floating);

    assert_eq!(h.ctrl.on_remote_died(100), vec![mine]);
    assert!(h.ctrl.root().node(mine).is_none());
    assert!(h.node(other).is_visible());
}

#[test]
fn system_windows_are_unfocusable_and_shown() {
    let mut h = Harness::phone();
    let app = h.show("app", WindowType::AppMainWindow, WindowMode::Floating);
    let toast = h
        .ctrl
        .create_system_window(DisplayId::DEFAULT, WindowType::Toast, WindowMode::Floating, "toast")
        .unwrap();

    assert!(h.node(toast).is_visible());
    assert!(!h.node(toast).property.focusable());
    assert_eq!(h.ctrl.root().focused_window(DisplayId::DEFAULT), app);
    assert!(h.ctrl.snapshot_surface(toast).is_ok());
}
