use std::sync::Arc;

use pretty_assertions::assert_eq;

use crate::common::config::LayoutSettings;
use crate::layout_engine::{CascadePolicy, LayoutContext, LayoutPolicy, TilePolicy};
use crate::model::pending::PendingActions;
use crate::model::types::{
    DisplayId, MinimizeReason, WindowFlags, WindowId, WindowMode, WindowModeSupport,
    WindowSizeChangeReason, WindowType,
};
use crate::model::window_node::{ParentRef, WindowNodeMap, WindowRoots, test_node};
use crate::model::window_pair::WindowPair;
use crate::model::zorder_policy::root_for;
use crate::sys::client::{ClientEvent, RecordingWindowAgent};
use crate::sys::display::DisplayInfo;
use crate::sys::geometry::{Rect, SizeLimits};

fn w(id: u32) -> WindowId { WindowId(id) }

fn phone() -> DisplayInfo { DisplayInfo::new(DisplayId::DEFAULT, 1080, 2340, 1.0) }

fn tablet() -> DisplayInfo { DisplayInfo::new(DisplayId::DEFAULT, 1280, 800, 1.0) }

struct Fixture {
    nodes: WindowNodeMap,
    roots: WindowRoots,
    pair: WindowPair,
    pending: PendingActions,
}

impl Fixture {
    fn new() -> Self {
        Fixture {
            nodes: WindowNodeMap::new(),
            roots: WindowRoots::default(),
            pair: WindowPair::new(DisplayId::DEFAULT),
            pending: PendingActions::new(),
        }
    }

    fn insert(&mut self, id: u32, ty: WindowType, mode: WindowMode) -> WindowId {
        let mut node = test_node(id, ty, mode);
        node.set_visibility(true);
        let root = root_for(ty);
        node.parent = Some(ParentRef::Root(root));
        self.nodes.insert(node);
        self.roots.children_mut(root).push(w(id));
        w(id)
    }

    fn insert_child(&mut self, id: u32, parent: WindowId, ty: WindowType) -> WindowId {
        let mut node = test_node(id, ty, WindowMode::Floating);
        node.set_visibility(true);
        node.parent = Some(ParentRef::Window(parent));
        self.nodes.insert(node);
        self.nodes[parent].children.push(w(id));
        w(id)
    }

    fn ctx(&mut self) -> LayoutContext<'_> {
        LayoutContext {
            nodes: &mut self.nodes,
            roots: &self.roots,
            pair: &self.pair,
            pending: &mut self.pending,
        }
    }

    fn rect(&self, id: WindowId) -> Rect { self.nodes[id].rect() }
}

fn cascade(display: DisplayInfo) -> CascadePolicy {
    CascadePolicy::new(LayoutSettings::default(), display)
}

fn tile(display: DisplayInfo) -> TilePolicy { TilePolicy::new(LayoutSettings::default(), display) }

mod cascade_layout {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn first_app_window_gets_centred_cascade_rect() {
        let mut f = Fixture::new();
        let mut policy = cascade(phone());
        policy.launch(&mut f.ctx());
        assert_eq!(policy.first_cascade_rect(), Rect::new(135, 292, 810, 1755));

        let id = f.insert(1, WindowType::AppMainWindow, WindowMode::Floating);
        policy.add_window_node(&mut f.ctx(), id);
        assert_eq!(f.rect(id), Rect::new(135, 292, 810, 1755));
    }

    #[test]
    fn next_app_window_steps_by_title_bar() {
        let mut f = Fixture::new();
        let mut policy = cascade(phone());
        policy.launch(&mut f.ctx());
        let first = f.insert(1, WindowType::AppMainWindow, WindowMode::Floating);
        policy.add_window_node(&mut f.ctx(), first);
        let second = f.insert(2, WindowType::AppMainWindow, WindowMode::Floating);
        policy.add_window_node(&mut f.ctx(), second);
        assert_eq!(f.rect(second), Rect::new(172, 329, 810, 1755));
    }

    #[test]
    fn step_wraps_to_limit_edge() {
        let policy = cascade(phone());
        let stepped = policy.step_cascade_rect(Rect::new(250, 560, 810, 1755));
        assert_eq!(stepped, Rect::new(0, 0, 810, 1755));
    }

    #[test]
    fn floating_main_windows_stay_bounded_and_reachable() {
        let mut f = Fixture::new();
        let mut policy = cascade(phone());
        policy.launch(&mut f.ctx());
        let requests = [
            Rect::new(-5000, -5000, 9000, 9000),
            Rect::new(4000, 100, 300, 300),
            Rect::new(10, 3000, 10, 10),
            Rect::new(-900, 2300, 2000, 100),
        ];
        for (i, request) in requests.into_iter().enumerate() {
            let id = f.insert(i as u32 + 1, WindowType::AppMainWindow, WindowMode::Floating);
            f.nodes[id].property.set_request_rect(request);
            policy.add_window_node(&mut f.ctx(), id);
            let rect = f.rect(id);
            assert!(rect.width <= 2560 && rect.height <= 2560, "{rect}");
            assert!(policy.base().limit_rect.intersects(&rect), "{rect}");
        }
    }

    #[test]
    fn status_bar_shrinks_limit_for_avoiding_windows() {
        let mut f = Fixture::new();
        let mut policy = cascade(phone());
        policy.launch(&mut f.ctx());
        let bar = f.insert(1, WindowType::StatusBar, WindowMode::Floating);
        f.nodes[bar].property.set_request_rect(Rect::new(0, 0, 1080, 100));
        policy.add_window_node(&mut f.ctx(), bar);
        assert_eq!(policy.base().limit_rect, Rect::new(0, 100, 1080, 2240));

        let avoiding = f.insert(2, WindowType::AppMainWindow, WindowMode::Fullscreen);
        f.nodes[avoiding].property.add_flag(WindowFlags::NEED_AVOID);
        policy.add_window_node(&mut f.ctx(), avoiding);
        assert_eq!(f.rect(avoiding), Rect::new(0, 100, 1080, 2240));

        let immersive = f.insert(3, WindowType::AppMainWindow, WindowMode::Fullscreen);
        policy.add_window_node(&mut f.ctx(), immersive);
        assert_eq!(f.rect(immersive), Rect::new(0, 0, 1080, 2340));
    }

    #[test]
    fn decoration_is_added_once() {
        let mut f = Fixture::new();
        let mut policy = cascade(phone());
        let id = f.insert(1, WindowType::AppMainWindow, WindowMode::Floating);
        f.nodes[id].property.set_decor_enable(true);
        f.nodes[id].property.set_request_rect(Rect::new(100, 100, 400, 500));
        policy.add_window_node(&mut f.ctx(), id);
        assert_eq!(f.rect(id), Rect::new(100, 100, 410, 542));

        policy.update_window_node(&mut f.ctx(), id, false);
        assert_eq!(f.rect(id), Rect::new(100, 100, 410, 542));
    }

    #[test]
    fn drag_reason_is_sent_once() {
        let mut f = Fixture::new();
        let mut policy = cascade(phone());
        let id = f.insert(1, WindowType::AppMainWindow, WindowMode::Floating);
        f.nodes[id].property.set_request_rect(Rect::new(100, 100, 400, 500));
        f.nodes[id].size_change_reason = WindowSizeChangeReason::Drag;
        policy.add_window_node(&mut f.ctx(), id);
        assert_eq!(f.nodes[id].size_change_reason, WindowSizeChangeReason::Undefined);
    }

    #[test]
    fn unchanged_drag_does_not_leak_into_the_next_layout() {
        let mut f = Fixture::new();
        let mut policy = cascade(phone());
        let id = f.insert(1, WindowType::AppMainWindow, WindowMode::Floating);
        let client = Arc::new(RecordingWindowAgent::default());
        f.nodes[id].client = Some(client.clone());
        f.nodes[id].property.set_request_rect(Rect::new(100, 100, 400, 500));
        policy.add_window_node(&mut f.ctx(), id);
        client.take_events();

        f.nodes[id].size_change_reason = WindowSizeChangeReason::Drag;
        policy.update_window_node(&mut f.ctx(), id, false);
        assert!(client.take_events().is_empty());
        assert_eq!(f.nodes[id].size_change_reason, WindowSizeChangeReason::Undefined);

        f.nodes[id].property.set_request_rect(Rect::new(150, 100, 400, 500));
        policy.update_window_node(&mut f.ctx(), id, false);
        assert_eq!(
            client.take_events(),
            vec![ClientEvent::Rect(
                Rect::new(150, 100, 400, 500),
                false,
                WindowSizeChangeReason::Undefined
            )]
        );
    }

    #[test]
    fn parent_limited_sub_window_fits_inside_parent() {
        let mut f = Fixture::new();
        let mut policy = cascade(phone());
        let parent = f.insert(1, WindowType::AppMainWindow, WindowMode::Floating);
        f.nodes[parent].property.set_request_rect(Rect::new(100, 200, 600, 800));
        let child = f.insert_child(2, parent, WindowType::AppSubWindow);
        f.nodes[child].property.add_flag(WindowFlags::PARENT_LIMIT);
        f.nodes[child].property.set_request_rect(Rect::new(0, 0, 2000, 300));
        policy.layout_window_tree(&mut f.ctx());
        assert_eq!(f.rect(child), Rect::new(100, 200, 600, 300));
    }

    #[test]
    fn reorder_floats_and_steps_main_windows() {
        let mut f = Fixture::new();
        let mut policy = cascade(phone());
        policy.launch(&mut f.ctx());
        let a = f.insert(1, WindowType::AppMainWindow, WindowMode::Fullscreen);
        let b = f.insert(2, WindowType::AppMainWindow, WindowMode::Fullscreen);
        let pinned = f.insert(3, WindowType::AppMainWindow, WindowMode::Fullscreen);
        f.nodes[pinned].property.set_mode_support(WindowModeSupport::FULLSCREEN);

        policy.reorder(&mut f.ctx());
        assert_eq!(f.nodes[a].mode(), WindowMode::Floating);
        assert_eq!(f.rect(a), Rect::new(135, 292, 810, 1755));
        assert_eq!(f.rect(b), Rect::new(172, 329, 810, 1755));
        assert_eq!(
            f.pending.minimized().collect::<Vec<_>>(),
            vec![(pinned, MinimizeReason::LayoutCascade)]
        );
    }
}

mod split_rects {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn portrait_display_splits_top_and_bottom() {
        let policy = cascade(phone());
        let split = policy.base().split;
        assert_eq!(split.divider, Rect::new(0, 1166, 1080, 8));
        assert_eq!(split.primary, Rect::new(0, 0, 1080, 1166));
        assert_eq!(split.secondary, Rect::new(0, 1174, 1080, 1166));
    }

    #[test]
    fn landscape_display_splits_left_and_right() {
        let policy = cascade(DisplayInfo::new(DisplayId::DEFAULT, 2340, 1080, 1.0));
        let split = policy.base().split;
        assert_eq!(split.divider, Rect::new(1166, 0, 8, 1080));
        assert_eq!(split.primary, Rect::new(0, 0, 1166, 1080));
        assert_eq!(split.secondary, Rect::new(1174, 0, 1166, 1080));
    }

    #[test]
    fn divider_keeps_minimum_split_width() {
        let policy = cascade(DisplayInfo::new(DisplayId::DEFAULT, 2340, 1080, 1.0));
        let mut left = Rect::new(10, 0, 8, 1080);
        policy.base().limit_divider_move_bounds(&mut left);
        assert_eq!(left.x, 320);
        let mut right = Rect::new(2330, 0, 8, 1080);
        policy.base().limit_divider_move_bounds(&mut right);
        assert_eq!(right.x, 2012);
        assert_eq!(policy.base().exit_split_points(&right), (320, 2012));
    }

    #[test]
    fn split_windows_follow_the_divider() {
        let mut f = Fixture::new();
        let mut policy = cascade(phone());
        let primary = f.insert(1, WindowType::AppMainWindow, WindowMode::SplitPrimary);
        let secondary = f.insert(2, WindowType::AppMainWindow, WindowMode::SplitSecondary);
        let divider = f.insert(3, WindowType::DockSlice, WindowMode::Floating);
        for id in [primary, secondary, divider] {
            f.pair.update_if_split_related(&mut f.nodes, &mut f.pending, id);
        }
        f.nodes[divider].property.set_request_rect(Rect::new(0, 1000, 1080, 8));
        policy.update_window_node(&mut f.ctx(), divider, false);
        assert_eq!(f.rect(primary), Rect::new(0, 0, 1080, 1000));
        assert_eq!(f.rect(secondary), Rect::new(0, 1008, 1080, 1332));
        assert_eq!(f.rect(divider), Rect::new(0, 1000, 1080, 8));
    }
}

mod tile_layout {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn capacity_follows_limit_width() {
        assert_eq!(tile(tablet()).max_tile_num(), 3);
        assert_eq!(tile(phone()).max_tile_num(), 2);
    }

    #[test]
    fn fourth_window_evicts_the_oldest() {
        let mut f = Fixture::new();
        let mut policy = tile(tablet());
        policy.launch(&mut f.ctx());
        for id in 1..=4 {
            let id = f.insert(id, WindowType::AppMainWindow, WindowMode::Fullscreen);
            policy.add_window_node(&mut f.ctx(), id);
        }
        assert_eq!(policy.foreground().collect::<Vec<_>>(), vec![w(2), w(3), w(4)]);
        assert_eq!(
            f.pending.minimized().collect::<Vec<_>>(),
            vec![(w(1), MinimizeReason::LayoutTile)]
        );
        let slots = policy.preset_rects(3).unwrap().to_vec();
        assert_eq!(slots[0], Rect::new(48, 100, 378, 600));
        for (id, slot) in [w(2), w(3), w(4)].into_iter().zip(slots) {
            assert_eq!(f.rect(id), slot);
            assert_eq!(f.nodes[id].mode(), WindowMode::Floating);
        }
    }

    #[test]
    fn queue_never_exceeds_capacity() {
        let mut f = Fixture::new();
        let mut policy = tile(tablet());
        policy.launch(&mut f.ctx());
        for id in 1..=8 {
            let id = f.insert(id, WindowType::AppMainWindow, WindowMode::Floating);
            policy.add_window_node(&mut f.ctx(), id);
            assert!(policy.foreground().count() <= policy.max_tile_num());
            if id.0 % 3 == 0 {
                policy.remove_window_node(&mut f.ctx(), id);
                f.roots.app.retain(|a| *a != id);
                assert!(policy.foreground().count() <= policy.max_tile_num());
            }
        }
    }

    #[test]
    fn window_that_cannot_float_is_refused() {
        let mut f = Fixture::new();
        let mut policy = tile(tablet());
        let id = f.insert(1, WindowType::AppMainWindow, WindowMode::Fullscreen);
        f.nodes[id].property.set_mode_support(WindowModeSupport::FULLSCREEN);
        policy.add_window_node(&mut f.ctx(), id);
        assert_eq!(policy.foreground().count(), 0);
        assert_eq!(f.pending.minimized().count(), 1);
    }

    #[test]
    fn slot_that_violates_size_limits_minimizes_the_window() {
        let mut f = Fixture::new();
        let mut policy = tile(tablet());
        let wide = f.insert(1, WindowType::AppMainWindow, WindowMode::Floating);
        f.nodes[wide].property.set_size_limits(SizeLimits {
            min_width: 700,
            ..SizeLimits::default()
        });
        policy.add_window_node(&mut f.ctx(), wide);
        assert_eq!(f.rect(wide).width, 960);

        let other = f.insert(2, WindowType::AppMainWindow, WindowMode::Floating);
        policy.add_window_node(&mut f.ctx(), other);
        assert_eq!(policy.foreground().collect::<Vec<_>>(), vec![other]);
        assert_eq!(
            f.pending.minimized().collect::<Vec<_>>(),
            vec![(wide, MinimizeReason::LayoutTile)]
        );
        assert_eq!(f.rect(other), Rect::new(160, 100, 960, 600));
    }

    #[test]
    fn narrower_display_trims_the_queue() {
        let mut f = Fixture::new();
        let mut policy = tile(tablet());
        for id in 1..=3 {
            let id = f.insert(id, WindowType::AppMainWindow, WindowMode::Floating);
            policy.add_window_node(&mut f.ctx(), id);
        }
        policy.update_display(&mut f.ctx(), DisplayInfo::new(DisplayId::DEFAULT, 800, 1280, 1.0));
        assert_eq!(policy.max_tile_num(), 2);
        assert_eq!(policy.foreground().collect::<Vec<_>>(), vec![w(2), w(3)]);
    }
}
