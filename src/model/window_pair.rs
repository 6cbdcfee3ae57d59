//! Split-screen pairing of one primary, one secondary and one divider window
//! on a display. The pair only references nodes; the container owns them.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::pending::{PendingActions, SplitBroadcast};
use crate::model::types::{DisplayId, MinimizeReason, WindowFlags, WindowId, WindowMode, WindowType};
use crate::model::window_node::WindowNodeMap;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, strum_macros::Display)]
pub enum WindowPairStatus {
    #[default]
    Empty,
    SinglePrimary,
    SingleSecondary,
    PrimaryAndSecondary,
    PrimaryAndDivider,
    SecondaryAndDivider,
    SingleSplit,
    PairedDone,
}

impl WindowPairStatus {
    fn derive(primary: bool, secondary: bool, divider: bool) -> Self {
        match (primary, secondary, divider) {
            (false, false, false) => WindowPairStatus::Empty,
            (true, false, false) => WindowPairStatus::SinglePrimary,
            (false, true, false) => WindowPairStatus::SingleSecondary,
            (true, true, false) => WindowPairStatus::PrimaryAndSecondary,
            (true, false, true) => WindowPairStatus::PrimaryAndDivider,
            (false, true, true) => WindowPairStatus::SecondaryAndDivider,
            (false, false, true) => WindowPairStatus::SingleSplit,
            (true, true, true) => WindowPairStatus::PairedDone,
        }
    }

    /// States a pair can never rest in: a divider without both halves.
    pub fn is_abnormal(self) -> bool {
        matches!(
            self,
            WindowPairStatus::SingleSplit
                | WindowPairStatus::PrimaryAndDivider
                | WindowPairStatus::SecondaryAndDivider
        )
    }

    pub fn is_paired(self) -> bool {
        matches!(self, WindowPairStatus::PrimaryAndSecondary | WindowPairStatus::PairedDone)
    }
}

#[derive(Debug)]
pub struct WindowPair {
    display: DisplayId,
    primary: Option<WindowId>,
    secondary: Option<WindowId>,
    divider: Option<WindowId>,
    status: WindowPairStatus,
}

fn is_split_related(nodes: &WindowNodeMap, id: WindowId) -> bool {
    nodes
        .get(id)
        .is_some_and(|n| n.is_split_mode() || n.window_type() == WindowType::DockSlice)
}

impl WindowPair {
    pub fn new(display: DisplayId) -> Self {
        WindowPair {
            display,
            primary: None,
            secondary: None,
            divider: None,
            status: WindowPairStatus::Empty,
        }
    }

    pub fn status(&self) -> WindowPairStatus { self.status }

    pub fn primary(&self) -> Option<WindowId> { self.primary }

    pub fn secondary(&self) -> Option<WindowId> { self.secondary }

    pub fn divider(&self) -> Option<WindowId> { self.divider }

    pub fn is_paired(&self) -> bool { self.status.is_paired() }

    pub fn find(&self, id: WindowId) -> bool {
        [self.primary, self.secondary, self.divider].contains(&Some(id))
    }

    /// The divider may not be dragged while either half forbids it.
    pub fn is_forbid_divider_move(&self, nodes: &WindowNodeMap) -> bool {
        [self.primary, self.secondary]
            .into_iter()
            .flatten()
            .filter_map(|id| nodes.get(id))
            .any(|n| n.has_flag(WindowFlags::FORBID_SPLIT_MOVE))
    }

    pub fn update_if_split_related(
        &mut self,
        nodes: &mut WindowNodeMap,
        pending: &mut PendingActions,
        id: WindowId,
    ) {
        let Some(node) = nodes.get(id) else { return };
        if !self.find(id) && !is_split_related(nodes, id) {
            return;
        }
        let (ty, mode) = (node.window_type(), node.mode());
        debug!(window_id = %id, %mode, status = %self.status, "update split pair");

        if ty == WindowType::Placeholder {
            let occupied = [self.primary, self.secondary]
                .into_iter()
                .flatten()
                .filter_map(|slot| nodes.get(slot))
                .any(|n| n.mode() == mode);
            if occupied {
                pending.broadcast(SplitBroadcast::DestroyPlaceholder { display: self.display });
            }
            return;
        }

        if ty == WindowType::LauncherRecent && mode.is_split() {
            let compatible = matches!(
                (self.status, mode),
                (WindowPairStatus::SinglePrimary, WindowMode::SplitSecondary)
                    | (WindowPairStatus::SingleSecondary, WindowMode::SplitPrimary)
            );
            if !compatible {
                self.clear(nodes, pending);
            }
            return;
        }

        if self.status == WindowPairStatus::Empty && mode.is_split() {
            self.insert(nodes, pending, id);
            if let Some(opposite) = mode.split_opposite() {
                pending.broadcast(SplitBroadcast::CreatePlaceholder {
                    display: self.display,
                    mode: opposite,
                });
            }
            pending.broadcast(SplitBroadcast::ShowRecent { display: self.display, window: id });
        } else if !self.find(id) {
            self.insert(nodes, pending, id);
        } else {
            self.handle_paired_nodes_change(nodes, pending);
        }
    }

    /// Puts the node into the slot matching its mode or type. A previous
    /// occupant of that slot is minimized so it stays resumable.
    pub fn insert(&mut self, nodes: &mut WindowNodeMap, pending: &mut PendingActions, id: WindowId) {
        let Some(node) = nodes.get(id) else { return };
        let slot = if node.window_type() == WindowType::DockSlice {
            &mut self.divider
        } else {
            match node.mode() {
                WindowMode::SplitPrimary => &mut self.primary,
                WindowMode::SplitSecondary => &mut self.secondary,
                _ => return,
            }
        };
        let replaced = slot.replace(id);
        if let Some(old) = replaced.filter(|old| *old != id) {
            info!(window_id = %old, by = %id, "split slot replaced");
            pending.minimize(old, MinimizeReason::SplitReplace);
        }
        self.update_status(nodes, pending);
    }

    /// Dissolves the pair. Split-only windows are minimized; every other
    /// member goes back to the mode it had before entering split.
    pub fn clear(&mut self, nodes: &mut WindowNodeMap, pending: &mut PendingActions) {
        info!(display_id = %self.display, status = %self.status, "clear split pair");
        for id in [self.primary.take(), self.secondary.take()].into_iter().flatten() {
            let Some(node) = nodes.get_mut(id) else { continue };
            if node.property.mode_support().is_split_only() {
                pending.minimize(id, MinimizeReason::SplitQuit);
            } else if node.is_split_mode() {
                let mode = node.property.resume_mode();
                node.property.set_mode(mode);
                node.notify_mode();
            }
        }
        self.divider = None;
        pending.broadcast(SplitBroadcast::DestroyDivider { display: self.display });
        pending.broadcast(SplitBroadcast::DestroyPlaceholder { display: self.display });
        self.status = WindowPairStatus::Empty;
    }

    pub fn handle_remove_window(
        &mut self,
        nodes: &mut WindowNodeMap,
        pending: &mut PendingActions,
        id: WindowId,
    ) {
        if !self.find(id) {
            // A split window that never got paired drops back to its old mode.
            if let Some(node) = nodes.get_mut(id).filter(|n| n.is_split_mode()) {
                let mode = node.property.resume_mode();
                node.property.set_mode(mode);
            }
            return;
        }
        if self.divider == Some(id) {
            self.divider = None;
        } else if self.primary == Some(id) {
            self.primary = None;
        } else {
            self.secondary = None;
        }
        self.clear(nodes, pending);
    }

    /// Minimizes the smaller half and dissolves the pair; called when the
    /// divider has been dragged to the edge of the display.
    pub fn exit_split_mode(&mut self, nodes: &mut WindowNodeMap, pending: &mut PendingActions) {
        let (Some(divider), Some(primary), Some(secondary)) =
            (self.divider, self.primary, self.secondary)
        else {
            return;
        };
        let rect_of = |id: WindowId| nodes.get(id).map(|n| n.rect());
        let (Some(divider_rect), Some(p), Some(s)) =
            (rect_of(divider), rect_of(primary), rect_of(secondary))
        else {
            return;
        };
        let primary_smaller = if divider_rect.width > divider_rect.height {
            p.height < s.height
        } else {
            p.width < s.width
        };
        let hide = if primary_smaller {
            self.primary.take()
        } else {
            self.secondary.take()
        };
        if let Some(hide) = hide {
            pending.minimize(hide, MinimizeReason::SplitQuit);
        }
        self.clear(nodes, pending);
    }

    /// The pair members in bottom-to-top z-order for raising `id`.
    pub fn ordered_pair(&self, nodes: &WindowNodeMap, id: WindowId) -> Vec<WindowId> {
        if !self.find(id) {
            return Vec::new();
        }
        let has_dialog = |slot: Option<WindowId>| {
            slot.and_then(|s| nodes.get(s)).is_some_and(|n| {
                n.children
                    .iter()
                    .filter_map(|c| nodes.get(*c))
                    .any(|c| c.window_type() == WindowType::Dialog)
            })
        };
        let order = if Some(id) == self.divider {
            if has_dialog(self.primary) {
                [self.secondary, self.divider, self.primary]
            } else if has_dialog(self.secondary) {
                [self.primary, self.divider, self.secondary]
            } else {
                [self.primary, self.secondary, self.divider]
            }
        } else if Some(id) == self.primary {
            [self.secondary, self.divider, self.primary]
        } else {
            [self.primary, self.divider, self.secondary]
        };
        order.into_iter().flatten().collect()
    }

    fn handle_paired_nodes_change(&mut self, nodes: &mut WindowNodeMap, pending: &mut PendingActions) {
        let mode_of = |slot: Option<WindowId>| slot.and_then(|id| nodes.get(id)).map(|n| n.mode());

        // Members that left split are no longer tracked.
        if mode_of(self.primary).is_some_and(|m| !m.is_split()) {
            self.primary = None;
        }
        if mode_of(self.secondary).is_some_and(|m| !m.is_split()) {
            self.secondary = None;
        }

        match (mode_of(self.primary), mode_of(self.secondary)) {
            (Some(WindowMode::SplitSecondary), Some(WindowMode::SplitPrimary)) => {
                std::mem::swap(&mut self.primary, &mut self.secondary);
            }
            (Some(WindowMode::SplitSecondary), None) => {
                self.secondary = self.primary.take();
            }
            (None, Some(WindowMode::SplitPrimary)) => {
                self.primary = self.secondary.take();
            }
            (Some(a), Some(b)) if a == b => self.switch_position(nodes, a),
            _ => {}
        }
        self.update_status(nodes, pending);
    }

    /// Both halves ended up in the same slot (one was dragged onto the
    /// other): the window already there moves to the opposite slot.
    fn switch_position(&mut self, nodes: &mut WindowNodeMap, mode: WindowMode) {
        let (stayed, opposite) = match mode {
            WindowMode::SplitPrimary => (self.primary, WindowMode::SplitSecondary),
            WindowMode::SplitSecondary => (self.secondary, WindowMode::SplitPrimary),
            _ => return,
        };
        if let Some(node) = stayed.and_then(|id| nodes.get_mut(id)) {
            node.property.set_mode(opposite);
            node.notify_mode();
        }
        std::mem::swap(&mut self.primary, &mut self.secondary);
        debug!(display_id = %self.display, "switched split positions");
    }

    fn update_status(&mut self, nodes: &mut WindowNodeMap, pending: &mut PendingActions) {
        let prev = self.status;
        self.status = WindowPairStatus::derive(
            self.primary.is_some(),
            self.secondary.is_some(),
            self.divider.is_some(),
        );
        debug!(display_id = %self.display, %prev, status = %self.status, "pair status");
        if self.status == WindowPairStatus::PrimaryAndSecondary
            && prev != WindowPairStatus::PrimaryAndSecondary
            && prev != WindowPairStatus::PairedDone
        {
            pending.broadcast(SplitBroadcast::CreateDivider { display: self.display });
        }
        if self.status.is_abnormal() || (prev.is_paired() && !self.status.is_paired()) {
            self.clear(nodes, pending);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::types::WindowModeSupport;
    use crate::model::window_node::{ParentRef, test_node};

    fn setup(specs: &[(u32, WindowType, WindowMode)]) -> WindowNodeMap {
        let mut nodes = WindowNodeMap::new();
        for (id, ty, mode) in specs {
            nodes.insert(test_node(*id, *ty, *mode));
        }
        nodes
    }

    fn create_divider_count(pending: &PendingActions) -> usize {
        pending
            .broadcasts()
            .filter(|b| matches!(b, SplitBroadcast::CreateDivider { .. }))
            .count()
    }

    #[test]
    fn pairing_two_windows_creates_divider_once() {
        let mut nodes = setup(&[
            (1, WindowType::AppMainWindow, WindowMode::SplitPrimary),
            (2, WindowType::AppMainWindow, WindowMode::SplitSecondary),
            (3, WindowType::DockSlice, WindowMode::Floating),
        ]);
        let mut pending = PendingActions::new();
        let mut pair = WindowPair::new(DisplayId::DEFAULT);

        pair.update_if_split_related(&mut nodes, &mut pending, WindowId(1));
        assert_eq!(pair.status(), WindowPairStatus::SinglePrimary);
        assert!(pending.broadcasts().any(|b| b
            == SplitBroadcast::CreatePlaceholder {
                display: DisplayId::DEFAULT,
                mode: WindowMode::SplitSecondary
            }));
        assert_eq!(create_divider_count(&pending), 0);

        pair.update_if_split_related(&mut nodes, &mut pending, WindowId(2));
        assert_eq!(pair.status(), WindowPairStatus::PrimaryAndSecondary);
        assert_eq!(create_divider_count(&pending), 1);

        pair.update_if_split_related(&mut nodes, &mut pending, WindowId(2));
        pair.update_if_split_related(&mut nodes, &mut pending, WindowId(3));
        assert_eq!(pair.status(), WindowPairStatus::PairedDone);
        assert_eq!(create_divider_count(&pending), 1);
    }

    #[test]
    fn unrelated_windows_are_ignored() {
        let mut nodes = setup(&[(1, WindowType::AppMainWindow, WindowMode::Fullscreen)]);
        let mut pending = PendingActions::new();
        let mut pair = WindowPair::new(DisplayId::DEFAULT);
        pair.update_if_split_related(&mut nodes, &mut pending, WindowId(1));
        assert_eq!(pair.status(), WindowPairStatus::Empty);
        assert!(pending.is_empty());
    }

    #[test]
    fn divider_alone_is_abnormal_and_clears() {
        let mut nodes = setup(&[(3, WindowType::DockSlice, WindowMode::Floating)]);
        let mut pending = PendingActions::new();
        let mut pair = WindowPair::new(DisplayId::DEFAULT);
        pair.insert(&mut nodes, &mut pending, WindowId(3));
        assert_eq!(pair.status(), WindowPairStatus::Empty);
        assert_eq!(pair.divider(), None);
        assert!(pending.broadcasts().any(|b| matches!(b, SplitBroadcast::DestroyDivider { .. })));
    }

    #[test]
    fn replacing_a_slot_minimizes_the_old_occupant() {
        let mut nodes = setup(&[
            (1, WindowType::AppMainWindow, WindowMode::SplitPrimary),
            (2, WindowType::AppMainWindow, WindowMode::SplitPrimary),
        ]);
        let mut pending = PendingActions::new();
        let mut pair = WindowPair::new(DisplayId::DEFAULT);
        pair.insert(&mut nodes, &mut pending, WindowId(1));
        pair.insert(&mut nodes, &mut pending, WindowId(2));
        assert_eq!(pair.primary(), Some(WindowId(2)));
        assert_eq!(
            pending.minimized().collect::<Vec<_>>(),
            vec![(WindowId(1), MinimizeReason::SplitReplace)]
        );
    }

    #[test]
    fn clear_restores_previous_modes_or_minimizes_split_only_windows() {
        let mut nodes = setup(&[
            (1, WindowType::AppMainWindow, WindowMode::Floating),
            (2, WindowType::AppMainWindow, WindowMode::Fullscreen),
        ]);
        nodes[WindowId(1)].property.set_mode(WindowMode::SplitPrimary);
        nodes[WindowId(2)]
            .property
            .set_mode_support(WindowModeSupport::SPLIT_PRIMARY | WindowModeSupport::SPLIT_SECONDARY);
        nodes[WindowId(2)].property.set_mode(WindowMode::SplitSecondary);

        let mut pending = PendingActions::new();
        let mut pair = WindowPair::new(DisplayId::DEFAULT);
        pair.insert(&mut nodes, &mut pending, WindowId(1));
        pair.insert(&mut nodes, &mut pending, WindowId(2));
        pair.clear(&mut nodes, &mut pending);

        assert_eq!(pair.status(), WindowPairStatus::Empty);
        assert_eq!(nodes[WindowId(1)].mode(), WindowMode::Floating);
        assert_eq!(
            pending.minimized().collect::<Vec<_>>(),
            vec![(WindowId(2), MinimizeReason::SplitQuit)]
        );
    }

    #[test]
    fn dragging_onto_the_same_slot_switches_positions() {
        let mut nodes = setup(&[
            (1, WindowType::AppMainWindow, WindowMode::SplitPrimary),
            (2, WindowType::AppMainWindow, WindowMode::SplitSecondary),
        ]);
        let mut pending = PendingActions::new();
        let mut pair = WindowPair::new(DisplayId::DEFAULT);
        pair.update_if_split_related(&mut nodes, &mut pending, WindowId(1));
        pair.update_if_split_related(&mut nodes, &mut pending, WindowId(2));

        nodes[WindowId(2)].property.set_mode(WindowMode::SplitPrimary);
        pair.update_if_split_related(&mut nodes, &mut pending, WindowId(2));

        assert_eq!(pair.primary(), Some(WindowId(2)));
        assert_eq!(pair.secondary(), Some(WindowId(1)));
        assert_eq!(nodes[WindowId(1)].mode(), WindowMode::SplitSecondary);
        assert_eq!(pair.status(), WindowPairStatus::PrimaryAndSecondary);
    }

    #[test]
    fn leaving_split_dissolves_a_pair() {
        let mut nodes = setup(&[
            (1, WindowType::AppMainWindow, WindowMode::SplitPrimary),
            (2, WindowType::AppMainWindow, WindowMode::SplitSecondary),
        ]);
        let mut pending = PendingActions::new();
        let mut pair = WindowPair::new(DisplayId::DEFAULT);
        pair.update_if_split_related(&mut nodes, &mut pending, WindowId(1));
        pair.update_if_split_related(&mut nodes, &mut pending, WindowId(2));

        nodes[WindowId(1)].property.set_mode(WindowMode::Fullscreen);
        pair.update_if_split_related(&mut nodes, &mut pending, WindowId(1));
        assert_eq!(pair.status(), WindowPairStatus::Empty);
        assert_eq!(nodes[WindowId(2)].mode(), WindowMode::Fullscreen);
    }

    #[test]
    fn recent_window_only_fills_the_compatible_slot() {
        let mut nodes = setup(&[
            (1, WindowType::AppMainWindow, WindowMode::SplitPrimary),
            (5, WindowType::LauncherRecent, WindowMode::SplitSecondary),
            (6, WindowType::LauncherRecent, WindowMode::SplitPrimary),
        ]);
        let mut pending = PendingActions::new();
        let mut pair = WindowPair::new(DisplayId::DEFAULT);
        pair.update_if_split_related(&mut nodes, &mut pending, WindowId(1));
        pair.update_if_split_related(&mut nodes, &mut pending, WindowId(5));
        assert_eq!(pair.status(), WindowPairStatus::SinglePrimary);

        pair.update_if_split_related(&mut nodes, &mut pending, WindowId(6));
        assert_eq!(pair.status(), WindowPairStatus::Empty);
    }

    #[test]
    fn placeholder_for_an_occupied_slot_is_destroyed() {
        let mut nodes = setup(&[
            (1, WindowType::AppMainWindow, WindowMode::SplitPrimary),
            (7, WindowType::Placeholder, WindowMode::SplitPrimary),
        ]);
        let mut pending = PendingActions::new();
        let mut pair = WindowPair::new(DisplayId::DEFAULT);
        pair.update_if_split_related(&mut nodes, &mut pending, WindowId(1));
        pending.take();
        pair.update_if_split_related(&mut nodes, &mut pending, WindowId(7));
        assert_eq!(
            pending.broadcasts().collect::<Vec<_>>(),
            vec![SplitBroadcast::DestroyPlaceholder { display: DisplayId::DEFAULT }]
        );
        assert!(!pair.find(WindowId(7)));
    }

    #[test]
    fn ordered_pair_keeps_dialog_owner_on_top() {
        let mut nodes = setup(&[
            (1, WindowType::AppMainWindow, WindowMode::SplitPrimary),
            (2, WindowType::AppMainWindow, WindowMode::SplitSecondary),
            (3, WindowType::DockSlice, WindowMode::Floating),
            (4, WindowType::Dialog, WindowMode::Floating),
        ]);
        nodes[WindowId(4)].parent = Some(ParentRef::Window(WindowId(1)));
        nodes[WindowId(1)].children.push(WindowId(4));
        let mut pending = PendingActions::new();
        let mut pair = WindowPair::new(DisplayId::DEFAULT);
        for id in [1, 2, 3] {
            pair.update_if_split_related(&mut nodes, &mut pending, WindowId(id));
        }
        assert_eq!(
            pair.ordered_pair(&nodes, WindowId(3)),
            vec![WindowId(2), WindowId(3), WindowId(1)]
        );
        assert_eq!(
            pair.ordered_pair(&nodes, WindowId(2)),
            vec![WindowId(1), WindowId(3), WindowId(2)]
        );
    }

    #[test]
    fn status_always_matches_slots() {
        let mut nodes = setup(&[
            (1, WindowType::AppMainWindow, WindowMode::SplitPrimary),
            (2, WindowType::AppMainWindow, WindowMode::SplitSecondary),
            (3, WindowType::DockSlice, WindowMode::Floating),
        ]);
        let mut pending = PendingActions::new();
        let mut pair = WindowPair::new(DisplayId::DEFAULT);
        let ops: &[u32] = &[3, 1, 2, 3, 1, 0, 2, 3, 1, 0, 0];
        for op in ops {
            if *op == 0 {
                pair.clear(&mut nodes, &mut pending);
                for (id, mode) in [(1, WindowMode::SplitPrimary), (2, WindowMode::SplitSecondary)] {
                    nodes[WindowId(id)].property.set_mode(mode);
                }
            } else {
                pair.insert(&mut nodes, &mut pending, WindowId(*op));
            }
            let expected = WindowPairStatus::derive(
                pair.primary().is_some(),
                pair.secondary().is_some(),
                pair.divider().is_some(),
            );
            assert_eq!(pair.status(), expected);
            assert_eq!(
                pair.status() == WindowPairStatus::PairedDone,
                pair.primary().is_some() && pair.secondary().is_some() && pair.divider().is_some()
            );
        }
    }
}
