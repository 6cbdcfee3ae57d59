use enum_dispatch::enum_dispatch;
use tracing::{debug, trace};

use crate::common::config::LayoutSettings;
use crate::layout_engine::{CascadePolicy, TilePolicy};
use crate::model::pending::PendingActions;
use crate::model::types::{
    AvoidPos, WindowFlags, WindowId, WindowLayoutMode, WindowMode, WindowSizeChangeReason,
    WindowType,
};
use crate::model::window_node::{RootKind, WindowNode, WindowNodeMap, WindowRoots};
use crate::model::window_pair::WindowPair;
use crate::sys::display::DisplayInfo;
use crate::sys::geometry::{Rect, vp};

/// Everything a policy may read or touch while laying out one display.
pub struct LayoutContext<'a> {
    pub nodes: &'a mut WindowNodeMap,
    pub roots: &'a WindowRoots,
    pub pair: &'a WindowPair,
    pub pending: &'a mut PendingActions,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SplitRects {
    pub primary: Rect,
    pub secondary: Rect,
    pub divider: Rect,
}

/// Display geometry and the rect math shared by every policy.
#[derive(Debug, Clone)]
pub struct LayoutBase {
    pub settings: LayoutSettings,
    pub display: DisplayInfo,
    /// Display rect minus the visible system bars, refreshed on every full
    /// tree layout.
    pub limit_rect: Rect,
    pub split: SplitRects,
}

impl LayoutBase {
    pub fn new(settings: LayoutSettings, display: DisplayInfo) -> Self {
        let limit_rect = display.rect;
        let mut base = LayoutBase {
            settings,
            display,
            limit_rect,
            split: SplitRects::default(),
        };
        base.init_split_rects();
        base
    }

    pub fn vpr(&self) -> f32 { self.display.virtual_pixel_ratio }

    pub fn display_rect(&self) -> Rect { self.display.rect }

    fn is_vertical_display(&self) -> bool { self.display.rect.is_vertical() }

    pub fn title_bar_height(&self) -> u32 { vp(self.settings.title_bar_height, self.vpr()) }

    /// Places the divider at the configured ratio across the display.
    pub fn init_split_rects(&mut self) {
        let display = self.display_rect();
        let divider_w = vp(self.settings.divider_width, self.vpr());
        let ratio = self.settings.split_ratio;
        let divider = if self.is_vertical_display() {
            let y = (display.height.saturating_sub(divider_w) as f32 * ratio) as i32;
            Rect::new(display.x, display.y + y, display.width, divider_w)
        } else {
            let x = (display.width.saturating_sub(divider_w) as f32 * ratio) as i32;
            Rect::new(display.x + x, display.y, divider_w, display.height)
        };
        self.set_split_rect(divider);
    }

    /// Cuts the display in two along the divider.
    pub fn set_split_rect(&mut self, divider: Rect) {
        let display = self.display_rect();
        self.split.divider = divider;
        if self.is_vertical_display() {
            let primary_h = (divider.y - display.y).max(0) as u32;
            let secondary_y = divider.bottom();
            self.split.primary = Rect::new(display.x, display.y, display.width, primary_h);
            self.split.secondary = Rect::new(
                display.x,
                secondary_y,
                display.width,
                (display.bottom() - secondary_y).max(0) as u32,
            );
        } else {
            let primary_w = (divider.x - display.x).max(0) as u32;
            let secondary_x = divider.right();
            self.split.primary = Rect::new(display.x, display.y, primary_w, display.height);
            self.split.secondary = Rect::new(
                secondary_x,
                display.y,
                (display.right() - secondary_x).max(0) as u32,
                display.height,
            );
        }
        debug!(
            divider = %self.split.divider,
            primary = %self.split.primary,
            secondary = %self.split.secondary,
            "split rects"
        );
    }

    /// Keeps at least the minimum split size on both sides of the divider.
    pub fn limit_divider_move_bounds(&self, rect: &mut Rect) {
        let limit = self.limit_rect;
        let vpr = self.vpr();
        if rect.width < rect.height {
            let min = vp(self.settings.min_split_width, vpr) as i32;
            let lo = limit.x + min;
            let hi = limit.right() - min - rect.width as i32;
            rect.x = rect.x.min(hi).max(lo);
        } else {
            let min = vp(self.settings.min_split_height, vpr) as i32;
            let lo = limit.y + min;
            let hi = limit.bottom() - min - rect.height as i32;
            rect.y = rect.y.min(hi).max(lo);
        }
    }

    /// The clamp edges for the divider's leading coordinate; reaching either
    /// on release exits split mode.
    pub fn exit_split_points(&self, divider: &Rect) -> (i32, i32) {
        let limit = self.limit_rect;
        let vpr = self.vpr();
        if divider.width < divider.height {
            let min = vp(self.settings.min_split_width, vpr) as i32;
            (limit.x + min, limit.right() - min - divider.width as i32)
        } else {
            let min = vp(self.settings.min_split_height, vpr) as i32;
            (limit.y + min, limit.bottom() - min - divider.height as i32)
        }
    }

    fn display_rect_for(&self, mode: WindowMode) -> Rect {
        match mode {
            WindowMode::SplitPrimary => self.split.primary,
            WindowMode::SplitSecondary => self.split.secondary,
            _ => self.display_rect(),
        }
    }

    fn limit_rect_for(&self, mode: WindowMode) -> Rect {
        match mode {
            WindowMode::SplitPrimary => self.split.primary.intersection(&self.limit_rect),
            WindowMode::SplitSecondary => self.split.secondary.intersection(&self.limit_rect),
            _ => self.limit_rect,
        }
    }

    /// Shrinks the limit rect by a visible status or navigation bar on the
    /// display edge it spans.
    fn update_limit_rect(&mut self, node: &WindowNode) {
        if !matches!(node.window_type(), WindowType::StatusBar | WindowType::NavigationBar) {
            return;
        }
        let bar = node.rect();
        let limit = &mut self.limit_rect;
        let (mut x, mut y) = (i64::from(limit.x), i64::from(limit.y));
        let (mut w, mut h) = (i64::from(limit.width), i64::from(limit.height));
        match AvoidPos::of(&bar, &self.display.rect) {
            Some(AvoidPos::Top) => {
                let offset = i64::from(bar.bottom()) - y;
                y += offset;
                h -= offset;
            }
            Some(AvoidPos::Bottom) => h -= y + h - i64::from(bar.y),
            Some(AvoidPos::Left) => {
                let offset = i64::from(bar.right()) - x;
                x += offset;
                w -= offset;
            }
            Some(AvoidPos::Right) => w -= x + w - i64::from(bar.x),
            None => return,
        }
        *limit = Rect::new(x as i32, y as i32, w.max(0) as u32, h.max(0) as u32);
        trace!(limit = %self.limit_rect, bar = %node.id, "limit rect");
    }

    /// Adds the title bar and frame to a decorated window's requested
    /// content rect, once.
    pub fn compute_decorated_request_rect(&self, node: &mut WindowNode) {
        if !node.property.decor_enable()
            || node.has_decorated
            || node.size_change_reason == WindowSizeChangeReason::Move
        {
            return;
        }
        let frame = vp(self.settings.frame_width, self.vpr());
        let title = self.title_bar_height();
        let orig = node.request_rect();
        node.property.set_request_rect(Rect::new(
            orig.x,
            orig.y,
            orig.width + 2 * frame,
            orig.height + title + frame,
        ));
        node.has_decorated = true;
    }

    pub fn limit_floating_window_size(&self, node: &WindowNode, display: &Rect, rect: &mut Rect) {
        if node.mode() != WindowMode::Floating {
            return;
        }
        let vpr = self.vpr();
        let ty = node.window_type();
        if ty.is_main_window() || ty.is_sub_window() {
            let min_w = vp(self.settings.min_floating_width, vpr);
            let min_h = vp(self.settings.min_floating_height, vpr);
            let (min_w, min_h) = if display.is_vertical() { (min_w, min_h) } else { (min_h, min_w) };
            rect.width = rect.width.max(min_w);
            rect.height = rect.height.max(min_h);
            node.property.size_limits().clamp(rect);
        }
        let max = vp(self.settings.max_floating_size, vpr);
        rect.width = rect.width.min(max);
        rect.height = rect.height.min(max);
    }

    /// Keeps at least a title bar's worth of a floating main window inside
    /// the limit rect.
    pub fn limit_main_floating_window_position(&self, node: &WindowNode, rect: &mut Rect) {
        if !(node.window_type().is_main_window() && node.mode() == WindowMode::Floating) {
            return;
        }
        let limit = self.limit_rect;
        let title = i64::from(self.title_bar_height());
        let (lx, ly) = (i64::from(limit.x), i64::from(limit.y));
        let (lw, lh) = (i64::from(limit.width), i64::from(limit.height));
        let mut x = i64::from(rect.x);
        let mut y = i64::from(rect.y);
        y = y.max(ly).min(ly + lh - title);
        x = x.max(lx + title - i64::from(rect.width)).min(lx + lw - title);
        rect.x = x as i32;
        rect.y = y as i32;
    }

    /// Computes and applies one node's rect, notifying the client when it
    /// changed. Divider rects always go out.
    pub fn update_layout_rect(&self, nodes: &mut WindowNodeMap, id: WindowId) {
        let parent_rect = nodes
            .get(id)
            .and_then(|n| n.parent_window())
            .and_then(|p| nodes.get(p))
            .map(|p| p.rect());
        let Some(node) = nodes.get_mut(id) else { return };

        let ty = node.window_type();
        let mode = node.mode();
        let last = node.rect();
        let mut rect = if ty == WindowType::DockSlice {
            self.split.divider
        } else {
            self.compute_decorated_request_rect(node);
            let display = self.display_rect_for(mode);
            let limit = if node.has_flag(WindowFlags::NEED_AVOID) {
                self.limit_rect_for(mode)
            } else {
                display
            };
            let mut rect = node.request_rect();
            if mode != WindowMode::Floating {
                rect = limit;
            } else if ty.needs_parent() && node.has_flag(WindowFlags::PARENT_LIMIT) {
                if let Some(parent) = parent_rect {
                    fit_within(&parent, &mut rect);
                }
            }
            self.limit_floating_window_size(node, &display, &mut rect);
            rect
        };
        if ty != WindowType::DockSlice {
            self.limit_main_floating_window_position(node, &mut rect);
        }
        node.set_window_rect(rect);
        if last != rect || ty == WindowType::DockSlice {
            trace!(window_id = %id, %rect, reason = ?node.size_change_reason, "layout rect");
            node.notify_rect();
        }
        // Drag reasons are one-shot, whether or not the rect moved.
        if node.size_change_reason.is_drag() {
            node.size_change_reason = WindowSizeChangeReason::Undefined;
        }
    }

    /// Lays out a visible node and its sub-windows.
    pub fn layout_window_node(&mut self, nodes: &mut WindowNodeMap, id: WindowId) {
        let Some(node) = nodes.get(id) else { return };
        if !node.is_visible() {
            return;
        }
        let children = node.children.clone();
        self.update_layout_rect(nodes, id);
        if let Some(node) = nodes.get(id) {
            self.update_limit_rect(node);
        }
        for child in children {
            self.layout_window_node(nodes, child);
        }
    }

    /// Re-derives the divider from its requested rect, clamped to the
    /// current limit rect, and recuts the split rects around it.
    fn layout_divider(&mut self, ctx: &LayoutContext<'_>) {
        let Some(divider) = ctx.pair.divider().and_then(|id| ctx.nodes.get(id)) else {
            return;
        };
        if !divider.is_visible() {
            return;
        }
        let mut rect = divider.request_rect();
        if rect.is_empty() {
            rect = self.split.divider;
        }
        self.limit_divider_move_bounds(&mut rect);
        self.set_split_rect(rect);
    }

    /// Full layout pass. Bars live above the app root, so walking it first
    /// settles the limit rect before any app window is placed.
    pub fn layout_window_tree(&mut self, ctx: &mut LayoutContext<'_>) {
        self.limit_rect = self.display_rect();
        for root in RootKind::TOP_DOWN {
            if root == RootKind::App {
                self.layout_divider(ctx);
            }
            for id in ctx.roots.children(root).clone() {
                self.layout_window_node(ctx.nodes, id);
            }
        }
    }

    /// Tells the client its window went away from the layout.
    pub fn remove_window_node(&mut self, ctx: &mut LayoutContext<'_>, id: WindowId) {
        if let Some(node) = ctx.nodes.get(id) {
            if let Some(client) = &node.client {
                client.update_window_rect(
                    node.rect(),
                    node.has_decorated,
                    WindowSizeChangeReason::Hide,
                );
            }
        }
    }
}

/// Clamps `rect` to fit inside `limit`, sliding it in rather than
/// shrinking it where possible.
pub fn fit_within(limit: &Rect, rect: &mut Rect) {
    rect.width = rect.width.min(limit.width);
    rect.height = rect.height.min(limit.height);
    rect.x = rect.x.max(limit.x).min(limit.right() - rect.width as i32);
    rect.y = rect.y.max(limit.y).min(limit.bottom() - rect.height as i32);
}

/// Window types whose rect moves the limit rect of everything else.
pub fn affects_limit_rect(ty: WindowType) -> bool {
    matches!(ty, WindowType::StatusBar | WindowType::NavigationBar)
}

#[enum_dispatch]
pub trait LayoutPolicy {
    fn base(&self) -> &LayoutBase;

    fn base_mut(&mut self) -> &mut LayoutBase;

    fn layout_mode(&self) -> WindowLayoutMode;

    /// Called once when the policy becomes active for a display.
    fn launch(&mut self, ctx: &mut LayoutContext<'_>);

    fn add_window_node(&mut self, ctx: &mut LayoutContext<'_>, id: WindowId);

    fn remove_window_node(&mut self, ctx: &mut LayoutContext<'_>, id: WindowId);

    /// Re-arranges every main window after a switch to this policy.
    fn reorder(&mut self, ctx: &mut LayoutContext<'_>);

    fn update_display(&mut self, ctx: &mut LayoutContext<'_>, display: DisplayInfo);

    fn layout_window_tree(&mut self, ctx: &mut LayoutContext<'_>) {
        self.base_mut().layout_window_tree(ctx);
    }

    fn update_window_node(&mut self, ctx: &mut LayoutContext<'_>, id: WindowId, is_add: bool) {
        let Some(node) = ctx.nodes.get(id) else { return };
        let (ty, split) = (node.window_type(), node.is_split_mode());
        if affects_limit_rect(ty) {
            self.layout_window_tree(ctx);
        } else if ty == WindowType::DockSlice {
            if !is_add {
                for app in ctx.roots.app.clone() {
                    if let Some(n) = ctx.nodes.get_mut(app).filter(|n| n.is_split_mode()) {
                        n.size_change_reason = WindowSizeChangeReason::Drag;
                    }
                }
            }
            self.layout_window_tree(ctx);
        } else if split {
            self.layout_window_tree(ctx);
        } else {
            self.base_mut().layout_window_node(ctx.nodes, id);
        }
    }

    /// One-line summary for the dump surface.
    fn describe(&self) -> String;
}

#[enum_dispatch(LayoutPolicy)]
#[derive(Debug)]
pub enum LayoutPolicyKind {
    Cascade(CascadePolicy),
    Tile(TilePolicy),
}

impl LayoutPolicyKind {
    pub fn new(mode: WindowLayoutMode, settings: LayoutSettings, display: DisplayInfo) -> Self {
        match mode {
            WindowLayoutMode::Cascade => CascadePolicy::new(settings, display).into(),
            WindowLayoutMode::Tile => TilePolicy::new(settings, display).into(),
        }
    }
}
