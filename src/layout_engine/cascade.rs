use tracing::{debug, info};

use crate::common::config::LayoutSettings;
use crate::layout_engine::policy::{LayoutBase, LayoutContext, LayoutPolicy, affects_limit_rect};
use crate::model::types::{MinimizeReason, WindowId, WindowLayoutMode, WindowMode, WindowType};
use crate::sys::display::DisplayInfo;
use crate::sys::geometry::{Rect, vp};

/// Floating windows stacked diagonally from a centred first rect.
#[derive(Debug)]
pub struct CascadePolicy {
    base: LayoutBase,
    first_cascade_rect: Rect,
    placed_first_app_window: bool,
}

impl CascadePolicy {
    pub fn new(settings: LayoutSettings, display: DisplayInfo) -> Self {
        let mut policy = CascadePolicy {
            base: LayoutBase::new(settings, display),
            first_cascade_rect: Rect::EMPTY,
            placed_first_app_window: false,
        };
        policy.init_cascade_rect();
        policy
    }

    pub fn first_cascade_rect(&self) -> Rect { self.first_cascade_rect }

    /// A `cascade_ratio` sized rect centred in the limit rect, never smaller
    /// than the minimum floating size.
    fn init_cascade_rect(&mut self) {
        let base = &self.base;
        let display = base.display_rect();
        let vpr = base.vpr();
        let ratio = base.settings.cascade_ratio;
        let width = ((display.width as f32 * ratio) as u32)
            .max(vp(base.settings.min_floating_width, vpr));
        let height = ((display.height as f32 * ratio) as u32)
            .max(vp(base.settings.min_floating_height, vpr));
        let limit = base.limit_rect;
        let mut rect = Rect::new(0, 0, width, height);
        if width <= limit.width && height <= limit.height {
            rect.x = limit.x + ((limit.width - width) / 2) as i32;
            rect.y = limit.y + ((limit.height - height) / 2) as i32;
        }
        self.first_cascade_rect = rect;
    }

    /// Offsets `rect` by one title bar, wrapping back to the limit edge on
    /// an axis that would run off the limit rect.
    pub fn step_cascade_rect(&self, rect: Rect) -> Rect {
        let step = self.base.title_bar_height() as i32;
        let limit = self.base.limit_rect;
        let x = if limit.right() > rect.right() + step {
            rect.x + step
        } else {
            limit.x
        };
        let y = if limit.bottom() > rect.bottom() + step {
            rect.y + step
        } else {
            limit.y
        };
        Rect::new(x, y, rect.width, rect.height)
    }

    /// The top-most visible floating main window's rect.
    fn current_cascade_rect(&self, ctx: &LayoutContext<'_>, except: WindowId) -> Option<Rect> {
        ctx.roots
            .app
            .iter()
            .rev()
            .filter(|id| **id != except)
            .filter_map(|id| ctx.nodes.get(*id))
            .find(|n| {
                n.is_visible()
                    && n.window_type().is_main_window()
                    && n.mode() == WindowMode::Floating
            })
            .map(|n| n.rect())
    }

    fn set_cascade_rect(&mut self, ctx: &mut LayoutContext<'_>, id: WindowId) {
        let Some(ty) = ctx.nodes.get(id).map(|n| n.window_type()) else { return };
        let rect = if ty.is_app_window() && self.placed_first_app_window {
            let from = self
                .current_cascade_rect(ctx, id)
                .filter(|r| !r.is_empty())
                .unwrap_or(self.first_cascade_rect);
            self.step_cascade_rect(from)
        } else {
            if ty.is_app_window() {
                self.placed_first_app_window = true;
            }
            self.first_cascade_rect
        };
        debug!(window_id = %id, %rect, "cascade rect");
        if let Some(node) = ctx.nodes.get_mut(id) {
            node.property.set_request_rect(rect);
            node.has_decorated = true;
        }
    }
}

impl LayoutPolicy for CascadePolicy {
    fn base(&self) -> &LayoutBase { &self.base }

    fn base_mut(&mut self) -> &mut LayoutBase { &mut self.base }

    fn layout_mode(&self) -> WindowLayoutMode { WindowLayoutMode::Cascade }

    fn launch(&mut self, ctx: &mut LayoutContext<'_>) {
        self.base.init_split_rects();
        self.layout_window_tree(ctx);
    }

    fn add_window_node(&mut self, ctx: &mut LayoutContext<'_>, id: WindowId) {
        let Some(node) = ctx.nodes.get(id) else { return };
        let ty = node.window_type();
        if node.request_rect().is_empty() {
            if ty == WindowType::DockSlice {
                let divider = self.base.split.divider;
                if let Some(node) = ctx.nodes.get_mut(id) {
                    node.property.set_request_rect(divider);
                }
            } else {
                self.set_cascade_rect(ctx, id);
            }
        }
        self.update_window_node(ctx, id, true);
    }

    fn remove_window_node(&mut self, ctx: &mut LayoutContext<'_>, id: WindowId) {
        let affects_limit = ctx
            .nodes
            .get(id)
            .is_some_and(|n| affects_limit_rect(n.window_type()));
        self.base.remove_window_node(ctx, id);
        if affects_limit {
            self.layout_window_tree(ctx);
        }
    }

    fn reorder(&mut self, ctx: &mut LayoutContext<'_>) {
        let mut rect = self.first_cascade_rect;
        let mut first = true;
        for id in ctx.roots.app.clone() {
            let Some(node) = ctx.nodes.get_mut(id) else { continue };
            if node.window_type() != WindowType::AppMainWindow {
                continue;
            }
            if !node.property.mode_support().supports(WindowMode::Floating)
                || !node.property.size_limits().is_satisfied_by(&rect)
            {
                ctx.pending.minimize(id, MinimizeReason::LayoutCascade);
                continue;
            }
            if first {
                first = false;
            } else {
                rect = self.step_cascade_rect(rect);
            }
            node.property.set_request_rect(rect);
            node.has_decorated = true;
            if node.mode() != WindowMode::Floating {
                node.property.set_mode(WindowMode::Floating);
                node.notify_mode();
            }
            debug!(window_id = %id, %rect, "cascade reorder");
        }
        if !first {
            self.placed_first_app_window = true;
        }
        self.layout_window_tree(ctx);
        info!(display_id = %self.base.display.id, "cascade reorder done");
    }

    fn update_display(&mut self, ctx: &mut LayoutContext<'_>, display: DisplayInfo) {
        self.base.display = display;
        self.base.init_split_rects();
        self.layout_window_tree(ctx);
    }

    fn layout_window_tree(&mut self, ctx: &mut LayoutContext<'_>) {
        self.base.layout_window_tree(ctx);
        self.init_cascade_rect();
    }

    fn describe(&self) -> String {
        format!(
            "cascade limit={} first={} divider={}",
            self.base.limit_rect, self.first_cascade_rect, self.base.split.divider
        )
    }
}
