use tracing::{debug, info, warn};

use crate::common::collections::VecDeque;
use crate::common::config::LayoutSettings;
use crate::layout_engine::policy::{LayoutBase, LayoutContext, LayoutPolicy, affects_limit_rect};
use crate::model::types::{MinimizeReason, WindowId, WindowLayoutMode, WindowMode};
use crate::sys::display::DisplayInfo;
use crate::sys::geometry::{Rect, vp};

/// Up to `max_tile_num` main windows side by side in equal slots. The
/// oldest window is minimized when another one arrives at capacity.
#[derive(Debug)]
pub struct TilePolicy {
    base: LayoutBase,
    max_tile_num: usize,
    /// `preset_rects[n - 1]` holds the slots for `n` windows.
    preset_rects: Vec<Vec<Rect>>,
    foreground: VecDeque<WindowId>,
    /// Windows pushed out of the queue, most recent last.
    evicted: Vec<WindowId>,
}

impl TilePolicy {
    pub fn new(settings: LayoutSettings, display: DisplayInfo) -> Self {
        let mut policy = TilePolicy {
            base: LayoutBase::new(settings, display),
            max_tile_num: 1,
            preset_rects: Vec::new(),
            foreground: VecDeque::new(),
            evicted: Vec::new(),
        };
        policy.init_tile_rects();
        policy
    }

    pub fn max_tile_num(&self) -> usize { self.max_tile_num }

    pub fn foreground(&self) -> impl Iterator<Item = WindowId> + '_ {
        self.foreground.iter().copied()
    }

    pub fn preset_rects(&self, count: usize) -> Option<&[Rect]> {
        count.checked_sub(1).and_then(|i| self.preset_rects.get(i)).map(Vec::as_slice)
    }

    fn intervals(&self) -> (u32, u32) {
        let vpr = self.base.vpr();
        let tile = &self.base.settings.tile;
        (vp(tile.edge_interval * 2, vpr), vp(tile.mid_interval, vpr))
    }

    fn compute_max_tile_num(&self) -> usize {
        let (edge, mid) = self.intervals();
        let min_w = vp(self.base.settings.min_floating_width, self.base.vpr());
        let drawable = (self.base.limit_rect.width + mid).saturating_sub(edge);
        let per_tile = min_w + mid;
        if per_tile == 0 {
            return 1;
        }
        ((drawable / per_tile) as usize).max(1)
    }

    fn init_tile_rects(&mut self) {
        self.max_tile_num = self.compute_max_tile_num();
        let (edge, mid) = self.intervals();
        let limit = self.base.limit_rect;
        let display = self.base.display_rect();
        let ratio = self.base.settings.cascade_ratio;
        let w = ((display.width as f32 * ratio) as u32).min(limit.width);
        let h = ((display.height as f32 * ratio) as u32).min(limit.height);
        let x = limit.x + ((limit.width - w) / 2) as i32;
        let y = limit.y + ((limit.height - h) / 2) as i32;

        self.preset_rects = vec![vec![Rect::new(x, y, w, h)]];
        for num in 2..=self.max_tile_num as u32 {
            let gaps = edge + mid * (num - 1);
            let w = limit.width.saturating_sub(gaps) / num;
            let level = (0..num)
                .map(|i| {
                    let slot_x = limit.x + (edge / 2 + i * (w + mid)) as i32;
                    Rect::new(slot_x, y, w, h)
                })
                .collect();
            self.preset_rects.push(level);
        }
        info!(
            display_id = %self.base.display.id,
            max_tile_num = self.max_tile_num,
            "tile rects"
        );
    }

    fn push_back(&mut self, ctx: &mut LayoutContext<'_>, id: WindowId) {
        if self.foreground.contains(&id) {
            return;
        }
        let Some(node) = ctx.nodes.get(id) else { return };
        if !node.property.mode_support().supports(WindowMode::Floating) {
            debug!(window_id = %id, "window cannot float, minimizing");
            ctx.pending.minimize(id, MinimizeReason::LayoutTile);
            return;
        }
        self.evicted.retain(|e| *e != id);
        while self.foreground.len() >= self.max_tile_num {
            let Some(oldest) = self.foreground.pop_front() else { break };
            let floating = ctx.nodes.get(oldest).is_some_and(|n| n.mode() == WindowMode::Floating);
            if floating {
                ctx.pending.minimize(oldest, MinimizeReason::LayoutTile);
            }
            self.evicted.push(oldest);
        }
        self.foreground.push_back(id);
    }

    fn trim_to_capacity(&mut self, ctx: &mut LayoutContext<'_>) {
        while self.foreground.len() > self.max_tile_num {
            let Some(oldest) = self.foreground.pop_front() else { break };
            ctx.pending.minimize(oldest, MinimizeReason::LayoutTile);
            self.evicted.push(oldest);
        }
    }

    /// Gives every queued window its slot for the current queue length.
    /// Windows whose size limits reject their slot leave the queue; if that
    /// happens at capacity an earlier evicted window is asked back.
    fn assign_node_property(&mut self, ctx: &mut LayoutContext<'_>) {
        loop {
            let num = self.foreground.len();
            let Some(level) = self.preset_rects(num) else { return };
            if num > self.max_tile_num {
                return;
            }
            let rejected: Vec<WindowId> = self
                .foreground
                .iter()
                .zip(level)
                .filter(|(id, rect)| {
                    ctx.nodes.get(**id).is_none_or(|n| {
                        !n.property.mode_support().supports(WindowMode::Floating)
                            || !n.property.size_limits().is_satisfied_by(rect)
                    })
                })
                .map(|(id, _)| *id)
                .collect();
            if rejected.is_empty() {
                break;
            }
            let was_full = num == self.max_tile_num;
            for id in &rejected {
                warn!(window_id = %id, "tile slot violates size limits");
                self.foreground.retain(|f| f != id);
                ctx.pending.minimize(*id, MinimizeReason::LayoutTile);
            }
            if was_full {
                while let Some(back) = self.evicted.pop() {
                    if ctx.nodes.contains(back) && !rejected.contains(&back) {
                        ctx.pending.recover(back);
                        break;
                    }
                }
            }
        }

        let Some(level) = self.preset_rects(self.foreground.len()) else { return };
        for (id, rect) in self.foreground.iter().zip(level) {
            let Some(node) = ctx.nodes.get_mut(*id) else { continue };
            node.property.set_request_rect(*rect);
            node.has_decorated = true;
            if node.mode() != WindowMode::Floating {
                node.property.set_mode(WindowMode::Floating);
                node.notify_mode();
            }
        }
    }

    fn init_foreground_queue(&mut self, ctx: &mut LayoutContext<'_>) {
        self.foreground.clear();
        for id in ctx.roots.app.clone() {
            let main_visible = ctx
                .nodes
                .get(id)
                .is_some_and(|n| n.window_type().is_main_window() && n.is_visible());
            if main_visible {
                self.push_back(ctx, id);
            }
        }
    }
}

impl LayoutPolicy for TilePolicy {
    fn base(&self) -> &LayoutBase { &self.base }

    fn base_mut(&mut self) -> &mut LayoutBase { &mut self.base }

    fn layout_mode(&self) -> WindowLayoutMode { WindowLayoutMode::Tile }

    fn launch(&mut self, ctx: &mut LayoutContext<'_>) {
        self.base.init_split_rects();
        self.base.layout_window_tree(ctx);
        self.init_tile_rects();
        self.init_foreground_queue(ctx);
        self.assign_node_property(ctx);
        self.base.layout_window_tree(ctx);
    }

    fn add_window_node(&mut self, ctx: &mut LayoutContext<'_>, id: WindowId) {
        let is_main = ctx.nodes.get(id).is_some_and(|n| n.window_type().is_main_window());
        if is_main {
            self.push_back(ctx, id);
            self.assign_node_property(ctx);
            self.base.layout_window_tree(ctx);
        } else {
            self.update_window_node(ctx, id, true);
        }
    }

    fn remove_window_node(&mut self, ctx: &mut LayoutContext<'_>, id: WindowId) {
        let Some(ty) = ctx.nodes.get(id).map(|n| n.window_type()) else { return };
        self.base.remove_window_node(ctx, id);
        if ty.is_main_window() {
            self.foreground.retain(|f| *f != id);
            self.assign_node_property(ctx);
            self.base.layout_window_tree(ctx);
        } else if affects_limit_rect(ty) {
            self.base.layout_window_tree(ctx);
        }
    }

    fn reorder(&mut self, ctx: &mut LayoutContext<'_>) {
        self.init_foreground_queue(ctx);
        self.assign_node_property(ctx);
        self.base.layout_window_tree(ctx);
    }

    fn update_display(&mut self, ctx: &mut LayoutContext<'_>, display: DisplayInfo) {
        self.base.display = display;
        self.base.init_split_rects();
        self.base.layout_window_tree(ctx);
        self.init_tile_rects();
        self.trim_to_capacity(ctx);
        self.assign_node_property(ctx);
        self.base.layout_window_tree(ctx);
    }

    fn describe(&self) -> String {
        let queue: Vec<String> = self.foreground.iter().map(ToString::to_string).collect();
        format!(
            "tile limit={} max={} queue=[{}]",
            self.base.limit_rect,
            self.max_tile_num,
            queue.join(", ")
        )
    }
}
