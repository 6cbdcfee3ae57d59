use tracing::{debug, warn};

use crate::common::collections::{BTreeMap, HashMap};
use crate::model::error::{WmError, WmResult};
use crate::model::types::{AvoidArea, AvoidAreaType, AvoidPos, WindowId, WindowType};
use crate::sys::geometry::Rect;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AvoidControlType {
    Add,
    Update,
    Remove,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct AvoidNode {
    area_type: AvoidAreaType,
    rect: Rect,
}

pub type AvoidAreaCallback = Box<dyn FnMut(AvoidAreaType, &AvoidArea) + Send>;

/// The avoid-area type a window contributes to, if any.
pub fn area_type_of(ty: WindowType) -> Option<AvoidAreaType> {
    match ty {
        WindowType::StatusBar | WindowType::NavigationBar => Some(AvoidAreaType::System),
        WindowType::InputMethodFloat => Some(AvoidAreaType::Keyboard),
        WindowType::NavigationIndicator => Some(AvoidAreaType::NavigationIndicator),
        _ => None,
    }
}

pub fn is_avoid_area_type(ty: WindowType) -> bool { area_type_of(ty).is_some() }

/// Tracks the windows full-screen content must keep clear of, per display.
pub struct AvoidAreaController {
    display_rect: Rect,
    cutouts: Vec<Rect>,
    avoid_nodes: HashMap<WindowId, AvoidNode>,
    areas: BTreeMap<AvoidAreaType, AvoidArea>,
    callback: Option<AvoidAreaCallback>,
}

impl std::fmt::Debug for AvoidAreaController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvoidAreaController")
            .field("display_rect", &self.display_rect)
            .field("avoid_nodes", &self.avoid_nodes)
            .field("areas", &self.areas)
            .finish_non_exhaustive()
    }
}

impl AvoidAreaController {
    pub fn new(display_rect: Rect, cutouts: Vec<Rect>) -> Self {
        let mut controller = AvoidAreaController {
            display_rect,
            cutouts,
            avoid_nodes: HashMap::default(),
            areas: BTreeMap::new(),
            callback: None,
        };
        controller.recompute_cutout();
        controller
    }

    pub fn set_callback(&mut self, callback: AvoidAreaCallback) { self.callback = Some(callback); }

    pub fn is_avoid_area_node(&self, id: WindowId) -> bool { self.avoid_nodes.contains_key(&id) }

    pub fn avoid_area(&self, ty: AvoidAreaType) -> AvoidArea {
        self.areas.get(&ty).copied().unwrap_or_default()
    }

    /// Applies an add/update/remove of an avoid window and returns the area
    /// types whose content changed. Windows of other types are ignored.
    pub fn avoid_control(
        &mut self,
        id: WindowId,
        window_type: WindowType,
        rect: Rect,
        control: AvoidControlType,
    ) -> WmResult<Vec<AvoidAreaType>> {
        let Some(area_type) = area_type_of(window_type) else {
            return Ok(Vec::new());
        };
        let exists = self.avoid_nodes.contains_key(&id);
        match control {
            AvoidControlType::Add if exists => {
                warn!(window_id = %id, "avoid node already registered");
                return Err(WmError::InvalidParam);
            }
            AvoidControlType::Update | AvoidControlType::Remove if !exists => {
                warn!(window_id = %id, ?control, "avoid node not registered");
                return Err(WmError::InvalidParam);
            }
            AvoidControlType::Add | AvoidControlType::Update => {
                self.avoid_nodes.insert(id, AvoidNode { area_type, rect });
            }
            AvoidControlType::Remove => {
                self.avoid_nodes.remove(&id);
            }
        }
        let changed = self.recompute(area_type);
        debug!(window_id = %id, ?control, ?area_type, changed, "avoid control");
        Ok(if changed { vec![area_type] } else { Vec::new() })
    }

    /// Re-derives every area after a display size change.
    pub fn update_display(&mut self, display_rect: Rect, cutouts: Vec<Rect>) -> Vec<AvoidAreaType> {
        self.display_rect = display_rect;
        self.cutouts = cutouts;
        let mut changed = Vec::new();
        if self.recompute_cutout() {
            changed.push(AvoidAreaType::Cutout);
        }
        for ty in [
            AvoidAreaType::System,
            AvoidAreaType::Keyboard,
            AvoidAreaType::NavigationIndicator,
        ] {
            if self.recompute(ty) {
                changed.push(ty);
            }
        }
        changed
    }

    /// Rects of registered avoid windows with the display edge each spans.
    pub fn positioned_rects(&self, ty: AvoidAreaType) -> Vec<(AvoidPos, Rect)> {
        let mut out: Vec<_> = self
            .avoid_nodes
            .iter()
            .filter(|(_, node)| node.area_type == ty)
            .filter_map(|(id, node)| {
                AvoidPos::of(&node.rect, &self.display_rect).map(|pos| (*id, pos, node.rect))
            })
            .collect();
        out.sort_by_key(|(id, ..)| *id);
        out.into_iter().map(|(_, pos, rect)| (pos, rect)).collect()
    }

    fn recompute(&mut self, ty: AvoidAreaType) -> bool {
        let mut area = AvoidArea::default();
        for (pos, rect) in self.positioned_rects(ty) {
            set_edge(&mut area, pos, rect);
        }
        if ty == AvoidAreaType::Keyboard {
            // A floating keyboard that spans no edge still covers the bottom.
            for node in self.avoid_nodes.values().filter(|n| n.area_type == ty) {
                if AvoidPos::of(&node.rect, &self.display_rect).is_none() && !node.rect.is_empty() {
                    area.bottom = node.rect;
                }
            }
        }
        self.store(ty, area)
    }

    fn recompute_cutout(&mut self) -> bool {
        let mut area = AvoidArea::default();
        for cutout in &self.cutouts {
            set_edge(&mut area, nearest_edge(cutout, &self.display_rect), *cutout);
        }
        self.store(AvoidAreaType::Cutout, area)
    }

    fn store(&mut self, ty: AvoidAreaType, area: AvoidArea) -> bool {
        if self.avoid_area(ty) == area {
            return false;
        }
        if area.is_empty() {
            self.areas.remove(&ty);
        } else {
            self.areas.insert(ty, area);
        }
        if let Some(callback) = &mut self.callback {
            callback(ty, &area);
        }
        true
    }
}

fn set_edge(area: &mut AvoidArea, pos: AvoidPos, rect: Rect) {
    match pos {
        AvoidPos::Top => area.top = rect,
        AvoidPos::Bottom => area.bottom = rect,
        AvoidPos::Left => area.left = rect,
        AvoidPos::Right => area.right = rect,
    }
}

fn nearest_edge(rect: &Rect, display: &Rect) -> AvoidPos {
    let distances = [
        (rect.y - display.y, AvoidPos::Top),
        (display.bottom() - rect.bottom(), AvoidPos::Bottom),
        (rect.x - display.x, AvoidPos::Left),
        (display.right() - rect.right(), AvoidPos::Right),
    ];
    distances
        .into_iter()
        .min_by_key(|(d, _)| *d)
        .map(|(_, pos)| pos)
        .unwrap_or(AvoidPos::Top)
}
