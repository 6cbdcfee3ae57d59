//! Integer screen geometry.

use serde::{Deserialize, Serialize};

/// A screen rectangle in physical pixels. The origin may be negative (a
/// window dragged partly off screen); the size never is.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const EMPTY: Rect = Rect { x: 0, y: 0, width: 0, height: 0 };

    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Rect { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool { self.width == 0 || self.height == 0 }

    pub fn right(&self) -> i32 { self.x.saturating_add(self.width as i32) }

    pub fn bottom(&self) -> i32 { self.y.saturating_add(self.height as i32) }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        self.x <= other.x
            && self.y <= other.y
            && self.right() >= other.right()
            && self.bottom() >= other.bottom()
    }

    pub fn intersection(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= x || bottom <= y {
            return Rect::new(x, y, 0, 0);
        }
        Rect::new(x, y, (right - x) as u32, (bottom - y) as u32)
    }

    pub fn intersects(&self, other: &Rect) -> bool { !self.intersection(other).is_empty() }

    pub fn is_vertical(&self) -> bool { self.height > self.width }

    pub fn area(&self) -> u64 { u64::from(self.width) * u64::from(self.height) }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}, {}, {}]", self.x, self.y, self.width, self.height)
    }
}

/// Scales a virtual-pixel length by a display's virtual pixel ratio,
/// truncating like the rest of the layout math.
pub fn vp(value: u32, ratio: f32) -> u32 { (value as f32 * ratio) as u32 }

/// Size limits a window declares for itself.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct SizeLimits {
    pub max_width: u32,
    pub max_height: u32,
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for SizeLimits {
    fn default() -> Self {
        SizeLimits {
            max_width: u32::MAX,
            max_height: u32::MAX,
            min_width: 0,
            min_height: 0,
        }
    }
}

impl SizeLimits {
    pub fn is_satisfied_by(&self, rect: &Rect) -> bool {
        rect.width >= self.min_width
            && rect.width <= self.max_width
            && rect.height >= self.min_height
            && rect.height <= self.max_height
    }

    pub fn clamp(&self, rect: &mut Rect) {
        rect.width = rect.width.clamp(self.min_width, self.max_width.max(self.min_width));
        rect.height = rect.height.clamp(self.min_height, self.max_height.max(self.min_height));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_of_overlapping_rects() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(50, 50, 100, 100);
        assert_eq!(a.intersection(&b), Rect::new(50, 50, 50, 50));
        assert!(a.intersects(&b));
    }

    #[test]
    fn disjoint_rects_have_empty_intersection() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(200, 200, 100, 100);
        assert!(a.intersection(&b).is_empty());
        assert!(!a.intersects(&b));
    }

    #[test]
    fn containment_is_inclusive_of_edges() {
        let outer = Rect::new(0, 0, 100, 100);
        assert!(outer.contains_rect(&Rect::new(0, 0, 100, 100)));
        assert!(outer.contains_rect(&Rect::new(10, 10, 80, 80)));
        assert!(!outer.contains_rect(&Rect::new(-1, 0, 10, 10)));
        assert!(outer.contains_point(0, 0));
        assert!(!outer.contains_point(100, 50));
    }

    #[test]
    fn vp_scaling_truncates() {
        assert_eq!(vp(37, 1.5), 55);
        assert_eq!(vp(320, 1.0), 320);
    }

    #[test]
    fn size_limits_clamp_and_check() {
        let limits = SizeLimits {
            max_width: 800,
            max_height: 600,
            min_width: 200,
            min_height: 100,
        };
        let mut rect = Rect::new(0, 0, 1000, 50);
        assert!(!limits.is_satisfied_by(&rect));
        limits.clamp(&mut rect);
        assert_eq!(rect, Rect::new(0, 0, 800, 100));
        assert!(limits.is_satisfied_by(&rect));
    }
}
