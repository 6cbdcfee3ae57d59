use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::config::DisplaySettings;
use crate::model::types::{DisplayId, Orientation};
use crate::sys::geometry::Rect;

/// Brightness value meaning "no override requested".
pub const UNDEFINED_BRIGHTNESS: f32 = -1.0;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Rotation {
    #[default]
    Rotation0,
    Rotation90,
    Rotation180,
    Rotation270,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DisplayInfo {
    pub id: DisplayId,
    pub rect: Rect,
    pub virtual_pixel_ratio: f32,
    #[serde(default)]
    pub rotation: Rotation,
    /// Camera cutouts, in display coordinates.
    #[serde(default)]
    pub cutouts: Vec<Rect>,
}

impl DisplayInfo {
    pub fn new(id: DisplayId, width: u32, height: u32, virtual_pixel_ratio: f32) -> Self {
        DisplayInfo {
            id,
            rect: Rect::new(0, 0, width, height),
            virtual_pixel_ratio,
            rotation: Rotation::default(),
            cutouts: Vec::new(),
        }
    }

    pub fn from_settings(id: DisplayId, settings: &DisplaySettings) -> Self {
        Self::new(id, settings.width, settings.height, settings.virtual_pixel_ratio)
    }

    pub fn is_landscape(&self) -> bool { self.rect.width > self.rect.height }
}

/// The display manager service, as seen from the window manager.
pub trait DisplayManager: Send + Sync {
    fn set_brightness_override(&self, display: DisplayId, brightness: f32);

    fn restore_brightness(&self, display: DisplayId);

    fn set_orientation(&self, display: DisplayId, orientation: Orientation);
}

#[derive(Clone, Debug, PartialEq)]
pub enum DisplayEvent {
    Brightness(DisplayId, f32),
    BrightnessRestored(DisplayId),
    Orientation(DisplayId, Orientation),
}

/// Display manager that only remembers what it was asked to do.
#[derive(Default)]
pub struct RecordingDisplayManager {
    events: Mutex<Vec<DisplayEvent>>,
}

impl RecordingDisplayManager {
    pub fn take_events(&self) -> Vec<DisplayEvent> { std::mem::take(&mut *self.events.lock()) }
}

impl DisplayManager for RecordingDisplayManager {
    fn set_brightness_override(&self, display_id: DisplayId, brightness: f32) {
        debug!(display = %display_id, brightness, "override brightness");
        self.events.lock().push(DisplayEvent::Brightness(display_id, brightness));
    }

    fn restore_brightness(&self, display_id: DisplayId) {
        debug!(display = %display_id, "restore brightness");
        self.events.lock().push(DisplayEvent::BrightnessRestored(display_id));
    }

    fn set_orientation(&self, display_id: DisplayId, orientation: Orientation) {
        debug!(display = %display_id, %orientation, "set orientation");
        self.events.lock().push(DisplayEvent::Orientation(display_id, orientation));
    }
}
