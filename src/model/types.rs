//! Window attribute enums shared by the model, the layout engine and the
//! request surface.

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

use crate::sys::geometry::Rect;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u32);

impl WindowId {
    pub const INVALID: WindowId = WindowId(0);

    pub fn is_valid(self) -> bool { self != Self::INVALID }
}

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { self.0.fmt(f) }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DisplayId(pub u32);

impl DisplayId {
    pub const DEFAULT: DisplayId = DisplayId(0);
}

impl std::fmt::Display for DisplayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { self.0.fmt(f) }
}

#[allow(non_camel_case_types)]
pub type pid_t = i32;

#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    IntoPrimitive,
    TryFromPrimitive,
    strum_macros::Display,
    strum_macros::EnumIter
)]
#[repr(u32)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum WindowType {
    AppMainWindow = 1,

    AppSubWindow = 1000,
    Media = 1001,
    AppComponent = 1002,

    AppLaunching = 2000,
    DockSlice = 2001,
    IncomingCall = 2002,
    SearchingBar = 2003,
    SystemAlarmWindow = 2004,
    InputMethodFloat = 2005,
    Float = 2006,
    Toast = 2007,
    StatusBar = 2008,
    Panel = 2009,
    Keyguard = 2010,
    VolumeOverlay = 2011,
    NavigationBar = 2012,
    DraggingEffect = 2013,
    Pointer = 2014,
    LauncherRecent = 2015,
    LauncherDock = 2016,
    BootAnimation = 2017,
    FreezeDisplay = 2018,
    VoiceInteraction = 2019,
    FloatCamera = 2020,
    Placeholder = 2021,
    Dialog = 2022,
    Screenshot = 2023,
    InputMethodStatusBar = 2024,
    NavigationIndicator = 2025,
    Wallpaper = 2026,
    Desktop = 2027,
}

impl WindowType {
    pub fn is_main_window(self) -> bool { self == WindowType::AppMainWindow }

    /// Sub-windows hang off an application main window.
    pub fn is_sub_window(self) -> bool {
        matches!(
            self,
            WindowType::AppSubWindow | WindowType::Media | WindowType::AppComponent
        )
    }

    /// System windows that are still attached to a parent window.
    pub fn is_system_sub_window(self) -> bool { self == WindowType::Dialog }

    pub fn needs_parent(self) -> bool { self.is_sub_window() || self.is_system_sub_window() }

    pub fn is_app_window(self) -> bool { self.is_main_window() || self.is_sub_window() }

    pub fn is_system_window(self) -> bool { !self.is_app_window() }

    pub fn is_below_app(self) -> bool {
        matches!(self, WindowType::Wallpaper | WindowType::Desktop)
    }

    pub fn is_system_bar(self) -> bool {
        matches!(self, WindowType::StatusBar | WindowType::NavigationBar)
    }

    pub fn is_split_related(self) -> bool { self == WindowType::DockSlice }
}

#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    IntoPrimitive,
    TryFromPrimitive,
    strum_macros::Display
)]
#[repr(u32)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WindowMode {
    #[default]
    Undefined = 0,
    Fullscreen = 1,
    SplitPrimary = 100,
    SplitSecondary = 101,
    Floating = 102,
    Pip = 103,
}

impl WindowMode {
    pub fn is_split(self) -> bool {
        matches!(self, WindowMode::SplitPrimary | WindowMode::SplitSecondary)
    }

    pub fn is_fullscreen(self) -> bool { self == WindowMode::Fullscreen }

    pub fn is_floating(self) -> bool { self == WindowMode::Floating }

    /// The other half of a split pair.
    pub fn split_opposite(self) -> Option<WindowMode> {
        match self {
            WindowMode::SplitPrimary => Some(WindowMode::SplitSecondary),
            WindowMode::SplitSecondary => Some(WindowMode::SplitPrimary),
            _ => None,
        }
    }
}

bitflags! {
    #[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct WindowModeSupport: u32 {
        const FULLSCREEN = 1 << 0;
        const SPLIT_PRIMARY = 1 << 1;
        const SPLIT_SECONDARY = 1 << 2;
        const FLOATING = 1 << 3;
        const PIP = 1 << 4;
    }
}

impl Default for WindowModeSupport {
    fn default() -> Self {
        WindowModeSupport::FULLSCREEN
            | WindowModeSupport::SPLIT_PRIMARY
            | WindowModeSupport::SPLIT_SECONDARY
            | WindowModeSupport::FLOATING
    }
}

impl WindowModeSupport {
    pub fn supports(self, mode: WindowMode) -> bool {
        match mode {
            WindowMode::Fullscreen => self.contains(WindowModeSupport::FULLSCREEN),
            WindowMode::SplitPrimary => self.contains(WindowModeSupport::SPLIT_PRIMARY),
            WindowMode::SplitSecondary => self.contains(WindowModeSupport::SPLIT_SECONDARY),
            WindowMode::Floating => self.contains(WindowModeSupport::FLOATING),
            WindowMode::Pip => self.contains(WindowModeSupport::PIP),
            WindowMode::Undefined => false,
        }
    }

    /// True when the window can only live inside a split pair.
    pub fn is_split_only(self) -> bool {
        !self.is_empty()
            && (self - (WindowModeSupport::SPLIT_PRIMARY | WindowModeSupport::SPLIT_SECONDARY))
                .is_empty()
    }
}

bitflags! {
    #[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct WindowFlags: u32 {
        const NEED_AVOID = 1 << 0;
        const PARENT_LIMIT = 1 << 1;
        const SHOW_WHEN_LOCKED = 1 << 2;
        const FORBID_SPLIT_MOVE = 1 << 3;
        const WATER_MARK = 1 << 4;
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
pub enum WindowSizeChangeReason {
    #[default]
    Undefined,
    Maximize,
    Recover,
    Rotation,
    DragStart,
    Drag,
    DragEnd,
    Resize,
    Move,
    Hide,
    FullToSplit,
    SplitToFull,
}

impl WindowSizeChangeReason {
    pub fn is_drag(self) -> bool {
        matches!(self, WindowSizeChangeReason::Drag | WindowSizeChangeReason::DragEnd)
    }
}

#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    IntoPrimitive,
    TryFromPrimitive,
    strum_macros::Display
)]
#[repr(u32)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Orientation {
    #[default]
    Unspecified = 0,
    Vertical = 1,
    Horizontal = 2,
    ReverseVertical = 3,
    ReverseHorizontal = 4,
    Sensor = 5,
    SensorVertical = 6,
    SensorHorizontal = 7,
    AutoRotationRestricted = 8,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WindowLayoutMode {
    #[default]
    Cascade,
    Tile,
}

/// Why a node in the tree is being re-laid out.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WindowUpdateReason {
    All,
    Mode,
    Rect,
    Flags,
    Type,
    OtherProps,
}

impl WindowUpdateReason {
    /// Updates that move a main window out of the tiled arrangement; the
    /// display drops back to cascade before laying it out.
    pub fn is_switch_cascade(self) -> bool {
        matches!(
            self,
            WindowUpdateReason::All
                | WindowUpdateReason::Mode
                | WindowUpdateReason::Rect
                | WindowUpdateReason::Flags
                | WindowUpdateReason::Type
        )
    }
}

pub const DEFAULT_STATUS_BAR_BACKGROUND: u32 = 0x6600_0000;
pub const DEFAULT_STATUS_BAR_CONTENT: u32 = 0xffee_eeee;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SystemBarProperty {
    pub enable: bool,
    pub background_color: u32,
    pub content_color: u32,
}

impl Default for SystemBarProperty {
    fn default() -> Self {
        SystemBarProperty {
            enable: true,
            background_color: DEFAULT_STATUS_BAR_BACKGROUND,
            content_color: DEFAULT_STATUS_BAR_CONTENT,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct SystemBarRegionTint {
    pub bar_type: WindowType,
    pub prop: SystemBarProperty,
    pub region: Rect,
}

#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    IntoPrimitive,
    TryFromPrimitive,
    strum_macros::EnumIter
)]
#[repr(u32)]
#[serde(rename_all = "snake_case")]
pub enum AvoidAreaType {
    System = 0,
    Cutout = 1,
    SystemGesture = 2,
    Keyboard = 3,
    NavigationIndicator = 4,
}

/// The four edge rectangles full-screen content must keep clear of.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AvoidArea {
    pub top: Rect,
    pub left: Rect,
    pub right: Rect,
    pub bottom: Rect,
}

impl AvoidArea {
    pub fn is_empty(&self) -> bool {
        self.top.is_empty() && self.left.is_empty() && self.right.is_empty() && self.bottom.is_empty()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AvoidPos {
    Top,
    Left,
    Right,
    Bottom,
}

impl AvoidPos {
    /// Classifies an avoid window by the display edge it spans.
    pub fn of(rect: &Rect, display: &Rect) -> Option<AvoidPos> {
        if rect.is_empty() {
            return None;
        }
        if rect.width == display.width {
            if rect.y == display.y {
                Some(AvoidPos::Top)
            } else {
                Some(AvoidPos::Bottom)
            }
        } else if rect.height == display.height {
            if rect.x == display.x {
                Some(AvoidPos::Left)
            } else {
                Some(AvoidPos::Right)
            }
        } else {
            None
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
pub enum MinimizeReason {
    MinimizeButton,
    MinimizeAll,
    LayoutTile,
    LayoutCascade,
    SplitReplace,
    SplitQuit,
    GestureAnimation,
    Other,
}

/// Closed set of partial property updates a client can send. Only the
/// fields relevant to the action are read from the passed property.
#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    IntoPrimitive,
    TryFromPrimitive,
    strum_macros::Display
)]
#[repr(u32)]
#[serde(rename_all = "snake_case")]
pub enum PropertyChangeAction {
    UpdateRect = 1,
    UpdateMode = 1 << 1,
    UpdateFlags = 1 << 2,
    UpdateOtherProps = 1 << 3,
    UpdateFocusable = 1 << 4,
    UpdateTouchable = 1 << 5,
    UpdateCallingWindow = 1 << 6,
    UpdateOrientation = 1 << 7,
    UpdateTurnScreenOn = 1 << 8,
    UpdateKeepScreenOn = 1 << 9,
    UpdateSetBrightness = 1 << 10,
    UpdateModeSupportInfo = 1 << 11,
    UpdateWindowLimits = 1 << 12,
    UpdateDecorEnable = 1 << 13,
}
