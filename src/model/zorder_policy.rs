//! Static window-type tiers.
//!
//! A node's priority orders it among its siblings; sub-window priorities are
//! relative to their parent and a negative one places the sub-window below it.

use crate::model::types::WindowType;
use crate::model::window_node::RootKind;

pub fn root_for(ty: WindowType) -> RootKind {
    match ty {
        WindowType::Wallpaper | WindowType::Desktop => RootKind::BelowApp,
        WindowType::AppMainWindow
        | WindowType::AppSubWindow
        | WindowType::Media
        | WindowType::AppComponent
        | WindowType::Dialog
        | WindowType::DockSlice
        | WindowType::Placeholder => RootKind::App,
        _ => RootKind::AboveApp,
    }
}

pub fn priority(ty: WindowType) -> i32 {
    use WindowType::*;
    match ty {
        Media => -1,
        AppMainWindow | DockSlice | Placeholder => 0,
        AppSubWindow | AppComponent => 1,
        Dialog => 2,

        Wallpaper => 0,
        Desktop => 1,

        LauncherRecent => 100,
        AppLaunching => 101,
        LauncherDock => 102,
        IncomingCall => 103,
        SearchingBar => 104,
        SystemAlarmWindow => 105,
        Float => 106,
        FloatCamera => 107,
        Toast => 108,
        StatusBar => 109,
        Panel => 110,
        VoiceInteraction => 111,
        VolumeOverlay => 112,
        NavigationBar => 113,
        NavigationIndicator => 114,
        InputMethodFloat => 115,
        InputMethodStatusBar => 116,
        Screenshot => 117,
        DraggingEffect => 118,
        Keyguard => 119,
        Pointer => 120,
        FreezeDisplay => 121,
        BootAnimation => 122,
    }
}

/// Priority for `ty` while a keyguard is showing, if it differs from the
/// static tier. Input method floats sit above the keyguard so it can be
/// unlocked with a password; show-when-locked app windows just below them.
pub fn keyguard_priority(ty: WindowType, show_when_locked: bool) -> Option<i32> {
    let keyguard = priority(WindowType::Keyguard);
    match ty {
        WindowType::InputMethodFloat => Some(keyguard + 2),
        WindowType::AppMainWindow if show_when_locked => Some(keyguard + 1),
        _ => None,
    }
}

/// Highest priority among the two system bars. Windows above this never
/// decide the bars' appearance.
pub fn system_bar_ceiling() -> i32 {
    priority(WindowType::StatusBar).max(priority(WindowType::NavigationBar))
}
