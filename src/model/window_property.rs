//! Per-window attribute bag with dirty-field marshalling.
//!
//! Every marshalled field owns one bit of [`PropertyDirty`]. [`WindowProperty::write`]
//! emits the dirty mask followed by the value of each set bit, visiting bits
//! from lowest to highest; [`WindowProperty::read`] consumes them in the same
//! order and leaves every field whose bit is absent untouched.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::common::collections::BTreeMap;
use crate::model::error::{WmError, WmResult};
use crate::model::parcel::Parcel;
use crate::model::types::{
    DisplayId, Orientation, SystemBarProperty, WindowFlags, WindowId, WindowMode,
    WindowModeSupport, WindowType,
};
use crate::sys::display::UNDEFINED_BRIGHTNESS;
use crate::sys::geometry::{Rect, SizeLimits};

bitflags! {
    #[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PropertyDirty: u32 {
        const NAME = 1 << 0;
        const WINDOW_ID = 1 << 1;
        const PARENT_ID = 1 << 2;
        const DISPLAY_ID = 1 << 3;
        const REQUEST_RECT = 1 << 4;
        const WINDOW_RECT = 1 << 5;
        const ORIGIN_RECT = 1 << 6;
        const TYPE = 1 << 7;
        const MODE = 1 << 8;
        const LAST_MODE = 1 << 9;
        const FLAGS = 1 << 10;
        const MODE_SUPPORT = 1 << 11;
        const FOCUSABLE = 1 << 12;
        const TOUCHABLE = 1 << 13;
        const DECOR_ENABLE = 1 << 14;
        const ALPHA = 1 << 15;
        const BRIGHTNESS = 1 << 16;
        const TURN_SCREEN_ON = 1 << 17;
        const KEEP_SCREEN_ON = 1 << 18;
        const ORIENTATION = 1 << 19;
        const SYS_BAR_PROPS = 1 << 20;
        const CALLING_WINDOW = 1 << 21;
        const PRIVACY_MODE = 1 << 22;
        const BUNDLE_NAME = 1 << 23;
        const ABILITY_NAME = 1 << 24;
    }
}

pub type SysBarPropMap = BTreeMap<WindowType, SystemBarProperty>;

/// One marshalled field: its primitive wire type plus a getter/setter pair.
/// The set of primitive types is closed.
enum Field {
    Uint32(fn(&WindowProperty) -> u32, fn(&mut WindowProperty, u32) -> WmResult<()>),
    Float(fn(&WindowProperty) -> f32, fn(&mut WindowProperty, f32)),
    Bool(fn(&WindowProperty) -> bool, fn(&mut WindowProperty, bool)),
    String(fn(&WindowProperty) -> String, fn(&mut WindowProperty, String)),
    Rect(fn(&WindowProperty) -> Rect, fn(&mut WindowProperty, Rect)),
    SysBarPropMap,
}

fn enum_value<T: TryFrom<u32>>(v: u32) -> WmResult<T> { T::try_from(v).map_err(|_| WmError::Parcel) }

static FIELDS: [(PropertyDirty, Field); 25] = [
    (PropertyDirty::NAME, Field::String(|p| p.name.clone(), |p, v| p.name = v)),
    (
        PropertyDirty::WINDOW_ID,
        Field::Uint32(|p| p.window_id.0, |p, v| {
            p.window_id = WindowId(v);
            Ok(())
        }),
    ),
    (
        PropertyDirty::PARENT_ID,
        Field::Uint32(|p| p.parent_id.0, |p, v| {
            p.parent_id = WindowId(v);
            Ok(())
        }),
    ),
    (
        PropertyDirty::DISPLAY_ID,
        Field::Uint32(|p| p.display_id.0, |p, v| {
            p.display_id = DisplayId(v);
            Ok(())
        }),
    ),
    (PropertyDirty::REQUEST_RECT, Field::Rect(|p| p.request_rect, |p, v| p.request_rect = v)),
    (PropertyDirty::WINDOW_RECT, Field::Rect(|p| p.window_rect, |p, v| p.window_rect = v)),
    (PropertyDirty::ORIGIN_RECT, Field::Rect(|p| p.origin_rect, |p, v| p.origin_rect = v)),
    (
        PropertyDirty::TYPE,
        Field::Uint32(|p| p.window_type.into(), |p, v| {
            p.window_type = enum_value(v)?;
            Ok(())
        }),
    ),
    (
        PropertyDirty::MODE,
        Field::Uint32(|p| p.mode.into(), |p, v| {
            p.mode = enum_value(v)?;
            Ok(())
        }),
    ),
    (
        PropertyDirty::LAST_MODE,
        Field::Uint32(|p| p.last_mode.into(), |p, v| {
            p.last_mode = enum_value(v)?;
            Ok(())
        }),
    ),
    (
        PropertyDirty::FLAGS,
        Field::Uint32(|p| p.flags.bits(), |p, v| {
            p.flags = WindowFlags::from_bits_truncate(v);
            Ok(())
        }),
    ),
    (
        PropertyDirty::MODE_SUPPORT,
        Field::Uint32(|p| p.mode_support.bits(), |p, v| {
            p.mode_support = WindowModeSupport::from_bits_truncate(v);
            Ok(())
        }),
    ),
    (PropertyDirty::FOCUSABLE, Field::Bool(|p| p.focusable, |p, v| p.focusable = v)),
    (PropertyDirty::TOUCHABLE, Field::Bool(|p| p.touchable, |p, v| p.touchable = v)),
    (PropertyDirty::DECOR_ENABLE, Field::Bool(|p| p.decor_enable, |p, v| p.decor_enable = v)),
    (PropertyDirty::ALPHA, Field::Float(|p| p.alpha, |p, v| p.alpha = v)),
    (PropertyDirty::BRIGHTNESS, Field::Float(|p| p.brightness, |p, v| p.brightness = v)),
    (PropertyDirty::TURN_SCREEN_ON, Field::Bool(|p| p.turn_screen_on, |p, v| p.turn_screen_on = v)),
    (PropertyDirty::KEEP_SCREEN_ON, Field::Bool(|p| p.keep_screen_on, |p, v| p.keep_screen_on = v)),
    (
        PropertyDirty::ORIENTATION,
        Field::Uint32(|p| p.orientation.into(), |p, v| {
            p.orientation = enum_value(v)?;
            Ok(())
        }),
    ),
    (PropertyDirty::SYS_BAR_PROPS, Field::SysBarPropMap),
    (
        PropertyDirty::CALLING_WINDOW,
        Field::Uint32(|p| p.calling_window.0, |p, v| {
            p.calling_window = WindowId(v);
            Ok(())
        }),
    ),
    (PropertyDirty::PRIVACY_MODE, Field::Bool(|p| p.privacy_mode, |p, v| p.privacy_mode = v)),
    (PropertyDirty::BUNDLE_NAME, Field::String(|p| p.bundle_name.clone(), |p, v| p.bundle_name = v)),
    (
        PropertyDirty::ABILITY_NAME,
        Field::String(|p| p.ability_name.clone(), |p, v| p.ability_name = v),
    ),
];

fn field_for(bit: PropertyDirty) -> Option<&'static Field> {
    FIELDS.iter().find(|(b, _)| *b == bit).map(|(_, f)| f)
}

/// Iterates the set bits of `mask` from lowest to highest.
fn bits_ascending(mut mask: u32) -> impl Iterator<Item = u32> {
    std::iter::from_fn(move || {
        if mask == 0 {
            return None;
        }
        let lowest = mask & mask.wrapping_neg();
        mask -= lowest;
        Some(lowest)
    })
}

macro_rules! accessors {
    ($($field:ident, $setter:ident: $ty:ty => $bit:ident;)*) => {
        $(
            pub fn $field(&self) -> $ty { self.$field.clone() }

            pub fn $setter(&mut self, value: $ty) {
                self.$field = value;
                self.dirty |= PropertyDirty::$bit;
            }
        )*
    };
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct WindowProperty {
    name: String,
    window_id: WindowId,
    parent_id: WindowId,
    display_id: DisplayId,
    request_rect: Rect,
    window_rect: Rect,
    origin_rect: Rect,
    window_type: WindowType,
    mode: WindowMode,
    last_mode: WindowMode,
    flags: WindowFlags,
    mode_support: WindowModeSupport,
    focusable: bool,
    touchable: bool,
    decor_enable: bool,
    alpha: f32,
    brightness: f32,
    turn_screen_on: bool,
    keep_screen_on: bool,
    orientation: Orientation,
    sys_bar_props: SysBarPropMap,
    calling_window: WindowId,
    privacy_mode: bool,
    bundle_name: String,
    ability_name: String,
    #[serde(skip)]
    size_limits: SizeLimits,
    #[serde(skip)]
    dirty: PropertyDirty,
}

impl Default for WindowProperty {
    fn default() -> Self {
        WindowProperty {
            name: String::new(),
            window_id: WindowId::INVALID,
            parent_id: WindowId::INVALID,
            display_id: DisplayId::DEFAULT,
            request_rect: Rect::EMPTY,
            window_rect: Rect::EMPTY,
            origin_rect: Rect::EMPTY,
            window_type: WindowType::AppMainWindow,
            mode: WindowMode::Fullscreen,
            last_mode: WindowMode::Fullscreen,
            flags: WindowFlags::empty(),
            mode_support: WindowModeSupport::default(),
            focusable: true,
            touchable: true,
            decor_enable: false,
            alpha: 1.0,
            brightness: UNDEFINED_BRIGHTNESS,
            turn_screen_on: false,
            keep_screen_on: false,
            orientation: Orientation::Unspecified,
            sys_bar_props: SysBarPropMap::new(),
            calling_window: WindowId::INVALID,
            privacy_mode: false,
            bundle_name: String::new(),
            ability_name: String::new(),
            size_limits: SizeLimits::default(),
            dirty: PropertyDirty::empty(),
        }
    }
}

impl WindowProperty {
    pub fn new(name: impl Into<String>, window_type: WindowType) -> Self {
        WindowProperty {
            name: name.into(),
            window_type,
            ..Default::default()
        }
    }

    accessors! {
        name, set_name: String => NAME;
        window_id, set_window_id: WindowId => WINDOW_ID;
        parent_id, set_parent_id: WindowId => PARENT_ID;
        display_id, set_display_id: DisplayId => DISPLAY_ID;
        request_rect, set_request_rect: Rect => REQUEST_RECT;
        window_rect, set_window_rect: Rect => WINDOW_RECT;
        origin_rect, set_origin_rect: Rect => ORIGIN_RECT;
        window_type, set_window_type: WindowType => TYPE;
        last_mode, set_last_mode: WindowMode => LAST_MODE;
        flags, set_flags: WindowFlags => FLAGS;
        mode_support, set_mode_support: WindowModeSupport => MODE_SUPPORT;
        focusable, set_focusable: bool => FOCUSABLE;
        touchable, set_touchable: bool => TOUCHABLE;
        decor_enable, set_decor_enable: bool => DECOR_ENABLE;
        alpha, set_alpha: f32 => ALPHA;
        brightness, set_brightness: f32 => BRIGHTNESS;
        turn_screen_on, set_turn_screen_on: bool => TURN_SCREEN_ON;
        keep_screen_on, set_keep_screen_on: bool => KEEP_SCREEN_ON;
        orientation, set_orientation: Orientation => ORIENTATION;
        calling_window, set_calling_window: WindowId => CALLING_WINDOW;
        privacy_mode, set_privacy_mode: bool => PRIVACY_MODE;
        bundle_name, set_bundle_name: String => BUNDLE_NAME;
        ability_name, set_ability_name: String => ABILITY_NAME;
    }

    pub fn mode(&self) -> WindowMode { self.mode }

    /// Changes the mode, remembering the previous one unless it was a split
    /// mode so a cleared split pair can restore it.
    pub fn set_mode(&mut self, mode: WindowMode) {
        if self.mode == mode {
            return;
        }
        if !self.mode.is_split() && self.mode != WindowMode::Undefined {
            self.set_last_mode(self.mode);
        }
        self.mode = mode;
        self.dirty |= PropertyDirty::MODE;
    }

    /// The mode to return to when leaving split. Never a split mode.
    pub fn resume_mode(&self) -> WindowMode {
        match self.last_mode {
            WindowMode::Floating => WindowMode::Floating,
            _ => WindowMode::Fullscreen,
        }
    }

    pub fn has_flag(&self, flag: WindowFlags) -> bool { self.flags.contains(flag) }

    pub fn add_flag(&mut self, flag: WindowFlags) { self.set_flags(self.flags | flag); }

    pub fn sys_bar_prop(&self, ty: WindowType) -> SystemBarProperty {
        self.sys_bar_props.get(&ty).copied().unwrap_or_default()
    }

    pub fn sys_bar_props(&self) -> &SysBarPropMap { &self.sys_bar_props }

    pub fn set_sys_bar_prop(&mut self, ty: WindowType, prop: SystemBarProperty) {
        self.sys_bar_props.insert(ty, prop);
        self.dirty |= PropertyDirty::SYS_BAR_PROPS;
    }

    pub fn size_limits(&self) -> SizeLimits { self.size_limits }

    pub fn set_size_limits(&mut self, limits: SizeLimits) { self.size_limits = limits; }

    pub fn dirty(&self) -> PropertyDirty { self.dirty }

    pub fn mark_dirty(&mut self, bits: PropertyDirty) { self.dirty |= bits; }

    pub fn clear_dirty(&mut self) { self.dirty = PropertyDirty::empty(); }

    /// Marshals the dirty mask followed by every dirty field, lowest bit
    /// first. The dirty state is left as is.
    pub fn write(&self, parcel: &mut Parcel) {
        parcel.write_u32(self.dirty.bits());
        for bit in bits_ascending(self.dirty.bits()) {
            let Some(field) = field_for(PropertyDirty::from_bits_retain(bit)) else {
                continue;
            };
            match field {
                Field::Uint32(get, _) => parcel.write_u32(get(self)),
                Field::Float(get, _) => parcel.write_f32(get(self)),
                Field::Bool(get, _) => parcel.write_bool(get(self)),
                Field::String(get, _) => parcel.write_string(&get(self)),
                Field::Rect(get, _) => parcel.write_rect(&get(self)),
                Field::SysBarPropMap => {
                    parcel.write_u32(self.sys_bar_props.len() as u32);
                    for (ty, prop) in &self.sys_bar_props {
                        parcel.write_u32((*ty).into());
                        parcel.write_bool(prop.enable);
                        parcel.write_u32(prop.background_color);
                        parcel.write_u32(prop.content_color);
                    }
                }
            }
        }
    }

    /// Writes and then clears exactly the bits that were serialized.
    pub fn write_and_reset(&mut self, parcel: &mut Parcel) {
        let written = self.dirty;
        self.write(parcel);
        self.dirty.remove(written);
    }

    /// Applies a marshalled update onto `self`. Bits without a known field
    /// carry no payload and are skipped. A truncated or malformed update
    /// leaves `self` untouched.
    pub fn read(&mut self, parcel: &mut Parcel) -> WmResult<PropertyDirty> {
        let mut staged = self.clone();
        let known = staged.read_fields(parcel)?;
        *self = staged;
        Ok(known)
    }

    fn read_fields(&mut self, parcel: &mut Parcel) -> WmResult<PropertyDirty> {
        let mask = parcel.read_u32()?;
        for bit in bits_ascending(mask) {
            let Some(field) = field_for(PropertyDirty::from_bits_retain(bit)) else {
                continue;
            };
            match field {
                Field::Uint32(_, set) => set(self, parcel.read_u32()?)?,
                Field::Float(_, set) => set(self, parcel.read_f32()?),
                Field::Bool(_, set) => set(self, parcel.read_bool()?),
                Field::String(_, set) => set(self, parcel.read_string()?),
                Field::Rect(_, set) => set(self, parcel.read_rect()?),
                Field::SysBarPropMap => {
                    let len = parcel.read_u32()?;
                    let mut props = SysBarPropMap::new();
                    for _ in 0..len {
                        let ty = enum_value(parcel.read_u32()?)?;
                        let prop = SystemBarProperty {
                            enable: parcel.read_bool()?,
                            background_color: parcel.read_u32()?,
                            content_color: parcel.read_u32()?,
                        };
                        props.insert(ty, prop);
                    }
                    self.sys_bar_props = props;
                }
            }
        }
        let known = PropertyDirty::from_bits_truncate(mask);
        self.dirty |= known;
        Ok(known)
    }

    /// Full snapshot of every marshalled field.
    pub fn write_all(&self, parcel: &mut Parcel) {
        let mut all = self.clone();
        all.dirty = PropertyDirty::all();
        all.write(parcel);
    }
}
