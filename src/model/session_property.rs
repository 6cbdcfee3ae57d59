//! Session-side property bag. Unlike [`WindowProperty`], partial updates are
//! indexed by the action that produced them: each action owns a fixed set of
//! fields and a handler pair that writes/reads exactly those.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

use crate::model::error::{WmError, WmResult};
use crate::model::parcel::Parcel;
use crate::model::types::{
    Orientation, SystemBarProperty, WindowFlags, WindowMode, WindowModeSupport, WindowType,
};
use crate::model::window_property::{SysBarPropMap, WindowProperty};
use crate::sys::display::UNDEFINED_BRIGHTNESS;
use crate::sys::geometry::{Rect, SizeLimits};

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
    strum_macros::EnumIter
)]
#[repr(u64)]
pub enum SessionPropertyAction {
    TurnScreenOn = 1,
    KeepScreenOn = 1 << 1,
    Focusable = 1 << 2,
    Touchable = 1 << 3,
    SetBrightness = 1 << 4,
    Orientation = 1 << 5,
    PrivacyMode = 1 << 6,
    SystemBar = 1 << 7,
    Flags = 1 << 8,
    Mode = 1 << 9,
    WindowLimits = 1 << 10,
    DecorEnable = 1 << 11,
    ModeSupportInfo = 1 << 12,
    PipTemplate = 1 << 13,
    KeyboardLayout = 1 << 14,
    CompatibleMode = 1 << 15,
}

/// Identity of the application ability behind a session.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionInfo {
    pub bundle_name: String,
    pub module_name: String,
    pub ability_name: String,
    /// Distinguishes instances of a multi-instance application.
    pub app_instance_key: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct PipTemplateInfo {
    pub template_type: u32,
    pub priority: u32,
    pub control_group: Vec<u32>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyboardLayoutParams {
    pub gravity: u32,
    pub landscape_rect: Rect,
    pub portrait_rect: Rect,
    pub landscape_panel_rect: Rect,
    pub portrait_panel_rect: Rect,
}

/// Fields used when running a phone application on a large screen.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompatibleModeProperty {
    pub enabled: bool,
    pub adapt_to_immersive: bool,
    pub support_drag_resize: bool,
    pub disable_fullscreen: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct WindowSessionProperty {
    pub persistent_id: i32,
    pub parent_persistent_id: i32,
    pub session_info: SessionInfo,
    pub window_name: String,
    pub request_rect: Rect,
    pub window_type: WindowType,
    pub mode: WindowMode,
    pub flags: WindowFlags,
    pub mode_support: WindowModeSupport,
    pub focusable: bool,
    pub touchable: bool,
    pub brightness: f32,
    pub turn_screen_on: bool,
    pub keep_screen_on: bool,
    pub orientation: Orientation,
    pub privacy_mode: bool,
    pub sys_bar_props: SysBarPropMap,
    pub limits: SizeLimits,
    pub decor_enable: bool,
    pub pip_template: PipTemplateInfo,
    pub keyboard_layout: KeyboardLayoutParams,
    pub compatible_mode: CompatibleModeProperty,
}

impl Default for WindowSessionProperty {
    fn default() -> Self {
        WindowSessionProperty {
            persistent_id: 0,
            parent_persistent_id: 0,
            session_info: SessionInfo::default(),
            window_name: String::new(),
            request_rect: Rect::EMPTY,
            window_type: WindowType::AppMainWindow,
            mode: WindowMode::Undefined,
            flags: WindowFlags::empty(),
            mode_support: WindowModeSupport::default(),
            focusable: true,
            touchable: true,
            brightness: UNDEFINED_BRIGHTNESS,
            turn_screen_on: false,
            keep_screen_on: false,
            orientation: Orientation::Unspecified,
            privacy_mode: false,
            sys_bar_props: SysBarPropMap::new(),
            limits: SizeLimits::default(),
            decor_enable: false,
            pip_template: PipTemplateInfo::default(),
            keyboard_layout: KeyboardLayoutParams::default(),
            compatible_mode: CompatibleModeProperty::default(),
        }
    }
}

fn write_limits(parcel: &mut Parcel, limits: &SizeLimits) {
    parcel.write_u32(limits.max_width);
    parcel.write_u32(limits.max_height);
    parcel.write_u32(limits.min_width);
    parcel.write_u32(limits.min_height);
}

fn read_limits(parcel: &mut Parcel) -> WmResult<SizeLimits> {
    Ok(SizeLimits {
        max_width: parcel.read_u32()?,
        max_height: parcel.read_u32()?,
        min_width: parcel.read_u32()?,
        min_height: parcel.read_u32()?,
    })
}

impl WindowSessionProperty {
    /// Writes the action tag followed by the fields that action owns.
    pub fn write_action(&self, parcel: &mut Parcel, action: SessionPropertyAction) {
        use SessionPropertyAction as A;
        parcel.write_u64(action.into());
        match action {
            A::TurnScreenOn => parcel.write_bool(self.turn_screen_on),
            A::KeepScreenOn => parcel.write_bool(self.keep_screen_on),
            A::Focusable => parcel.write_bool(self.focusable),
            A::Touchable => parcel.write_bool(self.touchable),
            A::SetBrightness => parcel.write_f32(self.brightness),
            A::Orientation => parcel.write_u32(self.orientation.into()),
            A::PrivacyMode => parcel.write_bool(self.privacy_mode),
            A::SystemBar => {
                parcel.write_u32(self.sys_bar_props.len() as u32);
                for (ty, prop) in &self.sys_bar_props {
                    parcel.write_u32((*ty).into());
                    parcel.write_bool(prop.enable);
                    parcel.write_u32(prop.background_color);
                    parcel.write_u32(prop.content_color);
                }
            }
            A::Flags => parcel.write_u32(self.flags.bits()),
            A::Mode => parcel.write_u32(self.mode.into()),
            A::WindowLimits => write_limits(parcel, &self.limits),
            A::DecorEnable => parcel.write_bool(self.decor_enable),
            A::ModeSupportInfo => parcel.write_u32(self.mode_support.bits()),
            A::PipTemplate => {
                parcel.write_u32(self.pip_template.template_type);
                parcel.write_u32(self.pip_template.priority);
                parcel.write_u32(self.pip_template.control_group.len() as u32);
                for control in &self.pip_template.control_group {
                    parcel.write_u32(*control);
                }
            }
            A::KeyboardLayout => {
                let params = &self.keyboard_layout;
                parcel.write_u32(params.gravity);
                parcel.write_rect(&params.landscape_rect);
                parcel.write_rect(&params.portrait_rect);
                parcel.write_rect(&params.landscape_panel_rect);
                parcel.write_rect(&params.portrait_panel_rect);
            }
            A::CompatibleMode => {
                let compat = &self.compatible_mode;
                parcel.write_bool(compat.enabled);
                parcel.write_bool(compat.adapt_to_immersive);
                parcel.write_bool(compat.support_drag_resize);
                parcel.write_bool(compat.disable_fullscreen);
            }
        }
    }

    /// Reads one action-tagged update, returning the action it carried.
    pub fn read_action(&mut self, parcel: &mut Parcel) -> WmResult<SessionPropertyAction> {
        use SessionPropertyAction as A;
        let action = A::try_from(parcel.read_u64()?).map_err(|_| WmError::Parcel)?;
        match action {
            A::TurnScreenOn => self.turn_screen_on = parcel.read_bool()?,
            A::KeepScreenOn => self.keep_screen_on = parcel.read_bool()?,
            A::Focusable => self.focusable = parcel.read_bool()?,
            A::Touchable => self.touchable = parcel.read_bool()?,
            A::SetBrightness => self.brightness = parcel.read_f32()?,
            A::Orientation => {
                self.orientation =
                    Orientation::try_from(parcel.read_u32()?).map_err(|_| WmError::Parcel)?
            }
            A::PrivacyMode => self.privacy_mode = parcel.read_bool()?,
            A::SystemBar => {
                let len = parcel.read_u32()?;
                let mut props = SysBarPropMap::new();
                for _ in 0..len {
                    let ty = WindowType::try_from(parcel.read_u32()?).map_err(|_| WmError::Parcel)?;
                    props.insert(ty, SystemBarProperty {
                        enable: parcel.read_bool()?,
                        background_color: parcel.read_u32()?,
                        content_color: parcel.read_u32()?,
                    });
                }
                self.sys_bar_props = props;
            }
            A::Flags => self.flags = WindowFlags::from_bits_truncate(parcel.read_u32()?),
            A::Mode => {
                self.mode = WindowMode::try_from(parcel.read_u32()?).map_err(|_| WmError::Parcel)?
            }
            A::WindowLimits => self.limits = read_limits(parcel)?,
            A::DecorEnable => self.decor_enable = parcel.read_bool()?,
            A::ModeSupportInfo => {
                self.mode_support = WindowModeSupport::from_bits_truncate(parcel.read_u32()?)
            }
            A::PipTemplate => {
                let template_type = parcel.read_u32()?;
                let priority = parcel.read_u32()?;
                let len = parcel.read_u32()?;
                let control_group = (0..len).map(|_| parcel.read_u32()).collect::<WmResult<_>>()?;
                self.pip_template = PipTemplateInfo { template_type, priority, control_group };
            }
            A::KeyboardLayout => {
                self.keyboard_layout = KeyboardLayoutParams {
                    gravity: parcel.read_u32()?,
                    landscape_rect: parcel.read_rect()?,
                    portrait_rect: parcel.read_rect()?,
                    landscape_panel_rect: parcel.read_rect()?,
                    portrait_panel_rect: parcel.read_rect()?,
                };
            }
            A::CompatibleMode => {
                self.compatible_mode = CompatibleModeProperty {
                    enabled: parcel.read_bool()?,
                    adapt_to_immersive: parcel.read_bool()?,
                    support_drag_resize: parcel.read_bool()?,
                    disable_fullscreen: parcel.read_bool()?,
                };
            }
        }
        Ok(action)
    }

    /// Copies the fields both bags share into a window property.
    pub fn apply_to(&self, prop: &mut WindowProperty) {
        prop.set_name(self.window_name.clone());
        prop.set_window_type(self.window_type);
        prop.set_request_rect(self.request_rect);
        if self.mode != WindowMode::Undefined {
            prop.set_mode(self.mode);
        }
        prop.set_flags(self.flags);
        prop.set_mode_support(self.mode_support);
        prop.set_focusable(self.focusable);
        prop.set_touchable(self.touchable);
        prop.set_brightness(self.brightness);
        prop.set_turn_screen_on(self.turn_screen_on);
        prop.set_keep_screen_on(self.keep_screen_on);
        prop.set_orientation(self.orientation);
        prop.set_privacy_mode(self.privacy_mode);
        prop.set_decor_enable(self.decor_enable);
        prop.set_size_limits(self.limits);
        prop.set_bundle_name(self.session_info.bundle_name.clone());
        prop.set_ability_name(self.session_info.ability_name.clone());
        for (ty, bar) in &self.sys_bar_props {
            prop.set_sys_bar_prop(*ty, *bar);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn action_update_only_touches_its_fields() {
        let mut sender = WindowSessionProperty::default();
        sender.keep_screen_on = true;
        sender.brightness = 0.8;
        let mut parcel = Parcel::new();
        sender.write_action(&mut parcel, SessionPropertyAction::KeepScreenOn);

        let mut receiver = WindowSessionProperty::default();
        let action = receiver.read_action(&mut Parcel::from_bytes(parcel.as_bytes().to_vec()));
        assert_eq!(action, Ok(SessionPropertyAction::KeepScreenOn));
        assert!(receiver.keep_screen_on);
        assert_eq!(receiver.brightness, UNDEFINED_BRIGHTNESS);
    }

    #[test]
    fn pip_and_keyboard_updates_carry_nested_data() {
        let mut sender = WindowSessionProperty::default();
        sender.pip_template = PipTemplateInfo {
            template_type: 2,
            priority: 1,
            control_group: vec![101, 102],
        };
        sender.keyboard_layout.gravity = 3;
        sender.keyboard_layout.portrait_rect = Rect::new(0, 1500, 1080, 840);

        let mut parcel = Parcel::new();
        sender.write_action(&mut parcel, SessionPropertyAction::PipTemplate);
        sender.write_action(&mut parcel, SessionPropertyAction::KeyboardLayout);

        let mut receiver = WindowSessionProperty::default();
        let mut input = Parcel::from_bytes(parcel.as_bytes().to_vec());
        receiver.read_action(&mut input).unwrap();
        receiver.read_action(&mut input).unwrap();
        assert_eq!(receiver.pip_template, sender.pip_template);
        assert_eq!(receiver.keyboard_layout, sender.keyboard_layout);
    }

    #[test]
    fn unknown_action_tag_is_rejected() {
        let mut parcel = Parcel::new();
        parcel.write_u64(1 << 40);
        let mut receiver = WindowSessionProperty::default();
        assert_eq!(receiver.read_action(&mut parcel), Err(WmError::Parcel));
    }

    #[test]
    fn apply_to_copies_shared_fields() {
        let mut session = WindowSessionProperty::default();
        session.window_name = "editor".into();
        session.mode = WindowMode::Floating;
        session.limits.min_width = 400;
        session.session_info.bundle_name = "com.example.editor".into();

        let mut prop = WindowProperty::default();
        session.apply_to(&mut prop);
        assert_eq!(prop.name(), "editor");
        assert_eq!(prop.mode(), WindowMode::Floating);
        assert_eq!(prop.size_limits().min_width, 400);
        assert_eq!(prop.bundle_name(), "com.example.editor");
    }
}
