//! Request surface of the service: one serializable request per client
//! call, dispatched onto [`WindowManagerService`], plus loading of RON
//! request scripts for the headless driver.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod dump;

use crate::actor::service::WindowManagerService;
use crate::model::error::{WmErrorCode, WmResult, WmStatus};
use crate::model::types::{
    AvoidArea, AvoidAreaType, DisplayId, PropertyChangeAction, WindowId, WindowLayoutMode,
    WindowMode, WindowSizeChangeReason, pid_t,
};
use crate::model::window_property::WindowProperty;
use crate::sys::display::DisplayInfo;
use crate::sys::geometry::Rect;
use crate::sys::render::RenderService;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum WmRequest {
    CreateWindow {
        property: WindowProperty,
        #[serde(default)]
        pid: pid_t,
        #[serde(default)]
        uid: i32,
    },
    AddWindow {
        window: WindowId,
    },
    RemoveWindow {
        window: WindowId,
    },
    DestroyWindow {
        window: WindowId,
        #[serde(default)]
        only_self: bool,
    },
    /// Only the fields belonging to `action` are taken from `property`.
    UpdateProperty {
        window: WindowId,
        property: WindowProperty,
        action: PropertyChangeAction,
    },
    ResizeRect {
        window: WindowId,
        rect: Rect,
        #[serde(default)]
        reason: WindowSizeChangeReason,
    },
    SetWindowMode {
        window: WindowId,
        mode: WindowMode,
    },
    RequestFocus {
        window: WindowId,
    },
    RaiseToAppTop {
        window: WindowId,
    },
    MinimizeWindow {
        window: WindowId,
    },
    MinimizeAll {
        #[serde(default)]
        display: DisplayId,
    },
    PointDown {
        window: WindowId,
    },
    PointUp {
        window: WindowId,
    },
    SetLayoutMode {
        mode: WindowLayoutMode,
    },
    DisplayChange {
        display: DisplayId,
        width: u32,
        height: u32,
        virtual_pixel_ratio: f32,
    },
    RemoteDied {
        pid: pid_t,
    },
    GetAvoidArea {
        window: WindowId,
        ty: AvoidAreaType,
    },
    Snapshot {
        window: WindowId,
    },
    Dump {
        args: Vec<String>,
    },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct WmResponse {
    pub code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<WindowId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub windows: Vec<WindowId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avoid_area: Option<AvoidArea>,
    /// Width and height of a captured snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<(u32, u32)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl WmResponse {
    fn code<T: Into<WmStatus>>(result: WmResult<T>) -> Self {
        WmResponse {
            code: WmErrorCode::from_result(result).into(),
            ..Default::default()
        }
    }

    fn with<T>(result: WmResult<T>, fill: impl FnOnce(&mut WmResponse, T)) -> Self {
        match result {
            Ok(value) => {
                let mut response = WmResponse::code(Ok(()));
                fill(&mut response, value);
                response
            }
            Err(err) => WmResponse::code::<()>(Err(err)),
        }
    }

    /// `WM_OK` and `WM_DO_NOTHING` both count as success.
    pub fn is_success(&self) -> bool {
        matches!(
            WmErrorCode::try_from(self.code),
            Ok(WmErrorCode::WM_OK | WmErrorCode::WM_DO_NOTHING)
        )
    }
}

/// Dispatches one request. Created windows get a fresh surface from `render`.
pub fn handle(
    service: &WindowManagerService,
    render: &dyn RenderService,
    request: WmRequest,
) -> WmResponse {
    debug!(?request, "request");
    match request {
        WmRequest::CreateWindow { property, pid, uid } => {
            let surface = render.create_surface(&property.name());
            WmResponse::with(
                service.create_window(None, property, Some(surface), pid, uid),
                |r, id| r.window = Some(id),
            )
        }
        WmRequest::AddWindow { window } => WmResponse::code(service.add_window(window)),
        WmRequest::RemoveWindow { window } => WmResponse::code(service.remove_window(window)),
        WmRequest::DestroyWindow { window, only_self } => {
            WmResponse::code(service.destroy_window(window, only_self))
        }
        WmRequest::UpdateProperty { window, mut property, action } => {
            property.set_window_id(window);
            WmResponse::code(service.update_property(property, action))
        }
        WmRequest::ResizeRect { window, rect, reason } => {
            WmResponse::code(service.resize_rect(window, rect, reason))
        }
        WmRequest::SetWindowMode { window, mode } => {
            WmResponse::code(service.set_window_mode(window, mode))
        }
        WmRequest::RequestFocus { window } => WmResponse::code(service.request_focus(window)),
        WmRequest::RaiseToAppTop { window } => WmResponse::code(service.raise_to_app_top(window)),
        WmRequest::MinimizeWindow { window } => WmResponse::code(service.minimize_window(window)),
        WmRequest::MinimizeAll { display } => {
            WmResponse::with(service.minimize_all_app_windows(display), |r, ids| r.windows = ids)
        }
        WmRequest::PointDown { window } => {
            service.process_point_down(window);
            WmResponse::code(Ok(()))
        }
        WmRequest::PointUp { window } => {
            service.process_point_up(window);
            WmResponse::code(Ok(()))
        }
        WmRequest::SetLayoutMode { mode } => WmResponse::code(service.set_window_layout_mode(mode)),
        WmRequest::DisplayChange { display, width, height, virtual_pixel_ratio } => {
            service.process_display_change(DisplayInfo::new(
                display,
                width,
                height,
                virtual_pixel_ratio,
            ));
            WmResponse::code(Ok(()))
        }
        WmRequest::RemoteDied { pid } => {
            WmResponse::with(service.on_remote_died(pid), |r, ids| r.windows = ids)
        }
        WmRequest::GetAvoidArea { window, ty } => {
            WmResponse::with(service.get_avoid_area(window, ty), |r, area| r.avoid_area = Some(area))
        }
        WmRequest::Snapshot { window } => WmResponse::with(service.snapshot(window), |r, shot| {
            r.snapshot = Some((shot.width, shot.height))
        }),
        WmRequest::Dump { args } => {
            WmResponse::with(service.dump(args), |r, text| r.text = Some(text))
        }
    }
}

pub fn parse_script(buf: &str) -> anyhow::Result<Vec<WmRequest>> {
    Ok(ron::from_str(buf)?)
}

/// Reads a RON list of requests.
pub fn load_script(path: &Path) -> anyhow::Result<Vec<WmRequest>> {
    let buf = std::fs::read_to_string(path)
        .with_context(|| format!("reading script {}", path.display()))?;
    parse_script(&buf).with_context(|| format!("parsing script {}", path.display()))
}
