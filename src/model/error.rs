use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WmError {
    #[error("missing surface, property or token")]
    NullPtr,
    #[error("invalid parameter")]
    InvalidParam,
    #[error("invalid window type for this operation")]
    InvalidType,
    #[error("invalid operation")]
    InvalidOperation,
    #[error("operation repeated")]
    RepeatOperation,
    #[error("object already destroyed")]
    DestroyedObject,
    #[error("no such window")]
    InvalidWindow,
    #[error("no such display")]
    InvalidDisplay,
    #[error("invalid parent window")]
    InvalidParent,
    #[error("window mode or size not supported")]
    InvalidWindowModeOrSize,
    #[error("remote animation is not available")]
    NoRemoteAnimation,
    #[error("timed out")]
    Timeout,
    #[error("malformed parcel")]
    Parcel,
}

pub type WmResult<T> = Result<T, WmError>;

/// Outcome of an operation that succeeded. `DoNothing` means the request
/// was valid but already satisfied, which callers must not treat as failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WmStatus {
    #[default]
    Ok,
    DoNothing,
}

/// Stable integer codes used across the process boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive, strum_macros::Display)]
#[repr(i32)]
#[allow(non_camel_case_types)]
pub enum WmErrorCode {
    WM_OK = 0,
    WM_DO_NOTHING = 1,
    WM_ERROR_DESTROYED_OBJECT = 3,
    WM_ERROR_INVALID_WINDOW = 4,
    WM_ERROR_INVALID_WINDOW_MODE_OR_SIZE = 5,
    WM_ERROR_INVALID_OPERATION = 6,
    WM_ERROR_NO_REMOTE_ANIMATION = 9,
    WM_ERROR_INVALID_DISPLAY = 10,
    WM_ERROR_INVALID_PARENT = 11,
    WM_ERROR_REPEAT_OPERATION = 13,
    WM_ERROR_NULLPTR = 120,
    WM_ERROR_INVALID_TYPE = 121,
    WM_ERROR_INVALID_PARAM = 122,
    WM_ERROR_TIMEOUT = 123,
    WM_ERROR_PARCEL = 124,
}

impl From<WmError> for WmErrorCode {
    fn from(err: WmError) -> Self {
        match err {
            WmError::NullPtr => WmErrorCode::WM_ERROR_NULLPTR,
            WmError::InvalidParam => WmErrorCode::WM_ERROR_INVALID_PARAM,
            WmError::InvalidType => WmErrorCode::WM_ERROR_INVALID_TYPE,
            WmError::InvalidOperation => WmErrorCode::WM_ERROR_INVALID_OPERATION,
            WmError::RepeatOperation => WmErrorCode::WM_ERROR_REPEAT_OPERATION,
            WmError::DestroyedObject => WmErrorCode::WM_ERROR_DESTROYED_OBJECT,
            WmError::InvalidWindow => WmErrorCode::WM_ERROR_INVALID_WINDOW,
            WmError::InvalidDisplay => WmErrorCode::WM_ERROR_INVALID_DISPLAY,
            WmError::InvalidParent => WmErrorCode::WM_ERROR_INVALID_PARENT,
            WmError::InvalidWindowModeOrSize => WmErrorCode::WM_ERROR_INVALID_WINDOW_MODE_OR_SIZE,
            WmError::NoRemoteAnimation => WmErrorCode::WM_ERROR_NO_REMOTE_ANIMATION,
            WmError::Timeout => WmErrorCode::WM_ERROR_TIMEOUT,
            WmError::Parcel => WmErrorCode::WM_ERROR_PARCEL,
        }
    }
}

impl WmErrorCode {
    pub fn from_result<T: Into<WmStatus>>(result: WmResult<T>) -> WmErrorCode {
        match result.map(Into::into) {
            Ok(WmStatus::Ok) => WmErrorCode::WM_OK,
            Ok(WmStatus::DoNothing) => WmErrorCode::WM_DO_NOTHING,
            Err(err) => err.into(),
        }
    }
}

impl From<()> for WmStatus {
    fn from(_: ()) -> Self { WmStatus::Ok }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(i32::from(WmErrorCode::from(WmError::NullPtr)), 120);
        assert_eq!(i32::from(WmErrorCode::from(WmError::InvalidType)), 121);
        assert_eq!(i32::from(WmErrorCode::from(WmError::InvalidParam)), 122);
        assert_eq!(WmErrorCode::try_from(13).unwrap(), WmErrorCode::WM_ERROR_REPEAT_OPERATION);
    }

    #[test]
    fn do_nothing_is_not_an_error() {
        assert_eq!(WmErrorCode::from_result(Ok(WmStatus::DoNothing)), WmErrorCode::WM_DO_NOTHING);
        assert_eq!(WmErrorCode::from_result(Ok(())), WmErrorCode::WM_OK);
        assert_eq!(
            WmErrorCode::from_result::<()>(Err(WmError::InvalidOperation)),
            WmErrorCode::WM_ERROR_INVALID_OPERATION
        );
    }
}
