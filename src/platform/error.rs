// SPDX-License-Identifier: GPL-3.0-only
use crate::platform::models::{ContentHandle, ResultCode, UpdateHandle};

#[derive(thiserror::Error, Debug)]
pub enum PlatformError {
    #[error("Platform call failed: {0}")]
    Call(ResultCode),

    #[error("Platform call failed with an I/O failure")]
    IoFailure,

    #[error("Invalid or expired content handle: {0}")]
    InvalidContentHandle(ContentHandle),

    #[error("Invalid item update handle: {0:?}")]
    InvalidUpdateHandle(UpdateHandle),

    #[error("Local storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metadata error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PlatformError {
    /// Result code as the platform would report it
    pub fn code(&self) -> ResultCode {
        match self {
            PlatformError::Call(code) => *code,
            PlatformError::InvalidContentHandle(_) | PlatformError::InvalidUpdateHandle(_) => {
                ResultCode::InvalidParam
            }
            PlatformError::IoFailure | PlatformError::Io(_) | PlatformError::Serialization(_) => {
                ResultCode::Fail
            }
        }
    }

    /// Whether the call failed in transport rather than with a result code
    pub fn is_io_failure(&self) -> bool {
        matches!(self, PlatformError::IoFailure | PlatformError::Io(_))
    }
}
