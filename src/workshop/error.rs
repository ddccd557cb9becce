// SPDX-License-Identifier: GPL-3.0-only
use crate::platform::PlatformError;

#[derive(thiserror::Error, Debug)]
pub enum WorkshopError {
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Subscribed item index {index} out of range (list has {len} items)")]
    IndexOutOfRange { index: usize, len: usize },
}
