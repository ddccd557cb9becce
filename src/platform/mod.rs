// SPDX-License-Identifier: GPL-3.0-only
pub mod error;
pub mod local;
pub mod models;
#[cfg(feature = "steam")]
pub mod steam;
pub mod traits;

pub use error::PlatformError;
pub use local::LocalPlatform;
pub use models::{
    AppId, ContentHandle, PublishRequest, ResultCode, Visibility, WorkshopFileType,
    WorkshopItemId,
};
pub use traits::Platform;
