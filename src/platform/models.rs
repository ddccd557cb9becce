// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of ids returned by one subscribed-files enumeration page
pub const ENUMERATE_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(pub u32);

/// Identifier of a published workshop item, assigned by the platform on publish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkshopItemId(pub u64);

/// Single-use download handle for the content of one workshop item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHandle(pub u64);

/// Handle of an open item-update session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdateHandle(pub u64);

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for WorkshopItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ContentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Result code attached to every completed platform call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    Ok,
    Fail,
    FileNotFound,
    AccessDenied,
    InvalidParam,
    LimitExceeded,
    Timeout,
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResultCode::Ok => "ok",
            ResultCode::Fail => "fail",
            ResultCode::FileNotFound => "file not found",
            ResultCode::AccessDenied => "access denied",
            ResultCode::InvalidParam => "invalid parameter",
            ResultCode::LimitExceeded => "limit exceeded",
            ResultCode::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    FriendsOnly,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkshopFileType {
    Community,
    Microtransaction,
}

/// Parameters for publishing a private storage file as a workshop item
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Private storage name of the file to publish
    pub file_name: String,
    pub preview_file: Option<String>,
    pub app_id: AppId,
    pub title: String,
    pub description: String,
    pub visibility: Visibility,
    pub tags: Vec<String>,
    pub file_type: WorkshopFileType,
}

/// One page of the subscribed-files enumeration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscribedPage {
    pub ids: Vec<WorkshopItemId>,
    /// Total number of subscribed items across all pages
    pub total: u32,
}

/// Remote metadata of a published item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub id: WorkshopItemId,
    pub title: String,
    pub description: String,
    /// Name the content is saved under when downloaded
    pub file_name: String,
    pub file_handle: ContentHandle,
    pub file_size: u64,
    /// Seconds since the Unix epoch
    pub time_created: u32,
    /// Seconds since the Unix epoch
    pub time_updated: u32,
    pub tags: Vec<String>,
}

/// Completion of a content download, before the bytes are read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedContent {
    pub handle: ContentHandle,
    pub file_name: String,
    pub size_in_bytes: usize,
}
