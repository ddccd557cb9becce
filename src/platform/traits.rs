// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use std::path::Path;

use crate::platform::error::PlatformError;
use crate::platform::models::{
    AppId, ContentHandle, DownloadedContent, ItemDetails, PublishRequest, SubscribedPage,
    UpdateHandle, WorkshopItemId,
};

/// Per-application private file storage
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// Write bytes to a private slot under a logical name
    async fn file_write(&self, name: &str, data: &[u8]) -> bool;

    /// Check whether a private slot with this name exists
    async fn file_exists(&self, name: &str) -> bool;

    /// Delete a private slot by name
    async fn file_delete(&self, name: &str) -> bool;
}

/// User-generated content calls: publish, enumerate, fetch, update
#[async_trait]
pub trait Ugc: Send + Sync {
    /// Application the client publishes and reads items for
    fn app_id(&self) -> AppId;

    /// Publish a private storage file as a new workshop item
    async fn publish_workshop_file(
        &self,
        request: &PublishRequest,
    ) -> Result<WorkshopItemId, PlatformError>;

    /// Enumerate subscribed item ids starting at `start_index`
    async fn enumerate_user_subscribed_files(
        &self,
        start_index: u32,
    ) -> Result<SubscribedPage, PlatformError>;

    /// Fetch remote metadata, including a fresh content handle
    async fn get_published_file_details(
        &self,
        id: WorkshopItemId,
    ) -> Result<ItemDetails, PlatformError>;

    /// Download the content behind a handle
    async fn ugc_download(&self, handle: ContentHandle) -> Result<DownloadedContent, PlatformError>;

    /// Read up to `len` downloaded bytes and close the handle
    async fn ugc_read(&self, handle: ContentHandle, len: usize) -> Result<Vec<u8>, PlatformError>;

    /// Add an item to the current user's subscriptions
    async fn subscribe_published_file(&self, id: WorkshopItemId) -> Result<(), PlatformError>;

    async fn unsubscribe_published_file(&self, id: WorkshopItemId) -> Result<(), PlatformError>;

    /// Open an update session for an existing item
    async fn start_item_update(
        &self,
        app_id: AppId,
        id: WorkshopItemId,
    ) -> Result<UpdateHandle, PlatformError>;

    /// Stage a preview image; `false` if the update handle is unknown
    async fn set_item_preview(&self, handle: UpdateHandle, preview: &Path) -> bool;

    /// Commit an update session
    async fn submit_item_update(
        &self,
        handle: UpdateHandle,
        change_note: &str,
    ) -> Result<(), PlatformError>;
}

/// Everything the workshop client needs from the platform SDK
pub trait Platform: RemoteStorage + Ugc {}

impl<T: RemoteStorage + Ugc> Platform for T {}
