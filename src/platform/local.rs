// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::platform::error::PlatformError;
use crate::platform::models::{
    AppId, ContentHandle, DownloadedContent, ENUMERATE_PAGE_SIZE, ItemDetails, PublishRequest,
    ResultCode, SubscribedPage, UpdateHandle, Visibility, WorkshopFileType, WorkshopItemId,
};
use crate::platform::traits::{RemoteStorage, Ugc};
use crate::utils::is_plain_file_name;

const STORAGE_DIR: &str = "storage";
const ITEMS_DIR: &str = "items";
const SUBSCRIPTIONS_FILE: &str = "subscriptions.json";

/// Metadata stored next to the content of each published item
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ItemRecord {
    id: WorkshopItemId,
    app_id: AppId,
    title: String,
    description: String,
    file_name: String,
    visibility: Visibility,
    file_type: WorkshopFileType,
    tags: Vec<String>,
    preview: Option<PathBuf>,
    time_created: u32,
    time_updated: u32,
}

#[derive(Debug, Clone)]
struct PendingUpdate {
    item: WorkshopItemId,
    preview: Option<PathBuf>,
}

/// Filesystem-backed stand-in for the platform SDK
///
/// Private storage slots, published items and the subscription list all live
/// under one root directory. Content handles and update handles are process
/// local, like the SDK's.
pub struct LocalPlatform {
    root: PathBuf,
    app_id: AppId,
    content_handles: Mutex<HashMap<ContentHandle, WorkshopItemId>>,
    updates: Mutex<HashMap<UpdateHandle, PendingUpdate>>,
    subscriptions_lock: Mutex<()>,
}

fn now_secs() -> u32 {
    Utc::now().timestamp().clamp(0, u32::MAX as i64) as u32
}

fn random_u64() -> u64 {
    // Top bit cleared so ids stay positive in signed consumers
    Uuid::new_v4().as_u64_pair().0 >> 1
}

impl LocalPlatform {
    /// Open (and create if needed) a platform root directory
    pub async fn open(root: impl Into<PathBuf>, app_id: AppId) -> Result<Self, PlatformError> {
        let root = root.into();
        tokio::fs::create_dir_all(root.join(STORAGE_DIR)).await?;
        tokio::fs::create_dir_all(root.join(ITEMS_DIR)).await?;

        info!(root = %root.display(), app_id = %app_id, "Local platform opened");

        Ok(Self {
            root,
            app_id,
            content_handles: Mutex::new(HashMap::new()),
            updates: Mutex::new(HashMap::new()),
            subscriptions_lock: Mutex::new(()),
        })
    }

    fn storage_path(&self, name: &str) -> Option<PathBuf> {
        if !is_plain_file_name(name) {
            warn!(file_name = %name, "Rejected private storage name");
            return None;
        }
        Some(self.root.join(STORAGE_DIR).join(name))
    }

    fn item_meta_path(&self, id: WorkshopItemId) -> PathBuf {
        self.root.join(ITEMS_DIR).join(format!("{}.json", id.0))
    }

    fn item_content_path(&self, id: WorkshopItemId) -> PathBuf {
        self.root.join(ITEMS_DIR).join(format!("{}.bin", id.0))
    }

    /// Size of an item's published content; a missing blob is a transfer failure
    async fn content_size(&self, id: WorkshopItemId) -> Result<u64, PlatformError> {
        match tokio::fs::metadata(self.item_content_path(id)).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(item_id = %id, "Published content is missing");
                Err(PlatformError::IoFailure)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn read_item(&self, id: WorkshopItemId) -> Result<ItemRecord, PlatformError> {
        match tokio::fs::read(self.item_meta_path(id)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PlatformError::Call(ResultCode::FileNotFound))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write_item(&self, record: &ItemRecord) -> Result<(), PlatformError> {
        let json = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(self.item_meta_path(record.id), json).await?;
        Ok(())
    }

    async fn read_subscriptions(&self) -> Result<Vec<WorkshopItemId>, PlatformError> {
        match tokio::fs::read(self.root.join(SUBSCRIPTIONS_FILE)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_subscriptions(&self, ids: &[WorkshopItemId]) -> Result<(), PlatformError> {
        let json = serde_json::to_vec_pretty(ids)?;
        tokio::fs::write(self.root.join(SUBSCRIPTIONS_FILE), json).await?;
        Ok(())
    }

    #[cfg(test)]
    pub async fn set_time_updated(
        &self,
        id: WorkshopItemId,
        time_updated: u32,
    ) -> Result<(), PlatformError> {
        let mut record = self.read_item(id).await?;
        record.time_updated = time_updated;
        self.write_item(&record).await
    }

    #[cfg(test)]
    pub async fn preview_of(&self, id: WorkshopItemId) -> Result<Option<PathBuf>, PlatformError> {
        Ok(self.read_item(id).await?.preview)
    }
}

#[async_trait]
impl RemoteStorage for LocalPlatform {
    async fn file_write(&self, name: &str, data: &[u8]) -> bool {
        let Some(path) = self.storage_path(name) else {
            return false;
        };

        match tokio::fs::write(&path, data).await {
            Ok(()) => {
                debug!(file_name = %name, bytes = data.len(), "Wrote private storage file");
                true
            }
            Err(e) => {
                warn!(file_name = %name, error = %e, "Failed to write private storage file");
                false
            }
        }
    }

    async fn file_exists(&self, name: &str) -> bool {
        match self.storage_path(name) {
            Some(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            None => false,
        }
    }

    async fn file_delete(&self, name: &str) -> bool {
        let Some(path) = self.storage_path(name) else {
            return false;
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(file_name = %name, "Deleted private storage file");
                true
            }
            Err(e) => {
                debug!(file_name = %name, error = %e, "Failed to delete private storage file");
                false
            }
        }
    }
}

#[async_trait]
impl Ugc for LocalPlatform {
    fn app_id(&self) -> AppId {
        self.app_id
    }

    async fn publish_workshop_file(
        &self,
        request: &PublishRequest,
    ) -> Result<WorkshopItemId, PlatformError> {
        if request.app_id != self.app_id {
            return Err(PlatformError::Call(ResultCode::InvalidParam));
        }

        let source = self
            .storage_path(&request.file_name)
            .ok_or(PlatformError::Call(ResultCode::InvalidParam))?;
        let content = match tokio::fs::read(&source).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PlatformError::Call(ResultCode::FileNotFound));
            }
            Err(e) => return Err(e.into()),
        };

        let id = WorkshopItemId(random_u64());
        let now = now_secs();
        let record = ItemRecord {
            id,
            app_id: request.app_id,
            title: request.title.clone(),
            description: request.description.clone(),
            file_name: request.file_name.clone(),
            visibility: request.visibility,
            file_type: request.file_type,
            tags: request.tags.clone(),
            preview: request.preview_file.as_ref().map(PathBuf::from),
            time_created: now,
            time_updated: now,
        };

        tokio::fs::write(self.item_content_path(id), &content).await?;
        self.write_item(&record).await?;

        info!(item_id = %id, file_name = %request.file_name, title = %request.title, "Published workshop item");
        Ok(id)
    }

    async fn enumerate_user_subscribed_files(
        &self,
        start_index: u32,
    ) -> Result<SubscribedPage, PlatformError> {
        let subscriptions = {
            let _guard = self.subscriptions_lock.lock().await;
            self.read_subscriptions().await?
        };

        let ids = subscriptions
            .iter()
            .skip(start_index as usize)
            .take(ENUMERATE_PAGE_SIZE as usize)
            .copied()
            .collect();

        Ok(SubscribedPage {
            ids,
            total: subscriptions.len() as u32,
        })
    }

    async fn get_published_file_details(
        &self,
        id: WorkshopItemId,
    ) -> Result<ItemDetails, PlatformError> {
        let record = self.read_item(id).await?;
        let file_size = self.content_size(id).await?;

        // One live handle per item; a fresh details request supersedes the old one
        let handle = ContentHandle(random_u64());
        let mut handles = self.content_handles.lock().await;
        handles.retain(|_, item| *item != id);
        handles.insert(handle, id);
        drop(handles);

        Ok(ItemDetails {
            id,
            title: record.title,
            description: record.description,
            file_name: record.file_name,
            file_handle: handle,
            file_size,
            time_created: record.time_created,
            time_updated: record.time_updated,
            tags: record.tags,
        })
    }

    async fn ugc_download(&self, handle: ContentHandle) -> Result<DownloadedContent, PlatformError> {
        let id = self
            .content_handles
            .lock()
            .await
            .get(&handle)
            .copied()
            .ok_or(PlatformError::InvalidContentHandle(handle))?;

        let record = self.read_item(id).await?;
        let size = self.content_size(id).await?;

        debug!(item_id = %id, handle = %handle, size, "Content download complete");

        Ok(DownloadedContent {
            handle,
            file_name: record.file_name,
            size_in_bytes: size as usize,
        })
    }

    async fn ugc_read(&self, handle: ContentHandle, len: usize) -> Result<Vec<u8>, PlatformError> {
        // Reading closes the handle whatever the outcome
        let id = self
            .content_handles
            .lock()
            .await
            .remove(&handle)
            .ok_or(PlatformError::InvalidContentHandle(handle))?;

        let mut content = match tokio::fs::read(self.item_content_path(id)).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PlatformError::IoFailure);
            }
            Err(e) => return Err(e.into()),
        };
        content.truncate(len);
        Ok(content)
    }

    async fn subscribe_published_file(&self, id: WorkshopItemId) -> Result<(), PlatformError> {
        if !self.item_meta_path(id).exists() {
            return Err(PlatformError::Call(ResultCode::FileNotFound));
        }

        let _guard = self.subscriptions_lock.lock().await;
        let mut subscriptions = self.read_subscriptions().await?;
        if !subscriptions.contains(&id) {
            subscriptions.push(id);
            self.write_subscriptions(&subscriptions).await?;
            info!(item_id = %id, "Subscribed to workshop item");
        }
        Ok(())
    }

    async fn unsubscribe_published_file(&self, id: WorkshopItemId) -> Result<(), PlatformError> {
        let _guard = self.subscriptions_lock.lock().await;
        let mut subscriptions = self.read_subscriptions().await?;
        let before = subscriptions.len();
        subscriptions.retain(|s| *s != id);

        if subscriptions.len() == before {
            return Err(PlatformError::Call(ResultCode::FileNotFound));
        }

        self.write_subscriptions(&subscriptions).await?;
        info!(item_id = %id, "Unsubscribed from workshop item");
        Ok(())
    }

    async fn start_item_update(
        &self,
        app_id: AppId,
        id: WorkshopItemId,
    ) -> Result<UpdateHandle, PlatformError> {
        if app_id != self.app_id {
            return Err(PlatformError::Call(ResultCode::InvalidParam));
        }
        // Make sure the item exists before handing out a session
        self.read_item(id).await?;

        let handle = UpdateHandle(random_u64());
        self.updates.lock().await.insert(
            handle,
            PendingUpdate {
                item: id,
                preview: None,
            },
        );
        Ok(handle)
    }

    async fn set_item_preview(&self, handle: UpdateHandle, preview: &Path) -> bool {
        match self.updates.lock().await.get_mut(&handle) {
            Some(update) => {
                update.preview = Some(preview.to_path_buf());
                true
            }
            None => false,
        }
    }

    async fn submit_item_update(
        &self,
        handle: UpdateHandle,
        change_note: &str,
    ) -> Result<(), PlatformError> {
        let update = self
            .updates
            .lock()
            .await
            .remove(&handle)
            .ok_or(PlatformError::InvalidUpdateHandle(handle))?;

        let mut record = self.read_item(update.item).await?;
        if let Some(preview) = update.preview {
            if !tokio::fs::try_exists(&preview).await.unwrap_or(false) {
                warn!(path = %preview.display(), "Preview image not found");
                return Err(PlatformError::Call(ResultCode::FileNotFound));
            }
            record.preview = Some(preview);
        }
        record.time_updated = now_secs().max(record.time_updated);
        self.write_item(&record).await?;

        info!(item_id = %update.item, change_note = %change_note, "Submitted item update");
        Ok(())
    }
}
