// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use steamworks::{
    Client, FileType, ItemState, PublishedFileId, PublishedFileVisibility, SteamError,
};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::platform::error::PlatformError;
use crate::platform::models::{
    AppId, ContentHandle, DownloadedContent, ENUMERATE_PAGE_SIZE, ItemDetails, PublishRequest,
    ResultCode, SubscribedPage, UpdateHandle, Visibility, WorkshopFileType, WorkshopItemId,
};
use crate::platform::traits::{RemoteStorage, Ugc};
use crate::utils::is_plain_file_name;

const CALLBACK_INTERVAL: Duration = Duration::from_millis(50);
const INSTALL_POLL_INTERVAL: Duration = Duration::from_millis(250);
const INSTALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Item content tracked between the details request and the read
struct ContentEntry {
    item: WorkshopItemId,
    file_name: String,
    installed: Option<PathBuf>,
}

struct PendingUpdate {
    item: WorkshopItemId,
    preview: Option<PathBuf>,
}

/// Steamworks-backed platform
///
/// Steam callbacks are pumped on a dedicated thread for as long as the
/// platform lives. Item content travels through the workshop install folder:
/// a content handle stands for one subscribed item until it is read.
pub struct SteamPlatform {
    client: Client,
    app_id: AppId,
    staging_dir: PathBuf,
    content: Mutex<HashMap<ContentHandle, ContentEntry>>,
    updates: Mutex<HashMap<UpdateHandle, PendingUpdate>>,
    next_update: AtomicU64,
    running: Arc<AtomicBool>,
}

fn steam_error(error: SteamError) -> PlatformError {
    match error {
        SteamError::IOFailure => PlatformError::IoFailure,
        SteamError::FileNotFound => PlatformError::Call(ResultCode::FileNotFound),
        SteamError::AccessDenied => PlatformError::Call(ResultCode::AccessDenied),
        SteamError::InvalidParameter => PlatformError::Call(ResultCode::InvalidParam),
        SteamError::LimitExceeded => PlatformError::Call(ResultCode::LimitExceeded),
        SteamError::Timeout => PlatformError::Call(ResultCode::Timeout),
        _ => PlatformError::Call(ResultCode::Fail),
    }
}

fn steam_visibility(visibility: Visibility) -> PublishedFileVisibility {
    match visibility {
        Visibility::Public => PublishedFileVisibility::Public,
        Visibility::FriendsOnly => PublishedFileVisibility::FriendsOnly,
        Visibility::Private => PublishedFileVisibility::Private,
    }
}

fn steam_file_type(file_type: WorkshopFileType) -> FileType {
    match file_type {
        WorkshopFileType::Community => FileType::Community,
        WorkshopFileType::Microtransaction => FileType::Microtransaction,
    }
}

/// Wait for a Steam call result delivered through a callback
async fn call_result<T>(
    rx: oneshot::Receiver<Result<T, SteamError>>,
) -> Result<T, PlatformError> {
    rx.await
        .map_err(|_| PlatformError::IoFailure)?
        .map_err(steam_error)
}

impl SteamPlatform {
    /// Initialize the Steam API for `app_id` and start pumping callbacks
    pub fn init(app_id: AppId, staging_dir: impl Into<PathBuf>) -> Result<Self, PlatformError> {
        let running = Arc::new(AtomicBool::new(true));
        let (tx, rx) = std::sync::mpsc::channel();

        let pump = Arc::clone(&running);
        std::thread::Builder::new()
            .name("steam-callbacks".to_string())
            .spawn(move || {
                let (client, single) = match Client::init_app(app_id.0) {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = tx.send(Err(e.to_string()));
                        return;
                    }
                };
                if tx.send(Ok(client)).is_err() {
                    return;
                }
                while pump.load(Ordering::Relaxed) {
                    single.run_callbacks();
                    std::thread::sleep(CALLBACK_INTERVAL);
                }
            })?;

        let client = match rx.recv() {
            Ok(Ok(client)) => client,
            Ok(Err(e)) => {
                warn!(app_id = %app_id, error = %e, "Steam API initialization failed");
                return Err(PlatformError::Call(ResultCode::Fail));
            }
            Err(_) => return Err(PlatformError::IoFailure),
        };

        info!(app_id = %app_id, "Steam platform initialized");

        Ok(Self {
            client,
            app_id,
            staging_dir: staging_dir.into(),
            content: Mutex::new(HashMap::new()),
            updates: Mutex::new(HashMap::new()),
            next_update: AtomicU64::new(1),
            running,
        })
    }

    fn steam_app_id(&self) -> steamworks::AppId {
        steamworks::AppId(self.app_id.0)
    }

    fn read_private_file(&self, name: &str) -> Result<Vec<u8>, PlatformError> {
        let file = self.client.remote_storage().file(name);
        if !file.exists() {
            return Err(PlatformError::Call(ResultCode::FileNotFound));
        }

        let mut content = Vec::new();
        file.read().read_to_end(&mut content)?;
        Ok(content)
    }

    /// Poll until Steam reports the item installed and up to date
    async fn wait_for_install(&self, id: PublishedFileId) -> Result<PathBuf, PlatformError> {
        let deadline = tokio::time::Instant::now() + INSTALL_TIMEOUT;
        let busy = ItemState::NEEDS_UPDATE | ItemState::DOWNLOADING | ItemState::DOWNLOAD_PENDING;

        loop {
            let folder = {
                let ugc = self.client.ugc();
                let state = ugc.item_state(id);
                if state.contains(ItemState::INSTALLED) && !state.intersects(busy) {
                    ugc.item_install_info(id).map(|info| PathBuf::from(info.folder))
                } else {
                    None
                }
            };
            if let Some(folder) = folder {
                return Ok(folder);
            }

            if tokio::time::Instant::now() >= deadline {
                warn!(item_id = id.0, "Timed out waiting for workshop item install");
                return Err(PlatformError::Call(ResultCode::Timeout));
            }
            tokio::time::sleep(INSTALL_POLL_INTERVAL).await;
        }
    }
}

impl Drop for SteamPlatform {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

#[async_trait]
impl RemoteStorage for SteamPlatform {
    async fn file_write(&self, name: &str, data: &[u8]) -> bool {
        let result = {
            let mut writer = self.client.remote_storage().file(name).write();
            writer.write_all(data)
        };

        match result {
            Ok(()) => {
                debug!(file_name = %name, bytes = data.len(), "Wrote Steam Cloud file");
                true
            }
            Err(e) => {
                warn!(file_name = %name, error = %e, "Failed to write Steam Cloud file");
                false
            }
        }
    }

    async fn file_exists(&self, name: &str) -> bool {
        self.client.remote_storage().file(name).exists()
    }

    async fn file_delete(&self, name: &str) -> bool {
        self.client.remote_storage().file(name).delete()
    }
}

#[async_trait]
impl Ugc for SteamPlatform {
    fn app_id(&self) -> AppId {
        self.app_id
    }

    async fn publish_workshop_file(
        &self,
        request: &PublishRequest,
    ) -> Result<WorkshopItemId, PlatformError> {
        if request.app_id != self.app_id || !is_plain_file_name(&request.file_name) {
            return Err(PlatformError::Call(ResultCode::InvalidParam));
        }

        // Workshop content is uploaded from a folder, so stage the private copy
        let content = self.read_private_file(&request.file_name)?;
        let staging = self.staging_dir.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&staging).await?;
        tokio::fs::write(staging.join(&request.file_name), &content).await?;

        let result = self.create_and_fill(request, &staging).await;
        if let Err(e) = tokio::fs::remove_dir_all(&staging).await {
            debug!(path = %staging.display(), error = %e, "Failed to remove staging folder");
        }
        result
    }

    async fn enumerate_user_subscribed_files(
        &self,
        start_index: u32,
    ) -> Result<SubscribedPage, PlatformError> {
        let subscribed = self.client.ugc().subscribed_items();
        let total = subscribed.len() as u32;

        let ids = subscribed
            .into_iter()
            .skip(start_index as usize)
            .take(ENUMERATE_PAGE_SIZE as usize)
            .map(|id| WorkshopItemId(id.0))
            .collect();

        Ok(SubscribedPage { ids, total })
    }

    async fn get_published_file_details(
        &self,
        id: WorkshopItemId,
    ) -> Result<ItemDetails, PlatformError> {
        let (tx, rx) = oneshot::channel();
        {
            let query = self
                .client
                .ugc()
                .query_item(PublishedFileId(id.0))
                .map_err(|_| PlatformError::Call(ResultCode::InvalidParam))?;
            query.fetch(move |result| {
                let first = result.and_then(|results| results.get(0).ok_or(SteamError::FileNotFound));
                let _ = tx.send(first);
            });
        }
        let item = call_result(rx).await?;

        // The item id doubles as its content handle; a new request replaces the old entry
        let handle = ContentHandle(id.0);
        self.content.lock().await.insert(
            handle,
            ContentEntry {
                item: id,
                file_name: item.file_name.clone(),
                installed: None,
            },
        );

        Ok(ItemDetails {
            id,
            title: item.title,
            description: item.description,
            file_name: item.file_name,
            file_handle: handle,
            file_size: u64::from(item.file_size),
            time_created: item.time_created,
            time_updated: item.time_updated,
            tags: item.tags,
        })
    }

    async fn ugc_download(&self, handle: ContentHandle) -> Result<DownloadedContent, PlatformError> {
        let (item, file_name) = {
            let content = self.content.lock().await;
            let entry = content
                .get(&handle)
                .ok_or(PlatformError::InvalidContentHandle(handle))?;
            (entry.item, entry.file_name.clone())
        };

        let published = PublishedFileId(item.0);
        if !self.client.ugc().download_item(published, true) {
            warn!(item_id = %item, "Steam refused to start the download");
            return Err(PlatformError::IoFailure);
        }

        let folder = self.wait_for_install(published).await?;
        let path = folder.join(&file_name);
        let size = tokio::fs::metadata(&path)
            .await
            .map_err(|_| PlatformError::IoFailure)?
            .len();

        if let Some(entry) = self.content.lock().await.get_mut(&handle) {
            entry.installed = Some(path);
        }

        debug!(item_id = %item, handle = %handle, size, "Content download complete");

        Ok(DownloadedContent {
            handle,
            file_name,
            size_in_bytes: size as usize,
        })
    }

    async fn ugc_read(&self, handle: ContentHandle, len: usize) -> Result<Vec<u8>, PlatformError> {
        let entry = self
            .content
            .lock()
            .await
            .remove(&handle)
            .ok_or(PlatformError::InvalidContentHandle(handle))?;
        let path = entry
            .installed
            .ok_or(PlatformError::InvalidContentHandle(handle))?;

        let mut content = tokio::fs::read(&path)
            .await
            .map_err(|_| PlatformError::IoFailure)?;
        content.truncate(len);
        Ok(content)
    }

    async fn subscribe_published_file(&self, id: WorkshopItemId) -> Result<(), PlatformError> {
        let (tx, rx) = oneshot::channel();
        self.client
            .ugc()
            .subscribe_item(PublishedFileId(id.0), move |result| {
                let _ = tx.send(result);
            });
        call_result(rx).await
    }

    async fn unsubscribe_published_file(&self, id: WorkshopItemId) -> Result<(), PlatformError> {
        let (tx, rx) = oneshot::channel();
        self.client
            .ugc()
            .unsubscribe_item(PublishedFileId(id.0), move |result| {
                let _ = tx.send(result);
            });
        call_result(rx).await
    }

    async fn start_item_update(
        &self,
        app_id: AppId,
        id: WorkshopItemId,
    ) -> Result<UpdateHandle, PlatformError> {
        if app_id != self.app_id {
            return Err(PlatformError::Call(ResultCode::InvalidParam));
        }

        let handle = UpdateHandle(self.next_update.fetch_add(1, Ordering::Relaxed));
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

        let (tx, rx) = oneshot::channel();
        {
            let mut builder = self
                .client
                .ugc()
                .start_item_update(self.steam_app_id(), PublishedFileId(update.item.0));
            if let Some(preview) = &update.preview {
                builder = builder.preview_path(preview);
            }
            builder.submit(Some(change_note), move |result| {
                let _ = tx.send(result);
            });
        }

        call_result(rx).await?;
        info!(item_id = %update.item, change_note = %change_note, "Submitted item update");
        Ok(())
    }
}

impl SteamPlatform {
    /// Create the item and upload the staged folder with its metadata
    async fn create_and_fill(
        &self,
        request: &PublishRequest,
        staging: &Path,
    ) -> Result<WorkshopItemId, PlatformError> {
        let (tx, rx) = oneshot::channel();
        self.client.ugc().create_item(
            self.steam_app_id(),
            steam_file_type(request.file_type),
            move |result| {
                let _ = tx.send(result);
            },
        );
        let (published, needs_agreement) = call_result(rx).await?;
        if needs_agreement {
            warn!(item_id = published.0, "Workshop legal agreement has not been accepted");
        }

        let (tx, rx) = oneshot::channel();
        {
            let mut builder = self
                .client
                .ugc()
                .start_item_update(self.steam_app_id(), published)
                .title(&request.title)
                .description(&request.description)
                .visibility(steam_visibility(request.visibility))
                .tags(request.tags.clone(), false)
                .content_path(staging);
            if let Some(preview) = &request.preview_file {
                builder = builder.preview_path(Path::new(preview));
            }
            builder.submit(None, move |result| {
                let _ = tx.send(result);
            });
        }
        call_result(rx).await?;

        let id = WorkshopItemId(published.0);
        info!(item_id = %id, file_name = %request.file_name, title = %request.title, "Published workshop item");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steam_error_mapping() {
        assert!(steam_error(SteamError::IOFailure).is_io_failure());
        assert_eq!(
            steam_error(SteamError::AccessDenied).code(),
            ResultCode::AccessDenied
        );
        assert_eq!(
            steam_error(SteamError::InvalidParameter).code(),
            ResultCode::InvalidParam
        );
        assert_eq!(steam_error(SteamError::Busy).code(), ResultCode::Fail);
    }

    #[test]
    fn test_visibility_mapping() {
        assert!(matches!(
            steam_visibility(Visibility::FriendsOnly),
            PublishedFileVisibility::FriendsOnly
        ));
        assert!(matches!(
            steam_file_type(WorkshopFileType::Community),
            FileType::Community
        ));
    }
}
