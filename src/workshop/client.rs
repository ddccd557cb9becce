// SPDX-License-Identifier: GPL-3.0-only
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{debug, info, warn};

use crate::platform::{Platform, WorkshopItemId};
use crate::workshop::error::WorkshopError;
use crate::workshop::models::{ClientOptions, FetchOutcome, SyncReport, UploadOutcome, UploadRequest};
use crate::workshop::sync;
use crate::workshop::upload::UploadSequence;

/// Workshop client: publishing, subscription sync and unsubscribe
///
/// Construct one per platform session and share it behind an `Arc`.
pub struct WorkshopClient<P: Platform> {
    platform: Arc<P>,
    content_dir: PathBuf,
    thumbnail_delay: Duration,
    subscribed: RwLock<Vec<WorkshopItemId>>,
    fetched: watch::Sender<bool>,
    sync_lock: Mutex<()>,
}

impl<P: Platform> WorkshopClient<P> {
    pub fn new(platform: Arc<P>, options: ClientOptions) -> Self {
        let (fetched, _) = watch::channel(false);
        Self {
            platform,
            content_dir: options.content_dir,
            thumbnail_delay: options.thumbnail_delay,
            subscribed: RwLock::new(Vec::new()),
            fetched,
            sync_lock: Mutex::new(()),
        }
    }

    /// Write, publish and thumbnail a file
    ///
    /// Every failure is logged and reported through the outcome; nothing is
    /// retried.
    pub async fn save_to_workshop(&self, request: UploadRequest) -> UploadOutcome {
        info!(file_name = %request.file_name, title = %request.title, "Saving file to workshop");
        UploadSequence::new(self.platform.as_ref(), self.thumbnail_delay)
            .run(request)
            .await
    }

    /// Replace the subscribed list and sync every item in it, one at a time
    pub async fn get_subscribed_items(&self) -> Result<SyncReport, WorkshopError> {
        let _sync = self.sync_lock.lock().await;
        let count = self.replace_subscriptions().await?;
        self.download_files(count).await
    }

    /// Replace the subscribed list without downloading anything
    pub async fn refresh_subscriptions(&self) -> Result<usize, WorkshopError> {
        let _sync = self.sync_lock.lock().await;
        self.replace_subscriptions().await
    }

    async fn replace_subscriptions(&self) -> Result<usize, WorkshopError> {
        let ids = match sync::collect_subscriptions(self.platform.as_ref()).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Failed to enumerate subscribed items");
                self.subscribed.write().await.clear();
                return Err(e.into());
            }
        };

        info!(count = ids.len(), "Fetched subscribed items");
        let count = ids.len();
        *self.subscribed.write().await = ids;
        Ok(count)
    }

    async fn download_files(&self, count: usize) -> Result<SyncReport, WorkshopError> {
        let mut report = SyncReport::default();

        for index in 0..count {
            let (id, outcome) = self.fetch_index(index).await?;
            report.items.push((id, outcome));
            // Flag observers see the resolved item before the next one clears it
            tokio::task::yield_now().await;
        }

        info!(
            downloaded = report.downloaded(),
            up_to_date = report.up_to_date(),
            failed = report.failed(),
            "Subscribed item sync finished"
        );
        Ok(report)
    }

    /// Download the item at `index` of the subscribed list if it is missing or outdated
    pub async fn get_item_content(&self, index: usize) -> Result<FetchOutcome, WorkshopError> {
        self.fetch_index(index).await.map(|(_, outcome)| outcome)
    }

    async fn fetch_index(
        &self,
        index: usize,
    ) -> Result<(WorkshopItemId, FetchOutcome), WorkshopError> {
        let id = {
            let list = self.subscribed.read().await;
            list.get(index)
                .copied()
                .ok_or(WorkshopError::IndexOutOfRange {
                    index,
                    len: list.len(),
                })?
        };

        self.fetched.send_replace(false);
        let outcome = sync::fetch_item(self.platform.as_ref(), &self.content_dir, id).await;
        self.fetched.send_replace(true);

        Ok((id, outcome))
    }

    pub async fn subscribe(&self, id: WorkshopItemId) -> Result<(), WorkshopError> {
        self.platform.subscribe_published_file(id).await?;
        debug!(item_id = %id, "Subscribed to workshop item");
        Ok(())
    }

    pub async fn unsubscribe(&self, id: WorkshopItemId) -> Result<(), WorkshopError> {
        match self.platform.unsubscribe_published_file(id).await {
            Ok(()) => {
                debug!(item_id = %id, "Unsubscribed from workshop item");
                Ok(())
            }
            Err(e) => {
                warn!(item_id = %id, error = %e, "Failed to unsubscribe from workshop item");
                Err(e.into())
            }
        }
    }

    /// Delete a file from private storage
    pub async fn delete_file(&self, file_name: &str) -> bool {
        self.platform.file_delete(file_name).await
    }

    /// Snapshot of the last enumerated subscription list
    pub async fn subscribed_items(&self) -> Vec<WorkshopItemId> {
        self.subscribed.read().await.clone()
    }

    /// Observe the "current item resolved" flag
    pub fn fetched(&self) -> watch::Receiver<bool> {
        self.fetched.subscribe()
    }

    pub fn is_fetched(&self) -> bool {
        *self.fetched.borrow()
    }
}
