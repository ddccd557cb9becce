// SPDX-License-Identifier: GPL-3.0-only
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::platform::{Platform, PublishRequest, Visibility, WorkshopFileType, WorkshopItemId};
use crate::workshop::models::{ThumbnailOutcome, UploadOutcome, UploadRequest};

const THUMBNAIL_CHANGE_NOTE: &str = "Add Screenshot";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    WritingLocal,
    Publishing,
    AttachingThumbnail,
    Done,
    Failed,
}

impl UploadState {
    fn can_transition_to(self, next: UploadState) -> bool {
        use UploadState::*;
        matches!(
            (self, next),
            (Idle, WritingLocal)
                | (Idle, Failed)
                | (WritingLocal, Publishing)
                | (WritingLocal, Failed)
                | (Publishing, AttachingThumbnail)
                | (Publishing, Failed)
                | (AttachingThumbnail, Done)
        )
    }
}

/// State carried from the save request to the thumbnail step
#[derive(Debug, Clone)]
struct PendingUpload {
    file_name: String,
    thumbnail_path: PathBuf,
}

/// One save-to-workshop run
pub(crate) struct UploadSequence<'a, P: Platform + ?Sized> {
    platform: &'a P,
    thumbnail_delay: Duration,
    state: UploadState,
}

impl<'a, P: Platform + ?Sized> UploadSequence<'a, P> {
    pub(crate) fn new(platform: &'a P, thumbnail_delay: Duration) -> Self {
        Self {
            platform,
            thumbnail_delay,
            state: UploadState::Idle,
        }
    }

    fn transition(&mut self, next: UploadState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid upload transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(from = ?self.state, to = ?next, "Upload state transition");
        self.state = next;
    }

    pub(crate) async fn run(mut self, request: UploadRequest) -> UploadOutcome {
        let UploadRequest {
            file_name,
            contents,
            title,
            description,
            tags,
            thumbnail_path,
        } = request;

        if self.platform.file_exists(&file_name).await {
            info!(file_name = %file_name, "Item with that filename already exists");
            self.transition(UploadState::Failed);
            return UploadOutcome::AlreadyExists;
        }

        self.transition(UploadState::WritingLocal);
        if !self.platform.file_write(&file_name, &contents).await {
            warn!(file_name = %file_name, "Upload cannot be completed, private storage write failed");
            self.transition(UploadState::Failed);
            return UploadOutcome::WriteFailed;
        }

        let pending = PendingUpload {
            file_name,
            thumbnail_path,
        };

        self.transition(UploadState::Publishing);
        let publish = PublishRequest {
            file_name: pending.file_name.clone(),
            preview_file: None,
            app_id: self.platform.app_id(),
            title,
            description,
            visibility: Visibility::Public,
            tags,
            file_type: WorkshopFileType::Community,
        };

        let item_id = match self.platform.publish_workshop_file(&publish).await {
            Ok(item_id) => item_id,
            Err(e) => {
                // The private copy stays behind; nothing cleans it up
                warn!(file_name = %pending.file_name, error = %e, "File upload failed");
                self.transition(UploadState::Failed);
                return UploadOutcome::PublishFailed {
                    code: e.code(),
                    io_failure: e.is_io_failure(),
                };
            }
        };
        info!(item_id = %item_id, file_name = %pending.file_name, "File upload success, starting thumbnail upload");

        self.transition(UploadState::AttachingThumbnail);
        tokio::time::sleep(self.thumbnail_delay).await;
        let thumbnail = self.attach_thumbnail(item_id, &pending.thumbnail_path).await;

        if !self.platform.file_delete(&pending.file_name).await {
            warn!(file_name = %pending.file_name, "Failed to delete private storage copy");
        }

        self.transition(UploadState::Done);
        UploadOutcome::Published { item_id, thumbnail }
    }

    async fn attach_thumbnail(&self, item_id: WorkshopItemId, image: &Path) -> ThumbnailOutcome {
        let handle = match self
            .platform
            .start_item_update(self.platform.app_id(), item_id)
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                warn!(item_id = %item_id, error = %e, "Could not start item update, file upload succeeded");
                return ThumbnailOutcome::UpdateFailed(e.code());
            }
        };

        if !self.platform.set_item_preview(handle, image).await {
            warn!(item_id = %item_id, path = %image.display(), "Thumbnail upload initialization failed, but file upload succeeded");
            return ThumbnailOutcome::PreviewRejected;
        }
        debug!(item_id = %item_id, path = %image.display(), "Thumbnail upload initialization success");

        match self
            .platform
            .submit_item_update(handle, THUMBNAIL_CHANGE_NOTE)
            .await
        {
            Ok(()) => {
                info!(item_id = %item_id, "The item is now uploaded with a thumbnail");
                ThumbnailOutcome::Attached
            }
            Err(e) => {
                warn!(item_id = %item_id, error = %e, "The item is now uploaded without a thumbnail");
                ThumbnailOutcome::SubmitFailed(e.code())
            }
        }
    }
}
