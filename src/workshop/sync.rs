// SPDX-License-Identifier: GPL-3.0-only
use chrono::Utc;
use std::path::Path;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::platform::{ContentHandle, Platform, PlatformError, WorkshopItemId};
use crate::utils::resolve_content_path;
use crate::workshop::models::FetchOutcome;

/// Decide whether the local copy of an item gets overwritten
///
/// A missing local file is always fetched. An existing one is only replaced
/// when the remote update time lies strictly after `now`; the local file's own
/// age plays no part.
pub fn needs_overwrite(local_exists: bool, remote_time_updated: u32, now: i64) -> bool {
    !local_exists || i64::from(remote_time_updated) > now
}

/// Collect every subscribed id, following the platform's pagination
pub(crate) async fn collect_subscriptions<P: Platform + ?Sized>(
    platform: &P,
) -> Result<Vec<WorkshopItemId>, PlatformError> {
    let mut ids: Vec<WorkshopItemId> = Vec::new();

    loop {
        let page = platform
            .enumerate_user_subscribed_files(ids.len() as u32)
            .await?;
        let total = page.total as usize;

        if page.ids.is_empty() {
            if ids.len() < total {
                warn!(collected = ids.len(), total, "Subscription enumeration ended early");
            }
            break;
        }

        ids.extend(page.ids);
        if ids.len() >= total {
            break;
        }
    }

    Ok(ids)
}

/// Fetch metadata for one item and download it if the local copy needs it
pub(crate) async fn fetch_item<P: Platform + ?Sized>(
    platform: &P,
    content_dir: &Path,
    id: WorkshopItemId,
) -> FetchOutcome {
    let details = match platform.get_published_file_details(id).await {
        Ok(details) => details,
        Err(e) => {
            warn!(item_id = %id, error = %e, "Unable to get details for workshop item");
            return FetchOutcome::Unavailable;
        }
    };

    let Some(path) = resolve_content_path(content_dir, &details.file_name) else {
        warn!(item_id = %id, file_name = %details.file_name, "Workshop item has an unusable file name");
        return FetchOutcome::Unavailable;
    };

    let local_exists = tokio::fs::try_exists(&path).await.unwrap_or(false);
    if local_exists {
        debug!(item_id = %id, path = %path.display(), "File exists, checking whether it is outdated");
    } else {
        debug!(item_id = %id, path = %path.display(), "File doesn't exist, downloading it");
    }

    if !needs_overwrite(local_exists, details.time_updated, Utc::now().timestamp()) {
        info!(item_id = %id, path = %path.display(), "File is up to date");
        return FetchOutcome::UpToDate { path };
    }

    match download(platform, details.file_handle, &path).await {
        Ok(bytes) => {
            info!(item_id = %id, path = %path.display(), bytes, "Downloaded workshop item");
            FetchOutcome::Downloaded { path, bytes }
        }
        Err(e) => {
            warn!(item_id = %id, path = %path.display(), error = %e, "Failed to download workshop item");
            FetchOutcome::DownloadFailed { path }
        }
    }
}

async fn download<P: Platform + ?Sized>(
    platform: &P,
    handle: ContentHandle,
    path: &Path,
) -> Result<usize, PlatformError> {
    let downloaded = platform.ugc_download(handle).await?;
    let content = platform.ugc_read(handle, downloaded.size_in_bytes).await?;

    replace_file(path, &content).await?;
    Ok(content.len())
}

/// Write `content` next to `path` and move it into place
///
/// The existing file is only replaced once the new bytes are fully on disk.
async fn replace_file(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    tokio::fs::create_dir_all(parent).await?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let partial = parent.join(format!(".{file_name}.{}.part", Uuid::new_v4()));

    let result = match tokio::fs::write(&partial, content).await {
        Ok(()) => tokio::fs::rename(&partial, path).await,
        Err(e) => Err(e),
    };
    if result.is_err() {
        let _ = tokio::fs::remove_file(&partial).await;
    }
    result
}
