// SPDX-License-Identifier: GPL-3.0-only
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::platform::{ResultCode, WorkshopItemId};

/// Everything needed to publish one file with a thumbnail
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Private storage name; also the name subscribers download the file as
    pub file_name: String,
    pub contents: Vec<u8>,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    /// Absolute path of the thumbnail image
    pub thumbnail_path: PathBuf,
}

impl UploadRequest {
    pub fn new(
        file_name: impl Into<String>,
        contents: impl Into<Vec<u8>>,
        title: impl Into<String>,
        description: impl Into<String>,
        thumbnail_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            contents: contents.into(),
            title: title.into(),
            description: description.into(),
            tags: Vec::new(),
            thumbnail_path: thumbnail_path.into(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailOutcome {
    Attached,
    /// The update session could not be opened
    UpdateFailed(ResultCode),
    /// The platform refused the preview image before submission
    PreviewRejected,
    SubmitFailed(ResultCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// A private storage file with this name already exists; nothing was sent
    AlreadyExists,
    WriteFailed,
    PublishFailed { code: ResultCode, io_failure: bool },
    Published {
        item_id: WorkshopItemId,
        thumbnail: ThumbnailOutcome,
    },
}

impl UploadOutcome {
    pub fn item_id(&self) -> Option<WorkshopItemId> {
        match self {
            UploadOutcome::Published { item_id, .. } => Some(*item_id),
            _ => None,
        }
    }
}

/// Result of the download-or-skip decision for one subscribed item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Remote metadata could not be fetched
    Unavailable,
    UpToDate { path: PathBuf },
    Downloaded { path: PathBuf, bytes: usize },
    DownloadFailed { path: PathBuf },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub items: Vec<(WorkshopItemId, FetchOutcome)>,
}

impl SyncReport {
    pub fn downloaded(&self) -> usize {
        self.count(|o| matches!(o, FetchOutcome::Downloaded { .. }))
    }

    pub fn up_to_date(&self) -> usize {
        self.count(|o| matches!(o, FetchOutcome::UpToDate { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| {
            matches!(o, FetchOutcome::Unavailable | FetchOutcome::DownloadFailed { .. })
        })
    }

    fn count(&self, pred: impl Fn(&FetchOutcome) -> bool) -> usize {
        self.items.iter().filter(|(_, o)| pred(o)).count()
    }
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Directory subscribed item content is written to
    pub content_dir: PathBuf,
    /// Wait between a successful publish and the thumbnail attach
    pub thumbnail_delay: Duration,
}

impl From<&Config> for ClientOptions {
    fn from(config: &Config) -> Self {
        Self {
            content_dir: config.content_dir.clone(),
            thumbnail_delay: Duration::from_millis(config.thumbnail_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_request_new() {
        let request = UploadRequest::new("map.txt", "data", "Title", "Desc", "/tmp/thumb.png")
            .with_tags(["a", "b"]);

        assert_eq!(request.file_name, "map.txt");
        assert_eq!(request.contents, b"data".to_vec());
        assert_eq!(request.tags, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(request.thumbnail_path, PathBuf::from("/tmp/thumb.png"));
    }

    #[test]
    fn test_sync_report_counts() {
        let report = SyncReport {
            items: vec![
                (WorkshopItemId(1), FetchOutcome::Unavailable),
                (
                    WorkshopItemId(2),
                    FetchOutcome::Downloaded {
                        path: PathBuf::from("a"),
                        bytes: 3,
                    },
                ),
                (
                    WorkshopItemId(3),
                    FetchOutcome::UpToDate {
                        path: PathBuf::from("b"),
                    },
                ),
                (
                    WorkshopItemId(4),
                    FetchOutcome::DownloadFailed {
                        path: PathBuf::from("c"),
                    },
                ),
            ],
        };

        assert_eq!(report.downloaded(), 1);
        assert_eq!(report.up_to_date(), 1);
        assert_eq!(report.failed(), 2);
    }

    #[test]
    fn test_client_options_from_config() {
        let config = Config::default();
        let options = ClientOptions::from(&config);
        assert_eq!(options.content_dir, config.content_dir);
        assert_eq!(options.thumbnail_delay, Duration::from_secs(1));
    }
}
