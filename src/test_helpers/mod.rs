// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::watch;

use crate::config::{Backend, Config};
use crate::platform::models::{
    DownloadedContent, ENUMERATE_PAGE_SIZE, ItemDetails, SubscribedPage, UpdateHandle,
};
use crate::platform::traits::{RemoteStorage, Ugc};
use crate::platform::{
    AppId, ContentHandle, PlatformError, PublishRequest, ResultCode, WorkshopItemId,
};

/// A platform call as seen by `MockPlatform`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FileWrite(String),
    FileExists(String),
    FileDelete(String),
    Publish(String),
    Enumerate(u32),
    Details(WorkshopItemId),
    Download(ContentHandle),
    Read(ContentHandle),
    Subscribe(WorkshopItemId),
    Unsubscribe(WorkshopItemId),
    StartItemUpdate(WorkshopItemId),
    SetItemPreview(PathBuf),
    SubmitItemUpdate(String),
}

#[derive(Debug, Clone)]
struct MockItem {
    file_name: String,
    content: Vec<u8>,
    time_updated: u32,
}

#[derive(Default)]
struct Failures {
    write: bool,
    publish: Option<ResultCode>,
    enumerate: bool,
    download: bool,
    start_update: Option<ResultCode>,
    preview: bool,
    submit: Option<ResultCode>,
}

#[derive(Default)]
struct MockState {
    calls: Vec<Call>,
    storage: HashMap<String, Vec<u8>>,
    items: HashMap<WorkshopItemId, MockItem>,
    subscriptions: Vec<WorkshopItemId>,
    handles: HashMap<ContentHandle, WorkshopItemId>,
    publishes: Vec<PublishRequest>,
    next_id: u64,
    failures: Failures,
    flag: Option<watch::Receiver<bool>>,
    flag_at_details: Vec<bool>,
}

/// In-memory platform with scripted failures and a call log
pub struct MockPlatform {
    state: Mutex<MockState>,
}

impl MockPlatform {
    pub const APP_ID: AppId = AppId(480);

    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_id: 1000,
                ..MockState::default()
            }),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MockState) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    fn record(&self, call: Call) {
        self.with_state(|s| s.calls.push(call));
    }

    pub fn put_storage(&self, name: &str, data: &[u8]) {
        self.with_state(|s| s.storage.insert(name.to_string(), data.to_vec()));
    }

    pub fn storage(&self, name: &str) -> Option<Vec<u8>> {
        self.with_state(|s| s.storage.get(name).cloned())
    }

    /// Register a published item and return its id
    pub fn add_item(&self, file_name: &str, content: &[u8], time_updated: u32) -> WorkshopItemId {
        self.with_state(|s| {
            let id = WorkshopItemId(s.next_id);
            s.next_id += 1;
            s.items.insert(
                id,
                MockItem {
                    file_name: file_name.to_string(),
                    content: content.to_vec(),
                    time_updated,
                },
            );
            id
        })
    }

    pub fn set_subscriptions(&self, ids: Vec<WorkshopItemId>) {
        self.with_state(|s| s.subscriptions = ids);
    }

    pub fn fail_writes(&self) {
        self.with_state(|s| s.failures.write = true);
    }

    pub fn fail_publish(&self, code: ResultCode) {
        self.with_state(|s| s.failures.publish = Some(code));
    }

    pub fn fail_enumerate(&self) {
        self.with_state(|s| s.failures.enumerate = true);
    }

    pub fn fail_downloads(&self) {
        self.with_state(|s| s.failures.download = true);
    }

    pub fn fail_start_update(&self, code: ResultCode) {
        self.with_state(|s| s.failures.start_update = Some(code));
    }

    pub fn reject_preview(&self) {
        self.with_state(|s| s.failures.preview = true);
    }

    pub fn fail_submit(&self, code: ResultCode) {
        self.with_state(|s| s.failures.submit = Some(code));
    }

    /// Record the fetched flag's value at every details request
    pub fn observe_flag(&self, flag: watch::Receiver<bool>) {
        self.with_state(|s| s.flag = Some(flag));
    }

    pub fn flag_at_details(&self) -> Vec<bool> {
        self.with_state(|s| s.flag_at_details.clone())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.with_state(|s| s.calls.clone())
    }

    pub fn calls_matching(&self, pred: impl Fn(&Call) -> bool) -> Vec<Call> {
        self.calls().into_iter().filter(|c| pred(c)).collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn last_publish(&self) -> Option<PublishRequest> {
        self.with_state(|s| s.publishes.last().cloned())
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStorage for MockPlatform {
    async fn file_write(&self, name: &str, data: &[u8]) -> bool {
        self.record(Call::FileWrite(name.to_string()));
        self.with_state(|s| {
            if s.failures.write {
                return false;
            }
            s.storage.insert(name.to_string(), data.to_vec());
            true
        })
    }

    async fn file_exists(&self, name: &str) -> bool {
        self.record(Call::FileExists(name.to_string()));
        self.with_state(|s| s.storage.contains_key(name))
    }

    async fn file_delete(&self, name: &str) -> bool {
        self.record(Call::FileDelete(name.to_string()));
        self.with_state(|s| s.storage.remove(name).is_some())
    }
}

#[async_trait]
impl Ugc for MockPlatform {
    fn app_id(&self) -> AppId {
        Self::APP_ID
    }

    async fn publish_workshop_file(
        &self,
        request: &PublishRequest,
    ) -> Result<WorkshopItemId, PlatformError> {
        self.record(Call::Publish(request.file_name.clone()));
        if let Some(code) = self.with_state(|s| s.failures.publish) {
            return Err(PlatformError::Call(code));
        }

        let content = self
            .storage(&request.file_name)
            .ok_or(PlatformError::Call(ResultCode::FileNotFound))?;
        let id = self.add_item(&request.file_name, &content, 0);
        self.with_state(|s| s.publishes.push(request.clone()));
        Ok(id)
    }

    async fn enumerate_user_subscribed_files(
        &self,
        start_index: u32,
    ) -> Result<SubscribedPage, PlatformError> {
        self.record(Call::Enumerate(start_index));
        self.with_state(|s| {
            if s.failures.enumerate {
                return Err(PlatformError::IoFailure);
            }
            Ok(SubscribedPage {
                ids: s
                    .subscriptions
                    .iter()
                    .skip(start_index as usize)
                    .take(ENUMERATE_PAGE_SIZE as usize)
                    .copied()
                    .collect(),
                total: s.subscriptions.len() as u32,
            })
        })
    }

    async fn get_published_file_details(
        &self,
        id: WorkshopItemId,
    ) -> Result<ItemDetails, PlatformError> {
        self.record(Call::Details(id));
        // Let flag observers run while the request is in flight
        tokio::task::yield_now().await;
        self.with_state(|s| {
            if let Some(flag) = &s.flag {
                let value = *flag.borrow();
                s.flag_at_details.push(value);
            }

            let item = s
                .items
                .get(&id)
                .cloned()
                .ok_or(PlatformError::Call(ResultCode::FileNotFound))?;

            let handle = ContentHandle(s.next_id);
            s.next_id += 1;
            s.handles.insert(handle, id);

            Ok(ItemDetails {
                id,
                title: String::new(),
                description: String::new(),
                file_name: item.file_name,
                file_handle: handle,
                file_size: item.content.len() as u64,
                time_created: item.time_updated,
                time_updated: item.time_updated,
                tags: Vec::new(),
            })
        })
    }

    async fn ugc_download(&self, handle: ContentHandle) -> Result<DownloadedContent, PlatformError> {
        self.record(Call::Download(handle));
        self.with_state(|s| {
            if s.failures.download {
                return Err(PlatformError::IoFailure);
            }
            let id = s
                .handles
                .get(&handle)
                .ok_or(PlatformError::InvalidContentHandle(handle))?;
            let item = &s.items[id];
            Ok(DownloadedContent {
                handle,
                file_name: item.file_name.clone(),
                size_in_bytes: item.content.len(),
            })
        })
    }

    async fn ugc_read(&self, handle: ContentHandle, len: usize) -> Result<Vec<u8>, PlatformError> {
        self.record(Call::Read(handle));
        self.with_state(|s| {
            let id = s
                .handles
                .remove(&handle)
                .ok_or(PlatformError::InvalidContentHandle(handle))?;
            let mut content = s.items[&id].content.clone();
            content.truncate(len);
            Ok(content)
        })
    }

    async fn subscribe_published_file(&self, id: WorkshopItemId) -> Result<(), PlatformError> {
        self.record(Call::Subscribe(id));
        self.with_state(|s| {
            if !s.items.contains_key(&id) {
                return Err(PlatformError::Call(ResultCode::FileNotFound));
            }
            if !s.subscriptions.contains(&id) {
                s.subscriptions.push(id);
            }
            Ok(())
        })
    }

    async fn unsubscribe_published_file(&self, id: WorkshopItemId) -> Result<(), PlatformError> {
        self.record(Call::Unsubscribe(id));
        self.with_state(|s| {
            let before = s.subscriptions.len();
            s.subscriptions.retain(|sub| *sub != id);
            if s.subscriptions.len() == before {
                return Err(PlatformError::Call(ResultCode::FileNotFound));
            }
            Ok(())
        })
    }

    async fn start_item_update(
        &self,
        _app_id: AppId,
        id: WorkshopItemId,
    ) -> Result<UpdateHandle, PlatformError> {
        self.record(Call::StartItemUpdate(id));
        match self.with_state(|s| s.failures.start_update) {
            Some(code) => Err(PlatformError::Call(code)),
            None => Ok(UpdateHandle(id.0)),
        }
    }

    async fn set_item_preview(&self, _handle: UpdateHandle, preview: &Path) -> bool {
        self.record(Call::SetItemPreview(preview.to_path_buf()));
        !self.with_state(|s| s.failures.preview)
    }

    async fn submit_item_update(
        &self,
        _handle: UpdateHandle,
        change_note: &str,
    ) -> Result<(), PlatformError> {
        self.record(Call::SubmitItemUpdate(change_note.to_string()));
        match self.with_state(|s| s.failures.submit) {
            Some(code) => Err(PlatformError::Call(code)),
            None => Ok(()),
        }
    }
}

/// Create a test configuration with temporary paths
pub fn create_test_config() -> Config {
    let temp_dir = std::env::temp_dir().join(format!("workshop-test-{}", uuid::Uuid::new_v4()));

    Config {
        app_id: 480,
        platform_root: temp_dir.join("platform"),
        content_dir: temp_dir.join("content"),
        thumbnail_delay_ms: 0,
        log_level: "error".to_string(), // Reduce log noise in tests
        backend: Backend::Local,
    }
}

/// Create a temporary directory for tests
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::TempDir::new().expect("Failed to create temp directory")
}
