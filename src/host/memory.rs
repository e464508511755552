use super::{HostError, Page, ReleaseHost, HOST_DOMAIN};
use crate::types::{RemoteAsset, RemoteRelease};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    CreateRelease(String),
    Upload { release_id: u64, name: String },
    Delete(u64),
}

#[derive(Default)]
struct State {
    releases: Vec<RemoteRelease>,
    tags: HashMap<String, String>,
    contents: HashMap<u64, Vec<u8>>,
    next_id: u64,
    clock: i64,
    mutations: Vec<Mutation>,
    downloads: Vec<String>,
    fail_uploads: HashSet<String>,
    fail_deletes: HashSet<u64>,
    fail_listing: bool,
    no_latest: bool,
    refuse_downloads: bool,
    deleted_elsewhere: HashSet<u64>,
}

pub struct MemoryHost {
    owner: String,
    repository: String,
    page_size: usize,
    state: Mutex<State>,
}

impl MemoryHost {
    pub fn new(owner: &str, repository: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repository: repository.to_string(),
            page_size: 2,
            state: Mutex::new(State {
                next_id: 1,
                ..State::default()
            }),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Point a remote tag at a commit
    pub fn tag(&self, tag: &str, commit: &str) {
        self.lock().tags.insert(tag.to_string(), commit.to_string());
    }

    /// Add a release created after every release added so far
    pub fn add_release(&self, tag: &str) -> u64 {
        let mut state = self.lock();
        let created_at = state.tick();
        state.push_release(tag, created_at)
    }

    pub fn add_release_at(&self, tag: &str, created_at: DateTime<Utc>) -> u64 {
        self.lock().push_release(tag, created_at)
    }

    pub fn add_asset(&self, release_id: u64, name: &str, content: &[u8]) -> u64 {
        self.lock().push_asset(release_id, name, content.to_vec())
    }

    pub fn fail_upload_of(&self, name: &str) {
        self.lock().fail_uploads.insert(name.to_string());
    }

    pub fn fail_delete_of(&self, asset_id: u64) {
        self.lock().fail_deletes.insert(asset_id);
    }

    pub fn fail_listing(&self) {
        self.lock().fail_listing = true;
    }

    pub fn without_latest_redirect(&self) {
        self.lock().no_latest = true;
    }

    /// Answer every download with 403, as for a private repository
    pub fn refuse_downloads(&self) {
        self.lock().refuse_downloads = true;
    }

    /// Keep listing an asset that someone else already deleted
    pub fn delete_elsewhere(&self, asset_id: u64) {
        self.lock().deleted_elsewhere.insert(asset_id);
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.lock().mutations.clone()
    }

    pub fn downloads(&self) -> Vec<String> {
        self.lock().downloads.clone()
    }

    pub fn release(&self, tag: &str) -> Option<RemoteRelease> {
        self.lock()
            .releases
            .iter()
            .find(|r| r.tag_name == tag)
            .cloned()
    }

    pub fn asset_names(&self) -> Vec<String> {
        self.lock()
            .releases
            .iter()
            .flat_map(|r| r.assets.iter().map(|a| a.name.clone()))
            .collect()
    }

    pub fn content(&self, asset_id: u64) -> Option<Vec<u8>> {
        self.lock().contents.get(&asset_id).cloned()
    }

    fn failure(url: &str, status: u16, message: &str) -> HostError {
        HostError::Status {
            url: url.to_string(),
            status,
            message: message.to_string(),
        }
    }
}

impl State {
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(self.clock)
    }

    fn id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn push_release(&mut self, tag: &str, created_at: DateTime<Utc>) -> u64 {
        let id = self.id();
        self.releases.push(RemoteRelease {
            id,
            tag_name: tag.to_string(),
            created_at,
            assets: Vec::new(),
        });
        id
    }

    fn push_asset(&mut self, release_id: u64, name: &str, content: Vec<u8>) -> u64 {
        let id = self.id();
        let release = self
            .releases
            .iter_mut()
            .find(|r| r.id == release_id)
            .expect("asset added to a known release");
        release.assets.push(RemoteAsset {
            id,
            name: name.to_string(),
            url: format!("memory://assets/{}", id),
            download_url: format!("memory://download/{}/{}", release.tag_name, name),
        });
        self.contents.insert(id, content);
        id
    }

    fn find_asset(&self, url: &str) -> Option<u64> {
        self.releases
            .iter()
            .flat_map(|r| r.assets.iter())
            .find(|a| a.url == url || a.download_url == url)
            .map(|a| a.id)
    }
}

fn paginate<T: Clone>(items: &[T], page: Option<u32>, size: usize) -> Page<T> {
    let page = page.unwrap_or(1).max(1) as usize;
    let start = ((page - 1) * size).min(items.len());
    let end = (start + size).min(items.len());
    Page {
        items: items[start..end].to_vec(),
        next: (end < items.len()).then_some(page as u32 + 1),
    }
}

#[async_trait]
impl ReleaseHost for MemoryHost {
    fn location(&self) -> String {
        format!("{}/{}/{}", HOST_DOMAIN, self.owner, self.repository)
    }

    fn download_url(&self, tag: &str, name: &str) -> String {
        format!("memory://download/{}/{}", tag, name)
    }

    async fn list_releases(&self, page: Option<u32>) -> Result<Page<RemoteRelease>, HostError> {
        let state = self.lock();
        if state.fail_listing && page.is_some() {
            return Err(Self::failure("memory://releases", 502, "Bad Gateway"));
        }
        let mut page = paginate(&state.releases, page, self.page_size);
        for release in &mut page.items {
            release.assets.clear();
        }
        Ok(page)
    }

    async fn list_assets(
        &self,
        release_id: u64,
        page: Option<u32>,
    ) -> Result<Page<RemoteAsset>, HostError> {
        let state = self.lock();
        let release = state
            .releases
            .iter()
            .find(|r| r.id == release_id)
            .ok_or_else(|| Self::failure("memory://assets", 404, "Not Found"))?;
        Ok(paginate(&release.assets, page, self.page_size))
    }

    async fn tag_exists(&self, tag: &str) -> Result<bool, HostError> {
        Ok(self.lock().tags.contains_key(tag))
    }

    async fn commit_of(&self, reference: &str) -> Result<Option<String>, HostError> {
        Ok(self.lock().tags.get(reference).cloned())
    }

    async fn create_release(&self, tag: &str) -> Result<RemoteRelease, HostError> {
        let mut state = self.lock();
        state.mutations.push(Mutation::CreateRelease(tag.to_string()));
        let created_at = state.tick();
        let id = state.push_release(tag, created_at);
        Ok(state
            .releases
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .expect("release was just created"))
    }

    async fn upload_asset(
        &self,
        release_id: u64,
        name: &str,
        source: &Path,
        size: u64,
    ) -> Result<RemoteAsset, HostError> {
        let content = std::fs::read(source).map_err(|e| HostError::Read {
            path: source.to_path_buf(),
            source: e,
        })?;
        assert_eq!(content.len() as u64, size, "upload size of {}", name);

        let mut state = self.lock();
        state.mutations.push(Mutation::Upload {
            release_id,
            name: name.to_string(),
        });
        if state.fail_uploads.contains(name) {
            return Err(Self::failure("memory://uploads", 500, "upload failed"));
        }
        let id = state.push_asset(release_id, name, content);
        Ok(state
            .releases
            .iter()
            .flat_map(|r| r.assets.iter())
            .find(|a| a.id == id)
            .cloned()
            .expect("asset was just uploaded"))
    }

    async fn delete_asset(&self, asset_id: u64) -> Result<(), HostError> {
        let mut state = self.lock();
        state.mutations.push(Mutation::Delete(asset_id));
        if state.fail_deletes.contains(&asset_id) {
            return Err(Self::failure("memory://assets", 500, "delete failed"));
        }
        // a 404, which counts as deleted
        if state.deleted_elsewhere.remove(&asset_id) {
            tracing::debug!("Asset {} was already deleted", asset_id);
        }
        for release in &mut state.releases {
            release.assets.retain(|a| a.id != asset_id);
        }
        state.contents.remove(&asset_id);
        Ok(())
    }

    async fn latest_tag(&self) -> Result<Option<String>, HostError> {
        let state = self.lock();
        if state.no_latest {
            return Ok(None);
        }
        Ok(state
            .releases
            .iter()
            .max_by_key(|r| r.created_at)
            .map(|r| r.tag_name.clone()))
    }

    async fn download(
        &self,
        url: &str,
        as_asset: bool,
        dest: Option<&Path>,
    ) -> Result<bool, HostError> {
        let content = {
            let mut state = self.lock();
            state.downloads.push(url.to_string());
            let found = state
                .find_asset(url)
                .filter(|id| !state.deleted_elsewhere.contains(id));
            match (found, state.refuse_downloads) {
                (Some(id), false) => state.contents.get(&id).cloned().unwrap_or_default(),
                (_, refused) if as_asset => {
                    let (status, message) = if refused { (403, "Forbidden") } else { (404, "Not Found") };
                    return Err(Self::failure(url, status, message));
                }
                _ => return Ok(false),
            }
        };

        if let Some(dest) = dest {
            std::fs::write(dest, content).map_err(|source| HostError::Write {
                path: dest.to_path_buf(),
                source,
            })?;
        }
        Ok(true)
    }
}
