use crate::types::{RemoteAsset, RemoteRelease};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod github;
#[cfg(test)]
pub mod memory;

pub use github::GitHub;

/// Only domain the naming and addressing rules apply to
pub const HOST_DOMAIN: &str = "github.com";

#[derive(Debug, Error)]
pub enum HostError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url}: {status}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HostError {
    pub fn status(&self) -> Option<u16> {
        match self {
            HostError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// One page of a listing. `next` is the page to request after this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<u32>,
}

#[async_trait]
pub trait ReleaseHost: Send + Sync {
    /// `github.com/<owner>/<repository>`
    fn location(&self) -> String;

    /// Public download url of an asset attached to the release tagged `tag`
    fn download_url(&self, tag: &str, name: &str) -> String;

    /// List one page of releases (`None` requests the first page)
    async fn list_releases(&self, page: Option<u32>) -> Result<Page<RemoteRelease>, HostError>;

    /// List one page of a release's assets
    async fn list_assets(
        &self,
        release_id: u64,
        page: Option<u32>,
    ) -> Result<Page<RemoteAsset>, HostError>;

    /// Whether `refs/tags/<tag>` exists on the remote
    async fn tag_exists(&self, tag: &str) -> Result<bool, HostError>;

    /// Commit a ref resolves to on the remote, `None` if it does not exist
    async fn commit_of(&self, reference: &str) -> Result<Option<String>, HostError>;

    async fn create_release(&self, tag: &str) -> Result<RemoteRelease, HostError>;

    /// Stream the `size` bytes of the file at `source` into a new asset
    async fn upload_asset(
        &self,
        release_id: u64,
        name: &str,
        source: &Path,
        size: u64,
    ) -> Result<RemoteAsset, HostError>;

    /// Delete an asset. An asset that is already gone counts as deleted.
    async fn delete_asset(&self, asset_id: u64) -> Result<(), HostError>;

    /// Tag the "latest release" redirect points at, if any
    async fn latest_tag(&self) -> Result<Option<String>, HostError>;

    /// Fetch `url`, writing the body to `dest`. With `dest` unset only the
    /// availability is checked.
    ///
    /// A guessed web url (`as_asset == false`) that does not answer 200 is
    /// `Ok(false)`. A known asset (`as_asset == true`) that does not answer
    /// 200 is an error.
    async fn download(
        &self,
        url: &str,
        as_asset: bool,
        dest: Option<&Path>,
    ) -> Result<bool, HostError>;
}
