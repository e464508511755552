use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteRelease {
    pub id: u64,
    pub tag_name: String,
    pub created_at: DateTime<Utc>,
    /// Filled by a separate paginated asset listing
    #[serde(skip)]
    pub assets: Vec<RemoteAsset>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteAsset {
    pub id: u64,
    pub name: String,
    /// API url; serves the bytes when asked for `application/octet-stream`
    pub url: String,
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRelease<'a> {
    pub tag_name: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCommit {
    pub sha: String,
}
