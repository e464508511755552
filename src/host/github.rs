use super::{HostError, Page, ReleaseHost, HOST_DOMAIN};
use crate::config::Settings;
use crate::types::{CreateRelease, GitHubCommit, RemoteAsset, RemoteRelease};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, LINK, USER_AGENT};
use reqwest::{Body, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::Path;
use tokio::io::AsyncReadExt;

const API_JSON: &str = "application/vnd.github.v3+json";
const OCTET_STREAM: &str = "application/octet-stream";
const PER_PAGE: &str = "100";
const UPLOAD_CHUNK: usize = 64 * 1024;
const AGENT: &str = concat!("binrel/", env!("CARGO_PKG_VERSION"));

static MATCH_NEXT_PAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<[^>]*[?&]page=(\d+)[^>]*>;\s*rel="next""#).expect("link pattern is valid")
});

static MATCH_RELEASE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[^/]+/[^/]+/releases/[^/]+/([^/]+)$").expect("release path pattern is valid")
});

pub struct GitHub {
    owner: String,
    repository: String,
    token: Option<String>,
    api_url: String,
    upload_url: String,
    web_url: String,
    http: reqwest::Client,
}

impl GitHub {
    pub fn new(settings: &Settings, owner: &str, repository: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repository: repository.to_string(),
            token: settings.token.clone(),
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            upload_url: settings.upload_url.trim_end_matches('/').to_string(),
            web_url: settings.web_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn repo_url(&self, path: &str) -> String {
        build_repo_url(&self.api_url, &self.owner, &self.repository, path)
    }

    fn api_request(&self, method: Method, url: &str, accept: &str) -> RequestBuilder {
        let mut request = self
            .http
            .request(method, url)
            .header(ACCEPT, accept)
            .header(USER_AGENT, AGENT);

        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("token {}", token));
        }
        request
    }

    fn web_request(&self, url: &str) -> RequestBuilder {
        self.http.get(url).header(USER_AGENT, AGENT)
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response, HostError> {
        tracing::debug!("Requesting {}", url);
        let response = request.send().await.map_err(|source| HostError::Request {
            url: url.to_string(),
            source,
        })?;
        if let Some((remaining, reset)) = rate_limit(response.headers()) {
            tracing::debug!("rate limit: {} remaining, resets {}", remaining, reset);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(HostError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                message: error_message(&body, status),
            });
        }

        Ok(response)
    }

    async fn list<T: DeserializeOwned>(
        &self,
        url: &str,
        page: Option<u32>,
    ) -> Result<Page<T>, HostError> {
        let mut request = self
            .api_request(Method::GET, url, API_JSON)
            .query(&[("per_page", PER_PAGE)]);
        if let Some(page) = page {
            request = request.query(&[("page", page)]);
        }

        let response = self.send(request, url).await?;
        let next = next_page(response.headers());
        let items = decode(response, url).await?;
        Ok(Page { items, next })
    }
}

#[async_trait]
impl ReleaseHost for GitHub {
    fn location(&self) -> String {
        format!("{}/{}/{}", HOST_DOMAIN, self.owner, self.repository)
    }

    fn download_url(&self, tag: &str, name: &str) -> String {
        format!(
            "{}/{}/{}/releases/download/{}/{}",
            self.web_url, self.owner, self.repository, tag, name
        )
    }

    async fn list_releases(&self, page: Option<u32>) -> Result<Page<RemoteRelease>, HostError> {
        self.list(&self.repo_url("releases"), page).await
    }

    async fn list_assets(
        &self,
        release_id: u64,
        page: Option<u32>,
    ) -> Result<Page<RemoteAsset>, HostError> {
        let url = self.repo_url(&format!("releases/{}/assets", release_id));
        self.list(&url, page).await
    }

    async fn tag_exists(&self, tag: &str) -> Result<bool, HostError> {
        let url = self.repo_url(&format!("git/ref/tags/{}", tag));
        let response = self.send(self.api_request(Method::GET, &url, API_JSON), &url).await;
        Ok(absent_on(response, &[404])?.is_some())
    }

    async fn commit_of(&self, reference: &str) -> Result<Option<String>, HostError> {
        let url = self.repo_url(&format!("commits/{}", reference));
        let response = self.send(self.api_request(Method::GET, &url, API_JSON), &url).await;
        // 422 is GitHub's answer for a ref it cannot resolve to a commit
        let Some(response) = absent_on(response, &[404, 422])? else {
            return Ok(None);
        };
        let commit: GitHubCommit = decode(response, &url).await?;
        Ok(Some(commit.sha))
    }

    async fn create_release(&self, tag: &str) -> Result<RemoteRelease, HostError> {
        let url = self.repo_url("releases");
        let request = self
            .api_request(Method::POST, &url, API_JSON)
            .json(&CreateRelease { tag_name: tag });
        let response = self.send(request, &url).await?;
        decode(response, &url).await
    }

    async fn upload_asset(
        &self,
        release_id: u64,
        name: &str,
        source: &Path,
        size: u64,
    ) -> Result<RemoteAsset, HostError> {
        let file = tokio::fs::File::open(source)
            .await
            .map_err(|e| HostError::Read {
                path: source.to_path_buf(),
                source: e,
            })?;

        let url = build_repo_url(
            &self.upload_url,
            &self.owner,
            &self.repository,
            &format!("releases/{}/assets", release_id),
        );
        let request = self
            .api_request(Method::POST, &url, API_JSON)
            .query(&[("name", name)])
            .header(CONTENT_TYPE, OCTET_STREAM)
            .header(CONTENT_LENGTH, size)
            .body(file_body(file));
        let response = self.send(request, &url).await?;
        decode(response, &url).await
    }

    async fn delete_asset(&self, asset_id: u64) -> Result<(), HostError> {
        let url = self.repo_url(&format!("releases/assets/{}", asset_id));
        let response = self.send(self.api_request(Method::DELETE, &url, API_JSON), &url).await;
        if absent_on(response, &[404])?.is_none() {
            tracing::debug!("Asset {} was already deleted", asset_id);
        }
        Ok(())
    }

    async fn latest_tag(&self) -> Result<Option<String>, HostError> {
        let url = format!(
            "{}/{}/{}/releases/latest",
            self.web_url, self.owner, self.repository
        );
        tracing::debug!("Requesting {}", url);
        let response = self
            .web_request(&url)
            .send()
            .await
            .map_err(|source| HostError::Request {
                url: url.clone(),
                source,
            })?;

        if response.status() != StatusCode::OK {
            tracing::debug!("{} => {}", url, response.status());
            return Ok(None);
        }
        Ok(tag_from_release_path(response.url().path()))
    }

    async fn download(
        &self,
        url: &str,
        as_asset: bool,
        dest: Option<&Path>,
    ) -> Result<bool, HostError> {
        let request = if as_asset {
            self.api_request(Method::GET, url, OCTET_STREAM)
        } else {
            self.web_request(url)
        };

        tracing::debug!("Requesting {}", url);
        let response = request.send().await.map_err(|source| HostError::Request {
            url: url.to_string(),
            source,
        })?;
        let status = response.status();
        if status != StatusCode::OK {
            tracing::debug!("{} => {}", url, status);
            if !as_asset {
                return Ok(false);
            }
            let body = response.text().await.unwrap_or_default();
            return Err(HostError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                message: error_message(&body, status),
            });
        }

        let Some(dest) = dest else {
            return Ok(true);
        };

        write_body(response, url, dest).await?;
        Ok(true)
    }
}

/// Stream a response body into `dest` through a temporary sibling file, so an
/// interrupted transfer never leaves a truncated binary behind.
async fn write_body(response: Response, url: &str, dest: &Path) -> Result<(), HostError> {
    let write_err = |source| HostError::Write {
        path: dest.to_path_buf(),
        source,
    };

    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;

    let filename = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let pb = ProgressBar::new(response.content_length().unwrap_or(0));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_message(format!("Downloading {}", filename));

    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| HostError::Request {
            url: url.to_string(),
            source,
        })?;
        file.write_all(&chunk).map_err(write_err)?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }
    pb.finish_with_message("Download complete");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o755))
            .map_err(write_err)?;
    }

    file.persist(dest).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Body streaming a file in chunks
fn file_body(file: tokio::fs::File) -> Body {
    let chunks = stream::try_unfold(file, |mut file| async move {
        let mut chunk = vec![0u8; UPLOAD_CHUNK];
        let read = file.read(&mut chunk).await?;
        if read == 0 {
            return Ok::<_, std::io::Error>(None);
        }
        chunk.truncate(read);
        Ok(Some((chunk, file)))
    });
    Body::wrap_stream(chunks)
}

/// `Ok(None)` for a request that failed with one of the `absent` statuses
fn absent_on<T>(result: Result<T, HostError>, absent: &[u16]) -> Result<Option<T>, HostError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.status().is_some_and(|status| absent.contains(&status)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn rate_limit(headers: &HeaderMap) -> Option<(u32, DateTime<Utc>)> {
    let header = |name: &str| headers.get(name)?.to_str().ok()?.parse::<i64>().ok();
    let remaining = u32::try_from(header("x-ratelimit-remaining")?).ok()?;
    let reset = DateTime::<Utc>::from_timestamp(header("x-ratelimit-reset")?, 0)?;
    Some((remaining, reset))
}

async fn decode<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, HostError> {
    response.json().await.map_err(|source| HostError::Decode {
        url: url.to_string(),
        source,
    })
}

/// Build a repository-scoped API URL, e.g. `<base>/repos/owner/repo/releases`
pub fn build_repo_url(base: &str, owner: &str, repository: &str, path: &str) -> String {
    format!("{}/repos/{}/{}/{}", base, owner, repository, path)
}

fn next_page(headers: &HeaderMap) -> Option<u32> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(parse_next_page)
}

/// Page number of the `rel="next"` entry of a `Link` header
pub fn parse_next_page(link: &str) -> Option<u32> {
    link.split(',')
        .find_map(|entry| MATCH_NEXT_PAGE.captures(entry.trim()))
        .and_then(|caps| caps[1].parse().ok())
}

/// Tag at the end of a `/<owner>/<repo>/releases/tag/<tag>` path
pub fn tag_from_release_path(path: &str) -> Option<String> {
    MATCH_RELEASE_PATH
        .captures(path)
        .map(|caps| caps[1].to_string())
}

fn error_message(body: &str, status: StatusCode) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| {
            let line = body.lines().next().unwrap_or("").trim();
            if line.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                line.to_string()
            }
        })
}
