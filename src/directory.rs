use crate::binary::Binary;
use crate::host::{HostError, Page, ReleaseHost};
use crate::types::{RemoteAsset, RemoteRelease};
use futures_util::stream::{self, Stream, TryStreamExt};
use std::future::Future;

/// Lazily request pages from `fetch` until one reports no next page.
///
/// The stream is restartable in the sense that nothing is requested until it
/// is polled, and each call builds a fresh cursor.
pub fn pages<'a, T, F, Fut>(fetch: F) -> impl Stream<Item = Result<Vec<T>, HostError>> + 'a
where
    T: 'a,
    F: FnMut(Option<u32>) -> Fut + 'a,
    Fut: Future<Output = Result<Page<T>, HostError>> + 'a,
{
    // Some(None) requests the first page, None means exhausted
    stream::try_unfold((fetch, Some(None)), |(mut fetch, cursor)| async move {
        let Some(page) = cursor else {
            return Ok(None);
        };
        let Page { items, next } = fetch(page).await?;
        Ok(Some((items, (fetch, next.map(Some)))))
    })
}

#[derive(Debug, Clone, Default)]
pub struct ReleaseDirectory {
    releases: Vec<RemoteRelease>,
}

impl ReleaseDirectory {
    /// Fetch every release and every asset of each release.
    ///
    /// Any failing page fails the whole fetch; a partial snapshot is never
    /// returned.
    pub async fn fetch<H: ReleaseHost + ?Sized>(host: &H) -> Result<Self, HostError> {
        let mut releases: Vec<RemoteRelease> = pages(|page| host.list_releases(page))
            .try_concat()
            .await?;

        for release in &mut releases {
            let id = release.id;
            release.assets = pages(move |page| host.list_assets(id, page))
                .try_concat()
                .await?;
        }

        // stable: releases created at the same instant keep the remote order
        releases.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        tracing::debug!(
            "Fetched {} release(s) with {} asset(s) from {}",
            releases.len(),
            releases.iter().map(|r| r.assets.len()).sum::<usize>(),
            host.location()
        );
        Ok(Self { releases })
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    pub fn find_by_tag(&self, tag: &str) -> Option<&RemoteRelease> {
        self.releases.iter().find(|r| r.tag_name == tag)
    }

    /// Newest asset of the same kind as `binary`
    pub fn find_binary(&self, binary: &Binary) -> Option<(&RemoteRelease, &RemoteAsset)> {
        self.releases.iter().find_map(|release| {
            release
                .assets
                .iter()
                .find(|asset| binary.matches(&asset.name))
                .map(|asset| (release, asset))
        })
    }

    /// Every (release, asset) pair, newest release first
    pub fn assets(&self) -> impl Iterator<Item = (&RemoteRelease, &RemoteAsset)> {
        self.releases
            .iter()
            .flat_map(|release| release.assets.iter().map(move |asset| (release, asset)))
    }
}
