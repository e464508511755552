use crate::binary::Binary;
use crate::directory::ReleaseDirectory;
use crate::error::{Collision, Error, Result};
use crate::git::Vcs;
use crate::host::ReleaseHost;
use crate::types::{RemoteAsset, RemoteRelease};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Replace assets of the same kind in the target release
    pub force: bool,
    /// Leave assets of the same kind in other releases alone
    pub keep: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseAction {
    Existing,
    Created,
    /// Dry-run only: the release does not exist yet
    WouldCreate,
}

#[derive(Debug, Clone)]
pub struct Upload {
    pub binary: Binary,
    pub size: u64,
    /// Assets of the same kind removed from the target release first
    pub replaces: Vec<RemoteAsset>,
    /// Set once the upload succeeded; stays `None` in dry-run
    pub asset: Option<RemoteAsset>,
}

impl Upload {
    /// Name the binary is published under
    pub fn asset_name(&self) -> String {
        self.binary.underscore()
    }
}

#[derive(Debug, Clone)]
pub struct PublishReport {
    pub tag: String,
    pub action: ReleaseAction,
    pub uploads: Vec<Upload>,
    /// Stale assets deleted from other releases (would be, in dry-run)
    pub swept: Vec<(String, RemoteAsset)>,
    pub sweep_failures: Vec<String>,
    pub dry_run: bool,
}

impl PublishReport {
    /// Fails with every sweep deletion that did not go through.
    pub fn into_result(self) -> Result<Self> {
        if self.sweep_failures.is_empty() {
            Ok(self)
        } else {
            Err(Error::SweepIncomplete {
                failed: self.sweep_failures,
            })
        }
    }
}

pub struct Publisher<'a, H: ReleaseHost + ?Sized> {
    host: &'a H,
    vcs: &'a dyn Vcs,
    options: PublishOptions,
}

impl<'a, H: ReleaseHost + ?Sized> Publisher<'a, H> {
    pub fn new(host: &'a H, vcs: &'a dyn Vcs, options: PublishOptions) -> Self {
        Self { host, vcs, options }
    }

    /// Publish `paths` to the release of the tag at HEAD.
    ///
    /// Nothing touches the remote before the tag is verified. Uploads stop at
    /// the first failure; the sweep of other releases is best effort.
    pub async fn publish(&self, paths: &[PathBuf]) -> Result<PublishReport> {
        let binaries = validate_inputs(paths)?;

        let tag = match self.vcs.current_tag()? {
            Some(tag) => tag,
            None => {
                let head = self.vcs.commit_of("HEAD")?.unwrap_or_default();
                return Err(Error::NotTagged { head });
            }
        };
        tracing::debug!("tag = {}", tag);

        let tag_commit = self
            .vcs
            .commit_of(&tag)?
            .ok_or_else(|| Error::Git(format!("cannot resolve the commit of tag {}", tag)))?;
        tracing::debug!("tagCommit = {}", tag_commit);

        let directory = ReleaseDirectory::fetch(self.host).await?;
        let existing = directory.find_by_tag(&tag).cloned();

        // Found or not, the remote tag has to agree with the local one
        self.verify_tag(&tag, &tag_commit).await?;

        let (release, action) = match existing {
            Some(release) => (release, ReleaseAction::Existing),
            None => {
                tracing::debug!("create release => {}", tag);
                if self.options.dry_run {
                    let uploads = plan(&binaries, &[], true)?;
                    return Ok(self.report(tag, ReleaseAction::WouldCreate, uploads));
                }
                let release = self.host.create_release(&tag).await?;
                tracing::info!("Created release {} in {}", tag, self.host.location());
                (release, ReleaseAction::Created)
            }
        };

        let mut uploads = plan(&binaries, &release.assets, self.options.force)?;
        self.upload(&release, &mut uploads).await?;

        let mut report = self.report(tag, action, uploads);
        if !self.options.keep {
            self.sweep(&release, &mut report).await;
        }
        Ok(report)
    }

    async fn verify_tag(&self, tag: &str, local: &str) -> Result<()> {
        let missing = || Error::TagMissing {
            tag: tag.to_string(),
        };

        if !self.host.tag_exists(tag).await? {
            return Err(missing());
        }
        let remote = self.host.commit_of(tag).await?.ok_or_else(missing)?;
        if remote != local {
            return Err(Error::TagMismatch {
                tag: tag.to_string(),
                local: local.to_string(),
                remote,
            });
        }
        Ok(())
    }

    async fn upload(&self, release: &RemoteRelease, uploads: &mut [Upload]) -> Result<()> {
        for upload in uploads.iter_mut() {
            for old in &upload.replaces {
                tracing::debug!("delete asset => {} ({})", old.name, old.url);
                if !self.options.dry_run {
                    self.host.delete_asset(old.id).await?;
                }
            }

            let name = upload.asset_name();
            tracing::debug!("upload asset => {} ({})", name, upload.size);
            if self.options.dry_run {
                continue;
            }

            let path = source_path(&upload.binary);
            tracing::info!("Uploading {} ({})", path.display(), upload.size);
            upload.asset = Some(
                self.host
                    .upload_asset(release.id, &name, path, upload.size)
                    .await?,
            );
        }
        Ok(())
    }

    /// Delete assets of a just-published kind everywhere except the one
    /// just uploaded. Failures are collected, never returned early.
    async fn sweep(&self, release: &RemoteRelease, report: &mut PublishReport) {
        let directory = match ReleaseDirectory::fetch(self.host).await {
            Ok(directory) => directory,
            Err(e) => {
                tracing::warn!("Unable to list releases for cleanup: {}", e);
                report.sweep_failures.push(format!("release listing ({})", e));
                return;
            }
        };

        let replaced: HashSet<u64> = report
            .uploads
            .iter()
            .flat_map(|u| u.replaces.iter().map(|a| a.id))
            .collect();

        for (owner, asset) in directory.assets() {
            let Some(upload) = report.uploads.iter().find(|u| u.binary.matches(&asset.name)) else {
                continue;
            };
            let is_fresh = upload.asset.as_ref().is_some_and(|a| a.id == asset.id);
            if is_fresh {
                continue;
            }
            if self.options.dry_run {
                if owner.id == release.id && replaced.contains(&asset.id) {
                    continue;
                }
                tracing::debug!("delete asset => {} ({})", asset.name, asset.url);
                report.swept.push((owner.tag_name.clone(), asset.clone()));
                continue;
            }

            tracing::debug!("delete asset => {} ({})", asset.name, asset.url);
            match self.host.delete_asset(asset.id).await {
                Ok(()) => report.swept.push((owner.tag_name.clone(), asset.clone())),
                Err(e) => {
                    tracing::warn!(
                        "Unable to delete stale asset {} from {}: {}",
                        asset.name,
                        owner.tag_name,
                        e
                    );
                    report
                        .sweep_failures
                        .push(format!("{} ({})", asset.name, owner.tag_name));
                }
            }
        }
    }

    fn report(&self, tag: String, action: ReleaseAction, uploads: Vec<Upload>) -> PublishReport {
        PublishReport {
            tag,
            action,
            uploads,
            swept: Vec::new(),
            sweep_failures: Vec::new(),
            dry_run: self.options.dry_run,
        }
    }
}

/// Parse every path as a binary, rejecting anything that is not one or that
/// cannot be read.
pub fn validate_inputs(paths: &[PathBuf]) -> Result<Vec<Binary>> {
    let mut binaries: Vec<Binary> = Vec::new();
    let mut rejected = Vec::new();

    for path in paths {
        let binary = Binary::from_path(path);
        if !binary.is_qualified() {
            tracing::warn!("{:?}: not a binary?", path.display().to_string());
            rejected.push(path.display().to_string());
            continue;
        }
        if let Some(first) = binaries.iter().find(|b| b.matches(&binary.raw_name)) {
            return Err(Error::DuplicateBinary {
                first: first.raw_name.clone(),
                second: binary.raw_name.clone(),
                kind: binary.identifier(),
            });
        }
        binaries.push(binary);
    }

    if !rejected.is_empty() {
        return Err(Error::NotBinary { names: rejected });
    }
    if binaries.is_empty() {
        return Err(Error::NoBinaries);
    }
    for binary in &binaries {
        let path = source_path(binary);
        std::fs::metadata(path).map_err(|e| Error::io(path, e))?;
    }
    Ok(binaries)
}

/// Pair each binary with the release assets it collides with. Without
/// `force`, every collision is reported at once.
fn plan(binaries: &[Binary], assets: &[RemoteAsset], force: bool) -> Result<Vec<Upload>> {
    let mut uploads = Vec::with_capacity(binaries.len());
    let mut conflicts = Vec::new();

    for binary in binaries {
        let path = source_path(binary);
        let size = std::fs::metadata(path)
            .map_err(|e| Error::io(path, e))?
            .len();

        let existing: Vec<RemoteAsset> = assets
            .iter()
            .filter(|asset| binary.matches(&asset.name))
            .cloned()
            .collect();

        if !force {
            for asset in &existing {
                tracing::warn!(
                    "{}: an asset of the same kind already exists ({})",
                    binary.program,
                    asset.name
                );
                conflicts.push(Collision {
                    binary: binary.identifier(),
                    asset: asset.name.clone(),
                });
            }
        }

        uploads.push(Upload {
            binary: binary.clone(),
            size,
            replaces: if force { existing } else { Vec::new() },
            asset: None,
        });
    }

    if !conflicts.is_empty() {
        return Err(Error::AssetCollision { conflicts });
    }
    Ok(uploads)
}

fn source_path(binary: &Binary) -> &Path {
    binary
        .source_path
        .as_deref()
        .unwrap_or_else(|| Path::new(&binary.raw_name))
}
