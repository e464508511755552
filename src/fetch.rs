use crate::binary::{Binary, Os, Platform};
use crate::directory::ReleaseDirectory;
use crate::error::{Error, Result};
use crate::git::Vcs;
use crate::host::ReleaseHost;
use crate::target::Target;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Keep the asset's own name even for a binary of the local platform
    pub preserve: bool,
    pub dry_run: bool,
}

/// What to fetch and from where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub target: Target,
    pub binary: Binary,
    /// The program name was typed by the user rather than taken from the
    /// repository name
    pub explicit: bool,
}

impl FetchRequest {
    /// Interpret a `get` argument: a program (`app`, `app_linux_386`) in
    /// the local repository's remote, or a target (`github.com/o/r[/program]`).
    /// A program without a platform gets `local`.
    pub fn resolve(arg: &str, vcs: &dyn Vcs, local: Option<Platform>) -> Result<Self> {
        let (target, explicit) = if arg.contains('/') {
            let target = Target::parse(arg)?;
            let explicit = !target.program.is_empty();
            (target, explicit)
        } else {
            let target = Target {
                program: arg.to_string(),
                ..Target::default()
            };
            (target.or_ambient(vcs)?, !arg.is_empty())
        };

        let program = if target.program.is_empty() {
            target.repository.clone()
        } else {
            target.program.clone()
        };

        let mut binary = Binary::parse(&program);
        if !binary.is_qualified() {
            let platform = local.ok_or_else(|| Error::UnknownPlatform {
                program: program.clone(),
            })?;
            binary = binary.with_platform(platform);
        }

        Ok(Self {
            target,
            binary,
            explicit,
        })
    }

    /// File names to try under the latest release, in order
    pub fn candidates(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(3);
        if self.explicit {
            names.push(self.binary.raw_name.clone());
        }
        for name in [self.binary.underscore(), self.binary.dash()] {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub asset_name: String,
    pub url: String,
    pub dest: PathBuf,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Downloaded(Download),
    NothingFound { binary: String, location: String },
}

pub struct Fetcher<'a, H: ReleaseHost + ?Sized> {
    host: &'a H,
    options: FetchOptions,
    local: Option<Platform>,
    output_dir: PathBuf,
}

impl<'a, H: ReleaseHost + ?Sized> Fetcher<'a, H> {
    pub fn new(host: &'a H, options: FetchOptions, local: Option<Platform>) -> Self {
        Self {
            host,
            options,
            local,
            output_dir: PathBuf::from("."),
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome> {
        if let Some(tag) = self.host.latest_tag().await? {
            tracing::debug!("latest release => {}", tag);
            for name in request.candidates() {
                let url = self.host.download_url(&tag, &name);
                if let Some(download) = self.try_download(&request.binary, &name, &url, false).await? {
                    return Ok(FetchOutcome::Downloaded(download));
                }
            }
        }

        let directory = ReleaseDirectory::fetch(self.host).await?;
        if let Some((release, asset)) = directory.find_binary(&request.binary) {
            tracing::debug!("found {} in {}", asset.name, release.tag_name);
            // a known asset that does not download is a remote error, not a miss
            if let Some(download) = self
                .try_download(&request.binary, &asset.name, &asset.url, true)
                .await?
            {
                return Ok(FetchOutcome::Downloaded(download));
            }
        }

        Ok(FetchOutcome::NothingFound {
            binary: request.binary.identifier(),
            location: self.host.location(),
        })
    }

    async fn try_download(
        &self,
        binary: &Binary,
        asset_name: &str,
        url: &str,
        as_asset: bool,
    ) -> Result<Option<Download>> {
        let dest = self.output_dir.join(self.destination_name(binary, asset_name));
        let target = (!self.options.dry_run).then_some(dest.as_path());

        if !self.host.download(url, as_asset, target).await? {
            return Ok(None);
        }
        if self.options.dry_run {
            tracing::debug!("download asset => {} => {}", asset_name, dest.display());
        }

        Ok(Some(Download {
            asset_name: asset_name.to_string(),
            url: url.to_string(),
            dest,
            dry_run: self.options.dry_run,
        }))
    }

    /// Bare program name for a binary of the local platform, the asset's own
    /// name for anything else or when `preserve` is set.
    pub fn destination_name(&self, binary: &Binary, asset_name: &str) -> String {
        match binary.platform {
            Some(platform) if !self.options.preserve && Some(platform) == self.local => {
                if platform.os == Os::Windows {
                    format!("{}.exe", binary.program)
                } else {
                    binary.program.clone()
                }
            }
            _ => file_name_only(asset_name),
        }
    }
}

fn file_name_only(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| name.to_string())
}
