use crate::host::HostError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// One binary blocked by an asset of the same kind in the target release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub binary: String,
    pub asset: String,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid target: {target}: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("not a binary (expected <program>_<os>_<arch>): {}", .names.join(", "))]
    NotBinary { names: Vec<String> },

    #[error("{first} and {second} are the same kind of binary ({kind})")]
    DuplicateBinary {
        first: String,
        second: String,
        kind: String,
    },

    #[error("no binaries to upload")]
    NoBinaries,

    #[error("HEAD ({head}) is not tagged")]
    NotTagged { head: String },

    #[error("tag {tag:?} does not exist in the remote repository")]
    TagMissing { tag: String },

    #[error("tag {tag:?} ({remote}) does not match {local} in the local repository")]
    TagMismatch {
        tag: String,
        local: String,
        remote: String,
    },

    #[error("{} asset(s) of the same kind already exist: {}", .conflicts.len(), describe(.conflicts))]
    AssetCollision { conflicts: Vec<Collision> },

    #[error("cannot release without --token or BINREL_TOKEN")]
    MissingToken,

    #[error("cannot determine the local platform; name one explicitly (e.g. {program}_linux_amd64)")]
    UnknownPlatform { program: String },

    #[error("cannot determine the GitHub repository from: git config --get remote.origin.url")]
    NoRepository,

    #[error(transparent)]
    Remote(#[from] HostError),

    #[error("git: {0}")]
    Git(String),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} stale asset(s) were not deleted: {}", .failed.len(), .failed.join(", "))]
    SweepIncomplete { failed: Vec<String> },
}

fn describe(conflicts: &[Collision]) -> String {
    conflicts
        .iter()
        .map(|c| format!("{} ({})", c.binary, c.asset))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collision_message_lists_every_conflict() {
        let err = Error::AssetCollision {
            conflicts: vec![
                Collision {
                    binary: "app-linux-amd64".to_string(),
                    asset: "app_linux_amd64".to_string(),
                },
                Collision {
                    binary: "app-windows-386".to_string(),
                    asset: "app-windows-386.exe".to_string(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "2 asset(s) of the same kind already exist: app-linux-amd64 (app_linux_amd64), app-windows-386 (app-windows-386.exe)"
        );
    }

    #[test]
    fn test_tag_mismatch_message() {
        let err = Error::TagMismatch {
            tag: "v1.0.0".to_string(),
            local: "abc123".to_string(),
            remote: "def456".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "tag \"v1.0.0\" (def456) does not match abc123 in the local repository"
        );
    }
}
