use crate::error::{Error, Result};
use crate::git::Vcs;
use crate::host::HOST_DOMAIN;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Remotes consulted, in order, when no target is given
pub const AMBIENT_REMOTES: [&str; 2] = ["origin", "github"];

// git@github.com:alice/example.git
// git@github.com-work:alice/example.git
// ssh://git@github.com/alice/example.git
// https://github.com/alice/example.git
static MATCH_REMOTE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:git@github\.com(?:-[^:]+)?:|ssh://git@github\.com(?::\d+)?/|https?://(?:[^@/]+@)?github\.com/)([^/]+)/([^/]+?)(?:\.git)?/?$",
    )
    .expect("remote url pattern is valid")
});

/// `<host>/<owner>/<repository>/<program>`, each part optional from the right.
/// All parts empty means "use the local repository's remote".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub owner: String,
    pub repository: String,
    pub program: String,
}

impl Target {
    /// Fill host, owner, repository, program from the leading `/`-separated
    /// parts of `target`. Parts past the fourth are ignored.
    pub fn split(target: &str) -> Self {
        let mut parts = target.split('/').map(str::to_string);
        Self {
            host: parts.next().unwrap_or_default(),
            owner: parts.next().unwrap_or_default(),
            repository: parts.next().unwrap_or_default(),
            program: parts.next().unwrap_or_default(),
        }
    }

    /// Split and validate a target. The empty string is a valid, empty target.
    pub fn parse(target: &str) -> Result<Self> {
        if target.is_empty() {
            return Ok(Self::default());
        }

        let parsed = Self::split(target);
        if parsed.host != HOST_DOMAIN {
            return Err(Error::InvalidTarget {
                target: target.to_string(),
                reason: format!("not a {} URL", HOST_DOMAIN),
            });
        }
        if parsed.owner.is_empty() || parsed.repository.is_empty() {
            return Err(Error::InvalidTarget {
                target: target.to_string(),
                reason: "missing repository".to_string(),
            });
        }
        Ok(parsed)
    }

    /// Parse a `--repository` value: `alice/example` or `github.com/alice/example`.
    pub fn parse_repository(value: &str) -> Result<Self> {
        let parts: Vec<&str> = value.split('/').collect();
        let target = match parts.as_slice() {
            [owner, repository] => Self {
                host: HOST_DOMAIN.to_string(),
                owner: owner.to_string(),
                repository: repository.to_string(),
                program: String::new(),
            },
            [_, _, ..] => Self {
                program: String::new(),
                ..Self::parse(value)?
            },
            _ => Self::default(),
        };

        if target.owner.is_empty() || target.repository.is_empty() {
            return Err(Error::InvalidTarget {
                target: value.to_string(),
                reason: "cannot determine owner/repository".to_string(),
            });
        }
        Ok(target)
    }

    /// Use the local repository's remote when this target names no repository.
    pub fn or_ambient(self, vcs: &dyn Vcs) -> Result<Self> {
        if !self.repository.is_empty() {
            return Ok(self);
        }
        let (owner, repository) = resolve_ambient(vcs)?.ok_or(Error::NoRepository)?;
        Ok(Self {
            host: HOST_DOMAIN.to_string(),
            owner,
            repository,
            program: self.program,
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.host, self.owner, self.repository)?;
        if !self.program.is_empty() {
            write!(f, "/{}", self.program)?;
        }
        Ok(())
    }
}

/// Owner/repository of the first GitHub-looking remote among
/// [`AMBIENT_REMOTES`]; `None` when no remote points at GitHub.
pub fn resolve_ambient(vcs: &dyn Vcs) -> Result<Option<(String, String)>> {
    for name in AMBIENT_REMOTES {
        let Some(url) = vcs.remote_url(name)? else {
            continue;
        };
        if let Some(found) = parse_remote_url(&url) {
            tracing::debug!("Using remote '{}' ({})", name, url);
            return Ok(Some(found));
        }
        tracing::debug!("Remote '{}' ({}) is not a GitHub repository", name, url);
    }
    Ok(None)
}

pub fn parse_remote_url(url: &str) -> Option<(String, String)> {
    MATCH_REMOTE_URL
        .captures(url.trim())
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
}
