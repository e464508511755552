use crate::error::{Error, Result};
use std::process::{Command, Output};

/// "No such thing" is `Ok(None)`; only git itself failing is an `Err`.
pub trait Vcs {
    /// `remote.<name>.url`
    fn remote_url(&self, name: &str) -> Result<Option<String>>;

    /// Tag pointing exactly at HEAD
    fn current_tag(&self) -> Result<Option<String>>;

    /// Commit a ref (tag, branch, HEAD) resolves to
    fn commit_of(&self, reference: &str) -> Result<Option<String>>;
}

/// Runs the `git` executable in the current directory.
#[derive(Debug, Clone, Default)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self::default()
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.args(args);
        // the not-found checks below match git's untranslated messages
        cmd.env("LC_ALL", "C");
        cmd
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        let output = self
            .command(args)
            .output()
            .map_err(|e| Error::Git(format!("{}: {}", args.join(" "), e)))?;
        tracing::debug!(
            "git {}:\n{}{}---",
            args.join(" "),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        Ok(output)
    }
}

impl Vcs for GitCli {
    fn remote_url(&self, name: &str) -> Result<Option<String>> {
        let key = format!("remote.{}.url", name);
        let output = self.run(&["config", "--get", &key])?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        if !output.status.success() {
            // exit status 1 with no output: the key is not set
            if stdout.trim().is_empty() && output.stderr.is_empty() {
                return Ok(None);
            }
            return Err(failure(&["config", "--get", &key], &output));
        }
        Ok(non_empty(stdout.trim()))
    }

    fn current_tag(&self) -> Result<Option<String>> {
        let args = ["describe", "--tags", "--exact-match"];
        let output = self.run(&args)?;
        if !output.status.success() {
            if is_untagged(&String::from_utf8_lossy(&output.stderr)) {
                return Ok(None);
            }
            return Err(failure(&args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .split_whitespace()
            .next()
            .map(str::to_string))
    }

    fn commit_of(&self, reference: &str) -> Result<Option<String>> {
        let args = ["rev-list", "-n", "1", reference, "--"];
        let output = self.run(&args)?;
        if !output.status.success() {
            if is_unknown_revision(&String::from_utf8_lossy(&output.stderr)) {
                return Ok(None);
            }
            return Err(failure(&args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .and_then(|line| non_empty(line.trim())))
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

fn failure(args: &[&str], output: &Output) -> Error {
    let stderr = String::from_utf8_lossy(&output.stderr);
    Error::Git(format!(
        "git {}: {}: {}",
        args.join(" "),
        output.status,
        stderr.lines().next().unwrap_or("").trim()
    ))
}

fn is_untagged(stderr: &str) -> bool {
    stderr.starts_with("fatal: no tag exactly matches")
        || stderr.starts_with("fatal: No names found, cannot describe anything")
}

fn is_unknown_revision(stderr: &str) -> bool {
    stderr.contains("unknown revision")
        || stderr.contains("bad revision")
        || stderr.contains("ambiguous argument")
}
