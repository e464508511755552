use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub fn get_version() -> &'static str {
    const BASE_VERSION: &str = env!("CARGO_PKG_VERSION");

    // Release build: the tag at HEAD is the version
    if let Some(tag) = option_env!("BINREL_GIT_TAG") {
        return tag;
    }

    let commit = option_env!("BINREL_GIT_COMMIT").unwrap_or("unknown");
    let branch = option_env!("BINREL_GIT_BRANCH").unwrap_or("unknown");

    // Leaked once at startup
    let version = format!("v{}-{} ({})", BASE_VERSION, commit, branch);
    Box::leak(version.into_boxed_str())
}

#[derive(Parser)]
#[command(name = "binrel")]
#[command(about = "Publish and fetch platform binaries on GitHub Releases")]
#[command(version = get_version(), propagate_version = true)]
pub struct Cli {
    /// GitHub API token; a leading '!' runs the rest as a shell command
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Print debug output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Show what would be created, uploaded or deleted without doing it
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Increase verbosity (use multiple times for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Reduce output to errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload binaries to the release for the tag at HEAD
    #[command(
        after_help = "Examples:\n  binrel release app_linux_amd64 app_darwin_amd64 app_windows_386.exe\n  binrel --dry-run release --force dist/*"
    )]
    Release {
        /// Binaries named <program>_<os>_<arch>[.exe]
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Repository to publish to (e.g., 'owner/repo'); defaults to the git remote
        #[arg(long)]
        repository: Option<String>,

        /// Replace binaries of the same kind already in the release
        #[arg(long)]
        force: bool,

        /// Keep binaries of the same kind in older releases
        #[arg(long)]
        keep: bool,
    },

    /// Download a binary for this platform from the latest release
    #[command(
        after_help = "Examples:\n  binrel get app\n  binrel get app_linux_386\n  binrel get github.com/owner/repo\n  binrel get github.com/owner/repo/app_windows_amd64"
    )]
    Get {
        /// Program name or github.com/<owner>/<repo>[/<program>]
        target: String,

        /// Keep the asset name instead of renaming to the program
        #[arg(long)]
        preserve: bool,

        /// Directory to save into
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List binaries in every release
    List {
        /// github.com/<owner>/<repo>[/<program>]; defaults to the git remote
        target: Option<String>,
    },

    /// Show the current version
    Version,
}
