mod binary;
mod cli;
mod config;
mod directory;
mod error;
mod fetch;
mod git;
mod host;
mod list;
mod platform;
mod publish;
mod target;
mod types;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use config::Settings;
use console::style;
use error::Error;
use fetch::{FetchOptions, FetchOutcome, FetchRequest, Fetcher};
use git::GitCli;
use host::{GitHub, ReleaseHost};
use list::Listing;
use publish::{PublishOptions, PublishReport, Publisher, ReleaseAction};
use std::path::PathBuf;
use target::Target;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(&cli);

    if let Err(e) = run(cli).await {
        eprintln!("binrel: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let load_settings = || Settings::load(cli.token.as_deref(), cli.dry_run);
    let vcs = GitCli::new();

    match cli.command {
        Commands::Version => {
            println!("binrel {}", cli::get_version());
        }

        Commands::Release {
            files,
            repository,
            force,
            keep,
        } => {
            let settings = load_settings()?;
            if settings.token.is_none() {
                return Err(Error::MissingToken.into());
            }
            let target = match repository {
                Some(repository) => Target::parse_repository(&repository)?,
                None => Target::default().or_ambient(&vcs)?,
            };
            tracing::debug!("repository = {}", target);

            let host = GitHub::new(&settings, &target.owner, &target.repository);
            let options = PublishOptions {
                force,
                keep,
                dry_run: settings.dry_run,
            };
            let report = Publisher::new(&host, &vcs, options).publish(&files).await?;
            print_report(&host, &report);
            report.into_result()?;
        }

        Commands::Get {
            target,
            preserve,
            output,
        } => {
            let settings = load_settings()?;
            let local = platform::current_platform();
            let request = FetchRequest::resolve(&target, &vcs, local)?;
            tracing::debug!("target = {} ({})", request.target, request.binary);

            let host = GitHub::new(&settings, &request.target.owner, &request.target.repository);
            let options = FetchOptions {
                preserve,
                dry_run: settings.dry_run,
            };
            let fetcher = Fetcher::new(&host, options, local)
                .with_output_dir(output.unwrap_or_else(|| PathBuf::from(".")));

            match fetcher.fetch(&request).await? {
                FetchOutcome::Downloaded(download) => {
                    let verb = if download.dry_run { "would download" } else { "downloaded" };
                    println!(
                        "{} {} => {}",
                        style(verb).green(),
                        download.url,
                        style(download.dest.display()).bold()
                    );
                }
                FetchOutcome::NothingFound { binary, location } => {
                    println!("Nothing found for {} in {}", binary, location);
                }
            }
        }

        Commands::List { target } => {
            let settings = load_settings()?;
            let target = Target::parse(target.as_deref().unwrap_or(""))?.or_ambient(&vcs)?;
            let host = GitHub::new(&settings, &target.owner, &target.repository);
            let program = (!target.program.is_empty()).then_some(target.program.as_str());

            match list::list_binaries(&host, program).await? {
                Listing::NoReleases { location } => {
                    println!("There are no releases for {}", location);
                }
                Listing::NoBinaries { location } => {
                    println!("There are no binary assets for {}", location);
                }
                Listing::Rows(rows) => {
                    let width = rows.iter().map(|r| r.asset.len()).max().unwrap_or(0);
                    for row in rows {
                        println!("{:width$} {}", row.asset, style(row.tag).dim(), width = width);
                    }
                }
            }
        }
    }

    Ok(())
}

fn setup_logging(cli: &Cli) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if cli.debug || cli.dry_run || cli.verbose >= 2 {
        "debug"
    } else if cli.quiet {
        "error"
    } else if cli.verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();
}

fn print_report<H: ReleaseHost + ?Sized>(host: &H, report: &PublishReport) {
    if report.dry_run {
        if report.action == ReleaseAction::WouldCreate {
            println!("{} {}", style("would create release").yellow(), report.tag);
        }
        for upload in &report.uploads {
            for old in &upload.replaces {
                println!("{} {} ({})", style("would delete").yellow(), old.name, report.tag);
            }
            println!(
                "{} {} ({} bytes)",
                style("would upload").yellow(),
                upload.asset_name(),
                upload.size
            );
        }
        for (tag, asset) in &report.swept {
            println!("{} {} ({})", style("would delete").yellow(), asset.name, tag);
        }
        return;
    }

    let width = report
        .uploads
        .iter()
        .map(|u| u.binary.program.len())
        .max()
        .unwrap_or(0);
    for upload in report.uploads.iter().filter(|u| u.asset.is_some()) {
        let program = format!("{:width$}", upload.binary.program, width = width);
        println!(
            "{}  {}",
            style(program).bold(),
            host.download_url(&report.tag, &upload.asset_name())
        );
    }
    for (tag, asset) in &report.swept {
        tracing::info!("Deleted {} from {}", asset.name, tag);
    }
}
