use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use hubaudit_core::audit::{AuditOutcome, Auditor};
use hubaudit_core::cancel::CancelToken;
use hubaudit_core::client::http::{Credentials, HubClient, TransportOptions};
use hubaudit_core::config::AuditConfig;
use hubaudit_core::report::writer::ReportWriter;
use hubaudit_core::session::RunMode;

mod args;

/// Exit status when the run was interrupted and a checkpoint was written.
const EXIT_INTERRUPTED: i32 = 130;

fn main() -> Result<()> {
    let args = args::Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("HUBAUDIT_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Destination check comes first: a permission problem must surface
    // before any network call is made.
    let writer = ReportWriter::create(&args.file)?;

    let credentials = credentials(&args)?;
    let options = TransportOptions {
        timeout: Duration::from_secs(args.timeout),
        retries: args.retries,
        insecure: args.insecure,
        ..TransportOptions::default()
    };
    if args.insecure {
        warn!("TLS certificate verification is disabled");
    }
    let client = HubClient::connect(&args.hub_url, credentials, options)
        .context("connecting to the server")?;

    let config = AuditConfig {
        max_versions_per_project: args.max_versions_per_project,
        max_scans_per_version: args.max_scans_per_version,
        max_age_for_unmapped_scans: args.max_age_unmapped_scans,
        analyze_jobs: args.jobs,
        mode: match args.mode {
            args::Mode::New => RunMode::New,
            args::Mode::Resume => RunMode::Resume,
        },
        page_size: args.page_size as usize,
    };

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("interrupt received, finishing current item and writing a checkpoint");
        handler_token.cancel();
    })
    .context("installing interrupt handler")?;

    let auditor = Auditor::new(&client, config, writer, cancel);
    match auditor.run()? {
        AuditOutcome::Complete => Ok(()),
        AuditOutcome::Interrupted => std::process::exit(EXIT_INTERRUPTED),
    }
}

/// De-tangle the possibilities of specifying credentials: an explicit
/// token wins, then a token file, then username/password. Supplying none
/// is a configuration error, caught before any work begins.
fn credentials(args: &args::Args) -> Result<Credentials> {
    if let Some(token) = &args.api_token {
        return Ok(Credentials::ApiToken(token.clone()));
    }
    if let Some(path) = &args.api_token_file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading token file {}", path.display()))?;
        let token = text
            .lines()
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .context("token file is empty")?;
        return Ok(Credentials::ApiToken(token.to_string()));
    }
    if let (Some(username), Some(password)) = (&args.username, &args.password) {
        return Ok(Credentials::Password {
            username: username.clone(),
            password: password.clone(),
        });
    }
    bail!("authentication credentials not specified: pass an API token, --api-token-file, or --username/--password");
}
