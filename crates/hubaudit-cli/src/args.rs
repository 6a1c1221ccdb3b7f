use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "hubaudit",
    version,
    about = "Audits an SCA server's inventory and recommends cleanup actions"
)]
pub struct Args {
    /// Server URL, e.g. https://hub.example.com
    pub hub_url: String,

    /// API access token
    pub api_token: Option<String>,

    /// File containing an API access token (first line)
    #[arg(long)]
    pub api_token_file: Option<PathBuf>,

    /// Server username (used with --password)
    #[arg(long)]
    pub username: Option<String>,

    /// Server password (used with --username)
    #[arg(long)]
    pub password: Option<String>,

    /// Connection timeout in seconds
    #[arg(long, default_value_t = 15)]
    pub timeout: u64,

    /// Maximum number of retries for a single request
    #[arg(long, default_value_t = 3)]
    pub retries: u32,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub insecure: bool,

    /// Where the analysis results are written
    #[arg(short, long, default_value = "hubaudit_report.json")]
    pub file: PathBuf,

    /// Collect and store job statistics as part of the analysis
    #[arg(short, long)]
    pub jobs: bool,

    /// Start a new analysis or resume a previously interrupted one.
    /// Resuming requires the previously saved report file; new overwrites it.
    #[arg(short, long, value_enum, default_value_t = Mode::New)]
    pub mode: Mode,

    /// Flag projects having more versions than this
    #[arg(long = "max-versions-per-project", default_value_t = 20)]
    pub max_versions_per_project: usize,

    /// Flag project-versions having more scans than this
    #[arg(long = "max-scans-per-version", default_value_t = 10)]
    pub max_scans_per_version: usize,

    /// Age cutoff in days for unmapped scans, carried for cleanup tooling
    #[arg(long = "max-age-unmapped-scans", default_value_t = 365)]
    pub max_age_unmapped_scans: u32,

    /// Page size used when draining server-side pagination
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    pub page_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    New,
    Resume,
}
