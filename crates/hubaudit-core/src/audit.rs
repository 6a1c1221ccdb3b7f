//! Orchestration of a full audit run.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use tracing::info;

use crate::TOOL_VERSION;
use crate::cancel::CancelToken;
use crate::client::InventoryClient;
use crate::config::AuditConfig;
use crate::report::writer::ReportWriter;
use crate::rules::classify::classify;
use crate::session;
use crate::snapshot::fetch::{FetchOutcome, InventoryFetcher};

/// How the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    /// Full report written.
    Complete,
    /// Operator interrupt: a resume checkpoint was written instead.
    Interrupted,
}

/// Owns one audit run end to end: session start, fetch, classification,
/// and the final (or checkpoint) write. Collaborators are injected; the
/// auditor holds no ambient state.
pub struct Auditor<'a> {
    client: &'a dyn InventoryClient,
    config: AuditConfig,
    writer: ReportWriter,
    cancel: CancelToken,
}

impl<'a> Auditor<'a> {
    pub fn new(
        client: &'a dyn InventoryClient,
        config: AuditConfig,
        writer: ReportWriter,
        cancel: CancelToken,
    ) -> Self {
        Self {
            client,
            config,
            writer,
            cancel,
        }
    }

    pub fn run(&self) -> Result<AuditOutcome> {
        let (mut snapshot, resume) = session::start(self.config.mode, self.writer.path())
            .context("starting analysis session")?;

        snapshot.tool_version = TOOL_VERSION.to_string();
        snapshot.time_of_analysis = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        snapshot.hub_url = self.client.base_url().to_string();
        snapshot.hub_version = self
            .client
            .current_version()
            .context("querying server version")?;

        let fetcher = InventoryFetcher::new(self.client, &self.config, self.cancel.clone());
        let outcome = fetcher
            .fetch(&mut snapshot, &resume)
            .context("fetching inventory")?;

        info!("analyzing data");
        classify(&mut snapshot, &self.config, &resume);

        match outcome {
            FetchOutcome::Complete => {
                self.writer.write(&snapshot).context("writing report")?;
                Ok(AuditOutcome::Complete)
            }
            FetchOutcome::Cancelled => {
                self.writer
                    .write(&snapshot)
                    .context("writing resume checkpoint")?;
                info!("interrupted; checkpoint written, re-run with --mode resume to continue");
                Ok(AuditOutcome::Interrupted)
            }
        }
    }
}
