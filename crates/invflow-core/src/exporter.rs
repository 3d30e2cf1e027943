//! Profile exporter
//!
//! Exports one profile into one xlsx document: resolve the identity, create
//! one sheet per enabled resource category, run every category on the
//! [`TaskScheduler`], then size, freeze and save the document.
//!
//! Only identity resolution, sheet setup and saving can fail the export.
//! A failed category leaves its sheet with whatever rows it wrote before the
//! failure (usually just the header) and is reported in the outcomes.

use crate::document::{OutputDocument, SheetSummary};
use crate::error::Result;
use crate::provider::{AccountIdentity, AccountProvider};
use crate::scheduler::{ResourceTask, TaskOutcome, TaskScheduler};
use crate::tags::TagNormalizer;
use chrono::{Local, NaiveDateTime};
use invflow_config::ExportConfig;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Timestamp layout inside output file names
pub const FILE_TIMESTAMP_FORMAT: &str = "%y%m%d-%H%M";

/// What one profile export produced
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub profile: String,
    pub identity: AccountIdentity,
    pub path: PathBuf,
    pub sheets: Vec<SheetSummary>,
    pub outcomes: Vec<TaskOutcome>,
    pub elapsed: Duration,
}

impl ExportReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|o| o.succeeded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded)
    }

    pub fn succeeded_count(&self) -> usize {
        self.succeeded().count()
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }
}

/// `{prefix}_{YYMMDD-HHMM}_{accountId}-{accountAlias}.xlsx`
pub fn output_file_name(prefix: &str, timestamp: NaiveDateTime, identity: &AccountIdentity) -> String {
    format!(
        "{}_{}_{}-{}.xlsx",
        prefix,
        timestamp.format(FILE_TIMESTAMP_FORMAT),
        file_name_part(&identity.account_id),
        file_name_part(&identity.account_alias)
    )
}

/// Keep file name parts free of path separators and shell-hostile characters
fn file_name_part(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Entries of the service filter that name no available category
pub fn unknown_services(services: &[String], available: &[&str]) -> Vec<String> {
    services
        .iter()
        .filter(|s| !available.iter().any(|id| id.eq_ignore_ascii_case(s)))
        .cloned()
        .collect()
}

/// Exports single profiles with a shared config and provider
pub struct ProfileExporter {
    config: Arc<ExportConfig>,
    provider: Arc<dyn AccountProvider>,
    scheduler: TaskScheduler,
    normalizer: Arc<TagNormalizer>,
}

impl ProfileExporter {
    pub fn new(config: Arc<ExportConfig>, provider: Arc<dyn AccountProvider>) -> Self {
        let scheduler = TaskScheduler::new(config.max_workers);
        let normalizer = Arc::new(TagNormalizer::new(config.common_tags.iter().cloned()));
        Self {
            config,
            provider,
            scheduler,
            normalizer,
        }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Export one profile to its own document
    pub async fn export_profile(&self, profile: &str) -> Result<ExportReport> {
        let started = Instant::now();
        tracing::info!(profile = %profile, "Exporting profile");

        let session = self.provider.connect(profile).await?;
        let identity = session.identity;
        tracing::info!(
            profile = %profile,
            account = %identity.account_id,
            alias = %identity.account_alias,
            region = %identity.region,
            "Resolved account"
        );

        let file_name = output_file_name(
            &self.config.output_prefix,
            Local::now().naive_local(),
            &identity,
        );
        let path = self.config.output_dir.join(file_name);

        let available: Vec<&str> = session.collectors.iter().map(|c| c.id()).collect();
        for service in unknown_services(&self.config.services, &available) {
            tracing::warn!(
                profile = %profile,
                "Unknown service {:?} in filter (available: {})",
                service,
                available.join(", ")
            );
        }

        let collectors: Vec<_> = session
            .collectors
            .into_iter()
            .filter(|c| {
                let enabled = self.config.is_service_enabled(c.id());
                if !enabled {
                    tracing::debug!("Skipping disabled category: {}", c.id());
                }
                enabled
            })
            .collect();

        if collectors.is_empty() {
            tracing::warn!(profile = %profile, "Service filter matches no category, the document will be empty");
        }

        let mut document = OutputDocument::new();
        let tag_columns = self.normalizer.columns();
        let mut tasks = Vec::with_capacity(collectors.len());

        for collector in collectors {
            let mut header = collector.columns();
            header.extend(tag_columns.iter().cloned());
            let writer = document.add_sheet(collector.sheet_name(), header)?;

            let normalizer = Arc::clone(&self.normalizer);
            let name = collector.sheet_name().to_string();
            tasks.push(ResourceTask::new(name, async move {
                collector.collect(&writer, &normalizer).await?;
                tracing::debug!("{}: {} rows", writer.name(), writer.row_count());
                Ok(())
            }));
        }

        tracing::info!(
            profile = %profile,
            "Running {} categories with {} workers",
            tasks.len(),
            self.scheduler.max_concurrency()
        );
        let outcomes = self.scheduler.run_all(tasks).await;

        let failed: Vec<&TaskOutcome> = outcomes.iter().filter(|o| !o.succeeded).collect();
        tracing::info!(
            profile = %profile,
            "Completed {}/{} categories",
            outcomes.len() - failed.len(),
            outcomes.len()
        );
        for outcome in &failed {
            tracing::warn!(
                profile = %profile,
                "  {}: {}",
                outcome.task_name,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }

        document.finalize(self.config.style.max_column_width);
        let sheets = document.summaries();
        document.save(&path, &self.config.style).await?;

        let elapsed = started.elapsed();
        tracing::info!(
            profile = %profile,
            "Saved {} in {:.1}s",
            path.display(),
            elapsed.as_secs_f64()
        );

        Ok(ExportReport {
            profile: profile.to_string(),
            identity,
            path,
            sheets,
            outcomes,
            elapsed,
        })
    }
}
