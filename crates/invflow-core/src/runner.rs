//! Run controller
//!
//! Exports a list of profiles one after another, or concurrently with at
//! most `max_profile_workers` in flight when `parallel_profiles` is set.
//! A failing profile is recorded and the run moves on.

use crate::exporter::{ExportReport, ProfileExporter};
use crate::provider::AccountProvider;
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use invflow_config::ExportConfig;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// A profile whose export did not produce a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileFailure {
    pub profile: String,
    pub error: String,
}

/// Result of a whole run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Profiles that produced a document, in input order
    pub succeeded: Vec<String>,
    pub failed: Vec<ProfileFailure>,
    pub reports: Vec<ExportReport>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    /// Resource categories that failed across all exported profiles
    pub fn failed_task_count(&self) -> usize {
        self.reports.iter().map(ExportReport::failed_count).sum()
    }
}

type ProfileResult = std::result::Result<ExportReport, String>;

pub struct RunController {
    config: Arc<ExportConfig>,
    exporter: Arc<ProfileExporter>,
}

impl RunController {
    pub fn new(config: Arc<ExportConfig>, provider: Arc<dyn AccountProvider>) -> Self {
        let exporter = Arc::new(ProfileExporter::new(Arc::clone(&config), provider));
        Self { config, exporter }
    }

    /// Export every profile; an empty list means the configured profiles
    pub async fn run_all(&self, profiles: &[String]) -> RunSummary {
        let started = Instant::now();
        let profiles: Vec<String> = if profiles.is_empty() {
            self.config.profiles.clone()
        } else {
            profiles.to_vec()
        };

        tracing::info!("Exporting {} profile(s)", profiles.len());

        let results = if self.config.parallel_profiles && profiles.len() > 1 {
            tracing::warn!(
                "Parallel profile mode: up to {} profiles at once, {} categories each",
                self.config.max_profile_workers,
                self.config.max_workers
            );
            self.run_parallel(&profiles).await
        } else {
            self.run_sequential(&profiles).await
        };

        let mut summary = RunSummary::default();
        for (profile, result) in profiles.into_iter().zip(results) {
            match result {
                Ok(report) => {
                    summary.succeeded.push(profile);
                    summary.reports.push(report);
                }
                Err(error) => {
                    tracing::error!(profile = %profile, "Export failed: {}", error);
                    summary.failed.push(ProfileFailure { profile, error });
                }
            }
        }
        summary.elapsed = started.elapsed();

        tracing::info!(
            "Run finished: {}/{} profiles exported in {:.1}s",
            summary.succeeded.len(),
            summary.total(),
            summary.elapsed.as_secs_f64()
        );

        summary
    }

    async fn run_sequential(&self, profiles: &[String]) -> Vec<ProfileResult> {
        let mut results = Vec::with_capacity(profiles.len());
        for profile in profiles {
            results.push(run_profile(Arc::clone(&self.exporter), profile.clone()).await);
        }
        results
    }

    /// Results come back in input order
    async fn run_parallel(&self, profiles: &[String]) -> Vec<ProfileResult> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_profile_workers.max(1)));

        let mut pending: FuturesUnordered<_> = profiles
            .iter()
            .enumerate()
            .map(|(index, profile)| {
                let semaphore = Arc::clone(&semaphore);
                let exporter = Arc::clone(&self.exporter);
                let profile = profile.clone();
                async move {
                    let _permit = semaphore.acquire().await;
                    (index, run_profile(exporter, profile).await)
                }
            })
            .collect();

        let mut indexed = Vec::with_capacity(profiles.len());
        while let Some(result) = pending.next().await {
            indexed.push(result);
        }
        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, result)| result).collect()
    }
}

/// Export one profile on its own tokio task so a panic stays with it
async fn run_profile(exporter: Arc<ProfileExporter>, profile: String) -> ProfileResult {
    let handle = tokio::spawn(async move { exporter.export_profile(&profile).await });
    match handle.await {
        Ok(Ok(report)) => Ok(report),
        Ok(Err(err)) => Err(err.to_string()),
        Err(join_err) => Err(format!("export task aborted: {}", join_err)),
    }
}
