//! Incremental daily and monthly aggregation driven by an inventory diff.
//!
//! Day groups run concurrently up to `max_concurrent_groups`. Month
//! rollups start only after every day job of the run has finished.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use storage::ObjectStorage;
use vpts_common::{storage_url, DayGroup, MonthGroup};
use vpts_csv::{ConversionPipeline, PipelineOptions, ProfileInput};

use crate::config::{AggregationConfig, PartialGroupPolicy};
use crate::error::{AggregationError, Result};
use crate::inventory::{InventoryDiff, InventoryDiffEngine, PROFILE_SUFFIX};

/// Lifecycle of one day group within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayJobState {
    Pending,
    Fetching,
    Converting,
    Writing,
    Done,
    Failed,
}

impl fmt::Display for DayJobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DayJobState::Pending => "pending",
            DayJobState::Fetching => "fetching",
            DayJobState::Converting => "converting",
            DayJobState::Writing => "writing",
            DayJobState::Done => "done",
            DayJobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A reported failure with its taxonomy tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    /// Object key or group the failure belongs to
    pub target: String,
    pub code: &'static str,
    pub message: String,
}

impl FailureReport {
    fn new(target: impl Into<String>, error: &AggregationError) -> Self {
        Self {
            target: target.into(),
            code: error.code(),
            message: error.to_string(),
        }
    }
}

/// Outcome of one day group.
#[derive(Debug, Clone, Serialize)]
pub struct DayJobReport {
    pub group: DayGroup,
    pub state: DayJobState,
    pub files_listed: usize,
    pub files_fetched: usize,
    /// Listed files that were gone by fetch time
    pub files_vanished: usize,
    /// Files that failed to convert
    pub failures: Vec<FailureReport>,
    pub rows: usize,
    /// Written daily file, if any
    pub output_key: Option<String>,
    pub error: Option<FailureReport>,
}

/// Outcome of one month rollup.
#[derive(Debug, Clone, Serialize)]
pub struct MonthJobReport {
    pub group: MonthGroup,
    pub daily_files: usize,
    pub output_key: Option<String>,
    pub error: Option<FailureReport>,
}

/// Summary of a full run.
#[derive(Debug, Clone, Serialize)]
pub struct AggregationReport {
    pub manifest_key: String,
    pub modified_after: DateTime<Utc>,
    pub coverage_groups: usize,
    pub coverage_files: usize,
    pub coverage_key: Option<String>,
    pub days: Vec<DayJobReport>,
    pub months: Vec<MonthJobReport>,
}

impl AggregationReport {
    pub fn days_in_state(&self, state: DayJobState) -> usize {
        self.days.iter().filter(|day| day.state == state).count()
    }

    pub fn files_vanished(&self) -> usize {
        self.days.iter().map(|day| day.files_vanished).sum()
    }

    pub fn files_failed(&self) -> usize {
        self.days.iter().map(|day| day.failures.len()).sum()
    }

    pub fn months_failed(&self) -> usize {
        self.months.iter().filter(|m| m.error.is_some()).count()
    }

    /// True when no day group and no month rollup failed.
    pub fn is_success(&self) -> bool {
        self.days_in_state(DayJobState::Failed) == 0 && self.months_failed() == 0
    }
}

struct DayJob {
    report: DayJobReport,
}

impl DayJob {
    fn new(group: DayGroup) -> Self {
        Self {
            report: DayJobReport {
                group,
                state: DayJobState::Pending,
                files_listed: 0,
                files_fetched: 0,
                files_vanished: 0,
                failures: Vec::new(),
                rows: 0,
                output_key: None,
                error: None,
            },
        }
    }

    fn transition(&mut self, state: DayJobState) {
        debug!(
            group = %self.report.group,
            from = %self.report.state,
            to = %state,
            "Day job transition"
        );
        self.report.state = state;
    }
}

struct FetchedFile {
    key: String,
    data: Bytes,
}

struct Converted {
    csv: Vec<u8>,
    rows: usize,
    failures: Vec<FailureReport>,
}

/// Rebuilds the daily and monthly outputs of changed radar groups.
pub struct AggregationScheduler {
    config: AggregationConfig,
    data: ObjectStorage,
    inventory: ObjectStorage,
    pipeline: Arc<ConversionPipeline>,
}

impl AggregationScheduler {
    /// Fails on invalid settings, including an unknown schema version.
    pub fn new(
        config: AggregationConfig,
        data: ObjectStorage,
        inventory: ObjectStorage,
    ) -> Result<Self> {
        config.validate()?;
        let pipeline = ConversionPipeline::new(
            &config.schema_version,
            PipelineOptions {
                workers: config.parse_workers,
                duplicate_policy: config.duplicate_policy,
            },
        )?;
        Ok(Self {
            config,
            data,
            inventory,
            pipeline: Arc::new(pipeline),
        })
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Diff the inventory delivered for `now` and rebuild what changed.
    #[instrument(skip(self), fields(bucket = %self.data.bucket()))]
    pub async fn run(&self, now: DateTime<Utc>) -> Result<AggregationReport> {
        let manifest_key = self.config.manifest_key(now);
        let modified_after = self.config.modified_cutoff(now);
        if self.config.is_full_rebuild() {
            info!(
                modified_after = %modified_after,
                "Rebuilding every file since bucket creation"
            );
        }

        let diff = self.diff(&manifest_key, modified_after).await?;

        let coverage_key = if self.config.write_coverage {
            Some(self.write_coverage(&diff).await?)
        } else {
            None
        };

        let days = self
            .rebuild_days(diff.to_rebuild.keys().cloned().collect())
            .await;
        debug!(
            months = diff.months_to_rebuild().len(),
            "Months touched by the inventory diff"
        );
        let months = self.rollup_months(months_to_roll_up(&days)).await;

        let report = AggregationReport {
            manifest_key,
            modified_after,
            coverage_groups: diff.coverage.len(),
            coverage_files: diff.covered_files(),
            coverage_key,
            days,
            months,
        };
        info!(
            days_done = report.days_in_state(DayJobState::Done),
            days_failed = report.days_in_state(DayJobState::Failed),
            months = report.months.len(),
            files_vanished = report.files_vanished(),
            files_failed = report.files_failed(),
            "Aggregation run complete"
        );
        Ok(report)
    }

    /// Coverage and rebuild sets of one manifest.
    pub async fn diff(
        &self,
        manifest_key: &str,
        modified_after: DateTime<Utc>,
    ) -> Result<InventoryDiff> {
        InventoryDiffEngine::new(modified_after, self.config.manifest_chunk_size)
            .diff_manifest(&self.inventory, manifest_key)
            .await
    }

    /// Persist the coverage table, returning its key.
    pub async fn write_coverage(&self, diff: &InventoryDiff) -> Result<String> {
        let key = self.config.coverage_key.clone();
        self.data.put(&key, Bytes::from(diff.coverage_csv()?)).await?;
        info!(key = %key, groups = diff.coverage.len(), "Wrote coverage table");
        Ok(key)
    }

    /// Rebuild day groups concurrently; reports come back in group order.
    pub async fn rebuild_days(&self, groups: Vec<DayGroup>) -> Vec<DayJobReport> {
        info!(groups = groups.len(), "Rebuilding daily files");
        let mut reports: Vec<DayJobReport> = stream::iter(groups)
            .map(|group| self.rebuild_day(group))
            .buffer_unordered(self.config.max_concurrent_groups.max(1))
            .collect()
            .await;
        reports.sort_by(|a, b| a.group.cmp(&b.group));
        reports
    }

    /// Rebuild one day group. Never fails; the outcome is in the report.
    #[instrument(skip(self, group), fields(group = %group))]
    pub async fn rebuild_day(&self, group: DayGroup) -> DayJobReport {
        let mut job = DayJob::new(group);
        match self.run_day(&mut job).await {
            Ok(()) => job.transition(DayJobState::Done),
            Err(e) => {
                error!(
                    group = %job.report.group,
                    state = %job.report.state,
                    code = e.code(),
                    error = %e,
                    "Day group failed"
                );
                job.report.error = Some(FailureReport::new(job.report.group.to_string(), &e));
                job.transition(DayJobState::Failed);
            }
        }
        job.report
    }

    async fn run_day(&self, job: &mut DayJob) -> Result<()> {
        job.transition(DayJobState::Fetching);
        let fetched = self.fetch_day(job).await?;
        if fetched.is_empty() {
            warn!(group = %job.report.group, "No files left to convert, keeping existing output");
            return Ok(());
        }

        job.transition(DayJobState::Converting);
        let converted = self.convert(fetched).await?;
        metrics::counter!("vpts_source_files_failed_total")
            .increment(converted.failures.len() as u64);
        job.report.failures = converted.failures;
        if converted.rows == 0 && !job.report.failures.is_empty() {
            return Err(AggregationError::EmptyGroup(job.report.group.to_string()));
        }

        job.transition(DayJobState::Writing);
        let key = job.report.group.daily_vpts_path();
        self.data.put(&key, Bytes::from(converted.csv)).await?;
        metrics::counter!("vpts_daily_files_written_total").increment(1);
        info!(key = %key, rows = converted.rows, "Wrote daily file");

        job.report.rows = converted.rows;
        job.report.output_key = Some(key);
        Ok(())
    }

    async fn fetch_day(&self, job: &mut DayJob) -> Result<Vec<FetchedFile>> {
        let mut keys: Vec<String> = self
            .data
            .list(&job.report.group.h5_prefix())
            .await?
            .into_iter()
            .filter(|key| key.ends_with(PROFILE_SUFFIX))
            .collect();
        keys.sort();
        job.report.files_listed = keys.len();
        self.fetch_files(job, keys).await
    }

    /// Download listed files; files gone since the listing are skipped.
    async fn fetch_files(&self, job: &mut DayJob, keys: Vec<String>) -> Result<Vec<FetchedFile>> {
        let mut fetched = Vec::with_capacity(keys.len());
        for key in keys {
            match self.data.get(&key).await {
                Ok(data) => fetched.push(FetchedFile { key, data }),
                Err(e) if e.is_not_found() => {
                    warn!(key = %key, "Source file vanished before fetch, skipping");
                    metrics::counter!("vpts_source_files_skipped_total").increment(1);
                    job.report.files_vanished += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
        job.report.files_fetched = fetched.len();
        Ok(fetched)
    }

    async fn convert(&self, files: Vec<FetchedFile>) -> Result<Converted> {
        let pipeline = Arc::clone(&self.pipeline);
        let policy = self.config.partial_group_policy;
        let bucket = self.data.bucket().to_string();
        tokio::task::spawn_blocking(move || convert_files(&pipeline, policy, &bucket, files))
            .await
            .map_err(|e| AggregationError::Task(e.to_string()))?
    }

    /// Roll up months concurrently; reports come back in group order.
    pub async fn rollup_months(&self, months: BTreeSet<MonthGroup>) -> Vec<MonthJobReport> {
        info!(months = months.len(), "Rolling up monthly files");
        let mut reports: Vec<MonthJobReport> = stream::iter(months)
            .map(|month| self.rollup_month(month))
            .buffer_unordered(self.config.max_concurrent_groups.max(1))
            .collect()
            .await;
        reports.sort_by(|a, b| a.group.cmp(&b.group));
        reports
    }

    /// Concatenate every daily file of a month present in storage.
    #[instrument(skip(self, month), fields(month = %month))]
    pub async fn rollup_month(&self, month: MonthGroup) -> MonthJobReport {
        let mut report = MonthJobReport {
            group: month,
            daily_files: 0,
            output_key: None,
            error: None,
        };
        if let Err(e) = self.run_month(&mut report).await {
            error!(month = %report.group, code = e.code(), error = %e, "Month rollup failed");
            report.error = Some(FailureReport::new(report.group.to_string(), &e));
        }
        report
    }

    async fn run_month(&self, report: &mut MonthJobReport) -> Result<()> {
        let marker = report.group.daily_file_marker();
        let mut keys: Vec<String> = self
            .data
            .list(&report.group.daily_vpts_prefix())
            .await?
            .into_iter()
            .filter(|key| {
                let name = key.rsplit('/').next().unwrap_or(key);
                name.contains(&marker) && name.ends_with(".csv")
            })
            .collect();
        keys.sort();

        let mut daily = Vec::with_capacity(keys.len());
        for key in &keys {
            match self.data.get(key).await {
                Ok(data) => daily.push(data),
                Err(e) if e.is_not_found() => {
                    warn!(key = %key, "Daily file vanished before rollup, skipping");
                }
                Err(e) => return Err(e.into()),
            }
        }
        report.daily_files = daily.len();
        if daily.is_empty() {
            warn!(month = %report.group, "No daily files to roll up");
            return Ok(());
        }

        let key = report.group.monthly_vpts_path();
        let body = gzip(&concat_daily_files(&daily))?;
        self.data.put(&key, Bytes::from(body)).await?;
        metrics::counter!("vpts_monthly_files_written_total").increment(1);
        info!(key = %key, daily_files = daily.len(), "Wrote monthly file");

        report.output_key = Some(key);
        Ok(())
    }
}

fn convert_files(
    pipeline: &ConversionPipeline,
    policy: PartialGroupPolicy,
    bucket: &str,
    files: Vec<FetchedFile>,
) -> Result<Converted> {
    let scratch = tempfile::tempdir()?;
    let mut inputs = Vec::with_capacity(files.len());
    let mut keys: HashMap<PathBuf, String> = HashMap::with_capacity(files.len());
    for (index, file) in files.into_iter().enumerate() {
        // Keys of one listing may share a file name under different prefixes.
        let name = file.key.rsplit('/').next().unwrap_or(&file.key);
        let path = scratch.path().join(format!("{:05}_{}", index, name));
        std::fs::write(&path, &file.data)?;
        inputs.push(ProfileInput::with_reference(
            path.clone(),
            storage_url(bucket, &file.key),
        ));
        keys.insert(path, file.key);
    }

    let partial = pipeline.parse_many_partial(&inputs)?;
    let mut failures = Vec::with_capacity(partial.failures.len());
    for failure in partial.failures {
        let key = keys
            .get(&failure.path)
            .cloned()
            .unwrap_or_else(|| failure.path.display().to_string());
        let error = AggregationError::File {
            key: key.clone(),
            source: failure.error,
        };
        if policy == PartialGroupPolicy::FailGroup {
            return Err(error);
        }
        failures.push(FailureReport::new(key, &error));
    }

    Ok(Converted {
        rows: partial.table.len(),
        csv: partial.table.to_csv_bytes()?,
        failures,
    })
}

/// Months with at least one day group rebuilt in this run.
///
/// A month whose day jobs all failed has no new daily file, so its monthly
/// file is left as it is.
fn months_to_roll_up(days: &[DayJobReport]) -> BTreeSet<MonthGroup> {
    let rebuilt: BTreeSet<MonthGroup> = days
        .iter()
        .filter(|day| day.state == DayJobState::Done)
        .map(|day| day.group.month_group())
        .collect();
    let skipped: BTreeSet<MonthGroup> = days
        .iter()
        .map(|day| day.group.month_group())
        .filter(|month| !rebuilt.contains(month))
        .collect();
    for month in &skipped {
        warn!(month = %month, "No day of the month was rebuilt, keeping monthly file");
    }
    rebuilt
}

/// Join daily CSV files as raw text, keeping only the first header.
pub fn concat_daily_files(files: &[Bytes]) -> Vec<u8> {
    let mut out = Vec::with_capacity(files.iter().map(Bytes::len).sum());
    for (index, file) in files.iter().enumerate() {
        let body: &[u8] = if index == 0 {
            file
        } else {
            match file.iter().position(|b| *b == b'\n') {
                Some(end) => &file[end + 1..],
                None => &[],
            }
        };
        if body.is_empty() {
            continue;
        }
        out.extend_from_slice(body);
        if !body.ends_with(b"\n") {
            out.push(b'\n');
        }
    }
    out
}

fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
