//! Aggregation run configuration.
//!
//! A plain value handed to [`crate::AggregationScheduler::new`]. Loading it
//! from files or the environment is left to the calling binary.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use vpts_csv::{default_workers, get_schema, DuplicatePolicy};

use crate::error::{AggregationError, Result};

/// What to do with a day group when some of its files fail to convert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialGroupPolicy {
    /// Write the rows of the files that converted and report the rest.
    #[default]
    SkipFailedFiles,
    /// Leave the group's output untouched and mark the group failed.
    FailGroup,
}

/// Settings for one inventory-driven aggregation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Bucket holding the raw files and the aggregated outputs
    pub bucket: String,
    /// Bucket the storage inventory is delivered to
    pub inventory_bucket: String,
    /// Inventory prefix inside the inventory bucket; derived from `bucket` when unset
    pub inventory_prefix: Option<String>,
    /// Hour-of-day marker of the daily inventory delivery, e.g. `01-00`
    pub manifest_hour: String,
    /// Lookback window in days; 0 rebuilds everything since `bucket_creation`
    pub modified_days_ago: u32,
    pub bucket_creation: DateTime<Utc>,
    pub schema_version: String,
    /// Day groups fetched and converted at the same time
    pub max_concurrent_groups: usize,
    /// Size of the per-file parsing pool
    pub parse_workers: usize,
    /// Inventory rows held in memory at once
    pub manifest_chunk_size: usize,
    pub duplicate_policy: DuplicatePolicy,
    pub partial_group_policy: PartialGroupPolicy,
    /// Persist the coverage table at `coverage_key`
    pub write_coverage: bool,
    pub coverage_key: String,
}

fn default_bucket_creation() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 8, 2, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            bucket: "aloft".to_string(),
            inventory_bucket: "aloft-inventory".to_string(),
            inventory_prefix: None,
            manifest_hour: "01-00".to_string(),
            modified_days_ago: 2,
            bucket_creation: default_bucket_creation(),
            schema_version: "v1.0".to_string(),
            max_concurrent_groups: 4,
            parse_workers: default_workers(),
            manifest_chunk_size: 100_000,
            duplicate_policy: DuplicatePolicy::default(),
            partial_group_policy: PartialGroupPolicy::default(),
            write_coverage: true,
            coverage_key: "coverage.csv".to_string(),
        }
    }
}

impl AggregationConfig {
    /// Parse a YAML document; missing fields take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| AggregationError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.bucket.is_empty() {
            return Err(AggregationError::InvalidConfig("bucket is empty".into()));
        }
        if self.max_concurrent_groups == 0 {
            return Err(AggregationError::InvalidConfig(
                "max_concurrent_groups must be at least 1".into(),
            ));
        }
        if self.manifest_chunk_size == 0 {
            return Err(AggregationError::InvalidConfig(
                "manifest_chunk_size must be at least 1".into(),
            ));
        }
        get_schema(&self.schema_version)?;
        Ok(())
    }

    /// Format: {bucket}/{bucket}-hdf5-files-inventory
    pub fn inventory_prefix(&self) -> String {
        self.inventory_prefix
            .clone()
            .unwrap_or_else(|| format!("{}/{}-hdf5-files-inventory", self.bucket, self.bucket))
    }

    /// Key of the manifest delivered for the day before `now`.
    pub fn manifest_key(&self, now: DateTime<Utc>) -> String {
        let yesterday = now.date_naive() - Duration::days(1);
        format!(
            "{}/{}T{}Z/manifest.json",
            self.inventory_prefix(),
            yesterday.format("%Y-%m-%d"),
            self.manifest_hour
        )
    }

    /// Length of the lookback window at `now`.
    pub fn lookback(&self, now: DateTime<Utc>) -> Duration {
        if self.modified_days_ago == 0 {
            Duration::days((now - self.bucket_creation).num_days() + 1)
        } else {
            Duration::days(i64::from(self.modified_days_ago))
        }
    }

    /// Files modified strictly after this instant are rebuilt.
    pub fn modified_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.lookback(now)
    }

    pub fn is_full_rebuild(&self) -> bool {
        self.modified_days_ago == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = AggregationConfig::default();
        assert_eq!(config.inventory_prefix(), "aloft/aloft-hdf5-files-inventory");
        assert_eq!(config.bucket_creation, at(2022, 8, 2, 0));
        assert!(config.parse_workers >= 1);
        config.validate().unwrap();
    }

    #[test]
    fn test_manifest_key_uses_previous_day() {
        let config = AggregationConfig::default();
        assert_eq!(
            config.manifest_key(at(2023, 3, 1, 8)),
            "aloft/aloft-hdf5-files-inventory/2023-02-28T01-00Z/manifest.json"
        );
    }

    #[test]
    fn test_lookback_window() {
        let config = AggregationConfig {
            modified_days_ago: 3,
            ..Default::default()
        };
        assert_eq!(config.modified_cutoff(at(2023, 3, 20, 12)), at(2023, 3, 17, 12));
    }

    #[test]
    fn test_full_rebuild_reaches_bucket_creation() {
        let config = AggregationConfig {
            modified_days_ago: 0,
            ..Default::default()
        };
        let now = at(2023, 3, 20, 12);
        assert!(config.is_full_rebuild());
        assert!(config.modified_cutoff(now) < config.bucket_creation);
    }

    #[test]
    fn test_from_yaml() {
        let config = AggregationConfig::from_yaml_str(
            "bucket: aloftdata\nmodified_days_ago: 5\nduplicate_policy: keep_first\npartial_group_policy: fail_group\n",
        )
        .unwrap();
        assert_eq!(config.bucket, "aloftdata");
        assert_eq!(config.modified_days_ago, 5);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::KeepFirst);
        assert_eq!(config.partial_group_policy, PartialGroupPolicy::FailGroup);
        assert_eq!(config.inventory_bucket, "aloft-inventory");
    }

    #[test]
    fn test_unknown_schema_version_rejected() {
        let err = AggregationConfig::from_yaml_str("schema_version: v2.0\n").unwrap_err();
        assert_eq!(err.code(), "unsupported_schema_version");
    }
}
