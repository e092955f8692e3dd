//! Coverage and rebuild sets derived from a storage inventory.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use storage::ObjectStorage;
use vpts_common::{DayGroup, MonthGroup, OdimFilePath};

use crate::error::{AggregationError, Result};
use crate::manifest::{read_listing, stream_listing, InventoryRecord, Manifest};

/// Suffix of the profile files tracked by the inventory.
pub const PROFILE_SUFFIX: &str = ".h5";

/// Group key of an inventory key, or `None` for keys that are not profile files.
///
/// Coverage and rebuild counting both go through this function.
pub fn group_key(key: &str) -> Option<DayGroup> {
    if !key.ends_with(PROFILE_SUFFIX) {
        return None;
    }
    match OdimFilePath::from_inventory(key) {
        Ok(path) => Some(path.day_group()),
        Err(e) => {
            debug!(key = %key, error = %e, "Skipping unparseable inventory key");
            None
        }
    }
}

/// Per-group file counts over a whole inventory and over its recent part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryDiff {
    /// Files per group over the full snapshot
    pub coverage: BTreeMap<DayGroup, usize>,
    /// Files per group modified within the lookback window
    pub to_rebuild: BTreeMap<DayGroup, usize>,
    /// Rows read, before filtering
    pub rows_read: usize,
    /// Rows excluded by suffix or key parsing
    pub rows_excluded: usize,
}

impl InventoryDiff {
    /// Total files counted in the coverage.
    pub fn covered_files(&self) -> usize {
        self.coverage.values().sum()
    }

    /// Months touched by the rebuild set.
    pub fn months_to_rebuild(&self) -> BTreeSet<MonthGroup> {
        self.to_rebuild.keys().map(DayGroup::month_group).collect()
    }

    /// Coverage as `directory,file_count` CSV.
    pub fn coverage_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["directory", "file_count"])?;
        for (group, count) in &self.coverage {
            writer.write_record([group.to_string(), count.to_string()])?;
        }
        writer
            .into_inner()
            .map_err(|e| AggregationError::Io(e.into_error()))
    }
}

/// Splits inventory rows into coverage and rebuild counts.
#[derive(Debug, Clone)]
pub struct InventoryDiffEngine {
    modified_after: DateTime<Utc>,
    chunk_size: usize,
}

impl InventoryDiffEngine {
    /// Rows modified strictly after `modified_after` are scheduled for rebuild.
    pub fn new(modified_after: DateTime<Utc>, chunk_size: usize) -> Self {
        Self {
            modified_after,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn modified_after(&self) -> DateTime<Utc> {
        self.modified_after
    }

    /// Fold a batch of rows into `diff`.
    pub fn ingest(&self, diff: &mut InventoryDiff, records: &[InventoryRecord]) {
        for record in records {
            diff.rows_read += 1;
            let Some(group) = group_key(&record.key) else {
                diff.rows_excluded += 1;
                continue;
            };
            let recent = record
                .last_modified()
                .map(|modified| modified > self.modified_after)
                .unwrap_or(false);
            if recent {
                *diff.to_rebuild.entry(group.clone()).or_default() += 1;
            }
            *diff.coverage.entry(group).or_default() += 1;
        }
    }

    /// Fold one sub-listing into `diff`, chunk by chunk.
    pub fn ingest_listing(&self, diff: &mut InventoryDiff, key: &str, data: &[u8]) -> Result<usize> {
        read_listing(key, data, self.chunk_size, |chunk| {
            self.ingest(diff, &chunk);
            Ok(())
        })
    }

    /// Diff every sub-listing of a manifest stored in `inventory`.
    #[instrument(skip(self, inventory), fields(bucket = %inventory.bucket(), manifest = %manifest_key))]
    pub async fn diff_manifest(
        &self,
        inventory: &ObjectStorage,
        manifest_key: &str,
    ) -> Result<InventoryDiff> {
        let manifest = Manifest::load(inventory, manifest_key).await?;
        let mut diff = InventoryDiff::default();
        for file in &manifest.files {
            let rows = stream_listing(inventory, &file.key, self.chunk_size, |chunk| {
                self.ingest(&mut diff, &chunk)
            })
            .await?;
            debug!(listing = %file.key, rows, "Processed inventory listing");
        }

        info!(
            rows = diff.rows_read,
            excluded = diff.rows_excluded,
            coverage_groups = diff.coverage.len(),
            rebuild_groups = diff.to_rebuild.len(),
            "Inventory diff complete"
        );
        Ok(diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(key: &str, modified: &str) -> InventoryRecord {
        InventoryRecord {
            repository: "aloft".to_string(),
            key: key.to_string(),
            size: Some(1),
            modified: modified.to_string(),
        }
    }

    fn engine() -> InventoryDiffEngine {
        InventoryDiffEngine::new(Utc.with_ymd_and_hms(2023, 3, 17, 12, 0, 0).unwrap(), 2)
    }

    #[test]
    fn test_group_key_matches_file_name_path() {
        let key = "baltrad/hdf5/nosta/2023/03/11/nosta_vp_20230311T000500Z_0x9.h5";
        let from_inventory = group_key(key).unwrap();
        let from_name =
            OdimFilePath::from_file_name("nosta_vp_20230311T000500Z_0x9.h5", "baltrad", "hdf5")
                .unwrap()
                .day_group();
        assert_eq!(from_inventory, from_name);
        assert_eq!(from_inventory.to_string(), "baltrad/hdf5/nosta/2023/03/11");
    }

    #[test]
    fn test_group_key_excludes_other_files() {
        assert!(group_key("baltrad/daily/nosta/2023/nosta_vpts_20230311.csv").is_none());
        assert!(group_key("baltrad/hdf5/readme.h5").is_none());
    }

    #[test]
    fn test_coverage_and_rebuild_split() {
        let records = vec![
            record("baltrad/hdf5/nosta/2023/03/11/nosta_vp_20230311T000500Z_0x9.h5", "2023-03-18T01:00:00.000Z"),
            record("baltrad/hdf5/nosta/2023/03/11/nosta_vp_20230311T001000Z_0x9.h5", "2023-03-11T01:00:00.000Z"),
            record("baltrad/hdf5/nosta/2023/03/12/nosta_vp_20230312T000500Z_0x9.h5", "2023-03-12T01:00:00.000Z"),
            record("baltrad/hdf5/nosta/2023/03/12/inventory.csv", "2023-03-18T01:00:00.000Z"),
            record("baltrad/hdf5/nosta/2023/03/12/nosta_vp_20230312T001000Z_0x9.h5", "not a date"),
        ];
        let mut diff = InventoryDiff::default();
        engine().ingest(&mut diff, &records);

        assert_eq!(diff.rows_read, 5);
        assert_eq!(diff.rows_excluded, 1);
        assert_eq!(diff.covered_files(), 4);
        assert_eq!(diff.coverage.len(), 2);
        assert_eq!(diff.to_rebuild.len(), 1);
        for group in diff.to_rebuild.keys() {
            assert!(diff.coverage.contains_key(group));
        }
        let months = diff.months_to_rebuild();
        assert_eq!(months.len(), 1);
        assert_eq!(months.iter().next().unwrap().to_string(), "baltrad/hdf5/nosta/2023/03");
    }

    #[test]
    fn test_coverage_csv() {
        let records = vec![
            record("baltrad/hdf5/nosta/2023/03/11/nosta_vp_20230311T000500Z_0x9.h5", ""),
            record("baltrad/hdf5/nosta/2023/03/11/nosta_vp_20230311T001000Z_0x9.h5", ""),
        ];
        let mut diff = InventoryDiff::default();
        engine().ingest(&mut diff, &records);
        let text = String::from_utf8(diff.coverage_csv().unwrap()).unwrap();
        assert_eq!(text, "directory,file_count\nbaltrad/hdf5/nosta/2023/03/11,2\n");
    }
}
