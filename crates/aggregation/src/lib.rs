//! Inventory-driven incremental aggregation of VPTS files.
//!
//! The flow for one run:
//! 1. Read the storage inventory manifest of the previous day
//! 2. Count profile files per radar-day (coverage) and the recently modified ones
//! 3. Rebuild the daily VPTS file of every changed radar-day
//! 4. Roll the daily files of every month with a rebuilt day up into a monthly file
//!
//! ```ignore
//! use aggregation::{AggregationConfig, AggregationScheduler};
//! use storage::ObjectStorage;
//!
//! let scheduler = AggregationScheduler::new(config, data, inventory)?;
//! let report = scheduler.run(chrono::Utc::now()).await?;
//! ```

pub mod config;
pub mod error;
pub mod inventory;
pub mod manifest;
pub mod scheduler;

pub use config::{AggregationConfig, PartialGroupPolicy};
pub use error::{AggregationError, Result};
pub use inventory::{group_key, InventoryDiff, InventoryDiffEngine, PROFILE_SUFFIX};
pub use manifest::{read_listing, stream_listing, InventoryRecord, Manifest, ManifestFile};
pub use scheduler::{
    concat_daily_files, AggregationReport, AggregationScheduler, DayJobReport, DayJobState,
    FailureReport, MonthJobReport,
};
