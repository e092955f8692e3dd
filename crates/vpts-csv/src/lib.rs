//! Conversion of ODIM vertical profiles into the VPTS CSV exchange format.
//!
//! ```ignore
//! use vpts_csv::{ConversionPipeline, PipelineOptions, ProfileInput};
//!
//! let pipeline = ConversionPipeline::new("v1.0", PipelineOptions::default())?;
//! let table = pipeline.parse_many(&[ProfileInput::new("bejab_vp_20230101T000500Z_0x9.h5")])?;
//! table.write_csv_file("out/bejab_vpts.csv".as_ref())?;
//! ```

pub mod descriptor;
pub mod error;
pub mod format;
pub mod pipeline;
pub mod schema;
pub mod table;

pub use descriptor::{datapackage_descriptor, write_descriptor, DESCRIPTOR_FILENAME};
pub use error::{Result, VptsCsvError};
pub use pipeline::{
    default_workers, ConversionPipeline, FileFailure, PartialTable, PipelineOptions, ProfileInput,
};
pub use schema::{get_schema, Column, ColumnData, SchemaVersion, SortType, VptsSchema};
pub use table::{DuplicatePolicy, VptsTable};
