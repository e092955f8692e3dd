//! Conversion of ODIM profile files into VPTS CSV tables.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, instrument, warn};

use odim_parser::{check_vp_odim, BirdProfile, OdimReader};

use crate::error::{Result, VptsCsvError};
use crate::schema::{get_schema, VptsSchema};
use crate::table::{DuplicatePolicy, VptsTable};

/// Available parallel execution units minus one, at least one.
pub fn default_workers() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

/// One file to convert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileInput {
    pub path: PathBuf,
    /// Provenance written to `source_file`; the file name when absent.
    pub source_reference: Option<String>,
}

impl ProfileInput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            source_reference: None,
        }
    }

    pub fn with_reference(path: impl Into<PathBuf>, reference: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source_reference: Some(reference.into()),
        }
    }

    fn reference(&self) -> String {
        self.source_reference.clone().unwrap_or_else(|| {
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.path.display().to_string())
        })
    }
}

impl From<PathBuf> for ProfileInput {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&Path> for ProfileInput {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

/// A file whose conversion failed.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: VptsCsvError,
}

/// Result of a conversion that tolerates per-file failures.
#[derive(Debug, Default)]
pub struct PartialTable {
    pub table: VptsTable,
    pub failures: Vec<FileFailure>,
}

/// Options for [`ConversionPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Size of the parsing worker pool.
    pub workers: usize,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

/// Parses, maps and sorts profile files for one schema version.
pub struct ConversionPipeline {
    schema: &'static dyn VptsSchema,
    pool: rayon::ThreadPool,
    options: PipelineOptions,
}

impl ConversionPipeline {
    /// Fails immediately on an unknown schema version.
    pub fn new(version: &str, options: PipelineOptions) -> Result<Self> {
        let schema = get_schema(version)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.workers.max(1))
            .thread_name(|i| format!("vpts-parse-{}", i))
            .build()
            .map_err(|e| VptsCsvError::Internal(format!("Failed to build worker pool: {}", e)))?;
        Ok(Self {
            schema,
            pool,
            options,
        })
    }

    pub fn schema(&self) -> &'static dyn VptsSchema {
        self.schema
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// An empty table carrying the schema header.
    pub fn empty_table(&self) -> VptsTable {
        VptsTable::new(self.schema.columns().iter().copied())
    }

    /// Map one profile and sort its rows.
    pub fn profile_table(&self, profile: &BirdProfile) -> Result<VptsTable> {
        let mut table = VptsTable::from_columns(self.schema.mapping(profile)?)?;
        table.sort_by_keys(self.schema.sort_keys())?;
        Ok(table)
    }

    /// Convert a single file.
    ///
    /// Fails with an unreadable-container error if the file cannot be
    /// opened and with invalid-source / not-a-profile errors when the
    /// content is not a vertical profile.
    #[instrument(skip(self, input), fields(path = %input.path.display()))]
    pub fn parse(&self, input: &ProfileInput) -> Result<VptsTable> {
        let reference = input.reference();
        let profile = OdimReader::read_with(&input.path, |reader| {
            check_vp_odim(reader)?;
            BirdProfile::from_source(reader, reference)
        })?;
        let table = self.profile_table(&profile)?;
        debug!(rows = table.len(), "Converted profile");
        Ok(table)
    }

    fn parse_all(&self, inputs: &[ProfileInput]) -> Vec<Result<VptsTable>> {
        self.pool
            .install(|| inputs.par_iter().map(|input| self.parse(input)).collect())
    }

    fn finish(&self, tables: Vec<VptsTable>) -> Result<VptsTable> {
        let mut table = VptsTable::concat(tables)?;
        if table.header().is_empty() {
            return Ok(self.empty_table());
        }
        table.dedupe(self.options.duplicate_policy, self.schema.duplicate_keys());
        table.sort_by_keys(self.schema.sort_keys())?;
        Ok(table)
    }

    /// Convert many files in parallel into one sorted table.
    ///
    /// Any file failure fails the whole call with the first failing file
    /// in input order.
    pub fn parse_many(&self, inputs: &[ProfileInput]) -> Result<VptsTable> {
        let mut tables = Vec::with_capacity(inputs.len());
        for (input, result) in inputs.iter().zip(self.parse_all(inputs)) {
            match result {
                Ok(table) => tables.push(table),
                Err(error) => {
                    return Err(VptsCsvError::InFile {
                        path: input.path.display().to_string(),
                        source: Box::new(error),
                    })
                }
            }
        }
        self.finish(tables)
    }

    /// Convert many files in parallel, reporting failing files separately.
    pub fn parse_many_partial(&self, inputs: &[ProfileInput]) -> Result<PartialTable> {
        let mut tables = Vec::with_capacity(inputs.len());
        let mut failures = Vec::new();
        for (input, result) in inputs.iter().zip(self.parse_all(inputs)) {
            match result {
                Ok(table) => tables.push(table),
                Err(error) => {
                    warn!(
                        path = %input.path.display(),
                        code = error.code(),
                        error = %error,
                        "Skipping file that failed to convert"
                    );
                    failures.push(FileFailure {
                        path: input.path.clone(),
                        error,
                    });
                }
            }
        }
        Ok(PartialTable {
            table: self.finish(tables)?,
            failures,
        })
    }
}
