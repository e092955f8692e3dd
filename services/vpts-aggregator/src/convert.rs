//! Local conversion of ODIM VP files into one VPTS CSV file.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::info;
use walkdir::WalkDir;

use vpts_csv::{
    default_workers, write_descriptor, ConversionPipeline, DuplicatePolicy, PipelineOptions,
    ProfileInput,
};

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub schema_version: String,
    pub descriptor: bool,
    pub keep_first: bool,
    pub workers: Option<usize>,
}

/// All `*.h5` files under `input`, sorted; `input` itself when it is a file.
pub fn find_profiles(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(input) {
        let entry = entry.with_context(|| format!("Failed to walk {}", input.display()))?;
        let is_h5 = entry.path().extension().map(|e| e == "h5").unwrap_or(false);
        if entry.file_type().is_file() && is_h5 {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

pub fn run(options: &ConvertOptions) -> Result<()> {
    let files = find_profiles(&options.input)?;
    if files.is_empty() {
        bail!("No .h5 files found in {}", options.input.display());
    }
    info!(files = files.len(), input = %options.input.display(), "Converting profiles");

    let pipeline = ConversionPipeline::new(
        &options.schema_version,
        PipelineOptions {
            workers: options.workers.unwrap_or_else(default_workers),
            duplicate_policy: if options.keep_first {
                DuplicatePolicy::KeepFirst
            } else {
                DuplicatePolicy::KeepAll
            },
        },
    )?;

    let inputs: Vec<ProfileInput> = files.into_iter().map(ProfileInput::from).collect();
    let table = pipeline.parse_many(&inputs)?;
    table
        .write_csv_file(&options.output)
        .with_context(|| format!("Failed to write {}", options.output.display()))?;
    info!(rows = table.len(), output = %options.output.display(), "Wrote VPTS file");

    if options.descriptor {
        let path = write_descriptor(&options.output, pipeline.schema())?;
        info!(path = %path.display(), "Wrote datapackage descriptor");
    }
    Ok(())
}
