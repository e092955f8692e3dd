//! Frictionless data package descriptor for a VPTS CSV file.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::schema::VptsSchema;

pub const DESCRIPTOR_FILENAME: &str = "datapackage.json";

/// Only UTF-8 is accepted in data packages.
pub const CSV_ENCODING: &str = "utf8";

pub const CSV_FIELD_DELIMITER: &str = ",";

/// Descriptor document referencing one CSV resource.
pub fn datapackage_descriptor(csv_file_name: &str, schema: &dyn VptsSchema) -> Value {
    serde_json::json!({
        "profile": "tabular-data-package",
        "resources": [
            {
                "name": "vpts",
                "path": csv_file_name,
                "profile": "tabular-data-resource",
                "format": "csv",
                "mediatype": "text/csv",
                "encoding": CSV_ENCODING,
                "dialect": { "delimiter": CSV_FIELD_DELIMITER },
                "schema": schema.table_schema_url(),
            }
        ]
    })
}

/// Write `datapackage.json` next to the CSV file; returns its path.
pub fn write_descriptor(csv_path: &Path, schema: &dyn VptsSchema) -> Result<PathBuf> {
    let dir = csv_path.parent().unwrap_or_else(|| Path::new("."));
    let csv_file_name = csv_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let descriptor = datapackage_descriptor(&csv_file_name, schema);

    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    descriptor.serialize(&mut serializer)?;

    std::fs::create_dir_all(dir)?;
    let path = dir.join(DESCRIPTOR_FILENAME);
    std::fs::write(&path, buffer)?;
    Ok(path)
}
