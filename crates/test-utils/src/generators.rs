//! Generators for synthetic ODIM files and storage inventory listings.

use std::io::Write;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use hdf5::types::VarLenUnicode;

use crate::fixtures::{FixtureAttr, VpFixture};

fn text(value: &str) -> hdf5::Result<VarLenUnicode> {
    value
        .parse::<VarLenUnicode>()
        .map_err(|e| hdf5::Error::from(e.to_string()))
}

fn write_attr(group: &hdf5::Group, name: &str, value: &FixtureAttr) -> hdf5::Result<()> {
    match value {
        FixtureAttr::Int(v) => group.new_attr::<i64>().create(name)?.write_scalar(v),
        FixtureAttr::Float(v) => group.new_attr::<f64>().create(name)?.write_scalar(v),
        FixtureAttr::Text(v) => group
            .new_attr::<VarLenUnicode>()
            .create(name)?
            .write_scalar(&text(v)?),
    }
}

fn write_text(group: &hdf5::Group, name: &str, value: &str) -> hdf5::Result<()> {
    write_attr(group, name, &FixtureAttr::Text(value.to_string()))
}

fn write_float(group: &hdf5::Group, name: &str, value: f64) -> hdf5::Result<()> {
    write_attr(group, name, &FixtureAttr::Float(value))
}

fn write_data_group(
    dataset: &hdf5::Group,
    index: usize,
    quantity: &str,
    values: &[f64],
    fixture: &VpFixture,
) -> hdf5::Result<()> {
    let group = dataset.create_group(&format!("data{}", index))?;
    let what = group.create_group("what")?;
    write_text(&what, "quantity", quantity)?;
    write_float(&what, "gain", 1.0)?;
    write_float(&what, "offset", 0.0)?;
    write_float(&what, "nodata", fixture.nodata)?;
    write_float(&what, "undetect", fixture.undetect)?;

    // Samples are stored as a (levels, 1) column like vol2bird does
    let data = group
        .new_dataset::<f64>()
        .shape((values.len(), 1))
        .create("data")?;
    data.write_raw(values)?;
    Ok(())
}

/// Write a fixture as an ODIM HDF5 file.
pub fn write_vp_h5(path: &Path, fixture: &VpFixture) -> hdf5::Result<()> {
    let file = hdf5::File::create(path)?;

    let what = file.create_group("what")?;
    write_text(&what, "object", &fixture.object)?;
    write_text(&what, "source", &fixture.source)?;
    write_text(&what, "date", &fixture.date)?;
    write_text(&what, "time", &fixture.time)?;
    write_text(&what, "version", "H5rad 2.3")?;

    let location = file.create_group("where")?;
    write_float(&location, "lat", fixture.lat)?;
    write_float(&location, "lon", fixture.lon)?;
    write_float(&location, "height", fixture.height)?;
    write_float(&location, "interval", 200.0)?;

    let how = file.create_group("how")?;
    write_float(&how, "wavelength", fixture.wavelength)?;
    write_float(&how, "rcs_bird", fixture.rcs_bird)?;
    write_float(&how, "sd_vvp_thresh", fixture.sd_vvp_thresh)?;
    write_attr(&how, "vcp", &fixture.vcp)?;
    write_text(&how, "task", "vol2bird")?;

    let dataset = file.create_group("dataset1")?;
    let dataset_what = dataset.create_group("what")?;
    write_text(&dataset_what, "product", "VP")?;

    write_data_group(&dataset, 1, "HGHT", &fixture.heights, fixture)?;
    for (i, (quantity, values)) in fixture.variables.iter().enumerate() {
        write_data_group(&dataset, i + 2, quantity, values, fixture)?;
    }
    Ok(())
}

/// Serialize a fixture to HDF5 bytes, for uploading to an object store.
pub fn vp_h5_bytes(fixture: &VpFixture) -> hdf5::Result<Vec<u8>> {
    let dir = tempfile::tempdir().map_err(|e| hdf5::Error::from(e.to_string()))?;
    let path = dir.path().join(fixture.file_name());
    write_vp_h5(&path, fixture)?;
    std::fs::read(&path).map_err(|e| hdf5::Error::from(e.to_string()))
}

/// One record of a storage inventory sub-listing.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryRow {
    pub key: String,
    pub size: u64,
    /// Last-modified timestamp as written by the inventory, e.g. `2023-03-12T10:11:12.000Z`
    pub modified: String,
}

impl InventoryRow {
    pub fn new(key: &str, modified: &str) -> Self {
        Self {
            key: key.to_string(),
            size: 12_345,
            modified: modified.to_string(),
        }
    }
}

/// A gzip-compressed inventory sub-listing: quoted `bucket,key,size,modified` rows, no header.
pub fn inventory_csv_gz(bucket: &str, rows: &[InventoryRow]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    for row in rows {
        writeln!(
            encoder,
            "\"{}\",\"{}\",\"{}\",\"{}\"",
            bucket, row.key, row.size, row.modified
        )
        .expect("writing to an in-memory buffer cannot fail");
    }
    encoder
        .finish()
        .expect("writing to an in-memory buffer cannot fail")
}

/// A manifest document listing the given sub-listing keys.
pub fn manifest_json(bucket: &str, keys: &[&str]) -> Vec<u8> {
    let files: Vec<serde_json::Value> = keys
        .iter()
        .map(|key| {
            serde_json::json!({
                "key": key,
                "size": 1024,
                "MD5checksum": "d41d8cd98f00b204e9800998ecf8427e",
            })
        })
        .collect();
    let manifest = serde_json::json!({
        "sourceBucket": bucket,
        "destinationBucket": format!("arn:aws:s3:::{}-inventory", bucket),
        "version": "2016-11-30",
        "fileFormat": "CSV",
        "fileSchema": "Bucket, Key, Size, LastModifiedDate",
        "files": files,
    });
    serde_json::to_vec(&manifest).expect("manifest is plain JSON")
}
