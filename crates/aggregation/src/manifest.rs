//! Storage inventory manifests and their delimited sub-listings.

use std::io::{self, BufRead, BufReader, Read};

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use futures::TryStreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::io::{StreamReader, SyncIoBridge};
use tracing::{debug, instrument};

use storage::ObjectStorage;
use vpts_common::parse_timestamp;

use crate::error::{AggregationError, Result};

/// Index of one inventory snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub files: Vec<ManifestFile>,
}

/// One sub-listing referenced by a manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestFile {
    /// Key of the sub-listing inside the inventory bucket
    pub key: String,
    #[serde(default)]
    pub size: Option<u64>,
}

/// One row of a sub-listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryRecord {
    pub repository: String,
    pub key: String,
    pub size: Option<u64>,
    /// Raw last-modified text, as written by the inventory
    pub modified: String,
}

impl InventoryRecord {
    /// Parsed last-modified instant, if the text is a timestamp.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.modified).ok()
    }
}

impl Manifest {
    pub fn from_slice(key: &str, data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|e| AggregationError::Manifest {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    /// Fetch and parse a manifest.
    #[instrument(skip(storage), fields(bucket = %storage.bucket()))]
    pub async fn load(storage: &ObjectStorage, key: &str) -> Result<Self> {
        let data = storage.get(key).await?;
        let manifest = Self::from_slice(key, &data)?;
        debug!(listings = manifest.files.len(), "Loaded manifest");
        Ok(manifest)
    }
}

fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&[0x1f, 0x8b])
}

/// Read a sub-listing in chunks of at most `chunk_size` records.
///
/// The listing may be gzip compressed. Rows are split by the CSV reader,
/// so a chunk boundary never falls inside a row. Rows with fewer than two
/// columns are skipped. `on_chunk` errors stop the read.
pub fn read_listing<R, F>(key: &str, source: R, chunk_size: usize, mut on_chunk: F) -> Result<usize>
where
    R: Read,
    F: FnMut(Vec<InventoryRecord>) -> Result<()>,
{
    let mut buffered = BufReader::new(source);
    let source: Box<dyn Read + '_> = if is_gzip(buffered.fill_buf()?) {
        Box::new(GzDecoder::new(buffered))
    } else {
        Box::new(buffered)
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(source);

    let chunk_size = chunk_size.max(1);
    let mut chunk = Vec::with_capacity(chunk_size.min(4096));
    let mut total = 0;
    let mut record = csv::StringRecord::new();
    loop {
        let more = reader
            .read_record(&mut record)
            .map_err(|e| AggregationError::Listing {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        if !more {
            break;
        }
        if record.len() < 2 {
            continue;
        }
        chunk.push(InventoryRecord {
            repository: record.get(0).unwrap_or_default().to_string(),
            key: record.get(1).unwrap_or_default().to_string(),
            size: record.get(2).and_then(|s| s.trim().parse().ok()),
            modified: record.get(3).unwrap_or_default().to_string(),
        });
        total += 1;
        if chunk.len() >= chunk_size {
            on_chunk(std::mem::replace(&mut chunk, Vec::with_capacity(chunk_size.min(4096))))?;
        }
    }
    if !chunk.is_empty() {
        on_chunk(chunk)?;
    }
    Ok(total)
}

/// Read a stored sub-listing chunk by chunk without holding the object.
///
/// The body is decoded on a blocking thread from the object stream. Chunks
/// come back over a channel of depth one, so at most a few chunks are alive
/// at any time whatever the listing size.
#[instrument(skip(storage, on_chunk), fields(bucket = %storage.bucket()))]
pub async fn stream_listing<F>(
    storage: &ObjectStorage,
    key: &str,
    chunk_size: usize,
    mut on_chunk: F,
) -> Result<usize>
where
    F: FnMut(Vec<InventoryRecord>),
{
    let body = storage
        .get_stream(key)
        .await?
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
    let reader = SyncIoBridge::new(StreamReader::new(body));

    let (tx, mut rx) = mpsc::channel::<Vec<InventoryRecord>>(1);
    let listing = key.to_string();
    let decode = tokio::task::spawn_blocking(move || {
        read_listing(&listing, reader, chunk_size, |chunk| {
            tx.blocking_send(chunk)
                .map_err(|_| AggregationError::Task(format!("{}: chunk receiver closed", listing)))
        })
    });

    while let Some(chunk) = rx.recv().await {
        on_chunk(chunk);
    }
    decode
        .await
        .map_err(|e| AggregationError::Task(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{inventory_csv_gz, manifest_json, InventoryRow};

    #[test]
    fn test_manifest_from_slice() {
        let data = manifest_json("aloft", &["inv/data/a.csv.gz", "inv/data/b.csv.gz"]);
        let manifest = Manifest::from_slice("manifest.json", &data).unwrap();
        let keys: Vec<&str> = manifest.files.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, ["inv/data/a.csv.gz", "inv/data/b.csv.gz"]);
    }

    #[test]
    fn test_invalid_manifest() {
        let err = Manifest::from_slice("manifest.json", b"{\"nofiles\": 1}").unwrap_err();
        assert_eq!(err.code(), "manifest");
    }

    #[test]
    fn test_read_gzip_listing_in_chunks() {
        let rows: Vec<InventoryRow> = (0..5)
            .map(|i| InventoryRow::new(&format!("baltrad/hdf5/f{}.h5", i), "2023-03-12T10:11:12.000Z"))
            .collect();
        let data = inventory_csv_gz("aloft", &rows);

        let mut chunks = Vec::new();
        let total = read_listing("a.csv.gz", &data[..], 2, |chunk| {
            chunks.push(chunk);
            Ok(())
        })
        .unwrap();
        assert_eq!(total, 5);
        assert_eq!(chunks.iter().map(Vec::len).collect::<Vec<_>>(), [2, 2, 1]);
        assert_eq!(chunks[0][0].repository, "aloft");
        assert_eq!(chunks[2][0].key, "baltrad/hdf5/f4.h5");
        assert_eq!(chunks[2][0].size, Some(12_345));
        assert_eq!(
            chunks[0][0].last_modified().unwrap().to_rfc3339(),
            "2023-03-12T10:11:12+00:00"
        );
    }

    #[test]
    fn test_read_plain_listing_with_embedded_comma() {
        let data = b"\"aloft\",\"baltrad/hdf5/a,b.h5\",\"10\",\"2023-03-12T10:11:12.000Z\"\n";
        let mut records = Vec::new();
        read_listing("a.csv", &data[..], 10, |chunk| {
            records.extend(chunk);
            Ok(())
        })
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "baltrad/hdf5/a,b.h5");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stream_stored_listing_in_bounded_chunks() {
        let storage = ObjectStorage::in_memory("aloft-inventory");
        let rows: Vec<InventoryRow> = (0..250)
            .map(|i| InventoryRow::new(&format!("baltrad/hdf5/f{:03}.h5", i), "2023-03-12T10:11:12.000Z"))
            .collect();
        storage
            .put("inv/data/big.csv.gz", inventory_csv_gz("aloft", &rows).into())
            .await
            .unwrap();

        let mut sizes = Vec::new();
        let mut keys = Vec::new();
        let total = stream_listing(&storage, "inv/data/big.csv.gz", 64, |chunk| {
            sizes.push(chunk.len());
            keys.extend(chunk.into_iter().map(|r| r.key));
        })
        .await
        .unwrap();

        assert_eq!(total, 250);
        assert!(sizes.iter().all(|&n| n <= 64));
        assert_eq!(sizes, [64, 64, 64, 58]);
        assert_eq!(keys.first().map(String::as_str), Some("baltrad/hdf5/f000.h5"));
        assert_eq!(keys.last().map(String::as_str), Some("baltrad/hdf5/f249.h5"));
    }

    #[tokio::test]
    async fn test_stream_missing_listing() {
        let storage = ObjectStorage::in_memory("aloft-inventory");
        let err = stream_listing(&storage, "inv/data/gone.csv.gz", 10, |_| {})
            .await
            .unwrap_err();
        assert_eq!(err.code(), "vanished_source");
    }

    #[tokio::test]
    async fn test_stream_corrupt_gzip_listing() {
        let storage = ObjectStorage::in_memory("aloft-inventory");
        storage
            .put("inv/data/bad.csv.gz", bytes::Bytes::from_static(&[
                0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff,
            ]))
            .await
            .unwrap();
        let err = stream_listing(&storage, "inv/data/bad.csv.gz", 10, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, AggregationError::Listing { .. }));
    }
}
