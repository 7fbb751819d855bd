//! Write-once parquet partitions for classified category buffers.
//!
//! A partition's existence is the idempotency marker for the whole archive:
//! creation uses exclusive-create semantics so concurrent runs cannot race
//! between the existence check and the write.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use arrow::json::reader::infer_json_schema_from_iterator;
use arrow::json::ReaderBuilder;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use serde_json::Value;
use tracing::debug;

use crate::classify::Category;
use crate::error::{IngestError, IngestResult};

/// Field removed from every record before persistence; absence is not an error.
const DROPPED_FIELD: &str = "telemetry";

/// Store of write-once category partitions rooted at a destination directory.
#[derive(Debug, Clone)]
pub struct PartitionStore {
    root: PathBuf,
}

impl PartitionStore {
    /// Creates a store rooted at `root`. Nothing is touched on disk until a
    /// partition is written.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Destination path for a (category, stem) partition.
    pub fn partition_path(&self, category: Category, stem: &str) -> PathBuf {
        self.root
            .join(category.dir_name())
            .join(format!("{stem}.parquet"))
    }

    /// Returns the first existing partition for this stem in any category.
    pub fn existing_partition(&self, stem: &str) -> Option<PathBuf> {
        Category::ALL
            .into_iter()
            .map(|category| self.partition_path(category, stem))
            .find(|path| path.exists())
    }

    /// Persists one category buffer exactly once.
    ///
    /// The buffer is decoded as line-delimited JSON, the non-essential
    /// telemetry field is stripped, and the records land as one
    /// zstd-compressed parquet file. An existing destination is reported as
    /// [`IngestError::WriteConflict`] and never overwritten. Decoding happens
    /// before the destination is claimed, so a bad buffer cannot leave an
    /// empty partition behind.
    pub fn write(&self, category: Category, stem: &str, buffer: &[u8]) -> IngestResult<PathBuf> {
        let records = decode_records(category, buffer)?;
        let batch = build_batch(category, &records)?;

        let path = self.partition_path(category, stem);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(IngestError::WriteConflict { path });
            }
            Err(err) => return Err(err.into()),
        };

        if let Err(reason) = write_batch(file, &batch) {
            // a partial partition must not claim the stem for later runs
            let _ = fs::remove_file(&path);
            return Err(IngestError::Parquet { path, reason });
        }
        debug!(
            category = category.dir_name(),
            stem,
            records = records.len(),
            path = %path.display(),
            "partition written"
        );
        Ok(path)
    }
}

fn decode_records(category: Category, buffer: &[u8]) -> IngestResult<Vec<Value>> {
    let text = std::str::from_utf8(buffer).map_err(|err| IngestError::Decode {
        category: category.dir_name(),
        reason: err.to_string(),
    })?;
    let mut records = Vec::new();
    for line in text.lines() {
        if line.is_empty() {
            continue;
        }
        let mut value: Value = serde_json::from_str(line).map_err(|err| IngestError::Decode {
            category: category.dir_name(),
            reason: err.to_string(),
        })?;
        if let Some(object) = value.as_object_mut() {
            object.remove(DROPPED_FIELD);
        }
        records.push(value);
    }
    if records.is_empty() {
        return Err(IngestError::Decode {
            category: category.dir_name(),
            reason: "buffer holds no records".to_string(),
        });
    }
    Ok(records)
}

fn build_batch(category: Category, records: &[Value]) -> IngestResult<RecordBatch> {
    let decode = |reason: String| IngestError::Decode {
        category: category.dir_name(),
        reason,
    };
    let schema = infer_json_schema_from_iterator(records.iter().map(Ok))
        .map_err(|err| decode(err.to_string()))?;
    debug!(category = category.dir_name(), schema = ?schema, "inferred partition schema");
    let mut decoder = ReaderBuilder::new(Arc::new(schema))
        .build_decoder()
        .map_err(|err| decode(err.to_string()))?;
    decoder
        .serialize(records)
        .map_err(|err| decode(err.to_string()))?;
    decoder
        .flush()
        .map_err(|err| decode(err.to_string()))?
        .ok_or_else(|| decode("no record batch produced".to_string()))
}

fn write_batch(file: File, batch: &RecordBatch) -> Result<(), String> {
    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::default()))
        .build();
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), Some(props)).map_err(|e| e.to_string())?;
    writer.write(batch).map_err(|e| e.to_string())?;
    writer.close().map_err(|e| e.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::path::Path;

    fn read_rows(path: &Path) -> Vec<RecordBatch> {
        let file = File::open(path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        reader.map(|batch| batch.unwrap()).collect()
    }

    #[test]
    fn write_creates_partition_under_category_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path());
        let buffer = b"{\"id\":1,\"side\":\"BACK\"}\n{\"id\":2,\"side\":\"LAY\"}\n";

        let path = store.write(Category::Postings, "host-1", buffer).unwrap();
        assert_eq!(path, dir.path().join("postings").join("host-1.parquet"));
        let batches = read_rows(&path);
        assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 2);
    }

    #[test]
    fn telemetry_field_is_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path());
        let buffer = b"{\"id\":1,\"telemetry\":{\"lat\":3}}\n{\"id\":2}\n";

        let path = store.write(Category::Updates, "host-1", buffer).unwrap();
        let batches = read_rows(&path);
        let schema = batches[0].schema();
        assert!(schema.field_with_name("id").is_ok());
        assert!(schema.field_with_name("telemetry").is_err());
    }

    #[test]
    fn second_write_conflicts_and_preserves_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path());
        let first = b"{\"id\":1}\n";
        let second = b"{\"id\":99}\n";

        let path = store.write(Category::Updates, "x", first).unwrap();
        let original = fs::read(&path).unwrap();
        let err = store.write(Category::Updates, "x", second).unwrap_err();
        assert!(matches!(err, IngestError::WriteConflict { .. }));
        assert_eq!(fs::read(&path).unwrap(), original);
    }

    #[test]
    fn bad_json_reports_decode_and_claims_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path());

        let err = store
            .write(Category::Cancels, "x", b"{not json}\n")
            .unwrap_err();
        assert!(matches!(err, IngestError::Decode { category: "cancels", .. }));
        assert!(!store.partition_path(Category::Cancels, "x").exists());
    }

    #[test]
    fn existing_partition_is_found_across_categories() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path());
        assert!(store.existing_partition("host-1").is_none());

        store
            .write(Category::Definitions, "host-1", b"{\"id\":1}\n")
            .unwrap();
        let found = store.existing_partition("host-1").unwrap();
        assert_eq!(found, store.partition_path(Category::Definitions, "host-1"));
        assert!(store.existing_partition("host-2").is_none());
    }

    #[test]
    fn mismatched_record_shapes_still_write() {
        // inference unions fields; missing values become nulls
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path());
        let buffer = b"{\"id\":1,\"price\":2.5}\n{\"id\":2}\n";

        let path = store.write(Category::Catalogues, "h", buffer).unwrap();
        let batches = read_rows(&path);
        assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 2);
    }
}
