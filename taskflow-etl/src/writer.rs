//! Local persistence of normalized tables as gzip-compressed JSON lines.

use crate::collaborators::LocalWriter;
use crate::errors::WriteError;
use crate::model::{LocalArtifact, LocalDestination, NormalizedTable};
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// File extension of written datasets.
pub const EXTENSION: &str = "jsonl.gz";

/// Writes one JSON object per row, gzip-compressed, to
/// `{data_dir}/{color}/{dataset_file}.jsonl.gz`.
#[derive(Debug, Clone)]
pub struct GzipJsonLinesWriter {
    data_dir: PathBuf,
}

impl GzipJsonLinesWriter {
    /// Creates a writer rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Returns the root directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

/// Encodes `table` as gzip-compressed JSON lines.
pub fn encode_table(table: &NormalizedTable) -> Result<Vec<u8>, WriteError> {
    let io_error = |source| WriteError::Io {
        path: PathBuf::from("<memory>"),
        source,
    };
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    for row in &table.rows {
        let object: serde_json::Map<String, serde_json::Value> = table
            .columns
            .iter()
            .zip(row)
            .map(|(column, cell)| (column.name.clone(), cell.to_json()))
            .collect();
        serde_json::to_writer(&mut encoder, &object)?;
        encoder.write_all(b"\n").map_err(io_error)?;
    }
    encoder.finish().map_err(io_error)
}

#[async_trait]
impl LocalWriter for GzipJsonLinesWriter {
    async fn write(
        &self,
        table: &NormalizedTable,
        destination: &LocalDestination,
    ) -> Result<LocalArtifact, WriteError> {
        let file_name = format!("{}.{EXTENSION}", destination.dataset_file);
        let dir = self.data_dir.join(&destination.color);
        let path = dir.join(&file_name);

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| WriteError::Io {
                path: dir.clone(),
                source,
            })?;
        let bytes = encode_table(table)?;
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|source| WriteError::Io {
                path: path.clone(),
                source,
            })?;

        info!(path = %path.display(), rows = table.len(), bytes = bytes.len(), "Wrote dataset");
        Ok(LocalArtifact {
            local_path: path,
            object_path: format!("{}/{file_name}", destination.color),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cell, ColumnSchema, DataType};
    use flate2::read::GzDecoder;
    use pretty_assertions::assert_eq;
    use std::io::Read;

    fn table() -> NormalizedTable {
        NormalizedTable {
            columns: vec![
                ColumnSchema {
                    name: "VendorID".to_string(),
                    dtype: DataType::Integer,
                },
                ColumnSchema {
                    name: "fare_amount".to_string(),
                    dtype: DataType::Float,
                },
            ],
            rows: vec![
                vec![Cell::Integer(1), Cell::Float(8.5)],
                vec![Cell::Null, Cell::Float(3.0)],
            ],
        }
    }

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        let mut text = String::new();
        GzDecoder::new(std::fs::File::open(path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        text.lines().map(|l| serde_json::from_str(l).unwrap()).collect()
    }

    #[tokio::test]
    async fn test_write_layout_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let writer = GzipJsonLinesWriter::new(dir.path().join("data"));
        let destination = LocalDestination {
            color: "yellow".to_string(),
            dataset_file: "yellow_tripdata_2021-01".to_string(),
        };

        let artifact = writer.write(&table(), &destination).await.unwrap();

        assert_eq!(
            artifact.local_path,
            dir.path().join("data/yellow/yellow_tripdata_2021-01.jsonl.gz")
        );
        assert_eq!(artifact.object_path, "yellow/yellow_tripdata_2021-01.jsonl.gz");
        assert_eq!(
            read_lines(&artifact.local_path),
            vec![
                serde_json::json!({"VendorID": 1, "fare_amount": 8.5}),
                serde_json::json!({"VendorID": null, "fare_amount": 3.0}),
            ]
        );
    }

    #[tokio::test]
    async fn test_write_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let writer = GzipJsonLinesWriter::new(dir.path());
        let destination = LocalDestination {
            color: "green".to_string(),
            dataset_file: "green_tripdata_2020-11".to_string(),
        };

        writer.write(&table(), &destination).await.unwrap();
        let artifact = writer
            .write(&NormalizedTable::default(), &destination)
            .await
            .unwrap();

        assert!(read_lines(&artifact.local_path).is_empty());
    }

    #[tokio::test]
    async fn test_write_into_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();
        let writer = GzipJsonLinesWriter::new(&blocker);
        let destination = LocalDestination {
            color: "yellow".to_string(),
            dataset_file: "x".to_string(),
        };

        let err = writer.write(&table(), &destination).await.unwrap_err();
        assert!(matches!(err, WriteError::Io { .. }));
    }
}
