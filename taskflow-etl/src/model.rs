//! Values flowing between the ETL tasks.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Where the trip datasets are published.
pub const DEFAULT_BASE_URL: &str = "https://github.com/DataTalksClub/nyc-tlc-data/releases/download";

/// One monthly dataset of a taxi colour.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetSpec {
    /// Taxi colour, e.g. `yellow` or `green`.
    pub color: String,
    /// Year of the trips.
    pub year: i32,
    /// Month of the trips, 1 to 12.
    pub month: u32,
}

impl DatasetSpec {
    /// Creates a dataset spec.
    pub fn new(color: impl Into<String>, year: i32, month: u32) -> Self {
        Self {
            color: color.into(),
            year,
            month,
        }
    }

    /// File stem of the dataset, e.g. `yellow_tripdata_2021-01`.
    pub fn dataset_file(&self) -> String {
        format!("{}_tripdata_{}-{:02}", self.color, self.year, self.month)
    }

    /// Download URL of the dataset under `base_url`.
    pub fn dataset_url(&self, base_url: &str) -> String {
        format!(
            "{}/{}/{}.csv.gz",
            base_url.trim_end_matches('/'),
            self.color,
            self.dataset_file()
        )
    }

    /// Returns the source locator under `base_url`.
    pub fn locator(&self, base_url: &str) -> SourceLocator {
        SourceLocator::new(self.dataset_url(base_url))
    }

    /// Returns where the cleaned dataset is written.
    pub fn destination(&self) -> LocalDestination {
        LocalDestination {
            color: self.color.clone(),
            dataset_file: self.dataset_file(),
        }
    }
}

impl fmt::Display for DatasetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}-{:02}", self.color, self.year, self.month)
    }
}

/// Location of a CSV dataset.
///
/// Serializes as the bare URL, so the fetch fingerprint depends on the URL
/// alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceLocator {
    /// `http(s)://` or `file://` URL, or a plain path.
    pub url: String,
}

impl SourceLocator {
    /// Creates a locator.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// A CSV table as downloaded: a header and untyped rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTable {
    /// Column names from the header line.
    pub columns: Vec<String>,
    /// Data rows; every row has one field per column.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the position of a column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Type of a normalized column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Free text.
    Text,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit float.
    Float,
    /// Date and time without zone.
    Timestamp,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::Timestamp => write!(f, "timestamp"),
        }
    }
}

/// Name and type of a normalized column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name.
    pub name: String,
    /// Column type.
    pub dtype: DataType,
}

/// A typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cell {
    /// Missing value.
    Null,
    /// Text value.
    Text(String),
    /// Integer value.
    Integer(i64),
    /// Float value.
    Float(f64),
    /// Timestamp value.
    Timestamp(NaiveDateTime),
}

impl Cell {
    /// Returns the plain JSON form of the value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Integer(n) => serde_json::Value::from(*n),
            Self::Float(x) => serde_json::Number::from_f64(*x)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Timestamp(ts) => {
                serde_json::Value::String(ts.format("%Y-%m-%dT%H:%M:%S").to_string())
            }
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Text(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// A table with a typed schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTable {
    /// Column schema in table order.
    pub columns: Vec<ColumnSchema>,
    /// Typed rows.
    pub rows: Vec<Vec<Cell>>,
}

impl NormalizedTable {
    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the type of a column.
    pub fn dtype(&self, name: &str) -> Option<DataType> {
        self.columns.iter().find(|c| c.name == name).map(|c| c.dtype)
    }

    /// Returns the first `n` rows.
    pub fn head(&self, n: usize) -> &[Vec<Cell>] {
        &self.rows[..n.min(self.rows.len())]
    }
}

/// Where a cleaned dataset is written locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalDestination {
    /// Taxi colour; also the subdirectory.
    pub color: String,
    /// File stem of the dataset.
    pub dataset_file: String,
}

/// A dataset written to local disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalArtifact {
    /// Path of the local file.
    pub local_path: PathBuf,
    /// Object path to upload to, relative to the bucket.
    pub object_path: String,
}

/// Proof of a finished upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// Object path inside the bucket.
    pub object_path: String,
    /// Where the object ended up.
    pub location: String,
    /// Bytes uploaded.
    pub bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dataset_names() {
        let spec = DatasetSpec::new("yellow", 2021, 1);
        assert_eq!(spec.dataset_file(), "yellow_tripdata_2021-01");
        assert_eq!(
            spec.dataset_url(DEFAULT_BASE_URL),
            "https://github.com/DataTalksClub/nyc-tlc-data/releases/download/yellow/yellow_tripdata_2021-01.csv.gz"
        );
        assert_eq!(spec.dataset_url("file:///tmp/data/"), "file:///tmp/data/yellow/yellow_tripdata_2021-01.csv.gz");
        assert_eq!(spec.to_string(), "yellow/2021-01");
    }

    #[test]
    fn test_destination() {
        let dest = DatasetSpec::new("green", 2020, 11).destination();
        assert_eq!(dest.color, "green");
        assert_eq!(dest.dataset_file, "green_tripdata_2020-11");
    }

    #[test]
    fn test_locator_serializes_as_url() {
        let locator = SourceLocator::new("https://example.com/a.csv.gz");
        assert_eq!(
            serde_json::to_value(&locator).unwrap(),
            serde_json::json!("https://example.com/a.csv.gz")
        );
    }

    #[test]
    fn test_cell_json() {
        let ts = NaiveDateTime::parse_from_str("2021-01-01 00:30:10", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(Cell::Timestamp(ts).to_json(), serde_json::json!("2021-01-01T00:30:10"));
        assert_eq!(Cell::Integer(3).to_json(), serde_json::json!(3));
        assert_eq!(Cell::Float(f64::NAN).to_json(), serde_json::Value::Null);
        assert_eq!(Cell::Null.to_string(), "null");
    }

    #[test]
    fn test_head() {
        let table = NormalizedTable {
            columns: vec![ColumnSchema {
                name: "n".to_string(),
                dtype: DataType::Integer,
            }],
            rows: vec![vec![Cell::Integer(1)], vec![Cell::Integer(2)], vec![Cell::Integer(3)]],
        };
        assert_eq!(table.head(2).len(), 2);
        assert_eq!(table.head(10).len(), 3);
        assert_eq!(table.dtype("n"), Some(DataType::Integer));
    }
}
