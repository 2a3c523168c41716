//! Type coercion for trip tables.

use crate::collaborators::Normalizer;
use crate::errors::NormalizeError;
use crate::model::{Cell, ColumnSchema, DataType, NormalizedTable, RawTable};
use chrono::NaiveDateTime;
use tracing::info;

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Normalizes NYC taxi trip tables.
///
/// Pickup and dropoff columns are parsed as timestamps and must be present.
/// Every other column becomes integer, float, or text, whichever fits all
/// of its non-empty values. Empty fields become nulls.
#[derive(Debug, Clone)]
pub struct TripNormalizer {
    timestamp_columns: Vec<String>,
}

impl Default for TripNormalizer {
    fn default() -> Self {
        Self::new(["tpep_pickup_datetime", "tpep_dropoff_datetime"])
    }
}

impl TripNormalizer {
    /// Creates a normalizer that parses the given columns as timestamps.
    pub fn new<S: Into<String>>(timestamp_columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            timestamp_columns: timestamp_columns.into_iter().map(Into::into).collect(),
        }
    }

    fn column_type(&self, table: &RawTable, index: usize) -> DataType {
        if self.timestamp_columns.contains(&table.columns[index]) {
            return DataType::Timestamp;
        }
        infer_type(table.rows.iter().map(|row| row[index].as_str()))
    }
}

impl Normalizer for TripNormalizer {
    fn normalize(&self, table: &RawTable) -> Result<NormalizedTable, NormalizeError> {
        for name in &self.timestamp_columns {
            if table.column_index(name).is_none() {
                return Err(NormalizeError::MissingColumn(name.clone()));
            }
        }
        for (row, fields) in table.rows.iter().enumerate() {
            if fields.len() != table.columns.len() {
                return Err(NormalizeError::RaggedRow {
                    row,
                    expected: table.columns.len(),
                    found: fields.len(),
                });
            }
        }

        let columns: Vec<ColumnSchema> = table
            .columns
            .iter()
            .enumerate()
            .map(|(index, name)| ColumnSchema {
                name: name.clone(),
                dtype: self.column_type(table, index),
            })
            .collect();

        let rows = table
            .rows
            .iter()
            .enumerate()
            .map(|(row, fields)| {
                fields
                    .iter()
                    .zip(&columns)
                    .map(|(value, column)| coerce(value, column, row))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let normalized = NormalizedTable { columns, rows };
        log_summary(&normalized);
        Ok(normalized)
    }
}

fn infer_type<'a>(values: impl Iterator<Item = &'a str>) -> DataType {
    let mut dtype = DataType::Integer;
    let mut seen = false;
    for value in values.filter(|v| !v.is_empty()) {
        seen = true;
        if dtype == DataType::Integer && value.parse::<i64>().is_err() {
            dtype = DataType::Float;
        }
        if dtype == DataType::Float && value.parse::<f64>().is_err() {
            return DataType::Text;
        }
    }
    if seen {
        dtype
    } else {
        DataType::Text
    }
}

fn coerce(value: &str, column: &ColumnSchema, row: usize) -> Result<Cell, NormalizeError> {
    if value.is_empty() {
        return Ok(Cell::Null);
    }
    // dtype was inferred from these same values
    let cell = match column.dtype {
        DataType::Integer => value.parse::<i64>().map_or(Cell::Null, Cell::Integer),
        DataType::Float => value.parse::<f64>().map_or(Cell::Null, Cell::Float),
        DataType::Text => Cell::Text(value.to_string()),
        DataType::Timestamp => {
            Cell::Timestamp(parse_timestamp(value).ok_or_else(|| NormalizeError::InvalidTimestamp {
                column: column.name.clone(),
                row,
                value: value.to_string(),
            })?)
        }
    };
    Ok(cell)
}

/// Parses `YYYY-MM-DD HH:MM:SS` with an optional `T` separator and
/// fractional seconds.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

fn log_summary(table: &NormalizedTable) {
    for (i, row) in table.head(2).iter().enumerate() {
        let rendered: Vec<String> = table
            .columns
            .iter()
            .zip(row)
            .map(|(column, cell)| format!("{}={cell}", column.name))
            .collect();
        info!(row = i, values = %rendered.join(", "), "head");
    }
    let dtypes: Vec<String> = table
        .columns
        .iter()
        .map(|c| format!("{}: {}", c.name, c.dtype))
        .collect();
    info!(columns = %dtypes.join(", "), "dtypes");
    info!(rows = table.len(), "rows");
}
