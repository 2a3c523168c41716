//! Error types of the ETL collaborators and configuration.

use std::path::PathBuf;
use thiserror::Error;

/// Downloading or parsing a dataset failed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP client could not be created.
    #[error("Cannot create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request failed before a response arrived.
    #[error("Request to {url} failed: {source}")]
    Http {
        /// The requested URL.
        url: String,
        /// The transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("GET {url} returned status {status}")]
    Status {
        /// The requested URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// A local source could not be read.
    #[error("Cannot read {}: {source}", .path.display())]
    Io {
        /// The local path.
        path: PathBuf,
        /// The I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The body could not be decompressed or decoded as UTF-8.
    #[error("Cannot decode {url}: {source}")]
    Decode {
        /// The source URL.
        url: String,
        /// The decoding error.
        #[source]
        source: std::io::Error,
    },

    /// The CSV content is malformed.
    #[error("Malformed CSV in {url} at line {line}: {message}")]
    Parse {
        /// The source URL.
        url: String,
        /// 1-based line number.
        line: usize,
        /// What is wrong.
        message: String,
    },

    /// The source has no header line.
    #[error("{url} is empty")]
    Empty {
        /// The source URL.
        url: String,
    },
}

/// Coercing a raw table into typed columns failed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    /// A required column is absent.
    #[error("Missing column '{0}'")]
    MissingColumn(String),

    /// A timestamp column holds an unparseable value.
    #[error("Invalid timestamp '{value}' in column '{column}' at row {row}")]
    InvalidTimestamp {
        /// The column name.
        column: String,
        /// Zero-based row index.
        row: usize,
        /// The offending value.
        value: String,
    },

    /// A row does not have one field per column.
    #[error("Row {row} has {found} field(s), expected {expected}")]
    RaggedRow {
        /// Zero-based row index.
        row: usize,
        /// Number of columns.
        expected: usize,
        /// Number of fields found.
        found: usize,
    },
}

/// Writing a dataset to local disk failed.
#[derive(Debug, Error)]
pub enum WriteError {
    /// A file or directory operation failed.
    #[error("Cannot write {}: {source}", .path.display())]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A row could not be encoded.
    #[error("Cannot encode row: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Uploading a dataset failed.
#[derive(Debug, Error)]
pub enum UploadError {
    /// A file operation failed.
    #[error("Cannot upload {}: {source}", .path.display())]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The request failed before a response arrived.
    #[error("PUT {object} failed: {source}")]
    Http {
        /// The object path.
        object: String,
        /// The transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The store answered with a non-success status.
    #[error("PUT {object} returned status {status}")]
    Status {
        /// The object path.
        object: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The configured token variable is not set.
    #[error("Environment variable {0} is not set")]
    MissingToken(String),
}

/// Loading or validating the configuration failed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Cannot read config {}: {source}", .path.display())]
    Read {
        /// The config path.
        path: PathBuf,
        /// The I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The YAML is malformed.
    #[error("Cannot parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// A collaborator could not be set up.
    #[error("Cannot set up {component}: {message}")]
    Setup {
        /// The collaborator.
        component: &'static str,
        /// What went wrong.
        message: String,
    },
}
