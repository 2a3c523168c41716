//! Traits for the external steps of the ETL.
//!
//! The flow only depends on these traits; transports, formats, and stores
//! are plugged in behind them.

use crate::errors::{FetchError, NormalizeError, UploadError, WriteError};
use crate::model::{
    LocalArtifact, LocalDestination, NormalizedTable, RawTable, SourceLocator, UploadReceipt,
};
use async_trait::async_trait;

/// Downloads and parses a CSV dataset.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches the table at `source`.
    async fn fetch(&self, source: &SourceLocator) -> Result<RawTable, FetchError>;
}

/// Coerces raw columns into typed ones.
#[cfg_attr(test, mockall::automock)]
pub trait Normalizer: Send + Sync {
    /// Normalizes `table`.
    fn normalize(&self, table: &RawTable) -> Result<NormalizedTable, NormalizeError>;
}

/// Persists a normalized table on local disk.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocalWriter: Send + Sync {
    /// Writes `table` to `destination`.
    async fn write(
        &self,
        table: &NormalizedTable,
        destination: &LocalDestination,
    ) -> Result<LocalArtifact, WriteError>;
}

/// Copies a local artifact into the object store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteUploader: Send + Sync {
    /// Uploads `artifact` to its object path.
    async fn upload(&self, artifact: &LocalArtifact) -> Result<UploadReceipt, UploadError>;
}
