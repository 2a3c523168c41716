//! # Taskflow ETL
//!
//! Web-to-object-store ETL for the NYC taxi trip datasets, built on
//! [`taskflow`].
//!
//! Each month runs the pipeline `fetch → clean → write_local →
//! write_remote`. `fetch` is retried and its table is cached for a day,
//! keyed on the dataset URL, so re-running a month within the day does not
//! download it again. The parent flow runs one pipeline per month and keeps
//! going when a month fails.
//!
//! ```rust,ignore
//! use taskflow_etl::{EtlConfig, EtlFlow};
//!
//! let flow = EtlFlow::from_config(&EtlConfig::default())?;
//! let report = flow.run_parent("yellow", 2021, &[1, 2, 3]).await;
//! println!("{report}");
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cli;
pub mod collaborators;
pub mod config;
pub mod errors;
pub mod fetch;
pub mod flow;
pub mod model;
pub mod normalize;
pub mod upload;
pub mod writer;

pub use collaborators::{Fetcher, LocalWriter, Normalizer, RemoteUploader};
pub use config::{CacheConfig, EtlConfig, UploadConfig};
pub use errors::{ConfigError, FetchError, NormalizeError, UploadError, WriteError};
pub use fetch::{FileFetcher, HttpFetcher};
pub use flow::EtlFlow;
pub use model::{
    DatasetSpec, LocalArtifact, LocalDestination, NormalizedTable, RawTable, SourceLocator,
    UploadReceipt,
};
pub use normalize::TripNormalizer;
pub use upload::{DirectoryUploader, HttpUploader};
pub use writer::GzipJsonLinesWriter;
