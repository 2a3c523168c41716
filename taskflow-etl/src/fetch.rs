//! Dataset download over HTTP or from the local filesystem.

use crate::collaborators::Fetcher;
use crate::errors::FetchError;
use crate::model::{RawTable, SourceLocator};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use std::io::{self, Read};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Fetches datasets over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, source: &SourceLocator) -> Result<RawTable, FetchError> {
        let url = source.url.as_str();
        info!(url = %url, "Downloading dataset");

        let http_error = |source| FetchError::Http {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url).send().await.map_err(http_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await.map_err(http_error)?;
        debug!(url = %url, bytes = body.len(), "Downloaded dataset");

        read_table(url, &body)
    }
}

/// Fetches datasets from `file://` URLs or plain paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetcher;

impl FileFetcher {
    /// Creates a file fetcher.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Fetcher for FileFetcher {
    async fn fetch(&self, source: &SourceLocator) -> Result<RawTable, FetchError> {
        let url = source.url.as_str();
        let path = PathBuf::from(url.strip_prefix("file://").unwrap_or(url));
        info!(path = %path.display(), "Reading dataset");

        let body = tokio::fs::read(&path)
            .await
            .map_err(|source| FetchError::Io {
                path: path.clone(),
                source,
            })?;
        read_table(url, &body)
    }
}

/// Reads a CSV body, gunzipping it when the URL ends in `.gz`.
pub fn read_table(url: &str, body: &[u8]) -> Result<RawTable, FetchError> {
    if url.ends_with(".gz") {
        parse_csv(url, GzDecoder::new(body))
    } else {
        parse_csv(url, body)
    }
}

/// Parses CSV with a header record.
///
/// Quoted fields may contain commas, newlines and doubled quotes. Blank
/// lines are skipped and every record must have as many fields as the
/// header.
pub fn parse_csv<R: Read>(url: &str, reader: R) -> Result<RawTable, FetchError> {
    let mut reader = csv::ReaderBuilder::new().from_reader(reader);

    let columns: Vec<String> = reader
        .headers()
        .map_err(|err| csv_error(url, err))?
        .iter()
        .map(str::to_string)
        .collect();
    if columns.is_empty() {
        return Err(FetchError::Empty {
            url: url.to_string(),
        });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| csv_error(url, err))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(RawTable { columns, rows })
}

fn csv_error(url: &str, err: csv::Error) -> FetchError {
    let line = err
        .position()
        .map_or(0, |pos| usize::try_from(pos.line()).unwrap_or(usize::MAX));
    let parse_error = |message| FetchError::Parse {
        url: url.to_string(),
        line,
        message,
    };

    match err.into_kind() {
        csv::ErrorKind::Io(source) => FetchError::Decode {
            url: url.to_string(),
            source,
        },
        csv::ErrorKind::Utf8 { err, .. } => FetchError::Decode {
            url: url.to_string(),
            source: io::Error::new(io::ErrorKind::InvalidData, err),
        },
        csv::ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => parse_error(format!("expected {expected_len} field(s), found {len}")),
        other => parse_error(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const CSV: &str = "VendorID,tpep_pickup_datetime,fare_amount\n\
                       1,2021-01-01 00:30:10,8.0\r\n\
                       \n\
                       2,2021-01-01 00:51:20,\"5,5\"\n";

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_parse_csv() {
        let table = parse_csv("mem", CSV.as_bytes()).unwrap();
        assert_eq!(table.columns, vec!["VendorID", "tpep_pickup_datetime", "fare_amount"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0], vec!["1", "2021-01-01 00:30:10", "8.0"]);
        assert_eq!(table.rows[1][2], "5,5");
    }

    #[test]
    fn test_parse_quoted_quotes() {
        let table = parse_csv("mem", "a,b\n\"say \"\"hi\"\"\",2\n".as_bytes()).unwrap();
        assert_eq!(table.rows[0][0], "say \"hi\"");
    }

    #[test]
    fn test_quoted_field_spans_lines() {
        let text = "id,note\n1,\"line one\nline two\"\n2,plain\n";
        let table = parse_csv("mem", text.as_bytes()).unwrap();

        assert_eq!(table.columns, vec!["id", "note"]);
        assert_eq!(
            table.rows,
            vec![
                vec!["1".to_string(), "line one\nline two".to_string()],
                vec!["2".to_string(), "plain".to_string()],
            ]
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_csv("mem", "".as_bytes()),
            Err(FetchError::Empty { .. })
        ));
        assert!(matches!(
            parse_csv("mem", "a,b\n1,2,3\n".as_bytes()),
            Err(FetchError::Parse { line: 2, .. })
        ));
        assert!(matches!(
            parse_csv("mem", "a,b\n\"1,2\n".as_bytes()),
            Err(FetchError::Parse { .. })
        ));
    }

    #[test]
    fn test_gzip_by_extension() {
        let body = gzip("a\n1\n");
        assert_eq!(read_table("x.csv.gz", &body).unwrap().rows, vec![vec!["1"]]);
        assert!(matches!(
            read_table("x.csv.gz", b"not gzip"),
            Err(FetchError::Decode { .. })
        ));
        assert_eq!(read_table("x.csv", b"a\n2\n").unwrap().rows, vec![vec!["2"]]);
        assert!(matches!(
            read_table("x.csv", b"a\n\xff\n"),
            Err(FetchError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn test_file_fetcher_reads_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yellow_tripdata_2021-01.csv.gz");
        std::fs::write(&path, gzip(CSV)).unwrap();

        let locator = SourceLocator::new(format!("file://{}", path.display()));
        let table = FileFetcher::new().fetch(&locator).await.unwrap();
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn test_file_fetcher_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let locator = SourceLocator::new(dir.path().join("missing.csv").display().to_string());
        let err = FileFetcher::new().fetch(&locator).await.unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
    }
}
