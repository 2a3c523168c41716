//! The web-to-store flow: `fetch → clean → write_local → write_remote` per
//! month, and a parent flow running it for several months.

use crate::collaborators::{Fetcher, LocalWriter, Normalizer, RemoteUploader};
use crate::config::{CacheConfig, EtlConfig, UploadConfig};
use crate::errors::ConfigError;
use crate::fetch::{FileFetcher, HttpFetcher};
use crate::model::{
    DatasetSpec, LocalArtifact, LocalDestination, NormalizedTable, RawTable, SourceLocator,
    UploadReceipt, DEFAULT_BASE_URL,
};
use crate::normalize::TripNormalizer;
use crate::upload::{DirectoryUploader, HttpUploader};
use crate::writer::GzipJsonLinesWriter;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use taskflow::batch::{BatchDriver, BatchReport, Invocation};
use taskflow::cache::{FileTaskCache, InMemoryTaskCache, TaskCache};
use taskflow::errors::{IterationError, PipelineValidationError};
use taskflow::events::LoggingEventSink;
use taskflow::pipeline::{Pipeline, PipelineBuilder};
use taskflow::task::{CachePolicy, ExecutionEnv, Operation, RetryPolicy, Task};

/// Name of each month's pipeline.
pub const PIPELINE_NAME: &str = "etl-web-to-store";

/// Name of the parent flow.
pub const PARENT_NAME: &str = "etl-parent-flow";

struct FetchOperation {
    fetcher: Arc<dyn Fetcher>,
}

#[async_trait]
impl Operation<SourceLocator, RawTable> for FetchOperation {
    async fn call(&self, input: &SourceLocator) -> anyhow::Result<RawTable> {
        Ok(self.fetcher.fetch(input).await?)
    }
}

struct CleanOperation {
    normalizer: Arc<dyn Normalizer>,
}

#[async_trait]
impl Operation<RawTable, NormalizedTable> for CleanOperation {
    async fn call(&self, input: &RawTable) -> anyhow::Result<NormalizedTable> {
        Ok(self.normalizer.normalize(input)?)
    }
}

struct WriteLocalOperation {
    writer: Arc<dyn LocalWriter>,
    destination: LocalDestination,
}

#[async_trait]
impl Operation<NormalizedTable, LocalArtifact> for WriteLocalOperation {
    async fn call(&self, input: &NormalizedTable) -> anyhow::Result<LocalArtifact> {
        Ok(self.writer.write(input, &self.destination).await?)
    }
}

struct WriteRemoteOperation {
    uploader: Arc<dyn RemoteUploader>,
}

#[async_trait]
impl Operation<LocalArtifact, UploadReceipt> for WriteRemoteOperation {
    async fn call(&self, input: &LocalArtifact) -> anyhow::Result<UploadReceipt> {
        Ok(self.uploader.upload(input).await?)
    }
}

/// Builds and runs the ETL pipelines.
///
/// Only `fetch` carries policies: it is retried (3 attempts by default) and
/// its result is cached for a day, keyed on the dataset URL. The other tasks
/// run once per invocation.
#[derive(Clone)]
pub struct EtlFlow {
    base_url: String,
    fetcher: Arc<dyn Fetcher>,
    normalizer: Arc<dyn Normalizer>,
    writer: Arc<dyn LocalWriter>,
    uploader: Arc<dyn RemoteUploader>,
    fetch_retry: RetryPolicy,
    fetch_cache: CachePolicy,
    env: ExecutionEnv,
    concurrency: usize,
    iteration_timeout: Option<Duration>,
}

impl fmt::Debug for EtlFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EtlFlow")
            .field("base_url", &self.base_url)
            .field("fetch_retry", &self.fetch_retry)
            .field("fetch_cache", &self.fetch_cache)
            .field("env", &self.env)
            .field("concurrency", &self.concurrency)
            .field("iteration_timeout", &self.iteration_timeout)
            .finish_non_exhaustive()
    }
}

impl EtlFlow {
    /// Creates a flow from its four collaborators.
    pub fn new(
        fetcher: impl Fetcher + 'static,
        normalizer: impl Normalizer + 'static,
        writer: impl LocalWriter + 'static,
        uploader: impl RemoteUploader + 'static,
    ) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            fetcher: Arc::new(fetcher),
            normalizer: Arc::new(normalizer),
            writer: Arc::new(writer),
            uploader: Arc::new(uploader),
            fetch_retry: RetryPolicy::new(3),
            fetch_cache: CachePolicy::one_day(),
            env: ExecutionEnv::default(),
            concurrency: 1,
            iteration_timeout: None,
        }
    }

    /// Builds a flow from configuration.
    pub fn from_config(config: &EtlConfig) -> Result<Self, ConfigError> {
        let fetcher: Arc<dyn Fetcher> = if config.fetches_over_http() {
            let fetcher = HttpFetcher::new(config.fetch_timeout()).map_err(|e| ConfigError::Setup {
                component: "fetcher",
                message: e.to_string(),
            })?;
            Arc::new(fetcher)
        } else {
            Arc::new(FileFetcher::new())
        };

        let uploader: Arc<dyn RemoteUploader> = match &config.upload {
            UploadConfig::Directory { root } => Arc::new(DirectoryUploader::new(root)),
            UploadConfig::Http {
                endpoint,
                bucket,
                token_env,
                timeout_seconds,
            } => {
                let setup_error = |e: crate::errors::UploadError| ConfigError::Setup {
                    component: "uploader",
                    message: e.to_string(),
                };
                let token = token_env
                    .as_deref()
                    .map(HttpUploader::token_from_env)
                    .transpose()
                    .map_err(setup_error)?;
                let uploader = HttpUploader::new(
                    endpoint.as_str(),
                    bucket.as_str(),
                    token,
                    Duration::from_secs(*timeout_seconds),
                )
                .map_err(setup_error)?;
                Arc::new(uploader)
            }
        };

        let cache: Arc<dyn TaskCache> = match &config.cache {
            CacheConfig::Memory => Arc::new(InMemoryTaskCache::new()),
            CacheConfig::Directory { path } => Arc::new(FileTaskCache::new(path)),
        };
        let env = ExecutionEnv::new()
            .with_cache(cache)
            .with_sink(Arc::new(LoggingEventSink::default()));

        let mut flow = Self {
            base_url: config.base_url.clone(),
            fetcher,
            normalizer: Arc::new(TripNormalizer::default()),
            writer: Arc::new(GzipJsonLinesWriter::new(&config.data_dir)),
            uploader,
            fetch_retry: RetryPolicy::new(config.fetch_attempts)
                .with_base_delay_ms(config.fetch_retry_delay_ms),
            fetch_cache: CachePolicy::from_secs(config.cache_ttl_seconds),
            env,
            concurrency: config.concurrency.max(1),
            iteration_timeout: None,
        };
        if let Some(limit) = config.iteration_timeout() {
            flow = flow.with_iteration_timeout(limit);
        }
        Ok(flow)
    }

    /// Sets the base URL datasets are fetched from.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the retry policy of the fetch task.
    #[must_use]
    pub fn with_fetch_retry(mut self, policy: RetryPolicy) -> Self {
        self.fetch_retry = policy;
        self
    }

    /// Sets the cache policy of the fetch task.
    #[must_use]
    pub fn with_fetch_cache(mut self, policy: CachePolicy) -> Self {
        self.fetch_cache = policy;
        self
    }

    /// Sets the cache, sink, and clock shared by every pipeline.
    #[must_use]
    pub fn with_env(mut self, env: ExecutionEnv) -> Self {
        self.env = env;
        self
    }

    /// Runs up to `n` months at a time in the parent flow.
    #[must_use]
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Fails a month whose pipeline takes longer than `limit`.
    #[must_use]
    pub fn with_iteration_timeout(mut self, limit: Duration) -> Self {
        self.iteration_timeout = Some(limit);
        self
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the shared execution environment.
    pub fn env(&self) -> &ExecutionEnv {
        &self.env
    }

    /// Builds the pipeline for one dataset.
    pub fn pipeline(
        &self,
        dataset: &DatasetSpec,
    ) -> Result<Pipeline<SourceLocator, UploadReceipt>, PipelineValidationError> {
        let fetch = Task::new(
            "fetch",
            FetchOperation {
                fetcher: Arc::clone(&self.fetcher),
            },
        )
        .with_retry(self.fetch_retry.clone())
        .with_cache(self.fetch_cache);
        let clean = Task::new(
            "clean",
            CleanOperation {
                normalizer: Arc::clone(&self.normalizer),
            },
        );
        let write_local = Task::new(
            "write_local",
            WriteLocalOperation {
                writer: Arc::clone(&self.writer),
                destination: dataset.destination(),
            },
        );
        let write_remote = Task::new(
            "write_remote",
            WriteRemoteOperation {
                uploader: Arc::clone(&self.uploader),
            },
        );

        PipelineBuilder::<SourceLocator>::new(PIPELINE_NAME)
            .then(fetch)
            .then(clean)
            .then(write_local)
            .then(write_remote)
            .with_env(self.env.clone())
            .build()
    }

    /// Builds the pipeline and its input for one dataset.
    pub fn invocation(
        &self,
        dataset: &DatasetSpec,
    ) -> Result<Invocation<SourceLocator, UploadReceipt>, PipelineValidationError> {
        if !(1..=12).contains(&dataset.month) {
            return Err(PipelineValidationError::new(format!(
                "Month {} of {dataset} is outside 1..=12",
                dataset.month
            )));
        }
        let pipeline = self.pipeline(dataset)?;
        Ok(Invocation::new(pipeline, dataset.locator(&self.base_url)))
    }

    /// Runs the pipeline for one dataset.
    pub async fn run(&self, dataset: &DatasetSpec) -> Result<UploadReceipt, IterationError> {
        let Invocation { pipeline, input } = self.invocation(dataset)?;
        Ok(pipeline.run(input).await?)
    }

    /// Returns the parent flow driver.
    pub fn parent(&self) -> BatchDriver<DatasetSpec, SourceLocator, UploadReceipt> {
        let flow = self.clone();
        let mut driver = BatchDriver::new(PARENT_NAME, move |dataset: &DatasetSpec| {
            flow.invocation(dataset)
        })
        .with_concurrency(self.concurrency)
        .with_event_sink(Arc::clone(&self.env.sink));
        if let Some(limit) = self.iteration_timeout {
            driver = driver.with_iteration_timeout(limit);
        }
        driver
    }

    /// Runs the pipeline for every month of `color` and `year`.
    ///
    /// A failing month does not stop the remaining ones.
    pub async fn run_parent(
        &self,
        color: &str,
        year: i32,
        months: &[u32],
    ) -> BatchReport<DatasetSpec, UploadReceipt> {
        let datasets = months
            .iter()
            .map(|&month| DatasetSpec::new(color, year, month));
        self.parent().run_all(datasets).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{MockFetcher, MockLocalWriter, MockNormalizer, MockRemoteUploader};
    use crate::errors::{FetchError, NormalizeError};
    use mockall::Sequence;
    use pretty_assertions::assert_eq;
    use taskflow::cache::Fingerprint;
    use taskflow::events::CollectingEventSink;

    const BASE: &str = "https://example.test/releases";

    fn raw() -> RawTable {
        RawTable {
            columns: vec!["VendorID".to_string()],
            rows: vec![vec!["1".to_string()]],
        }
    }

    fn normalizer() -> MockNormalizer {
        let mut normalizer = MockNormalizer::new();
        normalizer
            .expect_normalize()
            .returning(|_| Ok(NormalizedTable::default()));
        normalizer
    }

    fn writer() -> MockLocalWriter {
        let mut writer = MockLocalWriter::new();
        writer.expect_write().returning(|_, destination| {
            Ok(LocalArtifact {
                local_path: format!("data/{}/{}.jsonl.gz", destination.color, destination.dataset_file).into(),
                object_path: format!("{}/{}.jsonl.gz", destination.color, destination.dataset_file),
            })
        });
        writer
    }

    fn uploader() -> MockRemoteUploader {
        let mut uploader = MockRemoteUploader::new();
        uploader.expect_upload().returning(|artifact| {
            Ok(UploadReceipt {
                object_path: artifact.object_path.clone(),
                location: format!("bucket/{}", artifact.object_path),
                bytes: 10,
            })
        });
        uploader
    }

    fn flow(fetcher: MockFetcher, cache: Arc<InMemoryTaskCache>) -> EtlFlow {
        EtlFlow::new(fetcher, normalizer(), writer(), uploader())
            .with_base_url(BASE)
            .with_env(ExecutionEnv::new().with_cache(cache))
    }

    #[tokio::test]
    async fn test_second_run_within_ttl_fetches_once() {
        let mut fetcher = MockFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|source| source.url == format!("{BASE}/yellow/yellow_tripdata_2021-01.csv.gz"))
            .times(1)
            .returning(|_| Ok(raw()));
        let cache = Arc::new(InMemoryTaskCache::new());
        let flow = flow(fetcher, Arc::clone(&cache));
        let dataset = DatasetSpec::new("yellow", 2021, 1);

        let first = flow.run(&dataset).await.unwrap();
        let second = flow.run(&dataset).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.object_path, "yellow/yellow_tripdata_2021-01.jsonl.gz");
        let fingerprint = Fingerprint::compute(
            "fetch",
            &format!("{BASE}/yellow/yellow_tripdata_2021-01.csv.gz"),
        )
        .unwrap();
        assert!(cache.entry(&fingerprint).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_is_retried() {
        let mut fetcher = MockFetcher::new();
        let mut seq = Sequence::new();
        fetcher
            .expect_fetch()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|source| {
                Err(FetchError::Status {
                    url: source.url.clone(),
                    status: 503,
                })
            });
        fetcher
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(raw()));

        let flow = flow(fetcher, Arc::new(InMemoryTaskCache::new()));
        let receipt = flow.run(&DatasetSpec::new("green", 2020, 11)).await.unwrap();

        assert_eq!(receipt.object_path, "green/green_tripdata_2020-11.jsonl.gz");
    }

    #[tokio::test]
    async fn test_clean_failure_is_not_retried() {
        let mut fetcher = MockFetcher::new();
        fetcher.expect_fetch().times(1).returning(|_| Ok(raw()));
        let mut normalizer = MockNormalizer::new();
        normalizer
            .expect_normalize()
            .times(1)
            .returning(|_| Err(NormalizeError::MissingColumn("tpep_pickup_datetime".to_string())));
        let mut writer = MockLocalWriter::new();
        writer.expect_write().never();

        let flow = EtlFlow::new(fetcher, normalizer, writer, uploader()).with_base_url(BASE);
        let err = flow.run(&DatasetSpec::new("yellow", 2021, 1)).await.unwrap_err();

        assert_eq!(err.failed_task(), Some("clean"));
    }

    #[tokio::test]
    async fn test_parent_flow_isolates_failing_month() {
        let mut fetcher = MockFetcher::new();
        fetcher.expect_fetch().times(5).returning(|source| {
            if source.url.ends_with("2021-02.csv.gz") {
                Err(FetchError::Status {
                    url: source.url.clone(),
                    status: 404,
                })
            } else {
                Ok(raw())
            }
        });
        let sink = Arc::new(CollectingEventSink::new());
        let flow = EtlFlow::new(fetcher, normalizer(), writer(), uploader())
            .with_base_url(BASE)
            .with_env(ExecutionEnv::new().with_sink(sink.clone()));

        let report = flow.run_parent("yellow", 2021, &[1, 2, 3]).await;

        assert_eq!(report.attempted(), 3);
        let failed = report.failed();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].params, DatasetSpec::new("yellow", 2021, 2));
        let failure = report.partial_failure().unwrap();
        assert_eq!(failure.failures[0].failed_task.as_deref(), Some("fetch"));
        assert_eq!(sink.count("batch.completed"), 1);
    }

    #[tokio::test]
    async fn test_invalid_month_is_rejected() {
        let mut fetcher = MockFetcher::new();
        fetcher.expect_fetch().never();
        let flow = flow(fetcher, Arc::new(InMemoryTaskCache::new()));

        let err = flow.run(&DatasetSpec::new("yellow", 2021, 13)).await.unwrap_err();
        assert!(matches!(err, IterationError::Invalid(_)));
    }

    #[test]
    fn test_pipeline_shape() {
        let flow = EtlFlow::new(MockFetcher::new(), normalizer(), writer(), uploader());
        let pipeline = flow.pipeline(&DatasetSpec::new("yellow", 2021, 1)).unwrap();
        let tasks = pipeline.tasks();

        let names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["fetch", "clean", "write_local", "write_remote"]);
        assert_eq!(tasks[0].retry_policy, Some(RetryPolicy::new(3)));
        assert_eq!(tasks[0].cache_policy, Some(CachePolicy::one_day()));
        assert!(tasks[1..].iter().all(|t| t.retry_policy.is_none() && t.cache_policy.is_none()));
    }

    #[test]
    fn test_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = EtlConfig {
            base_url: format!("file://{}", dir.path().display()),
            data_dir: dir.path().join("data"),
            cache: CacheConfig::Memory,
            fetch_attempts: 2,
            iteration_timeout_seconds: Some(30),
            ..EtlConfig::default()
        };

        let flow = EtlFlow::from_config(&config).unwrap();
        assert_eq!(flow.fetch_retry, RetryPolicy::new(2));
        assert_eq!(flow.iteration_timeout, Some(Duration::from_secs(30)));

        let missing_token = EtlConfig {
            upload: UploadConfig::Http {
                endpoint: "http://localhost:9000".to_string(),
                bucket: "ny-taxi".to_string(),
                token_env: Some("TASKFLOW_ETL_TEST_UNSET_TOKEN".to_string()),
                timeout_seconds: 5,
            },
            ..config
        };
        assert!(matches!(
            EtlFlow::from_config(&missing_token),
            Err(ConfigError::Setup { component: "uploader", .. })
        ));
    }
}
