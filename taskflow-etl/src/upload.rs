//! Uploaders for the object store.

use crate::collaborators::RemoteUploader;
use crate::errors::UploadError;
use crate::model::{LocalArtifact, UploadReceipt};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Emulates a bucket with a local directory.
#[derive(Debug, Clone)]
pub struct DirectoryUploader {
    root: PathBuf,
}

impl DirectoryUploader {
    /// Creates an uploader copying into `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the bucket directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl RemoteUploader for DirectoryUploader {
    async fn upload(&self, artifact: &LocalArtifact) -> Result<UploadReceipt, UploadError> {
        let target = self.root.join(&artifact.object_path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| UploadError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let bytes = tokio::fs::copy(&artifact.local_path, &target)
            .await
            .map_err(|source| UploadError::Io {
                path: artifact.local_path.clone(),
                source,
            })?;

        info!(object = %artifact.object_path, target = %target.display(), bytes, "Uploaded dataset");
        Ok(UploadReceipt {
            object_path: artifact.object_path.clone(),
            location: target.display().to_string(),
            bytes,
        })
    }
}

/// Uploads objects with HTTP `PUT {endpoint}/{bucket}/{object}`.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    token: Option<String>,
}

impl HttpUploader {
    /// Creates an uploader; requests give up after `timeout`.
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, UploadError> {
        let bucket = bucket.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| UploadError::Http {
                object: bucket.clone(),
                source,
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            bucket,
            token,
        })
    }

    /// Reads the bearer token from the environment variable `token_env`.
    pub fn token_from_env(token_env: &str) -> Result<String, UploadError> {
        std::env::var(token_env).map_err(|_| UploadError::MissingToken(token_env.to_string()))
    }

    /// URL of `object` in the bucket.
    pub fn object_url(&self, object: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.bucket,
            object.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl RemoteUploader for HttpUploader {
    async fn upload(&self, artifact: &LocalArtifact) -> Result<UploadReceipt, UploadError> {
        let body = tokio::fs::read(&artifact.local_path)
            .await
            .map_err(|source| UploadError::Io {
                path: artifact.local_path.clone(),
                source,
            })?;
        let bytes = body.len() as u64;
        let url = self.object_url(&artifact.object_path);

        let mut request = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/gzip")
            .body(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|source| UploadError::Http {
            object: artifact.object_path.clone(),
            source,
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status {
                object: artifact.object_path.clone(),
                status: status.as_u16(),
            });
        }

        info!(object = %artifact.object_path, url = %url, bytes, "Uploaded dataset");
        Ok(UploadReceipt {
            object_path: artifact.object_path.clone(),
            location: url,
            bytes,
        })
    }
}
