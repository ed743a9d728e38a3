//! Remote upload sink and the timeout race around it.
//!
//! # Design
//! - The dispatcher only sees the [`UploadSink`] trait; [`WebDavSink`] is the production
//!   implementation.
//! - [`upload_with_timeout`] spawns the upload as its own task and stops waiting when the
//!   timer wins. The task is detached, not aborted, so the remote write may still land.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dropwatch_config::WebDavSettings;
use reqwest::{Client, Method, RequestBuilder};
use thiserror::Error;
use tracing::debug;

/// Errors raised while uploading a transferred file.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The local file could not be read.
    #[error("failed to read upload payload")]
    Read {
        /// Local file being uploaded.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The local path has no file name to upload under.
    #[error("upload source has no file name")]
    MissingFileName {
        /// Offending local path.
        path: PathBuf,
    },
    /// The HTTP client could not be configured.
    #[error("failed to build http client")]
    Client {
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
    /// A WebDAV request could not be completed.
    #[error("webdav request failed")]
    Http {
        /// Operation identifier.
        operation: &'static str,
        /// Target URL.
        url: String,
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
    /// The server rejected the upload.
    #[error("webdav response status error")]
    Status {
        /// Target URL.
        url: String,
        /// HTTP status code returned by the server.
        status: u16,
    },
    /// The upload did not finish before the configured timeout.
    #[error("upload timed out")]
    TimedOut {
        /// Remote path being written.
        remote_path: String,
        /// Timeout that elapsed.
        timeout: Duration,
    },
    /// The upload task panicked or was cancelled.
    #[error("upload task failed")]
    Join {
        /// Underlying join error.
        source: tokio::task::JoinError,
    },
}

impl UploadError {
    /// Whether the error is the upload timeout rather than a transport failure.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}

/// Put-object style remote sink.
#[async_trait]
pub trait UploadSink: Send + Sync {
    /// Durably write `payload` at `remote_path`, creating parent collections as needed.
    async fn upload(&self, remote_path: &str, payload: Vec<u8>) -> Result<(), UploadError>;
}

/// Sink plus the time the dispatcher is willing to wait for it.
#[derive(Clone)]
pub struct UploadTarget {
    /// Remote sink.
    pub sink: Arc<dyn UploadSink>,
    /// Upper bound for a single upload.
    pub timeout: Duration,
}

/// Join `prefix` and the base name of `local` into an absolute remote path.
///
/// # Errors
///
/// Returns [`UploadError::MissingFileName`] when `local` has no file name.
pub fn remote_path_for(prefix: &str, local: &Path) -> Result<String, UploadError> {
    let name = local
        .file_name()
        .ok_or_else(|| UploadError::MissingFileName {
            path: local.to_path_buf(),
        })?
        .to_string_lossy();
    let mut remote = String::new();
    for segment in prefix.split('/').filter(|segment| !segment.is_empty()) {
        remote.push('/');
        remote.push_str(segment);
    }
    remote.push('/');
    remote.push_str(&name);
    Ok(remote)
}

/// Upload `local` under `prefix`, giving up after `target.timeout`.
///
/// Returns the remote path written on success.
///
/// # Errors
///
/// Returns [`UploadError::TimedOut`] when the timer wins the race, or the
/// sink's error when the upload itself fails.
pub async fn upload_with_timeout(
    target: &UploadTarget,
    local: &Path,
    prefix: &str,
) -> Result<String, UploadError> {
    let remote_path = remote_path_for(prefix, local)?;
    let payload = tokio::fs::read(local)
        .await
        .map_err(|source| UploadError::Read {
            path: local.to_path_buf(),
            source,
        })?;

    let sink = Arc::clone(&target.sink);
    let task_path = remote_path.clone();
    let handle = tokio::spawn(async move { sink.upload(&task_path, payload).await });
    match tokio::time::timeout(target.timeout, handle).await {
        Ok(Ok(Ok(()))) => Ok(remote_path),
        Ok(Ok(Err(err))) => Err(err),
        Ok(Err(source)) => Err(UploadError::Join { source }),
        Err(_) => Err(UploadError::TimedOut {
            remote_path,
            timeout: target.timeout,
        }),
    }
}

/// WebDAV implementation of [`UploadSink`].
#[derive(Debug, Clone)]
pub struct WebDavSink {
    client: Client,
    base_url: String,
    credentials: Option<(String, String)>,
}

impl WebDavSink {
    /// Build a sink from validated settings.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Client`] if the HTTP client cannot be constructed.
    pub fn new(settings: &WebDavSettings) -> Result<Self, UploadError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(settings.skip_tls_verify)
            .build()
            .map_err(|source| UploadError::Client { source })?;
        let credentials = (!settings.username.is_empty())
            .then(|| (settings.username.clone(), settings.password.clone()));
        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn url_for(&self, remote_path: &str) -> String {
        format!("{}/{}", self.base_url, remote_path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.credentials {
            Some((username, password)) => request.basic_auth(username, Some(password)),
            None => request,
        }
    }

    async fn ensure_collections(&self, remote_path: &str) {
        let Ok(mkcol) = Method::from_bytes(b"MKCOL") else {
            return;
        };
        let segments: Vec<&str> = remote_path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        let Some((_, parents)) = segments.split_last() else {
            return;
        };

        let mut collection = String::new();
        for segment in parents {
            collection.push('/');
            collection.push_str(segment);
            let url = format!("{}/", self.url_for(&collection));
            match self.request(mkcol.clone(), &url).send().await {
                Ok(response) => {
                    debug!(url = %url, status = response.status().as_u16(), "mkcol");
                }
                Err(err) => debug!(url = %url, error = %err, "mkcol failed"),
            }
        }
    }
}

#[async_trait]
impl UploadSink for WebDavSink {
    async fn upload(&self, remote_path: &str, payload: Vec<u8>) -> Result<(), UploadError> {
        self.ensure_collections(remote_path).await;

        let url = self.url_for(remote_path);
        let response = self
            .request(Method::PUT, &url)
            .body(payload)
            .send()
            .await
            .map_err(|source| UploadError::Http {
                operation: "webdav.put",
                url: url.clone(),
                source,
            })?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(UploadError::Status {
                url,
                status: status.as_u16(),
            })
        }
    }
}
