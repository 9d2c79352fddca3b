use async_trait::async_trait;
use faasr_types::DataStoreConfig;

use crate::error::BackendError;

/// The interface a concrete object-store driver must implement. The actual
/// FaaS execution platform's object store (S3, GCS, ...) is an external
/// collaborator -- this crate only needs to talk to *something* behind this
/// trait; `HttpObjectStoreBackend` is one default, reqwest-based, driver.
#[async_trait]
pub trait ObjectStoreBackend: Send + Sync {
    /// Probe for object existence. A missing object is `Ok(false)`, not an
    /// error -- only genuine backend failures are `Err`.
    async fn head(&self, key: &str) -> Result<bool, BackendError>;

    /// Read an object's contents as UTF-8 text. A missing object is
    /// `Err(BackendError::NotFound)`.
    async fn get(&self, key: &str) -> Result<String, BackendError>;
}

/// A reqwest-based driver for S3-compatible object stores, addressed in
/// path style: `{endpoint-or-default}/{bucket}/{key}`. Mirrors the
/// endpoint-vs-no-endpoint branch in `framework/s3_client.py`'s
/// `FaaSrS3Client.__init__`.
pub struct HttpObjectStoreBackend {
    http: reqwest::Client,
    base_url: String,
    bucket: String,
}

impl HttpObjectStoreBackend {
    pub fn new(http: reqwest::Client, config: &DataStoreConfig) -> Self {
        let base_url = config
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", config.region));
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.bucket, key)
    }
}

#[async_trait]
impl ObjectStoreBackend for HttpObjectStoreBackend {
    async fn head(&self, key: &str) -> Result<bool, BackendError> {
        let res = self
            .http
            .head(self.object_url(key))
            .send()
            .await
            .map_err(|err| BackendError::Other(err.into()))?;
        if res.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !res.status().is_success() {
            return Err(BackendError::Other(anyhow::anyhow!(
                "unexpected status {} probing {key}",
                res.status()
            )));
        }
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<String, BackendError> {
        let res = self
            .http
            .get(self.object_url(key))
            .send()
            .await
            .map_err(|err| BackendError::Other(err.into()))?;
        if res.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound);
        }
        if !res.status().is_success() {
            return Err(BackendError::Other(anyhow::anyhow!(
                "unexpected status {} fetching {key}",
                res.status()
            )));
        }
        res.text().await.map_err(|err| BackendError::Other(err.into()))
    }
}
