//! Implements `Remote` against the inventory API over HTTP.

use crate::api::{batch_body, BatchResponse, Remote, SingleResponse};
use crate::import::Staged;
use crate::model::Record;
use crate::{Config, Result};
use anyhow::{bail, Context};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};
use url::Url;

/// Posts records as JSON to `{api_url}/{collection}` and `{api_url}/{collection}/bulk`.
pub struct HttpRemote {
    client: reqwest::Client,
    base: Url,
}

impl HttpRemote {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Unable to build the HTTP client")?;
        Ok(Self {
            client,
            base: base_url(config.api_url())?,
        })
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + ValidationAnswer,
    {
        let url = self
            .base
            .join(path)
            .with_context(|| format!("Unable to build the URL for '{path}'"))?;
        debug!("POST {url}");
        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .with_context(|| format!("Unable to read the response from {url}"))?;
        trace!("{status} {text}");

        if status.is_success() {
            return serde_json::from_str(&text)
                .with_context(|| format!("Unable to parse the response from {url}: {text}"));
        }
        // Validation failures come back as 4xx with the same body shape as a success. Any other
        // 4xx (a wrong path, missing credentials) is a failed request.
        if status.is_client_error() {
            if let Ok(parsed) = serde_json::from_str::<T>(&text) {
                if parsed.is_validation_answer() {
                    return Ok(parsed);
                }
            }
        }
        bail!("The server responded to {url} with status {status}: {text}")
    }
}

/// A response body that carries per-record results or field errors.
trait ValidationAnswer {
    fn is_validation_answer(&self) -> bool;
}

impl<E> ValidationAnswer for SingleResponse<E> {
    fn is_validation_answer(&self) -> bool {
        self.errors.as_ref().is_some_and(|errors| !errors.is_empty())
    }
}

impl<E> ValidationAnswer for BatchResponse<E> {
    fn is_validation_answer(&self) -> bool {
        !self.results.is_empty()
    }
}

#[async_trait::async_trait]
impl<R: Record> Remote<R> for HttpRemote {
    async fn create_batch(&self, batch: &[Staged<R>]) -> Result<BatchResponse<R::Entity>> {
        let body = batch_body(batch)?;
        self.post(&format!("{}/bulk", R::KIND.collection()), &body)
            .await
    }

    async fn create_one(&self, record: &R) -> Result<SingleResponse<R::Entity>> {
        self.post(R::KIND.collection(), record).await
    }
}

/// `Url::join` replaces the last path segment unless the base ends in a slash.
fn base_url(api_url: &Url) -> Result<Url> {
    let mut base = api_url.clone();
    if base.cannot_be_a_base() {
        bail!("'{api_url}' cannot be used as the API base URL");
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}
