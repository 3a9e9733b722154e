//! Remote tabular store over HTTP.
//!
//! Each collection is one resource at `{base_url}/collections/{name}`:
//! `GET` returns the JSON array of records (404 when never written) and `PUT`
//! replaces it. Changes become visible to other sessions once the `PUT`
//! round trip completes.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use tracing::debug;

use super::{unreadable, BackendStore, ReadOutcome};
use crate::collection::validate_name;
use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::record::Record;

const STORE_NAME: &str = "remote";

/// HTTP client for a remote collection API.
#[derive(Debug)]
pub struct RemoteStore {
    base_url: String,
    client: Client,
}

impl RemoteStore {
    /// Create a remote store from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is missing, the API key is not a
    /// valid header value, or the HTTP client cannot be built.
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .ok_or_else(|| Error::config("store.remote.base_url is required"))?
            .trim_end_matches('/')
            .to_string();

        let mut headers = header::HeaderMap::new();
        if let Some(api_key) = &config.api_key {
            let value = header::HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|_| Error::config("store.remote.api_key is not a valid header value"))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .build()?;

        Ok(Self { base_url, client })
    }

    /// URL of the resource backing a collection.
    #[must_use]
    pub fn url_for(&self, collection: &str) -> String {
        format!("{}/collections/{collection}", self.base_url)
    }
}

#[async_trait]
impl BackendStore for RemoteStore {
    fn name(&self) -> &'static str {
        STORE_NAME
    }

    async fn read(&self, collection: &str) -> ReadOutcome {
        if let Err(e) = validate_name(collection) {
            return unreadable(STORE_NAME, collection, e);
        }
        let url = self.url_for(collection);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => return unreadable(STORE_NAME, collection, e),
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("No remote collection at {url}");
            return ReadOutcome::Missing;
        }
        if !status.is_success() {
            return unreadable(STORE_NAME, collection, format!("server returned {status}"));
        }

        match response.json::<Vec<Record>>().await {
            Ok(records) => {
                debug!("Fetched {} records from {url}", records.len());
                ReadOutcome::Loaded(records)
            }
            Err(e) => unreadable(STORE_NAME, collection, e),
        }
    }

    async fn write(&self, collection: &str, records: &[Record]) -> Result<()> {
        validate_name(collection)?;
        let url = self.url_for(collection);

        let response = self
            .client
            .put(&url)
            .json(records)
            .send()
            .await
            .map_err(|e| Error::store_write(collection, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::store_write(
                collection,
                format!("server returned {status}: {body}"),
            ));
        }

        debug!("Replaced {} records at {url}", records.len());
        Ok(())
    }
}
