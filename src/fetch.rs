//! Retrieval of search pages

use crate::{config::RetryPolicy, Result};
use anyhow::Context;
use reqwest::{header, Response, StatusCode};
use thiserror::Error;

/// Something that can provide the HTML of search pages
#[allow(async_fn_in_trait)]
pub trait PageSource {
    /// Fetch the page at `path_and_query`, relative to the search site
    async fn fetch_page(&self, path_and_query: &str) -> Result<String, FetchError>;
}

/// Reasons why a search page could not be fetched
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request did not complete within the configured timeout
    #[error("request to {url} timed out")]
    Timeout { url: Box<str> },

    /// The request failed at the network or protocol level
    #[error("request to {url} failed")]
    Transport {
        url: Box<str>,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with an error status
    #[error("{url} answered with HTTP status {status}")]
    Status { url: Box<str>, status: StatusCode },

    /// Every allowed attempt failed with a transient error
    #[error("giving up on {url} after {attempts} attempts")]
    RetriesExhausted {
        url: Box<str>,
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}
//
impl FetchError {
    /// Truth that trying again later might succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport { .. } => true,
            Self::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            Self::RetriesExhausted { .. } => false,
        }
    }

    /// Classify a reqwest error
    fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else if let Some(status) = source.status() {
            Self::Status {
                url: url.into(),
                status,
            }
        } else {
            Self::Transport {
                url: url.into(),
                source,
            }
        }
    }
}

/// HTTP client for Google Scholar search pages
#[derive(Clone, Debug)]
pub struct ScholarClient {
    /// Underlying HTTP client, with the per-request timeout baked in
    client: reqwest::Client,

    /// Search site, without trailing slash
    base_url: Box<str>,

    /// How failed requests are retried
    retry: RetryPolicy,
}
//
impl ScholarClient {
    /// Set up a client for the search site at `base_url`
    pub fn new(base_url: &str, retry: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(retry.timeout)
            .user_agent(USER_AGENT)
            .default_headers(
                [(header::ACCEPT_LANGUAGE, header::HeaderValue::from_static("en"))]
                    .into_iter()
                    .collect(),
            )
            .build()
            .context("setting up the HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').into(),
            retry,
        })
    }

    /// Make a single attempt at fetching a page
    async fn try_fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))
    }
}
//
impl PageSource for ScholarClient {
    async fn fetch_page(&self, path_and_query: &str) -> Result<String, FetchError> {
        let url = format!("{}{path_and_query}", self.base_url);
        let max_attempts = self.retry.max_attempts.get();
        let mut attempt = 1;
        loop {
            log::debug!("Fetching {url} (attempt {attempt}/{max_attempts})");
            let error = match self.try_fetch(&url).await {
                Ok(page) => return Ok(page),
                Err(error) => error,
            };
            if !error.is_transient() {
                return Err(error);
            }
            if attempt >= max_attempts {
                return Err(FetchError::RetriesExhausted {
                    url: url.into(),
                    attempts: attempt,
                    last: Box::new(error),
                });
            }
            let backoff = self.retry.backoff(attempt);
            log::warn!("Attempt {attempt} failed ({error}), retrying in {backoff:?}");
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

/// User agent announced to the search site
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
