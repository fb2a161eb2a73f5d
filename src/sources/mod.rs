//! Source clients
//!
//! Each client queries one public endpoint and extracts a partial structured
//! record for a researcher name. Four extractors are built in:
//!
//! - `pubmed`: publication summaries from a document index
//! - `researchgate`: profile page with affiliations and interests
//! - `google_scholar`: publications plus a citation count
//! - `clinical_trials`: registered trials
//!
//! Scraping public result pages is best effort. Any failure, including a
//! rate-limit response, is returned as a `FetchError` and the caller treats
//! the source as having contributed nothing.

pub mod pubmed;
pub mod researchgate;
pub mod scholar;
pub mod trials;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scraper::ElementRef;
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::config::FetchConfig;
use crate::models::{ClinicalTrial, Publication};
use crate::utils::retry::with_retry;

pub use pubmed::PubMedClient;
pub use researchgate::ResearchGateClient;
pub use scholar::ScholarClient;
pub use trials::ClinicalTrialsClient;

/// Browser-like user agent; several of these endpoints refuse the default
/// reqwest one outright.
pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// One source's failure. Never escapes the aggregation boundary; the engine
/// logs it and moves on. Rate limiting gets its own variant so callers can
/// tell "try later" apart from a hard failure.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{src}: rate limit exceeded, try again later")]
    RateLimited { src: String },

    #[error("{src}: unexpected status {status}")]
    Status { src: String, status: u16 },

    #[error("{src}: request failed: {message}")]
    Request { src: String, message: String },

    #[error("{src}: {message}")]
    Parse { src: String, message: String },
}

impl FetchError {
    pub fn source(&self) -> &str {
        match self {
            FetchError::RateLimited { src }
            | FetchError::Status { src, .. }
            | FetchError::Request { src, .. }
            | FetchError::Parse { src, .. } => src,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited { .. })
    }
}

/// Partial structured record extracted from one source.
#[derive(Debug, Clone, Default)]
pub struct PartialRecord {
    pub source: String,
    pub url: String,
    pub basic_info: HashMap<String, String>,
    pub publications: Vec<Publication>,
    pub clinical_trials: Vec<ClinicalTrial>,
    pub research_interests: Vec<String>,
    pub affiliations: Vec<String>,
    pub education: Vec<String>,
    pub collaborators: Vec<String>,
    pub citations: HashMap<String, i64>,
    /// Response body truncated for diagnostics, never used in merging.
    pub raw_snapshot: String,
}

impl PartialRecord {
    pub fn new(source: &str, url: impl Into<String>) -> Self {
        Self {
            source: source.to_string(),
            url: url.into(),
            ..Default::default()
        }
    }

    /// Whether this record counts as a web hit for the fallback policy.
    pub fn has_content(&self) -> bool {
        !self.publications.is_empty()
            || !self.affiliations.is_empty()
            || !self.research_interests.is_empty()
            || !self.basic_info.is_empty()
    }
}

#[async_trait]
pub trait SourceClient: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(
        &self,
        name: &str,
        specialization: Option<&str>,
    ) -> Result<PartialRecord, FetchError>;
}

/// Resolve a configured source name to its client, once at configuration
/// time. Names without a registered extractor are accepted but contribute
/// nothing to a search.
pub fn resolve(name: &str, base_url: &str, fetch: &FetchConfig) -> Option<Arc<dyn SourceClient>> {
    match name {
        "pubmed" => Some(Arc::new(PubMedClient::new(base_url, fetch))),
        "researchgate" => Some(Arc::new(ResearchGateClient::new(base_url, fetch))),
        "google_scholar" => Some(Arc::new(ScholarClient::new(base_url, fetch))),
        "clinical_trials" => Some(Arc::new(ClinicalTrialsClient::new(base_url, fetch))),
        other => {
            warn!(source = other, "no extractor registered for source, it will contribute nothing");
            None
        }
    }
}

/// Wraps a source client with bounded retry-with-delay. Source fetches are
/// the only retried operation in the system.
pub struct RetryingClient {
    inner: Arc<dyn SourceClient>,
    max_retries: u32,
    delay: Duration,
}

impl RetryingClient {
    pub fn new(inner: Arc<dyn SourceClient>, max_retries: u32, delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            delay,
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// First success wins; otherwise the last error, which carries the
    /// source name, is returned.
    pub async fn fetch(
        &self,
        name: &str,
        specialization: Option<&str>,
    ) -> Result<PartialRecord, FetchError> {
        with_retry(
            || self.inner.fetch(name, specialization),
            self.max_retries,
            self.delay,
        )
        .await
    }
}

pub(crate) fn build_client(fetch: &FetchConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(fetch.timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .expect("failed to build http client")
}

/// GET a page, mapping 429 and other non-2xx statuses to their errors.
pub(crate) async fn get_page(
    client: &reqwest::Client,
    source: &str,
    url: &str,
) -> Result<String, FetchError> {
    let response = client.get(url).send().await.map_err(|e| FetchError::Request {
        src: source.to_string(),
        message: e.to_string(),
    })?;

    let status = response.status();
    if status.as_u16() == 429 {
        return Err(FetchError::RateLimited {
            src: source.to_string(),
        });
    }
    if !status.is_success() {
        return Err(FetchError::Status {
            src: source.to_string(),
            status: status.as_u16(),
        });
    }

    response.text().await.map_err(|e| FetchError::Request {
        src: source.to_string(),
        message: e.to_string(),
    })
}

/// Query term with the optional specialization appended, spaces as `+`.
pub(crate) fn query_term(name: &str, specialization: Option<&str>) -> String {
    let term = match specialization {
        Some(specialization) => format!("{} {}", name, specialization),
        None => name.to_string(),
    };
    term.replace(' ', "+")
}

/// Char-safe truncation of a response body for the diagnostic snapshot.
pub(crate) fn truncate_snapshot(body: &str, limit: usize) -> String {
    body.chars().take(limit).collect()
}

pub(crate) fn text_of(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

pub(crate) fn some_if_nonempty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Join a possibly-relative href against a base URL. Absolute hrefs pass
/// through unchanged.
pub(crate) fn join_url(base: &str, href: &str) -> String {
    Url::parse(base)
        .ok()
        .and_then(|base| base.join(href).ok())
        .map(|joined| joined.to_string())
        .unwrap_or_else(|| href.to_string())
}
