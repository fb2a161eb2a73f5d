//! Institutional-network client (ResearchGate-style profile pages).
//!
//! Two requests: the researcher search page locates a profile link, then the
//! profile page itself yields affiliations, interests and publications.

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::debug;

use super::{
    build_client, get_page, join_url, some_if_nonempty, text_of, truncate_snapshot, FetchError,
    PartialRecord, SourceClient,
};
use crate::config::FetchConfig;
use crate::models::Publication;

pub const SOURCE_NAME: &str = "researchgate";

pub struct ResearchGateClient {
    client: reqwest::Client,
    base_url: String,
    max_results: usize,
    snapshot_limit: usize,
}

struct ProfileParts {
    full_name: Option<String>,
    affiliations: Vec<String>,
    research_interests: Vec<String>,
    publications: Vec<Publication>,
}

impl ResearchGateClient {
    pub fn new(base_url: &str, fetch: &FetchConfig) -> Self {
        Self {
            client: build_client(fetch),
            base_url: base_url.trim_end_matches('/').to_string(),
            max_results: fetch.max_results,
            snapshot_limit: fetch.snapshot_limit,
        }
    }

    /// First result card whose link text contains the queried name.
    fn find_profile_href(body: &str, name: &str) -> Option<String> {
        let document = Html::parse_document(body);
        let card_selector = Selector::parse(".nova-legacy-c-card__body").unwrap();
        let link_selector = Selector::parse("a.nova-legacy-e-link").unwrap();

        let needle = name.to_lowercase();
        for card in document.select(&card_selector) {
            for link in card.select(&link_selector) {
                if text_of(&link).to_lowercase().contains(&needle) {
                    if let Some(href) = link.value().attr("href") {
                        return Some(href.to_string());
                    }
                }
            }
        }
        None
    }

    fn extract_profile(&self, body: &str) -> ProfileParts {
        let document = Html::parse_document(body);
        let name_selector = Selector::parse("h1").unwrap();
        let affiliation_selector = Selector::parse(".institution-name").unwrap();
        let interest_selector = Selector::parse(".research-interest-item").unwrap();
        let publication_selector = Selector::parse(".research-item-title a").unwrap();

        let full_name = document
            .select(&name_selector)
            .next()
            .map(|e| text_of(&e))
            .and_then(some_if_nonempty);

        let affiliations = document
            .select(&affiliation_selector)
            .map(|e| text_of(&e))
            .filter(|text| !text.is_empty())
            .collect();

        let research_interests = document
            .select(&interest_selector)
            .map(|e| text_of(&e))
            .filter(|text| !text.is_empty())
            .collect();

        let publications = document
            .select(&publication_selector)
            .take(self.max_results)
            .map(|link| Publication {
                title: text_of(&link),
                authors: None,
                journal: None,
                year: None,
                url: link
                    .value()
                    .attr("href")
                    .map(|href| join_url(&self.base_url, href)),
            })
            .collect();

        ProfileParts {
            full_name,
            affiliations,
            research_interests,
            publications,
        }
    }
}

#[async_trait]
impl SourceClient for ResearchGateClient {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch(
        &self,
        name: &str,
        _specialization: Option<&str>,
    ) -> Result<PartialRecord, FetchError> {
        let search_url = format!(
            "{}/search/researcher?q={}",
            self.base_url,
            name.replace(' ', "+")
        );
        let search_body = get_page(&self.client, SOURCE_NAME, &search_url).await?;

        let href = Self::find_profile_href(&search_body, name).ok_or_else(|| {
            FetchError::Parse {
                src: SOURCE_NAME.to_string(),
                message: "researcher profile not found".to_string(),
            }
        })?;

        let profile_url = join_url(&self.base_url, &href);
        let profile_body = get_page(&self.client, SOURCE_NAME, &profile_url).await?;
        let parts = self.extract_profile(&profile_body);

        let mut record = PartialRecord::new(SOURCE_NAME, &profile_url);
        if let Some(full_name) = parts.full_name {
            record.basic_info.insert("full_name".to_string(), full_name);
        }
        record.affiliations = parts.affiliations;
        record.research_interests = parts.research_interests;
        record.publications = parts.publications;
        record.raw_snapshot = truncate_snapshot(&profile_body, self.snapshot_limit);

        debug!(
            affiliations = record.affiliations.len(),
            interests = record.research_interests.len(),
            publications = record.publications.len(),
            "researchgate extraction complete"
        );
        Ok(record)
    }
}
