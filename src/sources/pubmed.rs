//! Document-index client (PubMed-style search results page).

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::debug;

use super::{
    build_client, get_page, join_url, query_term, some_if_nonempty, text_of, truncate_snapshot,
    FetchError, PartialRecord, SourceClient,
};
use crate::config::FetchConfig;
use crate::models::Publication;

pub const SOURCE_NAME: &str = "pubmed";

pub struct PubMedClient {
    client: reqwest::Client,
    base_url: String,
    max_results: usize,
    snapshot_limit: usize,
}

impl PubMedClient {
    pub fn new(base_url: &str, fetch: &FetchConfig) -> Self {
        Self {
            client: build_client(fetch),
            base_url: base_url.trim_end_matches('/').to_string(),
            max_results: fetch.max_results,
            snapshot_limit: fetch.snapshot_limit,
        }
    }

    fn extract_publications(&self, body: &str) -> Vec<Publication> {
        let document = Html::parse_document(body);
        let result_selector = Selector::parse(".docsum-content").unwrap();
        let title_selector = Selector::parse(".docsum-title").unwrap();
        let authors_selector = Selector::parse(".docsum-authors").unwrap();
        let journal_selector = Selector::parse(".docsum-journal").unwrap();

        let mut publications = Vec::new();
        for result in document.select(&result_selector).take(self.max_results) {
            let Some(title_element) = result.select(&title_selector).next() else {
                continue;
            };

            let authors = result
                .select(&authors_selector)
                .next()
                .map(|e| text_of(&e))
                .unwrap_or_default();
            let journal = result
                .select(&journal_selector)
                .next()
                .map(|e| text_of(&e))
                .unwrap_or_default();
            let url = title_element
                .value()
                .attr("href")
                .map(|href| join_url(&self.base_url, href))
                .unwrap_or_default();

            publications.push(Publication {
                title: text_of(&title_element),
                authors: some_if_nonempty(authors),
                journal: some_if_nonempty(journal),
                year: None,
                url: some_if_nonempty(url),
            });
        }
        publications
    }
}

#[async_trait]
impl SourceClient for PubMedClient {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch(
        &self,
        name: &str,
        specialization: Option<&str>,
    ) -> Result<PartialRecord, FetchError> {
        let search_url = format!("{}/?term={}", self.base_url, query_term(name, specialization));
        let body = get_page(&self.client, SOURCE_NAME, &search_url).await?;

        let mut record = PartialRecord::new(SOURCE_NAME, &search_url);
        record.publications = self.extract_publications(&body);
        record.raw_snapshot = truncate_snapshot(&body, self.snapshot_limit);

        debug!(count = record.publications.len(), "pubmed extraction complete");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r#"<html><body>
        <div class="docsum-content">
            <a class="docsum-title" href="/33445566/">CRISPR screening in cardiomyocytes.</a>
            <span class="docsum-authors">Doe J, Smith A.</span>
            <span class="docsum-journal">Nat Med. 2021.</span>
        </div>
        <div class="docsum-content">
            <a class="docsum-title" href="/77889900/">Sparse annotation paper.</a>
        </div>
        </body></html>"#;

    fn client(base_url: &str) -> PubMedClient {
        PubMedClient::new(base_url, &FetchConfig::default())
    }

    #[tokio::test]
    async fn extracts_leading_publications() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/?term=Jane+Doe")
            .with_status(200)
            .with_body(RESULTS_PAGE)
            .create_async()
            .await;

        let record = client(&server.url()).fetch("Jane Doe", None).await.unwrap();

        assert_eq!(record.publications.len(), 2);
        let first = &record.publications[0];
        assert_eq!(first.title, "CRISPR screening in cardiomyocytes.");
        assert_eq!(first.authors.as_deref(), Some("Doe J, Smith A."));
        assert_eq!(first.journal.as_deref(), Some("Nat Med. 2021."));
        assert_eq!(
            first.url.as_deref(),
            Some(format!("{}/33445566/", server.url()).as_str())
        );

        // Missing sub-fields become None rather than failing the item.
        let second = &record.publications[1];
        assert!(second.authors.is_none());
        assert!(second.journal.is_none());
    }

    #[tokio::test]
    async fn rate_limit_is_distinguished() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/?term=Jane+Doe")
            .with_status(429)
            .create_async()
            .await;

        let error = client(&server.url()).fetch("Jane Doe", None).await.unwrap_err();
        assert!(error.is_rate_limited());
        assert_eq!(error.source(), "pubmed");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/?term=Jane+Doe")
            .with_status(503)
            .create_async()
            .await;

        let error = client(&server.url()).fetch("Jane Doe", None).await.unwrap_err();
        assert!(matches!(error, FetchError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn snapshot_is_capped() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/?term=Jane+Doe")
            .with_status(200)
            .with_body("x".repeat(500))
            .create_async()
            .await;

        let fetch = FetchConfig {
            snapshot_limit: 100,
            ..FetchConfig::default()
        };
        let client = PubMedClient::new(&server.url(), &fetch);
        let record = client.fetch("Jane Doe", None).await.unwrap();
        assert_eq!(record.raw_snapshot.chars().count(), 100);
    }
}
