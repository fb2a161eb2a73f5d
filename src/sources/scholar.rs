//! Citation-index client (Google Scholar-style result pages).

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::debug;

use super::{
    build_client, get_page, query_term, some_if_nonempty, text_of, truncate_snapshot, FetchError,
    PartialRecord, SourceClient,
};
use crate::config::FetchConfig;
use crate::models::Publication;

pub const SOURCE_NAME: &str = "google_scholar";

pub struct ScholarClient {
    client: reqwest::Client,
    base_url: String,
    max_results: usize,
    snapshot_limit: usize,
}

impl ScholarClient {
    pub fn new(base_url: &str, fetch: &FetchConfig) -> Self {
        Self {
            client: build_client(fetch),
            base_url: base_url.trim_end_matches('/').to_string(),
            max_results: fetch.max_results,
            snapshot_limit: fetch.snapshot_limit,
        }
    }

    fn extract(&self, body: &str) -> (Vec<Publication>, Option<i64>) {
        let document = Html::parse_document(body);
        let result_selector = Selector::parse(".gs_ri").unwrap();
        let title_selector = Selector::parse(".gs_rt").unwrap();
        let authors_selector = Selector::parse(".gs_a").unwrap();
        let link_selector = Selector::parse("a").unwrap();
        let citations_selector = Selector::parse(".gs_rnd").unwrap();

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
            let url = title_element
                .select(&link_selector)
                .next()
                .and_then(|link| link.value().attr("href"))
                .map(str::to_string);

            publications.push(Publication {
                title: text_of(&title_element),
                authors: some_if_nonempty(authors),
                journal: None,
                year: None,
                url,
            });
        }

        let total_citations = document
            .select(&citations_selector)
            .next()
            .and_then(|e| parse_cited_by(&text_of(&e)));

        (publications, total_citations)
    }
}

/// Pull the count out of a "Cited by 412" fragment.
fn parse_cited_by(text: &str) -> Option<i64> {
    let rest = text.split("Cited by ").nth(1)?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[async_trait]
impl SourceClient for ScholarClient {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch(
        &self,
        name: &str,
        specialization: Option<&str>,
    ) -> Result<PartialRecord, FetchError> {
        let search_url = format!(
            "{}/scholar?q={}",
            self.base_url,
            query_term(name, specialization)
        );
        let body = get_page(&self.client, SOURCE_NAME, &search_url).await?;

        let (publications, total_citations) = self.extract(&body);

        let mut record = PartialRecord::new(SOURCE_NAME, &search_url);
        record.publications = publications;
        if let Some(total) = total_citations {
            record.citations.insert("total".to_string(), total);
        }
        record.raw_snapshot = truncate_snapshot(&body, self.snapshot_limit);

        debug!(
            count = record.publications.len(),
            cited_by = total_citations,
            "scholar extraction complete"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r#"<html><body>
        <div class="gs_ri">
            <h3 class="gs_rt"><a href="https://example.org/ecg-paper">Deep learning for ECG interpretation</a></h3>
            <div class="gs_a">J Doe, A Smith - Nature Medicine, 2020</div>
            <div class="gs_rs">We trained a model on twelve-lead traces...</div>
        </div>
        <div class="gs_rnd">Cited by 412</div>
        </body></html>"#;

    #[test]
    fn parses_cited_by_fragments() {
        assert_eq!(parse_cited_by("Cited by 412"), Some(412));
        assert_eq!(parse_cited_by("Related articles"), None);
        assert_eq!(parse_cited_by("Cited by many"), None);
    }

    #[tokio::test]
    async fn extracts_publications_and_citations() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/scholar?q=Jane+Doe")
            .with_status(200)
            .with_body(RESULTS_PAGE)
            .create_async()
            .await;

        let client = ScholarClient::new(&server.url(), &FetchConfig::default());
        let record = client.fetch("Jane Doe", None).await.unwrap();

        assert_eq!(record.publications.len(), 1);
        let publication = &record.publications[0];
        assert_eq!(publication.title, "Deep learning for ECG interpretation");
        assert_eq!(
            publication.authors.as_deref(),
            Some("J Doe, A Smith - Nature Medicine, 2020")
        );
        assert_eq!(publication.url.as_deref(), Some("https://example.org/ecg-paper"));
        assert_eq!(record.citations.get("total"), Some(&412));
    }
}
