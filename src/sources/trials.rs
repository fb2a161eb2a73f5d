//! Trials-registry client (ClinicalTrials.gov-style search results).

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::debug;

use super::{
    build_client, get_page, join_url, some_if_nonempty, text_of, truncate_snapshot, FetchError,
    PartialRecord, SourceClient,
};
use crate::config::FetchConfig;
use crate::models::ClinicalTrial;

pub const SOURCE_NAME: &str = "clinical_trials";

pub struct ClinicalTrialsClient {
    client: reqwest::Client,
    base_url: String,
    max_results: usize,
    snapshot_limit: usize,
}

impl ClinicalTrialsClient {
    pub fn new(base_url: &str, fetch: &FetchConfig) -> Self {
        Self {
            client: build_client(fetch),
            base_url: base_url.trim_end_matches('/').to_string(),
            max_results: fetch.max_results,
            snapshot_limit: fetch.snapshot_limit,
        }
    }

    fn extract_trials(&self, body: &str) -> Vec<ClinicalTrial> {
        let document = Html::parse_document(body);
        let result_selector = Selector::parse(".ct-search-result").unwrap();
        let title_selector = Selector::parse(".ct-title").unwrap();
        let status_selector = Selector::parse(".ct-status").unwrap();
        let condition_selector = Selector::parse(".ct-condition").unwrap();
        let link_selector = Selector::parse("a").unwrap();

        let mut trials = Vec::new();
        for result in document.select(&result_selector).take(self.max_results) {
            let Some(title_element) = result.select(&title_selector).next() else {
                continue;
            };

            let status = result
                .select(&status_selector)
                .next()
                .map(|e| text_of(&e))
                .unwrap_or_default();
            let condition = result
                .select(&condition_selector)
                .next()
                .map(|e| text_of(&e))
                .unwrap_or_default();
            let url = title_element
                .select(&link_selector)
                .next()
                .and_then(|link| link.value().attr("href"))
                .map(|href| join_url(&self.base_url, href));

            trials.push(ClinicalTrial {
                title: text_of(&title_element),
                status: some_if_nonempty(status),
                condition: some_if_nonempty(condition),
                url,
            });
        }
        trials
    }
}

#[async_trait]
impl SourceClient for ClinicalTrialsClient {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch(
        &self,
        name: &str,
        _specialization: Option<&str>,
    ) -> Result<PartialRecord, FetchError> {
        let search_url = format!(
            "{}/search?term={}&recrs=e&type=Intr",
            self.base_url,
            name.replace(' ', "+")
        );
        let body = get_page(&self.client, SOURCE_NAME, &search_url).await?;

        let mut record = PartialRecord::new(SOURCE_NAME, &search_url);
        record.clinical_trials = self.extract_trials(&body);
        record.raw_snapshot = truncate_snapshot(&body, self.snapshot_limit);

        debug!(
            count = record.clinical_trials.len(),
            "clinical trials extraction complete"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r#"<html><body>
        <div class="ct-search-result">
            <div class="ct-title"><a href="/study/NCT04956640">Remote pacing follow-up</a></div>
            <span class="ct-status">Recruiting</span>
            <span class="ct-condition">Heart Failure</span>
        </div>
        <div class="ct-search-result">
            <div class="ct-title">Untitled registry entry</div>
        </div>
        </body></html>"#;

    #[tokio::test]
    async fn extracts_trials() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock(
                "GET",
                mockito::Matcher::Regex(r"^/search\?term=Jane\+Doe.*".to_string()),
            )
            .with_status(200)
            .with_body(RESULTS_PAGE)
            .create_async()
            .await;

        let client = ClinicalTrialsClient::new(&server.url(), &FetchConfig::default());
        let record = client.fetch("Jane Doe", None).await.unwrap();

        assert_eq!(record.clinical_trials.len(), 2);
        let first = &record.clinical_trials[0];
        assert_eq!(first.title, "Remote pacing follow-up");
        assert_eq!(first.status.as_deref(), Some("Recruiting"));
        assert_eq!(first.condition.as_deref(), Some("Heart Failure"));
        assert_eq!(
            first.url.as_deref(),
            Some(format!("{}/study/NCT04956640", server.url()).as_str())
        );

        let second = &record.clinical_trials[1];
        assert!(second.status.is_none());
        assert!(second.url.is_none());

        // Trials alone do not count as a web hit for the fallback policy.
        assert!(!record.has_content());
    }
}
