//! Profile aggregation engine
//!
//! Fans out to the configured source clients concurrently, merges partial
//! records into one canonical profile, deduplicates, and applies the layered
//! fallback policy: dataset row, then web sources, then generation when both
//! came up empty, or enrichment when either produced data.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::agents::answer::AnswerAgent;
use crate::agents::fallback::{Enrichment, FallbackAgent};
use crate::config::Config;
use crate::dataset::ResearcherTable;
use crate::llm::provider::{resolve_backend, GenerativeBackend};
use crate::models::Profile;
use crate::report;
use crate::sources::{self, PartialRecord, RetryingClient, SourceClient};
use crate::types::{AgentError, AgentResult, LlmError};

pub struct ResearcherAgent {
    config: Config,
    sources: Vec<Arc<dyn SourceClient>>,
    table: Option<ResearcherTable>,
    profiles: HashMap<String, Profile>,
    backend: Option<Arc<dyn GenerativeBackend>>,
}

impl ResearcherAgent {
    pub fn new(config: Config) -> Self {
        let sources = Self::resolve_sources(&config);
        let backend = resolve_backend(&config.llm);
        if backend.is_none() {
            info!("no generative backend configured, fallback and enrichment are disabled");
        }
        Self {
            config,
            sources,
            table: None,
            profiles: HashMap::new(),
            backend,
        }
    }

    fn resolve_sources(config: &Config) -> Vec<Arc<dyn SourceClient>> {
        config
            .sources
            .endpoints
            .iter()
            .filter_map(|(name, base_url)| sources::resolve(name, base_url, &config.fetch))
            .collect()
    }

    /// Replace the resolved source clients. A seam for embedders with custom
    /// sources and for tests.
    pub fn with_sources(mut self, sources: Vec<Arc<dyn SourceClient>>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn GenerativeBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_table(mut self, table: ResearcherTable) -> Self {
        self.table = Some(table);
        self
    }

    /// Load the researcher dataset. On failure the engine keeps working
    /// without table data.
    pub fn load_table(&mut self, path: &Path) -> AgentResult<usize> {
        let table = ResearcherTable::load(path)?;
        let rows = table.len();
        self.table = Some(table);
        Ok(rows)
    }

    /// Register or replace a source endpoint at runtime. Names without a
    /// built-in extractor are accepted but contribute nothing.
    pub fn add_source(&mut self, name: &str, base_url: &str) {
        self.config
            .sources
            .endpoints
            .insert(name.to_string(), base_url.to_string());
        self.sources = Self::resolve_sources(&self.config);
    }

    /// Drop a source endpoint. Searches already in flight keep their
    /// snapshot of the old list.
    pub fn remove_source(&mut self, name: &str) {
        self.config.sources.endpoints.remove(name);
        self.sources = Self::resolve_sources(&self.config);
    }

    /// Names of the sources that resolved to an extractor.
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|source| source.name()).collect()
    }

    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    pub fn profile_names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }

    pub fn clear(&mut self) {
        self.profiles.clear();
    }

    /// Aggregate everything known about a researcher into one profile and
    /// store it under the exact input name.
    pub async fn search(
        &mut self,
        name: &str,
        specialization: Option<&str>,
    ) -> AgentResult<Profile> {
        if name.trim().is_empty() {
            return Err(AgentError::InvalidInput(
                "researcher name must be a non-empty string".to_string(),
            ));
        }

        info!(name, ?specialization, "searching researcher");
        let mut profile = Profile::new(name, specialization);

        let mut csv_hit = false;
        if let Some(table) = &self.table {
            if let Some(record) = table.lookup(name) {
                info!(name, "dataset row matched");
                record.apply_to(&mut profile);
                csv_hit = true;
            }
        }

        // Snapshot the source list so configuration changes cannot race a
        // search already in flight.
        let clients: Vec<RetryingClient> = self
            .sources
            .iter()
            .cloned()
            .map(|client| {
                RetryingClient::new(
                    client,
                    self.config.fetch.max_retries,
                    Duration::from_millis(self.config.fetch.retry_delay_ms),
                )
            })
            .collect();

        // Every source runs to completion before merging; a slow or retrying
        // source prolongs the call rather than being dropped.
        let outcomes = stream::iter(clients.iter())
            .map(|client| async move {
                (
                    client.name().to_string(),
                    client.fetch(name, specialization).await,
                )
            })
            .buffer_unordered(self.config.fetch.concurrency)
            .collect::<Vec<_>>()
            .await;

        // Merge in completion order. A later-completing source wins on
        // colliding basic_info and citation keys.
        let mut web_hit = false;
        for (source, outcome) in outcomes {
            match outcome {
                Ok(partial) => {
                    if merge_partial(&mut profile, partial) {
                        web_hit = true;
                    }
                }
                Err(error) => {
                    warn!(
                        source = %source,
                        rate_limited = error.is_rate_limited(),
                        error = %error,
                        "source contributed nothing"
                    );
                }
            }
        }

        profile.dedup_lists();

        match &self.backend {
            Some(backend) if !csv_hit && !web_hit => {
                info!(name, "no dataset or web data, generating profile");
                let fallback = FallbackAgent::new(backend.clone(), self.config.llm.model.clone());
                match fallback.generate(name, specialization).await {
                    Ok(generated) => {
                        generated.fill_profile(&mut profile);
                        profile.ai_generated = true;
                    }
                    Err(error) => {
                        warn!(error = %error, "generative fallback failed");
                        profile.summary = Some(placeholder_summary(&error));
                    }
                }
            }
            Some(backend) => {
                let fallback = FallbackAgent::new(backend.clone(), self.config.llm.model.clone());
                match fallback.enrich(&profile).await {
                    Ok(enrichment) => {
                        apply_enrichment(&mut profile, enrichment);
                        profile.ai_enhanced = true;
                    }
                    Err(error) => {
                        warn!(error = %error, "enrichment failed");
                        if profile.summary.is_none() {
                            profile.summary = Some(placeholder_summary(&error));
                        }
                    }
                }
            }
            None => {
                debug!("no generative backend, returning the profile as collected");
            }
        }

        self.profiles.insert(name.to_string(), profile.clone());
        Ok(profile)
    }

    /// Search ignoring any loaded dataset for this one call.
    pub async fn search_without_table(
        &mut self,
        name: &str,
        specialization: Option<&str>,
    ) -> AgentResult<Profile> {
        let table = self.table.take();
        let result = self.search(name, specialization).await;
        self.table = table;
        result
    }

    /// Answer a free-text question, using a stored profile as context when
    /// one is available for `researcher_name`.
    pub async fn ask(
        &mut self,
        question: &str,
        researcher_name: Option<&str>,
    ) -> AgentResult<String> {
        let backend = self.backend.clone().ok_or(AgentError::MissingApiKey)?;
        let answerer = AnswerAgent::new(backend, self.config.llm.model.clone());
        answerer
            .ask(question, researcher_name, &mut self.profiles)
            .await
    }

    /// Formatted report for a previously searched researcher.
    pub fn report(&self, name: &str) -> AgentResult<String> {
        let profile = self
            .profiles
            .get(name)
            .ok_or_else(|| AgentError::NotFound(name.to_string()))?;
        Ok(report::render(profile))
    }
}

/// Fold one source's record into the profile. Returns whether the source
/// counts as a web hit.
fn merge_partial(profile: &mut Profile, partial: PartialRecord) -> bool {
    let contributed = partial.has_content();

    profile
        .source_urls
        .insert(partial.source.clone(), partial.url);
    profile.raw_data.insert(partial.source, partial.raw_snapshot);

    profile.publications.extend(partial.publications);
    profile.clinical_trials.extend(partial.clinical_trials);
    profile.research_interests.extend(partial.research_interests);
    profile.affiliations.extend(partial.affiliations);
    profile.education.extend(partial.education);
    profile.collaborators.extend(partial.collaborators);
    profile.basic_info.extend(partial.basic_info);
    profile.citations.extend(partial.citations);

    contributed
}

fn apply_enrichment(profile: &mut Profile, enrichment: Enrichment) {
    if enrichment.summary.is_some() {
        profile.summary = enrichment.summary;
    }
    if enrichment.key_contributions.is_some() {
        profile.key_contributions = enrichment.key_contributions;
    }
    if enrichment.additional_insights.is_some() {
        profile.additional_insights = enrichment.additional_insights;
    }
    if enrichment.research_network.is_some() {
        profile.research_network = enrichment.research_network;
    }

    // Education is replaced only when the enrichment knows more.
    if !enrichment.education.is_empty()
        && (profile.education.is_empty()
            || enrichment.education.len() > profile.education.len())
    {
        profile.education = enrichment.education;
    }

    // Corrected URLs are matched back by title substring; first match wins.
    for corrected in enrichment.publication_urls {
        if corrected.url.is_empty() {
            continue;
        }
        if let Some(publication) = profile
            .publications
            .iter_mut()
            .find(|publication| publication.title.contains(&corrected.title))
        {
            publication.url = Some(corrected.url);
        }
    }
    for corrected in enrichment.clinical_trial_urls {
        if corrected.url.is_empty() {
            continue;
        }
        if let Some(trial) = profile
            .clinical_trials
            .iter_mut()
            .find(|trial| trial.title.contains(&corrected.title))
        {
            trial.url = Some(corrected.url);
        }
    }
}

fn placeholder_summary(error: &LlmError) -> String {
    match error {
        LlmError::Auth(_) => {
            "Could not retrieve information: the generative backend rejected the API key."
        }
        LlmError::RateLimited(_) => {
            "Could not retrieve information: generative backend rate limit exceeded. Please try again later."
        }
        _ => "Error retrieving information. Please try again later.",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Publication;
    use crate::sources::FetchError;
    use crate::types::LlmRequest;
    use async_trait::async_trait;

    struct StaticSource {
        name: &'static str,
        record: PartialRecord,
    }

    impl StaticSource {
        fn new(name: &'static str, record: PartialRecord) -> Arc<dyn SourceClient> {
            Arc::new(Self { name, record })
        }
    }

    #[async_trait]
    impl SourceClient for StaticSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(
            &self,
            _name: &str,
            _specialization: Option<&str>,
        ) -> Result<PartialRecord, FetchError> {
            Ok(self.record.clone())
        }
    }

    struct FailingSource {
        name: &'static str,
        rate_limited: bool,
    }

    impl FailingSource {
        fn new(name: &'static str) -> Arc<dyn SourceClient> {
            Arc::new(Self {
                name,
                rate_limited: false,
            })
        }

        fn rate_limited(name: &'static str) -> Arc<dyn SourceClient> {
            Arc::new(Self {
                name,
                rate_limited: true,
            })
        }
    }

    #[async_trait]
    impl SourceClient for FailingSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(
            &self,
            _name: &str,
            _specialization: Option<&str>,
        ) -> Result<PartialRecord, FetchError> {
            if self.rate_limited {
                Err(FetchError::RateLimited {
                    src: self.name.to_string(),
                })
            } else {
                Err(FetchError::Request {
                    src: self.name.to_string(),
                    message: "connection refused".to_string(),
                })
            }
        }
    }

    struct StubBackend {
        response: String,
    }

    impl StubBackend {
        fn new(response: &str) -> Arc<dyn GenerativeBackend> {
            Arc::new(Self {
                response: response.to_string(),
            })
        }
    }

    #[async_trait]
    impl GenerativeBackend for StubBackend {
        async fn complete(&self, _request: &LlmRequest) -> Result<String, LlmError> {
            Ok(self.response.clone())
        }
    }

    struct AuthFailingBackend;

    #[async_trait]
    impl GenerativeBackend for AuthFailingBackend {
        async fn complete(&self, _request: &LlmRequest) -> Result<String, LlmError> {
            Err(LlmError::Auth("bad key".to_string()))
        }
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        // Keep retry delays out of test wall-clock time.
        config.fetch.retry_delay_ms = 1;
        config
    }

    fn bare_agent() -> ResearcherAgent {
        ResearcherAgent::new(test_config()).with_sources(vec![])
    }

    fn record_with_publication(source: &str, title: &str) -> PartialRecord {
        let mut record = PartialRecord::new(source, format!("https://{source}.example/q"));
        record.publications.push(Publication {
            title: title.to_string(),
            authors: Some("Doe J".to_string()),
            journal: Some("Nat Med".to_string()),
            year: None,
            url: Some("https://example.org/1".to_string()),
        });
        record
    }

    #[tokio::test]
    async fn empty_name_is_invalid_input() {
        let mut agent = bare_agent();
        let error = agent.search("   ", None).await.unwrap_err();
        assert!(matches!(error, AgentError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn profile_keeps_the_exact_input_name() {
        let mut agent = bare_agent();
        let profile = agent.search("Jane Doe", None).await.unwrap();
        assert_eq!(profile.name, "Jane Doe");
        assert!(agent.profile("Jane Doe").is_some());
    }

    #[tokio::test]
    async fn csv_hit_with_all_sources_failing_and_no_backend() {
        let csv = "Name,Affiliation\nJane Doe,\"MIT, Broad Institute\"\n";
        let table = ResearcherTable::from_reader(csv.as_bytes()).unwrap();

        let mut agent = ResearcherAgent::new(test_config())
            .with_table(table)
            .with_sources(vec![
                FailingSource::new("pubmed"),
                FailingSource::new("google_scholar"),
            ]);

        let profile = agent.search("Jane Doe", None).await.unwrap();
        assert_eq!(profile.affiliations, vec!["MIT", "Broad Institute"]);
        assert!(!profile.ai_generated);
        assert!(!profile.ai_enhanced);
        assert!(profile.publications.is_empty());
        assert!(profile.source_urls.is_empty());
    }

    #[tokio::test]
    async fn full_fallback_marks_the_profile_generated() {
        let mut agent = ResearcherAgent::new(test_config())
            .with_sources(vec![FailingSource::new("pubmed")])
            .with_backend(StubBackend::new(
                r#"{"summary": "X", "affiliations": ["Y"]}"#,
            ));

        let profile = agent.search("John Smith", None).await.unwrap();
        assert!(profile.ai_generated);
        assert_eq!(profile.summary.as_deref(), Some("X"));
        assert_eq!(profile.affiliations, vec!["Y"]);
    }

    #[tokio::test]
    async fn fallback_failure_degrades_to_a_placeholder_summary() {
        let mut agent = ResearcherAgent::new(test_config())
            .with_sources(vec![FailingSource::new("pubmed")])
            .with_backend(Arc::new(AuthFailingBackend));

        let profile = agent.search("John Smith", None).await.unwrap();
        assert!(!profile.ai_generated);
        assert!(profile
            .summary
            .as_deref()
            .unwrap()
            .contains("rejected the API key"));
    }

    #[tokio::test]
    async fn duplicate_publications_across_sources_collapse() {
        let mut agent = ResearcherAgent::new(test_config()).with_sources(vec![
            StaticSource::new("pubmed", record_with_publication("pubmed", "Pacing outcomes")),
            StaticSource::new(
                "google_scholar",
                record_with_publication("google_scholar", "Pacing outcomes"),
            ),
        ]);

        let profile = agent.search("Jane Doe", None).await.unwrap();
        assert_eq!(profile.publications.len(), 1);
        assert_eq!(profile.source_urls.len(), 2);
    }

    #[tokio::test]
    async fn each_source_contribution_is_present_regardless_of_order() {
        let mut interests = PartialRecord::new("researchgate", "https://rg.example/p");
        interests.research_interests.push("cardiology".to_string());
        interests
            .basic_info
            .insert("full_name".to_string(), "Jane Doe".to_string());

        let mut agent = ResearcherAgent::new(test_config()).with_sources(vec![
            StaticSource::new("pubmed", record_with_publication("pubmed", "Pacing outcomes")),
            StaticSource::new("researchgate", interests),
            FailingSource::rate_limited("google_scholar"),
        ]);

        let profile = agent.search("Jane Doe", None).await.unwrap();
        assert_eq!(profile.publications.len(), 1);
        assert_eq!(profile.research_interests, vec!["cardiology"]);
        assert_eq!(profile.basic_info.get("full_name").unwrap(), "Jane Doe");
        // The rate-limited source left no trace beyond a log line.
        assert!(!profile.source_urls.contains_key("google_scholar"));
    }

    #[tokio::test]
    async fn enrichment_runs_when_sources_contributed() {
        let mut agent = ResearcherAgent::new(test_config())
            .with_sources(vec![StaticSource::new(
                "pubmed",
                record_with_publication("pubmed", "Pacing outcomes in adults"),
            )])
            .with_backend(StubBackend::new(
                r#"{"summary": "Cardiologist.",
                    "key_contributions": "Pacing.",
                    "education": ["MD, Harvard, 1999"],
                    "publication_urls": [{"title": "Pacing outcomes", "url": "https://example.org/fixed"}]}"#,
            ));

        let profile = agent.search("Jane Doe", None).await.unwrap();
        assert!(profile.ai_enhanced);
        assert!(!profile.ai_generated);
        assert_eq!(profile.summary.as_deref(), Some("Cardiologist."));
        assert_eq!(profile.education, vec!["MD, Harvard, 1999"]);
        // URL corrected through a title-substring match.
        assert_eq!(
            profile.publications[0].url.as_deref(),
            Some("https://example.org/fixed")
        );
    }

    #[tokio::test]
    async fn enrichment_failure_keeps_the_collected_profile() {
        let mut agent = ResearcherAgent::new(test_config())
            .with_sources(vec![StaticSource::new(
                "pubmed",
                record_with_publication("pubmed", "Pacing outcomes"),
            )])
            .with_backend(Arc::new(AuthFailingBackend));

        let profile = agent.search("Jane Doe", None).await.unwrap();
        assert!(!profile.ai_enhanced);
        assert_eq!(profile.publications.len(), 1);
        assert!(profile.summary.is_some());
    }

    #[tokio::test]
    async fn repeated_search_overwrites_the_stored_profile() {
        let mut agent = bare_agent();
        agent.search("Jane Doe", None).await.unwrap();
        agent.search("Jane Doe", Some("cardiology")).await.unwrap();

        let stored = agent.profile("Jane Doe").unwrap();
        assert_eq!(stored.specialization.as_deref(), Some("cardiology"));
        assert_eq!(agent.profile_names().len(), 1);
    }

    #[tokio::test]
    async fn search_without_table_skips_the_dataset() {
        let csv = "Name,Affiliation\nJane Doe,MIT\n";
        let table = ResearcherTable::from_reader(csv.as_bytes()).unwrap();
        let mut agent = ResearcherAgent::new(test_config())
            .with_table(table)
            .with_sources(vec![]);

        let profile = agent.search_without_table("Jane Doe", None).await.unwrap();
        assert!(profile.affiliations.is_empty());

        // The table is restored afterwards.
        let profile = agent.search("Jane Doe", None).await.unwrap();
        assert_eq!(profile.affiliations, vec!["MIT"]);
    }

    #[tokio::test]
    async fn sources_can_be_added_and_removed_at_runtime() {
        let mut agent = ResearcherAgent::new(test_config());
        assert_eq!(agent.source_names().len(), 4);

        // Unrecognized names are accepted but resolve to no extractor.
        agent.add_source("orcid", "https://orcid.org");
        assert_eq!(agent.source_names().len(), 4);

        agent.remove_source("pubmed");
        let names = agent.source_names();
        assert_eq!(names.len(), 3);
        assert!(!names.contains(&"pubmed"));
    }

    #[tokio::test]
    async fn report_requires_a_prior_search() {
        let agent = bare_agent();
        assert!(matches!(
            agent.report("Jane Doe"),
            Err(AgentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn ask_without_backend_is_missing_api_key() {
        let mut agent = bare_agent();
        let error = agent.ask("who is this", Some("Jane Doe")).await.unwrap_err();
        assert!(matches!(error, AgentError::MissingApiKey));
    }
}
