//! Generative fallback
//!
//! Two jobs: synthesize a whole profile when no dataset row and no source
//! produced anything, and enrich a source-backed profile with derived
//! narrative fields. Both issue a single completion call and parse a
//! fixed-schema JSON document out of the response.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::llm::provider::GenerativeBackend;
use crate::models::{ClinicalTrial, Profile, Publication};
use crate::types::{LlmError, LlmMessage, LlmRequest};

const PUBMED_SEARCH_BASE: &str = "https://pubmed.ncbi.nlm.nih.gov/?term=";
const TRIALS_SEARCH_BASE: &str = "https://clinicaltrials.gov/search?term=";

const GENERATE_SYSTEM: &str = "You are a research assistant specializing in medical research. \
     Provide the most accurate information possible about medical researchers in JSON format. \
     Focus on accurate education history and direct, valid URLs to publications and clinical trials.";

const ENRICH_SYSTEM: &str = "You are an assistant that analyzes medical researcher profiles and \
     extracts key insights. You verify and correct publication and clinical trial URLs and fill in \
     missing educational details. Respond strictly with valid JSON containing the requested fields.";

pub struct FallbackAgent {
    backend: Arc<dyn GenerativeBackend>,
    model: String,
}

/// Profile-shaped document returned by `generate`.
#[derive(Debug, Default, Deserialize)]
pub struct GeneratedProfile {
    #[serde(default)]
    pub basic_info: HashMap<String, Value>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub key_contributions: Option<String>,
    #[serde(default)]
    pub education: Vec<String>,
    #[serde(default)]
    pub affiliations: Vec<String>,
    #[serde(default)]
    pub research_interests: Vec<String>,
    #[serde(default)]
    pub publications: Vec<Publication>,
    #[serde(default)]
    pub clinical_trials: Vec<ClinicalTrial>,
}

impl GeneratedProfile {
    fn basic_info_strings(&self) -> HashMap<String, String> {
        self.basic_info
            .iter()
            .map(|(key, value)| (key.clone(), value_to_string(value)))
            .collect()
    }

    /// Copy fields into `profile`, but only where the profile is still
    /// empty. Collected data always wins over generated data.
    pub fn fill_profile(self, profile: &mut Profile) {
        if profile.basic_info.is_empty() {
            profile.basic_info = self.basic_info_strings();
        }
        if profile.summary.is_none() {
            profile.summary = self.summary;
        }
        if profile.key_contributions.is_none() {
            profile.key_contributions = self.key_contributions;
        }
        if profile.education.is_empty() {
            profile.education = self.education;
        }
        if profile.affiliations.is_empty() {
            profile.affiliations = self.affiliations;
        }
        if profile.research_interests.is_empty() {
            profile.research_interests = self.research_interests;
        }
        if profile.publications.is_empty() {
            profile.publications = self.publications;
        }
        if profile.clinical_trials.is_empty() {
            profile.clinical_trials = self.clinical_trials;
        }
    }
}

/// Derived fields returned by `enrich`. Merging into the profile is the
/// engine's responsibility; this type never mutates anything.
#[derive(Debug, Default, Deserialize)]
pub struct Enrichment {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub key_contributions: Option<String>,
    #[serde(default)]
    pub additional_insights: Option<String>,
    #[serde(default)]
    pub research_network: Option<String>,
    #[serde(default)]
    pub education: Vec<String>,
    #[serde(default)]
    pub publication_urls: Vec<CorrectedUrl>,
    #[serde(default)]
    pub clinical_trial_urls: Vec<CorrectedUrl>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorrectedUrl {
    pub title: String,
    #[serde(default)]
    pub url: String,
}

impl FallbackAgent {
    pub fn new(backend: Arc<dyn GenerativeBackend>, model: String) -> Self {
        Self { backend, model }
    }

    /// Synthesize a profile-shaped record for a name with no data anywhere.
    pub async fn generate(
        &self,
        name: &str,
        specialization: Option<&str>,
    ) -> Result<GeneratedProfile, LlmError> {
        info!(name, "generating researcher profile");

        let request = LlmRequest {
            model: self.model.clone(),
            messages: vec![LlmMessage::user(Self::generate_prompt(name, specialization))],
            max_tokens: Some(2048),
            temperature: Some(0.3),
            system_instruction: Some(GENERATE_SYSTEM.to_string()),
        };

        let content = self.backend.complete(&request).await?;
        let mut generated: GeneratedProfile = parse_json_payload(&content)?;
        repair_publication_urls(&mut generated.publications);
        repair_trial_urls(&mut generated.clinical_trials);
        Ok(generated)
    }

    /// Derive summary and insight fields from an already-populated profile.
    pub async fn enrich(&self, profile: &Profile) -> Result<Enrichment, LlmError> {
        info!(name = %profile.name, "enriching researcher profile");

        let request = LlmRequest {
            model: self.model.clone(),
            messages: vec![LlmMessage::user(Self::enrich_prompt(profile))],
            max_tokens: Some(2048),
            temperature: Some(0.3),
            system_instruction: Some(ENRICH_SYSTEM.to_string()),
        };

        let content = self.backend.complete(&request).await?;
        parse_json_payload(&content)
    }

    fn generate_prompt(name: &str, specialization: Option<&str>) -> String {
        let specialization_text = specialization
            .map(|s| format!(" who specializes in {}", s))
            .unwrap_or_default();

        format!(
            r#"I need comprehensive information about medical researcher {name}{specialization_text}.
Provide:
1. A summary of their background and expertise
2. Their key research contributions
3. Their affiliations with current position and institution
4. Research interests
5. Notable publications with direct links to PubMed, Google Scholar, or journal websites
6. Educational background with institutions, years, and degree types
7. Any clinical trials they are involved in, with direct links

Format the response as JSON with these keys:
- basic_info (object with fields like email if public, position, etc.)
- summary (string)
- key_contributions (string)
- education (array of strings, each with complete information)
- affiliations (array of strings)
- research_interests (array of strings)
- publications (array of objects with title, authors, journal, year, url)
- clinical_trials (array of objects with title, status, condition, url)

For all URLs, provide direct links that point to the correct resources."#
        )
    }

    fn enrich_prompt(profile: &Profile) -> String {
        // First 5 publications and first 3 trials keep the context bounded.
        let publications: Vec<_> = profile.publications.iter().take(5).collect();
        let trials: Vec<_> = profile.clinical_trials.iter().take(3).collect();

        format!(
            r#"I have collected the following information about medical researcher {name}:

Basic Info: {basic_info}

Affiliations: {affiliations}

Research Interests: {interests}

Publications: {publications}

Clinical Trials: {trials}

Education: {education}

Based on this information, please:
1. Summarize this researcher's background and main areas of expertise in 2-3 sentences
2. Identify their key research contributions
3. Extract any additional insights about their career, impact, or specialization
4. Note any collaborations or research networks they might be part of
5. Fill in any missing educational details that can be inferred
6. Validate and fix any publication URLs so they point to valid sources
7. Validate and fix any clinical trial URLs so they point to valid sources

Format your response as JSON with the keys: summary, key_contributions,
additional_insights, research_network, education, publication_urls (objects
with title and url), clinical_trial_urls (objects with title and url)."#,
            name = profile.name,
            basic_info = to_pretty_json(&profile.basic_info),
            affiliations = join_or_none(&profile.affiliations),
            interests = join_or_none(&profile.research_interests),
            publications = if publications.is_empty() {
                "None found".to_string()
            } else {
                to_pretty_json(&publications)
            },
            trials = if trials.is_empty() {
                "None found".to_string()
            } else {
                to_pretty_json(&trials)
            },
            education = to_pretty_json(&profile.education),
        )
    }
}

/// Strip an optional fenced code block, then parse the JSON document.
pub(crate) fn parse_json_payload<T: serde::de::DeserializeOwned>(
    response: &str,
) -> Result<T, LlmError> {
    serde_json::from_str(extract_json(response))
        .map_err(|e| LlmError::MalformedResponse(e.to_string()))
}

fn extract_json(response: &str) -> &str {
    if response.contains("```json") {
        response
            .split("```json")
            .nth(1)
            .and_then(|rest| rest.split("```").next())
            .unwrap_or(response)
            .trim()
    } else if response.contains("```") {
        response.split("```").nth(1).unwrap_or(response).trim()
    } else {
        response.trim()
    }
}

/// Publications without a usable absolute URL get a deterministic search URL
/// built from the title.
fn repair_publication_urls(publications: &mut [Publication]) {
    for publication in publications {
        let usable = publication
            .url
            .as_deref()
            .is_some_and(is_absolute_url);
        if !usable && !publication.title.is_empty() {
            publication.url = Some(format!(
                "{}{}",
                PUBMED_SEARCH_BASE,
                publication.title.replace(' ', "+")
            ));
        }
    }
}

fn repair_trial_urls(trials: &mut [ClinicalTrial]) {
    for trial in trials {
        let usable = trial.url.as_deref().is_some_and(is_absolute_url);
        if !usable && !trial.title.is_empty() {
            trial.url = Some(format!(
                "{}{}",
                TRIALS_SEARCH_BASE,
                trial.title.replace(' ', "+")
            ));
        }
    }
}

fn is_absolute_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn to_pretty_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "None found".to_string()
    } else {
        items.join(", ")
    }
}
