use anyhow::Result;
use std::collections::HashMap;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub sources: SourcesConfig,
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub provider: String,
    pub model: String,
    /// Override for OpenAI-compatible gateways.
    pub base_url: Option<String>,
}

impl LlmConfig {
    pub fn active_api_key(&self) -> Option<String> {
        if self.api_key.is_empty() {
            None
        } else {
            Some(self.api_key.clone())
        }
    }
}

/// Source name to base URL. Names without a registered extractor are kept in
/// the map but contribute nothing to a search.
#[derive(Debug, Clone)]
pub struct SourcesConfig {
    pub endpoints: HashMap<String, String>,
}

impl SourcesConfig {
    pub fn default_endpoints() -> HashMap<String, String> {
        HashMap::from([
            (
                "pubmed".to_string(),
                "https://pubmed.ncbi.nlm.nih.gov".to_string(),
            ),
            (
                "researchgate".to_string(),
                "https://www.researchgate.net".to_string(),
            ),
            (
                "google_scholar".to_string(),
                "https://scholar.google.com".to_string(),
            ),
            (
                "clinical_trials".to_string(),
                "https://clinicaltrials.gov".to_string(),
            ),
        ])
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// Leading structured items extracted per source.
    pub max_results: usize,
    /// Characters of raw response body kept for diagnostics.
    pub snapshot_limit: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Size of the worker pool for one search call.
    pub concurrency: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_results: 10,
            snapshot_limit: 5000,
            max_retries: 2,
            retry_delay_ms: 1000,
            concurrency: 4,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                api_key: String::new(),
                provider: "openai".to_string(),
                model: "gpt-4o".to_string(),
                base_url: None,
            },
            sources: SourcesConfig {
                endpoints: SourcesConfig::default_endpoints(),
            },
            fetch: FetchConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut endpoints = SourcesConfig::default_endpoints();
        for (name, var) in [
            ("pubmed", "PUBMED_BASE_URL"),
            ("researchgate", "RESEARCHGATE_BASE_URL"),
            ("google_scholar", "GOOGLE_SCHOLAR_BASE_URL"),
            ("clinical_trials", "CLINICAL_TRIALS_BASE_URL"),
        ] {
            if let Ok(url) = env::var(var) {
                endpoints.insert(name.to_string(), url);
            }
        }

        Ok(Self {
            llm: LlmConfig {
                api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
                provider: env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string()),
                model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
                base_url: env::var("OPENAI_BASE_URL").ok(),
            },
            sources: SourcesConfig { endpoints },
            fetch: FetchConfig {
                timeout_secs: env::var("SEARCH_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
                max_results: env::var("SEARCH_MAX_RESULTS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
                snapshot_limit: env::var("SEARCH_SNAPSHOT_LIMIT")
                    .unwrap_or_else(|_| "5000".to_string())
                    .parse()?,
                max_retries: env::var("SEARCH_MAX_RETRIES")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()?,
                retry_delay_ms: env::var("SEARCH_RETRY_DELAY_MS")
                    .unwrap_or_else(|_| "1000".to_string())
                    .parse()?,
                concurrency: env::var("SEARCH_CONCURRENCY")
                    .unwrap_or_else(|_| "4".to_string())
                    .parse()?,
            },
        })
    }
}
