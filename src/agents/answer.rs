//! Question answering over stored profiles
//!
//! Builds a bounded context from what the engine already knows about a
//! researcher, then delegates to the generative backend. The answer text is
//! returned verbatim.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::agents::fallback::FallbackAgent;
use crate::llm::provider::GenerativeBackend;
use crate::models::Profile;
use crate::types::{AgentResult, LlmMessage, LlmRequest};

const ANSWER_SYSTEM: &str = "You are a knowledgeable assistant specializing in medical research. \
     Answer based on the provided context where possible, and say when an answer goes beyond it.";

pub struct AnswerAgent {
    backend: Arc<dyn GenerativeBackend>,
    model: String,
}

impl AnswerAgent {
    pub fn new(backend: Arc<dyn GenerativeBackend>, model: String) -> Self {
        Self { backend, model }
    }

    /// Answer `question`. A known researcher name selects that profile as
    /// context; an unknown one triggers one best-effort generation pass; no
    /// name at all yields a context listing the known names.
    pub async fn ask(
        &self,
        question: &str,
        researcher_name: Option<&str>,
        profiles: &mut HashMap<String, Profile>,
    ) -> AgentResult<String> {
        let context = match researcher_name {
            Some(name) => match profiles.get(name) {
                Some(profile) => Self::profile_context(name, profile),
                None => self.discover_context(name, profiles).await,
            },
            None if !profiles.is_empty() => {
                let mut names: Vec<_> = profiles.keys().cloned().collect();
                names.sort();
                format!(
                    "I have information on the following researchers: {}",
                    names.join(", ")
                )
            }
            None => String::new(),
        };

        let prompt = format!(
            "{context}\n\nQuestion: {question}\n\nPlease provide a detailed answer based on the \
             information available. If the context is not sufficient, use general knowledge and \
             indicate that you are doing so."
        );

        info!(
            question_len = question.len(),
            context_len = context.len(),
            "answering question"
        );

        let request = LlmRequest {
            model: self.model.clone(),
            messages: vec![LlmMessage::user(prompt)],
            max_tokens: Some(2048),
            temperature: Some(0.5),
            system_instruction: Some(ANSWER_SYSTEM.to_string()),
        };

        Ok(self.backend.complete(&request).await?)
    }

    /// Context from a stored profile. The 5-publication and 3-trial caps
    /// keep it bounded however large the profile grows.
    fn profile_context(name: &str, profile: &Profile) -> String {
        let mut parts = Vec::new();

        if !profile.basic_info.is_empty() {
            parts.push(format!(
                "Basic Info: {}",
                serde_json::to_string_pretty(&profile.basic_info).unwrap_or_default()
            ));
        }
        if !profile.affiliations.is_empty() {
            parts.push(format!("Affiliations: {}", profile.affiliations.join(", ")));
        }
        if !profile.research_interests.is_empty() {
            parts.push(format!(
                "Research Interests: {}",
                profile.research_interests.join(", ")
            ));
        }
        if !profile.publications.is_empty() {
            let leading: Vec<_> = profile.publications.iter().take(5).collect();
            parts.push(format!(
                "Publications: {}",
                serde_json::to_string_pretty(&leading).unwrap_or_default()
            ));
        }
        if !profile.clinical_trials.is_empty() {
            let leading: Vec<_> = profile.clinical_trials.iter().take(3).collect();
            parts.push(format!(
                "Clinical Trials: {}",
                serde_json::to_string_pretty(&leading).unwrap_or_default()
            ));
        }
        if let Some(summary) = &profile.summary {
            parts.push(format!("Summary: {}", summary));
        }
        if let Some(key_contributions) = &profile.key_contributions {
            parts.push(format!("Key Contributions: {}", key_contributions));
        }

        if parts.is_empty() {
            format!("I have limited information about {}.", name)
        } else {
            format!("Information about {}:\n\n{}", name, parts.join("\n\n"))
        }
    }

    /// One best-effort generation pass for a name that was never searched.
    /// On failure the context says so and the question is still answered.
    async fn discover_context(
        &self,
        name: &str,
        profiles: &mut HashMap<String, Profile>,
    ) -> String {
        let fallback = FallbackAgent::new(self.backend.clone(), self.model.clone());
        match fallback.generate(name, None).await {
            Ok(generated) => {
                let mut profile = Profile::new(name, None);
                generated.fill_profile(&mut profile);
                profile.ai_generated = true;
                let context = Self::profile_context(name, &profile);
                profiles.insert(name.to_string(), profile);
                context
            }
            Err(error) => {
                warn!(name, error = %error, "on-the-fly profile generation failed");
                format!(
                    "I don't have detailed information about {} and the lookup failed; \
                     answer from general knowledge and say so.",
                    name
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Publication;
    use crate::types::LlmError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Returns canned responses in order and records every prompt it saw.
    struct ScriptedBackend {
        responses: Mutex<Vec<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(responses: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.iter().rev().map(|s| s.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl GenerativeBackend for ScriptedBackend {
        async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError> {
            self.prompts
                .lock()
                .unwrap()
                .push(request.messages[0].content.clone());
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| LlmError::Api("script exhausted".to_string()))
        }
    }

    fn stored_profile() -> Profile {
        let mut profile = Profile::new("Jane Doe", None);
        profile.affiliations.push("MIT".to_string());
        profile.research_interests.push("cardiology".to_string());
        for i in 0..8 {
            profile
                .publications
                .push(Publication::titled(format!("Paper {}", i)));
        }
        profile.summary = Some("Cardiologist at MIT.".to_string());
        profile
    }

    #[tokio::test]
    async fn known_name_builds_profile_context() {
        let backend = ScriptedBackend::new(&["the answer"]);
        let agent = AnswerAgent::new(backend.clone(), "gpt-4o".to_string());
        let mut profiles = HashMap::from([("Jane Doe".to_string(), stored_profile())]);

        let answer = agent
            .ask("Where does this researcher work?", Some("Jane Doe"), &mut profiles)
            .await
            .unwrap();
        assert_eq!(answer, "the answer");

        let prompt = backend.last_prompt();
        assert!(prompt.contains("Affiliations: MIT"));
        assert!(prompt.contains("Research Interests: cardiology"));
        assert!(prompt.contains("Summary: Cardiologist at MIT."));
        assert!(prompt.contains("Question: Where does this researcher work?"));
        // Context is capped at the first five publications.
        assert!(prompt.contains("Paper 4"));
        assert!(!prompt.contains("Paper 5"));
    }

    #[tokio::test]
    async fn no_name_lists_known_researchers() {
        let backend = ScriptedBackend::new(&["ok"]);
        let agent = AnswerAgent::new(backend.clone(), "gpt-4o".to_string());
        let mut profiles = HashMap::from([
            ("Jane Doe".to_string(), stored_profile()),
            ("John Smith".to_string(), Profile::new("John Smith", None)),
        ]);

        agent.ask("Who do you know?", None, &mut profiles).await.unwrap();
        let prompt = backend.last_prompt();
        assert!(prompt.contains("I have information on the following researchers:"));
        assert!(prompt.contains("Jane Doe"));
        assert!(prompt.contains("John Smith"));
    }

    #[tokio::test]
    async fn unknown_name_generates_and_stores_a_profile() {
        let backend = ScriptedBackend::new(&[
            r#"{"summary": "Oncologist.", "affiliations": ["Johns Hopkins"]}"#,
            "final answer",
        ]);
        let agent = AnswerAgent::new(backend.clone(), "gpt-4o".to_string());
        let mut profiles = HashMap::new();

        let answer = agent
            .ask("Who is this?", Some("John Smith"), &mut profiles)
            .await
            .unwrap();
        assert_eq!(answer, "final answer");

        let stored = profiles.get("John Smith").unwrap();
        assert!(stored.ai_generated);
        assert_eq!(stored.affiliations, vec!["Johns Hopkins"]);
        assert!(backend.last_prompt().contains("Summary: Oncologist."));
    }

    #[tokio::test]
    async fn failed_discovery_still_answers() {
        // First call (generation) gets malformed JSON, second (answer) text.
        let backend = ScriptedBackend::new(&["not json at all", "best effort answer"]);
        let agent = AnswerAgent::new(backend.clone(), "gpt-4o".to_string());
        let mut profiles = HashMap::new();

        let answer = agent
            .ask("Who is this?", Some("John Smith"), &mut profiles)
            .await
            .unwrap();
        assert_eq!(answer, "best effort answer");
        assert!(profiles.is_empty());
        assert!(backend.last_prompt().contains("the lookup failed"));
    }
}
