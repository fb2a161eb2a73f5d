//! Canonical researcher profile model
//!
//! One `Profile` per queried name, keyed by the exact input string. List
//! fields are deduplicated by canonical JSON form; duplicate detection is
//! exact, so near-duplicate titles that differ only in punctuation are
//! kept as distinct entries.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Publication {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Publication {
    /// A publication known only by title, e.g. from a dataset cell.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            authors: None,
            journal: None,
            year: None,
            url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalTrial {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// The merged record for one researcher.
///
/// `name` is fixed at creation and never overwritten by any source.
/// `basic_info` and `citations` merge per key with the later writer winning;
/// merge order across sources follows completion order, so colliding keys
/// are nondeterministic across runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(default)]
    pub basic_info: HashMap<String, String>,
    #[serde(default)]
    pub publications: Vec<Publication>,
    #[serde(default)]
    pub research_interests: Vec<String>,
    #[serde(default)]
    pub affiliations: Vec<String>,
    #[serde(default)]
    pub education: Vec<String>,
    #[serde(default)]
    pub clinical_trials: Vec<ClinicalTrial>,
    #[serde(default)]
    pub citations: HashMap<String, i64>,
    #[serde(default)]
    pub collaborators: Vec<String>,
    /// One entry per source that contributed, name to query URL.
    #[serde(default)]
    pub source_urls: HashMap<String, String>,
    /// Truncated raw response bodies, diagnostics only.
    #[serde(default)]
    pub raw_data: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_contributions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_insights: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_network: Option<String>,
    #[serde(default)]
    pub ai_generated: bool,
    #[serde(default)]
    pub ai_enhanced: bool,
}

impl Profile {
    pub fn new(name: &str, specialization: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            specialization: specialization.map(str::to_string),
            ..Default::default()
        }
    }

    /// Whether any fact-bearing field holds data. Gates the fallback policy:
    /// profiles failing this predicate go to generation, passing ones to
    /// enrichment.
    pub fn has_source_data(&self) -> bool {
        !self.publications.is_empty()
            || !self.affiliations.is_empty()
            || !self.research_interests.is_empty()
            || !self.basic_info.is_empty()
    }

    /// Remove structurally-equal duplicates from every list field, keeping
    /// first-seen order. Running this twice yields the same lists.
    pub fn dedup_lists(&mut self) {
        dedup_canonical(&mut self.publications);
        dedup_canonical(&mut self.research_interests);
        dedup_canonical(&mut self.affiliations);
        dedup_canonical(&mut self.education);
        dedup_canonical(&mut self.clinical_trials);
        dedup_canonical(&mut self.collaborators);
    }
}

/// Canonical string form used for duplicate detection.
pub fn canonical<T: Serialize>(item: &T) -> String {
    serde_json::to_string(item).unwrap_or_default()
}

/// Stable dedup by canonical form.
pub fn dedup_canonical<T: Serialize>(items: &mut Vec<T>) {
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(canonical(item)));
}
