//! Tabular researcher dataset
//!
//! Rows come from a user-supplied CSV keyed by a `Name` column. Headers are
//! title-cased on load, so a lowercase `name` header works as an alias.
//! Lookup tries an exact case-insensitive match first and falls back to the
//! first case-insensitive substring match, which can pick an unrelated row
//! for a very common name fragment; that behavior is intentional.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::info;

use crate::models::{Profile, Publication};
use crate::types::{AgentError, AgentResult};

/// Recognized columns. Unmapped columns are ignored; empty cells are skipped.
const LIST_COLUMNS: [(&str, ListField); 3] = [
    ("Affiliation", ListField::Affiliations),
    ("Research Interests", ListField::ResearchInterests),
    ("Publications", ListField::Publications),
];

const BASIC_INFO_COLUMNS: [(&str, &str); 3] = [
    ("Email", "email"),
    ("Phone", "phone"),
    ("Location", "location"),
];

#[derive(Clone, Copy)]
enum ListField {
    Affiliations,
    ResearchInterests,
    Publications,
}

#[derive(Debug, Clone, Default)]
pub struct ResearcherTable {
    rows: Vec<HashMap<String, String>>,
}

/// Fields extracted from one matched row.
#[derive(Debug, Clone, Default)]
pub struct TableRecord {
    pub specialization: Option<String>,
    pub affiliations: Vec<String>,
    pub research_interests: Vec<String>,
    pub publications: Vec<Publication>,
    pub basic_info: HashMap<String, String>,
}

impl TableRecord {
    /// Copy the mapped fields into a profile. The profile name is never
    /// touched; it is fixed at creation.
    pub fn apply_to(self, profile: &mut Profile) {
        if let Some(specialization) = self.specialization {
            profile.specialization = Some(specialization);
        }
        profile.affiliations.extend(self.affiliations);
        profile.research_interests.extend(self.research_interests);
        profile.publications.extend(self.publications);
        profile.basic_info.extend(self.basic_info);
    }
}

impl ResearcherTable {
    pub fn load(path: &Path) -> AgentResult<Self> {
        let file = File::open(path)
            .map_err(|e| AgentError::Load(format!("{}: {}", path.display(), e)))?;
        let table = Self::from_reader(file)?;
        info!(rows = table.len(), path = %path.display(), "researcher dataset loaded");
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> AgentResult<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers: Vec<String> = csv_reader
            .headers()
            .map_err(|e| AgentError::Load(e.to_string()))?
            .iter()
            .map(title_case)
            .collect();

        if !headers.iter().any(|h| h == "Name") {
            return Err(AgentError::Load(
                "dataset has no Name column".to_string(),
            ));
        }

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record.map_err(|e| AgentError::Load(e.to_string()))?;
            let mut row = HashMap::new();
            for (header, value) in headers.iter().zip(record.iter()) {
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }
                row.insert(header.clone(), value.to_string());
            }
            rows.push(row);
        }

        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Find a row for `name` and map it into a record. Exact match wins over
    /// substring match; the first matching row is taken either way.
    pub fn lookup(&self, name: &str) -> Option<TableRecord> {
        let needle = name.to_lowercase();
        let row = self
            .rows
            .iter()
            .find(|row| {
                row.get("Name")
                    .is_some_and(|n| n.to_lowercase() == needle)
            })
            .or_else(|| {
                self.rows.iter().find(|row| {
                    row.get("Name")
                        .is_some_and(|n| n.to_lowercase().contains(&needle))
                })
            })?;
        Some(Self::map_row(row))
    }

    fn map_row(row: &HashMap<String, String>) -> TableRecord {
        let mut record = TableRecord {
            specialization: row.get("Specialization").cloned(),
            ..Default::default()
        };

        for (column, field) in LIST_COLUMNS {
            let Some(value) = row.get(column) else { continue };
            let items = comma_split(value);
            match field {
                ListField::Affiliations => record.affiliations = items,
                ListField::ResearchInterests => record.research_interests = items,
                ListField::Publications => {
                    record.publications = items.into_iter().map(Publication::titled).collect()
                }
            }
        }

        for (column, key) in BASIC_INFO_COLUMNS {
            if let Some(value) = row.get(column) {
                record.basic_info.insert(key.to_string(), value.clone());
            }
        }

        record
    }
}

fn comma_split(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// "research interests" -> "Research Interests", "name" -> "Name".
fn title_case(header: &str) -> String {
    header
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
