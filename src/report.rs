//! Formatted researcher report
//!
//! Renders a stored profile as readable text for the hosting surface to
//! print. Publications are capped at the first ten.

use crate::models::Profile;

pub fn render(profile: &Profile) -> String {
    let mut report = vec![
        format!("# Research Profile: {}", profile.name),
        "\n## Basic Information".to_string(),
    ];

    if profile.basic_info.is_empty() {
        report.push("- No basic information available".to_string());
    } else {
        let mut keys: Vec<_> = profile.basic_info.keys().collect();
        keys.sort();
        for key in keys {
            report.push(format!(
                "- {}: {}",
                heading_case(key),
                profile.basic_info[key]
            ));
        }
    }

    if let Some(summary) = &profile.summary {
        report.push("\n## Summary".to_string());
        report.push(summary.clone());
    }

    report.push("\n## Affiliations".to_string());
    if profile.affiliations.is_empty() {
        report.push("- No affiliations found".to_string());
    } else {
        for affiliation in &profile.affiliations {
            report.push(format!("- {}", affiliation));
        }
    }

    report.push("\n## Research Interests".to_string());
    if profile.research_interests.is_empty() {
        report.push("- No research interests found".to_string());
    } else {
        for interest in &profile.research_interests {
            report.push(format!("- {}", interest));
        }
    }

    if let Some(key_contributions) = &profile.key_contributions {
        report.push("\n## Key Contributions".to_string());
        report.push(key_contributions.clone());
    }

    report.push("\n## Publications".to_string());
    if profile.publications.is_empty() {
        report.push("- No publications found".to_string());
    } else {
        for (i, publication) in profile.publications.iter().take(10).enumerate() {
            let mut entry = format!("{}. {}", i + 1, publication.title);
            if let Some(authors) = &publication.authors {
                entry.push_str(&format!("\n   Authors: {}", authors));
            }
            if let Some(journal) = &publication.journal {
                entry.push_str(&format!("\n   Journal: {}", journal));
            }
            report.push(entry);
            report.push(String::new());
        }
    }

    report.push("\n## Clinical Trials".to_string());
    if profile.clinical_trials.is_empty() {
        report.push("- No clinical trials found".to_string());
    } else {
        for (i, trial) in profile.clinical_trials.iter().enumerate() {
            let mut entry = format!("{}. {}", i + 1, trial.title);
            if let Some(status) = &trial.status {
                entry.push_str(&format!("\n   Status: {}", status));
            }
            if let Some(condition) = &trial.condition {
                entry.push_str(&format!("\n   Condition: {}", condition));
            }
            report.push(entry);
            report.push(String::new());
        }
    }

    if let Some(additional_insights) = &profile.additional_insights {
        report.push("\n## Additional Insights".to_string());
        report.push(additional_insights.clone());
    }

    if let Some(research_network) = &profile.research_network {
        report.push("\n## Research Network".to_string());
        report.push(research_network.clone());
    }

    report.push("\n## Data Sources".to_string());
    if profile.source_urls.is_empty() {
        report.push("- Data extracted from local files only".to_string());
    } else {
        let mut sources: Vec<_> = profile.source_urls.iter().collect();
        sources.sort();
        for (source, url) in sources {
            if !url.is_empty() {
                report.push(format!("- {}: {}", heading_case(source), url));
            }
        }
    }

    report.join("\n")
}

/// "full_name" -> "Full Name".
fn heading_case(key: &str) -> String {
    key.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
