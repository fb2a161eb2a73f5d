// Medscout - multi-source aggregation engine for medical researcher profiles

pub mod agents;
pub mod config;
pub mod dataset;
pub mod llm;
pub mod models;
pub mod report;
pub mod sources;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use agents::ResearcherAgent;
pub use config::Config;
pub use models::Profile;
pub use types::{AgentError, AgentResult};
