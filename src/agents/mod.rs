//! Agent pipeline
//!
//! - **ResearcherAgent**: fans out to the source clients, merges partial
//!   records into one profile, deduplicates, applies the fallback policy
//! - **FallbackAgent**: generates a profile when nothing was found, or
//!   enriches one that has source-backed data
//! - **AnswerAgent**: answers free-text questions over stored profiles
//!
//! ```text
//! search(name)
//!      │
//!      ├── dataset lookup
//!      ├── N source fetches (parallel, retried)
//!      ▼
//!  merge + dedup ──► generate (empty) / enrich (has data)
//!      │
//!      ▼
//!  stored Profile ──► ask(question) / report(name)
//! ```

pub mod aggregator;
pub mod answer;
pub mod fallback;

pub use aggregator::ResearcherAgent;
pub use answer::AnswerAgent;
pub use fallback::{Enrichment, FallbackAgent, GeneratedProfile};
