//! Source clients: trials registry, SEC-style filings, web publications.
//!
//! All clients are sequential: one request at a time with a fixed delay
//! between requests. No retries.

pub mod clinicaltrials;
pub mod filings;
pub mod publications;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use trialscope_common::record::{Filing, Publications, StudyInfo};

pub use clinicaltrials::ClinicalTrialsClient;
pub use filings::FmpFilingsClient;
pub use publications::WebSearchClient;

/// A trials registry returning raw study documents.
#[async_trait]
pub trait RegistrySource: Send + Sync {
    /// Candidate studies for a condition, filtered to public-company sponsors.
    async fn public_company_trials(&self, condition: &str, limit: usize) -> anyhow::Result<Vec<Value>>;

    /// Full detail document for one study.
    async fn study(&self, nct_id: &str) -> anyhow::Result<Value>;
}

/// Corporate disclosures for a trial's sponsor.
#[async_trait]
pub trait FilingSource: Send + Sync {
    /// Filings per form type, with mention statistics attached when the
    /// trial is referenced in the company's financial data.
    async fn filings_mentioning_trial(
        &self,
        company: &str,
        trial_name: &str,
        nct_id: &str,
        forms: &[String],
        limit_per_form: usize,
    ) -> anyhow::Result<BTreeMap<String, Vec<Filing>>>;
}

/// Scientific publications and company presentations about a trial.
#[async_trait]
pub trait PublicationSource: Send + Sync {
    async fn publications_for_trial(&self, study: &StudyInfo) -> anyhow::Result<Publications>;
}

// ── Company domains ───────────────────────────────────────────────────────────

const COMPANY_DOMAINS: &[(&str, &str)] = &[
    ("united therapeutics", "unither.com"),
    ("hoffmann-la roche", "roche.com"),
    ("acceleron pharma", "acceleronpharma.com"),
    ("merck", "merck.com"),
    ("janssen", "janssen.com"),
    ("glaxosmithkline", "gsk.com"),
    ("bayer", "bayer.com"),
];

/// Website domain used to scope presentation searches for a sponsor.
pub fn company_domain(sponsor: &str) -> String {
    let lower = sponsor.to_lowercase();
    if let Some((_, domain)) = COMPANY_DOMAINS.iter().find(|(name, _)| lower.contains(name)) {
        return domain.to_string();
    }
    let head = lower.split(',').next().unwrap_or("");
    let head = head.split('(').next().unwrap_or("").trim();
    let simplified: String = head
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    format!("{}.com", simplified)
}
