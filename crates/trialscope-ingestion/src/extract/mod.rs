//! Endpoint and baseline extraction.
//!
//! Three tiers share one signature (`TrialInputs → Vec<T>`) and are composed
//! by [`chain::FallbackChain`]:
//!
//! 1. `structured`: posted registry results
//! 2. `free_text`: regex mining of publication and presentation text
//! 3. `literature`: curated reference values keyed by registry identifier
//!
//! `keywords` sits outside the chain and records keyword findings in the
//! fetched publication texts.

pub mod chain;
pub mod free_text;
pub mod keywords;
pub mod literature;
pub mod structured;

use serde_json::Value;
use trialscope_common::record::Publications;

pub use chain::{ExtractionChains, FallbackChain};
pub use free_text::FreeTextTier;
pub use literature::{LiteratureTable, LiteratureTier};
pub use structured::StructuredTier;

/// Everything a tier may look at for one trial.
#[derive(Debug, Clone, Copy)]
pub struct TrialInputs<'a> {
    pub nct_id: &'a str,
    /// Raw registry document.
    pub raw: &'a Value,
    pub publications: &'a Publications,
}

/// One stage of the fallback chain.
///
/// A tier never fails: missing or malformed input yields an empty list and
/// the chain moves on to the next tier.
pub trait ExtractionTier<T>: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, inputs: &TrialInputs<'_>) -> Vec<T>;
}
