//! Ordered fallback over extraction tiers.

use std::sync::Arc;

use tracing::{debug, info, warn};

use trialscope_common::record::{BaselineMeasure, Endpoint};
use super::free_text::FreeTextTier;
use super::literature::{LiteratureTable, LiteratureTier};
use super::structured::StructuredTier;
use super::{ExtractionTier, TrialInputs};

/// Tries each tier in order and returns the first non-empty result.
pub struct FallbackChain<T> {
    tiers: Vec<Box<dyn ExtractionTier<T>>>,
}

impl<T> FallbackChain<T> {
    pub fn new(tiers: Vec<Box<dyn ExtractionTier<T>>>) -> Self {
        Self { tiers }
    }

    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    /// Run the chain. Never fails; an empty list means every tier came up dry.
    pub fn run(&self, inputs: &TrialInputs<'_>) -> Vec<T> {
        for tier in &self.tiers {
            let found = tier.extract(inputs);
            if found.is_empty() {
                debug!(nct_id = inputs.nct_id, tier = tier.name(), "tier returned nothing");
                continue;
            }
            info!(
                nct_id = inputs.nct_id,
                tier = tier.name(),
                n = found.len(),
                "extraction tier succeeded"
            );
            return found;
        }
        warn!(nct_id = inputs.nct_id, "no tier produced any data");
        Vec::new()
    }
}

impl FallbackChain<Endpoint> {
    /// structured → free text → literature.
    pub fn endpoints(table: Arc<LiteratureTable>, use_default: bool) -> Self {
        Self::new(vec![
            Box::new(StructuredTier),
            Box::new(FreeTextTier),
            Box::new(LiteratureTier::new(table, use_default)),
        ])
    }
}

impl FallbackChain<BaselineMeasure> {
    pub fn baselines(table: Arc<LiteratureTable>, use_default: bool) -> Self {
        Self::new(vec![
            Box::new(StructuredTier),
            Box::new(FreeTextTier),
            Box::new(LiteratureTier::new(table, use_default)),
        ])
    }
}

/// The endpoint and baseline chains used together by the pipeline.
pub struct ExtractionChains {
    pub endpoints: FallbackChain<Endpoint>,
    pub baselines: FallbackChain<BaselineMeasure>,
}

impl ExtractionChains {
    pub fn new(table: Arc<LiteratureTable>, use_default: bool) -> Self {
        Self {
            endpoints: FallbackChain::endpoints(Arc::clone(&table), use_default),
            baselines: FallbackChain::baselines(table, use_default),
        }
    }
}
