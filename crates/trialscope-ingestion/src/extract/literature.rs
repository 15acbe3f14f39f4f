//! Tier 3: published reference values.
//!
//! A versioned JSON table keyed by registry identifier, with a `DEFAULT` key
//! used for trials that have no entry of their own. The built-in table is
//! embedded at compile time; a file on disk can replace it.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use trialscope_common::record::{BaselineMeasure, Endpoint, Tier};
use trialscope_common::{Result, TrialscopeError};
use crate::normalise::AliasNormaliser;
use super::{ExtractionTier, TrialInputs};

const BUILTIN: &str = include_str!("../../data/literature_reference.json");
const DEFAULT_KEY: &str = "DEFAULT";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LiteratureTable {
    version: String,
    #[serde(default)]
    endpoints: HashMap<String, Vec<Endpoint>>,
    #[serde(default)]
    baselines: HashMap<String, Vec<BaselineMeasure>>,
}

impl LiteratureTable {
    /// The table shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let table: Self = serde_json::from_str(text)?;
        if table.version.trim().is_empty() {
            return Err(TrialscopeError::Config(
                "literature table has no version".to_string(),
            ));
        }
        Ok(table)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Reference endpoints for `nct_id`, else the `DEFAULT` entry when allowed.
    pub fn endpoints_for(&self, nct_id: &str, use_default: bool) -> Vec<Endpoint> {
        let normaliser = AliasNormaliser::standard();
        lookup(&self.endpoints, nct_id, use_default)
            .iter()
            .cloned()
            .map(|mut e| {
                e.canonical_name.get_or_insert_with(|| normaliser.normalise(&e.name));
                e.tier = Some(Tier::Literature);
                e
            })
            .collect()
    }

    pub fn baselines_for(&self, nct_id: &str, use_default: bool) -> Vec<BaselineMeasure> {
        let normaliser = AliasNormaliser::standard();
        lookup(&self.baselines, nct_id, use_default)
            .iter()
            .cloned()
            .map(|mut b| {
                b.canonical_name.get_or_insert_with(|| normaliser.normalise(&b.name));
                b.tier = Some(Tier::Literature);
                b
            })
            .collect()
    }
}

fn lookup<'a, T>(map: &'a HashMap<String, Vec<T>>, nct_id: &str, use_default: bool) -> &'a [T] {
    if let Some(entries) = map.get(nct_id) {
        debug!(nct_id, "literature entry found");
        return entries;
    }
    if use_default {
        if let Some(entries) = map.get(DEFAULT_KEY) {
            debug!(nct_id, "using DEFAULT literature entry");
            return entries;
        }
    }
    &[]
}

/// Literature tier for both endpoints and baseline measures.
#[derive(Debug, Clone)]
pub struct LiteratureTier {
    table: Arc<LiteratureTable>,
    use_default: bool,
}

impl LiteratureTier {
    pub fn new(table: Arc<LiteratureTable>, use_default: bool) -> Self {
        Self { table, use_default }
    }
}

impl ExtractionTier<Endpoint> for LiteratureTier {
    fn name(&self) -> &'static str {
        "literature"
    }

    fn extract(&self, inputs: &TrialInputs<'_>) -> Vec<Endpoint> {
        self.table.endpoints_for(inputs.nct_id, self.use_default)
    }
}

impl ExtractionTier<BaselineMeasure> for LiteratureTier {
    fn name(&self) -> &'static str {
        "literature"
    }

    fn extract(&self, inputs: &TrialInputs<'_>) -> Vec<BaselineMeasure> {
        self.table.baselines_for(inputs.nct_id, self.use_default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trialscope_common::record::Arm;

    #[test]
    fn test_builtin_table_loads() {
        let table = LiteratureTable::builtin().unwrap();
        assert!(!table.version().is_empty());
    }

    #[test]
    fn test_known_trial_entry() {
        let table = LiteratureTable::builtin().unwrap();
        let endpoints = table.endpoints_for("NCT00660179", true);
        assert_eq!(endpoints.len(), 4);

        let pvr = &endpoints[0];
        assert_eq!(pvr.name, "PVR");
        assert_eq!(pvr.arm, Arm::Intervention);
        assert_eq!(pvr.average_value, Some(-36.8));
        assert_eq!(pvr.upper_end, Some(-27.4));
        assert_eq!(pvr.lower_end, Some(-44.2));
        assert_eq!(pvr.timepoint, "Week 16");
        assert_eq!(pvr.canonical_name.as_deref(), Some("PVR"));
        assert!(endpoints.iter().all(|e| e.tier == Some(Tier::Literature)));
        assert!(endpoints.iter().all(|e| e.source.is_some()));
    }

    #[test]
    fn test_unknown_trial_uses_default() {
        let table = LiteratureTable::builtin().unwrap();
        let endpoints = table.endpoints_for("NCT99999999", true);
        assert!(!endpoints.is_empty());
        assert!(endpoints[0].source.as_deref().unwrap().contains("meta-analysis"));

        let baselines = table.baselines_for("NCT99999999", true);
        assert_eq!(baselines.len(), 6);
    }

    #[test]
    fn test_default_disabled() {
        let table = LiteratureTable::builtin().unwrap();
        assert!(table.endpoints_for("NCT99999999", false).is_empty());
        assert!(table.baselines_for("NCT99999999", false).is_empty());
        assert!(!table.baselines_for("NCT01106014", false).is_empty());
    }

    #[test]
    fn test_from_json_requires_version() {
        assert!(LiteratureTable::from_json(r#"{"version": "", "endpoints": {}}"#).is_err());
        let table = LiteratureTable::from_json(r#"{"version": "test"}"#).unwrap();
        assert!(table.endpoints_for("DEFAULT", true).is_empty());
    }
}
