//! End-to-end processing pipeline.
//!
//! For one job:
//!   1. Select public-company trials for a condition from the registry
//!   2. For each trial, sequentially: filings, publications
//!   3. Derive the study descriptor and run both extraction chains
//!   4. Write `<NCT>.json` to the record store
//!   5. Emit progress events via broadcast channel
//!
//! Source failures are logged and collected; they never abort the run.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use trialscope_common::record::{Filing, Publications, TrialRecord};
use trialscope_common::{Result, TrialscopeError};
use crate::extract::{ExtractionChains, TrialInputs};
use crate::repository::{record_files, JsonRecordStore};
use crate::sources::{FilingSource, PublicationSource, RegistrySource};
use crate::study::extract_study_info;

// ── Job config ────────────────────────────────────────────────────────────────

/// Parameters for a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineJob {
    pub condition: String,
    /// Maximum number of trials to process.
    pub limit: usize,
    /// Filing form types to collect, e.g. `10-K`.
    pub forms: Vec<String>,
    pub limit_per_form: usize,
}

impl Default for PipelineJob {
    fn default() -> Self {
        Self {
            condition: "Pulmonary Arterial Hypertension".to_string(),
            limit: 5,
            forms: vec!["10-K".to_string(), "8-K".to_string()],
            limit_per_form: 3,
        }
    }
}

/// The three source clients a run reads from.
pub struct PipelineSources<'a> {
    pub registry: &'a dyn RegistrySource,
    pub filings: &'a dyn FilingSource,
    pub publications: &'a dyn PublicationSource,
}

// ── Progress events ───────────────────────────────────────────────────────────

/// Progress event emitted during a pipeline run (cloneable for broadcast).
#[derive(Debug, Clone, Serialize)]
pub struct PipelineProgress {
    pub stage: String,
    pub message: String,
    pub nct_id: Option<String>,
    pub trials_found: usize,
    pub records_saved: usize,
}

// ── Result summary ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineResult {
    pub trials_found: usize,
    pub records_saved: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

// ── Record processing ─────────────────────────────────────────────────────────

/// Build the canonical record for one raw registry document.
///
/// Fails only when the document carries no registry identifier.
pub fn process_record(
    raw: &Value,
    sec_filings: BTreeMap<String, Vec<Filing>>,
    publications: Publications,
    chains: &ExtractionChains,
) -> Result<TrialRecord> {
    let clinical_study = extract_study_info(raw);
    if clinical_study.nct_identifier.is_empty() {
        return Err(TrialscopeError::Pipeline(
            "raw document has no nctId".to_string(),
        ));
    }

    let inputs = TrialInputs {
        nct_id: &clinical_study.nct_identifier,
        raw,
        publications: &publications,
    };
    let endpoints = chains.endpoints.run(&inputs);
    let baseline_measures = chains.baselines.run(&inputs);
    debug!(
        nct_id = %clinical_study.nct_identifier,
        endpoints = endpoints.len(),
        baselines = baseline_measures.len(),
        "record processed"
    );

    Ok(TrialRecord {
        clinical_study,
        sec_filings,
        publications,
        endpoints,
        baseline_measures,
    })
}

/// [`process_record`] then write it to the store. Returns the written path.
pub fn process_and_save(
    raw: &Value,
    sec_filings: BTreeMap<String, Vec<Filing>>,
    publications: Publications,
    chains: &ExtractionChains,
    store: &JsonRecordStore,
) -> Result<PathBuf> {
    let record = process_record(raw, sec_filings, publications, chains)?;
    let path = store.save(&record)?;
    info!(nct_id = %record.nct_id(), path = %path.display(), "saved processed trial");
    Ok(path)
}

// ── Pipeline orchestrator ─────────────────────────────────────────────────────

/// Runs the fetch → process → save pipeline for one job.
///
/// Progress events are sent via `progress_tx` if provided.
#[instrument(skip(sources, store, chains, progress_tx))]
pub async fn run_pipeline(
    job: PipelineJob,
    sources: PipelineSources<'_>,
    store: &JsonRecordStore,
    chains: &ExtractionChains,
    progress_tx: Option<broadcast::Sender<PipelineProgress>>,
) -> PipelineResult {
    let t0 = std::time::Instant::now();
    let mut result = PipelineResult::default();

    let emit = |stage: &str, message: String, nct_id: Option<&str>, result: &PipelineResult| {
        if let Some(ref tx) = progress_tx {
            let _ = tx.send(PipelineProgress {
                stage: stage.to_string(),
                message,
                nct_id: nct_id.map(String::from),
                trials_found: result.trials_found,
                records_saved: result.records_saved,
            });
        }
    };

    info!(condition = %job.condition, limit = job.limit, "starting pipeline");
    emit("search", format!("Searching trials for {}", job.condition), None, &result);

    // ── 1. Trials ────────────────────────────────────────────────────────────
    let trials = match sources.registry.public_company_trials(&job.condition, job.limit).await {
        Ok(t) => t,
        Err(e) => {
            let msg = format!("registry search failed: {e}");
            warn!("{}", &msg);
            result.errors.push(msg);
            Vec::new()
        }
    };
    result.trials_found = trials.len();
    emit("search", format!("{} trials selected", trials.len()), None, &result);

    // ── 2. Per trial, sequentially ───────────────────────────────────────────
    for raw in trials.iter().take(job.limit) {
        let study = extract_study_info(raw);
        let nct_id = study.nct_identifier.clone();
        if nct_id.is_empty() {
            result.errors.push("registry returned a study without nctId".to_string());
            continue;
        }
        info!(nct_id = %nct_id, sponsor = %study.sponsor, "processing trial");

        emit("filings", format!("Fetching filings for {}", study.sponsor), Some(&nct_id), &result);
        let sec_filings = match sources
            .filings
            .filings_mentioning_trial(&study.sponsor, &study.title, &nct_id, &job.forms, job.limit_per_form)
            .await
        {
            Ok(f) => f,
            Err(e) => {
                let msg = format!("filings for {nct_id} failed: {e}");
                warn!("{}", &msg);
                result.errors.push(msg);
                BTreeMap::new()
            }
        };

        emit("publications", format!("Searching publications for {nct_id}"), Some(&nct_id), &result);
        let publications = match sources.publications.publications_for_trial(&study).await {
            Ok(p) => p,
            Err(e) => {
                let msg = format!("publications for {nct_id} failed: {e}");
                warn!("{}", &msg);
                result.errors.push(msg);
                Publications::default()
            }
        };

        match process_and_save(raw, sec_filings, publications, chains, store) {
            Ok(_) => {
                result.records_saved += 1;
                emit("save", format!("Saved {nct_id}"), Some(&nct_id), &result);
            }
            Err(e) => {
                let msg = format!("saving {nct_id} failed: {e}");
                warn!("{}", &msg);
                result.errors.push(msg);
            }
        }
    }

    result.duration_ms = t0.elapsed().as_millis() as u64;
    info!(
        trials_found = result.trials_found,
        records_saved = result.records_saved,
        errors = result.errors.len(),
        duration_ms = result.duration_ms,
        "pipeline complete"
    );
    emit("complete", "Pipeline complete".to_string(), None, &result);
    result
}

/// Rebuild records from the raw registry documents saved in `raw_dir`.
///
/// Filings and publications of an already-stored record are carried over;
/// everything else is recomputed.
#[instrument(skip(store, chains))]
pub fn reprocess_raw_dir(
    raw_dir: &Path,
    store: &JsonRecordStore,
    chains: &ExtractionChains,
) -> PipelineResult {
    let t0 = std::time::Instant::now();
    let mut result = PipelineResult::default();

    let files = record_files(raw_dir);
    result.trials_found = files.len();
    info!(n = files.len(), dir = %raw_dir.display(), "reprocessing raw registry documents");

    for path in files {
        let raw: Value = match fs::read_to_string(&path)
            .map_err(TrialscopeError::from)
            .and_then(|text| serde_json::from_str(&text).map_err(TrialscopeError::from))
        {
            Ok(v) => v,
            Err(e) => {
                let msg = format!("{}: {e}", path.display());
                warn!("{}", &msg);
                result.errors.push(msg);
                continue;
            }
        };

        let (sec_filings, publications) = crate::study::nct_id(&raw)
            .and_then(|id| store.load(id).ok())
            .map(|prev| (prev.sec_filings, prev.publications))
            .unwrap_or_default();

        match process_and_save(&raw, sec_filings, publications, chains, store) {
            Ok(_) => result.records_saved += 1,
            Err(e) => {
                let msg = format!("{}: {e}", path.display());
                warn!("{}", &msg);
                result.errors.push(msg);
            }
        }
    }

    result.duration_ms = t0.elapsed().as_millis() as u64;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;
    use trialscope_common::record::{Arm, StudyInfo, Tier};

    use crate::extract::LiteratureTable;

    fn chains() -> ExtractionChains {
        ExtractionChains::new(Arc::new(LiteratureTable::builtin().unwrap()), true)
    }

    fn raw_study(nct: &str) -> Value {
        json!({
            "protocolSection": {
                "identificationModule": { "nctId": nct, "briefTitle": "A Study of Macitentan" },
                "sponsorCollaboratorsModule": { "leadSponsor": { "name": "Actelion", "class": "INDUSTRY" } },
                "conditionsModule": { "conditions": ["Pulmonary Arterial Hypertension"] }
            }
        })
    }

    struct FakeRegistry(Vec<Value>);

    #[async_trait]
    impl RegistrySource for FakeRegistry {
        async fn public_company_trials(&self, _condition: &str, limit: usize) -> anyhow::Result<Vec<Value>> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }
        async fn study(&self, _nct_id: &str) -> anyhow::Result<Value> {
            anyhow::bail!("not used")
        }
    }

    struct FailingFilings;

    #[async_trait]
    impl FilingSource for FailingFilings {
        async fn filings_mentioning_trial(
            &self,
            _company: &str,
            _trial_name: &str,
            _nct_id: &str,
            _forms: &[String],
            _limit_per_form: usize,
        ) -> anyhow::Result<BTreeMap<String, Vec<Filing>>> {
            anyhow::bail!("upstream unavailable")
        }
    }

    struct NoPublications;

    #[async_trait]
    impl PublicationSource for NoPublications {
        async fn publications_for_trial(&self, _study: &StudyInfo) -> anyhow::Result<Publications> {
            Ok(Publications::default())
        }
    }

    #[test]
    fn test_process_record_without_id_fails() {
        let err = process_record(&json!({}), BTreeMap::new(), Publications::default(), &chains());
        assert!(matches!(err, Err(TrialscopeError::Pipeline(_))));
    }

    #[test]
    fn test_process_record_falls_back_to_literature() {
        let record = process_record(
            &raw_study("NCT00660179"),
            BTreeMap::new(),
            Publications::default(),
            &chains(),
        )
        .unwrap();
        assert_eq!(record.nct_id(), "NCT00660179");
        assert!(!record.endpoints.is_empty());
        assert!(record.endpoints.iter().all(|e| e.tier == Some(Tier::Literature)));
        assert!(record.endpoints.iter().any(|e| e.arm == Arm::Placebo));
    }

    #[tokio::test]
    async fn test_run_pipeline_collects_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonRecordStore::new(dir.path());
        let registry = FakeRegistry(vec![raw_study("NCT00000001"), raw_study("NCT00000002"), json!({})]);
        let (tx, mut rx) = broadcast::channel(64);

        let result = run_pipeline(
            PipelineJob { limit: 3, ..Default::default() },
            PipelineSources { registry: &registry, filings: &FailingFilings, publications: &NoPublications },
            &store,
            &chains(),
            Some(tx),
        )
        .await;

        assert_eq!(result.trials_found, 3);
        assert_eq!(result.records_saved, 2);
        // two filing failures plus the study without an id
        assert_eq!(result.errors.len(), 3);
        assert_eq!(store.count(), 2);

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        assert_eq!(last.map(|e| e.stage), Some("complete".to_string()));
    }

    #[test]
    fn test_reprocess_keeps_publications() {
        let raw_dir = tempfile::tempdir().unwrap();
        let json_dir = tempfile::tempdir().unwrap();
        let store = JsonRecordStore::new(json_dir.path());

        fs::write(
            raw_dir.path().join("NCT00660179.json"),
            serde_json::to_string(&raw_study("NCT00660179")).unwrap(),
        )
        .unwrap();
        fs::write(raw_dir.path().join("NCT00000009.json"), "oops").unwrap();

        let mut previous = process_record(
            &raw_study("NCT00660179"),
            BTreeMap::new(),
            Publications::default(),
            &chains(),
        )
        .unwrap();
        previous.publications.scientific_publications.push(Default::default());
        store.save(&previous).unwrap();

        let result = reprocess_raw_dir(raw_dir.path(), &store, &chains());
        assert_eq!(result.trials_found, 2);
        assert_eq!(result.records_saved, 1);
        assert_eq!(result.errors.len(), 1);

        let rebuilt = store.load("NCT00660179").unwrap();
        assert_eq!(rebuilt.publications.scientific_publications.len(), 1);
    }
}
