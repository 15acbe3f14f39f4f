//! File-backed record store: one pretty-printed `<NCT>.json` per trial.
//!
//! This is the fallback read path of the API and the input of the database
//! loader and the reports. Writes replace the whole file.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use trialscope_common::query::{compare_records, EndpointComparison, TrialFilter, TrialSummary};
use trialscope_common::record::TrialRecord;
use trialscope_common::{Result, TrialscopeError};

#[derive(Debug, Clone)]
pub struct JsonRecordStore {
    dir: PathBuf,
}

impl JsonRecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File for `nct_id`, or `None` when the id could name a path outside
    /// the store.
    pub fn path_for(&self, nct_id: &str) -> Option<PathBuf> {
        is_valid_id(nct_id).then(|| self.dir.join(format!("{}.json", nct_id)))
    }

    /// Write a record, replacing any previous file for the same trial.
    pub fn save(&self, record: &TrialRecord) -> Result<PathBuf> {
        let nct_id = record.nct_id();
        let Some(path) = self.path_for(nct_id) else {
            return Err(TrialscopeError::Pipeline(format!(
                "invalid registry identifier: {:?}",
                nct_id
            )));
        };
        fs::create_dir_all(&self.dir)?;
        fs::write(&path, serde_json::to_string_pretty(record)?)?;
        debug!(path = %path.display(), "record saved");
        Ok(path)
    }

    pub fn load(&self, nct_id: &str) -> Result<TrialRecord> {
        let path = match self.path_for(nct_id) {
            Some(path) if is_record_file(&path) && path.is_file() => path,
            _ => return Err(TrialscopeError::RecordNotFound(nct_id.to_string())),
        };
        let text = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Every readable record, ordered by file name. Unreadable files are
    /// skipped with a warning.
    pub fn load_all(&self) -> Vec<TrialRecord> {
        record_files(&self.dir)
            .into_iter()
            .filter_map(|path| match read_record(&path) {
                Ok(record) if !record.nct_id().is_empty() => Some(record),
                Ok(_) => {
                    warn!(path = %path.display(), "record without identifier skipped");
                    None
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unreadable record skipped");
                    None
                }
            })
            .collect()
    }

    pub fn count(&self) -> usize {
        self.load_all().len()
    }

    /// Filtered, paged listing. `id` is the 1-based position in the store.
    pub fn list_summaries(&self, filter: &TrialFilter) -> Vec<TrialSummary> {
        self.load_all()
            .iter()
            .enumerate()
            .filter(|(_, r)| filter.matches(&r.clinical_study))
            .skip(filter.skip)
            .take(filter.limit)
            .map(|(i, r)| TrialSummary::from_study(i as i64 + 1, &r.clinical_study))
            .collect()
    }

    pub fn compare_endpoint(&self, name: &str, include_placebo: bool) -> Vec<EndpointComparison> {
        compare_records(&self.load_all(), name, include_placebo)
    }
}

/// Registry identifiers are plain ASCII alphanumerics, e.g. `NCT01106014`.
pub fn is_valid_id(nct_id: &str) -> bool {
    !nct_id.is_empty() && nct_id.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn read_record(path: &Path) -> Result<TrialRecord> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn is_record_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else { return false };
    name.starts_with("NCT") && name.ends_with(".json")
}

/// `NCT*.json` files in `dir`, sorted. A missing directory yields nothing.
pub fn record_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else { return Vec::new() };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_record_file(p))
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use trialscope_common::record::{Arm, Endpoint, StudyInfo};

    fn record(nct: &str, sponsor: &str, arms: &[(Arm, f64)]) -> TrialRecord {
        TrialRecord {
            clinical_study: StudyInfo {
                title: format!("Study {}", nct),
                nct_identifier: nct.to_string(),
                indication: "Pulmonary Arterial Hypertension".to_string(),
                sponsor: sponsor.to_string(),
                ..Default::default()
            },
            endpoints: arms
                .iter()
                .map(|(arm, v)| Endpoint {
                    name: "6-Minute Walk Distance".to_string(),
                    canonical_name: Some("6MWD".to_string()),
                    description: String::new(),
                    timepoint: "Week 24".to_string(),
                    arm: *arm,
                    average_value: Some(*v),
                    upper_end: None,
                    lower_end: None,
                    statistical_significance: "p=0.008".to_string(),
                    source: None,
                    context: None,
                    tier: None,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonRecordStore::new(dir.path());
        let original = record("NCT00660179", "Actelion", &[(Arm::Intervention, 22.0)]);

        let path = store.save(&original).unwrap();
        assert!(path.ends_with("NCT00660179.json"));
        assert_eq!(store.load("NCT00660179").unwrap(), original);
        assert!(matches!(
            store.load("NCT99999999"),
            Err(TrialscopeError::RecordNotFound(_))
        ));
    }

    #[test]
    fn test_save_overwrites_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonRecordStore::new(dir.path());
        store.save(&record("NCT00660179", "Actelion", &[(Arm::Intervention, 1.0), (Arm::Placebo, 2.0)])).unwrap();
        store.save(&record("NCT00660179", "Actelion", &[(Arm::Intervention, 3.0)])).unwrap();
        assert_eq!(store.load("NCT00660179").unwrap().endpoints.len(), 1);
    }

    #[test]
    fn test_bad_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonRecordStore::new(dir.path());
        store.save(&record("NCT00000001", "Merck", &[])).unwrap();
        fs::write(dir.path().join("NCT00000002.json"), "{ not json").unwrap();
        fs::write(dir.path().join("notes.json"), "{}").unwrap();

        let all = store.load_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].nct_id(), "NCT00000001");
    }

    #[test]
    fn test_list_summaries_filters_and_pages() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonRecordStore::new(dir.path());
        store.save(&record("NCT00000001", "Merck Sharp & Dohme", &[])).unwrap();
        store.save(&record("NCT00000002", "Actelion", &[])).unwrap();
        store.save(&record("NCT00000003", "Merck KGaA", &[])).unwrap();

        let merck = store.list_summaries(&TrialFilter { sponsor: Some("merck".to_string()), ..Default::default() });
        assert_eq!(merck.len(), 2);
        assert_eq!(merck[0].id, 1);
        assert_eq!(merck[1].id, 3);

        let page = store.list_summaries(&TrialFilter { skip: 1, limit: 1, ..Default::default() });
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].nct_identifier, "NCT00000002");
    }

    #[test]
    fn test_compare_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonRecordStore::new(dir.path());
        store
            .save(&record("NCT00660179", "Actelion", &[(Arm::Intervention, 22.0), (Arm::Placebo, -8.0)]))
            .unwrap();

        assert_eq!(store.compare_endpoint("walk", true).len(), 2);
        let rows = store.compare_endpoint("WALK", false);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].arm, Arm::Intervention);
        assert_eq!(rows[0].value, Some(22.0));
        assert!(store.compare_endpoint("PVR", true).is_empty());
    }

    #[test]
    fn test_ids_cannot_escape_the_store() {
        let root = tempfile::tempdir().unwrap();
        let json_dir = root.path().join("json");
        let store = JsonRecordStore::new(&json_dir);
        // A valid record one level up must stay unreachable.
        JsonRecordStore::new(root.path())
            .save(&record("NCT00000001", "Merck", &[]))
            .unwrap();

        assert!(store.path_for("../NCT00000001").is_none());
        assert!(matches!(
            store.load("../NCT00000001"),
            Err(TrialscopeError::RecordNotFound(_))
        ));
        assert!(matches!(
            store.save(&record("../NCT00000002", "Merck", &[])),
            Err(TrialscopeError::Pipeline(_))
        ));
        assert!(matches!(store.save(&record("", "Merck", &[])), Err(TrialscopeError::Pipeline(_))));
        assert!(!root.path().join("NCT00000002.json").exists());
        assert!(is_valid_id("NCT01106014"));
        assert!(!is_valid_id("NCT0110/6014"));
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let store = JsonRecordStore::new("/nonexistent/trialscope/json");
        assert!(store.load_all().is_empty());
        assert_eq!(store.count(), 0);
    }
}
