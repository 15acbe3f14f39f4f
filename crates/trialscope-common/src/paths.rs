//! On-disk layout for raw downloads, processed data and outputs.
//!
//! ```text
//! <root>/raw/clinical_trials
//! <root>/raw/sec_filings/{10k,8k}
//! <root>/raw/publications
//! <root>/processed
//! <root>/outputs/json
//! <root>/outputs/visualizations
//! ```

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_clinical_trials(&self) -> PathBuf {
        self.root.join("raw").join("clinical_trials")
    }

    /// Raw filing directory for a form type (`10-K` → `raw/sec_filings/10k`).
    pub fn raw_filings(&self, form: &str) -> PathBuf {
        let dir: String = form
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        self.root.join("raw").join("sec_filings").join(dir)
    }

    pub fn raw_publications(&self) -> PathBuf {
        self.root.join("raw").join("publications")
    }

    pub fn processed(&self) -> PathBuf {
        self.root.join("processed")
    }

    /// Directory holding one `<NCT>.json` record per trial.
    pub fn json_dir(&self) -> PathBuf {
        self.root.join("outputs").join("json")
    }

    pub fn visualizations(&self) -> PathBuf {
        self.root.join("outputs").join("visualizations")
    }

    /// Create every directory of the layout.
    pub fn create_all(&self) -> std::io::Result<()> {
        for dir in [
            self.raw_clinical_trials(),
            self.raw_filings("10-K"),
            self.raw_filings("8-K"),
            self.raw_publications(),
            self.processed(),
            self.json_dir(),
            self.visualizations(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

impl Default for DataPaths {
    fn default() -> Self {
        Self::new("data")
    }
}
