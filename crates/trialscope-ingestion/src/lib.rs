//! trialscope-ingestion — Fetch, normalise and extract clinical-trial records.
//! - Source clients (ClinicalTrials.gov, FMP filings, web search)
//! - Study descriptor derivation and name normalisation
//! - Endpoint / baseline extraction with tiered fallback
//! - JSON record store, processing pipeline, reporting

pub mod dedup;
pub mod extract;
pub mod mentions;
pub mod normalise;
pub mod pdf_text;
pub mod pipeline;
pub mod report;
pub mod repository;
pub mod sources;
pub mod study;

pub use extract::{ExtractionChains, LiteratureTable};
pub use pipeline::{process_and_save, process_record, reprocess_raw_dir, run_pipeline, PipelineJob, PipelineResult, PipelineSources};
pub use repository::JsonRecordStore;
