//! trialscope-common — Record types, errors, and shared plumbing used across all TrialScope crates.

pub mod error;
pub mod record;
pub mod paths;
pub mod query;
pub mod sandbox;

pub use error::{ApiError, Result, TrialscopeError};
pub use paths::DataPaths;
pub use query::{EndpointComparison, TrialFilter, TrialSummary};
pub use record::{
    Arm, ArmCounts, BaselineMeasure, CompanyPresentation, DrugDescriptor, Endpoint,
    ExtractedClinicalData, Filing, KeywordFinding,
    MentionContext, Publications, ScientificPublication, StudyInfo, Tier, TrialRecord,
};
