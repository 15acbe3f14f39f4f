//! TrialScope relational store.
//!
//! PostgreSQL mirror of the JSON record store: one `clinical_study` row per
//! trial with its endpoints, baseline measures, filings and publications in
//! child tables.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use trialscope_db::{Database, TrialRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/trialscope").await?;
//!     db.ensure_schema().await?;
//!
//!     let trials = TrialRepository::new(Arc::new(db));
//!     println!("{} trials", trials.count().await?);
//!     Ok(())
//! }
//! ```

pub mod database;
pub mod error;
pub mod schema;
pub mod trials;

pub use database::Database;
pub use error::{DbError, Result};
pub use schema::{
    TABLE_BASELINE_MEASURES, TABLE_CLINICAL_STUDY, TABLE_ENDPOINTS, TABLE_PUBLICATIONS,
    TABLE_SEC_FILINGS,
};
pub use trials::{LoadSummary, TrialRepository};
