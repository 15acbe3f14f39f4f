//! trialscope-web — Query API and dashboard for TrialScope
//! Provides:
//!   - Trial listing, detail and endpoint comparison (JSON)
//!   - Health check
//!   - HTML dashboard
//!
//! Every data route reads PostgreSQL when configured and falls back to the
//! JSON record store on any database error.

pub mod handlers;
pub mod router;
pub mod state;

pub use router::{build_router, serve};
pub use state::{AppState, SharedState};
