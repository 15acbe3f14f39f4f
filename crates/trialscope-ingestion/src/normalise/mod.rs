//! Name normalisation.
//!
//! Two normalisers are provided:
//! - `AliasNormaliser`: maps outcome/measure names → canonical endpoint labels
//! - `drug`: derives dose, frequency and formulation from free-text descriptions

pub mod aliases;
pub mod drug;

pub use aliases::{AliasCategory, AliasNormaliser};
pub use drug::{extract_dose, extract_formulation, extract_frequency};
