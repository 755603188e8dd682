//! Pipeline entry points and the text-processing stages they use.
//!
//! - `RunOrchestrator`: init / run / rerun-failed over a target list
//! - `run_validate`: check configuration and registry files

pub mod classify;
pub mod diff;
pub mod normalize;
pub mod quality;
pub mod run;
pub mod validate;

pub use run::RunOrchestrator;
pub use validate::{ValidationReport, run_validate};
