//! Analytical core of the Sylva risk analysis engine.
//!
//! The pipeline normalizes a source model into an indexed AND/OR graph
//! ([`graph`], [`preprocess`]), expands it into minimal cut sets
//! ([`mcs`]), quantifies the top event ([`probability`]), and
//! propagates parameter uncertainty by Monte Carlo ([`uncertainty`]).
//! [`analysis`] drives the stages and [`report`] renders the results.

use thiserror::Error;

pub mod analysis;
pub mod graph;
pub mod mcs;
pub mod preprocess;
pub mod probability;
pub mod random;
pub mod report;
pub mod uncertainty;

pub use analysis::{AnalysisReport, RiskAnalysis};
pub use graph::{GateState, GateType, IGate, IndexedFaultTree};
pub use random::Random;

/// Errors of the analytical core.
///
/// Invariant violations indicate a bug in preprocessing or expansion,
/// never bad user input; input problems are rejected at the model
/// boundary before any analysis starts.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Model(#[from] sylva_model::ModelError),
    #[error("invariant violation: {0}")]
    Invariant(String),
    #[error("value error: {0}")]
    Value(String),
}

/// Result alias for core operations.
pub type AnalysisResult<T> = Result<T, AnalysisError>;
