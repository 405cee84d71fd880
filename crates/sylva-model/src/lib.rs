//! Source fault-tree models for the Sylva risk analysis engine.
//!
//! A [`Model`] is the normalized in-memory representation the analytical
//! core consumes: named basic events with probabilities and optional
//! uncertainty distributions, house events fixed to a Boolean constant,
//! and gates defined by Boolean formulas. Common-cause failure groups
//! expand member events into correlated sub-formulas before analysis.
//!
//! The crate also carries [`Settings`] (checked analysis options) and
//! [`Project`] (a serde-loaded project file naming inputs, outputs, and
//! option blocks).

use thiserror::Error;

pub mod ccf;
pub mod config;
pub mod event;
pub mod formula;
pub mod model;
pub mod settings;

pub use ccf::CcfGroup;
pub use config::Project;
pub use event::{BasicEvent, HouseEvent, Uncertainty};
pub use formula::{Connective, Formula};
pub use model::Model;
pub use settings::{Approximation, Settings};

/// Errors raised while building or validating a source model.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("duplicate event or gate name: {0}")]
    DuplicateName(String),
    #[error("unresolved reference: {0}")]
    Unresolved(String),
    #[error("cyclic gate definition through: {0}")]
    CyclicGate(String),
    #[error("no top gate: the model defines no gates or every gate is referenced")]
    NoTopGate,
    #[error("basic event {0}: exactly one of probability or rate must be given")]
    AmbiguousLikelihood(String),
    #[error("basic event {0}: probability {1} is outside [0, 1]")]
    ProbabilityRange(String, f64),
    #[error("basic event {0}: rate {1} is negative")]
    NegativeRate(String, f64),
    #[error("ccf group {0}: {1}")]
    CcfGroup(String, String),
    #[error("formula error in gate {0}: {1}")]
    Formula(String, String),
}

/// Result alias for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
