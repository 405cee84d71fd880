//! The analysis pipeline driver.
//!
//! Ties the stages together in order: preprocessing, cut set
//! generation, probability, uncertainty. Each stage's elapsed time is
//! recorded the way the reports expect: `exp_time` covers graph
//! expansion, `mcs_time` is cumulative through cut set generation,
//! `p_time` and `u_time` cover quantification and sampling.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use tracing::debug;

use sylva_model::{Model, Settings};

use crate::mcs::{self, McsResult};
use crate::preprocess::preprocess;
use crate::probability::{ProbabilityAnalysis, ProbabilityResult};
use crate::uncertainty::{UncertaintyAnalysis, UncertaintyResult};
use crate::AnalysisResult;

/// Structural facts of the analyzed tree.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub top_gate: String,
    pub num_basic_events: usize,
    pub num_gates: usize,
}

/// Everything one analysis run produces.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub model_name: Option<String>,
    pub summary: ModelSummary,
    pub limit_order: usize,
    pub mcs: McsResult,
    /// Graph expansion seconds.
    pub exp_time: f64,
    /// Cumulative seconds through cut set generation.
    pub mcs_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability: Option<ProbabilityResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uncertainty: Option<UncertaintyResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub u_time: Option<f64>,
    pub warnings: Vec<String>,
    pub analysis_date: DateTime<Utc>,
}

/// One fault-tree risk analysis over a model and settings.
pub struct RiskAnalysis {
    model: Model,
    settings: Settings,
}

impl RiskAnalysis {
    pub fn new(model: Model, settings: Settings) -> Self {
        Self { model, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Runs every enabled stage to completion.
    pub fn analyze(&self) -> AnalysisResult<AnalysisReport> {
        let settings = &self.settings;
        let start = Instant::now();

        let preprocessed = preprocess(&self.model, settings)?;
        let exp_time = start.elapsed().as_secs_f64();
        debug!(
            gates = preprocessed.tree.gates().len(),
            events = preprocessed.events.len(),
            "graph expansion finished"
        );

        let cut_sets = mcs::generate(&preprocessed.tree, settings.limit_order)?;
        let mcs_time = start.elapsed().as_secs_f64();
        debug!(
            count = cut_sets.cut_sets.len(),
            max_order = cut_sets.max_order,
            "cut set generation finished"
        );

        let mut warnings = Vec::new();
        let mut probability = None;
        let mut p_time = None;
        let mut uncertainty = None;
        let mut u_time = None;

        let quantify = settings.probability_analysis || settings.uncertainty_analysis;
        if quantify {
            let p_start = Instant::now();
            let mut engine =
                ProbabilityAnalysis::new(&cut_sets, &preprocessed.events, settings)?;
            let result = engine.evaluate()?;
            warnings.extend(result.warnings.iter().cloned());
            p_time = Some(p_start.elapsed().as_secs_f64());
            probability = Some(result);

            if settings.uncertainty_analysis {
                let u_start = Instant::now();
                let sampler = UncertaintyAnalysis::new(
                    engine,
                    settings.num_trials,
                    settings.effective_num_sums(),
                    settings.seed,
                );
                let result = sampler.analyze()?;
                warnings.extend(result.warnings.iter().cloned());
                u_time = Some(u_start.elapsed().as_secs_f64());
                uncertainty = Some(result);
            }
        }

        Ok(AnalysisReport {
            model_name: self.model.name.clone(),
            summary: ModelSummary {
                top_gate: self.model.top_gate()?.to_string(),
                num_basic_events: preprocessed.events.len(),
                num_gates: self.model.gates.len(),
            },
            limit_order: settings.limit_order,
            mcs: cut_sets,
            exp_time,
            mcs_time,
            probability,
            p_time,
            uncertainty,
            u_time,
            warnings,
            analysis_date: Utc::now(),
        })
    }
}
