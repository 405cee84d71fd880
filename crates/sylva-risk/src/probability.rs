//! Top-event probability from minimal cut sets.
//!
//! Cut sets re-index into flat signed-integer sets over a probability
//! array, low-probability sets fall to the cut-off, and the top event
//! evaluates either exactly through the truncated Sylvester-Poincare
//! expansion or through the rare-event or min-cut-upper-bound
//! approximations. The expansion is materialized as positive and
//! negative term lists so uncertainty trials can re-evaluate it
//! without re-expanding.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, VecDeque};

use sylva_model::{Approximation, BasicEvent, Settings};

use crate::mcs::{CutSet, Literal, McsResult};
use crate::{AnalysisError, AnalysisResult};

/// Fussell-Vesely importance of one literal.
#[derive(Debug, Clone, Serialize)]
pub struct ImportanceRecord {
    pub literal: Literal,
    /// Summed probability of the cut sets containing the literal.
    pub contribution: f64,
    /// Fraction of the top-event probability attributable to the
    /// literal.
    pub importance: f64,
}

/// Quantification results for one cut-set family.
#[derive(Debug, Clone, Serialize)]
pub struct ProbabilityResult {
    pub p_total: f64,
    /// Cut sets retained after the probability cut-off.
    pub num_prob_mcs: usize,
    /// Retained cut sets with their point probabilities.
    pub mcs_probabilities: Vec<(CutSet, f64)>,
    pub importance: Vec<ImportanceRecord>,
    pub warnings: Vec<String>,
}

/// Indexed quantification state shared with the uncertainty engine.
pub struct ProbabilityAnalysis {
    settings: Settings,
    /// Event names by index; slot 0 is a dummy.
    event_names: Vec<String>,
    /// Events by index, aligned with `event_names`.
    events: Vec<BasicEvent>,
    /// Nominal probabilities by index; slot 0 is a dummy.
    iprobs: Vec<f64>,
    /// Retained cut sets as sorted signed-index sets.
    imcs: Vec<Vec<i32>>,
    /// The retained cut sets in source form, aligned with `imcs`.
    retained: Vec<CutSet>,
    pos_terms: Vec<Vec<i32>>,
    neg_terms: Vec<Vec<i32>>,
}

impl ProbabilityAnalysis {
    /// Indexes the event table and the cut sets, applying the
    /// probability cut-off.
    pub fn new(
        mcs: &McsResult,
        events: &IndexMap<String, BasicEvent>,
        settings: &Settings,
    ) -> AnalysisResult<Self> {
        let mut event_names = vec![String::new()];
        let mut event_table = vec![BasicEvent::with_probability("", 0.0)];
        let mut iprobs = vec![0.0];
        let mut index_of: HashMap<&str, i32> = HashMap::new();
        for (name, event) in events {
            let index = event_names.len() as i32;
            event_names.push(name.clone());
            iprobs.push(event.nominal_probability(settings.mission_time)?);
            event_table.push(event.clone());
            index_of.insert(name.as_str(), index);
        }

        let mut analysis = Self {
            settings: settings.clone(),
            event_names,
            events: event_table,
            iprobs,
            imcs: Vec::new(),
            retained: Vec::new(),
            pos_terms: Vec::new(),
            neg_terms: Vec::new(),
        };

        for cut_set in &mcs.cut_sets {
            let mut indexed = Vec::with_capacity(cut_set.literals.len());
            for literal in &cut_set.literals {
                let &index = index_of.get(literal.name.as_str()).ok_or_else(|| {
                    AnalysisError::Invariant(format!(
                        "cut set literal {} is not in the event table",
                        literal.name
                    ))
                })?;
                indexed.push(if literal.complement { -index } else { index });
            }
            indexed.sort_unstable();
            if prob_and(&indexed, &analysis.iprobs) < settings.cut_off {
                continue;
            }
            analysis.imcs.push(indexed);
            analysis.retained.push(cut_set.clone());
        }
        Ok(analysis)
    }

    pub fn num_prob_mcs(&self) -> usize {
        self.imcs.len()
    }

    pub fn pos_terms(&self) -> &[Vec<i32>] {
        &self.pos_terms
    }

    pub fn neg_terms(&self) -> &[Vec<i32>] {
        &self.neg_terms
    }

    pub fn iprobs(&self) -> &[f64] {
        &self.iprobs
    }

    pub fn set_iprob(&mut self, index: i32, probability: f64) {
        self.iprobs[index as usize] = probability;
    }

    pub fn event_at(&self, index: i32) -> &BasicEvent {
        &self.events[index as usize]
    }

    pub fn event_at_mut(&mut self, index: i32) -> &mut BasicEvent {
        &mut self.events[index as usize]
    }

    /// Indices of every event occurring in a retained cut set.
    pub fn mcs_event_indices(&self) -> BTreeSet<i32> {
        self.imcs
            .iter()
            .flat_map(|set| set.iter().map(|literal| literal.abs()))
            .collect()
    }

    /// Expands the union of the retained cut sets into the alternating
    /// series truncated at `num_sums`, recording the terms, and
    /// returns its value under the current probabilities.
    pub fn expand_series(&mut self, num_sums: usize) -> f64 {
        self.pos_terms.clear();
        self.neg_terms.clear();
        let ordered: BTreeSet<Vec<i32>> = self.imcs.iter().cloned().collect();
        self.prob_or(true, num_sums, ordered.into_iter().collect())
    }

    /// `P(A1 | ... | An) = P(A1) + P(rest) - P(A1 & rest)`, cut off at
    /// `num_sums` nested intersections.
    fn prob_or(&mut self, positive: bool, num_sums: usize, mut sets: VecDeque<Vec<i32>>) -> f64 {
        if num_sums == 0 {
            return 0.0;
        }
        let mut total = 0.0;
        while let Some(element) = sets.pop_front() {
            total += prob_and(&element, &self.iprobs);
            if positive {
                self.pos_terms.push(element.clone());
            } else {
                self.neg_terms.push(element.clone());
            }
            if sets.is_empty() {
                break;
            }
            let combined = combine_element(&element, &sets);
            total -= self.prob_or(!positive, num_sums - 1, combined);
        }
        total
    }

    /// Quantifies the top event and, when requested, the importance
    /// table.
    pub fn evaluate(&mut self) -> AnalysisResult<ProbabilityResult> {
        let mut warnings = Vec::new();
        let p_total = match self.settings.approximation {
            Approximation::None => self.expand_series(self.settings.num_sums),
            Approximation::RareEvent => self.expand_series(1),
            Approximation::Mcub => {
                let mut complement = 1.0;
                for set in &self.imcs {
                    complement *= 1.0 - prob_and(set, &self.iprobs);
                }
                1.0 - complement
            }
        };
        if p_total.is_nan() || p_total < 0.0 {
            return Err(AnalysisError::Invariant(format!(
                "total probability evaluated to {}",
                p_total
            )));
        }
        if p_total > 1.0 {
            warnings.push(format!(
                "the total probability {:.6e} is invalid; the approximations or the series \
                 truncation are not suitable for this model",
                p_total
            ));
        }

        let mcs_probabilities: Vec<(CutSet, f64)> = self
            .retained
            .iter()
            .zip(&self.imcs)
            .map(|(cut_set, indexed)| (cut_set.clone(), prob_and(indexed, &self.iprobs)))
            .collect();

        let importance = if self.settings.importance_analysis {
            self.importance(p_total)
        } else {
            Vec::new()
        };

        Ok(ProbabilityResult {
            p_total,
            num_prob_mcs: self.imcs.len(),
            mcs_probabilities,
            importance,
            warnings,
        })
    }

    /// Fussell-Vesely: the summed contribution of the cut sets
    /// containing a literal over the total, descending.
    fn importance(&self, p_total: f64) -> Vec<ImportanceRecord> {
        let mut contributions: IndexMap<i32, f64> = IndexMap::new();
        for set in &self.imcs {
            let p = prob_and(set, &self.iprobs);
            for &literal in set {
                *contributions.entry(literal).or_insert(0.0) += p;
            }
        }
        let mut records: Vec<ImportanceRecord> = contributions
            .into_iter()
            .map(|(literal, contribution)| ImportanceRecord {
                literal: Literal {
                    name: self.event_names[literal.unsigned_abs() as usize].clone(),
                    complement: literal < 0,
                },
                contribution,
                importance: if p_total > 0.0 {
                    contribution / p_total
                } else {
                    0.0
                },
            })
            .collect();
        records.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.literal.cmp(&b.literal))
        });
        records
    }
}

/// Product probability of a signed conjunction: `p(i)` for a positive
/// literal, `1 - p(|i|)` for a complemented one. The empty set is the
/// certain event.
pub fn prob_and(term: &[i32], iprobs: &[f64]) -> f64 {
    let mut product = 1.0;
    for &literal in term {
        if literal > 0 {
            product *= iprobs[literal as usize];
        } else {
            product *= 1.0 - iprobs[(-literal) as usize];
        }
    }
    product
}

/// Unions one set into each member of a family, dropping impossible
/// results; the output is ordered and deduplicated.
fn combine_element(element: &[i32], sets: &VecDeque<Vec<i32>>) -> VecDeque<Vec<i32>> {
    let mut combined: BTreeSet<Vec<i32>> = BTreeSet::new();
    'outer: for set in sets {
        let mut union: Vec<i32> = element.iter().chain(set.iter()).copied().collect();
        union.sort_unstable();
        union.dedup();
        for &literal in &union {
            if union.binary_search(&-literal).is_ok() {
                continue 'outer;
            }
        }
        combined.insert(union);
    }
    combined.into_iter().collect()
}
