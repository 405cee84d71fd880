//! Minimal cut set generation.
//!
//! The preprocessed graph expands bottom-up: an OR gate's cut-set
//! family is the union of its children's families, an AND gate's the
//! pairwise-merged product. Candidates above the order limit are never
//! constructed, sets containing a literal and its complement are
//! impossible and dropped, and every family is reduced to its minimal
//! members. Module gates expand once and are reused from a memo.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;

use crate::graph::{GateState, GateType, IndexedFaultTree};
use crate::{AnalysisError, AnalysisResult};

/// One signed basic-event token of a cut set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Literal {
    pub name: String,
    /// True for a complemented event, printed as `NOT <name>`.
    pub complement: bool,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.complement {
            write!(f, "NOT {}", self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// A minimal cut set: literals ordered by name, then polarity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct CutSet {
    pub literals: Vec<Literal>,
}

impl CutSet {
    pub fn order(&self) -> usize {
        self.literals.len()
    }
}

impl fmt::Display for CutSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.literals.is_empty() {
            return write!(f, "{{}}");
        }
        let tokens: Vec<String> = self.literals.iter().map(Literal::to_string).collect();
        write!(f, "{{{}}}", tokens.join(", "))
    }
}

/// The cut-set family of one analysis.
#[derive(Debug, Clone, Serialize)]
pub struct McsResult {
    /// Mutually minimal cut sets in canonical order.
    pub cut_sets: Vec<CutSet>,
    /// Largest observed cut-set cardinality.
    pub max_order: usize,
    /// Counts per order, indexed `0..=limit_order`.
    pub distribution: Vec<usize>,
}

/// Sorted signed-index set; the working representation.
type IndexSet = Vec<i32>;

/// Expands the preprocessed tree into minimal cut sets of at most
/// `limit_order` literals.
pub fn generate(tree: &IndexedFaultTree, limit_order: usize) -> AnalysisResult<McsResult> {
    tree.check_normalized()?;
    let mut memo: HashMap<i32, Vec<IndexSet>> = HashMap::new();
    let family = expand_gate(tree, tree.top_event_index(), limit_order, &mut memo)?;
    let family = minimize(family);

    let mut cut_sets: Vec<CutSet> = family
        .into_iter()
        .map(|set| CutSet {
            literals: set
                .iter()
                .map(|&literal| Literal {
                    name: tree.event_name(literal.abs()).to_string(),
                    complement: literal < 0,
                })
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        })
        .collect();
    cut_sets.sort_by(|a, b| a.order().cmp(&b.order()).then_with(|| a.cmp(b)));

    let max_order = cut_sets.iter().map(CutSet::order).max().unwrap_or(0);
    let mut distribution = vec![0; limit_order + 1];
    for set in &cut_sets {
        distribution[set.order()] += 1;
    }
    Ok(McsResult {
        cut_sets,
        max_order,
        distribution,
    })
}

fn expand_gate(
    tree: &IndexedFaultTree,
    index: i32,
    limit: usize,
    memo: &mut HashMap<i32, Vec<IndexSet>>,
) -> AnalysisResult<Vec<IndexSet>> {
    if let Some(cached) = memo.get(&index) {
        return Ok(cached.clone());
    }
    let gate = tree.gate(index);
    let family = match gate.state() {
        // A nulled gate cannot fail; a unity gate fails on its own.
        GateState::Null => Vec::new(),
        GateState::Unity => vec![Vec::new()],
        GateState::Normal => match gate.gate_type() {
            GateType::Or => {
                let mut family = Vec::new();
                for &child in gate.children() {
                    family.extend(child_family(tree, child, limit, memo)?);
                }
                minimize(family)
            }
            GateType::And => {
                let mut accumulated: Vec<IndexSet> = vec![Vec::new()];
                for &child in gate.children() {
                    let child_sets = child_family(tree, child, limit, memo)?;
                    let mut product = Vec::new();
                    for left in &accumulated {
                        for right in &child_sets {
                            if let Some(merged) = merge(left, right, limit) {
                                product.push(merged);
                            }
                        }
                    }
                    accumulated = minimize(product);
                    if accumulated.is_empty() {
                        break;
                    }
                }
                accumulated
            }
            GateType::Null => {
                let &child = gate.children().iter().next().ok_or_else(|| {
                    AnalysisError::Invariant(format!("pass-through gate {} has no child", index))
                })?;
                child_family(tree, child, limit, memo)?
            }
            other => {
                return Err(AnalysisError::Invariant(format!(
                    "gate {} of type {:?} reached cut set expansion",
                    index, other
                )))
            }
        },
    };
    if gate.is_module() {
        memo.insert(index, family.clone());
    }
    Ok(family)
}

fn child_family(
    tree: &IndexedFaultTree,
    child: i32,
    limit: usize,
    memo: &mut HashMap<i32, Vec<IndexSet>>,
) -> AnalysisResult<Vec<IndexSet>> {
    let target = child.abs();
    if !tree.is_gate_index(target) {
        if limit == 0 {
            return Ok(Vec::new());
        }
        return Ok(vec![vec![child]]);
    }
    if child < 0 {
        return Err(AnalysisError::Invariant(format!(
            "complemented gate edge {} survived preprocessing",
            child
        )));
    }
    expand_gate(tree, target, limit, memo)
}

/// Merges two sorted literal sets. Returns None when the union exceeds
/// the order limit or contains a complement pair (an impossible set).
fn merge(left: &IndexSet, right: &IndexSet, limit: usize) -> Option<IndexSet> {
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        match left[i].cmp(&right[j]) {
            std::cmp::Ordering::Less => {
                merged.push(left[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                merged.push(right[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                merged.push(left[i]);
                i += 1;
                j += 1;
            }
        }
    }
    merged.extend_from_slice(&left[i..]);
    merged.extend_from_slice(&right[j..]);
    if merged.len() > limit {
        return None;
    }
    if merged.iter().any(|&x| merged.binary_search(&-x).is_ok()) {
        return None;
    }
    Some(merged)
}

/// Drops duplicates and supersets; smaller sets win, lexicographic
/// order breaks ties for reproducibility.
fn minimize(mut family: Vec<IndexSet>) -> Vec<IndexSet> {
    family.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    family.dedup();
    let mut minimal: Vec<IndexSet> = Vec::new();
    for candidate in family {
        if !minimal.iter().any(|kept| is_subset(kept, &candidate)) {
            minimal.push(candidate);
        }
    }
    minimal
}

fn is_subset(small: &IndexSet, big: &IndexSet) -> bool {
    let mut j = 0;
    for &item in small {
        loop {
            if j >= big.len() {
                return false;
            }
            match big[j].cmp(&item) {
                std::cmp::Ordering::Less => j += 1,
                std::cmp::Ordering::Equal => {
                    j += 1;
                    break;
                }
                std::cmp::Ordering::Greater => return false,
            }
        }
    }
    true
}
