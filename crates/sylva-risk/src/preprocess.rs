//! Translation of source models into canonical indexed graphs.
//!
//! The preprocessor flattens named gates and nested formulas into
//! indexed AND/OR gates with signed children, desugars the compound
//! connectives (NAND, NOR, XOR, at-least), substitutes house-event
//! constants, pushes complements down to the leaves by De Morgan,
//! coalesces same-type gates, and finally marks independent modules
//! from DFS timestamps. The output graph contains only AND, OR, and
//! single-child NULL gates; every NOT is a sign bit on a child edge.

use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

use sylva_model::{BasicEvent, Formula, Model, Settings};

use crate::graph::{GateState, GateType, IndexedFaultTree, LeafKind};
use crate::{AnalysisError, AnalysisResult};

/// A preprocessed tree together with the basic events it indexes.
///
/// The event table includes events derived from CCF expansion and
/// excludes substituted group members.
#[derive(Debug)]
pub struct PreprocessResult {
    pub tree: IndexedFaultTree,
    pub events: IndexMap<String, BasicEvent>,
}

/// Runs the whole preprocessing pipeline on a validated model.
pub fn preprocess(model: &Model, settings: &Settings) -> AnalysisResult<PreprocessResult> {
    model.validate(settings.mission_time)?;

    // CCF expansion rewrites member references into generated
    // sub-formulas over derived events.
    let mut events: IndexMap<String, BasicEvent> = model.basic_events.clone();
    let mut substitutions: IndexMap<String, Formula> = IndexMap::new();
    if settings.ccf_analysis {
        for group in &model.ccf_groups {
            let expansion = group.expand(&model.basic_events, settings.mission_time)?;
            for event in expansion.events {
                events.insert(event.name.clone(), event);
            }
            for (member, formula) in expansion.substitutions {
                events.shift_remove(&member);
                substitutions.insert(member, formula);
            }
        }
    }

    let mut tree = build_tree(model, &events, &substitutions)?;
    normalize_gate_types(&mut tree);
    propagate_house_constants(&mut tree);
    propagate_complements(&mut tree);
    simplify_gates(&mut tree);
    retarget_top(&mut tree);
    detect_modules(&mut tree);
    Ok(PreprocessResult { tree, events })
}

// ---------------------------------------------------------------------------
// Translation

struct Translator<'a> {
    model: &'a Model,
    substitutions: &'a IndexMap<String, Formula>,
    leaf_index: HashMap<String, i32>,
    /// Signed index each named gate or substituted member resolves to.
    memo: HashMap<String, i32>,
}

fn build_tree(
    model: &Model,
    events: &IndexMap<String, BasicEvent>,
    substitutions: &IndexMap<String, Formula>,
) -> AnalysisResult<IndexedFaultTree> {
    let leaf_count = events.len() + model.house_events.len();
    let mut tree = IndexedFaultTree::new(leaf_count as i32 + 1);
    let mut leaf_index = HashMap::new();
    let mut next = 0;
    for name in events.keys() {
        next += 1;
        tree.add_basic_event_leaf(next, name);
        leaf_index.insert(name.clone(), next);
    }
    for house in model.house_events.values() {
        next += 1;
        tree.add_constant_leaf(next, house.state);
        leaf_index.insert(house.name.clone(), next);
    }

    let mut translator = Translator {
        model,
        substitutions,
        leaf_index,
        memo: HashMap::new(),
    };
    let top_name = model.top_gate()?;
    let top_signed = translator.reference(&mut tree, top_name)?;
    let top_index = if top_signed > 0 && tree.is_gate_index(top_signed) {
        top_signed
    } else {
        let wrapper = tree.create_gate(GateType::Null);
        tree.connect(wrapper, top_signed);
        wrapper
    };
    tree.set_top_event_index(top_index);
    Ok(tree)
}

impl Translator<'_> {
    /// Resolves a name to a signed node index, translating gate
    /// definitions and CCF substitutions on first use.
    fn reference(&mut self, tree: &mut IndexedFaultTree, name: &str) -> AnalysisResult<i32> {
        if let Some(&index) = self.leaf_index.get(name) {
            return Ok(index);
        }
        if let Some(&signed) = self.memo.get(name) {
            return Ok(signed);
        }
        let formula = self
            .substitutions
            .get(name)
            .or_else(|| self.model.gates.get(name))
            .cloned()
            .ok_or_else(|| AnalysisError::Invariant(format!("unindexed reference {}", name)))?;
        // Reserve the slot against self-reference; validation has
        // already excluded cycles.
        let signed = self.argument(tree, &formula)?;
        self.memo.insert(name.to_string(), signed);
        Ok(signed)
    }

    /// Translates a formula into a signed node index, creating fresh
    /// gates for compound connectives.
    fn argument(&mut self, tree: &mut IndexedFaultTree, formula: &Formula) -> AnalysisResult<i32> {
        match formula {
            Formula::Event(name) => self.reference(tree, name),
            Formula::Not(inner) => Ok(-self.argument(tree, inner)?),
            Formula::Null(inner) => self.argument(tree, inner),
            Formula::And(args) => self.simple_gate(tree, GateType::And, args),
            Formula::Or(args) => self.simple_gate(tree, GateType::Or, args),
            // NAND and NOR desugar to complemented AND/OR edges.
            Formula::Nand(args) => Ok(-self.simple_gate(tree, GateType::And, args)?),
            Formula::Nor(args) => Ok(-self.simple_gate(tree, GateType::Or, args)?),
            Formula::Xor(a, b) => {
                let sa = self.argument(tree, a)?;
                let sb = self.argument(tree, b)?;
                let gate = tree.create_gate(GateType::Xor);
                tree.connect(gate, sa);
                tree.connect(gate, sb);
                Ok(gate)
            }
            Formula::Atleast { min, args } => {
                let children: Vec<i32> = args
                    .iter()
                    .map(|arg| self.argument(tree, arg))
                    .collect::<AnalysisResult<_>>()?;
                let gate = tree.create_gate(GateType::Atleast);
                tree.gate_mut(gate).set_vote_number(*min as i32);
                for child in children {
                    if !tree.connect(gate, child) {
                        break;
                    }
                }
                Ok(gate)
            }
        }
    }

    fn simple_gate(
        &mut self,
        tree: &mut IndexedFaultTree,
        gate_type: GateType,
        args: &[Formula],
    ) -> AnalysisResult<i32> {
        let children: Vec<i32> = args
            .iter()
            .map(|arg| self.argument(tree, arg))
            .collect::<AnalysisResult<_>>()?;
        let gate = tree.create_gate(gate_type);
        for child in children {
            if !tree.connect(gate, child) {
                break;
            }
        }
        Ok(gate)
    }
}

fn combinations(items: &[i32], k: usize) -> Vec<Vec<i32>> {
    if k == 0 {
        return vec![Vec::new()];
    }
    if items.len() < k {
        return Vec::new();
    }
    let mut result = Vec::new();
    let head = items[0];
    for mut tail in combinations(&items[1..], k - 1) {
        tail.insert(0, head);
        result.push(tail);
    }
    result.extend(combinations(&items[1..], k));
    result
}

// ---------------------------------------------------------------------------
// Gate type normalization

/// Rewrites every at-least and exclusive-or gate into AND/OR structure,
/// leaving only the normalized types in the working graph.
fn normalize_gate_types(tree: &mut IndexedFaultTree) {
    for index in topological_gates(tree) {
        match tree.gate(index).gate_type() {
            GateType::Atleast => normalize_atleast(tree, index),
            GateType::Xor => normalize_xor(tree, index),
            _ => {}
        }
    }
}

/// `XOR(a, b)` becomes `OR(AND(a, -b), AND(-a, b))`.
fn normalize_xor(tree: &mut IndexedFaultTree, index: i32) {
    let children: Vec<i32> = tree.gate(index).children().iter().copied().collect();
    if children.len() < 2 {
        // A deduplicated argument pair: x XOR x is constant false.
        collapse_gate(tree, index, false);
        return;
    }
    let (a, b) = (children[0], children[1]);
    for &child in &children {
        tree.disconnect(index, child);
    }
    tree.gate_mut(index).set_type(GateType::Or);
    let left = tree.create_gate(GateType::And);
    tree.connect(left, a);
    tree.connect(left, -b);
    let right = tree.create_gate(GateType::And);
    tree.connect(right, -a);
    tree.connect(right, b);
    tree.connect(index, left);
    tree.connect(index, right);
}

/// `ATLEAST(k; xs)` becomes an OR over all k-combinations; the border
/// votes retype the gate in place.
fn normalize_atleast(tree: &mut IndexedFaultTree, index: i32) {
    let children: Vec<i32> = tree.gate(index).children().iter().copied().collect();
    let vote = tree.gate(index).vote_number() as usize;
    // Deduplicated arguments can leave fewer children than the vote;
    // all of them must fail then.
    if vote >= children.len() {
        tree.gate_mut(index).set_type(GateType::And);
        return;
    }
    if vote == 1 {
        tree.gate_mut(index).set_type(GateType::Or);
        return;
    }
    for &child in &children {
        tree.disconnect(index, child);
    }
    tree.gate_mut(index).set_type(GateType::Or);
    for combination in combinations(&children, vote) {
        let and = tree.create_gate(GateType::And);
        for child in combination {
            if !tree.connect(and, child) {
                break;
            }
        }
        if !tree.connect(index, and) {
            break;
        }
    }
}

// ---------------------------------------------------------------------------
// Constant propagation

/// Substitutes house-event constants and already collapsed gates into
/// their parents, iterating to fixpoint.
fn propagate_house_constants(tree: &mut IndexedFaultTree) {
    let mut worklist: Vec<(i32, bool)> = tree
        .leaves()
        .iter()
        .filter_map(|(&index, leaf)| match leaf.kind {
            LeafKind::Constant(state) => Some((index, state)),
            LeafKind::BasicEvent => None,
        })
        .collect();
    let collapsed: Vec<(i32, bool)> = tree
        .gates()
        .iter()
        .filter_map(|(&index, gate)| match gate.state() {
            GateState::Null => Some((index, false)),
            GateState::Unity => Some((index, true)),
            GateState::Normal => None,
        })
        .collect();
    worklist.extend(collapsed);
    propagate_constants(tree, worklist);
}

/// Worklist propagation of constant-valued nodes into their parents.
fn propagate_constants(tree: &mut IndexedFaultTree, mut worklist: Vec<(i32, bool)>) {
    while let Some((index, value)) = worklist.pop() {
        let parents: Vec<i32> = tree.node_base(index).parents().iter().copied().collect();
        for parent in parents {
            if tree.gate(parent).state() != GateState::Normal {
                continue;
            }
            let signed_edges: Vec<i32> = tree
                .gate(parent)
                .children()
                .iter()
                .copied()
                .filter(|c| c.abs() == index)
                .collect();
            for edge in signed_edges {
                let effective = if edge > 0 { value } else { !value };
                if tree.gate(parent).state() != GateState::Normal {
                    break;
                }
                match (tree.gate(parent).gate_type(), effective) {
                    (GateType::Or, true) | (GateType::Null, true) => {
                        collapse_gate(tree, parent, true);
                        worklist.push((parent, true));
                    }
                    (GateType::And, false) | (GateType::Null, false) => {
                        collapse_gate(tree, parent, false);
                        worklist.push((parent, false));
                    }
                    (GateType::Or, false) | (GateType::And, true) => {
                        tree.disconnect(parent, edge);
                        if tree.gate(parent).children().is_empty() {
                            // An OR of all-false is false; an AND of
                            // all-true is true.
                            let result = tree.gate(parent).gate_type() == GateType::And;
                            collapse_gate(tree, parent, result);
                            worklist.push((parent, result));
                        }
                    }
                    (GateType::Not, v) => {
                        collapse_gate(tree, parent, !v);
                        worklist.push((parent, !v));
                    }
                    (other, _) => {
                        // Compound types are desugared before any
                        // constant can reach them.
                        debug_assert!(
                            !matches!(
                                other,
                                GateType::Atleast | GateType::Xor | GateType::Nand | GateType::Nor
                            ),
                            "constant reached un-desugared gate"
                        );
                    }
                }
            }
        }
    }
}

/// Collapses a gate to a constant state, dropping the back-references
/// of its former children.
fn collapse_gate(tree: &mut IndexedFaultTree, index: i32, value: bool) {
    let children: Vec<i32> = tree.gate(index).children().iter().copied().collect();
    if value {
        tree.gate_mut(index).make_unity();
    } else {
        tree.gate_mut(index).nullify();
    }
    for child in children {
        tree.node_base_mut(child.abs()).erase_parent(index);
    }
}

// ---------------------------------------------------------------------------
// Complement propagation

/// Rewrites every negative gate edge into a positive edge onto a
/// complement gate (De Morgan dual), sharing duals through a cache so
/// a multiply-referenced complement is built once.
fn propagate_complements(tree: &mut IndexedFaultTree) {
    let top = tree.top_event_index();
    let mut complements: HashMap<i32, i32> = HashMap::new();
    let mut visited: HashSet<i32> = HashSet::new();
    process_complements(tree, top, &mut complements, &mut visited);
}

fn process_complements(
    tree: &mut IndexedFaultTree,
    index: i32,
    complements: &mut HashMap<i32, i32>,
    visited: &mut HashSet<i32>,
) {
    if !visited.insert(index) {
        return;
    }
    let children: Vec<i32> = tree.gate(index).children().iter().copied().collect();
    for child in children {
        let target = child.abs();
        if !tree.is_gate_index(target) {
            continue;
        }
        if child < 0 {
            let dual = complement_gate(tree, target, complements);
            if !tree.reconnect(index, child, dual) {
                return;
            }
            process_complements(tree, dual, complements, visited);
        } else {
            process_complements(tree, target, complements, visited);
        }
    }
}

/// Builds (or reuses) the De Morgan dual of a gate: type flipped,
/// every child edge negated.
fn complement_gate(
    tree: &mut IndexedFaultTree,
    index: i32,
    complements: &mut HashMap<i32, i32>,
) -> i32 {
    if let Some(&dual) = complements.get(&index) {
        return dual;
    }
    let flipped = match tree.gate(index).gate_type() {
        GateType::And => GateType::Or,
        GateType::Or => GateType::And,
        GateType::Null => GateType::Null,
        other => {
            debug_assert!(false, "complement of un-desugared {:?}", other);
            GateType::Null
        }
    };
    let children: Vec<i32> = tree.gate(index).children().iter().copied().collect();
    let dual = tree.create_gate(flipped);
    for child in children {
        if !tree.connect(dual, -child) {
            break;
        }
    }
    complements.insert(index, dual);
    dual
}

// ---------------------------------------------------------------------------
// Coalescing and null-gate elimination

/// Repeatedly absorbs same-type single-parent children and splices out
/// pass-through gates until the graph stops changing.
fn simplify_gates(tree: &mut IndexedFaultTree) {
    loop {
        let mut changed = false;
        let mut collapsed = Vec::new();
        let order = topological_gates(tree);
        for gate_index in order {
            if tree.gate(gate_index).state() != GateState::Normal {
                continue;
            }
            let children: Vec<i32> = tree.gate(gate_index).children().iter().copied().collect();
            for child in children {
                let target = child.abs();
                if !tree.is_gate_index(target) || tree.gate(gate_index).state() != GateState::Normal
                {
                    continue;
                }
                if !tree.gate(gate_index).children().contains(&child) {
                    continue;
                }
                let child_type = tree.gate(target).gate_type();
                let child_state = tree.gate(target).state();
                if child_state != GateState::Normal {
                    continue;
                }
                // Pass-through gates splice their single child up; a
                // one-child AND or OR is the identity as well.
                if child_type == GateType::Null || tree.gate(target).children().len() == 1 {
                    let inner = match tree.gate(target).children().iter().next() {
                        Some(&inner) => inner,
                        None => continue,
                    };
                    let edge = if child > 0 { inner } else { -inner };
                    if !tree.reconnect(gate_index, child, edge) {
                        collapsed.push(gate_index);
                    }
                    changed = true;
                    continue;
                }
                // Same-type absorption, only for an exclusively owned
                // child.
                if child > 0
                    && child_type == tree.gate(gate_index).gate_type()
                    && matches!(child_type, GateType::And | GateType::Or)
                    && tree.node_base(target).parents().len() == 1
                {
                    if !join_child(tree, gate_index, target) {
                        collapsed.push(gate_index);
                    }
                    changed = true;
                }
            }
        }
        let worklist: Vec<(i32, bool)> = collapsed
            .into_iter()
            .map(|index| (index, tree.gate(index).state() == GateState::Unity))
            .collect();
        if !worklist.is_empty() {
            propagate_constants(tree, worklist);
            changed = true;
        }
        if !changed {
            break;
        }
    }
}

/// Absorbs the children of `child` into `gate`; returns false when the
/// absorption collapses the gate.
fn join_child(tree: &mut IndexedFaultTree, gate: i32, child: i32) -> bool {
    let grandchildren: Vec<i32> = tree.gate(child).children().iter().copied().collect();
    for &grandchild in &grandchildren {
        tree.node_base_mut(grandchild.abs()).erase_parent(child);
    }
    tree.gate_mut(child).erase_all_children();
    tree.disconnect(gate, child);
    for grandchild in grandchildren {
        if !tree.connect(gate, grandchild) {
            return false;
        }
    }
    true
}

/// Gates reachable from the top, children before parents.
fn topological_gates(tree: &IndexedFaultTree) -> Vec<i32> {
    fn walk(tree: &IndexedFaultTree, index: i32, seen: &mut HashSet<i32>, out: &mut Vec<i32>) {
        if !seen.insert(index) {
            return;
        }
        for &child in tree.gate(index).children() {
            let target = child.abs();
            if tree.is_gate_index(target) {
                walk(tree, target, seen, out);
            }
        }
        out.push(index);
    }
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    if tree.top_event_index() != 0 {
        walk(tree, tree.top_event_index(), &mut seen, &mut out);
    }
    out
}

/// Drops a pass-through wrapper at the very top when its child is a
/// plain gate.
fn retarget_top(tree: &mut IndexedFaultTree) {
    loop {
        let top = tree.top_event_index();
        let gate = tree.gate(top);
        if gate.gate_type() != GateType::Null || gate.state() != GateState::Normal {
            return;
        }
        let child = match gate.children().iter().next() {
            Some(&c) => c,
            None => return,
        };
        if child > 0 && tree.is_gate_index(child) {
            tree.set_top_event_index(child);
        } else {
            return;
        }
    }
}

// ---------------------------------------------------------------------------
// Module detection

/// Stamps an Euler tour and marks every gate whose descendants are
/// visited only inside the gate's own enter/exit window. Such a gate
/// shares no basic event with the rest of the tree.
fn detect_modules(tree: &mut IndexedFaultTree) {
    if tree.top_event_index() == 0 {
        return;
    }
    tree.clear_visits();
    let mut time = 0;
    assign_timing(tree, tree.top_event_index(), &mut time);
    let mut ranges: HashMap<i32, (i32, i32)> = HashMap::new();
    find_modules(tree, tree.top_event_index(), &mut ranges);
}

fn assign_timing(tree: &mut IndexedFaultTree, index: i32, time: &mut i32) {
    *time += 1;
    if tree.gate_mut(index).base.visit(*time) {
        return;
    }
    let children: Vec<i32> = tree.gate(index).children().iter().copied().collect();
    for child in children {
        let target = child.abs();
        if tree.is_gate_index(target) {
            assign_timing(tree, target, time);
        } else {
            *time += 1;
            tree.node_base_mut(target).visit(*time);
            *time += 1;
            tree.node_base_mut(target).visit(*time);
        }
    }
    *time += 1;
    tree.gate_mut(index).base.visit(*time);
}

/// Returns the visit-time range of the gate's whole sub-DAG, including
/// the gate's own stamps.
fn find_modules(
    tree: &mut IndexedFaultTree,
    index: i32,
    ranges: &mut HashMap<i32, (i32, i32)>,
) -> (i32, i32) {
    if let Some(&range) = ranges.get(&index) {
        return range;
    }
    let enter = tree.node_base(index).enter_time();
    let exit = tree.node_base(index).exit_time();
    let children: Vec<i32> = tree.gate(index).children().iter().copied().collect();
    let mut min = i32::MAX;
    let mut max = 0;
    for child in &children {
        let target = child.abs();
        let (child_min, child_max) = if tree.is_gate_index(target) {
            find_modules(tree, target, ranges)
        } else {
            let base = tree.node_base(target);
            (base.enter_time(), base.last_visit())
        };
        min = min.min(child_min);
        max = max.max(child_max);
    }
    if children.is_empty() {
        min = enter;
        max = enter;
    }
    if min > enter && max < exit && !tree.gate(index).is_module() {
        tree.gate_mut(index).turn_module();
    }
    let range = (
        min.min(enter),
        max.max(tree.node_base(index).last_visit()),
    );
    ranges.insert(index, range);
    range
}

#[cfg(test)]
mod tests {
    use super::*;
    use sylva_model::{CcfGroup, HouseEvent};

    fn settings() -> Settings {
        Settings::default()
    }

    fn event(name: &str, p: f64) -> BasicEvent {
        BasicEvent::with_probability(name, p)
    }

    fn normalized_types_only(tree: &IndexedFaultTree) {
        tree.check_normalized().unwrap();
    }

    #[test]
    fn or_gate_translates_directly() {
        let mut model = Model::new("t");
        model.add_basic_event(event("a", 0.1)).unwrap();
        model.add_basic_event(event("b", 0.2)).unwrap();
        model.add_gate("top", Formula::any_of(&["a", "b"])).unwrap();
        let result = preprocess(&model, &settings()).unwrap();
        let tree = &result.tree;
        normalized_types_only(tree);
        let top = tree.gate(tree.top_event_index());
        assert_eq!(top.gate_type(), GateType::Or);
        assert_eq!(top.children().len(), 2);
    }

    #[test]
    fn complement_pair_collapses_the_gate() {
        let mut model = Model::new("t");
        model.add_basic_event(event("a", 0.1)).unwrap();
        model
            .add_gate(
                "top",
                Formula::And(vec![
                    Formula::event("a"),
                    Formula::Not(Box::new(Formula::event("a"))),
                ]),
            )
            .unwrap();
        let result = preprocess(&model, &settings()).unwrap();
        let tree = &result.tree;
        assert_eq!(tree.gate(tree.top_event_index()).state(), GateState::Null);
    }

    #[test]
    fn nand_becomes_complemented_and_then_or_of_negations() {
        let mut model = Model::new("t");
        model.add_basic_event(event("a", 0.1)).unwrap();
        model.add_basic_event(event("b", 0.2)).unwrap();
        model
            .add_gate("top", Formula::Nand(vec![Formula::event("a"), Formula::event("b")]))
            .unwrap();
        let result = preprocess(&model, &settings()).unwrap();
        let tree = &result.tree;
        normalized_types_only(tree);
        // De Morgan: NAND(a, b) = OR(-a, -b).
        let top = tree.gate(tree.top_event_index());
        assert_eq!(top.gate_type(), GateType::Or);
        let children: Vec<i32> = top.children().iter().copied().collect();
        assert!(children.iter().all(|&c| c < 0 && !tree.is_gate_index(-c)));
    }

    #[test]
    fn xor_expands_to_two_product_terms() {
        let mut model = Model::new("t");
        model.add_basic_event(event("a", 0.1)).unwrap();
        model.add_basic_event(event("b", 0.2)).unwrap();
        model
            .add_gate(
                "top",
                Formula::Xor(
                    Box::new(Formula::event("a")),
                    Box::new(Formula::event("b")),
                ),
            )
            .unwrap();
        let result = preprocess(&model, &settings()).unwrap();
        let tree = &result.tree;
        normalized_types_only(tree);
        let top = tree.gate(tree.top_event_index());
        assert_eq!(top.gate_type(), GateType::Or);
        assert_eq!(top.children().len(), 2);
        for &child in top.children() {
            assert!(child > 0);
            assert_eq!(tree.gate(child).gate_type(), GateType::And);
            assert_eq!(tree.gate(child).children().len(), 2);
        }
    }

    #[test]
    fn atleast_expands_to_combinations() {
        let mut model = Model::new("t");
        for name in ["a", "b", "c"] {
            model.add_basic_event(event(name, 0.1)).unwrap();
        }
        model
            .add_gate(
                "top",
                Formula::Atleast {
                    min: 2,
                    args: vec![Formula::event("a"), Formula::event("b"), Formula::event("c")],
                },
            )
            .unwrap();
        let result = preprocess(&model, &settings()).unwrap();
        let tree = &result.tree;
        normalized_types_only(tree);
        let top = tree.gate(tree.top_event_index());
        assert_eq!(top.gate_type(), GateType::Or);
        assert_eq!(top.children().len(), 3);
    }

    #[test]
    fn false_house_event_nullifies_an_and_top() {
        let mut model = Model::new("t");
        model.add_basic_event(event("a", 0.1)).unwrap();
        model.add_house_event(HouseEvent::new("off", false)).unwrap();
        model.add_gate("top", Formula::all_of(&["a", "off"])).unwrap();
        let result = preprocess(&model, &settings()).unwrap();
        let tree = &result.tree;
        assert_eq!(tree.gate(tree.top_event_index()).state(), GateState::Null);
    }

    #[test]
    fn true_house_event_under_or_makes_unity() {
        let mut model = Model::new("t");
        model.add_basic_event(event("a", 0.1)).unwrap();
        model.add_house_event(HouseEvent::new("on", true)).unwrap();
        model.add_gate("top", Formula::any_of(&["a", "on"])).unwrap();
        let result = preprocess(&model, &settings()).unwrap();
        let tree = &result.tree;
        assert_eq!(tree.gate(tree.top_event_index()).state(), GateState::Unity);
    }

    #[test]
    fn true_house_event_under_and_is_dropped() {
        let mut model = Model::new("t");
        model.add_basic_event(event("a", 0.1)).unwrap();
        model.add_basic_event(event("b", 0.2)).unwrap();
        model.add_house_event(HouseEvent::new("on", true)).unwrap();
        model.add_gate("top", Formula::all_of(&["a", "b", "on"])).unwrap();
        let result = preprocess(&model, &settings()).unwrap();
        let tree = &result.tree;
        let top = tree.gate(tree.top_event_index());
        assert_eq!(top.state(), GateState::Normal);
        assert_eq!(top.children().len(), 2);
    }

    #[test]
    fn same_type_gates_coalesce() {
        let mut model = Model::new("t");
        for name in ["a", "b", "c"] {
            model.add_basic_event(event(name, 0.1)).unwrap();
        }
        model.add_gate("inner", Formula::any_of(&["b", "c"])).unwrap();
        model
            .add_gate("top", Formula::Or(vec![Formula::event("a"), Formula::event("inner")]))
            .unwrap();
        let result = preprocess(&model, &settings()).unwrap();
        let tree = &result.tree;
        let top = tree.gate(tree.top_event_index());
        assert_eq!(top.children().len(), 3);
        assert!(top.children().iter().all(|&c| !tree.is_gate_index(c.abs())));
    }

    #[test]
    fn shared_gates_are_not_absorbed() {
        let mut model = Model::new("t");
        for name in ["a", "b", "c", "d"] {
            model.add_basic_event(event(name, 0.1)).unwrap();
        }
        model.add_gate("shared", Formula::all_of(&["a", "b"])).unwrap();
        model.add_gate("left", Formula::all_of(&["shared", "c"])).unwrap();
        model.add_gate("right", Formula::all_of(&["shared", "d"])).unwrap();
        model
            .add_gate("top", Formula::any_of(&["left", "right"]))
            .unwrap();
        model.set_top("top");
        let result = preprocess(&model, &settings()).unwrap();
        let tree = &result.tree;
        // The AND-under-AND absorption must leave the shared gate
        // intact in both branches.
        let top = tree.gate(tree.top_event_index());
        for &child in top.children() {
            assert!(tree.is_gate_index(child));
            let branch = tree.gate(child);
            assert!(branch.children().iter().any(|&c| tree.is_gate_index(c.abs())));
        }
    }

    #[test]
    fn independent_subtree_is_a_module() {
        let mut model = Model::new("t");
        for name in ["a", "b", "c"] {
            model.add_basic_event(event(name, 0.1)).unwrap();
        }
        model.add_gate("m", Formula::all_of(&["b", "c"])).unwrap();
        model
            .add_gate("top", Formula::Or(vec![Formula::event("a"), Formula::event("m")]))
            .unwrap();
        let result = preprocess(&model, &settings()).unwrap();
        let tree = &result.tree;
        let top = tree.gate(tree.top_event_index());
        assert!(top.is_module());
        let inner = top
            .children()
            .iter()
            .copied()
            .find(|&c| tree.is_gate_index(c.abs()))
            .unwrap();
        assert!(tree.gate(inner.abs()).is_module());
    }

    #[test]
    fn event_shared_across_branches_blocks_modules() {
        let mut model = Model::new("t");
        for name in ["a", "b"] {
            model.add_basic_event(event(name, 0.1)).unwrap();
        }
        model.add_gate("left", Formula::all_of(&["a", "b"])).unwrap();
        model.add_gate("right", Formula::all_of(&["a", "b"])).unwrap();
        model.add_gate("top", Formula::any_of(&["left", "right"])).unwrap();
        model.set_top("top");
        let result = preprocess(&model, &settings()).unwrap();
        let tree = &result.tree;
        let top = tree.gate(tree.top_event_index());
        assert!(top.is_module());
        for &child in top.children() {
            if tree.is_gate_index(child.abs()) {
                assert!(!tree.gate(child.abs()).is_module());
            }
        }
    }

    #[test]
    fn ccf_expansion_rewrites_members() {
        let mut model = Model::new("t");
        model.add_basic_event(event("m1", 0.1)).unwrap();
        model.add_basic_event(event("m2", 0.1)).unwrap();
        model.add_gate("top", Formula::all_of(&["m1", "m2"])).unwrap();
        model.add_ccf_group(CcfGroup::new("pumps", &["m1", "m2"], 0.2));
        let with_ccf = preprocess(&model, &Settings::default().ccf(true)).unwrap();
        assert!(with_ccf.events.contains_key("[pumps]"));
        assert!(with_ccf.events.contains_key("[m1 alone]"));
        assert!(!with_ccf.events.contains_key("m1"));

        let without = preprocess(&model, &settings()).unwrap();
        assert!(without.events.contains_key("m1"));
        assert!(!without.events.contains_key("[pumps]"));
    }

    #[test]
    fn double_negation_cancels() {
        let mut model = Model::new("t");
        model.add_basic_event(event("a", 0.1)).unwrap();
        model.add_basic_event(event("b", 0.1)).unwrap();
        model
            .add_gate(
                "top",
                Formula::Or(vec![
                    Formula::event("b"),
                    Formula::Not(Box::new(Formula::Not(Box::new(Formula::event("a"))))),
                ]),
            )
            .unwrap();
        let result = preprocess(&model, &settings()).unwrap();
        let tree = &result.tree;
        let top = tree.gate(tree.top_event_index());
        assert!(top.children().iter().all(|&c| c > 0));
    }
}
