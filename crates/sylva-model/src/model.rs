//! The source model: named gates, basic events, and house events.
//!
//! A model validates before analysis: every reference resolves, gate
//! definitions are acyclic, likelihoods are well formed, and a single
//! top gate exists (explicitly set, or inferred as the one gate no
//! other gate references).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::ccf::CcfGroup;
use crate::event::{BasicEvent, HouseEvent};
use crate::formula::Formula;
use crate::{ModelError, ModelResult};

/// A complete fault-tree model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Model {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Explicit top gate; inferred when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<String>,
    pub basic_events: IndexMap<String, BasicEvent>,
    pub house_events: IndexMap<String, HouseEvent>,
    pub gates: IndexMap<String, Formula>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ccf_groups: Vec<CcfGroup>,
}

impl Model {
    pub fn new(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    /// Adds a basic event; the name must be fresh across all tables.
    pub fn add_basic_event(&mut self, event: BasicEvent) -> ModelResult<()> {
        self.check_fresh(&event.name)?;
        self.basic_events.insert(event.name.clone(), event);
        Ok(())
    }

    pub fn add_house_event(&mut self, event: HouseEvent) -> ModelResult<()> {
        self.check_fresh(&event.name)?;
        self.house_events.insert(event.name.clone(), event);
        Ok(())
    }

    pub fn add_gate(&mut self, name: &str, formula: Formula) -> ModelResult<()> {
        self.check_fresh(name)?;
        self.gates.insert(name.to_string(), formula);
        Ok(())
    }

    pub fn add_ccf_group(&mut self, group: CcfGroup) {
        self.ccf_groups.push(group);
    }

    pub fn set_top(&mut self, name: &str) {
        self.top = Some(name.to_string());
    }

    fn check_fresh(&self, name: &str) -> ModelResult<()> {
        if self.basic_events.contains_key(name)
            || self.house_events.contains_key(name)
            || self.gates.contains_key(name)
        {
            return Err(ModelError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    /// Resolves the top gate: the explicit one, or the unique gate no
    /// other gate references.
    pub fn top_gate(&self) -> ModelResult<&str> {
        if let Some(top) = &self.top {
            if !self.gates.contains_key(top) {
                return Err(ModelError::Unresolved(top.clone()));
            }
            return Ok(top);
        }
        let mut referenced = HashSet::new();
        for formula in self.gates.values() {
            formula.for_each_reference(&mut |name| {
                referenced.insert(name.to_string());
            });
        }
        let mut roots = self.gates.keys().filter(|name| !referenced.contains(*name));
        match (roots.next(), roots.next()) {
            (Some(root), None) => Ok(root),
            _ => Err(ModelError::NoTopGate),
        }
    }

    /// Fails fast on the first structural defect; no partial analysis
    /// is ever attempted on an invalid model.
    pub fn validate(&self, mission_time: f64) -> ModelResult<()> {
        for event in self.basic_events.values() {
            event.nominal_probability(mission_time)?;
        }
        for (name, formula) in &self.gates {
            formula
                .check_arity()
                .map_err(|msg| ModelError::Formula(name.clone(), msg))?;
            let mut unresolved = None;
            formula.for_each_reference(&mut |reference| {
                if unresolved.is_none()
                    && !self.basic_events.contains_key(reference)
                    && !self.house_events.contains_key(reference)
                    && !self.gates.contains_key(reference)
                {
                    unresolved = Some(reference.to_string());
                }
            });
            if let Some(reference) = unresolved {
                return Err(ModelError::Unresolved(reference));
            }
        }
        for group in &self.ccf_groups {
            group.validate(&self.basic_events)?;
        }
        self.top_gate()?;
        self.check_acyclic()
    }

    /// DFS three-coloring over gate-to-gate references.
    fn check_acyclic(&self) -> ModelResult<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            White,
            Grey,
            Black,
        }
        fn visit(
            model: &Model,
            name: &str,
            marks: &mut IndexMap<String, Mark>,
        ) -> ModelResult<()> {
            match marks.get(name).copied().unwrap_or(Mark::White) {
                Mark::Black => return Ok(()),
                Mark::Grey => return Err(ModelError::CyclicGate(name.to_string())),
                Mark::White => {}
            }
            marks.insert(name.to_string(), Mark::Grey);
            let mut children = Vec::new();
            if let Some(formula) = model.gates.get(name) {
                formula.for_each_reference(&mut |reference| {
                    if model.gates.contains_key(reference) {
                        children.push(reference.to_string());
                    }
                });
            }
            for child in children {
                visit(model, &child, marks)?;
            }
            marks.insert(name.to_string(), Mark::Black);
            Ok(())
        }
        let mut marks = IndexMap::new();
        for name in self.gates.keys() {
            visit(self, name, &mut marks)?;
        }
        Ok(())
    }

    /// Merges another model's definitions into this one; duplicate
    /// names across the files are rejected. An explicit top in either
    /// file wins over inference.
    pub fn absorb(&mut self, other: Model) -> ModelResult<()> {
        for (_, event) in other.basic_events {
            self.add_basic_event(event)?;
        }
        for (_, event) in other.house_events {
            self.add_house_event(event)?;
        }
        for (name, formula) in other.gates {
            self.add_gate(&name, formula)?;
        }
        self.ccf_groups.extend(other.ccf_groups);
        if self.top.is_none() {
            self.top = other.top;
        }
        if self.name.is_none() {
            self.name = other.name;
        }
        Ok(())
    }

    /// Loads a model from a YAML or JSON file, dispatched by extension.
    pub fn from_path(path: &Path) -> Result<Self, crate::config::ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::config::ConfigError::Io(path.display().to_string(), e))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| crate::config::ConfigError::Parse(e.to_string())),
            _ => serde_yaml::from_str(&content)
                .map_err(|e| crate::config::ConfigError::Parse(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_event_model() -> Model {
        let mut model = Model::new("demo");
        model.add_basic_event(BasicEvent::with_probability("a", 0.1)).unwrap();
        model.add_basic_event(BasicEvent::with_probability("b", 0.2)).unwrap();
        model.add_gate("top", Formula::any_of(&["a", "b"])).unwrap();
        model
    }

    #[test]
    fn top_gate_is_inferred() {
        let model = two_event_model();
        assert_eq!(model.top_gate().unwrap(), "top");
        assert!(model.validate(8760.0).is_ok());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut model = two_event_model();
        assert!(matches!(
            model.add_basic_event(BasicEvent::with_probability("a", 0.3)),
            Err(ModelError::DuplicateName(_))
        ));
        assert!(matches!(
            model.add_gate("b", Formula::event("a")),
            Err(ModelError::DuplicateName(_))
        ));
    }

    #[test]
    fn unresolved_reference_fails_validation() {
        let mut model = two_event_model();
        model.add_gate("extra", Formula::any_of(&["a", "ghost"])).unwrap();
        model.set_top("top");
        assert!(matches!(model.validate(1.0), Err(ModelError::Unresolved(name)) if name == "ghost"));
    }

    #[test]
    fn cyclic_gates_fail_validation() {
        let mut model = Model::new("cycle");
        model.add_basic_event(BasicEvent::with_probability("a", 0.1)).unwrap();
        model.add_gate("g1", Formula::any_of(&["a", "g2"])).unwrap();
        model.add_gate("g2", Formula::any_of(&["a", "g1"])).unwrap();
        model.set_top("g1");
        assert!(matches!(model.validate(1.0), Err(ModelError::CyclicGate(_))));
    }

    #[test]
    fn ambiguous_top_is_rejected() {
        let mut model = two_event_model();
        model.add_gate("other", Formula::event("a")).unwrap();
        assert!(matches!(model.top_gate(), Err(ModelError::NoTopGate)));
    }

    #[test]
    fn absorb_merges_disjoint_files() {
        let mut base = Model::default();
        base.add_basic_event(BasicEvent::with_probability("a", 0.1)).unwrap();
        let mut gates = Model::default();
        gates.add_gate("top", Formula::event("a")).unwrap();
        gates.set_top("top");
        base.absorb(gates).unwrap();
        assert_eq!(base.top_gate().unwrap(), "top");
        assert!(base.validate(1.0).is_ok());

        let mut clash = Model::default();
        clash.add_basic_event(BasicEvent::with_probability("a", 0.5)).unwrap();
        assert!(matches!(
            base.absorb(clash),
            Err(ModelError::DuplicateName(_))
        ));
    }

    #[test]
    fn model_file_round_trip() {
        let model = two_event_model();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.yaml");
        std::fs::write(&path, serde_yaml::to_string(&model).unwrap()).unwrap();
        let back = Model::from_path(&path).unwrap();
        assert_eq!(back.basic_events.len(), 2);
        assert_eq!(back.top_gate().unwrap(), "top");
    }
}
