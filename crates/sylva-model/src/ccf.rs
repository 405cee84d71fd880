//! Common-cause failure groups.
//!
//! A CCF group names basic events whose failures are correlated through
//! a shared cause. Under the beta-factor model a member's failure
//! probability splits into an independent portion `(1 - beta) * p` and
//! a common portion carried by one shared event for the whole group.
//! Expansion rewrites each member reference into an OR of the two
//! parts, which the preprocessor consumes as a generated sub-gate.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::event::BasicEvent;
use crate::formula::Formula;
use crate::{ModelError, ModelResult};

/// A beta-factor common-cause group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CcfGroup {
    /// Group name; the shared common-cause event is derived from it.
    pub name: String,
    /// Basic events that share the common cause.
    pub members: Vec<String>,
    /// Fraction of each member's failures attributed to the common
    /// cause, in [0, 1].
    pub beta_factor: f64,
}

/// The derived events and substitutions produced by expanding a group.
#[derive(Debug, Clone, Default)]
pub struct CcfExpansion {
    /// Fresh basic events: independent parts plus the common event.
    pub events: Vec<BasicEvent>,
    /// Member name to replacement sub-formula.
    pub substitutions: IndexMap<String, Formula>,
}

impl CcfGroup {
    pub fn new(name: &str, members: &[&str], beta_factor: f64) -> Self {
        Self {
            name: name.to_string(),
            members: members.iter().map(|m| m.to_string()).collect(),
            beta_factor,
        }
    }

    pub fn validate(&self, basic_events: &IndexMap<String, BasicEvent>) -> ModelResult<()> {
        if self.members.len() < 2 {
            return Err(ModelError::CcfGroup(
                self.name.clone(),
                "a group needs at least two members".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.beta_factor) {
            return Err(ModelError::CcfGroup(
                self.name.clone(),
                format!("beta factor {} is outside [0, 1]", self.beta_factor),
            ));
        }
        let mut seen = indexmap::IndexSet::new();
        for member in &self.members {
            if !basic_events.contains_key(member) {
                return Err(ModelError::Unresolved(member.clone()));
            }
            if !seen.insert(member) {
                return Err(ModelError::CcfGroup(
                    self.name.clone(),
                    format!("member {} listed twice", member),
                ));
            }
        }
        Ok(())
    }

    /// Expands the group against the event table.
    ///
    /// The common event's probability is `beta` times the mean member
    /// probability; each independent part keeps `(1 - beta)` of its
    /// member's probability. Derived events carry no uncertainty
    /// distribution.
    pub fn expand(
        &self,
        basic_events: &IndexMap<String, BasicEvent>,
        mission_time: f64,
    ) -> ModelResult<CcfExpansion> {
        self.validate(basic_events)?;
        let mut expansion = CcfExpansion::default();
        let mut total = 0.0;
        for member in &self.members {
            total += basic_events[member].nominal_probability(mission_time)?;
        }
        let common_name = format!("[{}]", self.name);
        let common_p = self.beta_factor * total / self.members.len() as f64;
        expansion
            .events
            .push(BasicEvent::with_probability(&common_name, common_p));
        for member in &self.members {
            let p = basic_events[member].nominal_probability(mission_time)?;
            let independent_name = format!("[{} alone]", member);
            expansion.events.push(BasicEvent::with_probability(
                &independent_name,
                (1.0 - self.beta_factor) * p,
            ));
            expansion.substitutions.insert(
                member.clone(),
                Formula::Or(vec![
                    Formula::event(&independent_name),
                    Formula::event(&common_name),
                ]),
            );
        }
        Ok(expansion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_table() -> IndexMap<String, BasicEvent> {
        let mut table = IndexMap::new();
        for (name, p) in [("m1", 0.1), ("m2", 0.3)] {
            table.insert(name.to_string(), BasicEvent::with_probability(name, p));
        }
        table
    }

    #[test]
    fn beta_factor_split() {
        let group = CcfGroup::new("pumps", &["m1", "m2"], 0.1);
        let expansion = group.expand(&event_table(), 1.0).unwrap();
        assert_eq!(expansion.events.len(), 3);
        let common = &expansion.events[0];
        assert_eq!(common.name, "[pumps]");
        assert!((common.probability.unwrap() - 0.02).abs() < 1e-12);
        let m1_alone = &expansion.events[1];
        assert!((m1_alone.probability.unwrap() - 0.09).abs() < 1e-12);
        let substitution = &expansion.substitutions["m1"];
        assert_eq!(
            *substitution,
            Formula::Or(vec![Formula::event("[m1 alone]"), Formula::event("[pumps]")])
        );
    }

    #[test]
    fn invalid_groups_are_rejected() {
        let table = event_table();
        assert!(CcfGroup::new("g", &["m1"], 0.1).validate(&table).is_err());
        assert!(CcfGroup::new("g", &["m1", "m2"], 1.5).validate(&table).is_err());
        assert!(CcfGroup::new("g", &["m1", "ghost"], 0.1).validate(&table).is_err());
        assert!(CcfGroup::new("g", &["m1", "m1"], 0.1).validate(&table).is_err());
    }
}
