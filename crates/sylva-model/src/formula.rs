//! Boolean formulas over named events and gates.

use serde::{Deserialize, Serialize};

/// Logical connectives accepted in source models.
///
/// The preprocessor rewrites everything down to AND/OR/NOT/NULL before
/// analysis; the full set exists only at the model boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Connective {
    And,
    Or,
    Atleast,
    Xor,
    Not,
    Nand,
    Nor,
    /// Single-argument pass-through.
    Null,
}

/// A Boolean formula. Arguments reference events or gates by name or
/// nest anonymous sub-formulas; the preprocessor turns nested formulas
/// into fresh gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Formula {
    /// Reference to a basic event, house event, or gate by name.
    Event(String),
    Not(Box<Formula>),
    And(Vec<Formula>),
    Or(Vec<Formula>),
    /// At least `min` of the arguments.
    Atleast { min: u32, args: Vec<Formula> },
    Xor(Box<Formula>, Box<Formula>),
    Nand(Vec<Formula>),
    Nor(Vec<Formula>),
    Null(Box<Formula>),
}

impl Formula {
    /// Shorthand for a named reference.
    pub fn event(name: &str) -> Self {
        Formula::Event(name.to_string())
    }

    /// OR over named references.
    pub fn any_of(names: &[&str]) -> Self {
        Formula::Or(names.iter().map(|n| Formula::event(n)).collect())
    }

    /// AND over named references.
    pub fn all_of(names: &[&str]) -> Self {
        Formula::And(names.iter().map(|n| Formula::event(n)).collect())
    }

    /// The connective at the root of this formula.
    pub fn connective(&self) -> Connective {
        match self {
            Formula::Event(_) | Formula::Null(_) => Connective::Null,
            Formula::Not(_) => Connective::Not,
            Formula::And(_) => Connective::And,
            Formula::Or(_) => Connective::Or,
            Formula::Atleast { .. } => Connective::Atleast,
            Formula::Xor(_, _) => Connective::Xor,
            Formula::Nand(_) => Connective::Nand,
            Formula::Nor(_) => Connective::Nor,
        }
    }

    /// Visits every name referenced anywhere in this formula.
    pub fn for_each_reference<F: FnMut(&str)>(&self, visit: &mut F) {
        match self {
            Formula::Event(name) => visit(name),
            Formula::Not(inner) | Formula::Null(inner) => inner.for_each_reference(visit),
            Formula::Xor(a, b) => {
                a.for_each_reference(visit);
                b.for_each_reference(visit);
            }
            Formula::And(args)
            | Formula::Or(args)
            | Formula::Nand(args)
            | Formula::Nor(args)
            | Formula::Atleast { args, .. } => {
                for arg in args {
                    arg.for_each_reference(visit);
                }
            }
        }
    }

    /// Basic structural checks: argument arity and the vote number.
    pub fn check_arity(&self) -> Result<(), String> {
        match self {
            Formula::Event(_) => Ok(()),
            Formula::Not(inner) | Formula::Null(inner) => inner.check_arity(),
            Formula::Xor(a, b) => {
                a.check_arity()?;
                b.check_arity()
            }
            Formula::And(args) | Formula::Or(args) | Formula::Nand(args) | Formula::Nor(args) => {
                if args.is_empty() {
                    return Err(format!("{:?} requires at least one argument", self.connective()));
                }
                args.iter().try_for_each(Formula::check_arity)
            }
            Formula::Atleast { min, args } => {
                if *min < 1 {
                    return Err("atleast requires min >= 1".to_string());
                }
                if (*min as usize) > args.len() {
                    return Err(format!(
                        "atleast {} over {} arguments is unsatisfiable",
                        min,
                        args.len()
                    ));
                }
                args.iter().try_for_each(Formula::check_arity)
            }
        }
    }
}
