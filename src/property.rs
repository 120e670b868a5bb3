//! Checked assertions and their status.

use std::fmt::{self, Display, Formatter};

use crate::expr::Expr;
use crate::oracle::Model;
use crate::ssa::{Assertion, Location, SourceLocation, SsaNode};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PropertyStatus {
    Unknown,
    Holds,
    Violated,
}

impl Display for PropertyStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            PropertyStatus::Unknown => "UNKNOWN",
            PropertyStatus::Holds => "OK",
            PropertyStatus::Violated => "FAILURE",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub location: Location,
    pub source: SourceLocation,
    pub description: String,
    /// The assertion under the guard of its node.
    pub condition: Expr,
    pub status: PropertyStatus,
    /// Valuation of the condition's variables, for violated properties.
    pub countermodel: Option<Model>,
}

impl Property {
    pub fn new(node: &SsaNode, assertion: &Assertion) -> Self {
        Self {
            location: node.location,
            source: node.source.clone(),
            description: assertion.description.clone(),
            condition: Expr::implies(node.guard.clone(), assertion.condition.clone()),
            status: PropertyStatus::Unknown,
            countermodel: None,
        }
    }

    /// Restricts `model` to the variables of the condition.
    pub fn countermodel_from(&self, model: &Model) -> Model {
        let mut res = Model::new();
        for name in self.condition.symbol_names() {
            if let Some(v) = model.get(&name) {
                res.insert(name, v);
            }
        }
        res
    }
}

impl Display for Property {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.source, self.description, self.status)?;
        if let Some(model) = &self.countermodel {
            let values: Vec<String> = model.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            write!(f, " ({})", values.join(", "))?;
        }
        Ok(())
    }
}
