//! Contract of the incremental decision procedure consumed by the core.
//!
//! The analysis never looks inside the oracle: it asserts expressions into
//! nested scopes, asks for satisfiability, and reads concrete values back
//! from the model of the last satisfiable check.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Deref, DerefMut};

use log::warn;

use crate::error::OracleError;
use crate::expr::{Expr, Sort};

/// Answer of a satisfiability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SatResult {
    Sat,
    Unsat,
    /// The oracle gave up, e.g. on a resource limit.
    Unknown(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ModelValue {
    Int(i64),
    Bool(bool),
}

impl fmt::Display for ModelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelValue::Int(v) => write!(f, "{}", v),
            ModelValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Satisfying assignment of the last successful check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    values: BTreeMap<String, ModelValue>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ModelValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<ModelValue> {
        self.values.get(name).copied()
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ModelValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ModelValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ModelValue)> {
        self.values.iter()
    }

    /// Evaluates an integer expression; `None` if a variable has no value.
    pub fn eval_int(&self, e: &Expr) -> Option<i64> {
        match self.eval(e)? {
            ModelValue::Int(v) => Some(v),
            ModelValue::Bool(_) => None,
        }
    }

    /// Evaluates a boolean expression; `None` if a variable has no value.
    pub fn eval_bool(&self, e: &Expr) -> Option<bool> {
        match self.eval(e)? {
            ModelValue::Bool(b) => Some(b),
            ModelValue::Int(_) => None,
        }
    }

    pub fn eval(&self, e: &Expr) -> Option<ModelValue> {
        use ModelValue::{Bool, Int};
        let v = match e {
            Expr::True => Bool(true),
            Expr::False => Bool(false),
            Expr::Int(v) => Int(*v),
            Expr::Var(name, _) => self.get(name)?,
            Expr::Not(a) => Bool(!self.eval_bool(a)?),
            Expr::And(args) => {
                let mut res = true;
                for a in args {
                    res &= self.eval_bool(a)?;
                }
                Bool(res)
            }
            Expr::Or(args) => {
                let mut res = false;
                for a in args {
                    res |= self.eval_bool(a)?;
                }
                Bool(res)
            }
            Expr::Implies(a, b) => Bool(!self.eval_bool(a)? || self.eval_bool(b)?),
            Expr::Neg(a) => Int(self.eval_int(a)?.checked_neg()?),
            Expr::Add(args) => {
                let mut res = 0i64;
                for a in args {
                    res = res.checked_add(self.eval_int(a)?)?;
                }
                Int(res)
            }
            Expr::Sub(a, b) => Int(self.eval_int(a)?.checked_sub(self.eval_int(b)?)?),
            Expr::Mul(k, a) => Int(self.eval_int(a)?.checked_mul(*k)?),
            Expr::Eq(a, b) => Bool(self.eval(a)? == self.eval(b)?),
            Expr::Le(a, b) => Bool(self.eval_int(a)? <= self.eval_int(b)?),
            Expr::Lt(a, b) => Bool(self.eval_int(a)? < self.eval_int(b)?),
            Expr::Ite(c, a, b) => {
                if self.eval_bool(c)? {
                    self.eval(a)?
                } else {
                    self.eval(b)?
                }
            }
        };
        Some(v)
    }
}

/// Incremental SAT/SMT oracle with scoped assertions.
pub trait DecisionProcedure {
    /// Announces symbols ahead of their first use. Oracles whose cost depends
    /// on the declaration order may lay them out together; others ignore it.
    fn declare(&mut self, symbols: &[(String, Sort)]) -> Result<(), OracleError> {
        let _ = symbols;
        Ok(())
    }

    /// Adds `expr` to the innermost scope.
    fn assert(&mut self, expr: &Expr) -> Result<(), OracleError>;

    /// Opens a nested scope.
    fn push(&mut self);

    /// Discards the innermost scope and everything asserted in it.
    fn pop(&mut self) -> Result<(), OracleError>;

    /// Number of currently open nested scopes.
    fn depth(&self) -> usize;

    /// Smallest and largest value an integer symbol can take.
    fn range(&self) -> (i64, i64);

    fn check_sat(&mut self) -> Result<SatResult, OracleError>;

    /// Model of the last check, if it answered [`SatResult::Sat`].
    fn model(&self) -> Option<&Model>;

    /// Creates an independent oracle of the same kind and configuration.
    fn spawn(&self) -> Box<dyn DecisionProcedure>;

    fn value_of(&self, name: &str) -> Option<ModelValue> {
        self.model().and_then(|m| m.get(name))
    }
}

/// Scoped access to an oracle: pushes on creation and pops on drop, so the
/// scope is released on every exit path.
pub struct Scope<'a> {
    oracle: &'a mut dyn DecisionProcedure,
    depth: usize,
}

impl<'a> Scope<'a> {
    pub fn new(oracle: &'a mut dyn DecisionProcedure) -> Self {
        oracle.push();
        let depth = oracle.depth();
        Self { oracle, depth }
    }
}

impl<'a> Deref for Scope<'a> {
    type Target = dyn DecisionProcedure + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.oracle
    }
}

impl DerefMut for Scope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.oracle
    }
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        // Inner scopes left open by a failed query are closed as well.
        while self.oracle.depth() >= self.depth {
            if let Err(e) = self.oracle.pop() {
                warn!("failed to release oracle scope: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_model_eval() {
        let mut model = Model::new();
        model.insert("x", ModelValue::Int(3));
        model.insert("c", ModelValue::Bool(false));
        let e = Expr::ite(
            Expr::bool_var("c"),
            Expr::int(0),
            Expr::add(Expr::scale(2, Expr::var("x")), Expr::int(1)),
        );
        assert_eq!(model.eval_int(&e), Some(7));
        assert_eq!(model.eval_bool(&Expr::lt(Expr::var("x"), Expr::int(4))), Some(true));
        assert_eq!(model.eval_int(&Expr::var("missing")), None);
        assert_eq!(model.eval_int(&Expr::bool_var("c")), None);
    }
}
