//! Symbolic-path splitting: a disjunction of inner values, one per symbolic
//! path through the loop bodies. A path is a valuation of the branch
//! conditions evaluated inside the loops; paths are discovered lazily from
//! the models of improvement queries.

use std::collections::BTreeSet;

use log::info;

use crate::domain::{dedup_imprecision, Domain, DomainValue};
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::oracle::{DecisionProcedure, Model};
use crate::ssa::Location;
use crate::strategy::Statistics;
use crate::template::{LoopId, TemplateGenerator};

/// Row `r` of path `k` is row `r * STRIDE + k` of the wrapper.
const STRIDE: usize = 1 << 16;
/// Path slot of rows improvable along a path not seen yet.
const NEW_PATH: usize = STRIDE - 1;

#[derive(Debug, Clone)]
pub struct SympathDomain<D> {
    inner: D,
    conds: Vec<Expr>,
}

impl<D: Domain> SympathDomain<D> {
    pub fn new(inner: D, generator: &TemplateGenerator) -> Self {
        let mut conds: Vec<Expr> = Vec::new();
        for lt in generator.loops() {
            for c in &lt.path_conds {
                if !conds.contains(c) {
                    conds.push(c.clone());
                }
            }
        }
        Self { inner, conds }
    }

    fn path_expr(&self, path: &[bool]) -> Expr {
        Expr::and(
            self.conds
                .iter()
                .zip(path)
                .map(|(c, &taken)| if taken { c.clone() } else { Expr::not(c.clone()) }),
        )
    }

    fn path_of(&self, model: &Model) -> Result<Vec<bool>> {
        self.conds
            .iter()
            .map(|c| {
                model
                    .eval_bool(c)
                    .ok_or_else(|| Error::MissingModelValue(c.to_string()))
            })
            .collect()
    }
}

impl<D: Domain> Domain for SympathDomain<D> {
    type Value = Vec<(Vec<bool>, D::Value)>;

    fn name(&self) -> &'static str {
        "symbolic paths"
    }

    fn initialize(&self) -> Self::Value {
        Vec::new()
    }

    fn pre_constraints(&self, value: &Self::Value) -> Expr {
        if value.is_empty() {
            return self.inner.pre_constraints(&self.inner.initialize());
        }
        Expr::or(value.iter().map(|(_, v)| self.inner.pre_constraints(v)))
    }

    fn strategy_conditions(&self, value: &Self::Value, focus: Option<LoopId>) -> Vec<(usize, Expr)> {
        let mut res = Vec::new();
        for (k, (path, v)) in value.iter().enumerate() {
            let along = self.path_expr(path);
            for (r, c) in self.inner.strategy_conditions(v, focus) {
                res.push((r * STRIDE + k, Expr::and([along.clone(), c])));
            }
        }
        if value.len() < NEW_PATH {
            let unseen = Expr::not(Expr::or(value.iter().map(|(path, _)| self.path_expr(path))));
            for (r, c) in self.inner.strategy_conditions(&self.inner.initialize(), focus) {
                res.push((r * STRIDE + NEW_PATH, Expr::and([unseen.clone(), c])));
            }
        }
        res
    }

    fn edit_row(
        &self,
        value: &mut Self::Value,
        row: usize,
        model: &Model,
        oracle: &dyn DecisionProcedure,
        stats: &mut Statistics,
    ) -> Result<bool> {
        let (r, slot) = (row / STRIDE, row % STRIDE);
        let mut created = false;
        let k = if slot == NEW_PATH {
            let path = self.path_of(model)?;
            match value.iter().position(|(p, _)| *p == path) {
                Some(k) => k,
                None => {
                    info!("new symbolic path {:?}", path);
                    value.push((path, self.inner.initialize()));
                    created = true;
                    value.len() - 1
                }
            }
        } else {
            slot
        };
        let changed = self.inner.edit_row(&mut value[k].1, r, model, oracle, stats)?;
        Ok(created || changed)
    }

    fn project_on_vars(&self, value: &Self::Value, vars: &BTreeSet<String>) -> Expr {
        if value.is_empty() {
            return self.inner.project_on_vars(&self.inner.initialize(), vars);
        }
        Expr::or(value.iter().map(|(_, v)| self.inner.project_on_vars(v, vars)))
    }

    fn identify_invariant_imprecision(&self, value: &Self::Value) -> Vec<(Option<Location>, String)> {
        dedup_imprecision(
            value
                .iter()
                .flat_map(|(_, v)| self.inner.identify_invariant_imprecision(v))
                .collect(),
        )
    }

    fn snapshot(&self, value: &Self::Value) -> DomainValue {
        DomainValue::Sympath(
            value
                .iter()
                .map(|(path, v)| (path.clone(), self.inner.snapshot(v)))
                .collect(),
        )
    }
}
