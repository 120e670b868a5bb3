//! Predicate abstraction over a fixed set of candidate predicates per loop:
//! `x >= 0` for every loop-carried integer and `x <= y`, `y <= x` for every
//! pair. Predicates violated by some post-state are dropped.

use std::collections::{BTreeSet, HashMap};

use crate::domain::{mentions_only, Domain, DomainValue};
use crate::error::Result;
use crate::expr::{Expr, Sort};
use crate::oracle::{DecisionProcedure, Model};
use crate::ssa::Location;
use crate::strategy::Statistics;
use crate::template::{LoopId, LoopTemplate, TemplateGenerator};

#[derive(Debug, Clone)]
pub struct PredicateAbstraction {
    loops: Vec<LoopTemplate>,
    /// `(loop, predicate over #lb variables, same predicate over post values)`
    predicates: Vec<(LoopId, Expr, Expr)>,
}

impl PredicateAbstraction {
    pub fn new(generator: &TemplateGenerator) -> Result<Self> {
        let mut predicates = Vec::new();
        for lt in generator.loops() {
            let post_map: HashMap<String, Expr> = lt.post_map();
            let vars: Vec<Expr> = lt.int_vars().map(|v| Expr::var(v.lb.clone())).collect();
            let mut candidates = Vec::new();
            for x in &vars {
                candidates.push(Expr::ge(x.clone(), Expr::int(0)));
            }
            for (i, x) in vars.iter().enumerate() {
                for y in &vars[i + 1..] {
                    candidates.push(Expr::le(x.clone(), y.clone()));
                    candidates.push(Expr::le(y.clone(), x.clone()));
                }
            }
            for p in candidates {
                let post = p.substitute(&post_map);
                generator.check_sorts(&p, Sort::Bool)?;
                generator.check_sorts(&post, Sort::Bool)?;
                predicates.push((lt.id, p, post));
            }
        }
        Ok(Self {
            loops: generator.loops().to_vec(),
            predicates,
        })
    }
}

impl Domain for PredicateAbstraction {
    type Value = Vec<bool>;

    fn name(&self) -> &'static str {
        "predicate abstraction"
    }

    fn initialize(&self) -> Self::Value {
        vec![true; self.predicates.len()]
    }

    fn pre_constraints(&self, value: &Self::Value) -> Expr {
        Expr::and(
            self.predicates
                .iter()
                .zip(value)
                .filter(|(_, &alive)| alive)
                .map(|((id, pre, _), _)| Expr::implies(self.loops[id.0].pre_guard.clone(), pre.clone())),
        )
    }

    fn strategy_conditions(&self, value: &Self::Value, focus: Option<LoopId>) -> Vec<(usize, Expr)> {
        self.predicates
            .iter()
            .zip(value)
            .enumerate()
            .filter(|(_, ((id, _, _), &alive))| alive && focus.map_or(true, |f| *id == f))
            .map(|(i, ((id, _, post), _))| {
                let post_guard = self.loops[id.0].post_guard.clone();
                (i, Expr::and([post_guard, Expr::not(post.clone())]))
            })
            .collect()
    }

    fn edit_row(
        &self,
        value: &mut Self::Value,
        row: usize,
        _model: &Model,
        _oracle: &dyn DecisionProcedure,
        _stats: &mut Statistics,
    ) -> Result<bool> {
        let changed = value[row];
        value[row] = false;
        Ok(changed)
    }

    fn project_on_vars(&self, value: &Self::Value, vars: &BTreeSet<String>) -> Expr {
        Expr::and(
            self.predicates
                .iter()
                .zip(value)
                .filter(|((_, pre, _), &alive)| alive && mentions_only(pre, vars))
                .map(|((_, pre, _), _)| pre.clone()),
        )
    }

    fn identify_invariant_imprecision(&self, _value: &Self::Value) -> Vec<(Option<Location>, String)> {
        Vec::new()
    }

    fn snapshot(&self, value: &Self::Value) -> DomainValue {
        DomainValue::Predicates(
            self.predicates
                .iter()
                .zip(value)
                .filter(|(_, &alive)| alive)
                .map(|((_, pre, _), _)| pre.clone())
                .collect(),
        )
    }
}
