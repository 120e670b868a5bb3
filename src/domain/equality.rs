//! Equalities between loop-carried integers, Houdini style: every candidate
//! `x == y` starts assumed and is dropped once a post-state violates it.

use std::collections::BTreeSet;

use crate::domain::{mentions_only, Domain, DomainValue};
use crate::error::Result;
use crate::expr::{Expr, Sort};
use crate::oracle::{DecisionProcedure, Model};
use crate::ssa::Location;
use crate::strategy::Statistics;
use crate::template::{LoopId, LoopTemplate, TemplateGenerator};

#[derive(Debug, Clone)]
struct Candidate {
    loop_id: LoopId,
    lhs: String,
    rhs: String,
    pre: Expr,
    post: Expr,
}

#[derive(Debug, Clone)]
pub struct EqualityDomain {
    loops: Vec<LoopTemplate>,
    candidates: Vec<Candidate>,
}

impl EqualityDomain {
    pub fn new(generator: &TemplateGenerator) -> Result<Self> {
        let mut candidates = Vec::new();
        for lt in generator.loops() {
            let vars: Vec<_> = lt.int_vars().collect();
            for (i, x) in vars.iter().enumerate() {
                for y in &vars[i + 1..] {
                    let candidate = Candidate {
                        loop_id: lt.id,
                        lhs: x.lb.clone(),
                        rhs: y.lb.clone(),
                        pre: Expr::eq(Expr::var(x.lb.clone()), Expr::var(y.lb.clone())),
                        post: Expr::eq(x.post.clone(), y.post.clone()),
                    };
                    generator.check_sorts(&candidate.pre, Sort::Bool)?;
                    generator.check_sorts(&candidate.post, Sort::Bool)?;
                    candidates.push(candidate);
                }
            }
        }
        Ok(Self {
            loops: generator.loops().to_vec(),
            candidates,
        })
    }
}

impl Domain for EqualityDomain {
    /// Whether each candidate still holds.
    type Value = Vec<bool>;

    fn name(&self) -> &'static str {
        "equalities"
    }

    fn initialize(&self) -> Self::Value {
        vec![true; self.candidates.len()]
    }

    fn pre_constraints(&self, value: &Self::Value) -> Expr {
        Expr::and(
            self.candidates
                .iter()
                .zip(value)
                .filter(|(_, &alive)| alive)
                .map(|(c, _)| Expr::implies(self.loops[c.loop_id.0].pre_guard.clone(), c.pre.clone())),
        )
    }

    fn strategy_conditions(&self, value: &Self::Value, focus: Option<LoopId>) -> Vec<(usize, Expr)> {
        self.candidates
            .iter()
            .zip(value)
            .enumerate()
            .filter(|(_, (c, &alive))| alive && focus.map_or(true, |id| c.loop_id == id))
            .map(|(i, (c, _))| {
                let post_guard = self.loops[c.loop_id.0].post_guard.clone();
                (i, Expr::and([post_guard, Expr::not(c.post.clone())]))
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
            self.candidates
                .iter()
                .zip(value)
                .filter(|(c, &alive)| alive && mentions_only(&c.pre, vars))
                .map(|(c, _)| c.pre.clone()),
        )
    }

    fn identify_invariant_imprecision(&self, _value: &Self::Value) -> Vec<(Option<Location>, String)> {
        Vec::new()
    }

    fn snapshot(&self, value: &Self::Value) -> DomainValue {
        DomainValue::Equality(
            self.candidates
                .iter()
                .zip(value)
                .filter(|(_, &alive)| alive)
                .map(|(c, _)| (c.lhs.clone(), c.rhs.clone()))
                .collect(),
        )
    }
}
