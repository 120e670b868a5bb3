//! Linear and lexicographic linear ranking functions.
//!
//! For every loop the domain keeps a candidate ranking function
//! `r(x) = Σ c_i x_i` over the loop-carried integers (or a tuple of them in
//! lexicographic mode). An improving strategy is a transition of the loop
//! along which the candidate does not decrease. The counterexample
//! transitions collected so far are handed to a freshly spawned oracle that
//! searches for coefficients decreasing along all of them (CEGIS). When no
//! coefficients exist within the component budget, or the refinement budget
//! is exhausted, the loop gives up and all of its variables are imprecise.
//!
//! Integers are bounded, so strict decrease along every transition is
//! enough for termination.

use std::collections::BTreeSet;

use log::{debug, info, warn};

use crate::domain::{Domain, DomainValue};
use crate::error::{Error, Result};
use crate::expr::{Expr, Sort};
use crate::oracle::{DecisionProcedure, Model, SatResult};
use crate::ssa::Location;
use crate::strategy::Statistics;
use crate::template::{LoopId, LoopTemplate, TemplateGenerator};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RankingFunction {
    /// No transition of the loop has been seen.
    Unknown,
    /// Components of the (lexicographic) ranking function.
    Found(Vec<Expr>),
    GaveUp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingRow {
    pub function: RankingFunction,
    /// One coefficient vector per component.
    coefficients: Vec<Vec<i64>>,
    /// `pre - post` of every loop variable, per counterexample transition.
    counterexamples: Vec<Vec<i64>>,
}

#[derive(Debug, Clone)]
struct RankedLoop {
    template: LoopTemplate,
    /// `(#lb variable, value flowing back)` of the integer loop variables.
    vars: Vec<(Expr, Expr)>,
}

#[derive(Debug, Clone)]
pub struct RankingDomain {
    loops: Vec<RankedLoop>,
    max_components: usize,
    max_refinements: usize,
}

impl RankingDomain {
    /// Linear ranking functions: a single component.
    pub fn linear(generator: &TemplateGenerator, max_refinements: usize) -> Result<Self> {
        Self::lexicographic(generator, 1, max_refinements)
    }

    pub fn lexicographic(
        generator: &TemplateGenerator,
        max_components: usize,
        max_refinements: usize,
    ) -> Result<Self> {
        let mut loops = Vec::new();
        for lt in generator.loops() {
            let mut vars = Vec::new();
            for v in lt.int_vars() {
                let pre = Expr::var(v.lb.clone());
                generator.check_sorts(&Expr::sub(pre.clone(), v.post.clone()), Sort::Int)?;
                vars.push((pre, v.post.clone()));
            }
            loops.push(RankedLoop {
                template: lt.clone(),
                vars,
            });
        }
        Ok(Self {
            loops,
            max_components: max_components.max(1),
            max_refinements,
        })
    }

    /// Σ c_i (pre_i - post_i) for every component.
    fn deltas(&self, l: &RankedLoop, coefficients: &[Vec<i64>]) -> Vec<Expr> {
        coefficients
            .iter()
            .map(|cs| {
                Expr::sum(
                    cs.iter()
                        .zip(&l.vars)
                        .map(|(&c, (pre, post))| Expr::scale(c, Expr::sub(pre.clone(), post.clone()))),
                )
            })
            .collect()
    }

    fn component_exprs(&self, l: &RankedLoop, coefficients: &[Vec<i64>]) -> Vec<Expr> {
        coefficients
            .iter()
            .map(|cs| Expr::sum(cs.iter().zip(&l.vars).map(|(&c, (pre, _))| Expr::scale(c, pre.clone()))))
            .collect()
    }

    fn synthesize(
        &self,
        l: &RankedLoop,
        row: &RankingRow,
        oracle: &dyn DecisionProcedure,
        stats: &mut Statistics,
    ) -> Result<Option<Vec<Vec<i64>>>> {
        let start = row.coefficients.len().max(1);
        for components in start..=self.max_components {
            let names: Vec<Vec<String>> = (0..components)
                .map(|k| (0..l.vars.len()).map(|i| format!("$rank#c{}_{}", k, i)).collect())
                .collect();
            let mut inner = oracle.spawn();
            stats.solver_instances += 1;
            let declared: Vec<(String, Sort)> = names.iter().flatten().map(|n| (n.clone(), Sort::Int)).collect();
            inner.declare(&declared)?;
            for diffs in &row.counterexamples {
                let deltas: Vec<Expr> = names
                    .iter()
                    .map(|cs| Expr::sum(cs.iter().zip(diffs).map(|(c, &d)| Expr::scale(d, Expr::var(c.clone())))))
                    .collect();
                inner.assert(&lexicographic_decrease(&deltas))?;
            }
            stats.solver_calls += 1;
            match inner.check_sat()? {
                SatResult::Sat => {
                    let model = inner.model().ok_or_else(|| Error::MissingModelValue(names.concat().join(", ")))?;
                    let coefficients = names
                        .iter()
                        .map(|cs| cs.iter().map(|c| model.get_int(c).unwrap_or(0)).collect())
                        .collect();
                    return Ok(Some(coefficients));
                }
                SatResult::Unsat => {
                    debug!("no ranking function with {} component(s)", components);
                }
                SatResult::Unknown(reason) => {
                    warn!("ranking synthesis inconclusive: {}", reason);
                    return Ok(None);
                }
            }
        }
        Ok(None)
    }
}

/// `∨_k (Δ_k > 0 ∧ ∧_{m<k} Δ_m >= 0)`
fn lexicographic_decrease(deltas: &[Expr]) -> Expr {
    Expr::or((0..deltas.len()).map(|k| {
        Expr::and(
            deltas[..k]
                .iter()
                .map(|d| Expr::ge(d.clone(), Expr::int(0)))
                .chain([Expr::gt(deltas[k].clone(), Expr::int(0))]),
        )
    }))
}

impl Domain for RankingDomain {
    type Value = Vec<RankingRow>;

    fn name(&self) -> &'static str {
        if self.max_components > 1 {
            "lexicographic ranking functions"
        } else {
            "linear ranking functions"
        }
    }

    fn initialize(&self) -> Self::Value {
        let row = RankingRow {
            function: RankingFunction::Unknown,
            coefficients: Vec::new(),
            counterexamples: Vec::new(),
        };
        vec![row; self.loops.len()]
    }

    fn pre_constraints(&self, _value: &Self::Value) -> Expr {
        Expr::True
    }

    fn strategy_conditions(&self, value: &Self::Value, focus: Option<LoopId>) -> Vec<(usize, Expr)> {
        let mut res = Vec::new();
        for (i, (l, row)) in self.loops.iter().zip(value).enumerate() {
            if focus.map_or(false, |id| l.template.id != id) {
                continue;
            }
            let transition = Expr::and([l.template.pre_guard.clone(), l.template.post_guard.clone()]);
            let cond = match &row.function {
                RankingFunction::Unknown => transition,
                RankingFunction::Found(_) => {
                    let decrease = lexicographic_decrease(&self.deltas(l, &row.coefficients));
                    Expr::and([transition, Expr::not(decrease)])
                }
                RankingFunction::GaveUp => continue,
            };
            res.push((i, cond));
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
        let l = &self.loops[row];
        let mut diffs = Vec::with_capacity(l.vars.len());
        for (pre, post) in &l.vars {
            let a = model
                .eval_int(pre)
                .ok_or_else(|| Error::MissingModelValue(pre.to_string()))?;
            let b = model
                .eval_int(post)
                .ok_or_else(|| Error::MissingModelValue(post.to_string()))?;
            diffs.push(a - b);
        }
        let current = &mut value[row];
        current.counterexamples.push(diffs);
        if current.counterexamples.len() > self.max_refinements {
            warn!(
                "loop at {}: giving up after {} refinements",
                l.template.loopback, self.max_refinements
            );
            current.function = RankingFunction::GaveUp;
            return Ok(true);
        }
        match self.synthesize(l, current, oracle, stats)? {
            Some(coefficients) => {
                let components = self.component_exprs(l, &coefficients);
                info!(
                    "loop at {}: candidate ranking function ({})",
                    l.template.loopback,
                    components.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(", ")
                );
                current.function = RankingFunction::Found(components);
                current.coefficients = coefficients;
            }
            None => {
                warn!("loop at {}: no ranking function found", l.template.loopback);
                current.function = RankingFunction::GaveUp;
            }
        }
        Ok(true)
    }

    fn project_on_vars(&self, value: &Self::Value, vars: &BTreeSet<String>) -> Expr {
        Expr::and(self.loops.iter().zip(value).filter_map(|(l, row)| {
            let RankingFunction::Found(_) = row.function else {
                return None;
            };
            let covered = l
                .vars
                .iter()
                .all(|(pre, _)| pre.symbols().keys().all(|n| vars.contains(n)));
            covered.then(|| {
                Expr::implies(
                    Expr::and([l.template.pre_guard.clone(), l.template.post_guard.clone()]),
                    lexicographic_decrease(&self.deltas(l, &row.coefficients)),
                )
            })
        }))
    }

    fn identify_invariant_imprecision(&self, value: &Self::Value) -> Vec<(Option<Location>, String)> {
        let mut res = Vec::new();
        for (l, row) in self.loops.iter().zip(value) {
            if row.function != RankingFunction::GaveUp {
                continue;
            }
            for (pre, _) in &l.vars {
                for name in pre.symbol_names() {
                    res.push((Some(l.template.loopback), name));
                }
            }
        }
        res
    }

    fn snapshot(&self, value: &Self::Value) -> DomainValue {
        DomainValue::Ranking(
            self.loops
                .iter()
                .zip(value)
                .map(|(l, row)| (l.template.loopback, row.function.clone()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_lexicographic_decrease_shape() {
        let d0 = Expr::var("d0");
        let d1 = Expr::var("d1");
        let e = lexicographic_decrease(&[d0.clone(), d1.clone()]);
        assert_eq!(
            e,
            Expr::or([
                Expr::gt(d0.clone(), Expr::int(0)),
                Expr::and([Expr::ge(d0, Expr::int(0)), Expr::gt(d1, Expr::int(0))]),
            ])
        );
        assert_eq!(lexicographic_decrease(&[]), Expr::False);
    }
}
