//! Strategy improvement by bisection, for template polyhedra.
//!
//! Instead of adopting whatever post-state value the model happens to show,
//! the solver picks one improvable row and bisects its bound between the
//! model's value and the row maximum, so each round settles the row at the
//! optimum for the current pre-state assumption in `O(log range)` cheap
//! queries.

use log::{debug, warn};

use crate::domain::{Domain, RowValue, TemplatePolyhedra};
use crate::error::{OracleError, Result};
use crate::expr::Expr;
use crate::oracle::{DecisionProcedure, SatResult, Scope};
use crate::strategy::{Statistics, StrategySolver};
use crate::template::LoopId;

#[derive(Debug, Clone)]
pub struct BinsearchSolver {
    domain: TemplatePolyhedra,
    stats: Statistics,
}

impl BinsearchSolver {
    pub fn new(domain: TemplatePolyhedra) -> Self {
        Self {
            domain,
            stats: Statistics::default(),
        }
    }

    /// Checks whether row `i` can reach at least `bound` from a pre-state
    /// satisfying `assumption`. Returns the model's value of the row if so.
    fn reaches(
        &mut self,
        oracle: &mut dyn DecisionProcedure,
        assumption: &Expr,
        i: usize,
        bound: i64,
    ) -> Result<Option<i64>> {
        let Some(improvable) = self.domain.improvement_condition(i, RowValue::Bound(bound - 1)) else {
            return Ok(None);
        };
        let mut scope = Scope::new(oracle);
        scope.assert(assumption)?;
        scope.assert(&improvable)?;
        self.stats.solver_calls += 1;
        match scope.check_sat()? {
            SatResult::Sat => {
                let model = scope
                    .model()
                    .ok_or_else(|| OracleError::Internal("satisfiable check without a model".to_string()))?;
                Ok(Some(self.domain.post_value(i, model)?))
            }
            SatResult::Unsat => Ok(None),
            SatResult::Unknown(reason) => {
                warn!("bisection step inconclusive ({}), keeping {}", reason, bound - 1);
                Ok(None)
            }
        }
    }
}

impl StrategySolver for BinsearchSolver {
    type D = TemplatePolyhedra;

    fn domain(&self) -> &TemplatePolyhedra {
        &self.domain
    }

    fn iterate_at(
        &mut self,
        oracle: &mut dyn DecisionProcedure,
        value: &mut Vec<RowValue>,
        focus: Option<LoopId>,
    ) -> Result<bool> {
        let conds = self.domain.strategy_conditions(value, focus);
        if conds.is_empty() {
            return Ok(false);
        }

        // Find one improvable row and a first witness value for it.
        let (row, mut lower) = {
            let mut scope = Scope::new(oracle);
            scope.assert(&self.domain.pre_constraints(value))?;
            scope.assert(&Expr::or(conds.iter().map(|(_, c)| c.clone())))?;
            self.stats.solver_calls += 1;
            match scope.check_sat()? {
                SatResult::Unsat => return Ok(false),
                SatResult::Unknown(reason) => {
                    warn!("binsearch: no improvement this round ({})", reason);
                    return Ok(false);
                }
                SatResult::Sat => {
                    let model = scope
                        .model()
                        .ok_or_else(|| OracleError::Internal("satisfiable check without a model".to_string()))?;
                    let Some((row, _)) = conds.iter().find(|(_, c)| model.eval_bool(c) == Some(true)) else {
                        return Ok(false);
                    };
                    (*row, self.domain.post_value(*row, model)?)
                }
            }
        };

        let assumption = self.domain.pre_constraints(value);
        let mut upper = self.domain.row_max(row);
        while lower < upper {
            let mid = lower + (upper - lower + 1) / 2;
            match self.reaches(oracle, &assumption, row, mid)? {
                Some(v) => lower = v.max(mid),
                None => upper = mid - 1,
            }
        }
        debug!("binsearch: row {} settles at {}", row, lower);
        Ok(self.domain.raise(value, row, lower))
    }

    fn statistics(&self) -> Statistics {
        self.stats
    }
}
