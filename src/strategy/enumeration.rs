//! Direct strategy improvement: one query asks for any improvable row, and
//! every row whose literal holds in the model is improved at once.

use log::{debug, warn};

use crate::domain::Domain;
use crate::error::{OracleError, Result};
use crate::expr::Expr;
use crate::oracle::{DecisionProcedure, SatResult, Scope};
use crate::strategy::{Statistics, StrategySolver};
use crate::template::LoopId;

#[derive(Debug, Clone)]
pub struct EnumerationSolver<D> {
    domain: D,
    stats: Statistics,
}

impl<D: Domain> EnumerationSolver<D> {
    pub fn new(domain: D) -> Self {
        Self {
            domain,
            stats: Statistics::default(),
        }
    }
}

impl<D: Domain> StrategySolver for EnumerationSolver<D> {
    type D = D;

    fn domain(&self) -> &D {
        &self.domain
    }

    fn iterate_at(
        &mut self,
        oracle: &mut dyn DecisionProcedure,
        value: &mut D::Value,
        focus: Option<LoopId>,
    ) -> Result<bool> {
        let conds = self.domain.strategy_conditions(value, focus);
        if conds.is_empty() {
            return Ok(false);
        }

        let mut scope = Scope::new(oracle);
        scope.assert(&self.domain.pre_constraints(value))?;
        scope.assert(&Expr::or(conds.iter().map(|(_, c)| c.clone())))?;

        self.stats.solver_calls += 1;
        match scope.check_sat()? {
            SatResult::Unsat => Ok(false),
            SatResult::Unknown(reason) => {
                warn!("{}: no improvement this round ({})", self.domain.name(), reason);
                Ok(false)
            }
            SatResult::Sat => {
                let model = scope
                    .model()
                    .cloned()
                    .ok_or_else(|| OracleError::Internal("satisfiable check without a model".to_string()))?;
                let mut improved = false;
                for (row, cond) in &conds {
                    if model.eval_bool(cond) != Some(true) {
                        continue;
                    }
                    let changed = self.domain.edit_row(value, *row, &model, &*scope, &mut self.stats)?;
                    debug!("{}: row {} improved: {}", self.domain.name(), row, changed);
                    improved |= changed;
                }
                Ok(improved)
            }
        }
    }

    fn statistics(&self) -> Statistics {
        self.stats
    }
}
