//! Strategy solvers: drive one domain value to a fixed point by alternating
//! "find an improving strategy" and "adopt it" steps against the oracle.

use std::fmt::{self, Display, Formatter};

use crate::domain::Domain;
use crate::error::Result;
use crate::oracle::DecisionProcedure;
use crate::template::LoopId;

pub mod binsearch;
pub mod enumeration;

pub use binsearch::BinsearchSolver;
pub use enumeration::EnumerationSolver;

/// Oracle usage counters.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Statistics {
    /// Number of oracle instances created.
    pub solver_instances: usize,
    /// Number of satisfiability checks issued.
    pub solver_calls: usize,
}

impl Statistics {
    pub fn merge(&mut self, other: Statistics) {
        self.solver_instances += other.solver_instances;
        self.solver_calls += other.solver_calls;
    }
}

impl Display for Statistics {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} solver instance(s), {} solver call(s)",
            self.solver_instances, self.solver_calls
        )
    }
}

pub trait StrategySolver {
    type D: Domain;

    fn domain(&self) -> &Self::D;

    /// Performs one improvement round, restricted to the rows of `focus` if
    /// given. Returns `false` when no row improved.
    fn iterate_at(
        &mut self,
        oracle: &mut dyn DecisionProcedure,
        value: &mut <Self::D as Domain>::Value,
        focus: Option<LoopId>,
    ) -> Result<bool>;

    fn iterate(
        &mut self,
        oracle: &mut dyn DecisionProcedure,
        value: &mut <Self::D as Domain>::Value,
    ) -> Result<bool> {
        self.iterate_at(oracle, value, None)
    }

    fn statistics(&self) -> Statistics;
}
