//! One-shot invariant inference for one procedure.
//!
//! The analyzer opens a scope in the oracle, asserts the SSA, its enabling
//! expressions and the precondition, builds the domain and solver selected by
//! the configuration, and iterates the solver until it reports no
//! improvement. The scope is closed on every exit path.

use std::collections::BTreeSet;

use log::{info, warn};

use crate::config::{Config, DomainConfig, SolverKind};
use crate::domain::{
    Domain, DomainValue, EqualityDomain, HeapDomain, PredicateAbstraction, ProductDomain, RankingDomain,
    SympathDomain, TemplatePolyhedra,
};
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::imprecision::{attribute, ImpreciseVar};
use crate::oracle::{DecisionProcedure, SatResult, Scope};
use crate::ssa::{LocalSsa, Location};
use crate::strategy::{BinsearchSolver, EnumerationSolver, Statistics, StrategySolver};
use crate::template::{LoopId, TemplateGenerator};

/// A strategy solver together with the value it refines.
pub(crate) trait Engine {
    fn name(&self) -> &'static str;
    fn iterate(&mut self, oracle: &mut dyn DecisionProcedure, focus: Option<LoopId>) -> Result<bool>;
    fn pre_constraints(&self) -> Expr;
    fn project(&self, vars: &BTreeSet<String>) -> Expr;
    fn imprecision(&self) -> Vec<(Option<Location>, String)>;
    fn snapshot(&self) -> DomainValue;
    fn statistics(&self) -> Statistics;
}

struct Driven<S: StrategySolver> {
    solver: S,
    value: <S::D as Domain>::Value,
}

impl<S: StrategySolver> Driven<S> {
    fn new(solver: S) -> Self {
        let value = solver.domain().initialize();
        Self { solver, value }
    }
}

impl<S: StrategySolver> Engine for Driven<S> {
    fn name(&self) -> &'static str {
        self.solver.domain().name()
    }

    fn iterate(&mut self, oracle: &mut dyn DecisionProcedure, focus: Option<LoopId>) -> Result<bool> {
        self.solver.iterate_at(oracle, &mut self.value, focus)
    }

    fn pre_constraints(&self) -> Expr {
        self.solver.domain().pre_constraints(&self.value)
    }

    fn project(&self, vars: &BTreeSet<String>) -> Expr {
        self.solver.domain().project_on_vars(&self.value, vars)
    }

    fn imprecision(&self) -> Vec<(Option<Location>, String)> {
        self.solver.domain().identify_invariant_imprecision(&self.value)
    }

    fn snapshot(&self) -> DomainValue {
        self.solver.domain().snapshot(&self.value)
    }

    fn statistics(&self) -> Statistics {
        self.solver.statistics()
    }
}

fn driven<S: StrategySolver + 'static>(solver: S) -> Box<dyn Engine> {
    Box::new(Driven::new(solver))
}

/// Instantiates the domain and solver selected by `config`, with integer
/// rows ranging over `range`. Fails on ill-typed templates.
pub(crate) fn build_engine(
    config: &Config,
    generator: &TemplateGenerator,
    range: (i64, i64),
) -> Result<Box<dyn Engine>> {
    let template = |shape| TemplatePolyhedra::new(generator, shape, &config.withhold, range);
    let engine = match config.domain {
        DomainConfig::Ranking { lexicographic: true } => driven(EnumerationSolver::new(RankingDomain::lexicographic(
            generator,
            config.max_ranking_components,
            config.max_ranking_refinements,
        )?)),
        DomainConfig::Ranking { lexicographic: false } => driven(EnumerationSolver::new(RankingDomain::linear(
            generator,
            config.max_ranking_refinements,
        )?)),
        DomainConfig::Equalities => driven(EnumerationSolver::new(EqualityDomain::new(generator)?)),
        DomainConfig::PredicateAbstraction => driven(EnumerationSolver::new(PredicateAbstraction::new(generator)?)),
        DomainConfig::Heap => driven(EnumerationSolver::new(HeapDomain::new(generator, config.max_heap_targets))),
        DomainConfig::HeapTemplate { shape, sympath } => {
            let product = ProductDomain::new(HeapDomain::new(generator, config.max_heap_targets), template(shape)?);
            if sympath {
                driven(EnumerationSolver::new(SympathDomain::new(product, generator)))
            } else {
                driven(EnumerationSolver::new(product))
            }
        }
        DomainConfig::Template {
            shape,
            solver: SolverKind::Enumeration,
        } => driven(EnumerationSolver::new(template(shape)?)),
        DomainConfig::Template {
            shape,
            solver: SolverKind::Binsearch,
        } => driven(BinsearchSolver::new(template(shape)?)),
    };
    Ok(engine)
}

/// Checks that the asserted context is satisfiable.
pub(crate) fn check_feasible(oracle: &mut dyn DecisionProcedure, stats: &mut Statistics) -> Result<()> {
    stats.solver_calls += 1;
    match oracle.check_sat()? {
        SatResult::Sat => Ok(()),
        SatResult::Unsat => Err(Error::InfeasiblePrecondition),
        SatResult::Unknown(reason) => {
            warn!("feasibility of the precondition is unknown ({})", reason);
            Ok(())
        }
    }
}

pub struct SsaAnalyzer {
    config: Config,
    stats: Statistics,
    engine: Option<Box<dyn Engine>>,
    imprecise: Vec<ImpreciseVar>,
    rounds: usize,
}

impl SsaAnalyzer {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            stats: Statistics::default(),
            engine: None,
            imprecise: Vec::new(),
            rounds: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Infers an invariant of `ssa` under `precondition`.
    pub fn analyze(&mut self, ssa: &LocalSsa, precondition: &Expr, oracle: &mut dyn DecisionProcedure) -> Result<()> {
        self.engine = None;
        self.imprecise.clear();
        self.rounds = 0;

        let mut scope = Scope::new(oracle);
        self.stats.solver_instances += 1;
        scope.declare(&ssa.symbols())?;
        scope.assert(&ssa.formula())?;
        scope.assert(&ssa.enabling_exprs())?;
        scope.assert(precondition)?;
        check_feasible(&mut *scope, &mut self.stats)?;

        let generator = TemplateGenerator::new(&[ssa]);
        let mut engine = build_engine(&self.config, &generator, scope.range())?;
        info!("analyzing {} with {}", ssa.name, engine.name());
        while engine.iterate(&mut *scope, None)? {
            self.rounds += 1;
        }
        self.stats.merge(engine.statistics());
        info!(
            "{}: converged after {} improving round(s), {}",
            ssa.name, self.rounds, self.stats
        );

        if self.config.show_imprecise_vars {
            self.imprecise = attribute(ssa, &engine.imprecision());
        }
        self.engine = Some(engine);
        Ok(())
    }

    /// The inferred invariant projected onto `vars`.
    pub fn result(&self, vars: &BTreeSet<String>) -> Expr {
        self.engine.as_ref().map_or(Expr::True, |e| e.project(vars))
    }

    pub fn invariant(&self) -> Expr {
        self.engine.as_ref().map_or(Expr::True, |e| e.pre_constraints())
    }

    pub fn value(&self) -> Option<DomainValue> {
        self.engine.as_ref().map(|e| e.snapshot())
    }

    pub fn imprecise_vars(&self) -> &[ImpreciseVar] {
        &self.imprecise
    }

    /// Number of rounds that improved the value in the last run.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Accumulated over all runs of this analyzer.
    pub fn statistics(&self) -> Statistics {
        self.stats
    }
}
