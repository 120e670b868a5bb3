//! Fixed-point driver over the loops of one procedure, or of two versions of
//! it in differential mode.
//!
//! Every loop contributes a backward edge from its loop-back node to its loop
//! head. A pass gives each edge, in location order, one improvement round
//! focused on that loop; passes repeat until one changes nothing. Properties
//! are then checked under the final invariant.
//!
//! In differential mode the old version is renamed with [`OLD_TAG`], its
//! inputs are equated with the new version's inputs of the same name, and its
//! assertions are assumed. Properties are those of the new version.

use std::collections::BTreeSet;

use log::{debug, info, warn};

use crate::analyzer::{build_engine, check_feasible, Engine};
use crate::config::Config;
use crate::domain::DomainValue;
use crate::error::{OracleError, Result};
use crate::expr::{Expr, Sort};
use crate::imprecision::{attribute_one, ImpreciseVar};
use crate::oracle::{DecisionProcedure, SatResult, Scope};
use crate::property::{Property, PropertyStatus};
use crate::ssa::{LocalSsa, Location};
use crate::strategy::Statistics;
use crate::template::{LoopId, TemplateGenerator};

/// Suffix of every variable of the old version.
pub const OLD_TAG: &str = "@old";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackwardsEdge {
    /// Loop-back node.
    pub from: Location,
    /// Loop head.
    pub to: Location,
    pub loop_id: LoopId,
    /// Guard under which the invariant is assumed on the `#lb` variables.
    pub pre_predicate: Expr,
    /// Guard under which the values flowing back must satisfy it.
    pub post_predicate: Expr,
}

pub struct SsaFixedPoint {
    config: Config,
    ssa: LocalSsa,
    old: Option<LocalSsa>,
    precondition: Expr,
    generator: TemplateGenerator,
    edges: Vec<BackwardsEdge>,
    properties: Vec<Property>,
    engine: Option<Box<dyn Engine>>,
    iteration_number: usize,
    stats: Statistics,
    imprecise: Vec<ImpreciseVar>,
}

impl SsaFixedPoint {
    pub fn new(config: Config, ssa: LocalSsa) -> Self {
        Self::build(config, ssa, None)
    }

    pub fn differential(config: Config, new: LocalSsa, old: &LocalSsa) -> Self {
        Self::build(config, new, Some(old.tagged(OLD_TAG)))
    }

    fn build(config: Config, ssa: LocalSsa, old: Option<LocalSsa>) -> Self {
        let generator = match &old {
            Some(old) => TemplateGenerator::new(&[&ssa, old]),
            None => TemplateGenerator::new(&[&ssa]),
        };
        let mut edges: Vec<BackwardsEdge> = generator
            .loops()
            .iter()
            .map(|lt| BackwardsEdge {
                from: lt.loopback,
                to: lt.loophead,
                loop_id: lt.id,
                pre_predicate: lt.pre_guard.clone(),
                post_predicate: lt.post_guard.clone(),
            })
            .collect();
        edges.sort_by_key(|e| (e.from, e.loop_id));
        let properties = ssa.assertions().map(|(node, a)| Property::new(node, a)).collect();
        Self {
            config,
            ssa,
            old,
            precondition: Expr::True,
            generator,
            edges,
            properties,
            engine: None,
            iteration_number: 0,
            stats: Statistics::default(),
            imprecise: Vec::new(),
        }
    }

    pub fn with_precondition(mut self, precondition: Expr) -> Self {
        self.precondition = precondition;
        self
    }

    pub fn backwards_edges(&self) -> &[BackwardsEdge] {
        &self.edges
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Number of passes of the last run.
    pub fn iteration_number(&self) -> usize {
        self.iteration_number
    }

    pub fn statistics(&self) -> Statistics {
        self.stats
    }

    pub fn imprecise_vars(&self) -> &[ImpreciseVar] {
        &self.imprecise
    }

    pub fn value(&self) -> Option<DomainValue> {
        self.engine.as_ref().map(|e| e.snapshot())
    }

    pub fn invariant(&self) -> Expr {
        self.engine.as_ref().map_or(Expr::True, |e| e.pre_constraints())
    }

    pub fn result(&self, vars: &BTreeSet<String>) -> Expr {
        self.engine.as_ref().map_or(Expr::True, |e| e.project(vars))
    }

    /// Equates the inputs shared by both versions.
    pub fn tie_inputs_together(&self) -> Expr {
        let Some(old) = &self.old else {
            return Expr::True;
        };
        Expr::and(self.ssa.inputs().iter().filter_map(|(name, sort)| {
            let tagged = format!("{}{}", name, OLD_TAG);
            old.inputs()
                .iter()
                .any(|(n, s)| *n == tagged && s == sort)
                .then(|| Expr::eq(Expr::var_of_sort(name.clone(), *sort), Expr::var_of_sort(tagged, *sort)))
        }))
    }

    fn symbols(&self) -> Vec<(String, Sort)> {
        let mut symbols = self.ssa.symbols();
        if let Some(old) = &self.old {
            symbols.extend(old.symbols());
        }
        symbols
    }

    /// Computes the fixed point and checks all properties.
    pub fn run(&mut self, oracle: &mut dyn DecisionProcedure) -> Result<()> {
        self.engine = None;
        self.imprecise.clear();
        self.iteration_number = 0;
        for p in &mut self.properties {
            p.status = PropertyStatus::Unknown;
            p.countermodel = None;
        }

        let mut scope = Scope::new(oracle);
        self.stats.solver_instances += 1;
        scope.declare(&self.symbols())?;
        scope.assert(&self.ssa.formula())?;
        scope.assert(&self.ssa.enabling_exprs())?;
        if let Some(old) = &self.old {
            scope.assert(&old.formula())?;
            scope.assert(&old.enabling_exprs())?;
            scope.assert(&self.tie_inputs_together())?;
            for (node, a) in old.assertions() {
                scope.assert(&Expr::implies(node.guard.clone(), a.condition.clone()))?;
            }
        }
        scope.assert(&self.precondition)?;
        check_feasible(&mut *scope, &mut self.stats)?;

        let mut engine = build_engine(&self.config, &self.generator, scope.range())?;
        info!(
            "{}: fixed point with {} over {} backward edge(s)",
            self.ssa.name,
            engine.name(),
            self.edges.len()
        );
        loop {
            self.iteration_number += 1;
            let mut changed = false;
            if self.edges.is_empty() {
                changed |= engine.iterate(&mut *scope, None)?;
            }
            for edge in &self.edges {
                let improved = engine.iterate(&mut *scope, Some(edge.loop_id))?;
                debug!("pass {}: edge {} -> {} improved: {}", self.iteration_number, edge.from, edge.to, improved);
                changed |= improved;
            }
            if !changed {
                break;
            }
        }
        self.stats.merge(engine.statistics());
        info!("{}: converged after {} pass(es)", self.ssa.name, self.iteration_number);

        self.check_properties(&mut *scope, engine.as_ref())?;

        if self.config.show_imprecise_vars {
            self.imprecise = engine
                .imprecision()
                .iter()
                .filter_map(|(location, name)| {
                    let ssa = match &self.old {
                        Some(old) if name.ends_with(OLD_TAG) => old,
                        _ => &self.ssa,
                    };
                    attribute_one(ssa, *location, name)
                })
                .collect();
        }
        self.engine = Some(engine);
        Ok(())
    }

    fn check_properties(&mut self, oracle: &mut dyn DecisionProcedure, engine: &dyn Engine) -> Result<()> {
        let invariant = engine.pre_constraints();
        for p in &mut self.properties {
            let mut scope = Scope::new(oracle);
            scope.assert(&invariant)?;
            scope.assert(&Expr::not(p.condition.clone()))?;
            self.stats.solver_calls += 1;
            match scope.check_sat()? {
                SatResult::Unsat => p.status = PropertyStatus::Holds,
                SatResult::Sat => {
                    let model = scope
                        .model()
                        .ok_or_else(|| OracleError::Internal("satisfiable check without a model".to_string()))?;
                    p.status = PropertyStatus::Violated;
                    p.countermodel = Some(p.countermodel_from(model));
                }
                SatResult::Unknown(reason) => {
                    warn!("{}: property status unknown ({})", p.description, reason);
                    p.status = PropertyStatus::Unknown;
                }
            }
            info!("{}", p);
        }
        Ok(())
    }
}
