//! Abstract domains for template-based invariant synthesis.
//!
//! A domain describes its values through oracle queries: the current value
//! is assumed on the pre-state via [`Domain::pre_constraints`], and each row
//! of the template that might still be improved contributes one literal in
//! [`Domain::strategy_conditions`]. A model satisfying a literal carries the
//! improving strategy, which [`Domain::edit_row`] adopts. The strategy
//! solvers in [`crate::strategy`] are written once against this contract.

use std::collections::{BTreeSet, HashSet};
use std::fmt::Debug;

use crate::error::Result;
use crate::expr::Expr;
use crate::oracle::{DecisionProcedure, Model};
use crate::ssa::Location;
use crate::strategy::Statistics;
use crate::template::LoopId;

pub mod equality;
pub mod heap;
pub mod predabs;
pub mod product;
pub mod ranking;
pub mod sympath;
pub mod tpolyhedra;

pub use equality::EqualityDomain;
pub use heap::{HeapDomain, PointsTo};
pub use predabs::PredicateAbstraction;
pub use product::ProductDomain;
pub use ranking::{RankingDomain, RankingFunction};
pub use sympath::SympathDomain;
pub use tpolyhedra::{RowValue, TemplatePolyhedra};

/// Capability contract shared by all abstract domains.
pub trait Domain {
    type Value: Clone + Debug + PartialEq;

    fn name(&self) -> &'static str;

    /// Weakest-information value of the template.
    fn initialize(&self) -> Self::Value;

    /// The value as an assumption on the pre-state.
    fn pre_constraints(&self, value: &Self::Value) -> Expr;

    /// One literal per improvable row, restricted to the rows of `focus` if
    /// given. A row's literal is satisfiable iff the row can be improved.
    fn strategy_conditions(&self, value: &Self::Value, focus: Option<LoopId>) -> Vec<(usize, Expr)>;

    /// Adopts the improving strategy for `row` found in `model`. Returns
    /// whether the value changed.
    fn edit_row(
        &self,
        value: &mut Self::Value,
        row: usize,
        model: &Model,
        oracle: &dyn DecisionProcedure,
        stats: &mut Statistics,
    ) -> Result<bool>;

    /// Conjunction of the facts of `value` that only mention `vars`.
    fn project_on_vars(&self, value: &Self::Value, vars: &BTreeSet<String>) -> Expr;

    /// Components of `value` that did not converge to a precise fact, with
    /// the location responsible where known. Deterministic for a fixed value.
    fn identify_invariant_imprecision(&self, value: &Self::Value) -> Vec<(Option<Location>, String)>;

    fn snapshot(&self, value: &Self::Value) -> DomainValue;
}

/// Caller-facing snapshot of a final value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainValue {
    Template(Vec<(Expr, RowValue)>),
    /// Surviving equalities.
    Equality(Vec<(String, String)>),
    /// Surviving predicates.
    Predicates(Vec<Expr>),
    Ranking(Vec<(Location, RankingFunction)>),
    Heap(Vec<(String, PointsTo)>),
    Product(Box<DomainValue>, Box<DomainValue>),
    Sympath(Vec<(Vec<bool>, DomainValue)>),
}

/// `true` when every symbol of `e` is in `vars`.
pub(crate) fn mentions_only(e: &Expr, vars: &BTreeSet<String>) -> bool {
    e.symbols().keys().all(|name| vars.contains(name))
}

/// Drops repeated entries, keeping the first occurrence.
pub(crate) fn dedup_imprecision(entries: Vec<(Option<Location>, String)>) -> Vec<(Option<Location>, String)> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|(_, name)| seen.insert(name.clone()))
        .collect()
}
