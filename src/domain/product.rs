//! Direct product of two domains. Row `i` of the first component is row `2i`
//! of the product, row `i` of the second is row `2i + 1`.

use std::collections::BTreeSet;

use crate::domain::{Domain, DomainValue};
use crate::error::Result;
use crate::expr::Expr;
use crate::oracle::{DecisionProcedure, Model};
use crate::ssa::Location;
use crate::strategy::Statistics;
use crate::template::LoopId;

#[derive(Debug, Clone)]
pub struct ProductDomain<A, B> {
    pub first: A,
    pub second: B,
}

impl<A, B> ProductDomain<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: Domain, B: Domain> Domain for ProductDomain<A, B> {
    type Value = (A::Value, B::Value);

    fn name(&self) -> &'static str {
        "product"
    }

    fn initialize(&self) -> Self::Value {
        (self.first.initialize(), self.second.initialize())
    }

    fn pre_constraints(&self, value: &Self::Value) -> Expr {
        Expr::and([
            self.first.pre_constraints(&value.0),
            self.second.pre_constraints(&value.1),
        ])
    }

    fn strategy_conditions(&self, value: &Self::Value, focus: Option<LoopId>) -> Vec<(usize, Expr)> {
        let mut res: Vec<(usize, Expr)> = self
            .first
            .strategy_conditions(&value.0, focus)
            .into_iter()
            .map(|(i, c)| (2 * i, c))
            .collect();
        res.extend(
            self.second
                .strategy_conditions(&value.1, focus)
                .into_iter()
                .map(|(i, c)| (2 * i + 1, c)),
        );
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
        if row % 2 == 0 {
            self.first.edit_row(&mut value.0, row / 2, model, oracle, stats)
        } else {
            self.second.edit_row(&mut value.1, row / 2, model, oracle, stats)
        }
    }

    fn project_on_vars(&self, value: &Self::Value, vars: &BTreeSet<String>) -> Expr {
        Expr::and([
            self.first.project_on_vars(&value.0, vars),
            self.second.project_on_vars(&value.1, vars),
        ])
    }

    fn identify_invariant_imprecision(&self, value: &Self::Value) -> Vec<(Option<Location>, String)> {
        let mut res = self.first.identify_invariant_imprecision(&value.0);
        res.extend(self.second.identify_invariant_imprecision(&value.1));
        res
    }

    fn snapshot(&self, value: &Self::Value) -> DomainValue {
        DomainValue::Product(
            Box::new(self.first.snapshot(&value.0)),
            Box::new(self.second.snapshot(&value.1)),
        )
    }
}
