//! Template polyhedra: one bound per template row `e(x) <= b`.
//!
//! A row starts at bottom (no state reaches the back edge) and its bound only
//! grows. Once the bound reaches the largest value the row can take over the
//! oracle's integer range, the row carries no information and becomes top.

use std::collections::BTreeSet;

use crate::domain::{dedup_imprecision, mentions_only, Domain, DomainValue};
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::oracle::{DecisionProcedure, Model};
use crate::ssa::Location;
use crate::strategy::Statistics;
use crate::template::{LoopId, LoopTemplate, TemplateGenerator, TemplateRow, TemplateShape};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RowValue {
    Bottom,
    Bound(i64),
    Top,
}

#[derive(Debug, Clone)]
pub struct TemplatePolyhedra {
    loops: Vec<LoopTemplate>,
    rows: Vec<TemplateRow>,
    min: i64,
    max: i64,
}

impl TemplatePolyhedra {
    /// Rows of `shape` over variables ranging over `(min, max)`.
    pub fn new(
        generator: &TemplateGenerator,
        shape: TemplateShape,
        withhold: &BTreeSet<String>,
        (min, max): (i64, i64),
    ) -> Result<Self> {
        Ok(Self {
            loops: generator.loops().to_vec(),
            rows: generator.rows(shape, withhold)?,
            min,
            max,
        })
    }

    pub fn rows(&self) -> &[TemplateRow] {
        &self.rows
    }

    fn template_of(&self, row: &TemplateRow) -> &LoopTemplate {
        &self.loops[row.loop_id.0]
    }

    /// Largest value row `i` can take.
    pub fn row_max(&self, i: usize) -> i64 {
        self.rows[i].form.max_over(self.min, self.max)
    }

    pub fn row_constraint(&self, i: usize, value: RowValue) -> Expr {
        let row = &self.rows[i];
        let lt = self.template_of(row);
        match value {
            RowValue::Bottom => Expr::implies(lt.pre_guard.clone(), Expr::False),
            RowValue::Bound(b) => Expr::implies(lt.pre_guard.clone(), Expr::le(row.expr.clone(), Expr::int(b))),
            RowValue::Top => Expr::True,
        }
    }

    /// Satisfiable iff some post-state exceeds the current bound of row `i`.
    pub fn improvement_condition(&self, i: usize, value: RowValue) -> Option<Expr> {
        let row = &self.rows[i];
        let lt = self.template_of(row);
        match value {
            RowValue::Bottom => Some(lt.post_guard.clone()),
            RowValue::Bound(b) => Some(Expr::and([
                lt.post_guard.clone(),
                Expr::gt(row.post.clone(), Expr::int(b)),
            ])),
            RowValue::Top => None,
        }
    }

    /// Post-state value of row `i` in `model`.
    pub fn post_value(&self, i: usize, model: &Model) -> Result<i64> {
        let post = &self.rows[i].post;
        model
            .eval_int(post)
            .ok_or_else(|| Error::MissingModelValue(post.to_string()))
    }

    /// Raises row `i` to at least `bound`. Returns whether the row changed.
    pub fn raise(&self, value: &mut [RowValue], i: usize, bound: i64) -> bool {
        let new = match value[i] {
            RowValue::Top => return false,
            RowValue::Bottom => bound,
            RowValue::Bound(b) if b >= bound => return false,
            RowValue::Bound(_) => bound,
        };
        value[i] = if new >= self.row_max(i) {
            RowValue::Top
        } else {
            RowValue::Bound(new)
        };
        true
    }
}

impl Domain for TemplatePolyhedra {
    type Value = Vec<RowValue>;

    fn name(&self) -> &'static str {
        "template polyhedra"
    }

    fn initialize(&self) -> Self::Value {
        vec![RowValue::Bottom; self.rows.len()]
    }

    fn pre_constraints(&self, value: &Self::Value) -> Expr {
        Expr::and(value.iter().enumerate().map(|(i, &v)| self.row_constraint(i, v)))
    }

    fn strategy_conditions(&self, value: &Self::Value, focus: Option<LoopId>) -> Vec<(usize, Expr)> {
        value
            .iter()
            .enumerate()
            .filter(|(i, _)| focus.map_or(true, |id| self.rows[*i].loop_id == id))
            .filter_map(|(i, &v)| self.improvement_condition(i, v).map(|c| (i, c)))
            .collect()
    }

    fn edit_row(
        &self,
        value: &mut Self::Value,
        row: usize,
        model: &Model,
        _oracle: &dyn DecisionProcedure,
        _stats: &mut Statistics,
    ) -> Result<bool> {
        let v = self.post_value(row, model)?;
        Ok(self.raise(value, row, v))
    }

    fn project_on_vars(&self, value: &Self::Value, vars: &BTreeSet<String>) -> Expr {
        Expr::and(
            self.rows
                .iter()
                .zip(value)
                .filter(|(row, _)| mentions_only(&row.expr, vars))
                .filter_map(|(row, v)| match v {
                    RowValue::Bottom => Some(Expr::False),
                    RowValue::Bound(b) => Some(Expr::le(row.expr.clone(), Expr::int(*b))),
                    RowValue::Top => None,
                }),
        )
    }

    fn identify_invariant_imprecision(&self, value: &Self::Value) -> Vec<(Option<Location>, String)> {
        let mut res = Vec::new();
        for (row, v) in self.rows.iter().zip(value) {
            if *v != RowValue::Top {
                continue;
            }
            let location = self.template_of(row).loopback;
            for name in row.expr.symbol_names() {
                res.push((Some(location), name));
            }
        }
        dedup_imprecision(res)
    }

    fn snapshot(&self, value: &Self::Value) -> DomainValue {
        DomainValue::Template(
            self.rows
                .iter()
                .zip(value)
                .map(|(row, v)| (row.expr.clone(), *v))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::ssa::{LocalSsa, SourceLocation, SsaNode};

    fn domain(range: (i64, i64)) -> TemplatePolyhedra {
        let mut ssa = LocalSsa::new("f");
        let head = ssa.push(SsaNode::new(1, SourceLocation::new("f.c", 1)));
        let back = ssa.push(
            SsaNode::new(2, SourceLocation::new("f.c", 2))
                .loop_var("x#lb2", Expr::add(Expr::var("x#1"), Expr::int(1))),
        );
        ssa.close_loop(back, head);
        let gen = TemplateGenerator::new(&[&ssa]);
        TemplatePolyhedra::new(&gen, TemplateShape::Intervals, &BTreeSet::new(), range).unwrap()
    }

    #[test]
    fn test_raise_is_monotone() {
        let d = domain((-128, 127));
        let mut value = d.initialize();
        assert!(d.raise(&mut value, 0, 5));
        assert!(!d.raise(&mut value, 0, 3));
        assert_eq!(value[0], RowValue::Bound(5));
        assert!(d.raise(&mut value, 0, 127));
        assert_eq!(value[0], RowValue::Top);
        assert!(!d.raise(&mut value, 0, 200));
    }

    #[test]
    fn test_conditions_skip_top_rows() {
        let d = domain((-128, 127));
        let value = vec![RowValue::Top, RowValue::Bound(-1)];
        let conds = d.strategy_conditions(&value, None);
        assert_eq!(conds.len(), 1);
        assert_eq!(conds[0].0, 1);
        assert!(d.strategy_conditions(&value, Some(LoopId(7))).is_empty());
    }

    #[test]
    fn test_imprecision_of_top_rows() {
        let d = domain((-128, 127));
        let value = vec![RowValue::Top, RowValue::Bound(0)];
        assert_eq!(
            d.identify_invariant_imprecision(&value),
            vec![(Some(Location(2)), "x#lb2".to_string())]
        );
        let vars = BTreeSet::from(["x#lb2".to_string()]);
        assert_eq!(
            d.project_on_vars(&value, &vars),
            Expr::le(Expr::neg(Expr::var("x#lb2")), Expr::int(0))
        );
    }

    #[test]
    fn test_top_follows_the_range() {
        let d = domain((-32, 31));
        let mut value = d.initialize();
        assert!(d.raise(&mut value, 0, 30));
        assert_eq!(value[0], RowValue::Bound(30));
        assert!(d.raise(&mut value, 0, 31));
        assert_eq!(value[0], RowValue::Top);
    }
}
