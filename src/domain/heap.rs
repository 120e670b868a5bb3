//! Points-to sets of loop-carried pointers.
//!
//! A pointer value is the location numeral of the allocation site it points
//! to, `0` being null. Each pointer row collects the targets seen at the back
//! edge; more than `max_targets` of them make the row top.

use std::collections::{BTreeSet, HashMap};

use log::debug;

use crate::domain::{dedup_imprecision, mentions_only, Domain, DomainValue};
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::oracle::{DecisionProcedure, Model};
use crate::ssa::Location;
use crate::strategy::Statistics;
use crate::template::{LoopId, LoopTemplate, TemplateGenerator};

pub const NULL: i64 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointsTo {
    Targets(BTreeSet<i64>),
    Top,
}

#[derive(Debug, Clone)]
struct PointerRow {
    loop_id: LoopId,
    lb: String,
    post: Expr,
}

#[derive(Debug, Clone)]
pub struct HeapDomain {
    loops: Vec<LoopTemplate>,
    rows: Vec<PointerRow>,
    max_targets: usize,
}

impl HeapDomain {
    pub fn new(generator: &TemplateGenerator, max_targets: usize) -> Self {
        let rows = generator
            .loops()
            .iter()
            .flat_map(|lt| {
                lt.pointer_vars().map(|v| PointerRow {
                    loop_id: lt.id,
                    lb: v.lb.clone(),
                    post: v.post.clone(),
                })
            })
            .collect();
        Self {
            loops: generator.loops().to_vec(),
            rows,
            max_targets,
        }
    }

    fn points_to(var: Expr, targets: &BTreeSet<i64>) -> Expr {
        Expr::or(targets.iter().map(|&t| Expr::eq(var.clone(), Expr::int(t))))
    }
}

impl Domain for HeapDomain {
    type Value = Vec<PointsTo>;

    fn name(&self) -> &'static str {
        "heap"
    }

    fn initialize(&self) -> Self::Value {
        vec![PointsTo::Targets(BTreeSet::new()); self.rows.len()]
    }

    fn pre_constraints(&self, value: &Self::Value) -> Expr {
        Expr::and(self.rows.iter().zip(value).map(|(row, v)| match v {
            PointsTo::Targets(targets) => Expr::implies(
                self.loops[row.loop_id.0].pre_guard.clone(),
                Self::points_to(Expr::var(row.lb.clone()), targets),
            ),
            PointsTo::Top => Expr::True,
        }))
    }

    fn strategy_conditions(&self, value: &Self::Value, focus: Option<LoopId>) -> Vec<(usize, Expr)> {
        let mut res = Vec::new();
        for (i, (row, v)) in self.rows.iter().zip(value).enumerate() {
            if focus.map_or(false, |id| row.loop_id != id) {
                continue;
            }
            if let PointsTo::Targets(targets) = v {
                let post_guard = self.loops[row.loop_id.0].post_guard.clone();
                let escapes = Expr::not(Self::points_to(row.post.clone(), targets));
                res.push((i, Expr::and([post_guard, escapes])));
            }
        }
        res
    }

    fn edit_row(
        &self,
        value: &mut Self::Value,
        row: usize,
        model: &Model,
        _oracle: &dyn DecisionProcedure,
        _stats: &mut Statistics,
    ) -> Result<bool> {
        let post = &self.rows[row].post;
        let target = model
            .eval_int(post)
            .ok_or_else(|| Error::MissingModelValue(post.to_string()))?;
        let PointsTo::Targets(targets) = &mut value[row] else {
            return Ok(false);
        };
        if !targets.insert(target) {
            return Ok(false);
        }
        debug!("{} may point to {}", self.rows[row].lb, target);
        if targets.len() > self.max_targets {
            value[row] = PointsTo::Top;
        }
        Ok(true)
    }

    fn project_on_vars(&self, value: &Self::Value, vars: &BTreeSet<String>) -> Expr {
        Expr::and(
            self.rows
                .iter()
                .zip(value)
                .filter(|(row, _)| vars.contains(&row.lb))
                .filter_map(|(row, v)| match v {
                    PointsTo::Targets(targets) => Some(Self::points_to(Expr::var(row.lb.clone()), targets)),
                    PointsTo::Top => None,
                })
                .filter(|e| mentions_only(e, vars)),
        )
    }

    fn identify_invariant_imprecision(&self, value: &Self::Value) -> Vec<(Option<Location>, String)> {
        let res = self
            .rows
            .iter()
            .zip(value)
            .filter(|(_, v)| **v == PointsTo::Top)
            .map(|(row, _)| (Some(self.loops[row.loop_id.0].loopback), row.lb.clone()))
            .collect();
        dedup_imprecision(res)
    }

    fn snapshot(&self, value: &Self::Value) -> DomainValue {
        DomainValue::Heap(
            self.rows
                .iter()
                .zip(value)
                .map(|(row, v)| (row.lb.clone(), v.clone()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::oracle::ModelValue;
    use crate::ssa::{LocalSsa, SourceLocation, SsaNode};

    fn domain(max_targets: usize) -> HeapDomain {
        let mut ssa = LocalSsa::new("f");
        let head = ssa.push(SsaNode::new(1, SourceLocation::new("f.c", 1)));
        let back = ssa.push(SsaNode::new(3, SourceLocation::new("f.c", 3)).pointer_var("p#lb3", Expr::var("p#2")));
        ssa.close_loop(back, head);
        HeapDomain::new(&TemplateGenerator::new(&[&ssa]), max_targets)
    }

    #[test]
    fn test_targets_grow_to_top() {
        let d = domain(1);
        let mut value = d.initialize();
        let mut stats = Statistics::default();
        let oracle = crate::bdd_solver::BddSolver::default();
        let mut model = Model::new();
        model.insert("p#2", ModelValue::Int(4));
        assert!(d.edit_row(&mut value, 0, &model, &oracle, &mut stats).unwrap());
        assert_eq!(value[0], PointsTo::Targets(BTreeSet::from([4])));
        assert!(!d.edit_row(&mut value, 0, &model, &oracle, &mut stats).unwrap());
        model.insert("p#2", ModelValue::Int(NULL));
        assert!(d.edit_row(&mut value, 0, &model, &oracle, &mut stats).unwrap());
        assert_eq!(value[0], PointsTo::Top);
        assert_eq!(
            d.identify_invariant_imprecision(&value),
            vec![(Some(Location(3)), "p#lb3".to_string())]
        );
    }
}
