//! Template generation from the loops of one or more SSA versions.
//!
//! Each loop contributes a [`LoopTemplate`]: the pre-state guard (loop-select
//! guard and loop-head guard) under which the invariant is assumed over the
//! `#lb` variables, the post-state guard (loop-back guard) under which the
//! values flowing back must satisfy it, and the loop-carried variables.
//! Numeric domains further instantiate [`TemplateRow`]s from the loop
//! variables according to a [`TemplateShape`].

use std::collections::{BTreeSet, HashMap};

use log::debug;

use crate::error::{Error, Result};
use crate::expr::{Expr, LinearForm, Sort};
use crate::names::pretty_name;
use crate::ssa::{LocalSsa, Location, LoopVar};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct LoopId(pub usize);

#[derive(Debug, Clone)]
pub struct LoopTemplate {
    pub id: LoopId,
    pub loopback: Location,
    pub loophead: Location,
    pub pre_guard: Expr,
    pub post_guard: Expr,
    pub vars: Vec<LoopVar>,
    /// Branch conditions evaluated inside the loop body.
    pub path_conds: Vec<Expr>,
    /// Sorts the procedure gives the `#lb` variables.
    lb_sorts: HashMap<String, Sort>,
}

impl LoopTemplate {
    /// Non-pointer loop variables that are integers on either side of the
    /// back edge.
    pub fn int_vars(&self) -> impl Iterator<Item = &LoopVar> {
        self.vars.iter().filter(move |v| {
            !v.pointer && (v.post.sort() == Sort::Int || self.lb_sorts.get(&v.lb) == Some(&Sort::Int))
        })
    }

    pub fn pointer_vars(&self) -> impl Iterator<Item = &LoopVar> {
        self.vars.iter().filter(|v| v.pointer)
    }

    /// Maps every `#lb` variable to the value flowing back.
    pub fn post_map(&self) -> HashMap<String, Expr> {
        self.vars
            .iter()
            .map(|v| (v.lb.clone(), v.post.clone()))
            .collect()
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TemplateShape {
    Intervals,
    Zones,
    Octagons,
}

/// One template inequality `expr <= bound` of one loop.
#[derive(Debug, Clone)]
pub struct TemplateRow {
    pub loop_id: LoopId,
    /// Over the `#lb` variables.
    pub expr: Expr,
    /// `expr` with the `#lb` variables replaced by the values flowing back.
    pub post: Expr,
    pub form: LinearForm,
}

#[derive(Debug, Clone)]
pub struct TemplateGenerator {
    loops: Vec<LoopTemplate>,
    sorts: HashMap<String, Sort>,
}

impl TemplateGenerator {
    pub fn new(ssas: &[&LocalSsa]) -> Self {
        let mut loops = Vec::new();
        let mut sorts = HashMap::new();
        for ssa in ssas {
            for (name, sort) in ssa.symbols() {
                sorts.entry(name).or_insert(sort);
            }
        }
        for ssa in ssas {
            for (index, back) in ssa.loopbacks() {
                let Some(head_index) = back.loophead else {
                    continue;
                };
                let head = ssa.node(head_index);
                let path_conds = ssa.nodes()[head_index.0..index.0]
                    .iter()
                    .filter_map(|n| n.cond.clone())
                    .collect();
                let id = LoopId(loops.len());
                debug!(
                    "loop {} of {}: head {} back {} with {} variables",
                    id.0,
                    ssa.name,
                    head.location,
                    back.location,
                    back.loop_vars.len()
                );
                loops.push(LoopTemplate {
                    id,
                    loopback: back.location,
                    loophead: head.location,
                    pre_guard: Expr::and([ssa.loop_select(back), head.guard.clone()]),
                    post_guard: back.guard.clone(),
                    vars: back.loop_vars.clone(),
                    path_conds,
                    lb_sorts: back
                        .loop_vars
                        .iter()
                        .filter_map(|v| sorts.get(&v.lb).map(|s| (v.lb.clone(), *s)))
                        .collect(),
                });
            }
        }
        Self { loops, sorts }
    }

    pub fn loops(&self) -> &[LoopTemplate] {
        &self.loops
    }

    /// Checks that `expr` is well sorted, has sort `expected`, and uses every
    /// variable at the sort the procedures give it.
    pub fn check_sorts(&self, expr: &Expr, expected: Sort) -> Result<()> {
        if expr.checked_sort() != Some(expected) {
            return Err(Error::IllTypedTemplate(format!("{} is not a well-sorted {}", expr, expected.name())));
        }
        for (name, sort) in expr.symbols() {
            match self.sorts.get(&name) {
                Some(declared) if *declared != sort => {
                    return Err(Error::IllTypedTemplate(format!(
                        "{} uses `{}` as {}, declared {}",
                        expr,
                        name,
                        sort.name(),
                        declared.name()
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Rows of the given shape. Stand-alone bound rows of variables whose
    /// pretty name is in `withhold` are left out.
    pub fn rows(&self, shape: TemplateShape, withhold: &BTreeSet<String>) -> Result<Vec<TemplateRow>> {
        let mut rows = Vec::new();
        for lt in &self.loops {
            let post_map = lt.post_map();
            let vars: Vec<&LoopVar> = lt.int_vars().collect();
            let mut exprs = Vec::new();
            for v in &vars {
                if withhold.contains(pretty_name(&v.lb)) {
                    continue;
                }
                exprs.push(Expr::var(v.lb.clone()));
                exprs.push(Expr::neg(Expr::var(v.lb.clone())));
            }
            if shape != TemplateShape::Intervals {
                for (i, x) in vars.iter().enumerate() {
                    for y in &vars[i + 1..] {
                        let x = Expr::var(x.lb.clone());
                        let y = Expr::var(y.lb.clone());
                        exprs.push(Expr::sub(x.clone(), y.clone()));
                        exprs.push(Expr::sub(y.clone(), x.clone()));
                        if shape == TemplateShape::Octagons {
                            exprs.push(Expr::add(x.clone(), y.clone()));
                            exprs.push(Expr::sub(Expr::neg(x), y));
                        }
                    }
                }
            }
            for expr in exprs {
                let post = expr.substitute(&post_map);
                self.check_sorts(&expr, Sort::Int)?;
                self.check_sorts(&post, Sort::Int)?;
                // Every row is built from variables and unit coefficients.
                let Some(form) = expr.linear_form() else {
                    continue;
                };
                rows.push(TemplateRow {
                    loop_id: lt.id,
                    post,
                    expr,
                    form,
                });
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::ssa::{SourceLocation, SsaNode};

    fn two_var_loop() -> LocalSsa {
        let src = |line| SourceLocation::new("t.c", line);
        let mut ssa = LocalSsa::new("f");
        let head = ssa.push(SsaNode::new(2, src(2)).branch(Expr::bool_var("c#2")));
        let back = ssa.push(
            SsaNode::new(5, src(4))
                .guarded(Expr::bool_var("c#2"))
                .loop_var("x#lb5", Expr::var("x#4"))
                .loop_var("y#lb5", Expr::var("y#3"))
                .pointer_var("p#lb5", Expr::var("p#2")),
        );
        ssa.close_loop(back, head);
        ssa
    }

    #[test]
    fn test_loop_template() {
        let ssa = two_var_loop();
        let gen = TemplateGenerator::new(&[&ssa]);
        assert_eq!(gen.loops().len(), 1);
        let lt = &gen.loops()[0];
        assert_eq!(lt.loopback, Location(5));
        assert_eq!(lt.loophead, Location(2));
        assert_eq!(lt.pre_guard, Expr::bool_var("$guard#ls5"));
        assert_eq!(lt.path_conds, vec![Expr::bool_var("c#2")]);
        assert_eq!(lt.int_vars().count(), 2);
        assert_eq!(lt.pointer_vars().count(), 1);
    }

    #[test]
    fn test_row_counts() {
        let ssa = two_var_loop();
        let gen = TemplateGenerator::new(&[&ssa]);
        let none = BTreeSet::new();
        assert_eq!(gen.rows(TemplateShape::Intervals, &none).unwrap().len(), 4);
        assert_eq!(gen.rows(TemplateShape::Zones, &none).unwrap().len(), 6);
        assert_eq!(gen.rows(TemplateShape::Octagons, &none).unwrap().len(), 8);
        let withhold = BTreeSet::from(["y".to_string()]);
        assert_eq!(gen.rows(TemplateShape::Zones, &withhold).unwrap().len(), 4);
    }

    #[test]
    fn test_row_post_substitution() {
        let ssa = two_var_loop();
        let gen = TemplateGenerator::new(&[&ssa]);
        let rows = gen.rows(TemplateShape::Zones, &BTreeSet::new()).unwrap();
        let diff = &rows[4];
        assert_eq!(diff.expr, Expr::sub(Expr::var("x#lb5"), Expr::var("y#lb5")));
        assert_eq!(diff.post, Expr::sub(Expr::var("x#4"), Expr::var("y#3")));
        assert_eq!(diff.form.max_over(-128, 127), 255);
    }

    #[test]
    fn test_flag_carried_into_counter_is_ill_typed() {
        let src = |line| SourceLocation::new("t.c", line);
        let ls = Expr::bool_var("$guard#ls3");
        let mut ssa = LocalSsa::new("f");
        let head = ssa.push(
            SsaNode::new(2, src(2))
                .assign("x#phi2", Expr::ite(ls, Expr::var("x#lb3"), Expr::int(0)))
                .branch(Expr::bool_var("c#2")),
        );
        let back = ssa.push(
            SsaNode::new(3, src(3))
                .guarded(Expr::bool_var("c#2"))
                .loop_var("x#lb3", Expr::bool_var("c#2")),
        );
        ssa.close_loop(back, head);
        let gen = TemplateGenerator::new(&[&ssa]);
        assert_eq!(gen.loops()[0].int_vars().count(), 1);
        let err = gen.rows(TemplateShape::Intervals, &BTreeSet::new()).unwrap_err();
        assert!(matches!(err, Error::IllTypedTemplate(_)));
    }

    #[test]
    fn test_check_sorts_against_declarations() {
        let gen = TemplateGenerator::new(&[&two_var_loop()]);
        assert!(gen.check_sorts(&Expr::var("x#4"), Sort::Int).is_ok());
        assert!(matches!(
            gen.check_sorts(&Expr::var("c#2"), Sort::Int),
            Err(Error::IllTypedTemplate(_))
        ));
        assert!(matches!(
            gen.check_sorts(&Expr::var("x#4"), Sort::Bool),
            Err(Error::IllTypedTemplate(_))
        ));
    }
}
