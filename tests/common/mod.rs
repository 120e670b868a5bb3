//! SSA fixtures shared by the integration tests.

#![allow(dead_code)]

use ssa_invariant::expr::{Expr, Sort};
use ssa_invariant::ssa::{LocalSsa, SourceLocation, SsaNode};

pub fn src(line: u32) -> SourceLocation {
    SourceLocation::new("test.c", line)
}

/// `x = a + 1; y = x * 2 - a; assert(y > a);`
pub fn straight_line() -> LocalSsa {
    let mut ssa = LocalSsa::new("straight");
    ssa.add_input("a", Sort::Int);
    ssa.push(SsaNode::new(1, src(1)).assign("x#1", Expr::add(Expr::var("a"), Expr::int(1))));
    ssa.push(SsaNode::new(2, src(2)).assign(
        "y#2",
        Expr::sub(Expr::scale(2, Expr::var("x#1")), Expr::var("a")),
    )
    .assert("y > a", Expr::gt(Expr::var("y#2"), Expr::var("a"))));
    ssa
}

/// ```c
/// i = 0;                 // line 1
/// while (i < N) {        // line 2
///     i = i + 1;         // line 3
/// }                      // line 4
/// assert(i == N);        // line 5
/// ```
pub fn counter() -> LocalSsa {
    let ls = || Expr::bool_var("$guard#ls4");
    let in_loop = || Expr::lt(Expr::var("i#phi2"), Expr::var("N#phi2"));
    let mut ssa = LocalSsa::new("counter");
    ssa.add_input("N", Sort::Int);
    ssa.push(SsaNode::new(1, src(1)).assign("i#1", Expr::int(0)));
    let head = ssa.push(
        SsaNode::new(2, src(2))
            .assign("i#phi2", Expr::ite(ls(), Expr::var("i#lb4"), Expr::var("i#1")))
            .assign("N#phi2", Expr::ite(ls(), Expr::var("N#lb4"), Expr::var("N")))
            .branch(in_loop()),
    );
    ssa.push(
        SsaNode::new(3, src(3))
            .guarded(in_loop())
            .assign("i#3", Expr::add(Expr::var("i#phi2"), Expr::int(1))),
    );
    let back = ssa.push(
        SsaNode::new(4, src(4))
            .guarded(in_loop())
            .loop_var("i#lb4", Expr::var("i#3"))
            .loop_var("N#lb4", Expr::var("N#phi2")),
    );
    ssa.close_loop(back, head);
    ssa.push(
        SsaNode::new(5, src(5))
            .guarded(Expr::not(in_loop()))
            .assert("i == N", Expr::eq(Expr::var("i#phi2"), Expr::var("N#phi2"))),
    );
    ssa
}

pub fn n_in_range(lo: i64, hi: i64) -> Expr {
    Expr::and([
        Expr::ge(Expr::var("N"), Expr::int(lo)),
        Expr::le(Expr::var("N"), Expr::int(hi)),
    ])
}

/// ```c
/// struct s *p = malloc(..);   // line 10
/// p->count = 0;
/// while (*) {                 // line 11
///     p->count++;             // line 12
/// }                           // line 13
/// ```
pub fn heap_counter() -> LocalSsa {
    let ls = || Expr::bool_var("$guard#ls7");
    let nondet = || Expr::bool_var("c#5");
    let mut ssa = LocalSsa::new("heap_counter");
    ssa.push(
        SsaNode::new(4, src(10))
            .assign("p#4", Expr::int(4))
            .assign("dynamic_object$4.count#4", Expr::int(0)),
    );
    let head = ssa.push(
        SsaNode::new(5, src(11))
            .assign("p#phi5", Expr::ite(ls(), Expr::var("p#lb7"), Expr::var("p#4")))
            .assign(
                "dynamic_object$4.count#phi5",
                Expr::ite(
                    ls(),
                    Expr::var("dynamic_object$4#lb7.count"),
                    Expr::var("dynamic_object$4.count#4"),
                ),
            )
            .branch(nondet()),
    );
    ssa.push(SsaNode::new(6, src(12)).guarded(nondet()).assign(
        "dynamic_object$4.count#6",
        Expr::add(Expr::var("dynamic_object$4.count#phi5"), Expr::int(1)),
    ));
    let back = ssa.push(
        SsaNode::new(7, src(13))
            .guarded(nondet())
            .loop_var("dynamic_object$4#lb7.count", Expr::var("dynamic_object$4.count#6"))
            .pointer_var("p#lb7", Expr::var("p#phi5")),
    );
    ssa.close_loop(back, head);
    ssa
}

/// A loop whose back edge feeds a flag into an integer variable.
pub fn flag_into_counter() -> LocalSsa {
    let ls = Expr::bool_var("$guard#ls3");
    let flag = || Expr::bool_var("c#2");
    let mut ssa = LocalSsa::new("flag_into_counter");
    ssa.push(SsaNode::new(1, src(1)).assign("x#1", Expr::int(0)));
    let head = ssa.push(
        SsaNode::new(2, src(2))
            .assign("x#phi2", Expr::ite(ls, Expr::var("x#lb3"), Expr::var("x#1")))
            .branch(flag()),
    );
    let back = ssa.push(SsaNode::new(3, src(3)).guarded(flag()).loop_var("x#lb3", flag()));
    ssa.close_loop(back, head);
    ssa
}
