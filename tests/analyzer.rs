//! One-shot analysis of a procedure, configured from an option table.

mod common;

use std::collections::BTreeSet;

use test_log::test;

use ssa_invariant::analyzer::SsaAnalyzer;
use ssa_invariant::bdd_solver::BddSolver;
use ssa_invariant::config::{Config, DomainConfig, Options};
use ssa_invariant::domain::{DomainValue, RowValue};
use ssa_invariant::error::{ConfigError, Error};
use ssa_invariant::expr::{Expr, Sort};
use ssa_invariant::oracle::DecisionProcedure;
use ssa_invariant::ssa::{LocalSsa, SsaNode};

use common::{counter, n_in_range, src};

fn configured(flags: &[&str]) -> Result<Config, ConfigError> {
    Config::from_options(&flags.iter().fold(Options::new(), |options, flag| options.set(*flag)))
}

/// Two counters advanced in lock step.
fn twin_counters() -> LocalSsa {
    let ls = || Expr::bool_var("$guard#ls4");
    let in_loop = || Expr::lt(Expr::var("i#phi2"), Expr::int(10));
    let mut ssa = LocalSsa::new("twins");
    ssa.push(
        SsaNode::new(1, src(1))
            .assign("i#1", Expr::int(0))
            .assign("j#1", Expr::int(0)),
    );
    let head = ssa.push(
        SsaNode::new(2, src(2))
            .assign("i#phi2", Expr::ite(ls(), Expr::var("i#lb4"), Expr::var("i#1")))
            .assign("j#phi2", Expr::ite(ls(), Expr::var("j#lb4"), Expr::var("j#1")))
            .branch(in_loop()),
    );
    ssa.push(
        SsaNode::new(3, src(3))
            .guarded(in_loop())
            .assign("i#3", Expr::add(Expr::var("i#phi2"), Expr::int(1)))
            .assign("j#3", Expr::add(Expr::var("j#phi2"), Expr::int(1))),
    );
    let back = ssa.push(
        SsaNode::new(4, src(4))
            .guarded(in_loop())
            .loop_var("i#lb4", Expr::var("i#3"))
            .loop_var("j#lb4", Expr::var("j#3")),
    );
    ssa.close_loop(back, head);
    ssa
}

#[test]
fn test_equalities() {
    let config = configured(&["equalities"]).unwrap();
    assert_eq!(config.domain, DomainConfig::Equalities);
    let mut oracle = BddSolver::new(config.bitwidth);
    let mut analyzer = SsaAnalyzer::new(config);
    analyzer.analyze(&twin_counters(), &Expr::True, &mut oracle).unwrap();

    assert_eq!(
        analyzer.value(),
        Some(DomainValue::Equality(vec![("i#lb4".to_string(), "j#lb4".to_string())]))
    );
    assert_eq!(analyzer.rounds(), 0);
    assert_eq!(
        analyzer.invariant(),
        Expr::implies(
            Expr::bool_var("$guard#ls4"),
            Expr::eq(Expr::var("i#lb4"), Expr::var("j#lb4"))
        )
    );
    assert_eq!(oracle.depth(), 0);
}

#[test]
fn test_predicate_abstraction() {
    let config = configured(&["predabs-solver"]).unwrap();
    let mut oracle = BddSolver::new(config.bitwidth);
    let mut analyzer = SsaAnalyzer::new(config);
    analyzer.analyze(&counter(), &n_in_range(0, 100), &mut oracle).unwrap();

    let i = Expr::var("i#lb4");
    let n = Expr::var("N#lb4");
    assert_eq!(
        analyzer.value(),
        Some(DomainValue::Predicates(vec![
            Expr::ge(i.clone(), Expr::int(0)),
            Expr::ge(n.clone(), Expr::int(0)),
            Expr::le(i.clone(), n.clone()),
        ]))
    );
    assert!(analyzer.rounds() >= 1);
    assert!(analyzer.imprecise_vars().is_empty());

    let only_i = analyzer.result(&BTreeSet::from(["i#lb4".to_string()]));
    assert_eq!(only_i, Expr::ge(i, Expr::int(0)));
}

#[test]
fn test_intervals_from_options() {
    let options = Options::new()
        .set("enum-solver")
        .set("intervals")
        .set("show-imprecise-vars")
        .set_value("bitwidth", "6");
    let config = Config::from_options(&options).unwrap();
    let mut oracle = BddSolver::new(config.bitwidth);
    let mut analyzer = SsaAnalyzer::new(config);
    analyzer.analyze(&counter(), &Expr::True, &mut oracle).unwrap();

    let Some(DomainValue::Template(rows)) = analyzer.value() else {
        panic!("expected a template value");
    };
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0], (Expr::var("i#lb4"), RowValue::Top));

    let mut names: Vec<String> = analyzer.imprecise_vars().iter().map(|v| v.pretty_name.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["N".to_string(), "i".to_string()]);

    let stats = analyzer.statistics();
    assert_eq!(stats.solver_instances, 1);
    assert_eq!(stats.solver_calls, analyzer.rounds() + 2);
}

#[test]
fn test_infeasible_precondition_closes_scope() {
    let mut oracle = BddSolver::new(8);
    let mut analyzer = SsaAnalyzer::new(Config::new(DomainConfig::Equalities));
    let err = analyzer
        .analyze(&twin_counters(), &Expr::bool(false), &mut oracle)
        .unwrap_err();
    assert!(matches!(err, Error::InfeasiblePrecondition));
    assert_eq!(oracle.depth(), 0);
    assert_eq!(analyzer.value(), None);
}

#[test]
fn test_sort_clash_is_reported() {
    let mut ssa = LocalSsa::new("clash");
    ssa.add_input("x", Sort::Bool);
    ssa.push(SsaNode::new(1, src(1)).constrain(Expr::gt(Expr::var("x"), Expr::int(0))));
    let mut oracle = BddSolver::new(8);
    let mut analyzer = SsaAnalyzer::new(Config::new(DomainConfig::Equalities));
    let err = analyzer.analyze(&ssa, &Expr::True, &mut oracle).unwrap_err();
    assert!(matches!(err, Error::Oracle(_)));
    assert_eq!(oracle.depth(), 0);
}

#[test]
fn test_option_errors() {
    assert_eq!(configured(&[]), Err(ConfigError::NoDomainSelected));
    assert!(matches!(
        configured(&["heap", "sympath"]),
        Err(ConfigError::MissingPrerequisite { .. })
    ));
    assert!(matches!(
        configured(&["enum-solver", "zones", "octagons"]),
        Err(ConfigError::Contradictory(..))
    ));
    assert_eq!(
        configured(&["equalities", "widen"]),
        Err(ConfigError::UnknownOption("widen".to_string()))
    );
}

#[test]
fn test_rounds_only_raise_bounds() {
    use ssa_invariant::domain::{Domain, TemplatePolyhedra};
    use ssa_invariant::oracle::Scope;
    use ssa_invariant::strategy::{EnumerationSolver, StrategySolver};
    use ssa_invariant::template::{TemplateGenerator, TemplateShape};

    let ssa = counter();
    let mut oracle = BddSolver::new(8);
    let mut scope = Scope::new(&mut oracle);
    scope.declare(&ssa.symbols()).unwrap();
    scope.assert(&ssa.formula()).unwrap();
    scope.assert(&n_in_range(0, 40)).unwrap();

    let generator = TemplateGenerator::new(&[&ssa]);
    let domain = TemplatePolyhedra::new(&generator, TemplateShape::Octagons, &BTreeSet::new(), scope.range()).unwrap();
    let mut solver = EnumerationSolver::new(domain);
    let mut value = solver.domain().initialize();
    let rank = |v: RowValue| match v {
        RowValue::Bottom => i64::MIN,
        RowValue::Bound(b) => b,
        RowValue::Top => i64::MAX,
    };
    let mut rounds = 0;
    loop {
        let before = value.clone();
        if !solver.iterate(&mut *scope, &mut value).unwrap() {
            assert_eq!(value, before);
            break;
        }
        rounds += 1;
        assert_ne!(value, before);
        for (old, new) in before.iter().zip(&value) {
            assert!(rank(*old) <= rank(*new));
        }
    }
    assert!(rounds >= 2);
    assert_eq!(solver.statistics().solver_calls, rounds + 1);
}
