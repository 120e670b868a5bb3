//! A complete, incremental decision procedure over bounded integers.
//!
//! Expressions are bit-blasted into BDDs: every integer variable gets `width`
//! BDD variables (two's complement), every boolean variable gets one. The
//! context of each scope is a single BDD, the conjunction of everything
//! asserted so far, so `push` and `pop` are constant time and a check is a
//! comparison against the `zero` terminal.

use std::collections::HashMap;

use log::{debug, warn};

use crate::bdd::Bdd;
use crate::bitvec::BitVec;
use crate::config::Config;
use crate::error::{ConfigError, OracleError};
use crate::expr::{Expr, Sort};
use crate::oracle::{DecisionProcedure, Model, ModelValue, SatResult};
use crate::reference::Ref;

pub const DEFAULT_WIDTH: usize = 8;
pub const MIN_WIDTH: usize = 2;
pub const MAX_WIDTH: usize = 32;
pub const DEFAULT_NODE_LIMIT: usize = 1 << 22;

#[derive(Debug, Clone)]
enum Symbol {
    Bool(Ref),
    Int(BitVec),
}

impl Symbol {
    fn sort_name(&self) -> &'static str {
        match self {
            Symbol::Bool(_) => Sort::Bool.name(),
            Symbol::Int(_) => Sort::Int.name(),
        }
    }
}

enum Term {
    Bool(Ref),
    Int(BitVec),
}

#[derive(Debug)]
pub struct BddSolver {
    bdd: Bdd,
    width: usize,
    node_limit: usize,
    next_var: u32,
    symbols: Vec<(String, Symbol)>,
    index: HashMap<String, usize>,
    scopes: Vec<Ref>,
    model: Option<Model>,
}

impl BddSolver {
    pub fn new(width: usize) -> Self {
        Self::with_node_limit(width, DEFAULT_NODE_LIMIT)
    }

    pub fn with_node_limit(width: usize, node_limit: usize) -> Self {
        assert!(
            (MIN_WIDTH..=MAX_WIDTH).contains(&width),
            "Integer width should be in the range 2..=32"
        );
        let bdd = Bdd::default();
        let base = bdd.one;
        Self {
            bdd,
            width,
            node_limit,
            next_var: 1,
            symbols: Vec::new(),
            index: HashMap::new(),
            scopes: vec![base],
            model: None,
        }
    }

    /// Oracle sized by `config`.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        if !(MIN_WIDTH..=MAX_WIDTH).contains(&config.bitwidth) {
            return Err(ConfigError::InvalidValue {
                option: "bitwidth".to_string(),
                value: config.bitwidth.to_string(),
            });
        }
        Ok(Self::with_node_limit(config.bitwidth, config.node_limit))
    }

    pub fn width(&self) -> usize {
        self.width
    }

    fn fresh_var(&mut self) -> Ref {
        let v = self.next_var;
        self.next_var += 1;
        self.bdd.mk_var(v)
    }

    fn symbol(&mut self, name: &str, sort: Sort) -> Result<Symbol, OracleError> {
        if let Some(&i) = self.index.get(name) {
            let symbol = &self.symbols[i].1;
            return match (symbol, sort) {
                (Symbol::Bool(_), Sort::Bool) | (Symbol::Int(_), Sort::Int) => Ok(symbol.clone()),
                _ => Err(OracleError::SortClash {
                    name: name.to_string(),
                    first: symbol.sort_name(),
                    second: sort.name(),
                }),
            };
        }
        let symbol = match sort {
            Sort::Bool => Symbol::Bool(self.fresh_var()),
            Sort::Int => {
                let bits = (0..self.width).map(|_| self.fresh_var()).collect();
                Symbol::Int(BitVec::from_bits(bits))
            }
        };
        debug!("declare {}: {}", name, sort.name());
        self.index.insert(name.to_string(), self.symbols.len());
        self.symbols.push((name.to_string(), symbol.clone()));
        Ok(symbol)
    }

    fn blast(&mut self, e: &Expr) -> Result<Term, OracleError> {
        let term = match e {
            Expr::True => Term::Bool(self.bdd.one),
            Expr::False => Term::Bool(self.bdd.zero),
            Expr::Int(v) => Term::Int(BitVec::constant(&self.bdd, *v)),
            Expr::Var(name, sort) => match self.symbol(name, *sort)? {
                Symbol::Bool(r) => Term::Bool(r),
                Symbol::Int(bv) => Term::Int(bv),
            },
            Expr::Not(a) => Term::Bool(-self.blast_bool(a)?),
            Expr::And(args) => {
                let mut res = self.bdd.one;
                for a in args {
                    let r = self.blast_bool(a)?;
                    res = self.bdd.apply_and(res, r);
                }
                Term::Bool(res)
            }
            Expr::Or(args) => {
                let mut res = self.bdd.zero;
                for a in args {
                    let r = self.blast_bool(a)?;
                    res = self.bdd.apply_or(res, r);
                }
                Term::Bool(res)
            }
            Expr::Implies(a, b) => {
                let a = self.blast_bool(a)?;
                let b = self.blast_bool(b)?;
                Term::Bool(self.bdd.apply_imply(a, b))
            }
            Expr::Neg(a) => Term::Int(self.blast_int(a)?.neg(&self.bdd)),
            Expr::Add(args) => {
                let mut res = BitVec::constant(&self.bdd, 0);
                for a in args {
                    let bv = self.blast_int(a)?;
                    res = res.add(&self.bdd, &bv);
                }
                Term::Int(res)
            }
            Expr::Sub(a, b) => {
                let a = self.blast_int(a)?;
                let b = self.blast_int(b)?;
                Term::Int(a.sub(&self.bdd, &b))
            }
            Expr::Mul(k, a) => Term::Int(self.blast_int(a)?.mul_const(&self.bdd, *k)),
            Expr::Eq(a, b) => match (self.blast(a)?, self.blast(b)?) {
                (Term::Bool(x), Term::Bool(y)) => Term::Bool(self.bdd.apply_eq(x, y)),
                (Term::Int(x), Term::Int(y)) => Term::Bool(x.equal(&self.bdd, &y)),
                _ => return Err(OracleError::IllSorted(e.to_string())),
            },
            Expr::Le(a, b) => {
                let a = self.blast_int(a)?;
                let b = self.blast_int(b)?;
                Term::Bool(a.less_equal(&self.bdd, &b))
            }
            Expr::Lt(a, b) => {
                let a = self.blast_int(a)?;
                let b = self.blast_int(b)?;
                Term::Bool(a.less_than(&self.bdd, &b))
            }
            Expr::Ite(c, a, b) => {
                let c = self.blast_bool(c)?;
                match (self.blast(a)?, self.blast(b)?) {
                    (Term::Bool(x), Term::Bool(y)) => Term::Bool(self.bdd.apply_ite(c, x, y)),
                    (Term::Int(x), Term::Int(y)) => Term::Int(BitVec::ite(&self.bdd, c, &x, &y)),
                    _ => return Err(OracleError::IllSorted(e.to_string())),
                }
            }
        };
        Ok(term)
    }

    fn blast_bool(&mut self, e: &Expr) -> Result<Ref, OracleError> {
        match self.blast(e)? {
            Term::Bool(r) => Ok(r),
            Term::Int(_) => Err(OracleError::IllSorted(format!("expected bool: {}", e))),
        }
    }

    fn blast_int(&mut self, e: &Expr) -> Result<BitVec, OracleError> {
        match self.blast(e)? {
            Term::Int(bv) => Ok(bv),
            Term::Bool(_) => Err(OracleError::IllSorted(format!("expected int: {}", e))),
        }
    }

    fn top(&self) -> Ref {
        self.scopes[self.scopes.len() - 1]
    }

    fn extract_model(&self, path: &[(u32, bool)]) -> Model {
        let assignment: HashMap<u32, bool> = path.iter().copied().collect();
        let value_of = |r: Ref| {
            let b = assignment
                .get(&self.bdd.variable(r))
                .copied()
                .unwrap_or(false);
            b != r.is_negated()
        };
        let mut model = Model::new();
        for (name, symbol) in &self.symbols {
            let value = match symbol {
                Symbol::Bool(r) => ModelValue::Bool(value_of(*r)),
                Symbol::Int(bv) => ModelValue::Int(bv.decode(&self.bdd, value_of)),
            };
            model.insert(name.clone(), value);
        }
        model
    }
}

impl Default for BddSolver {
    fn default() -> Self {
        BddSolver::new(DEFAULT_WIDTH)
    }
}

impl DecisionProcedure for BddSolver {
    /// Allocates the bits of all new integer symbols interleaved, bit `k` of
    /// every symbol next to each other, so that relations between symbols
    /// stay linear in the width.
    fn declare(&mut self, symbols: &[(String, Sort)]) -> Result<(), OracleError> {
        let mut ints = Vec::new();
        for (name, sort) in symbols {
            if let Some(&i) = self.index.get(name.as_str()) {
                let symbol = &self.symbols[i].1;
                if symbol.sort_name() != sort.name() {
                    return Err(OracleError::SortClash {
                        name: name.clone(),
                        first: symbol.sort_name(),
                        second: sort.name(),
                    });
                }
                continue;
            }
            if ints.contains(name) {
                continue;
            }
            match sort {
                Sort::Bool => {
                    self.symbol(name, Sort::Bool)?;
                }
                Sort::Int => ints.push(name.clone()),
            }
        }
        let mut bits: Vec<Vec<Ref>> = vec![Vec::with_capacity(self.width); ints.len()];
        for _ in 0..self.width {
            for b in bits.iter_mut() {
                b.push(self.fresh_var());
            }
        }
        for (name, b) in ints.into_iter().zip(bits) {
            debug!("declare {}: int", name);
            self.index.insert(name.clone(), self.symbols.len());
            self.symbols.push((name, Symbol::Int(BitVec::from_bits(b))));
        }
        Ok(())
    }

    fn assert(&mut self, expr: &Expr) -> Result<(), OracleError> {
        self.model = None;
        let r = self.blast_bool(expr)?;
        let top = self.top();
        let conj = self.bdd.apply_and(top, r);
        let last = self.scopes.len() - 1;
        self.scopes[last] = conj;
        Ok(())
    }

    fn push(&mut self) {
        let top = self.top();
        self.scopes.push(top);
    }

    fn pop(&mut self) -> Result<(), OracleError> {
        if self.scopes.len() <= 1 {
            return Err(OracleError::ScopeUnderflow);
        }
        self.scopes.pop();
        self.model = None;
        Ok(())
    }

    fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    fn range(&self) -> (i64, i64) {
        let half = 1i64 << (self.width - 1);
        (-half, half - 1)
    }

    fn check_sat(&mut self) -> Result<SatResult, OracleError> {
        self.model = None;
        if self.bdd.size() > self.node_limit {
            warn!(
                "node limit exceeded ({} > {})",
                self.bdd.size(),
                self.node_limit
            );
            return Ok(SatResult::Unknown("node limit exceeded".to_string()));
        }
        let top = self.top();
        match self.bdd.one_sat(top) {
            None => Ok(SatResult::Unsat),
            Some(path) => {
                self.model = Some(self.extract_model(&path));
                Ok(SatResult::Sat)
            }
        }
    }

    fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    fn spawn(&self) -> Box<dyn DecisionProcedure> {
        Box::new(BddSolver::with_node_limit(self.width, self.node_limit))
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_sat_and_model() {
        let mut solver = BddSolver::default();
        let x = Expr::var("x");
        let y = Expr::var("y");
        solver.assert(&Expr::eq(Expr::add(x.clone(), y.clone()), Expr::int(10))).unwrap();
        solver.assert(&Expr::eq(Expr::sub(x.clone(), y.clone()), Expr::int(4))).unwrap();
        assert_eq!(solver.check_sat().unwrap(), SatResult::Sat);
        assert_eq!(solver.model().unwrap().get_int("x"), Some(7));
        assert_eq!(solver.model().unwrap().get_int("y"), Some(3));
    }

    #[test]
    fn test_push_pop() {
        let mut solver = BddSolver::default();
        let x = Expr::var("x");
        solver.assert(&Expr::le(x.clone(), Expr::int(5))).unwrap();
        solver.push();
        solver.assert(&Expr::gt(x.clone(), Expr::int(5))).unwrap();
        assert_eq!(solver.check_sat().unwrap(), SatResult::Unsat);
        assert_eq!(solver.depth(), 1);
        solver.pop().unwrap();
        assert_eq!(solver.check_sat().unwrap(), SatResult::Sat);
        assert_eq!(solver.pop(), Err(OracleError::ScopeUnderflow));
    }

    #[test]
    fn test_bounded_range() {
        let mut solver = BddSolver::new(4);
        assert_eq!(solver.range(), (-8, 7));
        solver.assert(&Expr::gt(Expr::var("x"), Expr::int(7))).unwrap();
        assert_eq!(solver.check_sat().unwrap(), SatResult::Unsat);
    }

    #[test]
    fn test_no_overflow_inside_expressions() {
        let mut solver = BddSolver::new(4);
        let x = Expr::var("x");
        solver.assert(&Expr::eq(x.clone(), Expr::int(7))).unwrap();
        solver.assert(&Expr::gt(Expr::add(x.clone(), Expr::int(1)), x.clone())).unwrap();
        assert_eq!(solver.check_sat().unwrap(), SatResult::Sat);
    }

    #[test]
    fn test_sort_clash() {
        let mut solver = BddSolver::default();
        solver.assert(&Expr::bool_var("a")).unwrap();
        let err = solver
            .assert(&Expr::eq(Expr::var("a"), Expr::int(1)))
            .unwrap_err();
        assert!(matches!(err, OracleError::SortClash { .. }));
    }

    #[test]
    fn test_booleans_and_ite() {
        let mut solver = BddSolver::default();
        let c = Expr::bool_var("c");
        let y = Expr::var("y");
        solver
            .assert(&Expr::eq(y.clone(), Expr::ite(c.clone(), Expr::int(3), Expr::int(-3))))
            .unwrap();
        solver.assert(&Expr::lt(y.clone(), Expr::int(0))).unwrap();
        assert_eq!(solver.check_sat().unwrap(), SatResult::Sat);
        let model = solver.model().unwrap();
        assert_eq!(model.get_bool("c"), Some(false));
        assert_eq!(model.get_int("y"), Some(-3));
    }

    #[test]
    fn test_declare_interleaves_bits() {
        let mut solver = BddSolver::new(4);
        solver
            .declare(&[("x".to_string(), Sort::Int), ("y".to_string(), Sort::Int)])
            .unwrap();
        solver
            .assert(&Expr::eq(Expr::var("y"), Expr::add(Expr::var("x"), Expr::int(1))))
            .unwrap();
        // A successor relation over interleaved bits is linear in the width.
        assert!(solver.bdd.size() < 200);
        solver.assert(&Expr::eq(Expr::var("x"), Expr::int(-3))).unwrap();
        assert_eq!(solver.check_sat().unwrap(), SatResult::Sat);
        assert_eq!(solver.model().unwrap().get_int("y"), Some(-2));
    }

    #[test]
    fn test_from_config() {
        let config = Config::new(crate::config::DomainConfig::Equalities)
            .with_bitwidth(6)
            .with_node_limit(1000);
        let solver = BddSolver::from_config(&config).unwrap();
        assert_eq!(solver.range(), (-32, 31));
        assert_eq!(solver.node_limit, 1000);
        assert!(matches!(
            BddSolver::from_config(&config.clone().with_bitwidth(64)),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_node_limit_reports_unknown() {
        let mut solver = BddSolver::with_node_limit(8, 4);
        solver
            .assert(&Expr::lt(Expr::var("x"), Expr::var("y")))
            .unwrap();
        assert!(matches!(solver.check_sat().unwrap(), SatResult::Unknown(_)));
    }
}
