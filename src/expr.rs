//! Expressions over integer and boolean SSA variables.
//!
//! This is the minimal term language the analysis core needs: linear
//! integer arithmetic with constant coefficients, comparisons, boolean
//! connectives and if-then-else. Smart constructors perform the trivial
//! simplifications (unit and zero elements, flattening) so that guards built
//! from templates stay readable.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Sort {
    Bool,
    Int,
}

impl Sort {
    pub fn name(self) -> &'static str {
        match self {
            Sort::Bool => "bool",
            Sort::Int => "int",
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Expr {
    True,
    False,
    Int(i64),
    Var(String, Sort),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Implies(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Add(Vec<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    /// Multiplication by a constant coefficient.
    Mul(i64, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Le(Box<Expr>, Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Ite(Box<Expr>, Box<Expr>, Box<Expr>),
}

/// `Σ coeffs[x] * x + constant`
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct LinearForm {
    pub coeffs: BTreeMap<String, i64>,
    pub constant: i64,
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into(), Sort::Int)
    }

    pub fn bool_var(name: impl Into<String>) -> Self {
        Expr::Var(name.into(), Sort::Bool)
    }

    pub fn var_of_sort(name: impl Into<String>, sort: Sort) -> Self {
        Expr::Var(name.into(), sort)
    }

    pub fn int(value: i64) -> Self {
        Expr::Int(value)
    }

    pub fn bool(value: bool) -> Self {
        if value {
            Expr::True
        } else {
            Expr::False
        }
    }

    pub fn not(e: Expr) -> Self {
        match e {
            Expr::True => Expr::False,
            Expr::False => Expr::True,
            Expr::Not(inner) => *inner,
            e => Expr::Not(Box::new(e)),
        }
    }

    pub fn and(items: impl IntoIterator<Item = Expr>) -> Self {
        let mut args = Vec::new();
        for item in items {
            match item {
                Expr::True => {}
                Expr::False => return Expr::False,
                Expr::And(inner) => args.extend(inner),
                e => args.push(e),
            }
        }
        match args.len() {
            0 => Expr::True,
            1 => args.pop().unwrap_or(Expr::True),
            _ => Expr::And(args),
        }
    }

    pub fn or(items: impl IntoIterator<Item = Expr>) -> Self {
        let mut args = Vec::new();
        for item in items {
            match item {
                Expr::False => {}
                Expr::True => return Expr::True,
                Expr::Or(inner) => args.extend(inner),
                e => args.push(e),
            }
        }
        match args.len() {
            0 => Expr::False,
            1 => args.pop().unwrap_or(Expr::False),
            _ => Expr::Or(args),
        }
    }

    pub fn implies(lhs: Expr, rhs: Expr) -> Self {
        match (lhs, rhs) {
            (Expr::True, rhs) => rhs,
            (Expr::False, _) | (_, Expr::True) => Expr::True,
            (lhs, Expr::False) => Expr::not(lhs),
            (lhs, rhs) => Expr::Implies(Box::new(lhs), Box::new(rhs)),
        }
    }

    pub fn neg(e: Expr) -> Self {
        match e {
            Expr::Int(v) => match v.checked_neg() {
                Some(n) => Expr::Int(n),
                None => Expr::Neg(Box::new(Expr::Int(v))),
            },
            Expr::Neg(inner) => *inner,
            e => Expr::Neg(Box::new(e)),
        }
    }

    pub fn add(lhs: Expr, rhs: Expr) -> Self {
        Expr::sum([lhs, rhs])
    }

    pub fn sum(items: impl IntoIterator<Item = Expr>) -> Self {
        let mut args = Vec::new();
        for item in items {
            match item {
                Expr::Int(0) => {}
                Expr::Add(inner) => args.extend(inner),
                e => args.push(e),
            }
        }
        match args.len() {
            0 => Expr::Int(0),
            1 => args.pop().unwrap_or(Expr::Int(0)),
            _ => Expr::Add(args),
        }
    }

    pub fn sub(lhs: Expr, rhs: Expr) -> Self {
        match rhs {
            Expr::Int(0) => lhs,
            rhs => Expr::Sub(Box::new(lhs), Box::new(rhs)),
        }
    }

    pub fn scale(k: i64, e: Expr) -> Self {
        match (k, e) {
            (0, _) => Expr::Int(0),
            (1, e) => e,
            (-1, e) => Expr::neg(e),
            (k, Expr::Int(v)) => match k.checked_mul(v) {
                Some(p) => Expr::Int(p),
                None => Expr::Mul(k, Box::new(Expr::Int(v))),
            },
            (k, e) => Expr::Mul(k, Box::new(e)),
        }
    }

    pub fn eq(lhs: Expr, rhs: Expr) -> Self {
        Expr::Eq(Box::new(lhs), Box::new(rhs))
    }

    pub fn ne(lhs: Expr, rhs: Expr) -> Self {
        Expr::not(Expr::eq(lhs, rhs))
    }

    pub fn le(lhs: Expr, rhs: Expr) -> Self {
        Expr::Le(Box::new(lhs), Box::new(rhs))
    }

    pub fn lt(lhs: Expr, rhs: Expr) -> Self {
        Expr::Lt(Box::new(lhs), Box::new(rhs))
    }

    pub fn ge(lhs: Expr, rhs: Expr) -> Self {
        Expr::le(rhs, lhs)
    }

    pub fn gt(lhs: Expr, rhs: Expr) -> Self {
        Expr::lt(rhs, lhs)
    }

    pub fn ite(cond: Expr, then: Expr, else_: Expr) -> Self {
        match cond {
            Expr::True => then,
            Expr::False => else_,
            cond => Expr::Ite(Box::new(cond), Box::new(then), Box::new(else_)),
        }
    }

    /// Sort of the expression, assuming it is well-sorted.
    pub fn sort(&self) -> Sort {
        match self {
            Expr::Int(_)
            | Expr::Neg(_)
            | Expr::Add(_)
            | Expr::Sub(_, _)
            | Expr::Mul(_, _) => Sort::Int,
            Expr::Var(_, sort) => *sort,
            Expr::Ite(_, then, _) => then.sort(),
            _ => Sort::Bool,
        }
    }

    /// Sort of the expression, or `None` if some operator is applied to
    /// arguments of the wrong sort.
    pub fn checked_sort(&self) -> Option<Sort> {
        let is = |e: &Expr, sort: Sort| e.checked_sort() == Some(sort);
        match self {
            Expr::True | Expr::False => Some(Sort::Bool),
            Expr::Int(_) => Some(Sort::Int),
            Expr::Var(_, sort) => Some(*sort),
            Expr::Not(a) => is(a, Sort::Bool).then_some(Sort::Bool),
            Expr::And(args) | Expr::Or(args) => args.iter().all(|a| is(a, Sort::Bool)).then_some(Sort::Bool),
            Expr::Implies(a, b) => (is(a, Sort::Bool) && is(b, Sort::Bool)).then_some(Sort::Bool),
            Expr::Neg(a) | Expr::Mul(_, a) => is(a, Sort::Int).then_some(Sort::Int),
            Expr::Add(args) => args.iter().all(|a| is(a, Sort::Int)).then_some(Sort::Int),
            Expr::Sub(a, b) => (is(a, Sort::Int) && is(b, Sort::Int)).then_some(Sort::Int),
            Expr::Le(a, b) | Expr::Lt(a, b) => (is(a, Sort::Int) && is(b, Sort::Int)).then_some(Sort::Bool),
            Expr::Eq(a, b) => (a.checked_sort()? == b.checked_sort()?).then_some(Sort::Bool),
            Expr::Ite(c, a, b) => {
                let sort = a.checked_sort()?;
                (is(c, Sort::Bool) && is(b, sort)).then_some(sort)
            }
        }
    }

    fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::True | Expr::False | Expr::Int(_) | Expr::Var(_, _) => vec![],
            Expr::Not(a) | Expr::Neg(a) | Expr::Mul(_, a) => vec![a],
            Expr::And(args) | Expr::Or(args) | Expr::Add(args) => args.iter().collect(),
            Expr::Implies(a, b)
            | Expr::Sub(a, b)
            | Expr::Eq(a, b)
            | Expr::Le(a, b)
            | Expr::Lt(a, b) => vec![a, b],
            Expr::Ite(c, a, b) => vec![c, a, b],
        }
    }

    /// Collects every variable occurring in the expression with its sort.
    pub fn symbols(&self) -> BTreeMap<String, Sort> {
        let mut dest = BTreeMap::new();
        self.collect_symbols(&mut dest);
        dest
    }

    fn collect_symbols(&self, dest: &mut BTreeMap<String, Sort>) {
        if let Expr::Var(name, sort) = self {
            dest.insert(name.clone(), *sort);
        }
        for child in self.children() {
            child.collect_symbols(dest);
        }
    }

    /// Variable names in order of first occurrence.
    pub fn symbol_names(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut names = Vec::new();
        self.visit_vars(&mut |name| {
            if seen.insert(name.to_string()) {
                names.push(name.to_string());
            }
        });
        names
    }

    fn visit_vars(&self, f: &mut impl FnMut(&str)) {
        if let Expr::Var(name, _) = self {
            f(name);
        }
        for child in self.children() {
            child.visit_vars(f);
        }
    }

    /// Replaces variables by expressions; variables missing from `map` stay.
    pub fn substitute(&self, map: &HashMap<String, Expr>) -> Expr {
        self.map_vars(&|name, sort| {
            map.get(name)
                .cloned()
                .unwrap_or_else(|| Expr::var_of_sort(name, sort))
        })
    }

    /// Renames every variable through `f`.
    pub fn rename(&self, f: &dyn Fn(&str) -> String) -> Expr {
        self.map_vars(&|name, sort| Expr::var_of_sort(f(name), sort))
    }

    fn map_vars(&self, f: &dyn Fn(&str, Sort) -> Expr) -> Expr {
        let boxed = |e: &Expr| Box::new(e.map_vars(f));
        match self {
            Expr::True | Expr::False | Expr::Int(_) => self.clone(),
            Expr::Var(name, sort) => f(name, *sort),
            Expr::Not(a) => Expr::Not(boxed(a)),
            Expr::And(args) => Expr::And(args.iter().map(|a| a.map_vars(f)).collect()),
            Expr::Or(args) => Expr::Or(args.iter().map(|a| a.map_vars(f)).collect()),
            Expr::Implies(a, b) => Expr::Implies(boxed(a), boxed(b)),
            Expr::Neg(a) => Expr::Neg(boxed(a)),
            Expr::Add(args) => Expr::Add(args.iter().map(|a| a.map_vars(f)).collect()),
            Expr::Sub(a, b) => Expr::Sub(boxed(a), boxed(b)),
            Expr::Mul(k, a) => Expr::Mul(*k, boxed(a)),
            Expr::Eq(a, b) => Expr::Eq(boxed(a), boxed(b)),
            Expr::Le(a, b) => Expr::Le(boxed(a), boxed(b)),
            Expr::Lt(a, b) => Expr::Lt(boxed(a), boxed(b)),
            Expr::Ite(c, a, b) => Expr::Ite(boxed(c), boxed(a), boxed(b)),
        }
    }

    /// Linear form of an integer expression, or `None` if it is not linear
    /// (contains an if-then-else or a boolean subterm) or a coefficient
    /// overflows.
    pub fn linear_form(&self) -> Option<LinearForm> {
        let mut form = LinearForm::default();
        self.accumulate_linear(1, &mut form)?;
        form.coeffs.retain(|_, c| *c != 0);
        Some(form)
    }

    fn accumulate_linear(&self, factor: i64, form: &mut LinearForm) -> Option<()> {
        match self {
            Expr::Int(v) => form.constant = form.constant.checked_add(factor.checked_mul(*v)?)?,
            Expr::Var(name, Sort::Int) => {
                let c = form.coeffs.entry(name.clone()).or_default();
                *c = c.checked_add(factor)?;
            }
            Expr::Neg(a) => a.accumulate_linear(factor.checked_neg()?, form)?,
            Expr::Add(args) => {
                for a in args {
                    a.accumulate_linear(factor, form)?;
                }
            }
            Expr::Sub(a, b) => {
                a.accumulate_linear(factor, form)?;
                b.accumulate_linear(factor.checked_neg()?, form)?;
            }
            Expr::Mul(k, a) => a.accumulate_linear(factor.checked_mul(*k)?, form)?,
            _ => return None,
        }
        Some(())
    }

    fn is_atom(&self) -> bool {
        matches!(
            self,
            Expr::True | Expr::False | Expr::Int(_) | Expr::Var(_, _) | Expr::Ite(_, _, _)
        )
    }
}

impl LinearForm {
    /// Upper bound of the form when every variable ranges over `[min, max]`,
    /// saturating at the bounds of `i64`.
    pub fn max_over(&self, min: i64, max: i64) -> i64 {
        self.coeffs
            .values()
            .map(|&c| if c >= 0 { c.saturating_mul(max) } else { c.saturating_mul(min) })
            .fold(self.constant, i64::saturating_add)
    }
}

struct Wrapped<'a>(&'a Expr);

impl Display for Wrapped<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_atom() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "({})", self.0)
        }
    }
}

fn join(f: &mut Formatter<'_>, args: &[Expr], sep: &str) -> fmt::Result {
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", sep)?;
        }
        write!(f, "{}", Wrapped(a))?;
    }
    Ok(())
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expr::True => write!(f, "true"),
            Expr::False => write!(f, "false"),
            Expr::Int(v) => write!(f, "{}", v),
            Expr::Var(name, _) => write!(f, "{}", name),
            Expr::Not(a) => write!(f, "!{}", Wrapped(a)),
            Expr::And(args) => join(f, args, "&&"),
            Expr::Or(args) => join(f, args, "||"),
            Expr::Implies(a, b) => write!(f, "{} ==> {}", Wrapped(a), Wrapped(b)),
            Expr::Neg(a) => write!(f, "-{}", Wrapped(a)),
            Expr::Add(args) => join(f, args, "+"),
            Expr::Sub(a, b) => write!(f, "{} - {}", Wrapped(a), Wrapped(b)),
            Expr::Mul(k, a) => write!(f, "{}*{}", k, Wrapped(a)),
            Expr::Eq(a, b) => write!(f, "{} == {}", Wrapped(a), Wrapped(b)),
            Expr::Le(a, b) => write!(f, "{} <= {}", Wrapped(a), Wrapped(b)),
            Expr::Lt(a, b) => write!(f, "{} < {}", Wrapped(a), Wrapped(b)),
            Expr::Ite(c, a, b) => write!(f, "ite({}, {}, {})", c, a, b),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_smart_constructors() {
        let x = Expr::bool_var("x");
        assert_eq!(Expr::and([Expr::True, x.clone()]), x);
        assert_eq!(Expr::and([Expr::False, x.clone()]), Expr::False);
        assert_eq!(Expr::or([Expr::True, x.clone()]), Expr::True);
        assert_eq!(Expr::not(Expr::not(x.clone())), x);
        assert_eq!(Expr::implies(Expr::True, x.clone()), x);
        assert_eq!(Expr::and([]), Expr::True);
        assert_eq!(Expr::or([]), Expr::False);
    }

    #[test]
    fn test_flattening() {
        let a = Expr::bool_var("a");
        let b = Expr::bool_var("b");
        let c = Expr::bool_var("c");
        let e = Expr::and([Expr::and([a.clone(), b.clone()]), c.clone()]);
        assert_eq!(e, Expr::And(vec![a, b, c]));
    }

    #[test]
    fn test_linear_form() {
        let e = Expr::sub(
            Expr::add(Expr::scale(2, Expr::var("x")), Expr::int(3)),
            Expr::sub(Expr::var("y"), Expr::var("x")),
        );
        let form = e.linear_form().unwrap();
        assert_eq!(form.coeffs.get("x"), Some(&3));
        assert_eq!(form.coeffs.get("y"), Some(&-1));
        assert_eq!(form.constant, 3);
        assert_eq!(form.max_over(-128, 127), 3 * 127 + 128 + 3);
    }

    #[test]
    fn test_linear_form_rejects_ite() {
        let e = Expr::ite(Expr::bool_var("c"), Expr::var("x"), Expr::int(0));
        assert_eq!(e.linear_form(), None);
    }

    #[test]
    fn test_checked_sort() {
        let x = Expr::var("x");
        let c = Expr::bool_var("c");
        assert_eq!(Expr::sub(x.clone(), Expr::int(1)).checked_sort(), Some(Sort::Int));
        assert_eq!(Expr::ite(c.clone(), x.clone(), Expr::int(0)).checked_sort(), Some(Sort::Int));
        assert_eq!(Expr::eq(c.clone(), Expr::True).checked_sort(), Some(Sort::Bool));
        assert_eq!(Expr::sub(x.clone(), c.clone()).checked_sort(), None);
        assert_eq!(Expr::le(c.clone(), Expr::int(0)).checked_sort(), None);
        assert_eq!(Expr::eq(x.clone(), c.clone()).checked_sort(), None);
        assert_eq!(Expr::ite(c, x, Expr::False).checked_sort(), None);
    }

    #[test]
    fn test_folding_does_not_overflow() {
        assert_eq!(Expr::neg(Expr::int(i64::MIN)), Expr::Neg(Box::new(Expr::Int(i64::MIN))));
        assert_eq!(Expr::scale(3, Expr::int(i64::MAX)), Expr::Mul(3, Box::new(Expr::Int(i64::MAX))));
        assert_eq!(Expr::scale(-2, Expr::int(5)), Expr::Int(-10));
        assert_eq!(Expr::scale(4, Expr::int(5)), Expr::Int(20));

        let huge = Expr::scale(i64::MAX, Expr::scale(2, Expr::var("x")));
        assert_eq!(huge.linear_form(), None);
        let form = Expr::scale(i64::MAX, Expr::var("x")).linear_form().unwrap();
        assert_eq!(form.max_over(-128, 127), i64::MAX);
    }

    #[test]
    fn test_substitute_and_symbols() {
        let e = Expr::le(Expr::sub(Expr::var("i#lb5"), Expr::var("N#lb5")), Expr::int(0));
        let map = HashMap::from([("i#lb5".to_string(), Expr::var("i#4"))]);
        let post = e.substitute(&map);
        assert_eq!(post.symbol_names(), vec!["i#4".to_string(), "N#lb5".to_string()]);
        assert_eq!(post.symbols().get("i#4"), Some(&Sort::Int));
    }

    #[test]
    fn test_display() {
        let e = Expr::le(Expr::sub(Expr::var("i"), Expr::var("N")), Expr::int(0));
        assert_eq!(e.to_string(), "(i - N) <= 0");
        let g = Expr::and([Expr::bool_var("$guard#1"), Expr::not(Expr::bool_var("c"))]);
        assert_eq!(g.to_string(), "$guard#1 && (!c)");
    }
}
