//! # ssa-invariant: template-based invariant synthesis over SSA
//!
//! **`ssa-invariant`** infers loop invariants and ranking functions for a
//! procedure given in static single assignment form. Each procedure is a
//! list of [`SsaNode`][crate::ssa::SsaNode]s whose equalities, constraints
//! and guards form one formula; a loop is closed by a loop-back node that
//! passes `#lb` variables to its loop head.
//!
//! An abstract value is a vector of rows (template bounds, candidate
//! equalities, predicates, points-to sets, ranking functions). A strategy
//! solver asks a [`DecisionProcedure`][crate::oracle::DecisionProcedure] for
//! a model in which some row can be improved and edits that row, until no
//! such model exists.
//!
//! ## Basic Usage
//!
//! ```rust
//! use ssa_invariant::bdd_solver::BddSolver;
//! use ssa_invariant::config::{Config, DomainConfig, SolverKind};
//! use ssa_invariant::expr::{Expr, Sort};
//! use ssa_invariant::fixed_point::SsaFixedPoint;
//! use ssa_invariant::ssa::{LocalSsa, SourceLocation, SsaNode};
//! use ssa_invariant::template::TemplateShape;
//!
//! // i = 0; while (i < 10) i++;
//! let src = |line| SourceLocation::new("count.c", line);
//! let mut ssa = LocalSsa::new("count");
//! ssa.push(SsaNode::new(1, src(1)).assign("i#1", Expr::int(0)));
//! let head = ssa.push(
//!     SsaNode::new(2, src(2))
//!         .assign("i#phi2", Expr::ite(Expr::bool_var("$guard#ls3"), Expr::var("i#lb3"), Expr::var("i#1")))
//!         .branch(Expr::lt(Expr::var("i#phi2"), Expr::int(10))),
//! );
//! let back = ssa.push(
//!     SsaNode::new(3, src(3))
//!         .guarded(Expr::lt(Expr::var("i#phi2"), Expr::int(10)))
//!         .assign("i#3", Expr::add(Expr::var("i#phi2"), Expr::int(1)))
//!         .loop_var("i#lb3", Expr::var("i#3")),
//! );
//! ssa.close_loop(back, head);
//!
//! let config = Config::new(DomainConfig::Template {
//!     shape: TemplateShape::Intervals,
//!     solver: SolverKind::Enumeration,
//! });
//! let mut oracle = BddSolver::from_config(&config).unwrap();
//! let mut fp = SsaFixedPoint::new(config, ssa);
//! fp.run(&mut oracle).unwrap();
//! println!("{}", fp.invariant());
//! ```
//!
//! ## Core Components
//!
//! - **[`oracle`]**: the decision procedure contract, implemented by [`bdd_solver`] on top of [`bdd`].
//! - **[`domain`]**: abstract domains and their row encodings.
//! - **[`strategy`]**: the enumeration and binary search solvers.
//! - **[`fixed_point`]**: the driver over backward edges, including differential runs.
//! - **[`imprecision`]**: attribution of non-converged rows to source variables.

pub mod analyzer;
pub mod bdd;
pub mod bdd_solver;
pub mod bitvec;
pub mod config;
pub mod domain;
pub mod error;
pub mod expr;
pub mod fixed_point;
pub mod imprecision;
pub mod names;
pub mod oracle;
pub mod property;
pub mod reference;
pub mod ssa;
pub mod strategy;
pub mod template;
