//! Error taxonomy of the analysis core.
//!
//! Configuration errors are raised before any analysis work is done.
//! Oracle errors abort the current procedure's run. Everything the
//! imprecision attributor cannot resolve degrades to a sentinel instead
//! of an error.

use thiserror::Error;

/// Invalid or contradictory analysis options.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("no abstract domain selected")]
    NoDomainSelected,
    #[error("options `{0}` and `{1}` select different domains")]
    Contradictory(String, String),
    #[error("option `{option}` requires `{requires}`")]
    MissingPrerequisite { option: String, requires: String },
    #[error("unknown option `{0}`")]
    UnknownOption(String),
    #[error("invalid value `{value}` for option `{option}`")]
    InvalidValue { option: String, value: String },
}

/// Failures reported by a decision procedure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("pop without matching push")]
    ScopeUnderflow,
    #[error("ill-sorted expression: {0}")]
    IllSorted(String),
    #[error("variable `{name}` used as both {first} and {second}")]
    SortClash {
        name: String,
        first: &'static str,
        second: &'static str,
    },
    #[error("internal solver error: {0}")]
    Internal(String),
}

/// Errors of one fixed-point run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("decision procedure failed: {0}")]
    Oracle(#[from] OracleError),
    #[error("precondition is infeasible")]
    InfeasiblePrecondition,
    #[error("ill-typed template: {0}")]
    IllTypedTemplate(String),
    #[error("model has no value for `{0}`")]
    MissingModelValue(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
