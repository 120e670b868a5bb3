//! Analysis configuration.
//!
//! A tool hands over its option table as [`Options`], named flags and named
//! values; [`Config::from_options`] validates it and selects exactly one
//! domain and solver pair as a [`DomainConfig`]. Programmatic users build a
//! [`Config`] directly.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::bdd_solver::{DEFAULT_NODE_LIMIT, DEFAULT_WIDTH, MAX_WIDTH, MIN_WIDTH};
use crate::error::ConfigError;
use crate::template::TemplateShape;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SolverKind {
    Enumeration,
    Binsearch,
}

/// The one domain (and solver) of an analysis run.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DomainConfig {
    Ranking { lexicographic: bool },
    Equalities,
    PredicateAbstraction,
    Heap,
    /// Heap combined with a numeric template, optionally split by symbolic paths.
    HeapTemplate { shape: TemplateShape, sympath: bool },
    Template { shape: TemplateShape, solver: SolverKind },
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Config {
    pub domain: DomainConfig,
    pub show_imprecise_vars: bool,
    /// Width of integer variables in bits, for oracles built from this
    /// configuration. The analysis itself reads the range from the oracle.
    pub bitwidth: usize,
    /// Pretty names whose stand-alone bound rows are left out of templates.
    pub withhold: BTreeSet<String>,
    pub max_ranking_components: usize,
    pub max_ranking_refinements: usize,
    pub max_heap_targets: usize,
    /// Oracle size beyond which checks answer unknown.
    pub node_limit: usize,
}

impl Config {
    pub fn new(domain: DomainConfig) -> Self {
        Self {
            domain,
            show_imprecise_vars: false,
            bitwidth: DEFAULT_WIDTH,
            withhold: BTreeSet::new(),
            max_ranking_components: 3,
            max_ranking_refinements: 20,
            max_heap_targets: 4,
            node_limit: DEFAULT_NODE_LIMIT,
        }
    }

    pub fn with_imprecise_vars(mut self, show: bool) -> Self {
        self.show_imprecise_vars = show;
        self
    }

    pub fn with_bitwidth(mut self, bitwidth: usize) -> Self {
        self.bitwidth = bitwidth;
        self
    }

    pub fn with_withheld(mut self, name: impl Into<String>) -> Self {
        self.withhold.insert(name.into());
        self
    }

    pub fn with_max_ranking_components(mut self, n: usize) -> Self {
        self.max_ranking_components = n;
        self
    }

    pub fn with_max_ranking_refinements(mut self, n: usize) -> Self {
        self.max_ranking_refinements = n;
        self
    }

    pub fn with_max_heap_targets(mut self, n: usize) -> Self {
        self.max_heap_targets = n;
        self
    }

    pub fn with_node_limit(mut self, n: usize) -> Self {
        self.node_limit = n;
        self
    }

    /// Validates an option table.
    pub fn from_options(options: &Options) -> Result<Self, ConfigError> {
        for flag in &options.flags {
            if !FLAGS.contains(&flag.as_str()) {
                return Err(ConfigError::UnknownOption(flag.clone()));
            }
        }
        for key in options.values.keys() {
            if !VALUES.contains(&key.as_str()) {
                return Err(ConfigError::UnknownOption(key.clone()));
            }
        }

        let mut selected: Option<&str> = None;
        for flag in DOMAIN_FLAGS {
            if options.is_set(flag) {
                if let Some(first) = selected {
                    return Err(ConfigError::Contradictory(first.to_string(), flag.to_string()));
                }
                selected = Some(flag);
            }
        }
        let selected = selected.ok_or(ConfigError::NoDomainSelected)?;

        if options.is_set("monolithic-ranking-function") && selected != "compute-ranking-functions" {
            return Err(ConfigError::MissingPrerequisite {
                option: "monolithic-ranking-function".to_string(),
                requires: "compute-ranking-functions".to_string(),
            });
        }
        let sympath = options.is_set("sympath");
        if sympath && selected != "heap-interval" && selected != "heap-zones" {
            return Err(ConfigError::MissingPrerequisite {
                option: "sympath".to_string(),
                requires: "heap-interval or heap-zones".to_string(),
            });
        }

        let mut shape: Option<(&str, TemplateShape)> = None;
        for (flag, s) in [
            ("intervals", TemplateShape::Intervals),
            ("zones", TemplateShape::Zones),
            ("octagons", TemplateShape::Octagons),
        ] {
            if options.is_set(flag) {
                if let Some((first, _)) = shape {
                    return Err(ConfigError::Contradictory(first.to_string(), flag.to_string()));
                }
                shape = Some((flag, s));
            }
        }
        let shape = shape.map_or(TemplateShape::Zones, |(_, s)| s);

        let domain = match selected {
            "compute-ranking-functions" => DomainConfig::Ranking {
                lexicographic: !options.is_set("monolithic-ranking-function"),
            },
            "equalities" => DomainConfig::Equalities,
            "predabs-solver" => DomainConfig::PredicateAbstraction,
            "heap" => DomainConfig::Heap,
            "heap-interval" => DomainConfig::HeapTemplate {
                shape: TemplateShape::Intervals,
                sympath,
            },
            "heap-zones" => DomainConfig::HeapTemplate {
                shape: TemplateShape::Zones,
                sympath,
            },
            "binsearch-solver" => DomainConfig::Template {
                shape,
                solver: SolverKind::Binsearch,
            },
            _ => DomainConfig::Template {
                shape,
                solver: SolverKind::Enumeration,
            },
        };

        let mut config = Config::new(domain).with_imprecise_vars(options.is_set("show-imprecise-vars"));
        if let Some(v) = options.parse_value::<usize>("bitwidth")? {
            if !(MIN_WIDTH..=MAX_WIDTH).contains(&v) {
                return Err(ConfigError::InvalidValue {
                    option: "bitwidth".to_string(),
                    value: v.to_string(),
                });
            }
            config.bitwidth = v;
        }
        if let Some(v) = options.parse_positive("max-ranking-components")? {
            config.max_ranking_components = v;
        }
        if let Some(v) = options.parse_positive("max-ranking-refinements")? {
            config.max_ranking_refinements = v;
        }
        if let Some(v) = options.parse_positive("max-heap-targets")? {
            config.max_heap_targets = v;
        }
        if let Some(v) = options.parse_positive("node-limit")? {
            config.node_limit = v;
        }
        if let Some(names) = options.get("withhold") {
            config.withhold = names
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(config)
    }
}

/// Options selecting the domain family, at most one of which may be set.
const DOMAIN_FLAGS: [&str; 8] = [
    "compute-ranking-functions",
    "equalities",
    "heap",
    "heap-interval",
    "heap-zones",
    "predabs-solver",
    "enum-solver",
    "binsearch-solver",
];

const FLAGS: [&str; 14] = [
    "compute-ranking-functions",
    "monolithic-ranking-function",
    "equalities",
    "heap",
    "heap-interval",
    "heap-zones",
    "sympath",
    "enum-solver",
    "predabs-solver",
    "binsearch-solver",
    "show-imprecise-vars",
    "intervals",
    "zones",
    "octagons",
];

const VALUES: [&str; 6] = [
    "bitwidth",
    "max-ranking-components",
    "max-ranking-refinements",
    "max-heap-targets",
    "node-limit",
    "withhold",
];

/// Raw option table: named flags and named values.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Options {
    flags: BTreeSet<String>,
    values: BTreeMap<String, String>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, flag: impl Into<String>) -> Self {
        self.flags.insert(flag.into());
        self
    }

    pub fn set_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn is_set(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    fn parse_value<T: FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        raw.trim().parse().map(Some).map_err(|_| ConfigError::InvalidValue {
            option: key.to_string(),
            value: raw.to_string(),
        })
    }

    fn parse_positive(&self, key: &str) -> Result<Option<usize>, ConfigError> {
        match self.parse_value::<usize>(key)? {
            Some(0) => Err(ConfigError::InvalidValue {
                option: key.to_string(),
                value: "0".to_string(),
            }),
            v => Ok(v),
        }
    }
}
