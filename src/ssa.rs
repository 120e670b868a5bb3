//! SSA model of one procedure.
//!
//! A [`LocalSsa`] is an ordered sequence of [`SsaNode`]s, one per basic block,
//! keyed by a dense location numeral. Loops are closed by pointing the
//! loop-back node at its loop head through a [`NodeIndex`] into the owned node
//! vector. The loop-back node also lists the loop-carried variables: the
//! free `#lb` variable standing for the value at the back edge, and the
//! expression whose value actually flows back.
//!
//! The loop head selects between the entry value and the `#lb` value through
//! the loop-select guard `$guard#ls<N>`, where `N` is the loop-back location.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use crate::expr::{Expr, Sort};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Location(pub u32);

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a node in [`LocalSsa::nodes`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeIndex(pub usize);

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl Display for SourceLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// `lhs = rhs`
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Equality {
    pub lhs: String,
    pub rhs: Expr,
}

impl Equality {
    pub fn to_expr(&self) -> Expr {
        Expr::eq(Expr::var_of_sort(self.lhs.clone(), self.rhs.sort()), self.rhs.clone())
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Assertion {
    pub description: String,
    pub condition: Expr,
}

/// A loop-carried variable of a loop-back node.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LoopVar {
    /// Name of the free variable holding the value at the back edge.
    pub lb: String,
    /// Value flowing back to the loop head.
    pub post: Expr,
    pub pointer: bool,
}

#[derive(Debug, Clone)]
pub struct SsaNode {
    pub location: Location,
    pub source: SourceLocation,
    pub equalities: Vec<Equality>,
    pub constraints: Vec<Expr>,
    /// Reachability condition of the node.
    pub guard: Expr,
    /// Branch condition evaluated at the end of the node, if any.
    pub cond: Option<Expr>,
    pub assertions: Vec<Assertion>,
    /// Set on loop-back nodes only.
    pub loophead: Option<NodeIndex>,
    pub loop_vars: Vec<LoopVar>,
}

impl SsaNode {
    pub fn new(location: u32, source: SourceLocation) -> Self {
        Self {
            location: Location(location),
            source,
            equalities: Vec::new(),
            constraints: Vec::new(),
            guard: Expr::True,
            cond: None,
            assertions: Vec::new(),
            loophead: None,
            loop_vars: Vec::new(),
        }
    }

    pub fn assign(mut self, lhs: impl Into<String>, rhs: Expr) -> Self {
        self.equalities.push(Equality {
            lhs: lhs.into(),
            rhs,
        });
        self
    }

    pub fn constrain(mut self, constraint: Expr) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn guarded(mut self, guard: Expr) -> Self {
        self.guard = guard;
        self
    }

    pub fn branch(mut self, cond: Expr) -> Self {
        self.cond = Some(cond);
        self
    }

    pub fn assert(mut self, description: impl Into<String>, condition: Expr) -> Self {
        self.assertions.push(Assertion {
            description: description.into(),
            condition,
        });
        self
    }

    pub fn loop_var(mut self, lb: impl Into<String>, post: Expr) -> Self {
        self.loop_vars.push(LoopVar {
            lb: lb.into(),
            post,
            pointer: false,
        });
        self
    }

    pub fn pointer_var(mut self, lb: impl Into<String>, post: Expr) -> Self {
        self.loop_vars.push(LoopVar {
            lb: lb.into(),
            post,
            pointer: true,
        });
        self
    }

    pub fn is_loopback(&self) -> bool {
        self.loophead.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct LocalSsa {
    pub name: String,
    nodes: Vec<SsaNode>,
    by_location: BTreeMap<Location, NodeIndex>,
    inputs: Vec<(String, Sort)>,
    enabling: Vec<Expr>,
    /// Suffix appended to every variable of a renamed version.
    tag: String,
}

impl LocalSsa {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            by_location: BTreeMap::new(),
            inputs: Vec::new(),
            enabling: Vec::new(),
            tag: String::new(),
        }
    }

    pub fn add_input(&mut self, name: impl Into<String>, sort: Sort) {
        self.inputs.push((name.into(), sort));
    }

    pub fn add_enabling_expr(&mut self, expr: Expr) {
        self.enabling.push(expr);
    }

    /// Appends a node. Locations must be strictly increasing.
    pub fn push(&mut self, node: SsaNode) -> NodeIndex {
        if let Some(last) = self.nodes.last() {
            assert!(
                last.location < node.location,
                "Node locations must be strictly increasing ({} after {})",
                node.location,
                last.location
            );
        }
        let index = NodeIndex(self.nodes.len());
        self.by_location.insert(node.location, index);
        self.nodes.push(node);
        index
    }

    /// Makes `loopback` jump back to `loophead`.
    pub fn close_loop(&mut self, loopback: NodeIndex, loophead: NodeIndex) {
        assert!(
            loophead < loopback,
            "Loop head must precede its loop-back node"
        );
        self.nodes[loopback.0].loophead = Some(loophead);
    }

    pub fn nodes(&self) -> &[SsaNode] {
        &self.nodes
    }

    pub fn node(&self, index: NodeIndex) -> &SsaNode {
        &self.nodes[index.0]
    }

    pub fn index_of(&self, location: Location) -> Option<NodeIndex> {
        self.by_location.get(&location).copied()
    }

    pub fn find_node(&self, location: Location) -> Option<&SsaNode> {
        self.index_of(location).map(|i| self.node(i))
    }

    pub fn inputs(&self) -> &[(String, Sort)] {
        &self.inputs
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Loop-back nodes in location order.
    pub fn loopbacks(&self) -> impl Iterator<Item = (NodeIndex, &SsaNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_loopback())
            .map(|(i, n)| (NodeIndex(i), n))
    }

    /// Loop-select guard of the loop closed by `loopback`.
    pub fn loop_select(&self, loopback: &SsaNode) -> Expr {
        Expr::bool_var(format!("$guard#ls{}{}", loopback.location, self.tag))
    }

    /// Conjunction of all equalities and constraints.
    pub fn formula(&self) -> Expr {
        Expr::and(self.nodes.iter().flat_map(|n| {
            n.equalities
                .iter()
                .map(Equality::to_expr)
                .chain(n.constraints.iter().cloned())
        }))
    }

    pub fn enabling_exprs(&self) -> Expr {
        Expr::and(self.enabling.iter().cloned())
    }

    /// Assertions with the node they belong to.
    pub fn assertions(&self) -> impl Iterator<Item = (&SsaNode, &Assertion)> {
        self.nodes
            .iter()
            .flat_map(|n| n.assertions.iter().map(move |a| (n, a)))
    }

    /// Every symbol the procedure mentions, in first-occurrence order.
    pub fn symbols(&self) -> Vec<(String, Sort)> {
        let mut res: Vec<(String, Sort)> = self.inputs.clone();
        let mut push = |name: String, sort: Sort| {
            if !res.iter().any(|(n, _)| *n == name) {
                res.push((name, sort));
            }
        };
        for node in &self.nodes {
            let mut exprs: Vec<Expr> = vec![node.guard.clone()];
            for eq in &node.equalities {
                push(eq.lhs.clone(), eq.rhs.sort());
                exprs.push(eq.rhs.clone());
            }
            exprs.extend(node.constraints.iter().cloned());
            exprs.extend(node.cond.iter().cloned());
            for lv in &node.loop_vars {
                push(lv.lb.clone(), lv.post.sort());
                exprs.push(lv.post.clone());
            }
            for e in &exprs {
                for (name, sort) in e.symbols() {
                    push(name, sort);
                }
            }
        }
        res
    }

    /// Copy of the procedure with every variable renamed to `name + tag`.
    pub fn tagged(&self, tag: &str) -> LocalSsa {
        let rename = |name: &str| format!("{}{}", name, tag);
        let nodes = self
            .nodes
            .iter()
            .map(|n| SsaNode {
                location: n.location,
                source: n.source.clone(),
                equalities: n
                    .equalities
                    .iter()
                    .map(|eq| Equality {
                        lhs: rename(&eq.lhs),
                        rhs: eq.rhs.rename(&rename),
                    })
                    .collect(),
                constraints: n.constraints.iter().map(|c| c.rename(&rename)).collect(),
                guard: n.guard.rename(&rename),
                cond: n.cond.as_ref().map(|c| c.rename(&rename)),
                assertions: n
                    .assertions
                    .iter()
                    .map(|a| Assertion {
                        description: a.description.clone(),
                        condition: a.condition.rename(&rename),
                    })
                    .collect(),
                loophead: n.loophead,
                loop_vars: n
                    .loop_vars
                    .iter()
                    .map(|lv| LoopVar {
                        lb: rename(&lv.lb),
                        post: lv.post.rename(&rename),
                        pointer: lv.pointer,
                    })
                    .collect(),
            })
            .collect();
        LocalSsa {
            name: self.name.clone(),
            nodes,
            by_location: self.by_location.clone(),
            inputs: self
                .inputs
                .iter()
                .map(|(name, sort)| (rename(name), *sort))
                .collect(),
            enabling: self.enabling.iter().map(|e| e.rename(&rename)).collect(),
            tag: format!("{}{}", self.tag, tag),
        }
    }
}
