//! Attribution of imprecise invariant components to source variables and
//! source lines.
//!
//! For every `(location, name)` reported by a domain, the loop-back location
//! is taken from the name's `#lb` tag, or else from the domain. The nodes
//! strictly between the loop head and the loop-back node are scanned in
//! order for an equality assigning a variable with the same pretty name; the
//! last one wins and its node's source location is the loop header
//! attribution. Dynamic objects also get their allocation site resolved.
//! Anything unresolvable becomes a sentinel.

use std::fmt::{self, Display, Formatter};

use log::debug;

use crate::names::{pretty_name, SsaName, NOT_FOUND, NO_MEMBER};
use crate::ssa::{LocalSsa, Location, SourceLocation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    Found(SourceLocation),
    NotFound,
}

impl SourceRef {
    pub fn line(&self) -> Option<u32> {
        match self {
            SourceRef::Found(loc) => Some(loc.line),
            SourceRef::NotFound => None,
        }
    }
}

impl Display for SourceRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SourceRef::Found(loc) => write!(f, "{}", loc),
            SourceRef::NotFound => write!(f, "{}", NOT_FOUND),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicObject {
    pub alloc_site: SourceRef,
    pub field: Option<String>,
}

impl DynamicObject {
    /// The accessed field, or [`NO_MEMBER`].
    pub fn field_name(&self) -> &str {
        self.field.as_deref().unwrap_or(NO_MEMBER)
    }
}

/// Summary of one variable whose invariant component did not converge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpreciseVar {
    pub ssa_name: String,
    pub pretty_name: String,
    pub loop_header: SourceRef,
    pub dynamic: Option<DynamicObject>,
}

impl Display for ImpreciseVar {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} (loop at {})", self.pretty_name, self.loop_header)?;
        if let Some(d) = &self.dynamic {
            write!(f, ", allocated at {}, field {}", d.alloc_site, d.field_name())?;
        }
        Ok(())
    }
}

fn loop_header(ssa: &LocalSsa, loopback: Location, pretty: &str) -> Option<SourceLocation> {
    let back = ssa.index_of(loopback)?;
    let head = ssa.node(back).loophead?;
    let mut found = None;
    for node in &ssa.nodes()[head.0 + 1..back.0] {
        for eq in &node.equalities {
            if pretty_name(&eq.lhs) == pretty {
                found = Some(node.source.clone());
            }
        }
    }
    found
}

/// Attributes one entry; `None` for tool-reserved names.
pub fn attribute_one(ssa: &LocalSsa, location: Option<Location>, name: &str) -> Option<ImpreciseVar> {
    let Some(parsed) = SsaName::parse(name) else {
        debug!("skipping reserved variable {}", name);
        return None;
    };
    let loop_header = parsed
        .loopback
        .or(location)
        .and_then(|loc| loop_header(ssa, loc, parsed.pretty))
        .map_or(SourceRef::NotFound, SourceRef::Found);
    let dynamic = parsed.dynamic.map(|d| DynamicObject {
        alloc_site: d
            .alloc_site
            .and_then(|loc| ssa.find_node(loc))
            .map_or(SourceRef::NotFound, |n| SourceRef::Found(n.source.clone())),
        field: d.field.map(str::to_string),
    });
    Some(ImpreciseVar {
        ssa_name: name.to_string(),
        pretty_name: parsed.pretty.to_string(),
        loop_header,
        dynamic,
    })
}

/// Attributes all entries in order, omitting tool-reserved ones.
pub fn attribute(ssa: &LocalSsa, imprecise: &[(Option<Location>, String)]) -> Vec<ImpreciseVar> {
    imprecise
        .iter()
        .filter_map(|(location, name)| attribute_one(ssa, *location, name))
        .collect()
}
