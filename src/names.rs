//! Grammar of SSA variable names.
//!
//! ```text
//! name      := reserved | dynamic | plain
//! reserved  := ("__CPROVER" | "$") any
//! dynamic   := "dynamic_object$" digits* rest
//! plain     := base ("#" any)?
//! ```
//!
//! Tags embedded in a name:
//!
//! - loop-back marker `#lb<N>`: the last occurrence wins, `N` is the leading
//!   run of digits after it;
//! - allocation site: the digits right after `dynamic_object$`;
//! - field: for dynamic objects, the text after the first `.` following the
//!   prefix, up to the next `#` or the end.
//!
//! The pretty name of a dynamic object stops at whichever of `.` and `#`
//! comes first after the prefix, so `dynamic_object$7#lb3.f#2` and
//! `dynamic_object$7.f#lb3` both print as `dynamic_object$7`. A plain name
//! stops at its first `#`.
//!
//! None of the extractors fail: a missing tag is `None`.

use crate::ssa::Location;

pub const TOOL_PREFIXES: [&str; 2] = ["__CPROVER", "$"];
pub const DYNAMIC_PREFIX: &str = "dynamic_object$";
pub const LOOP_BACK_MARKER: &str = "#lb";

/// Printed when a source location cannot be resolved.
pub const NOT_FOUND: &str = "<NOT FOUND>";
/// Printed when a dynamic object is accessed as a whole.
pub const NO_MEMBER: &str = "<NO MEMBER>";

pub fn is_tool_reserved(name: &str) -> bool {
    TOOL_PREFIXES.iter().any(|p| name.starts_with(p))
}

pub fn is_dynamic(name: &str) -> bool {
    name.starts_with(DYNAMIC_PREFIX)
}

fn leading_number(s: &str) -> Option<u32> {
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(s.len(), |(i, _)| i);
    s[..end].parse().ok()
}

pub fn pretty_name(name: &str) -> &str {
    if let Some(rest) = name.strip_prefix(DYNAMIC_PREFIX) {
        match rest.find(['.', '#']) {
            Some(i) => &name[..DYNAMIC_PREFIX.len() + i],
            None => name,
        }
    } else {
        match name.find('#') {
            Some(i) => &name[..i],
            None => name,
        }
    }
}

pub fn loopback_location(name: &str) -> Option<Location> {
    let i = name.rfind(LOOP_BACK_MARKER)?;
    leading_number(&name[i + LOOP_BACK_MARKER.len()..]).map(Location)
}

pub fn alloc_site_location(name: &str) -> Option<Location> {
    let rest = name.strip_prefix(DYNAMIC_PREFIX)?;
    leading_number(rest).map(Location)
}

pub fn dynamic_field(name: &str) -> Option<&str> {
    let rest = name.strip_prefix(DYNAMIC_PREFIX)?;
    let start = rest.find('.')? + 1;
    let field = &rest[start..];
    let field = match field.find('#') {
        Some(end) => &field[..end],
        None => field,
    };
    if field.is_empty() {
        None
    } else {
        Some(field)
    }
}

/// All tags of one name.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SsaName<'a> {
    pub full: &'a str,
    pub pretty: &'a str,
    pub loopback: Option<Location>,
    pub dynamic: Option<DynamicName<'a>>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DynamicName<'a> {
    pub alloc_site: Option<Location>,
    pub field: Option<&'a str>,
}

impl<'a> SsaName<'a> {
    /// `None` for tool-reserved names.
    pub fn parse(name: &'a str) -> Option<Self> {
        if is_tool_reserved(name) {
            return None;
        }
        let dynamic = is_dynamic(name).then(|| DynamicName {
            alloc_site: alloc_site_location(name),
            field: dynamic_field(name),
        });
        Some(Self {
            full: name,
            pretty: pretty_name(name),
            loopback: loopback_location(name),
            dynamic,
        })
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_plain_names() {
        assert_eq!(pretty_name("x#lb12"), "x");
        assert_eq!(loopback_location("x#lb12"), Some(Location(12)));
        assert_eq!(pretty_name("x"), "x");
        assert_eq!(loopback_location("x#3"), None);
        assert_eq!(dynamic_field("s.f#3"), None);
    }

    #[test]
    fn test_dynamic_name() {
        let name = SsaName::parse("dynamic_object$7#lb3.field#2").unwrap();
        assert_eq!(name.pretty, "dynamic_object$7");
        assert_eq!(name.loopback, Some(Location(3)));
        assert_eq!(
            name.dynamic,
            Some(DynamicName {
                alloc_site: Some(Location(7)),
                field: Some("field"),
            })
        );
    }

    #[test]
    fn test_reserved() {
        assert!(SsaName::parse("$guard#ls4").is_none());
        assert!(SsaName::parse("__CPROVER_rounding_mode#2").is_none());
        assert!(SsaName::parse("dynamic_object$1").is_some());
    }
}
