//! Tag extraction over a table of SSA names.

use test_log::test;

use ssa_invariant::names::{pretty_name, SsaName};
use ssa_invariant::ssa::Location;

#[test]
fn test_name_table() {
    // (name, pretty, loop-back, alloc site, field)
    let table: [(&str, &str, Option<u32>, Option<u32>, Option<&str>); 9] = [
        ("i", "i", None, None, None),
        ("i#phi2", "i", None, None, None),
        ("i#lb14", "i", Some(14), None, None),
        ("i#lb4@old", "i", Some(4), None, None),
        ("x#lb3#lb12", "x", Some(12), None, None),
        ("dynamic_object$7", "dynamic_object$7", None, Some(7), None),
        ("dynamic_object$7#lb3.next", "dynamic_object$7", Some(3), Some(7), Some("next")),
        ("dynamic_object$7#lb3.field#2", "dynamic_object$7", Some(3), Some(7), Some("field")),
        ("dynamic_object$12.val#lb9", "dynamic_object$12", Some(9), Some(12), Some("val")),
    ];
    for (name, pretty, loopback, alloc, field) in table {
        let parsed = SsaName::parse(name).unwrap();
        assert_eq!(parsed.full, name);
        assert_eq!(parsed.pretty, pretty, "pretty name of {}", name);
        assert_eq!(parsed.loopback, loopback.map(Location), "loop-back of {}", name);
        match parsed.dynamic {
            Some(d) => {
                assert_eq!(d.alloc_site, alloc.map(Location), "allocation site of {}", name);
                assert_eq!(d.field, field, "field of {}", name);
            }
            None => assert_eq!((alloc, field), (None, None), "{} is not dynamic", name),
        }
    }
}

#[test]
fn test_reserved_names() {
    for name in ["$guard#ls4", "$cond#3", "__CPROVER_rounding_mode", "__CPROVER_alloc#lb5"] {
        assert_eq!(SsaName::parse(name), None, "{} is reserved", name);
    }
    assert_eq!(pretty_name("$guard#ls4"), "$guard");
}

#[test]
fn test_malformed_tags_degrade() {
    let parsed = SsaName::parse("y#lbx").unwrap();
    assert_eq!(parsed.pretty, "y");
    assert_eq!(parsed.loopback, None);

    let parsed = SsaName::parse("dynamic_object$.").unwrap();
    let d = parsed.dynamic.unwrap();
    assert_eq!(d.alloc_site, None);
    assert_eq!(d.field, None);
    assert_eq!(parsed.pretty, "dynamic_object$");
}
