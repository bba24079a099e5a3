//! Node address parsing and tree relations.

use std::num::NonZeroU32;

use proofwork_types::NodeId;

#[test]
fn malformed_addresses_are_rejected() {
    for input in ["", "0", "1.", ".1", "1..2", "-1", "2.1", "1.0", "1.01", "1.a", " 1", "1.-2"] {
        assert!(NodeId::parse(input).is_err(), "{input:?} should not parse");
    }
}

#[test]
fn display_round_trips() {
    for input in ["1", "1.1", "1.2.3", "1.10.4294967295"] {
        let id = NodeId::parse(input).unwrap();
        assert_eq!(id.to_string(), input);
        assert_eq!(NodeId::parse(&id.to_string()).unwrap(), id);
    }
}

#[test]
fn relations_follow_the_address() {
    let root = NodeId::root();
    let child = root.child(NonZeroU32::new(3).unwrap());
    let grandchild = child.child(NonZeroU32::MIN);

    assert_eq!(child.to_string(), "1.3");
    assert_eq!(grandchild.parent(), Some(child.clone()));
    assert_eq!(root.parent(), None);
    assert_eq!(grandchild.depth(), 3);
    assert!(root.is_ancestor_of(&grandchild));
    assert!(!grandchild.is_ancestor_of(&grandchild));
    assert!(child.is_parent_of(&grandchild));
    assert!(!root.is_parent_of(&grandchild));
    assert_eq!(grandchild.ancestors(), vec![child, root]);
}

#[test]
fn ordering_is_numeric_per_component() {
    let mut ids: Vec<NodeId> = ["1.10", "1.2", "1", "1.2.1", "1.9"]
        .into_iter()
        .map(|s| NodeId::parse(s).unwrap())
        .collect();
    ids.sort();
    let sorted: Vec<String> = ids.iter().map(ToString::to_string).collect();
    assert_eq!(sorted, ["1", "1.2", "1.2.1", "1.9", "1.10"]);
}
