//! Attribute handlers: read, write, existence, deletion and enumeration.

mod common;

use common::{assert_clean, bridge, guest_list, point, s, traced_bridge};
use pretty_assertions::assert_eq;
use pyembed::{BridgeError, HostMap, HostValue, ObjectHandlers, Operation, ResourceHandle, TraceEvent};

// =============================================================================
// Read and write
// =============================================================================

/// A written attribute reads back converted.
#[test]
fn write_then_read() {
    let mut bridge = bridge();
    let p = point(&mut bridge, 1, 2);
    bridge.write_property(&p, "label", &s("origin")).unwrap();
    bridge
        .write_property(&p, "tags", &HostValue::List(vec![s("a"), s("b")]))
        .unwrap();

    assert_eq!(bridge.read_property(&p, "label"), Some(s("origin")));
    assert_eq!(bridge.read_property(&p, "tags"), Some(HostValue::List(vec![s("a"), s("b")])));
    assert_eq!(bridge.read_property(&p, "x"), Some(HostValue::Int(1)));
    bridge.release_proxy(p);
    assert_clean(bridge);
}

/// Class attributes are visible through instances.
#[test]
fn class_attributes_are_readable() {
    let mut bridge = bridge();
    let p = point(&mut bridge, 0, 0);
    assert_eq!(bridge.read_property(&p, "dims"), Some(HostValue::Int(2)));
    bridge.release_proxy(p);
    assert_clean(bridge);
}

/// A missing attribute reads as absent without a diagnostic.
#[test]
fn missing_attribute_reads_as_none() {
    let mut bridge = traced_bridge();
    let p = point(&mut bridge, 1, 2);
    assert_eq!(bridge.read_property(&p, "nope"), None);
    assert!(bridge.tracer().diagnostics().is_empty());
    assert!(!bridge.runtime().err_occurred());
    bridge.release_proxy(p);
    assert_clean(bridge);
}

/// A value without a guest form makes the write a silent no-op.
#[test]
fn unconvertible_write_is_a_no_op() {
    let mut bridge = traced_bridge();
    let p = point(&mut bridge, 1, 2);
    let handle = HostValue::Resource(ResourceHandle::new("stream", 9));
    assert_eq!(bridge.write_property(&p, "x", &handle), Ok(()));
    assert_eq!(bridge.read_property(&p, "x"), Some(HostValue::Int(1)), "old value kept");
    assert!(bridge.tracer().diagnostics().is_empty());
    assert!(
        bridge
            .tracer()
            .events()
            .contains(&TraceEvent::ConversionMiss { op: Operation::WriteProperty })
    );
    bridge.release_proxy(p);
    assert_clean(bridge);
}

/// Builtin containers reject new attributes with a diagnostic.
#[test]
fn rejected_write_raises_a_diagnostic() {
    let mut bridge = traced_bridge();
    let list = guest_list(&mut bridge, &[1, 2]);
    let err = bridge.write_property(&list, "extra", &HostValue::Int(1)).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to set attribute 'extra': Python: [<class 'AttributeError'>] ''list' object has no attribute 'extra''"
    );
    assert_eq!(bridge.tracer().diagnostics(), vec![err.to_string().as_str()]);
    bridge.release_proxy(list);
    assert_clean(bridge);
}

/// Writing a proxy stores the wrapped object itself.
#[test]
fn proxies_are_written_by_reference() {
    let mut bridge = bridge();
    let a = point(&mut bridge, 1, 2);
    let b = point(&mut bridge, 3, 4);
    let b = HostValue::Proxy(b);
    bridge.write_property(&a, "other", &b).unwrap();
    bridge.release(b);

    let Some(HostValue::Proxy(other)) = bridge.read_property(&a, "other") else {
        panic!("an instance attribute reads back as a proxy");
    };
    assert_eq!(bridge.read_property(&other, "y"), Some(HostValue::Int(4)));
    bridge.release_proxy(other);
    bridge.release_proxy(a);
    assert_clean(bridge);
}

// =============================================================================
// Existence
// =============================================================================

/// Presence ignores the value; the truthiness check uses guest truthiness.
#[test]
fn existence_and_truthiness() {
    let mut bridge = bridge();
    let p = point(&mut bridge, 0, 5);
    bridge.write_property(&p, "zero_text", &s("0")).unwrap();
    bridge.write_property(&p, "empty", &s("")).unwrap();

    assert!(bridge.has_property(&p, "x", false));
    assert!(!bridge.has_property(&p, "x", true), "0 is falsy");
    assert!(bridge.has_property(&p, "y", true));
    assert!(bridge.has_property(&p, "zero_text", true), "'0' is a non-empty guest string");
    assert!(!bridge.has_property(&p, "empty", true));
    assert!(!bridge.has_property(&p, "nope", false));
    assert!(!bridge.has_property(&p, "nope", true));
    bridge.release_proxy(p);
    assert_clean(bridge);
}

/// Instances decide their own truthiness through `__bool__` and `__len__`.
#[test]
fn truthiness_hooks_are_honoured() {
    let mut bridge = bridge();
    let holder = point(&mut bridge, 1, 1);
    let off = common::construct(&mut bridge, "Flag", vec![HostValue::Bool(false)]);
    let empty_bag = common::construct(&mut bridge, "Bag", vec![HostValue::Int(0)]);
    let off = HostValue::Proxy(off);
    let empty_bag = HostValue::Proxy(empty_bag);
    bridge.write_property(&holder, "flag", &off).unwrap();
    bridge.write_property(&holder, "bag", &empty_bag).unwrap();
    bridge.release(off);
    bridge.release(empty_bag);

    assert!(bridge.has_property(&holder, "flag", false));
    assert!(!bridge.has_property(&holder, "flag", true));
    assert!(!bridge.has_property(&holder, "bag", true));
    bridge.release_proxy(holder);
    assert_clean(bridge);
}

// =============================================================================
// Deletion
// =============================================================================

/// A deleted attribute is gone; class attributes resurface.
#[test]
fn delete_removes_the_instance_attribute() {
    let mut bridge = bridge();
    let p = point(&mut bridge, 1, 2);
    bridge.write_property(&p, "dims", &HostValue::Int(3)).unwrap();
    assert_eq!(bridge.read_property(&p, "dims"), Some(HostValue::Int(3)));

    bridge.unset_property(&p, "dims").unwrap();
    assert_eq!(bridge.read_property(&p, "dims"), Some(HostValue::Int(2)));
    bridge.unset_property(&p, "x").unwrap();
    assert_eq!(bridge.read_property(&p, "x"), None);
    bridge.release_proxy(p);
    assert_clean(bridge);
}

/// Deleting a missing attribute raises exactly one diagnostic.
#[test]
fn deleting_a_missing_attribute_fails_once() {
    let mut bridge = traced_bridge();
    let p = point(&mut bridge, 1, 2);
    let err = bridge.unset_property(&p, "nope").unwrap_err();
    assert!(matches!(&err, BridgeError::DeleteAttribute { name, cause: Some(_) } if name == "nope"));
    assert_eq!(
        bridge.tracer().diagnostics(),
        vec!["Failed to delete attribute 'nope': Python: [<class 'AttributeError'>] ''Point' object has no attribute 'nope''"]
    );
    bridge.release_proxy(p);
    assert_clean(bridge);
}

// =============================================================================
// Enumeration
// =============================================================================

/// Properties are the instance dict, in insertion order.
#[test]
fn properties_list_the_instance_dict() {
    let mut bridge = bridge();
    let p = point(&mut bridge, 1, 2);
    bridge.write_property(&p, "label", &s("a")).unwrap();

    let mut expected = HostMap::new();
    expected.insert("x".to_owned(), HostValue::Int(1));
    expected.insert("y".to_owned(), HostValue::Int(2));
    expected.insert("label".to_owned(), s("a"));
    assert_eq!(bridge.properties(&p), expected);
    bridge.release_proxy(p);
    assert_clean(bridge);
}

/// An unprintable key stops the enumeration; what came before it is kept.
#[test]
fn unprintable_key_stops_enumeration() {
    let mut bridge = traced_bridge();
    let Ok(HostValue::Proxy(odd)) = bridge.call(&[s("shapes"), s("odd_namespace")]) else {
        panic!("an instance converts to a proxy");
    };
    bridge.tracer_mut().clear();

    let mut expected = HostMap::new();
    expected.insert("a".to_owned(), HostValue::Int(1));
    assert_eq!(bridge.properties(&odd), expected);
    assert!(
        bridge
            .tracer()
            .events()
            .contains(&TraceEvent::ConversionMiss { op: Operation::Properties })
    );
    assert!(bridge.tracer().diagnostics().is_empty());
    assert!(!bridge.runtime().err_occurred());
    bridge.release_proxy(odd);
    assert_clean(bridge);
}

/// Objects without an attribute dict enumerate as empty.
#[test]
fn objects_without_a_dict_have_no_properties() {
    let mut bridge = bridge();
    let list = guest_list(&mut bridge, &[1]);
    assert_eq!(bridge.properties(&list), HostMap::new());
    bridge.release_proxy(list);
    assert_clean(bridge);
}
