//! Item handlers: sequence-then-mapping probing for reads, writes, existence
//! checks and deletions.

mod common;

use common::{assert_clean, bridge, guest, guest_list, point, s, traced_bridge};
use pretty_assertions::assert_eq;
use pyembed::{
    Bridge, BridgeError, BridgeTracer, HostMap, HostValue, ObjectHandlers, Operation, Protocol, ProxyObject, TraceEvent,
    Value,
};

fn guest_map<Tr: BridgeTracer>(bridge: &mut Bridge<Tr>, pairs: Vec<(&str, HostValue)>) -> ProxyObject {
    let map: HostMap = pairs.into_iter().map(|(key, value)| (key.to_owned(), value)).collect();
    guest(bridge, HostValue::Map(map))
}

fn probe_misses(events: &[TraceEvent]) -> Vec<(Operation, Protocol)> {
    events
        .iter()
        .filter_map(|event| match event {
            TraceEvent::ProbeMiss { op, protocol } => Some((*op, *protocol)),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Sequences
// =============================================================================

/// Reading, writing, checking and deleting through the sequence protocol.
#[test]
fn sequence_item_lifecycle() {
    let mut bridge = bridge();
    let list = guest_list(&mut bridge, &[1, 2, 3]);

    assert_eq!(bridge.read_dimension(&list, &HostValue::Int(1)), Some(HostValue::Int(2)));
    assert!(bridge.has_dimension(&list, &HostValue::Int(2), false));
    assert!(!bridge.has_dimension(&list, &HostValue::Int(5), false));

    bridge.write_dimension(&list, &HostValue::Int(0), &s("one")).unwrap();
    assert_eq!(bridge.read_dimension(&list, &HostValue::Int(0)), Some(s("one")));

    bridge.unset_dimension(&list, &HostValue::Int(0)).unwrap();
    assert_eq!(bridge.count(&list), Some(2));
    assert_eq!(bridge.read_dimension(&list, &HostValue::Int(0)), Some(HostValue::Int(2)));
    bridge.release_proxy(list);
    assert_clean(bridge);
}

/// Negative indices count from the end.
#[test]
fn negative_indices_wrap() {
    let mut bridge = bridge();
    let list = guest_list(&mut bridge, &[1, 2, 3]);
    assert_eq!(bridge.read_dimension(&list, &HostValue::Int(-1)), Some(HostValue::Int(3)));
    assert_eq!(bridge.read_dimension(&list, &HostValue::Int(-4)), None);
    bridge.release_proxy(list);
    assert_clean(bridge);
}

/// An out-of-range read misses both probes and leaves no error behind.
#[test]
fn out_of_range_read_is_absent() {
    let mut bridge = traced_bridge();
    let list = guest_list(&mut bridge, &[1, 2, 3]);
    bridge.tracer_mut().clear();

    assert_eq!(bridge.read_dimension(&list, &HostValue::Int(10)), None);
    assert_eq!(
        probe_misses(bridge.tracer().events()),
        vec![
            (Operation::ReadDimension, Protocol::Sequence),
            (Operation::ReadDimension, Protocol::Mapping),
        ]
    );
    assert!(bridge.tracer().diagnostics().is_empty());
    bridge.release_proxy(list);
    assert_clean(bridge);
}

/// Strings are read-only sequences of characters.
#[test]
fn strings_are_indexable() {
    let mut bridge = bridge();
    let text = guest(&mut bridge, s("héllo"));
    assert_eq!(bridge.read_dimension(&text, &HostValue::Int(1)), Some(s("é")));
    assert_eq!(bridge.count(&text), Some(5));

    let err = bridge.write_dimension(&text, &HostValue::Int(0), &s("j")).unwrap_err();
    assert_eq!(err, BridgeError::NoItemProtocol { key: "0".to_owned() });
    bridge.release_proxy(text);
    assert_clean(bridge);
}

/// A failing sequence write names the index and carries the guest error.
#[test]
fn out_of_range_write_raises() {
    let mut bridge = traced_bridge();
    let list = guest_list(&mut bridge, &[1, 2, 3]);
    let err = bridge
        .write_dimension(&list, &HostValue::Int(5), &HostValue::Int(0))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to set sequence item 5: Python: [<class 'IndexError'>] 'list assignment index out of range'"
    );
    assert_eq!(bridge.tracer().diagnostics().len(), 1);
    bridge.release_proxy(list);
    assert_clean(bridge);
}

/// Tuples cannot be assigned through either protocol.
#[test]
fn immutable_sequences_have_no_write_protocol() {
    let mut bridge = traced_bridge();
    let tuple = bridge.runtime_mut().new_tuple(vec![Value::Int(1)]).unwrap();
    let tuple = bridge.proxy(tuple);
    bridge.tracer_mut().clear();

    let err = bridge
        .write_dimension(&tuple, &HostValue::Int(0), &HostValue::Int(2))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to set item '0': object supports neither sequence nor mapping assignment"
    );
    assert_eq!(
        probe_misses(bridge.tracer().events()),
        vec![
            (Operation::WriteDimension, Protocol::Sequence),
            (Operation::WriteDimension, Protocol::Mapping),
        ]
    );
    assert_eq!(bridge.read_dimension(&tuple, &HostValue::Int(0)), Some(HostValue::Int(1)));
    bridge.release_proxy(tuple);
    assert_clean(bridge);
}

// =============================================================================
// Mappings
// =============================================================================

/// Reading, writing, checking and deleting through the mapping protocol.
#[test]
fn mapping_item_lifecycle() {
    let mut bridge = bridge();
    let dict = guest_map(&mut bridge, vec![("a", HostValue::Int(1))]);

    assert_eq!(bridge.read_dimension(&dict, &s("a")), Some(HostValue::Int(1)));
    assert_eq!(bridge.read_dimension(&dict, &s("b")), None);

    bridge.write_dimension(&dict, &s("b"), &HostValue::Int(2)).unwrap();
    assert!(bridge.has_dimension(&dict, &s("b"), false));
    assert_eq!(bridge.count(&dict), Some(2));

    bridge.unset_dimension(&dict, &s("a")).unwrap();
    assert!(!bridge.has_dimension(&dict, &s("a"), false));
    assert_eq!(bridge.count(&dict), Some(1));
    bridge.release_proxy(dict);
    assert_clean(bridge);
}

/// A mapping has no attribute dict, so it enumerates as its own items.
#[test]
fn mapping_enumerates_its_items() {
    let mut bridge = traced_bridge();
    let dict = guest_map(&mut bridge, vec![("a", HostValue::Int(1))]);

    assert_eq!(bridge.read_dimension(&dict, &s("a")), Some(HostValue::Int(1)));
    assert_eq!(bridge.read_dimension(&dict, &HostValue::Int(0)), None);
    bridge.write_dimension(&dict, &s("b"), &HostValue::Int(2)).unwrap();

    let mut expected = HostMap::new();
    expected.insert("a".to_owned(), HostValue::Int(1));
    expected.insert("b".to_owned(), HostValue::Int(2));
    assert_eq!(bridge.properties(&dict), expected);
    assert!(
        !bridge
            .tracer()
            .events()
            .contains(&TraceEvent::ConversionMiss { op: Operation::Properties })
    );
    bridge.release_proxy(dict);
    assert_clean(bridge);
}

/// Non-string keys reach the mapping protocol in their host string form.
#[test]
fn keys_use_their_string_form() {
    let mut bridge = bridge();
    let dict = guest_map(&mut bridge, vec![("0", s("zero")), ("1", s("one")), ("", s("empty"))]);

    assert_eq!(bridge.read_dimension(&dict, &HostValue::Int(0)), Some(s("zero")));
    assert_eq!(bridge.read_dimension(&dict, &HostValue::Bool(true)), Some(s("one")));
    assert_eq!(bridge.read_dimension(&dict, &HostValue::Null), Some(s("empty")));
    assert_eq!(bridge.read_dimension(&dict, &HostValue::Float(1.0)), Some(s("one")));

    bridge.write_dimension(&dict, &HostValue::Int(7), &s("seven")).unwrap();
    assert_eq!(bridge.read_dimension(&dict, &s("7")), Some(s("seven")));
    bridge.release_proxy(dict);
    assert_clean(bridge);
}

/// Proxy keys are stringified by the guest.
#[test]
fn proxy_keys_use_guest_str() {
    let mut bridge = bridge();
    let dict = guest_map(&mut bridge, vec![("Point(1, 2)", s("found"))]);
    let key = HostValue::Proxy(point(&mut bridge, 1, 2));
    assert_eq!(bridge.read_dimension(&dict, &key), Some(s("found")));
    bridge.release(key);
    bridge.release_proxy(dict);
    assert_clean(bridge);
}

/// A string key on a list applies to neither protocol.
#[test]
fn string_key_on_a_list() {
    let mut bridge = bridge();
    let list = guest_list(&mut bridge, &[1]);
    assert_eq!(bridge.read_dimension(&list, &s("a")), None);
    assert!(!bridge.has_dimension(&list, &s("a"), false));
    assert_eq!(
        bridge.write_dimension(&list, &s("a"), &HostValue::Int(1)),
        Err(BridgeError::NoItemProtocol { key: "a".to_owned() })
    );
    bridge.release_proxy(list);
    assert_clean(bridge);
}

/// Objects with neither protocol have no items.
#[test]
fn plain_objects_have_no_items() {
    let mut bridge = bridge();
    let p = point(&mut bridge, 1, 2);
    assert_eq!(bridge.read_dimension(&p, &s("x")), None);
    assert_eq!(bridge.read_dimension(&p, &HostValue::Int(0)), None);
    assert!(bridge.unset_dimension(&p, &s("x")).is_err());
    bridge.release_proxy(p);
    assert_clean(bridge);
}

// =============================================================================
// Existence and deletion
// =============================================================================

/// The truthiness check follows guest truthiness of the item.
#[test]
fn item_truthiness() {
    let mut bridge = bridge();
    let list = guest(
        &mut bridge,
        HostValue::List(vec![HostValue::Int(0), s(""), s("0"), HostValue::List(vec![])]),
    );
    assert!(bridge.has_dimension(&list, &HostValue::Int(0), false));
    assert!(!bridge.has_dimension(&list, &HostValue::Int(0), true));
    assert!(!bridge.has_dimension(&list, &HostValue::Int(1), true));
    assert!(bridge.has_dimension(&list, &HostValue::Int(2), true));
    assert!(!bridge.has_dimension(&list, &HostValue::Int(3), true));
    bridge.release_proxy(list);
    assert_clean(bridge);
}

/// A deletion no protocol accepts fails once, with the last guest error.
#[test]
fn failed_delete_raises_once() {
    let mut bridge = traced_bridge();
    let dict = guest_map(&mut bridge, vec![("a", HostValue::Int(1))]);
    let err = bridge.unset_dimension(&dict, &HostValue::Int(3)).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to delete item: Python: [<class 'KeyError'>] ''3''"
    );
    assert_eq!(bridge.tracer().diagnostics().len(), 1);
    bridge.release_proxy(dict);
    assert_clean(bridge);
}

/// A failed sequence deletion falls through to the mapping protocol.
#[test]
fn delete_falls_through_on_failure() {
    let mut bridge = traced_bridge();
    let list = guest_list(&mut bridge, &[1]);
    bridge.tracer_mut().clear();
    let err = bridge.unset_dimension(&list, &HostValue::Int(4)).unwrap_err();
    assert!(
        matches!(&err, BridgeError::DeleteItem { cause: Some(cause) } if cause.message() == "list assignment index out of range")
    );
    assert_eq!(
        probe_misses(bridge.tracer().events()),
        vec![
            (Operation::UnsetDimension, Protocol::Sequence),
            (Operation::UnsetDimension, Protocol::Mapping),
        ]
    );
    assert_eq!(bridge.count(&list), Some(1));
    bridge.release_proxy(list);
    assert_clean(bridge);
}

/// Object items are stored by reference and read back as proxies.
#[test]
fn object_items_are_proxied() {
    let mut bridge = bridge();
    let p = HostValue::Proxy(point(&mut bridge, 4, 5));
    let holder = guest_list(&mut bridge, &[0]);
    bridge.write_dimension(&holder, &HostValue::Int(0), &p).unwrap();
    bridge.release(p);

    let Some(HostValue::Proxy(item)) = bridge.read_dimension(&holder, &HostValue::Int(0)) else {
        panic!("an instance item reads back as a proxy");
    };
    assert_eq!(bridge.read_property(&item, "x"), Some(HostValue::Int(4)));
    bridge.release_proxy(item);
    bridge.release_proxy(holder);
    assert_clean(bridge);
}
