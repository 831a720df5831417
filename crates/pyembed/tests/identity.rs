//! Class names, comparison, casts and counting.

mod common;

use std::cmp::Ordering;

use common::{assert_clean, bridge, construct, guest, guest_list, point, s, traced_bridge};
use pretty_assertions::assert_eq;
use pyembed::{BridgeError, CastKind, HostValue, ObjectHandlers, Operation, TraceEvent, Value};

// =============================================================================
// Class names
// =============================================================================

/// Instances are named after their guest class and module.
#[test]
fn class_names_follow_the_guest_type() {
    let mut bridge = bridge();
    let p = point(&mut bridge, 1, 2);
    assert_eq!(bridge.class_name(&p, false), "Python.Point");
    assert_eq!(bridge.class_name(&p, true), "Python.shapes");

    let list = guest_list(&mut bridge, &[]);
    assert_eq!(bridge.class_name(&list, false), "Python.list");
    assert_eq!(bridge.class_name(&list, true), "Python", "builtins have no __module__ attribute");

    let shapes = bridge.import("shapes").unwrap();
    assert_eq!(bridge.class_name(&shapes, false), "Python.module");

    for proxy in [p, list, shapes] {
        bridge.release_proxy(proxy);
    }
    assert_clean(bridge);
}

/// Classes themselves are objects of type `type`.
#[test]
fn classes_are_named_type() {
    let mut bridge = bridge();
    let shapes = bridge.import("shapes").unwrap();
    let Some(HostValue::Proxy(class)) = bridge.read_property(&shapes, "Point") else {
        panic!("shapes.Point is a class");
    };
    assert_eq!(bridge.class_name(&class, false), "Python.type");
    assert_eq!(bridge.class_name(&class, true), "Python.shapes");
    assert_eq!(bridge.cast(&class, CastKind::String), Ok(s("<class 'shapes.Point'>")));
    bridge.release_proxy(class);
    bridge.release_proxy(shapes);
    assert_clean(bridge);
}

// =============================================================================
// Comparison
// =============================================================================

/// Comparison is delegated to the guest.
#[test]
fn compare_orders_like_the_guest() {
    let mut bridge = bridge();
    let one = bridge.proxy(Value::Int(1));
    let two = bridge.proxy(Value::Float(2.0));
    let apple = guest(&mut bridge, s("apple"));
    let banana = guest(&mut bridge, s("banana"));
    let short = guest_list(&mut bridge, &[1, 2]);
    let long = guest_list(&mut bridge, &[1, 2, 0]);

    assert_eq!(bridge.compare(&one, &two), Ok(Ordering::Less));
    assert_eq!(bridge.compare(&two, &one), Ok(Ordering::Greater));
    assert_eq!(bridge.compare(&apple, &banana), Ok(Ordering::Less));
    assert_eq!(bridge.compare(&short, &long), Ok(Ordering::Less));
    assert_eq!(bridge.compare(&long, &long), Ok(Ordering::Equal));

    for proxy in [one, two, apple, banana, short, long] {
        bridge.release_proxy(proxy);
    }
    assert_clean(bridge);
}

/// Unorderable operands become a comparison diagnostic.
#[test]
fn unorderable_values_fail_to_compare() {
    let mut bridge = traced_bridge();
    let p = point(&mut bridge, 1, 2);
    let one = bridge.proxy(Value::Int(1));
    let err = bridge.compare(&p, &one).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to compare Python objects: Python: [<class 'TypeError'>] ''<' not supported between instances of 'Point' and 'int''"
    );
    assert_eq!(bridge.tracer().diagnostics().len(), 1);

    let nan = bridge.proxy(Value::Float(f64::NAN));
    let err = bridge.compare(&nan, &one).unwrap_err();
    assert!(matches!(err, BridgeError::Compare { cause: Some(_) }));
    for proxy in [p, one, nan] {
        bridge.release_proxy(proxy);
    }
    assert_clean(bridge);
}

// =============================================================================
// Casts
// =============================================================================

/// String casts use the guest `str()`.
#[test]
fn string_cast_uses_guest_str() {
    let mut bridge = bridge();
    let p = point(&mut bridge, 1, 2);
    let list = guest(&mut bridge, HostValue::List(vec![HostValue::Int(1), s("a"), HostValue::Null]));
    let plain = construct(&mut bridge, "Plain", vec![]);

    assert_eq!(bridge.cast(&p, CastKind::String), Ok(s("Point(1, 2)")));
    assert_eq!(bridge.cast(&list, CastKind::String), Ok(s("[1, 'a', None]")));
    let Ok(HostValue::String(text)) = bridge.cast(&plain, CastKind::String) else {
        panic!("instances without __str__ still stringify");
    };
    assert!(text.starts_with("<shapes.Plain object at 0x"), "got {text}");

    for proxy in [p, list, plain] {
        bridge.release_proxy(proxy);
    }
    assert_clean(bridge);
}

/// Other cast kinds fail without a diagnostic.
#[test]
fn other_casts_are_unsupported() {
    let mut bridge = traced_bridge();
    let p = point(&mut bridge, 1, 2);
    for kind in [CastKind::Bool, CastKind::Int, CastKind::Float, CastKind::Array, CastKind::Null] {
        assert_eq!(bridge.cast(&p, kind), Err(BridgeError::UnsupportedCast(kind)));
    }
    assert_eq!(
        BridgeError::UnsupportedCast(CastKind::Int).to_string(),
        "Cannot cast a Python object to int"
    );
    assert!(bridge.tracer().diagnostics().is_empty());
    assert!(
        bridge
            .tracer()
            .events()
            .contains(&TraceEvent::ConversionMiss { op: Operation::Cast })
    );
    bridge.release_proxy(p);
    assert_clean(bridge);
}

/// A raising `__str__` becomes a stringify diagnostic.
#[test]
fn raising_str_fails_the_cast() {
    let mut bridge = traced_bridge();
    let mute = construct(&mut bridge, "Mute", vec![]);
    let err = bridge.cast(&mute, CastKind::String).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to convert Python object to string: Python: [<class 'ValueError'>] 'no str'"
    );
    assert_eq!(bridge.tracer().diagnostics().len(), 1);
    bridge.release_proxy(mute);
    assert_clean(bridge);
}

// =============================================================================
// Counting
// =============================================================================

/// Containers and sized instances have a length; everything else has none.
#[test]
fn count_uses_guest_len() {
    let mut bridge = bridge();
    let list = guest_list(&mut bridge, &[1, 2, 3]);
    let bag = construct(&mut bridge, "Bag", vec![HostValue::Int(7)]);
    let empty_bag = construct(&mut bridge, "Bag", vec![HostValue::Int(0)]);
    let broken_bag = construct(&mut bridge, "Bag", vec![HostValue::Int(-1)]);
    let p = point(&mut bridge, 1, 2);
    let one = bridge.proxy(Value::Int(1));

    assert_eq!(bridge.count(&list), Some(3));
    assert_eq!(bridge.count(&bag), Some(7));
    assert_eq!(bridge.count(&empty_bag), Some(0));
    assert_eq!(bridge.count(&broken_bag), None);
    assert_eq!(bridge.count(&p), None);
    assert_eq!(bridge.count(&one), None);
    assert!(!bridge.runtime().err_occurred());

    for proxy in [list, bag, empty_bag, broken_bag, p, one] {
        bridge.release_proxy(proxy);
    }
    assert_clean(bridge);
}

// =============================================================================
// Proxy identity
// =============================================================================

/// Proxies get increasing ids and compare by id.
#[test]
fn proxies_compare_by_id() {
    let mut bridge = bridge();
    let a = bridge.proxy(Value::Int(1));
    let b = bridge.proxy(Value::Int(1));
    assert!(a.id() < b.id());
    assert!(a != b, "same guest value, different proxies");
    assert_eq!(a, a);
    assert_eq!(a.class_name(), "Python");
    bridge.release_proxy(a);
    bridge.release_proxy(b);
    assert_clean(bridge);
}
