//! Tracer hooks: dispatch, probe misses, diagnostics and proxy lifetimes.

mod common;

use common::{assert_clean, s, shapes_module, traced_bridge};
use pretty_assertions::assert_eq;
use pyembed::{Bridge, HostValue, ObjectHandlers, Operation, Protocol, ProxyId, ResourceLimits, StderrTracer, TraceEvent};

/// A proxy's whole life shows up in order.
#[test]
fn proxy_lifetime_is_traced() {
    let mut bridge = traced_bridge();
    let p = bridge.construct(&[s("shapes"), s("Point"), HostValue::Int(1), HostValue::Int(2)]).unwrap();
    let id = p.id();
    assert_eq!(id, ProxyId::new(0));
    assert_eq!(bridge.read_property(&p, "x"), Some(HostValue::Int(1)));
    bridge.release_proxy(p);

    assert_eq!(
        bridge.tracer().events(),
        [
            TraceEvent::Dispatch { op: Operation::Construct, proxy: None },
            TraceEvent::ProxyCreated { id },
            TraceEvent::Dispatch { op: Operation::ReadProperty, proxy: Some(id) },
            TraceEvent::ProxyReleased { id },
        ]
    );
    assert_clean(bridge);
}

/// Failures are traced with their host diagnostic text.
#[test]
fn diagnostics_are_traced() {
    let mut bridge = traced_bridge();
    let dict = bridge.call(&[s("shapes"), s("nested")]).unwrap();
    let dict = common::guest(&mut bridge, dict);
    bridge.tracer_mut().clear();

    let err = bridge.unset_dimension(&dict, &s("absent")).unwrap_err();
    assert_eq!(
        bridge.tracer().events(),
        [
            TraceEvent::Dispatch { op: Operation::UnsetDimension, proxy: Some(dict.id()) },
            TraceEvent::ProbeMiss { op: Operation::UnsetDimension, protocol: Protocol::Sequence },
            TraceEvent::ProbeMiss { op: Operation::UnsetDimension, protocol: Protocol::Mapping },
            TraceEvent::Diagnostic { op: Operation::UnsetDimension, message: err.to_string() },
        ]
    );
    bridge.release_proxy(dict);
    assert_clean(bridge);
}

/// Operations and protocols print in snake case.
#[test]
fn trace_names() {
    assert_eq!(Operation::ReadDimension.to_string(), "read_dimension");
    assert_eq!(Operation::CallMethod.to_string(), "call_method");
    assert_eq!(Protocol::Mapping.to_string(), "mapping");
}

/// The stderr tracer can drive a full session.
#[test]
fn stderr_tracer_runs() {
    let mut bridge = Bridge::with_tracer(ResourceLimits::new(), StderrTracer::new());
    bridge.install_module(&shapes_module()).unwrap();
    let p = common::point(&mut bridge, 1, 2);
    assert!(bridge.invoke(&p, "fail", &[]).is_err());
    assert_eq!(bridge.read_dimension(&p, &HostValue::Int(0)), None);
    bridge.release_proxy(p);
    assert_clean(bridge);
}
