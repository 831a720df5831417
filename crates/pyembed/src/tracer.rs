//! Bridge tracing infrastructure.
//!
//! Provides a trait-based tracing system for the dispatch table with zero-cost
//! abstraction. When using [`NoopTracer`], all trace methods compile away through
//! monomorphization.
//!
//! # Architecture
//!
//! The [`BridgeTracer`] trait defines hook points at the events worth logging
//! across the boundary: operation dispatch, capability probe misses, conversion
//! misses, missing methods, raised diagnostics, swallowed guest errors, foreign
//! proxies and proxy lifetimes.
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | Zero-cost no-op (production default) |
//! | [`StderrTracer`] | Human-readable log to stderr |
//! | [`RecordingTracer`] | Full event recording for tests and post-mortems |
//!
//! # Usage
//!
//! The bridge is parameterized as `Bridge<Tr: BridgeTracer>` and the tracer is
//! chosen at construction time:
//!
//! ```
//! # use pyembed::{Bridge, RecordingTracer, ResourceLimits};
//! let bridge = Bridge::with_tracer(ResourceLimits::new(), RecordingTracer::new());
//! assert!(bridge.tracer().events().is_empty());
//! ```

use strum::{Display, IntoStaticStr};

use crate::{dispatch::Protocol, error::BridgeError, proxy::ProxyId};

/// Host-visible operation entering the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    ReadProperty,
    WriteProperty,
    HasProperty,
    UnsetProperty,
    ReadDimension,
    WriteDimension,
    HasDimension,
    UnsetDimension,
    Properties,
    GetMethod,
    CallMethod,
    Invoke,
    ClassName,
    Compare,
    Cast,
    Count,
    Construct,
    Call,
    Import,
    Release,
}

/// Trace event emitted by the bridge.
///
/// Used by [`RecordingTracer`] to capture a full trace for assertions in tests
/// or post-mortem analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// An operation was dispatched, on a proxy when it targets one.
    Dispatch { op: Operation, proxy: Option<ProxyId> },
    /// A capability probe did not apply or did not find the item.
    ProbeMiss { op: Operation, protocol: Protocol },
    /// A value could not be marshaled and the operation degraded to absence/no-op.
    ConversionMiss { op: Operation },
    /// A method call found nothing callable under the name.
    MethodUnavailable { op: Operation, name: String },
    /// A host diagnostic was raised.
    Diagnostic { op: Operation, message: String },
    /// A guest error could not be stringified and was dropped without a message.
    ErrorSwallowed { op: Operation },
    /// A proxy created by another bridge was refused.
    ForeignProxy { op: Operation, id: ProxyId },
    /// A new proxy was handed to the host.
    ProxyCreated { id: ProxyId },
    /// A proxy's guest reference was released.
    ProxyReleased { id: ProxyId },
}

/// Trait for bridge tracing.
///
/// All methods have default no-op implementations, so [`NoopTracer`] requires
/// zero lines of code. Implementations only override the hooks they care about.
pub trait BridgeTracer: std::fmt::Debug {
    /// Called when a host operation enters the bridge.
    #[inline(always)]
    fn on_dispatch(&mut self, _op: Operation, _proxy: Option<ProxyId>) {}

    /// Called when a capability probe is skipped or misses during an item operation.
    #[inline(always)]
    fn on_probe_miss(&mut self, _op: Operation, _protocol: Protocol) {}

    /// Called when a value could not be converted across the boundary.
    #[inline(always)]
    fn on_conversion_miss(&mut self, _op: Operation) {}

    /// Called when a method call finds nothing callable to call.
    #[inline(always)]
    fn on_method_unavailable(&mut self, _op: Operation, _name: &str) {}

    /// Called when an operation fails with a host diagnostic.
    #[inline(always)]
    fn on_diagnostic(&mut self, _op: Operation, _error: &BridgeError) {}

    /// Called when the error bridge drops a guest error it could not stringify.
    #[inline(always)]
    fn on_error_swallowed(&mut self, _op: Operation) {}

    /// Called when a proxy created by another bridge is passed in.
    #[inline(always)]
    fn on_foreign_proxy(&mut self, _op: Operation, _id: ProxyId) {}

    /// Called when a proxy is created.
    #[inline(always)]
    fn on_proxy_created(&mut self, _id: ProxyId) {}

    /// Called when a proxy is released.
    #[inline(always)]
    fn on_proxy_released(&mut self, _id: ProxyId) {}
}

// ============================================================================
// NoopTracer: zero-cost production default
// ============================================================================

/// A tracer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl BridgeTracer for NoopTracer {}

// ============================================================================
// StderrTracer: human-readable log
// ============================================================================

/// Tracer that prints a human-readable log to stderr.
///
/// Output format:
/// ```text
///   >>> read_dimension      proxy=3
///   ... probe miss          read_dimension sequence
///   !!! write_dimension     Failed to set mapping item 'k': Python: [<class 'TypeError'>] '...'
///   +++ proxy 4
///   --- proxy 3
/// ```
#[derive(Debug, Default)]
pub struct StderrTracer;

impl StderrTracer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl BridgeTracer for StderrTracer {
    fn on_dispatch(&mut self, op: Operation, proxy: Option<ProxyId>) {
        match proxy {
            Some(id) => eprintln!("  >>> {op:<20} proxy={}", id.raw()),
            None => eprintln!("  >>> {op}"),
        }
    }

    fn on_probe_miss(&mut self, op: Operation, protocol: Protocol) {
        eprintln!("  ... probe miss          {op} {protocol}");
    }

    fn on_conversion_miss(&mut self, op: Operation) {
        eprintln!("  ... conversion miss     {op}");
    }

    fn on_method_unavailable(&mut self, op: Operation, name: &str) {
        eprintln!("  ... no method           {op} {name}");
    }

    fn on_diagnostic(&mut self, op: Operation, error: &BridgeError) {
        eprintln!("  !!! {op:<20} {error}");
    }

    fn on_error_swallowed(&mut self, op: Operation) {
        eprintln!("  !!! {op:<20} <guest error could not be stringified>");
    }

    fn on_foreign_proxy(&mut self, op: Operation, id: ProxyId) {
        eprintln!("  !!! {op:<20} foreign proxy={}", id.raw());
    }

    fn on_proxy_created(&mut self, id: ProxyId) {
        eprintln!("  +++ proxy {}", id.raw());
    }

    fn on_proxy_released(&mut self, id: ProxyId) {
        eprintln!("  --- proxy {}", id.raw());
    }
}

// ============================================================================
// RecordingTracer: full event capture
// ============================================================================

/// Tracer that records every event.
///
/// Retrieve the trace via [`RecordingTracer::events`].
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events recorded so far, in order.
    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Diagnostics recorded so far, as their display strings.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Diagnostic { message, .. } => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Discards recorded events.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl BridgeTracer for RecordingTracer {
    fn on_dispatch(&mut self, op: Operation, proxy: Option<ProxyId>) {
        self.events.push(TraceEvent::Dispatch { op, proxy });
    }

    fn on_probe_miss(&mut self, op: Operation, protocol: Protocol) {
        self.events.push(TraceEvent::ProbeMiss { op, protocol });
    }

    fn on_conversion_miss(&mut self, op: Operation) {
        self.events.push(TraceEvent::ConversionMiss { op });
    }

    fn on_method_unavailable(&mut self, op: Operation, name: &str) {
        self.events.push(TraceEvent::MethodUnavailable {
            op,
            name: name.to_owned(),
        });
    }

    fn on_diagnostic(&mut self, op: Operation, error: &BridgeError) {
        self.events.push(TraceEvent::Diagnostic {
            op,
            message: error.to_string(),
        });
    }

    fn on_error_swallowed(&mut self, op: Operation) {
        self.events.push(TraceEvent::ErrorSwallowed { op });
    }

    fn on_foreign_proxy(&mut self, op: Operation, id: ProxyId) {
        self.events.push(TraceEvent::ForeignProxy { op, id });
    }

    fn on_proxy_created(&mut self, id: ProxyId) {
        self.events.push(TraceEvent::ProxyCreated { id });
    }

    fn on_proxy_released(&mut self, id: ProxyId) {
        self.events.push(TraceEvent::ProxyReleased { id });
    }
}
