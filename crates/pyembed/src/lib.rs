#![doc = include_str!("../../../README.md")]
// first to include defer_drop macro
mod heap;

mod bridge;
mod dispatch;
mod error;
mod exception;
mod marshal;
mod object;
mod proxy;
mod resource;
mod runtime;
pub mod tracer;
mod types;
mod value;

pub use crate::{
    bridge::Bridge,
    dispatch::{CastKind, ITEM_PROBES, MethodDescriptor, ObjectHandlers, Protocol},
    error::{BridgeError, GuestError},
    exception::{ExcType, PendingException, RunError, RunResult},
    heap::{ContainsHeap, DropWithHeap, Heap, HeapData, HeapGuard, HeapId, HeapStats},
    marshal::UnpackError,
    object::{HostMap, HostValue, ResourceHandle},
    proxy::{BridgeId, PROXY_CLASS_NAME, ProxyId, ProxyObject},
    resource::{DEFAULT_MAX_RECURSION_DEPTH, MAX_DATA_RECURSION_DEPTH, ResourceError, ResourceLimits},
    runtime::Runtime,
    tracer::{BridgeTracer, NoopTracer, Operation, RecordingTracer, StderrTracer, TraceEvent},
    types::{
        Args, BoundMethod, ClassDef, ClassObject, Constant, Dict, DictKey, Function, FunctionDef, Instance, Module,
        ModuleDef, NativeFn, Type,
    },
    value::Value,
};
