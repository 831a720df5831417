//! The host-side runtime context.
//!
//! A [`Bridge`] owns one guest [`Runtime`], the tracer and the proxy bookkeeping.
//! Every operation on proxies, every conversion and every entry point goes through
//! it, so there is no process-wide interpreter state: two bridges are two fully
//! isolated interpreters.

use crate::{
    defer_drop,
    error::{BridgeError, GuestError, fetch_error},
    heap::{ContainsHeap, DropWithHeap, Heap, HeapStats},
    object::HostValue,
    proxy::{BridgeId, ProxyId, ProxyObject},
    resource::ResourceLimits,
    runtime::Runtime,
    tracer::{BridgeTracer, NoopTracer, Operation},
    types::ModuleDef,
    value::Value,
};

/// Number of leading name arguments taken by [`Bridge::construct`] and [`Bridge::call`].
const ENTRY_NAME_ARGS: usize = 2;

/// Host-side context for one embedded guest interpreter.
#[derive(Debug)]
pub struct Bridge<Tr: BridgeTracer = NoopTracer> {
    pub(crate) runtime: Runtime,
    pub(crate) tracer: Tr,
    id: BridgeId,
    next_proxy_id: u64,
    live_proxies: usize,
}

impl Bridge<NoopTracer> {
    /// Starts a guest interpreter with the given limits and no tracing.
    #[must_use]
    pub fn new(limits: ResourceLimits) -> Self {
        Self::with_tracer(limits, NoopTracer)
    }
}

impl<Tr: BridgeTracer> Bridge<Tr> {
    #[must_use]
    pub fn with_tracer(limits: ResourceLimits, tracer: Tr) -> Self {
        Self {
            runtime: Runtime::new(limits),
            tracer,
            id: BridgeId::next(),
            next_proxy_id: 0,
            live_proxies: 0,
        }
    }

    #[must_use]
    pub fn id(&self) -> BridgeId {
        self.id
    }

    /// Whether `proxy` was created by this bridge.
    #[must_use]
    pub fn owns(&self, proxy: &ProxyObject) -> bool {
        proxy.owner() == self.id
    }

    /// Version string of the embedded interpreter.
    #[must_use]
    pub fn version(&self) -> &'static str {
        Runtime::version()
    }

    #[must_use]
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut Runtime {
        &mut self.runtime
    }

    #[must_use]
    pub fn tracer(&self) -> &Tr {
        &self.tracer
    }

    pub fn tracer_mut(&mut self) -> &mut Tr {
        &mut self.tracer
    }

    #[must_use]
    pub fn heap_stats(&self) -> HeapStats {
        self.runtime.stats()
    }

    /// Number of proxies handed out and not yet released.
    #[must_use]
    pub fn live_proxies(&self) -> usize {
        self.live_proxies
    }

    /// Registers a guest module so entry points can resolve it by name.
    pub fn install_module(&mut self, def: &ModuleDef) -> Result<(), BridgeError> {
        self.runtime.install_module(def).map_err(|_| BridgeError::Import {
            module: def.name.clone(),
            cause: self.guest_error(Operation::Import),
        })
    }

    /// Wraps an owned guest reference in a new proxy.
    pub fn proxy(&mut self, object: Value) -> ProxyObject {
        let id = ProxyId::new(self.next_proxy_id);
        self.next_proxy_id = self.next_proxy_id.wrapping_add(1);
        self.live_proxies += 1;
        self.tracer.on_proxy_created(id);
        ProxyObject::new(id, self.id, object)
    }

    /// Destroys a proxy, releasing its guest reference.
    ///
    /// A proxy created by another bridge is handed back untouched; it must be
    /// released by its owner.
    pub fn release_proxy(&mut self, proxy: ProxyObject) -> Option<ProxyObject> {
        if self.check_owner(Operation::Release, &proxy).is_err() {
            return Some(proxy);
        }
        self.tracer.on_proxy_released(proxy.id());
        self.live_proxies -= 1;
        proxy.into_object().drop_with_heap(self.runtime.heap_mut());
        None
    }

    /// Releases every proxy contained in a host value.
    ///
    /// Proxies created by another bridge are collected and handed back.
    pub fn release(&mut self, value: HostValue) -> Vec<ProxyObject> {
        let mut foreign = Vec::new();
        self.release_into(value, &mut foreign);
        foreign
    }

    fn release_into(&mut self, value: HostValue, foreign: &mut Vec<ProxyObject>) {
        match value {
            HostValue::Proxy(proxy) => foreign.extend(self.release_proxy(proxy)),
            HostValue::List(items) => {
                for item in items {
                    self.release_into(item, foreign);
                }
            }
            HostValue::Map(map) => {
                for (_, item) in map {
                    self.release_into(item, foreign);
                }
            }
            HostValue::Null
            | HostValue::Bool(_)
            | HostValue::Int(_)
            | HostValue::Float(_)
            | HostValue::String(_)
            | HostValue::Resource(_) => {}
        }
    }

    /// Instantiates `module.class` with the remaining arguments.
    ///
    /// `args` follows the host calling convention: module name, class name, then
    /// the constructor arguments.
    pub fn construct(&mut self, args: &[HostValue]) -> Result<ProxyObject, BridgeError> {
        self.tracer.on_dispatch(Operation::Construct, None);
        let result = self.construct_inner(args);
        self.report(Operation::Construct, result)
    }

    fn construct_inner(&mut self, args: &[HostValue]) -> Result<ProxyObject, BridgeError> {
        let (module_name, class_name) = entry_names(args)?;
        let this = self;
        let module = this.import_value(&module_name, Operation::Construct)?;
        defer_drop!(module, this);
        let Some(class) = this.runtime.lookup(module, &class_name) else {
            return Err(BridgeError::UndefinedName {
                module: module_name,
                name: class_name,
            });
        };
        defer_drop!(class, this);
        let packed = this.pack_args(args, ENTRY_NAME_ARGS)?;
        match this.runtime.call(class, packed) {
            Ok(object) => Ok(this.proxy(object)),
            Err(_) => Err(BridgeError::Construct {
                module: module_name,
                class: class_name,
                cause: this.guest_error(Operation::Construct),
            }),
        }
    }

    /// Calls `module.function` with the remaining arguments and converts the result.
    pub fn call(&mut self, args: &[HostValue]) -> Result<HostValue, BridgeError> {
        self.tracer.on_dispatch(Operation::Call, None);
        let result = self.call_inner(args);
        self.report(Operation::Call, result)
    }

    fn call_inner(&mut self, args: &[HostValue]) -> Result<HostValue, BridgeError> {
        let (module_name, function_name) = entry_names(args)?;
        let this = self;
        let module = this.import_value(&module_name, Operation::Call)?;
        defer_drop!(module, this);
        let Some(function) = this.runtime.lookup(module, &function_name) else {
            return Err(BridgeError::UndefinedName {
                module: module_name,
                name: function_name,
            });
        };
        defer_drop!(function, this);
        let packed = this.pack_args(args, ENTRY_NAME_ARGS)?;
        match this.runtime.call(function, packed) {
            Ok(result) => {
                defer_drop!(result, this);
                Ok(this.to_host(result))
            }
            Err(_) => Err(BridgeError::Call {
                module: module_name,
                function: function_name,
                cause: this.guest_error(Operation::Call),
            }),
        }
    }

    /// Imports a module and hands it to the host as a proxy.
    pub fn import(&mut self, module: &str) -> Result<ProxyObject, BridgeError> {
        self.tracer.on_dispatch(Operation::Import, None);
        let result = self
            .import_value(module, Operation::Import)
            .map(|value| self.proxy(value));
        self.report(Operation::Import, result)
    }

    fn import_value(&mut self, module: &str, op: Operation) -> Result<Value, BridgeError> {
        self.runtime.import_module(module).map_err(|_| BridgeError::Import {
            module: module.to_owned(),
            cause: self.guest_error(op),
        })
    }

    /// Shuts the interpreter down and returns the statistics of whatever guest
    /// objects are still alive. Proxies still held by the host keep theirs.
    pub fn finalize(self) -> HeapStats {
        self.runtime.finalize()
    }

    /// Drains the pending guest exception through the error bridge.
    ///
    /// A pending exception that cannot be stringified is traced and dropped.
    pub(crate) fn guest_error(&mut self, op: Operation) -> Option<GuestError> {
        let pending = self.runtime.err_occurred();
        let error = fetch_error(&mut self.runtime);
        if pending && error.is_none() {
            self.tracer.on_error_swallowed(op);
        }
        error
    }

    /// Releases a host value nobody can take back. Foreign proxies in it keep
    /// their reference alive in the bridge that owns them.
    pub(crate) fn discard(&mut self, value: HostValue) {
        for proxy in self.release(value) {
            proxy.into_object().transfer_ownership();
        }
    }

    /// Fails with [`BridgeError::ForeignProxy`] unless this bridge created `proxy`.
    pub(crate) fn check_owner(&mut self, op: Operation, proxy: &ProxyObject) -> Result<(), BridgeError> {
        if self.owns(proxy) {
            return Ok(());
        }
        self.tracer.on_foreign_proxy(op, proxy.id());
        Err(BridgeError::ForeignProxy { id: proxy.id() })
    }

    /// Traces the diagnostic of a failed operation.
    pub(crate) fn report<T>(&mut self, op: Operation, result: Result<T, BridgeError>) -> Result<T, BridgeError> {
        if let Err(err) = &result {
            self.tracer.on_diagnostic(op, err);
        }
        result
    }
}

impl<Tr: BridgeTracer> ContainsHeap for Bridge<Tr> {
    #[inline]
    fn heap_mut(&mut self) -> &mut Heap {
        self.runtime.heap_mut()
    }
}

/// Extracts the module and member names leading an entry-point argument list.
fn entry_names(args: &[HostValue]) -> Result<(String, String), BridgeError> {
    let [module, member, ..] = args else {
        return Err(BridgeError::MissingArguments {
            expected: ENTRY_NAME_ARGS,
            given: args.len(),
        });
    };
    let name = |position: usize, value: &HostValue| {
        value.to_key_string().ok_or(BridgeError::InvalidArgument {
            position,
            expected: "string",
        })
    };
    Ok((name(0, module)?, name(1, member)?))
}
