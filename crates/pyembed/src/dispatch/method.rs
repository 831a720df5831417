//! Method lookup and invocation through ephemeral descriptors.

use super::MethodDescriptor;
use crate::{
    bridge::Bridge,
    defer_drop,
    error::BridgeError,
    heap::DropWithHeap,
    object::HostValue,
    proxy::ProxyObject,
    tracer::{BridgeTracer, Operation},
    value::Value,
};

impl<Tr: BridgeTracer> Bridge<Tr> {
    /// Describes `name` if it is a bound, callable method of the proxied object.
    pub(super) fn lookup_method(&mut self, proxy: &ProxyObject, name: &str) -> Option<MethodDescriptor> {
        let method = self.bound_method(proxy, name)?;
        let arg_names = self.runtime.parameters(&method).unwrap_or_default();
        method.drop_with_heap(self.runtime.heap_mut());
        let owner = self.runtime.type_name(proxy.object());
        Some(MethodDescriptor::new(name.to_owned(), arg_names, owner))
    }

    /// Calls the method a descriptor names, looking it up again first.
    ///
    /// The descriptor is consumed whatever the outcome.
    pub(super) fn call_descriptor(
        &mut self,
        proxy: &ProxyObject,
        descriptor: MethodDescriptor,
        args: &[HostValue],
    ) -> Result<HostValue, BridgeError> {
        let name = descriptor.name;
        let Some(method) = self.bound_method(proxy, &name) else {
            return Err(BridgeError::MethodUnavailable { name });
        };
        let this = self;
        defer_drop!(method, this);
        let packed = this.pack_args(args, 0)?;
        match this.runtime.call(method, packed) {
            Ok(result) => {
                defer_drop!(result, this);
                Ok(this.to_host(result))
            }
            Err(_) => Err(BridgeError::CallMethod {
                cause: this.guest_error(Operation::CallMethod),
                name,
            }),
        }
    }

    /// Fetches `name` and keeps it only if it is a callable bound method.
    fn bound_method(&mut self, proxy: &ProxyObject, name: &str) -> Option<Value> {
        let Ok(value) = self.runtime.getattr(proxy.object(), name) else {
            self.runtime.clear_error();
            return None;
        };
        if self.runtime.is_method(&value) && self.runtime.is_callable(&value) {
            Some(value)
        } else {
            value.drop_with_heap(self.runtime.heap_mut());
            None
        }
    }
}
