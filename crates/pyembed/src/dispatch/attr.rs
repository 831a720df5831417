//! Attribute operations: read, write, existence, deletion and enumeration.

use crate::{
    bridge::Bridge,
    defer_drop,
    error::BridgeError,
    heap::DropWithHeap,
    object::{HostMap, HostValue},
    proxy::ProxyObject,
    tracer::{BridgeTracer, Operation},
};

impl<Tr: BridgeTracer> Bridge<Tr> {
    pub(super) fn get_attribute(&mut self, proxy: &ProxyObject, name: &str) -> Option<HostValue> {
        match self.runtime.getattr(proxy.object(), name) {
            Ok(value) => {
                let this = self;
                defer_drop!(value, this);
                Some(this.to_host(value))
            }
            Err(_) => {
                self.runtime.clear_error();
                None
            }
        }
    }

    pub(super) fn set_attribute(&mut self, proxy: &ProxyObject, name: &str, value: &HostValue) -> Result<(), BridgeError> {
        let Some(value) = self.to_guest(value) else {
            self.tracer.on_conversion_miss(Operation::WriteProperty);
            return Ok(());
        };
        self.runtime
            .setattr(proxy.object(), name, value)
            .map_err(|_| BridgeError::SetAttribute {
                name: name.to_owned(),
                cause: self.guest_error(Operation::WriteProperty),
            })
    }

    pub(super) fn attribute_exists(&mut self, proxy: &ProxyObject, name: &str, check_truthy: bool) -> bool {
        if !check_truthy {
            return self.runtime.hasattr(proxy.object(), name);
        }
        let Ok(value) = self.runtime.getattr(proxy.object(), name) else {
            self.runtime.clear_error();
            return false;
        };
        let truth = self.runtime.is_true(&value);
        value.drop_with_heap(self.runtime.heap_mut());
        truth.unwrap_or_else(|_| {
            self.runtime.clear_error();
            false
        })
    }

    pub(super) fn delete_attribute(&mut self, proxy: &ProxyObject, name: &str) -> Result<(), BridgeError> {
        self.runtime
            .delattr(proxy.object(), name)
            .map_err(|_| BridgeError::DeleteAttribute {
                name: name.to_owned(),
                cause: self.guest_error(Operation::UnsetProperty),
            })
    }

    /// The attribute dictionary, or the items of a mapping without one.
    pub(super) fn attribute_dict(&mut self, proxy: &ProxyObject) -> HostMap {
        let mut properties = HostMap::new();
        let unpacked = match self.runtime.getattr(proxy.object(), "__dict__") {
            Ok(dict) => {
                let this = &mut *self;
                defer_drop!(dict, this);
                this.unpack_mapping(dict, &mut properties)
            }
            Err(_) => {
                self.runtime.clear_error();
                if !self.runtime.is_mapping(proxy.object()) {
                    return properties;
                }
                self.unpack_mapping(proxy.object(), &mut properties)
            }
        };
        if unpacked.is_err() {
            self.tracer.on_conversion_miss(Operation::Properties);
        }
        properties
    }
}
