//! Item operations, dispatched across the [`ITEM_PROBES`] in order.
//!
//! Integer keys try the sequence protocol first; the mapping protocol then takes
//! the key's string form. A probe that does not apply, or applies and misses,
//! hands over to the next one. Mutations stop at the first applicable probe,
//! deletions at the first one that succeeds.

use super::{ITEM_PROBES, Protocol};
use crate::{
    bridge::Bridge,
    error::{BridgeError, GuestError},
    heap::DropWithHeap,
    object::HostValue,
    proxy::ProxyObject,
    runtime::Runtime,
    tracer::{BridgeTracer, Operation},
    value::Value,
};

impl Protocol {
    /// Whether the guest object offers this protocol for `key`.
    ///
    /// The sequence protocol needs an integer key; for writes it also needs a
    /// mutable sequence.
    fn applies(self, rt: &Runtime, object: &Value, key: &HostValue, write: bool) -> bool {
        match self {
            Self::Sequence => {
                matches!(key, HostValue::Int(_))
                    && if write {
                        rt.is_mutable_sequence(object)
                    } else {
                        rt.is_sequence(object)
                    }
            }
            Self::Mapping => rt.is_mapping(object),
        }
    }
}

impl<Tr: BridgeTracer> Bridge<Tr> {
    pub(super) fn get_item(&mut self, proxy: &ProxyObject, key: &HostValue) -> Option<HostValue> {
        let item = self.probe_item(Operation::ReadDimension, proxy, key)?;
        let host = self.to_host(&item);
        item.drop_with_heap(self.runtime.heap_mut());
        Some(host)
    }

    pub(super) fn item_exists(&mut self, proxy: &ProxyObject, key: &HostValue, check_truthy: bool) -> bool {
        let Some(item) = self.probe_item(Operation::HasDimension, proxy, key) else {
            return false;
        };
        let exists = !check_truthy
            || self.runtime.is_true(&item).unwrap_or_else(|_| {
                self.runtime.clear_error();
                false
            });
        item.drop_with_heap(self.runtime.heap_mut());
        exists
    }

    /// Reads `key` through the first protocol that finds it.
    fn probe_item(&mut self, op: Operation, proxy: &ProxyObject, key: &HostValue) -> Option<Value> {
        let object = proxy.object();
        for protocol in ITEM_PROBES {
            let found = if protocol.applies(&self.runtime, object, key, false) {
                match (protocol, key) {
                    (Protocol::Sequence, HostValue::Int(index)) => self.runtime.seq_get_item(object, *index).ok(),
                    _ => match self.mapping_key(key) {
                        Some(name) => self.runtime.mapping_get_item(object, &name).ok(),
                        None => None,
                    },
                }
            } else {
                None
            };
            if found.is_some() {
                return found;
            }
            self.runtime.clear_error();
            self.tracer.on_probe_miss(op, protocol);
        }
        None
    }

    pub(super) fn set_item(&mut self, proxy: &ProxyObject, key: &HostValue, value: &HostValue) -> Result<(), BridgeError> {
        let object = proxy.object();
        let Some(protocol) = ITEM_PROBES.into_iter().find(|protocol| {
            let applies = protocol.applies(&self.runtime, object, key, true);
            if !applies {
                self.tracer.on_probe_miss(Operation::WriteDimension, *protocol);
            }
            applies
        }) else {
            return Err(BridgeError::NoItemProtocol {
                key: display_key(key),
            });
        };
        let Some(value) = self.to_guest(value) else {
            self.tracer.on_conversion_miss(Operation::WriteDimension);
            return Ok(());
        };
        match (protocol, key) {
            (Protocol::Sequence, HostValue::Int(index)) => {
                self.runtime
                    .seq_set_item(object, *index, value)
                    .map_err(|_| BridgeError::SetSequenceItem {
                        index: *index,
                        cause: self.guest_error(Operation::WriteDimension),
                    })
            }
            _ => {
                let Some(name) = self.mapping_key(key) else {
                    value.drop_with_heap(self.runtime.heap_mut());
                    return Err(BridgeError::SetMappingItem {
                        key: display_key(key),
                        cause: None,
                    });
                };
                self.runtime
                    .mapping_set_item(object, &name, value)
                    .map_err(|_| BridgeError::SetMappingItem {
                        key: name,
                        cause: self.guest_error(Operation::WriteDimension),
                    })
            }
        }
    }

    /// Deletes `key` through the first protocol that succeeds.
    ///
    /// Fails once, with the last guest error, when no protocol deletes it.
    pub(super) fn delete_item(&mut self, proxy: &ProxyObject, key: &HostValue) -> Result<(), BridgeError> {
        let object = proxy.object();
        let mut cause: Option<GuestError> = None;
        for protocol in ITEM_PROBES {
            if !protocol.applies(&self.runtime, object, key, false) {
                self.tracer.on_probe_miss(Operation::UnsetDimension, protocol);
                continue;
            }
            let deleted = match (protocol, key) {
                (Protocol::Sequence, HostValue::Int(index)) => self.runtime.seq_del_item(object, *index),
                _ => match self.mapping_key(key) {
                    Some(name) => self.runtime.mapping_del_item(object, &name),
                    None => {
                        self.tracer.on_probe_miss(Operation::UnsetDimension, protocol);
                        continue;
                    }
                },
            };
            if deleted.is_ok() {
                return Ok(());
            }
            cause = self.guest_error(Operation::UnsetDimension);
            self.tracer.on_probe_miss(Operation::UnsetDimension, protocol);
        }
        Err(BridgeError::DeleteItem { cause })
    }

    /// String form of a key for the mapping protocol. Proxy keys are stringified
    /// by the guest; a foreign proxy key has no string form.
    fn mapping_key(&mut self, key: &HostValue) -> Option<String> {
        match key {
            HostValue::Proxy(proxy) if !self.owns(proxy) => None,
            HostValue::Proxy(proxy) => match self.runtime.str_string(proxy.object()) {
                Ok(name) => Some(name),
                Err(_) => {
                    self.runtime.clear_error();
                    None
                }
            },
            other => other.to_key_string(),
        }
    }
}

/// Key text for diagnostics: the key string, or the host type for keys without one.
fn display_key(key: &HostValue) -> String {
    key.to_key_string().unwrap_or_else(|| key.type_name().to_owned())
}
