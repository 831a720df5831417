//! Value marshaling between host values and guest references.
//!
//! - [`Bridge::to_guest`]: host value to a new guest reference
//! - [`Bridge::to_host`]: guest reference to a host value, proxying whatever has no
//!   native host form
//! - [`Bridge::pack_args`]: host argument list to a guest call tuple
//! - [`Bridge::unpack_mapping`]: guest mapping into a host map
//!
//! Container conversion is bounded by `ResourceLimits::max_data_depth`. Guest
//! containers nested deeper are proxied instead of flattened; host containers
//! nested deeper fail to convert.

use crate::{
    bridge::Bridge,
    error::BridgeError,
    heap::{DropWithHeap, HeapData, HeapGuard},
    object::{HostMap, HostValue},
    tracer::BridgeTracer,
    value::Value,
};

/// A mapping unpack stopped before the end.
///
/// Entries converted before the failure stay in the destination map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("mapping unpack stopped after {converted} entries")]
pub struct UnpackError {
    pub converted: usize,
}

/// Guest container contents detached from the heap borrow.
enum Flat {
    Items(Vec<Value>),
    Pairs(Vec<(Value, Value)>),
    Opaque,
}

impl<Tr: BridgeTracer> Bridge<Tr> {
    /// Converts a host value into a new guest reference.
    ///
    /// Returns `None` when the value, or anything inside it, has no guest form.
    /// A proxy created by another bridge has none.
    /// Nothing is raised: callers decide what a failed conversion means.
    pub fn to_guest(&mut self, value: &HostValue) -> Option<Value> {
        self.to_guest_at(value, 0)
    }

    fn to_guest_at(&mut self, value: &HostValue, depth: usize) -> Option<Value> {
        let converted = match value {
            HostValue::Null => Ok(Value::None),
            HostValue::Bool(b) => Ok(Value::Bool(*b)),
            HostValue::Int(i) => Ok(Value::Int(*i)),
            HostValue::Float(f) => Ok(Value::Float(*f)),
            HostValue::String(s) => self.runtime.new_str(s.as_str()),
            HostValue::List(items) => {
                if depth >= self.runtime.limits().data_depth() {
                    return None;
                }
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    let Some(converted) = self.to_guest_at(item, depth + 1) else {
                        out.drop_with_heap(self.runtime.heap_mut());
                        return None;
                    };
                    out.push(converted);
                }
                self.runtime.new_list(out)
            }
            HostValue::Map(map) => return self.map_to_guest(map, depth),
            HostValue::Resource(_) => return None,
            HostValue::Proxy(proxy) if self.owns(proxy) => Ok(proxy.object().clone_with_heap(self.runtime.heap())),
            HostValue::Proxy(_) => return None,
        };
        match converted {
            Ok(value) => Some(value),
            Err(_) => {
                self.runtime.clear_error();
                None
            }
        }
    }

    fn map_to_guest(&mut self, map: &HostMap, depth: usize) -> Option<Value> {
        if depth >= self.runtime.limits().data_depth() {
            return None;
        }
        let Ok(dict) = self.runtime.new_dict() else {
            self.runtime.clear_error();
            return None;
        };
        let mut guard = HeapGuard::new(dict, self);
        for (key, item) in map {
            let (dict, this) = guard.as_parts();
            let item = this.to_guest_at(item, depth + 1)?;
            if this.runtime.mapping_set_item(dict, key, item).is_err() {
                this.runtime.clear_error();
                return None;
            }
        }
        Some(guard.into_inner())
    }

    /// Converts a guest reference into a host value. The reference stays owned
    /// by the caller.
    ///
    /// Strings and scalars convert directly; lists and tuples become host lists;
    /// dicts become host maps keyed by the guest `str()` of each key. Anything
    /// else becomes a new proxy holding its own reference.
    pub fn to_host(&mut self, value: &Value) -> HostValue {
        self.to_host_at(value, 0)
    }

    fn to_host_at(&mut self, value: &Value, depth: usize) -> HostValue {
        let id = match value {
            Value::None => return HostValue::Null,
            Value::Bool(b) => return HostValue::Bool(*b),
            Value::Int(i) => return HostValue::Int(*i),
            Value::Float(f) => return HostValue::Float(*f),
            Value::Type(_) | Value::ExcType(_) => {
                let object = value.clone_with_heap(self.runtime.heap());
                return HostValue::Proxy(self.proxy(object));
            }
            Value::Ref(id) => *id,
            #[cfg(feature = "ref-count-panic")]
            Value::Dereferenced => panic!("Cannot convert Dereferenced object"),
        };
        let nested = depth < self.runtime.limits().data_depth();
        let heap = self.runtime.heap();
        let flat = match heap.get(id) {
            HeapData::Str(s) => return HostValue::String(s.clone()),
            HeapData::List(items) | HeapData::Tuple(items) if nested => {
                Flat::Items(items.iter().map(|v| v.clone_with_heap(heap)).collect())
            }
            HeapData::Dict(dict) if nested => Flat::Pairs(
                dict.iter()
                    .map(|(k, v)| (k.clone_with_heap(heap), v.clone_with_heap(heap)))
                    .collect(),
            ),
            _ => Flat::Opaque,
        };
        match flat {
            Flat::Items(items) => {
                let out: Vec<HostValue> = items.iter().map(|item| self.to_host_at(item, depth + 1)).collect();
                items.drop_with_heap(self.runtime.heap_mut());
                HostValue::List(out)
            }
            Flat::Pairs(pairs) => {
                let mut map = HostMap::with_capacity(pairs.len());
                for (key, item) in pairs {
                    let entry = self.key_string(&key).map(|k| (k, self.to_host_at(&item, depth + 1)));
                    key.drop_with_heap(self.runtime.heap_mut());
                    item.drop_with_heap(self.runtime.heap_mut());
                    if let Some((key, host)) = entry
                        && let Some(replaced) = map.insert(key, host)
                    {
                        self.discard(replaced);
                    }
                }
                HostValue::Map(map)
            }
            Flat::Opaque => {
                let object = value.clone_with_heap(self.runtime.heap());
                HostValue::Proxy(self.proxy(object))
            }
        }
    }

    /// Host key for a guest mapping key: strings verbatim, anything else via
    /// guest `str()`. `None` if stringification raises.
    fn key_string(&mut self, key: &Value) -> Option<String> {
        if let Some(s) = key.as_str(self.runtime.heap()) {
            return Some(s.to_owned());
        }
        match self.runtime.str_string(key) {
            Ok(s) => Some(s),
            Err(_) => {
                self.runtime.clear_error();
                None
            }
        }
    }

    /// Packs `args[skip..]` into a new guest tuple.
    ///
    /// Returns `Ok(None)` when nothing is left after skipping: "no arguments" is
    /// distinct from an empty tuple. Fails on the first argument without a guest
    /// form, releasing everything converted so far.
    pub fn pack_args(&mut self, args: &[HostValue], skip: usize) -> Result<Option<Value>, BridgeError> {
        if args.len() < skip {
            return Err(BridgeError::MissingArguments {
                expected: skip,
                given: args.len(),
            });
        }
        if args.len() == skip {
            return Ok(None);
        }
        let mut items = Vec::with_capacity(args.len() - skip);
        for (position, arg) in args.iter().enumerate().skip(skip) {
            let Some(item) = self.to_guest(arg) else {
                items.drop_with_heap(self.runtime.heap_mut());
                return Err(BridgeError::ArgumentConversion { position });
            };
            items.push(item);
        }
        match self.runtime.new_tuple(items) {
            Ok(tuple) => Ok(Some(tuple)),
            Err(_) => {
                self.runtime.clear_error();
                Err(BridgeError::ArgumentConversion { position: skip })
            }
        }
    }

    /// Converts every `(key, value)` pair of a guest mapping into `dest`.
    ///
    /// Keys become strings (guest `str()` for non-string keys), values go through
    /// [`Bridge::to_host`]; an existing entry under the same key is replaced and
    /// released. Stops at the first pair whose key cannot be stringified, or
    /// immediately if `mapping` is not a mapping. Returns the number of entries
    /// converted.
    pub fn unpack_mapping(&mut self, mapping: &Value, dest: &mut HostMap) -> Result<usize, UnpackError> {
        let Ok(pairs) = self.runtime.mapping_items(mapping) else {
            self.runtime.clear_error();
            return Err(UnpackError { converted: 0 });
        };
        let mut converted = 0;
        let mut pairs = pairs.into_iter();
        while let Some((key, item)) = pairs.next() {
            let Some(name) = self.key_string(&key) else {
                key.drop_with_heap(self.runtime.heap_mut());
                item.drop_with_heap(self.runtime.heap_mut());
                pairs.drop_with_heap(self.runtime.heap_mut());
                return Err(UnpackError { converted });
            };
            let host = self.to_host(&item);
            key.drop_with_heap(self.runtime.heap_mut());
            item.drop_with_heap(self.runtime.heap_mut());
            if let Some(replaced) = dest.insert(name, host) {
                self.discard(replaced);
            }
            converted += 1;
        }
        Ok(converted)
    }
}
