//! The dispatch table: host object-model operations on proxied guest values.
//!
//! [`ObjectHandlers`] is the handler contract a host object system wires its
//! dynamic operations into. [`Bridge`] implements it for [`ProxyObject`]; each
//! operation is one stateless request against the proxy's guest reference.
//!
//! Reads and existence checks degrade to `None` / `false`; writes and deletions
//! return a [`BridgeError`]. No guest exception is left pending after any
//! operation returns. A proxy created by another bridge is treated the same way:
//! reads miss and everything else fails with [`BridgeError::ForeignProxy`].

mod attr;
mod identity;
mod item;
mod method;

use std::cmp::Ordering;

use strum::{Display, IntoStaticStr};

use crate::{
    bridge::Bridge,
    error::BridgeError,
    object::{HostMap, HostValue},
    proxy::{PROXY_CLASS_NAME, ProxyObject},
    tracer::{BridgeTracer, Operation},
};

/// Target kind of a host cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum CastKind {
    String,
    Bool,
    Int,
    Float,
    Array,
    Null,
}

/// Guest item-access capability an item operation may go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Protocol {
    /// Indexed access with an integer key.
    Sequence,
    /// Keyed access with the string form of the key.
    Mapping,
}

/// Order in which item operations probe the guest protocols.
pub const ITEM_PROBES: [Protocol; 2] = [Protocol::Sequence, Protocol::Mapping];

/// A method found by [`ObjectHandlers::get_method`], valid for exactly one call.
///
/// It only names the method: [`ObjectHandlers::call_method`] takes it by value
/// and looks the method up again, so a descriptor can neither be cached nor
/// outlive its call.
#[derive(Debug, PartialEq, Eq)]
pub struct MethodDescriptor {
    name: String,
    arg_names: Vec<String>,
    owner: String,
}

impl MethodDescriptor {
    pub(crate) fn new(name: String, arg_names: Vec<String>, owner: String) -> Self {
        Self { name, arg_names, owner }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter names, excluding the bound receiver.
    #[must_use]
    pub fn arg_names(&self) -> &[String] {
        &self.arg_names
    }

    /// Arity hint: the number of declared parameters.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.arg_names.len()
    }

    /// Guest type name of the object the method was found on.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }
}

/// Dynamic-object handler contract of the host runtime.
pub trait ObjectHandlers {
    /// `$obj->name`: the converted attribute, or `None` if it does not exist.
    fn read_property(&mut self, object: &ProxyObject, name: &str) -> Option<HostValue>;

    /// `$obj->name = value`. A value without a guest form is silently ignored.
    fn write_property(&mut self, object: &ProxyObject, name: &str, value: &HostValue) -> Result<(), BridgeError>;

    /// `isset($obj->name)`, or `!empty($obj->name)` when `check_truthy` is set.
    /// Truthiness is the guest's.
    fn has_property(&mut self, object: &ProxyObject, name: &str, check_truthy: bool) -> bool;

    /// `unset($obj->name)`.
    fn unset_property(&mut self, object: &ProxyObject, name: &str) -> Result<(), BridgeError>;

    /// `$obj[key]`, probing [`ITEM_PROBES`] in order.
    fn read_dimension(&mut self, object: &ProxyObject, key: &HostValue) -> Option<HostValue>;

    /// `$obj[key] = value`.
    fn write_dimension(&mut self, object: &ProxyObject, key: &HostValue, value: &HostValue)
    -> Result<(), BridgeError>;

    /// `isset($obj[key])`, or `!empty($obj[key])` when `check_truthy` is set.
    fn has_dimension(&mut self, object: &ProxyObject, key: &HostValue, check_truthy: bool) -> bool;

    /// `unset($obj[key])`.
    fn unset_dimension(&mut self, object: &ProxyObject, key: &HostValue) -> Result<(), BridgeError>;

    /// The object's attribute dictionary, empty when it has none.
    fn properties(&mut self, object: &ProxyObject) -> HostMap;

    /// Finds a bound, callable method.
    fn get_method(&mut self, object: &ProxyObject, name: &str) -> Option<MethodDescriptor>;

    /// Calls a method found by [`get_method`](Self::get_method), consuming its descriptor.
    fn call_method(
        &mut self,
        object: &ProxyObject,
        method: MethodDescriptor,
        args: &[HostValue],
    ) -> Result<HostValue, BridgeError>;

    /// `get_class($obj)`, or the parent class name when `parent` is set.
    fn class_name(&mut self, object: &ProxyObject, parent: bool) -> String;

    /// Three-way comparison, delegated to the guest.
    fn compare(&mut self, a: &ProxyObject, b: &ProxyObject) -> Result<Ordering, BridgeError>;

    /// `(string) $obj`. Other cast kinds are unsupported.
    fn cast(&mut self, object: &ProxyObject, kind: CastKind) -> Result<HostValue, BridgeError>;

    /// `count($obj)`. `None` when the object has no length.
    fn count(&mut self, object: &ProxyObject) -> Option<usize>;

    /// `$obj->name(...args)` as one step: lookup, call and descriptor release.
    fn invoke(&mut self, object: &ProxyObject, name: &str, args: &[HostValue]) -> Result<HostValue, BridgeError> {
        let Some(method) = self.get_method(object, name) else {
            return Err(BridgeError::MethodUnavailable { name: name.to_owned() });
        };
        self.call_method(object, method, args)
    }
}

impl<Tr: BridgeTracer> ObjectHandlers for Bridge<Tr> {
    fn read_property(&mut self, object: &ProxyObject, name: &str) -> Option<HostValue> {
        self.tracer.on_dispatch(Operation::ReadProperty, Some(object.id()));
        self.check_owner(Operation::ReadProperty, object).ok()?;
        self.get_attribute(object, name)
    }

    fn write_property(&mut self, object: &ProxyObject, name: &str, value: &HostValue) -> Result<(), BridgeError> {
        self.tracer.on_dispatch(Operation::WriteProperty, Some(object.id()));
        let result = self
            .check_owner(Operation::WriteProperty, object)
            .and_then(|()| self.set_attribute(object, name, value));
        self.report(Operation::WriteProperty, result)
    }

    fn has_property(&mut self, object: &ProxyObject, name: &str, check_truthy: bool) -> bool {
        self.tracer.on_dispatch(Operation::HasProperty, Some(object.id()));
        self.check_owner(Operation::HasProperty, object).is_ok() && self.attribute_exists(object, name, check_truthy)
    }

    fn unset_property(&mut self, object: &ProxyObject, name: &str) -> Result<(), BridgeError> {
        self.tracer.on_dispatch(Operation::UnsetProperty, Some(object.id()));
        let result = self
            .check_owner(Operation::UnsetProperty, object)
            .and_then(|()| self.delete_attribute(object, name));
        self.report(Operation::UnsetProperty, result)
    }

    fn read_dimension(&mut self, object: &ProxyObject, key: &HostValue) -> Option<HostValue> {
        self.tracer.on_dispatch(Operation::ReadDimension, Some(object.id()));
        self.check_owner(Operation::ReadDimension, object).ok()?;
        self.get_item(object, key)
    }

    fn write_dimension(
        &mut self,
        object: &ProxyObject,
        key: &HostValue,
        value: &HostValue,
    ) -> Result<(), BridgeError> {
        self.tracer.on_dispatch(Operation::WriteDimension, Some(object.id()));
        let result = self
            .check_owner(Operation::WriteDimension, object)
            .and_then(|()| self.set_item(object, key, value));
        self.report(Operation::WriteDimension, result)
    }

    fn has_dimension(&mut self, object: &ProxyObject, key: &HostValue, check_truthy: bool) -> bool {
        self.tracer.on_dispatch(Operation::HasDimension, Some(object.id()));
        self.check_owner(Operation::HasDimension, object).is_ok() && self.item_exists(object, key, check_truthy)
    }

    fn unset_dimension(&mut self, object: &ProxyObject, key: &HostValue) -> Result<(), BridgeError> {
        self.tracer.on_dispatch(Operation::UnsetDimension, Some(object.id()));
        let result = self
            .check_owner(Operation::UnsetDimension, object)
            .and_then(|()| self.delete_item(object, key));
        self.report(Operation::UnsetDimension, result)
    }

    fn properties(&mut self, object: &ProxyObject) -> HostMap {
        self.tracer.on_dispatch(Operation::Properties, Some(object.id()));
        if self.check_owner(Operation::Properties, object).is_err() {
            return HostMap::new();
        }
        self.attribute_dict(object)
    }

    fn get_method(&mut self, object: &ProxyObject, name: &str) -> Option<MethodDescriptor> {
        self.tracer.on_dispatch(Operation::GetMethod, Some(object.id()));
        self.check_owner(Operation::GetMethod, object).ok()?;
        self.lookup_method(object, name)
    }

    fn call_method(
        &mut self,
        object: &ProxyObject,
        method: MethodDescriptor,
        args: &[HostValue],
    ) -> Result<HostValue, BridgeError> {
        self.tracer.on_dispatch(Operation::CallMethod, Some(object.id()));
        let result = self
            .check_owner(Operation::CallMethod, object)
            .and_then(|()| self.call_descriptor(object, method, args));
        self.report_call(Operation::CallMethod, result)
    }

    fn class_name(&mut self, object: &ProxyObject, parent: bool) -> String {
        self.tracer.on_dispatch(Operation::ClassName, Some(object.id()));
        if self.check_owner(Operation::ClassName, object).is_err() {
            return PROXY_CLASS_NAME.to_owned();
        }
        self.class_name_of(object, parent)
    }

    fn compare(&mut self, a: &ProxyObject, b: &ProxyObject) -> Result<Ordering, BridgeError> {
        self.tracer.on_dispatch(Operation::Compare, Some(a.id()));
        let result = self
            .check_owner(Operation::Compare, a)
            .and_then(|()| self.check_owner(Operation::Compare, b))
            .and_then(|()| self.compare_objects(a, b));
        self.report(Operation::Compare, result)
    }

    fn cast(&mut self, object: &ProxyObject, kind: CastKind) -> Result<HostValue, BridgeError> {
        self.tracer.on_dispatch(Operation::Cast, Some(object.id()));
        let result = self
            .check_owner(Operation::Cast, object)
            .and_then(|()| self.cast_object(object, kind));
        match result {
            // unsupported kinds fail quietly
            Err(err @ BridgeError::UnsupportedCast(_)) => {
                self.tracer.on_conversion_miss(Operation::Cast);
                Err(err)
            }
            result => self.report(Operation::Cast, result),
        }
    }

    fn count(&mut self, object: &ProxyObject) -> Option<usize> {
        self.tracer.on_dispatch(Operation::Count, Some(object.id()));
        self.check_owner(Operation::Count, object).ok()?;
        self.count_elements(object)
    }

    fn invoke(&mut self, object: &ProxyObject, name: &str, args: &[HostValue]) -> Result<HostValue, BridgeError> {
        self.tracer.on_dispatch(Operation::Invoke, Some(object.id()));
        let result = self.check_owner(Operation::Invoke, object).and_then(|()| {
            match self.lookup_method(object, name) {
                Some(method) => self.call_descriptor(object, method, args),
                None => Err(BridgeError::MethodUnavailable { name: name.to_owned() }),
            }
        });
        self.report_call(Operation::Invoke, result)
    }
}

impl<Tr: BridgeTracer> Bridge<Tr> {
    /// Reports a failed method call. A missing method fails quietly, like a read.
    fn report_call(
        &mut self,
        op: Operation,
        result: Result<HostValue, BridgeError>,
    ) -> Result<HostValue, BridgeError> {
        match result {
            Err(BridgeError::MethodUnavailable { name }) => {
                self.tracer.on_method_unavailable(op, &name);
                Err(BridgeError::MethodUnavailable { name })
            }
            result => self.report(op, result),
        }
    }
}
