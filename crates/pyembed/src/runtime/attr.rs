//! Attribute protocol: `getattr`, `setattr`, `delattr`, `hasattr`.

use super::Runtime;
use crate::{
    exception::{ExcType, RunError, RunResult},
    heap::{HeapData, HeapId},
    types::{BoundMethod, Type},
    value::Value,
};

/// Owned summary of the object an attribute lookup fell through to, so the
/// heap borrow ends before any allocation.
enum Owner {
    Instance { class: HeapId },
    Class { name: String, module: String },
    Module { name: String },
    Function { name: String, module: String },
    Method {
        id: HeapId,
        func: HeapId,
        name: String,
        module: String,
    },
    TypeObject(String),
    Builtin(Type),
}

impl Runtime {
    /// The namespace dict of instances, classes and modules.
    pub(crate) fn namespace_id(&self, obj: &Value) -> Option<HeapId> {
        let Value::Ref(id) = obj else { return None };
        match self.heap.get(*id) {
            HeapData::Instance(inst) => Some(inst.dict_id()),
            HeapData::Class(class) => Some(class.dict_id()),
            HeapData::Module(module) => Some(module.dict_id()),
            _ => None,
        }
    }

    /// Looks `name` up in the object's own namespace without raising.
    ///
    /// Used for module globals, where a miss is not a guest error.
    #[must_use]
    pub fn lookup(&self, obj: &Value, name: &str) -> Option<Value> {
        self.namespace_id(obj).and_then(|dict| self.dict_get_str(dict, name))
    }

    /// The class of a value: the user class for instances, a builtin type otherwise.
    pub fn class_of(&self, obj: &Value) -> Value {
        if let Value::Ref(id) = obj
            && let HeapData::Instance(inst) = self.heap.get(*id)
        {
            let class = inst.class_id();
            self.heap.inc_ref(class);
            return Value::Ref(class);
        }
        Value::Type(obj.py_type(&self.heap))
    }

    fn owner(&self, obj: &Value) -> Owner {
        match obj {
            Value::Ref(id) => match self.heap.get(*id) {
                HeapData::Instance(inst) => Owner::Instance { class: inst.class_id() },
                HeapData::Class(class) => Owner::Class {
                    name: class.name().to_owned(),
                    module: class.module().to_owned(),
                },
                HeapData::Module(module) => Owner::Module {
                    name: module.name().to_owned(),
                },
                HeapData::Function(func) => Owner::Function {
                    name: func.name().to_owned(),
                    module: func.module().to_owned(),
                },
                HeapData::BoundMethod(method) => {
                    let (name, module) = match self.heap.get(method.func_id()) {
                        HeapData::Function(func) => (func.name().to_owned(), func.module().to_owned()),
                        _ => (String::new(), String::new()),
                    };
                    Owner::Method {
                        id: *id,
                        func: method.func_id(),
                        name,
                        module,
                    }
                }
                data => Owner::Builtin(data.py_type()),
            },
            Value::Type(t) => Owner::TypeObject(t.to_string()),
            Value::ExcType(e) => Owner::TypeObject(e.to_string()),
            other => Owner::Builtin(other.py_type(&self.heap)),
        }
    }

    /// Reads an attribute, returning a new reference.
    ///
    /// Instances look in their own dict first, then in their class dict; functions
    /// found on the class come back bound to the instance.
    pub fn getattr(&mut self, obj: &Value, name: &str) -> RunResult<Value> {
        match name {
            "__class__" => return Ok(self.class_of(obj)),
            "__dict__" => {
                if let Some(dict) = self.namespace_id(obj) {
                    self.heap.inc_ref(dict);
                    return Ok(Value::Ref(dict));
                }
            }
            _ => {}
        }
        if let Some(value) = self.lookup(obj, name) {
            return Ok(value);
        }

        match self.owner(obj) {
            Owner::Instance { class } => self.class_attr(obj, class, name),
            Owner::Class { name: class_name, module } => match name {
                "__name__" => self.new_str(class_name),
                "__module__" => self.new_str(module),
                _ => Err(self.raise(
                    ExcType::AttributeError,
                    format!("type object '{class_name}' has no attribute '{name}'"),
                )),
            },
            Owner::Module { name: module } => match name {
                "__name__" => self.new_str(module),
                _ => Err(self.raise(
                    ExcType::AttributeError,
                    format!("module '{module}' has no attribute '{name}'"),
                )),
            },
            Owner::Function { name: func, module } => match name {
                "__name__" => self.new_str(func),
                "__module__" => self.new_str(module),
                _ => Err(self.no_attribute("function", name)),
            },
            Owner::Method {
                id,
                func,
                name: method_name,
                module,
            } => match name {
                "__func__" => {
                    self.heap.inc_ref(func);
                    Ok(Value::Ref(func))
                }
                "__self__" => match self.heap.get(id) {
                    HeapData::BoundMethod(method) => Ok(method.receiver().clone_with_heap(&self.heap)),
                    _ => Err(self.no_attribute("method", name)),
                },
                "__name__" => self.new_str(method_name),
                "__module__" => self.new_str(module),
                _ => Err(self.no_attribute("method", name)),
            },
            Owner::TypeObject(type_name) => match name {
                "__name__" => self.new_str(type_name),
                "__module__" => self.new_str("builtins"),
                _ => Err(self.raise(
                    ExcType::AttributeError,
                    format!("type object '{type_name}' has no attribute '{name}'"),
                )),
            },
            Owner::Builtin(t) => Err(self.no_attribute(&t.to_string(), name)),
        }
    }

    fn class_attr(&mut self, obj: &Value, class: HeapId, name: &str) -> RunResult<Value> {
        let (class_name, module, dict) = match self.heap.get(class) {
            HeapData::Class(c) => (c.name().to_owned(), c.module().to_owned(), c.dict_id()),
            _ => return Err(self.raise(ExcType::TypeError, "instance class is not a class")),
        };
        let Some(value) = self.dict_get_str(dict, name) else {
            return if name == "__module__" {
                self.new_str(module)
            } else {
                Err(self.no_attribute(&class_name, name))
            };
        };
        if let Value::Ref(id) = value
            && matches!(self.heap.get(id), HeapData::Function(_))
        {
            // the new method owns the function reference taken by the lookup
            value.transfer_ownership();
            let receiver = obj.clone_with_heap(&self.heap);
            return self.alloc(HeapData::BoundMethod(BoundMethod::new(id, receiver)));
        }
        Ok(value)
    }

    fn no_attribute(&mut self, type_name: &str, name: &str) -> RunError {
        self.raise(
            ExcType::AttributeError,
            format!("'{type_name}' object has no attribute '{name}'"),
        )
    }

    /// Whether `getattr` would succeed. Any error raised by the lookup is cleared.
    pub fn hasattr(&mut self, obj: &Value, name: &str) -> bool {
        match self.getattr(obj, name) {
            Ok(value) => {
                value.drop_with_heap(&mut self.heap);
                true
            }
            Err(_) => {
                self.clear_error();
                false
            }
        }
    }

    /// Binds or overwrites an attribute, taking ownership of `value`.
    ///
    /// Only objects with a namespace (instances, classes, modules) accept new
    /// attributes.
    pub fn setattr(&mut self, obj: &Value, name: &str, value: Value) -> RunResult<()> {
        if matches!(name, "__class__" | "__dict__") {
            value.drop_with_heap(&mut self.heap);
            return Err(self.raise(ExcType::AttributeError, format!("attribute '{name}' is read-only")));
        }
        match self.namespace_id(obj) {
            Some(dict) => self.dict_set_str(dict, name, value),
            None => {
                value.drop_with_heap(&mut self.heap);
                let type_name = self.type_name(obj);
                Err(self.no_attribute(&type_name, name))
            }
        }
    }

    /// Removes an attribute from the object's own namespace.
    pub fn delattr(&mut self, obj: &Value, name: &str) -> RunResult<()> {
        if let Some(dict) = self.namespace_id(obj)
            && self.dict_remove_str(dict, name)
        {
            return Ok(());
        }
        let type_name = self.type_name(obj);
        Err(self.no_attribute(&type_name, name))
    }
}
