//! Call protocol: functions, bound methods and class instantiation.

use super::Runtime;
use crate::{
    exception::{ExcType, RunResult},
    heap::{DropWithHeap, HeapData, HeapId},
    types::{Args, Dict, Instance},
    value::Value,
};

/// What a callable value resolves to, detached from the heap borrow.
enum Target {
    Function(HeapId),
    Method { func: HeapId, receiver: Value },
    Class(HeapId),
    NotCallable,
}

impl Runtime {
    #[must_use]
    pub fn is_callable(&self, obj: &Value) -> bool {
        match obj {
            Value::Ref(id) => matches!(
                self.heap.get(*id),
                HeapData::Function(_) | HeapData::BoundMethod(_) | HeapData::Class(_)
            ),
            _ => false,
        }
    }

    /// Whether `obj` is a function bound to a receiver.
    #[must_use]
    pub fn is_method(&self, obj: &Value) -> bool {
        matches!(obj, Value::Ref(id) if matches!(self.heap.get(*id), HeapData::BoundMethod(_)))
    }

    /// Declared parameter names of a callable, excluding a bound receiver.
    ///
    /// For classes these are the parameters of `__init__`.
    #[must_use]
    pub fn parameters(&self, obj: &Value) -> Option<Vec<String>> {
        let Value::Ref(id) = obj else { return None };
        match self.heap.get(*id) {
            HeapData::Function(func) => Some(func.params().to_vec()),
            HeapData::BoundMethod(method) => self.function_params(method.func_id(), 1),
            HeapData::Class(class) => {
                let init = match self.heap.get(class.dict_id()) {
                    HeapData::Dict(dict) => dict.get_str("__init__").and_then(Value::ref_id),
                    _ => None,
                };
                Some(init.and_then(|func| self.function_params(func, 1)).unwrap_or_default())
            }
            _ => None,
        }
    }

    fn function_params(&self, func: HeapId, skip: usize) -> Option<Vec<String>> {
        match self.heap.get(func) {
            HeapData::Function(f) => Some(f.params().iter().skip(skip).cloned().collect()),
            _ => None,
        }
    }

    /// Calls `callable` with an optional argument tuple, consuming the tuple.
    ///
    /// `None` means "no arguments".
    pub fn call(&mut self, callable: &Value, args: Option<Value>) -> RunResult<Value> {
        let args = match args {
            None => Args::new(),
            Some(tuple) => {
                let items = match &tuple {
                    Value::Ref(id) => match self.heap.get(*id) {
                        HeapData::Tuple(items) => Some(
                            items
                                .iter()
                                .map(|v| v.clone_with_heap(&self.heap))
                                .collect::<Args>(),
                        ),
                        _ => None,
                    },
                    _ => None,
                };
                tuple.drop_with_heap(&mut self.heap);
                match items {
                    Some(args) => args,
                    None => return Err(self.raise(ExcType::TypeError, "argument list must be a tuple")),
                }
            }
        };
        self.call_args(callable, args)
    }

    /// Calls `callable` with owned positional arguments.
    pub fn call_args(&mut self, callable: &Value, args: Args) -> RunResult<Value> {
        let target = match callable {
            Value::Ref(id) => match self.heap.get(*id) {
                HeapData::Function(_) => Target::Function(*id),
                HeapData::BoundMethod(method) => Target::Method {
                    func: method.func_id(),
                    receiver: method.receiver().clone_with_heap(&self.heap),
                },
                HeapData::Class(_) => Target::Class(*id),
                _ => Target::NotCallable,
            },
            _ => Target::NotCallable,
        };
        match target {
            Target::Function(func) => self.call_function(func, args),
            Target::Method { func, receiver } => {
                let mut args = args;
                args.prepend(receiver);
                self.call_function(func, args)
            }
            Target::Class(class) => self.instantiate(class, args),
            Target::NotCallable => {
                args.drop_with_heap(&mut self.heap);
                let type_name = self.type_name(callable);
                Err(self.raise(ExcType::TypeError, format!("'{type_name}' object is not callable")))
            }
        }
    }

    fn call_function(&mut self, func: HeapId, args: Args) -> RunResult<Value> {
        let (name, fixed, variadic, native) = match self.heap.get(func) {
            HeapData::Function(f) => (f.name().to_owned(), f.fixed_arity(), f.is_variadic(), f.native()),
            _ => {
                args.drop_with_heap(&mut self.heap);
                return Err(self.raise(ExcType::TypeError, "object is not a function"));
            }
        };
        let given = args.len();
        if given < fixed || (!variadic && given > fixed) {
            args.drop_with_heap(&mut self.heap);
            let at_least = if variadic { "at least " } else { "" };
            return Err(self.raise(
                ExcType::TypeError,
                format!("{name}() takes {at_least}{fixed} positional arguments but {given} were given"),
            ));
        }
        if let Err(err) = self.limits().check_recursion(self.depth + 1) {
            args.drop_with_heap(&mut self.heap);
            return Err(self.raise_resource(&err));
        }
        self.depth += 1;
        let result = native(self, args);
        self.depth -= 1;
        result
    }

    /// Allocates an instance of `class` and runs its `__init__`.
    fn instantiate(&mut self, class: HeapId, args: Args) -> RunResult<Value> {
        let (class_name, class_dict) = match self.heap.get(class) {
            HeapData::Class(c) => (c.name().to_owned(), c.dict_id()),
            _ => {
                args.drop_with_heap(&mut self.heap);
                return Err(self.raise(ExcType::TypeError, "object is not a class"));
            }
        };
        let init = self.dict_get_str(class_dict, "__init__");
        if init.is_none() && !args.is_empty() {
            args.drop_with_heap(&mut self.heap);
            return Err(self.raise(ExcType::TypeError, format!("{class_name}() takes no arguments")));
        }

        let instance = match self.new_instance(class) {
            Ok(instance) => instance,
            Err(err) => {
                args.drop_with_heap(&mut self.heap);
                init.drop_with_heap(&mut self.heap);
                return Err(err);
            }
        };
        let Some(init) = init else { return Ok(instance) };

        let mut args = args;
        args.prepend(instance.clone_with_heap(&self.heap));
        let result = self.call_args(&init, args);
        init.drop_with_heap(&mut self.heap);
        match result {
            Ok(Value::None) => Ok(instance),
            Ok(other) => {
                let type_name = self.type_name(&other);
                other.drop_with_heap(&mut self.heap);
                instance.drop_with_heap(&mut self.heap);
                Err(self.raise(
                    ExcType::TypeError,
                    format!("__init__() should return None, not '{type_name}'"),
                ))
            }
            Err(err) => {
                instance.drop_with_heap(&mut self.heap);
                Err(err)
            }
        }
    }

    fn new_instance(&mut self, class: HeapId) -> RunResult<Value> {
        let dict = self.alloc_id(HeapData::Dict(Dict::new()))?;
        self.heap.inc_ref(class);
        self.alloc(HeapData::Instance(Instance::new(class, dict)))
    }

    /// Calls a dunder hook defined on an instance's class with no extra arguments.
    ///
    /// Returns `None` when `obj` is not an instance or its class defines no such
    /// function.
    pub(crate) fn call_dunder(&mut self, obj: &Value, name: &str) -> Option<RunResult<Value>> {
        let Value::Ref(id) = obj else { return None };
        let HeapData::Instance(inst) = self.heap.get(*id) else {
            return None;
        };
        let class_dict = match self.heap.get(inst.class_id()) {
            HeapData::Class(class) => class.dict_id(),
            _ => return None,
        };
        let func = self.dict_get_str(class_dict, name)?;
        if !matches!(func, Value::Ref(f) if matches!(self.heap.get(f), HeapData::Function(_))) {
            func.drop_with_heap(&mut self.heap);
            return None;
        }
        let mut args = Args::new();
        args.push(obj.clone_with_heap(&self.heap));
        let result = self.call_args(&func, args);
        func.drop_with_heap(&mut self.heap);
        Some(result)
    }
}
