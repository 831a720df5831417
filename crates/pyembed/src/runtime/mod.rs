//! The guest runtime: an explicit interpreter context owning the heap, the
//! pending exception and the module registry.
//!
//! Every guest operation takes the runtime as `&mut self`; there is no global
//! interpreter state, so several runtimes can coexist in one process.

mod attr;
mod call;
mod item;
mod repr;

use indexmap::IndexMap;

pub(crate) use repr::repr_str;

use crate::{
    exception::{ExcType, PendingException, RunError, RunResult},
    heap::{ContainsHeap, DropWithHeap, Heap, HeapData, HeapGuard, HeapId, HeapStats},
    resource::{ResourceError, ResourceLimits},
    types::{ClassDef, ClassObject, Constant, Dict, DictKey, Function, FunctionDef, Module, ModuleDef},
    value::Value,
};

/// An isolated guest interpreter instance.
///
/// Creating a runtime is interpreter initialization; [`Runtime::finalize`] is
/// shutdown. Dropping a runtime without finalizing it releases the same state.
#[derive(Debug)]
pub struct Runtime {
    heap: Heap,
    pending: Option<PendingException>,
    modules: IndexMap<String, HeapId, ahash::RandomState>,
    /// Current native call depth.
    depth: usize,
}

impl Runtime {
    #[must_use]
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            heap: Heap::new(limits),
            pending: None,
            modules: IndexMap::default(),
            depth: 0,
        }
    }

    /// Interpreter version, e.g. `pyembed 0.1.0`.
    #[must_use]
    pub fn version() -> &'static str {
        concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
    }

    #[must_use]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    #[must_use]
    pub fn limits(&self) -> &ResourceLimits {
        self.heap.limits()
    }

    #[must_use]
    pub fn stats(&self) -> HeapStats {
        self.heap.stats()
    }

    /// Shuts the runtime down: clears the pending exception, unloads every module
    /// and returns the statistics of whatever is still alive.
    ///
    /// Anything left in the returned stats was leaked by a caller.
    pub fn finalize(mut self) -> HeapStats {
        self.release_state();
        self.heap.stats()
    }

    fn release_state(&mut self) {
        self.clear_error();
        for (_, module) in std::mem::take(&mut self.modules) {
            self.heap.dec_ref(module);
        }
    }

    // --- allocation ---

    pub(crate) fn alloc_id(&mut self, data: HeapData) -> RunResult<HeapId> {
        self.heap.allocate(data).map_err(|err| self.raise_resource(&err))
    }

    pub(crate) fn alloc(&mut self, data: HeapData) -> RunResult<Value> {
        self.alloc_id(data).map(Value::Ref)
    }

    pub fn new_str(&mut self, s: impl Into<String>) -> RunResult<Value> {
        self.alloc(HeapData::Str(s.into()))
    }

    /// Allocates a list taking ownership of `items`.
    pub fn new_list(&mut self, items: Vec<Value>) -> RunResult<Value> {
        self.alloc(HeapData::List(items))
    }

    /// Allocates a tuple taking ownership of `items`.
    pub fn new_tuple(&mut self, items: Vec<Value>) -> RunResult<Value> {
        self.alloc(HeapData::Tuple(items))
    }

    pub fn new_dict(&mut self) -> RunResult<Value> {
        self.alloc(HeapData::Dict(Dict::new()))
    }

    // --- pending exception ---

    /// Sets the pending exception to `exc` with a string message.
    ///
    /// If the message cannot be allocated the pending exception becomes a bare
    /// `MemoryError` instead.
    pub fn raise(&mut self, exc: ExcType, message: impl Into<String>) -> RunError {
        match self.heap.allocate(HeapData::Str(message.into())) {
            Ok(id) => self.raise_value(Value::ExcType(exc), Value::Ref(id)),
            Err(_) => self.raise_value(Value::ExcType(ExcType::MemoryError), Value::None),
        }
    }

    /// Sets the pending exception from an explicit type and value, taking ownership
    /// of both. A previously pending exception is released.
    pub fn raise_value(&mut self, exc_type: Value, value: Value) -> RunError {
        let previous = self.pending.replace(PendingException { exc_type, value });
        previous.drop_with_heap(&mut self.heap);
        RunError::raised()
    }

    pub(crate) fn raise_resource(&mut self, err: &ResourceError) -> RunError {
        match ExcType::from(err) {
            // no allocation while out of memory
            ExcType::MemoryError => self.raise_value(Value::ExcType(ExcType::MemoryError), Value::None),
            exc => self.raise(exc, err.to_string()),
        }
    }

    #[must_use]
    pub fn err_occurred(&self) -> bool {
        self.pending.is_some()
    }

    /// Takes the pending exception, leaving none set.
    pub fn take_exception(&mut self) -> Option<PendingException> {
        self.pending.take()
    }

    pub fn clear_error(&mut self) {
        let pending = self.pending.take();
        pending.drop_with_heap(&mut self.heap);
    }

    // --- dict helpers ---

    /// Returns a new reference to the value stored under a string key.
    pub(crate) fn dict_get_str(&self, dict_id: HeapId, key: &str) -> Option<Value> {
        match self.heap.get(dict_id) {
            HeapData::Dict(dict) => dict.get_str(key).map(|v| v.clone_with_heap(&self.heap)),
            _ => None,
        }
    }

    /// Stores `value` in the dict under `key`, taking ownership of both.
    pub(crate) fn dict_insert(&mut self, dict_id: HeapId, key: Value, value: Value) -> RunResult<()> {
        let hash_key = match DictKey::from_value(&key, &self.heap) {
            Ok(hash_key) => hash_key,
            Err(t) => {
                key.drop_with_heap(&mut self.heap);
                value.drop_with_heap(&mut self.heap);
                return Err(self.raise(ExcType::TypeError, format!("unhashable type: '{t}'")));
            }
        };
        if let HeapData::Dict(dict) = self.heap.get_mut(dict_id) {
            let replaced = dict.insert(hash_key, key, value);
            replaced.drop_with_heap(&mut self.heap);
            Ok(())
        } else {
            key.drop_with_heap(&mut self.heap);
            value.drop_with_heap(&mut self.heap);
            Err(self.raise(ExcType::TypeError, "namespace is not a dict"))
        }
    }

    /// Stores `value` under a string key, taking ownership of `value`.
    pub(crate) fn dict_set_str(&mut self, dict_id: HeapId, key: &str, value: Value) -> RunResult<()> {
        match self.new_str(key) {
            Ok(key) => self.dict_insert(dict_id, key, value),
            Err(err) => {
                value.drop_with_heap(&mut self.heap);
                Err(err)
            }
        }
    }

    /// Removes a string key, returning whether it was present.
    pub(crate) fn dict_remove_str(&mut self, dict_id: HeapId, key: &str) -> bool {
        let removed = match self.heap.get_mut(dict_id) {
            HeapData::Dict(dict) => dict.remove(&DictKey::Str(key.to_owned())),
            _ => None,
        };
        let found = removed.is_some();
        removed.drop_with_heap(&mut self.heap);
        found
    }

    // --- modules ---

    /// Builds a module from its declaration and registers it under its name,
    /// replacing any module already registered with that name.
    pub fn install_module(&mut self, def: &ModuleDef) -> RunResult<()> {
        let this = self;
        let dict_id = this.alloc_id(HeapData::Dict(Dict::new()))?;
        let mut guard = HeapGuard::new(Value::Ref(dict_id), this);
        let this = guard.heap();
        for func in &def.functions {
            let value = this.new_function(func, &def.name)?;
            this.dict_set_str(dict_id, &func.name, value)?;
        }
        for class in &def.classes {
            let value = this.new_class(class, &def.name)?;
            this.dict_set_str(dict_id, &class.name, value)?;
        }
        for (name, constant) in &def.constants {
            let value = this.constant(constant)?;
            this.dict_set_str(dict_id, name, value)?;
        }
        let name = def.name.clone();
        let (dict, this) = guard.into_parts();
        dict.transfer_ownership();
        let module = this.alloc_id(HeapData::Module(Module::new(name.clone(), dict_id)))?;
        if let Some(previous) = this.modules.insert(name, module) {
            this.heap.dec_ref(previous);
        }
        Ok(())
    }

    fn new_function(&mut self, def: &FunctionDef, module: &str) -> RunResult<Value> {
        self.alloc(HeapData::Function(Function::new(
            def.name.clone(),
            module.to_owned(),
            def.params.clone(),
            def.native,
        )))
    }

    fn new_class(&mut self, def: &ClassDef, module: &str) -> RunResult<Value> {
        let this = self;
        let dict_id = this.alloc_id(HeapData::Dict(Dict::new()))?;
        let mut guard = HeapGuard::new(Value::Ref(dict_id), this);
        let this = guard.heap();
        for method in &def.methods {
            let value = this.new_function(method, module)?;
            this.dict_set_str(dict_id, &method.name, value)?;
        }
        for (name, constant) in &def.attrs {
            let value = this.constant(constant)?;
            this.dict_set_str(dict_id, name, value)?;
        }
        let (dict, this) = guard.into_parts();
        dict.transfer_ownership();
        this.alloc(HeapData::Class(ClassObject::new(
            def.name.clone(),
            module.to_owned(),
            dict_id,
        )))
    }

    fn constant(&mut self, constant: &Constant) -> RunResult<Value> {
        Ok(match constant {
            Constant::None => Value::None,
            Constant::Bool(b) => Value::Bool(*b),
            Constant::Int(i) => Value::Int(*i),
            Constant::Float(f) => Value::Float(*f),
            Constant::Str(s) => self.new_str(s.as_str())?,
        })
    }

    /// Resolves a registered module by name, returning a new reference to it.
    pub fn import_module(&mut self, name: &str) -> RunResult<Value> {
        match self.modules.get(name) {
            Some(&id) => {
                self.heap.inc_ref(id);
                Ok(Value::Ref(id))
            }
            None => Err(self.raise(ExcType::ModuleNotFoundError, format!("No module named '{name}'"))),
        }
    }

    /// The guest-visible type name of a value: the class name for instances,
    /// the builtin type name otherwise.
    #[must_use]
    pub fn type_name(&self, value: &Value) -> String {
        if let Value::Ref(id) = value
            && let HeapData::Instance(inst) = self.heap.get(*id)
            && let HeapData::Class(class) = self.heap.get(inst.class_id())
        {
            return class.name().to_owned();
        }
        value.py_type(&self.heap).to_string()
    }
}

impl ContainsHeap for Runtime {
    #[inline]
    fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.release_state();
    }
}

/// Converts a guest index into a position, following negative-index rules.
pub(crate) fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { index + len } else { index };
    if (0..len).contains(&index) {
        usize::try_from(index).ok()
    } else {
        None
    }
}
