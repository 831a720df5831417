use smallvec::SmallVec;

use crate::{
    exception::{ExcType, RunResult},
    heap::{DropWithHeap, Heap, HeapId},
    runtime::Runtime,
    value::Value,
};

/// Signature of a native guest function.
///
/// The function owns its arguments and must release every one of them (or move
/// them into the returned value). The returned value is a new reference.
pub type NativeFn = fn(&mut Runtime, Args) -> RunResult<Value>;

/// Owned positional arguments of a guest call.
#[derive(Debug, Default)]
pub struct Args {
    values: SmallVec<[Value; 4]>,
}

impl Args {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Borrows the argument at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Takes the arguments out as a fixed-size array.
    ///
    /// Arity has normally been checked by the call machinery already; on a mismatch
    /// every argument is released and `TypeError` is raised.
    pub fn into_array<const N: usize>(self, rt: &mut Runtime) -> RunResult<[Value; N]> {
        let given = self.values.len();
        match <[Value; N]>::try_from(self.values.into_vec()) {
            Ok(array) => Ok(array),
            Err(values) => {
                values.drop_with_heap(rt.heap_mut());
                Err(rt.raise(
                    ExcType::TypeError,
                    format!("expected {N} arguments, got {given}"),
                ))
            }
        }
    }

    pub(crate) fn prepend(&mut self, value: Value) {
        self.values.insert(0, value);
    }
}

impl FromIterator<Value> for Args {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Args {
    type Item = Value;
    type IntoIter = smallvec::IntoIter<[Value; 4]>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl DropWithHeap for Args {
    fn drop_with_heap(self, heap: &mut Heap) {
        self.values.drop_with_heap(heap);
    }
}

/// A native function living on the guest heap.
///
/// `params` holds the declared parameter names, used for arity checks and for the
/// arity hint of method descriptors. A trailing `*name` entry makes it variadic.
#[derive(Debug)]
pub struct Function {
    name: String,
    module: String,
    params: Vec<String>,
    native: NativeFn,
}

impl Function {
    pub(crate) fn new(name: String, module: String, params: Vec<String>, native: NativeFn) -> Self {
        Self {
            name,
            module,
            params,
            native,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    #[must_use]
    pub fn params(&self) -> &[String] {
        &self.params
    }

    #[must_use]
    pub fn native(&self) -> NativeFn {
        self.native
    }

    #[must_use]
    pub fn is_variadic(&self) -> bool {
        self.params.last().is_some_and(|p| p.starts_with('*'))
    }

    /// Number of positional parameters before any variadic one.
    #[must_use]
    pub fn fixed_arity(&self) -> usize {
        self.params.len() - usize::from(self.is_variadic())
    }
}

/// A function bound to a receiver; calling it prepends the receiver to the arguments.
///
/// Owns one reference to the function and one to the receiver.
#[derive(Debug)]
pub struct BoundMethod {
    func: HeapId,
    receiver: Value,
}

impl BoundMethod {
    pub(crate) fn new(func: HeapId, receiver: Value) -> Self {
        Self { func, receiver }
    }

    #[must_use]
    pub fn func_id(&self) -> HeapId {
        self.func
    }

    #[must_use]
    pub fn receiver(&self) -> &Value {
        &self.receiver
    }

    pub(crate) fn receiver_mut(&mut self) -> &mut Value {
        &mut self.receiver
    }
}
