use std::{
    cell::Cell,
    collections::BTreeMap,
    mem::ManuallyDrop,
    ptr::addr_of,
    vec,
};

use smallvec::SmallVec;
use strum::IntoStaticStr;

use crate::{
    resource::{ResourceError, ResourceLimits},
    types::{BoundMethod, ClassObject, Dict, Function, Instance, Module, Type},
    value::Value,
};

/// Snapshot of heap state at a point in time.
///
/// The `objects_by_type` map uses `BTreeMap` for deterministic iteration order,
/// making snapshots suitable for display and comparison without sort overhead.
/// Tests compare two snapshots to prove an operation released everything it acquired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapStats {
    /// Total number of live objects on the heap.
    pub live_objects: usize,
    /// Number of free (recycled) slots available for reuse.
    pub free_slots: usize,
    /// Total heap capacity (live + free).
    pub total_slots: usize,
    /// Breakdown of live objects by `HeapData` variant name.
    ///
    /// Keys are static variant names (e.g., "List", "Dict", "Str").
    pub objects_by_type: BTreeMap<&'static str, usize>,
}

/// Unique identifier for values stored inside the heap arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapId(usize);

impl HeapId {
    /// Returns the raw index value.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Payload of a heap entry.
#[derive(Debug, IntoStaticStr)]
pub enum HeapData {
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Dict(Dict),
    Module(Module),
    Class(ClassObject),
    Instance(Instance),
    Function(Function),
    BoundMethod(BoundMethod),
}

impl HeapData {
    /// The builtin type tag for this payload.
    #[must_use]
    pub fn py_type(&self) -> Type {
        match self {
            Self::Str(_) => Type::Str,
            Self::List(_) => Type::List,
            Self::Tuple(_) => Type::Tuple,
            Self::Dict(_) => Type::Dict,
            Self::Module(_) => Type::Module,
            Self::Class(_) => Type::Type,
            Self::Instance(_) => Type::Object,
            Self::Function(_) => Type::Function,
            Self::BoundMethod(_) => Type::Method,
        }
    }

    /// Pushes the ids of every heap object this payload holds a reference to.
    ///
    /// With `ref-count-panic` enabled the contained `Value`s are also marked as
    /// dereferenced, because the caller is about to release them by id.
    fn collect_child_ids(&mut self, out: &mut Vec<HeapId>) {
        match self {
            Self::Str(_) | Self::Function(_) => {}
            Self::List(items) | Self::Tuple(items) => {
                for item in items {
                    push_child(item, out);
                }
            }
            Self::Dict(dict) => dict.collect_child_ids(out),
            Self::Module(module) => out.push(module.dict_id()),
            Self::Class(class) => out.push(class.dict_id()),
            Self::Instance(inst) => {
                out.push(inst.class_id());
                out.push(inst.dict_id());
            }
            Self::BoundMethod(method) => {
                out.push(method.func_id());
                push_child(method.receiver_mut(), out);
            }
        }
    }
}

pub(crate) fn push_child(value: &mut Value, out: &mut Vec<HeapId>) {
    if let Value::Ref(id) = value {
        out.push(*id);
    }
    #[cfg(feature = "ref-count-panic")]
    value.dec_ref_forget();
}

#[derive(Debug)]
struct HeapValue {
    refcount: Cell<usize>,
    data: HeapData,
}

/// Reference-counted arena holding every guest heap object.
///
/// Freed slots are recycled through a free list, so a `HeapId` is only meaningful
/// while the caller owns a reference to it.
#[derive(Debug)]
pub struct Heap {
    entries: Vec<Option<HeapValue>>,
    free_list: Vec<HeapId>,
    live: usize,
    limits: ResourceLimits,
}

impl Heap {
    #[must_use]
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            entries: Vec::new(),
            free_list: Vec::new(),
            live: 0,
            limits,
        }
    }

    #[must_use]
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Allocates a new heap entry with a refcount of one, owned by the caller.
    ///
    /// On failure `data` is released (its children are dec-ref'd) before returning,
    /// so callers never need to clean up after a failed allocation.
    pub fn allocate(&mut self, data: HeapData) -> Result<HeapId, ResourceError> {
        if let Err(err) = self.limits.check_allocation(self.live) {
            self.release_data(data);
            return Err(err);
        }
        let new_entry = HeapValue {
            refcount: Cell::new(1),
            data,
        };
        self.live += 1;

        let id = if let Some(id) = self.free_list.pop() {
            // Reuse a freed slot
            self.entries[id.index()] = Some(new_entry);
            id
        } else {
            let id = self.entries.len();
            self.entries.push(Some(new_entry));
            HeapId(id)
        };
        Ok(id)
    }

    /// Increments the reference count for an existing heap entry.
    ///
    /// Uses interior mutability for the refcount, so only shared access to the heap
    /// is required. This avoids borrow conflicts during attribute lookups.
    ///
    /// # Panics
    /// Panics if the value ID is invalid or the value has already been freed.
    pub fn inc_ref(&self, id: HeapId) {
        let value = self
            .entries
            .get(id.index())
            .expect("Heap::inc_ref: slot missing")
            .as_ref()
            .expect("Heap::inc_ref: object already freed");
        value.refcount.set(value.refcount.get() + 1);
    }

    /// Decrements the reference count and frees the value (plus children) once it hits zero.
    ///
    /// When a value is freed, its slot ID is added to the free list for reuse by
    /// future allocations.
    ///
    /// # Panics
    /// Panics if the value ID is invalid or the value has already been freed.
    pub fn dec_ref(&mut self, id: HeapId) {
        let value = {
            let slot = self.entries.get_mut(id.index()).expect("Heap::dec_ref: slot missing");
            let entry = slot.as_ref().expect("Heap::dec_ref: object already freed");
            let count = entry.refcount.get();
            if count > 1 {
                entry.refcount.set(count - 1);
                return;
            }
            slot.take().expect("Heap::dec_ref: object already freed")
        };
        self.free_list.push(id);
        self.live -= 1;
        self.release_data(value.data);
    }

    /// Releases every reference held by a payload that is no longer stored anywhere.
    fn release_data(&mut self, mut data: HeapData) {
        let mut child_ids = Vec::new();
        data.collect_child_ids(&mut child_ids);
        drop(data);
        for child_id in child_ids {
            self.dec_ref(child_id);
        }
    }

    /// Current reference count of a live entry.
    ///
    /// # Panics
    /// Panics if the value ID is invalid or the value has already been freed.
    #[must_use]
    pub fn refcount(&self, id: HeapId) -> usize {
        self.entries
            .get(id.index())
            .expect("Heap::refcount: slot missing")
            .as_ref()
            .expect("Heap::refcount: object already freed")
            .refcount
            .get()
    }

    /// Whether the slot currently holds a live object.
    #[must_use]
    pub fn is_live(&self, id: HeapId) -> bool {
        matches!(self.entries.get(id.index()), Some(Some(_)))
    }

    /// Returns an immutable reference to the heap data stored at the given ID.
    ///
    /// # Panics
    /// Panics if the value ID is invalid or the value has already been freed.
    #[must_use]
    pub fn get(&self, id: HeapId) -> &HeapData {
        &self
            .entries
            .get(id.index())
            .expect("Heap::get: slot missing")
            .as_ref()
            .expect("Heap::get: object already freed")
            .data
    }

    /// Returns a mutable reference to the heap data stored at the given ID.
    ///
    /// # Panics
    /// Panics if the value ID is invalid or the value has already been freed.
    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        &mut self
            .entries
            .get_mut(id.index())
            .expect("Heap::get_mut: slot missing")
            .as_mut()
            .expect("Heap::get_mut: object already freed")
            .data
    }

    /// Number of live objects.
    #[must_use]
    pub fn live_objects(&self) -> usize {
        self.live
    }

    /// Takes a snapshot of the heap's current occupancy.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        let mut objects_by_type = BTreeMap::new();
        for entry in self.entries.iter().flatten() {
            let name: &'static str = (&entry.data).into();
            *objects_by_type.entry(name).or_insert(0) += 1;
        }
        HeapStats {
            live_objects: self.live,
            free_slots: self.free_list.len(),
            total_slots: self.entries.len(),
            objects_by_type,
        }
    }
}

/// Drop implementation for Heap that marks all contained Values as Dereferenced
/// before dropping to prevent panics when the `ref-count-panic` feature is enabled.
#[cfg(feature = "ref-count-panic")]
impl Drop for Heap {
    fn drop(&mut self) {
        let mut dummy_stack = Vec::new();
        for value in self.entries.iter_mut().flatten() {
            value.data.collect_child_ids(&mut dummy_stack);
        }
    }
}

/// This trait represents types that contain a `Heap`; it allows for more complex structures
/// (the runtime) to participate in the `HeapGuard` pattern.
pub trait ContainsHeap {
    fn heap_mut(&mut self) -> &mut Heap;
}

impl ContainsHeap for Heap {
    #[inline]
    fn heap_mut(&mut self) -> &mut Self {
        self
    }
}

/// Trait for types that require heap access for proper cleanup.
///
/// Rust's standard `Drop` trait cannot decrement heap reference counts because it has no
/// access to the `Heap`. This trait provides an explicit drop-with-heap method so that
/// ref-counted values (and containers of them) can properly decrement their counts when
/// they are no longer needed.
///
/// **All types implementing this trait must be cleaned up on every code path**, not just
/// the happy path, but also early returns, conditional branches, `continue`, etc. A missed
/// call on any branch leaks reference counts. Prefer [`defer_drop!`] or [`HeapGuard`] to
/// guarantee cleanup automatically rather than inserting manual calls in every branch.
pub trait DropWithHeap {
    /// Consume `self` and decrement reference counts for any heap-allocated values contained within.
    fn drop_with_heap(self, heap: &mut Heap);
}

impl DropWithHeap for Value {
    #[inline]
    fn drop_with_heap(self, heap: &mut Heap) {
        Self::drop_with_heap(self, heap);
    }
}

impl<U: DropWithHeap> DropWithHeap for Option<U> {
    #[inline]
    fn drop_with_heap(self, heap: &mut Heap) {
        if let Some(value) = self {
            value.drop_with_heap(heap);
        }
    }
}

impl<U: DropWithHeap> DropWithHeap for Vec<U> {
    fn drop_with_heap(self, heap: &mut Heap) {
        for value in self {
            value.drop_with_heap(heap);
        }
    }
}

impl<U: DropWithHeap> DropWithHeap for vec::IntoIter<U> {
    fn drop_with_heap(self, heap: &mut Heap) {
        for value in self {
            value.drop_with_heap(heap);
        }
    }
}

impl<U: DropWithHeap, const N: usize> DropWithHeap for SmallVec<[U; N]> {
    fn drop_with_heap(self, heap: &mut Heap) {
        for value in self {
            value.drop_with_heap(heap);
        }
    }
}

impl DropWithHeap for (Value, Value) {
    fn drop_with_heap(self, heap: &mut Heap) {
        let (key, value) = self;
        key.drop_with_heap(heap);
        value.drop_with_heap(heap);
    }
}

/// RAII guard that ensures a [`DropWithHeap`] value is cleaned up on every code path.
///
/// The guard's `Drop` impl calls [`DropWithHeap::drop_with_heap`] automatically, so
/// cleanup happens whether the scope exits normally, via `?`, `continue`, early return,
/// or any other branch.
///
/// On the normal path, the guarded value can be borrowed via [`as_parts`](Self::as_parts),
/// or reclaimed via [`into_inner`](Self::into_inner) (which consumes the guard without
/// dropping the value).
pub struct HeapGuard<'a, H: ContainsHeap, V: DropWithHeap> {
    // manually dropped because it needs to be dropped by move.
    value: ManuallyDrop<V>,
    heap: &'a mut H,
}

impl<'a, H: ContainsHeap, V: DropWithHeap> HeapGuard<'a, H, V> {
    /// Creates a new `HeapGuard` for the given value and heap.
    #[inline]
    pub fn new(value: V, heap: &'a mut H) -> Self {
        Self {
            value: ManuallyDrop::new(value),
            heap,
        }
    }

    /// Consumes the guard and returns the contained value without dropping it.
    #[inline]
    pub fn into_inner(self) -> V {
        let mut this = ManuallyDrop::new(self);
        // SAFETY: [DH] - `ManuallyDrop::new(self)` prevents `Drop` on self, so we can take the value out
        unsafe { ManuallyDrop::take(&mut this.value) }
    }

    /// Borrows the value (immutably) and heap (mutably) out of the guard.
    ///
    /// This is what [`defer_drop!`] calls internally. The returned references are tied
    /// to the guard's lifetime, so the value cannot escape.
    #[inline]
    pub fn as_parts(&mut self) -> (&V, &mut H) {
        (&self.value, self.heap)
    }

    /// Consumes the guard and returns the value and heap separately, without dropping.
    #[inline]
    pub fn into_parts(self) -> (V, &'a mut H) {
        let mut this = ManuallyDrop::new(self);
        // SAFETY: [DH] - `ManuallyDrop` prevents `Drop` on self, so we can recover the parts
        unsafe { (ManuallyDrop::take(&mut this.value), addr_of!(this.heap).read()) }
    }

    /// Borrows just the heap out of the guard
    #[inline]
    pub fn heap(&mut self) -> &mut H {
        self.heap
    }
}

impl<H: ContainsHeap, V: DropWithHeap> Drop for HeapGuard<'_, H, V> {
    fn drop(&mut self) {
        // SAFETY: [DH] - value is never manually dropped until this point
        unsafe { ManuallyDrop::take(&mut self.value) }.drop_with_heap(self.heap.heap_mut());
    }
}

/// The preferred way to ensure a [`DropWithHeap`] value is cleaned up on every code path.
///
/// Creates a [`HeapGuard`] and immediately rebinds `$value` as `&V` and `$heap` as
/// `&mut H` via [`HeapGuard::as_parts`]. The original owned value is moved into the
/// guard, which will call [`DropWithHeap::drop_with_heap`] when scope exits, whether
/// that's normal completion, early return via `?`, or any other branch.
///
/// # Limitation
///
/// The macro rebinds `$heap` as a new `let` binding, so it cannot be used when `$heap`
/// is `self`. In `&mut self` methods, first assign `let this = self;` and pass `this`.
#[macro_export]
macro_rules! defer_drop {
    ($value:ident, $heap:ident) => {
        let mut _guard = $crate::heap::HeapGuard::new($value, $heap);
        #[allow(
            clippy::allow_attributes,
            reason = "the reborrowed parts may not both be used in every case, so allow unused vars to avoid warnings"
        )]
        #[allow(unused_variables)]
        let ($value, $heap) = _guard.as_parts();
    };
}
