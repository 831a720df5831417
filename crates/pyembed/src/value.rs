use crate::{
    exception::ExcType,
    heap::{Heap, HeapData, HeapId},
    types::Type,
};

/// A reference to a guest value: the unit of ownership crossing the bridge.
///
/// This enum uses a hybrid design: small immediate values (Int, Bool, None, builtin
/// types) are stored inline, while heap-allocated values (str, list, dict, instances,
/// ...) are stored in the arena and referenced via `Ref(HeapId)`.
///
/// Every function that returns a `Value` transfers ownership of exactly one reference
/// to its caller, and every function that stores or discards one releases exactly one.
///
/// NOTE: `Clone` is intentionally NOT derived. Use `clone_with_heap()` to take another
/// reference and `drop_with_heap()` to release one. Direct cloning via `.clone()` would
/// bypass reference counting and cause leaks or double frees.
#[derive(Debug)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// A builtin type object such as `int` or `list`.
    Type(Type),
    /// A builtin exception class such as `KeyError`.
    ExcType(ExcType),

    // Heap-allocated values (stored in arena)
    Ref(HeapId),

    /// Sentinel value indicating this Value was properly cleaned up via `drop_with_heap`.
    /// Only exists when `ref-count-panic` feature is enabled. Used to verify reference counting
    /// correctness - if a `Ref` variant is dropped without calling `drop_with_heap`, the
    /// Drop impl will panic.
    #[cfg(feature = "ref-count-panic")]
    Dereferenced,
}

/// Drop implementation that panics if a `Ref` variant is dropped without calling `drop_with_heap`.
/// This helps catch reference counting bugs during development/testing.
/// Only enabled when the `ref-count-panic` feature is active.
#[cfg(feature = "ref-count-panic")]
impl Drop for Value {
    fn drop(&mut self) {
        if let Self::Ref(id) = self {
            panic!("Value::Ref({id:?}) dropped without calling drop_with_heap() - this is a reference counting bug");
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl Value {
    /// Takes a new reference to the same guest object.
    ///
    /// For `Ref` values this increments the heap refcount; immediates are copied.
    #[must_use]
    pub fn clone_with_heap(&self, heap: &Heap) -> Self {
        if let Self::Ref(id) = self {
            heap.inc_ref(*id);
        }
        self.copy_for_extend()
    }

    /// Releases this reference, decrementing its heap reference count if applicable.
    ///
    /// For immediate values, this is a no-op. For heap-allocated values (Ref variant),
    /// this decrements the reference count and frees the value (and any children) when
    /// the count reaches zero.
    #[cfg(not(feature = "ref-count-panic"))]
    #[inline]
    pub fn drop_with_heap(self, heap: &mut Heap) {
        if let Self::Ref(id) = self {
            heap.dec_ref(id);
        }
    }

    /// With `ref-count-panic` enabled, `Ref` variants are replaced with `Dereferenced` and
    /// the original is forgotten to prevent the Drop impl from panicking.
    #[cfg(feature = "ref-count-panic")]
    pub fn drop_with_heap(mut self, heap: &mut Heap) {
        let old = std::mem::replace(&mut self, Self::Dereferenced);
        if let Self::Ref(id) = &old {
            heap.dec_ref(*id);
            std::mem::forget(old);
        }
    }

    /// Creates a shallow copy of this Value without incrementing reference counts.
    ///
    /// IMPORTANT: For Ref variants, this copies the HeapId but does NOT increment
    /// the reference count. The caller MUST account for the extra reference.
    pub(crate) fn copy_for_extend(&self) -> Self {
        match self {
            Self::None => Self::None,
            Self::Bool(b) => Self::Bool(*b),
            Self::Int(v) => Self::Int(*v),
            Self::Float(v) => Self::Float(*v),
            Self::Type(t) => Self::Type(*t),
            Self::ExcType(e) => Self::ExcType(*e),
            Self::Ref(id) => Self::Ref(*id), // Caller must increment refcount!
            #[cfg(feature = "ref-count-panic")]
            Self::Dereferenced => panic!("Cannot copy Dereferenced object"),
        }
    }

    /// Mark as Dereferenced to prevent Drop panic
    ///
    /// This should be called from `HeapData::collect_child_ids` only
    #[cfg(feature = "ref-count-panic")]
    pub(crate) fn dec_ref_forget(&mut self) {
        let old = std::mem::replace(self, Self::Dereferenced);
        std::mem::forget(old);
    }

    /// Gives up this reference without releasing it.
    ///
    /// Used once the caller has stored the referenced id in a heap payload field,
    /// which now owns the reference.
    pub(crate) fn transfer_ownership(self) {
        std::mem::forget(self);
    }

    /// Returns the heap id for `Ref` values.
    #[must_use]
    pub fn ref_id(&self) -> Option<HeapId> {
        match self {
            Self::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the integer payload of `Int` values.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Identity comparison (Python's `is`).
    #[must_use]
    pub fn is(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Ref(a), Self::Ref(b)) => a == b,
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Type(a), Self::Type(b)) => a == b,
            (Self::ExcType(a), Self::ExcType(b)) => a == b,
            _ => false,
        }
    }

    /// The builtin type tag of this value.
    ///
    /// Instances report [`Type::Object`]; their class name is available through
    /// [`Runtime::type_name`](crate::Runtime::type_name).
    #[must_use]
    pub fn py_type(&self, heap: &Heap) -> Type {
        match self {
            Self::None => Type::NoneType,
            Self::Bool(_) => Type::Bool,
            Self::Int(_) => Type::Int,
            Self::Float(_) => Type::Float,
            Self::Type(_) | Self::ExcType(_) => Type::Type,
            Self::Ref(id) => heap.get(*id).py_type(),
            #[cfg(feature = "ref-count-panic")]
            Self::Dereferenced => panic!("Cannot access Dereferenced object"),
        }
    }

    /// Borrows the contents of a guest `str`.
    #[must_use]
    pub fn as_str<'h>(&self, heap: &'h Heap) -> Option<&'h str> {
        match self {
            Self::Ref(id) => match heap.get(*id) {
                HeapData::Str(s) => Some(s.as_str()),
                _ => None,
            },
            _ => None,
        }
    }
}
