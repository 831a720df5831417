use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    heap::{DropWithHeap, Heap},
    resource::ResourceError,
    value::Value,
};

/// Result type alias for guest operations that can raise.
///
/// The error half carries no data: the exception itself lives in the runtime's
/// pending-exception slot (see [`Runtime::take_exception`](crate::Runtime::take_exception)).
pub type RunResult<T> = Result<T, RunError>;

/// Marker returned by a guest operation that raised.
///
/// Only the runtime can construct it, and only while setting the pending
/// exception, so holding a `RunError` always means an exception is pending.
#[derive(Debug, PartialEq, Eq)]
#[must_use]
pub struct RunError {
    _private: (),
}

impl RunError {
    pub(crate) fn raised() -> Self {
        Self { _private: () }
    }
}

/// Exception classes known to the guest runtime.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and `Into<&'static str>` implementations.
/// The string representation matches the variant name exactly (e.g., `ValueError` -> "ValueError").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum ExcType {
    /// primary exception class - matches any exception in isinstance checks.
    Exception,

    // --- LookupError hierarchy ---
    /// Intermediate class for lookup errors.
    LookupError,
    /// Subclass of LookupError.
    IndexError,
    /// Subclass of LookupError.
    KeyError,

    // --- RuntimeError hierarchy ---
    RuntimeError,
    /// Subclass of RuntimeError.
    RecursionError,

    AttributeError,
    ValueError,

    // --- ImportError hierarchy ---
    ImportError,
    /// Subclass of ImportError - for when a module cannot be found.
    ModuleNotFoundError,

    MemoryError,
    TypeError,
}

impl ExcType {
    /// Checks if this exception type is a subclass of another exception type.
    ///
    /// Returns true if `self` would be caught by `except handler_type:`.
    #[must_use]
    pub fn is_subclass_of(self, handler_type: Self) -> bool {
        if self == handler_type || handler_type == Self::Exception {
            return true;
        }
        matches!(
            (handler_type, self),
            (Self::LookupError, Self::IndexError | Self::KeyError)
                | (Self::RuntimeError, Self::RecursionError)
                | (Self::ImportError, Self::ModuleNotFoundError)
        )
    }
}

impl From<&ResourceError> for ExcType {
    fn from(err: &ResourceError) -> Self {
        match err {
            ResourceError::Allocation { .. } => Self::MemoryError,
            ResourceError::Recursion { .. } => Self::RecursionError,
        }
    }
}

/// The exception currently set on a runtime: its class and its value.
///
/// Owns one reference to each. Consumers must release it with
/// [`DropWithHeap::drop_with_heap`] once they have inspected it.
#[derive(Debug)]
pub struct PendingException {
    pub(crate) exc_type: Value,
    pub(crate) value: Value,
}

impl PendingException {
    /// The exception class (usually a `Value::ExcType`).
    #[must_use]
    pub fn exc_type(&self) -> &Value {
        &self.exc_type
    }

    /// The exception value, typically the message string.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The builtin exception class, if the type is one.
    #[must_use]
    pub fn kind(&self) -> Option<ExcType> {
        match self.exc_type {
            Value::ExcType(exc) => Some(exc),
            _ => None,
        }
    }
}

impl DropWithHeap for PendingException {
    fn drop_with_heap(self, heap: &mut Heap) {
        self.exc_type.drop_with_heap(heap);
        self.value.drop_with_heap(heap);
    }
}
