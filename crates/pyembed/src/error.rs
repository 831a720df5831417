//! Host diagnostics and the error bridge that produces them from guest failures.

use std::fmt;

use crate::{dispatch::CastKind, exception::ExcType, heap::DropWithHeap, proxy::ProxyId, runtime::Runtime};

/// A guest exception drained from the runtime and stringified for the host.
///
/// Displays as `[type] 'value'`, where both halves are the guest `str()` of the
/// exception type and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestError {
    exc_type: String,
    message: String,
    kind: Option<ExcType>,
}

impl GuestError {
    /// Guest `str()` of the exception type, e.g. `<class 'KeyError'>`.
    #[must_use]
    pub fn exc_type(&self) -> &str {
        &self.exc_type
    }

    /// Guest `str()` of the exception value.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The builtin exception class, when the type is one.
    #[must_use]
    pub fn kind(&self) -> Option<ExcType> {
        self.kind
    }
}

impl fmt::Display for GuestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] '{}'", self.exc_type, self.message)
    }
}

impl std::error::Error for GuestError {}

/// Fetches and clears the runtime's pending exception.
///
/// Returns `None` when nothing is pending, and also when either half of the
/// exception cannot be stringified: such errors are dropped without a message.
/// The runtime never has an exception pending afterwards.
pub(crate) fn fetch_error(rt: &mut Runtime) -> Option<GuestError> {
    let pending = rt.take_exception()?;
    let kind = pending.kind();
    let exc_type = rt.str_string(pending.exc_type());
    let message = rt.str_string(pending.value());
    pending.drop_with_heap(rt.heap_mut());
    match (exc_type, message) {
        (Ok(exc_type), Ok(message)) => Some(GuestError {
            exc_type,
            message,
            kind,
        }),
        _ => {
            rt.clear_error();
            None
        }
    }
}

/// Appends `": Python: [type] 'value'"` when a bridged guest error is attached.
struct CauseSuffix<'a>(&'a Option<GuestError>);

impl fmt::Display for CauseSuffix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(cause) => write!(f, ": Python: {cause}"),
            None => Ok(()),
        }
    }
}

/// A host-level diagnostic raised by a bridge operation.
///
/// Variants that wrap a guest failure carry the bridged [`GuestError`] as
/// `cause`; it is `None` when the guest error could not be stringified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("Failed to set attribute '{name}'{}", CauseSuffix(.cause))]
    SetAttribute { name: String, cause: Option<GuestError> },

    #[error("Failed to delete attribute '{name}'{}", CauseSuffix(.cause))]
    DeleteAttribute { name: String, cause: Option<GuestError> },

    #[error("Failed to set sequence item {index}{}", CauseSuffix(.cause))]
    SetSequenceItem { index: i64, cause: Option<GuestError> },

    #[error("Failed to set mapping item '{key}'{}", CauseSuffix(.cause))]
    SetMappingItem { key: String, cause: Option<GuestError> },

    /// Neither the sequence nor the mapping protocol accepts an item assignment.
    #[error("Failed to set item '{key}': object supports neither sequence nor mapping assignment")]
    NoItemProtocol { key: String },

    #[error("Failed to delete item{}", CauseSuffix(.cause))]
    DeleteItem { cause: Option<GuestError> },

    /// The proxy was created by another bridge and means nothing here.
    #[error("Proxy {} belongs to another bridge", .id.raw())]
    ForeignProxy { id: ProxyId },

    /// The method named by a descriptor is gone or no longer callable.
    #[error("Method '{name}' is not available")]
    MethodUnavailable { name: String },

    #[error("Failed to call method '{name}'{}", CauseSuffix(.cause))]
    CallMethod { name: String, cause: Option<GuestError> },

    #[error("Cannot cast a Python object to {0}")]
    UnsupportedCast(CastKind),

    #[error("Failed to convert Python object to string{}", CauseSuffix(.cause))]
    Stringify { cause: Option<GuestError> },

    #[error("Failed to compare Python objects{}", CauseSuffix(.cause))]
    Compare { cause: Option<GuestError> },

    /// A host argument has no guest counterpart. `position` is zero-based.
    #[error("Argument {} cannot be converted to a Python value", .position + 1)]
    ArgumentConversion { position: usize },

    #[error("Expected at least {expected} arguments, {given} given")]
    MissingArguments { expected: usize, given: usize },

    /// A leading name argument of an entry point has the wrong type.
    #[error("Argument {} must be a {expected}", .position + 1)]
    InvalidArgument { position: usize, expected: &'static str },

    #[error("Failed to import module '{module}'{}", CauseSuffix(.cause))]
    Import { module: String, cause: Option<GuestError> },

    #[error("Module '{module}' has no attribute '{name}'")]
    UndefinedName { module: String, name: String },

    #[error("Failed to call '{module}.{function}'{}", CauseSuffix(.cause))]
    Call {
        module: String,
        function: String,
        cause: Option<GuestError>,
    },

    #[error("Failed to construct '{module}.{class}'{}", CauseSuffix(.cause))]
    Construct {
        module: String,
        class: String,
        cause: Option<GuestError>,
    },
}

impl BridgeError {
    /// The bridged guest error behind this diagnostic, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&GuestError> {
        match self {
            Self::SetAttribute { cause, .. }
            | Self::DeleteAttribute { cause, .. }
            | Self::SetSequenceItem { cause, .. }
            | Self::SetMappingItem { cause, .. }
            | Self::DeleteItem { cause }
            | Self::CallMethod { cause, .. }
            | Self::Stringify { cause }
            | Self::Compare { cause }
            | Self::Import { cause, .. }
            | Self::Call { cause, .. }
            | Self::Construct { cause, .. } => cause.as_ref(),
            Self::NoItemProtocol { .. }
            | Self::ForeignProxy { .. }
            | Self::MethodUnavailable { .. }
            | Self::UnsupportedCast(_)
            | Self::ArgumentConversion { .. }
            | Self::MissingArguments { .. }
            | Self::InvalidArgument { .. }
            | Self::UndefinedName { .. } => None,
        }
    }
}
