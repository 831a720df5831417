//! Guest object payloads stored on the heap, plus the builtin type tag.

mod class;
mod dict;
mod function;
mod module;

pub use class::{ClassObject, Instance};
pub use dict::{Dict, DictKey};
pub use function::{Args, BoundMethod, Function, NativeFn};
pub use module::{ClassDef, Constant, FunctionDef, Module, ModuleDef};

use strum::{Display, EnumString, IntoStaticStr};

/// Builtin type of a guest value.
///
/// The string form matches the guest's own type names (`int`, `list`, `NoneType`, ...).
/// Instances of user classes report `Object`; their class name comes from the class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Type {
    #[strum(serialize = "NoneType")]
    NoneType,
    Bool,
    Int,
    Float,
    Str,
    List,
    Tuple,
    Dict,
    Type,
    Module,
    Function,
    Method,
    Object,
}

impl Type {
    /// Whether values of this type support integer indexing.
    #[must_use]
    pub fn is_sequence(self) -> bool {
        matches!(self, Self::Str | Self::List | Self::Tuple)
    }

    /// Whether values of this type support string-keyed item access.
    #[must_use]
    pub fn is_mapping(self) -> bool {
        matches!(self, Self::Dict)
    }
}
