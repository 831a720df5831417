use super::NativeFn;
use crate::heap::HeapId;

/// A loaded guest module. Owns one reference to its namespace dict.
#[derive(Debug)]
pub struct Module {
    name: String,
    dict: HeapId,
}

impl Module {
    pub(crate) fn new(name: String, dict: HeapId) -> Self {
        Self { name, dict }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn dict_id(&self) -> HeapId {
        self.dict
    }
}

/// A constant module or class attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<bool> for Constant {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Constant {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Constant {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Constant {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

/// Declaration of a native function: its name, parameter names and body.
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub native: NativeFn,
}

impl FunctionDef {
    #[must_use]
    pub fn new(name: &str, params: &[&str], native: NativeFn) -> Self {
        Self {
            name: name.to_owned(),
            params: params.iter().map(|p| (*p).to_owned()).collect(),
            native,
        }
    }
}

/// Declaration of a guest class.
///
/// Methods take the receiver as their first declared parameter (`self`).
///
/// ```
/// # use pyembed::{Args, ClassDef, Runtime, RunResult, Value};
/// fn area(rt: &mut Runtime, args: Args) -> RunResult<Value> {
///     let [this] = args.into_array(rt)?;
///     this.drop_with_heap(rt.heap_mut());
///     Ok(Value::Int(0))
/// }
/// let class = ClassDef::new("Shape").method("area", &["self"], area).attr("sides", 0_i64);
/// assert_eq!(class.name, "Shape");
/// ```
#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: String,
    pub methods: Vec<FunctionDef>,
    pub attrs: Vec<(String, Constant)>,
}

impl ClassDef {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            methods: Vec::new(),
            attrs: Vec::new(),
        }
    }

    #[must_use]
    pub fn method(mut self, name: &str, params: &[&str], native: NativeFn) -> Self {
        self.methods.push(FunctionDef::new(name, params, native));
        self
    }

    #[must_use]
    pub fn attr(mut self, name: &str, value: impl Into<Constant>) -> Self {
        self.attrs.push((name.to_owned(), value.into()));
        self
    }
}

/// Declaration of a guest module, installed with
/// [`Runtime::install_module`](crate::Runtime::install_module).
#[derive(Debug, Clone)]
pub struct ModuleDef {
    pub name: String,
    pub functions: Vec<FunctionDef>,
    pub classes: Vec<ClassDef>,
    pub constants: Vec<(String, Constant)>,
}

impl ModuleDef {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            functions: Vec::new(),
            classes: Vec::new(),
            constants: Vec::new(),
        }
    }

    #[must_use]
    pub fn function(mut self, name: &str, params: &[&str], native: NativeFn) -> Self {
        self.functions.push(FunctionDef::new(name, params, native));
        self
    }

    #[must_use]
    pub fn class(mut self, class: ClassDef) -> Self {
        self.classes.push(class);
        self
    }

    #[must_use]
    pub fn constant(mut self, name: &str, value: impl Into<Constant>) -> Self {
        self.constants.push((name.to_owned(), value.into()));
        self
    }
}
