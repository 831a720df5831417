use crate::heap::HeapId;

/// A guest class: a name, its defining module and an attribute dict.
///
/// The class owns one reference to its dict.
#[derive(Debug)]
pub struct ClassObject {
    name: String,
    module: String,
    dict: HeapId,
}

impl ClassObject {
    pub(crate) fn new(name: String, module: String, dict: HeapId) -> Self {
        Self { name, module, dict }
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
    pub fn dict_id(&self) -> HeapId {
        self.dict
    }
}

/// An instance of a guest class. Owns a reference to its class and to its dict.
#[derive(Debug)]
pub struct Instance {
    class: HeapId,
    dict: HeapId,
}

impl Instance {
    pub(crate) fn new(class: HeapId, dict: HeapId) -> Self {
        Self { class, dict }
    }

    #[must_use]
    pub fn class_id(&self) -> HeapId {
        self.class
    }

    #[must_use]
    pub fn dict_id(&self) -> HeapId {
        self.dict
    }
}
