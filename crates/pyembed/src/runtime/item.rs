//! Sequence and mapping item protocols, plus `len`.

use super::{Runtime, normalize_index, repr_str};
use crate::{
    exception::{ExcType, RunError, RunResult},
    heap::{DropWithHeap, HeapData},
    types::Type,
    value::Value,
};

/// Result of reading a sequence slot, detached from the heap borrow.
enum SeqRead {
    Item(Value),
    Char(String),
    OutOfRange(Type),
    NotSequence,
}

impl Runtime {
    /// Sequence capability: `list`, `tuple` and `str`.
    #[must_use]
    pub fn is_sequence(&self, obj: &Value) -> bool {
        obj.py_type(&self.heap).is_sequence()
    }

    /// Sequence mutation capability: `list` only.
    #[must_use]
    pub fn is_mutable_sequence(&self, obj: &Value) -> bool {
        obj.py_type(&self.heap) == Type::List
    }

    /// Mapping capability: `dict`.
    #[must_use]
    pub fn is_mapping(&self, obj: &Value) -> bool {
        obj.py_type(&self.heap).is_mapping()
    }

    /// Reads `obj[index]` through the sequence protocol. Negative indices count
    /// from the end.
    pub fn seq_get_item(&mut self, obj: &Value, index: i64) -> RunResult<Value> {
        let read = match obj {
            Value::Ref(id) => match self.heap.get(*id) {
                HeapData::List(items) | HeapData::Tuple(items) => match normalize_index(index, items.len()) {
                    Some(i) => SeqRead::Item(items[i].clone_with_heap(&self.heap)),
                    None => SeqRead::OutOfRange(obj.py_type(&self.heap)),
                },
                HeapData::Str(s) => {
                    let len = s.chars().count();
                    match normalize_index(index, len).and_then(|i| s.chars().nth(i)) {
                        Some(c) => SeqRead::Char(c.to_string()),
                        None => SeqRead::OutOfRange(Type::Str),
                    }
                }
                _ => SeqRead::NotSequence,
            },
            _ => SeqRead::NotSequence,
        };
        match read {
            SeqRead::Item(value) => Ok(value),
            SeqRead::Char(c) => self.new_str(c),
            SeqRead::OutOfRange(t) => {
                let kind: &'static str = if t == Type::Str { "string" } else { t.into() };
                Err(self.raise(ExcType::IndexError, format!("{kind} index out of range")))
            }
            SeqRead::NotSequence => {
                let type_name = self.type_name(obj);
                Err(self.raise(
                    ExcType::TypeError,
                    format!("'{type_name}' object does not support indexing"),
                ))
            }
        }
    }

    /// Replaces `obj[index]`, taking ownership of `value`.
    pub fn seq_set_item(&mut self, obj: &Value, index: i64, value: Value) -> RunResult<()> {
        if let Value::Ref(id) = obj
            && let HeapData::List(items) = self.heap.get_mut(*id)
        {
            if let Some(i) = normalize_index(index, items.len()) {
                let old = std::mem::replace(&mut items[i], value);
                old.drop_with_heap(&mut self.heap);
                return Ok(());
            }
            value.drop_with_heap(&mut self.heap);
            return Err(self.raise(ExcType::IndexError, "list assignment index out of range"));
        }
        value.drop_with_heap(&mut self.heap);
        let type_name = self.type_name(obj);
        Err(self.raise(
            ExcType::TypeError,
            format!("'{type_name}' object does not support item assignment"),
        ))
    }

    /// Removes `obj[index]`, shifting later items down.
    pub fn seq_del_item(&mut self, obj: &Value, index: i64) -> RunResult<()> {
        if let Value::Ref(id) = obj
            && let HeapData::List(items) = self.heap.get_mut(*id)
        {
            if let Some(i) = normalize_index(index, items.len()) {
                let old = items.remove(i);
                old.drop_with_heap(&mut self.heap);
                return Ok(());
            }
            return Err(self.raise(ExcType::IndexError, "list assignment index out of range"));
        }
        let type_name = self.type_name(obj);
        Err(self.raise(
            ExcType::TypeError,
            format!("'{type_name}' object doesn't support item deletion"),
        ))
    }

    /// Reads `obj[key]` through the mapping protocol with a string key.
    pub fn mapping_get_item(&mut self, obj: &Value, key: &str) -> RunResult<Value> {
        if let Value::Ref(id) = obj
            && let HeapData::Dict(dict) = self.heap.get(*id)
        {
            if let Some(value) = dict.get_str(key) {
                return Ok(value.clone_with_heap(&self.heap));
            }
            return Err(self.raise(ExcType::KeyError, repr_str(key)));
        }
        Err(self.not_a_mapping(obj))
    }

    /// Stores `obj[key] = value` with a string key, taking ownership of `value`.
    pub fn mapping_set_item(&mut self, obj: &Value, key: &str, value: Value) -> RunResult<()> {
        if let Value::Ref(id) = obj
            && matches!(self.heap.get(*id), HeapData::Dict(_))
        {
            return self.dict_set_str(*id, key, value);
        }
        value.drop_with_heap(&mut self.heap);
        Err(self.not_a_mapping(obj))
    }

    /// Stores `obj[key] = value` with any guest key, taking ownership of both.
    ///
    /// Dicts take any hashable key; lists take an integer index.
    pub fn set_item(&mut self, obj: &Value, key: Value, value: Value) -> RunResult<()> {
        if let Value::Ref(id) = obj {
            match (self.heap.get(*id), key.as_int()) {
                (HeapData::Dict(_), _) => return self.dict_insert(*id, key, value),
                (HeapData::List(_), Some(index)) => return self.seq_set_item(obj, index, value),
                _ => {}
            }
        }
        key.drop_with_heap(&mut self.heap);
        value.drop_with_heap(&mut self.heap);
        let type_name = self.type_name(obj);
        Err(self.raise(
            ExcType::TypeError,
            format!("'{type_name}' object does not support item assignment"),
        ))
    }

    /// Removes `obj[key]` with a string key.
    pub fn mapping_del_item(&mut self, obj: &Value, key: &str) -> RunResult<()> {
        if let Value::Ref(id) = obj
            && matches!(self.heap.get(*id), HeapData::Dict(_))
        {
            if self.dict_remove_str(*id, key) {
                return Ok(());
            }
            return Err(self.raise(ExcType::KeyError, repr_str(key)));
        }
        Err(self.not_a_mapping(obj))
    }

    /// Snapshot of a mapping's `(key, value)` pairs in insertion order.
    ///
    /// Every key and value in the result is a new reference.
    pub fn mapping_items(&mut self, obj: &Value) -> RunResult<Vec<(Value, Value)>> {
        if let Value::Ref(id) = obj
            && let HeapData::Dict(dict) = self.heap.get(*id)
        {
            return Ok(dict
                .iter()
                .map(|(k, v)| (k.clone_with_heap(&self.heap), v.clone_with_heap(&self.heap)))
                .collect());
        }
        Err(self.not_a_mapping(obj))
    }

    fn not_a_mapping(&mut self, obj: &Value) -> RunError {
        let t = obj.py_type(&self.heap);
        if t.is_sequence() {
            let name: &'static str = t.into();
            return self.raise(
                ExcType::TypeError,
                format!("{name} indices must be integers or slices, not str"),
            );
        }
        let type_name = self.type_name(obj);
        self.raise(ExcType::TypeError, format!("'{type_name}' object is not subscriptable"))
    }

    /// Length of a sized value. Instances are sized through `__len__`.
    ///
    /// Values without a length raise `TypeError`; callers that need to tell
    /// "no length" apart from a real length check the error.
    pub fn len(&mut self, obj: &Value) -> RunResult<usize> {
        if let Value::Ref(id) = obj {
            match self.heap.get(*id) {
                HeapData::Str(s) => return Ok(s.chars().count()),
                HeapData::List(items) | HeapData::Tuple(items) => return Ok(items.len()),
                HeapData::Dict(dict) => return Ok(dict.len()),
                HeapData::Instance(_) => {
                    if let Some(result) = self.call_dunder(obj, "__len__") {
                        let value = result?;
                        return self.len_result(value);
                    }
                }
                _ => {}
            }
        }
        let type_name = self.type_name(obj);
        Err(self.raise(ExcType::TypeError, format!("object of type '{type_name}' has no len()")))
    }

    pub(super) fn len_result(&mut self, value: Value) -> RunResult<usize> {
        match value {
            Value::Int(n) => usize::try_from(n)
                .map_err(|_| self.raise(ExcType::ValueError, "__len__() should return >= 0")),
            Value::Bool(b) => Ok(usize::from(b)),
            other => {
                let type_name = self.type_name(&other);
                other.drop_with_heap(&mut self.heap);
                Err(self.raise(
                    ExcType::TypeError,
                    format!("'{type_name}' object cannot be interpreted as an integer"),
                ))
            }
        }
    }
}
