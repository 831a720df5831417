use indexmap::IndexMap;

use super::Type;
use crate::{
    exception::ExcType,
    heap::{Heap, HeapData, HeapId, push_child},
    value::Value,
};

/// Hashable projection of a guest value, used as the lookup key of a [`Dict`].
///
/// Numbers are unified the way the guest compares them: `True`, `1` and `1.0`
/// all map to `Int(1)`. Strings hash by content, tuples by their items, and every
/// other heap object by identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DictKey {
    None,
    Int(i64),
    /// Bit pattern of a non-integral float.
    Float(u64),
    Str(String),
    Tuple(Vec<DictKey>),
    Identity(HeapId),
    Type(Type),
    ExcType(ExcType),
}

impl DictKey {
    /// Computes the key for `value`, or returns the type of the unhashable part.
    pub fn from_value(value: &Value, heap: &Heap) -> Result<Self, Type> {
        match value {
            Value::None => Ok(Self::None),
            Value::Bool(b) => Ok(Self::Int(i64::from(*b))),
            Value::Int(i) => Ok(Self::Int(*i)),
            Value::Float(f) => Ok(float_key(*f)),
            Value::Type(t) => Ok(Self::Type(*t)),
            Value::ExcType(e) => Ok(Self::ExcType(*e)),
            Value::Ref(id) => match heap.get(*id) {
                HeapData::Str(s) => Ok(Self::Str(s.clone())),
                HeapData::Tuple(items) => items
                    .iter()
                    .map(|item| Self::from_value(item, heap))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Self::Tuple),
                HeapData::List(_) => Err(Type::List),
                HeapData::Dict(_) => Err(Type::Dict),
                _ => Ok(Self::Identity(*id)),
            },
            #[cfg(feature = "ref-count-panic")]
            Value::Dereferenced => panic!("Cannot hash Dereferenced object"),
        }
    }
}

#[expect(clippy::cast_possible_truncation)]
fn float_key(f: f64) -> DictKey {
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        DictKey::Int(f as i64)
    } else {
        DictKey::Float(f.to_bits())
    }
}

/// Insertion-ordered guest dict.
///
/// Each entry stores the original key value next to its value so that iteration
/// can hand the guest key back unchanged. The dict owns one reference to every key
/// and every value it holds.
#[derive(Debug, Default)]
pub struct Dict {
    entries: IndexMap<DictKey, (Value, Value), ahash::RandomState>,
}

impl Dict {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Borrows the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &DictKey) -> Option<&Value> {
        self.entries.get(key).map(|(_, value)| value)
    }

    /// Borrows the value stored under a string key.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&Value> {
        self.get(&DictKey::Str(key.to_owned()))
    }

    /// Stores `value` under `key`, taking ownership of both.
    ///
    /// When the key already exists its original key object is kept and the pair
    /// handed back holds the now-unused new key and the replaced value; the caller
    /// must release both.
    pub fn insert(&mut self, hash_key: DictKey, key: Value, value: Value) -> Option<(Value, Value)> {
        match self.entries.get_mut(&hash_key) {
            Some((_, slot)) => {
                let old = std::mem::replace(slot, value);
                Some((key, old))
            }
            None => {
                self.entries.insert(hash_key, (key, value));
                None
            }
        }
    }

    /// Removes an entry preserving the order of the remaining ones.
    ///
    /// Returns the stored key and value; the caller must release both.
    pub fn remove(&mut self, key: &DictKey) -> Option<(Value, Value)> {
        self.entries.shift_remove(key)
    }

    /// Iterates stored `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &(Value, Value)> {
        self.entries.values()
    }

    pub(crate) fn collect_child_ids(&mut self, out: &mut Vec<HeapId>) {
        for (key, value) in self.entries.values_mut() {
            push_child(key, out);
            push_child(value, out);
        }
    }
}
