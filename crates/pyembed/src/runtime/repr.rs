//! String conversion, truthiness and three-way comparison.

use std::{cmp::Ordering, fmt::Write};

use super::Runtime;
use crate::{
    exception::{ExcType, RunResult},
    heap::{DropWithHeap, HeapData},
    value::Value,
};

/// Quotes a string the way the guest's `repr()` does.
pub(crate) fn repr_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Returns a string representation of a float matching the guest's `repr()`.
///
/// Uses `ryu` for the shortest round-tripping digits, then fixes up the
/// exponent and integral forms: `1e+20`, `3.0`, `inf`, `nan`.
pub(crate) fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_owned();
    }
    if f.is_infinite() {
        return if f.is_sign_negative() { "-inf" } else { "inf" }.to_owned();
    }
    let mut buffer = ryu::Buffer::new();
    let s = buffer.format_finite(f);
    if let Some(e_pos) = s.find('e') {
        let (mantissa, exp_part) = s.split_at(e_pos);
        let exp = &exp_part[1..];
        // ryu writes "1e20", the guest writes "1e+20"
        if !exp.starts_with('-') {
            return format!("{mantissa}e+{exp}");
        }
        return s.to_owned();
    }
    if !s.contains('.') {
        return format!("{s}.0");
    }
    s.to_owned()
}

/// Heap payload summarised for formatting, so the heap borrow ends before
/// nested formatting needs `&mut Runtime`.
enum Shape {
    Text(String),
    Seq {
        items: Vec<Value>,
        open: char,
        close: char,
        one_tuple: bool,
    },
    Pairs(Vec<(Value, Value)>),
    Method { name: String, receiver: Value },
    Instance { module: String, class: String },
}

/// Numeric view used by comparison. `bool` compares as `int`.
#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

fn as_num(value: &Value) -> Option<Num> {
    match value {
        Value::Bool(b) => Some(Num::Int(i64::from(*b))),
        Value::Int(i) => Some(Num::Int(*i)),
        Value::Float(f) => Some(Num::Float(*f)),
        _ => None,
    }
}

impl Runtime {
    /// Guest `str(obj)` as a new reference. Strings are returned as-is.
    pub fn str(&mut self, obj: &Value) -> RunResult<Value> {
        if obj.as_str(&self.heap).is_some() {
            return Ok(obj.clone_with_heap(&self.heap));
        }
        let s = self.str_string(obj)?;
        self.new_str(s)
    }

    /// Guest `str(obj)` as a Rust string. Instances use their `__str__` hook.
    pub fn str_string(&mut self, obj: &Value) -> RunResult<String> {
        let mut out = String::new();
        self.format_value(obj, false, 0, &mut out)?;
        Ok(out)
    }

    fn shape(&self, obj: &Value, repr: bool) -> Shape {
        let Value::Ref(id) = obj else {
            return Shape::Text(String::new());
        };
        let heap = &self.heap;
        match heap.get(*id) {
            HeapData::Str(s) => Shape::Text(if repr { repr_str(s) } else { s.clone() }),
            HeapData::List(items) => Shape::Seq {
                items: items.iter().map(|v| v.clone_with_heap(heap)).collect(),
                open: '[',
                close: ']',
                one_tuple: false,
            },
            HeapData::Tuple(items) => Shape::Seq {
                items: items.iter().map(|v| v.clone_with_heap(heap)).collect(),
                open: '(',
                close: ')',
                one_tuple: items.len() == 1,
            },
            HeapData::Dict(dict) => Shape::Pairs(
                dict.iter()
                    .map(|(k, v)| (k.clone_with_heap(heap), v.clone_with_heap(heap)))
                    .collect(),
            ),
            HeapData::Module(module) => Shape::Text(format!("<module '{}'>", module.name())),
            HeapData::Class(class) => Shape::Text(format!("<class '{}.{}'>", class.module(), class.name())),
            HeapData::Function(func) => Shape::Text(format!("<built-in function {}>", func.name())),
            HeapData::BoundMethod(method) => Shape::Method {
                name: match heap.get(method.func_id()) {
                    HeapData::Function(func) => func.name().to_owned(),
                    _ => String::new(),
                },
                receiver: method.receiver().clone_with_heap(heap),
            },
            HeapData::Instance(inst) => match heap.get(inst.class_id()) {
                HeapData::Class(class) => Shape::Instance {
                    module: class.module().to_owned(),
                    class: class.name().to_owned(),
                },
                _ => Shape::Text("<object>".to_owned()),
            },
        }
    }

    fn format_value(&mut self, obj: &Value, repr: bool, depth: usize, out: &mut String) -> RunResult<()> {
        match obj {
            Value::None => out.push_str("None"),
            Value::Bool(true) => out.push_str("True"),
            Value::Bool(false) => out.push_str("False"),
            Value::Int(i) => {
                let _ = write!(out, "{i}");
            }
            Value::Float(f) => out.push_str(&float_repr(*f)),
            Value::Type(t) => {
                let _ = write!(out, "<class '{t}'>");
            }
            Value::ExcType(e) => {
                let _ = write!(out, "<class '{e}'>");
            }
            Value::Ref(id) => {
                if depth > self.limits().data_depth() {
                    out.push_str("...");
                    return Ok(());
                }
                match self.shape(obj, repr) {
                    Shape::Text(text) => out.push_str(&text),
                    Shape::Seq {
                        items,
                        open,
                        close,
                        one_tuple,
                    } => {
                        out.push(open);
                        let result = self.format_items(&items, depth, out);
                        items.drop_with_heap(&mut self.heap);
                        result?;
                        if one_tuple {
                            out.push(',');
                        }
                        out.push(close);
                    }
                    Shape::Pairs(pairs) => {
                        out.push('{');
                        let result = self.format_pairs(&pairs, depth, out);
                        pairs.drop_with_heap(&mut self.heap);
                        result?;
                        out.push('}');
                    }
                    Shape::Method { name, receiver } => {
                        let class = self.type_name(&receiver);
                        let _ = write!(out, "<bound method {class}.{name} of ");
                        let result = self.format_value(&receiver, true, depth + 1, out);
                        receiver.drop_with_heap(&mut self.heap);
                        result?;
                        out.push('>');
                    }
                    Shape::Instance { module, class } => {
                        if !repr && let Some(result) = self.call_dunder(obj, "__str__") {
                            let value = result?;
                            return self.push_str_result(value, out);
                        }
                        let _ = write!(out, "<{module}.{class} object at 0x{:x}>", id.index());
                    }
                }
            }
            #[cfg(feature = "ref-count-panic")]
            Value::Dereferenced => panic!("Cannot format Dereferenced object"),
        }
        Ok(())
    }

    fn format_items(&mut self, items: &[Value], depth: usize, out: &mut String) -> RunResult<()> {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.format_value(item, true, depth + 1, out)?;
        }
        Ok(())
    }

    fn format_pairs(&mut self, pairs: &[(Value, Value)], depth: usize, out: &mut String) -> RunResult<()> {
        for (i, (key, value)) in pairs.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.format_value(key, true, depth + 1, out)?;
            out.push_str(": ");
            self.format_value(value, true, depth + 1, out)?;
        }
        Ok(())
    }

    fn push_str_result(&mut self, value: Value, out: &mut String) -> RunResult<()> {
        if let Some(s) = value.as_str(&self.heap) {
            out.push_str(s);
            value.drop_with_heap(&mut self.heap);
            return Ok(());
        }
        let type_name = self.type_name(&value);
        value.drop_with_heap(&mut self.heap);
        Err(self.raise(
            ExcType::TypeError,
            format!("__str__ returned non-string (type {type_name})"),
        ))
    }

    /// Guest truthiness.
    ///
    /// `None`, `False`, zero and empty containers are false. Instances ask
    /// `__bool__`, then `__len__`, and are true otherwise.
    pub fn is_true(&mut self, obj: &Value) -> RunResult<bool> {
        match obj {
            Value::None => Ok(false),
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            Value::Float(f) => Ok(*f != 0.0),
            Value::Type(_) | Value::ExcType(_) => Ok(true),
            Value::Ref(id) => match self.heap.get(*id) {
                HeapData::Str(s) => Ok(!s.is_empty()),
                HeapData::List(items) | HeapData::Tuple(items) => Ok(!items.is_empty()),
                HeapData::Dict(dict) => Ok(!dict.is_empty()),
                HeapData::Instance(_) => self.instance_truth(obj),
                _ => Ok(true),
            },
            #[cfg(feature = "ref-count-panic")]
            Value::Dereferenced => panic!("Cannot test Dereferenced object"),
        }
    }

    fn instance_truth(&mut self, obj: &Value) -> RunResult<bool> {
        if let Some(result) = self.call_dunder(obj, "__bool__") {
            return match result? {
                Value::Bool(b) => Ok(b),
                other => {
                    let type_name = self.type_name(&other);
                    other.drop_with_heap(&mut self.heap);
                    Err(self.raise(
                        ExcType::TypeError,
                        format!("__bool__ should return bool, returned {type_name}"),
                    ))
                }
            };
        }
        if let Some(result) = self.call_dunder(obj, "__len__") {
            let value = result?;
            return self.len_result(value).map(|len| len != 0);
        }
        Ok(true)
    }

    /// Three-way comparison of two guest values.
    ///
    /// Numbers compare numerically across `bool`/`int`/`float`, strings by code
    /// point, lists and tuples element-wise. Identical objects compare equal.
    /// Anything else raises `TypeError`.
    pub fn compare(&mut self, a: &Value, b: &Value) -> RunResult<Ordering> {
        self.compare_at(a, b, 0)
    }

    fn compare_at(&mut self, a: &Value, b: &Value, depth: usize) -> RunResult<Ordering> {
        if let (Some(x), Some(y)) = (as_num(a), as_num(b)) {
            return self.compare_numbers(x, y);
        }
        if a.is(b) {
            return Ok(Ordering::Equal);
        }
        if let (Value::Ref(x), Value::Ref(y)) = (a, b) {
            let heap = &self.heap;
            let pair = match (heap.get(*x), heap.get(*y)) {
                (HeapData::Str(s), HeapData::Str(t)) => return Ok(s.as_str().cmp(t.as_str())),
                (HeapData::List(p), HeapData::List(q)) | (HeapData::Tuple(p), HeapData::Tuple(q)) => Some((
                    p.iter().map(|v| v.clone_with_heap(heap)).collect::<Vec<_>>(),
                    q.iter().map(|v| v.clone_with_heap(heap)).collect::<Vec<_>>(),
                )),
                _ => None,
            };
            if let Some((left, right)) = pair {
                let result = self.compare_sequences(&left, &right, depth);
                left.drop_with_heap(&mut self.heap);
                right.drop_with_heap(&mut self.heap);
                return result;
            }
        }
        let left = self.type_name(a);
        let right = self.type_name(b);
        Err(self.raise(
            ExcType::TypeError,
            format!("'<' not supported between instances of '{left}' and '{right}'"),
        ))
    }

    fn compare_sequences(&mut self, left: &[Value], right: &[Value], depth: usize) -> RunResult<Ordering> {
        if depth >= self.limits().data_depth() {
            return Err(self.raise(
                ExcType::RecursionError,
                "maximum recursion depth exceeded in comparison",
            ));
        }
        for (x, y) in left.iter().zip(right) {
            match self.compare_at(x, y, depth + 1)? {
                Ordering::Equal => {}
                other => return Ok(other),
            }
        }
        Ok(left.len().cmp(&right.len()))
    }

    fn compare_numbers(&mut self, x: Num, y: Num) -> RunResult<Ordering> {
        let ordering = match (x, y) {
            (Num::Int(a), Num::Int(b)) => Some(a.cmp(&b)),
            (Num::Int(a), Num::Float(b)) => (a as f64).partial_cmp(&b),
            (Num::Float(a), Num::Int(b)) => a.partial_cmp(&(b as f64)),
            (Num::Float(a), Num::Float(b)) => a.partial_cmp(&b),
        };
        ordering.ok_or_else(|| self.raise(ExcType::ValueError, "cannot order a nan value"))
    }
}
