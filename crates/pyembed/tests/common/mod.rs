//! Shared guest fixture: a `shapes` module with a few classes and functions,
//! plus helpers for building bridges and proxies.

#![allow(dead_code, clippy::allow_attributes, reason = "each test binary uses a subset of the fixture")]

use pyembed::{
    Args, Bridge, BridgeTracer, ClassDef, DropWithHeap, ExcType, HostValue, ModuleDef, ProxyObject, RecordingTracer,
    ResourceLimits, RunResult, Runtime, Value,
};

// =============================================================================
// Guest module
// =============================================================================

/// `shapes`: `Point`, `Bag` (sized), `Flag` (truthy hook), `Mute` (unprintable),
/// `Plain` (nothing special) and a handful of functions.
pub fn shapes_module() -> ModuleDef {
    ModuleDef::new("shapes")
        .class(
            ClassDef::new("Point")
                .method("__init__", &["self", "x", "y"], point_init)
                .method("__str__", &["self"], point_str)
                .method("norm", &["self"], point_norm)
                .method("describe", &["self", "prefix", "suffix"], point_describe)
                .method("moved", &["self", "dx", "dy"], point_moved)
                .method("fail", &["self"], point_fail)
                .attr("dims", 2_i64),
        )
        .class(
            ClassDef::new("Bag")
                .method("__init__", &["self", "n"], bag_init)
                .method("__len__", &["self"], bag_len),
        )
        .class(
            ClassDef::new("Flag")
                .method("__init__", &["self", "on"], flag_init)
                .method("__bool__", &["self"], flag_bool),
        )
        .class(ClassDef::new("Mute").method("__str__", &["self"], mute_str))
        .class(ClassDef::new("Plain"))
        .function("echo", &["value"], echo)
        .function("add", &["a", "b"], add)
        .function("collect", &["*items"], collect)
        .function("pair", &[], pair)
        .function("nested", &[], nested)
        .function("missing", &[], missing)
        .function("muted_error", &[], muted_error)
        .function("odd_namespace", &[], odd_namespace)
        .constant("answer", 42_i64)
        .constant("version", "1.0")
}

fn set_fields<const N: usize>(rt: &mut Runtime, this: &Value, fields: [(&str, Value); N]) -> RunResult<Value> {
    let mut fields = fields.into_iter();
    while let Some((name, value)) = fields.next() {
        if let Err(err) = rt.setattr(this, name, value) {
            for (_, rest) in fields {
                rest.drop_with_heap(rt.heap_mut());
            }
            return Err(err);
        }
    }
    Ok(Value::None)
}

fn int_attr(rt: &mut Runtime, this: &Value, name: &str) -> RunResult<i64> {
    let value = rt.getattr(this, name)?;
    if let Some(i) = value.as_int() {
        return Ok(i);
    }
    value.drop_with_heap(rt.heap_mut());
    Err(rt.raise(ExcType::TypeError, format!("{name} must be an int")))
}

fn point_xy(rt: &mut Runtime, this: &Value) -> RunResult<(i64, i64)> {
    Ok((int_attr(rt, this, "x")?, int_attr(rt, this, "y")?))
}

fn point_init(rt: &mut Runtime, args: Args) -> RunResult<Value> {
    let [this, x, y] = args.into_array(rt)?;
    let result = set_fields(rt, &this, [("x", x), ("y", y)]);
    this.drop_with_heap(rt.heap_mut());
    result
}

fn point_str(rt: &mut Runtime, args: Args) -> RunResult<Value> {
    let [this] = args.into_array(rt)?;
    let xy = point_xy(rt, &this);
    this.drop_with_heap(rt.heap_mut());
    let (x, y) = xy?;
    rt.new_str(format!("Point({x}, {y})"))
}

fn point_norm(rt: &mut Runtime, args: Args) -> RunResult<Value> {
    let [this] = args.into_array(rt)?;
    let xy = point_xy(rt, &this);
    this.drop_with_heap(rt.heap_mut());
    let (x, y) = xy?;
    Ok(Value::Int(x * x + y * y))
}

fn point_describe(rt: &mut Runtime, args: Args) -> RunResult<Value> {
    let [this, prefix, suffix] = args.into_array(rt)?;
    let result = describe(rt, &this, &prefix, &suffix);
    for value in [this, prefix, suffix] {
        value.drop_with_heap(rt.heap_mut());
    }
    result
}

fn describe(rt: &mut Runtime, this: &Value, prefix: &Value, suffix: &Value) -> RunResult<Value> {
    let (x, y) = point_xy(rt, this)?;
    let prefix = rt.str_string(prefix)?;
    let suffix = rt.str_string(suffix)?;
    rt.new_str(format!("{prefix}{x},{y}{suffix}"))
}

fn point_moved(rt: &mut Runtime, args: Args) -> RunResult<Value> {
    let [this, dx, dy] = args.into_array(rt)?;
    let result = moved(rt, &this, &dx, &dy);
    for value in [this, dx, dy] {
        value.drop_with_heap(rt.heap_mut());
    }
    result
}

fn moved(rt: &mut Runtime, this: &Value, dx: &Value, dy: &Value) -> RunResult<Value> {
    let (x, y) = point_xy(rt, this)?;
    let (Some(dx), Some(dy)) = (dx.as_int(), dy.as_int()) else {
        return Err(rt.raise(ExcType::TypeError, "offsets must be ints"));
    };
    let class = rt.getattr(this, "__class__")?;
    let mut args = Args::new();
    args.push(Value::Int(x + dx));
    args.push(Value::Int(y + dy));
    let result = rt.call_args(&class, args);
    class.drop_with_heap(rt.heap_mut());
    result
}

fn point_fail(rt: &mut Runtime, args: Args) -> RunResult<Value> {
    args.drop_with_heap(rt.heap_mut());
    Err(rt.raise(ExcType::ValueError, "boom"))
}

fn bag_init(rt: &mut Runtime, args: Args) -> RunResult<Value> {
    let [this, n] = args.into_array(rt)?;
    let result = set_fields(rt, &this, [("n", n)]);
    this.drop_with_heap(rt.heap_mut());
    result
}

fn bag_len(rt: &mut Runtime, args: Args) -> RunResult<Value> {
    let [this] = args.into_array(rt)?;
    let n = rt.getattr(&this, "n");
    this.drop_with_heap(rt.heap_mut());
    n
}

fn flag_init(rt: &mut Runtime, args: Args) -> RunResult<Value> {
    let [this, on] = args.into_array(rt)?;
    let result = set_fields(rt, &this, [("on", on)]);
    this.drop_with_heap(rt.heap_mut());
    result
}

fn flag_bool(rt: &mut Runtime, args: Args) -> RunResult<Value> {
    let [this] = args.into_array(rt)?;
    let on = rt.getattr(&this, "on");
    this.drop_with_heap(rt.heap_mut());
    on
}

fn mute_str(rt: &mut Runtime, args: Args) -> RunResult<Value> {
    args.drop_with_heap(rt.heap_mut());
    Err(rt.raise(ExcType::ValueError, "no str"))
}

fn echo(rt: &mut Runtime, args: Args) -> RunResult<Value> {
    let [value] = args.into_array(rt)?;
    Ok(value)
}

fn add(rt: &mut Runtime, args: Args) -> RunResult<Value> {
    let [a, b] = args.into_array(rt)?;
    match (a.as_int(), b.as_int()) {
        (Some(a), Some(b)) => Ok(Value::Int(a + b)),
        _ => {
            a.drop_with_heap(rt.heap_mut());
            b.drop_with_heap(rt.heap_mut());
            Err(rt.raise(ExcType::TypeError, "add() expects ints"))
        }
    }
}

fn collect(rt: &mut Runtime, args: Args) -> RunResult<Value> {
    rt.new_list(args.into_iter().collect())
}

fn pair(rt: &mut Runtime, args: Args) -> RunResult<Value> {
    args.drop_with_heap(rt.heap_mut());
    let two = rt.new_str("two")?;
    rt.new_tuple(vec![Value::Int(1), two])
}

/// `{"xs": [1, 2], "none": None}`
fn nested(rt: &mut Runtime, args: Args) -> RunResult<Value> {
    args.drop_with_heap(rt.heap_mut());
    let xs = rt.new_list(vec![Value::Int(1), Value::Int(2)])?;
    let dict = match rt.new_dict() {
        Ok(dict) => dict,
        Err(err) => {
            xs.drop_with_heap(rt.heap_mut());
            return Err(err);
        }
    };
    let filled = rt
        .mapping_set_item(&dict, "xs", xs)
        .and_then(|()| rt.mapping_set_item(&dict, "none", Value::None));
    match filled {
        Ok(()) => Ok(dict),
        Err(err) => {
            dict.drop_with_heap(rt.heap_mut());
            Err(err)
        }
    }
}

fn missing(rt: &mut Runtime, args: Args) -> RunResult<Value> {
    args.drop_with_heap(rt.heap_mut());
    Err(rt.raise(ExcType::KeyError, "'missing'"))
}

/// Raises `ValueError` whose value is a `Mute` instance, which cannot be stringified.
fn muted_error(rt: &mut Runtime, args: Args) -> RunResult<Value> {
    args.drop_with_heap(rt.heap_mut());
    let module = rt.import_module("shapes")?;
    let class = rt.getattr(&module, "Mute");
    module.drop_with_heap(rt.heap_mut());
    let class = class?;
    let instance = rt.call_args(&class, Args::new());
    class.drop_with_heap(rt.heap_mut());
    let instance = instance?;
    Err(rt.raise_value(Value::ExcType(ExcType::ValueError), instance))
}

/// A `Plain` instance whose `__dict__` holds `a = 1`, then a `Mute` instance key,
/// then `z = 3`.
fn odd_namespace(rt: &mut Runtime, args: Args) -> RunResult<Value> {
    args.drop_with_heap(rt.heap_mut());
    let module = rt.import_module("shapes")?;
    let instance = new_instance(rt, &module, "Plain");
    let key = match &instance {
        Ok(_) => new_instance(rt, &module, "Mute"),
        Err(_) => Ok(Value::None),
    };
    module.drop_with_heap(rt.heap_mut());
    let instance = instance?;
    let filled = key.and_then(|key| fill_odd_namespace(rt, &instance, key));
    match filled {
        Ok(()) => Ok(instance),
        Err(err) => {
            instance.drop_with_heap(rt.heap_mut());
            Err(err)
        }
    }
}

fn fill_odd_namespace(rt: &mut Runtime, instance: &Value, key: Value) -> RunResult<()> {
    if let Err(err) = rt.setattr(instance, "a", Value::Int(1)) {
        key.drop_with_heap(rt.heap_mut());
        return Err(err);
    }
    let namespace = match rt.getattr(instance, "__dict__") {
        Ok(namespace) => namespace,
        Err(err) => {
            key.drop_with_heap(rt.heap_mut());
            return Err(err);
        }
    };
    let stored = rt.set_item(&namespace, key, Value::Int(2));
    namespace.drop_with_heap(rt.heap_mut());
    stored?;
    rt.setattr(instance, "z", Value::Int(3))
}

fn new_instance(rt: &mut Runtime, module: &Value, class: &str) -> RunResult<Value> {
    let class = rt.getattr(module, class)?;
    let instance = rt.call_args(&class, Args::new());
    class.drop_with_heap(rt.heap_mut());
    instance
}

// =============================================================================
// Bridge helpers
// =============================================================================

pub fn bridge() -> Bridge {
    let mut bridge = Bridge::new(ResourceLimits::new());
    bridge.install_module(&shapes_module()).unwrap();
    bridge
}

pub fn traced_bridge() -> Bridge<RecordingTracer> {
    let mut bridge = Bridge::with_tracer(ResourceLimits::new(), RecordingTracer::new());
    bridge.install_module(&shapes_module()).unwrap();
    bridge
}

pub fn s(text: &str) -> HostValue {
    HostValue::String(text.to_owned())
}

/// Constructs `shapes.<class>` with the given arguments.
pub fn construct<Tr: BridgeTracer>(bridge: &mut Bridge<Tr>, class: &str, args: Vec<HostValue>) -> ProxyObject {
    let mut full = vec![s("shapes"), s(class)];
    full.extend(args);
    bridge.construct(&full).unwrap()
}

pub fn point<Tr: BridgeTracer>(bridge: &mut Bridge<Tr>, x: i64, y: i64) -> ProxyObject {
    construct(bridge, "Point", vec![HostValue::Int(x), HostValue::Int(y)])
}

/// Converts a host value to the guest side and proxies the result, so host
/// containers can be exercised as guest objects.
pub fn guest<Tr: BridgeTracer>(bridge: &mut Bridge<Tr>, value: HostValue) -> ProxyObject {
    let object = bridge.to_guest(&value).unwrap();
    bridge.release(value);
    bridge.proxy(object)
}

pub fn guest_list<Tr: BridgeTracer>(bridge: &mut Bridge<Tr>, items: &[i64]) -> ProxyObject {
    guest(bridge, HostValue::List(items.iter().copied().map(HostValue::Int).collect()))
}

/// Asserts every proxy was released and nothing outlives the interpreter.
pub fn assert_clean<Tr: BridgeTracer>(bridge: Bridge<Tr>) {
    assert_eq!(bridge.live_proxies(), 0, "proxies still alive");
    assert!(!bridge.runtime().err_occurred(), "guest error left pending");
    let stats = bridge.finalize();
    assert_eq!(
        stats.live_objects, 0,
        "leaked guest objects: {obt:?}",
        obt = stats.objects_by_type
    );
}
