use indexmap::IndexMap;

use crate::proxy::ProxyObject;

/// Insertion-ordered host map with string keys.
pub type HostMap = IndexMap<String, HostValue>;

/// A handle to a host resource (file, stream, connection ...).
///
/// Resources have no guest counterpart: converting one to the guest side always
/// fails.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    pub kind: String,
    pub id: u64,
}

impl ResourceHandle {
    #[must_use]
    pub fn new(kind: impl Into<String>, id: u64) -> Self {
        Self { kind: kind.into(), id }
    }
}

/// A value owned by the host runtime.
///
/// Scalars and containers cross the boundary by conversion. Guest values without a
/// host equivalent arrive as [`HostValue::Proxy`], which owns a guest reference;
/// for that reason `HostValue` is not `Clone`, and values that may contain
/// proxies must be handed back to [`Bridge::release`](crate::Bridge::release).
///
/// `PartialEq` compares proxies by host identity.
#[derive(Debug, PartialEq)]
pub enum HostValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Ordered list (a host array with sequential keys).
    List(Vec<Self>),
    /// Ordered map with string keys (a host associative array).
    Map(HostMap),
    Resource(ResourceHandle),
    Proxy(ProxyObject),
}

impl HostValue {
    /// Host type name, as the host would report it.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) | Self::Map(_) => "array",
            Self::Resource(_) => "resource",
            Self::Proxy(_) => "object",
        }
    }

    /// The string a scalar takes when used as an array key or name.
    ///
    /// Follows host string conversion: `null` and `false` become `""`, `true`
    /// becomes `"1"`, integral floats lose their fraction. Containers, resources
    /// and proxies have no plain key form and return `None`; proxies are
    /// stringified through the bridge instead.
    #[must_use]
    pub fn to_key_string(&self) -> Option<String> {
        match self {
            Self::Null | Self::Bool(false) => Some(String::new()),
            Self::Bool(true) => Some("1".to_owned()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(float_key(*f)),
            Self::String(s) => Some(s.clone()),
            Self::List(_) | Self::Map(_) | Self::Resource(_) | Self::Proxy(_) => None,
        }
    }

    /// Converts to a natural JSON value.
    ///
    /// Proxies and resources have no JSON form of their own and become tagged
    /// objects (`{"$proxy": 3}`, `{"$resource": "stream"}`); non-finite floats
    /// become `null`.
    #[must_use]
    pub fn to_json_value(&self) -> serde_json::Value {
        use serde_json::{Value as JV, json};
        match self {
            Self::Null => JV::Null,
            Self::Bool(b) => JV::Bool(*b),
            Self::Int(i) => json!(i),
            Self::Float(f) => {
                if f.is_finite() {
                    json!(f)
                } else {
                    JV::Null
                }
            }
            Self::String(s) => JV::String(s.clone()),
            Self::List(items) => JV::Array(items.iter().map(Self::to_json_value).collect()),
            Self::Map(map) => JV::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json_value())).collect()),
            Self::Resource(handle) => json!({"$resource": handle.kind}),
            Self::Proxy(proxy) => json!({"$proxy": proxy.id().raw()}),
        }
    }
}

impl serde::Serialize for HostValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_value().serialize(serializer)
    }
}

#[expect(clippy::cast_possible_truncation, reason = "only integral floats within i64 range are cast")]
fn float_key(f: f64) -> String {
    if f.is_nan() {
        "NAN".to_owned()
    } else if f.is_infinite() {
        if f > 0.0 { "INF".to_owned() } else { "-INF".to_owned() }
    } else if f.fract() == 0.0 && f.abs() < 1e15 {
        (f as i64).to_string()
    } else {
        ryu::Buffer::new().format_finite(f).to_owned()
    }
}

impl From<()> for HostValue {
    fn from((): ()) -> Self {
        Self::Null
    }
}

impl From<bool> for HostValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for HostValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for HostValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for HostValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<Self>> for HostValue {
    fn from(v: Vec<Self>) -> Self {
        Self::List(v)
    }
}

impl From<HostMap> for HostValue {
    fn from(v: HostMap) -> Self {
        Self::Map(v)
    }
}

impl From<ResourceHandle> for HostValue {
    fn from(v: ResourceHandle) -> Self {
        Self::Resource(v)
    }
}

impl From<ProxyObject> for HostValue {
    fn from(v: ProxyObject) -> Self {
        Self::Proxy(v)
    }
}
