use std::sync::atomic::{AtomicUsize, Ordering};

use crate::value::Value;

/// Counter for [`BridgeId`]s, shared by every bridge in the process.
static NEXT_BRIDGE_ID: AtomicUsize = AtomicUsize::new(0);

/// Identity of the [`Bridge`](crate::Bridge) a proxy belongs to.
///
/// Proxy ids are only unique within one bridge, and a proxy's guest reference
/// points into that bridge's heap, so every proxy carries its owner's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BridgeId(usize);

impl BridgeId {
    pub(crate) fn next() -> Self {
        Self(NEXT_BRIDGE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Stable host identity of a proxy object.
///
/// Ids are handed out by a [`Bridge`](crate::Bridge) in creation order and never
/// reused within it, so hosts can key their own object tables on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct ProxyId(u64);

impl ProxyId {
    /// Creates a proxy ID from a raw integer.
    #[must_use]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer identifier.
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Name of the host class entry every proxy is an instance of.
pub const PROXY_CLASS_NAME: &str = "Python";

/// Host-side stand-in for a guest value.
///
/// Binds a host identity to exactly one owned guest reference. The reference is
/// released when the proxy is handed back to
/// [`Bridge::release_proxy`](crate::Bridge::release_proxy); since that consumes
/// the proxy, it cannot be released twice. `ProxyObject` is deliberately neither
/// `Clone` nor `Copy`.
#[derive(Debug)]
pub struct ProxyObject {
    id: ProxyId,
    owner: BridgeId,
    object: Value,
}

impl ProxyObject {
    pub(crate) fn new(id: ProxyId, owner: BridgeId, object: Value) -> Self {
        Self { id, owner, object }
    }

    #[must_use]
    pub fn id(&self) -> ProxyId {
        self.id
    }

    /// The bridge that created this proxy.
    #[must_use]
    pub fn owner(&self) -> BridgeId {
        self.owner
    }

    /// The host class entry name, `"Python"`.
    #[must_use]
    pub fn class_name(&self) -> &'static str {
        PROXY_CLASS_NAME
    }

    /// The bound guest reference. Borrowed: the proxy keeps ownership.
    #[must_use]
    pub fn object(&self) -> &Value {
        &self.object
    }

    pub(crate) fn into_object(self) -> Value {
        self.object
    }
}

/// Proxies compare by host identity.
impl PartialEq for ProxyObject {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.id == other.id
    }
}
