//! Class naming, comparison, casting and counting.

use std::cmp::Ordering;

use super::CastKind;
use crate::{
    bridge::Bridge,
    error::BridgeError,
    heap::DropWithHeap,
    object::HostValue,
    proxy::{PROXY_CLASS_NAME, ProxyObject},
    tracer::{BridgeTracer, Operation},
    value::Value,
};

impl<Tr: BridgeTracer> Bridge<Tr> {
    /// `Python.<type name>`, or `Python.<module>` for the parent. Falls back to the
    /// bare host class name when the guest cannot tell.
    pub(super) fn class_name_of(&mut self, proxy: &ProxyObject, parent: bool) -> String {
        let name = if parent {
            self.attribute_string(proxy.object(), "__module__")
        } else {
            let class = self.runtime.class_of(proxy.object());
            let name = self.attribute_string(&class, "__name__");
            class.drop_with_heap(self.runtime.heap_mut());
            name
        };
        match name {
            Some(name) => format!("{PROXY_CLASS_NAME}.{name}"),
            None => PROXY_CLASS_NAME.to_owned(),
        }
    }

    /// Guest `str(getattr(object, name))`, with any guest error cleared.
    fn attribute_string(&mut self, object: &Value, name: &str) -> Option<String> {
        let Ok(attr) = self.runtime.getattr(object, name) else {
            self.runtime.clear_error();
            return None;
        };
        let text = self.runtime.str_string(&attr);
        attr.drop_with_heap(self.runtime.heap_mut());
        text.map_err(|_| self.runtime.clear_error()).ok()
    }

    pub(super) fn compare_objects(&mut self, a: &ProxyObject, b: &ProxyObject) -> Result<Ordering, BridgeError> {
        self.runtime
            .compare(a.object(), b.object())
            .map_err(|_| BridgeError::Compare {
                cause: self.guest_error(Operation::Compare),
            })
    }

    pub(super) fn cast_object(&mut self, proxy: &ProxyObject, kind: CastKind) -> Result<HostValue, BridgeError> {
        if kind != CastKind::String {
            return Err(BridgeError::UnsupportedCast(kind));
        }
        match self.runtime.str(proxy.object()) {
            Ok(text) => {
                let host = self.to_host(&text);
                text.drop_with_heap(self.runtime.heap_mut());
                Ok(host)
            }
            Err(_) => Err(BridgeError::Stringify {
                cause: self.guest_error(Operation::Cast),
            }),
        }
    }

    /// Length of the proxied object; `None` when it has none or `__len__` fails.
    pub(super) fn count_elements(&mut self, proxy: &ProxyObject) -> Option<usize> {
        match self.runtime.len(proxy.object()) {
            Ok(len) => Some(len),
            Err(_) => {
                self.runtime.clear_error();
                None
            }
        }
    }
}
