// User callbacks — named hooks dispatched from UserLayer nodes
//
// A host application registers a callback under a name; any `UserLayer` node
// whose `cbackName` parameter matches will call it during forward (with the
// node input) and backward (with the incoming gradient). The callback returns
// the tensor to pass on: the node output on forward, the gradient for the
// predecessors on backward.
//
// Callbacks run inside the engine traversal, under the net's lock. Calling
// back into the same net from inside a callback would deadlock.

use std::collections::HashMap;
use std::fmt;

use wren_core::error::{Error, Result};
use wren_core::{Shape4, Tensor};

/// Arguments of one callback invocation.
#[derive(Debug, Clone, Copy)]
pub struct UserCall<'a> {
    /// Registered callback name.
    pub name: &'a str,
    /// Node that triggered the call.
    pub node: &'a str,
    /// `true` during the forward pass, `false` during backward.
    pub forward: bool,
    pub shape: Shape4,
    pub data: &'a [f32],
}

/// A host-side callback invoked by name from inside forward/backward.
pub trait UserCallback: Send + Sync {
    fn call(&self, call: &UserCall<'_>) -> Result<Tensor>;
}

impl<F> UserCallback for F
where
    F: Fn(&UserCall<'_>) -> Result<Tensor> + Send + Sync,
{
    fn call(&self, call: &UserCall<'_>) -> Result<Tensor> {
        self(call)
    }
}

/// Name → callback map owned by a net.
#[derive(Default)]
pub struct CallbackRegistry {
    callbacks: HashMap<String, Box<dyn UserCallback>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the callback stored under `name`.
    pub fn register(&mut self, name: impl Into<String>, callback: impl UserCallback + 'static) {
        self.callbacks.insert(name.into(), Box::new(callback));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.callbacks.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Invoke the callback named in `call`.
    pub fn dispatch(&self, call: &UserCall<'_>) -> Result<Tensor> {
        let callback = self
            .callbacks
            .get(call.name)
            .ok_or_else(|| Error::CallbackNotFound {
                name: call.name.to_string(),
                node: call.node.to_string(),
            })?;
        callback.call(call)
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.callbacks.keys().collect();
        names.sort();
        f.debug_struct("CallbackRegistry")
            .field("callbacks", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call<'a>(name: &'a str, data: &'a [f32]) -> UserCall<'a> {
        UserCall {
            name,
            node: "user1",
            forward: true,
            shape: Shape4::new(data.len(), 1, 1, 1),
            data,
        }
    }

    #[test]
    fn test_dispatch_closure() {
        let mut reg = CallbackRegistry::new();
        reg.register("double", |c: &UserCall<'_>| {
            let data: Vec<f32> = c.data.iter().map(|v| v * 2.0).collect();
            Tensor::from_vec(c.shape, data)
        });
        assert!(reg.contains("double"));
        let out = reg.dispatch(&call("double", &[1.0, 2.0])).unwrap();
        assert_eq!(out.data(), &[2.0, 4.0]);
    }

    #[test]
    fn test_dispatch_unknown_name() {
        let reg = CallbackRegistry::new();
        let err = reg.dispatch(&call("missing", &[1.0])).unwrap_err();
        assert!(err.to_string().contains("not found cbname 'missing'"));
    }

    #[test]
    fn test_register_replaces() {
        let mut reg = CallbackRegistry::new();
        reg.register("cb", |c: &UserCall<'_>| Tensor::from_slice(c.shape, c.data));
        reg.register("cb", |c: &UserCall<'_>| Ok(Tensor::zeros(c.shape)));
        assert_eq!(reg.len(), 1);
        let out = reg.dispatch(&call("cb", &[3.0])).unwrap();
        assert_eq!(out.data(), &[0.0]);
    }
}
