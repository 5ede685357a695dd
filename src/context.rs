use std::{cell::RefCell, collections::HashMap};

use crate::{Class, Value};

/// State shared by every node of one top-level build.
///
/// Holds the root config as it was handed in and a scratch space callbacks
/// use to carry values from one node to another. Lazy handles created during
/// the build keep the context alive and reuse it when they construct.
#[derive(Debug, Default)]
pub struct Context {
    config: Value,
    state: RefCell<HashMap<String, Value>>,
    // class of the last node validated without construction
    resolved: RefCell<Option<Class>>,
}

impl Context {
    /// A fresh context for a build of `config`.
    pub fn new(config: Value) -> Self {
        Self {
            config,
            state: RefCell::default(),
            resolved: RefCell::default(),
        }
    }

    /// The root config of the build.
    pub fn config(&self) -> &Value {
        &self.config
    }

    /// Reads a scratch value.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.borrow().get(key).cloned()
    }

    /// Writes a scratch value, returning the previous one.
    pub fn set(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.state.borrow_mut().insert(key.into(), value)
    }

    /// Replaces a scratch value with `f(previous)`.
    ///
    /// No borrow is held while `f` runs, so it may read or write the context
    /// itself. The key is absent from the context until `f` returns.
    pub fn update<F>(&self, key: &str, f: F)
    where
        F: FnOnce(Option<Value>) -> Value,
    {
        let previous = self.state.borrow_mut().remove(key);
        let next = f(previous);
        self.state.borrow_mut().insert(key.to_string(), next);
    }

    /// Removes a scratch value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.state.borrow_mut().remove(key)
    }

    pub(crate) fn set_resolved(&self, class: Option<Class>) {
        *self.resolved.borrow_mut() = class;
    }

    pub(crate) fn take_resolved(&self) -> Option<Class> {
        self.resolved.borrow_mut().take()
    }
}
