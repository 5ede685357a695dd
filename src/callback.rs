use std::rc::Rc;

use crate::{Builder, Context, ParamPath, TypeHint, Value};

/// Interception points of a build.
///
/// Returning `Some` replaces the config the builder continues with; `None`
/// leaves it unchanged. Both hooks default to `None`.
pub trait Callback {
    /// Called once per top-level build or validation, before the root node.
    fn on_start(
        &self,
        config: &Value,
        builder: &Builder,
        context: &Context,
        hint: &TypeHint,
    ) -> Option<Value> {
        let _ = (config, builder, context, hint);
        None
    }

    /// Called before each node is interpreted.
    fn on_build(
        &self,
        path: &ParamPath,
        config: &Value,
        builder: &Builder,
        context: &Context,
        hint: &TypeHint,
    ) -> Option<Value> {
        let _ = (path, config, builder, context, hint);
        None
    }
}

/// Runs callbacks in order, each seeing the config the previous one produced.
#[derive(Clone, Default)]
pub struct CallbackChain {
    callbacks: Vec<Rc<dyn Callback>>,
}

impl CallbackChain {
    /// A chain over `callbacks`.
    pub fn new(callbacks: impl IntoIterator<Item = Rc<dyn Callback>>) -> Self {
        Self {
            callbacks: callbacks.into_iter().collect(),
        }
    }

    /// Appends a callback.
    pub fn push(&mut self, callback: Rc<dyn Callback>) {
        self.callbacks.push(callback);
    }

    fn fold<F>(&self, config: &Value, mut hook: F) -> Option<Value>
    where
        F: FnMut(&dyn Callback, &Value) -> Option<Value>,
    {
        let mut current: Option<Value> = None;
        for callback in &self.callbacks {
            let input = current.as_ref().unwrap_or(config);
            if let Some(next) = hook(callback.as_ref(), input) {
                current = Some(next);
            }
        }
        current
    }
}

impl Callback for CallbackChain {
    fn on_start(
        &self,
        config: &Value,
        builder: &Builder,
        context: &Context,
        hint: &TypeHint,
    ) -> Option<Value> {
        self.fold(config, |callback, config| {
            callback.on_start(config, builder, context, hint)
        })
    }

    fn on_build(
        &self,
        path: &ParamPath,
        config: &Value,
        builder: &Builder,
        context: &Context,
        hint: &TypeHint,
    ) -> Option<Value> {
        self.fold(config, |callback, config| {
            callback.on_build(path, config, builder, context, hint)
        })
    }
}
