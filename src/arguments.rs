use std::{
    collections::VecDeque,
    error::Error,
    fmt::{self, Display},
};

use indexmap::IndexMap;

use crate::{FromObject, Object, ObjectMismatch, Signature};

/// Positional and keyword arguments assembled for one constructor call.
///
/// Constructors take what they need out of the bag; anything left behind
/// after the call is reported as unexpected.
#[derive(Debug, Default, Clone)]
pub struct Arguments {
    positional: VecDeque<Object>,
    keyword: IndexMap<String, Object>,
}

impl Arguments {
    /// Arguments from already-built values.
    pub fn new(positional: Vec<Object>, keyword: IndexMap<String, Object>) -> Self {
        Self {
            positional: positional.into(),
            keyword,
        }
    }

    /// Binds leading positional arguments to the declared parameters, in order.
    ///
    /// Positional arguments beyond the declared parameters stay positional.
    pub fn bind(&mut self, signature: &Signature) -> Result<(), ArgumentError> {
        if self.positional.is_empty() {
            return Ok(());
        }
        let mut bound = IndexMap::with_capacity(self.keyword.len() + self.positional.len());
        for param in signature.params() {
            let Some(value) = self.positional.pop_front() else {
                break;
            };
            if self.keyword.contains_key(param.name()) {
                return Err(ArgumentError::Duplicate(param.name().to_string()));
            }
            bound.insert(param.name().to_string(), value);
        }
        bound.extend(self.keyword.drain(..));
        self.keyword = bound;
        Ok(())
    }

    /// True when a keyword argument named `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.keyword.contains_key(name)
    }

    /// Number of positional arguments left.
    pub fn positional_len(&self) -> usize {
        self.positional.len()
    }

    /// Takes a required keyword argument.
    pub fn take<T: FromObject>(&mut self, name: &str) -> Result<T, ArgumentError> {
        let object = self
            .keyword
            .shift_remove(name)
            .ok_or_else(|| ArgumentError::Missing(name.to_string()))?;
        convert(name, object)
    }

    /// Takes an optional keyword argument. An explicit `None` counts as absent.
    pub fn take_opt<T: FromObject>(&mut self, name: &str) -> Result<Option<T>, ArgumentError> {
        match self.keyword.shift_remove(name) {
            None | Some(Object::None) => Ok(None),
            Some(object) => convert(name, object).map(Some),
        }
    }

    /// Takes a keyword argument, falling back to `default` when absent.
    pub fn take_or<T: FromObject>(&mut self, name: &str, default: T) -> Result<T, ArgumentError> {
        Ok(self.take_opt(name)?.unwrap_or(default))
    }

    /// Takes the next unbound positional argument.
    pub fn next_positional<T: FromObject>(&mut self) -> Result<Option<T>, ArgumentError> {
        match self.positional.pop_front() {
            None => Ok(None),
            Some(object) => convert("*", object).map(Some),
        }
    }

    /// Takes every remaining positional argument.
    pub fn take_rest(&mut self) -> Vec<Object> {
        self.positional.drain(..).collect()
    }

    /// Takes every remaining keyword argument.
    pub fn take_keywords(&mut self) -> IndexMap<String, Object> {
        self.keyword.drain(..).collect()
    }

    /// Fails if anything was left untaken.
    pub fn ensure_consumed(&self) -> Result<(), ArgumentError> {
        if let Some(name) = self.keyword.keys().next() {
            return Err(ArgumentError::Unexpected(name.clone()));
        }
        if !self.positional.is_empty() {
            return Err(ArgumentError::TooManyPositional(self.positional.len()));
        }
        Ok(())
    }
}

fn convert<T: FromObject>(name: &str, object: Object) -> Result<T, ArgumentError> {
    T::from_object(object).map_err(|source| ArgumentError::Conversion {
        name: name.to_string(),
        source,
    })
}

/// A constructor call could not be matched to its arguments.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ArgumentError {
    /// A required argument was not given.
    Missing(String),
    /// An argument was given that the constructor does not accept.
    Unexpected(String),
    /// An argument was given both by position and by name.
    Duplicate(String),
    /// More positional arguments than the constructor accepts.
    TooManyPositional(usize),
    /// An argument had the wrong shape.
    Conversion {
        /// The argument name.
        name: String,
        /// What went wrong.
        source: ObjectMismatch,
    },
}

impl Display for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentError::Missing(name) => write!(f, "missing required argument '{name}'"),
            ArgumentError::Unexpected(name) => write!(f, "unexpected argument '{name}'"),
            ArgumentError::Duplicate(name) => write!(f, "multiple values for argument '{name}'"),
            ArgumentError::TooManyPositional(count) => {
                write!(f, "{count} positional argument(s) left over")
            }
            ArgumentError::Conversion { name, source } => {
                write!(f, "invalid argument '{name}': {source}")
            }
        }
    }
}

impl Error for ArgumentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ArgumentError::Conversion { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Signature, TypeHint};

    #[test]
    fn positional_arguments_bind_in_declared_order() {
        let signature = Signature::new()
            .param("x", TypeHint::Str)
            .param("y", TypeHint::Int);
        let mut args = Arguments::new(
            vec![Object::from("a"), Object::Int(1), Object::Int(2)],
            IndexMap::new(),
        );
        args.bind(&signature).unwrap();

        assert_eq!(args.take::<String>("x").unwrap(), "a");
        assert_eq!(args.take::<i64>("y").unwrap(), 1);
        assert_eq!(args.positional_len(), 1);
        assert_eq!(
            args.ensure_consumed(),
            Err(ArgumentError::TooManyPositional(1))
        );
    }

    #[test]
    fn duplicate_binding_is_rejected() {
        let signature = Signature::new().param("x", TypeHint::Str);
        let mut keyword = IndexMap::new();
        keyword.insert("x".to_string(), Object::from("b"));
        let mut args = Arguments::new(vec![Object::from("a")], keyword);

        assert_eq!(
            args.bind(&signature),
            Err(ArgumentError::Duplicate("x".to_string()))
        );
    }

    #[test]
    fn leftover_keywords_are_unexpected() {
        let mut keyword = IndexMap::new();
        keyword.insert("x".to_string(), Object::Int(1));
        keyword.insert("z".to_string(), Object::Int(2));
        let mut args = Arguments::new(Vec::new(), keyword);

        assert_eq!(args.take_opt::<i64>("y").unwrap(), None);
        assert_eq!(args.take::<i64>("x").unwrap(), 1);
        assert_eq!(
            args.ensure_consumed(),
            Err(ArgumentError::Unexpected("z".to_string()))
        );
    }
}
