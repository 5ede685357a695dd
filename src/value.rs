use std::fmt::{self, Display};

use indexmap::IndexMap;

use crate::{Object, Placeholder, TypeHint};

/// An untyped config tree, as produced by a document loader or written by hand.
///
/// Mappings keep insertion order so keyword arguments are built in the order
/// they appear in the config.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The null scalar.
    #[default]
    Null,
    /// A boolean scalar.
    Bool(bool),
    /// An integer scalar.
    Int(i64),
    /// A floating point scalar.
    Float(f64),
    /// A string scalar.
    Str(String),
    /// An ordered sequence.
    Seq(Vec<Value>),
    /// An unordered collection. Duplicates are removed when the set is built.
    Set(Vec<Value>),
    /// A string-keyed mapping.
    Map(IndexMap<String, Value>),
    /// A typed stand-in for a value supplied later.
    Placeholder(Placeholder),
    /// An already-built value embedded in the config.
    Object(Object),
}

impl Value {
    /// Builds a mapping from key/value pairs.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// Builds a sequence from values.
    pub fn seq<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Value::Seq(items.into_iter().map(Into::into).collect())
    }

    /// True for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The mapping, if this value is one.
    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// The mapping, mutably, if this value is one.
    pub fn as_map_mut(&mut self) -> Option<&mut IndexMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// The string, if this value is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The integer, if this value is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Looks up a key of a mapping.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// True when this is a mapping carrying `key`.
    pub fn has_key(&self, key: &str) -> bool {
        self.as_map().is_some_and(|map| map.contains_key(key))
    }

    /// Whether the value can be walked element by element as a sequence.
    pub fn is_iterable(&self) -> bool {
        match self {
            Value::Seq(_) | Value::Set(_) | Value::Str(_) => true,
            Value::Object(object) => object.is_sequence(),
            _ => false,
        }
    }

    /// Elements of a sequence-like value. Strings yield one-character strings.
    pub fn into_elements(self) -> Option<Vec<Value>> {
        match self {
            Value::Seq(items) | Value::Set(items) => Some(items),
            Value::Str(s) => Some(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            Value::Object(object) => object.into_sequence().map(|items| {
                items.into_iter().map(Value::Object).collect()
            }),
            _ => None,
        }
    }

    /// Number of elements of a sequence-like value.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Seq(items) | Value::Set(items) => Some(items.len()),
            Value::Str(s) => Some(s.chars().count()),
            Value::Map(map) => Some(map.len()),
            Value::Object(object) => object.as_slice().map(<[Object]>::len),
            _ => None,
        }
    }

    /// The runtime type of the value.
    pub fn type_hint(&self) -> TypeHint {
        match self {
            Value::Null => TypeHint::None,
            Value::Bool(_) => TypeHint::Bool,
            Value::Int(_) => TypeHint::Int,
            Value::Float(_) => TypeHint::Float,
            Value::Str(_) => TypeHint::Str,
            Value::Seq(_) => TypeHint::List(None),
            Value::Set(_) => TypeHint::Set(None),
            Value::Map(_) => TypeHint::Mapping(None),
            Value::Placeholder(placeholder) => placeholder.type_hint().clone(),
            Value::Object(object) => object.type_hint(),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(value: Vec<V>) -> Self {
        Value::seq(value)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(value: IndexMap<String, Value>) -> Self {
        Value::Map(value)
    }
}

impl From<Placeholder> for Value {
    fn from(value: Placeholder) -> Self {
        Value::Placeholder(value)
    }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Value::Object(value)
    }
}

impl<V: Into<Value>> From<Option<V>> for Value {
    fn from(value: Option<V>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Seq(items) => {
                f.write_str("[")?;
                write_items(f, items)?;
                f.write_str("]")
            }
            Value::Set(items) => {
                f.write_str("{")?;
                write_items(f, items)?;
                f.write_str("}")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key:?}: {value}")?;
                }
                f.write_str("}")
            }
            Value::Placeholder(placeholder) => write!(f, "{placeholder}"),
            Value::Object(object) => write!(f, "{object}"),
        }
    }
}
