use std::{
    error::Error,
    fmt::{self, Display},
};

use indexmap::{IndexMap, map::Entry};
use kdl::{KdlDocument, KdlEntry, KdlError as KdlParseError, KdlNode, KdlValue};

use crate::{
    Value,
    builder::{DEFAULT_ARGS_KEY, DEFAULT_TYPE_KEY},
};

/// Error type for loading KDL config documents.
#[derive(Debug)]
pub struct DocumentError {
    kind: DocumentErrorKind,
}

impl DocumentError {
    /// Returns a reference to the error kind for detailed error inspection.
    pub fn kind(&self) -> &DocumentErrorKind {
        &self.kind
    }
}

impl Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = &self.kind;
        write!(f, "{kind}")
    }
}

impl Error for DocumentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            DocumentErrorKind::Parse(kdl_error) => Some(kdl_error),
            _ => None,
        }
    }
}

impl<K: Into<DocumentErrorKind>> From<K> for DocumentError {
    fn from(value: K) -> Self {
        let kind = value.into();
        DocumentError { kind }
    }
}

/// Detailed classification of document errors.
#[derive(Debug)]
#[non_exhaustive]
pub enum DocumentErrorKind {
    /// Failed to parse the KDL document.
    Parse(KdlParseError),
    /// An integer does not fit in 64 bits.
    IntegerOverflow(i128),
    /// The same key appears twice in one mapping.
    DuplicateKey(String),
    /// A `-` item appears in a node that is not a pure sequence.
    SequenceItemInMapping(String),
}

impl Display for DocumentErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentErrorKind::Parse(kdl_error) => write!(f, "{kdl_error}"),
            DocumentErrorKind::IntegerOverflow(integer) => {
                write!(f, "integer {integer} does not fit in 64 bits")
            }
            DocumentErrorKind::DuplicateKey(key) => write!(f, "duplicate key '{key}'"),
            DocumentErrorKind::SequenceItemInMapping(node) => write!(
                f,
                "node '{node}' mixes sequence items (`-`) with named fields"
            ),
        }
    }
}

impl From<KdlParseError> for DocumentErrorKind {
    fn from(value: KdlParseError) -> Self {
        Self::Parse(value)
    }
}

type Result<T> = std::result::Result<T, DocumentError>;

const SEQUENCE_ITEM: &str = "-";

/// Turns KDL documents into config values.
///
/// Every top-level node becomes a key of the root mapping. Within a node:
///
/// - a node with arguments only is `null` (none), a scalar (one) or a
///   sequence (several);
/// - a node whose children are all named `-` is a sequence of those children;
/// - anything else is a mapping. The node's type annotation becomes the type
///   key, its arguments the args key, and its properties and children its
///   fields.
///
/// ```kdl
/// (Linear)model {
///     layers {
///         - 16
///         - 32
///     }
///     activation "relu"
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Loader {
    type_key: String,
    args_key: String,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader {
    /// A loader writing the default `@type` and `*` keys.
    pub fn new() -> Self {
        Self {
            type_key: DEFAULT_TYPE_KEY.to_string(),
            args_key: DEFAULT_ARGS_KEY.to_string(),
        }
    }

    /// Sets the key type annotations are written to.
    pub fn with_type_key(mut self, key: impl Into<String>) -> Self {
        self.type_key = key.into();
        self
    }

    /// Sets the key node arguments are written to, when a node is a mapping.
    pub fn with_args_key(mut self, key: impl Into<String>) -> Self {
        self.args_key = key.into();
        self
    }

    /// Parses `kdl` into a config value.
    pub fn load(&self, kdl: &str) -> Result<Value> {
        log::trace!("Entering `load` method");

        let document: KdlDocument = kdl.parse()?;
        log::trace!("KDL parsed");

        let mut root = IndexMap::with_capacity(document.nodes().len());
        for node in document.nodes() {
            insert_unique(&mut root, node.name().value(), self.node_value(node)?)?;
        }
        Ok(Value::Map(root))
    }

    fn node_value(&self, node: &KdlNode) -> Result<Value> {
        log::trace!("Entering `node_value` method for `{}`", node.name().value());

        let (arguments, properties): (Vec<&KdlEntry>, Vec<&KdlEntry>) =
            node.entries().iter().partition(|entry| entry.name().is_none());
        let children = node.children().map(KdlDocument::nodes);

        if node.ty().is_none() && properties.is_empty() && children.is_none() {
            return match arguments.as_slice() {
                [] => Ok(Value::Null),
                [single] => scalar(single.value()),
                several => several
                    .iter()
                    .map(|entry| scalar(entry.value()))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Seq),
            };
        }

        if let Some(children) = children {
            let is_sequence = node.ty().is_none()
                && properties.is_empty()
                && arguments.is_empty()
                && !children.is_empty()
                && children.iter().all(|child| child.name().value() == SEQUENCE_ITEM);
            if is_sequence {
                return children
                    .iter()
                    .map(|child| self.node_value(child))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Seq);
            }
        }

        let mut map = IndexMap::new();
        if let Some(ty) = node.ty() {
            map.insert(self.type_key.clone(), Value::Str(ty.value().to_string()));
        }
        if !arguments.is_empty() {
            let arguments = arguments
                .iter()
                .map(|entry| scalar(entry.value()))
                .collect::<Result<Vec<_>>>()?;
            map.insert(self.args_key.clone(), Value::Seq(arguments));
        }
        for property in properties {
            if let Some(name) = property.name() {
                insert_unique(&mut map, name.value(), scalar(property.value())?)?;
            }
        }
        for child in children.unwrap_or_default() {
            let name = child.name().value();
            if name == SEQUENCE_ITEM {
                return Err(DocumentErrorKind::SequenceItemInMapping(
                    node.name().value().to_string(),
                )
                .into());
            }
            insert_unique(&mut map, name, self.node_value(child)?)?;
        }
        Ok(Value::Map(map))
    }
}

fn insert_unique(map: &mut IndexMap<String, Value>, key: &str, value: Value) -> Result<()> {
    match map.entry(key.to_string()) {
        Entry::Occupied(_) => Err(DocumentErrorKind::DuplicateKey(key.to_string()).into()),
        Entry::Vacant(slot) => {
            slot.insert(value);
            Ok(())
        }
    }
}

fn scalar(value: &KdlValue) -> Result<Value> {
    Ok(match value {
        KdlValue::String(string) => Value::Str(string.clone()),
        KdlValue::Integer(integer) => Value::Int(
            i64::try_from(*integer).map_err(|_| DocumentErrorKind::IntegerOverflow(*integer))?,
        ),
        KdlValue::Float(float) => Value::Float(*float),
        KdlValue::Bool(bool) => Value::Bool(*bool),
        KdlValue::Null => Value::Null,
    })
}

/// Parses a KDL document into a config value with the default keys.
pub fn from_str(kdl: &str) -> Result<Value> {
    log::trace!("Entering `from_str` function");

    Loader::new().load(kdl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_only_nodes_are_scalars() {
        let value = from_str("a 1\nb\nc 1 2.5 \"x\" #true #null").unwrap();
        assert_eq!(value.get("a"), Some(&Value::Int(1)));
        assert_eq!(value.get("b"), Some(&Value::Null));
        assert_eq!(
            value.get("c"),
            Some(&Value::seq([
                Value::Int(1),
                Value::Float(2.5),
                Value::from("x"),
                Value::Bool(true),
                Value::Null,
            ]))
        );
    }

    #[test]
    fn empty_children_block_is_an_empty_mapping() {
        let value = from_str("a {}").unwrap();
        assert_eq!(value.get("a"), Some(&Value::Map(IndexMap::new())));
    }

    #[test]
    fn integer_overflow_is_reported() {
        let err = from_str("a 99999999999999999999").unwrap_err();
        assert!(matches!(err.kind(), DocumentErrorKind::IntegerOverflow(_)));
    }
}
