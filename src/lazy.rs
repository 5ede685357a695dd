use std::{
    fmt::{self, Debug, Display},
    rc::Rc,
};


use crate::{
    Builder, ConfigurationError, ConfigurationErrorKind, Constructor, Context, FromObject, Object,
    ParamPath, Result, TypeHint, Value, builtins,
};

/// A validated config subtree whose construction is deferred.
///
/// The handle is checked when it is created and after every [`update`](Lazy::update),
/// so a later [`construct`](Lazy::construct) only fails in the constructors
/// themselves.
#[derive(Clone)]
pub struct Lazy {
    config: Box<Value>,
    path: ParamPath,
    hint: TypeHint,
    context: Rc<Context>,
    builder: Builder,
}

impl Debug for Lazy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy")
            .field("config", &self.config)
            .field("path", &self.path)
            .field("hint", &self.hint)
            .finish_non_exhaustive()
    }
}

impl Lazy {
    pub(crate) fn new(
        config: Value,
        path: ParamPath,
        hint: TypeHint,
        context: Rc<Context>,
        builder: Builder,
    ) -> Result<Self> {
        log::trace!("Entering `Lazy::new` at [{path}] with {hint}");

        builder.validate_at(config.clone(), &path, &hint, &context)?;
        Ok(Self {
            config: Box::new(config),
            path,
            hint,
            context,
            builder,
        })
    }

    /// The current config snapshot.
    pub fn config(&self) -> &Value {
        &self.config
    }

    /// Where the handle sits in the enclosing build.
    pub fn path(&self) -> &ParamPath {
        &self.path
    }

    /// The annotation the handle constructs.
    pub fn type_hint(&self) -> &TypeHint {
        &self.hint
    }

    /// The context of the build that created the handle.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// The builder the handle constructs with.
    pub fn builder(&self) -> &Builder {
        &self.builder
    }

    /// The constructor the current snapshot selects, if one can be named.
    ///
    /// A type key wins; otherwise the annotated class, or the builtin for a
    /// primitive annotation.
    pub fn constructor(&self) -> Result<Option<Constructor>> {
        if let Some(constructor) = self
            .builder
            .constructor_for(&self.config, &self.path, &self.hint)?
        {
            return Ok(Some(constructor));
        }
        let hint = self.hint.remove_optional();
        Ok(match hint {
            TypeHint::Class(class, _) => Some(Constructor::Class(class.clone())),
            other => builtins::for_hint(other).cloned().map(Constructor::Function),
        })
    }

    /// Sets fields of the stored config and revalidates.
    ///
    /// The snapshot only changes when the updated config validates.
    pub fn update<F, V>(&mut self, fields: impl IntoIterator<Item = (F, V)>) -> Result<()>
    where
        F: Into<FieldPath>,
        V: Into<Value>,
    {
        let config = self.patched(fields)?;
        self.builder
            .validate_at(config.clone(), &self.path, &self.hint, &self.context)?;
        *self.config = config;
        Ok(())
    }

    /// Builds the stored config.
    pub fn construct(&self) -> Result<Object> {
        log::trace!("Entering `Lazy::construct` at [{}]", self.path);

        self.builder
            .construct_at(Value::clone(&self.config), &self.path, &self.hint, &self.context)
    }

    /// Builds a copy of the stored config with `overrides` applied.
    ///
    /// The stored config is left untouched.
    pub fn construct_with<F, V>(&self, overrides: impl IntoIterator<Item = (F, V)>) -> Result<Object>
    where
        F: Into<FieldPath>,
        V: Into<Value>,
    {
        log::trace!("Entering `Lazy::construct_with` at [{}]", self.path);

        let config = self.patched(overrides)?;
        self.builder
            .construct_at(config, &self.path, &self.hint, &self.context)
    }

    /// Builds the stored config and converts the result.
    pub fn construct_as<T: FromObject>(&self) -> Result<T> {
        let object = self.construct()?;
        T::from_object(object).map_err(ConfigurationError::from)
    }

    fn patched<F, V>(&self, fields: impl IntoIterator<Item = (F, V)>) -> Result<Value>
    where
        F: Into<FieldPath>,
        V: Into<Value>,
    {
        let mut config = Value::clone(&self.config);
        for (field, value) in fields {
            field
                .into()
                .apply(&mut config, value.into())
                .map_err(|kind| ConfigurationError::at(self.path.clone(), kind))?;
        }
        Ok(config)
    }
}

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSegment {
    /// A mapping key.
    Name(String),
    /// A sequence index; negative values count from the end.
    Index(i64),
    /// Appends to a sequence. Only valid as the last segment.
    Append,
}

impl Display for FieldSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldSegment::Name(name) => f.write_str(name),
            FieldSegment::Index(index) => write!(f, "{index}"),
            FieldSegment::Append => f.write_str("+"),
        }
    }
}

impl From<&str> for FieldSegment {
    fn from(value: &str) -> Self {
        if value == "+" {
            FieldSegment::Append
        } else if let Ok(index) = value.parse() {
            FieldSegment::Index(index)
        } else {
            FieldSegment::Name(value.to_string())
        }
    }
}

/// Addresses a location inside a config, e.g. `"model.layers.0"` or `"items.+"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<FieldSegment>,
}

impl FieldPath {
    /// A path over explicit segments.
    pub fn new(segments: impl IntoIterator<Item = FieldSegment>) -> Self {
        Self {
            segments: segments.into_iter().collect(),
        }
    }

    /// The path's segments.
    pub fn segments(&self) -> &[FieldSegment] {
        &self.segments
    }

    /// Writes `value` at this path inside `target`.
    pub fn apply(&self, target: &mut Value, value: Value) -> std::result::Result<(), ConfigurationErrorKind> {
        let invalid = |reason: String| ConfigurationErrorKind::InvalidFieldPath {
            field: self.to_string(),
            reason,
        };

        let Some((last, parents)) = self.segments.split_last() else {
            return Err(invalid("empty path".to_string()));
        };

        let mut current = target;
        for segment in parents {
            current = match (current, segment) {
                (Value::Map(map), FieldSegment::Append) => map.get_mut("+"),
                (Value::Map(map), segment) => map.get_mut(segment.to_string().as_str()),
                (Value::Seq(items), FieldSegment::Index(index)) => {
                    let len = items.len();
                    resolve_index(*index, len).and_then(|i| items.get_mut(i))
                }
                (Value::Seq(_), segment) => {
                    return Err(invalid(format!("'{segment}' is not a sequence index")));
                }
                (other, _) => {
                    return Err(invalid(format!("cannot descend into {}", other.type_hint())));
                }
            }
            .ok_or_else(|| invalid(format!("'{segment}' does not exist")))?;
        }

        match (current, last) {
            (Value::Map(map), segment) => {
                map.insert(segment.to_string(), value);
            }
            (Value::Seq(items), FieldSegment::Append) => items.push(value),
            (Value::Seq(items), FieldSegment::Index(index)) => {
                let slot = resolve_index(*index, items.len())
                    .and_then(|i| items.get_mut(i))
                    .ok_or_else(|| invalid(format!("index {index} is out of range")))?;
                *slot = value;
            }
            (Value::Seq(_), segment) => {
                return Err(invalid(format!("'{segment}' is not a sequence index")));
            }
            (other, _) => {
                return Err(invalid(format!("cannot set a field of {}", other.type_hint())));
            }
        }
        Ok(())
    }
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    if index < 0 {
        let back = usize::try_from(index.unsigned_abs()).ok()?;
        len.checked_sub(back)
    } else {
        usize::try_from(index).ok()
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl From<&str> for FieldPath {
    fn from(value: &str) -> Self {
        Self::new(value.split('.').map(FieldSegment::from))
    }
}

impl From<String> for FieldPath {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<i64> for FieldPath {
    fn from(value: i64) -> Self {
        Self::new([FieldSegment::Index(value)])
    }
}

impl From<Vec<FieldSegment>> for FieldPath {
    fn from(value: Vec<FieldSegment>) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Value {
        Value::map([
            ("name", Value::from("base")),
            (
                "layers",
                Value::seq([Value::map([("size", 8)]), Value::map([("size", 16)])]),
            ),
        ])
    }

    #[test]
    fn parses_dotted_paths() {
        let path = FieldPath::from("layers.-1.+");
        assert_eq!(
            path.segments(),
            &[
                FieldSegment::Name("layers".to_string()),
                FieldSegment::Index(-1),
                FieldSegment::Append,
            ]
        );
        assert_eq!(path.to_string(), "layers.-1.+");
    }

    #[test]
    fn sets_nested_fields() {
        let mut value = config();
        FieldPath::from("layers.1.size").apply(&mut value, Value::Int(32)).unwrap();
        FieldPath::from("layers.-2.size").apply(&mut value, Value::Int(4)).unwrap();
        FieldPath::from("name").apply(&mut value, Value::from("tuned")).unwrap();

        assert_eq!(value.get("name"), Some(&Value::from("tuned")));
        let Some(Value::Seq(layers)) = value.get("layers") else {
            panic!("layers should stay a sequence");
        };
        assert_eq!(layers[0].get("size"), Some(&Value::Int(4)));
        assert_eq!(layers[1].get("size"), Some(&Value::Int(32)));
    }

    #[test]
    fn appends_to_sequences() {
        let mut value = config();
        FieldPath::from("layers.+")
            .apply(&mut value, Value::map([("size", 64)]))
            .unwrap();
        assert_eq!(value.get("layers").and_then(Value::len), Some(3));
    }

    #[test]
    fn numeric_segments_are_keys_in_mappings() {
        let mut value = Value::map([("0", 1)]);
        FieldPath::from("0").apply(&mut value, Value::Int(2)).unwrap();
        assert_eq!(value.get("0"), Some(&Value::Int(2)));
    }

    #[test]
    fn rejects_unreachable_fields() {
        let mut value = config();
        for field in ["missing.size", "layers.5.size", "layers.size", "name.first"] {
            let err = FieldPath::from(field).apply(&mut value, Value::Null).unwrap_err();
            assert!(
                matches!(err, ConfigurationErrorKind::InvalidFieldPath { .. }),
                "{field}: {err}"
            );
        }
        assert_eq!(value, config());
    }
}
