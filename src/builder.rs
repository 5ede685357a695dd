use std::{fmt, rc::Rc, sync::Arc};

use indexmap::IndexMap;

use crate::{
    ArgumentError, Arguments, Callback, CallbackChain, ConfigurationError,
    ConfigurationErrorKind, Constructor, Context, EnumMember, EnumType, FromObject, Lazy, Literal,
    Object, ParamPath, Record, RecordType, Registry, Result, Scope, Trial, TupleHint, TypeHint,
    TypeVarMap, Value, builtins,
};

pub(crate) const DEFAULT_TYPE_KEY: &str = "@type";
pub(crate) const DEFAULT_ARGS_KEY: &str = "*";

/// Whether constructors are actually called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Construct,
    Validate,
}

/// Builds object graphs from config values.
///
/// A builder is cheap to clone; lazy handles keep a clone to construct later.
#[derive(Clone)]
pub struct Builder {
    type_key: String,
    args_key: String,
    strict: bool,
    callback: Option<Rc<dyn Callback>>,
    registry: Arc<Registry>,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("type_key", &self.type_key)
            .field("args_key", &self.args_key)
            .field("strict", &self.strict)
            .field("callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}

impl Builder {
    /// A builder with the default keys over the process-wide registry.
    pub fn new() -> Self {
        Self {
            type_key: DEFAULT_TYPE_KEY.to_string(),
            args_key: DEFAULT_ARGS_KEY.to_string(),
            strict: false,
            callback: None,
            registry: Registry::global(),
        }
    }

    /// Sets the key naming the type to construct. Defaults to `@type`.
    pub fn with_type_key(mut self, key: impl Into<String>) -> Self {
        self.type_key = key.into();
        self
    }

    /// Sets the key holding positional arguments. Defaults to `*`.
    pub fn with_args_key(mut self, key: impl Into<String>) -> Self {
        self.args_key = key.into();
        self
    }

    /// In strict mode, unannotated nodes are returned raw and names are never imported.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets the callback.
    pub fn with_callback(mut self, callback: impl Callback + 'static) -> Self {
        self.callback = Some(Rc::new(callback));
        self
    }

    /// Sets several callbacks, run in order.
    pub fn with_callbacks(mut self, callbacks: impl IntoIterator<Item = Rc<dyn Callback>>) -> Self {
        self.callback = Some(Rc::new(CallbackChain::new(callbacks)));
        self
    }

    /// Resolves names through `registry` instead of the process-wide one.
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self
    }

    /// The key naming the type to construct.
    pub fn type_key(&self) -> &str {
        &self.type_key
    }

    /// The key holding positional arguments.
    pub fn args_key(&self) -> &str {
        &self.args_key
    }

    /// Whether strict mode is on.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// The registry names are resolved through.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Builds `config` against `hint`.
    pub fn build(&self, config: impl Into<Value>, hint: &TypeHint) -> Result<Object> {
        let config = config.into();
        log::trace!("Entering `build` method with {hint}");
        let context = Rc::new(Context::new(config.clone()));
        let config = self.start(config, hint, &context);
        self.build_node(config, &ParamPath::root(), hint, &context, Mode::Construct)
    }

    /// Builds `config` against `hint` and converts the result.
    pub fn build_as<T: FromObject>(&self, config: impl Into<Value>, hint: &TypeHint) -> Result<T> {
        let object = self.build(config, hint)?;
        T::from_object(object).map_err(ConfigurationError::from)
    }

    /// Runs every step of [`build`](Self::build) except calling constructors.
    ///
    /// Fails exactly where `build` would fail before any constructor runs.
    /// Nodes that would have been constructed come back as [`Object::None`].
    pub fn validate(&self, config: impl Into<Value>, hint: &TypeHint) -> Result<Object> {
        let config = config.into();
        log::trace!("Entering `validate` method with {hint}");
        let context = Rc::new(Context::new(config.clone()));
        self.validate_at(config, &ParamPath::root(), hint, &context)
    }

    pub(crate) fn validate_at(
        &self,
        config: Value,
        path: &ParamPath,
        hint: &TypeHint,
        context: &Rc<Context>,
    ) -> Result<Object> {
        let config = self.start(config, hint, context);
        self.build_node(config, path, hint, context, Mode::Validate)
    }

    pub(crate) fn construct_at(
        &self,
        config: Value,
        path: &ParamPath,
        hint: &TypeHint,
        context: &Rc<Context>,
    ) -> Result<Object> {
        self.build_node(config, path, hint, context, Mode::Construct)
    }

    /// The constructor the type key of `config` selects, if it carries one.
    pub(crate) fn constructor_for(
        &self,
        config: &Value,
        path: &ParamPath,
        hint: &TypeHint,
    ) -> Result<Option<Constructor>> {
        match config.get(&self.type_key) {
            Some(Value::Str(name)) => self.resolve(name, path, hint).map(Some),
            _ => Ok(None),
        }
    }

    fn start(&self, config: Value, hint: &TypeHint, context: &Context) -> Value {
        match &self.callback {
            Some(callback) => callback
                .on_start(&config, self, context, hint)
                .unwrap_or(config),
            None => config,
        }
    }

    fn resolve(&self, name: &str, path: &ParamPath, hint: &TypeHint) -> Result<Constructor> {
        let scope = match hint {
            TypeHint::Class(class, _) => Scope::of(class),
            _ => Scope::Default,
        };
        self.registry
            .by_name(&scope, name, !self.strict)
            .map_err(|kind| ConfigurationError::at(path.clone(), kind))
    }

    pub(crate) fn build_node(
        &self,
        config: Value,
        path: &ParamPath,
        hint: &TypeHint,
        context: &Rc<Context>,
        mode: Mode,
    ) -> Result<Object> {
        log::trace!("Entering `build_node` method at [{path}] with {hint}");

        let mut config = config;
        if let Some(callback) = &self.callback {
            if let Some(rewritten) = callback.on_build(path, &config, self, context, hint) {
                config = rewritten;
            }
        }

        let hint = hint.remove_optional();
        let fail = |kind: ConfigurationErrorKind| Err(ConfigurationError::at(path.clone(), kind));

        if let Value::Placeholder(placeholder) = &config {
            if !hint.is_any() && !placeholder.match_type_hint(hint) {
                return fail(ConfigurationErrorKind::PlaceholderMismatch {
                    expected: hint.clone(),
                    actual: placeholder.type_hint().clone(),
                });
            }
            return Ok(Object::Placeholder(placeholder.clone()));
        }

        if self.strict && hint.is_any() {
            log::warn!(
                "[{path}] Given config is not constructed because strict mode is enabled and the type annotation is not given"
            );
            return Ok(Object::from_value(config));
        }

        if config.is_null() {
            return Ok(Object::None);
        }

        let has_type_key = config.has_key(&self.type_key);

        match hint {
            TypeHint::List(elem) if config.is_iterable() => {
                let elem = elem.as_deref().unwrap_or(&TypeHint::Any);
                let items = self.build_elements(config, path, |_| elem, context, mode)?;
                return Ok(Object::List(items));
            }
            TypeHint::Set(elem) if config.is_iterable() => {
                let elem = elem.as_deref().unwrap_or(&TypeHint::Any);
                let items = self.build_elements(config, path, |_| elem, context, mode)?;
                return Ok(Object::set(items));
            }
            TypeHint::Tuple(shape) if config.is_iterable() => {
                let items = match shape {
                    TupleHint::Unparameterized => {
                        self.build_elements(config, path, |_| &TypeHint::Any, context, mode)?
                    }
                    TupleHint::Variadic(elem) => {
                        self.build_elements(config, path, |_| elem, context, mode)?
                    }
                    TupleHint::Fixed(elems) => {
                        let actual = config.len().unwrap_or_default();
                        if actual != elems.len() {
                            return fail(ConfigurationErrorKind::SizeMismatch {
                                expected: elems.len(),
                                actual,
                            });
                        }
                        self.build_elements(config, path, |i| &elems[i], context, mode)?
                    }
                };
                return Ok(Object::Tuple(items));
            }
            TypeHint::Mapping(kv) if matches!(config, Value::Map(_)) && !has_type_key => {
                let (key_hint, value_hint) = match kv {
                    Some(kv) => (&kv.0, &kv.1),
                    None => (&TypeHint::Any, &TypeHint::Any),
                };
                return self.build_mapping(config, path, key_hint, value_hint, context, mode);
            }
            TypeHint::Literal(allowed) => {
                if allowed.iter().any(|literal| literal.matches(&config)) {
                    return Ok(Object::from_value(config));
                }
                return fail(ConfigurationErrorKind::InvalidLiteral {
                    value: config.to_string(),
                    allowed: allowed.clone(),
                });
            }
            TypeHint::Record(record) if matches!(config, Value::Map(_)) && !has_type_key => {
                return self.build_record(record, config, path, context, mode);
            }
            TypeHint::Enum(enumeration) => {
                return coerce_enum(enumeration, config)
                    .map_err(|kind| ConfigurationError::at(path.clone(), kind));
            }
            TypeHint::Union(alternatives) => {
                return self.build_union(hint, alternatives, config, path, context, mode);
            }
            TypeHint::Lazy(inner) => {
                let inner = inner.as_deref().cloned().unwrap_or(TypeHint::Any);
                let lazy = Lazy::new(config, path.clone(), inner, Rc::clone(context), self.clone())?;
                return Ok(Object::Lazy(lazy));
            }
            _ => {}
        }

        if matches!(
            config,
            Value::Seq(_) | Value::Set(_) | Value::Object(Object::List(_) | Object::Set(_) | Object::Tuple(_))
        ) {
            let actual = config.type_hint();
            if !hint.is_any() && !actual.is_subtype_of(&hint.origin()) {
                return fail(ConfigurationErrorKind::TypeMismatch {
                    expected: hint.clone(),
                    actual,
                });
            }
            let items = self.build_elements(config, path, |_| &TypeHint::Any, context, mode)?;
            return Ok(match actual {
                TypeHint::Set(_) => Object::set(items),
                TypeHint::Tuple(_) => Object::Tuple(items),
                _ => Object::List(items),
            });
        }

        // ints and bools widen to the float types
        let widened = match &config {
            Value::Int(i) | Value::Object(Object::Int(i)) => Some(*i as f64),
            Value::Bool(b) | Value::Object(Object::Bool(b)) => Some(f64::from(u8::from(*b))),
            _ => None,
        };
        if let Some(x) = widened {
            match hint {
                TypeHint::Float => return Ok(Object::Float(x)),
                TypeHint::Complex => return Ok(Object::Complex { re: x, im: 0.0 }),
                _ => {}
            }
        }

        if !matches!(config, Value::Map(_)) {
            if hint.is_any() {
                return Ok(Object::from_value(config));
            }
            let actual = config.type_hint();
            if !actual.is_subtype_of(&hint.origin()) {
                return fail(ConfigurationErrorKind::TypeMismatch {
                    expected: hint.clone(),
                    actual,
                });
            }
            return Ok(Object::from_value(config));
        }

        if hint.is_any() && !has_type_key {
            return self.build_mapping(config, path, &TypeHint::Any, &TypeHint::Any, context, mode);
        }

        if let TypeHint::TypeVar(var) = hint {
            let bound = var.bound().cloned().unwrap_or(TypeHint::Any);
            return self.build_node(config, path, &bound, context, mode);
        }

        let Value::Map(mut map) = config else {
            return fail(ConfigurationErrorKind::TypeMismatch {
                expected: hint.clone(),
                actual: config.type_hint(),
            });
        };

        let constructor = match map.shift_remove(&self.type_key) {
            Some(Value::Str(name)) => self.resolve(&name, path, hint)?,
            Some(other) => {
                return fail(ConfigurationErrorKind::TypeMismatch {
                    expected: TypeHint::Str,
                    actual: other.type_hint(),
                });
            }
            None => match hint {
                TypeHint::Class(class, _) => Constructor::Class(class.clone()),
                other => match builtins::for_hint(other) {
                    Some(function) => Constructor::Function(function.clone()),
                    None => {
                        return fail(ConfigurationErrorKind::TypeMismatch {
                            expected: hint.clone(),
                            actual: TypeHint::Mapping(None),
                        });
                    }
                },
            },
        };
        log::debug!("[{path}] Resolved constructor `{}`", constructor.name());

        self.check_constructor(&constructor, hint, path)?;

        let args = self.construct_args(&constructor, map, path, hint, context, mode)?;

        if mode == Mode::Validate {
            context.set_resolved(constructor.class().cloned());
            return Ok(Object::None);
        }

        constructor.invoke(args).map_err(|source| {
            ConfigurationError::at(
                path.clone(),
                ConfigurationErrorKind::Construction {
                    constructor: constructor.name(),
                    source,
                },
            )
        })
    }

    fn check_constructor(
        &self,
        constructor: &Constructor,
        hint: &TypeHint,
        path: &ParamPath,
    ) -> Result<()> {
        let compatible = match (constructor, hint) {
            (_, TypeHint::Any) => true,
            (Constructor::Class(class) | Constructor::Alternate(class, _), TypeHint::Class(target, _)) => {
                class.is_subclass_of(target)
            }
            (Constructor::Class(_) | Constructor::Alternate(..), _) => false,
            (Constructor::Function(function), _) => function
                .return_hint()
                .is_none_or(|returns| returns.is_subtype_of(&hint.origin())),
        };
        if compatible {
            return Ok(());
        }
        let actual = match constructor {
            Constructor::Class(class) | Constructor::Alternate(class, _) => class.hint(),
            Constructor::Function(function) => {
                function.return_hint().cloned().unwrap_or(TypeHint::Any)
            }
        };
        Err(ConfigurationError::at(
            path.clone(),
            ConfigurationErrorKind::TypeMismatch {
                expected: hint.clone(),
                actual,
            },
        ))
    }

    fn construct_args(
        &self,
        constructor: &Constructor,
        mut map: IndexMap<String, Value>,
        path: &ParamPath,
        hint: &TypeHint,
        context: &Rc<Context>,
        mode: Mode,
    ) -> Result<Arguments> {
        let Some(signature) = constructor.signature() else {
            return Err(ConfigurationError::at(
                path.clone(),
                ConfigurationErrorKind::NotConstructible(constructor.name()),
            ));
        };

        let mut positional = Vec::new();
        if let Some(args) = map.shift_remove(&self.args_key) {
            let items = match args {
                Value::Seq(items) => items,
                Value::Object(Object::List(items) | Object::Tuple(items)) => {
                    items.into_iter().map(Value::Object).collect()
                }
                other => {
                    return Err(ConfigurationError::at(
                        path.clone(),
                        ConfigurationErrorKind::ArgumentsNotSequence {
                            actual: other.type_hint(),
                        },
                    ));
                }
            };
            let args_path = path.join(self.args_key.as_str());
            for (i, item) in items.into_iter().enumerate() {
                positional.push(self.build_node(item, &args_path.join(i), &TypeHint::Any, context, mode)?);
            }
        }

        let mut typevars = TypeVarMap::seed(constructor, hint);
        let mut keyword = IndexMap::with_capacity(map.len());
        for (key, value) in map {
            let annotation = typevars.substitute(signature.hint(&key));
            context.take_resolved();
            let object = self.build_node(value, &path.join(key.as_str()), &annotation, context, mode)?;
            match context.take_resolved() {
                Some(class) if mode == Mode::Validate => typevars.bind_from_class(&annotation, &class),
                _ => typevars.bind_from_object(&annotation, &object),
            }
            keyword.insert(key, object);
        }

        Ok(Arguments::new(positional, keyword))
    }

    fn build_elements<'h>(
        &self,
        config: Value,
        path: &ParamPath,
        hint_at: impl Fn(usize) -> &'h TypeHint,
        context: &Rc<Context>,
        mode: Mode,
    ) -> Result<Vec<Object>> {
        let items = config.into_elements().unwrap_or_default();
        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| self.build_node(item, &path.join(i), hint_at(i), context, mode))
            .collect()
    }

    fn build_mapping(
        &self,
        config: Value,
        path: &ParamPath,
        key_hint: &TypeHint,
        value_hint: &TypeHint,
        context: &Rc<Context>,
        mode: Mode,
    ) -> Result<Object> {
        let Value::Map(map) = config else {
            return Ok(Object::from_value(config));
        };
        let mut built = IndexMap::with_capacity(map.len());
        for (i, (key, value)) in map.into_iter().enumerate() {
            let key_path = path.join(format!("[key:{i}]"));
            let key_object = self.build_node(Value::Str(key.clone()), &key_path, key_hint, context, mode)?;
            let key_string = match key_object {
                Object::Str(s) => s,
                Object::Enum(member) => match member.value() {
                    Literal::Str(s) => s.clone(),
                    _ => member.name().to_string(),
                },
                other => {
                    return Err(ConfigurationError::at(
                        key_path,
                        ConfigurationErrorKind::InvalidKey {
                            actual: other.type_hint(),
                        },
                    ));
                }
            };
            let value = self.build_node(value, &path.join(key.as_str()), value_hint, context, mode)?;
            built.insert(key_string, value);
        }
        Ok(Object::Map(built))
    }

    fn build_record(
        &self,
        record: &RecordType,
        config: Value,
        path: &ParamPath,
        context: &Rc<Context>,
        mode: Mode,
    ) -> Result<Object> {
        let Value::Map(map) = config else {
            return Ok(Object::from_value(config));
        };
        let fail = |source: ArgumentError| {
            Err(ConfigurationError::at(
                path.clone(),
                ConfigurationErrorKind::Construction {
                    constructor: record.name().to_string(),
                    source: source.into(),
                },
            ))
        };

        let mut given = IndexMap::with_capacity(map.len());
        for (key, value) in map {
            let hint = record.field(&key).map_or(&TypeHint::Any, |field| field.hint());
            let object = self.build_node(value, &path.join(key.as_str()), hint, context, mode)?;
            given.insert(key, object);
        }

        if let Some(unknown) = given.keys().find(|key| record.field(key).is_none()) {
            return fail(ArgumentError::Unexpected(unknown.clone()));
        }

        let mut values = IndexMap::with_capacity(record.fields().len());
        for field in record.fields() {
            let value = match given.shift_remove(field.name()) {
                Some(value) => value,
                None => match field.default() {
                    Some(default) => literal_object(default),
                    None => return fail(ArgumentError::Missing(field.name().to_string())),
                },
            };
            values.insert(field.name().to_string(), value);
        }

        if mode == Mode::Validate {
            return Ok(Object::None);
        }
        Ok(Object::Record(Record::new(record.clone(), values)))
    }

    fn build_union(
        &self,
        hint: &TypeHint,
        alternatives: &[TypeHint],
        config: Value,
        path: &ParamPath,
        context: &Rc<Context>,
        mode: Mode,
    ) -> Result<Object> {
        if alternatives.is_empty() {
            return self.build_node(config, path, &TypeHint::Any, context, mode);
        }

        let mut trials = Vec::with_capacity(alternatives.len());
        for alternative in alternatives {
            context.take_resolved();
            match self.build_node(config.clone(), path, alternative, context, mode) {
                Ok(object) => return Ok(object),
                Err(error) if error.is_recoverable() => {
                    log::debug!("[{path}] Trying {alternative} failed: {error}");
                    trials.push(Trial {
                        hint: alternative.clone(),
                        error,
                    });
                }
                Err(error) => return Err(error),
            }
        }

        Err(ConfigurationError::at(
            path.clone(),
            ConfigurationErrorKind::AggregateConstruction {
                hint: hint.clone(),
                trials,
            },
        ))
    }
}

fn literal_object(literal: &Literal) -> Object {
    match literal {
        Literal::None => Object::None,
        Literal::Bool(b) => Object::Bool(*b),
        Literal::Int(i) => Object::Int(*i),
        Literal::Str(s) => Object::Str(s.clone()),
    }
}

fn coerce_enum(
    enumeration: &EnumType,
    config: Value,
) -> std::result::Result<Object, ConfigurationErrorKind> {
    if let Value::Object(Object::Enum(member)) = &config {
        if member.enum_type() == enumeration {
            return Ok(Object::Enum(member.clone()));
        }
    }
    match enumeration.position_of(&config) {
        Some(index) => Ok(Object::Enum(EnumMember::new(enumeration.clone(), index))),
        None => Err(ConfigurationErrorKind::Construction {
            constructor: enumeration.name().to_string(),
            source: format!("{config} is not a valid {}", enumeration.name()).into(),
        }),
    }
}
