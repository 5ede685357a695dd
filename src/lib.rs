#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

use std::{
    error::Error,
    fmt::{self, Display},
};

mod arguments;
mod builder;
mod builtins;
mod callback;
mod class;
mod context;
mod document;
mod generics;
mod hint;
mod lazy;
mod module;
mod object;
mod path;
mod placeholder;
mod reflect;
mod registry;
mod value;

pub use arguments::{ArgumentError, Arguments};
pub use builder::Builder;
pub use callback::{Callback, CallbackChain};
pub use class::{Class, ClassBuilder, Constructor, Function, Param, Signature};
pub use context::Context;
pub use document::{DocumentError, DocumentErrorKind, Loader, from_str};
pub use generics::{TypeVarMap, find_base};
pub use hint::{
    EnumType, Literal, RecordField, RecordType, TupleHint, TypeHint, TypeVar, issubtype,
};
pub use lazy::{FieldPath, FieldSegment, Lazy};
pub use module::{Attribute, ModuleLoader, ModuleTable, Namespace, UnknownModule};
pub use object::{EnumMember, FromObject, Instance, Object, ObjectMismatch, Record};
pub use path::{ParamPath, PathSegment};
pub use placeholder::Placeholder;
pub use reflect::ShapeError;
pub use registry::{RegisterOptions, Registry, Scope, Target};
pub use value::Value;

/// Boxed error returned by constructors.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Result type for building.
pub type Result<T> = std::result::Result<T, ConfigurationError>;

/// Error raised while resolving or building a config node.
#[derive(Debug)]
pub struct ConfigurationError {
    path: ParamPath,
    kind: ConfigurationErrorKind,
}

impl ConfigurationError {
    /// An error at `path`.
    pub fn at(path: ParamPath, kind: impl Into<ConfigurationErrorKind>) -> Self {
        Self {
            path,
            kind: kind.into(),
        }
    }

    /// Returns a reference to the error kind for detailed error inspection.
    pub fn kind(&self) -> &ConfigurationErrorKind {
        &self.kind
    }

    /// The path of the node that failed.
    pub fn path(&self) -> &ParamPath {
        &self.path
    }

    /// Whether a union may move on to its next alternative after this error.
    ///
    /// Everything is recoverable except a constructor failure caused by
    /// [`Abort`], however deeply nested.
    pub fn is_recoverable(&self) -> bool {
        match &self.kind {
            ConfigurationErrorKind::Construction { source, .. } => {
                if source.downcast_ref::<Abort>().is_some() {
                    return false;
                }
                match source.downcast_ref::<ConfigurationError>() {
                    Some(inner) => inner.is_recoverable(),
                    None => true,
                }
            }
            ConfigurationErrorKind::AggregateConstruction { trials, .. } => {
                trials.iter().all(|trial| trial.error.is_recoverable())
            }
            _ => true,
        }
    }
}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = &self.kind;
        if self.path.is_root() {
            write!(f, "{kind}")
        } else {
            write!(f, "[{}] {kind}", self.path)
        }
    }
}

impl Error for ConfigurationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            ConfigurationErrorKind::ModuleNotFound { source, .. }
            | ConfigurationErrorKind::Construction { source, .. } => Some(source.as_ref()),
            ConfigurationErrorKind::Conversion(source) => Some(source),
            _ => None,
        }
    }
}

impl<K: Into<ConfigurationErrorKind>> From<K> for ConfigurationError {
    fn from(value: K) -> Self {
        ConfigurationError::at(ParamPath::root(), value)
    }
}

/// One failed alternative of a union.
#[derive(Debug)]
pub struct Trial {
    /// The alternative that was tried.
    pub hint: TypeHint,
    /// Why it failed.
    pub error: ConfigurationError,
}

/// Detailed classification of configuration errors.
#[derive(Debug)]
#[non_exhaustive]
pub enum ConfigurationErrorKind {
    /// A type name is neither registered nor importable.
    TypeNotFound {
        /// The name looked up.
        name: String,
        /// The scope it was looked up in.
        scope: String,
    },
    /// A name is already registered in the scope.
    NameConflict {
        /// The conflicting name.
        name: String,
        /// The scope.
        scope: String,
    },
    /// A registry scope was requested for a class that is not registrable.
    NotRegistrable(String),
    /// A named alternate constructor does not exist on the target.
    InvalidConstructor {
        /// The alternate constructor name.
        constructor: String,
        /// The class or function it was looked up on.
        target: String,
    },
    /// The module part of a path-like name could not be loaded.
    ModuleNotFound {
        /// The module name.
        module: String,
        /// The full name being resolved.
        name: String,
        /// The loader's error.
        source: BoxError,
    },
    /// An attribute along a path-like name does not exist.
    AttributeNotFound {
        /// The missing attribute.
        attribute: String,
        /// The module it was looked up in.
        module: String,
        /// The full name being resolved.
        name: String,
    },
    /// The config or the resolved constructor does not fit the annotation.
    TypeMismatch {
        /// The annotation.
        expected: TypeHint,
        /// What was found.
        actual: TypeHint,
    },
    /// A placeholder's type does not fit the annotation of its slot.
    PlaceholderMismatch {
        /// The annotation of the slot.
        expected: TypeHint,
        /// The placeholder's type.
        actual: TypeHint,
    },
    /// A fixed-arity tuple got the wrong number of elements.
    SizeMismatch {
        /// The annotated arity.
        expected: usize,
        /// The config's length.
        actual: usize,
    },
    /// A value is not one of the allowed literals.
    InvalidLiteral {
        /// The value found.
        value: String,
        /// The allowed literals.
        allowed: Vec<Literal>,
    },
    /// A mapping key did not build to a string.
    InvalidKey {
        /// The type the key built to.
        actual: TypeHint,
    },
    /// The positional-arguments entry is not a sequence.
    ArgumentsNotSequence {
        /// The type found.
        actual: TypeHint,
    },
    /// The resolved class has no initializer.
    NotConstructible(String),
    /// A constructor failed.
    Construction {
        /// The constructor that was called.
        constructor: String,
        /// Its error.
        source: BoxError,
    },
    /// Every alternative of a union failed.
    AggregateConstruction {
        /// The union.
        hint: TypeHint,
        /// Each alternative's failure, in declared order.
        trials: Vec<Trial>,
    },
    /// A lazy handle field path does not address anything.
    InvalidFieldPath {
        /// The field path.
        field: String,
        /// What went wrong.
        reason: String,
    },
    /// A built object could not be converted to the requested Rust type.
    Conversion(ObjectMismatch),
}

impl Display for ConfigurationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationErrorKind::TypeNotFound { name, scope } => {
                write!(f, "type not found: '{name}' is not registered in scope {scope}")
            }
            ConfigurationErrorKind::NameConflict { name, scope } => {
                write!(f, "type name conflict: '{name}' is already registered in scope {scope}")
            }
            ConfigurationErrorKind::NotRegistrable(class) => {
                write!(f, "{class} is not registrable")
            }
            ConfigurationErrorKind::InvalidConstructor { constructor, target } => {
                write!(f, "constructor '{constructor}' not found in {target}")
            }
            ConfigurationErrorKind::ModuleNotFound { module, name, source } => {
                write!(f, "module {module} not found ({name}): {source}")
            }
            ConfigurationErrorKind::AttributeNotFound {
                attribute,
                module,
                name,
            } => write!(f, "attribute {attribute} not found in {module} ({name})"),
            ConfigurationErrorKind::TypeMismatch { expected, actual } => write!(
                f,
                "type mismatch, expected type is {expected}, but actual type is {actual}"
            ),
            ConfigurationErrorKind::PlaceholderMismatch { expected, actual } => write!(
                f,
                "placeholder type mismatch: expected {expected}, got {actual}"
            ),
            ConfigurationErrorKind::SizeMismatch { expected, actual } => write!(
                f,
                "tuple sizes of the given config and annotation are mismatched: {actual} / {expected}"
            ),
            ConfigurationErrorKind::InvalidLiteral { value, allowed } => {
                write!(f, "{value} is not a valid literal value, expected one of: ")?;
                for (i, literal) in allowed.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{literal}")?;
                }
                Ok(())
            }
            ConfigurationErrorKind::InvalidKey { actual } => {
                write!(f, "mapping keys must be str, not {actual}")
            }
            ConfigurationErrorKind::ArgumentsNotSequence { actual } => {
                write!(f, "arguments must be a list or tuple, not {actual}")
            }
            ConfigurationErrorKind::NotConstructible(name) => {
                write!(f, "{name} cannot be constructed")
            }
            ConfigurationErrorKind::Construction {
                constructor,
                source,
            } => write!(
                f,
                "failed to construct object with constructor {constructor}: {source}"
            ),
            ConfigurationErrorKind::AggregateConstruction { hint, trials } => {
                write!(f, "failed to construct object with type {hint}")?;
                for trial in trials {
                    write!(f, "\n  trying {}: {}", trial.hint, trial.error)?;
                }
                Ok(())
            }
            ConfigurationErrorKind::InvalidFieldPath { field, reason } => {
                write!(f, "invalid field path '{field}': {reason}")
            }
            ConfigurationErrorKind::Conversion(source) => write!(f, "{source}"),
        }
    }
}

impl From<ObjectMismatch> for ConfigurationErrorKind {
    fn from(value: ObjectMismatch) -> Self {
        Self::Conversion(value)
    }
}

/// A constructor error that stops union fallback.
///
/// Returned from a constructor, it propagates out of every enclosing union
/// instead of letting the next alternative be tried.
#[derive(Debug)]
pub struct Abort {
    source: BoxError,
}

impl Abort {
    /// Wraps the underlying failure.
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

impl Display for Abort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "aborted: {}", self.source)
    }
}

impl Error for Abort {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Builds `config` against `hint` with a default [`Builder`].
pub fn build(config: impl Into<Value>, hint: &TypeHint) -> Result<Object> {
    log::trace!("Entering `build` function");

    Builder::new().build(config, hint)
}

/// Runs every resolution and validation step of [`build`] without calling any constructor.
pub fn validate(config: impl Into<Value>, hint: &TypeHint) -> Result<Object> {
    log::trace!("Entering `validate` function");

    Builder::new().validate(config, hint)
}

/// Registers `target` under `name` in `scope` of the process-wide registry.
pub fn register(scope: Scope, name: &str, target: impl Into<Target>) -> Result<()> {
    Registry::global().register(scope, name, target, RegisterOptions::new())
}

/// Like [`register`], with options.
pub fn register_with(
    scope: Scope,
    name: &str,
    target: impl Into<Target>,
    options: RegisterOptions,
) -> Result<()> {
    Registry::global().register(scope, name, target, options)
}
