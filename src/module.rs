use std::{
    collections::HashMap,
    error::Error,
    fmt::{self, Display},
};

use indexmap::IndexMap;

use crate::{BoxError, Class, Function};

/// Something a dotted or colon-separated name can point at.
#[derive(Debug, Clone)]
pub enum Attribute {
    /// A nested namespace, walked by further path segments.
    Namespace(Namespace),
    /// A class; a further segment names one of its alternate constructors.
    Class(Class),
    /// A free function.
    Function(Function),
}

impl From<Namespace> for Attribute {
    fn from(value: Namespace) -> Self {
        Attribute::Namespace(value)
    }
}

impl From<Class> for Attribute {
    fn from(value: Class) -> Self {
        Attribute::Class(value)
    }
}

impl From<Function> for Attribute {
    fn from(value: Function) -> Self {
        Attribute::Function(value)
    }
}

/// The attributes exported by a loaded module.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    attributes: IndexMap<String, Attribute>,
}

impl Namespace {
    /// An empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute.
    pub fn with(mut self, name: impl Into<String>, attribute: impl Into<Attribute>) -> Self {
        self.attributes.insert(name.into(), attribute.into());
        self
    }

    /// Looks up an attribute.
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }
}

/// Loads modules by name for dynamic resolution of unregistered names.
pub trait ModuleLoader: Send + Sync {
    /// Loads the module called `module`.
    fn load(&self, module: &str) -> Result<Namespace, BoxError>;
}

impl<F> ModuleLoader for F
where
    F: Fn(&str) -> Result<Namespace, BoxError> + Send + Sync,
{
    fn load(&self, module: &str) -> Result<Namespace, BoxError> {
        self(module)
    }
}

/// The requested module is not known to the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownModule(pub String);

impl Display for UnknownModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no module named '{}'", self.0)
    }
}

impl Error for UnknownModule {}

/// An in-process table of modules, the bundled [`ModuleLoader`].
#[derive(Debug, Clone, Default)]
pub struct ModuleTable {
    modules: HashMap<String, Namespace>,
}

impl ModuleTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a module.
    pub fn module(mut self, name: impl Into<String>, namespace: Namespace) -> Self {
        self.modules.insert(name.into(), namespace);
        self
    }
}

impl ModuleLoader for ModuleTable {
    fn load(&self, module: &str) -> Result<Namespace, BoxError> {
        log::debug!("Loading module `{module}`");
        self.modules
            .get(module)
            .cloned()
            .ok_or_else(|| UnknownModule(module.to_string()).into())
    }
}
