use std::{
    collections::HashMap,
    fmt::{self, Display},
    sync::{Arc, LazyLock, PoisonError, RwLock},
};

use indexmap::IndexMap;

use crate::{
    Attribute, Class, ConfigurationError, ConfigurationErrorKind, Constructor, Function,
    ModuleLoader, builtins,
};

static GLOBAL: LazyLock<Arc<Registry>> = LazyLock::new(|| Arc::new(Registry::new()));

/// A namespace of registered names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The unscoped namespace, pre-populated with the builtin constructors.
    Default,
    /// The namespace owned by a registrable class.
    Class(Class),
}

impl Scope {
    /// The scope a lookup for an annotation of `class` uses.
    pub fn of(class: &Class) -> Self {
        if class.is_registrable() {
            Scope::Class(class.clone())
        } else {
            Scope::Default
        }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Default => f.write_str("default"),
            Scope::Class(class) => f.write_str(class.name()),
        }
    }
}

/// What a name is registered for.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// A class.
    Class(Class),
    /// A free function.
    Function(Function),
}

impl From<Class> for Target {
    fn from(value: Class) -> Self {
        Target::Class(value)
    }
}

impl From<&Class> for Target {
    fn from(value: &Class) -> Self {
        Target::Class(value.clone())
    }
}

impl From<Function> for Target {
    fn from(value: Function) -> Self {
        Target::Function(value)
    }
}

/// Options for [`Registry::register`].
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    alternate: Option<String>,
    exist_ok: bool,
}

impl RegisterOptions {
    /// Default options: the primary initializer, no overriding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs through the named alternate constructor instead of the initializer.
    pub fn alternate(mut self, name: impl Into<String>) -> Self {
        self.alternate = Some(name.into());
        self
    }

    /// Replaces an existing registration instead of failing.
    pub fn exist_ok(mut self) -> Self {
        self.exist_ok = true;
        self
    }
}

#[derive(Debug, Clone)]
struct Entry {
    target: Target,
    alternate: Option<String>,
}

impl Entry {
    fn constructor(&self) -> Constructor {
        match (&self.target, &self.alternate) {
            (Target::Class(class), None) => Constructor::Class(class.clone()),
            (Target::Class(class), Some(name)) => Constructor::Alternate(class.clone(), name.clone()),
            (Target::Function(function), _) => Constructor::Function(function.clone()),
        }
    }
}

type Table = HashMap<Scope, IndexMap<String, Entry>>;

/// Maps names to constructors, per scope.
///
/// Registration normally happens once at startup, before any build. A name
/// that is not registered but looks like a path (`module.attr` or
/// `module:qualified.attr`) can be resolved through a [`ModuleLoader`].
pub struct Registry {
    scopes: RwLock<Table>,
    loader: RwLock<Option<Arc<dyn ModuleLoader>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scopes = self.scopes.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Registry")
            .field("scopes", &scopes.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

fn builtin_table() -> Table {
    let defaults = builtins::all()
        .map(|(name, function)| {
            let entry = Entry {
                target: Target::Function(function.clone()),
                alternate: None,
            };
            (name.to_string(), entry)
        })
        .collect();
    let mut table = Table::new();
    table.insert(Scope::Default, defaults);
    table
}

impl Registry {
    /// A registry holding only the builtin constructors.
    pub fn new() -> Self {
        Self {
            scopes: RwLock::new(builtin_table()),
            loader: RwLock::new(None),
        }
    }

    /// The process-wide registry used by builders that were not given one.
    pub fn global() -> Arc<Registry> {
        Arc::clone(&GLOBAL)
    }

    /// Sets the loader used to resolve unregistered path-like names.
    pub fn with_loader(self, loader: impl ModuleLoader + 'static) -> Self {
        self.set_loader(loader);
        self
    }

    /// Sets the loader used to resolve unregistered path-like names.
    pub fn set_loader(&self, loader: impl ModuleLoader + 'static) {
        let mut slot = self.loader.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(loader));
    }

    /// Drops every registration except the builtins.
    pub fn clear(&self) {
        let mut scopes = self.scopes.write().unwrap_or_else(PoisonError::into_inner);
        *scopes = builtin_table();
    }

    /// Registers `target` under `name` in `scope`.
    pub fn register(
        &self,
        scope: Scope,
        name: &str,
        target: impl Into<Target>,
        options: RegisterOptions,
    ) -> Result<(), ConfigurationError> {
        let target = target.into();
        if let Scope::Class(class) = &scope {
            if !class.is_registrable() {
                return Err(ConfigurationErrorKind::NotRegistrable(class.name().to_string()).into());
            }
        }
        if let Some(alternate) = &options.alternate {
            let found = match &target {
                Target::Class(class) => class.has_alternate(alternate),
                Target::Function(_) => false,
            };
            if !found {
                let target = match &target {
                    Target::Class(class) => class.name().to_string(),
                    Target::Function(function) => function.name().to_string(),
                };
                return Err(ConfigurationErrorKind::InvalidConstructor {
                    constructor: alternate.clone(),
                    target,
                }
                .into());
            }
        }

        let mut scopes = self.scopes.write().unwrap_or_else(PoisonError::into_inner);
        let names = scopes.entry(scope.clone()).or_default();
        if names.contains_key(name) && !options.exist_ok {
            return Err(ConfigurationErrorKind::NameConflict {
                name: name.to_string(),
                scope: scope.to_string(),
            }
            .into());
        }
        log::debug!("Registering `{name}` in scope `{scope}`");
        names.insert(
            name.to_string(),
            Entry {
                target,
                alternate: options.alternate,
            },
        );
        Ok(())
    }

    /// True when `name` is registered in `scope`.
    pub fn contains(&self, scope: &Scope, name: &str) -> bool {
        let scopes = self.scopes.read().unwrap_or_else(PoisonError::into_inner);
        scopes.get(scope).is_some_and(|names| names.contains_key(name))
    }

    /// Names registered in `scope`, in registration order.
    pub fn names(&self, scope: &Scope) -> Vec<String> {
        let scopes = self.scopes.read().unwrap_or_else(PoisonError::into_inner);
        scopes
            .get(scope)
            .map(|names| names.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Resolves `name` in `scope`.
    ///
    /// An exact registration wins. Otherwise, if `allow_import` is set and the
    /// name contains `.` or `:`, the module part is loaded and the attribute
    /// path walked.
    pub fn by_name(
        &self,
        scope: &Scope,
        name: &str,
        allow_import: bool,
    ) -> Result<Constructor, ConfigurationErrorKind> {
        {
            let scopes = self.scopes.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = scopes.get(scope).and_then(|names| names.get(name)) {
                log::debug!("Resolved `{name}` in scope `{scope}`");
                return Ok(entry.constructor());
            }
        }

        if allow_import && (name.contains('.') || name.contains(':')) {
            return self.import(name);
        }

        Err(ConfigurationErrorKind::TypeNotFound {
            name: name.to_string(),
            scope: scope.to_string(),
        })
    }

    fn import(&self, name: &str) -> Result<Constructor, ConfigurationErrorKind> {
        let (module, path) = match name.split_once(':') {
            Some(split) => split,
            None => name.rsplit_once('.').unwrap_or((name, "")),
        };
        log::debug!("Importing `{path}` from module `{module}`");

        let loader = self
            .loader
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| ConfigurationErrorKind::ModuleNotFound {
                module: module.to_string(),
                name: name.to_string(),
                source: "no module loader is configured".into(),
            })?;
        let namespace = loader
            .load(module)
            .map_err(|source| ConfigurationErrorKind::ModuleNotFound {
                module: module.to_string(),
                name: name.to_string(),
                source,
            })?;

        let not_found = |attribute: &str| ConfigurationErrorKind::AttributeNotFound {
            attribute: attribute.to_string(),
            module: module.to_string(),
            name: name.to_string(),
        };

        let mut current = Attribute::Namespace(namespace);
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            current = match current {
                Attribute::Namespace(namespace) => {
                    namespace.get(segment).cloned().ok_or_else(|| not_found(segment))?
                }
                Attribute::Class(class) if segments.peek().is_none() && class.has_alternate(segment) => {
                    return Ok(Constructor::Alternate(class, segment.to_string()));
                }
                Attribute::Class(_) | Attribute::Function(_) => return Err(not_found(segment)),
            };
        }

        match current {
            Attribute::Class(class) => Ok(Constructor::Class(class)),
            Attribute::Function(function) => Ok(Constructor::Function(function)),
            Attribute::Namespace(_) => Err(ConfigurationErrorKind::NotConstructible(name.to_string())),
        }
    }
}
