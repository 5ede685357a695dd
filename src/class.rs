use std::{
    any::{Any, TypeId},
    fmt::{self, Debug},
    hash::{Hash, Hasher},
    marker::PhantomData,
    sync::Arc,
};

use facet_core::Facet;
use indexmap::IndexMap;

use crate::{Arguments, BoxError, Instance, Object, TypeHint, TypeVar, reflect};

type FactoryFn = dyn Fn(&mut Arguments) -> Result<Box<dyn Any>, BoxError> + Send + Sync;
type FunctionFn = dyn Fn(&mut Arguments) -> Result<Object, BoxError> + Send + Sync;

/// One declared parameter of a constructor.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    name: String,
    hint: TypeHint,
}

impl Param {
    /// The parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared annotation.
    pub fn hint(&self) -> &TypeHint {
        &self.hint
    }
}

/// The declared parameters of a constructor, in positional order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    params: Vec<Param>,
}

impl Signature {
    /// An empty signature.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter.
    pub fn param(mut self, name: impl Into<String>, hint: TypeHint) -> Self {
        self.params.push(Param {
            name: name.into(),
            hint,
        });
        self
    }

    /// Parameters in declared order.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// The annotation of `name`, or `Any` for undeclared names.
    pub fn hint(&self, name: &str) -> &TypeHint {
        self.params
            .iter()
            .find(|param| param.name == name)
            .map_or(&TypeHint::Any, |param| &param.hint)
    }
}

#[derive(Clone)]
struct Factory {
    signature: Signature,
    call: Arc<FactoryFn>,
}

struct ClassDef {
    id: TypeId,
    name: String,
    params: Vec<TypeVar>,
    bases: Vec<TypeHint>,
    registrable: bool,
    init: Option<Factory>,
    alternates: IndexMap<String, Factory>,
}

/// A constructible type: the manifest the builder consults for a Rust type.
///
/// A class is identified by the Rust type it describes, so two manifests for
/// the same type compare equal.
#[derive(Clone)]
pub struct Class(Arc<ClassDef>);

impl Class {
    /// Starts a manifest for a reflected struct.
    ///
    /// Every field of `T` becomes a parameter annotated after the field's
    /// type, and the initializer writes the built arguments into a fresh `T`
    /// field by field. [`param`](ClassBuilder::param) retypes a field and
    /// [`init`](ClassBuilder::init) replaces the initializer, e.g. for fields
    /// holding polymorphic instances.
    pub fn new<T: Facet<'static> + Any>(name: impl Into<String>) -> ClassBuilder<T> {
        log::trace!("Reflecting class from {}", T::SHAPE.type_identifier);

        let mut builder = Self::opaque::<T>(name);
        builder.signature = reflect::signature(T::SHAPE);
        builder.def.init = Some(Factory {
            signature: Signature::new(),
            call: Arc::new(|args| Ok(Box::new(reflect::construct::<T>(args)?) as Box<dyn Any>)),
        });
        builder
    }

    /// Starts a manifest for a type without reflection.
    ///
    /// Parameters and the initializer are declared by hand. `T` may be
    /// unsized, e.g. `dyn Trait`, for abstract bases that are never
    /// constructed themselves.
    pub fn opaque<T: ?Sized + 'static>(name: impl Into<String>) -> ClassBuilder<T> {
        ClassBuilder {
            def: ClassDef {
                id: TypeId::of::<T>(),
                name: name.into(),
                params: Vec::new(),
                bases: Vec::new(),
                registrable: false,
                init: None,
                alternates: IndexMap::new(),
            },
            signature: Signature::new(),
            marker: PhantomData,
        }
    }

    /// The class name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Declared type parameters.
    pub fn type_params(&self) -> &[TypeVar] {
        &self.0.params
    }

    /// Direct bases, possibly parameterized (`Base[T]`).
    pub fn bases(&self) -> &[TypeHint] {
        &self.0.bases
    }

    /// Whether this class or one of its ancestors owns a registry scope.
    pub fn is_registrable(&self) -> bool {
        self.0.registrable
            || self
                .base_classes()
                .any(|base| base.is_registrable())
    }

    /// Whether `self` is `other` or inherits from it.
    pub fn is_subclass_of(&self, other: &Class) -> bool {
        self == other || self.base_classes().any(|base| base.is_subclass_of(other))
    }

    /// The unparameterized annotation for this class.
    pub fn hint(&self) -> TypeHint {
        TypeHint::class(self)
    }

    /// The annotation for this class applied to `args`.
    pub fn of(&self, args: impl IntoIterator<Item = TypeHint>) -> TypeHint {
        TypeHint::generic(self, args)
    }

    /// The primary initializer's signature, if the class can be constructed.
    pub fn signature(&self) -> Option<&Signature> {
        self.0.init.as_ref().map(|init| &init.signature)
    }

    /// True when an alternate constructor named `name` exists.
    pub fn has_alternate(&self, name: &str) -> bool {
        self.0.alternates.contains_key(name)
    }

    /// Names of the alternate constructors.
    pub fn alternates(&self) -> impl Iterator<Item = &str> {
        self.0.alternates.keys().map(String::as_str)
    }

    fn base_classes(&self) -> impl Iterator<Item = &Class> {
        self.0.bases.iter().filter_map(TypeHint::as_class)
    }

    fn factory(&self, alternate: Option<&str>) -> Option<&Factory> {
        match alternate {
            None => self.0.init.as_ref(),
            Some(name) => self.0.alternates.get(name),
        }
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Class {}

impl Hash for Class {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Class({})", self.0.name)
    }
}

/// Declares a [`Class`].
pub struct ClassBuilder<T: ?Sized> {
    def: ClassDef,
    signature: Signature,
    marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized> ClassBuilder<T> {
    /// Declares a type parameter.
    pub fn type_param(mut self, param: TypeVar) -> Self {
        self.def.params.push(param);
        self
    }

    /// Declares a base, e.g. `TypeHint::generic(&base, [TypeHint::var(&t)])`.
    pub fn base(mut self, base: TypeHint) -> Self {
        self.def.bases.push(base);
        self
    }

    /// Gives this class its own registry scope, shared by nothing else.
    pub fn registrable(mut self) -> Self {
        self.def.registrable = true;
        self
    }

    /// Declares a parameter of the primary initializer, or retypes a reflected field.
    pub fn param(mut self, name: impl Into<String>, hint: TypeHint) -> Self {
        let name = name.into();
        match self.signature.params.iter_mut().find(|param| param.name == name) {
            Some(param) => param.hint = hint,
            None => self.signature = self.signature.param(name, hint),
        }
        self
    }

    /// Finishes the manifest.
    pub fn finish(mut self) -> Class {
        if let Some(init) = self.def.init.as_mut() {
            init.signature = self.signature;
        }
        Class(Arc::new(self.def))
    }
}

impl<T: Any> ClassBuilder<T> {
    /// Sets the primary initializer, replacing the reflected one.
    ///
    /// Its parameters are the ones declared with [`param`](Self::param).
    pub fn init<F>(mut self, init: F) -> Self
    where
        F: Fn(&mut Arguments) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.def.init = Some(Factory {
            signature: Signature::new(),
            call: Arc::new(move |args| Ok(Box::new(init(args)?) as Box<dyn Any>)),
        });
        self
    }

    /// Adds a named alternate constructor, selectable at registration.
    pub fn alternate<F>(mut self, name: impl Into<String>, signature: Signature, ctor: F) -> Self
    where
        F: Fn(&mut Arguments) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.def.alternates.insert(
            name.into(),
            Factory {
                signature,
                call: Arc::new(move |args| Ok(Box::new(ctor(args)?) as Box<dyn Any>)),
            },
        );
        self
    }
}

struct FunctionDef {
    name: String,
    signature: Signature,
    returns: Option<TypeHint>,
    call: Arc<FunctionFn>,
}

/// A free-standing constructor.
#[derive(Clone)]
pub struct Function(Arc<FunctionDef>);

impl Function {
    /// Declares a function.
    pub fn new<F>(name: impl Into<String>, signature: Signature, call: F) -> Self
    where
        F: Fn(&mut Arguments) -> Result<Object, BoxError> + Send + Sync + 'static,
    {
        Self(Arc::new(FunctionDef {
            name: name.into(),
            signature,
            returns: None,
            call: Arc::new(call),
        }))
    }

    /// Declares the type every call returns, checked against the annotation it is built for.
    pub fn returns(self, hint: TypeHint) -> Self {
        let def = &self.0;
        Self(Arc::new(FunctionDef {
            name: def.name.clone(),
            signature: def.signature.clone(),
            returns: Some(hint),
            call: Arc::clone(&def.call),
        }))
    }

    /// The function name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The declared parameters.
    pub fn signature(&self) -> &Signature {
        &self.0.signature
    }

    /// The declared return type, if any.
    pub fn return_hint(&self) -> Option<&TypeHint> {
        self.0.returns.as_ref()
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.0.name)
    }
}

/// What a registry name or an annotation resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum Constructor {
    /// A class's primary initializer.
    Class(Class),
    /// A named alternate constructor of a class.
    Alternate(Class, String),
    /// A free function.
    Function(Function),
}

impl Constructor {
    /// A readable name for diagnostics.
    pub fn name(&self) -> String {
        match self {
            Constructor::Class(class) => class.name().to_string(),
            Constructor::Alternate(class, name) => format!("{}.{name}", class.name()),
            Constructor::Function(function) => function.name().to_string(),
        }
    }

    /// The class this constructor produces, if it is a class or one of its alternates.
    pub fn class(&self) -> Option<&Class> {
        match self {
            Constructor::Class(class) | Constructor::Alternate(class, _) => Some(class),
            Constructor::Function(_) => None,
        }
    }

    /// The declared parameters, or `None` when the class has no initializer.
    pub fn signature(&self) -> Option<&Signature> {
        match self {
            Constructor::Class(class) => class.signature(),
            Constructor::Alternate(class, name) => {
                class.factory(Some(name)).map(|factory| &factory.signature)
            }
            Constructor::Function(function) => Some(function.signature()),
        }
    }

    /// Binds positional arguments, calls the constructor and checks nothing was left over.
    pub fn invoke(&self, mut args: Arguments) -> Result<Object, BoxError> {
        match self {
            Constructor::Class(class) | Constructor::Alternate(class, _) => {
                let alternate = match self {
                    Constructor::Alternate(_, name) => Some(name.as_str()),
                    _ => None,
                };
                let factory = class
                    .factory(alternate)
                    .ok_or_else(|| format!("{} cannot be constructed", self.name()))?;
                args.bind(&factory.signature)?;
                let value = (factory.call)(&mut args)?;
                args.ensure_consumed()?;
                Ok(Object::Instance(Instance::from_boxed(class, value)))
            }
            Constructor::Function(function) => {
                args.bind(function.signature())?;
                let object = (function.0.call)(&mut args)?;
                args.ensure_consumed()?;
                Ok(object)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use facet::Facet;

    use super::*;

    #[derive(Facet, Debug, PartialEq)]
    struct Point {
        x: i64,
        #[facet(default)]
        y: i64,
    }

    struct Shape;

    fn shape() -> Class {
        Class::opaque::<Shape>("Shape").registrable().finish()
    }

    fn point() -> Class {
        Class::new::<Point>("Point")
            .base(TypeHint::class(&shape()))
            .alternate("origin", Signature::new(), |_| Ok(Point { x: 0, y: 0 }))
            .finish()
    }

    #[test]
    fn classes_compare_by_described_type() {
        assert_eq!(point(), point());
        assert!(point().is_registrable());
        assert!(point().is_subclass_of(&Class::opaque::<Shape>("Shape").finish()));
        assert!(shape().signature().is_none());
    }

    #[test]
    fn invoke_binds_positional_arguments() {
        let args = Arguments::new(vec![Object::Int(3), Object::Int(4)], IndexMap::new());
        let object = Constructor::Class(point()).invoke(args).unwrap();
        assert_eq!(object.downcast_ref::<Point>(), Some(&Point { x: 3, y: 4 }));

        let args = Arguments::new(vec![Object::Int(3)], IndexMap::new());
        let object = Constructor::Class(point()).invoke(args).unwrap();
        assert_eq!(object.downcast_ref::<Point>(), Some(&Point { x: 3, y: 0 }));
    }

    #[test]
    fn invoke_rejects_leftover_arguments() {
        let mut keyword = IndexMap::new();
        keyword.insert("z".to_string(), Object::Int(1));
        let args = Arguments::new(Vec::new(), keyword);
        let err = Constructor::Alternate(point(), "origin".to_string())
            .invoke(args)
            .unwrap_err();
        assert_eq!(err.to_string(), "unexpected argument 'z'");
    }

    #[test]
    fn parameters_follow_the_reflected_fields() {
        let class = point();
        let signature = class.signature().unwrap();
        let names: Vec<&str> = signature.params().iter().map(Param::name).collect();
        assert_eq!(names, ["x", "y"]);
        assert_eq!(signature.hint("x"), &TypeHint::Int);
        assert_eq!(signature.hint("w"), &TypeHint::Any);
    }

    #[test]
    fn declared_parameters_retype_fields_and_init_replaces_reflection() {
        let class = Class::new::<Point>("Point")
            .param("y", TypeHint::literal([0i64, 1]))
            .param("scale", TypeHint::Int)
            .init(|args| {
                let scale: i64 = args.take_or("scale", 1)?;
                Ok(Point {
                    x: args.take::<i64>("x")? * scale,
                    y: args.take_or("y", 0)?,
                })
            })
            .finish();
        let signature = class.signature().unwrap();
        let names: Vec<&str> = signature.params().iter().map(Param::name).collect();
        assert_eq!(names, ["x", "y", "scale"]);
        assert_eq!(signature.hint("y"), &TypeHint::literal([0i64, 1]));

        let args = Arguments::new(vec![Object::Int(2), Object::Int(1), Object::Int(5)], IndexMap::new());
        let object = Constructor::Class(class).invoke(args).unwrap();
        assert_eq!(object.downcast_ref::<Point>(), Some(&Point { x: 10, y: 1 }));
    }
}
