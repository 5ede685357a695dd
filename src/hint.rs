use std::{
    fmt::{self, Display},
    hash::{Hash, Hasher},
    sync::Arc,
};

use crate::{Class, Value};

/// A type annotation that directs how a config node is interpreted.
///
/// Hints are never mutated while building; they are only decomposed into an
/// origin and its type arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeHint {
    /// No annotation: the node is built without constraints.
    Any,
    /// The null type.
    None,
    /// Booleans.
    Bool,
    /// 64-bit signed integers.
    Int,
    /// 64-bit floats. Integer configs are widened.
    Float,
    /// Complex numbers. Integer configs are widened.
    Complex,
    /// Strings.
    Str,
    /// An ordered sequence, optionally with an element type.
    List(Option<Box<TypeHint>>),
    /// An unordered collection without duplicates, optionally with an element type.
    Set(Option<Box<TypeHint>>),
    /// A tuple.
    Tuple(TupleHint),
    /// A string-keyed mapping, optionally with key and value types.
    Mapping(Option<Box<(TypeHint, TypeHint)>>),
    /// One of a fixed set of literal values.
    Literal(Vec<Literal>),
    /// The first alternative that builds successfully, tried in declared order.
    Union(Vec<TypeHint>),
    /// A deferred construction handle over the inner type.
    Lazy(Option<Box<TypeHint>>),
    /// A record with fixed named fields.
    Record(RecordType),
    /// An enumeration with a fixed value space.
    Enum(EnumType),
    /// A class, possibly parameterized with type arguments.
    Class(Class, Vec<TypeHint>),
    /// A type variable.
    TypeVar(TypeVar),
}

/// Shapes of tuple annotations.
#[derive(Debug, Clone, PartialEq)]
pub enum TupleHint {
    /// `tuple` without arguments: elements are built untyped.
    Unparameterized,
    /// `tuple[T, ...]`: any number of elements, all of type `T`.
    Variadic(Box<TypeHint>),
    /// `tuple[A, B, C]`: exactly these elements, by position.
    Fixed(Vec<TypeHint>),
}

/// A literal value allowed by a [`TypeHint::Literal`] or carried by an enum member.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// The null value.
    None,
    /// A boolean.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A string.
    Str(String),
}

impl Literal {
    /// The type a value of this literal has at runtime.
    pub fn type_hint(&self) -> TypeHint {
        match self {
            Literal::None => TypeHint::None,
            Literal::Bool(_) => TypeHint::Bool,
            Literal::Int(_) => TypeHint::Int,
            Literal::Str(_) => TypeHint::Str,
        }
    }

    /// Whether `value` equals this literal verbatim.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Literal::None, Value::Null) => true,
            (Literal::Bool(a), Value::Bool(b)) => a == b,
            (Literal::Int(a), Value::Int(b)) => a == b,
            (Literal::Str(a), Value::Str(b)) => a == b,
            (_, Value::Object(object)) => object.to_literal().as_ref() == Some(self),
            _ => false,
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::None => f.write_str("None"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Str(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::Str(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Int(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

/// A generic type parameter.
///
/// Type variables are identified by name.
#[derive(Debug, Clone)]
pub struct TypeVar(Arc<TypeVarDef>);

#[derive(Debug)]
struct TypeVarDef {
    name: String,
    bound: Option<TypeHint>,
    constraints: Vec<TypeHint>,
}

impl TypeVar {
    /// An unconstrained type variable.
    pub fn new(name: impl Into<String>) -> Self {
        Self(Arc::new(TypeVarDef {
            name: name.into(),
            bound: None,
            constraints: Vec::new(),
        }))
    }

    /// A type variable with an upper bound.
    pub fn bounded(name: impl Into<String>, bound: TypeHint) -> Self {
        Self(Arc::new(TypeVarDef {
            name: name.into(),
            bound: Some(bound),
            constraints: Vec::new(),
        }))
    }

    /// A type variable restricted to one of `constraints`.
    pub fn constrained(name: impl Into<String>, constraints: impl IntoIterator<Item = TypeHint>) -> Self {
        Self(Arc::new(TypeVarDef {
            name: name.into(),
            bound: None,
            constraints: constraints.into_iter().collect(),
        }))
    }

    /// The variable's name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The upper bound, if any.
    pub fn bound(&self) -> Option<&TypeHint> {
        self.0.bound.as_ref()
    }

    /// The allowed types, if the variable is constrained.
    pub fn constraints(&self) -> &[TypeHint] {
        &self.0.constraints
    }
}

impl PartialEq for TypeVar {
    fn eq(&self, other: &Self) -> bool {
        self.0.name == other.0.name
    }
}

impl Eq for TypeVar {}

impl Hash for TypeVar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

/// A named-field record type, built from a mapping config.
#[derive(Debug, Clone)]
pub struct RecordType(Arc<RecordDef>);

#[derive(Debug)]
struct RecordDef {
    name: String,
    fields: Vec<RecordField>,
}

/// One declared field of a [`RecordType`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordField {
    name: String,
    hint: TypeHint,
    default: Option<Literal>,
}

impl RecordField {
    /// A required field.
    pub fn new(name: impl Into<String>, hint: TypeHint) -> Self {
        Self {
            name: name.into(),
            hint,
            default: None,
        }
    }

    /// Gives the field a default used when the config omits it.
    pub fn with_default(mut self, default: impl Into<Literal>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// The field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared type.
    pub fn hint(&self) -> &TypeHint {
        &self.hint
    }

    /// The default value, if any.
    pub fn default(&self) -> Option<&Literal> {
        self.default.as_ref()
    }
}

impl RecordType {
    /// Declares a record type.
    pub fn new(name: impl Into<String>, fields: impl IntoIterator<Item = RecordField>) -> Self {
        Self(Arc::new(RecordDef {
            name: name.into(),
            fields: fields.into_iter().collect(),
        }))
    }

    /// The record's name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Declared fields in order.
    pub fn fields(&self) -> &[RecordField] {
        &self.0.fields
    }

    /// Looks up a declared field.
    pub fn field(&self, name: &str) -> Option<&RecordField> {
        self.0.fields.iter().find(|field| field.name == name)
    }
}

impl PartialEq for RecordType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// An enumeration whose members each carry a literal value.
#[derive(Debug, Clone)]
pub struct EnumType(Arc<EnumDef>);

#[derive(Debug)]
struct EnumDef {
    name: String,
    members: Vec<(String, Literal)>,
}

impl EnumType {
    /// Declares an enumeration from `(member name, value)` pairs.
    pub fn new<N, L>(name: impl Into<String>, members: impl IntoIterator<Item = (N, L)>) -> Self
    where
        N: Into<String>,
        L: Into<Literal>,
    {
        Self(Arc::new(EnumDef {
            name: name.into(),
            members: members
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }))
    }

    /// The enumeration's name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Members in declaration order.
    pub fn members(&self) -> impl Iterator<Item = (&str, &Literal)> {
        self.0.members.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub(crate) fn member(&self, index: usize) -> (&str, &Literal) {
        let (name, value) = &self.0.members[index];
        (name, value)
    }

    /// Position of the member whose value equals `value`.
    pub fn position_of(&self, value: &Value) -> Option<usize> {
        self.0
            .members
            .iter()
            .position(|(_, literal)| literal.matches(value))
    }
}

impl PartialEq for EnumType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl TypeHint {
    /// `T or None`.
    pub fn optional(inner: TypeHint) -> Self {
        TypeHint::Union(vec![inner, TypeHint::None])
    }

    /// `list[T]`.
    pub fn list(elem: TypeHint) -> Self {
        TypeHint::List(Some(Box::new(elem)))
    }

    /// `set[T]`.
    pub fn set(elem: TypeHint) -> Self {
        TypeHint::Set(Some(Box::new(elem)))
    }

    /// `tuple[A, B, ...]` with a fixed arity.
    pub fn tuple(elems: impl IntoIterator<Item = TypeHint>) -> Self {
        TypeHint::Tuple(TupleHint::Fixed(elems.into_iter().collect()))
    }

    /// `tuple[T, ...]`.
    pub fn variadic(elem: TypeHint) -> Self {
        TypeHint::Tuple(TupleHint::Variadic(Box::new(elem)))
    }

    /// `dict[K, V]`.
    pub fn mapping(key: TypeHint, value: TypeHint) -> Self {
        TypeHint::Mapping(Some(Box::new((key, value))))
    }

    /// `Union[A, B, ...]`.
    pub fn union(alternatives: impl IntoIterator<Item = TypeHint>) -> Self {
        TypeHint::Union(alternatives.into_iter().collect())
    }

    /// `Literal[a, b, ...]`.
    pub fn literal<L: Into<Literal>>(values: impl IntoIterator<Item = L>) -> Self {
        TypeHint::Literal(values.into_iter().map(Into::into).collect())
    }

    /// `Lazy[T]`.
    pub fn lazy(inner: TypeHint) -> Self {
        TypeHint::Lazy(Some(Box::new(inner)))
    }

    /// An unparameterized class.
    pub fn class(class: &Class) -> Self {
        TypeHint::Class(class.clone(), Vec::new())
    }

    /// A class applied to type arguments, e.g. `Foo[int]`.
    pub fn generic(class: &Class, args: impl IntoIterator<Item = TypeHint>) -> Self {
        TypeHint::Class(class.clone(), args.into_iter().collect())
    }

    /// A type variable.
    pub fn var(var: &TypeVar) -> Self {
        TypeHint::TypeVar(var.clone())
    }

    /// True when the hint places no constraint on the node.
    pub fn is_any(&self) -> bool {
        matches!(self, TypeHint::Any)
    }

    /// Collapses `Union[T, None]` to `T`; every other hint is returned as is.
    pub fn remove_optional(&self) -> &TypeHint {
        match self {
            TypeHint::Union(alternatives)
                if alternatives.len() == 2 && alternatives[1] == TypeHint::None =>
            {
                &alternatives[0]
            }
            hint => hint,
        }
    }

    /// The hint with its type arguments stripped.
    pub fn origin(&self) -> TypeHint {
        match self {
            TypeHint::List(_) => TypeHint::List(None),
            TypeHint::Set(_) => TypeHint::Set(None),
            TypeHint::Tuple(_) => TypeHint::Tuple(TupleHint::Unparameterized),
            TypeHint::Mapping(_) => TypeHint::Mapping(None),
            TypeHint::Lazy(_) => TypeHint::Lazy(None),
            TypeHint::Class(class, _) => TypeHint::Class(class.clone(), Vec::new()),
            hint => hint.clone(),
        }
    }

    /// The class this hint refers to, if it is a class hint.
    pub fn as_class(&self) -> Option<&Class> {
        match self {
            TypeHint::Class(class, _) => Some(class),
            _ => None,
        }
    }

    /// Whether every value of type `self` is also a value of type `other`.
    pub fn is_subtype_of(&self, other: &TypeHint) -> bool {
        issubtype(self, other)
    }
}

fn elements_subtype(a: &Option<Box<TypeHint>>, b: &Option<Box<TypeHint>>) -> bool {
    match (a, b) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(a), Some(b)) => issubtype(a, b),
    }
}

fn tuple_subtype(a: &TupleHint, b: &TupleHint) -> bool {
    match (a, b) {
        (_, TupleHint::Unparameterized) => true,
        (TupleHint::Unparameterized, _) => false,
        (TupleHint::Variadic(a), TupleHint::Variadic(b)) => issubtype(a, b),
        (TupleHint::Variadic(_), TupleHint::Fixed(_)) => false,
        (TupleHint::Fixed(a), TupleHint::Variadic(b)) => a.iter().all(|a| issubtype(a, b)),
        (TupleHint::Fixed(a), TupleHint::Fixed(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| issubtype(a, b))
        }
    }
}

fn class_subtype(a: &Class, a_args: &[TypeHint], b: &Class, b_args: &[TypeHint]) -> bool {
    if a == b {
        if b_args.is_empty() {
            return true;
        }
        if a_args.is_empty() || a_args.len() != b_args.len() {
            return false;
        }
        return a_args.iter().zip(b_args).all(|(a, b)| issubtype(a, b));
    }

    // Unspecified arguments of `a` count as `Any` while walking its bases.
    let mut bindings = crate::TypeVarMap::default();
    for (i, param) in a.type_params().iter().enumerate() {
        bindings.insert(param.clone(), a_args.get(i).cloned().unwrap_or(TypeHint::Any));
    }
    let target = TypeHint::Class(b.clone(), b_args.to_vec());
    a.bases()
        .iter()
        .any(|base| issubtype(&bindings.substitute(base), &target))
}

/// Subtype test between two hints.
///
/// `Any` on either side is compatible with everything. Type variables are
/// compared through their bound or constraints. Unions on the left require
/// every alternative to fit; unions on the right require one. `bool` is a
/// subtype of `int`.
pub fn issubtype(a: &TypeHint, b: &TypeHint) -> bool {
    if a == b || a.is_any() || b.is_any() {
        return true;
    }

    match (a, b) {
        (TypeHint::TypeVar(var), _) => {
            if let Some(bound) = var.bound() {
                issubtype(bound, b)
            } else if !var.constraints().is_empty() {
                var.constraints().iter().all(|c| issubtype(c, b))
            } else {
                true
            }
        }
        (_, TypeHint::TypeVar(var)) => {
            if let Some(bound) = var.bound() {
                issubtype(a, bound)
            } else if !var.constraints().is_empty() {
                var.constraints().iter().any(|c| issubtype(a, c))
            } else {
                true
            }
        }
        (TypeHint::Union(alternatives), _) => alternatives.iter().all(|alt| issubtype(alt, b)),
        (_, TypeHint::Union(alternatives)) => alternatives.iter().any(|alt| issubtype(a, alt)),
        (TypeHint::Literal(values), TypeHint::Literal(allowed)) => {
            values.iter().all(|value| allowed.contains(value))
        }
        (TypeHint::Literal(values), _) => values.iter().all(|value| issubtype(&value.type_hint(), b)),
        (TypeHint::List(a), TypeHint::List(b))
        | (TypeHint::Set(a), TypeHint::Set(b))
        | (TypeHint::Lazy(a), TypeHint::Lazy(b)) => elements_subtype(a, b),
        (TypeHint::Tuple(a), TypeHint::Tuple(b)) => tuple_subtype(a, b),
        (TypeHint::Tuple(shape), TypeHint::List(elem)) => match (shape, elem) {
            (_, None) => true,
            (TupleHint::Unparameterized, Some(_)) => false,
            (TupleHint::Variadic(a), Some(b)) => issubtype(a, b),
            (TupleHint::Fixed(a), Some(b)) => a.iter().all(|a| issubtype(a, b)),
        },
        (TypeHint::Mapping(a), TypeHint::Mapping(b)) => match (a, b) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(b)) => issubtype(&a.0, &b.0) && issubtype(&a.1, &b.1),
        },
        (TypeHint::Class(a, a_args), TypeHint::Class(b, b_args)) => class_subtype(a, a_args, b, b_args),
        (TypeHint::Bool, TypeHint::Int) => true,
        _ => false,
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, hints: &[TypeHint]) -> fmt::Result {
    for (i, hint) in hints.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{hint}")?;
    }
    Ok(())
}

impl Display for TypeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeHint::Any => f.write_str("Any"),
            TypeHint::None => f.write_str("None"),
            TypeHint::Bool => f.write_str("bool"),
            TypeHint::Int => f.write_str("int"),
            TypeHint::Float => f.write_str("float"),
            TypeHint::Complex => f.write_str("complex"),
            TypeHint::Str => f.write_str("str"),
            TypeHint::List(None) => f.write_str("list"),
            TypeHint::List(Some(elem)) => write!(f, "list[{elem}]"),
            TypeHint::Set(None) => f.write_str("set"),
            TypeHint::Set(Some(elem)) => write!(f, "set[{elem}]"),
            TypeHint::Tuple(TupleHint::Unparameterized) => f.write_str("tuple"),
            TypeHint::Tuple(TupleHint::Variadic(elem)) => write!(f, "tuple[{elem}, ...]"),
            TypeHint::Tuple(TupleHint::Fixed(elems)) => {
                f.write_str("tuple[")?;
                write_list(f, elems)?;
                f.write_str("]")
            }
            TypeHint::Mapping(None) => f.write_str("dict"),
            TypeHint::Mapping(Some(kv)) => write!(f, "dict[{}, {}]", kv.0, kv.1),
            TypeHint::Literal(values) => {
                f.write_str("Literal[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
            TypeHint::Union(alternatives) => {
                f.write_str("Union[")?;
                write_list(f, alternatives)?;
                f.write_str("]")
            }
            TypeHint::Lazy(None) => f.write_str("Lazy"),
            TypeHint::Lazy(Some(inner)) => write!(f, "Lazy[{inner}]"),
            TypeHint::Record(record) => f.write_str(record.name()),
            TypeHint::Enum(enumeration) => f.write_str(enumeration.name()),
            TypeHint::Class(class, args) if args.is_empty() => f.write_str(class.name()),
            TypeHint::Class(class, args) => {
                write!(f, "{}[", class.name())?;
                write_list(f, args)?;
                f.write_str("]")
            }
            TypeHint::TypeVar(var) => f.write_str(var.name()),
        }
    }
}
