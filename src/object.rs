use std::{
    any::Any,
    error::Error,
    fmt::{self, Debug, Display},
    rc::Rc,
};

use indexmap::IndexMap;

use crate::{Class, EnumType, Lazy, Literal, Placeholder, RecordType, TupleHint, TypeHint, Value};

/// A value produced by a build.
#[derive(Clone)]
pub enum Object {
    /// The null value.
    None,
    /// A boolean.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A float.
    Float(f64),
    /// A complex number.
    Complex {
        /// Real part.
        re: f64,
        /// Imaginary part.
        im: f64,
    },
    /// A string.
    Str(String),
    /// An ordered sequence.
    List(Vec<Object>),
    /// A collection without duplicates, in first-seen order.
    Set(Vec<Object>),
    /// A tuple.
    Tuple(Vec<Object>),
    /// A string-keyed mapping.
    Map(IndexMap<String, Object>),
    /// A member of an enumeration.
    Enum(EnumMember),
    /// A built record.
    Record(Record),
    /// An instance produced by a class constructor.
    Instance(Instance),
    /// A deferred construction handle.
    Lazy(Lazy),
    /// A placeholder passed through unchanged.
    Placeholder(Placeholder),
}

impl Object {
    /// Converts a raw config value without interpreting it.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Object::None,
            Value::Bool(b) => Object::Bool(b),
            Value::Int(i) => Object::Int(i),
            Value::Float(x) => Object::Float(x),
            Value::Str(s) => Object::Str(s),
            Value::Seq(items) => Object::List(items.into_iter().map(Object::from_value).collect()),
            Value::Set(items) => Object::set(items.into_iter().map(Object::from_value)),
            Value::Map(map) => Object::Map(
                map.into_iter()
                    .map(|(key, value)| (key, Object::from_value(value)))
                    .collect(),
            ),
            Value::Placeholder(placeholder) => Object::Placeholder(placeholder),
            Value::Object(object) => object,
        }
    }

    /// Builds a set, dropping duplicates and keeping first-seen order.
    pub fn set(items: impl IntoIterator<Item = Object>) -> Self {
        let mut unique: Vec<Object> = Vec::new();
        for item in items {
            if !unique.contains(&item) {
                unique.push(item);
            }
        }
        Object::Set(unique)
    }

    /// True for [`Object::None`].
    pub fn is_none(&self) -> bool {
        matches!(self, Object::None)
    }

    /// The string, if this object is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Object::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The integer, if this object is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Object::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The float, if this object is one.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Object::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// The elements of a list, set or tuple.
    pub fn as_slice(&self) -> Option<&[Object]> {
        match self {
            Object::List(items) | Object::Set(items) | Object::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// The mapping, if this object is one.
    pub fn as_map(&self) -> Option<&IndexMap<String, Object>> {
        match self {
            Object::Map(map) => Some(map),
            _ => None,
        }
    }

    /// The instance, if this object was produced by a class constructor.
    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Object::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    /// The lazy handle, if this object is one.
    pub fn as_lazy(&self) -> Option<&Lazy> {
        match self {
            Object::Lazy(lazy) => Some(lazy),
            _ => None,
        }
    }

    /// Borrows the payload of an instance as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_instance().and_then(Instance::downcast_ref)
    }

    pub(crate) fn is_sequence(&self) -> bool {
        matches!(self, Object::List(_) | Object::Set(_) | Object::Tuple(_))
    }

    pub(crate) fn into_sequence(self) -> Option<Vec<Object>> {
        match self {
            Object::List(items) | Object::Set(items) | Object::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub(crate) fn to_literal(&self) -> Option<Literal> {
        match self {
            Object::None => Some(Literal::None),
            Object::Bool(b) => Some(Literal::Bool(*b)),
            Object::Int(i) => Some(Literal::Int(*i)),
            Object::Str(s) => Some(Literal::Str(s.clone())),
            _ => None,
        }
    }

    /// The runtime type of the object.
    pub fn type_hint(&self) -> TypeHint {
        match self {
            Object::None => TypeHint::None,
            Object::Bool(_) => TypeHint::Bool,
            Object::Int(_) => TypeHint::Int,
            Object::Float(_) => TypeHint::Float,
            Object::Complex { .. } => TypeHint::Complex,
            Object::Str(_) => TypeHint::Str,
            Object::List(_) => TypeHint::List(None),
            Object::Set(_) => TypeHint::Set(None),
            Object::Tuple(_) => TypeHint::Tuple(TupleHint::Unparameterized),
            Object::Map(_) => TypeHint::Mapping(None),
            Object::Enum(member) => TypeHint::Enum(member.ty.clone()),
            Object::Record(record) => TypeHint::Record(record.ty.clone()),
            Object::Instance(instance) => TypeHint::class(&instance.class),
            Object::Lazy(lazy) => TypeHint::Lazy(Some(Box::new(lazy.type_hint().clone()))),
            Object::Placeholder(placeholder) => placeholder.type_hint().clone(),
        }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::None, Object::None) => true,
            (Object::Bool(a), Object::Bool(b)) => a == b,
            (Object::Int(a), Object::Int(b)) => a == b,
            (Object::Float(a), Object::Float(b)) => a == b,
            (Object::Complex { re: ar, im: ai }, Object::Complex { re: br, im: bi }) => {
                ar == br && ai == bi
            }
            (Object::Str(a), Object::Str(b)) => a == b,
            (Object::List(a), Object::List(b)) | (Object::Tuple(a), Object::Tuple(b)) => a == b,
            (Object::Set(a), Object::Set(b)) => {
                a.len() == b.len() && a.iter().all(|item| b.contains(item))
            }
            (Object::Map(a), Object::Map(b)) => a == b,
            (Object::Enum(a), Object::Enum(b)) => a == b,
            (Object::Record(a), Object::Record(b)) => a == b,
            (Object::Instance(a), Object::Instance(b)) => a == b,
            (Object::Lazy(a), Object::Lazy(b)) => {
                a.path() == b.path() && a.config() == b.config() && a.type_hint() == b.type_hint()
            }
            (Object::Placeholder(a), Object::Placeholder(b)) => a == b,
            _ => false,
        }
    }
}

impl Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::None => f.write_str("None"),
            Object::Bool(b) => write!(f, "Bool({b})"),
            Object::Int(i) => write!(f, "Int({i})"),
            Object::Float(x) => write!(f, "Float({x:?})"),
            Object::Complex { re, im } => write!(f, "Complex({re:?}, {im:?})"),
            Object::Str(s) => write!(f, "Str({s:?})"),
            Object::List(items) => f.debug_tuple("List").field(items).finish(),
            Object::Set(items) => f.debug_tuple("Set").field(items).finish(),
            Object::Tuple(items) => f.debug_tuple("Tuple").field(items).finish(),
            Object::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Object::Enum(member) => write!(f, "Enum({member})"),
            Object::Record(record) => f.debug_tuple("Record").field(record).finish(),
            Object::Instance(instance) => write!(f, "{instance:?}"),
            Object::Lazy(lazy) => write!(f, "{lazy:?}"),
            Object::Placeholder(placeholder) => write!(f, "{placeholder:?}"),
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Object]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::None => f.write_str("None"),
            Object::Bool(b) => write!(f, "{b}"),
            Object::Int(i) => write!(f, "{i}"),
            Object::Float(x) => write!(f, "{x:?}"),
            Object::Complex { re, im } => write!(f, "({re}{im:+}j)"),
            Object::Str(s) => write!(f, "{s:?}"),
            Object::List(items) => {
                f.write_str("[")?;
                write_items(f, items)?;
                f.write_str("]")
            }
            Object::Set(items) => {
                f.write_str("{")?;
                write_items(f, items)?;
                f.write_str("}")
            }
            Object::Tuple(items) => {
                f.write_str("(")?;
                write_items(f, items)?;
                f.write_str(")")
            }
            Object::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key:?}: {value}")?;
                }
                f.write_str("}")
            }
            Object::Enum(member) => write!(f, "{member}"),
            Object::Record(record) => {
                write!(f, "{}(", record.ty.name())?;
                for (i, (key, value)) in record.values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}={value}")?;
                }
                f.write_str(")")
            }
            Object::Instance(instance) => write!(f, "<{} instance>", instance.class.name()),
            Object::Lazy(lazy) => write!(f, "Lazy[{}]", lazy.type_hint()),
            Object::Placeholder(placeholder) => write!(f, "{placeholder}"),
        }
    }
}

impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Object::Bool(value)
    }
}

impl From<i64> for Object {
    fn from(value: i64) -> Self {
        Object::Int(value)
    }
}

impl From<f64> for Object {
    fn from(value: f64) -> Self {
        Object::Float(value)
    }
}

impl From<&str> for Object {
    fn from(value: &str) -> Self {
        Object::Str(value.to_string())
    }
}

impl From<String> for Object {
    fn from(value: String) -> Self {
        Object::Str(value)
    }
}

impl From<Instance> for Object {
    fn from(value: Instance) -> Self {
        Object::Instance(value)
    }
}

/// A value produced by a class constructor, tagged with the class that made it.
#[derive(Clone)]
pub struct Instance {
    class: Class,
    value: Rc<dyn Any>,
}

impl Instance {
    /// Wraps a constructed value.
    pub fn new<T: Any>(class: &Class, value: T) -> Self {
        Self {
            class: class.clone(),
            value: Rc::new(value),
        }
    }

    pub(crate) fn from_boxed(class: &Class, value: Box<dyn Any>) -> Self {
        Self {
            class: class.clone(),
            value: Rc::from(value),
        }
    }

    /// The class whose constructor produced this instance.
    pub fn class(&self) -> &Class {
        &self.class
    }

    /// True when the payload is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Borrows the payload as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Shares the payload as `Rc<T>`.
    pub fn downcast<T: Any>(&self) -> Option<Rc<T>> {
        Rc::clone(&self.value).downcast::<T>().ok()
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.value, &other.value)
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class.name())
            .finish_non_exhaustive()
    }
}

/// A member of an [`EnumType`].
#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    ty: EnumType,
    index: usize,
}

impl EnumMember {
    pub(crate) fn new(ty: EnumType, index: usize) -> Self {
        Self { ty, index }
    }

    /// The enumeration this member belongs to.
    pub fn enum_type(&self) -> &EnumType {
        &self.ty
    }

    /// The member's name.
    pub fn name(&self) -> &str {
        self.ty.member(self.index).0
    }

    /// The member's value.
    pub fn value(&self) -> &Literal {
        self.ty.member(self.index).1
    }
}

impl Display for EnumMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.ty.name(), self.name())
    }
}

/// A built record: declared fields in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    ty: RecordType,
    values: IndexMap<String, Object>,
}

impl Record {
    pub(crate) fn new(ty: RecordType, values: IndexMap<String, Object>) -> Self {
        Self { ty, values }
    }

    /// The record type.
    pub fn record_type(&self) -> &RecordType {
        &self.ty
    }

    /// Looks up a field value.
    pub fn get(&self, name: &str) -> Option<&Object> {
        self.values.get(name)
    }

    /// Field values in declaration order.
    pub fn values(&self) -> &IndexMap<String, Object> {
        &self.values
    }

    pub(crate) fn into_values(self) -> IndexMap<String, Object> {
        self.values
    }
}

/// An object did not have the shape a conversion asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMismatch {
    expected: &'static str,
    actual: String,
}

impl ObjectMismatch {
    fn new(expected: &'static str, actual: &Object) -> Self {
        Self {
            expected,
            actual: actual.type_hint().to_string(),
        }
    }
}

impl Display for ObjectMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}, found {}", self.expected, self.actual)
    }
}

impl Error for ObjectMismatch {}

/// Conversion from a built [`Object`] into a plain Rust value.
pub trait FromObject: Sized {
    /// Performs the conversion.
    fn from_object(object: Object) -> Result<Self, ObjectMismatch>;
}

impl FromObject for Object {
    fn from_object(object: Object) -> Result<Self, ObjectMismatch> {
        Ok(object)
    }
}

impl FromObject for bool {
    fn from_object(object: Object) -> Result<Self, ObjectMismatch> {
        match object {
            Object::Bool(b) => Ok(b),
            other => Err(ObjectMismatch::new("bool", &other)),
        }
    }
}

impl FromObject for i64 {
    fn from_object(object: Object) -> Result<Self, ObjectMismatch> {
        match object {
            Object::Int(i) => Ok(i),
            Object::Bool(b) => Ok(i64::from(b)),
            other => Err(ObjectMismatch::new("int", &other)),
        }
    }
}

impl FromObject for usize {
    fn from_object(object: Object) -> Result<Self, ObjectMismatch> {
        match object {
            Object::Int(i) => usize::try_from(i).map_err(|_| ObjectMismatch {
                expected: "non-negative int",
                actual: i.to_string(),
            }),
            other => Err(ObjectMismatch::new("int", &other)),
        }
    }
}

impl FromObject for f64 {
    fn from_object(object: Object) -> Result<Self, ObjectMismatch> {
        match object {
            Object::Float(x) => Ok(x),
            Object::Int(i) => Ok(i as f64),
            Object::Bool(b) => Ok(f64::from(u8::from(b))),
            other => Err(ObjectMismatch::new("float", &other)),
        }
    }
}

impl FromObject for String {
    fn from_object(object: Object) -> Result<Self, ObjectMismatch> {
        match object {
            Object::Str(s) => Ok(s),
            other => Err(ObjectMismatch::new("str", &other)),
        }
    }
}

impl<T: FromObject> FromObject for Vec<T> {
    fn from_object(object: Object) -> Result<Self, ObjectMismatch> {
        match object {
            Object::List(items) | Object::Set(items) | Object::Tuple(items) => {
                items.into_iter().map(T::from_object).collect()
            }
            other => Err(ObjectMismatch::new("sequence", &other)),
        }
    }
}

impl<T: FromObject> FromObject for Option<T> {
    fn from_object(object: Object) -> Result<Self, ObjectMismatch> {
        match object {
            Object::None => Ok(None),
            other => T::from_object(other).map(Some),
        }
    }
}

impl<T: FromObject> FromObject for IndexMap<String, T> {
    fn from_object(object: Object) -> Result<Self, ObjectMismatch> {
        match object {
            Object::Map(map) => map
                .into_iter()
                .map(|(key, value)| Ok((key, T::from_object(value)?)))
                .collect(),
            other => Err(ObjectMismatch::new("dict", &other)),
        }
    }
}

impl FromObject for Instance {
    fn from_object(object: Object) -> Result<Self, ObjectMismatch> {
        match object {
            Object::Instance(instance) => Ok(instance),
            other => Err(ObjectMismatch::new("class instance", &other)),
        }
    }
}

impl<T: Any> FromObject for Rc<T> {
    fn from_object(object: Object) -> Result<Self, ObjectMismatch> {
        match &object {
            Object::Instance(instance) => instance
                .downcast::<T>()
                .ok_or_else(|| ObjectMismatch::new(std::any::type_name::<T>(), &object)),
            _ => Err(ObjectMismatch::new(std::any::type_name::<T>(), &object)),
        }
    }
}

impl FromObject for Lazy {
    fn from_object(object: Object) -> Result<Self, ObjectMismatch> {
        match object {
            Object::Lazy(lazy) => Ok(lazy),
            other => Err(ObjectMismatch::new("Lazy", &other)),
        }
    }
}

impl FromObject for Placeholder {
    fn from_object(object: Object) -> Result<Self, ObjectMismatch> {
        match object {
            Object::Placeholder(placeholder) => Ok(placeholder),
            other => Err(ObjectMismatch::new("Placeholder", &other)),
        }
    }
}

impl FromObject for EnumMember {
    fn from_object(object: Object) -> Result<Self, ObjectMismatch> {
        match object {
            Object::Enum(member) => Ok(member),
            other => Err(ObjectMismatch::new("enum member", &other)),
        }
    }
}

impl FromObject for Record {
    fn from_object(object: Object) -> Result<Self, ObjectMismatch> {
        match object {
            Object::Record(record) => Ok(record),
            other => Err(ObjectMismatch::new("record", &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sets_drop_duplicates_in_first_seen_order() {
        let set = Object::set([1i64, 2, 1, 3, 2].map(Object::Int));
        assert_eq!(set, Object::Set(vec![Object::Int(1), Object::Int(2), Object::Int(3)]));
        assert_eq!(set, Object::Set(vec![Object::Int(3), Object::Int(2), Object::Int(1)]));
    }

    #[test]
    fn from_value_keeps_shape() {
        let value = Value::map([("a", Value::seq([1i64, 2, 3]))]);
        let object = Object::from_value(value);
        let map = object.as_map().unwrap();
        assert_eq!(
            map["a"],
            Object::List(vec![Object::Int(1), Object::Int(2), Object::Int(3)])
        );
    }

    #[test]
    fn plain_conversions() {
        let numbers = Vec::<f64>::from_object(Object::List(vec![Object::Int(1), Object::Float(2.5)]));
        assert_eq!(numbers.unwrap(), vec![1.0, 2.5]);

        let missing = Option::<String>::from_object(Object::None).unwrap();
        assert_eq!(missing, None);

        let err = String::from_object(Object::Int(3)).unwrap_err();
        assert_eq!(err.to_string(), "expected str, found int");
    }
}
