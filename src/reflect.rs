//! Classes read from `facet` shapes: field annotations come from the
//! reflected field types and instances are written field by field through a
//! [`Partial`].

use std::{
    error::Error,
    fmt::{self, Display},
};

use facet_core::{
    Def, Facet, Field, FieldFlags, NumericType, PrimitiveType, Shape, ShapeLayout, Type, UserType,
};
use facet_reflect::{Partial, ReflectError};
use indexmap::IndexMap;

use crate::{Arguments, BoxError, Literal, Object, RecordField, RecordType, Signature, TypeHint};

/// A built value could not be written into a reflected type.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ShapeError {
    /// The type is not a struct, so it has no fields to fill.
    NotAStruct(&'static str),
    /// A field without a default was given no value.
    MissingField(String),
    /// A value was given for a field the type does not have.
    UnknownField(String),
    /// A value does not fit the type it is written into.
    Mismatch {
        /// The reflected type.
        expected: &'static str,
        /// The annotation of the value.
        actual: String,
    },
    /// An integer does not fit the width of the reflected type.
    OutOfRange {
        /// The reflected type.
        ty: &'static str,
        /// The integer.
        value: i64,
    },
    /// `facet` refused the write.
    Reflect(String),
}

impl Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeError::NotAStruct(ty) => write!(f, "{ty} is not a struct"),
            ShapeError::MissingField(name) => write!(f, "missing required argument '{name}'"),
            ShapeError::UnknownField(name) => write!(f, "unexpected argument '{name}'"),
            ShapeError::Mismatch { expected, actual } => {
                write!(f, "cannot write {actual} into {expected}")
            }
            ShapeError::OutOfRange { ty, value } => write!(f, "{value} does not fit in {ty}"),
            ShapeError::Reflect(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ShapeError {}

impl From<ReflectError> for ShapeError {
    fn from(value: ReflectError) -> Self {
        Self::Reflect(value.to_string())
    }
}

/// The initializer signature of a reflected struct: one parameter per field.
pub(crate) fn signature(shape: &'static Shape) -> Signature {
    let Type::User(UserType::Struct(struct_def)) = &shape.ty else {
        return Signature::new();
    };
    let mut seen = vec![shape];
    struct_def
        .fields
        .iter()
        .fold(Signature::new(), |signature, field| {
            signature.param(field.name, hint_for((field.shape)(), &mut seen))
        })
}

// Nested structs become records. Types with no counterpart, and types that
// contain themselves, are left untyped.
fn hint_for(shape: &'static Shape, seen: &mut Vec<&'static Shape>) -> TypeHint {
    match shape.def {
        Def::Option(opt) => return TypeHint::optional(hint_for(opt.t, seen)),
        Def::List(list) => return TypeHint::list(hint_for(list.t(), seen)),
        Def::Set(set) => return TypeHint::set(hint_for(set.t(), seen)),
        Def::Map(map) => return TypeHint::mapping(hint_for(map.k(), seen), hint_for(map.v(), seen)),
        _ => {}
    }

    match shape.type_identifier {
        "String" | "&str" | "str" => return TypeHint::Str,
        "bool" => return TypeHint::Bool,
        _ => {}
    }

    match &shape.ty {
        Type::Primitive(PrimitiveType::Numeric(NumericType::Integer { .. })) => TypeHint::Int,
        Type::Primitive(PrimitiveType::Numeric(NumericType::Float)) => TypeHint::Float,
        Type::User(UserType::Struct(struct_def)) => {
            if seen.iter().any(|outer| std::ptr::eq(*outer, shape)) {
                return TypeHint::Any;
            }
            seen.push(shape);
            let fields: Vec<RecordField> = struct_def
                .fields
                .iter()
                .map(|field| {
                    let field_shape = (field.shape)();
                    let record_field = RecordField::new(field.name, hint_for(field_shape, seen));
                    if matches!(field_shape.def, Def::Option(_)) {
                        record_field.with_default(Literal::None)
                    } else {
                        record_field
                    }
                })
                .collect();
            seen.pop();
            TypeHint::Record(RecordType::new(shape.type_identifier, fields))
        }
        _ => TypeHint::Any,
    }
}

/// Builds a `T` from the arguments named after its fields.
///
/// Missing `Option` fields and fields marked `#[facet(default)]` take their
/// default.
pub(crate) fn construct<T: Facet<'static>>(args: &mut Arguments) -> Result<T, BoxError> {
    log::trace!("Entering `construct` method for {}", T::SHAPE.type_identifier);

    let Type::User(UserType::Struct(struct_def)) = &T::SHAPE.ty else {
        return Err(ShapeError::NotAStruct(T::SHAPE.type_identifier).into());
    };
    let mut values = IndexMap::with_capacity(struct_def.fields.len());
    for field in struct_def.fields {
        if let Some(object) = args.take_opt::<Object>(field.name)? {
            values.insert(field.name.to_string(), object);
        }
    }

    let mut typed_partial = Partial::alloc::<T>().map_err(ShapeError::from)?;
    {
        let partial = typed_partial.inner_mut();
        fill_fields(partial, struct_def.fields, values)?;
    }
    let boxed_value = typed_partial.build().map_err(ShapeError::from)?;
    log::trace!("Built {}", T::SHAPE.type_identifier);

    Ok(*boxed_value)
}

fn fill_fields(
    partial: &mut Partial<'_>,
    fields: &'static [Field],
    mut values: IndexMap<String, Object>,
) -> Result<(), ShapeError> {
    for (index, field) in fields.iter().enumerate() {
        match values.shift_remove(field.name) {
            Some(object) => {
                partial.begin_field(field.name)?;
                fill(partial, object)?;
                partial.end()?;
            }
            None if field.flags.contains(FieldFlags::DEFAULT)
                || matches!((field.shape)().def, Def::Option(_)) =>
            {
                log::trace!("Setting default for unset field: {}", field.name);
                partial.set_nth_field_to_default(index)?;
            }
            None => return Err(ShapeError::MissingField(field.name.to_string())),
        }
    }
    match values.into_keys().next() {
        Some(name) => Err(ShapeError::UnknownField(name)),
        None => Ok(()),
    }
}

fn fill(partial: &mut Partial<'_>, object: Object) -> Result<(), ShapeError> {
    let shape = partial.shape();
    log::trace!("Writing {} into {}", object.type_hint(), shape.type_identifier);

    let mismatch = |object: &Object| ShapeError::Mismatch {
        expected: shape.type_identifier,
        actual: object.type_hint().to_string(),
    };

    match shape.def {
        Def::Option(_) => {
            if object.is_none() {
                partial.set_default()?;
            } else {
                partial.begin_some()?;
                fill(partial, object)?;
                partial.end()?;
            }
            return Ok(());
        }
        Def::Pointer(_) => {
            partial.begin_smart_ptr()?;
            fill(partial, object)?;
            partial.end()?;
            return Ok(());
        }
        Def::List(_) | Def::Set(_) => {
            let items = match object {
                Object::List(items) | Object::Set(items) | Object::Tuple(items) => items,
                other => return Err(mismatch(&other)),
            };
            let is_set = matches!(shape.def, Def::Set(_));
            if is_set {
                partial.begin_set()?;
            } else {
                partial.begin_list()?;
            }
            for item in items {
                if is_set {
                    partial.begin_set_item()?;
                } else {
                    partial.begin_list_item()?;
                }
                fill(partial, item)?;
                partial.end()?;
            }
            return Ok(());
        }
        Def::Map(_) => {
            let Object::Map(map) = object else {
                return Err(mismatch(&object));
            };
            partial.begin_map()?;
            for (key, value) in map {
                partial.begin_key()?;
                fill(partial, Object::Str(key))?;
                partial.end()?;
                partial.begin_value()?;
                fill(partial, value)?;
                partial.end()?;
            }
            return Ok(());
        }
        _ => {}
    }

    if shape.inner.is_some() {
        partial.begin_inner()?;
        fill(partial, object)?;
        partial.end()?;
        return Ok(());
    }

    if let Type::User(UserType::Struct(struct_def)) = &shape.ty {
        if !matches!(shape.def, Def::Scalar) {
            let values = match object {
                Object::Record(record) => record.into_values(),
                Object::Map(map) => map,
                other => return Err(mismatch(&other)),
            };
            return fill_fields(partial, struct_def.fields, values);
        }
    }

    match object {
        Object::Str(s) if shape.type_identifier == "String" => {
            partial.set(s)?;
        }
        Object::Bool(b) if shape.type_identifier == "bool" => {
            partial.set(b)?;
        }
        Object::Bool(b) => fill_number(partial, i64::from(b))?,
        Object::Int(i) => fill_number(partial, i)?,
        Object::Float(x) if matches!(shape.ty, Type::Primitive(PrimitiveType::Numeric(NumericType::Float))) => {
            match shape.layout {
                ShapeLayout::Sized(layout) if layout.size() == 4 => partial.set(x as f32)?,
                _ => partial.set(x)?,
            };
        }
        other => return Err(mismatch(&other)),
    }
    Ok(())
}

fn fill_number(partial: &mut Partial<'_>, integer: i64) -> Result<(), ShapeError> {
    let shape = partial.shape();
    let mismatch = || ShapeError::Mismatch {
        expected: shape.type_identifier,
        actual: TypeHint::Int.to_string(),
    };
    let out_of_range = || ShapeError::OutOfRange {
        ty: shape.type_identifier,
        value: integer,
    };

    let size = match shape.layout {
        ShapeLayout::Sized(layout) => layout.size(),
        ShapeLayout::Unsized => return Err(mismatch()),
    };
    let Type::Primitive(PrimitiveType::Numeric(ty)) = shape.ty else {
        return Err(mismatch());
    };
    match (ty, size) {
        // Unsigned integers
        (NumericType::Integer { signed: false }, 1) => {
            partial.set(u8::try_from(integer).map_err(|_| out_of_range())?)?
        }
        (NumericType::Integer { signed: false }, 2) => {
            partial.set(u16::try_from(integer).map_err(|_| out_of_range())?)?
        }
        (NumericType::Integer { signed: false }, 4) => {
            partial.set(u32::try_from(integer).map_err(|_| out_of_range())?)?
        }
        (NumericType::Integer { signed: false }, 8) => {
            partial.set(u64::try_from(integer).map_err(|_| out_of_range())?)?
        }
        (NumericType::Integer { signed: false }, 16) => {
            partial.set(u128::try_from(integer).map_err(|_| out_of_range())?)?
        }
        // Signed integers
        (NumericType::Integer { signed: true }, 1) => {
            partial.set(i8::try_from(integer).map_err(|_| out_of_range())?)?
        }
        (NumericType::Integer { signed: true }, 2) => {
            partial.set(i16::try_from(integer).map_err(|_| out_of_range())?)?
        }
        (NumericType::Integer { signed: true }, 4) => {
            partial.set(i32::try_from(integer).map_err(|_| out_of_range())?)?
        }
        (NumericType::Integer { signed: true }, 8) => partial.set(integer)?,
        (NumericType::Integer { signed: true }, 16) => partial.set(i128::from(integer))?,
        // Floats from integers
        (NumericType::Float, 4) => partial.set(integer as f32)?,
        (NumericType::Float, 8) => partial.set(integer as f64)?,
        _ => return Err(mismatch()),
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use facet::Facet;

    use super::*;

    #[derive(Facet, Debug, PartialEq)]
    struct Inner {
        depth: u8,
        label: Option<String>,
    }

    #[derive(Facet, Debug, PartialEq)]
    struct Outer {
        name: String,
        ratio: f32,
        tags: Vec<String>,
        weights: HashMap<String, f64>,
        inner: Inner,
        #[facet(default)]
        retries: u32,
    }

    fn arguments(keyword: impl IntoIterator<Item = (&'static str, Object)>) -> Arguments {
        let keyword = keyword
            .into_iter()
            .map(|(name, object)| (name.to_string(), object))
            .collect();
        Arguments::new(Vec::new(), keyword)
    }

    #[test]
    fn fields_become_parameters() {
        let signature = signature(Outer::SHAPE);
        let names: Vec<&str> = signature.params().iter().map(|param| param.name()).collect();
        assert_eq!(names, ["name", "ratio", "tags", "weights", "inner", "retries"]);
        assert_eq!(signature.hint("name"), &TypeHint::Str);
        assert_eq!(signature.hint("ratio"), &TypeHint::Float);
        assert_eq!(signature.hint("tags"), &TypeHint::list(TypeHint::Str));
        assert_eq!(
            signature.hint("weights"),
            &TypeHint::mapping(TypeHint::Str, TypeHint::Float)
        );
        assert_eq!(signature.hint("retries"), &TypeHint::Int);

        let TypeHint::Record(inner) = signature.hint("inner") else {
            panic!("expected a record, got {}", signature.hint("inner"));
        };
        assert_eq!(inner.name(), "Inner");
        assert_eq!(inner.fields()[1].default(), Some(&Literal::None));
    }

    #[test]
    fn construct_writes_every_field() {
        let mut weights = IndexMap::new();
        weights.insert("a".to_string(), Object::Float(0.5));
        let mut inner = IndexMap::new();
        inner.insert("depth".to_string(), Object::Int(3));

        let mut args = arguments([
            ("name", Object::from("outer")),
            ("ratio", Object::Int(2)),
            ("tags", Object::List(vec![Object::from("x"), Object::from("y")])),
            ("weights", Object::Map(weights)),
            ("inner", Object::Map(inner)),
        ]);
        let outer = construct::<Outer>(&mut args).unwrap();
        args.ensure_consumed().unwrap();

        assert_eq!(outer.name, "outer");
        assert_eq!(outer.ratio, 2.0);
        assert_eq!(outer.tags, ["x", "y"]);
        assert_eq!(outer.weights.get("a"), Some(&0.5));
        assert_eq!(outer.inner, Inner { depth: 3, label: None });
        assert_eq!(outer.retries, 0);
    }

    #[test]
    fn construct_reports_bad_fields() {
        let err = construct::<Inner>(&mut arguments([])).unwrap_err();
        assert_eq!(err.to_string(), "missing required argument 'depth'");

        let err = construct::<Inner>(&mut arguments([("depth", Object::Int(300))])).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ShapeError>(),
            Some(&ShapeError::OutOfRange { ty: "u8", value: 300 })
        );

        let err = construct::<Inner>(&mut arguments([("depth", Object::from("deep"))])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ShapeError>(),
            Some(ShapeError::Mismatch { expected: "u8", .. })
        ));
    }
}
