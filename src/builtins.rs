use std::sync::LazyLock;

use indexmap::IndexMap;

use crate::{Arguments, BoxError, Function, Object, Signature, TupleHint, TypeHint};

static BUILTINS: LazyLock<IndexMap<String, Function>> = LazyLock::new(|| {
    [
        (
            TypeHint::Bool,
            Function::new("bool", Signature::new(), |args| {
                let value = args.next_positional::<Object>()?;
                Ok(Object::Bool(value.as_ref().is_some_and(truthy)))
            }),
        ),
        (TypeHint::Int, Function::new("int", Signature::new(), build_int)),
        (TypeHint::Float, Function::new("float", Signature::new(), build_float)),
        (
            TypeHint::Complex,
            Function::new(
                "complex",
                Signature::new()
                    .param("real", TypeHint::Float)
                    .param("imag", TypeHint::Float),
                |args| {
                    let re = args.take_or::<f64>("real", 0.0)?;
                    let im = args.take_or::<f64>("imag", 0.0)?;
                    Ok(Object::Complex { re, im })
                },
            ),
        ),
        (
            TypeHint::Str,
            Function::new("str", Signature::new(), |args| {
                let value = args.next_positional::<Object>()?;
                Ok(Object::Str(match value {
                    None => String::new(),
                    Some(Object::Str(s)) => s,
                    Some(other) => other.to_string(),
                }))
            }),
        ),
        (
            TypeHint::List(None),
            Function::new("list", Signature::new(), |args| Ok(Object::List(elements(args)?))),
        ),
        (
            TypeHint::Tuple(TupleHint::Unparameterized),
            Function::new("tuple", Signature::new(), |args| Ok(Object::Tuple(elements(args)?))),
        ),
        (
            TypeHint::Set(None),
            Function::new("set", Signature::new(), |args| Ok(Object::set(elements(args)?))),
        ),
        (
            TypeHint::Set(None),
            Function::new("frozenset", Signature::new(), |args| Ok(Object::set(elements(args)?))),
        ),
        (TypeHint::Mapping(None), Function::new("dict", Signature::new(), build_dict)),
        (
            TypeHint::list(TypeHint::Int),
            Function::new("range", Signature::new(), build_range),
        ),
    ]
    .into_iter()
    .map(|(returns, function)| {
        let function = function.returns(returns);
        (function.name().to_string(), function)
    })
    .collect()
});

/// The constructors every default scope starts with.
pub(crate) fn all() -> impl Iterator<Item = (&'static str, &'static Function)> {
    BUILTINS.iter().map(|(name, function)| (name.as_str(), function))
}

/// The builtin constructor for a primitive or container annotation.
pub(crate) fn for_hint(hint: &TypeHint) -> Option<&'static Function> {
    let name = match hint {
        TypeHint::Bool => "bool",
        TypeHint::Int => "int",
        TypeHint::Float => "float",
        TypeHint::Complex => "complex",
        TypeHint::Str => "str",
        TypeHint::List(_) => "list",
        TypeHint::Tuple(_) => "tuple",
        TypeHint::Set(_) => "set",
        TypeHint::Mapping(_) => "dict",
        _ => return None,
    };
    BUILTINS.get(name)
}

fn truthy(object: &Object) -> bool {
    match object {
        Object::None => false,
        Object::Bool(b) => *b,
        Object::Int(i) => *i != 0,
        Object::Float(x) => *x != 0.0,
        Object::Complex { re, im } => *re != 0.0 || *im != 0.0,
        Object::Str(s) => !s.is_empty(),
        Object::List(items) | Object::Set(items) | Object::Tuple(items) => !items.is_empty(),
        Object::Map(map) => !map.is_empty(),
        _ => true,
    }
}

fn build_int(args: &mut Arguments) -> Result<Object, BoxError> {
    let value = match args.next_positional::<Object>()? {
        None => 0,
        Some(Object::Int(i)) => i,
        Some(Object::Bool(b)) => i64::from(b),
        Some(Object::Float(x)) => {
            // 2^63, the first float past i64::MAX
            const LIMIT: f64 = 9_223_372_036_854_775_808.0;
            let truncated = x.trunc();
            if !(-LIMIT..LIMIT).contains(&truncated) {
                return Err(format!("cannot convert float {x} to integer").into());
            }
            truncated as i64
        }
        Some(Object::Str(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| format!("invalid literal for int(): {s:?} ({e})"))?,
        Some(other) => return Err(format!("int() argument must be a string or a number, not {}", other.type_hint()).into()),
    };
    Ok(Object::Int(value))
}

fn build_float(args: &mut Arguments) -> Result<Object, BoxError> {
    let value = match args.next_positional::<Object>()? {
        None => 0.0,
        Some(Object::Float(x)) => x,
        Some(Object::Int(i)) => i as f64,
        Some(Object::Bool(b)) => f64::from(u8::from(b)),
        Some(Object::Str(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("could not convert string to float: {s:?} ({e})"))?,
        Some(other) => return Err(format!("float() argument must be a string or a number, not {}", other.type_hint()).into()),
    };
    Ok(Object::Float(value))
}

fn elements(args: &mut Arguments) -> Result<Vec<Object>, BoxError> {
    Ok(match args.next_positional::<Object>()? {
        None => Vec::new(),
        Some(Object::List(items) | Object::Set(items) | Object::Tuple(items)) => items,
        Some(Object::Str(s)) => s.chars().map(|c| Object::Str(c.to_string())).collect(),
        Some(Object::Map(map)) => map.into_keys().map(Object::Str).collect(),
        Some(other) => return Err(format!("{} object is not iterable", other.type_hint()).into()),
    })
}

fn build_dict(args: &mut Arguments) -> Result<Object, BoxError> {
    let mut map = match args.next_positional::<Object>()? {
        None => IndexMap::new(),
        Some(Object::Map(map)) => map,
        Some(Object::List(pairs) | Object::Tuple(pairs)) => {
            let mut map = IndexMap::with_capacity(pairs.len());
            for pair in pairs {
                let Some([key, value]) = pair.into_sequence().and_then(|p| <[Object; 2]>::try_from(p).ok())
                else {
                    return Err("dictionary update sequence element must be a key/value pair".into());
                };
                let Object::Str(key) = key else {
                    return Err(format!("dictionary keys must be str, not {}", key.type_hint()).into());
                };
                map.insert(key, value);
            }
            map
        }
        Some(other) => return Err(format!("cannot convert {} to a dictionary", other.type_hint()).into()),
    };
    map.extend(args.take_keywords());
    Ok(Object::Map(map))
}

fn build_range(args: &mut Arguments) -> Result<Object, BoxError> {
    let first = args.next_positional::<i64>()?;
    let second = args.next_positional::<i64>()?;
    let step = args.next_positional::<i64>()?.unwrap_or(1);
    let (start, stop) = match (first, second) {
        (Some(stop), None) => (0, stop),
        (Some(start), Some(stop)) => (start, stop),
        _ => return Err("range expected at least 1 argument, got 0".into()),
    };
    if step == 0 {
        return Err("range() arg 3 must not be zero".into());
    }
    let mut items = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        items.push(Object::Int(current));
        let Some(next) = current.checked_add(step) else {
            break;
        };
        current = next;
    }
    Ok(Object::List(items))
}
