use std::collections::HashMap;

use crate::{Class, Constructor, Object, TupleHint, TypeHint, TypeVar};

/// Bindings from type variables to concrete hints, built per constructor resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeVarMap(HashMap<TypeVar, TypeHint>);

impl TypeVarMap {
    /// Bindings carried by an annotation: each class parameter mapped to its
    /// argument, including the arguments its bases were declared with.
    pub fn of(hint: &TypeHint) -> Self {
        let mut map = Self::default();
        match hint {
            TypeHint::Union(alternatives) => {
                for alternative in alternatives {
                    map.0.extend(Self::of(alternative).0);
                }
            }
            TypeHint::Class(class, args) => {
                let mut own = Self::default();
                for (param, arg) in class.type_params().iter().zip(args) {
                    own.insert(param.clone(), arg.clone());
                }
                for base in class.bases() {
                    let base = own.substitute(base);
                    map.0.extend(Self::of(&base).0);
                }
                map.0.extend(own.0);
            }
            _ => {}
        }
        map
    }

    /// Bindings a constructor's parameters see when it is built for `hint`.
    ///
    /// Only concrete bindings are kept. When the constructor produces a
    /// subclass of the annotated class, the subclass's own parameters are
    /// solved through its inheritance chain.
    pub fn seed(constructor: &Constructor, hint: &TypeHint) -> Self {
        let mut map = Self::default();
        for (var, bound) in Self::of(hint).0 {
            if !matches!(bound, TypeHint::TypeVar(_)) {
                map.insert(var, bound);
            }
        }
        if let (Some(class), TypeHint::Class(target, args)) = (constructor.class(), hint) {
            if class != target && !args.is_empty() {
                if let Some(base) = find_base(class, target) {
                    map.unify(&base, hint);
                }
            }
        }
        map
    }

    /// Binds `var` to `hint`, replacing any earlier binding.
    pub fn insert(&mut self, var: TypeVar, hint: TypeHint) {
        self.0.insert(var, hint);
    }

    /// The binding for `var`.
    pub fn get(&self, var: &TypeVar) -> Option<&TypeHint> {
        self.0.get(var)
    }

    /// True when nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replaces every bound type variable inside `hint`.
    pub fn substitute(&self, hint: &TypeHint) -> TypeHint {
        if self.is_empty() {
            return hint.clone();
        }
        let boxed = |inner: &TypeHint| Box::new(self.substitute(inner));
        match hint {
            TypeHint::TypeVar(var) => self.0.get(var).cloned().unwrap_or_else(|| hint.clone()),
            TypeHint::List(Some(elem)) => TypeHint::List(Some(boxed(elem))),
            TypeHint::Set(Some(elem)) => TypeHint::Set(Some(boxed(elem))),
            TypeHint::Lazy(Some(inner)) => TypeHint::Lazy(Some(boxed(inner))),
            TypeHint::Tuple(TupleHint::Variadic(elem)) => TypeHint::Tuple(TupleHint::Variadic(boxed(elem))),
            TypeHint::Tuple(TupleHint::Fixed(elems)) => {
                TypeHint::Tuple(TupleHint::Fixed(elems.iter().map(|e| self.substitute(e)).collect()))
            }
            TypeHint::Mapping(Some(kv)) => {
                TypeHint::Mapping(Some(Box::new((self.substitute(&kv.0), self.substitute(&kv.1)))))
            }
            TypeHint::Union(alternatives) => {
                TypeHint::Union(alternatives.iter().map(|alt| self.substitute(alt)).collect())
            }
            TypeHint::Class(class, args) => {
                TypeHint::Class(class.clone(), args.iter().map(|arg| self.substitute(arg)).collect())
            }
            hint => hint.clone(),
        }
    }

    /// Matches `pattern` against `concrete`, binding the variables of `pattern`.
    ///
    /// `Any` and unresolved variables on the concrete side bind nothing.
    pub fn unify(&mut self, pattern: &TypeHint, concrete: &TypeHint) {
        match (pattern, concrete) {
            (_, TypeHint::Any | TypeHint::TypeVar(_)) => {}
            (TypeHint::TypeVar(var), concrete) => self.insert(var.clone(), concrete.clone()),
            (TypeHint::List(Some(a)), TypeHint::List(Some(b)))
            | (TypeHint::Set(Some(a)), TypeHint::Set(Some(b)))
            | (TypeHint::Lazy(Some(a)), TypeHint::Lazy(Some(b)))
            | (TypeHint::Tuple(TupleHint::Variadic(a)), TypeHint::Tuple(TupleHint::Variadic(b))) => {
                self.unify(a, b)
            }
            (TypeHint::Tuple(TupleHint::Fixed(a)), TypeHint::Tuple(TupleHint::Fixed(b)))
            | (TypeHint::Union(a), TypeHint::Union(b))
                if a.len() == b.len() =>
            {
                for (a, b) in a.iter().zip(b) {
                    self.unify(a, b);
                }
            }
            (TypeHint::Mapping(Some(a)), TypeHint::Mapping(Some(b))) => {
                self.unify(&a.0, &b.0);
                self.unify(&a.1, &b.1);
            }
            (TypeHint::Class(a, a_args), TypeHint::Class(b, b_args)) if a == b => {
                for (a, b) in a_args.iter().zip(b_args) {
                    self.unify(a, b);
                }
            }
            _ => {}
        }
    }

    /// Learns bindings from a value already built for `annotation`.
    ///
    /// An instance whose class derives from the annotated class reveals the
    /// arguments it was declared with, e.g. an instance of `Bar(Foo[int])`
    /// built for `Foo[T]` binds `T` to `int`.
    pub fn bind_from_object(&mut self, annotation: &TypeHint, object: &Object) {
        if let Object::Instance(instance) = object {
            self.bind_from_class(annotation, instance.class());
        }
    }

    /// Learns bindings from the class a node was resolved to for `annotation`.
    ///
    /// Same as [`bind_from_object`](Self::bind_from_object), for nodes that
    /// were resolved but never constructed.
    pub fn bind_from_class(&mut self, annotation: &TypeHint, class: &Class) {
        match annotation {
            TypeHint::Union(alternatives) => {
                for alternative in alternatives {
                    self.bind_from_class(alternative, class);
                }
            }
            TypeHint::Class(target, args) if !args.is_empty() => {
                if let Some(TypeHint::Class(_, base_args)) = find_base(class, target) {
                    for (pattern, concrete) in args.iter().zip(&base_args) {
                        self.unify(pattern, concrete);
                    }
                }
            }
            _ => {}
        }
    }
}

/// How `class` extends `target`, written in terms of `class`'s own parameters.
///
/// For `Sub[U](Base[list[U]])`, `find_base(Sub, Base)` is `Base[list[U]]`.
pub fn find_base(class: &Class, target: &Class) -> Option<TypeHint> {
    if class == target {
        let params = class.type_params().iter().map(TypeHint::var);
        return Some(TypeHint::generic(class, params));
    }
    for base in class.bases() {
        let TypeHint::Class(base_class, base_args) = base else {
            continue;
        };
        if !base_class.is_subclass_of(target) {
            continue;
        }
        let found = find_base(base_class, target)?;
        let mut map = TypeVarMap::default();
        for (i, param) in base_class.type_params().iter().enumerate() {
            map.insert(param.clone(), base_args.get(i).cloned().unwrap_or(TypeHint::Any));
        }
        return Some(map.substitute(&found));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Base;
    struct Middle;
    struct Leaf;

    #[test]
    fn of_collects_base_arguments() {
        let t = TypeVar::new("T");
        let u = TypeVar::new("U");
        let base = Class::opaque::<Base>("Base").type_param(t.clone()).finish();
        let middle = Class::opaque::<Middle>("Middle")
            .type_param(u.clone())
            .base(TypeHint::generic(&base, [TypeHint::list(TypeHint::var(&u))]))
            .finish();

        let map = TypeVarMap::of(&TypeHint::generic(&middle, [TypeHint::Int]));
        assert_eq!(map.get(&u), Some(&TypeHint::Int));
        assert_eq!(map.get(&t), Some(&TypeHint::list(TypeHint::Int)));
    }

    #[test]
    fn find_base_substitutes_through_the_chain() {
        let t = TypeVar::new("T");
        let u = TypeVar::new("U");
        let base = Class::opaque::<Base>("Base").type_param(t.clone()).finish();
        let middle = Class::opaque::<Middle>("Middle")
            .type_param(u.clone())
            .base(TypeHint::generic(&base, [TypeHint::list(TypeHint::var(&u))]))
            .finish();
        let leaf = Class::opaque::<Leaf>("Leaf")
            .base(TypeHint::generic(&middle, [TypeHint::Str]))
            .finish();

        assert_eq!(
            find_base(&leaf, &base),
            Some(TypeHint::generic(&base, [TypeHint::list(TypeHint::Str)]))
        );
        assert_eq!(
            find_base(&middle, &base),
            Some(TypeHint::generic(&base, [TypeHint::list(TypeHint::var(&u))]))
        );
        assert_eq!(find_base(&base, &leaf), None);
    }

    #[test]
    fn seed_solves_subclass_parameters() {
        let t = TypeVar::new("T");
        let u = TypeVar::new("U");
        let base = Class::opaque::<Base>("Base").type_param(t.clone()).finish();
        let middle = Class::opaque::<Middle>("Middle")
            .type_param(u.clone())
            .base(TypeHint::generic(&base, [TypeHint::var(&u)]))
            .finish();

        let map = TypeVarMap::seed(
            &Constructor::Class(middle),
            &TypeHint::generic(&base, [TypeHint::Float]),
        );
        assert_eq!(map.get(&u), Some(&TypeHint::Float));
        assert_eq!(
            map.substitute(&TypeHint::optional(TypeHint::var(&u))),
            TypeHint::optional(TypeHint::Float)
        );
    }

    #[test]
    fn unify_skips_unresolved_concretes() {
        let t = TypeVar::new("T");
        let mut map = TypeVarMap::default();
        map.unify(&TypeHint::list(TypeHint::var(&t)), &TypeHint::list(TypeHint::Any));
        assert!(map.is_empty());
        map.unify(
            &TypeHint::mapping(TypeHint::Str, TypeHint::var(&t)),
            &TypeHint::mapping(TypeHint::Str, TypeHint::Int),
        );
        assert_eq!(map.get(&t), Some(&TypeHint::Int));
    }
}
