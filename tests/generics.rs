#![allow(missing_docs)]

use std::sync::Arc;

use construe::{
    Builder, Class, ConfigurationErrorKind, Object, RegisterOptions, Registry, Scope, TypeHint,
    TypeVar, Value,
};

struct Foo;
struct Bar;
struct Container {
    foo: Object,
    value: Object,
}
struct Holder {
    item: Object,
}

struct Fixture {
    t: TypeVar,
    foo: Class,
    container: Class,
    builder: Builder,
}

fn fixture() -> Fixture {
    let t = TypeVar::new("T");
    let foo = Class::opaque::<Foo>("Foo")
        .type_param(t.clone())
        .registrable()
        .finish();
    let bar = Class::opaque::<Bar>("Bar")
        .base(TypeHint::generic(&foo, [TypeHint::Int]))
        .init(|_| Ok(Bar))
        .finish();
    let container = Class::opaque::<Container>("Container")
        .type_param(t.clone())
        .param("foo", TypeHint::generic(&foo, [TypeHint::var(&t)]))
        .param("value", TypeHint::optional(TypeHint::var(&t)))
        .init(|args| {
            Ok(Container {
                foo: args.take("foo")?,
                value: args.take_or("value", Object::None)?,
            })
        })
        .finish();

    let registry = Arc::new(Registry::new());
    registry
        .register(Scope::of(&foo), "bar", bar, RegisterOptions::new())
        .unwrap();

    Fixture {
        t,
        foo,
        container,
        builder: Builder::new().with_registry(registry),
    }
}

#[test]
fn generic_registrable_can_be_built() {
    let fixture = fixture();
    let config = Value::map([("foo", Value::map([("@type", "bar")]))]);
    let built = fixture
        .builder
        .build(config, &TypeHint::class(&fixture.container))
        .unwrap();

    let container = built.downcast_ref::<Container>().unwrap();
    assert!(container.foo.as_instance().unwrap().is::<Bar>());
    assert!(container.value.is_none());
}

#[test]
fn built_siblings_bind_type_variables() {
    let fixture = fixture();
    let hint = TypeHint::class(&fixture.container);

    let config = Value::map([("foo", Value::map([("@type", "bar")])), ("value", Value::from(3))]);
    let built = fixture.builder.build(config, &hint).unwrap();
    assert_eq!(built.downcast_ref::<Container>().unwrap().value, Object::Int(3));

    // `foo` is a `Foo[int]`, so `value` must be an int as well.
    let config = Value::map([
        ("foo", Value::map([("@type", "bar")])),
        ("value", Value::from("three")),
    ]);
    let err = fixture.builder.build(config, &hint).unwrap_err();
    assert_eq!(err.path().to_string(), "value");
    let ConfigurationErrorKind::TypeMismatch { expected, .. } = err.kind() else {
        panic!("expected a type mismatch, got {err}");
    };
    assert_eq!(expected, &TypeHint::Int);
}

#[test]
fn validation_binds_type_variables_like_build() {
    let fixture = fixture();
    let hint = TypeHint::class(&fixture.container);

    let config = Value::map([("foo", Value::map([("@type", "bar")])), ("value", Value::from(3))]);
    fixture.builder.validate(config, &hint).unwrap();

    let config = Value::map([
        ("foo", Value::map([("@type", "bar")])),
        ("value", Value::from("three")),
    ]);
    let validation = fixture.builder.validate(config.clone(), &hint).unwrap_err();
    let build = fixture.builder.build(config, &hint).unwrap_err();
    assert_eq!(validation.path().to_string(), "value");
    assert_eq!(validation.to_string(), build.to_string());
    let ConfigurationErrorKind::TypeMismatch { expected, .. } = validation.kind() else {
        panic!("expected a type mismatch, got {validation}");
    };
    assert_eq!(expected, &TypeHint::Int);
}

#[test]
fn unbound_type_variables_accept_any_value() {
    let fixture = fixture();
    let config = Value::map([("value", "three")]);
    let built = fixture
        .builder
        .build(config, &TypeHint::class(&fixture.container));
    // `foo` is missing, which only the initializer notices.
    let err = built.unwrap_err();
    assert!(err.to_string().contains("missing required argument 'foo'"));
}

#[test]
fn annotation_arguments_bind_type_variables() {
    let fixture = fixture();
    let hint = TypeHint::generic(&fixture.container, [TypeHint::Str]);

    let config = Value::map([("foo", Value::map([("@type", "bar")])), ("value", Value::from(3))]);
    let err = fixture.builder.build(config, &hint).unwrap_err();
    assert_eq!(err.path().to_string(), "value");

    let config = Value::map([("value", "three")]);
    let err = fixture.builder.build(config, &hint).unwrap_err();
    assert!(matches!(err.kind(), ConfigurationErrorKind::Construction { .. }));
}

#[test]
fn mapping_configs_against_a_bounded_variable_use_the_bound() {
    let fixture = fixture();
    let item = TypeVar::bounded("I", TypeHint::class(&fixture.foo));
    let holder = Class::opaque::<Holder>("Holder")
        .type_param(item.clone())
        .param("item", TypeHint::var(&item))
        .init(|args| Ok(Holder { item: args.take("item")? }))
        .finish();
    let hint = TypeHint::class(&holder);

    let config = Value::map([("item", Value::map([("@type", "bar")]))]);
    let built = fixture.builder.build(config, &hint).unwrap();
    let holder = built.downcast_ref::<Holder>().unwrap();
    assert!(holder.item.as_instance().unwrap().is::<Bar>());

    let err = fixture
        .builder
        .build(Value::map([("item", 1)]), &hint)
        .unwrap_err();
    assert_eq!(err.path().to_string(), "item");
    assert!(matches!(err.kind(), ConfigurationErrorKind::TypeMismatch { .. }));
}

#[test]
fn subtype_checks_follow_generic_bases() {
    let fixture = fixture();
    let bar_hint = match fixture
        .builder
        .registry()
        .by_name(&Scope::of(&fixture.foo), "bar", false)
        .unwrap()
        .class()
    {
        Some(class) => class.hint(),
        None => panic!("bar should be a class"),
    };

    assert!(bar_hint.is_subtype_of(&TypeHint::generic(&fixture.foo, [TypeHint::Int])));
    assert!(!bar_hint.is_subtype_of(&TypeHint::generic(&fixture.foo, [TypeHint::Str])));
    assert!(bar_hint.is_subtype_of(&TypeHint::generic(&fixture.foo, [TypeHint::var(&fixture.t)])));
}
