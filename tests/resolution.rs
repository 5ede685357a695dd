#![allow(missing_docs)]

use std::sync::Arc;

use construe::{
    Builder, Class, ConfigurationErrorKind, Constructor, Function, ModuleTable, Namespace, Object,
    RegisterOptions, Registry, Scope, Signature, TypeHint, Value,
};

#[derive(Debug)]
struct Foo;

#[derive(Debug)]
struct Bar;

#[derive(Debug)]
struct Baz {
    foo: Object,
    extra: Object,
}

#[derive(Debug)]
struct Timestamp {
    text: String,
}

struct Fixture {
    baz: Class,
    registry: Arc<Registry>,
}

fn fixture() -> Fixture {
    let foo = Class::opaque::<Foo>("Foo").registrable().finish();
    let bar = Class::opaque::<Bar>("Bar")
        .base(TypeHint::class(&foo))
        .init(|_| Ok(Bar))
        .finish();
    let baz = Class::opaque::<Baz>("Baz")
        .param("foo", TypeHint::class(&foo))
        .param("extra", TypeHint::Any)
        .init(|args| {
            Ok(Baz {
                foo: args.take("foo")?,
                extra: args.take("extra")?,
            })
        })
        .finish();
    let timestamp = Class::opaque::<Timestamp>("Timestamp")
        .alternate(
            "fromisoformat",
            Signature::new().param("text", TypeHint::Str),
            |args| Ok(Timestamp { text: args.take("text")? }),
        )
        .finish();
    let double = Function::new(
        "double",
        Signature::new().param("x", TypeHint::Int),
        |args| Ok(Object::Int(args.take::<i64>("x")? * 2)),
    )
    .returns(TypeHint::Int);

    let modules = ModuleTable::new()
        .module("datetime", Namespace::new().with("datetime", timestamp))
        .module("mathlib", Namespace::new().with("double", double));
    let registry = Arc::new(Registry::new().with_loader(modules));
    registry
        .register(Scope::of(&foo), "bar", bar, RegisterOptions::new())
        .unwrap();

    Fixture { baz, registry }
}

fn config() -> Value {
    Value::map([
        ("foo", Value::map([("@type", "bar")])),
        (
            "extra",
            Value::map([
                ("@type", Value::from("datetime:datetime.fromisoformat")),
                ("*", Value::seq(["2023-01-01T00:00:00"])),
            ]),
        ),
    ])
}

#[test]
fn strict_mode_leaves_unannotated_configs_raw() {
    let fixture = fixture();
    let builder = Builder::new()
        .with_registry(fixture.registry)
        .with_strict(true);

    let built = builder.build(config(), &TypeHint::Any).unwrap();
    let foo = built.as_map().unwrap()["foo"].as_map().unwrap();
    assert_eq!(foo["@type"], Object::from("bar"));
}

#[test]
fn strict_mode_still_builds_annotated_fields() {
    let fixture = fixture();
    let builder = Builder::new()
        .with_registry(fixture.registry)
        .with_strict(true);

    let built = builder.build(config(), &TypeHint::class(&fixture.baz)).unwrap();
    let baz = built.downcast_ref::<Baz>().unwrap();
    assert!(baz.foo.as_instance().unwrap().is::<Bar>());
    let extra = baz.extra.as_map().unwrap();
    assert_eq!(extra["@type"], Object::from("datetime:datetime.fromisoformat"));
}

#[test]
fn lenient_mode_imports_unregistered_paths() {
    let fixture = fixture();
    let builder = Builder::new().with_registry(fixture.registry);

    let built = builder.build(config(), &TypeHint::class(&fixture.baz)).unwrap();
    let baz = built.downcast_ref::<Baz>().unwrap();
    let extra = baz.extra.downcast_ref::<Timestamp>().unwrap();
    assert_eq!(extra.text, "2023-01-01T00:00:00");
}

#[test]
fn strict_mode_never_imports() {
    let fixture = fixture();
    let builder = Builder::new()
        .with_registry(fixture.registry)
        .with_strict(true);

    let config = Value::map([("@type", "mathlib.double"), ("x", "2")]);
    let err = builder.build(config, &TypeHint::Int).unwrap_err();
    assert!(matches!(err.kind(), ConfigurationErrorKind::TypeNotFound { .. }));
}

#[test]
fn imported_functions_are_checked_by_return_type() {
    let fixture = fixture();
    let builder = Builder::new().with_registry(fixture.registry);

    let config = Value::map([("@type", Value::from("mathlib.double")), ("x", Value::from(21))]);
    assert_eq!(builder.build(config.clone(), &TypeHint::Int).unwrap(), Object::Int(42));

    let err = builder.build(config, &TypeHint::Str).unwrap_err();
    assert!(matches!(err.kind(), ConfigurationErrorKind::TypeMismatch { .. }));
}

#[test]
fn unknown_modules_are_reported_at_the_node() {
    let fixture = fixture();
    let builder = Builder::new().with_registry(fixture.registry);

    let config = Value::map([("items", Value::seq([Value::map([("@type", "nowhere:Thing")])]))]);
    let err = builder.build(config, &TypeHint::Any).unwrap_err();
    assert_eq!(err.path().to_string(), "items.0");
    let ConfigurationErrorKind::ModuleNotFound { module, .. } = err.kind() else {
        panic!("expected a missing module, got {err}");
    };
    assert_eq!(module, "nowhere");
}

#[test]
fn registrations_can_select_an_alternate_constructor() {
    let fixture = fixture();
    let timestamp = Class::opaque::<Timestamp>("Timestamp")
        .alternate(
            "parse",
            Signature::new().param("text", TypeHint::Str),
            |args| Ok(Timestamp { text: args.take("text")? }),
        )
        .finish();

    fixture
        .registry
        .register(
            Scope::Default,
            "timestamp",
            &timestamp,
            RegisterOptions::new().alternate("parse"),
        )
        .unwrap();
    assert_eq!(
        fixture.registry.by_name(&Scope::Default, "timestamp", false).unwrap(),
        Constructor::Alternate(timestamp.clone(), "parse".to_string())
    );

    let builder = Builder::new().with_registry(Arc::clone(&fixture.registry));
    let config = Value::map([("@type", "timestamp"), ("text", "noon")]);
    let built = builder.build(config, &TypeHint::class(&timestamp)).unwrap();
    assert_eq!(built.downcast_ref::<Timestamp>().unwrap().text, "noon");

    let err = fixture
        .registry
        .register(Scope::Default, "timestamp", &timestamp, RegisterOptions::new())
        .unwrap_err();
    assert!(matches!(err.kind(), ConfigurationErrorKind::NameConflict { .. }));
    assert!(fixture.registry.names(&Scope::Default).contains(&"timestamp".to_string()));
}

#[test]
fn global_registrations_are_visible_to_default_builders() {
    struct Greeting(String);

    let greeting = Class::opaque::<Greeting>("Greeting")
        .param("text", TypeHint::Str)
        .init(|args| Ok(Greeting(args.take("text")?)))
        .finish();
    construe::register(Scope::Default, "resolution.greeting", &greeting).unwrap();

    let config = Value::map([("@type", "resolution.greeting"), ("text", "hi")]);
    let built = construe::build(config, &TypeHint::Any).unwrap();
    assert_eq!(built.downcast_ref::<Greeting>().unwrap().0, "hi");
}
