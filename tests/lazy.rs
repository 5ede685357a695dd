#![allow(missing_docs)]

use std::{
    rc::Rc,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use construe::{
    Builder, Class, ConfigurationErrorKind, Constructor, Lazy, Object, RegisterOptions, Registry,
    Scope, TypeHint, Value,
};
use facet::Facet;

#[derive(Facet, Debug)]
struct Foo {
    x: String,
    y: i64,
}

#[derive(Debug)]
struct Bar {
    foo: Lazy,
}

#[derive(Facet, Debug)]
struct Shouty {
    x: String,
}

struct Fixture {
    builds: Arc<AtomicUsize>,
    foo: Class,
    shouty: Class,
    bar: Class,
    builder: Builder,
}

fn fixture() -> Fixture {
    let builds = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&builds);
    let foo = Class::new::<Foo>("Foo")
        .registrable()
        .init(move |args| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Foo {
                x: args.take("x")?,
                y: args.take("y")?,
            })
        })
        .finish();

    let shouty = Class::new::<Shouty>("Shouty")
        .base(TypeHint::class(&foo))
        .init(|args| {
            let x: String = args.take("x")?;
            Ok(Shouty {
                x: x.to_uppercase(),
            })
        })
        .finish();

    let bar = Class::opaque::<Bar>("Bar")
        .param("foo", TypeHint::lazy(TypeHint::class(&foo)))
        .init(|args| Ok(Bar { foo: args.take("foo")? }))
        .finish();

    let registry = Arc::new(Registry::new());
    registry
        .register(Scope::of(&foo), "shouty", &shouty, RegisterOptions::new())
        .unwrap();

    Fixture {
        builds,
        foo,
        shouty,
        bar,
        builder: Builder::new().with_registry(registry),
    }
}

fn lazy_foo(fixture: &Fixture, config: Value) -> Lazy {
    let built = fixture
        .builder
        .build(Value::map([("foo", config)]), &TypeHint::class(&fixture.bar))
        .unwrap();
    built.downcast_ref::<Bar>().unwrap().foo.clone()
}

#[test]
fn lazy_fields_are_not_constructed() {
    let fixture = fixture();
    let lazy = lazy_foo(&fixture, Value::map([("x", "hello")]));

    assert_eq!(fixture.builds.load(Ordering::SeqCst), 0);
    assert_eq!(lazy.config(), &Value::map([("x", "hello")]));
    assert_eq!(lazy.path().to_string(), "foo");
    assert_eq!(lazy.type_hint(), &TypeHint::class(&fixture.foo));
}

#[test]
fn construct_with_overrides_leaves_the_handle_alone() {
    let fixture = fixture();
    let lazy = lazy_foo(&fixture, Value::map([("x", "hello")]));

    let foo = lazy.construct_with([("y", 10)]).unwrap();
    let foo = foo.downcast_ref::<Foo>().unwrap();
    assert_eq!(foo.x, "hello");
    assert_eq!(foo.y, 10);
    assert_eq!(fixture.builds.load(Ordering::SeqCst), 1);

    assert_eq!(lazy.config(), &Value::map([("x", "hello")]));
    let err = lazy.construct().unwrap_err();
    assert!(err.to_string().contains("missing required argument 'y'"));
    assert_eq!(err.path().to_string(), "foo");
}

#[test]
fn update_revalidates_before_applying() {
    let fixture = fixture();
    let mut lazy = lazy_foo(&fixture, Value::map([("x", "hello")]));

    lazy.update([("y", 3)]).unwrap();
    let foo: Rc<Foo> = lazy.construct_as().unwrap();
    assert_eq!((foo.x.as_str(), foo.y), ("hello", 3));

    let err = lazy.update([("x", 5)]).unwrap_err();
    assert!(matches!(err.kind(), ConfigurationErrorKind::TypeMismatch { .. }));
    assert_eq!(err.path().to_string(), "foo.x");
    assert_eq!(lazy.config().get("x"), Some(&Value::from("hello")));

    let err = lazy.update([("missing.deeper", 1)]).unwrap_err();
    assert!(matches!(
        err.kind(),
        ConfigurationErrorKind::InvalidFieldPath { .. }
    ));
}

#[test]
fn invalid_lazy_config_fails_the_enclosing_build() {
    let fixture = fixture();
    let err = fixture
        .builder
        .build(
            Value::map([("foo", Value::map([("x", 5)]))]),
            &TypeHint::class(&fixture.bar),
        )
        .unwrap_err();
    assert_eq!(err.path().to_string(), "foo.x");
    assert_eq!(fixture.builds.load(Ordering::SeqCst), 0);
}

#[test]
fn constructor_reports_the_selected_class() {
    let fixture = fixture();

    let lazy = lazy_foo(&fixture, Value::map([("x", "hello")]));
    assert_eq!(
        lazy.constructor().unwrap(),
        Some(Constructor::Class(fixture.foo.clone()))
    );

    let lazy = lazy_foo(
        &fixture,
        Value::map([("@type", "shouty"), ("x", "quiet")]),
    );
    assert_eq!(
        lazy.constructor().unwrap(),
        Some(Constructor::Class(fixture.shouty.clone()))
    );
    let shouty = lazy.construct().unwrap();
    assert_eq!(shouty.downcast_ref::<Shouty>().unwrap().x, "QUIET");
}

#[test]
fn updates_reach_into_sequences() {
    let fixture = fixture();
    let built = fixture
        .builder
        .build(
            Value::map([("items", Value::seq([1, 2]))]),
            &TypeHint::lazy(TypeHint::mapping(
                TypeHint::Str,
                TypeHint::list(TypeHint::Int),
            )),
        )
        .unwrap();
    let Object::Lazy(mut lazy) = built else {
        panic!("expected a lazy handle");
    };

    lazy.update([("items.+", 3), ("items.0", 0)]).unwrap();
    assert_eq!(
        lazy.construct().unwrap().as_map().unwrap()["items"],
        Object::List(vec![Object::Int(0), Object::Int(2), Object::Int(3)])
    );

    let err = lazy.update([("items.+", "four")]).unwrap_err();
    assert_eq!(err.path().to_string(), "items.3");
    assert_eq!(lazy.config().get("items").and_then(Value::len), Some(3));
}

#[test]
fn null_lazy_configs_build_nothing() {
    struct MaybeBar {
        foo: Option<Lazy>,
    }

    let fixture = fixture();
    let hint = TypeHint::lazy(TypeHint::class(&fixture.foo));
    assert_eq!(fixture.builder.build(Value::Null, &hint).unwrap(), Object::None);
    assert_eq!(fixture.builder.validate(Value::Null, &hint).unwrap(), Object::None);

    let maybe_bar = Class::opaque::<MaybeBar>("MaybeBar")
        .param("foo", TypeHint::optional(hint))
        .init(|args| Ok(MaybeBar { foo: args.take_opt("foo")? }))
        .finish();
    let built = fixture
        .builder
        .build(Value::map([("foo", Value::Null)]), &TypeHint::class(&maybe_bar))
        .unwrap();
    assert!(built.downcast_ref::<MaybeBar>().unwrap().foo.is_none());

    let err = fixture
        .builder
        .build(Value::map([("foo", Value::Null)]), &TypeHint::class(&fixture.bar))
        .unwrap_err();
    assert!(err.to_string().contains("invalid argument 'foo'"));
    assert_eq!(fixture.builds.load(Ordering::SeqCst), 0);
}

#[test]
fn empty_lazy_configs_defer_to_the_initializer() {
    let fixture = fixture();
    let lazy = lazy_foo(&fixture, Value::Map(Default::default()));
    assert_eq!(lazy.config(), &Value::Map(Default::default()));

    let err = lazy.construct().unwrap_err();
    assert!(err.to_string().contains("missing required argument 'x'"));

    let foo = lazy.construct_with([("x", Value::from("a")), ("y", Value::from(1))]).unwrap();
    assert_eq!(foo.downcast_ref::<Foo>().unwrap().x, "a");
}
