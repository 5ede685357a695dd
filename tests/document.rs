#![allow(missing_docs)]

use std::sync::Arc;

use construe::{
    Builder, Class, DocumentErrorKind, Loader, Object, RegisterOptions, Registry, Scope, TypeHint,
    Value,
};
use facet::Facet;
use indoc::indoc;

#[test]
fn canon_example() {
    let kdl = indoc! {r#"
        package {
            name "my-pkg"
            version "1.2.3"
            dependencies {
                - "miette"
                - "nom"
            }
        }
    "#};

    let document = construe::from_str(kdl).unwrap();
    assert_eq!(
        document,
        Value::map([(
            "package",
            Value::map([
                ("name", Value::from("my-pkg")),
                ("version", Value::from("1.2.3")),
                ("dependencies", Value::seq(["miette", "nom"])),
            ]),
        )])
    );
}

#[test]
fn type_annotations_and_arguments_become_reserved_keys() {
    let kdl = indoc! {r#"
        (Linear)model 16 32 bias=#true {
            activation "relu"
        }
    "#};

    let document = construe::from_str(kdl).unwrap();
    assert_eq!(
        document.get("model"),
        Some(&Value::map([
            ("@type", Value::from("Linear")),
            ("*", Value::seq([16, 32])),
            ("bias", Value::from(true)),
            ("activation", Value::from("relu")),
        ]))
    );
}

#[test]
fn sequence_items_may_be_typed() {
    let kdl = indoc! {r#"
        layers {
            - size=16
            (dropout)- rate=0.5
            - 3
        }
    "#};

    let document = construe::from_str(kdl).unwrap();
    assert_eq!(
        document.get("layers"),
        Some(&Value::seq([
            Value::map([("size", 16)]),
            Value::map([("@type", Value::from("dropout")), ("rate", Value::Float(0.5))]),
            Value::from(3),
        ]))
    );
}

#[test]
fn custom_keys() {
    let kdl = indoc! {r#"
        (Linear)model 16
    "#};

    let document = Loader::new()
        .with_type_key("type")
        .with_args_key("args")
        .load(kdl)
        .unwrap();
    assert_eq!(
        document.get("model"),
        Some(&Value::map([
            ("type", Value::from("Linear")),
            ("args", Value::seq([16])),
        ]))
    );
}

#[test]
fn duplicate_keys_are_rejected() {
    let kdl = indoc! {r#"
        model {
            size 1
            size 2
        }
    "#};

    let err = construe::from_str(kdl).unwrap_err();
    assert!(matches!(err.kind(), DocumentErrorKind::DuplicateKey(key) if key == "size"));

    let err = construe::from_str("a 1\na 2").unwrap_err();
    assert!(matches!(err.kind(), DocumentErrorKind::DuplicateKey(key) if key == "a"));
}

#[test]
fn sequence_items_cannot_mix_with_fields() {
    let kdl = indoc! {r#"
        layers {
            - 1
            extra 2
        }
    "#};

    let err = construe::from_str(kdl).unwrap_err();
    assert!(matches!(
        err.kind(),
        DocumentErrorKind::SequenceItemInMapping(node) if node == "layers"
    ));
    assert!(err.to_string().contains("layers"));
}

#[test]
fn parse_errors_keep_their_source() {
    let err = construe::from_str("model {").unwrap_err();
    assert!(matches!(err.kind(), DocumentErrorKind::Parse(_)));
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn loaded_documents_build() {
    #[derive(Facet, Debug)]
    struct Layer {
        size: i64,
    }

    #[derive(Debug)]
    struct Model {
        name: String,
        layers: Vec<Object>,
    }

    let layer = Class::new::<Layer>("Layer").registrable().finish();
    let model = Class::opaque::<Model>("Model")
        .param("name", TypeHint::Str)
        .param("layers", TypeHint::list(TypeHint::class(&layer)))
        .init(|args| {
            Ok(Model {
                name: args.take("name")?,
                layers: args.take("layers")?,
            })
        })
        .finish();

    let registry = Arc::new(Registry::new());
    registry
        .register(Scope::of(&layer), "dense", &layer, RegisterOptions::new())
        .unwrap();

    let kdl = indoc! {r#"
        model {
            name "tiny"
            layers {
                (dense)- 8
                - size=4
            }
        }
    "#};
    let document = construe::from_str(kdl).unwrap();

    let built = Builder::new()
        .with_registry(registry)
        .build(document.get("model").cloned(), &TypeHint::class(&model))
        .unwrap();
    let model = built.downcast_ref::<Model>().unwrap();
    assert_eq!(model.name, "tiny");
    let sizes: Vec<i64> = model
        .layers
        .iter()
        .map(|layer| layer.downcast_ref::<Layer>().unwrap().size)
        .collect();
    assert_eq!(sizes, [8, 4]);
}
