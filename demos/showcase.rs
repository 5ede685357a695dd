//! Showcase of building object graphs from KDL configs
//!
//! A small training setup is described by a KDL document, validated, built,
//! and its lazily configured optimizer constructed later with an override.
//! The last scenario prints the error a broken config produces.
//!
//! Run with: cargo run --example showcase
//! Set `RUST_LOG=debug` to see name resolution.

use std::{rc::Rc, sync::Arc};

use construe::{
    Builder, Class, Lazy, Object, RegisterOptions, Registry, Scope, TypeHint, Value,
};
use facet::Facet;

#[derive(Facet, Debug)]
struct Dense {
    size: i64,
}

#[derive(Facet, Debug)]
struct Dropout {
    rate: f64,
}

#[derive(Facet, Debug)]
struct Sgd {
    lr: f64,
    #[facet(default)]
    momentum: f64,
}

#[derive(Debug)]
struct Trainer {
    name: String,
    layers: Vec<Object>,
    optimizer: Lazy,
}

struct Classes {
    trainer: Class,
    registry: Arc<Registry>,
}

fn classes() -> Result<Classes, construe::ConfigurationError> {
    trait Layer {}
    trait Optimizer {}

    let layer = Class::opaque::<dyn Layer>("Layer").registrable().finish();
    let dense = Class::new::<Dense>("Dense")
        .base(TypeHint::class(&layer))
        .finish();
    let dropout = Class::new::<Dropout>("Dropout")
        .base(TypeHint::class(&layer))
        .finish();

    let optimizer = Class::opaque::<dyn Optimizer>("Optimizer")
        .registrable()
        .finish();
    let sgd = Class::new::<Sgd>("Sgd")
        .base(TypeHint::class(&optimizer))
        .finish();

    let trainer = Class::opaque::<Trainer>("Trainer")
        .param("name", TypeHint::Str)
        .param("layers", TypeHint::list(TypeHint::class(&layer)))
        .param("optimizer", TypeHint::lazy(TypeHint::class(&optimizer)))
        .init(|args| {
            Ok(Trainer {
                name: args.take("name")?,
                layers: args.take("layers")?,
                optimizer: args.take("optimizer")?,
            })
        })
        .finish();

    let registry = Arc::new(Registry::new());
    registry.register(Scope::of(&layer), "dense", dense, RegisterOptions::new())?;
    registry.register(Scope::of(&layer), "dropout", dropout, RegisterOptions::new())?;
    registry.register(Scope::of(&optimizer), "sgd", sgd, RegisterOptions::new())?;

    Ok(Classes { trainer, registry })
}

const CONFIG: &str = r#"
trainer {
    name "tiny"
    layers {
        (dense)- 64
        (dropout)- rate=0.1
        (dense)- size=10
    }
    (sgd)optimizer lr=0.01
}
"#;

const BROKEN: &str = r#"
trainer {
    name "tiny"
    layers {
        (dense)- 64
        (dropout)- rate="high"
    }
    (sgd)optimizer lr=0.01
}
"#;

fn section(title: &str) {
    println!("\n{}", "═".repeat(70));
    println!("  {title}");
    println!("{}", "═".repeat(70));
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let classes = classes()?;
    let builder = Builder::new().with_registry(Arc::clone(&classes.registry));
    let hint = TypeHint::class(&classes.trainer);

    section("Config");
    println!("{CONFIG}");
    let config: Value = construe::from_str(CONFIG)?
        .get("trainer")
        .cloned()
        .unwrap_or_default();
    println!("{config}");

    section("Validation");
    builder.validate(config.clone(), &hint)?;
    println!("config is valid, nothing was constructed");

    section("Build");
    let trainer: Rc<Trainer> = builder.build_as(config, &hint)?;
    println!("trainer {}", trainer.name);
    for layer in &trainer.layers {
        if let Some(dense) = layer.downcast_ref::<Dense>() {
            println!("  dense({})", dense.size);
        } else if let Some(dropout) = layer.downcast_ref::<Dropout>() {
            println!("  dropout({})", dropout.rate);
        }
    }

    section("Lazy optimizer");
    if let Some(constructor) = trainer.optimizer.constructor()? {
        println!("optimizer will be built by {}", constructor.name());
    }
    let sgd = trainer.optimizer.construct_with([("momentum", 0.9)])?;
    if let Some(sgd) = sgd.downcast_ref::<Sgd>() {
        println!("sgd(lr={}, momentum={})", sgd.lr, sgd.momentum);
    }

    section("Errors");
    let broken = construe::from_str(BROKEN)?.get("trainer").cloned();
    if let Err(err) = builder.build(broken, &hint) {
        println!("{err}");
    }

    Ok(())
}
