//! A factory exercising every parameter shape, shared by the integration
//! tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use object_namer::*;
use paste::paste;

pub const DEFAULT_RATE: f64 = 1.0;

parm_enum! {
    pub enum Shape {
        Circle => "circle",
        Square => "square",
    }
}

#[derive(Debug)]
pub struct Foo {
    core: NamedObjectCore,
    pub rate: f64,
    pub jitter: f64,
    pub shape: Shape,
    pub tags: Vec<String>,
    pub ints: BTreeSet<i32>,
    pub limits: BTreeMap<String, i32>,
    pub peer: Option<ObjectRef>,
}

impl NamedObject for Foo {
    fn core(&self) -> &NamedObjectCore {
        &self.core
    }
}

pub struct FooFactory {
    namer: Rc<ObjectNamer>,
    parms: Rc<ParmManager<FooFactory>>,
    pub rate: f64,
    pub jitter: DoubleRv,
    pub shape: Shape,
    pub tags: Vec<String>,
    pub ints: BTreeSet<i32>,
    pub limits: BTreeMap<String, i32>,
    pub peer: Option<ObjectRef>,
    pub resets: usize,
}

impl FooFactory {
    pub fn with_parms(
        namer: Rc<ObjectNamer>,
        parms: ParmManager<FooFactory>,
    ) -> Self {
        let mut factory = Self {
            namer,
            parms: Rc::new(parms),
            rate: 0.0,
            jitter: Box::new(FixedRv::new(0.0)),
            shape: Shape::Circle,
            tags: Vec::new(),
            ints: BTreeSet::new(),
            limits: BTreeMap::new(),
            peer: None,
            resets: 0,
        };
        factory.set_defaults();
        factory
    }
}

impl FactoryType for FooFactory {
    fn with_namer(namer: Rc<ObjectNamer>) -> Self {
        Self::with_parms(namer, foo_parms())
    }
}

impl ParmFactory for FooFactory {
    fn object_namer(&self) -> &Rc<ObjectNamer> {
        &self.namer
    }

    fn parm_manager(&self) -> &Rc<ParmManager<Self>> {
        &self.parms
    }

    fn build_object(
        &mut self,
        name: Option<&str>,
    ) -> Result<ObjectRef, NamerError> {
        let rate = self.rate;
        let jitter = self.jitter.next();
        let shape = self.shape;
        let tags = self.tags.clone();
        let ints = self.ints.clone();
        let limits = self.limits.clone();
        let peer = self.peer.clone();
        let object = self.namer.create_object(name, true, |core| Foo {
            core,
            rate,
            jitter,
            shape,
            tags,
            ints,
            limits,
            peer,
        })?;
        Ok(object)
    }
}

fn boxed(parser: ClosureParser<FooFactory>) -> Rc<dyn ParmParser<FooFactory>> {
    Rc::new(parser)
}

/// The parameters of [`FooFactory`].
pub fn foo_parms() -> ParmManager<FooFactory> {
    let rate = ClosureParser::<FooFactory>::new()
        .on_parse(|binding, factory, key, value| match (key, value) {
            (None, ParmValue::Double(rate)) => {
                factory.rate = rate;
                Ok(())
            }
            (key, value) => Err(binding.unsupported_parse(key, &value)),
        })
        .on_clear(|_, factory, _| {
            factory.rate = DEFAULT_RATE;
            Ok(())
        });
    let jitter = ClosureParser::<FooFactory>::new().on_parse(
        |binding, factory, key, value| match (key, value) {
            (None, ParmValue::DoubleRv(rv)) => {
                factory.jitter = rv;
                Ok(())
            }
            (key, value) => Err(binding.unsupported_parse(key, &value)),
        },
    );
    let shape = ClosureParser::<FooFactory>::new().on_parse(
        |binding, factory, key, value| match value.as_enum::<Shape>() {
            Some(shape) if key.is_none() => {
                factory.shape = shape;
                Ok(())
            }
            _ => Err(binding.unsupported_parse(key, &value)),
        },
    );
    let tags = ClosureParser::<FooFactory>::new()
        .on_parse(|binding, factory, _, value| match value {
            ParmValue::Str(tag) => {
                factory.tags.push(tag);
                Ok(())
            }
            value => Err(binding.unsupported_parse(None, &value)),
        })
        .on_clear(|_, factory, key| {
            match key.and_then(ParmKey::as_str) {
                Some(tag) => factory.tags.retain(|t| t != tag),
                None => factory.tags.clear(),
            }
            Ok(())
        });
    let ints = ClosureParser::<FooFactory>::new()
        .on_parse(|binding, factory, _, value| match value {
            ParmValue::Int(element) => {
                factory.ints.insert(element);
                Ok(())
            }
            value => Err(binding.unsupported_parse(None, &value)),
        })
        .on_clear(|_, factory, key| {
            match key.and_then(ParmKey::as_int) {
                Some(element) => {
                    factory.ints.remove(&element);
                }
                None => factory.ints.clear(),
            }
            Ok(())
        });
    let limits = ClosureParser::<FooFactory>::new()
        .on_parse(|binding, factory, key, value| {
            match (key.and_then(ParmKey::as_str), value) {
                (Some(key), ParmValue::Int(limit)) => {
                    factory.limits.insert(key.to_string(), limit);
                    Ok(())
                }
                (_, value) => Err(binding.unsupported_parse(key, &value)),
            }
        })
        .on_clear(|_, factory, key| {
            match key.and_then(ParmKey::as_str) {
                Some(key) => {
                    factory.limits.remove(key);
                }
                None => factory.limits.clear(),
            }
            Ok(())
        });
    let peer = ClosureParser::<FooFactory>::new()
        .on_parse(|binding, factory, key, value| match (key, value) {
            (None, ParmValue::Object(object)) => {
                factory.peer = Some(object);
                Ok(())
            }
            (key, value) => Err(binding.unsupported_parse(key, &value)),
        })
        .on_clear(|_, factory, _| {
            factory.peer = None;
            Ok(())
        });
    let reset = ClosureParser::<FooFactory>::new().on_clear(|_, factory, _| {
        factory.tags.clear();
        factory.ints.clear();
        factory.limits.clear();
        Ok(())
    });

    let non_negative = Bounds::unbounded().with_lower(0, true);
    let unit = non_negative.with_upper(1, true);
    let mut parms = ParmManager::<FooFactory>::new();
    parms.add_all([
        Parm::unkeyed_bounded(
            "rate",
            None,
            boxed(rate),
            ValueType::Double,
            non_negative,
        )
        .unwrap(),
        Parm::unkeyed_bounded(
            "jitter",
            Some(RvKind::Plain),
            boxed(jitter),
            ValueType::Double,
            unit,
        )
        .unwrap(),
        Parm::unkeyed("shape", None, boxed(shape), ValueType::enumeration::<Shape>())
            .unwrap(),
        Parm::keyed("tags", KeyComponent::String, None, boxed(tags), None).unwrap(),
        Parm::keyed("ints", KeyComponent::Int, None, boxed(ints), None).unwrap(),
        Parm::keyed(
            "limits",
            KeyComponent::String,
            None,
            boxed(limits),
            Some(ValueType::Int),
        )
        .unwrap(),
        Parm::unkeyed("peer", None, boxed(peer), ValueType::any_object()).unwrap(),
        Parm::clear_only("reset", boxed(reset)).unwrap(),
    ]);
    parms.add_defaults(|factory: &mut FooFactory| {
        factory.rate = DEFAULT_RATE;
        factory.jitter = Box::new(FixedRv::new(0.0));
        factory.shape = Shape::Circle;
        factory.tags.clear();
        factory.ints.clear();
        factory.limits.clear();
        factory.peer = None;
        factory.resets += 1;
    });
    parms.add_tip_bundle(
        ResourceBundle::new()
            .with("rate", "Arrivals per second")
            .with("jitter", "Random offset added to each arrival"),
    );
    parms
}

/// A namer with [`FooFactory`] registered as `pkg.Foo`.
pub fn foo_namer() -> Rc<ObjectNamer> {
    let namer = ObjectNamer::new();
    namer.register_factory::<FooFactory>("pkg.Foo");
    namer
}
