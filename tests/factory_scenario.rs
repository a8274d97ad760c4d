//! End-to-end tests driving a factory through its parameters.

mod common;

use std::cell::Cell;
use std::rc::Rc;

use object_namer::*;
use serde_json::json;

use common::{DEFAULT_RATE, Foo, FooFactory, Shape, foo_namer, foo_parms};

fn foo_factory() -> (Rc<ObjectNamer>, FooFactory) {
    let namer = foo_namer();
    let factory = namer.create_factory_of::<FooFactory>();
    (namer, factory)
}

#[test]
fn test_bounded_rate() {
    let (namer, mut factory) = foo_factory();
    factory.set("rate", "2.5").unwrap();
    assert_eq!(factory.rate, 2.5);

    factory.set("rate", 0).unwrap();
    assert_eq!(factory.rate, 0.0);

    let err = factory.set("rate", -0.5).unwrap_err();
    assert!(matches!(err, ParmError::InvalidArgument { ref parm, .. } if parm == "rate"));
    assert_eq!(factory.rate, 0.0);

    let err = factory.set("rate", "fast").unwrap_err();
    assert!(matches!(err, ParmError::InvalidArgument { .. }));

    let err = factory.set("rate", true).unwrap_err();
    match err {
        ParmError::Unsupported(message) => {
            assert!(message.contains("\"rate\""));
            assert!(message.contains("bool"));
        }
        other => panic!("expected unsupported, got {other}"),
    }

    factory.set("rate", 4.0).unwrap();
    factory.create_object(Some("gate")).unwrap();
    assert_eq!(namer.get_object_as::<Foo>("gate").unwrap().rate, 4.0);

    factory.clear("rate").unwrap();
    assert_eq!(factory.rate, DEFAULT_RATE);
}

#[test]
fn test_clear_all() {
    let (_, mut factory) = foo_factory();
    factory.set("rate", 9.0).unwrap();
    factory.add("ints", 3).unwrap();
    factory.set_keyed("limits", "max", 2).unwrap();
    factory.clear_all().unwrap();
    assert_eq!(factory.rate, DEFAULT_RATE);
    assert!(factory.ints.is_empty());
    assert!(factory.limits.is_empty());
}

#[test]
fn test_unknown_parameter() {
    let (_, mut factory) = foo_factory();
    assert_eq!(
        factory.set("speed", 1).unwrap_err(),
        ParmError::UnknownParm("speed".to_string())
    );
}

#[test]
fn test_enum_parameter() {
    let (_, mut factory) = foo_factory();
    factory.set("shape", "square").unwrap();
    assert_eq!(factory.shape, Shape::Square);

    factory.set("shape", ParmValue::enumeration(Shape::Circle)).unwrap();
    assert_eq!(factory.shape, Shape::Circle);

    assert!(factory.set("shape", "triangle").is_err());
    assert_eq!(common::SHAPE_NAMES, &["circle", "square"]);
}

#[test]
fn test_integer_element_set() {
    let (_, mut factory) = foo_factory();
    factory.add("ints", 10).unwrap();
    factory.add("ints", "30").unwrap();
    factory.add("ints", 40i64).unwrap();
    factory.add("ints", 50.0).unwrap();
    assert_eq!(factory.ints.iter().copied().collect::<Vec<_>>(), vec![10, 30, 40, 50]);

    factory.remove("ints", 50.0).unwrap();
    factory.remove("ints", "10").unwrap();
    assert_eq!(factory.ints.iter().copied().collect::<Vec<_>>(), vec![30, 40]);

    let err = factory.add("ints", 2.5).unwrap_err();
    assert!(matches!(err, ParmError::InvalidArgument { .. }));
    assert!(matches!(factory.set("ints", 1), Err(ParmError::Unsupported(_))));

    factory.clear("ints").unwrap();
    assert!(factory.ints.is_empty());
}

#[test]
fn test_string_element_set() {
    let (_, mut factory) = foo_factory();
    for tag in ["red", "green", "blue"] {
        factory.add("tags", tag).unwrap();
    }
    factory.remove("tags", "green").unwrap();
    assert_eq!(factory.tags, vec!["red", "blue"]);
}

#[test]
fn test_keyed_parameter() {
    let (_, mut factory) = foo_factory();
    factory.set_keyed("limits", "max", 5).unwrap();
    factory.set_keyed("limits", "min", "2").unwrap();
    assert_eq!(factory.limits.get("max"), Some(&5));
    assert_eq!(factory.limits.get("min"), Some(&2));

    factory.unset("limits", "max").unwrap();
    assert!(!factory.limits.contains_key("max"));

    let err = factory.set("limits", 3).unwrap_err();
    assert!(matches!(err, ParmError::InvalidArgument { .. }));
    let err = factory.add_keyed("limits", "max", 3).unwrap_err();
    assert!(matches!(err, ParmError::Unsupported(_)));
}

#[test]
fn test_clear_only_parameter() {
    let (_, mut factory) = foo_factory();
    factory.add("tags", "a").unwrap();
    factory.set_keyed("limits", "max", 1).unwrap();
    factory.clear("reset").unwrap();
    assert!(factory.tags.is_empty());
    assert!(factory.limits.is_empty());

    let err = factory.set("reset", 1).unwrap_err();
    assert!(matches!(err, ParmError::Unsupported(_)));
}

/// Counts up in quarters, starting over at the first step once a draw
/// would leave its range.
#[derive(Debug)]
struct Counter {
    next: f64,
    range: Bounds,
}

impl Counter {
    fn starting_at(start: f64) -> DoubleRv {
        Box::new(Counter { next: start, range: Bounds::unbounded() })
    }
}

impl RandomVariable for Counter {
    type Output = f64;

    fn next(&mut self) -> f64 {
        self.next += 0.25;
        if !self.range.contains_double(self.next) {
            self.next = 0.25;
        }
        self.next
    }

    fn tighten(&mut self, bounds: &Bounds) -> bool {
        self.range = *bounds;
        bounds.contains_double(self.next + 0.25)
    }
}

#[test]
fn test_random_variable_parameter() {
    let (namer, mut factory) = foo_factory();
    factory.set("jitter", 0.5).unwrap();
    factory.create_object(Some("fixed")).unwrap();
    assert_eq!(namer.get_object_as::<Foo>("fixed").unwrap().jitter, 0.5);

    let err = factory.set("jitter", 2).unwrap_err();
    assert!(matches!(err, ParmError::InvalidArgument { .. }));

    factory.set("jitter", Counter::starting_at(0.0)).unwrap();
    let first = factory.create_object(None).unwrap();
    let second = factory.create_object(None).unwrap();
    let jitter = |object: &ObjectRef| object.downcast_ref::<Foo>().unwrap().jitter;
    assert_eq!(jitter(&first), 0.25);
    assert_eq!(jitter(&second), 0.5);
}

#[test]
fn test_random_variable_tightened_to_bounds() {
    let (_, mut factory) = foo_factory();
    factory.set("jitter", Counter::starting_at(0.0)).unwrap();
    let draws: Vec<f64> = (0..6).map(|_| factory.jitter.next()).collect();
    assert_eq!(draws, vec![0.25, 0.5, 0.75, 1.0, 0.25, 0.5]);

    let err = factory.set("jitter", Counter::starting_at(5.0)).unwrap_err();
    assert!(matches!(err, ParmError::InvalidArgument { ref parm, .. } if parm == "jitter"));
}

#[test]
fn test_object_parameter() {
    let (namer, mut factory) = foo_factory();
    factory.create_object(Some("upstream")).unwrap();
    factory.set("peer", "upstream").unwrap();
    factory.create_object(Some("downstream")).unwrap();

    let downstream = namer.get_object_as::<Foo>("downstream").unwrap();
    let peer = downstream.peer.as_ref().unwrap();
    assert_eq!(peer.name(), "upstream");
    assert!(peer.is::<Foo>());

    let err = factory.set("peer", "nobody").unwrap_err();
    assert!(matches!(err, ParmError::InvalidArgument { .. }));

    factory.clear("peer").unwrap();
    assert!(factory.peer.is_none());
}

#[test]
fn test_configure_tree() {
    let (_, mut factory) = foo_factory();
    factory
        .configure(&json!({
            "rate": 3,
            "shape": "square",
            "tags": ["a", "b"],
            "ints": [1, "2", 3.0],
            "limits": {"max": 9, "min": 1},
        }))
        .unwrap();
    assert_eq!(factory.rate, 3.0);
    assert_eq!(factory.shape, Shape::Square);
    assert_eq!(factory.tags, vec!["a", "b"]);
    assert_eq!(factory.ints.len(), 3);
    assert_eq!(factory.limits.len(), 2);

    factory
        .configure(&json!({"limits": {"max": null}, "tags": null}))
        .unwrap();
    assert_eq!(factory.limits.keys().collect::<Vec<_>>(), vec!["min"]);
    assert!(factory.tags.is_empty());

    let err = factory.configure(&json!({"rate": [1, 2]})).unwrap_err();
    assert!(matches!(err, ParmError::Unsupported(_)));
}

#[test]
fn test_configure_applies_members_in_written_order() {
    let (_, mut factory) = foo_factory();
    factory
        .configure(&json!({"tags": ["a"], "reset": null}))
        .unwrap();
    assert!(factory.tags.is_empty());

    factory
        .configure(&json!({"reset": null, "tags": ["b"]}))
        .unwrap();
    assert_eq!(factory.tags, vec!["b"]);
}

#[test]
fn test_defaults_reset_state() {
    let (_, mut factory) = foo_factory();
    let resets = factory.resets;
    factory.set("rate", 7.0).unwrap();
    factory.add("tags", "x").unwrap();
    factory.set_defaults();
    assert_eq!(factory.rate, DEFAULT_RATE);
    assert!(factory.tags.is_empty());
    assert_eq!(factory.resets, resets + 1);
}

#[test]
fn test_describe() {
    let (_, factory) = foo_factory();
    let summaries = factory.describe();
    let names: Vec<&str> = summaries.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["rate", "jitter", "shape", "tags", "ints", "limits", "peer", "reset"]
    );

    let rate = &summaries[0];
    assert_eq!(rate.bounds.as_deref(), Some("[0, inf)"));
    assert_eq!(rate.tip.as_deref(), Some("Arrivals per second"));
    assert_eq!(summaries[1].random.as_deref(), Some("random variable"));
    assert!(summaries[7].clear_only);
}

fn weights_parm() -> Parm<FooFactory> {
    let parser = ClosureParser::<FooFactory>::new()
        .on_parse(|binding, factory, key, value| match (key, value) {
            (Some(key), ParmValue::Int(weight)) => {
                factory.limits.insert(key.to_string(), weight);
                Ok(())
            }
            (key, value) => Err(binding.unsupported_parse(key, &value)),
        })
        .on_clear(|_, factory, key| {
            match key {
                Some(key) => {
                    factory.limits.remove(&key.to_string());
                }
                None => factory.limits.clear(),
            }
            Ok(())
        });
    Parm::keyed(
        "weights",
        ParmKeyType::new(vec![KeyComponent::String, KeyComponent::Int]),
        None,
        Rc::new(parser),
        Some(ValueType::Int),
    )
    .unwrap()
}

#[test]
fn test_addable_compound_key() {
    let namer = foo_namer();
    let mut parms = foo_parms();
    parms.add_parm(weights_parm());
    let mut factory = FooFactory::with_parms(namer, parms);

    factory.add_keyed("weights", "north.3", 9).unwrap();
    factory
        .add_keyed(
            "weights",
            ParmKey::Compound(vec!["south".into(), 4.into()]),
            "11",
        )
        .unwrap();
    assert_eq!(factory.limits.get("north.3"), Some(&9));
    assert_eq!(factory.limits.get("south.4"), Some(&11));

    factory.remove_keyed("weights", "north.3").unwrap();
    assert!(!factory.limits.contains_key("north.3"));

    assert!(matches!(
        factory.set_keyed("weights", "east.1", 1),
        Err(ParmError::Unsupported(_))
    ));
    assert!(matches!(
        factory.add_keyed("weights", "east", 1),
        Err(ParmError::InvalidArgument { .. })
    ));
    assert!(matches!(
        factory.add_keyed("weights", "east.first", 1),
        Err(ParmError::InvalidArgument { .. })
    ));

    factory.configure(&json!({"weights": {"west.2": 5}})).unwrap();
    assert_eq!(factory.limits.get("west.2"), Some(&5));
}

#[test]
fn test_compound_element_set_rejected() {
    let result = Parm::keyed(
        "pairs",
        ParmKeyType::new(vec![KeyComponent::String, KeyComponent::String]),
        None,
        Rc::new(ClosureParser::<FooFactory>::new()),
        None,
    );
    assert!(matches!(result, Err(ParmError::InvalidArgument { .. })));
}

#[test]
fn test_chained_parser() {
    let namer = foo_namer();
    let mut parms = foo_parms();
    let overrides = Rc::new(Cell::new(0));
    let seen = Rc::clone(&overrides);
    let binding = ParmBinding::chained(&parms, "limits", &KeyKind::String);
    assert!(binding.alternate().is_some());
    let parser = ClosureParser::with_binding(binding).on_parse(
        move |binding, factory, key, value| {
            match (key.and_then(ParmKey::as_str), &value) {
                (Some("max"), ParmValue::Int(limit)) => {
                    seen.set(seen.get() + 1);
                    factory.limits.insert("max".to_string(), limit * 2);
                    Ok(())
                }
                _ => binding.forward_parse(factory, key, value),
            }
        },
    )
    .on_clear(|binding, factory, key| binding.forward_clear(factory, key));
    let redeclared = Parm::keyed(
        "limits",
        KeyComponent::String,
        None,
        Rc::new(parser),
        Some(ValueType::Int),
    )
    .unwrap();
    parms.add_parm(redeclared);
    assert_eq!(parms.len(), 8);
    assert_eq!(parms.parms().len(), 9);

    let mut factory = FooFactory::with_parms(namer, parms);
    factory.set_keyed("limits", "max", 4).unwrap();
    factory.set_keyed("limits", "min", 4).unwrap();
    assert_eq!(factory.limits.get("max"), Some(&8));
    assert_eq!(factory.limits.get("min"), Some(&4));
    assert_eq!(overrides.get(), 1);

    factory.unset("limits", "min").unwrap();
    assert!(!factory.limits.contains_key("min"));

    let scalar = ParmBinding::<FooFactory>::chained(&foo_parms(), "rate", &KeyKind::None);
    assert!(scalar.alternate().is_none());
}

#[test]
fn test_factory_by_type_name() {
    let namer = foo_namer();
    assert!(namer.factory_types().contains("pkg.Foo"));

    let mut factory = namer.create_factory("pkg.Foo").unwrap();
    factory.set("rate", 6.0).unwrap();
    namer
        .configure_factory(factory.as_mut(), &json!({"tags": ["t"]}))
        .unwrap();
    assert!(namer.configure_factory_supported());

    let typed = factory.downcast_ref::<FooFactory>().unwrap();
    assert_eq!(typed.rate, 6.0);
    assert_eq!(typed.tags, vec!["t"]);

    let object = factory.create_object(Some("made")).unwrap();
    assert!(object.is::<Foo>());
    assert!(Rc::ptr_eq(&object, &namer.get_object("made").unwrap()));

    assert_eq!(
        namer.create_factory("pkg.Bar").err(),
        Some(NamerError::UnknownFactory("pkg.Bar".to_string()))
    );
}

#[test]
fn test_name_collisions() {
    let (namer, mut factory) = foo_factory();
    factory.create_object(Some("dup")).unwrap();
    assert_eq!(
        factory.create_object(Some("dup")).unwrap_err(),
        NamerError::NameInUse("dup".to_string())
    );
    assert_eq!(namer.len(), 1);
}

#[test]
fn test_alternate_namers() {
    let parent = foo_namer();
    let child = foo_namer();
    let mut parent_factory = parent.create_factory_of::<FooFactory>();
    parent_factory.create_object(Some("shared")).unwrap();

    child.add_object_namer(Rc::clone(&parent)).unwrap();
    assert!(child.get_object("shared").is_some());
    assert!(child.get_object_names().is_empty());

    let mut child_factory = child.create_factory_of::<FooFactory>();
    child_factory.set("peer", "shared").unwrap();
    child_factory.create_object(Some("local")).unwrap();
    assert_eq!(
        child.get_object_as::<Foo>("local").unwrap().peer.as_ref().map(|p| p.name()),
        Some("shared")
    );

    assert_eq!(
        parent.add_object_namer(Rc::clone(&child)),
        Err(NamerError::AlternateCycle)
    );
    assert!(!parent.check_alt_list(&child));
}

#[test]
fn test_delete_frees_name() {
    let (namer, mut factory) = foo_factory();
    let object = factory.create_object(Some("temp")).unwrap();
    assert!(object.delete());
    assert!(object.is_deleted());
    assert!(!object.delete());
    assert!(namer.get_object("temp").is_none());

    let replacement = factory.create_object(Some("temp")).unwrap();
    assert!(!Rc::ptr_eq(&object, &replacement));
    assert!(!object.delete());
    assert!(replacement.delete());
}
