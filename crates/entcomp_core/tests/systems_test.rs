//! Integration tests for tick/render systems and their ordering.

use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use entcomp_core::{ComponentDef, Timing, World};
use serde_json::json;

#[derive(Default)]
struct Observed {
    dt: f64,
    count: usize,
    total: f64,
}

fn sum(states: &entcomp_core::StatesMut<'_>) -> f64 {
    states.iter().filter_map(|s| s["num"].as_f64()).sum()
}

#[test]
fn test_systems() {
    let ticked = Rc::new(RefCell::new(Observed::default()));
    let rendered = Rc::new(RefCell::new(Observed::default()));
    let (t, r) = (Rc::clone(&ticked), Rc::clone(&rendered));

    let mut world = World::new();
    world.tick(0.0);
    world.tick(123.0);
    world.render(0.0);

    world
        .register_component(
            ComponentDef::new("foo")
                .with_state(json!({ "num": 5 }))
                .system(move |_, dt, states| {
                    *t.borrow_mut() = Observed {
                        dt,
                        count: states.len(),
                        total: sum(&states),
                    };
                })
                .render_system(move |_, dt, states| {
                    *r.borrow_mut() = Observed {
                        dt,
                        count: states.len(),
                        total: sum(&states),
                    };
                }),
        )
        .unwrap();

    // Empty lists are skipped
    world.tick(123.0);
    assert!(ticked.borrow().dt.abs() < f64::EPSILON);

    let id1 = world.create_entity_with(&["foo"]).unwrap();
    world.tick(37.0);
    {
        let seen = ticked.borrow();
        assert!((seen.dt - 37.0).abs() < f64::EPSILON);
        assert_eq!(seen.count, 1);
        assert!((seen.total - 5.0).abs() < f64::EPSILON);
    }

    world.create_entity_with(&["foo"]).unwrap();
    world.tick(38.0);
    assert_eq!(ticked.borrow().count, 2);
    assert!((ticked.borrow().total - 10.0).abs() < f64::EPSILON);

    world.remove_component(id1, "foo", Timing::Immediate).unwrap();
    world.render(39.0);
    let seen = rendered.borrow();
    assert!((seen.dt - 39.0).abs() < f64::EPSILON);
    assert_eq!(seen.count, 1);
    assert!((seen.total - 5.0).abs() < f64::EPSILON);
}

#[test]
fn test_system_sum_matches_direct() {
    let observed = Rc::new(Cell::new((0usize, 0.0)));
    let sink = Rc::clone(&observed);
    let mut world = World::new();
    world
        .register_component(ComponentDef::new("foo").system(move |_, _, states| {
            sink.set((states.len(), sum(&states)));
        }))
        .unwrap();

    let mut expected = 0.0;
    for i in 0..50u32 {
        let id = world.create_entity();
        world.add_component_with(id, "foo", json!({ "num": i })).unwrap();
        expected += f64::from(i);
    }

    world.tick(30.0);
    let (count, total) = observed.get();
    assert_eq!(count, 50);
    assert!((total - expected).abs() < f64::EPSILON);
}

#[test]
fn test_system_edits_persist() {
    let mut world = World::new();
    world
        .register_component(
            ComponentDef::new("counter")
                .with_state(json!({ "num": 0 }))
                .system(|_, _, mut states| {
                    for state in states.iter_mut() {
                        let next = state["num"].as_i64().unwrap_or(0) + 1;
                        state.set("num", next);
                    }
                }),
        )
        .unwrap();
    let id = world.create_entity_with(&["counter"]).unwrap();

    world.tick(1.0);
    world.tick(1.0);
    world.tick(1.0);
    let state = world.get_state(id, "counter").unwrap().unwrap().as_one().unwrap();
    assert_eq!(state["num"], json!(3));

    // Host edits through the live list reach the next run
    for state in world.states_list_mut("counter").unwrap().iter_mut() {
        state.set("num", 10);
    }
    world.tick(1.0);
    let state = world.get_state(id, "counter").unwrap().unwrap().as_one().unwrap();
    assert_eq!(state["num"], json!(11));
}

#[test]
fn test_system_removes_through_queue() {
    let mut world = World::new();
    world
        .register_component(
            ComponentDef::new("lifetime")
                .with_state(json!({ "left": 2.0 }))
                .system(|queue, dt, mut states| {
                    for state in states.iter_mut() {
                        let left = state["left"].as_f64().unwrap_or(0.0) - dt;
                        state.set("left", left);
                        if left <= 0.0 {
                            queue.delete_entity(state.entity());
                        }
                    }
                }),
        )
        .unwrap();
    world.register_component(ComponentDef::new("tag")).unwrap();

    let short = world.create_entity_with(&["lifetime", "tag"]).unwrap();
    let long = world.create_entity();
    world.add_component_with(long, "lifetime", json!({ "left": 5.0 })).unwrap();

    world.tick(1.0);
    assert!(world.has_component(short, "lifetime").unwrap());
    world.tick(1.0);
    assert!(!world.has_component(short, "lifetime").unwrap());
    assert!(!world.has_component(short, "tag").unwrap());
    assert!(world.has_component(long, "lifetime").unwrap());
    assert!(!world.is_flush_pending());
}

#[test]
fn test_system_order() {
    let ticks = Rc::new(RefCell::new(Vec::new()));
    let renders = Rc::new(RefCell::new(Vec::new()));

    let def = |n: u32| {
        let (t, r) = (Rc::clone(&ticks), Rc::clone(&renders));
        ComponentDef::new(format!("comp{n}"))
            .system(move |_, _, _| t.borrow_mut().push(n))
            .render_system(move |_, _, _| r.borrow_mut().push(n))
    };

    let mut world = World::new();
    // Systems only run over non-empty lists
    let id = world.create_entity();
    let add = |world: &mut World, n: u32| {
        world.register_component(def(n)).unwrap();
        world.add_component(id, &format!("comp{n}")).unwrap();
    };
    let check = |world: &mut World, expected: &[u32]| {
        world.tick(1.0);
        world.render(1.0);
        assert_eq!(ticks.borrow().as_slice(), expected);
        assert_eq!(renders.borrow().as_slice(), expected);
        ticks.borrow_mut().clear();
        renders.borrow_mut().clear();
    };

    add(&mut world, 2);
    add(&mut world, 3);
    check(&mut world, &[2, 3]);

    add(&mut world, 1);
    check(&mut world, &[2, 3, 1]);

    world.unregister_component("comp2").unwrap();
    check(&mut world, &[3, 1]);

    world.unregister_component("comp1").unwrap();
    add(&mut world, 2);
    check(&mut world, &[3, 2]);

    add(&mut world, 1);
    world.unregister_component("comp2").unwrap();
    world.unregister_component("comp3").unwrap();
    add(&mut world, 3);
    add(&mut world, 2);
    check(&mut world, &[1, 3, 2]);
}

#[test]
fn test_panicking_system_keeps_flush_trigger() {
    let mut world = World::new();
    world
        .register_component(ComponentDef::new("boom").system(|_, _, _| panic!("boom")))
        .unwrap();
    let id = world.create_entity_with(&["boom"]).unwrap();
    let armed = Rc::new(Cell::new(0));
    let counter = Rc::clone(&armed);
    world.set_flush_hook(move || counter.set(counter.get() + 1));

    let result = panic::catch_unwind(AssertUnwindSafe(|| world.tick(1.0)));
    assert!(result.is_err());
    assert_eq!(armed.get(), 0);

    world.delete_entity(id, Timing::Deferred);
    assert_eq!(armed.get(), 1);
    assert!(world.is_flush_pending());
    assert!(world.flush_pending());
    assert!(!world.has_component(id, "boom").unwrap());
}
