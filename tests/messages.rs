extern crate ensemble;
extern crate env_logger;
#[macro_use]
extern crate failure;

use std::sync::{Arc, Mutex};

use ensemble::prelude::*;

#[derive(Debug, Clone, Copy, Default)]
struct Mover;

impl Component for Mover {}

#[derive(Debug, Clone, Copy, Default)]
struct Sensor;

impl Component for Sensor {}

type Journal = Arc<Mutex<Vec<&'static str>>>;

fn setup() -> (EntitySystem, ComponentFamily, ComponentFamily) {
    let _ = env_logger::builder().is_test(true).try_init();

    let system = EntitySystem::default();
    let mover = system
        .register_component::<Mover>("mover", Multiplicity::Multiple)
        .unwrap();
    let sensor = system
        .register_component::<Sensor>("sensor", Multiplicity::Single)
        .unwrap();

    (system, mover, sensor)
}

fn global(system: &EntitySystem, journal: &Journal, name: &str, label: &'static str, priority: i32) -> RequestId {
    let journal = journal.clone();
    system
        .register_global_request(name, priority, move |_, _| {
            journal.lock().unwrap().push(label);
            Ok(Flow::Continue)
        })
        .unwrap()
}

#[test]
fn priority_order() {
    let (system, _, _) = setup();
    let journal = Journal::default();

    let r1 = global(&system, &journal, "update", "r1", 5);
    let r2 = global(&system, &journal, "update", "r2", 1);
    let r3 = global(&system, &journal, "update", "r3", 5);

    assert_eq!(system.request_order("update", Locality::Global), vec![r2, r1, r3]);
    let delivery = system.send_global_message("update", &()).unwrap();
    assert_eq!(delivery.invoked, 3);
    assert!(!delivery.is_stopped());
    assert_eq!(*journal.lock().unwrap(), vec!["r2", "r1", "r3"]);

    system.reprioritize_request(r1, 0).unwrap();
    assert_eq!(system.request_order("update", Locality::Global), vec![r1, r2, r3]);

    journal.lock().unwrap().clear();
    system.send_global_message("update", &()).unwrap();
    assert_eq!(*journal.lock().unwrap(), vec!["r1", "r2", "r3"]);
}

#[test]
fn tick_arguments() {
    let (system, _, _) = setup();

    let received = Arc::new(Mutex::new(Vec::new()));
    for &(priority, label) in &[(20, "late"), (10, "early")] {
        let received = received.clone();
        system
            .register_global_request("tick", priority, move |_, msg| {
                let dt = *msg.args::<f32>().ok_or_else(|| format_err!("expects f32"))?;
                received.lock().unwrap().push((label, dt));
                Ok(Flow::Continue)
            })
            .unwrap();
    }

    let id = system.message_id("tick");
    assert_eq!(system.existing_message_id("tick"), Some(id));
    assert_eq!(system.message_name(id).unwrap(), "tick");

    system.send_global_message_id(id, &0.016f32).unwrap();
    assert_eq!(*received.lock().unwrap(), vec![("early", 0.016), ("late", 0.016)]);

    // Mistyped arguments surface as subscriber errors.
    match system.send_global_message("tick", &0.016f64) {
        Err(Error::Subscriber(..)) => {}
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn stop_propagation() {
    let (system, _, _) = setup();
    let journal = Journal::default();

    global(&system, &journal, "input", "first", 0);
    let stopper = {
        let journal = journal.clone();
        system
            .register_global_request("input", 1, move |_, _| {
                journal.lock().unwrap().push("stopper");
                Ok(Flow::Stop)
            })
            .unwrap()
    };
    global(&system, &journal, "input", "never", 2);

    let delivery = system.send_global_message("input", &"click").unwrap();
    assert_eq!(delivery.invoked, 2);
    assert_eq!(delivery.stopped_by, Some(stopper));
    assert_eq!(*journal.lock().unwrap(), vec!["first", "stopper"]);
}

#[test]
fn subscriber_errors_abort_the_send() {
    let (system, _, _) = setup();
    let journal = Journal::default();

    let failing = system
        .register_global_request("save", 0, |_, _| Err(format_err!("disk full")))
        .unwrap();
    global(&system, &journal, "save", "after", 1);

    match system.send_global_message("save", &()) {
        Err(Error::Subscriber(id, err)) => {
            assert_eq!(id, failing);
            assert_eq!(err.to_string(), "disk full");
        }
        other => panic!("unexpected {:?}", other),
    }

    assert!(journal.lock().unwrap().is_empty());
}

#[test]
fn local_filtering() {
    let (system, mover, sensor) = setup();

    let hits = Arc::new(Mutex::new(Vec::new()));
    {
        let hits = hits.clone();
        system
            .register_local_request(mover, "push", 0, move |_, msg| {
                hits.lock().unwrap().push(msg.component.unwrap());
                Ok(Flow::Continue)
            })
            .unwrap();
    }

    let e1 = system.create_entity().unwrap();
    let m1 = system.create_component(e1, mover).unwrap();
    let m2 = system.create_component(e1, mover).unwrap();

    let e2 = system.create_entity().unwrap();
    system.create_component(e2, sensor).unwrap();

    let delivery = system.send_local_message(e1, "push", &()).unwrap();
    assert_eq!(delivery.invoked, 2);
    assert_eq!(*hits.lock().unwrap(), vec![m1, m2]);

    // No mover on e2, so no invocation.
    let delivery = system.send_local_message(e2, "push", &()).unwrap();
    assert_eq!(delivery.invoked, 0);

    // Local requests never fire for global sends.
    let delivery = system.send_global_message("push", &()).unwrap();
    assert_eq!(delivery.invoked, 0);

    assert!(system.register_local_request(77, "push", 0, |_, _| Ok(Flow::Continue)).is_err());
}

#[test]
fn owned_requests() {
    let (system, mover, sensor) = setup();

    let e = system.create_entity().unwrap();
    let m1 = system.create_component(e, mover).unwrap();
    let m2 = system.create_component(e, mover).unwrap();
    let s = system.create_component(e, sensor).unwrap();

    let hits = Arc::new(Mutex::new(Vec::new()));
    {
        let hits = hits.clone();
        system
            .register_owned_request(m2, Locality::Local(sensor), "ping", 0, move |_, msg| {
                hits.lock().unwrap().push(msg.component);
                Ok(Flow::Continue)
            })
            .unwrap();
    }
    {
        let hits = hits.clone();
        system
            .register_owned_request(s, Locality::Global, "ping", 1, move |_, msg| {
                hits.lock().unwrap().push(msg.component);
                Ok(Flow::Continue)
            })
            .unwrap();
    }

    // Only the owner component receives the local send.
    system.send_local_message(e, "ping", &()).unwrap();
    assert_eq!(*hits.lock().unwrap(), vec![Some(m2)]);

    hits.lock().unwrap().clear();
    system.send_global_message("ping", &()).unwrap();
    assert_eq!(*hits.lock().unwrap(), vec![Some(s)]);

    system.destroy_component(m2).unwrap();
    system.destroy_component(s).unwrap();
    assert!(system.request_order("ping", Locality::Global).is_empty());
    assert!(system.request_order("ping", Locality::Local(mover)).is_empty());

    hits.lock().unwrap().clear();
    system.send_local_message(e, "ping", &()).unwrap();
    system.send_global_message("ping", &()).unwrap();
    assert!(hits.lock().unwrap().is_empty());
    assert!(system.is_component_valid(m1));
}

#[test]
fn removal() {
    let (system, mover, _) = setup();
    let journal = Journal::default();

    let g = global(&system, &journal, "step", "global", 0);
    let l = system
        .register_local_request(mover, "step", 0, |_, _| Ok(Flow::Continue))
        .unwrap();

    match system.remove_local_request(g) {
        Err(Error::RequestHandleInvalid(id)) => assert_eq!(id, g),
        other => panic!("unexpected {:?}", other),
    }

    match system.remove_global_request(l) {
        Err(Error::RequestHandleInvalid(id)) => assert_eq!(id, l),
        other => panic!("unexpected {:?}", other),
    }

    system.remove_global_request(g).unwrap();
    system.remove_local_request(l).unwrap();
    assert!(system.remove_global_request(g).is_err());
    assert!(system.reprioritize_request(l, 3).is_err());

    assert_eq!(system.send_global_message("step", &()).unwrap().invoked, 0);
}

#[test]
fn removal_during_dispatch() {
    let (system, _, _) = setup();
    let journal = Journal::default();

    let victim = Arc::new(Mutex::new(None));
    {
        let victim = victim.clone();
        system
            .register_global_request("frame", 0, move |system, _| {
                if let Some(id) = victim.lock().unwrap().take() {
                    system.remove_global_request(id)?;
                }

                Ok(Flow::Continue)
            })
            .unwrap();
    }

    let later = global(&system, &journal, "frame", "later", 1);
    *victim.lock().unwrap() = Some(later);

    let delivery = system.send_global_message("frame", &()).unwrap();
    assert_eq!(delivery.invoked, 1);
    assert!(journal.lock().unwrap().is_empty());
}

#[test]
fn unknown_messages() {
    let (system, _, _) = setup();

    // A name nobody ever mentioned delivers nothing.
    let delivery = system.send_global_message("nobody", &()).unwrap();
    assert_eq!(delivery, Delivery::default());
    assert_eq!(system.existing_message_id("nobody"), None);

    // An id that this system never issued is an error.
    let other = EntitySystem::default();
    other.message_id("a");
    let foreign = other.message_id("b");

    match system.send_global_message_id(foreign, &()) {
        Err(Error::UnknownMessage(id)) => assert_eq!(id, foreign),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn local_sends_need_finalized_targets() {
    let _ = env_logger::builder().is_test(true).try_init();

    let params = SystemParams {
        threaded: true,
        ..SystemParams::default()
    };
    let system = EntitySystem::new(params).unwrap();
    let mover = system
        .register_component::<Mover>("mover", Multiplicity::Multiple)
        .unwrap();

    let count = Arc::new(Mutex::new(0));
    {
        let count = count.clone();
        system
            .register_local_request(mover, "poke", 0, move |_, _| {
                *count.lock().unwrap() += 1;
                Ok(Flow::Continue)
            })
            .unwrap();
    }

    let e = system.create_entity().unwrap();
    system.create_component(e, mover).unwrap();

    match system.send_local_message(e, "poke", &()) {
        Err(Error::NotFinalized(id)) => assert_eq!(id, e),
        other => panic!("unexpected {:?}", other),
    }

    assert!(system.finalize_entity(e).unwrap());
    assert!(!system.finalize_entity(e).unwrap());
    assert_eq!(system.send_local_message(e, "poke", &()).unwrap().invoked, 1);
    assert_eq!(*count.lock().unwrap(), 1);
}

#[test]
fn component_messages() {
    let (system, mover, sensor) = setup();
    let journal = Journal::default();

    let e = system.create_entity().unwrap();
    let m1 = system.create_component(e, mover).unwrap();
    let m2 = system.create_component(e, mover).unwrap();

    let requests = [
        (m1, Locality::Global, "m1 global", 2),
        (m1, Locality::Local(mover), "m1 local", 1),
        (m2, Locality::Global, "m2", 0),
    ];

    for &(owner, locality, label, priority) in &requests {
        let journal = journal.clone();
        system
            .register_owned_request(owner, locality, "poke", priority, move |_, msg| {
                if msg.component == Some(owner) && msg.entity == Some(e) {
                    journal.lock().unwrap().push(label);
                }

                Ok(Flow::Continue)
            })
            .unwrap();
    }
    global(&system, &journal, "poke", "loose", -1);

    let delivery = system.send_component_message(m1, "poke", &()).unwrap();
    assert_eq!(delivery.invoked, 2);
    assert_eq!(*journal.lock().unwrap(), vec!["m1 local", "m1 global"]);

    // No request owned by the sensor.
    let s = system.create_component(e, sensor).unwrap();
    assert_eq!(system.send_component_message(s, "poke", &()).unwrap().invoked, 0);
    assert_eq!(
        system.send_component_message(s, "nobody", &()).unwrap(),
        Delivery::default()
    );

    system.destroy_component(m2).unwrap();
    match system.send_component_message(m2, "poke", &()) {
        Err(Error::ComponentHandleInvalid(id)) => assert_eq!(id, m2),
        other => panic!("unexpected {:?}", other),
    }
}
