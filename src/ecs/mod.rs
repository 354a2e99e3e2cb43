//! Entity Component System (ECS)
//!
//! Entities are generation-counted slots in an `EntityTable`, components live
//! in per-family `ComponentPool`s. Both are owned by the `EntitySystem`, which
//! defers structural edits while frozen and fires lifecycle events.

pub mod component;
pub mod entity;
pub mod events;
pub mod frozen;
pub mod id;
pub mod system;
pub mod view;
pub mod world;

pub use self::component::{Component, Multiplicity};
pub use self::id::{ComponentFamily, ComponentId, EntityId};
pub use self::system::{EntitySystem, FrozenScope};
pub use self::view::{ComponentIter, ComponentView, EntityIter, EntityView, Match};

#[cfg(test)]
mod test {
    use super::events::*;
    use super::*;
    use std::sync::{Arc, RwLock};

    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    struct Position {
        x: i32,
        y: i32,
    }

    impl Component for Position {}

    #[derive(Debug, Clone, Default)]
    struct Reference {
        value: Arc<RwLock<usize>>,
    }

    impl Drop for Reference {
        fn drop(&mut self) {
            *self.value.write().unwrap() += 1;
        }
    }

    impl Component for Reference {}

    #[test]
    fn basic() {
        let system = EntitySystem::default();
        system
            .register_component::<Position>("position", Multiplicity::Single)
            .unwrap();

        let e1 = system.create_entity().unwrap();
        let c1 = system.add_component(e1, Position { x: 1, y: 2 }).unwrap();

        let p = system.with_component(c1, |p: &Position| p.clone()).unwrap();
        assert_eq!(p, Position { x: 1, y: 2 });

        system
            .with_component_mut(c1, |p: &mut Position| {
                p.x = 2;
                p.y = 5;
            })
            .unwrap();

        let p = system.with_component(c1, |p: &Position| p.clone()).unwrap();
        assert_eq!(p, Position { x: 2, y: 5 });

        system.remove_component(e1, c1).unwrap();
        assert!(system.with_component(c1, |p: &Position| p.x).is_err());
        assert_eq!(system.component_of::<Position>(e1).unwrap(), None);
    }

    #[test]
    fn free() {
        let system = EntitySystem::default();
        system
            .register_component::<Position>("position", Multiplicity::Single)
            .unwrap();
        system
            .register_component::<Reference>("reference", Multiplicity::Single)
            .unwrap();

        let mut entities = Vec::new();
        let rc = Arc::new(RwLock::new(0));
        for i in 0..10 {
            let e = system.create_entity().unwrap();
            entities.push(e);

            system
                .add_component(e, Reference { value: rc.clone() })
                .unwrap();

            if i % 2 == 0 {
                system.add_component(e, Position { x: 1, y: 2 }).unwrap();
            }
        }

        assert_eq!(system.num_components(), 15);
        assert_eq!(*rc.read().unwrap(), 0);
        for (i, &e) in entities.iter().enumerate() {
            system.destroy_entity(e).unwrap();
            assert!(!system.is_entity_valid(e));
            assert_eq!(*rc.read().unwrap(), i + 1);
        }

        assert_eq!(system.num_components(), 0);
        assert_eq!(system.num_entities(), 0);
    }

    #[test]
    fn events_in_order() {
        let system = EntitySystem::default();
        let family = system
            .register_component::<Position>("position", Multiplicity::Single)
            .unwrap();

        let log = Arc::new(RwLock::new(Vec::new()));
        {
            let log = log.clone();
            system.subscribe(move |_, e: &ComponentDetached| {
                log.write().unwrap().push(format!("detached {}", e.family));
            });
        }
        {
            let log = log.clone();
            system.subscribe(move |_, _: &ComponentDestroyed| {
                log.write().unwrap().push("destroyed".to_owned());
            });
        }
        {
            let log = log.clone();
            system.subscribe(move |_, _: &EntityDestroyed| {
                log.write().unwrap().push("entity".to_owned());
            });
        }

        let e = system.create_entity().unwrap();
        system.create_component(e, family).unwrap();
        system.destroy_entity(e).unwrap();

        let expected = vec![
            format!("detached {}", family),
            "destroyed".to_owned(),
            "entity".to_owned(),
        ];
        assert_eq!(*log.read().unwrap(), expected);
    }
}
