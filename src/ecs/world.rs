use std::any::TypeId;
use std::collections::HashMap;

use crate::errors::*;

use super::component::{ComponentData, ComponentPool, Factory, FamilyInfo, Multiplicity};
use super::entity::{EntityData, EntityTable};
use super::id::{ComponentFamily, ComponentId, EntityId};

const MAX_FAMILIES: usize = 256;

/// The `World` struct contains all the data, which is entities, their
/// components and the registered component families and templates.
pub struct World {
    pub entities: EntityTable,
    pools: Vec<ComponentPool>,
    families: Vec<FamilyInfo>,
    by_name: HashMap<String, ComponentFamily>,
    by_type: HashMap<TypeId, ComponentFamily>,
    templates: HashMap<String, Vec<ComponentFamily>>,
    component_capacity: usize,
}

impl World {
    /// Constructs a new empty `World`.
    pub fn new(entity_capacity: usize, component_capacity: usize) -> Self {
        World {
            entities: EntityTable::new(entity_capacity),
            pools: Vec::new(),
            families: Vec::new(),
            by_name: HashMap::new(),
            by_type: HashMap::new(),
            templates: HashMap::new(),
            component_capacity,
        }
    }

    /// Registers a new component family. Registering the same name with the
    /// same type and multiplicity again returns the existing family.
    pub fn register(&mut self, info: FamilyInfo) -> Result<(ComponentFamily, bool)> {
        if let Some(&family) = self.by_name.get(&info.name) {
            let v = &self.families[family as usize];
            if v.type_id == info.type_id && v.multiplicity == info.multiplicity {
                return Ok((family, false));
            }

            return Err(Error::DuplicateRegistration(info.name));
        }

        if self.by_type.contains_key(&info.type_id) {
            return Err(Error::DuplicateRegistration(info.name));
        }

        if self.families.len() >= MAX_FAMILIES {
            return Err(Error::FamiliesExhausted);
        }

        let family = self.families.len() as ComponentFamily;
        self.by_name.insert(info.name.clone(), family);
        self.by_type.insert(info.type_id, family);
        self.pools
            .push(ComponentPool::new(family, self.component_capacity));
        self.families.push(info);
        Ok((family, true))
    }

    #[inline]
    pub fn family_info(&self, family: ComponentFamily) -> Result<&FamilyInfo> {
        self.families
            .get(family as usize)
            .ok_or(Error::FamilyInvalid(family))
    }

    #[inline]
    pub fn family_of_type(&self, tid: TypeId) -> Option<ComponentFamily> {
        self.by_type.get(&tid).cloned()
    }

    #[inline]
    pub fn family_by_name(&self, name: &str) -> Option<ComponentFamily> {
        self.by_name.get(name).cloned()
    }

    #[inline]
    pub fn factory(&self, family: ComponentFamily) -> Result<Factory> {
        self.family_info(family)?
            .factory
            .clone()
            .ok_or(Error::NoFactory(family))
    }

    #[inline]
    pub fn pool(&self, family: ComponentFamily) -> Result<&ComponentPool> {
        self.pools
            .get(family as usize)
            .ok_or(Error::FamilyInvalid(family))
    }

    #[inline]
    pub fn pool_mut(&mut self, family: ComponentFamily) -> Result<&mut ComponentPool> {
        self.pools
            .get_mut(family as usize)
            .ok_or(Error::FamilyInvalid(family))
    }

    /// Stores the expansion list of a template.
    pub fn register_template(&mut self, name: &str, families: &[ComponentFamily]) -> Result<bool> {
        for &v in families {
            self.family_info(v)?;
        }

        if let Some(v) = self.templates.get(name) {
            return if v.as_slice() == families {
                Ok(false)
            } else {
                Err(Error::DuplicateRegistration(name.to_owned()))
            };
        }

        self.templates.insert(name.to_owned(), families.to_vec());
        Ok(true)
    }

    pub fn template(&self, name: &str) -> Result<Vec<ComponentFamily>> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownTemplate(name.to_owned()))
    }

    #[inline]
    pub fn entity(&self, id: EntityId) -> Result<&EntityData> {
        self.entities.get(id).ok_or(Error::EntityHandleInvalid(id))
    }

    #[inline]
    pub fn entity_mut(&mut self, id: EntityId) -> Result<&mut EntityData> {
        self.entities
            .get_mut(id)
            .ok_or(Error::EntityHandleInvalid(id))
    }

    /// Returns the entity only if it has been finalized.
    pub fn finalized(&self, id: EntityId) -> Result<&EntityData> {
        let data = self.entity(id)?;
        if data.finalized {
            Ok(data)
        } else {
            Err(Error::NotFinalized(id))
        }
    }

    #[inline]
    pub fn component(&self, id: ComponentId) -> Result<&ComponentData> {
        self.pools
            .get(id.family() as usize)
            .and_then(|v| v.get(id))
            .ok_or(Error::ComponentHandleInvalid(id))
    }

    #[inline]
    pub fn component_mut(&mut self, id: ComponentId) -> Result<&mut ComponentData> {
        self.pools
            .get_mut(id.family() as usize)
            .and_then(|v| v.get_mut(id))
            .ok_or(Error::ComponentHandleInvalid(id))
    }

    #[inline]
    pub fn is_component_alive(&self, id: ComponentId) -> bool {
        self.component(id).is_ok()
    }

    /// Returns true if events concerning `owner`'s components are observable,
    /// which is the case for detached components and finalized owners.
    pub fn is_visible(&self, owner: Option<EntityId>) -> bool {
        match owner {
            Some(e) => self.entities.get(e).map(|v| v.finalized).unwrap_or(false),
            None => true,
        }
    }

    /// Checks that `entity` can accept one more component of `family`.
    pub fn check_vacancy(&self, entity: EntityId, family: ComponentFamily) -> Result<()> {
        let info = self.family_info(family)?;
        let data = self.entity(entity)?;
        if info.multiplicity == Multiplicity::Single && data.has_family(family) {
            return Err(Error::FamilyOccupied(entity, family));
        }

        Ok(())
    }

    /// Attaches a live and detached component to `entity`.
    pub fn attach(&mut self, id: ComponentId, entity: EntityId) -> Result<()> {
        if let Some(owner) = self.component(id)?.owner {
            return Err(Error::ComponentAttached(id, owner));
        }

        self.check_vacancy(entity, id.family())?;
        self.pool_mut(id.family())?.attach(id, entity);
        self.entity_mut(entity)?.components.push(id);
        Ok(())
    }

    /// Detaches a live component, returns the previous owner if any.
    pub fn detach(&mut self, id: ComponentId) -> Result<Option<EntityId>> {
        self.component(id)?;
        let owner = self.pool_mut(id.family())?.detach(id);
        if let Some(owner) = owner {
            if let Some(data) = self.entities.get_mut(owner) {
                data.remove(id);
            }
        }

        Ok(owner)
    }

    pub fn num_components(&self) -> usize {
        self.pools.iter().map(|v| v.len()).sum()
    }
}

#[cfg(test)]
mod test {
    use super::super::component::Component;
    use super::*;

    struct Position;
    impl Component for Position {}

    struct Velocity;
    impl Component for Velocity {}

    fn info<T: Component>(name: &str, multiplicity: Multiplicity) -> FamilyInfo {
        FamilyInfo {
            name: name.to_owned(),
            type_id: TypeId::of::<T>(),
            type_name: ::std::any::type_name::<T>(),
            multiplicity,
            factory: None,
        }
    }

    #[test]
    fn registration() {
        let mut world = World::new(0, 0);
        let (p, fresh) = world.register(info::<Position>("position", Multiplicity::Single)).unwrap();
        assert_eq!(p, 0);
        assert!(fresh);

        let (p2, fresh) = world.register(info::<Position>("position", Multiplicity::Single)).unwrap();
        assert_eq!(p2, p);
        assert!(!fresh);

        assert!(world.register(info::<Position>("position", Multiplicity::Multiple)).is_err());
        assert!(world.register(info::<Position>("pos", Multiplicity::Single)).is_err());
        assert!(world.register(info::<Velocity>("position", Multiplicity::Single)).is_err());

        let (v, _) = world.register(info::<Velocity>("velocity", Multiplicity::Multiple)).unwrap();
        assert_eq!(v, 1);
        assert_eq!(world.family_by_name("velocity"), Some(1));
        assert!(world.factory(v).is_err());
    }

    #[test]
    fn vacancy() {
        let mut world = World::new(0, 0);
        let (p, _) = world.register(info::<Position>("position", Multiplicity::Single)).unwrap();
        let (v, _) = world.register(info::<Velocity>("velocity", Multiplicity::Multiple)).unwrap();

        let e = world.entities.create();
        let c1 = world.pool_mut(p).unwrap().create(Box::new(Position));
        let c2 = world.pool_mut(p).unwrap().create(Box::new(Position));
        world.attach(c1, e).unwrap();

        match world.attach(c1, e) {
            Err(Error::ComponentAttached(_, owner)) => assert_eq!(owner, e),
            _ => panic!(),
        }

        match world.attach(c2, e) {
            Err(Error::FamilyOccupied(_, family)) => assert_eq!(family, p),
            _ => panic!(),
        }

        for _ in 0..3 {
            let c = world.pool_mut(v).unwrap().create(Box::new(Velocity));
            world.attach(c, e).unwrap();
        }

        assert_eq!(world.entity(e).unwrap().components.len(), 4);
        assert_eq!(world.detach(c1).unwrap(), Some(e));
        assert_eq!(world.detach(c1).unwrap(), None);
        assert_eq!(world.entity(e).unwrap().components.len(), 3);
    }
}
