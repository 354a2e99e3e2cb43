use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::errors::*;
use crate::message::registry::RequestRegistry;
use crate::sched::latch::{CountLatch, Latch};
use crate::sched::{unwind, JobQueue};
use crate::settings::SystemParams;

use super::component::{Component, Factory, FamilyInfo, Multiplicity};
use super::events::*;
use super::frozen::{Command, FrozenData};
use super::id::{ComponentFamily, ComponentId, EntityId};
use super::world::World;

/// The `EntitySystem` owns every entity, component, message request and
/// lifecycle listener. All methods take `&self`, so a system can be shared
/// between threads behind an `Arc`.
///
/// Structural edits made while the system is frozen are queued and replayed in
/// request order once the outermost freeze is released. No internal lock is held
/// while user callbacks or event listeners run.
pub struct EntitySystem {
    params: SystemParams,
    pub(crate) world: RwLock<World>,
    pub(crate) frozen: Mutex<FrozenData>,
    pub(crate) requests: RwLock<RequestRegistry>,
    events: RwLock<EventBus>,
    stamp: AtomicU64,
    jobs: Option<JobQueue>,
    construction: Mutex<HashMap<EntityId, Arc<CountLatch>>>,
}

/// RAII guard of a freeze, the matching `unfreeze` happens on drop.
pub struct FrozenScope<'a> {
    system: &'a EntitySystem,
}

impl<'a> Drop for FrozenScope<'a> {
    fn drop(&mut self) {
        if let Err(err) = self.system.unfreeze() {
            warn!("[EntitySystem] {}", err);
        }
    }
}

enum Gate<'a> {
    Frozen(MutexGuard<'a, FrozenData>),
    Open(FrozenScope<'a>),
}

impl Default for EntitySystem {
    fn default() -> Self {
        EntitySystem::with_jobs(SystemParams::default(), None)
    }
}

impl EntitySystem {
    /// Creates a new `EntitySystem`, spawning the worker threads requested by
    /// `params`.
    pub fn new(params: SystemParams) -> Result<Self> {
        let jobs = if params.use_job_queue() {
            Some(JobQueue::new(params.workers)?)
        } else {
            None
        };

        Ok(EntitySystem::with_jobs(params, jobs))
    }

    fn with_jobs(params: SystemParams, jobs: Option<JobQueue>) -> Self {
        info!("[EntitySystem] creates with {:?}.", params);

        EntitySystem {
            world: RwLock::new(World::new(
                params.entity_capacity,
                params.component_capacity,
            )),
            frozen: Mutex::new(FrozenData::default()),
            requests: RwLock::new(RequestRegistry::default()),
            events: RwLock::new(EventBus::default()),
            stamp: AtomicU64::new(0),
            construction: Mutex::new(HashMap::new()),
            params,
            jobs,
        }
    }

    #[inline]
    pub fn params(&self) -> &SystemParams {
        &self.params
    }

    /// Returns the job queue used for threaded template construction.
    #[inline]
    pub fn jobs(&self) -> Option<&JobQueue> {
        self.jobs.as_ref()
    }

    /// Returns the structural stamp, which is bumped by every observable
    /// structural edit.
    #[inline]
    pub fn stamp(&self) -> u64 {
        self.stamp.load(Ordering::SeqCst)
    }

    #[inline]
    fn touch(&self) {
        self.stamp.fetch_add(1, Ordering::SeqCst);
    }
}

impl EntitySystem {
    /// Registers a component type whose instances are built with `T::default()`.
    pub fn register_component<T>(&self, name: &str, multiplicity: Multiplicity) -> Result<ComponentFamily>
    where
        T: Component + Default,
    {
        self.register_component_with::<T, _>(name, multiplicity, T::default)
    }

    /// Registers a component type whose instances are built with `factory`.
    pub fn register_component_with<T, F>(
        &self,
        name: &str,
        multiplicity: Multiplicity,
        factory: F,
    ) -> Result<ComponentFamily>
    where
        T: Component,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move || Box::new(factory()) as Box<dyn Component>);
        self.register::<T>(name, multiplicity, Some(factory))
    }

    /// Registers a component type without factory. Instances can only be added
    /// pre-constructed with `add_component` or `insert_component`.
    pub fn register_component_type<T>(&self, name: &str, multiplicity: Multiplicity) -> Result<ComponentFamily>
    where
        T: Component,
    {
        self.register::<T>(name, multiplicity, None)
    }

    fn register<T: Component>(
        &self,
        name: &str,
        multiplicity: Multiplicity,
        factory: Option<Factory>,
    ) -> Result<ComponentFamily> {
        let info = FamilyInfo {
            name: name.to_owned(),
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            multiplicity,
            factory,
        };

        let (family, fresh) = self.world.write().register(info)?;
        if fresh {
            debug!(
                "[EntitySystem] registers {} ({}) as family {}.",
                name,
                type_name::<T>(),
                family
            );
        }

        Ok(family)
    }

    /// Returns the family assigned to `T`.
    pub fn family<T: Component>(&self) -> Result<ComponentFamily> {
        self.world
            .read()
            .family_of_type(TypeId::of::<T>())
            .ok_or_else(|| Error::TypeUnregistered(type_name::<T>()))
    }

    #[inline]
    pub fn family_by_name(&self, name: &str) -> Option<ComponentFamily> {
        self.world.read().family_by_name(name)
    }

    pub fn family_name(&self, family: ComponentFamily) -> Result<String> {
        Ok(self.world.read().family_info(family)?.name.clone())
    }

    /// Registers a template, which is an ordered list of component families
    /// used by `create_entity_from_template`.
    pub fn register_template(&self, name: &str, families: &[ComponentFamily]) -> Result<()> {
        if self.world.write().register_template(name, families)? {
            debug!("[EntitySystem] registers template {} {:?}.", name, families);
        }

        Ok(())
    }
}

impl EntitySystem {
    /// Enters a freeze, structural edits are deferred until the matching
    /// `unfreeze`. Freezes nest.
    pub fn freeze(&self) {
        self.frozen.lock().freeze();
    }

    /// Leaves a freeze. Releasing the outermost one replays every deferred
    /// edit in the order it was requested.
    pub fn unfreeze(&self) -> Result<()> {
        let replay = self.frozen.lock().unfreeze().ok_or(Error::NotFrozen)?;
        if replay {
            self.replay();
        }

        Ok(())
    }

    /// Freezes the system until the returned scope is dropped.
    pub fn frozen(&self) -> FrozenScope {
        self.freeze();
        FrozenScope { system: self }
    }

    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.frozen.lock().is_frozen()
    }

    /// Returns true if `entity` awaits creation or a queued edit.
    #[inline]
    pub fn is_entity_frozen(&self, entity: EntityId) -> bool {
        self.frozen.lock().is_pending(entity)
    }

    fn replay(&self) {
        loop {
            // Edits requested during a batch land in the buffer, and are
            // replayed by the next round.
            let batch = self.frozen.lock().take_batch();
            if batch.is_empty() {
                return;
            }

            debug!("[EntitySystem] replays {} deferred edits.", batch.len());
            for cmd in batch {
                trace!("[EntitySystem] replays {:?}.", cmd);
                if let Err(err) = self.execute(cmd) {
                    warn!("[EntitySystem] skips deferred edit. {}", err);
                }
            }
        }
    }

    fn execute(&self, cmd: Command) -> Result<()> {
        match cmd {
            Command::CreateEntity(id) => self.apply_create_entity(Some(id)).map(|_| ()),
            Command::FinalizeEntity(id) => self.apply_finalize(id).map(|_| ()),
            Command::DestroyEntity(id) => self.apply_destroy_entity(id),
            Command::CreateComponent { id, payload, owner } => self
                .apply_create_component(Some(id), id.family(), payload, owner)
                .map(|_| ()),
            Command::AttachComponent(c, e) => self.apply_attach(c, e),
            Command::DetachComponent(c) => self.apply_detach(c),
            Command::DestroyComponent(c) => self.apply_destroy_component(c),
        }
    }

    /// Either hands out the frozen buffer to queue an edit, or freezes the
    /// system for the time the edit is applied directly.
    fn gate(&self) -> Gate {
        let mut frozen = self.frozen.lock();
        if frozen.is_frozen() {
            Gate::Frozen(frozen)
        } else {
            frozen.freeze();
            Gate::Open(FrozenScope { system: self })
        }
    }

    fn check_entity(frozen: &FrozenData, world: &World, id: EntityId) -> Result<()> {
        if world.entities.is_alive(id) || frozen.is_reserved_entity(id) {
            Ok(())
        } else {
            Err(Error::EntityHandleInvalid(id))
        }
    }

    fn check_component(frozen: &FrozenData, world: &World, id: ComponentId) -> Result<()> {
        if world.is_component_alive(id) || frozen.is_reserved_component(id) {
            Ok(())
        } else {
            Err(Error::ComponentHandleInvalid(id))
        }
    }

    /// Provisional entities are alive but not finalized, edits on them are
    /// applied immediately and silently.
    fn is_provisional(&self, entity: EntityId) -> bool {
        self.world
            .read()
            .entities
            .get(entity)
            .map(|v| !v.finalized)
            .unwrap_or(false)
    }

    fn is_owned_by_provisional(&self, component: ComponentId) -> bool {
        let world = self.world.read();
        match world.component(component).ok().and_then(|v| v.owner) {
            Some(owner) => !world.is_visible(Some(owner)),
            None => false,
        }
    }
}

impl EntitySystem {
    /// Creates an entity. In threaded mode the entity is provisional until
    /// `finalize_entity` is called, otherwise it is finalized right away.
    ///
    /// While frozen, the returned id only becomes valid once the deferred
    /// creation has been replayed.
    pub fn create_entity(&self) -> Result<EntityId> {
        let entity = self.create_provisional()?;
        if !self.params.threaded {
            self.finalize_entity(entity)?;
        }

        Ok(entity)
    }

    fn create_provisional(&self) -> Result<EntityId> {
        let _scope = match self.gate() {
            Gate::Frozen(mut frozen) => {
                let id = self.world.write().entities.reserve();
                frozen.reserve_entity(id);
                frozen.push(Command::CreateEntity(id));
                return Ok(id);
            }
            Gate::Open(scope) => scope,
        };

        self.apply_create_entity(None)
    }

    /// Creates an entity with one component per family of the template, and
    /// finalizes it.
    pub fn create_entity_from_template(&self, name: &str) -> Result<EntityId> {
        let families = self.world.read().template(name)?;
        let entity = self.create_provisional()?;

        for family in families {
            if let Err(err) = self.create_component(entity, family) {
                if let Err(err) = self.destroy_entity(entity) {
                    warn!("[EntitySystem] {}", err);
                }

                return Err(err);
            }
        }

        self.finalize_entity(entity)?;
        Ok(entity)
    }

    /// Creates a provisional entity and hands the construction of its template
    /// components to the job queue. The entity has to be finalized with
    /// `finalize_entity`, which waits for the construction to complete.
    ///
    /// Without threaded mode this is `create_entity_from_template`, and without
    /// job queue the components are built on the calling thread.
    pub fn spawn_from_template(self: &Arc<Self>, name: &str) -> Result<EntityId> {
        if !self.params.threaded {
            return self.create_entity_from_template(name);
        }

        let families = self.world.read().template(name)?;
        let entity = self.create_provisional()?;

        let jobs = match self.jobs {
            Some(ref jobs) => jobs,
            None => {
                for family in families {
                    self.create_component(entity, family)?;
                }

                return Ok(entity);
            }
        };

        let latch = Arc::new(CountLatch::new());
        self.construction.lock().insert(entity, latch.clone());

        for family in families {
            latch.increment();

            let system = self.clone();
            let latch = latch.clone();
            jobs.submit(move || {
                let result = unwind::halt_unwinding(|| system.create_component(entity, family));
                latch.set();

                match result {
                    Ok(Err(err)) => warn!("[EntitySystem] failed to construct {}. {}", entity, err),
                    Err(_) => warn!("[EntitySystem] construction of {} panicked.", entity),
                    _ => {}
                }
            });
        }

        latch.set();
        trace!("[EntitySystem] spawns {} from template {}.", entity, name);
        Ok(entity)
    }

    /// Publishes a provisional entity: `ComponentCreated` and `ComponentAttached`
    /// are fired for every component in attachment order, then `EntityCreated`.
    /// Returns false if the entity was finalized already.
    pub fn finalize_entity(&self, entity: EntityId) -> Result<bool> {
        let latch = self.construction.lock().remove(&entity);
        if let Some(latch) = latch {
            latch.wait();
        }

        let _scope = match self.gate() {
            Gate::Frozen(mut frozen) => {
                let world = self.world.read();
                return match world.entities.get(entity) {
                    Some(v) if v.finalized => Ok(false),
                    None if !frozen.is_reserved_entity(entity) => {
                        Err(Error::EntityHandleInvalid(entity))
                    }
                    _ => {
                        frozen.push(Command::FinalizeEntity(entity));
                        Ok(true)
                    }
                };
            }
            Gate::Open(scope) => scope,
        };

        self.apply_finalize(entity)
    }

    /// Destroys the entity and every component attached to it.
    pub fn destroy_entity(&self, entity: EntityId) -> Result<()> {
        if self.is_provisional(entity) {
            self.construction.lock().remove(&entity);
            return self.apply_destroy_entity(entity);
        }

        let _scope = match self.gate() {
            Gate::Frozen(mut frozen) => {
                Self::check_entity(&frozen, &self.world.read(), entity)?;
                frozen.push(Command::DestroyEntity(entity));
                return Ok(());
            }
            Gate::Open(scope) => scope,
        };

        self.apply_destroy_entity(entity)
    }

    /// Constructs a component of `family` with its factory, and attaches it to
    /// `entity`.
    pub fn create_component(&self, entity: EntityId, family: ComponentFamily) -> Result<ComponentId> {
        let factory = self.world.read().factory(family)?;
        self.place(Some(entity), family, factory())
    }

    /// Attaches a pre-constructed component to `entity`.
    pub fn add_component<T: Component>(&self, entity: EntityId, value: T) -> Result<ComponentId> {
        let family = self.family::<T>()?;
        self.place(Some(entity), family, Box::new(value))
    }

    /// Constructs a detached component of `family`.
    pub fn create_detached_component(&self, family: ComponentFamily) -> Result<ComponentId> {
        let factory = self.world.read().factory(family)?;
        self.place(None, family, factory())
    }

    /// Stores a pre-constructed component without attaching it.
    pub fn insert_component<T: Component>(&self, value: T) -> Result<ComponentId> {
        let family = self.family::<T>()?;
        self.place(None, family, Box::new(value))
    }

    fn place(
        &self,
        owner: Option<EntityId>,
        family: ComponentFamily,
        payload: Box<dyn Component>,
    ) -> Result<ComponentId> {
        if let Some(entity) = owner {
            if self.is_provisional(entity) {
                return self.apply_create_component(None, family, payload, owner);
            }
        }

        let _scope = match self.gate() {
            Gate::Frozen(mut frozen) => {
                let mut world = self.world.write();
                world.family_info(family)?;
                if let Some(entity) = owner {
                    Self::check_entity(&frozen, &world, entity)?;
                }

                let id = world.pool_mut(family)?.reserve();
                frozen.reserve_component(id);
                frozen.push(Command::CreateComponent { id, payload, owner });
                return Ok(id);
            }
            Gate::Open(scope) => scope,
        };

        self.apply_create_component(None, family, payload, owner)
    }

    /// Attaches a detached component to `entity`.
    pub fn attach_component(&self, component: ComponentId, entity: EntityId) -> Result<()> {
        if self.is_provisional(entity) {
            return self.apply_attach(component, entity);
        }

        let _scope = match self.gate() {
            Gate::Frozen(mut frozen) => {
                {
                    let world = self.world.read();
                    Self::check_component(&frozen, &world, component)?;
                    Self::check_entity(&frozen, &world, entity)?;
                }

                frozen.push(Command::AttachComponent(component, entity));
                return Ok(());
            }
            Gate::Open(scope) => scope,
        };

        self.apply_attach(component, entity)
    }

    /// Detaches a component from its owner, the component stays alive.
    pub fn detach_component(&self, component: ComponentId) -> Result<()> {
        if self.is_owned_by_provisional(component) {
            return self.apply_detach(component);
        }

        let _scope = match self.gate() {
            Gate::Frozen(mut frozen) => {
                Self::check_component(&frozen, &self.world.read(), component)?;
                frozen.push(Command::DetachComponent(component));
                return Ok(());
            }
            Gate::Open(scope) => scope,
        };

        self.apply_detach(component)
    }

    /// Detaches the component if attached, then destroys it. Requests and
    /// listeners owned by the component are removed.
    pub fn destroy_component(&self, component: ComponentId) -> Result<()> {
        if self.is_owned_by_provisional(component) {
            return self.apply_destroy_component(component);
        }

        let _scope = match self.gate() {
            Gate::Frozen(mut frozen) => {
                Self::check_component(&frozen, &self.world.read(), component)?;
                frozen.push(Command::DestroyComponent(component));
                return Ok(());
            }
            Gate::Open(scope) => scope,
        };

        self.apply_destroy_component(component)
    }

    /// Destroys `component`, which must be attached to `entity`.
    /// While frozen, the owner is the one left by the queued edits.
    pub fn remove_component(&self, entity: EntityId, component: ComponentId) -> Result<()> {
        {
            let frozen = self.frozen.lock();
            let world = self.world.read();
            Self::check_entity(&frozen, &world, entity)?;

            let current = match world.component(component) {
                Ok(data) => data.owner,
                Err(_) if frozen.is_reserved_component(component) => None,
                Err(err) => return Err(err),
            };

            if frozen.pending_owner(component, current) != Some(entity) {
                return Err(Error::ComponentHandleInvalid(component));
            }
        }

        self.destroy_component(component)
    }
}

impl EntitySystem {
    fn apply_create_entity(&self, reserved: Option<EntityId>) -> Result<EntityId> {
        let id = match reserved {
            Some(id) => {
                let committed = self.world.write().entities.commit(id);
                self.frozen.lock().settle_entity(id);
                if !committed {
                    return Err(Error::EntityHandleInvalid(id));
                }

                id
            }
            None => self.world.write().entities.create(),
        };

        trace!("[EntitySystem] creates {}.", id);
        Ok(id)
    }

    fn apply_finalize(&self, entity: EntityId) -> Result<bool> {
        let components = {
            let mut world = self.world.write();
            match world.entities.finalize(entity) {
                None => return Err(Error::EntityHandleInvalid(entity)),
                Some(false) => return Ok(false),
                Some(true) => world.entity(entity)?.components.clone(),
            }
        };

        self.touch();
        trace!("[EntitySystem] finalizes {}.", entity);

        for component in components {
            let family = component.family();
            self.emit(&ComponentCreated {
                component,
                family,
                entity: Some(entity),
            });

            self.emit(&ComponentAttached {
                component,
                family,
                entity,
            });
        }

        self.emit(&EntityCreated { entity });
        Ok(true)
    }

    fn apply_destroy_entity(&self, entity: EntityId) -> Result<()> {
        let (components, visible) = {
            let world = self.world.read();
            let data = world.entity(entity)?;
            (data.components.clone(), data.finalized)
        };

        for component in components {
            if let Err(err) = self.apply_destroy_component(component) {
                warn!("[EntitySystem] {}", err);
            }
        }

        let data = self
            .world
            .write()
            .entities
            .destroy(entity)
            .ok_or(Error::EntityHandleInvalid(entity))?;

        // Attached by a construction job after the snapshot above.
        for component in data.components {
            if let Err(err) = self.apply_destroy_component(component) {
                warn!("[EntitySystem] {}", err);
            }
        }

        trace!("[EntitySystem] destroys {}.", entity);
        if visible {
            self.touch();
            self.emit(&EntityDestroyed { entity });
        }

        Ok(())
    }

    fn apply_create_component(
        &self,
        reserved: Option<ComponentId>,
        family: ComponentFamily,
        payload: Box<dyn Component>,
        owner: Option<EntityId>,
    ) -> Result<ComponentId> {
        let placed = {
            let mut world = self.world.write();
            Self::place_component(&mut world, reserved, family, payload, owner)
                .map(|id| (id, world.is_visible(owner)))
        };

        if let Some(id) = reserved {
            self.frozen.lock().settle_component(id);
        }

        let (component, visible) = placed?;
        trace!("[EntitySystem] creates {}.", component);

        if visible {
            self.touch();
            self.emit(&ComponentCreated {
                component,
                family,
                entity: owner,
            });

            if let Some(entity) = owner {
                self.emit(&ComponentAttached {
                    component,
                    family,
                    entity,
                });
            }
        }

        Ok(component)
    }

    fn place_component(
        world: &mut World,
        reserved: Option<ComponentId>,
        family: ComponentFamily,
        payload: Box<dyn Component>,
        owner: Option<EntityId>,
    ) -> Result<ComponentId> {
        let vacancy = match owner {
            Some(entity) => world.check_vacancy(entity, family),
            None => world.family_info(family).map(|_| ()),
        };

        if let Err(err) = vacancy {
            if let Some(id) = reserved {
                world.pool_mut(family)?.release(id);
            }

            return Err(err);
        }

        let pool = world.pool_mut(family)?;
        let id = match reserved {
            Some(id) => {
                if pool.commit(id, payload).is_err() {
                    return Err(Error::ComponentHandleInvalid(id));
                }

                id
            }
            None => pool.create(payload),
        };

        if let Some(entity) = owner {
            world.attach(id, entity)?;
        }

        Ok(id)
    }

    fn apply_attach(&self, component: ComponentId, entity: EntityId) -> Result<()> {
        let visible = {
            let mut world = self.world.write();
            world.attach(component, entity)?;
            world.is_visible(Some(entity))
        };

        trace!("[EntitySystem] attaches {} to {}.", component, entity);
        if visible {
            self.touch();
            self.emit(&ComponentAttached {
                component,
                family: component.family(),
                entity,
            });
        }

        Ok(())
    }

    fn apply_detach(&self, component: ComponentId) -> Result<()> {
        let (owner, visible) = {
            let mut world = self.world.write();
            let visible = world.is_visible(world.component(component)?.owner);
            (world.detach(component)?, visible)
        };

        if let Some(entity) = owner {
            trace!("[EntitySystem] detaches {} from {}.", component, entity);
            if visible {
                self.touch();
                self.emit(&ComponentDetached {
                    component,
                    family: component.family(),
                    entity,
                });
            }
        }

        Ok(())
    }

    fn apply_destroy_component(&self, component: ComponentId) -> Result<()> {
        let family = component.family();
        let (owner, visible) = {
            let mut world = self.world.write();
            let visible = world.is_visible(world.component(component)?.owner);
            (world.detach(component)?, visible)
        };

        if visible {
            if let Some(entity) = owner {
                self.touch();
                self.emit(&ComponentDetached {
                    component,
                    family,
                    entity,
                });
            }
        }

        let payload = self
            .world
            .write()
            .pool_mut(family)?
            .destroy(component)
            .ok_or(Error::ComponentHandleInvalid(component))?;

        // The payload may own arbitrary resources, drop it unlocked.
        drop(payload);

        let removed = self.requests.write().remove_owned_by(component);
        if removed > 0 {
            debug!(
                "[EntitySystem] removes {} requests owned by {}.",
                removed, component
            );
        }

        let removed = self.events.write().unsubscribe_owned_by(component);
        if removed > 0 {
            debug!(
                "[EntitySystem] removes {} listeners owned by {}.",
                removed, component
            );
        }

        trace!("[EntitySystem] destroys {}.", component);
        if visible {
            self.touch();
            self.emit(&ComponentDestroyed { component, family });
        }

        Ok(())
    }
}

impl EntitySystem {
    /// Returns true if `entity` is alive, provisional entities included.
    #[inline]
    pub fn is_entity_valid(&self, entity: EntityId) -> bool {
        self.world.read().entities.is_alive(entity)
    }

    #[inline]
    pub fn is_component_valid(&self, component: ComponentId) -> bool {
        self.world.read().is_component_alive(component)
    }

    #[inline]
    pub fn is_finalized(&self, entity: EntityId) -> bool {
        self.world
            .read()
            .entities
            .get(entity)
            .map(|v| v.finalized)
            .unwrap_or(false)
    }

    /// Returns the number of finalized entities.
    #[inline]
    pub fn num_entities(&self) -> usize {
        self.world.read().entities.num_finalized()
    }

    /// Returns the number of live components.
    #[inline]
    pub fn num_components(&self) -> usize {
        self.world.read().num_components()
    }

    /// Returns the number of entity slots ever allocated, alive or free.
    #[inline]
    pub fn entity_slots(&self) -> usize {
        self.world.read().entities.slots()
    }

    pub fn component_slots(&self, family: ComponentFamily) -> Result<usize> {
        Ok(self.world.read().pool(family)?.slots())
    }

    /// Returns the components attached to `entity`, in attachment order.
    pub fn components_on_entity(&self, entity: EntityId) -> Result<Vec<ComponentId>> {
        Ok(self.world.read().finalized(entity)?.components.to_vec())
    }

    pub fn components_of_family(&self, entity: EntityId, family: ComponentFamily) -> Result<Vec<ComponentId>> {
        let world = self.world.read();
        world.family_info(family)?;
        Ok(world.finalized(entity)?.of_family(family).collect())
    }

    /// Returns the first component of type `T` attached to `entity`.
    pub fn component_of<T: Component>(&self, entity: EntityId) -> Result<Option<ComponentId>> {
        let family = self.family::<T>()?;
        Ok(self.world.read().finalized(entity)?.of_family(family).next())
    }

    pub fn owner_of(&self, component: ComponentId) -> Result<Option<EntityId>> {
        Ok(self.world.read().component(component)?.owner)
    }

    /// Calls `func` with the payload of `component`. The system is locked for
    /// reading meanwhile, so `func` must not edit the system.
    pub fn with_component<T, F, R>(&self, component: ComponentId, func: F) -> Result<R>
    where
        T: Component,
        F: FnOnce(&T) -> R,
    {
        let world = self.world.read();
        let v = world
            .component(component)?
            .downcast_ref::<T>()
            .ok_or_else(|| Error::TypeMismatch(component, type_name::<T>()))?;

        Ok(func(v))
    }

    /// Calls `func` with the mutable payload of `component`. The system is
    /// locked meanwhile, so `func` must not call back into it.
    pub fn with_component_mut<T, F, R>(&self, component: ComponentId, func: F) -> Result<R>
    where
        T: Component,
        F: FnOnce(&mut T) -> R,
    {
        let mut world = self.world.write();
        let v = world
            .component_mut(component)?
            .downcast_mut::<T>()
            .ok_or_else(|| Error::TypeMismatch(component, type_name::<T>()))?;

        Ok(func(v))
    }

    pub fn describe_component(&self, component: ComponentId) -> Result<String> {
        Ok(self.world.read().component(component)?.payload.describe())
    }
}

impl EntitySystem {
    /// Subscribes `handler` to events of type `E`.
    pub fn subscribe<E, F>(&self, handler: F) -> ListenerId
    where
        E: Event,
        F: Fn(&EntitySystem, &E) + Send + Sync + 'static,
    {
        self.events.write().subscribe::<E, F>(handler)
    }

    /// Subscribes `handler` on behalf of the component `owner`. The listener is
    /// unsubscribed when the owner is destroyed, before `ComponentDestroyed`
    /// is emitted.
    pub fn subscribe_owned<E, F>(&self, owner: ComponentId, handler: F) -> Result<ListenerId>
    where
        E: Event,
        F: Fn(&EntitySystem, &E) + Send + Sync + 'static,
    {
        if !self.is_component_valid(owner) {
            return Err(Error::ComponentHandleInvalid(owner));
        }

        Ok(self.events.write().subscribe_owned::<E, F>(owner, handler))
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.events.write().unsubscribe(id)
    }

    /// Emits `event` to its listeners in subscription order. Listeners run
    /// frozen.
    pub fn emit<E: Event>(&self, event: &E) {
        let listeners = self.events.read().snapshot::<E>();
        if listeners.is_empty() {
            return;
        }

        let _scope = self.frozen();
        for v in listeners {
            v(self, event as &dyn Any);
        }
    }
}
