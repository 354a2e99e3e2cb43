//! The freeze barrier and its buffer of deferred structural edits.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use super::component::Component;
use super::id::{ComponentId, EntityId};

/// A structural edit requested while the system was frozen.
pub enum Command {
    CreateEntity(EntityId),
    FinalizeEntity(EntityId),
    DestroyEntity(EntityId),
    CreateComponent {
        id: ComponentId,
        payload: Box<dyn Component>,
        owner: Option<EntityId>,
    },
    AttachComponent(ComponentId, EntityId),
    DetachComponent(ComponentId),
    DestroyComponent(ComponentId),
}

impl Command {
    /// Returns true if this command targets `entity`.
    pub fn touches(&self, entity: EntityId) -> bool {
        match *self {
            Command::CreateEntity(e)
            | Command::FinalizeEntity(e)
            | Command::DestroyEntity(e)
            | Command::AttachComponent(_, e) => e == entity,
            Command::CreateComponent { owner, .. } => owner == Some(entity),
            _ => false,
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Command::CreateEntity(e) => write!(f, "CreateEntity({})", e),
            Command::FinalizeEntity(e) => write!(f, "FinalizeEntity({})", e),
            Command::DestroyEntity(e) => write!(f, "DestroyEntity({})", e),
            Command::CreateComponent { id, owner, .. } => match owner {
                Some(owner) => write!(f, "CreateComponent({} on {})", id, owner),
                None => write!(f, "CreateComponent({})", id),
            },
            Command::AttachComponent(c, e) => write!(f, "AttachComponent({} to {})", c, e),
            Command::DetachComponent(c) => write!(f, "DetachComponent({})", c),
            Command::DestroyComponent(c) => write!(f, "DestroyComponent({})", c),
        }
    }
}

/// Freeze nesting depth, pending commands in request order and the ids handed
/// out by frozen creations that have not been replayed yet.
#[derive(Default)]
pub struct FrozenData {
    depth: usize,
    replaying: bool,
    commands: VecDeque<Command>,
    entities: HashSet<EntityId>,
    components: HashSet<ComponentId>,
}

impl FrozenData {
    /// Structural edits are deferred while any freeze is held or a replay is
    /// running.
    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.depth > 0 || self.replaying
    }

    #[inline]
    pub fn freeze(&mut self) {
        self.depth += 1;
    }

    /// Releases one freeze. Returns `None` if there was nothing to release, and
    /// `Some(true)` if the caller has to replay the buffer.
    pub fn unfreeze(&mut self) -> Option<bool> {
        if self.depth == 0 {
            return None;
        }

        self.depth -= 1;
        if self.depth == 0 && !self.replaying {
            self.replaying = true;
            Some(true)
        } else {
            Some(false)
        }
    }

    /// Takes everything queued so far. Once the buffer is drained the replay
    /// is over.
    pub fn take_batch(&mut self) -> Vec<Command> {
        let batch: Vec<_> = self.commands.drain(..).collect();
        if batch.is_empty() {
            self.replaying = false;
        }

        batch
    }

    #[inline]
    pub fn push(&mut self, cmd: Command) {
        self.commands.push_back(cmd);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn reserve_entity(&mut self, id: EntityId) {
        self.entities.insert(id);
    }

    pub fn reserve_component(&mut self, id: ComponentId) {
        self.components.insert(id);
    }

    #[inline]
    pub fn is_reserved_entity(&self, id: EntityId) -> bool {
        self.entities.contains(&id)
    }

    #[inline]
    pub fn is_reserved_component(&self, id: ComponentId) -> bool {
        self.components.contains(&id)
    }

    pub fn settle_entity(&mut self, id: EntityId) {
        self.entities.remove(&id);
    }

    pub fn settle_component(&mut self, id: ComponentId) {
        self.components.remove(&id);
    }

    /// Returns the owner `component` will have once the queued commands are
    /// replayed, starting from `current`.
    pub fn pending_owner(&self, component: ComponentId, current: Option<EntityId>) -> Option<EntityId> {
        self.commands.iter().fold(current, |owner, cmd| match *cmd {
            Command::CreateComponent { id, owner: v, .. } if id == component => v,
            Command::AttachComponent(c, e) if c == component => Some(e),
            Command::DetachComponent(c) | Command::DestroyComponent(c) if c == component => None,
            _ => owner,
        })
    }

    /// Returns true if `entity` is pending creation or targeted by a queued
    /// command.
    pub fn is_pending(&self, entity: EntityId) -> bool {
        self.entities.contains(&entity) || self.commands.iter().any(|v| v.touches(entity))
    }
}
