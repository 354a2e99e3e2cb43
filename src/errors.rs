use crate::ecs::{ComponentFamily, ComponentId, EntityId};
use crate::message::{MessageId, RequestId};

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "{} is invalid.", _0)]
    EntityHandleInvalid(EntityId),
    #[fail(display = "{} is invalid.", _0)]
    ComponentHandleInvalid(ComponentId),
    #[fail(display = "{} is invalid.", _0)]
    RequestHandleInvalid(RequestId),
    #[fail(display = "Component family {} is not registered.", _0)]
    FamilyInvalid(ComponentFamily),
    #[fail(display = "Component type {} is not registered.", _0)]
    TypeUnregistered(&'static str),
    #[fail(display = "{} has been registered with different parameters.", _0)]
    DuplicateRegistration(String),
    #[fail(display = "{} is not issued by this system.", _0)]
    UnknownMessage(MessageId),
    #[fail(display = "{} has not been finalized.", _0)]
    NotFinalized(EntityId),
    #[fail(display = "Template {} is not registered.", _0)]
    UnknownTemplate(String),
    #[fail(display = "Component family {} has no factory.", _0)]
    NoFactory(ComponentFamily),
    #[fail(display = "{} already holds a component of family {}.", _0, _1)]
    FamilyOccupied(EntityId, ComponentFamily),
    #[fail(display = "All 256 component families have been assigned.")]
    FamiliesExhausted,
    #[fail(display = "{} is already attached to {}.", _0, _1)]
    ComponentAttached(ComponentId, EntityId),
    #[fail(display = "{} is not a {}.", _0, _1)]
    TypeMismatch(ComponentId, &'static str),
    #[fail(display = "The view has been invalidated by a structural edit.")]
    StaleView,
    #[fail(display = "Unfreeze without a matching freeze.")]
    NotFrozen,
    #[fail(display = "Subscriber {} failed: {}", _0, _1)]
    Subscriber(RequestId, failure::Error),
    #[fail(display = "Malformed settings: {}", _0)]
    Settings(String),
    #[fail(display = "Failed to spawn worker thread: {}", _0)]
    WorkerSpawn(String),
}

pub type Result<T> = ::std::result::Result<T, Error>;

impl Error {
    /// Returns true if this error was caused by a stale or unknown identifier.
    pub fn is_invalid_handle(&self) -> bool {
        match *self {
            Error::EntityHandleInvalid(_)
            | Error::ComponentHandleInvalid(_)
            | Error::RequestHandleInvalid(_)
            | Error::FamilyInvalid(_) => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Settings(err.to_string())
    }
}
