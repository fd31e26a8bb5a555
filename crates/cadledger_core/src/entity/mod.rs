//! Entity types and storage.

mod arena;
mod handle;
mod model;
mod store;

pub use handle::EntityHandle;
pub use model::{Entity, EntityKind, EntitySnapshot, EntityState};
pub use store::EntityStore;
