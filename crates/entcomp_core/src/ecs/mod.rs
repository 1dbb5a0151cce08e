//! # Entity Component System
//!
//! Entities are plain ids. Components are registered by name and carry a
//! default state, optional lifecycle hooks, and optional per-frame systems.
//!
//! ## Design Philosophy
//!
//! - One dense list per component, with an entity-to-index map for lookups
//! - Swap-removal keeps the lists packed; iteration order is not stable
//! - Removals are deferred by default and applied at flush points
//! - Systems run in component registration order

mod component;
mod deferred;
mod entity;
mod registry;
mod scheduler;
mod state;
mod storage;
mod world;

pub use component::{AddHook, ComponentDef, RemoveHook, SystemFn};
pub use deferred::{Removal, RemovalQueue};
pub use entity::{EntityAllocator, EntityId, InstanceId};
pub use registry::{ComponentRegistry, Storage};
pub use scheduler::{Phase, Scheduler};
pub use state::{Instances, State, StateView, StateViewMut, StatesMut, StatesRef, ENTITY_ID_KEY};
pub use storage::{ComponentStore, Owned};
pub use world::{Timing, World};
