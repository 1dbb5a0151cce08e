//! # Entcomp Core
//!
//! A small entity-component-system runtime for game loops:
//! - Named components with JSON-like default state
//! - Regular (one per entity) and multi (many per entity) components
//! - `on_add` / `on_remove` hooks, tick systems and render systems
//! - Deferred removal with deterministic flush points
//!
//! ## Example
//!
//! ```rust,ignore
//! use entcomp_core::{ComponentDef, Timing, World};
//! use serde_json::json;
//!
//! let mut world = World::new();
//! world.register_component(
//!     ComponentDef::new("lifetime")
//!         .with_state(json!({ "left": 3.0 }))
//!         .system(|queue, dt, mut states| {
//!             for state in states.iter_mut() {
//!                 let left = state["left"].as_f64().unwrap_or(0.0) - dt;
//!                 state.set("left", left);
//!                 if left <= 0.0 {
//!                     queue.delete_entity(state.entity());
//!                 }
//!             }
//!         }),
//! )?;
//!
//! let id = world.create_entity_with(&["lifetime"])?;
//! world.tick(1.0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;

pub use config::EcsConfig;
pub use ecs::{
    AddHook, ComponentDef, ComponentRegistry, ComponentStore, EntityAllocator, EntityId, InstanceId,
    Instances, Owned, Phase, RemovalQueue, Removal, RemoveHook, Scheduler, State, StateView,
    StateViewMut, StatesMut, StatesRef, Storage, SystemFn, Timing, World, ENTITY_ID_KEY,
};
pub use error::{EcsError, EcsResult};
