//! # Component Definitions
//!
//! A component is a named kind of per-entity state. Its definition carries
//! the default state and an optional set of callbacks; a missing callback
//! means "do nothing".
//!
//! ```rust,ignore
//! let def = ComponentDef::new("health")
//!     .with_state(json!({ "hp": 100 }))
//!     .on_remove(|queue, entity, _state| queue.delete_entity(entity))
//!     .system(|_queue, _dt, mut states| {
//!         for state in states.iter_mut() {
//!             state.set("hp", state["hp"].as_i64().unwrap_or(0) - 1);
//!         }
//!     });
//! ```

use std::fmt;

use serde_json::{Map, Value};

use super::deferred::RemovalQueue;
use super::entity::EntityId;
use super::state::{State, StatesMut};

/// Called with the freshly stored state after a component is added.
pub type AddHook = Box<dyn Fn(EntityId, &mut State)>;

/// Called once per removed state, after it has been detached from its store.
///
/// The queue lets the hook request further removals; they are applied by the
/// next flush. The queue is all the hook can reach, so it cannot tell whether
/// the store was updated before or after the call.
pub type RemoveHook = Box<dyn Fn(&mut RemovalQueue, EntityId, &State)>;

/// Called once per tick (or render) with the component's dense list.
pub type SystemFn = Box<dyn Fn(&mut RemovalQueue, f64, StatesMut<'_>)>;

/// Definition of a component: name, default state and callbacks.
pub struct ComponentDef {
    pub(crate) name: String,
    pub(crate) default_state: Map<String, Value>,
    /// Set when `with_state` received something other than an object.
    state_error: Option<String>,
    pub(crate) multi: bool,
    pub(crate) on_add: Option<AddHook>,
    pub(crate) on_remove: Option<RemoveHook>,
    pub(crate) system: Option<SystemFn>,
    pub(crate) render_system: Option<SystemFn>,
}

impl ComponentDef {
    /// Creates a definition with an empty default state and no callbacks.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_state: Map::new(),
            state_error: None,
            multi: false,
            on_add: None,
            on_remove: None,
            system: None,
            render_system: None,
        }
    }

    /// Sets the default state. Must be a JSON object (or `null` for empty).
    #[must_use]
    pub fn with_state(mut self, state: Value) -> Self {
        match state {
            Value::Object(map) => {
                self.default_state = map;
                self.state_error = None;
            }
            Value::Null => {
                self.default_state = Map::new();
                self.state_error = None;
            }
            other => self.state_error = Some(format!("expected an object, got {other}")),
        }
        self
    }

    /// Marks the component as multi: an entity may hold many instances.
    #[must_use]
    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    /// Sets the add callback.
    #[must_use]
    pub fn on_add(mut self, hook: impl Fn(EntityId, &mut State) + 'static) -> Self {
        self.on_add = Some(Box::new(hook));
        self
    }

    /// Sets the remove callback.
    #[must_use]
    pub fn on_remove(
        mut self,
        hook: impl Fn(&mut RemovalQueue, EntityId, &State) + 'static,
    ) -> Self {
        self.on_remove = Some(Box::new(hook));
        self
    }

    /// Sets the per-tick system.
    #[must_use]
    pub fn system(mut self, system: impl Fn(&mut RemovalQueue, f64, StatesMut<'_>) + 'static) -> Self {
        self.system = Some(Box::new(system));
        self
    }

    /// Sets the per-render system.
    #[must_use]
    pub fn render_system(
        mut self,
        system: impl Fn(&mut RemovalQueue, f64, StatesMut<'_>) + 'static,
    ) -> Self {
        self.render_system = Some(Box::new(system));
        self
    }

    /// The component name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether entities may hold several instances.
    #[inline]
    #[must_use]
    pub const fn is_multi(&self) -> bool {
        self.multi
    }

    /// The default state every instance starts from.
    #[must_use]
    pub fn default_state(&self) -> &Map<String, Value> {
        &self.default_state
    }

    /// Whether a per-tick system is defined.
    #[inline]
    #[must_use]
    pub fn has_system(&self) -> bool {
        self.system.is_some()
    }

    /// Whether a per-render system is defined.
    #[inline]
    #[must_use]
    pub fn has_render_system(&self) -> bool {
        self.render_system.is_some()
    }

    /// Rejects empty names and non-object default states.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("component name must be a non-empty string".to_string());
        }
        match &self.state_error {
            Some(reason) => Err(format!("default state of component {}: {reason}", self.name)),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ComponentDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDef")
            .field("name", &self.name)
            .field("default_state", &self.default_state)
            .field("multi", &self.multi)
            .field("on_add", &self.on_add.is_some())
            .field("on_remove", &self.on_remove.is_some())
            .field("system", &self.system.is_some())
            .field("render_system", &self.render_system.is_some())
            .finish()
    }
}
