//! # ECS World
//!
//! The host-facing manager: entity ids, component registration, component
//! add/remove, state access, and the tick/render loop.
//!
//! ## Flush points
//!
//! Deferred removals are applied by [`World::flush_all`], which runs:
//! - at the start and end of every [`tick`](World::tick) and
//!   [`render`](World::render)
//! - whenever the host calls [`flush_pending`](World::flush_pending)
//!
//! The first removal queued outside a frame arms a pending-flush flag and
//! calls the host's flush hook, once, so removals requested between frames
//! are not stranded.

use std::panic::{self, AssertUnwindSafe};

use serde_json::Value;

use super::component::ComponentDef;
use super::deferred::{Removal, RemovalQueue};
use super::entity::{EntityAllocator, EntityId, InstanceId};
use super::registry::ComponentRegistry;
use super::scheduler::{Phase, Scheduler};
use super::state::{State, StateView, StateViewMut, StatesMut, StatesRef};
use crate::config::EcsConfig;
use crate::error::{EcsError, EcsResult};

/// When a removal takes effect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Timing {
    /// Queue it for the next flush.
    #[default]
    Deferred,
    /// Apply it before returning.
    Immediate,
}

/// The ECS World - container for all entity state.
///
/// Single-threaded: hooks and systems run synchronously on the caller's
/// stack.
///
/// # Example
///
/// ```rust,ignore
/// let mut world = World::new();
/// world.register_component(ComponentDef::new("foo").with_state(json!({ "num": 1 })))?;
///
/// let id = world.create_entity_with(&["foo"])?;
/// world.delete_entity(id, Timing::Deferred);
/// world.tick(16.0); // removal happens here
/// ```
pub struct World {
    config: EcsConfig,
    entities: EntityAllocator,
    registry: ComponentRegistry,
    scheduler: Scheduler,
    queue: RemovalQueue,
    /// Set while a tick or render is running; its closing flush covers
    /// anything queued meanwhile.
    in_frame: bool,
    flush_pending: bool,
    flush_hook: Option<Box<dyn FnMut()>>,
}

impl World {
    /// Creates a world with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EcsConfig::default())
    }

    /// Creates a world with the given configuration.
    #[must_use]
    pub fn with_config(config: EcsConfig) -> Self {
        Self {
            entities: EntityAllocator::new(config.first_entity_id),
            registry: ComponentRegistry::new(config.store_capacity),
            scheduler: Scheduler::new(),
            queue: RemovalQueue::new(),
            in_frame: false,
            flush_pending: false,
            flush_hook: None,
            config,
        }
    }

    /// The active configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EcsConfig {
        &self.config
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a component, returning its name.
    ///
    /// Systems and render systems join the execution order at the end.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidDefinition`] or [`EcsError::DuplicateComponent`].
    pub fn register_component(&mut self, def: ComponentDef) -> EcsResult<String> {
        let (system, render_system) = (def.has_system(), def.has_render_system());
        let name = self.registry.register(def)?;
        self.scheduler.register(&name, system, render_system);
        tracing::debug!(component = %name, system, render_system, "registered component");
        Ok(name)
    }

    /// Unregisters a component.
    ///
    /// Every entity holding it loses it immediately, firing `on_remove`,
    /// before the store is dropped.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] if the name is not registered.
    pub fn unregister_component(&mut self, name: &str) -> EcsResult<()> {
        let removed = self.registry.clear_component(name, &mut self.queue)?;
        self.registry.unregister(name)?;
        self.scheduler.unregister(name);
        tracing::debug!(component = %name, removed, "unregistered component");
        self.arm_flush();
        Ok(())
    }

    /// Looks up a registered definition.
    #[must_use]
    pub fn component(&self, name: &str) -> Option<&ComponentDef> {
        self.registry.def(name).ok()
    }

    /// Registered definitions in registration order.
    pub fn components(&self) -> impl Iterator<Item = &ComponentDef> {
        self.registry.defs()
    }

    /// The component registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates a new entity id.
    pub fn create_entity(&mut self) -> EntityId {
        self.entities.allocate()
    }

    /// Creates an entity holding the named components, with default state.
    ///
    /// All names are checked before the id is allocated.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] for an unregistered name, or
    /// [`EcsError::DuplicateAdd`] if a regular component is listed twice.
    pub fn create_entity_with(&mut self, names: &[&str]) -> EcsResult<EntityId> {
        for (i, name) in names.iter().enumerate() {
            let def = self.registry.def(name)?;
            if !def.is_multi() && names[..i].contains(name) {
                return Err(EcsError::DuplicateAdd {
                    entity: self.entities.peek(),
                    component: (*name).to_string(),
                });
            }
        }

        let entity = self.entities.allocate();
        for name in names {
            self.insert_state(entity, name, None)?;
        }
        Ok(entity)
    }

    /// Removes every component from an entity. Never fails.
    ///
    /// Deferred deletion is the default because entities tend to delete
    /// themselves from inside hooks and systems.
    pub fn delete_entity(&mut self, entity: EntityId, timing: Timing) {
        match timing {
            Timing::Deferred => {
                self.queue.delete_entity(entity);
            }
            Timing::Immediate => {
                let removed = self.registry.remove_entity_now(entity, &mut self.queue);
                tracing::trace!(%entity, removed, "deleted entity");
            }
        }
        self.arm_flush();
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Adds a component with its default state.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`], or [`EcsError::DuplicateAdd`] if a
    /// regular component is already present.
    pub fn add_component(&mut self, entity: EntityId, name: &str) -> EcsResult<()> {
        self.insert_state(entity, name, None)
    }

    /// Adds a component, overlaying `overrides` on its default state.
    ///
    /// An `entityId` key in `overrides` is ignored.
    ///
    /// # Errors
    ///
    /// As [`add_component`](Self::add_component), plus
    /// [`EcsError::InvalidState`] if `overrides` is neither an object nor null.
    pub fn add_component_with(&mut self, entity: EntityId, name: &str, overrides: Value) -> EcsResult<()> {
        match overrides {
            Value::Object(map) => self.insert_state(entity, name, Some(&map)),
            Value::Null => self.insert_state(entity, name, None),
            other => Err(EcsError::InvalidState {
                component: name.to_string(),
                reason: format!("expected an object, got {other}"),
            }),
        }
    }

    fn insert_state(
        &mut self,
        entity: EntityId,
        name: &str,
        overrides: Option<&serde_json::Map<String, Value>>,
    ) -> EcsResult<()> {
        self.registry.def(name)?;
        if self.config.flush_on_readd && self.queue.is_pending(entity, name) {
            // The stale removal must not clobber the new state.
            self.flush_all();
        }

        let def = self.registry.def(name)?;
        if !def.is_multi() && self.registry.storage(name)?.has(entity) {
            return Err(EcsError::DuplicateAdd {
                entity,
                component: name.to_string(),
            });
        }

        let state = State::build(entity, self.entities.allocate_instance(), def.default_state(), overrides);
        self.registry.insert(name, state)
    }

    /// Removes a component from an entity.
    ///
    /// Idempotent: removing a component the entity does not hold is a
    /// silent no-op. With [`EcsConfig::strict_removal`] set, an absent
    /// regular component whose removal is not already queued raises
    /// `NotPresent` instead. Immediate removal fires `on_remove` once per
    /// instance before returning.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`], or [`EcsError::NotPresent`] in strict
    /// mode.
    pub fn remove_component(&mut self, entity: EntityId, name: &str, timing: Timing) -> EcsResult<()> {
        let def = self.registry.def(name)?;
        if !self.registry.storage(name)?.has(entity) {
            if def.is_multi() || !self.config.strict_removal || self.queue.is_pending(entity, name) {
                return Ok(());
            }
            return Err(EcsError::NotPresent {
                entity,
                component: name.to_string(),
            });
        }

        match timing {
            Timing::Deferred => {
                self.queue.remove_component(entity, name);
            }
            Timing::Immediate => {
                self.registry.remove_now(entity, name, &mut self.queue)?;
            }
        }
        self.arm_flush();
        Ok(())
    }

    /// Queues removal of a component regardless of presence.
    ///
    /// For use while the component's dense list is being iterated.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] if the name is not registered.
    pub fn remove_component_later(&mut self, entity: EntityId, name: &str) -> EcsResult<()> {
        self.registry.def(name)?;
        self.queue.remove_component(entity, name);
        self.arm_flush();
        Ok(())
    }

    /// Removes one instance of a multi component, addressed by its index in
    /// the entity's current instance array.
    ///
    /// The index is resolved when this is called. A deferred removal then
    /// targets that exact instance, even if the array is reshuffled by other
    /// adds or removals before the flush; if that instance is gone by then,
    /// the removal does nothing.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`], [`EcsError::NotMulti`], or
    /// [`EcsError::InvalidIndex`] if the entity has no instance at `index`.
    pub fn remove_component_instance(
        &mut self,
        entity: EntityId,
        name: &str,
        index: usize,
        timing: Timing,
    ) -> EcsResult<()> {
        if !self.registry.def(name)?.is_multi() {
            return Err(EcsError::NotMulti(name.to_string()));
        }
        let instance = self
            .registry
            .storage(name)?
            .get(entity)
            .and_then(StateView::as_many)
            .and_then(|states| states.get(index))
            .map(State::instance)
            .ok_or_else(|| EcsError::InvalidIndex {
                entity,
                component: name.to_string(),
                index,
            })?;

        match timing {
            Timing::Deferred => {
                self.queue.remove_instance(entity, name, instance);
            }
            Timing::Immediate => {
                self.registry.remove_instance_now(entity, name, instance, &mut self.queue)?;
            }
        }
        self.arm_flush();
        Ok(())
    }

    /// Checks if an entity holds a component.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] if the name is not registered.
    pub fn has_component(&self, entity: EntityId, name: &str) -> EcsResult<bool> {
        Ok(self.registry.storage(name)?.has(entity))
    }

    // =========================================================================
    // State access
    // =========================================================================

    /// Gets an entity's state, or `None` if it does not hold the component.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] if the name is not registered.
    pub fn get_state(&self, entity: EntityId, name: &str) -> EcsResult<Option<StateView<'_>>> {
        Ok(self.registry.storage(name)?.get(entity))
    }

    /// Gets an entity's state mutably.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] if the name is not registered.
    pub fn get_state_mut(&mut self, entity: EntityId, name: &str) -> EcsResult<Option<StateViewMut<'_>>> {
        Ok(self.registry.storage_mut(name)?.get_mut(entity))
    }

    /// The dense list of every state of a component.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] if the name is not registered.
    pub fn states_list(&self, name: &str) -> EcsResult<StatesRef<'_>> {
        Ok(self.registry.storage(name)?.states())
    }

    /// The live dense list, mutably. Edits are seen by the next system run.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] if the name is not registered.
    pub fn states_list_mut(&mut self, name: &str) -> EcsResult<StatesMut<'_>> {
        Ok(self.registry.storage_mut(name)?.states_mut())
    }

    /// Returns a lookup bound to one component's store, skipping the name
    /// lookup on every call.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] if the name is not registered.
    pub fn state_accessor<'a>(
        &'a self,
        name: &str,
    ) -> EcsResult<impl Fn(EntityId) -> Option<StateView<'a>> + 'a> {
        let storage = self.registry.storage(name)?;
        Ok(move |entity| storage.get(entity))
    }

    /// Returns a membership test bound to one component's store.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] if the name is not registered.
    pub fn component_accessor<'a>(&'a self, name: &str) -> EcsResult<impl Fn(EntityId) -> bool + 'a> {
        let storage = self.registry.storage(name)?;
        Ok(move |entity| storage.has(entity))
    }

    // =========================================================================
    // Frame driving
    // =========================================================================

    /// Runs every system in registration order, flushing removals before
    /// and after.
    pub fn tick(&mut self, dt: f64) {
        self.run_phase(Phase::Tick, dt);
    }

    /// Runs every render system in registration order, flushing removals
    /// before and after.
    pub fn render(&mut self, dt: f64) {
        self.run_phase(Phase::Render, dt);
    }

    /// Runs one frame. `in_frame` is cleared even if a host callback
    /// panics, so removals queued afterwards still arm the flush trigger.
    fn run_phase(&mut self, phase: Phase, dt: f64) {
        self.in_frame = true;
        let frame = panic::catch_unwind(AssertUnwindSafe(|| self.run_frame(phase, dt)));
        self.in_frame = false;

        if let Err(payload) = frame {
            // Whatever the aborted frame left queued must not be stranded.
            self.arm_flush();
            panic::resume_unwind(payload);
        }
    }

    fn run_frame(&mut self, phase: Phase, dt: f64) {
        self.flush_all();

        for name in self.scheduler.order(phase) {
            // Names in the order are always registered.
            if let Err(err) = self.registry.run_system(name, phase, dt, &mut self.queue) {
                tracing::warn!(component = %name, %err, "skipped system");
            }
        }

        self.flush_all();
    }

    /// Applies every queued removal.
    ///
    /// Instance removals go first, then component removals, then entity
    /// deletions. Removals queued by hooks during the flush are applied by
    /// the same flush. Targets that are already gone are skipped, so each
    /// `on_remove` fires at most once per state.
    pub fn flush_all(&mut self) {
        let mut applied = 0usize;
        while let Some(removal) = self.queue.pop_next() {
            applied += self.apply(removal);
        }
        self.flush_pending = false;

        if applied > 0 {
            tracing::debug!(applied, "flushed deferred removals");
        }
    }

    /// Applies one queued removal through the immediate path. Returns the
    /// number of states removed.
    fn apply(&mut self, removal: Removal) -> usize {
        let result = match removal {
            Removal::Instance {
                entity,
                component,
                instance,
            } => self.apply_instance(entity, &component, instance),
            Removal::Component { entity, component } => self
                .registry
                .remove_now(entity, &component, &mut self.queue)
                .map_err(|err| (component, err)),
            Removal::Entity(entity) => Ok(self.registry.remove_entity_now(entity, &mut self.queue)),
        };

        match result {
            Ok(removed) => removed,
            Err((component, err)) => {
                tracing::warn!(%component, %err, "dropped queued removal");
                0
            }
        }
    }

    fn apply_instance(
        &mut self,
        entity: EntityId,
        component: &str,
        instance: InstanceId,
    ) -> Result<usize, (String, EcsError)> {
        self.registry
            .remove_instance_now(entity, component, instance, &mut self.queue)
            .map(usize::from)
            .map_err(|err| (component.to_string(), err))
    }

    /// Flushes if a flush was armed outside a frame. Returns whether it ran.
    pub fn flush_pending(&mut self) -> bool {
        if !self.flush_pending {
            return false;
        }
        self.flush_all();
        true
    }

    /// Whether removals are waiting for a [`flush_pending`](Self::flush_pending).
    #[inline]
    #[must_use]
    pub fn is_flush_pending(&self) -> bool {
        self.flush_pending
    }

    /// Number of queued removals.
    #[inline]
    #[must_use]
    pub fn pending_removals(&self) -> usize {
        self.queue.len()
    }

    /// Installs the hook called when a flush gets armed.
    ///
    /// The hook only signals; the host answers by calling
    /// [`flush_pending`](Self::flush_pending) from its own loop.
    pub fn set_flush_hook(&mut self, hook: impl FnMut() + 'static) {
        self.flush_hook = Some(Box::new(hook));
    }

    fn arm_flush(&mut self) {
        if self.in_frame || self.flush_pending || self.queue.is_empty() {
            return;
        }
        self.flush_pending = true;
        tracing::trace!(pending = self.queue.len(), "armed deferred flush");
        if let Some(hook) = self.flush_hook.as_mut() {
            hook();
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_world_creation() {
        let mut world = World::new();
        let a = world.create_entity();
        let b = world.create_entity();
        assert_ne!(a, b);
        assert!(world.components().next().is_none());
    }

    #[test]
    fn test_first_entity_from_config() {
        let mut world = World::with_config(EcsConfig {
            first_entity_id: 500,
            ..EcsConfig::default()
        });
        assert_eq!(world.create_entity(), EntityId::new(500));
    }

    #[test]
    fn test_deferred_delete_arms_flush_once() {
        let armed = Rc::new(Cell::new(0));
        let counter = Rc::clone(&armed);
        let mut world = World::new();
        world.set_flush_hook(move || counter.set(counter.get() + 1));
        world.register_component(ComponentDef::new("foo")).unwrap();

        let a = world.create_entity_with(&["foo"]).unwrap();
        let b = world.create_entity_with(&["foo"]).unwrap();
        world.delete_entity(a, Timing::Deferred);
        world.delete_entity(b, Timing::Deferred);
        assert_eq!(armed.get(), 1);
        assert!(world.is_flush_pending());
        assert!(world.has_component(a, "foo").unwrap());

        assert!(world.flush_pending());
        assert!(!world.is_flush_pending());
        assert!(!world.has_component(a, "foo").unwrap());
        assert!(!world.has_component(b, "foo").unwrap());
        assert!(!world.flush_pending());

        // Re-arms after a flush
        let c = world.create_entity_with(&["foo"]).unwrap();
        world.delete_entity(c, Timing::Deferred);
        assert_eq!(armed.get(), 2);
    }

    #[test]
    fn test_tick_does_not_arm() {
        let armed = Rc::new(Cell::new(0));
        let counter = Rc::clone(&armed);
        let mut world = World::new();
        world.set_flush_hook(move || counter.set(counter.get() + 1));
        world
            .register_component(ComponentDef::new("foo").system(|queue, _, states| {
                for state in states.iter() {
                    queue.remove_component(state.entity(), "foo");
                }
            }))
            .unwrap();
        let id = world.create_entity_with(&["foo"]).unwrap();

        world.tick(1.0);
        assert_eq!(armed.get(), 0);
        assert!(!world.has_component(id, "foo").unwrap());
        assert_eq!(world.pending_removals(), 0);
    }

    #[test]
    fn test_readd_wins_over_pending_removal() {
        let mut world = World::new();
        world.register_component(ComponentDef::new("foo").with_state(json!({ "num": 1 }))).unwrap();
        let id = world.create_entity_with(&["foo"]).unwrap();

        world.remove_component(id, "foo", Timing::Deferred).unwrap();
        world.add_component_with(id, "foo", json!({ "num": 2 })).unwrap();
        world.tick(1.0);

        let state = world.get_state(id, "foo").unwrap().unwrap().as_one().unwrap();
        assert_eq!(state["num"], json!(2));
    }

    #[test]
    fn test_default_and_strict_removal() {
        let mut world = World::new();
        world.register_component(ComponentDef::new("foo")).unwrap();
        let id = world.create_entity();
        assert!(world.remove_component(id, "foo", Timing::Immediate).is_ok());
        assert!(world.remove_component(id, "foo", Timing::Deferred).is_ok());
        assert_eq!(world.pending_removals(), 0);

        let mut strict = World::with_config(EcsConfig::strict());
        strict.register_component(ComponentDef::new("foo")).unwrap();
        let id = strict.create_entity();
        assert!(matches!(
            strict.remove_component(id, "foo", Timing::Immediate),
            Err(EcsError::NotPresent { .. })
        ));
    }

    #[test]
    fn test_create_entity_with_validates_first() {
        let mut world = World::new();
        world.register_component(ComponentDef::new("foo")).unwrap();
        let next = world.entities.peek();

        assert!(world.create_entity_with(&["foo", "bar"]).is_err());
        assert!(world.create_entity_with(&["foo", "foo"]).is_err());
        assert_eq!(world.entities.peek(), next);
        assert!(world.states_list("foo").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_overrides() {
        let mut world = World::new();
        world.register_component(ComponentDef::new("foo")).unwrap();
        let id = world.create_entity();
        assert!(matches!(
            world.add_component_with(id, "foo", json!(5)),
            Err(EcsError::InvalidState { .. })
        ));
        assert!(!world.has_component(id, "foo").unwrap());
    }
}
