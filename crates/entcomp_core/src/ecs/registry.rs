//! # Component Registry
//!
//! Maps component names to their definitions and owns one store per name.
//! All immediate removals go through here so that `on_remove` fires exactly
//! once per detached state.

use std::collections::HashMap;

use super::component::ComponentDef;
use super::deferred::RemovalQueue;
use super::entity::{EntityId, InstanceId};
use super::scheduler::Phase;
use super::state::{Instances, State, StateView, StateViewMut, StatesMut, StatesRef};
use super::storage::ComponentStore;
use crate::error::{EcsError, EcsResult};

/// Backing store of one component, by kind.
#[derive(Debug)]
pub enum Storage {
    /// One state per entity.
    Single(ComponentStore<State>),
    /// A non-empty array of states per entity.
    Multi(ComponentStore<Instances>),
}

impl Storage {
    fn new(def: &ComponentDef, capacity: usize) -> Self {
        if def.is_multi() {
            Self::Multi(ComponentStore::new(def.name(), capacity))
        } else {
            Self::Single(ComponentStore::new(def.name(), capacity))
        }
    }

    /// Checks if an entity holds the component.
    #[inline]
    #[must_use]
    pub fn has(&self, entity: EntityId) -> bool {
        match self {
            Self::Single(store) => store.has(entity),
            Self::Multi(store) => store.has(entity),
        }
    }

    /// Number of entities holding the component.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Single(store) => store.len(),
            Self::Multi(store) => store.len(),
        }
    }

    /// Whether no entity holds the component.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up an entity's state.
    #[inline]
    #[must_use]
    pub fn get(&self, entity: EntityId) -> Option<StateView<'_>> {
        match self {
            Self::Single(store) => store.get(entity).map(StateView::One),
            Self::Multi(store) => store.get(entity).map(|i| StateView::Many(i)),
        }
    }

    /// Looks up an entity's state mutably.
    #[inline]
    pub fn get_mut(&mut self, entity: EntityId) -> Option<StateViewMut<'_>> {
        match self {
            Self::Single(store) => store.get_mut(entity).map(StateViewMut::One),
            Self::Multi(store) => store.get_mut(entity).map(|i| StateViewMut::Many(i)),
        }
    }

    /// The dense list.
    #[must_use]
    pub fn states(&self) -> StatesRef<'_> {
        match self {
            Self::Single(store) => StatesRef::Single(store.as_slice()),
            Self::Multi(store) => StatesRef::Multi(store.as_slice()),
        }
    }

    /// The dense list, mutably.
    pub fn states_mut(&mut self) -> StatesMut<'_> {
        match self {
            Self::Single(store) => StatesMut::Single(store.as_mut_slice()),
            Self::Multi(store) => StatesMut::Multi(store.as_mut_slice()),
        }
    }

    /// Entities holding the component, in dense-list order.
    #[must_use]
    pub fn entities(&self) -> Vec<EntityId> {
        match self {
            Self::Single(store) => store.entities().collect(),
            Self::Multi(store) => store.entities().collect(),
        }
    }

    /// Detaches every state the entity holds. Empty if absent.
    fn take(&mut self, entity: EntityId) -> Vec<State> {
        match self {
            Self::Single(store) => store.remove(entity).map(|s| vec![s]).unwrap_or_default(),
            Self::Multi(store) => store
                .remove(entity)
                .map(Instances::into_states)
                .unwrap_or_default(),
        }
    }
}

struct Entry {
    def: ComponentDef,
    storage: Storage,
}

impl Entry {
    /// Fires `on_remove` for each detached state.
    fn notify_removed(&self, queue: &mut RemovalQueue, entity: EntityId, states: &[State]) {
        if let Some(hook) = &self.def.on_remove {
            for state in states {
                hook(queue, entity, state);
            }
        }
    }
}

/// Registered components and their stores.
pub struct ComponentRegistry {
    entries: HashMap<String, Entry>,
    /// Registration order, for deterministic whole-entity removal.
    order: Vec<String>,
    /// Initial capacity of new stores.
    capacity: usize,
}

impl ComponentRegistry {
    /// Creates an empty registry whose stores reserve `capacity` slots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            capacity,
        }
    }

    /// Registers a component and creates its store.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidDefinition`] for an empty name or malformed default
    /// state, [`EcsError::DuplicateComponent`] if the name is taken.
    pub fn register(&mut self, def: ComponentDef) -> EcsResult<String> {
        def.validate().map_err(EcsError::InvalidDefinition)?;
        if self.entries.contains_key(def.name()) {
            return Err(EcsError::DuplicateComponent(def.name().to_string()));
        }

        let name = def.name().to_string();
        let storage = Storage::new(&def, self.capacity);
        self.entries.insert(name.clone(), Entry { def, storage });
        self.order.push(name.clone());
        Ok(name)
    }

    /// Drops a component and its store, returning the definition.
    ///
    /// Callers are expected to have emptied the store first with
    /// [`clear_component`](Self::clear_component).
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] if the name is not registered.
    pub fn unregister(&mut self, name: &str) -> EcsResult<ComponentDef> {
        let entry = self
            .entries
            .remove(name)
            .ok_or_else(|| EcsError::UnknownComponent(name.to_string()))?;
        self.order.retain(|n| n != name);
        Ok(entry.def)
    }

    /// Whether a component is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of registered components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no component is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Component names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Definitions in registration order.
    pub fn defs(&self) -> impl Iterator<Item = &ComponentDef> {
        self.order
            .iter()
            .filter_map(|name| self.entries.get(name))
            .map(|entry| &entry.def)
    }

    fn entry(&self, name: &str) -> EcsResult<&Entry> {
        self.entries
            .get(name)
            .ok_or_else(|| EcsError::UnknownComponent(name.to_string()))
    }

    fn entry_mut(&mut self, name: &str) -> EcsResult<&mut Entry> {
        self.entries
            .get_mut(name)
            .ok_or_else(|| EcsError::UnknownComponent(name.to_string()))
    }

    /// Looks up a definition.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] if the name is not registered.
    pub fn def(&self, name: &str) -> EcsResult<&ComponentDef> {
        self.entry(name).map(|entry| &entry.def)
    }

    /// Looks up a store.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] if the name is not registered.
    pub fn storage(&self, name: &str) -> EcsResult<&Storage> {
        self.entry(name).map(|entry| &entry.storage)
    }

    /// Looks up a store mutably.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] if the name is not registered.
    pub fn storage_mut(&mut self, name: &str) -> EcsResult<&mut Storage> {
        self.entry_mut(name).map(|entry| &mut entry.storage)
    }

    /// Stores a state and fires `on_add` with it.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`], or [`EcsError::DuplicateAdd`] if a
    /// regular component is already present.
    pub fn insert(&mut self, name: &str, state: State) -> EcsResult<()> {
        let Entry { def, storage } = self.entry_mut(name)?;
        let entity = state.entity();

        let stored = match storage {
            Storage::Single(store) => {
                store.insert(entity, state)?;
                store.get_mut(entity)
            }
            Storage::Multi(store) => {
                store.push_instance(state);
                store.get_mut(entity).and_then(|instances| instances.last_mut())
            }
        };

        if let (Some(hook), Some(state)) = (&def.on_add, stored) {
            hook(entity, state);
        }
        Ok(())
    }

    /// Removes a component from an entity now, firing `on_remove` for each
    /// removed state. Returns the number of states removed (0 if absent).
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] if the name is not registered.
    pub fn remove_now(
        &mut self,
        entity: EntityId,
        name: &str,
        queue: &mut RemovalQueue,
    ) -> EcsResult<usize> {
        let entry = self.entry_mut(name)?;
        let states = entry.storage.take(entity);
        entry.notify_removed(queue, entity, &states);
        Ok(states.len())
    }

    /// Removes one multi-component instance now, firing `on_remove`.
    /// Returns whether the instance was still present.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] if the name is not registered.
    pub fn remove_instance_now(
        &mut self,
        entity: EntityId,
        name: &str,
        instance: InstanceId,
        queue: &mut RemovalQueue,
    ) -> EcsResult<bool> {
        let entry = self.entry_mut(name)?;
        let removed = match &mut entry.storage {
            Storage::Multi(store) => store.remove_instance(entity, instance),
            Storage::Single(store) => {
                // Only reachable if a name was re-registered as a regular
                // component between enqueue and flush.
                let matches = store.get(entity).is_some_and(|s| s.instance() == instance);
                if matches {
                    store.remove(entity).ok()
                } else {
                    None
                }
            }
        };

        match removed {
            Some(state) => {
                entry.notify_removed(queue, entity, std::slice::from_ref(&state));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Removes every component from an entity now, in registration order.
    /// Returns the number of states removed.
    pub fn remove_entity_now(&mut self, entity: EntityId, queue: &mut RemovalQueue) -> usize {
        let mut removed = 0;
        for name in &self.order {
            let Some(entry) = self.entries.get_mut(name) else {
                continue;
            };
            if !entry.storage.has(entity) {
                continue;
            }
            let states = entry.storage.take(entity);
            entry.notify_removed(queue, entity, &states);
            removed += states.len();
        }
        removed
    }

    /// Removes a component from every entity holding it, firing `on_remove`.
    /// Returns the number of states removed.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] if the name is not registered.
    pub fn clear_component(&mut self, name: &str, queue: &mut RemovalQueue) -> EcsResult<usize> {
        let entry = self.entry_mut(name)?;
        let mut removed = 0;
        for entity in entry.storage.entities() {
            let states = entry.storage.take(entity);
            entry.notify_removed(queue, entity, &states);
            removed += states.len();
        }
        Ok(removed)
    }

    /// Runs a component's system or render system over its dense list.
    /// Returns whether a system ran; empty lists are skipped.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] if the name is not registered.
    pub fn run_system(
        &mut self,
        name: &str,
        phase: Phase,
        dt: f64,
        queue: &mut RemovalQueue,
    ) -> EcsResult<bool> {
        let Entry { def, storage } = self.entry_mut(name)?;
        let system = match phase {
            Phase::Tick => def.system.as_ref(),
            Phase::Render => def.render_system.as_ref(),
        };

        match system {
            Some(system) if !storage.is_empty() => {
                system(queue, dt, storage.states_mut());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new(0)
    }
}
