//! # Component Storage
//!
//! Dense per-component storage with O(1) lookup, insert and removal.
//!
//! The storage uses a dense array strategy:
//! - Live values are packed at the front of a `Vec` (the dense list)
//! - An index map gives each entity's position in the dense list
//! - Removal swaps the last element into the vacated slot
//!
//! ```text
//! list:  [S17, S23, S4]         index: {17: 0, 23: 1, 4: 2}
//! remove(17)
//! list:  [S4, S23]              index: {4: 0, 23: 1}
//! ```
//!
//! List order is whatever the swaps leave behind. Systems iterate it, but
//! must not rely on it.

use std::collections::HashMap;

use super::entity::{EntityId, InstanceId};
use super::state::{Instances, State};
use crate::error::{EcsError, EcsResult};

/// Values that know which entity owns them.
///
/// The store uses this to repair its index after a swap-removal.
pub trait Owned {
    /// The owning entity.
    fn owner(&self) -> EntityId;
}

impl Owned for State {
    #[inline]
    fn owner(&self) -> EntityId {
        self.entity()
    }
}

impl Owned for Instances {
    #[inline]
    fn owner(&self) -> EntityId {
        self.entity()
    }
}

/// Dense storage for a single component.
///
/// This storage guarantees:
/// - `list[index[e]].owner() == e` for every present entity
/// - `list` and `index` have the same length
/// - O(1) has/get/insert/remove
///
/// # Example
///
/// ```rust,ignore
/// let mut store: ComponentStore<State> = ComponentStore::new("foo", 0);
/// store.insert(id, state)?;
/// assert!(store.has(id));
/// ```
#[derive(Debug)]
pub struct ComponentStore<T: Owned> {
    /// Component name, for error reporting.
    name: String,
    /// The dense list of values.
    list: Vec<T>,
    /// Entity to position in `list`.
    index: HashMap<EntityId, usize>,
}

impl<T: Owned> ComponentStore<T> {
    /// Creates an empty store, reserving room for `capacity` entities.
    #[must_use]
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            list: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// The component name this store backs.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of entities in the store.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Whether the store is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Checks if an entity is present.
    #[inline]
    #[must_use]
    pub fn has(&self, entity: EntityId) -> bool {
        self.index.contains_key(&entity)
    }

    /// Position of an entity in the dense list.
    #[inline]
    #[must_use]
    pub fn position(&self, entity: EntityId) -> Option<usize> {
        self.index.get(&entity).copied()
    }

    /// Gets the value for an entity.
    #[inline]
    #[must_use]
    pub fn get(&self, entity: EntityId) -> Option<&T> {
        let position = self.position(entity)?;
        self.list.get(position)
    }

    /// Gets the mutable value for an entity.
    #[inline]
    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        let position = self.position(entity)?;
        self.list.get_mut(position)
    }

    /// Appends a value for an entity.
    ///
    /// # Errors
    ///
    /// [`EcsError::DuplicateAdd`] if the entity is already present. The store
    /// is left unchanged.
    pub fn insert(&mut self, entity: EntityId, value: T) -> EcsResult<()> {
        if self.has(entity) {
            return Err(EcsError::DuplicateAdd {
                entity,
                component: self.name.clone(),
            });
        }
        debug_assert_eq!(value.owner(), entity, "value owned by another entity");

        self.index.insert(entity, self.list.len());
        self.list.push(value);
        Ok(())
    }

    /// Swap-removes an entity's value.
    ///
    /// Pops if the entity is last; otherwise moves the last value into the
    /// vacated slot and repoints its index entry.
    ///
    /// # Errors
    ///
    /// [`EcsError::NotPresent`] if the entity is absent.
    pub fn remove(&mut self, entity: EntityId) -> EcsResult<T> {
        self.detach(entity).ok_or_else(|| EcsError::NotPresent {
            entity,
            component: self.name.clone(),
        })
    }

    fn detach(&mut self, entity: EntityId) -> Option<T> {
        let position = self.index.remove(&entity)?;
        let removed = self.list.swap_remove(position);
        if let Some(moved) = self.list.get(position) {
            self.index.insert(moved.owner(), position);
        }
        Some(removed)
    }

    /// The dense list.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.list
    }

    /// The dense list, mutably. Length cannot change through a slice.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.list
    }

    /// Iterates over present entities in dense-list order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.list.iter().map(Owned::owner)
    }
}

impl ComponentStore<Instances> {
    /// Appends an instance to the entity's array, creating the array at the
    /// tail of the dense list if absent.
    pub fn push_instance(&mut self, state: State) {
        let entity = state.entity();
        match self.get_mut(entity) {
            Some(instances) => instances.push(state),
            None => {
                self.index.insert(entity, self.list.len());
                self.list.push(Instances::new(state));
            }
        }
    }

    /// Removes one instance by identity.
    ///
    /// Returns `None` if the entity or instance is absent. Removing the last
    /// instance removes the entity's entry as a whole.
    pub fn remove_instance(&mut self, entity: EntityId, instance: InstanceId) -> Option<State> {
        let instances = self.get_mut(entity)?;
        let removed = instances.remove(instance)?;
        if instances.is_empty() {
            let emptied = self.detach(entity);
            debug_assert!(emptied.is_some_and(|rest| rest.is_empty()));
        }
        Some(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn state(entity: u64, instance: u64) -> State {
        State::build(EntityId::new(entity), InstanceId::new(instance), &Map::new(), None)
    }

    fn assert_consistent<T: Owned>(store: &ComponentStore<T>) {
        assert_eq!(store.list.len(), store.index.len());
        for (entity, &position) in &store.index {
            assert_eq!(store.list[position].owner(), *entity);
        }
    }

    #[test]
    fn test_store_basics() {
        let mut store: ComponentStore<State> = ComponentStore::new("foo", 0);
        store.insert(EntityId::new(1), state(1, 0)).unwrap();
        assert!(store.has(EntityId::new(1)));
        assert_eq!(store.len(), 1);

        store.remove(EntityId::new(1)).unwrap();
        assert!(!store.has(EntityId::new(1)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_duplicate_insert() {
        let mut store: ComponentStore<State> = ComponentStore::new("foo", 0);
        store.insert(EntityId::new(2), state(2, 0)).unwrap();

        let err = store.insert(EntityId::new(2), state(2, 1)).unwrap_err();
        assert!(matches!(err, EcsError::DuplicateAdd { .. }));
        // Original value kept
        assert_eq!(store.get(EntityId::new(2)).unwrap().instance(), InstanceId::new(0));
        assert_consistent(&store);
    }

    #[test]
    fn test_store_remove_absent() {
        let mut store: ComponentStore<State> = ComponentStore::new("foo", 0);
        let err = store.remove(EntityId::new(9)).unwrap_err();
        assert!(matches!(err, EcsError::NotPresent { .. }));
    }

    #[test]
    fn test_swap_remove_fixes_index() {
        let mut store: ComponentStore<State> = ComponentStore::new("foo", 0);
        for e in [17, 23, 4] {
            store.insert(EntityId::new(e), state(e, e)).unwrap();
        }

        store.remove(EntityId::new(17)).unwrap();
        assert_eq!(store.position(EntityId::new(4)), Some(0));
        assert_eq!(store.position(EntityId::new(23)), Some(1));
        assert_consistent(&store);

        // Removing the tail is a plain pop
        store.remove(EntityId::new(23)).unwrap();
        assert_eq!(store.position(EntityId::new(4)), Some(0));
        assert_consistent(&store);
    }

    #[test]
    fn test_store_consistency() {
        let mut store: ComponentStore<State> = ComponentStore::new("foo", 0);
        let mut flags = [false; 20];
        let mut apply = |store: &mut ComponentStore<State>, every: usize, add: bool| {
            for i in (0..20).filter(|i| i % every == 0) {
                let e = EntityId::new(i as u64);
                if add {
                    if !store.has(e) {
                        store.insert(e, state(i as u64, i as u64)).unwrap();
                    }
                } else if store.has(e) {
                    store.remove(e).unwrap();
                }
                flags[i] = add;
            }
        };

        // add all, remove every 2nd, re-add every 4th, etc.
        apply(&mut store, 1, true);
        apply(&mut store, 2, false);
        apply(&mut store, 4, true);
        apply(&mut store, 8, false);
        apply(&mut store, 16, true);
        apply(&mut store, 7, false);
        apply(&mut store, 9, true);

        for (i, &present) in flags.iter().enumerate() {
            let e = EntityId::new(i as u64);
            assert_eq!(store.has(e), present, "entity {i}");
            assert_eq!(store.entities().any(|x| x == e), present, "entity {i}");
            if present {
                assert_eq!(store.get(e).unwrap().entity(), e);
            }
        }
        assert_consistent(&store);
    }

    #[test]
    fn test_multi_instances() {
        let mut store: ComponentStore<Instances> = ComponentStore::new("multi", 0);
        store.push_instance(state(1, 0));
        store.push_instance(state(2, 1));
        store.push_instance(state(1, 2));
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(EntityId::new(1)).unwrap().len(), 2);

        let removed = store.remove_instance(EntityId::new(1), InstanceId::new(0)).unwrap();
        assert_eq!(removed.instance(), InstanceId::new(0));
        assert!(store.has(EntityId::new(1)));

        // Removing the last instance drops the entry
        store.remove_instance(EntityId::new(1), InstanceId::new(2)).unwrap();
        assert!(!store.has(EntityId::new(1)));
        assert_eq!(store.len(), 1);
        assert_consistent(&store);

        // Already gone
        assert!(store.remove_instance(EntityId::new(1), InstanceId::new(2)).is_none());
        assert!(store.remove_instance(EntityId::new(2), InstanceId::new(99)).is_none());
    }
}
