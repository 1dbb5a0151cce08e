//! # Deferred Removal Queues
//!
//! Removals requested while a component's dense list is being walked (from a
//! system, or from an `on_remove` hook) cannot be applied on the spot. They
//! are recorded here and applied by the world's flush.
//!
//! ## Queues
//!
//! Three coalesced queues, drained highest priority first:
//!
//! 1. instance removals `(entity, component, instance)`
//! 2. component removals `(entity, component)`
//! 3. entity deletions `entity`
//!
//! Entity deletions go last so they only see what earlier removals left
//! behind. A target that is already queued is not queued again.
//!
//! ## Invariants
//! - Empty between flushes
//! - Entries pushed while draining are picked up by the same drain

use std::collections::{HashSet, VecDeque};

use super::entity::{EntityId, InstanceId};

/// One queued removal, as handed back to the flush loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Removal {
    /// Remove one instance of a multi component.
    Instance {
        /// Owning entity.
        entity: EntityId,
        /// Component name.
        component: String,
        /// Identity captured when the removal was requested.
        instance: InstanceId,
    },
    /// Remove a component (all instances) from an entity.
    Component {
        /// Target entity.
        entity: EntityId,
        /// Component name.
        component: String,
    },
    /// Remove every component from an entity.
    Entity(EntityId),
}

/// Pending removals.
///
/// Systems and `on_remove` hooks receive `&mut RemovalQueue` so they can
/// request removals without touching the stores being iterated.
#[derive(Debug, Default)]
pub struct RemovalQueue {
    instances: VecDeque<(EntityId, String, InstanceId)>,
    components: VecDeque<(EntityId, String)>,
    entities: VecDeque<EntityId>,
    queued_instances: HashSet<InstanceId>,
    queued_pairs: HashSet<(EntityId, String)>,
    queued_entities: HashSet<EntityId>,
}

impl RemovalQueue {
    /// Creates empty queues.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues deletion of an entity. Returns `false` if already queued.
    pub fn delete_entity(&mut self, entity: EntityId) -> bool {
        if !self.queued_entities.insert(entity) {
            return false;
        }
        self.entities.push_back(entity);
        true
    }

    /// Queues removal of a component from an entity. Returns `false` if
    /// already queued.
    pub fn remove_component(&mut self, entity: EntityId, component: &str) -> bool {
        if !self.queued_pairs.insert((entity, component.to_string())) {
            return false;
        }
        self.components.push_back((entity, component.to_string()));
        true
    }

    /// Queues removal of one multi-component instance. Returns `false` if
    /// already queued.
    pub fn remove_instance(&mut self, entity: EntityId, component: &str, instance: InstanceId) -> bool {
        if !self.queued_instances.insert(instance) {
            return false;
        }
        self.instances.push_back((entity, component.to_string(), instance));
        true
    }

    /// Whether the pair is queued for removal, directly or through a queued
    /// deletion of the entity.
    #[must_use]
    pub fn is_pending(&self, entity: EntityId, component: &str) -> bool {
        self.queued_entities.contains(&entity)
            || self.queued_pairs.contains(&(entity, component.to_string()))
    }

    /// Whether the entity is queued for deletion.
    #[must_use]
    pub fn is_entity_pending(&self, entity: EntityId) -> bool {
        self.queued_entities.contains(&entity)
    }

    /// Total number of queued removals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len() + self.components.len() + self.entities.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty() && self.components.is_empty() && self.entities.is_empty()
    }

    /// Takes the next removal in drain order.
    pub(crate) fn pop_next(&mut self) -> Option<Removal> {
        if let Some((entity, component, instance)) = self.instances.pop_front() {
            self.queued_instances.remove(&instance);
            return Some(Removal::Instance {
                entity,
                component,
                instance,
            });
        }
        if let Some((entity, component)) = self.components.pop_front() {
            self.queued_pairs.remove(&(entity, component.clone()));
            return Some(Removal::Component { entity, component });
        }
        let entity = self.entities.pop_front()?;
        self.queued_entities.remove(&entity);
        Some(Removal::Entity(entity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_order() {
        let mut queue = RemovalQueue::new();
        let e = EntityId::new(1);
        queue.delete_entity(e);
        queue.remove_component(e, "foo");
        queue.remove_instance(e, "bar", InstanceId::new(3));
        assert_eq!(queue.len(), 3);

        assert!(matches!(queue.pop_next(), Some(Removal::Instance { .. })));
        assert!(matches!(queue.pop_next(), Some(Removal::Component { .. })));
        assert_eq!(queue.pop_next(), Some(Removal::Entity(e)));
        assert_eq!(queue.pop_next(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_coalescing() {
        let mut queue = RemovalQueue::new();
        let e = EntityId::new(4);
        assert!(queue.delete_entity(e));
        assert!(!queue.delete_entity(e));
        assert!(queue.remove_component(e, "foo"));
        assert!(!queue.remove_component(e, "foo"));
        assert!(queue.remove_component(e, "bar"));
        assert!(queue.remove_instance(e, "multi", InstanceId::new(0)));
        assert!(!queue.remove_instance(e, "multi", InstanceId::new(0)));
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn test_requeue_after_pop() {
        let mut queue = RemovalQueue::new();
        let e = EntityId::new(2);
        queue.remove_component(e, "foo");
        assert!(queue.is_pending(e, "foo"));

        queue.pop_next();
        assert!(!queue.is_pending(e, "foo"));
        assert!(queue.remove_component(e, "foo"));
    }

    #[test]
    fn test_pending_through_entity_deletion() {
        let mut queue = RemovalQueue::new();
        let e = EntityId::new(5);
        queue.delete_entity(e);
        assert!(queue.is_pending(e, "anything"));
        assert!(queue.is_entity_pending(e));
        assert!(!queue.is_pending(EntityId::new(6), "anything"));
    }

    #[test]
    fn test_push_while_draining() {
        let mut queue = RemovalQueue::new();
        queue.delete_entity(EntityId::new(1));

        let mut seen = Vec::new();
        while let Some(removal) = queue.pop_next() {
            if let Removal::Entity(e) = &removal {
                if e.raw() < 3 {
                    queue.delete_entity(EntityId::new(e.raw() + 1));
                }
            }
            seen.push(removal);
        }
        assert_eq!(seen.len(), 3);
    }
}
