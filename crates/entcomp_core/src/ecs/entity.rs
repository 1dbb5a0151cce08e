//! # Entity Management
//!
//! Entities are bare identifiers. An entity exists only through the
//! component state attached to it; there is no entity table to keep alive.

use std::fmt;

/// Unique identifier for an entity.
///
/// Ids are handed out by [`EntityAllocator`] in increasing order, but any
/// `u64` is a valid id: the stores never check where an id came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates an entity ID from a raw integer.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for EntityId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a single component state object.
///
/// Every state created by a world gets a fresh id, so two states with equal
/// fields are still told apart when removing one instance of a multi
/// component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Creates an instance ID from a raw integer.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Monotonic allocator for entity and instance ids.
#[derive(Clone, Debug)]
pub struct EntityAllocator {
    next_entity: u64,
    next_instance: u64,
}

impl EntityAllocator {
    /// Creates an allocator whose first entity id is `first`.
    #[must_use]
    pub const fn new(first: u64) -> Self {
        Self {
            next_entity: first,
            next_instance: 0,
        }
    }

    /// Returns a new entity id. Ids are never reused.
    #[inline]
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next_entity);
        self.next_entity += 1;
        id
    }

    /// Returns a new state identity.
    #[inline]
    pub fn allocate_instance(&mut self) -> InstanceId {
        let id = InstanceId(self.next_instance);
        self.next_instance += 1;
        id
    }

    /// Returns the id the next call to [`allocate`](Self::allocate) hands out.
    #[inline]
    #[must_use]
    pub const fn peek(&self) -> EntityId {
        EntityId(self.next_entity)
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new(0)
    }
}
