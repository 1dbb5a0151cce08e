//! # Component State
//!
//! State objects are dynamic records: the component's default state, overlaid
//! with the caller's overrides, stamped with the owning entity and a unique
//! instance identity.

use std::ops::{Deref, DerefMut, Index};

use serde_json::{Map, Value};

use super::entity::{EntityId, InstanceId};

/// Reserved field name for the owning entity.
///
/// It is stripped from defaults and overrides; [`State::entity`] is the only
/// source of truth, and [`State::to_value`] writes it back under this key.
pub const ENTITY_ID_KEY: &str = "entityId";

static NULL: Value = Value::Null;

/// One component state object.
#[derive(Clone, Debug, PartialEq)]
pub struct State {
    entity: EntityId,
    instance: InstanceId,
    fields: Map<String, Value>,
}

impl State {
    /// Builds a state by shallow-merging `overrides` over `defaults`.
    pub(crate) fn build(
        entity: EntityId,
        instance: InstanceId,
        defaults: &Map<String, Value>,
        overrides: Option<&Map<String, Value>>,
    ) -> Self {
        let mut fields = defaults.clone();
        if let Some(overrides) = overrides {
            for (key, value) in overrides {
                fields.insert(key.clone(), value.clone());
            }
        }
        fields.remove(ENTITY_ID_KEY);

        Self {
            entity,
            instance,
            fields,
        }
    }

    /// The entity this state belongs to.
    #[inline]
    #[must_use]
    pub const fn entity(&self) -> EntityId {
        self.entity
    }

    /// The identity of this state object.
    #[inline]
    #[must_use]
    pub const fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Gets a field value.
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Gets a mutable field value.
    #[inline]
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.fields.get_mut(key)
    }

    /// Sets a field, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    /// All fields, excluding the entity id.
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Mutable access to all fields.
    #[inline]
    pub fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.fields
    }

    /// Renders the state as a JSON object including the `entityId` field.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut fields = self.fields.clone();
        fields.insert(ENTITY_ID_KEY.to_string(), Value::from(self.entity.raw()));
        Value::Object(fields)
    }
}

/// Missing fields index to `null`, like `serde_json::Value`.
impl Index<&str> for State {
    type Output = Value;

    fn index(&self, key: &str) -> &Value {
        self.fields.get(key).unwrap_or(&NULL)
    }
}

/// The states one entity holds for a multi component.
///
/// Never empty while stored: the store drops the whole entry when the last
/// instance is removed. Callers get slice access only, so they cannot empty
/// it behind the store's back.
#[derive(Clone, Debug, PartialEq)]
pub struct Instances {
    entity: EntityId,
    states: Vec<State>,
}

impl Instances {
    pub(crate) fn new(first: State) -> Self {
        Self {
            entity: first.entity(),
            states: vec![first],
        }
    }

    /// The entity owning these instances.
    #[inline]
    #[must_use]
    pub const fn entity(&self) -> EntityId {
        self.entity
    }

    /// Position of an instance within the array.
    #[must_use]
    pub fn position(&self, instance: InstanceId) -> Option<usize> {
        self.states.iter().position(|s| s.instance() == instance)
    }

    pub(crate) fn push(&mut self, state: State) {
        self.states.push(state);
    }

    /// Swap-removes one instance.
    pub(crate) fn remove(&mut self, instance: InstanceId) -> Option<State> {
        let position = self.position(instance)?;
        Some(self.states.swap_remove(position))
    }

    pub(crate) fn into_states(self) -> Vec<State> {
        self.states
    }
}

impl Deref for Instances {
    type Target = [State];

    fn deref(&self) -> &[State] {
        &self.states
    }
}

impl DerefMut for Instances {
    fn deref_mut(&mut self) -> &mut [State] {
        &mut self.states
    }
}

/// One entity's state for one component, as returned by lookups.
#[derive(Clone, Copy, Debug)]
pub enum StateView<'a> {
    /// A regular component's state.
    One(&'a State),
    /// A multi component's instances (never empty).
    Many(&'a [State]),
}

impl<'a> StateView<'a> {
    /// The single state, if this is a regular component.
    #[must_use]
    pub fn as_one(self) -> Option<&'a State> {
        match self {
            Self::One(state) => Some(state),
            Self::Many(_) => None,
        }
    }

    /// The instances, if this is a multi component.
    #[must_use]
    pub fn as_many(self) -> Option<&'a [State]> {
        match self {
            Self::One(_) => None,
            Self::Many(states) => Some(states),
        }
    }

    /// Number of states (1 for regular components).
    #[must_use]
    pub fn len(self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(states) => states.len(),
        }
    }

    /// Always false: stores never hold empty entries.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.len() == 0
    }
}

/// Mutable counterpart of [`StateView`].
#[derive(Debug)]
pub enum StateViewMut<'a> {
    /// A regular component's state.
    One(&'a mut State),
    /// A multi component's instances (never empty).
    Many(&'a mut [State]),
}

impl<'a> StateViewMut<'a> {
    /// The single state, if this is a regular component.
    #[must_use]
    pub fn into_one(self) -> Option<&'a mut State> {
        match self {
            Self::One(state) => Some(state),
            Self::Many(_) => None,
        }
    }

    /// The instances, if this is a multi component.
    #[must_use]
    pub fn into_many(self) -> Option<&'a mut [State]> {
        match self {
            Self::One(_) => None,
            Self::Many(states) => Some(states),
        }
    }
}

/// A component's whole dense list.
#[derive(Clone, Copy, Debug)]
pub enum StatesRef<'a> {
    /// One state per entity.
    Single(&'a [State]),
    /// One instance array per entity.
    Multi(&'a [Instances]),
}

impl<'a> StatesRef<'a> {
    /// Number of entities in the list.
    #[must_use]
    pub fn len(self) -> usize {
        match self {
            Self::Single(states) => states.len(),
            Self::Multi(entries) => entries.len(),
        }
    }

    /// Whether no entity holds the component.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    /// Iterates over every state, flattening multi instances.
    #[must_use]
    pub fn iter(self) -> Box<dyn Iterator<Item = &'a State> + 'a> {
        match self {
            Self::Single(states) => Box::new(states.iter()),
            Self::Multi(entries) => Box::new(entries.iter().flat_map(|e| e.iter())),
        }
    }
}

/// A component's whole dense list, handed to systems.
///
/// Values can be edited in place; entries cannot be added or removed.
#[derive(Debug)]
pub enum StatesMut<'a> {
    /// One state per entity.
    Single(&'a mut [State]),
    /// One instance array per entity.
    Multi(&'a mut [Instances]),
}

impl StatesMut<'_> {
    /// Number of entities in the list.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Single(states) => states.len(),
            Self::Multi(entries) => entries.len(),
        }
    }

    /// Whether no entity holds the component.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over every state, flattening multi instances.
    pub fn iter(&self) -> Box<dyn Iterator<Item = &State> + '_> {
        match self {
            Self::Single(states) => Box::new(states.iter()),
            Self::Multi(entries) => Box::new(entries.iter().flat_map(|e| e.iter())),
        }
    }

    /// Iterates mutably over every state, flattening multi instances.
    pub fn iter_mut(&mut self) -> Box<dyn Iterator<Item = &mut State> + '_> {
        match self {
            Self::Single(states) => Box::new(states.iter_mut()),
            Self::Multi(entries) => Box::new(entries.iter_mut().flat_map(|e| e.iter_mut())),
        }
    }
}
