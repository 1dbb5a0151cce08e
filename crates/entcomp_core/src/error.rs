//! # ECS Error Types
//!
//! All errors that can occur when registering components or mutating
//! component state. Every variant is a programmer error: it aborts the call
//! that raised it and leaves every store untouched.

use thiserror::Error;

use crate::ecs::EntityId;

/// Errors that can occur in the entity-component manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Component definition is missing a usable name or has a malformed
    /// default state.
    #[error("invalid component definition: {0}")]
    InvalidDefinition(String),

    /// A component with this name is already registered.
    #[error("component already exists: {0}")]
    DuplicateComponent(String),

    /// No component with this name is registered.
    #[error("component not found: {0}")]
    UnknownComponent(String),

    /// Tried to add a non-multi component to an entity that already has it.
    #[error("entity {entity} already has component: {component}")]
    DuplicateAdd {
        /// The target entity.
        entity: EntityId,
        /// The component name.
        component: String,
    },

    /// Tried to remove a non-multi component the entity does not have.
    #[error("entity {entity} does not have component: {component}")]
    NotPresent {
        /// The target entity.
        entity: EntityId,
        /// The component name.
        component: String,
    },

    /// Multi-component instance index is out of range.
    #[error("entity {entity} has no instance {index} of component: {component}")]
    InvalidIndex {
        /// The target entity.
        entity: EntityId,
        /// The component name.
        component: String,
        /// The requested instance index.
        index: usize,
    },

    /// Instance removal was requested on a non-multi component.
    #[error("component is not a multi component: {0}")]
    NotMulti(String),

    /// Caller-supplied state overrides were not a JSON object.
    #[error("invalid state for component {component}: {reason}")]
    InvalidState {
        /// The component name.
        component: String,
        /// Why the state was rejected.
        reason: String,
    },

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EcsError::DuplicateAdd {
            entity: EntityId::new(7),
            component: "foo".to_string(),
        };
        assert_eq!(err.to_string(), "entity 7 already has component: foo");

        let err = EcsError::UnknownComponent("bar".to_string());
        assert_eq!(err.to_string(), "component not found: bar");
    }
}
