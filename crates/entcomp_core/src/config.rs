//! # World Configuration
//!
//! Tunables for a [`World`](crate::World). Loaded once at startup, either
//! from code or from a TOML file:
//!
//! ```toml
//! first_entity_id = 1
//! store_capacity = 1024
//! strict_removal = true
//! ```

use serde::Deserialize;

use crate::error::{EcsError, EcsResult};

/// World configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EcsConfig {
    /// First id handed out by `create_entity`.
    pub first_entity_id: u64,
    /// Slots reserved up front in every component store.
    pub store_capacity: usize,
    /// Removing an absent regular component raises `NotPresent` unless the
    /// removal is already queued. Off by default: removal is idempotent and
    /// an absent component is a silent no-op.
    pub strict_removal: bool,
    /// Flush queued removals before adding a component whose removal is
    /// pending, so the add is not undone by the stale removal.
    pub flush_on_readd: bool,
}

impl Default for EcsConfig {
    fn default() -> Self {
        Self {
            first_entity_id: 0,
            store_capacity: 0,
            strict_removal: false,
            flush_on_readd: true,
        }
    }
}

impl EcsConfig {
    /// Config for hosts that want removals of absent components reported.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            strict_removal: true,
            ..Self::default()
        }
    }

    /// Parses a config from TOML text. Missing keys take default values.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] if the text is not valid TOML or has
    /// unknown keys or wrongly typed values.
    pub fn from_toml_str(text: &str) -> EcsResult<Self> {
        toml::from_str(text).map_err(|e| EcsError::InvalidConfig(e.to_string()))
    }

    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] if the file cannot be read or parsed.
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> EcsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EcsError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }
}
