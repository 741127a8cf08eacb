//! Named engines, owned by the application context.
//!
//! Each data source gets one [`TileEngine`]; the registry hands out the
//! engine for a name, creating it on first use. Engines with different
//! payload types can share a registry.

use std::any::Any;
use std::collections::HashMap;

use thiserror::Error;
use tracing::info;

use crate::engine::TileEngine;
use crate::tile::TilePayload;

/// Registry lookup errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The engine exists but stores a different payload type.
    #[error("Engine '{name}' holds {expected} payloads, not {requested}")]
    PayloadMismatch {
        name: String,
        expected: &'static str,
        requested: &'static str,
    },
}

struct Entry {
    payload_type: &'static str,
    engine: Box<dyn Any + Send>,
}

/// Engines by name.
#[derive(Default)]
pub struct CacheRegistry {
    engines: HashMap<String, Entry>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The engine registered as `name`, created with `create` if absent.
    pub fn get_or_create<P, F>(
        &mut self,
        name: &str,
        create: F,
    ) -> Result<&mut TileEngine<P>, RegistryError>
    where
        P: TilePayload,
        F: FnOnce() -> TileEngine<P>,
    {
        let entry = self.engines.entry(name.to_string()).or_insert_with(|| {
            info!(name, payload = std::any::type_name::<P>(), "Creating tile engine");
            Entry {
                payload_type: std::any::type_name::<P>(),
                engine: Box::new(create()),
            }
        });
        let expected = entry.payload_type;
        entry
            .engine
            .downcast_mut::<TileEngine<P>>()
            .ok_or_else(|| RegistryError::PayloadMismatch {
                name: name.to_string(),
                expected,
                requested: std::any::type_name::<P>(),
            })
    }

    /// The engine registered as `name`, if any.
    pub fn get_mut<P: TilePayload>(
        &mut self,
        name: &str,
    ) -> Result<Option<&mut TileEngine<P>>, RegistryError> {
        let Some(entry) = self.engines.get_mut(name) else {
            return Ok(None);
        };
        let expected = entry.payload_type;
        entry
            .engine
            .downcast_mut::<TileEngine<P>>()
            .map(Some)
            .ok_or_else(|| RegistryError::PayloadMismatch {
                name: name.to_string(),
                expected,
                requested: std::any::type_name::<P>(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.engines.contains_key(name)
    }

    /// Drop an engine and everything it cached.
    pub fn remove(&mut self, name: &str) -> bool {
        self.engines.remove(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.engines.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}
