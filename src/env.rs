//! Environment variable access.
//!
//! Providers never call `std::env` directly; they read through an [`Env`]
//! so tests can supply a fixed map without touching process state.

use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
enum Inner {
    #[default]
    Real,
    Fake(Arc<HashMap<String, String>>),
}

/// Source of environment variables.
#[derive(Clone, Debug, Default)]
pub struct Env(Inner);

impl Env {
    /// Read from the process environment.
    pub fn real() -> Self {
        Self(Inner::Real)
    }

    /// Fixed environment built from key/value pairs.
    pub fn from_slice(vars: &[(&str, &str)]) -> Self {
        let map = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self(Inner::Fake(Arc::new(map)))
    }

    /// Fixed environment built from a map.
    pub fn from_map(map: HashMap<String, String>) -> Self {
        Self(Inner::Fake(Arc::new(map)))
    }

    /// Get a variable, exactly as stored.
    pub fn get(&self, key: &str) -> Option<String> {
        match &self.0 {
            Inner::Real => std::env::var(key).ok(),
            Inner::Fake(map) => map.get(key).cloned(),
        }
    }

    /// Get a variable, treating an empty value as unset.
    pub fn get_non_empty(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.is_empty())
    }

    /// Get the first non-empty variable among `keys`.
    pub fn get_with_fallbacks(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.get_non_empty(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}
