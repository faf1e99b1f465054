use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use super::backend::Detector;

/// Named detector backends, shared across worker threads.
pub struct DetectorRegistry {
    backends: BTreeMap<String, Arc<dyn Detector>>,
    default_name: Option<String>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self {
            backends: BTreeMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<D: Detector + 'static>(&mut self, backend: D) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Arc::new(backend));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!(
                "detector '{}' not registered (available: {})",
                name,
                self.list().join(", ")
            ));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Detector>> {
        self.backends.get(name).cloned()
    }

    pub fn default_backend(&self) -> Option<Arc<dyn Detector>> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    /// Registered backend names, sorted.
    pub fn list(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }

    /// Backend by name, or the default when `name` is `None`.
    pub fn select(&self, name: Option<&str>) -> Result<Arc<dyn Detector>> {
        match name {
            Some(name) => self.get(name).ok_or_else(|| {
                anyhow!(
                    "detector '{}' not registered (available: {})",
                    name,
                    self.list().join(", ")
                )
            }),
            None => self
                .default_backend()
                .ok_or_else(|| anyhow!("no detector registered")),
        }
    }
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
