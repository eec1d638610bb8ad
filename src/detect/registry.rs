use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::backend::DetectorBackend;

/// Detector shared between the registry and any running overlay.
pub type SharedDetector = Arc<Mutex<dyn DetectorBackend>>;

/// Named detectors available for configuration lookup.
///
/// Backends are wrapped in `Mutex` because `DetectorBackend::detect` takes `&mut self`.
#[derive(Clone, Default)]
pub struct DetectorRegistry {
    backends: HashMap<String, SharedDetector>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend under its own `name()`.
    pub fn register<B: DetectorBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        self.register_named(name, backend);
    }

    /// Register a backend under an explicit resource name.
    pub fn register_named<B: DetectorBackend + 'static>(
        &mut self,
        name: impl Into<String>,
        backend: B,
    ) {
        self.backends
            .insert(name.into(), Arc::new(Mutex::new(backend)));
    }

    pub fn get(&self, name: &str) -> Option<SharedDetector> {
        self.backends.get(name).cloned()
    }

    /// Look up a detector, failing with a readable message when it is missing.
    pub fn require(&self, name: &str) -> Result<SharedDetector> {
        self.get(name)
            .ok_or_else(|| anyhow!("detector '{}' not registered", name))
    }

    /// Sorted names of registered detectors.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }
}
