//! Driver registry for trajectory controllers.
//!
//! Maps driver names from `[controller] driver = "..."` to controller factories.
//! Built at startup and passed by value; no global state.

use crate::error::ScanError;
use std::collections::HashMap;
use traject_common::controller::config::ControllerConfig;
use traject_common::controller::{ControllerFactory, ControllerHandle};

/// Registry of available controller drivers.
pub struct DriverRegistry {
    factories: HashMap<&'static str, ControllerFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry holding every built-in driver.
    pub fn with_builtin_drivers() -> Self {
        let mut registry = Self::new();
        crate::drivers::register_all_drivers(&mut registry);
        registry
    }

    /// Register a driver factory.
    ///
    /// # Panics
    /// Panics if a driver with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: ControllerFactory) {
        if self.factories.contains_key(name) {
            panic!("Driver '{name}' is already registered");
        }
        self.factories.insert(name, factory);
    }

    /// Get a driver factory by name.
    pub fn get_factory(&self, name: &str) -> Option<ControllerFactory> {
        self.factories.get(name).copied()
    }

    /// Create the driver named in `config`.
    ///
    /// # Errors
    /// `ScanError::Configuration` if no driver with that name is registered.
    pub fn create(&self, config: &ControllerConfig) -> Result<ControllerHandle, ScanError> {
        let factory = self.get_factory(&config.driver).ok_or_else(|| {
            ScanError::Configuration(format!(
                "unknown controller driver '{}' (available: {:?})",
                config.driver,
                self.list_drivers()
            ))
        })?;
        Ok(factory(config))
    }

    /// All registered driver names, sorted.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
