use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ConfigError;

/// Property overrides for a single package, keyed by property name.
pub type Overrides = BTreeMap<String, Value>;

/// A provider holding the custom properties of every package in an application.
///
/// Overrides are registered per package name and handed to the runtime when the
/// packages are created. The runtime validates them against the properties the
/// package actually declares.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationProperties {
    packages: BTreeMap<String, Overrides>,
}

impl ApplicationProperties {
    /// Initializes an empty set of application properties
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieve the overrides registered for a package.
    pub fn get(&self, package_name: &str) -> Option<&Overrides> {
        self.packages.get(package_name)
    }

    /// Add the overrides for a package.
    ///
    /// If the package already has overrides, it will return a
    /// [`ConfigError::AlreadyRegistered`] error
    pub fn add_package(
        &mut self,
        package_name: impl Into<String>,
        overrides: Overrides,
    ) -> Result<&mut Self, ConfigError> {
        let package_name = package_name.into();
        if self.packages.contains_key(&package_name) {
            return Err(ConfigError::AlreadyRegistered(package_name));
        }

        tracing::trace!(
            "Registered {} property override(s) for package '{}'",
            overrides.len(),
            package_name
        );
        self.packages.insert(package_name, overrides);
        Ok(self)
    }

    /// Can optionally add the overrides for a package.
    ///
    /// If the overrides are `Some`, it will be the same as calling [`ApplicationProperties::add_package`]
    /// If they are `None`, then the function just returns `Ok(self)` for chaining
    pub fn maybe_add_package(
        &mut self,
        package_name: impl Into<String>,
        overrides: Option<Overrides>,
    ) -> Result<&mut Self, ConfigError> {
        match overrides {
            Some(o) => self.add_package(package_name, o),
            None => Ok(self),
        }
    }

    /// Sets a single property override, replacing any previous value for that key.
    pub fn set(
        &mut self,
        package_name: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.packages
            .entry(package_name.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    /// Names of all packages that have overrides
    pub fn package_names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
