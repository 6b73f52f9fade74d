use std::{
    any::Any,
    collections::HashMap,
    fmt::Debug,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use crate::{
    dependency_graph::{ResolvedReference, ServiceKey, ServiceOrder},
    errors::LookupError,
    package_repr::PackageRepr,
    resolver::{arc::downcast, ResolvedInstances},
    types::{Instance, Service},
};

/// Container holding all constructed services.
///
/// Lookup tables are immutable once the container has started, so a running
/// container can be shared between threads for reading. Services are destroyed
/// in reverse construction order by [`RunningContainer::stop`], or on drop.
pub struct RunningContainer {
    packages: Vec<PackageRepr>,
    order: ServiceOrder,
    instances: HashMap<ServiceKey, Instance>,
    /// Construction order
    started: Vec<ServiceKey>,
    running: bool,
}
impl Debug for RunningContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_struct("RunningContainer");
        for instance in self.started.iter().filter_map(|key| self.instances.get(key)) {
            map.field(&instance.id().to_string(), &instance.type_name());
        }
        map.finish()
    }
}

impl RunningContainer {
    pub(crate) fn new(
        packages: Vec<PackageRepr>,
        order: ServiceOrder,
        instances: HashMap<ServiceKey, Instance>,
        started: Vec<ServiceKey>,
    ) -> Self {
        RunningContainer {
            packages,
            order,
            instances,
            started,
            running: true,
        }
    }

    /// Returns the single service providing `interface`.
    ///
    /// With a qualifier, only providers declaring that qualifier are considered.
    pub fn get(&self, interface: &str, qualifier: Option<&str>) -> Result<Instance, LookupError> {
        let candidates = self.order.index().candidates(interface, qualifier);
        match candidates.as_slice() {
            [] => Err(LookupError::InterfaceMissing {
                interface: interface.to_string(),
                qualifier: qualifier.map(str::to_string),
            }),
            [(key, _)] => Ok(self.instance(key).clone()),
            _ => Err(LookupError::Ambiguous {
                interface: interface.to_string(),
                candidates: candidates.iter().map(|(_, id)| (*id).clone()).collect(),
            }),
        }
    }

    /// Returns all services providing `interface`, in declaration order
    pub fn get_all(&self, interface: &str) -> Vec<Instance> {
        self.order
            .index()
            .candidates(interface, None)
            .iter()
            .map(|(key, _)| self.instance(key).clone())
            .collect()
    }

    /// Attempts to get the service providing `interface` as its concrete type
    pub fn require<T: Service>(
        &self,
        interface: &str,
        qualifier: Option<&str>,
    ) -> Result<Arc<T>, LookupError> {
        downcast(&self.get(interface, qualifier)?)
    }

    /// Returns the services bound to a UI reference of `package`.
    ///
    /// Packages may only access interfaces they declared in their UI references.
    pub fn get_for_package(
        &self,
        package: &str,
        interface: &str,
        qualifier: Option<&str>,
    ) -> Result<ResolvedInstances, LookupError> {
        let (_, reference) = self
            .order
            .ui_references(package)
            .iter()
            .find(|(spec, _)| spec.matches(interface, qualifier))
            .ok_or_else(|| LookupError::UndeclaredReference {
                package: package.to_string(),
                interface: interface.to_string(),
                qualifier: qualifier.map(str::to_string),
            })?;

        Ok(match reference {
            ResolvedReference::One(key) => ResolvedInstances::One(self.instance(key).clone()),
            ResolvedReference::Many(keys) => {
                ResolvedInstances::Many(keys.iter().map(|key| self.instance(key).clone()).collect())
            }
        })
    }

    pub fn packages(&self) -> &[PackageRepr] {
        &self.packages
    }

    /// The order services were constructed in
    pub fn order(&self) -> &ServiceOrder {
        &self.order
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Destroys all services in reverse construction order.
    ///
    /// Failing release hooks are logged and do not stop the teardown of the
    /// remaining services. Returns the number of failed release hooks.
    pub fn stop(mut self) -> usize {
        self.shutdown()
    }

    fn shutdown(&mut self) -> usize {
        if !self.running {
            return 0;
        }
        self.running = false;

        tracing::debug!("Stopping {} service(s)", self.started.len());
        let instances = &self.instances;
        let failures = destroy_in_order(self.started.iter().rev().filter_map(|key| instances.get(key)));
        if failures > 0 {
            tracing::warn!("{failures} service(s) failed to shut down cleanly");
        }
        failures
    }

    // Every service in the order was constructed before the container was created
    fn instance(&self, key: &ServiceKey) -> &Instance {
        &self.instances[key]
    }
}

impl Drop for RunningContainer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Calls the release hook of each instance, logging failures.
///
/// A panicking release hook counts as a failure and does not stop the teardown.
/// Returns the number of failed release hooks.
pub(crate) fn destroy_in_order<'a>(instances: impl Iterator<Item = &'a Instance>) -> usize {
    let mut failures = 0;
    for instance in instances {
        match panic::catch_unwind(AssertUnwindSafe(|| instance.destroy())) {
            Ok(Ok(())) => tracing::debug!("Destroyed service '{}'", instance.id()),
            Ok(Err(error)) => {
                failures += 1;
                tracing::error!("Failed to destroy service '{}': {}", instance.id(), error);
            }
            Err(payload) => {
                failures += 1;
                tracing::error!(
                    "Service '{}' panicked while being destroyed: {}",
                    instance.id(),
                    panic_message(payload.as_ref())
                );
            }
        }
    }
    failures
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
