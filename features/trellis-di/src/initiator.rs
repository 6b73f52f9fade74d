use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use serde::de::DeserializeOwned;

use crate::{
    builder::ContainerBuilder,
    container::{destroy_in_order, RunningContainer},
    dependency_graph::{ResolvedReference, ResolvedService, ServiceKey, ServiceOrder},
    errors::{InjectError, StartError},
    factories::DynFactory,
    package_repr::PackageRepr,
    resolver::{ResolvedInstances, Resolver},
    types::{Instance, Properties, ServiceId},
};

/// Starts the container: constructs every service in dependency-first order
pub(crate) struct ContainerInitiator {
    /// All constructed instances
    instances: HashMap<ServiceKey, Instance>,
    /// Construction order
    started: Vec<ServiceKey>,
}
impl ContainerInitiator {
    pub(crate) fn new() -> ContainerInitiator {
        ContainerInitiator {
            instances: HashMap::new(),
            started: Vec::new(),
        }
    }

    pub fn initiate(
        mut self,
        blueprint: ContainerBuilder,
        order: ServiceOrder,
    ) -> Result<RunningContainer, StartError> {
        let ContainerBuilder {
            packages,
            mut factories,
        } = blueprint;

        check_order(&packages, &order)?;
        check_factories(&order, &factories)?;

        tracing::debug!(
            "Starting {} service(s) from {} package(s)",
            order.len(),
            packages.len()
        );

        for resolved in order.iter() {
            if let Err(e) = self.construct(&packages, resolved, &mut factories) {
                tracing::error!("Startup failed, destroying {} service(s): {e}", self.started.len());
                // Roll back what was built so far, last constructed first
                let instances = &self.instances;
                destroy_in_order(self.started.iter().rev().filter_map(|key| instances.get(key)));
                return Err(e);
            }
        }

        tracing::debug!("All services have been constructed - container started");
        Ok(RunningContainer::new(
            packages,
            order,
            self.instances,
            self.started,
        ))
    }

    fn construct(
        &mut self,
        packages: &[PackageRepr],
        resolved: &ResolvedService,
        factories: &mut BTreeMap<ServiceId, Box<dyn DynFactory>>,
    ) -> Result<(), StartError> {
        let service = &packages[resolved.key.package].services()[resolved.key.service];
        let factory = factories
            .get_mut(&resolved.id)
            .ok_or_else(|| StartError::MissingFactory(resolved.id.clone()))?;

        let mut references = BTreeMap::new();
        for (name, reference) in &resolved.references {
            references.insert(name.clone(), self.instances_for(resolved, reference)?);
        }

        let options = ServiceOptions::new(&resolved.id, service.properties(), &references);
        let instance = factory
            .construct(options)
            .map_err(|error| StartError::ServiceFailed {
                service: resolved.id.clone(),
                error: Arc::new(error),
            })?;

        tracing::debug!(
            "Constructed service '{}' ({})",
            resolved.id,
            instance.type_name()
        );
        self.instances.insert(resolved.key, instance);
        self.started.push(resolved.key);
        Ok(())
    }

    /// Providers are always constructed before their dependents
    fn instances_for(
        &self,
        dependent: &ResolvedService,
        reference: &ResolvedReference,
    ) -> Result<ResolvedInstances, StartError> {
        let get = |key: &ServiceKey| {
            self.instances
                .get(key)
                .cloned()
                .ok_or_else(|| StartError::OrderMismatch(dependent.id.clone()))
        };

        Ok(match reference {
            ResolvedReference::One(key) => ResolvedInstances::One(get(key)?),
            ResolvedReference::Many(keys) => {
                ResolvedInstances::Many(keys.iter().map(get).collect::<Result<_, _>>()?)
            }
        })
    }
}

/// The order must have been resolved from exactly these packages
fn check_order(packages: &[PackageRepr], order: &ServiceOrder) -> Result<(), StartError> {
    let mut seen = HashSet::new();
    for resolved in order.iter() {
        let matches = packages
            .get(resolved.key.package)
            .and_then(|p| p.services().get(resolved.key.service))
            .is_some_and(|s| s.id() == &resolved.id);
        if !matches || !seen.insert(resolved.key) {
            return Err(StartError::OrderMismatch(resolved.id.clone()));
        }
    }

    let ordered: HashSet<&ServiceId> = order.ids().collect();
    let mut services = packages.iter().flat_map(PackageRepr::services);
    if let Some(missing) = services.find(|s| !ordered.contains(s.id())) {
        return Err(StartError::OrderMismatch(missing.id().clone()));
    }
    Ok(())
}

fn check_factories(
    order: &ServiceOrder,
    factories: &BTreeMap<ServiceId, Box<dyn DynFactory>>,
) -> Result<(), StartError> {
    if let Some(id) = order.ids().find(|id| !factories.contains_key(*id)) {
        return Err(StartError::MissingFactory(id.clone()));
    }
    let ordered: HashSet<&ServiceId> = order.ids().collect();
    if let Some(id) = factories.keys().find(|id| !ordered.contains(id)) {
        return Err(StartError::UnknownFactory(id.clone()));
    }
    Ok(())
}

/// Handed to a factory while its service is constructed.
///
/// Provides the instances bound to the service's references and its finalized
/// properties. Only valid for the duration of the factory call.
pub struct ServiceOptions<'a> {
    id: &'a ServiceId,
    properties: &'a Properties,
    references: &'a BTreeMap<String, ResolvedInstances>,
}
impl<'a> ServiceOptions<'a> {
    pub(crate) fn new(
        id: &'a ServiceId,
        properties: &'a Properties,
        references: &'a BTreeMap<String, ResolvedInstances>,
    ) -> Self {
        ServiceOptions {
            id,
            properties,
            references,
        }
    }

    /// The service being constructed
    pub fn id(&self) -> &'a ServiceId {
        self.id
    }

    pub fn properties(&self) -> &'a Properties {
        self.properties
    }

    /// Resolve a reference, e.g. `Arc<Logger>` for a unique reference or `Vec<Arc<Layer>>` for `many`
    pub fn reference<R: Resolver>(&self, name: &str) -> Result<R, InjectError> {
        R::resolve(name, self.references.get(name))
    }

    /// Names of all references of the service
    pub fn reference_names(&self) -> impl Iterator<Item = &'a str> {
        self.references.keys().map(String::as_str)
    }

    /// Deserialize a property value
    pub fn property<T: DeserializeOwned>(&self, key: &str) -> Result<T, InjectError> {
        let value = self
            .properties
            .get(key)
            .ok_or_else(|| InjectError::PropertyMissing(key.to_string()))?;

        T::deserialize(value).map_err(|e| InjectError::PropertyInvalid {
            key: key.to_string(),
            message: e.to_string(),
        })
    }
}
