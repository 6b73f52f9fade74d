use std::collections::BTreeMap;

use trellis_config::ApplicationProperties;

use crate::{
    container::RunningContainer,
    dependency_graph::{resolve, ResolveError, ServiceOrder},
    errors::{MetadataError, StartError},
    factories::{DynFactory, Prebuilt, ServiceFactory},
    initiator::ContainerInitiator,
    metadata::{OrderedMap, PackageMetadata},
    package_repr::{create_packages, PackageRepr},
    types::{Service, ServiceId},
};

//////////////////////////////////////////////////////////////////////
///
/// Starting an application consists of three parts.
/// 1. Packages are created from their metadata and registered here, along with a factory per service
/// 2. The service graph is resolved into a dependency-first order
/// 3. The container constructs every service in that order
pub struct ContainerBuilder {
    /// Loaded packages, in declaration order
    pub(crate) packages: Vec<PackageRepr>,
    /// Registered factories, one per service
    pub(crate) factories: BTreeMap<ServiceId, Box<dyn DynFactory>>,
}
impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerBuilder {
    pub fn new() -> Self {
        ContainerBuilder {
            packages: Vec::new(),
            factories: BTreeMap::new(),
        }
    }

    /// Creates all packages from their metadata, see [`create_packages`]
    pub fn from_metadata(
        packages: &OrderedMap<PackageMetadata>,
        custom_properties: Option<&ApplicationProperties>,
    ) -> Result<Self, MetadataError> {
        Ok(Self::new().add_packages(create_packages(packages, custom_properties)?))
    }
}
impl ContainerBuilder {
    pub fn add_package(mut self, package: PackageRepr) -> Self {
        self.packages.push(package);
        self
    }

    pub fn add_packages(mut self, packages: impl IntoIterator<Item = PackageRepr>) -> Self {
        self.packages.extend(packages);
        self
    }

    /// Registers the factory for the service `service` of package `package`
    pub fn add_factory<Factory: ServiceFactory + 'static>(
        mut self,
        package: &str,
        service: &str,
        factory: Factory,
    ) -> Self {
        let id = ServiceId::new(package, service);
        if self.factories.insert(id.clone(), Box::new(factory)).is_some() {
            tracing::warn!("Replaced the factory registered for '{id}'");
        }
        self
    }

    /// Registers an already created instance for a declared service
    pub fn add_instance<T: Service>(self, package: &str, service: &str, instance: T) -> Self {
        self.add_factory(package, service, Prebuilt::new(instance))
    }

    pub fn packages(&self) -> &[PackageRepr] {
        &self.packages
    }

    /// Resolves the service graph of the registered packages
    pub fn resolve(&self) -> Result<ServiceOrder, ResolveError> {
        resolve(&self.packages)
    }

    /// Constructs all services in the given order
    pub fn start(self, order: ServiceOrder) -> Result<RunningContainer, StartError> {
        ContainerInitiator::new().initiate(self, order)
    }

    /// Resolves the service graph and starts the container
    pub fn build(self) -> Result<RunningContainer, StartError> {
        let order = self.resolve()?;
        self.start(order)
    }
}
