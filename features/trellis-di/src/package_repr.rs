use std::sync::LazyLock;

use regex::Regex;
use trellis_config::{ApplicationProperties, Overrides};

use crate::{
    errors::MetadataError,
    metadata::{OrderedMap, PackageMetadata},
    properties::customize_properties,
    reference_spec::{parse_reference_spec, ReferenceSpec},
    service_repr::ServiceRepr,
    types::Properties,
};

// Same grammar as npm package names (http://json.schemastore.org/package)
static NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:@[a-z0-9\-*~][a-z0-9\-*._~]*/)?[a-z0-9\-~][a-z0-9\-._~]*$")
        .expect("package name pattern is valid")
});

/// Returns true if `name` is a valid package name, e.g. `map` or `@scope/map`
pub fn is_valid_package_name(name: &str) -> bool {
    NAME_REGEX.is_match(name)
}

/// Validated package with its services, UI references and finalized properties
#[derive(Debug, Clone)]
pub struct PackageRepr {
    name: String,
    services: Vec<ServiceRepr>,
    ui_references: Vec<ReferenceSpec>,
    properties: Properties,
}

impl PackageRepr {
    /// Creates a package from its metadata and the application's overrides for it
    pub fn create(
        metadata: &PackageMetadata,
        custom_properties: Option<&Overrides>,
    ) -> Result<Self, MetadataError> {
        let name = &metadata.name;
        let properties = customize_properties(name, &metadata.properties, custom_properties)?;

        let mut services = Vec::with_capacity(metadata.services.len());
        for (key, service) in metadata.services.iter() {
            if key != service.name {
                return Err(MetadataError::InvalidMetadata(format!(
                    "service name mismatch in package '{name}': key '{key}' declares service '{}'",
                    service.name
                )));
            }
            services.push(ServiceRepr::create(name, service, &properties)?);
        }

        let ui_references = metadata
            .ui
            .references
            .iter()
            .map(parse_reference_spec)
            .collect::<Result<Vec<_>, _>>()?;

        let package = PackageRepr::new(name.clone(), services, ui_references, properties)?;
        tracing::debug!(
            "Created package '{}' with {} service(s) and {} UI reference(s)",
            package.name,
            package.services.len(),
            package.ui_references.len()
        );
        Ok(package)
    }

    /// Assembles a package from already validated parts.
    ///
    /// Fails with [`MetadataError::InvalidPackageName`] if the name does not match the package name grammar.
    pub fn new(
        name: String,
        services: Vec<ServiceRepr>,
        ui_references: Vec<ReferenceSpec>,
        properties: Properties,
    ) -> Result<Self, MetadataError> {
        if !is_valid_package_name(&name) {
            return Err(MetadataError::InvalidPackageName(name));
        }

        Ok(PackageRepr {
            name,
            services,
            ui_references,
            properties,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Services in declaration order
    pub fn services(&self) -> &[ServiceRepr] {
        &self.services
    }

    pub fn service(&self, name: &str) -> Option<&ServiceRepr> {
        self.services.iter().find(|s| s.name() == name)
    }

    /// Interfaces required by the package's UI code
    pub fn ui_references(&self) -> &[ReferenceSpec] {
        &self.ui_references
    }

    /// Resolved (perhaps customized) package properties
    pub fn properties(&self) -> &Properties {
        &self.properties
    }
}

/// Creates all packages of an application, in declaration order.
///
/// Each package receives the overrides registered under its name.
pub fn create_packages(
    packages: &OrderedMap<PackageMetadata>,
    custom_properties: Option<&ApplicationProperties>,
) -> Result<Vec<PackageRepr>, MetadataError> {
    if let Some(custom) = custom_properties {
        for unknown in custom.package_names().filter(|n| !packages.contains_key(n)) {
            tracing::warn!("Ignoring properties for package '{unknown}': the package is not loaded");
        }
    }

    packages
        .iter()
        .map(|(name, metadata)| {
            if name != metadata.name {
                return Err(MetadataError::InvalidMetadata(format!(
                    "package name mismatch: key '{name}' declares package '{}'",
                    metadata.name
                )));
            }
            PackageRepr::create(metadata, custom_properties.and_then(|c| c.get(name)))
        })
        .collect()
}
