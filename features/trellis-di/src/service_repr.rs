use std::fmt::Display;

use trellis_config::Overrides;

use crate::{
    errors::MetadataError,
    metadata::{InterfaceDeclaration, ServiceMetadata},
    properties::customize_properties,
    reference_spec::{parse_reference_spec, ReferenceSpec},
    types::{Properties, ServiceId},
};

/// An interface provided by a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSpec {
    name: String,
    qualifier: Option<String>,
}
impl InterfaceSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }
}
impl Display for InterfaceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{} (qualifier '{qualifier}')", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Validated service of a package.
///
/// Created once while its package is created and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ServiceRepr {
    id: ServiceId,
    provides: Vec<InterfaceSpec>,
    references: Vec<(String, ReferenceSpec)>,
    properties: Properties,
}

impl ServiceRepr {
    /// Validates the service metadata and computes the service's properties.
    ///
    /// When the service declares its own `properties`, it receives exactly those,
    /// with the package's (non-null) values for the same keys applied on top of
    /// the service defaults. Otherwise it is bound to all package properties.
    pub fn create(
        package_name: &str,
        metadata: &ServiceMetadata,
        package_properties: &Properties,
    ) -> Result<Self, MetadataError> {
        if metadata.name.trim().is_empty() {
            return Err(MetadataError::InvalidMetadata(format!(
                "a service of package '{package_name}' has no name"
            )));
        }
        let id = ServiceId::new(package_name, metadata.name.clone());

        let mut provides: Vec<InterfaceSpec> = Vec::with_capacity(metadata.provides.len());
        for declaration in &metadata.provides {
            let spec = parse_interface(&id, declaration)?;
            if provides.iter().any(|p| p.name == spec.name) {
                return Err(MetadataError::InvalidMetadata(format!(
                    "service '{id}' provides the interface '{}' more than once",
                    spec.name
                )));
            }
            provides.push(spec);
        }

        let mut references = Vec::with_capacity(metadata.references.len());
        for (reference_name, declaration) in metadata.references.iter() {
            if reference_name.trim().is_empty() {
                return Err(MetadataError::InvalidMetadata(format!(
                    "service '{id}' declares a reference without a name"
                )));
            }
            let spec = parse_reference_spec(declaration).map_err(|e| match e {
                MetadataError::InvalidMetadata(message) => MetadataError::InvalidMetadata(
                    format!("{message} (reference '{reference_name}' of service '{id}')"),
                ),
                other => other,
            })?;
            references.push((reference_name.to_string(), spec));
        }

        let properties = match &metadata.properties {
            None => package_properties.clone(),
            Some(declared) => {
                let from_package: Overrides = declared
                    .keys()
                    .filter_map(|key| {
                        package_properties
                            .get(key)
                            .filter(|value| !value.is_null())
                            .map(|value| (key.to_string(), value.clone()))
                    })
                    .collect();
                customize_properties(&id.to_string(), declared, Some(&from_package))?
            }
        };

        tracing::trace!(
            "Created service '{}' providing {} interface(s) with {} reference(s)",
            id,
            provides.len(),
            references.len()
        );

        Ok(ServiceRepr {
            id,
            provides,
            references,
            properties,
        })
    }

    pub fn id(&self) -> &ServiceId {
        &self.id
    }

    pub fn name(&self) -> &str {
        self.id.service()
    }

    /// Interfaces provided by this service
    pub fn provides(&self) -> &[InterfaceSpec] {
        &self.provides
    }

    /// Named references in declaration order
    pub fn references(&self) -> &[(String, ReferenceSpec)] {
        &self.references
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }
}

fn parse_interface(
    id: &ServiceId,
    declaration: &InterfaceDeclaration,
) -> Result<InterfaceSpec, MetadataError> {
    let (name, qualifier) = match declaration {
        InterfaceDeclaration::Name(name) => (name, None),
        InterfaceDeclaration::Detailed(detailed) => (&detailed.name, detailed.qualifier.as_ref()),
    };

    if name.trim().is_empty() {
        return Err(MetadataError::InvalidMetadata(format!(
            "service '{id}' provides an interface without a name"
        )));
    }
    if qualifier.is_some_and(|q| q.trim().is_empty()) {
        return Err(MetadataError::InvalidMetadata(format!(
            "service '{id}' provides '{name}' with an empty qualifier"
        )));
    }

    Ok(InterfaceSpec {
        name: name.clone(),
        qualifier: qualifier.cloned(),
    })
}
