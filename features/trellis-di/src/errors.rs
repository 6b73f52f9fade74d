use std::sync::Arc;

use thiserror::Error;

use crate::{
    dependency_graph::ResolveError,
    reference_spec::Cardinality,
    types::{DynError, ServiceId},
};

/// Classification of runtime errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The metadata document is structurally wrong
    InvalidMetadata,
    /// An override names a property the package never declared
    InvalidPropertyName,
    /// A required property resolved to null
    RequiredProperty,
    /// The tool producing the metadata is broken (e.g. an invalid package name)
    Internal,
    ReferenceNotFound,
    AmbiguousReference,
    CyclicDependency,
    /// A service constructor returned an error
    ServiceFailed,
}

/// Errors while validating package and service metadata
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Invalid metadata: {0}.")]
    InvalidMetadata(String),

    #[error("Unexpected property name '{key}' for package '{package}': the property does not exist.")]
    InvalidPropertyName { package: String, key: String },

    /// `owner` is the package name, or the service id for service-scoped properties
    #[error("'{owner}' requires the property '{key}' to be initialized to a non-null value.")]
    RequiredProperty { owner: String, key: String },

    #[error("Invalid package name: '{0}'.")]
    InvalidPackageName(String),
}
impl MetadataError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MetadataError::InvalidMetadata(_) => ErrorKind::InvalidMetadata,
            MetadataError::InvalidPropertyName { .. } => ErrorKind::InvalidPropertyName,
            MetadataError::RequiredProperty { .. } => ErrorKind::RequiredProperty,
            MetadataError::InvalidPackageName(_) => ErrorKind::Internal,
        }
    }
}

/// Errors while starting the container
#[derive(Error, Debug, Clone)]
pub enum StartError {
    /// The service graph could not be resolved
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("No factory has been registered for service '{0}'")]
    MissingFactory(ServiceId),

    #[error("A factory has been registered for '{0}', but no loaded package declares that service")]
    UnknownFactory(ServiceId),

    /// The service order was not produced from the packages handed to the container
    #[error("The service order does not match the loaded packages at '{0}'")]
    OrderMismatch(ServiceId),

    /// A service constructor failed
    #[error("Factory for '{service}' failed - error: {error}")]
    ServiceFailed {
        service: ServiceId,
        error: Arc<DynError>,
    },
}
impl StartError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StartError::Resolve(e) => e.kind(),
            StartError::MissingFactory(_) | StartError::UnknownFactory(_) => {
                ErrorKind::InvalidMetadata
            }
            StartError::OrderMismatch(_) => ErrorKind::Internal,
            StartError::ServiceFailed { .. } => ErrorKind::ServiceFailed,
        }
    }
}

/// Errors when looking up services on a running container
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("No service provides the interface '{interface}'{}", qualifier_suffix(.qualifier))]
    InterfaceMissing {
        interface: String,
        qualifier: Option<String>,
    },

    #[error("The interface '{interface}' is provided by multiple services: {candidates:?} - use a qualifier")]
    Ambiguous {
        interface: String,
        candidates: Vec<ServiceId>,
    },

    /// Packages may only look up interfaces declared in their UI references
    #[error("Package '{package}' did not declare a UI reference to '{interface}'{}", qualifier_suffix(.qualifier))]
    UndeclaredReference {
        package: String,
        interface: String,
        qualifier: Option<String>,
    },

    #[error("Failed to downcast, required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        required_type: &'static str,
        actual_type: &'static str,
    },
}

fn qualifier_suffix(qualifier: &Option<String>) -> String {
    match qualifier {
        Some(q) => format!(" with qualifier '{q}'"),
        None => String::new(),
    }
}

/// Errors when a service constructor accesses its references or properties
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InjectError {
    #[error("The service has no reference named '{0}'")]
    ReferenceMissing(String),

    #[error("Reference '{name}' has cardinality '{actual}', but '{requested}' was requested")]
    CardinalityMismatch {
        name: String,
        requested: Cardinality,
        actual: Cardinality,
    },

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("The service has no property named '{0}'")]
    PropertyMissing(String),

    #[error("Property '{key}' has an unexpected value: {message}")]
    PropertyInvalid { key: String, message: String },
}
