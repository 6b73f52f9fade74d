use std::{
    any::{type_name, Any},
    collections::BTreeMap,
    fmt::{Debug, Display},
    sync::Arc,
};

/// Errors returned by service constructors and release hooks
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Finalized property values, keyed by property name
pub type Properties = BTreeMap<String, serde_json::Value>;

/// A constructed service.
///
/// Instances are shared with every dependent service and with external callers,
/// so they must be `Send + Sync + 'static`.
pub trait Service: Send + Sync + 'static {
    /// Release hook, called once when the container stops.
    fn destroy(&self) -> Result<(), DynError> {
        Ok(())
    }
}

/// Identity of a service: `<package>::<service>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId {
    package: String,
    service: String,
}
impl ServiceId {
    pub fn new(package: impl Into<String>, service: impl Into<String>) -> Self {
        ServiceId {
            package: package.into(),
            service: service.into(),
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn service(&self) -> &str {
        &self.service
    }
}
impl Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}", self.package, self.service)
    }
}

/// Instance of a constructed service
#[derive(Clone)]
pub struct Instance {
    id: ServiceId,
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync + 'static>,
    service: Arc<dyn Service>,
}
impl Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .finish()
    }
}

impl Instance {
    pub(crate) fn new<T: Service>(id: ServiceId, instance: T) -> Self {
        let instance = Arc::new(instance);
        Instance {
            id,
            type_name: type_name::<T>(),
            value: instance.clone(),
            service: instance,
        }
    }

    /// The service this instance was constructed for
    pub fn id(&self) -> &ServiceId {
        &self.id
    }

    /// Rust type name of the constructed value
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Downcast to the concrete service type - returns the actual type name on mismatch
    pub fn downcast<T: Service>(&self) -> Result<Arc<T>, &'static str> {
        match Arc::downcast::<T>(self.value.clone()) {
            Ok(downcasted) => Ok(downcasted),
            Err(_) => Err(self.type_name),
        }
    }

    pub(crate) fn destroy(&self) -> Result<(), DynError> {
        self.service.destroy()
    }
}
