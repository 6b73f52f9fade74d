use std::{any::type_name, marker::PhantomData};

use crate::{
    initiator::ServiceOptions,
    types::{DynError, Instance, Service},
};

/// A Factory constructing the instance of a declared service
///
/// Factories are registered per service id. The container calls `construct`
/// once, after every provider the service references has been constructed.
pub trait ServiceFactory: Send {
    type Provides: Service;
    type Error: Into<DynError>;

    /// Returns the type name of the constructed service
    fn supplies() -> &'static str {
        type_name::<Self::Provides>()
    }

    /// Constructs the service from its resolved references and properties
    fn construct(&mut self, options: ServiceOptions<'_>) -> Result<Self::Provides, Self::Error>;
}

/// Wrapper Trait for factories, providing type erased instances
pub trait DynFactory: Send {
    fn supplies(&self) -> &'static str;

    fn construct(&mut self, options: ServiceOptions<'_>) -> Result<Instance, DynError>;
}
// Impl DynFactory for any ServiceFactory
impl<SpecificFactory: ServiceFactory> DynFactory for SpecificFactory {
    fn supplies(&self) -> &'static str {
        <SpecificFactory as ServiceFactory>::supplies()
    }

    fn construct(&mut self, options: ServiceOptions<'_>) -> Result<Instance, DynError> {
        let id = options.id().clone();
        // Forward the call to the specific implementation
        ServiceFactory::construct(self, options)
            .map(|service| Instance::new(id, service))
            .map_err(Into::into)
    }
}

/// Factory backed by a closure, see [`factory_fn`]
pub struct FnFactory<F, T, E> {
    construct: F,
    _marker: PhantomData<fn() -> (T, E)>,
}

/// Wraps a closure into a [`ServiceFactory`]
///
/// ```rust
/// use trellis_di::{factory_fn, DynError, Service, ServiceOptions};
///
/// struct Greeter(String);
/// impl Service for Greeter {}
///
/// let factory = factory_fn(|options: ServiceOptions<'_>| {
///     Ok::<_, DynError>(Greeter(options.property("greeting")?))
/// });
/// ```
pub fn factory_fn<F, T, E>(construct: F) -> FnFactory<F, T, E>
where
    F: FnMut(ServiceOptions<'_>) -> Result<T, E> + Send,
    T: Service,
    E: Into<DynError>,
{
    FnFactory {
        construct,
        _marker: PhantomData,
    }
}

impl<F, T, E> ServiceFactory for FnFactory<F, T, E>
where
    F: FnMut(ServiceOptions<'_>) -> Result<T, E> + Send,
    T: Service,
    E: Into<DynError>,
{
    type Provides = T;
    type Error = E;

    fn construct(&mut self, options: ServiceOptions<'_>) -> Result<T, E> {
        (self.construct)(options)
    }
}

/// Factory handing out an instance that was created by the application
pub struct Prebuilt<T>(Option<T>);
impl<T: Service> Prebuilt<T> {
    pub fn new(instance: T) -> Self {
        Prebuilt(Some(instance))
    }
}
impl<T: Service> ServiceFactory for Prebuilt<T> {
    type Provides = T;
    type Error = DynError;

    fn construct(&mut self, options: ServiceOptions<'_>) -> Result<T, DynError> {
        self.0.take().ok_or_else(|| {
            format!("the instance of '{}' has already been handed out", options.id()).into()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;
    use crate::types::{Properties, ServiceId};

    struct Counter {
        start: u64,
    }
    impl Service for Counter {}

    #[test]
    fn closure_factory_constructs_instance() {
        let id = ServiceId::new("app", "Counter");
        let properties = Properties::from([("start".to_string(), json!(5))]);
        let references = BTreeMap::new();

        let mut factory: Box<dyn DynFactory> = Box::new(factory_fn(|options: ServiceOptions<'_>| {
            Ok::<_, DynError>(Counter {
                start: options.property("start")?,
            })
        }));
        assert!(factory.supplies().ends_with("Counter"));

        let instance = factory
            .construct(ServiceOptions::new(&id, &properties, &references))
            .unwrap();
        assert_eq!(instance.id(), &id);
        assert_eq!(instance.downcast::<Counter>().unwrap().start, 5);
    }

    #[test]
    fn closure_factory_error_is_forwarded() {
        let id = ServiceId::new("app", "Counter");
        let properties = Properties::new();
        let references = BTreeMap::new();

        let mut factory = factory_fn(|options: ServiceOptions<'_>| {
            Ok::<_, DynError>(Counter {
                start: options.property("start")?,
            })
        });
        let err = DynFactory::construct(&mut factory, ServiceOptions::new(&id, &properties, &references))
            .unwrap_err();
        assert!(err.to_string().contains("start"));
    }

    #[test]
    fn prebuilt_is_handed_out_once() {
        let id = ServiceId::new("app", "Counter");
        let properties = Properties::new();
        let references = BTreeMap::new();

        let mut factory = Prebuilt::new(Counter { start: 1 });
        let instance =
            DynFactory::construct(&mut factory, ServiceOptions::new(&id, &properties, &references))
                .unwrap();
        assert_eq!(instance.downcast::<Counter>().unwrap().start, 1);

        assert!(
            DynFactory::construct(&mut factory, ServiceOptions::new(&id, &properties, &references))
                .is_err()
        );
    }
}
