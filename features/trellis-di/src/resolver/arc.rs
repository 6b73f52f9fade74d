use std::{any::type_name, sync::Arc};

use crate::{
    errors::{InjectError, LookupError},
    reference_spec::Cardinality,
    resolver::{ResolvedInstances, Resolver},
    types::{Instance, Service},
};

impl Resolver for Instance {
    fn resolve(name: &str, reference: Option<&ResolvedInstances>) -> Result<Self, InjectError> {
        match reference {
            Some(ResolvedInstances::One(instance)) => Ok(instance.clone()),
            Some(ResolvedInstances::Many(_)) => Err(InjectError::CardinalityMismatch {
                name: name.to_string(),
                requested: Cardinality::One,
                actual: Cardinality::Many,
            }),
            None => Err(InjectError::ReferenceMissing(name.to_string())),
        }
    }
}

impl<T: Service> Resolver for Arc<T> {
    fn resolve(name: &str, reference: Option<&ResolvedInstances>) -> Result<Self, InjectError> {
        let instance = Instance::resolve(name, reference)?;
        Ok(downcast(&instance)?)
    }
}

impl<Resolvable: Resolver> Resolver for Option<Resolvable> {
    fn resolve(name: &str, reference: Option<&ResolvedInstances>) -> Result<Self, InjectError> {
        // An undeclared reference does not fail for Option
        match reference {
            Some(_) => Resolvable::resolve(name, reference).map(Some),
            None => Ok(None),
        }
    }
}

/// Downcast an instance to its concrete service type
pub(crate) fn downcast<T: Service>(instance: &Instance) -> Result<Arc<T>, LookupError> {
    instance
        .downcast::<T>()
        .map_err(|actual_type| LookupError::DowncastFailed {
            required_type: type_name::<T>(),
            actual_type,
        })
}
