use std::sync::Arc;

use crate::{
    errors::InjectError,
    reference_spec::Cardinality,
    resolver::{arc::downcast, ResolvedInstances, Resolver},
    types::{Instance, Service},
};

impl Resolver for Vec<Instance> {
    fn resolve(name: &str, reference: Option<&ResolvedInstances>) -> Result<Self, InjectError> {
        match reference {
            Some(ResolvedInstances::Many(instances)) => Ok(instances.clone()),
            Some(ResolvedInstances::One(_)) => Err(InjectError::CardinalityMismatch {
                name: name.to_string(),
                requested: Cardinality::Many,
                actual: Cardinality::One,
            }),
            None => Err(InjectError::ReferenceMissing(name.to_string())),
        }
    }
}

impl<T: Service> Resolver for Vec<Arc<T>> {
    fn resolve(name: &str, reference: Option<&ResolvedInstances>) -> Result<Self, InjectError> {
        Vec::<Instance>::resolve(name, reference)?
            .iter()
            .map(|instance| downcast(instance).map_err(InjectError::from))
            .collect()
    }
}
