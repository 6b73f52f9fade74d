use crate::{errors::InjectError, reference_spec::Cardinality, types::Instance};

pub mod all;
pub mod arc;

/// Instances bound to one reference of a service
#[derive(Debug, Clone)]
pub enum ResolvedInstances {
    One(Instance),
    Many(Vec<Instance>),
}
impl ResolvedInstances {
    pub fn cardinality(&self) -> Cardinality {
        match self {
            ResolvedInstances::One(_) => Cardinality::One,
            ResolvedInstances::Many(_) => Cardinality::Many,
        }
    }

    pub fn instances(&self) -> &[Instance] {
        match self {
            ResolvedInstances::One(instance) => std::slice::from_ref(instance),
            ResolvedInstances::Many(instances) => instances,
        }
    }
}

/// Allows custom behaviour on injection
///
/// `reference` is `None` if the service declares no reference called `name`.
pub trait Resolver: Sized {
    fn resolve(name: &str, reference: Option<&ResolvedInstances>) -> Result<Self, InjectError>;
}
