use std::{
    collections::{BTreeMap, HashSet},
    fmt::Display,
};

use thiserror::Error;

use crate::{
    errors::ErrorKind,
    package_repr::PackageRepr,
    reference_spec::{Cardinality, ReferenceSpec},
    types::ServiceId,
};

/// Position of a service: index of its package and index within that package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceKey {
    pub package: usize,
    pub service: usize,
}

/// The provider(s) a reference was bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedReference {
    One(ServiceKey),
    Many(Vec<ServiceKey>),
}

/// A service together with the providers of each of its references
#[derive(Debug, Clone)]
pub struct ResolvedService {
    pub key: ServiceKey,
    pub id: ServiceId,
    /// Resolved references in declaration order
    pub references: Vec<(String, ResolvedReference)>,
}

#[derive(Debug, Clone)]
struct Provider {
    key: ServiceKey,
    id: ServiceId,
    qualifier: Option<String>,
}

/// Index from interface name to the services providing it.
///
/// Providers are kept in package declaration order, then service declaration order.
#[derive(Debug, Clone, Default)]
pub struct ProviderIndex {
    by_interface: BTreeMap<String, Vec<Provider>>,
}
impl ProviderIndex {
    pub fn new(packages: &[PackageRepr]) -> Self {
        let mut index = ProviderIndex::default();
        for (package_index, package) in packages.iter().enumerate() {
            for (service_index, service) in package.services().iter().enumerate() {
                for interface in service.provides() {
                    index
                        .by_interface
                        .entry(interface.name().to_string())
                        .or_default()
                        .push(Provider {
                            key: ServiceKey {
                                package: package_index,
                                service: service_index,
                            },
                            id: service.id().clone(),
                            qualifier: interface.qualifier().map(str::to_string),
                        });
                }
            }
        }
        index
    }

    /// Providers of `interface`, restricted to `qualifier` if given
    pub fn candidates(
        &self,
        interface: &str,
        qualifier: Option<&str>,
    ) -> Vec<(ServiceKey, &ServiceId)> {
        self.by_interface
            .get(interface)
            .into_iter()
            .flatten()
            .filter(|p| qualifier.is_none() || p.qualifier.as_deref() == qualifier)
            .map(|p| (p.key, &p.id))
            .collect()
    }

    /// Names of all provided interfaces
    pub fn interfaces(&self) -> impl Iterator<Item = &str> {
        self.by_interface.keys().map(String::as_str)
    }
}

/// Who declared a reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependent {
    Service(ServiceId),
    /// UI code of the named package
    Ui(String),
}
impl Display for Dependent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dependent::Service(id) => write!(f, "service '{id}'"),
            Dependent::Ui(package) => write!(f, "the UI of package '{package}'"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("{dependent} requires '{spec}' (reference '{reference}'), but no service provides it")]
    ReferenceNotFound {
        dependent: Dependent,
        reference: String,
        spec: ReferenceSpec,
    },
    #[error("{dependent} requires '{spec}' (reference '{reference}'), but it is provided by multiple services: {} - consider using a qualifier", join_ids(.candidates))]
    AmbiguousReference {
        dependent: Dependent,
        reference: String,
        spec: ReferenceSpec,
        candidates: Vec<ServiceId>,
    },
    /// `cycle` starts and ends with the same service
    #[error("A cyclic dependency exists between services: {}", join_ids(.cycle))]
    CyclicDependency { cycle: Vec<ServiceId> },
    /// Package names identify services and UI references, so they must be unique
    #[error("The package '{0}' has been loaded more than once")]
    DuplicatePackage(String),
}
impl ResolveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolveError::ReferenceNotFound { .. } => ErrorKind::ReferenceNotFound,
            ResolveError::AmbiguousReference { .. } => ErrorKind::AmbiguousReference,
            ResolveError::CyclicDependency { .. } => ErrorKind::CyclicDependency,
            ResolveError::DuplicatePackage(_) => ErrorKind::InvalidMetadata,
        }
    }
}

fn join_ids(ids: &[ServiceId]) -> String {
    ids.iter()
        .map(ServiceId::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Services in dependency-first order: a provider always precedes its dependents
#[derive(Debug, Clone, Default)]
pub struct ServiceOrder {
    services: Vec<ResolvedService>,
    ui_references: BTreeMap<String, Vec<(ReferenceSpec, ResolvedReference)>>,
    index: ProviderIndex,
}
impl ServiceOrder {
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ResolvedService> {
        self.services.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ServiceId> {
        self.services.iter().map(|s| &s.id)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Resolved UI references of a package
    pub fn ui_references(&self, package: &str) -> &[(ReferenceSpec, ResolvedReference)] {
        self.ui_references
            .get(package)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn index(&self) -> &ProviderIndex {
        &self.index
    }
}

/// Resolves the references of all services and computes the instantiation order
pub fn resolve(packages: &[PackageRepr]) -> Result<ServiceOrder, ResolveError> {
    DependencyGraph::new(packages).resolve()
}

/// Graph over all services of an application
pub struct DependencyGraph<'a> {
    packages: &'a [PackageRepr],
    index: ProviderIndex,
    /// All services in declaration order; node ids are positions in this list
    nodes: Vec<ServiceKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Not visited yet
    White,
    /// On the current DFS path
    Gray,
    /// Done, all dependencies are ordered before it
    Black,
}

impl<'a> DependencyGraph<'a> {
    pub fn new(packages: &'a [PackageRepr]) -> Self {
        let nodes = packages
            .iter()
            .enumerate()
            .flat_map(|(package, p)| {
                (0..p.services().len()).map(move |service| ServiceKey { package, service })
            })
            .collect();

        DependencyGraph {
            packages,
            index: ProviderIndex::new(packages),
            nodes,
        }
    }

    /// Resolves every reference and sorts the services topologically
    pub fn resolve(self) -> Result<ServiceOrder, ResolveError> {
        let mut names = HashSet::with_capacity(self.packages.len());
        if let Some(duplicate) = self.packages.iter().find(|p| !names.insert(p.name())) {
            return Err(ResolveError::DuplicatePackage(duplicate.name().to_string()));
        }

        let mut resolved = Vec::with_capacity(self.nodes.len());
        for key in &self.nodes {
            let service = &self.packages[key.package].services()[key.service];
            let dependent = Dependent::Service(service.id().clone());
            let references = service
                .references()
                .iter()
                .map(|(name, spec)| {
                    self.resolve_reference(&dependent, name, spec)
                        .map(|reference| (name.clone(), reference))
                })
                .collect::<Result<Vec<_>, _>>()?;

            resolved.push(ResolvedService {
                key: *key,
                id: service.id().clone(),
                references,
            });
        }

        let mut ui_references = BTreeMap::new();
        for package in self.packages {
            let dependent = Dependent::Ui(package.name().to_string());
            let mut package_refs = Vec::with_capacity(package.ui_references().len());
            for spec in package.ui_references() {
                let reference = spec.interface_name();
                let bound = self.resolve_reference(&dependent, reference, spec)?;
                package_refs.push((spec.clone(), bound));
            }
            ui_references.insert(package.name().to_string(), package_refs);
        }

        let order = self.sort(&resolved)?;
        tracing::debug!(
            "Resolved service order: [{}]",
            order.iter().map(|&n| resolved[n].id.to_string()).collect::<Vec<_>>().join(", ")
        );

        let mut slots: Vec<Option<ResolvedService>> = resolved.into_iter().map(Some).collect();
        let services = order
            .into_iter()
            .filter_map(|node| slots[node].take())
            .collect();

        Ok(ServiceOrder {
            services,
            ui_references,
            index: self.index,
        })
    }

    fn resolve_reference(
        &self,
        dependent: &Dependent,
        reference: &str,
        spec: &ReferenceSpec,
    ) -> Result<ResolvedReference, ResolveError> {
        let candidates = self.index.candidates(spec.interface_name(), spec.qualifier());
        tracing::trace!(
            "{dependent}: reference '{reference}' to '{spec}' has {} candidate(s)",
            candidates.len()
        );

        match spec.cardinality() {
            Cardinality::Many => Ok(ResolvedReference::Many(
                candidates.into_iter().map(|(key, _)| key).collect(),
            )),
            Cardinality::One => match candidates.as_slice() {
                [] => Err(ResolveError::ReferenceNotFound {
                    dependent: dependent.clone(),
                    reference: reference.to_string(),
                    spec: spec.clone(),
                }),
                [(key, _)] => Ok(ResolvedReference::One(*key)),
                _ => Err(ResolveError::AmbiguousReference {
                    dependent: dependent.clone(),
                    reference: reference.to_string(),
                    spec: spec.clone(),
                    candidates: candidates.iter().map(|(_, id)| (*id).clone()).collect(),
                }),
            },
        }
    }

    /// Depth first topological sort with three colors.
    ///
    /// Returns node ids in dependency-first order.
    fn sort(&self, resolved: &[ResolvedService]) -> Result<Vec<usize>, ResolveError> {
        let node_of = |key: ServiceKey| {
            self.nodes
                .binary_search(&key)
                .expect("every provider key is a node")
        };
        let edges: Vec<Vec<usize>> = resolved
            .iter()
            .map(|service| {
                service
                    .references
                    .iter()
                    .flat_map(|(_, reference)| match reference {
                        ResolvedReference::One(key) => vec![*key],
                        ResolvedReference::Many(keys) => keys.clone(),
                    })
                    .map(node_of)
                    .collect()
            })
            .collect();

        let mut colors = vec![Color::White; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());
        // Current DFS path: each node with the index of its next edge to follow
        let mut path: Vec<(usize, usize)> = Vec::new();
        for root in 0..self.nodes.len() {
            if colors[root] != Color::White {
                continue;
            }
            colors[root] = Color::Gray;
            path.push((root, 0));

            while let Some((node, next_edge)) = path.last_mut() {
                let node = *node;
                let Some(&dependency) = edges[node].get(*next_edge) else {
                    path.pop();
                    colors[node] = Color::Black;
                    order.push(node);
                    continue;
                };
                *next_edge += 1;

                match colors[dependency] {
                    Color::Black => {}
                    Color::White => {
                        colors[dependency] = Color::Gray;
                        path.push((dependency, 0));
                    }
                    Color::Gray => {
                        // Revisiting a node on the current path closes a cycle
                        let start = path
                            .iter()
                            .position(|&(n, _)| n == dependency)
                            .expect("gray nodes are on the path");
                        let cycle = path[start..]
                            .iter()
                            .map(|&(n, _)| n)
                            .chain(std::iter::once(dependency))
                            .map(|n| resolved[n].id.clone())
                            .collect();
                        return Err(ResolveError::CyclicDependency { cycle });
                    }
                }
            }
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::metadata::{PackageMetadata, ServiceMetadata};

    fn packages(values: Vec<serde_json::Value>) -> Vec<PackageRepr> {
        values
            .into_iter()
            .map(|v| {
                let metadata: PackageMetadata = serde_json::from_value(v).unwrap();
                PackageRepr::create(&metadata, None).unwrap()
            })
            .collect()
    }

    fn ids(order: &ServiceOrder) -> Vec<String> {
        order.ids().map(ServiceId::to_string).collect()
    }

    #[test]
    fn providers_precede_dependents() {
        let packages = packages(vec![
            json!({
                "name": "app",
                "services": {
                    "Main": { "name": "Main", "references": { "map": "map.Map", "log": "log.Logger" } }
                }
            }),
            json!({
                "name": "map",
                "services": {
                    "Map": { "name": "Map", "provides": ["map.Map"], "references": { "log": "log.Logger" } }
                }
            }),
            json!({
                "name": "log",
                "services": { "Logger": { "name": "Logger", "provides": ["log.Logger"] } }
            }),
        ]);

        let order = resolve(&packages).unwrap();
        assert_eq!(ids(&order), vec!["log::Logger", "map::Map", "app::Main"]);

        let main = order.iter().last().unwrap();
        assert_eq!(
            main.references,
            vec![
                ("map".to_string(), ResolvedReference::One(ServiceKey { package: 1, service: 0 })),
                ("log".to_string(), ResolvedReference::One(ServiceKey { package: 2, service: 0 })),
            ]
        );
    }

    #[test]
    fn independent_services_keep_declaration_order() {
        let packages = packages(vec![
            json!({ "name": "b", "services": { "Y": { "name": "Y" }, "X": { "name": "X" } } }),
            json!({ "name": "a", "services": { "Z": { "name": "Z" } } }),
        ]);
        assert_eq!(ids(&resolve(&packages).unwrap()), vec!["b::Y", "b::X", "a::Z"]);
    }

    #[test]
    fn many_reference_collects_providers_in_declaration_order() {
        let packages = packages(vec![
            json!({
                "name": "app",
                "services": {
                    "Legend": {
                        "name": "Legend",
                        "references": { "layers": { "name": "map.Layer", "cardinality": "many" } }
                    },
                    "Osm": { "name": "Osm", "provides": ["map.Layer"] }
                }
            }),
            json!({
                "name": "extra",
                "services": { "Wms": { "name": "Wms", "provides": ["map.Layer"] } }
            }),
        ]);

        let order = resolve(&packages).unwrap();
        assert_eq!(ids(&order), vec!["app::Osm", "extra::Wms", "app::Legend"]);
        let legend = order.iter().find(|s| s.id.service() == "Legend").unwrap();
        assert_eq!(
            legend.references[0].1,
            ResolvedReference::Many(vec![
                ServiceKey { package: 0, service: 1 },
                ServiceKey { package: 1, service: 0 },
            ])
        );
    }

    #[test]
    fn many_reference_accepts_zero_providers() {
        let packages = packages(vec![json!({
            "name": "app",
            "services": {
                "Legend": {
                    "name": "Legend",
                    "references": { "layers": { "name": "map.Layer", "cardinality": "many" } }
                }
            }
        })]);
        let order = resolve(&packages).unwrap();
        assert_eq!(order.iter().next().unwrap().references[0].1, ResolvedReference::Many(vec![]));
    }

    #[test]
    fn missing_provider() {
        let packages = packages(vec![json!({
            "name": "app",
            "services": { "Main": { "name": "Main", "references": { "log": "log.Logger" } } }
        })]);

        let err = resolve(&packages).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReferenceNotFound);
        assert!(err.to_string().contains("service 'app::Main'"));
        assert!(err.to_string().contains("log.Logger"));
    }

    #[test]
    fn ambiguous_provider() {
        let packages = packages(vec![json!({
            "name": "app",
            "services": {
                "A": { "name": "A", "provides": ["log.Logger"] },
                "B": { "name": "B", "provides": ["log.Logger"] },
                "Main": { "name": "Main", "references": { "log": "log.Logger" } }
            }
        })]);

        let err = resolve(&packages).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AmbiguousReference);
        match err {
            ResolveError::AmbiguousReference { candidates, .. } => assert_eq!(
                candidates,
                vec![ServiceId::new("app", "A"), ServiceId::new("app", "B")]
            ),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn qualifier_selects_provider() {
        let packages = packages(vec![json!({
            "name": "app",
            "services": {
                "A": { "name": "A", "provides": [{ "name": "log.Logger", "qualifier": "console" }] },
                "B": { "name": "B", "provides": [{ "name": "log.Logger", "qualifier": "file" }] },
                "Main": {
                    "name": "Main",
                    "references": { "log": { "name": "log.Logger", "qualifier": "file" } }
                }
            }
        })]);

        let order = resolve(&packages).unwrap();
        let main = order.iter().find(|s| s.id.service() == "Main").unwrap();
        assert_eq!(
            main.references[0].1,
            ResolvedReference::One(ServiceKey { package: 0, service: 1 })
        );
    }

    #[test]
    fn unknown_qualifier_is_not_found() {
        let packages = packages(vec![json!({
            "name": "app",
            "services": {
                "A": { "name": "A", "provides": [{ "name": "log.Logger", "qualifier": "console" }] },
                "Main": {
                    "name": "Main",
                    "references": { "log": { "name": "log.Logger", "qualifier": "file" } }
                }
            }
        })]);
        assert_eq!(resolve(&packages).unwrap_err().kind(), ErrorKind::ReferenceNotFound);
    }

    #[test]
    fn duplicate_qualifiers() {
        // A unique reference cannot choose between equally qualified providers,
        // a `many` reference receives all of them.
        let packages = packages(vec![json!({
            "name": "app",
            "services": {
                "A": { "name": "A", "provides": [{ "name": "map.Layer", "qualifier": "base" }] },
                "B": { "name": "B", "provides": [{ "name": "map.Layer", "qualifier": "base" }] },
                "All": {
                    "name": "All",
                    "references": { "layers": { "name": "map.Layer", "qualifier": "base", "cardinality": "many" } }
                }
            }
        })]);
        let order = resolve(&packages).unwrap();
        let all = order.iter().find(|s| s.id.service() == "All").unwrap();
        assert_eq!(
            all.references[0].1,
            ResolvedReference::Many(vec![
                ServiceKey { package: 0, service: 0 },
                ServiceKey { package: 0, service: 1 },
            ])
        );

        let packages = packages_with_unique_base_reference();
        assert_eq!(resolve(&packages).unwrap_err().kind(), ErrorKind::AmbiguousReference);
    }

    fn packages_with_unique_base_reference() -> Vec<PackageRepr> {
        packages(vec![json!({
            "name": "app",
            "services": {
                "A": { "name": "A", "provides": [{ "name": "map.Layer", "qualifier": "base" }] },
                "B": { "name": "B", "provides": [{ "name": "map.Layer", "qualifier": "base" }] },
                "One": {
                    "name": "One",
                    "references": { "layer": { "name": "map.Layer", "qualifier": "base" } }
                }
            }
        })])
    }

    #[test]
    fn two_service_cycle() {
        let packages = packages(vec![json!({
            "name": "app",
            "services": {
                "A": { "name": "A", "provides": ["x.A"], "references": { "b": "x.B" } },
                "B": { "name": "B", "provides": ["x.B"], "references": { "a": "x.A" } }
            }
        })]);

        let err = resolve(&packages).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CyclicDependency);
        assert_eq!(
            err,
            ResolveError::CyclicDependency {
                cycle: vec![
                    ServiceId::new("app", "A"),
                    ServiceId::new("app", "B"),
                    ServiceId::new("app", "A"),
                ]
            }
        );
        assert!(err.to_string().contains("app::A -> app::B -> app::A"));
    }

    #[test]
    fn cycle_report_excludes_path_prefix() {
        let packages = packages(vec![json!({
            "name": "app",
            "services": {
                "Entry": { "name": "Entry", "references": { "a": "x.A" } },
                "A": { "name": "A", "provides": ["x.A"], "references": { "b": "x.B" } },
                "B": { "name": "B", "provides": ["x.B"], "references": { "c": "x.C" } },
                "C": { "name": "C", "provides": ["x.C"], "references": { "a": "x.A" } }
            }
        })]);

        match resolve(&packages).unwrap_err() {
            ResolveError::CyclicDependency { cycle } => {
                let cycle: Vec<_> = cycle.iter().map(|id| id.service().to_string()).collect();
                assert_eq!(cycle, vec!["A", "B", "C", "A"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let packages = packages(vec![json!({
            "name": "app",
            "services": {
                "A": { "name": "A", "provides": ["x.A"], "references": { "me": "x.A" } }
            }
        })]);
        assert_eq!(resolve(&packages).unwrap_err().kind(), ErrorKind::CyclicDependency);
    }

    #[test]
    fn ui_references_are_resolved() {
        let packages = packages(vec![
            json!({
                "name": "ui",
                "ui": { "references": ["log.Logger", { "name": "map.Layer", "cardinality": "many" }] }
            }),
            json!({
                "name": "log",
                "services": { "Logger": { "name": "Logger", "provides": ["log.Logger"] } }
            }),
        ]);

        let order = resolve(&packages).unwrap();
        let refs = order.ui_references("ui");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].1, ResolvedReference::One(ServiceKey { package: 1, service: 0 }));
        assert_eq!(refs[1].1, ResolvedReference::Many(vec![]));
        assert!(order.ui_references("log").is_empty());
        assert!(order.ui_references("unknown").is_empty());
    }

    #[test]
    fn unsatisfied_ui_reference_fails() {
        let packages = packages(vec![json!({
            "name": "ui",
            "ui": { "references": ["log.Logger"] }
        })]);

        let err = resolve(&packages).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReferenceNotFound);
        assert!(err.to_string().contains("the UI of package 'ui'"));
    }

    #[test]
    fn long_chains_are_sorted_without_recursion() {
        // Service i references service i + 1
        const LENGTH: usize = 30_000;
        let mut metadata = PackageMetadata::named("chain");
        for i in 0..LENGTH {
            let mut service = ServiceMetadata::named(format!("S{i}"));
            service.provides.push(format!("chain.S{i}").as_str().into());
            if i + 1 < LENGTH {
                service
                    .references
                    .insert("next", format!("chain.S{}", i + 1).as_str().into());
            }
            metadata.services.insert(format!("S{i}"), service);
        }
        let packages = vec![PackageRepr::create(&metadata, None).unwrap()];

        let order = resolve(&packages).unwrap();
        assert_eq!(order.len(), LENGTH);
        assert_eq!(order.ids().next().unwrap().service(), format!("S{}", LENGTH - 1));
        assert_eq!(order.ids().last().unwrap().service(), "S0");
    }

    #[test]
    fn package_names_must_be_unique() {
        let packages = packages(vec![
            json!({
                "name": "a",
                "services": { "S": { "name": "S", "provides": ["x.I"] } },
                "ui": { "references": ["x.I"] }
            }),
            json!({
                "name": "a",
                "services": { "S": { "name": "S" } }
            }),
        ]);

        let err = resolve(&packages).unwrap_err();
        assert_eq!(err, ResolveError::DuplicatePackage("a".into()));
        assert_eq!(err.kind(), ErrorKind::InvalidMetadata);
    }
}
