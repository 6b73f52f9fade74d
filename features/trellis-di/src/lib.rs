//! Trellis DI turns declarative package metadata into a running set of services.
//!
//! A package declares services, properties and the interfaces its UI code needs.
//! Every service provides interfaces and references interfaces provided by
//! other services, possibly from other packages.
//!
//! Starting an application runs one synchronous pipeline:
//! 1. Metadata: [`PackageMetadata`] documents, usually deserialized from JSON
//! 2. Packages: [`create_packages`] validates them and merges the application's custom properties
//! 3. Resolution: [`resolve`] binds every reference and orders services dependency-first
//! 4. Container: [`ContainerBuilder`] constructs every service through its registered factory
//!    and yields a [`RunningContainer`] to look services up by interface
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use trellis_di::{factory_fn, ContainerBuilder, DynError, OrderedMap, PackageMetadata, Service, ServiceOptions};
//!
//! struct Clock;
//! impl Service for Clock {}
//!
//! struct Greeter {
//!     clock: Arc<Clock>,
//! }
//! impl Service for Greeter {}
//!
//! let packages: OrderedMap<PackageMetadata> = serde_json::from_value(json!({
//!     "time": {
//!         "name": "time",
//!         "services": { "Clock": { "name": "Clock", "provides": ["time.Clock"] } }
//!     },
//!     "hello": {
//!         "name": "hello",
//!         "services": {
//!             "Greeter": {
//!                 "name": "Greeter",
//!                 "provides": ["hello.Greeter"],
//!                 "references": { "clock": "time.Clock" }
//!             }
//!         }
//!     }
//! }))
//! .unwrap();
//!
//! let container = ContainerBuilder::from_metadata(&packages, None)
//!     .unwrap()
//!     .add_instance("time", "Clock", Clock)
//!     .add_factory(
//!         "hello",
//!         "Greeter",
//!         factory_fn(|options: ServiceOptions<'_>| {
//!             Ok::<_, DynError>(Greeter {
//!                 clock: options.reference("clock")?,
//!             })
//!         }),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let greeter = container.require::<Greeter>("hello.Greeter", None).unwrap();
//! # let _ = &greeter.clock;
//! assert_eq!(container.stop(), 0);
//! ```

pub mod builder;
pub mod container;
pub mod dependency_graph;
pub mod errors;
pub mod factories;
pub mod initiator;
pub mod metadata;
pub mod package_repr;
pub mod properties;
pub mod reference_spec;
pub mod resolver;
pub mod service_repr;
pub mod types;

pub use builder::ContainerBuilder;
pub use container::RunningContainer;
pub use dependency_graph::{resolve, ResolveError, ServiceOrder};
pub use errors::{ErrorKind, InjectError, LookupError, MetadataError, StartError};
pub use factories::{factory_fn, DynFactory, Prebuilt, ServiceFactory};
pub use initiator::ServiceOptions;
pub use metadata::{OrderedMap, PackageMetadata, PropertyMetadata, ServiceMetadata};
pub use package_repr::{create_packages, PackageRepr};
pub use properties::customize_properties;
pub use reference_spec::{parse_reference_spec, Cardinality, ReferenceSpec};
pub use resolver::{ResolvedInstances, Resolver};
pub use service_repr::ServiceRepr;
pub use types::{DynError, Instance, Properties, Service, ServiceId};

pub use trellis_config::ApplicationProperties;
