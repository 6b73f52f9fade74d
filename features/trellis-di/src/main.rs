use std::{
    error::Error,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use serde_json::json;
use trellis_di::{
    factory_fn, ApplicationProperties, ContainerBuilder, DynError, OrderedMap, PackageMetadata,
    Service, ServiceOptions,
};

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("TRELLIS_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_target(false)
        .without_time()
        .init();

    let packages: OrderedMap<PackageMetadata> = serde_json::from_value(json!({
        "counter": {
            "name": "counter",
            "services": {
                "Counter": {
                    "name": "Counter",
                    "provides": ["counter.Counter"],
                    "references": { "log": "log.Logger" }
                }
            },
            "properties": { "start": { "required": true } },
            "ui": { "references": ["counter.Counter"] }
        },
        "log": {
            "name": "log",
            "services": { "Logger": { "name": "Logger", "provides": ["log.Logger"] } },
            "properties": { "prefix": { "value": "[log]" } }
        }
    }))?;

    let properties = ApplicationProperties::from_toml_str("[counter]\nstart = 10")?;

    let container = ContainerBuilder::from_metadata(&packages, Some(&properties))?
        .add_factory(
            "log",
            "Logger",
            factory_fn(|options: ServiceOptions<'_>| {
                Ok::<_, DynError>(Logger {
                    prefix: options.property("prefix")?,
                })
            }),
        )
        .add_factory(
            "counter",
            "Counter",
            factory_fn(|options: ServiceOptions<'_>| {
                Ok::<_, DynError>(Counter {
                    value: AtomicU64::new(options.property("start")?),
                    log: options.reference("log")?,
                })
            }),
        )
        .build()?;

    println!("{:?}", container);
    let counter = container
        .get_for_package("counter", "counter.Counter", None)?
        .instances()[0]
        .downcast::<Counter>()
        .map_err(|actual| format!("unexpected service type {actual}"))?;
    counter.increment();
    counter.increment();

    container.stop();
    Ok(())
}

struct Logger {
    prefix: String,
}
impl Logger {
    fn log(&self, message: &str) {
        println!("{} {}", self.prefix, message)
    }
}
impl Service for Logger {}

struct Counter {
    value: AtomicU64,
    log: Arc<Logger>,
}
impl Counter {
    fn increment(&self) {
        let value = self.value.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.log(&format!("counter is now {value}"));
    }
}
impl Service for Counter {
    fn destroy(&self) -> Result<(), DynError> {
        self.log.log("counter destroyed");
        Ok(())
    }
}
