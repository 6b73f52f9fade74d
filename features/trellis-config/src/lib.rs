//! Trellis Config holds the custom properties an application hands to its packages.
//!
//! Every package declares its properties (with defaults) in its metadata. The
//! hosting application may override some of them at startup; those overrides
//! live here, grouped by package name.
//!
//! Trellis Config is split into three parts:
//! 1. Provider: the [`ApplicationProperties`] registry
//! 2. Config: loaders for TOML and JSON properties files
//! 3. Errors: registration and loading errors
//!
//! # Examples
//!
//! ```rust
//! use serde_json::json;
//! use trellis_config::ApplicationProperties;
//!
//! let mut properties = ApplicationProperties::new();
//! properties.set("map", "zoom", 4);
//!
//! let from_file = ApplicationProperties::from_toml_str("[map]\nzoom = 4").unwrap();
//! assert_eq!(properties, from_file);
//! assert_eq!(from_file.get("map").unwrap()["zoom"], json!(4));
//! ```

pub mod config;
pub mod errors;
pub mod provider;

pub use errors::ConfigError;
pub use provider::{ApplicationProperties, Overrides};
