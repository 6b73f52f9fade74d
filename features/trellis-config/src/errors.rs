/// Errors when registering or loading application properties
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Properties for this package have already been registered
    #[error("Properties for package '{0}' are already registered")]
    AlreadyRegistered(String),

    #[error("failed to read properties file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML properties: {0}")]
    ParseToml(#[from] toml::de::Error),

    #[error("failed to parse JSON properties: {0}")]
    ParseJson(#[from] serde_json::Error),

    /// The file extension does not name a known format
    #[error("unsupported properties file '{0}', expected a .toml or .json file")]
    UnsupportedFormat(String),
}
