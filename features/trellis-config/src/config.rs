use std::{fs, path::Path};

use crate::{errors::ConfigError, provider::ApplicationProperties};

/// Loaders for application properties files.
///
/// A properties document is a table of package names, each holding a table
/// of property overrides:
///
/// ```toml
/// [map]
/// zoom = 4
///
/// ["@acme/legend"]
/// title = "Legend"
/// ```
impl ApplicationProperties {
    /// Parse application properties from a TOML document
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// Parse application properties from a JSON document
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Load application properties from a `.toml` or `.json` file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        let content = match extension.as_deref() {
            Some("toml") | Some("json") => fs::read_to_string(path)?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };

        tracing::debug!("Loading application properties from {}", path.display());
        match extension.as_deref() {
            Some("toml") => Self::from_toml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;

    use super::*;

    #[test]
    fn parses_toml_document() {
        let input = r#"
[map]
zoom = 4
center = [7.0, 51.0]

["@acme/legend"]
title = "Legend"
"#;
        let props = ApplicationProperties::from_toml_str(input).unwrap();

        assert_eq!(props.get("map").unwrap()["zoom"], json!(4));
        assert_eq!(props.get("map").unwrap()["center"], json!([7.0, 51.0]));
        assert_eq!(props.get("@acme/legend").unwrap()["title"], json!("Legend"));
    }

    #[test]
    fn parses_json_document_with_null() {
        let input = r#"{ "map": { "zoom": null } }"#;
        let props = ApplicationProperties::from_json_str(input).unwrap();
        assert_eq!(props.get("map").unwrap()["zoom"], json!(null));
    }

    #[test]
    fn rejects_non_table_package_entry() {
        let err = ApplicationProperties::from_json_str(r#"{ "map": 3 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::ParseJson(_)));
    }

    #[test]
    fn loads_from_file_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[map]\nzoom = 2").unwrap();

        let props = ApplicationProperties::from_path(file.path()).unwrap();
        assert_eq!(props.get("map").unwrap()["zoom"], json!(2));
    }

    #[test]
    fn rejects_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let err = ApplicationProperties::from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }
}
