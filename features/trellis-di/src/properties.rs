use trellis_config::Overrides;

use crate::{
    errors::MetadataError,
    metadata::{OrderedMap, PropertyMetadata},
    types::Properties,
};

/// Merges the declared properties of a package with the application-defined overrides.
///
/// Overrides may only replace declared properties. Required properties are
/// checked after all overrides are applied, so they can be satisfied either by
/// their default or by an override.
pub fn customize_properties(
    package_name: &str,
    declared: &OrderedMap<PropertyMetadata>,
    overrides: Option<&Overrides>,
) -> Result<Properties, MetadataError> {
    let mut merged = Properties::new();
    let mut required = Vec::new();
    for (key, metadata) in declared.iter() {
        merged.insert(key.to_string(), metadata.value.clone());
        if metadata.required {
            required.push(key);
        }
    }

    for (key, value) in overrides.into_iter().flatten() {
        let Some(slot) = merged.get_mut(key) else {
            return Err(MetadataError::InvalidPropertyName {
                package: package_name.to_string(),
                key: key.clone(),
            });
        };
        *slot = value.clone();
    }

    check_required(package_name, &merged, &required)?;
    Ok(merged)
}

/// Fails on the first required key whose merged value is null or absent
pub(crate) fn check_required(
    owner: &str,
    merged: &Properties,
    required: &[&str],
) -> Result<(), MetadataError> {
    for key in required {
        if merged.get(*key).map_or(true, |value| value.is_null()) {
            return Err(MetadataError::RequiredProperty {
                owner: owner.to_string(),
                key: key.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::errors::ErrorKind;

    fn declared() -> OrderedMap<PropertyMetadata> {
        [
            ("zoom", PropertyMetadata::with_default(3)),
            ("title", PropertyMetadata::with_default("Map")),
            ("center", PropertyMetadata::default()),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn defaults_without_overrides() {
        let merged = customize_properties("map", &declared(), None).unwrap();
        assert_eq!(
            merged,
            Properties::from([
                ("zoom".to_string(), json!(3)),
                ("title".to_string(), json!("Map")),
                ("center".to_string(), Value::Null),
            ])
        );

        let empty = Overrides::new();
        assert_eq!(
            customize_properties("map", &declared(), Some(&empty)).unwrap(),
            merged
        );
    }

    #[test]
    fn overrides_replace_defaults() {
        let overrides = Overrides::from([
            ("zoom".to_string(), json!(10)),
            ("title".to_string(), Value::Null),
        ]);
        let merged = customize_properties("map", &declared(), Some(&overrides)).unwrap();
        assert_eq!(merged["zoom"], json!(10));
        assert_eq!(merged["title"], Value::Null);
        assert_eq!(merged["center"], Value::Null);
    }

    #[test]
    fn unknown_override_is_rejected() {
        let overrides = Overrides::from([("zom".to_string(), json!(10))]);
        let err = customize_properties("map", &declared(), Some(&overrides)).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidPropertyName);
        assert_eq!(
            err,
            MetadataError::InvalidPropertyName {
                package: "map".into(),
                key: "zom".into()
            }
        );
    }

    #[test]
    fn required_satisfied_by_default() {
        let declared: OrderedMap<_> = [(
            "limit",
            PropertyMetadata {
                value: json!(5),
                required: true,
            },
        )]
        .into_iter()
        .collect();
        let merged = customize_properties("a", &declared, None).unwrap();
        assert_eq!(merged["limit"], json!(5));
    }

    #[test]
    fn required_satisfied_by_override() {
        let declared: OrderedMap<_> = [("limit", PropertyMetadata::required())]
            .into_iter()
            .collect();
        let overrides = Overrides::from([("limit".to_string(), json!(10))]);
        let merged = customize_properties("a", &declared, Some(&overrides)).unwrap();
        assert_eq!(merged["limit"], json!(10));
    }

    #[test]
    fn required_without_value_fails() {
        let declared: OrderedMap<_> = [("limit", PropertyMetadata::required())]
            .into_iter()
            .collect();
        let err = customize_properties("a", &declared, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RequiredProperty);
        assert!(err.to_string().contains("'limit'"));
    }

    #[test]
    fn required_cannot_be_overridden_with_null() {
        let declared: OrderedMap<_> = [(
            "limit",
            PropertyMetadata {
                value: json!(5),
                required: true,
            },
        )]
        .into_iter()
        .collect();
        let overrides = Overrides::from([("limit".to_string(), Value::Null)]);
        let err = customize_properties("a", &declared, Some(&overrides)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RequiredProperty);
    }

    #[test]
    fn merging_does_not_mutate_inputs() {
        let declared = declared();
        let overrides = Overrides::from([("zoom".to_string(), json!(7))]);

        let first = customize_properties("map", &declared, Some(&overrides)).unwrap();
        let second = customize_properties("map", &declared, Some(&overrides)).unwrap();
        assert_eq!(first, second);
        assert_eq!(declared.get("zoom").unwrap().value, json!(3));
    }
}
