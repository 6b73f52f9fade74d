use std::fmt::Display;

use crate::{errors::MetadataError, metadata::ReferenceDeclaration};

/// How many providers a reference binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// Exactly one provider
    One,
    /// Zero or more providers, in declaration order
    Many,
}
impl Cardinality {
    fn parse(token: &str) -> Option<Cardinality> {
        match token {
            "one" => Some(Cardinality::One),
            "many" => Some(Cardinality::Many),
            _ => None,
        }
    }
}
impl Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cardinality::One => f.write_str("one"),
            Cardinality::Many => f.write_str("many"),
        }
    }
}

/// Normalized reference to an interface
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceSpec {
    interface_name: String,
    cardinality: Cardinality,
    qualifier: Option<String>,
}

impl ReferenceSpec {
    pub fn interface_name(&self) -> &str {
        &self.interface_name
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    /// Whether this spec asks for `interface_name` with exactly this qualifier
    pub fn matches(&self, interface_name: &str, qualifier: Option<&str>) -> bool {
        self.interface_name == interface_name && self.qualifier() == qualifier
    }
}

impl Display for ReferenceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.interface_name)?;
        if let Some(qualifier) = &self.qualifier {
            write!(f, " (qualifier '{qualifier}')")?;
        }
        if self.cardinality == Cardinality::Many {
            f.write_str(" [many]")?;
        }
        Ok(())
    }
}

/// Parses a reference declaration.
///
/// A bare interface name references exactly one provider. The detailed form may
/// set the cardinality (`"one"` or `"many"`) and a qualifier.
pub fn parse_reference_spec(
    declaration: &ReferenceDeclaration,
) -> Result<ReferenceSpec, MetadataError> {
    let (name, cardinality, qualifier) = match declaration {
        ReferenceDeclaration::Name(name) => (name, None, None),
        ReferenceDeclaration::Detailed(detailed) => (
            &detailed.name,
            detailed.cardinality.as_deref(),
            detailed.qualifier.as_ref(),
        ),
    };

    if name.trim().is_empty() {
        return Err(MetadataError::InvalidMetadata(
            "reference does not name an interface".to_string(),
        ));
    }

    let cardinality = match cardinality {
        None => Cardinality::One,
        Some(token) => Cardinality::parse(token).ok_or_else(|| {
            MetadataError::InvalidMetadata(format!(
                "unknown cardinality '{token}' in reference to '{name}', expected 'one' or 'many'"
            ))
        })?,
    };

    if qualifier.is_some_and(|q| q.trim().is_empty()) {
        return Err(MetadataError::InvalidMetadata(format!(
            "empty qualifier in reference to '{name}'"
        )));
    }

    Ok(ReferenceSpec {
        interface_name: name.clone(),
        cardinality,
        qualifier: qualifier.cloned(),
    })
}
