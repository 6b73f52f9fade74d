//! Package metadata documents as authored by package developers.
//!
//! These types are plain input data. They are only read by the validating
//! constructors in [`crate::package_repr`] and [`crate::service_repr`].

use std::{collections::HashMap, fmt, marker::PhantomData};

use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};
use serde_json::Value;

/// A string keyed map that keeps the order in which entries were declared.
///
/// Declaration order decides the order of services and of `many` references,
/// so metadata maps must not be reordered by key.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V> {
    entries: Vec<(String, V)>,
    /// Position of each key in `entries`
    index: HashMap<String, usize>,
}
impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry. An existing key keeps its position and the old value is returned.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        match self.index.get(&key) {
            Some(&position) => Some(std::mem::replace(&mut self.entries[position].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.index.get(key).map(|&position| &self.entries[position].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = OrderedMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedMapVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map with string keys")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = OrderedMap::new();
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    if map.contains_key(&key) {
                        return Err(serde::de::Error::custom(format!("duplicate key '{key}'")));
                    }
                    map.insert(key, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

/// Metadata of a single package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageMetadata {
    pub name: String,
    #[serde(default)]
    pub services: OrderedMap<ServiceMetadata>,
    #[serde(default)]
    pub properties: OrderedMap<PropertyMetadata>,
    #[serde(default)]
    pub ui: UiMetadata,
}

impl PackageMetadata {
    /// Metadata for a package without services, properties or UI references
    pub fn named(name: impl Into<String>) -> Self {
        PackageMetadata {
            name: name.into(),
            services: OrderedMap::new(),
            properties: OrderedMap::new(),
            ui: UiMetadata::default(),
        }
    }
}

/// Interfaces needed by the package's UI code
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UiMetadata {
    #[serde(default)]
    pub references: Vec<ReferenceDeclaration>,
}

/// A declared property and its default value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyMetadata {
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub required: bool,
}

impl PropertyMetadata {
    pub fn with_default(value: impl Into<Value>) -> Self {
        PropertyMetadata {
            value: value.into(),
            required: false,
        }
    }

    /// A required property without a default; it must be set by the application.
    pub fn required() -> Self {
        PropertyMetadata {
            value: Value::Null,
            required: true,
        }
    }
}

/// Metadata of a service inside a package
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub provides: Vec<InterfaceDeclaration>,
    #[serde(default)]
    pub references: OrderedMap<ReferenceDeclaration>,
    /// Properties consumed by the service. `None` binds the whole package property set.
    #[serde(default)]
    pub properties: Option<OrderedMap<PropertyMetadata>>,
}

impl ServiceMetadata {
    pub fn named(name: impl Into<String>) -> Self {
        ServiceMetadata {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// An interface provided by a service: either a bare name or `{ name, qualifier }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InterfaceDeclaration {
    Name(String),
    Detailed(DetailedInterface),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetailedInterface {
    pub name: String,
    #[serde(default)]
    pub qualifier: Option<String>,
}

/// A reference to an interface: either a bare name or `{ name, cardinality, qualifier }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReferenceDeclaration {
    Name(String),
    Detailed(DetailedReference),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetailedReference {
    pub name: String,
    /// `"one"` or `"many"`, defaults to `"one"`
    #[serde(default)]
    pub cardinality: Option<String>,
    #[serde(default)]
    pub qualifier: Option<String>,
}

impl From<&str> for ReferenceDeclaration {
    fn from(name: &str) -> Self {
        ReferenceDeclaration::Name(name.to_string())
    }
}

impl From<&str> for InterfaceDeclaration {
    fn from(name: &str) -> Self {
        InterfaceDeclaration::Name(name.to_string())
    }
}
