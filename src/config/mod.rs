use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Raw inventory snapshot as loaded from YAML (before the store is built).
#[derive(Debug, Deserialize)]
pub struct SnapshotConfig {
    pub entities: Vec<EntitySpec>,
}

impl SnapshotConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn from_yaml_str(raw: &str) -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from_str(raw, ::config::FileFormat::Yaml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

#[derive(Debug, Deserialize)]
pub struct EntitySpec {
    pub kind: String,
    pub name: String,
    /// Direct fields for `Entity.field(name)` lookups (hostname, ip, ...).
    #[serde(default)]
    pub fields: BTreeMap<String, AttrValueSpec>,
    #[serde(default)]
    pub attrs: Vec<AttrSpec>,
    /// Containment edges to child entities, as `kind/name` references.
    #[serde(default)]
    pub children: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AttrSpec {
    pub key: String,
    #[serde(default)]
    pub subkey: Option<String>,
    #[serde(default)]
    pub number: Option<i64>,
    /// Scalar value; mutually exclusive with `relation`.
    #[serde(default)]
    pub value: Option<AttrValueSpec>,
    /// Reference to another entity, by name.
    #[serde(default)]
    pub relation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AttrValueSpec {
    Int(i64),
    Float(f64),
    Str(String),
}
