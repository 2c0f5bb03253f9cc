//! Inventory data model and the in-memory entity store.

use anyhow::{Context, Result, bail};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use crate::config::{AttrSpec, AttrValueSpec, SnapshotConfig};

/// Stable, hashable identity of an entity within a snapshot.
///
/// Used throughout instead of live entity handles so that set algebra
/// over match results is well-defined and cheap.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityKey {
    pub kind: String,
    pub name: String,
}

impl EntityKey {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Parse a `kind/name` reference as used in snapshot `children` lists.
    pub fn parse(s: &str) -> Option<Self> {
        let (kind, name) = s.split_once('/')?;
        if kind.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(kind, name))
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// Scalar value: attribute values, direct fields, and query literals
/// all share this shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
}

impl Value {
    /// Coerce a raw string: numeric-looking strings become numbers.
    /// Only plain digit runs count as numeric; "inf", "1e5" and the
    /// like stay strings.
    pub fn coerce(s: &str) -> Value {
        let digits = s.strip_prefix('-').unwrap_or(s);
        let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());

        if all_digits(digits)
            && let Ok(n) = s.parse::<i64>()
        {
            return Value::Int(n);
        }
        if let Some((whole, frac)) = digits.split_once('.')
            && all_digits(whole)
            && all_digits(frac)
            && let Ok(f) = s.parse::<f64>()
        {
            return Value::Float(f);
        }
        Value::Str(s.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Str(s) => s.parse().ok(),
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
        }
    }

    /// Truthiness: non-empty string, non-zero number.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Str(s) => !s.is_empty(),
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{}", s),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
        }
    }
}

/// A (key, subkey?, number?) -> value fact attached to an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub key: String,
    pub subkey: Option<String>,
    pub number: Option<i64>,
    pub value: AttrValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Scalar(Value),
    /// Reference to another entity, by name.
    Relation(String),
}

impl AttrValue {
    /// Reduce to a scalar: relations become the referenced entity's name,
    /// numeric-looking strings become numbers.
    pub fn to_value(&self) -> Value {
        match self {
            AttrValue::Scalar(Value::Str(s)) => Value::coerce(s),
            AttrValue::Scalar(v) => v.clone(),
            AttrValue::Relation(name) => Value::Str(name.clone()),
        }
    }
}

#[derive(Debug, Default)]
struct EntityRecord {
    fields: BTreeMap<String, Value>,
    attrs: Vec<Attribute>,
    children: Vec<EntityKey>,
}

/// Read-only snapshot of all entities, their attributes and containment
/// edges. Built once per invocation, then only read.
#[derive(Debug, Default)]
pub struct Directory {
    entities: BTreeMap<EntityKey, EntityRecord>,
    parents: HashMap<EntityKey, Vec<EntityKey>>,
}

impl Directory {
    /// Build the store from a loaded snapshot. Fails on duplicate
    /// entities and on containment edges that point outside the snapshot.
    pub fn from_snapshot(snapshot: SnapshotConfig) -> Result<Self> {
        let mut entities: BTreeMap<EntityKey, EntityRecord> = BTreeMap::new();
        let mut edges: Vec<(EntityKey, String)> = Vec::new();

        for spec in snapshot.entities {
            let key = EntityKey::new(&spec.kind, &spec.name);
            if entities.contains_key(&key) {
                bail!("Snapshot: duplicate entity {}", key);
            }
            let mut record = EntityRecord::default();
            for (name, value) in spec.fields {
                record.fields.insert(name, scalar_from_spec(value));
            }
            for attr in spec.attrs {
                record.attrs.push(attr_from_spec(&key, attr)?);
            }
            for child in spec.children {
                edges.push((key.clone(), child));
            }
            entities.insert(key, record);
        }

        let mut parents: HashMap<EntityKey, Vec<EntityKey>> = HashMap::new();
        for (parent, child_ref) in edges {
            let child = EntityKey::parse(&child_ref)
                .with_context(|| format!("Snapshot: bad child reference '{}'", child_ref))?;
            if !entities.contains_key(&child) {
                bail!("Snapshot: {} lists unknown child {}", parent, child);
            }
            parents.entry(child.clone()).or_default().push(parent.clone());
            entities
                .get_mut(&parent)
                .expect("parent inserted above")
                .children
                .push(child);
        }

        Ok(Self { entities, parents })
    }

    /// Full or filtered snapshot of entity keys, in sorted order.
    pub fn list(&self, name: Option<&str>, kind: Option<&str>) -> Vec<EntityKey> {
        self.entities
            .keys()
            .filter(|key| name.is_none_or(|n| key.name == n))
            .filter(|key| kind.is_none_or(|k| key.kind == k))
            .cloned()
            .collect()
    }

    pub fn children(&self, key: &EntityKey) -> &[EntityKey] {
        self.entities
            .get(key)
            .map(|r| r.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parents(&self, key: &EntityKey) -> &[EntityKey] {
        self.parents.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Attribute lookup. `subkey`/`number` of `None` match any attribute
    /// under `key`. With `merge_from_containers`, attributes inherited
    /// from containing group entities are merged in, keyed by the full
    /// (key, subkey, number) triple so a child attribute shadows the
    /// parent's rather than colliding with a sibling key.
    pub fn attributes(
        &self,
        key: &EntityKey,
        attr_key: &str,
        subkey: Option<&str>,
        number: Option<i64>,
        merge_from_containers: bool,
    ) -> Vec<Value> {
        let mut claimed: HashSet<(String, Option<String>, Option<i64>)> = HashSet::new();
        let mut values = Vec::new();
        self.collect_attrs(key, attr_key, subkey, number, &mut claimed, &mut values);

        if merge_from_containers {
            let mut visited: HashSet<EntityKey> = HashSet::new();
            visited.insert(key.clone());
            let mut frontier: Vec<EntityKey> = self.parents(key).to_vec();
            while let Some(parent) = frontier.pop() {
                if !visited.insert(parent.clone()) {
                    continue;
                }
                self.collect_attrs(&parent, attr_key, subkey, number, &mut claimed, &mut values);
                frontier.extend(self.parents(&parent).iter().cloned());
            }
        }

        values
    }

    fn collect_attrs(
        &self,
        key: &EntityKey,
        attr_key: &str,
        subkey: Option<&str>,
        number: Option<i64>,
        claimed: &mut HashSet<(String, Option<String>, Option<i64>)>,
        values: &mut Vec<Value>,
    ) {
        let Some(record) = self.entities.get(key) else {
            return;
        };
        // Claims only shadow attributes of entities farther up the
        // containment walk; within one entity a key stays multi-valued.
        let mut local: Vec<(String, Option<String>, Option<i64>)> = Vec::new();
        for attr in &record.attrs {
            if attr.key != attr_key {
                continue;
            }
            if subkey.is_some() && attr.subkey.as_deref() != subkey {
                continue;
            }
            if number.is_some() && attr.number != number {
                continue;
            }
            let triple = (attr.key.clone(), attr.subkey.clone(), attr.number);
            if !claimed.contains(&triple) {
                values.push(attr.value.to_value());
                local.push(triple);
            }
        }
        claimed.extend(local);
    }

    /// All attributes of an entity, own only (no container merge).
    pub fn attrs(&self, key: &EntityKey) -> &[Attribute] {
        self.entities
            .get(key)
            .map(|r| r.attrs.as_slice())
            .unwrap_or(&[])
    }

    /// All direct fields of an entity.
    pub fn fields(&self, key: &EntityKey) -> impl Iterator<Item = (&str, &Value)> {
        self.entities
            .get(key)
            .into_iter()
            .flat_map(|r| r.fields.iter().map(|(k, v)| (k.as_str(), v)))
    }

    /// Direct field lookup; `name` is always present, everything else
    /// comes from the snapshot's `fields` map.
    pub fn field(&self, key: &EntityKey, name: &str) -> Option<Value> {
        if name == "name" {
            return Some(Value::Str(key.name.clone()));
        }
        self.entities.get(key)?.fields.get(name).cloned()
    }
}

fn scalar_from_spec(spec: AttrValueSpec) -> Value {
    match spec {
        AttrValueSpec::Str(s) => Value::Str(s),
        AttrValueSpec::Int(n) => Value::Int(n),
        AttrValueSpec::Float(f) => Value::Float(f),
    }
}

fn attr_from_spec(key: &EntityKey, spec: AttrSpec) -> Result<Attribute> {
    let value = match (spec.value, spec.relation) {
        (Some(v), None) => AttrValue::Scalar(scalar_from_spec(v)),
        (None, Some(name)) => AttrValue::Relation(name),
        (Some(_), Some(_)) => {
            bail!("Snapshot: {} attr '{}' has both value and relation", key, spec.key)
        }
        (None, None) => bail!("Snapshot: {} attr '{}' has no value", key, spec.key),
    };
    Ok(Attribute {
        key: spec.key,
        subkey: spec.subkey,
        number: spec.number,
        value,
    })
}
