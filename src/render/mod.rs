//! Turn matched entities into display strings.

use anyhow::Result;
use serde_json::{Map, Value as Json};

use crate::cidr::{CidrSet, parse_ipv4};
use crate::context::{HIERARCHICAL_KINDS, MembershipContext};
use crate::inventory::{EntityKey, Value};

/// Plain name, the default output.
pub fn name_line(key: &EntityKey) -> String {
    key.name.clone()
}

/// `kind/name`.
pub fn key_line(key: &EntityKey) -> String {
    key.to_string()
}

/// One JSON object per entity: identity, fields, attributes, group
/// memberships and derived role. An `ip` field is additionally
/// classified as private or public against the RFC 1918 ranges.
pub fn json_line(key: &EntityKey, ctx: &MembershipContext, private: &CidrSet) -> Result<String> {
    let store = ctx.store();
    let mut object = Map::new();
    object.insert("kind".into(), Json::String(key.kind.clone()));
    object.insert("name".into(), Json::String(key.name.clone()));

    let mut fields = Map::new();
    for (name, value) in store.fields(key) {
        fields.insert(name.to_string(), value_to_json(value));
    }
    object.insert("fields".into(), Json::Object(fields));

    let attrs: Vec<Json> = store
        .attrs(key)
        .iter()
        .map(|attr| {
            let mut entry = Map::new();
            entry.insert("key".into(), Json::String(attr.key.clone()));
            if let Some(subkey) = &attr.subkey {
                entry.insert("subkey".into(), Json::String(subkey.clone()));
            }
            if let Some(number) = attr.number {
                entry.insert("number".into(), Json::from(number));
            }
            entry.insert("value".into(), value_to_json(&attr.value.to_value()));
            Json::Object(entry)
        })
        .collect();
    object.insert("attrs".into(), Json::Array(attrs));

    for kind in HIERARCHICAL_KINDS {
        let mut names: Vec<String> = ctx
            .ancestor_names(kind, key)
            .iter()
            .map(Value::to_string)
            .collect();
        names.sort();
        object.insert(
            format!("{}s", kind),
            Json::Array(names.into_iter().map(Json::String).collect()),
        );
    }

    object.insert(
        "role".into(),
        ctx.role(key).map(Json::String).unwrap_or(Json::Null),
    );

    if let Some(Value::Str(ip)) = store.field(key, "ip")
        && let Some(addr) = parse_ipv4(&ip)
    {
        let scope = if private.contains(addr) { "private" } else { "public" };
        object.insert("ip_scope".into(), Json::String(scope.into()));
    }

    Ok(serde_json::to_string(&Json::Object(object))?)
}

fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Str(s) => Json::String(s.clone()),
        Value::Int(n) => Json::from(*n),
        Value::Float(x) => Json::from(*x),
    }
}
