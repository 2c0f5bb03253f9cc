//! Evaluator for the query AST.
//!
//! Every node computes the matching subset of the candidate keys, a
//! pure function of its inputs. Failure to resolve a property on one
//! candidate silently excludes that candidate; it never aborts the
//! query.

use std::collections::BTreeSet;

use crate::cidr::parse_ipv4;
use crate::context::{HIERARCHICAL_KINDS, MembershipContext};
use crate::inventory::{EntityKey, Value};

use super::ast::{CompareOp, Property, QueryNode};
use super::error::PropertyNotFound;

impl QueryNode {
    /// Compute the matching subset of `candidates`.
    pub fn run(
        &self,
        candidates: &BTreeSet<EntityKey>,
        ctx: &MembershipContext,
    ) -> BTreeSet<EntityKey> {
        match self {
            QueryNode::Intersection(operands) => {
                fold_sets(operands, candidates, ctx, |acc, next| &acc & &next)
            }
            QueryNode::Union(operands) => {
                fold_sets(operands, candidates, ctx, |acc, next| &acc | &next)
            }
            // The first operand seeds the base; the rest subtract.
            QueryNode::Subtraction(operands) => {
                fold_sets(operands, candidates, ctx, |acc, next| &acc - &next)
            }
            QueryNode::Not(inner) => candidates - &inner.run(candidates, ctx),
            QueryNode::Compare { op, lhs, rhs } => filter_candidates(candidates, |key| {
                match resolve_property(lhs, key, ctx) {
                    Ok(resolved) => compare_values(*op, lhs, resolved, rhs),
                    Err(PropertyNotFound) => false,
                }
            }),
            QueryNode::InCidr { lhs, cidr } => filter_candidates(candidates, |key| {
                match resolve_property(lhs, key, ctx) {
                    Ok(resolved) => resolved.into_values().iter().any(|value| {
                        parse_ipv4(&value.to_string())
                            .is_some_and(|addr| cidr.contains(addr))
                    }),
                    Err(PropertyNotFound) => false,
                }
            }),
            QueryNode::Exists(lhs) | QueryNode::Leaf(lhs) => {
                filter_candidates(candidates, |key| match resolve_property(lhs, key, ctx) {
                    Ok(resolved) => resolved.truthy(),
                    Err(PropertyNotFound) => false,
                })
            }
        }
    }
}

fn filter_candidates<F>(candidates: &BTreeSet<EntityKey>, keep: F) -> BTreeSet<EntityKey>
where
    F: Fn(&EntityKey) -> bool,
{
    candidates.iter().filter(|key| keep(key)).cloned().collect()
}

fn fold_sets<F>(
    operands: &[QueryNode],
    candidates: &BTreeSet<EntityKey>,
    ctx: &MembershipContext,
    combine: F,
) -> BTreeSet<EntityKey>
where
    F: Fn(BTreeSet<EntityKey>, BTreeSet<EntityKey>) -> BTreeSet<EntityKey>,
{
    let mut operands = operands.iter();
    let Some(first) = operands.next() else {
        return BTreeSet::new();
    };
    let mut acc = first.run(candidates, ctx);
    for operand in operands {
        acc = combine(acc, operand.run(candidates, ctx));
    }
    acc
}

/// A resolved property value: either a scalar wrapped on demand, or a
/// natural collection (attribute values, membership names).
pub enum Resolved {
    One(Value),
    Many(Vec<Value>),
}

impl Resolved {
    fn into_values(self) -> Vec<Value> {
        match self {
            Resolved::One(value) => vec![value],
            Resolved::Many(values) => values,
        }
    }

    /// Scalars test their own truthiness; collections are truthy when
    /// non-empty.
    fn truthy(&self) -> bool {
        match self {
            Resolved::One(value) => value.truthy(),
            Resolved::Many(values) => !values.is_empty(),
        }
    }
}

/// Property-extraction contract shared by every comparator: attribute
/// values (merged from containing groups), the entity kind for
/// `clusto_type`, the derived role, ancestor group names for the
/// hierarchical kinds, or a direct entity field.
pub fn resolve_property(
    property: &Property,
    key: &EntityKey,
    ctx: &MembershipContext,
) -> Result<Resolved, PropertyNotFound> {
    match property {
        Property::Attribute {
            key: attr_key,
            subkey,
            number,
        } => Ok(Resolved::Many(ctx.store().attributes(
            key,
            attr_key,
            subkey.as_deref(),
            *number,
            true,
        ))),
        Property::Word(word) => match word.as_str() {
            "clusto_type" => Ok(Resolved::One(Value::Str(key.kind.clone()))),
            "role" => ctx
                .role(key)
                .map(|role| Resolved::One(Value::Str(role)))
                .ok_or(PropertyNotFound),
            word if HIERARCHICAL_KINDS.contains(&word) => {
                Ok(Resolved::Many(ctx.ancestor_names(word, key)))
            }
            word => ctx
                .store()
                .field(key, word)
                .map(Resolved::One)
                .ok_or(PropertyNotFound),
        },
    }
}

/// Match policy: Inequality over attribute- or pool-valued properties
/// requires ALL values to differ; every other combination matches on
/// ANY value.
fn compare_values(op: CompareOp, lhs: &Property, resolved: Resolved, rhs: &Value) -> bool {
    let values = resolved.into_values();
    if op == CompareOp::Ne && lhs.inequality_over_all() {
        values.iter().all(|value| compare_one(op, value, rhs))
    } else {
        values.iter().any(|value| compare_one(op, value, rhs))
    }
}

fn compare_one(op: CompareOp, value: &Value, rhs: &Value) -> bool {
    match op {
        CompareOp::Eq => values_equal(value, rhs),
        CompareOp::Ne => !values_equal(value, rhs),
        CompareOp::Gt | CompareOp::Ge | CompareOp::Lt | CompareOp::Le => {
            ordered(op, value, rhs)
        }
        CompareOp::StartsWith => value.to_string().starts_with(&rhs.to_string()),
        CompareOp::EndsWith => value.to_string().ends_with(&rhs.to_string()),
        CompareOp::Contains => value.to_string().contains(&rhs.to_string()),
    }
}

/// Equality is a string-coercion comparison; attribute extraction has
/// already normalized numeric-looking values.
fn values_equal(a: &Value, b: &Value) -> bool {
    a.to_string() == b.to_string()
}

/// Ordered comparisons are numeric when both operands are native
/// numbers, otherwise lexicographic on the string coercions.
fn ordered(op: CompareOp, a: &Value, b: &Value) -> bool {
    let numeric = match (a, b) {
        (Value::Str(_), _) | (_, Value::Str(_)) => None,
        _ => Some((a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0))),
    };
    match numeric {
        Some((x, y)) => match op {
            CompareOp::Gt => x > y,
            CompareOp::Ge => x >= y,
            CompareOp::Lt => x < y,
            CompareOp::Le => x <= y,
            _ => unreachable!("ordered called with {op}"),
        },
        None => {
            let (x, y) = (a.to_string(), b.to_string());
            match op {
                CompareOp::Gt => x > y,
                CompareOp::Ge => x >= y,
                CompareOp::Lt => x < y,
                CompareOp::Le => x <= y,
                _ => unreachable!("ordered called with {op}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SnapshotConfig;
    use crate::inventory::Directory;
    use crate::query::ops::OperatorRegistry;
    use crate::query::parse_query;

    fn directory() -> Directory {
        let yaml = r#"
entities:
  - kind: datacenter
    name: sjc
    children: [pool/api, pool/db]
  - kind: datacenter
    name: iad
    children: [pool/batch]
  - kind: pool
    name: api
    attrs:
      - { key: pooltype, value: role }
    children: [server/web01, server/web02]
  - kind: pool
    name: db
    children: [server/db01, server/web02]
  - kind: pool
    name: batch
    children: [server/batch01]
  - kind: server
    name: web01
    fields:
      hostname: web01.example.com
      ip: 10.1.2.3
    attrs:
      - { key: memory, subkey: size, value: 34359738368 }
  - kind: server
    name: web02
    fields:
      hostname: web02.example.com
      ip: 10.200.0.4
    attrs:
      - { key: memory, subkey: size, value: 17179869184 }
  - kind: server
    name: db01
    fields:
      hostname: db01.example.com
      ip: 8.8.4.4
    attrs:
      - { key: memory, subkey: size, value: 68719476736 }
  - kind: server
    name: batch01
    fields:
      hostname: batch01.example.net
"#;
        Directory::from_snapshot(SnapshotConfig::from_yaml_str(yaml).unwrap()).unwrap()
    }

    fn run(dir: &Directory, raw: &str) -> Vec<String> {
        let ops = OperatorRegistry::with_default_operators();
        let node = parse_query(raw, &ops).unwrap();
        let candidates: BTreeSet<EntityKey> = dir.list(None, None).into_iter().collect();
        let ctx = MembershipContext::new(dir, Vec::new());
        node.run(&candidates, &ctx)
            .into_iter()
            .map(|key| key.to_string())
            .collect()
    }

    #[test]
    fn test_clusto_type_equality() {
        let dir = directory();
        assert_eq!(
            run(&dir, "clusto_type = datacenter"),
            vec!["datacenter/iad", "datacenter/sjc"]
        );
    }

    #[test]
    fn test_pool_membership() {
        let dir = directory();
        assert_eq!(
            run(&dir, "pool = api"),
            vec!["server/web01", "server/web02"]
        );
    }

    #[test]
    fn test_pool_inequality_requires_all_values_to_differ() {
        let dir = directory();
        // web02 is in both api and db; "pool != api" must exclude it
        // even though it has a non-api pool.
        let matches = run(&dir, "clusto_type = server and pool != api");
        assert_eq!(matches, vec!["server/batch01", "server/db01"]);
    }

    #[test]
    fn test_datacenter_inequality_matches_any_differing_value() {
        let dir = directory();
        let matches = run(&dir, "clusto_type = server and datacenter != iad");
        // Servers in sjc have a differing datacenter value; batch01 has
        // only iad and is excluded.
        assert_eq!(
            matches,
            vec!["server/db01", "server/web01", "server/web02"]
        );
    }

    #[test]
    fn test_set_algebra_laws() {
        let dir = directory();
        let ops = OperatorRegistry::with_default_operators();
        let candidates: BTreeSet<EntityKey> = dir.list(None, None).into_iter().collect();
        let ctx = MembershipContext::new(&dir, Vec::new());

        let a = parse_query("pool = api", &ops).unwrap();
        let b = parse_query("pool = db", &ops).unwrap();
        let both = parse_query("pool = api and pool = db", &ops).unwrap();
        let either = parse_query("pool = api or pool = db", &ops).unwrap();
        let not_a = parse_query("not pool = api", &ops).unwrap();

        let set_a = a.run(&candidates, &ctx);
        let set_b = b.run(&candidates, &ctx);
        assert_eq!(both.run(&candidates, &ctx), &set_a & &set_b);
        assert_eq!(either.run(&candidates, &ctx), &set_a | &set_b);
        assert_eq!(not_a.run(&candidates, &ctx), &candidates - &set_a);
    }

    #[test]
    fn test_evaluation_is_pure() {
        let dir = directory();
        let ops = OperatorRegistry::with_default_operators();
        let candidates: BTreeSet<EntityKey> = dir.list(None, None).into_iter().collect();
        let ctx = MembershipContext::new(&dir, Vec::new());
        let node = parse_query("pool = api - name = web01", &ops).unwrap();
        assert_eq!(node.run(&candidates, &ctx), node.run(&candidates, &ctx));
    }

    #[test]
    fn test_subtraction_seeds_from_first_operand() {
        let dir = directory();
        assert_eq!(run(&dir, "pool = api - pool = db"), vec!["server/web01"]);
    }

    #[test]
    fn test_attribute_comparison_with_size_literal() {
        let dir = directory();
        assert_eq!(
            run(&dir, "attr memory.size >= 32G"),
            vec!["server/db01", "server/web01"]
        );
        assert_eq!(run(&dir, "attr memory.size = 32G"), vec!["server/web01"]);
    }

    #[test]
    fn test_missing_property_excludes_quietly() {
        let dir = directory();
        // batch01 has no ip field; the query still succeeds.
        assert_eq!(
            run(&dir, "ip ^ 10."),
            vec!["server/web01", "server/web02"]
        );
        assert!(run(&dir, "nonexistent_field = x").is_empty());
    }

    #[test]
    fn test_in_cidr_containment() {
        let dir = directory();
        assert_eq!(
            run(&dir, "ip in_cidr 10.0.0.0/8"),
            vec!["server/web01", "server/web02"]
        );
        // Narrower range: only web01.
        assert_eq!(run(&dir, "ip in_cidr 10.1.0.0/16"), vec!["server/web01"]);
    }

    #[test]
    fn test_role_resolution() {
        let dir = directory();
        assert_eq!(
            run(&dir, "role = api"),
            vec!["server/web01", "server/web02"]
        );
        // Roleless entities are excluded, not errors.
        assert!(run(&dir, "role = db").is_empty());
    }

    #[test]
    fn test_exists_suffix() {
        let dir = directory();
        assert_eq!(
            run(&dir, "attr memory.size exists and pool = db"),
            vec!["server/db01", "server/web02"]
        );
    }

    #[test]
    fn test_hostname_endswith() {
        let dir = directory();
        assert_eq!(
            run(&dir, "hostname , .example.net"),
            vec!["server/batch01"]
        );
        assert_eq!(run(&dir, "hostname ^ web01"), vec!["server/web01"]);
        assert_eq!(
            run(&dir, "hostname contains db"),
            vec!["server/db01"]
        );
    }

    #[test]
    fn test_attr_inequality_is_vacuous_on_absent_attrs() {
        let dir = directory();
        // batch01 has no memory.size attribute: with the ALL policy an
        // empty value collection satisfies the inequality.
        let matches = run(&dir, "clusto_type = server and attr memory.size != 32G");
        assert_eq!(
            matches,
            vec!["server/batch01", "server/db01", "server/web02"]
        );
    }
}
