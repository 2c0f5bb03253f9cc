//! Hierarchical membership resolution.
//!
//! Answers "which pools/datacenters contain entity X" without repeated
//! graph traversal. The per-kind ancestor maps are computed on first
//! use and cached for the remainder of the run; the cache is
//! write-once, then read-only.

use std::cell::OnceCell;
use std::collections::{HashMap, HashSet};

use crate::inventory::{Directory, EntityKey, Value};

/// Group kinds that participate in membership resolution.
pub const HIERARCHICAL_KINDS: &[&str] = &["pool", "datacenter"];

/// Lazily built ancestor maps over the containment graph.
pub struct MembershipContext<'a> {
    store: &'a Directory,
    /// Root names to scope the walk to; empty means every entity of a
    /// hierarchical kind is a root.
    scope: Vec<String>,
    cache: OnceCell<Membership>,
}

#[derive(Debug, Default)]
struct Membership {
    /// kind -> entity -> ancestor groups of that kind.
    ancestors: HashMap<String, HashMap<EntityKey, HashSet<EntityKey>>>,
}

impl<'a> MembershipContext<'a> {
    pub fn new(store: &'a Directory, scope: Vec<String>) -> Self {
        Self {
            store,
            scope,
            cache: OnceCell::new(),
        }
    }

    pub fn store(&self) -> &Directory {
        self.store
    }

    /// Ancestor groups of `key` with the given kind, as name values.
    /// An entity outside every group yields an empty collection.
    pub fn ancestor_names(&self, kind: &str, key: &EntityKey) -> Vec<Value> {
        self.membership()
            .ancestors
            .get(kind)
            .and_then(|by_entity| by_entity.get(key))
            .map(|groups| {
                groups
                    .iter()
                    .map(|group| Value::Str(group.name.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The name of the first ancestor pool carrying a `pooltype`
    /// attribute equal to `role`. "First" is hash-map iteration order:
    /// when an entity belongs to several such pools the winner is
    /// unspecified.
    pub fn role(&self, key: &EntityKey) -> Option<String> {
        let membership = self.membership();
        let pools = membership.ancestors.get("pool")?.get(key)?;
        for pool in pools {
            let is_role = self
                .store
                .attributes(pool, "pooltype", None, None, false)
                .iter()
                .any(|value| matches!(value, Value::Str(s) if s == "role"));
            if is_role {
                return Some(pool.name.clone());
            }
        }
        None
    }

    fn membership(&self) -> &Membership {
        self.cache.get_or_init(|| self.build())
    }

    fn build(&self) -> Membership {
        let roots: Vec<EntityKey> = if self.scope.is_empty() {
            HIERARCHICAL_KINDS
                .iter()
                .flat_map(|kind| self.store.list(None, Some(kind)))
                .collect()
        } else {
            self.scope
                .iter()
                .flat_map(|name| self.store.list(Some(name), None))
                .filter(|key| HIERARCHICAL_KINDS.contains(&key.kind.as_str()))
                .collect()
        };

        let mut membership = Membership::default();
        for root in roots {
            let by_entity = membership.ancestors.entry(root.kind.clone()).or_default();

            // Walk the containment edges below this root. The graph is
            // assumed acyclic; the visited set makes a cycle terminate
            // instead of recursing forever.
            let mut visited: HashSet<EntityKey> = HashSet::new();
            visited.insert(root.clone());
            let mut frontier: Vec<EntityKey> = vec![root.clone()];
            while let Some(current) = frontier.pop() {
                for child in self.store.children(&current) {
                    if visited.insert(child.clone()) {
                        frontier.push(child.clone());
                    }
                    by_entity
                        .entry(child.clone())
                        .or_default()
                        .insert(root.clone());
                }
            }
        }

        tracing::debug!(
            "Membership: resolved {} kinds",
            membership.ancestors.len()
        );
        membership
    }
}
