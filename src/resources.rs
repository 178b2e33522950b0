//! The schema resource registry.
//!
//! Three first-wins tables shared by every node of a compilation unit:
//! schema resources and anchors by canonical IRI, dynamic anchors by
//! `IRI#name`, and resolved reference targets by target IRI. Entries are
//! never removed or replaced, so a lookup that succeeded once keeps
//! returning the same node.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::schema::NodeId;

type Table = RwLock<HashMap<String, NodeId>>;

#[derive(Debug, Default)]
pub struct ResourceRegistry {
    resources: Table,
    dynamic_anchors: Table,
    references: Table,
}

/// Which of the three tables a key lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyspace {
    Resources,
    DynamicAnchors,
    References,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, keyspace: Keyspace) -> &Table {
        match keyspace {
            Keyspace::Resources => &self.resources,
            Keyspace::DynamicAnchors => &self.dynamic_anchors,
            Keyspace::References => &self.references,
        }
    }

    /// Inserts `node` under `key` unless the key is taken. Returns the node
    /// that ends up registered.
    pub fn register(&self, keyspace: Keyspace, key: impl Into<String>, node: NodeId) -> NodeId {
        let key = key.into();
        if let Some(existing) = self.table(keyspace).read().get(&key) {
            return *existing;
        }
        *self.table(keyspace).write().entry(key).or_insert(node)
    }

    pub fn lookup(&self, keyspace: Keyspace, key: &str) -> Option<NodeId> {
        self.table(keyspace).read().get(key).copied()
    }

    pub fn contains(&self, keyspace: Keyspace, key: &str) -> bool {
        self.table(keyspace).read().contains_key(key)
    }

    pub fn len(&self, keyspace: Keyspace) -> usize {
        self.table(keyspace).read().len()
    }

    /// Returns the keys of a table, sorted.
    pub fn keys(&self, keyspace: Keyspace) -> Vec<String> {
        let mut keys: Vec<String> = self.table(keyspace).read().keys().cloned().collect();
        keys.sort();
        keys
    }
}
