//! ACID-durable graph tier backed by redb.
//!
//! Nodes and relationships are written through here on every upsert and read
//! back in creation order when a [`MemGraph`](super::MemGraph) is reopened.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::schema::{NodeKey, NodeLabel, PropValue, Properties, RelationType};
use crate::store::{EdgeRecord, NodeRecord, StoreResult};

type Table = TableDefinition<'static, &'static str, &'static [u8]>;

/// `"Label:key"` → bincode-encoded [`StoredNode`].
const NODES_TABLE: Table = TableDefinition::new("nodes");
/// `"REL|Label:key|Label:key"` → bincode-encoded [`StoredEdge`].
const EDGES_TABLE: Table = TableDefinition::new("edges");
/// Bookkeeping such as applied seed packs: `"seed:<id>"` → version.
const META_TABLE: Table = TableDefinition::new("meta");

const SEED_PREFIX: &str = "seed:";

/// bincode cannot decode untagged enums, so values are stored tagged.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum StoredValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<&PropValue> for StoredValue {
    fn from(v: &PropValue) -> Self {
        match v {
            PropValue::Bool(b) => Self::Bool(*b),
            PropValue::Int(i) => Self::Int(*i),
            PropValue::Float(x) => Self::Float(*x),
            PropValue::Str(s) => Self::Str(s.clone()),
        }
    }
}

impl From<StoredValue> for PropValue {
    fn from(v: StoredValue) -> Self {
        match v {
            StoredValue::Bool(b) => Self::Bool(b),
            StoredValue::Int(i) => Self::Int(i),
            StoredValue::Float(x) => Self::Float(x),
            StoredValue::Str(s) => Self::Str(s),
        }
    }
}

fn store_props(props: &Properties) -> Vec<(String, StoredValue)> {
    props
        .iter()
        .map(|(k, v)| (k.clone(), StoredValue::from(v)))
        .collect()
}

fn load_props(props: Vec<(String, StoredValue)>) -> Properties {
    props.into_iter().map(|(k, v)| (k, v.into())).collect()
}

/// Persisted form of a node. `seq` preserves creation order across reopen.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredNode {
    seq: u64,
    label: NodeLabel,
    key: String,
    properties: Vec<(String, StoredValue)>,
}

/// Persisted form of a relationship.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEdge {
    seq: u64,
    relation: RelationType,
    from: NodeKey,
    to: NodeKey,
    properties: Vec<(String, StoredValue)>,
}

fn node_table_key(key: &NodeKey) -> String {
    format!("{}:{}", key.label, key.key)
}

fn edge_table_key(edge: &EdgeRecord) -> String {
    format!(
        "{}|{}|{}",
        edge.relation,
        node_table_key(&edge.from),
        node_table_key(&edge.to)
    )
}

fn redb_err(context: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::Redb {
        message: format!("{context} failed: {e}"),
    }
}

fn serde_err(e: bincode::Error) -> StoreError {
    StoreError::Serialization {
        message: e.to_string(),
    }
}

/// Durable graph tier using redb.
pub struct DurableStore {
    db: Arc<Database>,
}

impl DurableStore {
    /// Open or create `medkg.redb` in the given directory.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let db_path = data_dir.join("medkg.redb");
        let db = Database::create(&db_path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", db_path.display()),
        })?;

        // Make sure every table exists so read transactions never miss them.
        let txn = db.begin_write().map_err(|e| redb_err("begin_write", e))?;
        for table in [NODES_TABLE, EDGES_TABLE, META_TABLE] {
            txn.open_table(table)
                .map_err(|e| redb_err("open_table", e))?;
        }
        txn.commit().map_err(|e| redb_err("commit", e))?;

        Ok(Self { db: Arc::new(db) })
    }

    fn scan(&self, table: Table) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let txn = self.db.begin_read().map_err(|e| redb_err("begin_read", e))?;
        let t = txn.open_table(table).map_err(|e| redb_err("open_table", e))?;
        let mut out = Vec::new();
        for entry in t.iter().map_err(|e| redb_err("iter", e))? {
            let (k, v) = entry.map_err(|e| redb_err("iter", e))?;
            out.push((k.value().to_string(), v.value().to_vec()));
        }
        Ok(out)
    }

    /// Write nodes and an optional relationship in a single transaction.
    ///
    /// Either everything lands or nothing does, so a persisted relationship
    /// never refers to an endpoint that was not persisted with it.
    pub fn put_batch(
        &self,
        nodes: &[(u64, &NodeRecord)],
        edge: Option<(u64, &EdgeRecord)>,
    ) -> StoreResult<()> {
        let mut node_rows = Vec::with_capacity(nodes.len());
        for (seq, node) in nodes {
            let stored = StoredNode {
                seq: *seq,
                label: node.label,
                key: node.key.clone(),
                properties: store_props(&node.properties),
            };
            let bytes = bincode::serialize(&stored).map_err(serde_err)?;
            node_rows.push((node_table_key(&node.node_key()), bytes));
        }
        let edge_row = match edge {
            Some((seq, edge)) => {
                let stored = StoredEdge {
                    seq,
                    relation: edge.relation,
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    properties: store_props(&edge.properties),
                };
                let bytes = bincode::serialize(&stored).map_err(serde_err)?;
                Some((edge_table_key(edge), bytes))
            }
            None => None,
        };

        let txn = self.db.begin_write().map_err(|e| redb_err("begin_write", e))?;
        {
            let mut t = txn
                .open_table(NODES_TABLE)
                .map_err(|e| redb_err("open_table", e))?;
            for (key, bytes) in &node_rows {
                t.insert(key.as_str(), bytes.as_slice())
                    .map_err(|e| redb_err("insert", e))?;
            }
        }
        if let Some((key, bytes)) = &edge_row {
            let mut t = txn
                .open_table(EDGES_TABLE)
                .map_err(|e| redb_err("open_table", e))?;
            t.insert(key.as_str(), bytes.as_slice())
                .map_err(|e| redb_err("insert", e))?;
        }
        txn.commit().map_err(|e| redb_err("commit", e))?;
        Ok(())
    }

    /// Write (or overwrite) a node.
    pub fn put_node(&self, seq: u64, node: &NodeRecord) -> StoreResult<()> {
        self.put_batch(&[(seq, node)], None)
    }

    /// Write (or overwrite) a relationship.
    pub fn put_edge(&self, seq: u64, edge: &EdgeRecord) -> StoreResult<()> {
        self.put_batch(&[], Some((seq, edge)))
    }

    /// All persisted nodes in creation order.
    pub fn load_nodes(&self) -> StoreResult<Vec<NodeRecord>> {
        let mut stored: Vec<StoredNode> = self
            .scan(NODES_TABLE)?
            .iter()
            .map(|(_, b)| bincode::deserialize(b).map_err(serde_err))
            .collect::<StoreResult<_>>()?;
        stored.sort_by_key(|n| n.seq);
        Ok(stored
            .into_iter()
            .map(|n| NodeRecord {
                label: n.label,
                key: n.key,
                properties: load_props(n.properties),
            })
            .collect())
    }

    /// All persisted relationships in creation order.
    pub fn load_edges(&self) -> StoreResult<Vec<EdgeRecord>> {
        let mut stored: Vec<StoredEdge> = self
            .scan(EDGES_TABLE)?
            .iter()
            .map(|(_, b)| bincode::deserialize(b).map_err(serde_err))
            .collect::<StoreResult<_>>()?;
        stored.sort_by_key(|e| e.seq);
        Ok(stored
            .into_iter()
            .map(|e| EdgeRecord {
                relation: e.relation,
                from: e.from,
                to: e.to,
                properties: load_props(e.properties),
            })
            .collect())
    }

    /// Record an applied seed pack version.
    pub fn put_seed(&self, id: &str, version: &str) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(|e| redb_err("begin_write", e))?;
        {
            let mut t = txn
                .open_table(META_TABLE)
                .map_err(|e| redb_err("open_table", e))?;
            t.insert(format!("{SEED_PREFIX}{id}").as_str(), version.as_bytes())
                .map_err(|e| redb_err("insert", e))?;
        }
        txn.commit().map_err(|e| redb_err("commit", e))?;
        Ok(())
    }

    /// Every recorded seed pack as `(id, version)`.
    pub fn load_seeds(&self) -> StoreResult<Vec<(String, String)>> {
        Ok(self
            .scan(META_TABLE)?
            .into_iter()
            .filter_map(|(key, value)| {
                let id = key.strip_prefix(SEED_PREFIX)?.to_string();
                Some((id, String::from_utf8_lossy(&value).into_owned()))
            })
            .collect())
    }
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore").finish()
    }
}
