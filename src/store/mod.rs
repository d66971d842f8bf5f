//! Graph storage boundary for medkg.
//!
//! Everything above this module talks to the graph through the [`GraphStore`]
//! trait: idempotent upserts keyed by business key, and single-hop traversals
//! keyed by case-insensitive key equality.
//!
//! - [`MemGraph`]: petgraph adjacency with a DashMap key index
//! - [`DurableStore`]: redb write-through tier used by [`MemGraph::open`]

pub mod durable;
pub mod mem;

pub use durable::DurableStore;
pub use mem::MemGraph;
pub use petgraph::Direction;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::schema::{EdgeSpec, NodeKey, NodeLabel, NodeSpec, Properties, RelationType};

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A node as held by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub label: NodeLabel,
    /// Business key in its first-seen spelling.
    pub key: String,
    pub properties: Properties,
}

impl NodeRecord {
    pub fn node_key(&self) -> NodeKey {
        NodeKey {
            label: self.label,
            key: crate::schema::normalize_key(&self.key),
        }
    }
}

/// A relationship as held by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub relation: RelationType,
    pub from: NodeKey,
    pub to: NodeKey,
    pub properties: Properties,
}

/// One hop of a traversal: the node reached and the attributes of the
/// relationship that reached it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub node: NodeRecord,
    pub relationship: Properties,
}

/// Storage backend contract.
///
/// Implementations must treat node identity as case-insensitive equality on
/// the business key and must never duplicate a node or a
/// `(relation, from, to)` relationship.
pub trait GraphStore: Send + Sync {
    /// Create the node if absent, otherwise set the supplied attributes on it.
    fn upsert_node(&self, spec: &NodeSpec) -> StoreResult<NodeRecord>;

    /// Upsert both endpoints, then the relationship. The relationship's
    /// attributes are replaced wholesale by those on `spec`.
    fn upsert_edge(&self, spec: &EdgeSpec) -> StoreResult<EdgeRecord>;

    fn get_node(&self, key: &NodeKey) -> StoreResult<Option<NodeRecord>>;

    /// All nodes with the label, in creation order.
    fn nodes_with_label(&self, label: NodeLabel) -> StoreResult<Vec<NodeRecord>>;

    /// Nodes one `relation` hop away from `key`, in relationship creation order.
    fn neighbors(
        &self,
        key: &NodeKey,
        relation: RelationType,
        direction: Direction,
    ) -> StoreResult<Vec<Neighbor>>;

    /// Case-insensitive substring search over `name`-keyed nodes.
    fn search(&self, term: &str) -> StoreResult<Vec<NodeRecord>>;

    /// Version of the seed pack recorded as applied under `id`, if any.
    fn applied_seed(&self, id: &str) -> StoreResult<Option<String>>;

    /// Record that seed pack `id` has been applied at `version`.
    fn record_seed(&self, id: &str, version: &str) -> StoreResult<()>;

    fn node_count(&self) -> usize;

    fn edge_count(&self) -> usize;
}
