//! In-memory clinical graph with a key index.
//!
//! Uses `petgraph` for adjacency and `DashMap` for O(1) node lookup by
//! normalized business key. When opened over a data directory, every upsert
//! is committed to redb before it becomes visible in memory, and the graph is
//! rebuilt from redb on open.

use std::path::Path;
use std::sync::RwLock;

use dashmap::DashMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::error::StoreError;
use crate::schema::{EdgeSpec, NodeKey, NodeLabel, NodeSpec, Properties, RelationType};

use super::{DurableStore, EdgeRecord, GraphStore, Neighbor, NodeRecord, StoreResult};

/// Edge weight stored on petgraph edges.
#[derive(Debug, Clone)]
struct EdgeData {
    relation: RelationType,
    properties: Properties,
}

/// Clinical property graph backed by petgraph.
pub struct MemGraph {
    graph: RwLock<DiGraph<NodeRecord, EdgeData>>,
    /// NodeKey → NodeIndex. Only mutated while the graph write lock is held.
    node_index: DashMap<NodeKey, NodeIndex>,
    durable: Option<DurableStore>,
    /// Applied seed packs: id → version.
    seeds: DashMap<String, String>,
}

/// A node upsert worked out against the current graph but not yet applied.
struct NodePlan {
    /// Existing index, or `None` when the node will be created.
    idx: Option<NodeIndex>,
    /// Creation sequence persisted alongside the record.
    seq: u64,
    record: NodeRecord,
}

impl MemGraph {
    /// Create an empty, memory-only graph.
    pub fn new() -> Self {
        Self {
            graph: RwLock::new(DiGraph::new()),
            node_index: DashMap::new(),
            durable: None,
            seeds: DashMap::new(),
        }
    }

    /// Open a persistent graph in `data_dir`, restoring whatever was written
    /// there by earlier sessions.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        let durable = DurableStore::open(data_dir)?;
        let nodes = durable.load_nodes()?;
        let edges = durable.load_edges()?;
        let seeds: DashMap<String, String> = durable.load_seeds()?.into_iter().collect();

        let mut graph = DiGraph::new();
        let node_index = DashMap::new();
        for node in nodes {
            let key = node.node_key();
            let idx = graph.add_node(node);
            node_index.insert(key, idx);
        }

        let lookup = |key: &NodeKey| -> StoreResult<NodeIndex> {
            node_index
                .get(key)
                .map(|r| *r.value())
                .ok_or_else(|| StoreError::DanglingEdge {
                    label: key.label.to_string(),
                    key: key.key.clone(),
                })
        };
        for edge in edges {
            let from = lookup(&edge.from)?;
            let to = lookup(&edge.to)?;
            graph.add_edge(
                from,
                to,
                EdgeData {
                    relation: edge.relation,
                    properties: edge.properties,
                },
            );
        }

        tracing::info!(
            path = %data_dir.display(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "opened clinical graph"
        );

        Ok(Self {
            graph: RwLock::new(graph),
            node_index,
            durable: Some(durable),
            seeds,
        })
    }

    /// Whether upserts are written through to disk.
    pub fn is_persistent(&self) -> bool {
        self.durable.is_some()
    }

    fn lookup(&self, key: &NodeKey) -> Option<NodeIndex> {
        self.node_index.get(key).map(|r| *r.value())
    }

    /// Work out the result of upserting `spec` without touching the graph.
    /// New nodes take the next free index, counted through `next`.
    fn plan_node(
        &self,
        graph: &DiGraph<NodeRecord, EdgeData>,
        spec: &NodeSpec,
        next: &mut usize,
    ) -> NodePlan {
        match self.lookup(&spec.node_key()) {
            Some(idx) => {
                let mut record = graph[idx].clone();
                for (name, value) in spec.properties() {
                    record.properties.insert(name.clone(), value.clone());
                }
                NodePlan {
                    idx: Some(idx),
                    seq: idx.index() as u64,
                    record,
                }
            }
            None => {
                let seq = *next as u64;
                *next += 1;
                NodePlan {
                    idx: None,
                    seq,
                    record: NodeRecord {
                        label: spec.label(),
                        key: spec.key().to_string(),
                        properties: spec.properties().clone(),
                    },
                }
            }
        }
    }

    /// Apply a plan to the graph. The caller holds the write lock.
    fn commit_node(&self, graph: &mut DiGraph<NodeRecord, EdgeData>, plan: NodePlan) -> NodeIndex {
        match plan.idx {
            Some(idx) => {
                graph[idx] = plan.record;
                idx
            }
            None => {
                let key = plan.record.node_key();
                tracing::debug!(label = %key.label, key = %plan.record.key, "created node");
                let idx = graph.add_node(plan.record);
                self.node_index.insert(key, idx);
                idx
            }
        }
    }
}

impl GraphStore for MemGraph {
    fn upsert_node(&self, spec: &NodeSpec) -> StoreResult<NodeRecord> {
        let mut graph = self.graph.write().expect("graph lock poisoned");
        let mut next = graph.node_count();
        let plan = self.plan_node(&graph, spec, &mut next);

        if let Some(ref durable) = self.durable {
            durable.put_node(plan.seq, &plan.record)?;
        }
        let record = plan.record.clone();
        self.commit_node(&mut graph, plan);
        Ok(record)
    }

    fn upsert_edge(&self, spec: &EdgeSpec) -> StoreResult<EdgeRecord> {
        let mut graph = self.graph.write().expect("graph lock poisoned");
        let mut next = graph.node_count();
        let from = self.plan_node(&graph, spec.from(), &mut next);
        let to = self.plan_node(&graph, spec.to(), &mut next);

        let existing = match (from.idx, to.idx) {
            (Some(a), Some(b)) => graph
                .edges_connecting(a, b)
                .find(|e| e.weight().relation == spec.relation())
                .map(|e| e.id()),
            _ => None,
        };
        let record = EdgeRecord {
            relation: spec.relation(),
            from: from.record.node_key(),
            to: to.record.node_key(),
            properties: spec.properties().clone(),
        };

        if let Some(ref durable) = self.durable {
            let edge_seq = existing.map_or(graph.edge_count(), |ei| ei.index()) as u64;
            durable.put_batch(
                &[(from.seq, &from.record), (to.seq, &to.record)],
                Some((edge_seq, &record)),
            )?;
        }

        let from_idx = self.commit_node(&mut graph, from);
        let to_idx = self.commit_node(&mut graph, to);
        match existing {
            Some(ei) => graph[ei].properties = spec.properties().clone(),
            None => {
                tracing::debug!(
                    relation = %record.relation,
                    from = %record.from,
                    to = %record.to,
                    "created relationship"
                );
                graph.add_edge(
                    from_idx,
                    to_idx,
                    EdgeData {
                        relation: spec.relation(),
                        properties: spec.properties().clone(),
                    },
                );
            }
        }
        Ok(record)
    }

    fn get_node(&self, key: &NodeKey) -> StoreResult<Option<NodeRecord>> {
        let graph = self.graph.read().expect("graph lock poisoned");
        Ok(self.lookup(key).map(|idx| graph[idx].clone()))
    }

    fn nodes_with_label(&self, label: NodeLabel) -> StoreResult<Vec<NodeRecord>> {
        let graph = self.graph.read().expect("graph lock poisoned");
        Ok(graph
            .node_indices()
            .map(|idx| &graph[idx])
            .filter(|n| n.label == label)
            .cloned()
            .collect())
    }

    fn neighbors(
        &self,
        key: &NodeKey,
        relation: RelationType,
        direction: Direction,
    ) -> StoreResult<Vec<Neighbor>> {
        let graph = self.graph.read().expect("graph lock poisoned");
        let Some(idx) = self.lookup(key) else {
            return Ok(vec![]);
        };

        // petgraph walks adjacency newest-first; sort back into creation order.
        let mut hops: Vec<_> = graph
            .edges_directed(idx, direction)
            .filter(|e| e.weight().relation == relation)
            .map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                (
                    e.id(),
                    Neighbor {
                        node: graph[other].clone(),
                        relationship: e.weight().properties.clone(),
                    },
                )
            })
            .collect();
        hops.sort_by_key(|(id, _)| *id);
        Ok(hops.into_iter().map(|(_, n)| n).collect())
    }

    fn search(&self, term: &str) -> StoreResult<Vec<NodeRecord>> {
        let needle = term.trim().to_lowercase();
        let graph = self.graph.read().expect("graph lock poisoned");
        Ok(graph
            .node_indices()
            .map(|idx| &graph[idx])
            .filter(|n| n.label.key_property() == "name")
            .filter(|n| n.key.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    fn applied_seed(&self, id: &str) -> StoreResult<Option<String>> {
        Ok(self.seeds.get(id).map(|v| v.value().clone()))
    }

    fn record_seed(&self, id: &str, version: &str) -> StoreResult<()> {
        if let Some(ref durable) = self.durable {
            durable.put_seed(id, version)?;
        }
        self.seeds.insert(id.to_string(), version.to_string());
        Ok(())
    }

    fn node_count(&self) -> usize {
        self.node_index.len()
    }

    fn edge_count(&self) -> usize {
        self.graph.read().expect("graph lock poisoned").edge_count()
    }
}

impl Default for MemGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemGraph")
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .field("persistent", &self.is_persistent())
            .finish()
    }
}
