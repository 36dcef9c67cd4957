use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;
use uuid::Uuid;

use super::{ConversationEdge, ConversationMessage, ConversationNode, GraphSnapshot};
use crate::error::{GraphError, GraphResult};
use crate::similarity::{SequenceMatcher, SimilarityMatcher};

#[derive(Default)]
struct GraphState {
    root_id: Option<Uuid>,
    nodes: HashMap<Uuid, ConversationNode>,
    edges: HashMap<(Uuid, Uuid), ConversationEdge>,
}

/// Thread-safe store of conversation nodes and edges with merge-on-add
/// deduplication.
///
/// All mutation and reconstruction goes through one interior lock, so
/// concurrent workers never observe a torn state and the merge-or-insert
/// decision in [`add_node`](Self::add_node) is atomic with respect to other
/// inserts. The lock is never held across an await point; every operation is
/// synchronous and short.
pub struct ConversationGraph {
    state: RwLock<GraphState>,
    matcher: Arc<dyn SimilarityMatcher>,
    node_threshold: f64,
    response_threshold: f64,
}

impl ConversationGraph {
    /// Create a graph using the production sequence matcher.
    ///
    /// `node_threshold` governs decision-point merging; `response_threshold`
    /// governs explored-utterance deduplication.
    pub fn new(node_threshold: f64, response_threshold: f64) -> Self {
        Self::with_matcher(Arc::new(SequenceMatcher), node_threshold, response_threshold)
    }

    /// Create a graph with a caller-supplied similarity strategy.
    pub fn with_matcher(
        matcher: Arc<dyn SimilarityMatcher>,
        node_threshold: f64,
        response_threshold: f64,
    ) -> Self {
        Self {
            state: RwLock::new(GraphState::default()),
            matcher,
            node_threshold,
            response_threshold,
        }
    }

    /// Insert a node, deduplicating against existing decision points.
    ///
    /// The first node must be initial and becomes the root. Terminal nodes
    /// are always stored verbatim: each terminal path is distinct even when
    /// the final transcripts look alike. Any other node is merged into an
    /// existing node whose normalized decision point is similar above the
    /// node threshold, in which case the existing node's id is returned and
    /// the new node is discarded.
    pub fn add_node(&self, node: ConversationNode) -> GraphResult<Uuid> {
        let mut state = self.state.write().expect("graph lock poisoned");

        if state.root_id.is_none() {
            if !node.is_initial {
                return Err(GraphError::InvalidState {
                    message: "first node must be initial".to_string(),
                });
            }
            debug!(node_id = %node.id, "Root node created");
            state.root_id = Some(node.id);
            let id = node.id;
            state.nodes.insert(id, node);
            return Ok(id);
        }

        if node.is_initial {
            return Err(GraphError::InvalidState {
                message: "graph already has an initial node".to_string(),
            });
        }

        if node.is_terminal() {
            let id = node.id;
            state.nodes.insert(id, node);
            return Ok(id);
        }

        let similar = state.nodes.values().find(|existing| {
            self.matcher.is_similar(
                &node.decision_point,
                &existing.decision_point,
                self.node_threshold,
            )
        });

        if let Some(existing) = similar {
            debug!(new_id = %node.id, merged_into = %existing.id, "Node merged into existing decision point");
            return Ok(existing.id);
        }

        let id = node.id;
        state.nodes.insert(id, node);
        Ok(id)
    }

    /// Insert an edge between two existing nodes.
    ///
    /// Fails if either endpoint is absent. A duplicate `(source, target)`
    /// pair keeps the first edge and drops the new one.
    pub fn add_edge(&self, edge: ConversationEdge) -> GraphResult<()> {
        let mut state = self.state.write().expect("graph lock poisoned");

        if !state.nodes.contains_key(&edge.source_id) || !state.nodes.contains_key(&edge.target_id)
        {
            return Err(GraphError::DanglingReference {
                src: edge.source_id.to_string(),
                target: edge.target_id.to_string(),
            });
        }

        state.edges.entry(edge.key()).or_insert(edge);
        Ok(())
    }

    /// The root node id, if a root exists yet.
    pub fn root_id(&self) -> Option<Uuid> {
        self.state.read().expect("graph lock poisoned").root_id
    }

    /// A point-in-time copy of a node.
    pub fn get_node(&self, node_id: Uuid) -> Option<ConversationNode> {
        self.state
            .read()
            .expect("graph lock poisoned")
            .nodes
            .get(&node_id)
            .cloned()
    }

    /// Point-in-time copies of all direct children of a node.
    pub fn children(&self, node_id: Uuid) -> Vec<ConversationNode> {
        let state = self.state.read().expect("graph lock poisoned");
        state
            .edges
            .values()
            .filter(|edge| edge.source_id == node_id)
            .filter_map(|edge| state.nodes.get(&edge.target_id))
            .cloned()
            .collect()
    }

    /// Reconstruct the linear conversation leading to a node, in
    /// root-to-node order.
    ///
    /// Each level below the root contributes the customer turn that entered
    /// it followed by the node's own agent turn, so a depth-`d` node yields
    /// `2 * d` turns; querying the root itself yields its agent turn alone.
    /// Fails if the chain references a missing node or if the edge between a
    /// node and its recorded parent cannot be found (graph corruption).
    pub fn conversation_history(&self, node_id: Uuid) -> GraphResult<Vec<ConversationMessage>> {
        let state = self.state.read().expect("graph lock poisoned");

        let mut current = state.nodes.get(&node_id).ok_or(GraphError::NodeNotFound {
            node_id: node_id.to_string(),
        })?;

        if current.parent_id.is_none() {
            return Ok(vec![current.assistant_message.clone()]);
        }

        let mut messages = Vec::new();
        while let Some(parent_id) = current.parent_id {
            let edge = state.edges.get(&(parent_id, current.id)).ok_or(
                GraphError::MissingParentEdge {
                    parent_id: parent_id.to_string(),
                    node_id: current.id.to_string(),
                },
            )?;
            messages.push(current.assistant_message.clone());
            messages.push(edge.user_message.clone());

            current = state.nodes.get(&parent_id).ok_or(GraphError::NodeNotFound {
                node_id: parent_id.to_string(),
            })?;
        }

        messages.reverse();
        Ok(messages)
    }

    /// The sequence of edges from the root to a node, in root-to-node order.
    ///
    /// Returns an empty path for the root or an unknown node. A broken chain
    /// is truncated silently: a short result means "path unknown past this
    /// point", not ground truth.
    pub fn path_to_node(&self, node_id: Uuid) -> Vec<ConversationEdge> {
        let state = self.state.read().expect("graph lock poisoned");

        if !state.nodes.contains_key(&node_id) {
            return Vec::new();
        }

        let mut path = Vec::new();
        let mut current = node_id;

        while Some(current) != state.root_id {
            let edge = state.edges.values().find(|edge| edge.target_id == current);
            match edge {
                Some(edge) => {
                    path.push(edge.clone());
                    current = edge.source_id;
                }
                None => break,
            }
        }

        path.reverse();
        path
    }

    /// Record a customer utterance as explored on a node.
    ///
    /// Returns `true` if the utterance was novel, `false` if a similar
    /// utterance (above the response threshold) had already been explored.
    pub fn record_explored_response(&self, node_id: Uuid, utterance: &str) -> GraphResult<bool> {
        let mut state = self.state.write().expect("graph lock poisoned");
        let node = state
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound {
                node_id: node_id.to_string(),
            })?;

        if self
            .matcher
            .find_similar(utterance, &node.explored_responses, self.response_threshold)
            .is_some()
        {
            return Ok(false);
        }

        node.explored_responses.push(utterance.to_string());
        Ok(true)
    }

    /// Whether a similar utterance has already been explored on a node.
    pub fn has_similar_response(&self, node_id: Uuid, utterance: &str) -> GraphResult<bool> {
        let state = self.state.read().expect("graph lock poisoned");
        let node = state.nodes.get(&node_id).ok_or(GraphError::NodeNotFound {
            node_id: node_id.to_string(),
        })?;

        Ok(self
            .matcher
            .find_similar(utterance, &node.explored_responses, self.response_threshold)
            .is_some())
    }

    /// Point-in-time copies of all nodes.
    pub fn nodes(&self) -> Vec<ConversationNode> {
        self.state
            .read()
            .expect("graph lock poisoned")
            .nodes
            .values()
            .cloned()
            .collect()
    }

    /// Point-in-time copies of all edges.
    pub fn edges(&self) -> Vec<ConversationEdge> {
        self.state
            .read()
            .expect("graph lock poisoned")
            .edges
            .values()
            .cloned()
            .collect()
    }

    /// Number of nodes currently stored.
    pub fn node_count(&self) -> usize {
        self.state.read().expect("graph lock poisoned").nodes.len()
    }

    /// Number of edges currently stored.
    pub fn edge_count(&self) -> usize {
        self.state.read().expect("graph lock poisoned").edges.len()
    }

    /// A consistent read-only snapshot for external viewers.
    pub fn snapshot(&self) -> GraphSnapshot {
        let state = self.state.read().expect("graph lock poisoned");
        GraphSnapshot::from_parts(state.nodes.values(), state.edges.values())
    }
}
