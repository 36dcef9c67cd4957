use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ConversationEdge, ConversationNode, ConversationState};

/// Summary of a node in a [`GraphSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Node id.
    pub id: Uuid,
    /// Node state.
    pub state: ConversationState,
    /// Whether the node ends a path.
    pub terminal: bool,
    /// The agent turn at this node.
    pub label: String,
    /// Distance from the root.
    pub depth: u32,
}

/// Summary of an edge in a [`GraphSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    /// Source node id.
    pub source: Uuid,
    /// Target node id.
    pub target: Uuid,
    /// The customer utterance on the transition.
    pub label: String,
}

/// A consistent point-in-time export of the graph for external viewers.
///
/// No write path exists: viewers can only read what discovery has produced
/// so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// All nodes at snapshot time.
    pub nodes: Vec<NodeSnapshot>,
    /// All edges at snapshot time.
    pub edges: Vec<EdgeSnapshot>,
}

impl GraphSnapshot {
    pub(crate) fn from_parts<'a>(
        nodes: impl Iterator<Item = &'a ConversationNode>,
        edges: impl Iterator<Item = &'a ConversationEdge>,
    ) -> Self {
        Self {
            nodes: nodes
                .map(|node| NodeSnapshot {
                    id: node.id,
                    state: node.state,
                    terminal: node.is_terminal(),
                    label: node.decision_point.clone(),
                    depth: node.depth,
                })
                .collect(),
            edges: edges
                .map(|edge| EdgeSnapshot {
                    source: edge.source_id,
                    target: edge.target_id,
                    label: edge.user_message.content.clone(),
                })
                .collect(),
        }
    }
}
