use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ConversationMessage;

/// Context attached to an edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeMetadata {
    /// Oracle confidence in the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Identifier of the call that traversed this transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
}

/// A transition between two conversation states, labeled by the customer
/// utterance that caused it.
///
/// Edge identity is the `(source_id, target_id)` pair alone: a second edge
/// between the same two nodes is dropped on insertion regardless of its
/// utterance (keep-first). Edges are never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEdge {
    /// Source node id.
    pub source_id: Uuid,
    /// Target node id.
    pub target_id: Uuid,
    /// The customer utterance that caused the transition.
    pub user_message: ConversationMessage,
    /// When the transition was first observed.
    pub created_at: DateTime<Utc>,
    /// Additional context about the transition.
    #[serde(default)]
    pub metadata: EdgeMetadata,
}

impl ConversationEdge {
    /// Create an edge labeled with a customer utterance.
    pub fn new(source_id: Uuid, target_id: Uuid, utterance: impl Into<String>) -> Self {
        Self {
            source_id,
            target_id,
            user_message: ConversationMessage::user(utterance),
            created_at: Utc::now(),
            metadata: EdgeMetadata::default(),
        }
    }

    /// Attach metadata to the edge.
    pub fn with_metadata(mut self, metadata: EdgeMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// The identity key of this edge.
    pub fn key(&self) -> (Uuid, Uuid) {
        (self.source_id, self.target_id)
    }
}
