use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ConversationMessage;

/// State of a conversation node.
///
/// The three `Terminal*` states and `Error` require no further exploration;
/// `Error` marks a path that ended because the call/transcribe/analyze round
/// trip failed rather than because the agent concluded the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationState {
    /// The greeting state at the root of the graph.
    Initial,
    /// An active state where more customer input is expected.
    InProgress,
    /// The agent completed the customer's goal (e.g. appointment booked).
    TerminalSuccess,
    /// The agent handed off to a human.
    TerminalTransfer,
    /// The agent gave up on the request.
    TerminalFallback,
    /// The round trip failed; the path ends here.
    Error,
}

impl ConversationState {
    /// Whether this state ends a conversation path.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConversationState::TerminalSuccess
                | ConversationState::TerminalTransfer
                | ConversationState::TerminalFallback
                | ConversationState::Error
        )
    }

    /// Get the state name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationState::Initial => "INITIAL",
            ConversationState::InProgress => "IN_PROGRESS",
            ConversationState::TerminalSuccess => "TERMINAL_SUCCESS",
            ConversationState::TerminalTransfer => "TERMINAL_TRANSFER",
            ConversationState::TerminalFallback => "TERMINAL_FALLBACK",
            ConversationState::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ConversationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "INITIAL" => Ok(ConversationState::Initial),
            "IN_PROGRESS" => Ok(ConversationState::InProgress),
            "TERMINAL_SUCCESS" => Ok(ConversationState::TerminalSuccess),
            "TERMINAL_TRANSFER" => Ok(ConversationState::TerminalTransfer),
            "TERMINAL_FALLBACK" => Ok(ConversationState::TerminalFallback),
            "ERROR" => Ok(ConversationState::Error),
            _ => Err(format!("Unknown conversation state: {}", s)),
        }
    }
}

/// Free-form context attached to a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// Oracle confidence in the state classification (0.0-1.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Oracle reasoning behind the classification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Business context the node was discovered under.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_type: Option<String>,
    /// Identifier of the call that produced this node's transcript.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    /// Error detail for `Error`-state nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A point in the conversation where the agent has spoken and awaits input.
///
/// Nodes carry a random id; deduplication happens explicitly when the node is
/// inserted into the graph, which may substitute the id of an existing
/// semantically-equivalent node. After insertion a node is only ever mutated
/// to append explored-response bookkeeping; it is never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationNode {
    /// Unique node identifier.
    pub id: Uuid,
    /// The latest agent turn, used as the deduplication key.
    pub decision_point: String,
    /// The agent turn as a structured message.
    pub assistant_message: ConversationMessage,
    /// Parent node id; `None` only for the root.
    pub parent_id: Option<Uuid>,
    /// Whether this is the graph root.
    pub is_initial: bool,
    /// Current state of this node.
    pub state: ConversationState,
    /// Distance from the root (root = 0).
    pub depth: u32,
    /// Customer utterances already tried from this node.
    #[serde(default)]
    pub explored_responses: Vec<String>,
    /// Additional context about the node.
    #[serde(default)]
    pub metadata: NodeMetadata,
    /// When the node was created.
    pub created_at: DateTime<Utc>,
}

impl ConversationNode {
    /// Create the root node from the agent's opening turn.
    pub fn root(decision_point: impl Into<String>) -> Self {
        let decision_point = decision_point.into();
        Self {
            id: Uuid::new_v4(),
            assistant_message: ConversationMessage::assistant(decision_point.clone()),
            decision_point,
            parent_id: None,
            is_initial: true,
            state: ConversationState::Initial,
            depth: 0,
            explored_responses: Vec::new(),
            metadata: NodeMetadata::default(),
            created_at: Utc::now(),
        }
    }

    /// Create a child node one level below `parent_id`.
    pub fn child(
        parent_id: Uuid,
        parent_depth: u32,
        decision_point: impl Into<String>,
        state: ConversationState,
    ) -> Self {
        let decision_point = decision_point.into();
        Self {
            id: Uuid::new_v4(),
            assistant_message: ConversationMessage::assistant(decision_point.clone()),
            decision_point,
            parent_id: Some(parent_id),
            is_initial: false,
            state,
            depth: parent_depth + 1,
            explored_responses: Vec::new(),
            metadata: NodeMetadata::default(),
            created_at: Utc::now(),
        }
    }

    /// Attach metadata to the node.
    pub fn with_metadata(mut self, metadata: NodeMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Whether this node ends a conversation path.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
