//! The deduplicating conversation graph.
//!
//! This module provides the shared data model for a discovery run:
//! - [`ConversationNode`]: a point where the agent has spoken and awaits input
//! - [`ConversationEdge`]: a transition labeled by the customer utterance
//! - [`ConversationGraph`]: the thread-safe store performing merge-on-add
//!   deduplication and ancestor-chain reconstruction
//! - [`GraphSnapshot`]: the read-only export consumed by the viewer endpoint
//!
//! One graph instance is explicitly constructed per discovery run and shared
//! between workers as an `Arc`; there is no process-wide instance.

mod edge;
#[allow(clippy::module_inception)]
mod graph;
mod node;
mod snapshot;

pub use edge::{ConversationEdge, EdgeMetadata};
pub use graph::ConversationGraph;
pub use node::{ConversationNode, ConversationState, NodeMetadata};
pub use snapshot::{EdgeSnapshot, GraphSnapshot, NodeSnapshot};

use serde::{Deserialize, Serialize};

/// A single conversational turn attributed to a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// The speaker role, `"user"` or `"assistant"`.
    pub role: String,
    /// The turn text.
    pub content: String,
}

impl ConversationMessage {
    /// Create a customer (user) turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Create an agent (assistant) turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let user = ConversationMessage::user("Yes");
        assert_eq!(user.role, "user");
        assert_eq!(user.content, "Yes");

        let assistant = ConversationMessage::assistant("How can I help?");
        assert_eq!(assistant.role, "assistant");
        assert_eq!(assistant.content, "How can I help?");
    }

    #[test]
    fn test_message_serialization_roundtrip() {
        let message = ConversationMessage::user("I need a repair");
        let json = serde_json::to_string(&message).unwrap();
        let parsed: ConversationMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, message);
    }
}
