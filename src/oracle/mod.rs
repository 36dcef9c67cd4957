//! Language-model oracle for exploration decisions.
//!
//! The oracle does two jobs: invent the next customer utterance to try at a
//! node, and classify a fresh agent turn as terminal or not. The core only
//! depends on the [`ExplorationOracle`] trait; [`OpenAiOracle`] is the
//! production implementation over the chat-completions API.

mod openai;
mod parser;
pub mod prompts;

pub use openai::OpenAiOracle;
pub use parser::{extract_json, parse_analysis, parse_utterance};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OracleResult;
use crate::graph::{ConversationMessage, ConversationState};
use crate::history::Exchange;

/// Inputs for generating a fresh customer utterance at a node.
#[derive(Debug, Clone, Copy)]
pub struct UtteranceContext<'a> {
    /// The business domain being probed.
    pub business_type: &'a str,
    /// The agent turn awaiting a reply.
    pub agent_message: &'a str,
    /// Exchanges observed so far under this context.
    pub history: &'a [Exchange],
    /// Utterances already tried at this node.
    pub explored: &'a [String],
}

/// Inputs for classifying a fresh agent turn.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisContext<'a> {
    /// The business domain being probed.
    pub business_type: &'a str,
    /// The customer utterance that produced the turn.
    pub utterance: &'a str,
    /// The reconstructed conversation leading to the turn.
    pub history: &'a [ConversationMessage],
}

/// Structured verdict on an agent turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationAnalysis {
    /// Whether the turn ends the conversation path.
    pub terminal: bool,
    /// Classified state of the turn.
    pub state: ConversationState,
    /// Confidence in the classification (0.0-1.0).
    pub confidence: f64,
    /// Why the oracle chose this classification.
    pub reasoning: String,
    /// Short label for the response that was taken.
    pub response: String,
    /// Candidate customer responses the turn invites; empty if terminal.
    #[serde(default)]
    pub candidate_responses: Vec<String>,
}

/// Produces next-utterance candidates and terminality verdicts.
#[async_trait]
pub trait ExplorationOracle: Send + Sync {
    /// Generate the opening utterance that seeds a discovery run.
    async fn generate_opening(&self, business_type: &str) -> OracleResult<String>;

    /// Generate a customer utterance to try next, given the conversation so
    /// far and the utterances already explored at the node.
    async fn generate_utterance(&self, context: UtteranceContext<'_>) -> OracleResult<String>;

    /// Classify an agent turn as terminal or not, with state, confidence and
    /// candidate follow-ups.
    async fn analyze(
        &self,
        context: AnalysisContext<'_>,
        transcript: &str,
    ) -> OracleResult<ConversationAnalysis>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_serialization_roundtrip() {
        let analysis = ConversationAnalysis {
            terminal: false,
            state: ConversationState::InProgress,
            confidence: 0.8,
            reasoning: "agent asked a question".to_string(),
            response: "existing customer".to_string(),
            candidate_responses: vec!["Yes".to_string(), "No".to_string()],
        };
        let json = serde_json::to_string(&analysis).unwrap();
        let parsed: ConversationAnalysis = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, analysis);
    }

    #[test]
    fn test_analysis_candidates_default_empty() {
        let json = r#"{
            "terminal": true,
            "state": "TERMINAL_SUCCESS",
            "confidence": 0.9,
            "reasoning": "appointment booked",
            "response": "confirmed"
        }"#;
        let parsed: ConversationAnalysis = serde_json::from_str(json).unwrap();
        assert!(parsed.candidate_responses.is_empty());
        assert!(parsed.state.is_terminal());
    }
}
