//! Strict parsing of oracle completions.
//!
//! Completions must carry a JSON payload, optionally wrapped in markdown
//! code fences. Anything that does not parse into the expected shape is a
//! [`OracleError::Malformed`] and is treated as a task failure, never
//! retried.

use serde::Deserialize;

use super::ConversationAnalysis;
use crate::error::{OracleError, OracleResult};
use crate::graph::ConversationState;

/// Extract the JSON payload from a completion, handling markdown code blocks.
///
/// Attempts, in order: raw JSON, a ```json fenced block, a plain ``` fenced
/// block.
pub fn extract_json(completion: &str) -> OracleResult<&str> {
    let trimmed = completion.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(trimmed);
    }

    if completion.contains("```json") {
        return completion
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| OracleError::Malformed {
                message: "found ```json block but content was empty".to_string(),
            });
    }

    if completion.contains("```") {
        return completion
            .split("```")
            .nth(1)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| OracleError::Malformed {
                message: "found ``` block but content was empty".to_string(),
            });
    }

    Err(OracleError::Malformed {
        message: format!(
            "no JSON found in completion, first 100 chars: '{}'",
            completion.chars().take(100).collect::<String>()
        ),
    })
}

#[derive(Deserialize)]
struct RawAnalysis {
    terminal: bool,
    state: String,
    confidence: f64,
    reasoning: String,
    response: String,
    #[serde(default)]
    candidate_responses: Vec<String>,
}

/// Parse and validate an analysis completion.
///
/// Rejects unknown state labels, out-of-range confidence, and a terminal
/// flag that disagrees with the state.
pub fn parse_analysis(completion: &str) -> OracleResult<ConversationAnalysis> {
    let json = extract_json(completion)?;
    let raw: RawAnalysis = serde_json::from_str(json).map_err(|e| OracleError::Malformed {
        message: format!("analysis did not match expected shape: {}", e),
    })?;

    let state: ConversationState = raw
        .state
        .parse()
        .map_err(|message| OracleError::Malformed { message })?;

    if !(0.0..=1.0).contains(&raw.confidence) {
        return Err(OracleError::Malformed {
            message: format!("confidence out of range: {}", raw.confidence),
        });
    }

    if raw.terminal != state.is_terminal() {
        return Err(OracleError::Malformed {
            message: format!(
                "terminal flag {} disagrees with state {}",
                raw.terminal, state
            ),
        });
    }

    Ok(ConversationAnalysis {
        terminal: raw.terminal,
        state,
        confidence: raw.confidence,
        reasoning: raw.reasoning.trim().to_string(),
        response: raw.response.trim().to_string(),
        candidate_responses: raw.candidate_responses,
    })
}

#[derive(Deserialize)]
struct RawUtterance {
    response: String,
}

/// Parse a generated customer utterance from a completion.
pub fn parse_utterance(completion: &str) -> OracleResult<String> {
    let json = extract_json(completion)?;
    let raw: RawUtterance = serde_json::from_str(json).map_err(|e| OracleError::Malformed {
        message: format!("utterance did not match expected shape: {}", e),
    })?;

    let utterance = raw.response.trim().to_string();
    if utterance.is_empty() {
        return Err(OracleError::Malformed {
            message: "generated utterance was empty".to_string(),
        });
    }
    Ok(utterance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_raw() {
        assert_eq!(
            extract_json(r#"{"response": "Yes"}"#).unwrap(),
            r#"{"response": "Yes"}"#
        );
    }

    #[test]
    fn test_extract_json_fenced() {
        let completion = "Here you go:\n```json\n{\"response\": \"Yes\"}\n```";
        assert_eq!(extract_json(completion).unwrap(), r#"{"response": "Yes"}"#);
    }

    #[test]
    fn test_extract_json_plain_fence() {
        let completion = "```\n{\"response\": \"No\"}\n```";
        assert_eq!(extract_json(completion).unwrap(), r#"{"response": "No"}"#);
    }

    #[test]
    fn test_extract_json_none_found() {
        let err = extract_json("just prose, no payload").unwrap_err();
        assert!(matches!(err, OracleError::Malformed { .. }));
    }

    #[test]
    fn test_extract_json_empty_fence() {
        let err = extract_json("```json\n\n```").unwrap_err();
        assert!(matches!(err, OracleError::Malformed { .. }));
    }

    fn valid_analysis_json() -> String {
        r#"{
            "terminal": false,
            "state": "IN_PROGRESS",
            "confidence": 0.85,
            "reasoning": "the agent asked a question",
            "response": "existing customer",
            "candidate_responses": ["Yes", "No"]
        }"#
        .to_string()
    }

    #[test]
    fn test_parse_analysis_valid() {
        let analysis = parse_analysis(&valid_analysis_json()).unwrap();
        assert!(!analysis.terminal);
        assert_eq!(analysis.state, ConversationState::InProgress);
        assert_eq!(analysis.confidence, 0.85);
        assert_eq!(analysis.candidate_responses, vec!["Yes", "No"]);
    }

    #[test]
    fn test_parse_analysis_terminal() {
        let json = r#"{
            "terminal": true,
            "state": "TERMINAL_TRANSFER",
            "confidence": 1.0,
            "reasoning": "handed to a human",
            "response": "agent please"
        }"#;
        let analysis = parse_analysis(json).unwrap();
        assert!(analysis.terminal);
        assert_eq!(analysis.state, ConversationState::TerminalTransfer);
        assert!(analysis.candidate_responses.is_empty());
    }

    #[test]
    fn test_parse_analysis_unknown_state() {
        let json = valid_analysis_json().replace("IN_PROGRESS", "HALTED");
        let err = parse_analysis(&json).unwrap_err();
        assert!(matches!(err, OracleError::Malformed { .. }));
        assert!(err.to_string().contains("Unknown conversation state"));
    }

    #[test]
    fn test_parse_analysis_confidence_out_of_range() {
        let json = valid_analysis_json().replace("0.85", "1.5");
        let err = parse_analysis(&json).unwrap_err();
        assert!(err.to_string().contains("confidence out of range"));
    }

    #[test]
    fn test_parse_analysis_terminal_flag_mismatch() {
        let json = valid_analysis_json().replace("\"terminal\": false", "\"terminal\": true");
        let err = parse_analysis(&json).unwrap_err();
        assert!(err.to_string().contains("disagrees with state"));
    }

    #[test]
    fn test_parse_analysis_missing_field() {
        let json = r#"{"terminal": false, "state": "IN_PROGRESS"}"#;
        let err = parse_analysis(json).unwrap_err();
        assert!(matches!(err, OracleError::Malformed { .. }));
    }

    #[test]
    fn test_parse_utterance_valid() {
        let utterance = parse_utterance(r#"{"response": "  Yes, I am.  "}"#).unwrap();
        assert_eq!(utterance, "Yes, I am.");
    }

    #[test]
    fn test_parse_utterance_empty() {
        let err = parse_utterance(r#"{"response": "   "}"#).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_parse_utterance_wrong_shape() {
        let err = parse_utterance(r#"{"text": "Yes"}"#).unwrap_err();
        assert!(matches!(err, OracleError::Malformed { .. }));
    }
}
