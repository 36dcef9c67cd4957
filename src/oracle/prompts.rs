//! Prompt templates for the exploration oracle.
//!
//! Centralizing prompts keeps them easy to maintain and version. Builders
//! interpolate run context into the user message; the system prompts pin the
//! required JSON output shapes.

use super::{AnalysisContext, UtteranceContext};
use crate::history::Exchange;

/// System prompt for the synthetic-customer persona.
pub const CUSTOMER_SYSTEM_PROMPT: &str = r#"You are an automated conversation path explorer for voice AI systems. You interact with voice AI agents for different business types to discover every possible conversation flow. Generate natural, realistic customer responses, avoid repeating previously explored paths, test both standard and edge cases, and stay aware of the business context.

Your response MUST be valid JSON in this exact format:
{
  "response": "a single customer utterance, one or two sentences"
}

Always respond with valid JSON only, no other text."#;

/// System prompt for the agent-turn analysis rubric.
pub const ANALYSIS_SYSTEM_PROMPT: &str = r#"You analyze transcripts of calls with a voice AI agent and classify the conversation outcome.

Your response MUST be valid JSON in this exact format:
{
  "terminal": false,
  "state": "IN_PROGRESS",
  "confidence": 0.8,
  "reasoning": "why you chose this state",
  "response": "short label for the customer response that was taken",
  "candidate_responses": ["possible customer reply", "another possible reply"]
}

State labels:
- IN_PROGRESS: the agent expects more customer input
- TERMINAL_SUCCESS: the customer's goal was completed (appointment booked, problem resolved)
- TERMINAL_TRANSFER: the agent handed the call to a human
- TERMINAL_FALLBACK: the agent gave up on the request

Rules:
- terminal must be true exactly when the state is one of the TERMINAL_* labels
- confidence is between 0.0 and 1.0
- candidate_responses lists realistic next customer replies; leave it empty for terminal states"#;

/// Build the user message asking for the opening utterance of a run.
pub fn initial_utterance_prompt(business_type: &str) -> String {
    format!(
        "You are about to call a {} as a prospective customer. \
         Produce the short opening utterance you would say once the agent picks up, \
         natural enough to elicit the agent's standard greeting flow.",
        business_type
    )
}

/// Build the user message asking for a fresh utterance at a decision point.
pub fn utterance_prompt(context: UtteranceContext<'_>) -> String {
    format!(
        "Here is the context type for this interaction:\n<context_type>\n{}\n</context_type>\n\n\
         The current message from the voice AI agent that you need to respond to is:\n\
         <current_agent_message>\n{}\n</current_agent_message>\n\n\
         Here is the conversation history so far:\n<conversation_history>\n{}\n</conversation_history>\n\n\
         These are the paths you have already explored from the current state:\n\
         <explored_paths>\n{}\n</explored_paths>\n\n\
         Generate one natural customer response that is appropriate for the business context, \
         explores a conversation path not listed above, and balances normal and edge cases.",
        context.business_type,
        context.agent_message,
        format_history(context.history),
        format_explored(context.explored),
    )
}

/// Build the user message asking for an analysis of a fresh agent turn.
pub fn analysis_prompt(context: AnalysisContext<'_>, transcript: &str) -> String {
    let history = context
        .history
        .iter()
        .map(|message| format!("{}: {}", message.role, message.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Here is the context type for this interaction:\n<context_type>\n{}\n</context_type>\n\n\
         The conversation so far:\n<conversation_history>\n{}\n</conversation_history>\n\n\
         The customer said:\n<customer_prompt>\n{}\n</customer_prompt>\n\n\
         The full conversation transcription after that utterance:\n\
         <conversation_transcription>\n{}\n</conversation_transcription>\n\n\
         Classify the outcome.",
        context.business_type, history, context.utterance, transcript,
    )
}

fn format_history(history: &[Exchange]) -> String {
    if history.is_empty() {
        return "(none)".to_string();
    }
    history
        .iter()
        .map(|(utterance, transcript)| {
            format!("PROMPT: {}\nCONVERSATION TRANSCRIPTION: {}", utterance, transcript)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_explored(explored: &[String]) -> String {
    if explored.is_empty() {
        return "(none)".to_string();
    }
    explored
        .iter()
        .map(|utterance| format!("- {}", utterance))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ConversationMessage;

    #[test]
    fn test_initial_prompt_mentions_business() {
        let prompt = initial_utterance_prompt("Air Conditioning and Plumbing company");
        assert!(prompt.contains("Air Conditioning and Plumbing company"));
    }

    #[test]
    fn test_utterance_prompt_includes_all_sections() {
        let history = vec![("Yes".to_string(), "Which day works?".to_string())];
        let explored = vec!["Tuesday".to_string()];
        let prompt = utterance_prompt(UtteranceContext {
            business_type: "plumbing",
            agent_message: "Which day works for you?",
            history: &history,
            explored: &explored,
        });
        assert!(prompt.contains("<context_type>\nplumbing"));
        assert!(prompt.contains("Which day works for you?"));
        assert!(prompt.contains("PROMPT: Yes"));
        assert!(prompt.contains("- Tuesday"));
    }

    #[test]
    fn test_utterance_prompt_empty_sections() {
        let prompt = utterance_prompt(UtteranceContext {
            business_type: "plumbing",
            agent_message: "Hello",
            history: &[],
            explored: &[],
        });
        assert!(prompt.contains("<conversation_history>\n(none)"));
        assert!(prompt.contains("<explored_paths>\n(none)"));
    }

    #[test]
    fn test_analysis_prompt_includes_history_turns() {
        let history = vec![
            ConversationMessage::user("I need a plumber"),
            ConversationMessage::assistant("Which day works for you?"),
        ];
        let prompt = analysis_prompt(
            AnalysisContext {
                business_type: "plumbing",
                utterance: "Tuesday",
                history: &history,
            },
            "You are booked for Tuesday.",
        );
        assert!(prompt.contains("user: I need a plumber"));
        assert!(prompt.contains("assistant: Which day works for you?"));
        assert!(prompt.contains("<customer_prompt>\nTuesday"));
        assert!(prompt.contains("You are booked for Tuesday."));
    }
}
