//! # Voicemap
//!
//! Automated decision-tree discovery for voice AI agents. Voicemap places
//! real calls against a target agent, feeds it synthetic customer utterances
//! generated by a language-model oracle, transcribes the replies, and builds
//! a deduplicated graph of conversation states and the transitions between
//! them.
//!
//! ## Features
//!
//! - **Conversation Graph**: thread-safe store with similarity-based
//!   merge-on-add deduplication and ancestor-chain reconstruction
//! - **Worker Pool**: bounded-concurrency scheduler with per-context
//!   affinity, stuck-worker reclamation and continuation chaining
//! - **Expand-then-backtrack exploration**: terminal verdicts trigger an
//!   ancestor search for unexplored branches
//! - **Pluggable collaborators**: telephony, transcription and oracle are
//!   traits with production HTTP implementations
//! - **Graph viewer**: a read-only HTTP snapshot endpoint for visualization
//!
//! ## Architecture
//!
//! ```text
//! Scheduler -> Worker -> place call -> transcribe -> oracle verdict
//!                  |                                      |
//!                  +----------- Conversation Graph <------+
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use voicemap::{Config, ConversationExplorer, DiscoveryParams, ExplorerServices};
//! use voicemap::graph::ConversationGraph;
//! use voicemap::oracle::OpenAiOracle;
//! use voicemap::telephony::HammingVoiceClient;
//! use voicemap::transcribe::DeepgramTranscriber;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let graph = Arc::new(ConversationGraph::new(0.85, 0.60));
//!     let services = ExplorerServices {
//!         voice: Arc::new(HammingVoiceClient::new(&config.hamming, &config.request).await?),
//!         transcriber: Arc::new(DeepgramTranscriber::new(&config.deepgram, &config.request)?),
//!         oracle: Arc::new(OpenAiOracle::new(&config.openai, config.request.clone())?),
//!         graph,
//!     };
//!     let explorer = ConversationExplorer::new(services, DiscoveryParams { /* ... */ });
//!     let stats = explorer.discover().await?;
//!     println!("{} nodes discovered", stats.total_nodes);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Configuration management loaded from environment variables.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Discovery-run orchestration, workers and progress tracking.
pub mod explorer;
/// The deduplicating conversation graph and its value types.
pub mod graph;
/// Per-context conversation history cache.
pub mod history;
/// Language-model oracle trait, OpenAI implementation and prompts.
pub mod oracle;
/// Bounded-concurrency task scheduling.
pub mod scheduler;
/// Read-only graph viewer endpoint.
pub mod server;
/// Text normalization and fuzzy similarity matching.
pub mod similarity;
/// Telephony client abstraction and Hamming implementation.
pub mod telephony;
/// Speech transcription abstraction and Deepgram implementation.
pub mod transcribe;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use explorer::{ConversationExplorer, DiscoveryParams, ExplorerServices};
