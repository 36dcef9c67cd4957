use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::ProgressTracker;
use crate::error::AppResult;
use crate::graph::{
    ConversationEdge, ConversationGraph, ConversationNode, ConversationState, EdgeMetadata,
    NodeMetadata,
};
use crate::history::ConversationCache;
use crate::oracle::{AnalysisContext, ExplorationOracle, UtteranceContext};
use crate::scheduler::{ExplorationTask, PoolWorker};
use crate::telephony::VoiceClient;
use crate::transcribe::TranscribeService;

/// Drives individual conversation paths during exploration.
///
/// One task is one call/transcribe/analyze round trip: pick (or accept) a
/// customer utterance, place the call, transcribe the reply, ask the oracle
/// for a verdict, and grow the graph accordingly. Round-trip failures are
/// absorbed here as `Error` nodes; they never unwind into the scheduler.
pub struct ConversationWorker {
    voice: Arc<dyn VoiceClient>,
    transcriber: Arc<dyn TranscribeService>,
    oracle: Arc<dyn ExplorationOracle>,
    graph: Arc<ConversationGraph>,
    cache: Arc<ConversationCache>,
    progress: Arc<ProgressTracker>,
    max_depth: u32,
    recording_timeout: Duration,
}

impl ConversationWorker {
    /// Create a worker over shared run services.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        voice: Arc<dyn VoiceClient>,
        transcriber: Arc<dyn TranscribeService>,
        oracle: Arc<dyn ExplorationOracle>,
        graph: Arc<ConversationGraph>,
        cache: Arc<ConversationCache>,
        progress: Arc<ProgressTracker>,
        max_depth: u32,
        recording_timeout: Duration,
    ) -> Self {
        Self {
            voice,
            transcriber,
            oracle,
            graph,
            cache,
            progress,
            max_depth,
            recording_timeout,
        }
    }

    /// Explore one path from the task's node and return follow-up tasks.
    async fn explore_path(
        &self,
        task: &ExplorationTask,
        node: &ConversationNode,
    ) -> AppResult<Vec<ExplorationTask>> {
        let context_key = task.context_key();

        // A seeded utterance may have been explored by a sibling task since
        // it was enqueued; skip instead of placing a redundant call.
        if let Some(seeded) = &task.context.seeded_utterance {
            if self.graph.has_similar_response(task.node_id, seeded)? {
                debug!(node_id = %task.node_id, "Seeded utterance already explored, skipping");
                return Ok(Vec::new());
            }
        }

        // 1. Obtain the customer utterance: seeded by a backtracking caller
        //    or a candidate fan-out, otherwise freshly generated from context.
        let utterance = match &task.context.seeded_utterance {
            Some(seeded) => seeded.clone(),
            None => {
                let history = self.cache.get(context_key);
                self.oracle
                    .generate_utterance(UtteranceContext {
                        business_type: context_key,
                        agent_message: &node.decision_point,
                        history: &history,
                        explored: &node.explored_responses,
                    })
                    .await?
            }
        };

        // 2. Round trip: call, wait for the recording, transcribe.
        let handle = self
            .voice
            .place_call(&task.context.phone_number, &utterance)
            .await?;
        let recording = self
            .voice
            .fetch_recording(&handle, self.recording_timeout)
            .await?;
        let transcript = self.transcriber.transcribe(&recording).await?;

        self.cache
            .append(context_key, utterance.clone(), transcript.clone());

        // 3. Classify the new agent turn.
        let history = self.graph.conversation_history(task.node_id)?;
        let analysis = self
            .oracle
            .analyze(
                AnalysisContext {
                    business_type: context_key,
                    utterance: &utterance,
                    history: &history,
                },
                &transcript,
            )
            .await?;

        debug!(
            node_id = %task.node_id,
            state = %analysis.state,
            confidence = analysis.confidence,
            "Oracle verdict"
        );

        // 4. Grow the graph; the insert may merge into an existing node.
        let child = ConversationNode::child(task.node_id, node.depth, &transcript, analysis.state)
            .with_metadata(NodeMetadata {
                confidence: Some(analysis.confidence),
                reasoning: Some(analysis.reasoning.clone()),
                business_type: Some(context_key.to_string()),
                call_id: Some(handle.id.clone()),
                error: None,
            });
        let child_id = child.id;
        let child_depth = child.depth;
        let effective_id = self.graph.add_node(child)?;
        if effective_id == child_id {
            self.progress.node_discovered(child_depth, analysis.state);
        } else {
            self.progress.node_merged();
        }

        self.graph.add_edge(
            ConversationEdge::new(task.node_id, effective_id, utterance.clone()).with_metadata(
                EdgeMetadata {
                    confidence: Some(analysis.confidence),
                    call_id: Some(handle.id),
                },
            ),
        )?;
        self.progress.edge_added();

        // 5. Record the utterance as explored on the originating node,
        //    regardless of the merge outcome.
        self.graph.record_explored_response(task.node_id, &utterance)?;

        if analysis.state.is_terminal() {
            // 6. Dead end; look for an unexplored branch among the ancestors.
            return Ok(self.backtrack(task).await?.into_iter().collect());
        }

        // 7. Expand the child unless that would cross the depth limit. Each
        //    candidate the oracle suggested becomes a seeded task; without
        //    candidates a single unseeded task generates its own utterance.
        if task.depth + 1 < self.max_depth {
            let child_task = |seed: Option<&String>| {
                let task = ExplorationTask::new(
                    effective_id,
                    task.depth + 1,
                    task.context.phone_number.clone(),
                    task.context.business_type.clone(),
                );
                match seed {
                    Some(seed) => task.with_seeded_utterance(seed),
                    None => task,
                }
            };

            if analysis.candidate_responses.is_empty() {
                Ok(vec![child_task(None)])
            } else {
                Ok(analysis
                    .candidate_responses
                    .iter()
                    .map(|candidate| child_task(Some(candidate)))
                    .collect())
            }
        } else {
            debug!(node_id = %effective_id, depth = task.depth + 1, "Depth limit reached, not expanding");
            Ok(Vec::new())
        }
    }

    /// Walk ancestors from the task's node looking for one with a genuinely
    /// novel candidate utterance; the first hit gets a seeded task.
    ///
    /// Returning `None` means every ancestor up to the root is exhausted:
    /// that branch of the search is complete, which is the natural
    /// completion condition rather than a failure.
    async fn backtrack(&self, task: &ExplorationTask) -> AppResult<Option<ExplorationTask>> {
        let context_key = task.context_key();
        let mut current = self.graph.get_node(task.node_id);

        while let Some(node) = current {
            if node.is_terminal() {
                break;
            }

            let history = self.cache.get(context_key);
            let candidate = self
                .oracle
                .generate_utterance(UtteranceContext {
                    business_type: context_key,
                    agent_message: &node.decision_point,
                    history: &history,
                    explored: &node.explored_responses,
                })
                .await?;

            if !self.graph.has_similar_response(node.id, &candidate)? {
                debug!(node_id = %node.id, depth = node.depth, "Backtracking to unexplored branch");
                return Ok(Some(
                    ExplorationTask::new(
                        node.id,
                        node.depth,
                        task.context.phone_number.clone(),
                        task.context.business_type.clone(),
                    )
                    .with_seeded_utterance(candidate),
                ));
            }

            current = node.parent_id.and_then(|parent_id| self.graph.get_node(parent_id));
        }

        info!(node_id = %task.node_id, "Branch exhausted up to the root");
        Ok(None)
    }

    /// Map a failed round trip to an `Error` node attached to the
    /// originating node via a synthetic edge labeled with the error.
    fn record_failure(&self, task: &ExplorationTask, parent_depth: u32, error: &crate::error::AppError) {
        warn!(node_id = %task.node_id, error = %error, "Exploration round trip failed");

        let error_node = ConversationNode::child(
            task.node_id,
            parent_depth,
            "Error during exploration",
            ConversationState::Error,
        )
        .with_metadata(NodeMetadata {
            confidence: None,
            reasoning: None,
            business_type: Some(task.context.business_type.clone()),
            call_id: None,
            error: Some(error.to_string()),
        });
        let error_depth = error_node.depth;

        let error_id = match self.graph.add_node(error_node) {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "Failed to record error node");
                return;
            }
        };
        self.progress.node_discovered(error_depth, ConversationState::Error);

        let edge = ConversationEdge::new(task.node_id, error_id, format!("Error: {}", error));
        match self.graph.add_edge(edge) {
            Ok(()) => self.progress.edge_added(),
            Err(e) => error!(error = %e, "Failed to record error edge"),
        }
    }
}

#[async_trait]
impl PoolWorker for ConversationWorker {
    async fn process(&self, task: ExplorationTask) -> Vec<ExplorationTask> {
        if task.depth >= self.max_depth {
            debug!(node_id = %task.node_id, depth = task.depth, "Depth limit reached, truncating");
            return Vec::new();
        }

        let node = match self.graph.get_node(task.node_id) {
            Some(node) => node,
            None => {
                error!(node_id = %task.node_id, "Task references unknown node");
                return Vec::new();
            }
        };

        match self.explore_path(&task, &node).await {
            Ok(followups) => followups,
            Err(e) => {
                self.record_failure(&task, node.depth, &e);
                Vec::new()
            }
        }
    }

    async fn cleanup(&self, context_key: &str) {
        debug!(context = context_key, "Clearing conversation history");
        self.cache.remove(context_key);
    }
}
