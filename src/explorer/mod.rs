//! Discovery-run orchestration.
//!
//! [`ConversationExplorer`] owns one discovery run end to end: it seeds the
//! graph with a root node from a first real call, drives the worker pool
//! until the task queue drains, and shuts everything down. The per-path
//! logic lives in [`ConversationWorker`]; run statistics in
//! [`ProgressTracker`].

mod progress;
mod worker;

pub use progress::{ExplorationStats, ProgressTracker};
pub use worker::ConversationWorker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::ExplorationConfig;
use crate::error::AppResult;
use crate::graph::{ConversationGraph, ConversationNode, NodeMetadata};
use crate::history::ConversationCache;
use crate::oracle::ExplorationOracle;
use crate::scheduler::{ExplorationTask, PoolWorker, WorkerPool};
use crate::telephony::VoiceClient;
use crate::transcribe::TranscribeService;

/// External services a discovery run consumes.
pub struct ExplorerServices {
    /// Telephony client.
    pub voice: Arc<dyn VoiceClient>,
    /// Transcription service.
    pub transcriber: Arc<dyn TranscribeService>,
    /// Language-model oracle.
    pub oracle: Arc<dyn ExplorationOracle>,
    /// The graph this run populates.
    pub graph: Arc<ConversationGraph>,
}

/// Parameters of a discovery run.
#[derive(Debug, Clone)]
pub struct DiscoveryParams {
    /// Target endpoint to call.
    pub phone_number: String,
    /// Business domain of the target agent.
    pub business_type: String,
    /// Exploration tunables.
    pub exploration: ExplorationConfig,
    /// Maximum wait for a call recording.
    pub recording_timeout: Duration,
    /// How long shutdown waits for in-flight tasks.
    pub shutdown_timeout: Duration,
}

/// Orchestrates the parallel exploration of conversation paths.
pub struct ConversationExplorer {
    services: ExplorerServices,
    params: DiscoveryParams,
    cache: Arc<ConversationCache>,
    progress: Arc<ProgressTracker>,
    pool: WorkerPool,
    stop: Arc<AtomicBool>,
}

impl ConversationExplorer {
    /// Create an explorer and its worker pool.
    pub fn new(services: ExplorerServices, params: DiscoveryParams) -> Self {
        let cache = Arc::new(ConversationCache::new());
        let progress = Arc::new(ProgressTracker::new());

        let workers: Vec<Arc<dyn PoolWorker>> = (0..params.exploration.max_workers)
            .map(|_| {
                Arc::new(ConversationWorker::new(
                    Arc::clone(&services.voice),
                    Arc::clone(&services.transcriber),
                    Arc::clone(&services.oracle),
                    Arc::clone(&services.graph),
                    Arc::clone(&cache),
                    Arc::clone(&progress),
                    params.exploration.max_depth,
                    params.recording_timeout,
                )) as Arc<dyn PoolWorker>
            })
            .collect();

        let pool = WorkerPool::new(
            workers,
            params.exploration.max_workers,
            params.exploration.task_timeout(),
        );

        Self {
            services,
            params,
            cache,
            progress,
            pool,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run discovery to completion and return the final statistics.
    ///
    /// Fails only if the root node cannot be created: the opening call and
    /// its transcription must succeed at least once. Everything after that
    /// degrades into `Error` nodes on the graph instead of failing the run.
    pub async fn discover(&self) -> AppResult<ExplorationStats> {
        info!(
            phone_number = %self.params.phone_number,
            business_type = %self.params.business_type,
            max_depth = self.params.exploration.max_depth,
            max_workers = self.params.exploration.max_workers,
            "Starting conversation discovery"
        );

        let opening = self
            .services
            .oracle
            .generate_opening(&self.params.business_type)
            .await?;
        let transcript = self.make_call(&opening).await?;

        let root = ConversationNode::root(transcript.clone()).with_metadata(NodeMetadata {
            business_type: Some(self.params.business_type.clone()),
            ..NodeMetadata::default()
        });
        let root_depth = root.depth;
        let root_state = root.state;
        let root_id = self.services.graph.add_node(root)?;
        self.progress.node_discovered(root_depth, root_state);

        // Classify the opening turn to seed exploration: one task per
        // candidate response, or a single self-generating task when the
        // oracle offers none.
        let analysis = self
            .services
            .oracle
            .analyze(
                crate::oracle::AnalysisContext {
                    business_type: &self.params.business_type,
                    utterance: &opening,
                    history: &[],
                },
                &transcript,
            )
            .await?;
        self.cache
            .append(&self.params.business_type, opening, transcript);

        if analysis.state.is_terminal() {
            info!("Opening turn is already terminal, nothing to explore");
        } else {
            let root_task = || {
                ExplorationTask::new(
                    root_id,
                    0,
                    self.params.phone_number.clone(),
                    self.params.business_type.clone(),
                )
            };
            if analysis.candidate_responses.is_empty() {
                self.pool.submit(root_task())?;
            } else {
                for candidate in &analysis.candidate_responses {
                    self.pool
                        .submit(root_task().with_seeded_utterance(candidate))?;
                }
            }
        }

        // Drive by queue exhaustion; a stop signal lets in-flight tasks
        // finish but starts nothing new.
        while !self.stop.load(Ordering::SeqCst) {
            if self.pool.is_idle() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        self.pool
            .shutdown(true, Some(self.params.shutdown_timeout))
            .await;
        self.progress.mark_complete();

        let stats = self.progress.stats();
        info!(summary = %self.progress.summary(), "Discovery complete");
        self.log_terminal_paths();

        Ok(stats)
    }

    /// Signal the explorer to stop after current tasks complete.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// The graph this run populates.
    pub fn graph(&self) -> Arc<ConversationGraph> {
        Arc::clone(&self.services.graph)
    }

    /// The run's progress tracker.
    pub fn progress(&self) -> Arc<ProgressTracker> {
        Arc::clone(&self.progress)
    }

    async fn make_call(&self, utterance: &str) -> AppResult<String> {
        let handle = self
            .services
            .voice
            .place_call(&self.params.phone_number, utterance)
            .await?;
        let recording = self
            .services
            .voice
            .fetch_recording(&handle, self.params.recording_timeout)
            .await?;
        Ok(self.services.transcriber.transcribe(&recording).await?)
    }

    fn log_terminal_paths(&self) {
        for node in self.services.graph.nodes() {
            if !node.is_terminal() {
                continue;
            }
            let path: Vec<String> = self
                .services
                .graph
                .path_to_node(node.id)
                .into_iter()
                .map(|edge| edge.user_message.content)
                .collect();
            debug!(
                state = %node.state,
                path = %path.join(" -> "),
                transcript = %node.decision_point.chars().take(200).collect::<String>(),
                "Terminal path"
            );
        }
    }
}
