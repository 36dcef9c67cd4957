//! Bounded-concurrency task scheduling.
//!
//! Exploration work is expressed as [`ExplorationTask`]s pulled off a FIFO
//! queue by a fixed pool of workers ([`WorkerPool`]). The pool bounds
//! simultaneous execution, enforces per-context affinity so external
//! conversational state is never written by two tasks at once, reclaims
//! workers whose tasks exceed the wall-clock timeout, and chains follow-up
//! tasks returned by workers so the queue drains itself without external
//! polling.

mod pool;

pub use pool::WorkerPool;

use async_trait::async_trait;
use uuid::Uuid;

/// Context bundle carried by every task.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Target endpoint to call.
    pub phone_number: String,
    /// Business domain tag; also the scheduler affinity key.
    pub business_type: String,
    /// Pre-supplied customer utterance from a backtracking caller; when
    /// present the worker skips utterance generation.
    pub seeded_utterance: Option<String>,
}

/// A unit of scheduler work: expand one node of the conversation graph.
#[derive(Debug, Clone)]
pub struct ExplorationTask {
    /// The node to explore from.
    pub node_id: Uuid,
    /// Depth of that node.
    pub depth: u32,
    /// Call/business context for the round trip.
    pub context: TaskContext,
}

impl ExplorationTask {
    /// Create a task with no seeded utterance.
    pub fn new(node_id: Uuid, depth: u32, phone_number: impl Into<String>, business_type: impl Into<String>) -> Self {
        Self {
            node_id,
            depth,
            context: TaskContext {
                phone_number: phone_number.into(),
                business_type: business_type.into(),
                seeded_utterance: None,
            },
        }
    }

    /// Seed the task with a pre-generated utterance (backtracking path).
    pub fn with_seeded_utterance(mut self, utterance: impl Into<String>) -> Self {
        self.context.seeded_utterance = Some(utterance.into());
        self
    }

    /// The affinity key two concurrently-running tasks must never share.
    pub fn context_key(&self) -> &str {
        &self.context.business_type
    }
}

/// A reusable worker executing exploration tasks.
///
/// `process` returns the follow-up tasks to enqueue (children to expand or a
/// backtracking probe); failures are absorbed inside the worker and never
/// unwind into the pool. `cleanup` releases any per-context external state
/// the worker holds; the pool calls it when a task is abandoned and once per
/// touched context at shutdown.
#[async_trait]
pub trait PoolWorker: Send + Sync {
    /// Run one task to completion and return follow-up tasks.
    async fn process(&self, task: ExplorationTask) -> Vec<ExplorationTask>;

    /// Release per-context state held outside the graph.
    async fn cleanup(&self, context_key: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_new() {
        let node_id = Uuid::new_v4();
        let task = ExplorationTask::new(node_id, 2, "+15551234567", "plumbing");
        assert_eq!(task.node_id, node_id);
        assert_eq!(task.depth, 2);
        assert_eq!(task.context.phone_number, "+15551234567");
        assert_eq!(task.context_key(), "plumbing");
        assert!(task.context.seeded_utterance.is_none());
    }

    #[test]
    fn test_task_with_seeded_utterance() {
        let task = ExplorationTask::new(Uuid::new_v4(), 0, "+15551234567", "plumbing")
            .with_seeded_utterance("Agent please");
        assert_eq!(task.context.seeded_utterance.as_deref(), Some("Agent please"));
    }
}
