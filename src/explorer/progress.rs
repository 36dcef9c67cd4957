use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::graph::ConversationState;

/// Statistics about a discovery run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationStats {
    /// Nodes discovered (after deduplication).
    pub total_nodes: usize,
    /// Nodes ending a path through an oracle verdict.
    pub terminal_nodes: usize,
    /// Nodes marking failed round trips.
    pub error_nodes: usize,
    /// Transitions discovered.
    pub total_edges: usize,
    /// Nodes discarded as duplicates of an existing decision point.
    pub nodes_merged: usize,
    /// Deepest level reached.
    pub max_depth_reached: u32,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished, if it has.
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExplorationStats {
    fn new() -> Self {
        Self {
            total_nodes: 0,
            terminal_nodes: 0,
            error_nodes: 0,
            total_edges: 0,
            nodes_merged: 0,
            max_depth_reached: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Run duration in seconds, up to now if still running.
    pub fn duration_secs(&self) -> f64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// Thread-safe progress counters for a discovery run.
#[derive(Debug)]
pub struct ProgressTracker {
    stats: Mutex<ExplorationStats>,
}

impl ProgressTracker {
    /// Start tracking a new run.
    pub fn new() -> Self {
        Self {
            stats: Mutex::new(ExplorationStats::new()),
        }
    }

    /// Record a newly stored node.
    pub fn node_discovered(&self, depth: u32, state: ConversationState) {
        let mut stats = self.stats.lock().expect("progress lock poisoned");
        stats.total_nodes += 1;
        stats.max_depth_reached = stats.max_depth_reached.max(depth);
        if state == ConversationState::Error {
            stats.error_nodes += 1;
        } else if state.is_terminal() {
            stats.terminal_nodes += 1;
        }
    }

    /// Record a node discarded by decision-point merging.
    pub fn node_merged(&self) {
        self.stats.lock().expect("progress lock poisoned").nodes_merged += 1;
    }

    /// Record a newly stored edge.
    pub fn edge_added(&self) {
        self.stats.lock().expect("progress lock poisoned").total_edges += 1;
    }

    /// Stamp the end of the run.
    pub fn mark_complete(&self) {
        self.stats
            .lock()
            .expect("progress lock poisoned")
            .finished_at = Some(Utc::now());
    }

    /// A copy of the current statistics.
    pub fn stats(&self) -> ExplorationStats {
        self.stats.lock().expect("progress lock poisoned").clone()
    }

    /// Human-readable progress summary.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "nodes={} terminal={} errors={} edges={} merged={} max_depth={} duration={:.1}s",
            stats.total_nodes,
            stats.terminal_nodes,
            stats.error_nodes,
            stats.total_edges,
            stats.nodes_merged,
            stats.max_depth_reached,
            stats.duration_secs(),
        )
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
