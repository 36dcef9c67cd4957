use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{ExplorationTask, PoolWorker};
use crate::error::{PoolError, PoolResult};

struct BusyEntry {
    task_seq: u64,
    started_at: Instant,
    context_key: String,
}

struct PoolShared {
    workers: Vec<Arc<dyn PoolWorker>>,
    queue: Mutex<VecDeque<ExplorationTask>>,
    slots: Arc<Semaphore>,
    /// worker index -> liveness entry for its running task
    busy: Mutex<HashMap<usize, BusyEntry>>,
    /// task sequence number -> abort handle
    handles: Mutex<HashMap<u64, JoinHandle<()>>>,
    /// worker index -> contexts it has ever been assigned
    touched: Mutex<HashMap<usize, HashSet<String>>>,
    in_flight: AtomicUsize,
    shutting_down: AtomicBool,
    task_seq: AtomicU64,
    task_timeout: Duration,
}

/// Fixed-size pool of reusable workers with bounded concurrency, per-context
/// affinity and stuck-worker reclamation.
///
/// Tasks are dispatched opportunistically: every `submit` and every task
/// completion pumps the queue, so the pool drains itself without external
/// polling. A worker whose task exceeds the wall-clock timeout is treated as
/// stuck: its task is abandoned, its per-context state cleaned, and the
/// worker becomes eligible again. Abandoned tasks are not retried.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
}

impl WorkerPool {
    /// Create a pool over `workers`, running at most `max_workers` tasks
    /// simultaneously, each bounded by `task_timeout`.
    pub fn new(
        workers: Vec<Arc<dyn PoolWorker>>,
        max_workers: usize,
        task_timeout: Duration,
    ) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            shared: Arc::new(PoolShared {
                workers,
                queue: Mutex::new(VecDeque::new()),
                slots: Arc::new(Semaphore::new(max_workers)),
                busy: Mutex::new(HashMap::new()),
                handles: Mutex::new(HashMap::new()),
                touched: Mutex::new(HashMap::new()),
                in_flight: AtomicUsize::new(0),
                shutting_down: AtomicBool::new(false),
                task_seq: AtomicU64::new(0),
                task_timeout,
            }),
        }
    }

    /// Submit a task for execution.
    ///
    /// Fails once shutdown has begun. Otherwise the task is enqueued and the
    /// scheduler immediately tries to start the next runnable task.
    pub fn submit(&self, task: ExplorationTask) -> PoolResult<()> {
        if self.shared.shutting_down.load(Ordering::SeqCst) {
            return Err(PoolError::ShuttingDown);
        }

        self.shared
            .queue
            .lock()
            .expect("queue lock poisoned")
            .push_back(task);
        Self::pump(&self.shared);
        Ok(())
    }

    /// True iff no task is queued and no task is in flight.
    pub fn is_idle(&self) -> bool {
        let queued = self
            .shared
            .queue
            .lock()
            .expect("queue lock poisoned")
            .len();
        queued == 0 && self.shared.in_flight.load(Ordering::SeqCst) == 0
    }

    /// Number of tasks currently in flight.
    pub fn active_task_count(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    /// Number of tasks waiting in the queue.
    pub fn queued_task_count(&self) -> usize {
        self.shared
            .queue
            .lock()
            .expect("queue lock poisoned")
            .len()
    }

    /// Shut the pool down.
    ///
    /// No new tasks start once shutdown begins and `submit` fails fast. With
    /// `wait_for_completion`, blocks until in-flight tasks finish or
    /// `timeout` elapses, then cancels stragglers. Shutdown always proceeds,
    /// even while work remains outstanding. Every worker gets `cleanup`
    /// invoked for every context it touched.
    pub async fn shutdown(&self, wait_for_completion: bool, timeout: Option<Duration>) {
        self.shared.shutting_down.store(true, Ordering::SeqCst);

        if wait_for_completion {
            let deadline = timeout.map(|t| Instant::now() + t);
            while self.shared.in_flight.load(Ordering::SeqCst) > 0 {
                if let Some(deadline) = deadline {
                    if Instant::now() >= deadline {
                        warn!("Shutdown wait timed out with tasks still in flight");
                        break;
                    }
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        }

        // Cancel stragglers.
        let handles: Vec<JoinHandle<()>> = self
            .shared
            .handles
            .lock()
            .expect("handles lock poisoned")
            .drain()
            .map(|(_, handle)| handle)
            .collect();
        for handle in handles {
            handle.abort();
        }

        self.shared
            .busy
            .lock()
            .expect("busy lock poisoned")
            .clear();
        self.shared.in_flight.store(0, Ordering::SeqCst);
        self.shared
            .queue
            .lock()
            .expect("queue lock poisoned")
            .clear();

        // Per-context cleanup on every worker that touched that context.
        let touched: Vec<(usize, HashSet<String>)> = self
            .shared
            .touched
            .lock()
            .expect("touched lock poisoned")
            .drain()
            .collect();
        for (worker_idx, contexts) in touched {
            for context in contexts {
                self.shared.workers[worker_idx].cleanup(&context).await;
            }
        }

        debug!("Worker pool shut down");
    }

    /// Start as many queued tasks as slots and eligible workers allow.
    fn pump(shared: &Arc<PoolShared>) {
        while Self::try_start_next(shared) {}
    }

    /// Try to start exactly one queued task. Returns whether a task started.
    ///
    /// The pop/select/mark sequence happens under the queue and busy locks
    /// together so concurrent pumps can neither double-assign a worker nor
    /// slip two same-context tasks past the affinity rule.
    fn try_start_next(shared: &Arc<PoolShared>) -> bool {
        if shared.shutting_down.load(Ordering::SeqCst) {
            return false;
        }

        let permit = match Arc::clone(&shared.slots).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => return false,
        };

        let (task, worker_idx, task_seq) = {
            let mut queue = shared.queue.lock().expect("queue lock poisoned");
            let task = match queue.pop_front() {
                Some(task) => task,
                None => return false, // permit dropped, slot released untaken
            };

            let mut busy = shared.busy.lock().expect("busy lock poisoned");
            let worker_idx = match Self::select_worker(shared, &mut busy, task.context_key()) {
                Some(idx) => idx,
                None => {
                    // No eligible worker; put the task back and release the
                    // slot untaken.
                    queue.push_front(task);
                    return false;
                }
            };

            let task_seq = shared.task_seq.fetch_add(1, Ordering::SeqCst);
            busy.insert(
                worker_idx,
                BusyEntry {
                    task_seq,
                    started_at: Instant::now(),
                    context_key: task.context_key().to_string(),
                },
            );
            shared.in_flight.fetch_add(1, Ordering::SeqCst);
            (task, worker_idx, task_seq)
        };

        let context_key = task.context_key().to_string();
        shared
            .touched
            .lock()
            .expect("touched lock poisoned")
            .entry(worker_idx)
            .or_default()
            .insert(context_key.clone());

        debug!(worker = worker_idx, task_seq, context = %context_key, "Task started");

        let worker = Arc::clone(&shared.workers[worker_idx]);
        let task_timeout = shared.task_timeout;
        let shared_for_task = Arc::clone(shared);
        let handle = tokio::spawn(async move {
            let _permit = permit;
            match tokio::time::timeout(task_timeout, worker.process(task)).await {
                Ok(followups) => {
                    if shared_for_task.shutting_down.load(Ordering::SeqCst) {
                        if !followups.is_empty() {
                            debug!(
                                dropped = followups.len(),
                                "Dropping follow-up tasks after shutdown"
                            );
                        }
                    } else {
                        let mut queue = shared_for_task
                            .queue
                            .lock()
                            .expect("queue lock poisoned");
                        for followup in followups {
                            queue.push_back(followup);
                        }
                    }
                }
                Err(_) => {
                    warn!(worker = worker_idx, task_seq, "Task exceeded timeout, abandoning");
                    worker.cleanup(&context_key).await;
                }
            }
            Self::finish_task(&shared_for_task, worker_idx, task_seq);
            // Slot is released when the permit drops; start whatever is next.
            Self::pump(&shared_for_task);
        });

        shared
            .handles
            .lock()
            .expect("handles lock poisoned")
            .insert(task_seq, handle);
        true
    }

    /// Select an eligible worker for a task of the given context. Called
    /// with the busy table locked by the dispatcher.
    ///
    /// A worker is eligible if it is not mid-task, or if its task has
    /// exceeded the timeout (in which case it is forcibly reclaimed first).
    /// No worker is eligible while another in-flight task shares the
    /// context.
    fn select_worker(
        shared: &Arc<PoolShared>,
        busy: &mut HashMap<usize, BusyEntry>,
        context_key: &str,
    ) -> Option<usize> {
        if busy.values().any(|entry| entry.context_key == context_key) {
            return None;
        }

        for worker_idx in 0..shared.workers.len() {
            match busy.get(&worker_idx) {
                None => return Some(worker_idx),
                Some(entry) if entry.started_at.elapsed() > shared.task_timeout => {
                    let task_seq = entry.task_seq;
                    let stale_context = entry.context_key.clone();
                    busy.remove(&worker_idx);
                    shared.in_flight.fetch_sub(1, Ordering::SeqCst);

                    if let Some(handle) = shared
                        .handles
                        .lock()
                        .expect("handles lock poisoned")
                        .remove(&task_seq)
                    {
                        handle.abort();
                    }

                    warn!(worker = worker_idx, task_seq, "Reclaimed stuck worker");
                    let worker = Arc::clone(&shared.workers[worker_idx]);
                    tokio::spawn(async move {
                        worker.cleanup(&stale_context).await;
                    });

                    return Some(worker_idx);
                }
                Some(_) => continue,
            }
        }

        None
    }

    /// Clear a finished task's bookkeeping, guarding against the slot having
    /// been reclaimed and handed to a newer task.
    fn finish_task(shared: &Arc<PoolShared>, worker_idx: usize, task_seq: u64) {
        {
            let mut busy = shared.busy.lock().expect("busy lock poisoned");
            let owns_slot = matches!(busy.get(&worker_idx), Some(entry) if entry.task_seq == task_seq);
            if owns_slot {
                busy.remove(&worker_idx);
                shared.in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        }
        let mut handles = shared.handles.lock().expect("handles lock poisoned");
        handles.remove(&task_seq);
        // A very fast task can finish before its handle is registered; prune
        // whatever has completed so the table stays bounded.
        handles.retain(|_, handle| !handle.is_finished());
    }
}
