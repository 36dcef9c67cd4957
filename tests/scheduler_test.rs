//! Integration tests for the worker pool scheduling guarantees.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use uuid::Uuid;
use voicemap::error::PoolError;
use voicemap::scheduler::{ExplorationTask, PoolWorker, WorkerPool};

/// Worker instrumented to observe concurrency and context overlap.
struct InstrumentedWorker {
    current: Arc<AtomicUsize>,
    max_observed: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
    contexts_in_flight: Arc<std::sync::Mutex<Vec<String>>>,
    overlap_detected: Arc<AtomicUsize>,
    cleanups: Arc<AtomicUsize>,
    sleep: Duration,
}

#[async_trait]
impl PoolWorker for InstrumentedWorker {
    async fn process(&self, task: ExplorationTask) -> Vec<ExplorationTask> {
        let context = task.context_key().to_string();
        {
            let mut in_flight = self.contexts_in_flight.lock().unwrap();
            if in_flight.contains(&context) {
                self.overlap_detected.fetch_add(1, Ordering::SeqCst);
            }
            in_flight.push(context.clone());
        }

        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_observed.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.sleep).await;
        self.current.fetch_sub(1, Ordering::SeqCst);

        {
            let mut in_flight = self.contexts_in_flight.lock().unwrap();
            if let Some(pos) = in_flight.iter().position(|c| c == &context) {
                in_flight.remove(pos);
            }
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        Vec::new()
    }

    async fn cleanup(&self, _context_key: &str) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
    }
}

struct Fixture {
    pool: WorkerPool,
    max_observed: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
    overlap_detected: Arc<AtomicUsize>,
    cleanups: Arc<AtomicUsize>,
}

fn fixture(workers: usize, max_workers: usize, sleep: Duration, task_timeout: Duration) -> Fixture {
    let current = Arc::new(AtomicUsize::new(0));
    let max_observed = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));
    let contexts_in_flight = Arc::new(std::sync::Mutex::new(Vec::new()));
    let overlap_detected = Arc::new(AtomicUsize::new(0));
    let cleanups = Arc::new(AtomicUsize::new(0));

    let pool_workers: Vec<Arc<dyn PoolWorker>> = (0..workers)
        .map(|_| {
            Arc::new(InstrumentedWorker {
                current: Arc::clone(&current),
                max_observed: Arc::clone(&max_observed),
                completed: Arc::clone(&completed),
                contexts_in_flight: Arc::clone(&contexts_in_flight),
                overlap_detected: Arc::clone(&overlap_detected),
                cleanups: Arc::clone(&cleanups),
                sleep,
            }) as Arc<dyn PoolWorker>
        })
        .collect();

    Fixture {
        pool: WorkerPool::new(pool_workers, max_workers, task_timeout),
        max_observed,
        completed,
        overlap_detected,
        cleanups,
    }
}

fn task(context: &str) -> ExplorationTask {
    ExplorationTask::new(Uuid::new_v4(), 0, "+15551234567", context)
}

async fn wait_until_idle(pool: &WorkerPool, limit: Duration) {
    let deadline = Instant::now() + limit;
    while !pool.is_idle() {
        assert!(Instant::now() < deadline, "pool did not drain in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn concurrency_is_bounded_by_max_workers() {
    let fixture = fixture(6, 3, Duration::from_millis(30), Duration::from_secs(30));
    for i in 0..12 {
        fixture
            .pool
            .submit(task(&format!("context-{}", i)))
            .unwrap();
    }
    wait_until_idle(&fixture.pool, Duration::from_secs(5)).await;

    assert_eq!(fixture.completed.load(Ordering::SeqCst), 12);
    assert!(fixture.max_observed.load(Ordering::SeqCst) <= 3);
    fixture.pool.shutdown(false, None).await;
}

#[tokio::test]
async fn same_context_tasks_never_overlap() {
    let fixture = fixture(4, 4, Duration::from_millis(20), Duration::from_secs(30));
    // Two contexts, several tasks each, all immediately available.
    for _ in 0..4 {
        fixture.pool.submit(task("alpha")).unwrap();
        fixture.pool.submit(task("beta")).unwrap();
    }
    wait_until_idle(&fixture.pool, Duration::from_secs(5)).await;

    assert_eq!(fixture.completed.load(Ordering::SeqCst), 8);
    assert_eq!(fixture.overlap_detected.load(Ordering::SeqCst), 0);
    // Distinct contexts are allowed to run in parallel.
    assert!(fixture.max_observed.load(Ordering::SeqCst) <= 2);
    fixture.pool.shutdown(false, None).await;
}

#[tokio::test]
async fn submit_fails_fast_after_shutdown() {
    let fixture = fixture(1, 1, Duration::from_millis(1), Duration::from_secs(30));
    fixture.pool.shutdown(true, Some(Duration::from_secs(1))).await;
    assert!(matches!(
        fixture.pool.submit(task("context")),
        Err(PoolError::ShuttingDown)
    ));
}

#[tokio::test]
async fn bounded_shutdown_returns_even_while_busy() {
    let fixture = fixture(
        1,
        1,
        Duration::from_secs(3600),
        Duration::from_secs(3600),
    );
    fixture.pool.submit(task("context")).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let start = Instant::now();
    fixture
        .pool
        .shutdown(true, Some(Duration::from_millis(150)))
        .await;

    assert!(start.elapsed() < Duration::from_secs(3));
    assert!(fixture.pool.is_idle());
    // The worker's touched context was cleaned despite the cancel.
    assert!(fixture.cleanups.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn timed_out_task_releases_its_worker() {
    let fixture = fixture(
        1,
        1,
        Duration::from_secs(3600),
        Duration::from_millis(60),
    );
    fixture.pool.submit(task("context-a")).unwrap();

    // After the task timeout the worker must be reusable.
    let deadline = Instant::now() + Duration::from_secs(3);
    while fixture.pool.active_task_count() > 0 {
        assert!(Instant::now() < deadline, "stuck task was never reclaimed");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(fixture.cleanups.load(Ordering::SeqCst) >= 1);
    fixture.pool.shutdown(false, None).await;
}

#[tokio::test]
async fn queue_drains_in_fifo_order_per_context() {
    // One worker and one context: completion order must follow submit order.
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    struct OrderWorker {
        order: Arc<std::sync::Mutex<Vec<u32>>>,
    }

    #[async_trait]
    impl PoolWorker for OrderWorker {
        async fn process(&self, task: ExplorationTask) -> Vec<ExplorationTask> {
            self.order.lock().unwrap().push(task.depth);
            Vec::new()
        }

        async fn cleanup(&self, _context_key: &str) {}
    }

    let pool = WorkerPool::new(
        vec![Arc::new(OrderWorker {
            order: Arc::clone(&order),
        }) as Arc<dyn PoolWorker>],
        1,
        Duration::from_secs(30),
    );

    for depth in 0..6 {
        pool.submit(ExplorationTask::new(
            Uuid::new_v4(),
            depth,
            "+15551234567",
            "context",
        ))
        .unwrap();
    }
    wait_until_idle(&pool, Duration::from_secs(5)).await;

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4, 5]);
    pool.shutdown(false, None).await;
}
