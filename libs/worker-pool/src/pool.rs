//! The executor pool.

use crate::task::{Completion, Task};
use crate::{PoolError, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Pool sizing. Queue capacities default to `2 × workers`.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub workers: usize,
    pub task_queue_capacity: Option<usize>,
    pub result_queue_capacity: Option<usize>,
}

impl PoolConfig {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            task_queue_capacity: None,
            result_queue_capacity: None,
        }
    }

    pub fn with_task_queue_capacity(mut self, capacity: usize) -> Self {
        self.task_queue_capacity = Some(capacity);
        self
    }

    pub fn with_result_queue_capacity(mut self, capacity: usize) -> Self {
        self.result_queue_capacity = Some(capacity);
        self
    }

    fn task_capacity(&self) -> usize {
        self.task_queue_capacity.unwrap_or(2 * self.workers).max(1)
    }

    fn result_capacity(&self) -> usize {
        self.result_queue_capacity.unwrap_or(2 * self.workers).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PoolState {
    Stopped,
    Running,
    Stopping,
}

/// Queue/lifecycle snapshot.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PoolStats {
    pub workers: usize,
    pub tasks_queued: usize,
    pub results_queued: usize,
    pub running: bool,
}

/// Accounting returned by [`WorkerPool::stop`]. Every successful submit is
/// either `delivered` (its completion reached the result channel) or
/// `discarded` (queued but never run, or completed while the pool was
/// quitting with nobody left to read the result).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ShutdownSummary {
    pub delivered: u64,
    pub discarded: u64,
}

type SharedTaskReceiver<P, O> = Arc<AsyncMutex<mpsc::Receiver<Task<P, O>>>>;

/// Bounded executor pool. Tasks and completions flow through typed
/// channels; a lock is only taken around lifecycle transitions.
pub struct WorkerPool<P, O> {
    config: PoolConfig,
    state: Mutex<PoolState>,
    task_tx: Mutex<Option<mpsc::Sender<Task<P, O>>>>,
    task_rx: Mutex<Option<SharedTaskReceiver<P, O>>>,
    result_tx: Mutex<Option<mpsc::Sender<Completion<O>>>>,
    result_rx: Mutex<Option<mpsc::Receiver<Completion<O>>>>,
    quit: Mutex<Option<watch::Sender<bool>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    delivered: Arc<AtomicU64>,
    discarded: Arc<AtomicU64>,
}

impl<P, O> WorkerPool<P, O>
where
    P: Send + 'static,
    O: Send + 'static,
{
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            state: Mutex::new(PoolState::Stopped),
            task_tx: Mutex::new(None),
            task_rx: Mutex::new(None),
            result_tx: Mutex::new(None),
            result_rx: Mutex::new(None),
            quit: Mutex::new(None),
            handles: Mutex::new(Vec::new()),
            delivered: Arc::new(AtomicU64::new(0)),
            discarded: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Spawn the executors. The first caller wins; a second `start` on a
    /// running pool is a no-op returning `false`.
    pub fn start(&self) -> bool {
        let mut state = self.state.lock();
        if *state != PoolState::Stopped {
            return false;
        }
        *state = PoolState::Running;

        let (task_tx, task_rx) = mpsc::channel(self.config.task_capacity());
        let (result_tx, result_rx) = mpsc::channel(self.config.result_capacity());
        let (quit_tx, quit_rx) = watch::channel(false);
        let task_rx = Arc::new(AsyncMutex::new(task_rx));

        self.delivered.store(0, Ordering::SeqCst);
        self.discarded.store(0, Ordering::SeqCst);

        let mut handles = Vec::with_capacity(self.config.workers);
        for worker in 0..self.config.workers {
            handles.push(tokio::spawn(executor_loop(
                worker,
                Arc::clone(&task_rx),
                result_tx.clone(),
                quit_rx.clone(),
                Arc::clone(&self.delivered),
                Arc::clone(&self.discarded),
            )));
        }

        *self.task_tx.lock() = Some(task_tx);
        *self.task_rx.lock() = Some(task_rx);
        *self.result_tx.lock() = Some(result_tx);
        *self.result_rx.lock() = Some(result_rx);
        *self.quit.lock() = Some(quit_tx);
        *self.handles.lock() = handles;

        debug!(workers = self.config.workers, "worker pool started");
        true
    }

    /// Enqueue a task without blocking.
    pub fn submit(&self, task: Task<P, O>) -> Result<()> {
        match *self.state.lock() {
            PoolState::Stopped => return Err(PoolError::NotRunning),
            PoolState::Stopping => return Err(PoolError::Stopping),
            PoolState::Running => {}
        }

        let task_tx = self.task_tx.lock();
        let Some(task_tx) = task_tx.as_ref() else {
            return Err(PoolError::NotRunning);
        };
        task_tx.try_send(task).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => PoolError::Full,
            mpsc::error::TrySendError::Closed(_) => PoolError::NotRunning,
        })
    }

    /// Hand out the completion receiver. The sequence it yields is finite:
    /// it ends once the pool has stopped and the last in-flight completion
    /// was delivered.
    pub fn take_results(&self) -> Option<mpsc::Receiver<Completion<O>>> {
        self.result_rx.lock().take()
    }

    /// Stop the pool: signal quit, wait for every executor to finish its
    /// in-flight task, count the queued tasks that never ran, and close
    /// the result channel.
    pub async fn stop(&self) -> Result<ShutdownSummary> {
        {
            let mut state = self.state.lock();
            match *state {
                PoolState::Stopped => return Err(PoolError::NotRunning),
                PoolState::Stopping => return Err(PoolError::Stopping),
                PoolState::Running => *state = PoolState::Stopping,
            }
        }

        if let Some(quit) = self.quit.lock().take() {
            let _ = quit.send(true);
        }

        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "executor join failed");
            }
        }

        // no executors left; whatever is still queued was never run
        let task_tx = self.task_tx.lock().take();
        drop(task_tx);
        let task_rx = self.task_rx.lock().take();
        let mut drained = 0u64;
        if let Some(task_rx) = task_rx {
            let mut rx = task_rx.lock().await;
            while rx.try_recv().is_ok() {
                drained += 1;
            }
        }

        // the result channel closes once the last sender is gone
        let result_tx = self.result_tx.lock().take();
        drop(result_tx);

        *self.state.lock() = PoolState::Stopped;

        let summary = ShutdownSummary {
            delivered: self.delivered.load(Ordering::SeqCst),
            discarded: self.discarded.load(Ordering::SeqCst) + drained,
        };
        debug!(
            delivered = summary.delivered,
            discarded = summary.discarded,
            "worker pool stopped"
        );
        Ok(summary)
    }

    pub fn is_running(&self) -> bool {
        *self.state.lock() == PoolState::Running
    }

    pub fn stats(&self) -> PoolStats {
        let tasks_queued = self
            .task_tx
            .lock()
            .as_ref()
            .map(|tx| tx.max_capacity() - tx.capacity())
            .unwrap_or(0);
        let results_queued = self
            .result_tx
            .lock()
            .as_ref()
            .map(|tx| tx.max_capacity() - tx.capacity())
            .unwrap_or(0);
        PoolStats {
            workers: self.config.workers,
            tasks_queued,
            results_queued,
            running: self.is_running(),
        }
    }
}

async fn executor_loop<P, O>(
    worker: usize,
    task_rx: SharedTaskReceiver<P, O>,
    result_tx: mpsc::Sender<Completion<O>>,
    mut quit: watch::Receiver<bool>,
    delivered: Arc<AtomicU64>,
    discarded: Arc<AtomicU64>,
) where
    P: Send + 'static,
    O: Send + 'static,
{
    loop {
        let task = {
            let mut rx = task_rx.lock().await;
            tokio::select! {
                biased;
                _ = quit.changed() => None,
                task = rx.recv() => task,
            }
        };
        let Some(task) = task else { break };

        let completion = task.run();
        tokio::select! {
            biased;
            sent = result_tx.send(completion) => {
                if sent.is_ok() {
                    delivered.fetch_add(1, Ordering::SeqCst);
                } else {
                    discarded.fetch_add(1, Ordering::SeqCst);
                    break;
                }
            }
            _ = quit.changed() => {
                discarded.fetch_add(1, Ordering::SeqCst);
                break;
            }
        }
    }
    debug!(worker, "executor stopped");
}
