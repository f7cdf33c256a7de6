// SPDX-License-Identifier: GPL-3.0-only
//! Single-worker execution context for frame analysis
//!
//! All decode jobs and delayed frame releases of a scan session run on one
//! dedicated thread hosting a current-thread tokio runtime. Jobs are awaited
//! one after another, so at most one frame is ever being analysed. Deferred
//! actions are timers spawned straight onto the same runtime: their clock
//! starts when they are scheduled and they never wait behind queued jobs.

use crate::errors::SessionError;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

enum Work {
    Run(BoxFuture<'static, ()>),
    Shutdown,
}

type Deferred = Arc<Mutex<JoinSet<()>>>;

fn lock(deferred: &Deferred) -> MutexGuard<'_, JoinSet<()>> {
    deferred.lock().unwrap_or_else(|e| e.into_inner())
}

fn reap(deferred: &mut JoinSet<()>) {
    while let Some(result) = deferred.try_join_next() {
        if let Err(e) = result {
            warn!(error = %e, "Deferred action failed");
        }
    }
}

/// Capability to schedule work on an [`AnalysisExecutor`]
///
/// Cheap to clone. Outlives the executor safely: once the worker is shut down,
/// jobs are dropped unrun and deferred actions run immediately on the caller.
#[derive(Clone)]
pub struct ExecutorHandle {
    tx: mpsc::UnboundedSender<Work>,
    runtime: Handle,
    stop: watch::Receiver<bool>,
    deferred: Deferred,
}

impl ExecutorHandle {
    /// Queue a job behind all previously queued jobs
    ///
    /// Returns `false` if the worker is gone; the job is dropped without
    /// being polled.
    pub fn run<F>(&self, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tx.send(Work::Run(Box::pin(job))).is_ok()
    }

    /// Run `action` on the worker `delay` from now
    ///
    /// The action always runs exactly once: early if the worker shuts down
    /// first, synchronously on this thread if it is already stopping.
    pub fn defer<A>(&self, delay: Duration, action: A)
    where
        A: FnOnce() + Send + 'static,
    {
        let deadline = tokio::time::Instant::now() + delay;
        let mut deferred = lock(&self.deferred);

        // Checked under the lock: shutdown flips the flag under it too
        if *self.stop.borrow() {
            drop(deferred);
            debug!("Analysis worker stopping, running deferred action now");
            action();
            return;
        }

        reap(&mut deferred);
        let mut stop = self.stop.clone();
        deferred.spawn_on(
            async move {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {}
                    _ = stop.wait_for(|stopped| *stopped) => {}
                }
                action();
            },
            &self.runtime,
        );
    }

    /// Sleep on the worker until `deadline`
    ///
    /// Returns `false` as soon as the executor starts shutting down, `true`
    /// once the deadline has passed. Must be awaited from a job.
    pub async fn sleep_until(&self, deadline: Instant) -> bool {
        let mut stop = self.stop.clone();
        tokio::select! {
            biased;
            _ = stop.wait_for(|stopped| *stopped) => false,
            _ = tokio::time::sleep_until(deadline.into()) => true,
        }
    }

    /// True while the worker accepts work
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed() && !*self.stop.borrow()
    }
}

/// Owner of the analysis worker thread
///
/// # Example
///
/// ```ignore
/// let mut executor = AnalysisExecutor::start("qr-scan-analysis")?;
/// let handle = executor.handle();
/// handle.run(async { /* decode one frame */ });
/// handle.defer(Duration::from_millis(300), || { /* release it */ });
///
/// // Later: pending deferrals fire, the thread is joined
/// executor.shutdown();
/// ```
pub struct AnalysisExecutor {
    handle: ExecutorHandle,
    stop_tx: watch::Sender<bool>,
    thread_handle: Option<JoinHandle<()>>,
    name: String,
}

impl AnalysisExecutor {
    /// Spawn the worker thread
    pub fn start(name: &str) -> Result<Self, SessionError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SessionError::Executor(format!("failed to build runtime: {}", e)))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        let deferred: Deferred = Arc::new(Mutex::new(JoinSet::new()));
        let handle = ExecutorHandle {
            tx,
            runtime: runtime.handle().clone(),
            stop: stop_rx.clone(),
            deferred: Arc::clone(&deferred),
        };
        let name_clone = name.to_string();

        info!(name = %name, "Starting analysis worker");

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(name = %name_clone, "Analysis worker thread started");
                runtime.block_on(worker_loop(rx, stop_rx, deferred));
                info!(name = %name_clone, "Analysis worker thread exiting");
            })
            .map_err(|e| SessionError::Executor(format!("failed to spawn worker: {}", e)))?;

        Ok(Self {
            handle,
            stop_tx,
            thread_handle: Some(thread_handle),
            name: name.to_string(),
        })
    }

    pub fn handle(&self) -> ExecutorHandle {
        self.handle.clone()
    }

    /// Check if the worker thread is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Stop accepting work, fire pending deferrals and join the thread
    ///
    /// Jobs still queued are dropped unrun and a job sleeping in
    /// [`ExecutorHandle::sleep_until`] wakes up at once. A job already
    /// decoding is allowed to finish. Calling this again does nothing.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.thread_handle.take() else {
            return;
        };

        debug!(name = %self.name, "Requesting analysis worker shutdown");
        {
            let _deferred = lock(&self.handle.deferred);
            self.stop_tx.send_replace(true);
        }
        // Fails only if the worker already exited
        let _ = self.handle.tx.send(Work::Shutdown);

        if handle.thread().id() == thread::current().id() {
            // Called from a job or deferred action; joining would deadlock
            warn!(name = %self.name, "Shutdown requested from the worker itself, not joining");
            return;
        }

        if let Err(e) = handle.join() {
            warn!(name = %self.name, "Analysis worker thread panicked: {:?}", e);
        } else {
            debug!(name = %self.name, "Analysis worker thread finished");
        }
    }
}

impl Drop for AnalysisExecutor {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "AnalysisExecutor dropped, shutting down worker");
            self.shutdown();
        }
    }
}

async fn worker_loop(
    mut rx: mpsc::UnboundedReceiver<Work>,
    stop: watch::Receiver<bool>,
    deferred: Deferred,
) {
    while let Some(work) = rx.recv().await {
        match work {
            Work::Run(job) => {
                if *stop.borrow() {
                    // Dropping the job drops whatever frame it owns
                    drop(job);
                } else {
                    job.await;
                }
            }
            Work::Shutdown => rx.close(),
        }
    }

    // Stop is set, so nothing new is spawned and every deferral is now due
    let mut pending = std::mem::take(&mut *lock(&deferred));
    while let Some(result) = pending.join_next().await {
        if let Err(e) = result {
            warn!(error = %e, "Deferred action failed");
        }
    }
}
