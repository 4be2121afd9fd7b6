//! Background application of commit batches
//!
//! The primary store hands batches to a bounded queue and returns; a single
//! thread applies them in submission order. A full queue blocks `submit`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Sender, TrySendError};
use parking_lot::{Condvar, Mutex};

use super::mutation::MutationSync;
use crate::error::{Result, SearchSyncError};
use crate::models::CommitBatch;

struct Progress {
    applied: AtomicU64,
    cv: (Mutex<()>, Condvar),
}

impl Progress {
    fn advance(&self) {
        self.applied.fetch_add(1, Ordering::SeqCst);
        let (lock, cv) = &self.cv;
        let _g = lock.lock();
        cv.notify_all();
    }
}

pub struct SyncWorker {
    tx: Option<Sender<CommitBatch>>,
    join: Option<thread::JoinHandle<()>>,
    submitted: AtomicU64,
    progress: Arc<Progress>,
}

impl SyncWorker {
    pub fn spawn(sync: Arc<MutationSync>, capacity: usize) -> Result<Self> {
        let (tx, rx) = channel::bounded::<CommitBatch>(capacity.max(1));
        let progress = Arc::new(Progress {
            applied: AtomicU64::new(0),
            cv: (Mutex::new(()), Condvar::new()),
        });

        let worker_progress = Arc::clone(&progress);
        let join = thread::Builder::new()
            .name("searchsync-worker".to_string())
            .spawn(move || {
                while let Ok(batch) = rx.recv() {
                    let report = sync.apply_batch(&batch);
                    if !report.is_clean() {
                        tracing::warn!(
                            failures = report.failures.len(),
                            commit_failures = report.commit_failures.len(),
                            retriable = report.is_retriable(),
                            "batch applied with failures"
                        );
                    }
                    worker_progress.advance();
                }
                tracing::debug!("sync worker stopped");
            })?;

        tracing::info!(capacity, "sync worker started");
        Ok(Self {
            tx: Some(tx),
            join: Some(join),
            submitted: AtomicU64::new(0),
            progress,
        })
    }

    /// Queue a batch, blocking while the queue is full
    pub fn submit(&self, batch: CommitBatch) -> Result<()> {
        let tx = self.sender()?;
        tx.send(batch)
            .map_err(|_| SearchSyncError::Internal("sync worker has stopped".to_string()))?;
        self.submitted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Queue a batch without blocking. Returns the batch back when the queue
    /// is full.
    pub fn try_submit(&self, batch: CommitBatch) -> Result<Option<CommitBatch>> {
        let tx = self.sender()?;
        match tx.try_send(batch) {
            Ok(()) => {
                self.submitted.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }
            Err(TrySendError::Full(batch)) => Ok(Some(batch)),
            Err(TrySendError::Disconnected(_)) => {
                Err(SearchSyncError::Internal("sync worker has stopped".to_string()))
            }
        }
    }

    /// Batches applied so far
    pub fn applied(&self) -> u64 {
        self.progress.applied.load(Ordering::SeqCst)
    }

    /// Block until every batch submitted so far has been applied, or the
    /// timeout expires. Returns whether the worker caught up.
    pub fn flush(&self, timeout: Duration) -> bool {
        let target = self.submitted.load(Ordering::SeqCst);
        let deadline = std::time::Instant::now() + timeout;
        let (lock, cv) = &self.progress.cv;
        let mut guard = lock.lock();
        while self.applied() < target {
            if cv.wait_until(&mut guard, deadline).timed_out() {
                return self.applied() >= target;
            }
        }
        true
    }

    /// Stop accepting batches, drain the queue and join the thread
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn sender(&self) -> Result<&Sender<CommitBatch>> {
        self.tx
            .as_ref()
            .ok_or_else(|| SearchSyncError::Internal("sync worker has stopped".to_string()))
    }

    fn stop(&mut self) {
        self.tx.take();
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                tracing::error!("sync worker panicked");
            }
        }
    }
}

impl Drop for SyncWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
