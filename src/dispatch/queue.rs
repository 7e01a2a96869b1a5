//! Bounded dispatch queue with a single worker thread.

use crate::error::{BusError, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, warn};

/// A dispatch of one already-snapshotted batch.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Batch(Job),
    Flush(Sender<()>),
}

/// Single-consumer queue: batches run on one worker in enqueue order.
pub(crate) struct DispatchQueue {
    sender: Mutex<Option<Sender<Message>>>,
    capacity: usize,
    stopped: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl DispatchQueue {
    /// Spawn the worker. Capacity is clamped to at least 1.
    pub(crate) fn start(capacity: usize, worker_name: &str) -> Result<Self> {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded(capacity);
        let stopped = Arc::new(AtomicBool::new(false));

        let worker = {
            let stopped = Arc::clone(&stopped);
            thread::Builder::new()
                .name(worker_name.to_string())
                .spawn(move || run_worker(receiver, stopped))?
        };
        let worker_id = worker.thread().id();

        debug!(capacity, worker = worker_name, "Dispatch worker started");
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            capacity,
            stopped,
            worker: Mutex::new(Some(worker)),
            worker_id,
        })
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Enqueue a batch without blocking.
    pub(crate) fn enqueue(&self, job: Job) -> Result<()> {
        let guard = self.sender.lock();
        let sender = guard.as_ref().ok_or(BusError::Disposed)?;
        match sender.try_send(Message::Batch(job)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(BusError::QueueFull {
                capacity: self.capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(BusError::Disposed),
        }
    }

    /// Block until every batch enqueued before this call has run.
    ///
    /// Returns immediately on the worker thread itself or after shutdown.
    pub(crate) fn flush(&self) {
        if self.on_worker() {
            return;
        }
        let sender = match self.sender.lock().as_ref() {
            Some(sender) => sender.clone(),
            None => return,
        };
        let (ack, done) = bounded(1);
        if sender.send(Message::Flush(ack)).is_ok() {
            let _ = done.recv();
        }
    }

    /// Stop accepting batches, discard queued ones and join the worker.
    pub(crate) fn shutdown(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        // Dropping the last sender ends the worker loop.
        drop(self.sender.lock().take());

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if self.on_worker() {
                // Called from a handler; the worker exits once it returns.
                return;
            }
            if worker.join().is_err() {
                warn!("Dispatch worker panicked");
            }
            debug!("Dispatch worker stopped");
        }
    }

    fn on_worker(&self) -> bool {
        thread::current().id() == self.worker_id
    }
}

impl Drop for DispatchQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(receiver: Receiver<Message>, stopped: Arc<AtomicBool>) {
    let mut discarded = 0usize;
    for message in receiver.iter() {
        match message {
            Message::Batch(job) => {
                if stopped.load(Ordering::SeqCst) {
                    discarded += 1;
                } else {
                    job();
                }
            }
            Message::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    if discarded > 0 {
        warn!(discarded, "Discarded queued batches after dispose");
    }
}
