//! Labeled serial execution queues.
//!
//! A [`SerialQueue`] is a dedicated thread that runs submitted jobs one at a
//! time in submission order. The queue may own a state value; jobs receive
//! `&mut` access to it, so state owned by a queue is only ever touched from
//! that queue's thread.

use crossbeam_channel::{bounded, unbounded, Sender};
use std::thread::{JoinHandle, ThreadId};
use thiserror::Error;

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

/// Errors returned when submitting work to a queue.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to spawn queue thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("queue {0} is closed")]
    Closed(String),
    #[error("synchronous call onto queue {0} from its own thread")]
    Reentrant(String),
}

/// A dedicated thread executing jobs FIFO against owned state `S`.
pub struct SerialQueue<S: Send + 'static = ()> {
    label: String,
    sender: Option<Sender<Job<S>>>,
    thread_id: ThreadId,
    handle: Option<JoinHandle<()>>,
}

impl SerialQueue<()> {
    /// Creates a stateless queue.
    pub fn new(label: &str) -> Result<Self, QueueError> {
        Self::with_state(label, ())
    }
}

impl<S: Send + 'static> SerialQueue<S> {
    /// Creates a queue whose thread owns `state`.
    pub fn with_state(label: &str, state: S) -> Result<Self, QueueError> {
        let (sender, receiver) = unbounded::<Job<S>>();
        let handle = std::thread::Builder::new()
            .name(label.to_string())
            .spawn(move || {
                let mut state = state;
                for job in receiver {
                    job(&mut state);
                }
            })?;

        Ok(Self {
            label: label.to_string(),
            thread_id: handle.thread().id(),
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    /// Returns the queue label (also its thread name).
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns true when called from this queue's thread.
    pub fn is_current(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }

    /// Runs `f` on the queue and blocks until it returns.
    pub fn sync<R, F>(&self, f: F) -> Result<R, QueueError>
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_current() {
            return Err(QueueError::Reentrant(self.label.clone()));
        }

        let (reply_tx, reply_rx) = bounded(1);
        self.submit(Box::new(move |state| {
            let _ = reply_tx.send(f(state));
        }))?;

        // A panicking job drops the reply sender without sending.
        reply_rx
            .recv()
            .map_err(|_| QueueError::Closed(self.label.clone()))
    }

    /// Enqueues `f` without waiting for it to run.
    pub fn dispatch<F>(&self, f: F) -> Result<(), QueueError>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.submit(Box::new(f))
    }

    fn submit(&self, job: Job<S>) -> Result<(), QueueError> {
        self.sender
            .as_ref()
            .ok_or_else(|| QueueError::Closed(self.label.clone()))?
            .send(job)
            .map_err(|_| QueueError::Closed(self.label.clone()))
    }
}

impl<S: Send + 'static> Drop for SerialQueue<S> {
    /// Runs the jobs already queued, then joins the thread.
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if !self.is_current() {
                let _ = handle.join();
            }
        }
    }
}

impl<S: Send + 'static> std::fmt::Debug for SerialQueue<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialQueue")
            .field("label", &self.label)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_sync_returns_result() {
        let queue = SerialQueue::with_state("test.sync", 41u32).unwrap();
        let value = queue
            .sync(|n| {
                *n += 1;
                *n
            })
            .unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_jobs_run_in_order_on_named_thread() {
        let queue = SerialQueue::with_state("test.order", Vec::new()).unwrap();
        for i in 0..100 {
            queue.dispatch(move |v: &mut Vec<i32>| v.push(i)).unwrap();
        }
        let (order, name) = queue
            .sync(|v| (v.clone(), std::thread::current().name().map(String::from)))
            .unwrap();

        assert_eq!(order, (0..100).collect::<Vec<_>>());
        assert_eq!(name.as_deref(), Some("test.order"));
    }

    #[test]
    fn test_reentrant_sync_is_rejected() {
        let queue = Arc::new(SerialQueue::new("test.reentrant").unwrap());
        let inner = Arc::clone(&queue);
        let result = queue.sync(move |_| inner.sync(|_| ()).is_err()).unwrap();
        assert!(result);
    }

    #[test]
    fn test_panicking_job_closes_queue() {
        let queue = SerialQueue::new("test.panic").unwrap();
        let result = queue.sync(|_| -> () { panic!("job failed") });
        assert!(matches!(result, Err(QueueError::Closed(_))));
    }

    #[test]
    fn test_drop_drains_pending_jobs() {
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        {
            let queue = SerialQueue::new("test.drain").unwrap();
            for _ in 0..10 {
                let counter = Arc::clone(&counter);
                queue
                    .dispatch(move |_| {
                        counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    })
                    .unwrap();
            }
        }
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 10);
    }
}
