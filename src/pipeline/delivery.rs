//! Delivery contexts: where processed frames are handed to consumers.

use super::SerialQueue;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::time::Instant;

/// A unit of work posted to a delivery context.
pub type DeliveryJob = Box<dyn FnOnce() + Send>;

/// Execution context on which delivery callbacks run.
///
/// `post` never blocks the caller; the context decides when and where the
/// job runs.
pub trait DeliveryContext: Send + Sync {
    /// Schedules `job` to run on this context.
    fn post(&self, job: DeliveryJob);

    /// Human-readable name for diagnostics.
    fn label(&self) -> &str;
}

impl DeliveryContext for SerialQueue<()> {
    fn post(&self, job: DeliveryJob) {
        if let Err(e) = self.dispatch(move |_| job()) {
            tracing::debug!(error = %e, "Delivery queue rejected job");
        }
    }

    fn label(&self) -> &str {
        SerialQueue::label(self)
    }
}

/// A delivery context drained by its owner, typically an application's main
/// loop.
///
/// Jobs accumulate until the owning thread calls [`run_pending`] or
/// [`run_until`]; they then run on that thread in FIFO order.
///
/// [`run_pending`]: PostedDelivery::run_pending
/// [`run_until`]: PostedDelivery::run_until
pub struct PostedDelivery {
    label: String,
    sender: Sender<DeliveryJob>,
    receiver: Receiver<DeliveryJob>,
}

impl PostedDelivery {
    pub fn new(label: &str) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            label: label.to_string(),
            sender,
            receiver,
        }
    }

    /// Runs every job posted so far and returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        for job in self.receiver.try_iter() {
            job();
            ran += 1;
        }
        ran
    }

    /// Runs jobs as they arrive until `deadline`, returning how many ran.
    pub fn run_until(&self, deadline: Instant) -> usize {
        let mut ran = 0;
        loop {
            let timeout = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(timeout) {
                Ok(job) => {
                    job();
                    ran += 1;
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        ran
    }

    /// Number of jobs waiting to run.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl DeliveryContext for PostedDelivery {
    fn post(&self, job: DeliveryJob) {
        // The receiver lives as long as self, so this cannot disconnect.
        let _ = self.sender.send(job);
    }

    fn label(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_posted_jobs_wait_for_owner() {
        let delivery = PostedDelivery::new("main");
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let seen = Arc::clone(&seen);
            delivery.post(Box::new(move || seen.lock().push(i)));
        }
        assert!(seen.lock().is_empty());
        assert_eq!(delivery.pending(), 3);

        assert_eq!(delivery.run_pending(), 3);
        assert_eq!(*seen.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_run_until_picks_up_late_jobs() {
        let delivery = Arc::new(PostedDelivery::new("main"));
        let poster = Arc::clone(&delivery);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            poster.post(Box::new(|| {}));
        });

        let ran = delivery.run_until(Instant::now() + Duration::from_millis(500));
        handle.join().unwrap();
        assert_eq!(ran, 1);
    }

    #[test]
    fn test_serial_queue_delivers_off_caller_thread() {
        let queue = SerialQueue::new("queue.delivery").unwrap();
        let (tx, rx) = crossbeam_channel::bounded(1);
        DeliveryContext::post(
            &queue,
            Box::new(move || {
                let _ = tx.send(std::thread::current().name().map(String::from));
            }),
        );

        let name = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(name.as_deref(), Some("queue.delivery"));
    }
}
