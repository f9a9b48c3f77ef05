//! Single-worker FIFO executor for async operations.

use crate::error::QueueError;
use futures::FutureExt;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::error;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default)]
struct QueueInner {
    jobs: VecDeque<Job>,
    paused: bool,
    running: bool,
}

/// Runs enqueued operations one at a time in submission order.
///
/// Cloning yields another handle to the same queue. Must be used from
/// inside a tokio runtime.
#[derive(Clone, Default)]
pub struct SerialQueue {
    inner: Arc<Mutex<QueueInner>>,
}

/// Completion of one queued operation.
///
/// Dropping the ticket does not cancel the operation.
#[must_use = "the operation runs regardless, but its result is only visible through the ticket"]
pub struct QueueTicket<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for QueueTicket<T> {
    type Output = Result<T, QueueError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.map_err(|_| QueueError::Cancelled))
    }
}

impl SerialQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A queue that holds its jobs until `resume` is called.
    pub fn paused() -> Self {
        let queue = Self::default();
        queue.lock().paused = true;
        queue
    }

    pub fn enqueue<F, T>(&self, op: F) -> QueueTicket<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job = Box::pin(async move {
            let _ = tx.send(op.await);
        });

        self.lock().jobs.push_back(job);
        self.drain();

        QueueTicket { rx }
    }

    /// Stop dequeuing. The in-flight job, if any, still completes.
    pub fn pause(&self) {
        self.lock().paused = true;
    }

    pub fn resume(&self) {
        self.lock().paused = false;
        self.drain();
    }

    /// Drop every job not yet started; their tickets resolve to `Cancelled`.
    pub fn clear(&self) {
        let jobs = std::mem::take(&mut self.lock().jobs);
        drop(jobs);
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn drain(&self) {
        {
            let mut inner = self.lock();
            if inner.running || inner.paused || inner.jobs.is_empty() {
                return;
            }
            inner.running = true;
        }

        let queue = self.clone();
        tokio::spawn(async move { queue.run().await });
    }

    async fn run(self) {
        loop {
            let job = {
                let mut inner = self.lock();
                let next = if inner.paused {
                    None
                } else {
                    inner.jobs.pop_front()
                };
                match next {
                    Some(job) => job,
                    None => {
                        inner.running = false;
                        return;
                    }
                }
            };

            // A panicking job only loses its own ticket.
            if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                error!("queued operation panicked");
            }
        }
    }
}
