use confab_core::{Message, RequestId};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Outstanding request/response correlations.
#[derive(Clone, Default)]
pub struct PendingRequests {
    inner: Arc<DashMap<RequestId, oneshot::Sender<Message>>>,
}

impl PendingRequests {
    pub fn register(&self, request_id: RequestId) -> oneshot::Receiver<Message> {
        let (tx, rx) = oneshot::channel();
        self.inner.insert(request_id, tx);
        rx
    }

    /// Hand `message` to the waiter of its request id. Gives the message
    /// back when nobody is waiting.
    pub fn resolve(&self, message: Message) -> Option<Message> {
        let Some(request_id) = message.request_id else {
            return Some(message);
        };
        match self.inner.remove(&request_id) {
            Some((_, waiter)) => {
                // A waiter that gave up already is treated as consumed.
                let _ = waiter.send(message);
                None
            }
            None => Some(message),
        }
    }

    pub fn cancel(&self, request_id: &RequestId) {
        self.inner.remove(request_id);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Removes its entry when the awaiting future exits, whichever way it exits.
pub(crate) struct PendingGuard {
    pending: PendingRequests,
    request_id: RequestId,
}

impl PendingGuard {
    pub(crate) fn new(pending: PendingRequests, request_id: RequestId) -> Self {
        Self {
            pending,
            request_id,
        }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.cancel(&self.request_id);
    }
}
