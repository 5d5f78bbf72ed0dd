//! Ordered message queue bridging agent callbacks to a stream consumer.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::ProtocolMessage;

/// Consumer end of a [`MessageQueue`].
pub type MessageStream = UnboundedReceiverStream<ProtocolMessage>;

/// Unbounded FIFO of protocol messages with a single consumer.
///
/// Pushing never blocks, so it is safe from inside synchronous agent
/// callbacks. Once the terminal message is pushed the queue is sealed:
/// later pushes are dropped and the consumer sees end-of-stream after
/// draining what is left.
pub struct MessageQueue {
    sender: Mutex<Option<mpsc::UnboundedSender<ProtocolMessage>>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<ProtocolMessage>>>,
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MessageQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Enqueue a message.
    ///
    /// Returns `false` if the message was dropped, either because the queue
    /// is sealed or because the consumer has gone away.
    pub fn push(&self, msg: ProtocolMessage) -> bool {
        let mut sender = lock(&self.sender);
        let Some(tx) = sender.as_ref() else {
            tracing::debug!(role = msg.role(), "Queue sealed, dropping message");
            return false;
        };

        let terminal = msg.is_terminal();
        let delivered = tx.send(msg).is_ok();
        if terminal {
            *sender = None;
        }
        delivered
    }

    /// Push a non-terminal system notice.
    pub fn push_system<S: Into<String>>(&self, content: S) -> bool {
        self.push(ProtocolMessage::system(content))
    }

    /// Push the "started" notice.
    pub fn push_started(&self) -> bool {
        self.push(ProtocolMessage::started())
    }

    /// Push the terminal message and seal the queue.
    pub fn push_finished(&self) -> bool {
        self.push(ProtocolMessage::finished())
    }

    /// Whether the terminal message has been pushed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        lock(&self.sender).is_none()
    }

    /// Take the consumer end. Only the first call returns `Some`.
    #[must_use]
    pub fn take_stream(&self) -> Option<MessageStream> {
        lock(&self.receiver).take().map(UnboundedReceiverStream::new)
    }

    /// Guard that pushes the terminal message when dropped.
    ///
    /// Dropping also happens when the owning future is cancelled, so the
    /// terminal message is enqueued on every exit path.
    #[must_use]
    pub const fn finish_guard(&self) -> FinishGuard<'_> {
        FinishGuard { queue: self }
    }
}

/// See [`MessageQueue::finish_guard`].
pub struct FinishGuard<'a> {
    queue: &'a MessageQueue,
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        if !self.queue.is_finished() {
            self.queue.push_finished();
        }
    }
}
