use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::trace;

use super::BridgeError;

type Settlement<T> = Result<T, BridgeError>;

/// Outcome of a bridge operation, delivered asynchronously.
///
/// A promise either settles later, when the worker finishes the job, or is
/// already settled when returned (fast-fail rejections). Await it from async
/// code or call [`Promise::wait`] from a plain thread.
pub struct Promise<T> {
    state: PromiseState<T>,
}

enum PromiseState<T> {
    Settled(Option<Settlement<T>>),
    Pending {
        rx: oneshot::Receiver<Settlement<T>>,
        /// Settlement used when the worker goes away without answering
        orphaned: fn() -> Settlement<T>,
    },
}

// No field is ever pinned structurally.
impl<T> Unpin for Promise<T> {}

/// Worker-side handle that settles exactly one [`Promise`].
pub(crate) struct Resolver<T> {
    tx: oneshot::Sender<Settlement<T>>,
}

impl<T> Resolver<T> {
    pub(crate) fn settle(self, outcome: Settlement<T>) {
        if self.tx.send(outcome).is_err() {
            trace!("Promise dropped before it was settled");
        }
    }
}

impl<T> Promise<T> {
    pub(crate) fn rejected(error: BridgeError) -> Self {
        Self { state: PromiseState::Settled(Some(Err(error))) }
    }

    pub(crate) fn channel(orphaned: fn() -> Settlement<T>) -> (Resolver<T>, Self) {
        let (tx, rx) = oneshot::channel();
        (Resolver { tx }, Self { state: PromiseState::Pending { rx, orphaned } })
    }

    /// True when the promise was settled on the calling thread, without any
    /// work being queued.
    pub fn is_settled(&self) -> bool {
        matches!(self.state, PromiseState::Settled(_))
    }

    /// Blocks the current thread until the promise settles.
    ///
    /// # Panics
    ///
    /// Panics when called from within an async runtime; `.await` it there.
    pub fn wait(self) -> Settlement<T> {
        match self.state {
            PromiseState::Settled(outcome) => outcome.unwrap_or_else(|| unreachable!("settled promise consumed twice")),
            PromiseState::Pending { rx, orphaned } => rx.blocking_recv().unwrap_or_else(|_| orphaned()),
        }
    }
}

impl<T> Future for Promise<T> {
    type Output = Settlement<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            PromiseState::Settled(outcome) => {
                Poll::Ready(outcome.take().expect("Promise polled after completion"))
            }
            PromiseState::Pending { rx, orphaned } => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
                Poll::Ready(Err(_)) => Poll::Ready(orphaned()),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}
