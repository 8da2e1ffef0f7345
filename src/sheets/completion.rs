//! Adapts "invoke with a completion callback" into a future that resolves once.

use crate::error::RequestError;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// One-shot completion handed to an API call.
///
/// Consuming `self` on completion means a call can report at most one outcome,
/// and the `Result` means that outcome is either an error or a value.
#[derive(Debug)]
pub struct Completion<T> {
    tx: oneshot::Sender<Result<T, RequestError>>,
}

impl<T> Completion<T> {
    pub fn complete(self, result: Result<T, RequestError>) {
        // The caller may have stopped waiting; there's nobody left to tell.
        let _ = self.tx.send(result);
    }

    pub fn succeed(self, value: T) {
        self.complete(Ok(value));
    }

    pub fn fail(self, error: RequestError) {
        self.complete(Err(error));
    }
}

/// Future returned by [`deferred`].
#[derive(Debug)]
pub struct Deferred<T> {
    rx: oneshot::Receiver<Result<T, RequestError>>,
}

impl<T> Future for Deferred<T> {
    type Output = Result<T, RequestError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(RequestError::Abandoned)))
    }
}

/// Run `invoke` with a fresh [`Completion`] and return a future of its outcome.
///
/// A completion dropped without being consumed resolves to
/// [`RequestError::Abandoned`].
pub fn deferred<T, F>(invoke: F) -> Deferred<T>
where
    F: FnOnce(Completion<T>),
{
    let (tx, rx) = oneshot::channel();
    invoke(Completion { tx });
    Deferred { rx }
}
