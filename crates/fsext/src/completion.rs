//! Asynchronous dispatch onto the tokio blocking pool.
//!
//! The OS calls wrapped here can block indefinitely (`LOCK_EX` on a held
//! file), so they run via `spawn_blocking` rather than on a reactor thread.
//! Dropping a [`Completion`] detaches the call; the call itself still runs
//! to the end because a blocked system call cannot be interrupted.

use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use tokio::task::JoinHandle;

use crate::error::{Error, Result};

/// Pending result of an `*_async` operation.
#[must_use = "a Completion does nothing unless awaited"]
#[derive(Debug)]
pub struct Completion<T> {
    op: &'static str,
    handle: JoinHandle<Result<T>>,
}

impl<T> Completion<T> {
    /// Name of the operation this completion belongs to.
    pub fn op(&self) -> &'static str {
        self.op
    }

    /// Whether the underlying call has already returned.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let op = self.op;
        match ready!(Pin::new(&mut self.handle).poll(cx)) {
            Ok(result) => Poll::Ready(result),
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => Poll::Ready(Err(Error::Runtime {
                op,
                reason: err.to_string(),
            })),
        }
    }
}

/// Run `call` on the blocking pool of the current runtime.
///
/// Fails with [`Error::Runtime`] when called outside a tokio runtime.
pub(crate) fn dispatch<T, F>(op: &'static str, call: F) -> Result<Completion<T>>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let runtime = tokio::runtime::Handle::try_current().map_err(|err| Error::Runtime {
        op,
        reason: err.to_string(),
    })?;
    Ok(Completion {
        op,
        handle: runtime.spawn_blocking(call),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_outside_runtime_fails() {
        let err = dispatch("seek", || Ok(0u64)).unwrap_err();
        assert!(matches!(err, Error::Runtime { op: "seek", .. }));
        assert_eq!(err.code(), "ECANCELED");
    }

    #[tokio::test]
    async fn test_dispatch_delivers_result() {
        let completion = dispatch("seek", || Ok(7u64)).unwrap();
        assert_eq!(completion.op(), "seek");
        assert_eq!(completion.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_dispatch_delivers_error() {
        let completion = dispatch::<(), _>("flock", || Err(Error::invalid("flock", "nope"))).unwrap();
        assert!(matches!(
            completion.await,
            Err(Error::InvalidArgument { op: "flock", .. })
        ));
    }

    #[tokio::test]
    #[should_panic(expected = "boom")]
    async fn test_dispatch_propagates_panic() {
        let completion = dispatch::<(), _>("flock", || panic!("boom")).unwrap();
        let _ = completion.await;
    }
}
