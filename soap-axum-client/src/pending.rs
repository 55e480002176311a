//! Calls running on a background task.
//!
//! [`SoapClient::begin_invoke`](crate::SoapClient::begin_invoke) spawns the
//! call and hands back a [`PendingCall`]. The result is stored exactly once;
//! the completion callback fires after it is stored, and
//! [`PendingCall::end_invoke`] takes it. An aborted call stores
//! [`ClientError::Canceled`] and still fires the callback.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::ClientError;
use crate::response::SoapResponse;

type CallResult = Result<SoapResponse, ClientError>;

/// Handle of an in-flight call.
///
/// Dropping the handle does not cancel the call; use [`abort`](Self::abort).
#[derive(Debug)]
pub struct PendingCall {
    receiver: Option<oneshot::Receiver<CallResult>>,
    completed: Arc<AtomicBool>,
    task: AbortHandle,
}

impl PendingCall {
    pub(crate) fn spawn<Fut, F>(call: Fut, callback: F) -> Self
    where
        Fut: Future<Output = CallResult> + Send + 'static,
        F: FnOnce() + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let completed = Arc::new(AtomicBool::new(false));
        // Created outside the task so that aborting before the first poll
        // still drops it.
        let completion = Completion {
            sender: Some(sender),
            completed: completed.clone(),
            callback: Some(callback),
        };
        let handle = tokio::spawn(async move {
            let result = call.await;
            completion.finish(result);
        });
        Self {
            receiver: Some(receiver),
            completed,
            task: handle.abort_handle(),
        }
    }

    /// Whether the result is stored and [`end_invoke`](Self::end_invoke)
    /// will not wait.
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Wait for the call and take its result.
    ///
    /// Only the first call gets the result; later calls return
    /// [`ClientError::AlreadyCompleted`]. An aborted call yields
    /// [`ClientError::Canceled`].
    pub async fn end_invoke(&mut self) -> CallResult {
        let receiver = self.receiver.take().ok_or(ClientError::AlreadyCompleted)?;
        receiver.await.unwrap_or(Err(ClientError::Canceled))
    }

    /// Cancel the call if it has not completed yet.
    ///
    /// The call then completes with [`ClientError::Canceled`]; the callback
    /// still fires once.
    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Stores the result, then fires the callback, exactly once. Runs on drop,
/// so an aborted or panicking call completes as well.
struct Completion<F: FnOnce()> {
    sender: Option<oneshot::Sender<CallResult>>,
    completed: Arc<AtomicBool>,
    callback: Option<F>,
}

impl<F: FnOnce()> Completion<F> {
    fn finish(mut self, result: CallResult) {
        if let Some(sender) = self.sender.take() {
            // The receiver may already be gone; the callback still fires.
            let _ = sender.send(result);
        }
    }
}

impl<F: FnOnce()> Drop for Completion<F> {
    fn drop(&mut self) {
        // An unfinished call closes the channel: `end_invoke` sees `Canceled`.
        drop(self.sender.take());
        self.completed.store(true, Ordering::Release);
        if let Some(callback) = self.callback.take() {
            callback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_end_invoke_once() {
        let mut call = PendingCall::spawn(async { Err(ClientError::Protocol("boom".into())) }, || {});
        let first = call.end_invoke().await;
        assert!(matches!(first, Err(ClientError::Protocol(_))));
        assert!(call.is_completed());
        let second = call.end_invoke().await;
        assert!(matches!(second, Err(ClientError::AlreadyCompleted)));
    }

    #[tokio::test]
    async fn test_callback_fires_once_after_result() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let (done_tx, done_rx) = oneshot::channel();
        let mut call = PendingCall::spawn(async { Err(ClientError::Canceled) }, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = done_tx.send(());
        });

        done_rx.await.unwrap();
        assert!(call.is_completed());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(call.end_invoke().await.is_err());
    }

    #[tokio::test]
    async fn test_abort() {
        let mut call = PendingCall::spawn(
            async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(ClientError::Protocol("unreachable".into()))
            },
            || {},
        );
        assert!(!call.is_completed());
        call.abort();
        let result = call.end_invoke().await;
        assert!(matches!(result, Err(ClientError::Canceled)));
    }

    #[tokio::test]
    async fn test_abort_fires_callback_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let (done_tx, done_rx) = oneshot::channel();
        let mut call = PendingCall::spawn(
            async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(ClientError::Protocol("unreachable".into()))
            },
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = done_tx.send(());
            },
        );
        call.abort();

        done_rx.await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(call.is_completed());
        assert!(matches!(call.end_invoke().await, Err(ClientError::Canceled)));
    }
}
