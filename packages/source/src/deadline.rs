//! Per-call deadlines composed with caller cancellation.
//!
//! Every outbound provider call is wrapped in [`with_deadline`]. A shared
//! default timeout applies unless the service overrides it, and an
//! optional [`CancelSignal`] aborts the call as soon as the caller gives
//! up, so a cancelled request never waits on slow providers.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

use crate::SourceError;

/// Caller-side handle that cancels every call observing its signal.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Cloneable cancellation signal passed down to provider calls.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

/// Creates a linked cancel handle and signal.
#[must_use]
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

impl CancelHandle {
    /// Cancels every call observing the paired signal.
    pub fn cancel(&self) {
        // Receivers may all be gone already; nothing left to notify.
        let _ = self.tx.send(true);
    }
}

impl CancelSignal {
    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Never resolves if the
    /// handle is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let sender_dropped = rx.wait_for(|cancelled| *cancelled).await.is_err();
        if sender_dropped {
            std::future::pending::<()>().await;
        }
    }
}

/// Runs `fut` under `timeout`, aborting early if `cancel` fires.
///
/// # Errors
///
/// Returns [`SourceError::Timeout`] when the deadline passes,
/// [`SourceError::Cancelled`] when the caller cancels (both converted into
/// the caller's error type), or whatever error `fut` itself produced.
pub async fn with_deadline<T, E, F>(
    fut: F,
    timeout: Duration,
    cancel: Option<&CancelSignal>,
) -> Result<T, E>
where
    E: From<SourceError>,
    F: Future<Output = Result<T, E>>,
{
    if cancel.is_some_and(CancelSignal::is_cancelled) {
        return Err(SourceError::Cancelled.into());
    }

    let timed = tokio::time::timeout(timeout, fut);

    match cancel {
        Some(signal) => {
            tokio::select! {
                result = timed => result.unwrap_or_else(|_| Err(SourceError::Timeout(timeout).into())),
                () = signal.cancelled() => Err(SourceError::Cancelled.into()),
            }
        }
        None => timed
            .await
            .unwrap_or_else(|_| Err(SourceError::Timeout(timeout).into())),
    }
}
