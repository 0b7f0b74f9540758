//! One-shot completion signal between a record and the dispatcher slot
//! waiting on it.
//!
//! Publishing never blocks. A publish after the waiter timed out or went
//! away is a no-op, and a waiter whose record was discarded wakes up
//! immediately instead of sitting out its timeout.

use std::time::Duration;

use tokio::sync::oneshot;

/// Why a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Completed,
    TimedOut,
    /// The record was dropped (session cleared or superseded).
    Abandoned,
}

pub fn completion_channel() -> (CompletionNotifier, CompletionWaiter) {
    let (tx, rx) = oneshot::channel();
    (
        CompletionNotifier { tx: Some(tx) },
        CompletionWaiter { rx },
    )
}

#[derive(Debug)]
pub struct CompletionNotifier {
    tx: Option<oneshot::Sender<()>>,
}

impl CompletionNotifier {
    /// Returns `false` when nobody was left to receive the signal.
    pub fn notify(&mut self) -> bool {
        match self.tx.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

#[derive(Debug)]
pub struct CompletionWaiter {
    rx: oneshot::Receiver<()>,
}

impl CompletionWaiter {
    pub async fn wait(self, timeout: Duration) -> WaitOutcome {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(())) => WaitOutcome::Completed,
            Ok(Err(_)) => WaitOutcome::Abandoned,
            Err(_) => WaitOutcome::TimedOut,
        }
    }
}
