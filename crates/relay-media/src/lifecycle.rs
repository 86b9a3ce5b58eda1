//! Session-wide cancellation signal
//!
//! One [`Lifecycle`] exists per relay session. Every task spawned for the
//! session holds a [`LifecycleToken`] and selects on [`LifecycleToken::cancelled`]
//! at each of its blocking points. Dropping the `Lifecycle` counts as a cancel.

use tokio::sync::watch;

#[derive(Debug)]
pub struct Lifecycle {
    tx: watch::Sender<bool>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Cancel the session. Returns `true` only for the call that flipped the flag.
    pub fn cancel(&self) -> bool {
        self.tx.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        })
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn token(&self) -> LifecycleToken {
        LifecycleToken {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct LifecycleToken {
    rx: watch::Receiver<bool>,
}

impl LifecycleToken {
    /// Resolves once the session is cancelled or its `Lifecycle` is gone
    pub async fn cancelled(&mut self) {
        let _ = self.rx.wait_for(|cancelled| *cancelled).await;
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_wakes_every_token() {
        let lifecycle = Lifecycle::new();
        let mut first = lifecycle.token();
        let mut second = first.clone();

        assert!(!first.is_cancelled());
        assert!(lifecycle.cancel());
        assert!(!lifecycle.cancel());

        tokio::time::timeout(Duration::from_secs(1), first.cancelled())
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(1), second.cancelled())
            .await
            .unwrap();
        assert!(second.is_cancelled());
    }

    #[tokio::test]
    async fn test_dropping_lifecycle_cancels() {
        let lifecycle = Lifecycle::new();
        let mut token = lifecycle.token();
        drop(lifecycle);

        tokio::time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .unwrap();
        assert!(token.is_cancelled());
    }
}
