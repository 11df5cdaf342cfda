//! Cooperative cancellation shared by the key watcher and the time sender.
//!
//! The token is a one-way latch: it starts clear, is set at most once in
//! effect, and is never reset. Either side may set it; both poll it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Cloneable handle to a shared cancellation latch.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the latch. Returns `true` if this call was the one that set it.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("terminal error: {0}")]
    Terminal(#[from] std::io::Error),
}

/// Something that can ask the sender to stop, e.g. a key on the keyboard.
pub trait CancellationSource: Send + 'static {
    /// Wait at most `timeout` and report whether cancellation was requested.
    fn poll(&mut self, timeout: Duration) -> Result<bool, WatcherError>;

    fn describe(&self) -> String;
}

/// Why the watcher stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The source fired and the watcher set the latch.
    Requested,
    /// The latch was already set by someone else.
    AlreadyCancelled,
}

/// Poll `source` until it fires or the token is cancelled elsewhere.
///
/// A source error also sets the latch, so the sender never outlives a dead watcher.
pub fn watch<S: CancellationSource>(
    mut source: S,
    token: &CancellationToken,
    interval: Duration,
) -> Result<WatchOutcome, WatcherError> {
    while !token.is_cancelled() {
        match source.poll(interval) {
            Ok(true) => {
                tracing::info!("Cancellation requested via {}", source.describe());
                token.cancel();
                return Ok(WatchOutcome::Requested);
            }
            Ok(false) => {}
            Err(e) => {
                token.cancel();
                return Err(e);
            }
        }
    }
    Ok(WatchOutcome::AlreadyCancelled)
}

/// Run [`watch`] on the blocking thread pool.
pub fn spawn_watcher<S: CancellationSource>(
    source: S,
    token: CancellationToken,
    interval: Duration,
) -> JoinHandle<Result<WatchOutcome, WatcherError>> {
    tokio::task::spawn_blocking(move || watch(source, &token, interval))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fires after a fixed number of polls.
    struct Countdown(u32);

    impl CancellationSource for Countdown {
        fn poll(&mut self, _timeout: Duration) -> Result<bool, WatcherError> {
            if self.0 == 0 {
                return Ok(true);
            }
            self.0 -= 1;
            Ok(false)
        }

        fn describe(&self) -> String {
            "countdown".to_string()
        }
    }

    struct Broken;

    impl CancellationSource for Broken {
        fn poll(&mut self, _timeout: Duration) -> Result<bool, WatcherError> {
            Err(std::io::Error::other("no terminal").into())
        }

        fn describe(&self) -> String {
            "broken".to_string()
        }
    }

    #[test]
    fn test_latch_is_one_way() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(!token.is_cancelled());
        assert!(other.cancel());
        assert!(token.is_cancelled());
        assert!(!token.cancel());
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_watch_sets_latch_when_source_fires() {
        let token = CancellationToken::new();
        let outcome = watch(Countdown(3), &token, Duration::ZERO).unwrap();
        assert_eq!(outcome, WatchOutcome::Requested);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_watch_returns_when_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let outcome = watch(Countdown(u32::MAX), &token, Duration::ZERO).unwrap();
        assert_eq!(outcome, WatchOutcome::AlreadyCancelled);
    }

    #[test]
    fn test_watch_error_sets_latch() {
        let token = CancellationToken::new();
        let result = watch(Broken, &token, Duration::ZERO);
        assert!(matches!(result, Err(WatcherError::Terminal(_))));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_spawned_watcher_stops_on_external_cancel() {
        let token = CancellationToken::new();
        let handle = spawn_watcher(Countdown(u32::MAX), token.clone(), Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome, WatchOutcome::AlreadyCancelled);
    }
}
