//! Deferred deletion of saved files after a retention window.
//!
//! One background task owns a time-ordered expiry index
//! (`tokio_util::time::DelayQueue`) keyed by next-check time, so N
//! outstanding files cost N queue entries rather than N suspended tasks.
//! When an entry expires the file's mtime decides: stale files are deleted,
//! recently touched files are re-armed at `mtime + window`. Edits therefore
//! extend a file's life indefinitely, and a file is never deleted while its
//! last modification is younger than the window.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::time::DelayQueue;

#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    tx: mpsc::UnboundedSender<PathBuf>,
}

impl RetentionSweeper {
    /// Spawn the sweeper task. Dropping every handle stops the task once
    /// its queue has drained.
    pub fn spawn(window: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(sweep_loop(rx, window));
        Self { tx }
    }

    /// Register a file for a retention check one window from now.
    /// Scheduling the same path twice produces two independent entries;
    /// both resolve correctly since each re-checks the mtime on expiry.
    pub fn schedule(&self, path: PathBuf) {
        if self.tx.send(path).is_err() {
            log::warn!("Retention sweeper task is gone; file will not be swept");
        }
    }
}

async fn sweep_loop(mut rx: mpsc::UnboundedReceiver<PathBuf>, window: Duration) {
    let mut queue: DelayQueue<PathBuf> = DelayQueue::new();
    let mut closed = false;

    loop {
        tokio::select! {
            incoming = rx.recv(), if !closed => {
                match incoming {
                    Some(path) => {
                        log::debug!("Retention check scheduled for {}", path.display());
                        queue.insert(path, window);
                    }
                    None => closed = true,
                }
            }
            Some(expired) = queue.next() => {
                check_one(&mut queue, expired.into_inner(), window).await;
            }
            else => break,
        }
        if closed && queue.is_empty() {
            break;
        }
    }
}

async fn check_one(queue: &mut DelayQueue<PathBuf>, path: PathBuf, window: Duration) {
    let mtime = match tokio::fs::metadata(&path).await.and_then(|m| m.modified()) {
        Ok(mtime) => mtime,
        // Already gone (or unreadable): drop it from the index.
        Err(e) => {
            log::debug!("Dropping {} from retention index: {}", path.display(), e);
            return;
        }
    };

    let elapsed = SystemTime::now()
        .duration_since(mtime)
        .unwrap_or(Duration::ZERO);

    if elapsed >= window {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => log::info!("Retention window elapsed, deleted {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to delete expired {}: {}", path.display(), e),
        }
    } else {
        // Touched since it was scheduled: the window restarts relative to
        // the current mtime, so the next check lands at mtime + window.
        queue.insert(path, window - elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn stale_file_is_deleted_after_the_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.json");
        std::fs::write(&path, b"{}").unwrap();

        let sweeper = RetentionSweeper::spawn(Duration::from_millis(100));
        sweeper.schedule(path.clone());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn recently_touched_file_survives_the_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("active.json");
        std::fs::write(&path, b"{}").unwrap();

        let sweeper = RetentionSweeper::spawn(Duration::from_millis(300));
        sweeper.schedule(path.clone());

        // Touch the file mid-window; the sweep at t=300ms must re-arm
        // instead of deleting.
        tokio::time::sleep(Duration::from_millis(200)).await;
        std::fs::write(&path, b"{\"touched\":true}").unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(path.exists());

        // Untouched from here on, the re-armed check deletes it.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn vanished_file_is_dropped_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.json");
        std::fs::write(&path, b"{}").unwrap();

        let sweeper = RetentionSweeper::spawn(Duration::from_millis(100));
        sweeper.schedule(path.clone());
        std::fs::remove_file(&path).unwrap();

        // Nothing to assert beyond the task not panicking.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!path.exists());
    }
}
