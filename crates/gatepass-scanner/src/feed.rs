//! Single-slot scan feed.
//!
//! The capture side publishes debounced scans; the verify side takes the most
//! recent one. A scan published while the consumer is still busy replaces any
//! scan that was waiting, so nothing queues up behind a slow verification.

use tokio::sync::watch;

/// Create a connected publisher/consumer pair.
pub fn scan_feed() -> (ScanPublisher, ScanConsumer) {
    let (tx, rx) = watch::channel(None);
    (ScanPublisher { tx }, ScanConsumer { rx })
}

#[derive(Debug)]
pub struct ScanPublisher {
    tx: watch::Sender<Option<String>>,
}

impl ScanPublisher {
    /// Make `scan` the pending scan, replacing one not yet taken.
    pub fn publish(&self, scan: String) {
        self.tx.send_replace(Some(scan));
    }

    /// Whether the consumer is still listening.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

#[derive(Debug)]
pub struct ScanConsumer {
    rx: watch::Receiver<Option<String>>,
}

impl ScanConsumer {
    /// Wait for the next pending scan. Returns `None` once the publisher is
    /// gone and nothing is pending.
    pub async fn next(&mut self) -> Option<String> {
        loop {
            // Still `Ok` while an unseen scan is pending, even after close.
            self.rx.changed().await.ok()?;
            if let Some(scan) = self.rx.borrow_and_update().clone() {
                return Some(scan);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_published_scan() {
        let (tx, mut rx) = scan_feed();
        tx.publish("A".into());
        assert_eq!(rx.next().await.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn keeps_only_latest() {
        let (tx, mut rx) = scan_feed();
        tx.publish("A".into());
        tx.publish("B".into());
        tx.publish("C".into());
        assert_eq!(rx.next().await.as_deref(), Some("C"));

        tx.publish("D".into());
        assert_eq!(rx.next().await.as_deref(), Some("D"));
    }

    #[tokio::test]
    async fn publisher_sees_consumer_drop() {
        let (tx, rx) = scan_feed();
        assert!(tx.is_open());
        drop(rx);
        assert!(!tx.is_open());
    }

    #[tokio::test]
    async fn ends_when_publisher_dropped() {
        let (tx, mut rx) = scan_feed();
        drop(tx);
        assert!(rx.next().await.is_none());
    }

    #[tokio::test]
    async fn pending_scan_survives_publisher_drop() {
        let (tx, mut rx) = scan_feed();
        tx.publish("A".into());
        drop(tx);
        assert_eq!(rx.next().await.as_deref(), Some("A"));
        assert!(rx.next().await.is_none());
    }
}
