//! Capture and submit loops of a scanning station.

use std::future::Future;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::Instant;
use tracing::debug;

use crate::debounce::ScanDebouncer;
use crate::feed::{ScanConsumer, ScanPublisher};

/// Read decoded strings line by line, debounce them, and publish survivors.
///
/// Returns how many scans were published once the input ends or the consumer
/// goes away.
pub async fn capture<R>(
    input: R,
    mut debouncer: ScanDebouncer,
    publisher: ScanPublisher,
) -> std::io::Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut published = 0;

    while let Some(line) = lines.next_line().await? {
        if !publisher.is_open() {
            break;
        }
        match debouncer.offer(&line, Instant::now().into_std()) {
            Some(scan) => {
                publisher.publish(scan);
                published += 1;
            }
            None => debug!(len = line.len(), "Decode suppressed"),
        }
    }

    Ok(published)
}

/// Hand each pending scan to `submit`, one at a time, until the feed ends.
pub async fn submit_all<F, Fut>(mut consumer: ScanConsumer, mut submit: F) -> u64
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut submitted = 0;
    while let Some(scan) = consumer.next().await {
        submit(scan).await;
        submitted += 1;
    }
    submitted
}
