//! Non-blocking log-event pipeline: a bounded channel fed by `try_send` from
//! the packet hot path, drained by a fixed pool of consumer tasks that
//! render each event against `tracing` and `metrics`.

mod event;

pub use event::{parse_level, LogEvent};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Handle for submitting events. Cloning is cheap (an `mpsc::Sender`
/// clone); every worker task holds one.
#[derive(Clone)]
pub struct Logger {
    sender: mpsc::Sender<LogEvent>,
    dropped: Arc<AtomicU64>,
}

impl Logger {
    /// Spawns `consumers` tasks draining a channel of depth `queue_len`.
    /// Returns the handle plus the consumers' join handles so callers can
    /// await clean shutdown after dropping every `Logger` clone.
    pub fn spawn(queue_len: usize, consumers: usize) -> (Self, Vec<JoinHandle<()>>) {
        let (sender, receiver) = mpsc::channel(queue_len);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let dropped = Arc::new(AtomicU64::new(0));

        let handles = (0..consumers.max(1))
            .map(|_| {
                let receiver = Arc::clone(&receiver);
                tokio::spawn(async move {
                    loop {
                        let event = {
                            let mut guard = receiver.lock().await;
                            guard.recv().await
                        };
                        match event {
                            Some(event) => event.render(),
                            None => break,
                        }
                    }
                })
            })
            .collect();

        (Logger { sender, dropped }, handles)
    }

    /// Non-blocking submit. On a full channel the event is dropped and
    /// counted rather than backing up the caller — workers must never
    /// block on logging.
    pub fn log(&self, event: LogEvent) {
        if self.sender.try_send(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("logger_dropped_total").increment(1);
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use vigil_core::FilterKind;

    #[tokio::test]
    async fn full_channel_drops_and_counts_instead_of_blocking() {
        let (logger, handles) = Logger::spawn(1, 1);
        // The current-thread test runtime only polls the spawned consumer
        // at an await point; these two synchronous sends run back-to-back
        // first, so the channel fills and the second is dropped.
        logger.log(LogEvent::Trust { src_ip: Ipv4Addr::new(1, 1, 1, 1) });
        logger.log(LogEvent::Trust { src_ip: Ipv4Addr::new(2, 2, 2, 2) });
        assert_eq!(logger.dropped_count(), 1);
        drop(logger);
        for handle in handles {
            handle.abort();
        }
    }

    #[tokio::test]
    async fn consumer_drains_events_without_dropping() {
        let (logger, handles) = Logger::spawn(8, 1);
        for _ in 0..4 {
            logger.log(LogEvent::Accept {
                src_ip: Ipv4Addr::new(1, 2, 3, 4),
                kind: FilterKind::Ip,
                reason: "allow-list",
            });
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(logger.dropped_count(), 0);
        drop(logger);
        for handle in handles {
            handle.abort();
        }
    }
}
