//! One dedicated OS thread per bound queue, feeding a bounded async
//! channel. `nfq::Queue::recv` blocks the calling thread on a raw socket
//! read, so this runs on `std::thread` rather than an async task — the
//! kernel-owned thread the component design describes.

use tokio::sync::mpsc;

use vigil_logger::{LogEvent, Logger};

use crate::queue::KernelQueue;

/// One received message plus the queue it came from, so the worker that
/// eventually handles it can write the verdict back to the right place.
pub struct WorkItem {
    pub message: nfq::Message,
    pub queue: KernelQueue,
}

pub struct ReaderHandle {
    join: std::thread::JoinHandle<()>,
}

impl ReaderHandle {
    pub fn join(self) {
        let _ = self.join.join();
    }
}

/// Spawns the reader thread. On a full channel this issues an immediate
/// ACCEPT for the packet right here rather than blocking — fail-open is
/// non-negotiable since blocking would stall the kernel queue.
pub fn spawn(queue: KernelQueue, sender: mpsc::Sender<WorkItem>, logger: Logger) -> ReaderHandle {
    let join = std::thread::spawn(move || loop {
        let message = match queue.recv_blocking() {
            Ok(message) => message,
            Err(err) => {
                logger.log(LogEvent::Error { message: err.to_string() });
                continue;
            }
        };

        let item = WorkItem { message, queue: queue.clone() };
        match sender.try_send(item) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(item)) => {
                metrics::counter!("reader_overflow_total").increment(1);
                logger.log(LogEvent::RawMessage {
                    level: "warn",
                    message: format!("reader channel full for queue {}, accepting fail-open", queue.qnum()),
                });
                if let Err(err) = queue.verdict_blocking(item.message, nfq::Verdict::Accept) {
                    logger.log(LogEvent::Error { message: err.to_string() });
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => break,
        }
    });

    ReaderHandle { join }
}
