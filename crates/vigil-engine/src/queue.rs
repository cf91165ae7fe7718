//! Thin adapter around the `nfq` crate, kept narrow and in one place so
//! any inaccuracy in the exact blocking API is contained here rather than
//! spread across the reader/worker.

use std::sync::{Arc, Mutex};

use nfq::{Queue, Verdict};
use vigil_core::FirewallError;

/// One bound NFQUEUE handle, shared between the reader that drains it and
/// every worker that eventually writes a verdict back for a message it
/// received. Cloning is a cheap `Arc` bump; the underlying queue is
/// serialized behind a blocking mutex since `nfq::Queue` is not `Sync`.
#[derive(Clone)]
pub struct KernelQueue {
    qnum: u16,
    inner: Arc<Mutex<Queue>>,
}

impl KernelQueue {
    /// Opens and binds queue `qnum`, configuring full-packet copy mode up
    /// to `max_packet_len` bytes and a kernel-side backlog of
    /// `max_queue_len`. Any failure here is fatal at startup.
    pub fn open(qnum: u16, max_queue_len: u32, max_packet_len: u32) -> Result<Self, FirewallError> {
        let mut queue = Queue::open().map_err(|err| FirewallError::QueueOpen {
            qnum,
            cause: Box::new(err),
        })?;
        queue.bind(qnum).map_err(|err| FirewallError::QueueOpen {
            qnum,
            cause: Box::new(err),
        })?;
        let _ = queue.set_queue_max_len(qnum, max_queue_len);
        let _ = queue.set_copy_range(qnum, max_packet_len);
        Ok(Self {
            qnum,
            inner: Arc::new(Mutex::new(queue)),
        })
    }

    pub fn qnum(&self) -> u16 {
        self.qnum
    }

    /// Blocks the calling thread until a message arrives. Callers must run
    /// this on a dedicated blocking thread, never on an async task.
    pub fn recv_blocking(&self) -> Result<nfq::Message, FirewallError> {
        let mut guard = self.inner.lock().expect("kernel queue mutex poisoned");
        guard.recv().map_err(|err| FirewallError::QueueOpen {
            qnum: self.qnum,
            cause: Box::new(err),
        })
    }

    /// Writes back exactly one verdict for a message this queue produced.
    pub fn verdict_blocking(&self, mut message: nfq::Message, verdict: Verdict) -> Result<(), FirewallError> {
        message.set_verdict(verdict);
        let mut guard = self.inner.lock().expect("kernel queue mutex poisoned");
        guard.verdict(message).map_err(|err| FirewallError::QueueOpen {
            qnum: self.qnum,
            cause: Box::new(err),
        })
    }
}
