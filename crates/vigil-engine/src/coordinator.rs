//! Builds the reader/worker fleet, loads every filter at startup, installs
//! the kernel steering rules, and tears all of it back down on shutdown.

use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use vigil_core::{FilterContext, FirewallError};
use vigil_logger::Logger;

use crate::pipeline::Pipeline;
use crate::queue::KernelQueue;
use crate::reader::{self, ReaderHandle};
use crate::worker;

pub struct QueueCoordinatorConfig {
    /// Number of kernel queues / reader threads.
    pub readers: u16,
    /// Workers consuming each reader's channel.
    pub workers_per_reader: usize,
    pub reader_queue_len: usize,
    pub max_packet_len: u32,
    pub load_timeout: Duration,
}

/// Owns every reader thread and worker task the daemon started, plus the
/// firewall rules steering traffic into them. Dropping this without
/// calling `shutdown` leaves the rules installed — callers must shut down
/// explicitly.
pub struct QueueCoordinator {
    readers: Vec<ReaderHandle>,
    worker_handles: Vec<JoinHandle<()>>,
    queue_nums: Vec<u16>,
}

impl QueueCoordinator {
    /// Loads every filter (fail-fast: the first `load` error aborts
    /// startup), installs the firewall rules, then starts every reader
    /// and its workers.
    pub async fn start(
        pipeline: Arc<Pipeline>,
        logger: Logger,
        http: reqwest::Client,
        config: QueueCoordinatorConfig,
    ) -> Result<Self, FirewallError> {
        let ctx = FilterContext { http, timeout: config.load_timeout };
        for filter in pipeline.all_filters() {
            filter.load(&ctx).await?;
        }

        let queue_nums: Vec<u16> = (0..config.readers).collect();
        install_firewall_rules(&queue_nums)?;

        let mut readers = Vec::with_capacity(queue_nums.len());
        let mut worker_handles = Vec::with_capacity(queue_nums.len() * config.workers_per_reader);

        for &qnum in &queue_nums {
            let queue = KernelQueue::open(qnum, config.reader_queue_len as u32, config.max_packet_len)?;
            let (sender, receiver) = mpsc::channel(config.reader_queue_len);
            let receiver = Arc::new(Mutex::new(receiver));

            for _ in 0..config.workers_per_reader.max(1) {
                let receiver = Arc::clone(&receiver);
                let pipeline = Arc::clone(&pipeline);
                let logger = logger.clone();
                worker_handles.push(tokio::spawn(worker::run(receiver, pipeline, logger)));
            }

            readers.push(reader::spawn(queue, sender, logger.clone()));
        }

        Ok(Self { readers, worker_handles, queue_nums })
    }

    /// Removes the firewall rules, closes every reader (which closes its
    /// channel and drains the worker loops), then joins everything.
    pub async fn shutdown(self) {
        remove_firewall_rules(&self.queue_nums);
        for reader in self.readers {
            reader.join();
        }
        for handle in self.worker_handles {
            let _ = handle.await;
        }
    }
}

/// Steers inbound traffic into queues `0..R-1`, bypassing the queue
/// (rather than dropping) if the daemon isn't running, balanced across
/// queues when more than one is configured.
fn install_firewall_rules(queue_nums: &[u16]) -> Result<(), FirewallError> {
    let Some(&first) = queue_nums.first() else {
        return Ok(());
    };
    let last = queue_nums.last().copied().unwrap_or(first);

    let mut args = vec!["-I".to_string(), "INPUT".to_string(), "-j".to_string(), "NFQUEUE".to_string()];
    if last > first {
        args.push("--queue-balance".to_string());
        args.push(format!("{first}:{last}"));
    } else {
        args.push("--queue-num".to_string());
        args.push(first.to_string());
    }
    args.push("--queue-bypass".to_string());

    run_iptables(&args)
}

fn remove_firewall_rules(queue_nums: &[u16]) {
    let Some(&first) = queue_nums.first() else {
        return;
    };
    let last = queue_nums.last().copied().unwrap_or(first);

    let mut args = vec!["-D".to_string(), "INPUT".to_string(), "-j".to_string(), "NFQUEUE".to_string()];
    if last > first {
        args.push("--queue-balance".to_string());
        args.push(format!("{first}:{last}"));
    } else {
        args.push("--queue-num".to_string());
        args.push(first.to_string());
    }
    args.push("--queue-bypass".to_string());

    let _ = run_iptables(&args);
}

fn run_iptables(args: &[String]) -> Result<(), FirewallError> {
    let status = Command::new("iptables")
        .args(args)
        .status()
        .map_err(|err| FirewallError::QueueOpen { qnum: 0, cause: Box::new(err) })?;
    if !status.success() {
        return Err(FirewallError::QueueOpen {
            qnum: 0,
            cause: Box::new(std::io::Error::other(format!("iptables exited with {status}"))),
        });
    }
    Ok(())
}
