//! Drains a reader's channel and applies the pipeline. Several workers
//! may share one reader, each holding the same `Arc<Mutex<Receiver>>` —
//! the same fan-out shape `vigil-logger` uses for its consumer pool —
//! so each attribute is still handled by exactly one worker.

use std::net::Ipv4Addr;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use vigil_core::{FilterKind, PacketView};
use vigil_logger::{LogEvent, Logger};

use crate::pipeline::Pipeline;
use crate::reader::WorkItem;

/// Runs until the shared channel is closed and drained.
pub async fn run(receiver: Arc<Mutex<mpsc::Receiver<WorkItem>>>, pipeline: Arc<Pipeline>, logger: Logger) {
    loop {
        let item = {
            let mut guard = receiver.lock().await;
            guard.recv().await
        };
        match item {
            Some(item) => handle_one(item, &pipeline, &logger).await,
            None => break,
        }
    }
}

/// Decodes `payload` and runs the pipeline, without touching the kernel
/// queue or the logger. Pulled out of `handle_one` so the fail-open paths
/// (empty payload, undecodable bytes) are directly testable: neither one
/// ever reaches `Pipeline::evaluate`.
pub(crate) fn decide(payload: &[u8], pipeline: &Pipeline) -> (bool, Ipv4Addr, FilterKind, &'static str) {
    if payload.is_empty() {
        return (true, Ipv4Addr::UNSPECIFIED, FilterKind::Meta, "empty-payload");
    }
    match PacketView::new(payload) {
        Ok(view) => {
            let verdict = pipeline.evaluate(&view);
            (verdict.accept, view.src_ip(), verdict.kind, verdict.reason)
        }
        Err(_) => (true, Ipv4Addr::UNSPECIFIED, FilterKind::Meta, "decode-failed"),
    }
}

/// Handles one attribute end to end: empty-payload and decode-failure are
/// fail-open by construction (`PacketView::new` only succeeds once the
/// outer IPv4 header parses), otherwise the pipeline decides. Every path
/// issues exactly one verdict — a missing verdict times out the packet
/// kernel-side.
async fn handle_one(item: WorkItem, pipeline: &Pipeline, logger: &Logger) {
    let WorkItem { message, queue } = item;
    let (accept, src_ip, kind, reason) = decide(message.get_payload(), pipeline);

    if accept {
        logger.log(LogEvent::Accept { src_ip, kind, reason });
    } else {
        logger.log(LogEvent::Drop { src_ip, kind, reason });
    }

    let nfq_verdict = if accept { nfq::Verdict::Accept } else { nfq::Verdict::Drop };
    let issue = tokio::task::spawn_blocking(move || queue.verdict_blocking(message, nfq_verdict)).await;
    if !matches!(issue, Ok(Ok(()))) {
        metrics::counter!("verdict_issue_total").increment(1);
    }
}
