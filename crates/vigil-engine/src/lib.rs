//! Wires the filter pipeline to a real kernel queue: readers pull raw
//! attributes off NFQUEUE, workers classify them, a feed refresher keeps
//! feed-backed filters current, and the coordinator owns startup/shutdown.

pub mod coordinator;
pub mod pipeline;
pub mod queue;
pub mod reader;
pub mod refresher;
pub mod worker;

pub use coordinator::{QueueCoordinator, QueueCoordinatorConfig};
pub use pipeline::{Pipeline, Verdict};
pub use queue::KernelQueue;
pub use reader::{ReaderHandle, WorkItem};
pub use refresher::FeedRefresher;
