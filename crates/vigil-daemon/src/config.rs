//! CLI configuration, matching the option table in the external
//! interfaces design one flag per row. `USERNAME`/`PASSWORD` are read
//! separately by `vigil_control::Credentials::from_env`, not through
//! here, since they are secrets rather than tuning knobs.

use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "vigild", about = "Host-resident NFQUEUE packet firewall")]
pub struct Args {
    /// Zerolog-compatible level name; anything unrecognized falls back to debug.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Path to the SQLite persistence file for admin-managed lists.
    #[arg(long, default_value = "vigil.sqlite3")]
    pub db_path: String,

    /// Control-plane HTTP listen address.
    #[arg(long, default_value = "0.0.0.0:8443")]
    pub api_addr: String,

    /// Number of kernel queues and reader threads. Defaults to available parallelism.
    #[arg(long)]
    pub readers_count: Option<u16>,

    /// Worker tasks consuming each reader's channel.
    #[arg(long, default_value_t = 1)]
    pub workers_count: usize,

    /// Logger consumer tasks draining the event channel.
    #[arg(long, default_value_t = 2)]
    pub loggers_count: usize,

    /// Per-reader attribute channel depth.
    #[arg(long, default_value_t = 4096)]
    pub reader_queue_len: usize,

    /// Log event channel depth.
    #[arg(long, default_value_t = 4096)]
    pub logger_queue_len: usize,

    /// Per-filter update deadline, in seconds.
    #[arg(long, default_value_t = 10)]
    pub update_timeout_secs: u64,

    /// Seconds between full feed refresh cycles.
    #[arg(long, default_value_t = 300)]
    pub update_interval_secs: u64,

    /// Rate limiter tokens per second, per source IP.
    #[arg(long, default_value_t = 100.0)]
    pub rate_limiter_rate: f64,

    /// Rate limiter burst cap.
    #[arg(long, default_value_t = 100.0)]
    pub rate_limiter_burst: f64,

    /// Maximum number of distinct source-IP buckets tracked at once.
    #[arg(long, default_value_t = 100_000)]
    pub rate_limiter_cache_size: usize,

    /// Idle seconds before an unused rate-limiter bucket is evicted.
    #[arg(long, default_value_t = 300)]
    pub rate_limiter_cache_ttl_secs: u64,

    /// Maximum bytes of each packet the kernel copies into userspace.
    #[arg(long, default_value_t = 65535)]
    pub max_packet_len: u32,
}

impl Args {
    pub fn readers_count(&self) -> u16 {
        self.readers_count.unwrap_or_else(|| {
            std::thread::available_parallelism().map(|n| n.get() as u16).unwrap_or(1)
        })
    }

    pub fn update_timeout(&self) -> Duration {
        Duration::from_secs(self.update_timeout_secs)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    pub fn rate_limiter_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.rate_limiter_cache_ttl_secs)
    }
}
