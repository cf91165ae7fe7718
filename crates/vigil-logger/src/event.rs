use std::net::Ipv4Addr;

use tracing::Level;
use vigil_core::FilterKind;

/// One classification outcome or out-of-band occurrence, captured as an
/// owned, `'static` value so it can cross the bounded channel to a
/// consumer task. Fields are copied out of the packet view at the point of
/// decision rather than borrowed, since the view itself does not outlive
/// the worker that produced it.
#[derive(Clone, Debug)]
pub enum LogEvent {
    Accept {
        src_ip: Ipv4Addr,
        kind: FilterKind,
        reason: &'static str,
    },
    Drop {
        src_ip: Ipv4Addr,
        kind: FilterKind,
        reason: &'static str,
    },
    /// A connection-mark fast path accepted a packet without running the
    /// pipeline at all.
    Trust {
        src_ip: Ipv4Addr,
    },
    Error {
        message: String,
    },
    /// Overflow and similar operational notices that don't fit the
    /// accept/drop/trust/error shape.
    RawMessage {
        level: &'static str,
        message: String,
    },
}

impl LogEvent {
    pub fn level(&self) -> Level {
        match self {
            LogEvent::Accept { .. } | LogEvent::Trust { .. } => Level::DEBUG,
            LogEvent::Drop { .. } => Level::INFO,
            LogEvent::Error { .. } => Level::ERROR,
            LogEvent::RawMessage { level, .. } => parse_level(level),
        }
    }

    /// Emits one `tracing` event describing this outcome and updates the
    /// corresponding metrics counters. Called by a logger consumer task,
    /// never on the packet hot path.
    pub fn render(&self) {
        match self {
            LogEvent::Accept { src_ip, kind, reason } => {
                tracing::debug!(%src_ip, kind = kind.as_str(), reason = *reason, "accept");
                metrics::counter!(
                    "packets_by_verdict",
                    "action" => "accept",
                    "reason" => *reason,
                    "filter" => kind.as_str(),
                )
                .increment(1);
            }
            LogEvent::Drop { src_ip, kind, reason } => {
                tracing::info!(%src_ip, kind = kind.as_str(), reason = *reason, "drop");
                metrics::counter!(
                    "packets_by_verdict",
                    "action" => "drop",
                    "reason" => *reason,
                    "filter" => kind.as_str(),
                )
                .increment(1);
            }
            LogEvent::Trust { src_ip } => {
                tracing::debug!(%src_ip, "trust");
                metrics::counter!(
                    "packets_by_verdict",
                    "action" => "trust",
                    "reason" => "connection-mark",
                    "filter" => "meta",
                )
                .increment(1);
            }
            LogEvent::Error { message } => {
                tracing::error!(%message, "error");
                metrics::counter!("errors_total").increment(1);
            }
            LogEvent::RawMessage { level, message } => match parse_level(level) {
                Level::ERROR => tracing::error!(%message),
                Level::WARN => tracing::warn!(%message),
                Level::INFO => tracing::info!(%message),
                Level::TRACE => tracing::trace!(%message),
                _ => tracing::debug!(%message),
            },
        }
        metrics::counter!("packets_total").increment(1);
    }
}

/// Parses a free-form level string, defaulting to `DEBUG` on anything
/// unrecognized rather than rejecting the event.
pub fn parse_level(raw: &str) -> Level {
    raw.parse().unwrap_or(Level::DEBUG)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_level_string_falls_back_to_debug() {
        assert_eq!(parse_level("not-a-level"), Level::DEBUG);
        assert_eq!(parse_level("warn"), Level::WARN);
    }

    #[test]
    fn accept_and_drop_use_distinct_default_levels() {
        let accept = LogEvent::Accept {
            src_ip: Ipv4Addr::new(1, 2, 3, 4),
            kind: FilterKind::Ip,
            reason: "allow-list",
        };
        let drop = LogEvent::Drop {
            src_ip: Ipv4Addr::new(1, 2, 3, 4),
            kind: FilterKind::Ip,
            reason: "deny-list",
        };
        assert_eq!(accept.level(), Level::DEBUG);
        assert_eq!(drop.level(), Level::INFO);
    }
}
