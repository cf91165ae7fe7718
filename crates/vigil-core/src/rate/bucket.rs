use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

use crate::time::Clock;

const SCALE: f64 = 1_000_000.0;

/// Lock-free token bucket. Refill and decrement each use one CAS on a
/// separate atomic; there is no single lock guarding both, so under
/// contention a lost refill CAS simply skips one refill cycle rather than
/// blocking a thread. Tokens are tracked in micro-token units so fractional
/// refill amounts survive the integer atomics.
pub struct TokenBucket {
    epoch: Instant,
    last_update_ns: AtomicU64,
    balance_micros: AtomicI64,
}

impl TokenBucket {
    pub fn new(clock: &dyn Clock, burst: f64) -> Self {
        Self {
            epoch: clock.now(),
            last_update_ns: AtomicU64::new(0),
            balance_micros: AtomicI64::new((burst * SCALE) as i64),
        }
    }

    /// Refills based on elapsed time since the last successful refill, then
    /// attempts to spend one token. Returns `true` (accept) if a token was
    /// available, `false` (refuse) otherwise.
    pub fn allow(&self, clock: &dyn Clock, rate: f64, burst: f64) -> bool {
        let now_ns = clock.now().duration_since(self.epoch).as_nanos() as u64;
        self.refill(now_ns, rate, burst);

        let one_token = SCALE as i64;
        let after = self.balance_micros.fetch_sub(one_token, Ordering::AcqRel) - one_token;
        if after < 0 {
            self.balance_micros.fetch_add(one_token, Ordering::AcqRel);
            false
        } else {
            true
        }
    }

    fn refill(&self, now_ns: u64, rate: f64, burst: f64) {
        let last = self.last_update_ns.load(Ordering::Acquire);
        let elapsed_ns = now_ns.saturating_sub(last);
        if elapsed_ns == 0 {
            return;
        }

        let add_micros = (elapsed_ns as f64 * rate / 1e9 * SCALE) as i64;
        if add_micros <= 0 {
            return;
        }

        // Conserve whatever fractional nanosecond of refill time `add_micros`
        // does not account for, instead of snapping last_update to `now_ns`.
        let advance_ns = (add_micros as f64 / SCALE * 1e9 / rate) as u64;
        let new_last = last.saturating_add(advance_ns);

        if self
            .last_update_ns
            .compare_exchange(last, new_last, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let burst_micros = (burst * SCALE) as i64;
            let _ = self.balance_micros.fetch_update(
                Ordering::AcqRel,
                Ordering::Acquire,
                |bal| Some((bal + add_micros).min(burst_micros)),
            );
        }
        // A lost CAS means a concurrent caller already claimed this refill
        // window; skipping it here is the intended lock-free trade-off.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::MockClock;
    use std::time::Duration;

    #[test]
    fn burst_tokens_are_immediately_available() {
        let clock = MockClock::new();
        let bucket = TokenBucket::new(&clock, 3.0);
        assert!(bucket.allow(&clock, 1.0, 3.0));
        assert!(bucket.allow(&clock, 1.0, 3.0));
        assert!(bucket.allow(&clock, 1.0, 3.0));
        assert!(!bucket.allow(&clock, 1.0, 3.0));
    }

    #[test]
    fn refill_over_time_restores_tokens() {
        let clock = MockClock::new();
        let bucket = TokenBucket::new(&clock, 1.0);
        assert!(bucket.allow(&clock, 1.0, 1.0));
        assert!(!bucket.allow(&clock, 1.0, 1.0));

        clock.advance(Duration::from_secs(1));
        assert!(bucket.allow(&clock, 1.0, 1.0));
    }

    #[test]
    fn refill_never_exceeds_burst() {
        let clock = MockClock::new();
        let bucket = TokenBucket::new(&clock, 2.0);
        clock.advance(Duration::from_secs(100));
        assert!(bucket.allow(&clock, 1.0, 2.0));
        assert!(bucket.allow(&clock, 1.0, 2.0));
        assert!(!bucket.allow(&clock, 1.0, 2.0));
    }
}
