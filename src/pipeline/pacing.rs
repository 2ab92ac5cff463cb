//! Inter-request pacing.
//!
//! One `Pacer` per page. Shards never share a pacer, so each browsing
//! context keeps its own rhythm.

use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use crate::models::PacingPolicy;

/// Applies a `PacingPolicy` between detail fetches.
#[derive(Debug)]
pub struct Pacer {
    mode: Mode,
}

#[derive(Debug)]
enum Mode {
    None,
    Fixed(Duration),
    Jittered { base: Duration, jitter_ms: u64 },
    Bucket(TokenBucket),
}

impl Pacer {
    pub fn new(policy: &PacingPolicy) -> Self {
        let mode = match *policy {
            PacingPolicy::None => Mode::None,
            PacingPolicy::Fixed { delay_ms } => Mode::Fixed(Duration::from_millis(delay_ms)),
            PacingPolicy::Jittered { base_ms, jitter_ms } => Mode::Jittered {
                base: Duration::from_millis(base_ms),
                jitter_ms,
            },
            PacingPolicy::RateLimited { per_minute, burst } => {
                Mode::Bucket(TokenBucket::new(per_minute, burst))
            }
        };
        Self { mode }
    }

    /// Wait as long as the policy asks for.
    pub async fn pause(&mut self) {
        let delay = match &mut self.mode {
            Mode::None => Duration::ZERO,
            Mode::Fixed(delay) => *delay,
            Mode::Jittered { base, jitter_ms } => {
                let extra = if *jitter_ms == 0 {
                    0
                } else {
                    rand::rng().random_range(0..=*jitter_ms)
                };
                *base + Duration::from_millis(extra)
            }
            Mode::Bucket(bucket) => bucket.acquire(Instant::now()),
        };

        if !delay.is_zero() {
            log::debug!("Pacing for {}ms", delay.as_millis());
            tokio::time::sleep(delay).await;
        }
    }
}

/// Token bucket holding up to `capacity` tokens, refilled continuously.
#[derive(Debug)]
struct TokenBucket {
    capacity: f64,
    tokens: f64,
    per_sec: f64,
    last: Option<Instant>,
}

impl TokenBucket {
    fn new(per_minute: u32, burst: u32) -> Self {
        let capacity = f64::from(burst.max(1));
        Self {
            capacity,
            tokens: capacity,
            per_sec: f64::from(per_minute.max(1)) / 60.0,
            last: None,
        }
    }

    /// Take one token at `now`; returns how long to wait before it is usable.
    fn acquire(&mut self, now: Instant) -> Duration {
        if let Some(last) = self.last {
            let elapsed = now.saturating_duration_since(last).as_secs_f64();
            self.tokens = (self.tokens + elapsed * self.per_sec).min(self.capacity);
        }

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            self.last = Some(now);
            return Duration::ZERO;
        }

        let wait = Duration::from_secs_f64((1.0 - self.tokens) / self.per_sec);
        // The token earned while waiting is spent immediately.
        self.tokens = 0.0;
        self.last = Some(now + wait);
        wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_waited(start: Instant, expected: Duration) {
        let elapsed = start.elapsed();
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(5),
            "waited {elapsed:?}, expected {expected:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay() {
        let mut pacer = Pacer::new(&PacingPolicy::Fixed { delay_ms: 1200 });
        let start = Instant::now();
        pacer.pause().await;
        assert_waited(start, Duration::from_millis(1200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_none_does_not_wait() {
        let mut pacer = Pacer::new(&PacingPolicy::None);
        let start = Instant::now();
        pacer.pause().await;
        pacer.pause().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_jitter_stays_in_range() {
        let mut pacer = Pacer::new(&PacingPolicy::Jittered {
            base_ms: 500,
            jitter_ms: 250,
        });
        for _ in 0..10 {
            let start = Instant::now();
            pacer.pause().await;
            let elapsed = start.elapsed();
            assert!(elapsed >= Duration::from_millis(500));
            assert!(elapsed < Duration::from_millis(755));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_allows_burst_then_waits() {
        let mut pacer = Pacer::new(&PacingPolicy::RateLimited {
            per_minute: 60,
            burst: 2,
        });
        let start = Instant::now();
        pacer.pause().await;
        pacer.pause().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        pacer.pause().await;
        assert_waited(start, Duration::from_secs(1));
        pacer.pause().await;
        assert_waited(start, Duration::from_secs(2));
    }

    #[test]
    fn test_bucket_refills_to_capacity() {
        let start = Instant::now();
        let mut bucket = TokenBucket::new(60, 3);
        for _ in 0..3 {
            assert_eq!(bucket.acquire(start), Duration::ZERO);
        }
        // A long idle period never banks more than `burst` tokens.
        let later = start + Duration::from_secs(600);
        for _ in 0..3 {
            assert_eq!(bucket.acquire(later), Duration::ZERO);
        }
        assert_eq!(bucket.acquire(later), Duration::from_secs(1));
    }
}
