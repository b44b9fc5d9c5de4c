//! Local rate limiting for the ingest endpoints.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;

/// Non-blocking per-process limiter over the ingest path. With no
/// configured rate everything passes.
pub struct IngestRateLimiter {
    limiter: Option<DefaultDirectRateLimiter>,
}

impl IngestRateLimiter {
    pub fn new(per_second: Option<u32>) -> Self {
        let limiter = per_second
            .and_then(NonZeroU32::new)
            .map(|rate| RateLimiter::direct(Quota::per_second(rate)));
        Self { limiter }
    }

    /// Check whether one more request is allowed (non-blocking).
    pub fn check(&self) -> bool {
        self.limiter
            .as_ref()
            .map(|limiter| limiter.check().is_ok())
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_when_unconfigured() {
        let limiter = IngestRateLimiter::new(None);
        for _ in 0..1_000 {
            assert!(limiter.check());
        }
    }

    #[test]
    fn test_zero_rate_means_unlimited() {
        // NonZeroU32 rejects 0, so a zero config degrades to no limiting
        let limiter = IngestRateLimiter::new(Some(0));
        assert!(limiter.check());
    }

    #[test]
    fn test_burst_is_bounded() {
        let limiter = IngestRateLimiter::new(Some(5));
        let allowed = (0..100).filter(|_| limiter.check()).count();
        assert!(allowed <= 5);
        assert!(allowed >= 1);
    }
}
