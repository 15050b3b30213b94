//! Rate limiter for waveform bursts.
//!
//! Bursts arrive at the device's sample cadence and would saturate slow
//! observers. The limiter forwards a burst only when more than the minimum
//! interval has passed since the last forwarded one; anything in between is
//! dropped, not queued. Scalar readings always pass.

use crate::config::LimiterSettings;
use crate::types::Frame;
use std::time::{Duration, Instant};

pub struct RateLimiter {
    min_interval: Duration,
    last_forwarded: Option<Instant>,
    throttled: u64,
}

impl RateLimiter {
    pub fn new(settings: &LimiterSettings) -> Self {
        Self {
            min_interval: settings.min_interval(),
            last_forwarded: None,
            throttled: 0,
        }
    }

    /// Whether `frame` may be forwarded at `now`.
    pub fn admit(&mut self, frame: &Frame, now: Instant) -> bool {
        if !frame.is_waveform() {
            return true;
        }

        let allowed = match self.last_forwarded {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.min_interval,
        };

        if allowed {
            self.last_forwarded = Some(now);
        } else {
            self.throttled += 1;
        }
        allowed
    }

    /// Bursts dropped so far
    pub fn throttled(&self) -> u64 {
        self.throttled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ScalarReading, WaveformBurst};

    fn limiter(ms: u64) -> RateLimiter {
        RateLimiter::new(&LimiterSettings {
            min_burst_interval_ms: ms,
        })
    }

    fn burst() -> Frame {
        Frame::Waveform(WaveformBurst::new(0, vec![1], vec![2], 40).0)
    }

    fn reading() -> Frame {
        Frame::Scalar(ScalarReading {
            device_timestamp: None,
            host_timestamp: 0,
            value: 98.0,
        })
    }

    #[test]
    fn test_first_burst_passes() {
        let mut limiter = limiter(50);
        assert!(limiter.admit(&burst(), Instant::now()));
    }

    #[test]
    fn test_burst_within_interval_dropped() {
        let mut limiter = limiter(50);
        let t0 = Instant::now();
        assert!(limiter.admit(&burst(), t0));
        assert!(!limiter.admit(&burst(), t0 + Duration::from_millis(5)));
        assert_eq!(limiter.throttled(), 1);
    }

    #[test]
    fn test_interval_is_exclusive() {
        let mut limiter = limiter(50);
        let t0 = Instant::now();
        assert!(limiter.admit(&burst(), t0));
        assert!(!limiter.admit(&burst(), t0 + Duration::from_millis(50)));
        assert!(limiter.admit(&burst(), t0 + Duration::from_millis(51)));
    }

    #[test]
    fn test_dropped_burst_does_not_reset_window() {
        let mut limiter = limiter(50);
        let t0 = Instant::now();
        assert!(limiter.admit(&burst(), t0));
        assert!(!limiter.admit(&burst(), t0 + Duration::from_millis(30)));
        // measured from the last forwarded burst, not the dropped one
        assert!(limiter.admit(&burst(), t0 + Duration::from_millis(60)));
    }

    #[test]
    fn test_scalars_bypass() {
        let mut limiter = limiter(1_000);
        let t0 = Instant::now();
        assert!(limiter.admit(&burst(), t0));
        for _ in 0..100 {
            assert!(limiter.admit(&reading(), t0));
        }
        assert_eq!(limiter.throttled(), 0);
        // scalars do not open the window for bursts either
        assert!(!limiter.admit(&burst(), t0 + Duration::from_millis(1)));
    }
}
