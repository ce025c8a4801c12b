//! Backoff schedules: attempt index to wait duration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

type BackoffFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

#[derive(Clone)]
enum Kind {
    Constant { wait: Duration, jitter: f64 },
    Exponential { scalar: Duration, jitter: f64 },
    Custom(BackoffFn),
}

/// How long to wait after a failed attempt.
///
/// The attempt index passed to [`Backoff::delay`] starts at 0 for the wait
/// that follows the first attempt.
#[derive(Clone)]
pub struct Backoff {
    kind: Kind,
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Constant { wait, jitter } => f
                .debug_struct("Constant")
                .field("wait", wait)
                .field("jitter", jitter)
                .finish(),
            Kind::Exponential { scalar, jitter } => f
                .debug_struct("Exponential")
                .field("scalar", scalar)
                .field("jitter", jitter)
                .finish(),
            Kind::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl Default for Backoff {
    /// Exponential from 50 ms with 10% jitter.
    fn default() -> Self {
        Self::exponential_with_jitter(Duration::from_millis(50), 0.10)
    }
}

impl Backoff {
    /// The same wait every time.
    #[must_use]
    pub const fn constant(wait: Duration) -> Self {
        Self::constant_with_jitter(wait, 0.0)
    }

    /// A fixed wait adjusted by up to `jitter` (a fraction) either way.
    ///
    /// `1s` with `0.10` waits between 900 ms and 1100 ms.
    #[must_use]
    pub const fn constant_with_jitter(wait: Duration, jitter: f64) -> Self {
        Self {
            kind: Kind::Constant { wait, jitter },
        }
    }

    /// `scalar * 2^attempt`: 100 ms, 200 ms, 400 ms... for a 100 ms scalar.
    #[must_use]
    pub const fn exponential(scalar: Duration) -> Self {
        Self::exponential_with_jitter(scalar, 0.0)
    }

    /// Exponential backoff adjusted by up to `jitter` either way.
    #[must_use]
    pub const fn exponential_with_jitter(scalar: Duration, jitter: f64) -> Self {
        Self {
            kind: Kind::Exponential { scalar, jitter },
        }
    }

    /// Any schedule.
    #[must_use]
    pub fn custom<F>(schedule: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self {
            kind: Kind::Custom(Arc::new(schedule)),
        }
    }

    /// The wait after attempt `attempt`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        match &self.kind {
            Kind::Constant { wait, jitter } => jitter_up(*wait, *jitter),
            Kind::Exponential { scalar, jitter } => jitter_up(exponential(*scalar, attempt), *jitter),
            Kind::Custom(schedule) => schedule(attempt),
        }
    }
}

fn exponential(scalar: Duration, attempt: u32) -> Duration {
    let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
    scalar.saturating_mul(factor)
}

/// `duration * (1 + jitter * (2U - 1))` with `U` uniform in `[0, 1)`.
///
/// `jitter` is clamped to `[0, 1]`; the result never goes negative.
#[must_use]
pub fn jitter_up(duration: Duration, jitter: f64) -> Duration {
    let jitter = jitter.clamp(0.0, 1.0);
    if jitter <= 0.0 || duration.is_zero() {
        return duration;
    }
    let unit: f64 = rand::rng().random();
    let multiplier = 1.0 + jitter * unit.mul_add(2.0, -1.0);
    Duration::try_from_secs_f64(duration.as_secs_f64() * multiplier).unwrap_or(Duration::MAX)
}
