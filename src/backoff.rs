use core::time::Duration;
use rand::Rng;

/// Sample a wait timeout uniformly from `[0, unit)`.
///
/// Every timed wait draws a fresh value so that competing threads drift apart
/// instead of retrying in lockstep.
pub fn jitter(unit: Duration) -> Duration {
    let nanos = u64::try_from(unit.as_nanos()).unwrap_or(u64::MAX);
    if nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rand::thread_rng().gen_range(0..nanos))
}

/// Sample an idle duration uniformly from `[0, 2 * average)`.
pub fn idle(average: Duration) -> Duration {
    jitter(average.saturating_mul(2))
}

/// Multiplicative randomized backoff.
///
/// The delay starts at one `unit` and is multiplied by a factor drawn from
/// `[1, 4)` after every pause. There is no cap and no retry limit.
#[derive(Debug, Clone)]
pub struct Backoff {
    unit: Duration,
    factor: f64,
}

impl Backoff {
    pub fn new(unit: Duration) -> Self {
        Self { unit, factor: 1.0 }
    }

    /// The pause the next [`snooze`](Self::snooze) will take, truncated to whole units.
    pub fn current(&self) -> Duration {
        if self.unit.is_zero() {
            return Duration::ZERO;
        }
        let secs = self.unit.as_secs_f64() * self.factor.floor();
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Sleep for the current delay, then grow it.
    pub fn snooze(&mut self) {
        std::thread::sleep(self.current());
        self.grow();
    }

    fn grow(&mut self) {
        self.factor *= 1.0 + rand::thread_rng().gen::<f64>() * 3.0;
    }
}
