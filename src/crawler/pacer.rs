use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Enforces a minimum delay between consecutive fetches of one crawl
#[derive(Debug)]
pub struct Pacer {
    min_delay: Duration,
    last_fetch: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_fetch: Mutex::new(None),
        }
    }

    /// A pacer that never waits
    pub fn unpaced() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Time left before the next fetch may start
    ///
    /// # Arguments
    ///
    /// * `now` - The current time instant
    ///
    /// # Returns
    ///
    /// * `Some(Duration)` - Time remaining until next fetch is allowed
    /// * `None` - A fetch may start now
    pub fn time_until_next_fetch(&self, now: Instant) -> Option<Duration> {
        let last = match self.last_fetch.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }?;

        let elapsed = now.duration_since(last);
        if elapsed < self.min_delay {
            Some(self.min_delay - elapsed)
        } else {
            None
        }
    }

    /// Waits until the minimum delay since the previous fetch has passed,
    /// then records a new fetch
    ///
    /// The fetch slot is claimed under a single lock, so callers sharing a
    /// pacer are spaced by the minimum delay as well.
    pub async fn pace(&self) {
        if self.min_delay.is_zero() {
            return;
        }

        if let Some(wait) = self.reserve(Instant::now()) {
            tracing::trace!("Pacing fetch for {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Claims the next fetch slot at or after `now`, returning the wait
    /// before that slot starts
    fn reserve(&self, now: Instant) -> Option<Duration> {
        let mut guard = match self.last_fetch.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let slot = match *guard {
            Some(last) => now.max(last + self.min_delay),
            None => now,
        };
        *guard = Some(slot);

        Some(slot - now).filter(|wait| !wait.is_zero())
    }

    #[cfg(test)]
    fn record_fetch(&self, now: Instant) {
        match self.last_fetch.lock() {
            Ok(mut guard) => *guard = Some(now),
            Err(poisoned) => *poisoned.into_inner() = Some(now),
        }
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::unpaced()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_wait_before_first_fetch() {
        let pacer = Pacer::new(Duration::from_millis(500));
        assert_eq!(pacer.time_until_next_fetch(Instant::now()), None);
    }

    #[test]
    fn test_wait_after_fetch() {
        let pacer = Pacer::new(Duration::from_millis(500));
        let now = Instant::now();
        pacer.record_fetch(now);

        let wait = pacer
            .time_until_next_fetch(now + Duration::from_millis(200))
            .unwrap();
        assert_eq!(wait, Duration::from_millis(300));

        assert_eq!(
            pacer.time_until_next_fetch(now + Duration::from_millis(600)),
            None
        );
    }

    #[tokio::test]
    async fn test_unpaced_never_records() {
        let pacer = Pacer::unpaced();
        pacer.pace().await;
        pacer.pace().await;
        assert_eq!(pacer.time_until_next_fetch(Instant::now()), None);
    }

    #[tokio::test]
    async fn test_pace_sleeps_for_remaining_delay() {
        let pacer = Pacer::new(Duration::from_millis(50));
        pacer.pace().await;

        let before = Instant::now();
        pacer.pace().await;
        assert!(before.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_reserve_claims_consecutive_slots() {
        let pacer = Pacer::new(Duration::from_millis(100));
        let now = Instant::now();

        assert_eq!(pacer.reserve(now), None);
        assert_eq!(pacer.reserve(now), Some(Duration::from_millis(100)));
        assert_eq!(pacer.reserve(now), Some(Duration::from_millis(200)));
        assert_eq!(
            pacer.reserve(now + Duration::from_millis(500)),
            None
        );
    }

    #[tokio::test]
    async fn test_shared_pacer_spaces_concurrent_fetches() {
        let pacer = Pacer::new(Duration::from_millis(40));
        let before = Instant::now();

        tokio::join!(pacer.pace(), pacer.pace(), pacer.pace());

        assert!(before.elapsed() >= Duration::from_millis(70));
    }
}
