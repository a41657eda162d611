//! Minimum-interval gate shared by foreground calls and the scheduler.

// crates.io
use tokio::time::{self, Instant};
// self
use crate::_prelude::*;

/// Enforces a minimum spacing between consecutive outbound API requests.
///
/// Check-and-update happens under one async mutex, so concurrent callers are granted slots one
/// at a time and no caller bypasses the interval.
#[derive(Debug)]
pub struct RateLimiter {
	min_interval: StdDuration,
	last_request_at: AsyncMutex<Option<Instant>>,
}
impl RateLimiter {
	/// Creates a limiter; a zero interval disables limiting.
	pub fn new(min_interval: StdDuration) -> Self {
		Self { min_interval, last_request_at: AsyncMutex::new(None) }
	}

	/// Configured minimum interval.
	pub fn min_interval(&self) -> StdDuration {
		self.min_interval
	}

	/// Waits until the interval since the previous grant has elapsed, records the grant, and
	/// returns the granted instant.
	pub async fn acquire(&self) -> Instant {
		if self.min_interval.is_zero() {
			return Instant::now();
		}

		let mut last = self.last_request_at.lock().await;

		if let Some(previous) = *last {
			let ready_at = previous + self.min_interval;

			if ready_at > Instant::now() {
				tracing::trace!(wait_ms = (ready_at - Instant::now()).as_millis() as u64, "Rate limiter delaying request.");

				time::sleep_until(ready_at).await;
			}
		}

		let granted = Instant::now();

		*last = Some(granted);

		granted
	}
}
impl Default for RateLimiter {
	fn default() -> Self {
		Self::new(crate::config::DEFAULT_MIN_REQUEST_INTERVAL)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn grants_are_spaced_by_the_interval() {
		let limiter = Arc::new(RateLimiter::new(StdDuration::from_millis(40)));
		let mut handles = Vec::new();

		for _ in 0..3 {
			let limiter = limiter.clone();

			handles.push(tokio::spawn(async move { limiter.acquire().await }));
		}

		let mut grants = Vec::new();

		for handle in handles {
			grants.push(handle.await.expect("Acquire task should not panic."));
		}

		grants.sort();

		for pair in grants.windows(2) {
			assert!(
				pair[1] - pair[0] >= StdDuration::from_millis(40),
				"Grants {pair:?} are closer than the configured interval."
			);
		}
	}

	#[tokio::test]
	async fn zero_interval_never_waits() {
		let limiter = RateLimiter::new(StdDuration::ZERO);
		let started = Instant::now();

		for _ in 0..50 {
			limiter.acquire().await;
		}

		assert!(started.elapsed() < StdDuration::from_millis(500));
	}
}
