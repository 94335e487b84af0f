#![forbid(unsafe_code)]

use std::time::Duration;

use rand::Rng;

/// Randomised reconnect window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
	/// Inclusive lower bound of the jitter window.
	pub min_delay: Duration,
	/// Exclusive upper bound of the jitter window.
	pub max_delay: Duration,
	/// `None` retries until the session is shut down.
	pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
	fn default() -> Self {
		Self {
			min_delay: Duration::from_secs(5),
			max_delay: Duration::from_secs(15),
			max_attempts: None,
		}
	}
}

impl ReconnectPolicy {
	/// Draw the next delay uniformly from `[min_delay, max_delay)`.
	pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
		let min_ms = self.min_delay.as_millis() as u64;
		let max_ms = self.max_delay.as_millis() as u64;
		if max_ms <= min_ms {
			return self.min_delay;
		}
		Duration::from_millis(rng.random_range(min_ms..max_ms))
	}

	/// Whether attempt number `attempt` (1-based) may run.
	pub fn allows(&self, attempt: u32) -> bool {
		self.max_attempts.is_none_or(|max| attempt <= max)
	}
}
