//! Bounded, cancellable status polling shared by the SCA and payment-status loops.

// crates.io
use tokio::{sync::watch, time::Instant};
// self
use crate::_prelude::*;

/// How often and for how long a status is polled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollPolicy {
	/// Delay between two polls.
	pub interval: Duration,
	/// Maximum number of polls; `None` keeps polling.
	pub max_attempts: Option<u32>,
	/// Maximum wall-clock time spent polling; `None` keeps probing.
	pub max_wait: Option<Duration>,
}
impl PollPolicy {
	/// Default delay between polls.
	pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(2_000);
	/// Default upper bound on the wall-clock time spent polling.
	pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(600);

	/// Polls forever at `interval`; only cancellation stops it.
	pub fn unbounded(interval: Duration) -> Self {
		Self { interval, max_attempts: None, max_wait: None }
	}

	/// Caps the number of polls.
	pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
		self.max_attempts = Some(max_attempts);

		self
	}

	/// Caps the wall-clock time spent polling.
	pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
		self.max_wait = Some(max_wait);

		self
	}
}
impl Default for PollPolicy {
	fn default() -> Self {
		Self {
			interval: Self::DEFAULT_INTERVAL,
			max_attempts: None,
			max_wait: Some(Self::DEFAULT_MAX_WAIT),
		}
	}
}

/// Creates a linked cancel handle and signal.
pub fn cancellation() -> (CancelHandle, Cancellation) {
	let (tx, rx) = watch::channel(false);

	(CancelHandle(tx), Cancellation(Some(rx)))
}

/// Triggers the linked [`Cancellation`]s.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);
impl CancelHandle {
	/// Signals cancellation; idempotent.
	pub fn cancel(&self) {
		self.0.send_replace(true);
	}
}

/// Cancellation signal observed by polling loops.
///
/// Dropping the [`CancelHandle`] without cancelling leaves the signal untriggered forever.
#[derive(Clone, Debug, Default)]
pub struct Cancellation(Option<watch::Receiver<bool>>);
impl Cancellation {
	/// A signal that never fires.
	pub fn never() -> Self {
		Self(None)
	}

	/// Whether cancellation has been requested.
	pub fn is_cancelled(&self) -> bool {
		self.0.as_ref().is_some_and(|rx| *rx.borrow())
	}

	/// Resolves once cancellation is requested.
	pub async fn cancelled(&self) {
		let Some(rx) = &self.0 else {
			return std::future::pending().await;
		};
		let mut rx = rx.clone();
		let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();

		if closed {
			std::future::pending::<()>().await;
		}
	}
}

/// Result of one poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollStep<T> {
	/// Terminal value observed.
	Done(T),
	/// Keep polling.
	Pending,
}

/// Terminal value plus the number of polls it took.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Polled<T> {
	/// Terminal value.
	pub value: T,
	/// Polls performed, including the terminal one.
	pub attempts: u32,
}

/// Runs `check` until it reports [`PollStep::Done`].
///
/// `check` receives the 1-based attempt number. Its errors propagate immediately; there are
/// no retries. Exceeding the policy bounds yields [`Error::Timeout`], and a triggered signal
/// yields [`Error::Cancelled`].
pub async fn poll_until<T, F, Fut>(
	policy: &PollPolicy,
	cancel: &Cancellation,
	operation: &'static str,
	mut check: F,
) -> Result<Polled<T>>
where
	F: FnMut(u32) -> Fut,
	Fut: Future<Output = Result<PollStep<T>>>,
{
	let started = Instant::now();
	let mut attempts = 0;

	loop {
		if cancel.is_cancelled() {
			return Err(Error::Cancelled { operation });
		}

		attempts += 1;

		if let PollStep::Done(value) = check(attempts).await? {
			return Ok(Polled { value, attempts });
		}
		if policy.max_attempts.is_some_and(|max| attempts >= max) {
			tracing::warn!(operation, attempts, "Polling hit the attempt limit.");

			return Err(Error::Timeout { operation, attempts });
		}

		let mut wait = policy.interval;

		if let Some(max_wait) = policy.max_wait {
			let remaining = max_wait.saturating_sub(started.elapsed());

			if remaining.is_zero() {
				tracing::warn!(operation, attempts, "Polling hit the time limit.");

				return Err(Error::Timeout { operation, attempts });
			}

			wait = wait.min(remaining);
		}

		tokio::select! {
			_ = cancel.cancelled() => return Err(Error::Cancelled { operation }),
			_ = tokio::time::sleep(wait) => {},
		}
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicU32, Ordering};
	// self
	use super::*;

	fn fast() -> PollPolicy {
		PollPolicy::unbounded(Duration::from_millis(1))
	}

	#[test]
	fn default_policy_is_bounded_by_time_only() {
		let policy = PollPolicy::default();

		assert_eq!(policy.interval, Duration::from_millis(2_000));
		assert_eq!(policy.max_attempts, None);
		assert_eq!(policy.max_wait, Some(Duration::from_secs(600)));
	}

	#[tokio::test]
	async fn stops_at_the_first_terminal_value() {
		let polled = poll_until(&fast(), &Cancellation::never(), "test", |attempt| async move {
			Ok(if attempt == 3 { PollStep::Done("done") } else { PollStep::Pending })
		})
		.await
		.expect("Polling should finish.");

		assert_eq!(polled, Polled { value: "done", attempts: 3 });
	}

	#[tokio::test]
	async fn attempt_limit_times_out() {
		let err = poll_until(
			&fast().with_max_attempts(4),
			&Cancellation::never(),
			"test",
			|_| async { Ok(PollStep::<()>::Pending) },
		)
		.await
		.expect_err("Polling should time out.");

		assert!(matches!(err, Error::Timeout { operation: "test", attempts: 4 }));
	}

	#[tokio::test]
	async fn wall_clock_limit_times_out() {
		let policy = PollPolicy::unbounded(Duration::from_millis(5))
			.with_max_wait(Duration::from_millis(20));
		let err = poll_until(&policy, &Cancellation::never(), "test", |_| async {
			Ok(PollStep::<()>::Pending)
		})
		.await
		.expect_err("Polling should time out.");

		assert!(matches!(err, Error::Timeout { operation: "test", .. }));
	}

	#[tokio::test]
	async fn check_errors_propagate_without_retry() {
		let calls = AtomicU32::new(0);
		let err = poll_until(&fast(), &Cancellation::never(), "test", |_| {
			calls.fetch_add(1, Ordering::SeqCst);

			async { Err::<PollStep<()>, _>(Error::Cancelled { operation: "inner" }) }
		})
		.await
		.expect_err("Check error should propagate.");

		assert!(matches!(err, Error::Cancelled { operation: "inner" }));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn cancelled_signal_stops_before_probing() {
		let (handle, cancel) = cancellation();

		handle.cancel();

		let err = poll_until(&fast(), &cancel, "test", |_| async {
			Ok(PollStep::Done(()))
		})
		.await
		.expect_err("Cancelled polling should fail.");

		assert!(matches!(err, Error::Cancelled { operation: "test" }));
	}

	#[tokio::test]
	async fn cancel_interrupts_the_sleep() {
		let (handle, cancel) = cancellation();
		let policy = PollPolicy::unbounded(Duration::from_secs(3_600));
		let canceller = tokio::spawn(async move {
			tokio::time::sleep(Duration::from_millis(10)).await;
			handle.cancel();
		});
		let err = poll_until(&policy, &cancel, "test", |_| async { Ok(PollStep::<()>::Pending) })
			.await
			.expect_err("Cancelled polling should fail.");

		canceller.await.expect("Canceller task should finish.");

		assert!(matches!(err, Error::Cancelled { operation: "test" }));
	}

	#[tokio::test]
	async fn dropped_handle_never_fires() {
		let (handle, cancel) = cancellation();

		drop(handle);

		assert!(!cancel.is_cancelled());
		assert!(
			tokio::time::timeout(Duration::from_millis(10), cancel.cancelled()).await.is_err(),
			"Signal must stay pending after the handle is dropped."
		);
	}
}
