use std::marker::PhantomData;
use std::sync::Arc;

use corral_barrier::{ConfigError, MessageSource};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::PollerConfig;

/// Why a poll loop ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PollerExit {
	/// The cancellation token fired.
	#[default]
	Cancelled,
	/// The downstream receiver was dropped.
	OutputClosed,
}

/// Summary of one poll loop's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
	/// Polls started.
	pub ticks: u64,
	/// Messages pulled from the source and delivered downstream.
	pub released: u64,
	/// Pulls that failed or panicked.
	pub errors: u64,
	/// Why the loop stopped.
	pub exit: PollerExit,
}

enum Pull<M> {
	Message(M),
	Empty,
	Failed(String),
}

/// Repeatedly pulls one message at a time from a [`MessageSource`].
///
/// Pulls run on the blocking pool, since a pull may wait on a correlation
/// key's token. Released messages go to a bounded channel; a full channel
/// stalls polling. A slot in the channel is reserved before every pull, so a
/// message only leaves the source once it can be delivered.
pub struct Poller<S, M> {
	source: Arc<S>,
	config: PollerConfig,
	_message: PhantomData<fn() -> M>,
}

impl<S, M> Poller<S, M>
where
	S: MessageSource<M> + 'static,
	M: Send + 'static,
{
	/// Creates a poller over `source`, rejecting configs the loop cannot run with.
	pub fn new(source: Arc<S>, config: PollerConfig) -> Result<Self, ConfigError> {
		config.validate()?;
		Ok(Self {
			source,
			config,
			_message: PhantomData,
		})
	}

	/// Spawns the poll loop on the current tokio runtime.
	pub fn spawn(self, out: mpsc::Sender<M>) -> PollerHandle {
		let cancel = CancellationToken::new();
		let task_cancel = cancel.clone();
		tracing::trace!(interval_ms = self.config.interval_ms, "poller.spawn");
		let join = tokio::spawn(self.run(out, task_cancel));
		PollerHandle { cancel, join }
	}

	/// Runs the poll loop until `cancel` fires or `out` is closed.
	pub async fn run(self, out: mpsc::Sender<M>, cancel: CancellationToken) -> PollReport {
		let mut ticker = tokio::time::interval(self.config.interval());
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
		let mut report = PollReport::default();

		'poll: loop {
			tokio::select! {
				biased;
				_ = cancel.cancelled() => break 'poll,
				_ = ticker.tick() => {}
			}
			report.ticks = report.ticks.wrapping_add(1);

			let mut pulled = 0u64;
			for _ in 0..self.config.max_messages_per_poll {
				let permit = tokio::select! {
					biased;
					_ = cancel.cancelled() => break 'poll,
					permit = out.reserve() => match permit {
						Ok(permit) => permit,
						Err(_) => {
							report.exit = PollerExit::OutputClosed;
							break 'poll;
						}
					},
				};
				match self.pull().await {
					Pull::Message(message) => {
						permit.send(message);
						pulled += 1;
						report.released = report.released.wrapping_add(1);
					}
					Pull::Empty => break,
					Pull::Failed(error) => {
						drop(permit);
						report.errors = report.errors.wrapping_add(1);
						tracing::warn!(error = %error, backoff_ms = self.config.error_backoff_ms, "poller.error");
						tokio::select! {
							biased;
							_ = cancel.cancelled() => break 'poll,
							_ = tokio::time::sleep(self.config.error_backoff()) => {}
						}
						break;
					}
				}
			}
			tracing::trace!(tick = report.ticks, pulled, "poller.tick");

			if out.is_closed() {
				report.exit = PollerExit::OutputClosed;
				break;
			}
		}

		tracing::debug!(
			ticks = report.ticks,
			released = report.released,
			errors = report.errors,
			exit = ?report.exit,
			"poller.stopped"
		);
		report
	}

	async fn pull(&self) -> Pull<M> {
		let source = Arc::clone(&self.source);
		match tokio::task::spawn_blocking(move || MessageSource::<M>::try_release_one(&*source)).await {
			Ok(Ok(Some(message))) => Pull::Message(message),
			Ok(Ok(None)) => Pull::Empty,
			Ok(Err(err)) => Pull::Failed(err.to_string()),
			Err(err) if err.is_panic() => Pull::Failed("pull panicked".into()),
			Err(err) => Pull::Failed(err.to_string()),
		}
	}
}

/// Handle to a spawned poll loop.
#[derive(Debug)]
pub struct PollerHandle {
	cancel: CancellationToken,
	join: JoinHandle<PollReport>,
}

impl PollerHandle {
	/// Requests the loop to stop after its current pull.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Returns `true` once the loop has exited.
	pub fn is_finished(&self) -> bool {
		self.join.is_finished()
	}

	/// Stops the loop and waits for its report.
	pub async fn shutdown(self) -> Result<PollReport, tokio::task::JoinError> {
		self.cancel.cancel();
		self.join.await
	}
}
