//! The correlation barrier.
//!
//! Intake appends each message to its key's group under the key's token. The
//! pull path walks a snapshot of known keys, asks the release strategy about
//! each group, and hands out at most one message per call. A group that is
//! releasable but has nothing left unmarked is dropped together with its key,
//! and the walk continues.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;

use crate::config::BarrierConfig;
use crate::endpoint::{MessageSink, MessageSource};
use crate::error::{Error, Result};
use crate::lock::{KeySection, LockTable, TokenPolicy};
use crate::store::{MemoryGroupStore, MessageGroupStore};
use crate::strategy::{CorrelationStrategy, ReleaseStrategy};
use crate::{CorrelationKey, GroupedMessage};

/// Counters describing a barrier's lifetime activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BarrierStats {
	/// Messages accepted by intake.
	pub admitted: u64,
	/// Messages handed out by the pull path.
	pub released: u64,
	/// Drained groups removed together with their key.
	pub groups_removed: u64,
	/// Keys visited by the pull path whose group had already disappeared.
	pub stale_keys: u64,
}

/// What the pull path does with a message it hands out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseMode {
	/// Remove the message from its group. The group shrinks with every release.
	///
	/// A size-based release strategy such as [`MinGroupSize`](crate::strategy::MinGroupSize)
	/// or [`SequenceSizeStrategy`](crate::strategy::SequenceSizeStrategy) sees the
	/// group fall back under its threshold after the first release, and the rest
	/// of the group stays buffered until intake tops it up. Pair only with
	/// strategies that do not depend on group size.
	Remove,
	/// Move the message to the group's marked subset. The group keeps its size
	/// until every message has been released and the group is dropped.
	#[default]
	Mark,
}

#[derive(Debug, Default)]
struct Counters {
	admitted: AtomicU64,
	released: AtomicU64,
	groups_removed: AtomicU64,
	stale_keys: AtomicU64,
}

enum Visit<M> {
	Released(M),
	Held,
	Drained,
	Stale,
}

/// Buffers messages per correlation key until a release strategy admits them.
///
/// Implements [`MessageSink`] for intake and [`MessageSource`] for release.
/// Both sides share only the lock table and the group store.
pub struct Barrier<K, M, S = MemoryGroupStore<K, M>> {
	store: S,
	locks: LockTable<K>,
	release_mode: ReleaseMode,
	correlation: Box<dyn CorrelationStrategy<M, K>>,
	release: Box<dyn ReleaseStrategy<K, M>>,
	counters: Counters,
}

impl<K, M> Barrier<K, M>
where
	K: CorrelationKey,
	M: GroupedMessage,
{
	/// Creates a barrier over an unbounded [`MemoryGroupStore`].
	pub fn new(correlation: impl CorrelationStrategy<M, K> + 'static, release: impl ReleaseStrategy<K, M> + 'static) -> Self {
		Self::with_store(MemoryGroupStore::new(), correlation, release)
	}

	/// Creates a barrier over a [`MemoryGroupStore`] shaped by `config`.
	pub fn from_config(
		config: &BarrierConfig,
		correlation: impl CorrelationStrategy<M, K> + 'static,
		release: impl ReleaseStrategy<K, M> + 'static,
	) -> Self {
		Self::with_store(MemoryGroupStore::with_capacity(config.store_capacity), correlation, release)
			.token_policy(config.token_policy)
			.release_mode(config.release_mode)
	}
}

impl<K, M, S> Barrier<K, M, S>
where
	K: CorrelationKey,
	M: GroupedMessage,
	S: MessageGroupStore<K, M>,
{
	/// Creates a barrier over a caller-supplied store.
	pub fn with_store(
		store: S,
		correlation: impl CorrelationStrategy<M, K> + 'static,
		release: impl ReleaseStrategy<K, M> + 'static,
	) -> Self {
		Self {
			store,
			locks: LockTable::default(),
			release_mode: ReleaseMode::default(),
			correlation: Box::new(correlation),
			release: Box::new(release),
			counters: Counters::default(),
		}
	}

	/// Replaces the token policy. Only meaningful before the barrier is shared.
	pub fn token_policy(mut self, policy: TokenPolicy) -> Self {
		self.locks = LockTable::new(policy);
		self
	}

	/// Replaces the release mode.
	pub fn release_mode(mut self, mode: ReleaseMode) -> Self {
		self.release_mode = mode;
		self
	}

	/// The backing group store.
	pub fn store(&self) -> &S {
		&self.store
	}

	/// Snapshot of the keys the barrier currently tracks.
	pub fn pending_keys(&self) -> Vec<K> {
		self.locks.keys()
	}

	/// Lifetime counters.
	pub fn stats(&self) -> BarrierStats {
		BarrierStats {
			admitted: self.counters.admitted.load(Ordering::Relaxed),
			released: self.counters.released.load(Ordering::Relaxed),
			groups_removed: self.counters.groups_removed.load(Ordering::Relaxed),
			stale_keys: self.counters.stale_keys.load(Ordering::Relaxed),
		}
	}

	/// Buffers `message` under its correlation key.
	///
	/// A correlation failure is returned before any token is taken. A store
	/// rejection for a key with no group forgets the key again under
	/// [`TokenPolicy::Validated`], so a rejected message leaves no trace.
	pub fn admit(&self, message: M) -> Result<()> {
		let key = self.correlation.correlation_key(&message).map_err(Error::Correlation)?;
		let trace = tracing::enabled!(tracing::Level::DEBUG).then(|| format!("{message:?}"));

		self.locks.with_token(&key, |section| {
			let added = self.store.add_to_group(&key, message);
			if added.is_err() && self.locks.policy() == TokenPolicy::Validated && matches!(self.store.group(&key), Ok(None)) {
				section.forget();
			}
			added
		})?;
		self.counters.admitted.fetch_add(1, Ordering::Relaxed);
		if let Some(message) = trace {
			tracing::debug!(key = ?key, %message, "barrier.admit");
		}
		Ok(())
	}

	/// Releases at most one message from the first releasable group found.
	///
	/// Keys are visited in lock-table order; no fairness across keys is implied.
	/// Drained groups met on the way are removed without ending the walk.
	pub fn try_release_one(&self) -> Result<Option<M>> {
		for key in self.locks.keys() {
			let visit = self.locks.with_token(&key, |section| self.visit(section))?;
			match visit {
				Visit::Released(message) => {
					self.counters.released.fetch_add(1, Ordering::Relaxed);
					return Ok(Some(message));
				}
				Visit::Drained => {
					self.counters.groups_removed.fetch_add(1, Ordering::Relaxed);
				}
				Visit::Stale => {
					self.counters.stale_keys.fetch_add(1, Ordering::Relaxed);
				}
				Visit::Held => {}
			}
		}
		Ok(None)
	}

	fn visit(&self, section: &mut KeySection<'_, K>) -> Result<Visit<M>> {
		let key = section.key();
		let Some(group) = self.store.group(key)? else {
			// Removed since the snapshot. Under a tolerant policy an admission may
			// still be parked on this token, so the entry has to stay.
			tracing::trace!(key = ?key, "barrier.stale_key");
			if self.locks.policy() == TokenPolicy::Validated {
				section.forget();
			}
			return Ok(Visit::Stale);
		};

		let releasable = self.release.can_release(&group).map_err(|source| Error::Release {
			key: format!("{key:?}"),
			source,
		})?;
		if !releasable {
			return Ok(Visit::Held);
		}

		match group.unmarked().first() {
			Some(message) => {
				match self.release_mode {
					ReleaseMode::Remove => self.store.remove_from_group(key, message)?,
					ReleaseMode::Mark => self.store.mark_in_group(key, message)?,
				}
				tracing::debug!(key = ?key, message = ?message, "barrier.release");
				Ok(Visit::Released(message.clone()))
			}
			None => {
				self.store.remove_group(section.key())?;
				section.forget();
				tracing::debug!(key = ?section.key(), "barrier.drained");
				Ok(Visit::Drained)
			}
		}
	}
}

impl<K, M, S> MessageSink<M> for Barrier<K, M, S>
where
	K: CorrelationKey,
	M: GroupedMessage,
	S: MessageGroupStore<K, M>,
{
	fn admit(&self, message: M) -> Result<()> {
		Barrier::admit(self, message)
	}
}

impl<K, M, S> MessageSource<M> for Barrier<K, M, S>
where
	K: CorrelationKey,
	M: GroupedMessage,
	S: MessageGroupStore<K, M>,
{
	fn try_release_one(&self) -> Result<Option<M>> {
		Barrier::try_release_one(self)
	}
}

impl<K, M, S> fmt::Debug for Barrier<K, M, S>
where
	K: fmt::Debug,
	S: fmt::Debug,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Barrier")
			.field("store", &self.store)
			.field("locks", &self.locks)
			.field("release_mode", &self.release_mode)
			.field("counters", &self.counters)
			.finish_non_exhaustive()
	}
}
