//! Keyed message group storage.
//!
//! The store owns admitted messages. The barrier only asks it to add, look up,
//! remove one, or drop a whole group, always while holding the key's token, so
//! implementations only need to be safe for concurrent access across keys.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use parking_lot::RwLock;

use crate::error::StoreError;
use crate::{CorrelationKey, GroupedMessage};

/// Snapshot of the messages currently held under one correlation key.
#[derive(Debug, Clone)]
pub struct MessageGroup<K, M> {
	key: K,
	unmarked: Vec<M>,
	marked: Vec<M>,
	created_at: Instant,
	updated_at: Instant,
}

impl<K, M> MessageGroup<K, M> {
	/// Assembles a snapshot. Store implementations outside this crate use this.
	pub fn new(key: K, unmarked: Vec<M>, marked: Vec<M>, created_at: Instant, updated_at: Instant) -> Self {
		Self {
			key,
			unmarked,
			marked,
			created_at,
			updated_at,
		}
	}

	/// Correlation key of the group.
	pub fn key(&self) -> &K {
		&self.key
	}

	/// Messages still eligible for release, oldest first.
	pub fn unmarked(&self) -> &[M] {
		&self.unmarked
	}

	/// Messages excluded from release.
	pub fn marked(&self) -> &[M] {
		&self.marked
	}

	/// Total number of messages, marked and unmarked.
	pub fn size(&self) -> usize {
		self.unmarked.len() + self.marked.len()
	}

	/// When the first message of the group was admitted.
	pub fn created_at(&self) -> Instant {
		self.created_at
	}

	/// When the group last gained a message.
	pub fn updated_at(&self) -> Instant {
		self.updated_at
	}
}

/// Storage contract the barrier depends on.
///
/// Looking up a key that was just removed must return `Ok(None)`, not an error.
pub trait MessageGroupStore<K, M>: Send + Sync {
	/// Appends `message` to the group for `key`, creating the group if needed.
	fn add_to_group(&self, key: &K, message: M) -> Result<(), StoreError>;

	/// Returns a snapshot of the group for `key`.
	fn group(&self, key: &K) -> Result<Option<MessageGroup<K, M>>, StoreError>;

	/// Removes `message` from the group for `key`, whether marked or not.
	fn remove_from_group(&self, key: &K, message: &M) -> Result<(), StoreError>;

	/// Moves `message` from the unmarked to the marked subset.
	fn mark_in_group(&self, key: &K, message: &M) -> Result<(), StoreError>;

	/// Drops the group for `key` and every message in it.
	fn remove_group(&self, key: &K) -> Result<(), StoreError>;

	/// Number of groups currently stored.
	fn group_count(&self) -> usize;
}

struct GroupState<M> {
	unmarked: VecDeque<M>,
	marked: Vec<M>,
	created_at: Instant,
	updated_at: Instant,
}

impl<M> GroupState<M> {
	fn len(&self) -> usize {
		self.unmarked.len() + self.marked.len()
	}
}

struct Groups<K, M> {
	groups: HashMap<K, GroupState<M>>,
	messages: usize,
}

/// In-process [`MessageGroupStore`] backed by a hash map.
///
/// A non-zero capacity bounds the total number of stored messages across all
/// groups. Unmarked messages keep insertion order.
pub struct MemoryGroupStore<K, M> {
	capacity: usize,
	inner: RwLock<Groups<K, M>>,
}

impl<K, M> Default for MemoryGroupStore<K, M> {
	fn default() -> Self {
		Self::with_capacity(0)
	}
}

impl<K, M> MemoryGroupStore<K, M> {
	/// Creates an unbounded store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a store holding at most `capacity` messages; zero means unbounded.
	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			capacity,
			inner: RwLock::new(Groups {
				groups: HashMap::new(),
				messages: 0,
			}),
		}
	}

	/// Configured capacity; zero means unbounded.
	pub fn capacity(&self) -> usize {
		self.capacity
	}

	/// Total number of messages across all groups.
	pub fn message_count(&self) -> usize {
		self.inner.read().messages
	}
}

impl<K, M> std::fmt::Debug for MemoryGroupStore<K, M> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let inner = self.inner.read();
		f.debug_struct("MemoryGroupStore")
			.field("capacity", &self.capacity)
			.field("groups", &inner.groups.len())
			.field("messages", &inner.messages)
			.finish()
	}
}

impl<K, M> MessageGroupStore<K, M> for MemoryGroupStore<K, M>
where
	K: CorrelationKey,
	M: GroupedMessage,
{
	fn add_to_group(&self, key: &K, message: M) -> Result<(), StoreError> {
		let mut inner = self.inner.write();
		if self.capacity > 0 && inner.messages >= self.capacity {
			return Err(StoreError::CapacityExceeded { capacity: self.capacity });
		}

		let now = Instant::now();
		let group = inner.groups.entry(key.clone()).or_insert_with(|| GroupState {
			unmarked: VecDeque::new(),
			marked: Vec::new(),
			created_at: now,
			updated_at: now,
		});
		group.unmarked.push_back(message);
		group.updated_at = now;
		inner.messages += 1;
		Ok(())
	}

	fn group(&self, key: &K) -> Result<Option<MessageGroup<K, M>>, StoreError> {
		let inner = self.inner.read();
		Ok(inner.groups.get(key).map(|group| MessageGroup {
			key: key.clone(),
			unmarked: group.unmarked.iter().cloned().collect(),
			marked: group.marked.clone(),
			created_at: group.created_at,
			updated_at: group.updated_at,
		}))
	}

	fn remove_from_group(&self, key: &K, message: &M) -> Result<(), StoreError> {
		let mut inner = self.inner.write();
		let Some(group) = inner.groups.get_mut(key) else {
			return Ok(());
		};

		let before = group.len();
		if let Some(pos) = group.unmarked.iter().position(|m| m == message) {
			group.unmarked.remove(pos);
		} else if let Some(pos) = group.marked.iter().position(|m| m == message) {
			group.marked.remove(pos);
		}
		let removed = before - group.len();
		inner.messages -= removed;
		Ok(())
	}

	fn mark_in_group(&self, key: &K, message: &M) -> Result<(), StoreError> {
		let mut inner = self.inner.write();
		if let Some(group) = inner.groups.get_mut(key)
			&& let Some(pos) = group.unmarked.iter().position(|m| m == message)
			&& let Some(marked) = group.unmarked.remove(pos)
		{
			group.marked.push(marked);
		}
		Ok(())
	}

	fn remove_group(&self, key: &K) -> Result<(), StoreError> {
		let mut inner = self.inner.write();
		if let Some(group) = inner.groups.remove(key) {
			inner.messages -= group.len();
		}
		Ok(())
	}

	fn group_count(&self) -> usize {
		self.inner.read().groups.len()
	}
}
