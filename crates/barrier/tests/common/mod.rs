#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use corral_barrier::{MemoryGroupStore, MessageGroup, MessageGroupStore, StoreError};
use parking_lot::Mutex;

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::TRACE).try_init();
}

/// Message used throughout the integration tests: correlation tag plus a unique serial.
pub type Tagged = (&'static str, u32);

pub fn by_tag(msg: &Tagged) -> Result<&'static str, corral_barrier::StrategyError> {
	Ok(msg.0)
}

/// Wraps a [`MemoryGroupStore`] and records how it is used.
///
/// Every mutation marks its key busy for `delay`; a second mutation arriving
/// for a busy key counts as an overlap.
pub struct RecordingStore {
	inner: MemoryGroupStore<&'static str, Tagged>,
	delay: Duration,
	busy: Mutex<HashMap<&'static str, usize>>,
	pub overlaps: AtomicUsize,
	pub calls: AtomicUsize,
}

impl RecordingStore {
	pub fn new(delay: Duration) -> Self {
		Self {
			inner: MemoryGroupStore::new(),
			delay,
			busy: Mutex::new(HashMap::new()),
			overlaps: AtomicUsize::new(0),
			calls: AtomicUsize::new(0),
		}
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn overlaps(&self) -> usize {
		self.overlaps.load(Ordering::SeqCst)
	}

	pub fn message_count(&self) -> usize {
		self.inner.message_count()
	}

	fn mutate<T>(&self, key: &'static str, f: impl FnOnce() -> T) -> T {
		self.calls.fetch_add(1, Ordering::SeqCst);
		{
			let mut busy = self.busy.lock();
			let depth = busy.entry(key).or_default();
			if *depth > 0 {
				self.overlaps.fetch_add(1, Ordering::SeqCst);
			}
			*depth += 1;
		}
		std::thread::sleep(self.delay);
		let out = f();
		*self.busy.lock().entry(key).or_default() -= 1;
		out
	}
}

impl MessageGroupStore<&'static str, Tagged> for RecordingStore {
	fn add_to_group(&self, key: &&'static str, message: Tagged) -> Result<(), StoreError> {
		self.mutate(*key, || self.inner.add_to_group(key, message))
	}

	fn group(&self, key: &&'static str) -> Result<Option<MessageGroup<&'static str, Tagged>>, StoreError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.inner.group(key)
	}

	fn remove_from_group(&self, key: &&'static str, message: &Tagged) -> Result<(), StoreError> {
		self.mutate(*key, || self.inner.remove_from_group(key, message))
	}

	fn mark_in_group(&self, key: &&'static str, message: &Tagged) -> Result<(), StoreError> {
		self.mutate(*key, || self.inner.mark_in_group(key, message))
	}

	fn remove_group(&self, key: &&'static str) -> Result<(), StoreError> {
		self.mutate(*key, || self.inner.remove_group(key))
	}

	fn group_count(&self) -> usize {
		self.inner.group_count()
	}
}
