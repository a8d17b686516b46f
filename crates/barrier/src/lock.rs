//! Per-key mutual exclusion for barrier critical sections.
//!
//! Tokens are created on first reference to a key and removed when the pull
//! path finds the key's group drained. Every store mutation for a key happens
//! inside [`LockTable::with_token`] for that key.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;

use crate::CorrelationKey;

/// How a critical section treats a token that was forgotten while it waited.
///
/// After [`KeySection::forget`], the next reference to the same key installs a
/// fresh token. A thread that fetched the old token before it was forgotten
/// still wakes up holding it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPolicy {
	/// Run the section under the stale token anyway.
	///
	/// Exclusion then holds per token instance only: the stale holder can touch
	/// the store concurrently with the holder of the fresh token, and an
	/// admission parked on a token retired by a drain lands in a group whose key
	/// is no longer tracked. Sound only when store mutations for one key commute
	/// and the store is swept by other means.
	Tolerant,
	/// Drop a retired token and re-fetch the current one before running.
	///
	/// Exclusion holds per key value across token replacement.
	#[default]
	Validated,
}

#[derive(Debug, Default)]
struct TokenState {
	retired: bool,
}

/// Mutual-exclusion handle for one correlation key.
#[derive(Debug, Default)]
pub struct Token {
	state: Mutex<TokenState>,
}

/// Process-local map from correlation key to its current [`Token`].
///
/// Owned by one barrier; separate barriers never share tokens.
#[derive(Debug)]
pub struct LockTable<K> {
	policy: TokenPolicy,
	tokens: Mutex<HashMap<K, Arc<Token>>>,
}

impl<K> Default for LockTable<K> {
	fn default() -> Self {
		Self::new(TokenPolicy::default())
	}
}

impl<K> LockTable<K> {
	/// Creates an empty table.
	pub fn new(policy: TokenPolicy) -> Self {
		Self {
			policy,
			tokens: Mutex::new(HashMap::new()),
		}
	}

	/// Policy applied to tokens forgotten while a thread waited on them.
	pub fn policy(&self) -> TokenPolicy {
		self.policy
	}
}

impl<K: CorrelationKey> LockTable<K> {
	/// Returns the current token for `key`, inserting a fresh one if absent.
	pub fn acquire_token(&self, key: &K) -> Arc<Token> {
		let mut tokens = self.tokens.lock();
		if let Some(token) = tokens.get(key) {
			return Arc::clone(token);
		}
		let token = Arc::new(Token::default());
		tokens.insert(key.clone(), Arc::clone(&token));
		token
	}

	/// Snapshot of the keys currently holding a token, in map order.
	pub fn keys(&self) -> Vec<K> {
		self.tokens.lock().keys().cloned().collect()
	}

	/// Number of keys currently holding a token.
	pub fn len(&self) -> usize {
		self.tokens.lock().len()
	}

	/// Returns `true` if no key holds a token.
	pub fn is_empty(&self) -> bool {
		self.tokens.lock().is_empty()
	}

	/// Runs `f` while holding the token for `key` exclusively.
	///
	/// The token is released when `f` returns or unwinds.
	pub fn with_token<T>(&self, key: &K, f: impl FnOnce(&mut KeySection<'_, K>) -> T) -> T {
		loop {
			let token = self.acquire_token(key);
			let mut state = token.state.lock();
			if state.retired && self.policy == TokenPolicy::Validated {
				tracing::trace!(key = ?key, "barrier.token_retired");
				continue;
			}
			let mut section = KeySection {
				table: self,
				key,
				token: &token,
				state: &mut state,
			};
			return f(&mut section);
		}
	}

	fn forget(&self, key: &K, token: &Arc<Token>) -> bool {
		let mut tokens = self.tokens.lock();
		match tokens.get(key) {
			Some(current) if Arc::ptr_eq(current, token) => {
				tokens.remove(key);
				true
			}
			_ => false,
		}
	}
}

/// Exclusive hold on one key's token, handed to [`LockTable::with_token`] callbacks.
#[derive(Debug)]
pub struct KeySection<'a, K> {
	table: &'a LockTable<K>,
	key: &'a K,
	token: &'a Arc<Token>,
	state: &'a mut TokenState,
}

impl<K: CorrelationKey> KeySection<'_, K> {
	/// Key this section holds.
	pub fn key(&self) -> &K {
		self.key
	}

	/// Whether the held token is still the table's current token for the key.
	pub fn is_current(&self) -> bool {
		!self.state.retired
	}

	/// Removes the key from the table and retires the held token.
	///
	/// The next reference to the key installs a fresh token. Returns `false` if
	/// the table entry already pointed at a different token.
	pub fn forget(&mut self) -> bool {
		self.state.retired = true;
		self.table.forget(self.key, self.token)
	}
}
