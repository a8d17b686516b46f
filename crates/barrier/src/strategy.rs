//! Correlation and release policies.
//!
//! Both are supplied by the caller. Closures implement the traits directly; the
//! structs here cover the common split/aggregate shapes for [`Message`].

use std::time::Duration;

use crate::error::StrategyError;
use crate::message::Message;
use crate::store::MessageGroup;

/// Derives the correlation key of a message.
///
/// Must be deterministic for a given message and free of side effects.
pub trait CorrelationStrategy<M, K>: Send + Sync {
	/// Computes the key `message` is grouped under.
	fn correlation_key(&self, message: &M) -> Result<K, StrategyError>;
}

impl<M, K, F> CorrelationStrategy<M, K> for F
where
	F: Fn(&M) -> Result<K, StrategyError> + Send + Sync,
{
	fn correlation_key(&self, message: &M) -> Result<K, StrategyError> {
		self(message)
	}
}

/// Decides whether a group may begin releasing messages.
///
/// Evaluated afresh on every pull visit; must not assume its previous answer
/// still holds and must not mutate the group.
pub trait ReleaseStrategy<K, M>: Send + Sync {
	/// Returns `true` when `group` may release.
	fn can_release(&self, group: &MessageGroup<K, M>) -> Result<bool, StrategyError>;
}

impl<K, M, F> ReleaseStrategy<K, M> for F
where
	F: Fn(&MessageGroup<K, M>) -> bool + Send + Sync,
{
	fn can_release(&self, group: &MessageGroup<K, M>) -> Result<bool, StrategyError> {
		Ok(self(group))
	}
}

/// Groups messages by their `correlation_id` header.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationIdStrategy;

impl<T> CorrelationStrategy<Message<T>, String> for CorrelationIdStrategy
where
	T: Send + Sync,
{
	fn correlation_key(&self, message: &Message<T>) -> Result<String, StrategyError> {
		message
			.headers()
			.correlation_id()
			.map(str::to_owned)
			.ok_or_else(|| StrategyError::MissingHeader {
				header: "correlation_id".into(),
				message_id: message.id(),
			})
	}
}

/// Groups messages by the value of a named header attribute.
#[derive(Debug, Clone)]
pub struct HeaderAttributeStrategy {
	name: String,
}

impl HeaderAttributeStrategy {
	/// Correlates on the attribute called `name`.
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into() }
	}
}

impl<T> CorrelationStrategy<Message<T>, String> for HeaderAttributeStrategy
where
	T: Send + Sync,
{
	fn correlation_key(&self, message: &Message<T>) -> Result<String, StrategyError> {
		message
			.headers()
			.attribute(&self.name)
			.map(str::to_owned)
			.ok_or_else(|| StrategyError::MissingHeader {
				header: self.name.clone(),
				message_id: message.id(),
			})
	}
}

/// Releases every group unconditionally.
#[derive(Debug, Clone, Copy, Default)]
pub struct Always;

impl<K, M> ReleaseStrategy<K, M> for Always {
	fn can_release(&self, _group: &MessageGroup<K, M>) -> Result<bool, StrategyError> {
		Ok(true)
	}
}

/// Releases once a group holds at least this many messages.
#[derive(Debug, Clone, Copy)]
pub struct MinGroupSize(pub usize);

impl<K, M> ReleaseStrategy<K, M> for MinGroupSize {
	fn can_release(&self, group: &MessageGroup<K, M>) -> Result<bool, StrategyError> {
		Ok(group.size() >= self.0)
	}
}

/// Releases once a group holds the whole sequence announced by its first message.
///
/// The announced size is read from the `sequence_size` header of the oldest
/// message. A group whose oldest message carries no sequence size is an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceSizeStrategy;

impl<K, T> ReleaseStrategy<K, Message<T>> for SequenceSizeStrategy {
	fn can_release(&self, group: &MessageGroup<K, Message<T>>) -> Result<bool, StrategyError> {
		let Some(first) = group.unmarked().first().or_else(|| group.marked().first()) else {
			return Ok(false);
		};
		let expected = first.headers().sequence_size().ok_or_else(|| StrategyError::MissingHeader {
			header: "sequence_size".into(),
			message_id: first.id(),
		})?;
		Ok(group.size() >= expected)
	}
}

/// Releases a group once nothing has been admitted to it for the wrapped duration.
#[derive(Debug, Clone, Copy)]
pub struct QuietPeriod(pub Duration);

impl<K, M> ReleaseStrategy<K, M> for QuietPeriod {
	fn can_release(&self, group: &MessageGroup<K, M>) -> Result<bool, StrategyError> {
		Ok(group.updated_at().elapsed() >= self.0)
	}
}
