//! Error types for barrier operations.

use thiserror::Error;

/// Boxed source error carried by strategy and store failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure raised by a correlation or release strategy.
#[derive(Debug, Error)]
pub enum StrategyError {
	/// A header the strategy depends on is absent from the message.
	#[error("message {message_id} has no `{header}` header")]
	MissingHeader {
		/// Header name that was looked up.
		header: String,
		/// Id of the offending message.
		message_id: uuid::Uuid,
	},

	/// The strategy failed for its own reasons.
	#[error("strategy failed: {0}")]
	Failed(#[source] BoxError),
}

impl StrategyError {
	/// Wraps an arbitrary error raised inside a user strategy.
	pub fn failed(error: impl Into<BoxError>) -> Self {
		Self::Failed(error.into())
	}
}

/// Failure raised by a [`MessageGroupStore`](crate::MessageGroupStore).
#[derive(Debug, Error)]
pub enum StoreError {
	/// The store already holds as many messages as it was configured for.
	#[error("message group store is full (capacity {capacity})")]
	CapacityExceeded {
		/// Configured capacity in messages.
		capacity: usize,
	},

	/// A backend-specific failure.
	#[error("message group store failed: {0}")]
	Backend(#[source] BoxError),
}

/// Errors surfaced by [`Barrier`](crate::Barrier) operations.
///
/// Collaborator failures are passed through without reinterpretation; the
/// variant only records which side of the barrier raised them.
#[derive(Debug, Error)]
pub enum Error {
	/// The correlation strategy could not derive a key; nothing was admitted.
	#[error("correlation failed: {0}")]
	Correlation(#[source] StrategyError),

	/// The release strategy failed while evaluating a group.
	#[error("release strategy failed for key {key}: {source}")]
	Release {
		/// Debug rendering of the key whose group was being evaluated.
		key: String,
		/// The underlying strategy error.
		#[source]
		source: StrategyError,
	},

	/// The group store rejected an operation.
	#[error(transparent)]
	Store(#[from] StoreError),
}

/// Result type for barrier operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
	use std::error::Error as _;

	use super::*;

	#[test]
	fn release_error_exposes_strategy_source() {
		let err = Error::Release {
			key: "\"A\"".into(),
			source: StrategyError::failed("clock went backwards"),
		};
		assert_eq!(err.to_string(), "release strategy failed for key \"A\": strategy failed: clock went backwards");
		let source = err.source().expect("release error has a source");
		assert!(source.to_string().contains("clock went backwards"));
	}

	#[test]
	fn store_error_is_transparent() {
		let err: Error = StoreError::CapacityExceeded { capacity: 4 }.into();
		assert_eq!(err.to_string(), "message group store is full (capacity 4)");
	}
}
