//! Immutable messages with correlation headers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use uuid::Uuid;

/// Metadata attached to a [`Message`].
#[derive(Debug, Clone)]
pub struct MessageHeaders {
	id: Uuid,
	timestamp: SystemTime,
	correlation_id: Option<String>,
	sequence_number: Option<usize>,
	sequence_size: Option<usize>,
	attributes: BTreeMap<String, String>,
}

impl MessageHeaders {
	fn fresh() -> Self {
		Self {
			id: Uuid::new_v4(),
			timestamp: SystemTime::now(),
			correlation_id: None,
			sequence_number: None,
			sequence_size: None,
			attributes: BTreeMap::new(),
		}
	}

	/// Unique message id, assigned at construction.
	pub fn id(&self) -> Uuid {
		self.id
	}

	/// Wall-clock creation time.
	pub fn timestamp(&self) -> SystemTime {
		self.timestamp
	}

	/// Correlation id, if the producer set one.
	pub fn correlation_id(&self) -> Option<&str> {
		self.correlation_id.as_deref()
	}

	/// Position of this message within a split sequence.
	pub fn sequence_number(&self) -> Option<usize> {
		self.sequence_number
	}

	/// Total number of messages in the split sequence this message belongs to.
	pub fn sequence_size(&self) -> Option<usize> {
		self.sequence_size
	}

	/// Looks up a free-form attribute.
	pub fn attribute(&self, name: &str) -> Option<&str> {
		self.attributes.get(name).map(String::as_str)
	}

	/// Iterates free-form attributes in name order.
	pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
		self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}
}

/// Immutable unit of work: a shared payload plus headers.
///
/// Clones share the payload. Equality is identity: two messages are equal iff
/// they carry the same header id.
pub struct Message<T> {
	payload: Arc<T>,
	headers: MessageHeaders,
}

impl<T> Message<T> {
	/// Creates a message with fresh headers.
	pub fn new(payload: T) -> Self {
		Self {
			payload: Arc::new(payload),
			headers: MessageHeaders::fresh(),
		}
	}

	/// Starts building a message with custom headers.
	pub fn builder(payload: T) -> MessageBuilder<T> {
		MessageBuilder {
			payload,
			headers: MessageHeaders::fresh(),
		}
	}

	/// Returns the payload.
	pub fn payload(&self) -> &T {
		&self.payload
	}

	/// Returns the headers.
	pub fn headers(&self) -> &MessageHeaders {
		&self.headers
	}

	/// Shorthand for `self.headers().id()`.
	pub fn id(&self) -> Uuid {
		self.headers.id
	}
}

impl<T> Clone for Message<T> {
	fn clone(&self) -> Self {
		Self {
			payload: Arc::clone(&self.payload),
			headers: self.headers.clone(),
		}
	}
}

impl<T> PartialEq for Message<T> {
	fn eq(&self, other: &Self) -> bool {
		self.headers.id == other.headers.id
	}
}

impl<T> Eq for Message<T> {}

impl<T: fmt::Debug> fmt::Debug for Message<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Message")
			.field("id", &self.headers.id)
			.field("correlation_id", &self.headers.correlation_id)
			.field("payload", &self.payload)
			.finish()
	}
}

/// Fluent construction of a [`Message`] with correlation headers.
#[derive(Debug)]
pub struct MessageBuilder<T> {
	payload: T,
	headers: MessageHeaders,
}

impl<T> MessageBuilder<T> {
	/// Sets the correlation id header.
	pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
		self.headers.correlation_id = Some(id.into());
		self
	}

	/// Sets sequence number and size, as produced by a splitter.
	pub fn sequence(mut self, number: usize, size: usize) -> Self {
		self.headers.sequence_number = Some(number);
		self.headers.sequence_size = Some(size);
		self
	}

	/// Adds a free-form attribute, replacing any previous value.
	pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.attributes.insert(name.into(), value.into());
		self
	}

	/// Finishes the message.
	pub fn build(self) -> Message<T> {
		Message {
			payload: Arc::new(self.payload),
			headers: self.headers,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn clones_share_identity_and_payload() {
		let msg = Message::builder("part").correlation_id("order-7").sequence(1, 3).build();
		let copy = msg.clone();
		assert_eq!(msg, copy);
		assert!(std::ptr::eq(msg.payload(), copy.payload()));
		assert_eq!(copy.headers().correlation_id(), Some("order-7"));
		assert_eq!(copy.headers().sequence_size(), Some(3));
	}

	#[test]
	fn equal_payloads_are_distinct_messages() {
		assert_ne!(Message::new(1), Message::new(1));
	}

	#[test]
	fn attributes_iterate_in_name_order() {
		let msg = Message::builder(()).attribute("zone", "eu").attribute("batch", "42").build();
		let attrs: Vec<_> = msg.headers().attributes().collect();
		assert_eq!(attrs, vec![("batch", "42"), ("zone", "eu")]);
		assert_eq!(msg.headers().attribute("zone"), Some("eu"));
		assert_eq!(msg.headers().attribute("missing"), None);
	}
}
