//! Intake and release capabilities.
//!
//! A barrier is driven from two sides that never call each other: a dispatcher
//! pushes arriving messages into a [`MessageSink`], and a poller pulls released
//! messages out of a [`MessageSource`].

use std::sync::Arc;

use crate::error::Result;

/// Push-side capability: accepts one arriving message per call.
pub trait MessageSink<M>: Send + Sync {
	/// Buffers `message`. Never releases anything.
	fn admit(&self, message: M) -> Result<()>;
}

/// Pull-side capability: hands out at most one message per call.
pub trait MessageSource<M>: Send + Sync {
	/// Attempts exactly one release, returning `None` immediately if nothing qualifies.
	fn try_release_one(&self) -> Result<Option<M>>;
}

impl<M, T> MessageSink<M> for Arc<T>
where
	T: MessageSink<M> + ?Sized,
{
	fn admit(&self, message: M) -> Result<()> {
		(**self).admit(message)
	}
}

impl<M, T> MessageSource<M> for Arc<T>
where
	T: MessageSource<M> + ?Sized,
{
	fn try_release_one(&self) -> Result<Option<M>> {
		(**self).try_release_one()
	}
}
