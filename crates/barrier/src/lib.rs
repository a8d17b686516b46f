//! Correlation barrier for message-driven pipelines.
//!
//! Incoming messages are buffered under a correlation key and withheld until a
//! pluggable release strategy says their group may be consumed:
//! * [`Barrier`]: per-key intake ([`MessageSink`]) and pull-based release ([`MessageSource`])
//! * [`LockTable`]: lazily created per-key mutual-exclusion tokens
//! * [`MessageGroupStore`]: keyed group storage, with [`MemoryGroupStore`] as the in-process default
//! * [`CorrelationStrategy`] / [`ReleaseStrategy`]: grouping and release policies

#![warn(missing_docs)]

pub mod barrier;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod lock;
pub mod message;
pub mod store;
pub mod strategy;

pub use barrier::{Barrier, BarrierStats, ReleaseMode};
pub use config::{BarrierConfig, ConfigError};
pub use endpoint::{MessageSink, MessageSource};
pub use error::{Error, Result, StoreError, StrategyError};
pub use lock::{LockTable, TokenPolicy};
pub use message::{Message, MessageBuilder, MessageHeaders};
pub use store::{MemoryGroupStore, MessageGroup, MessageGroupStore};
pub use strategy::{CorrelationStrategy, ReleaseStrategy};

/// Bounds every correlation key must satisfy.
///
/// Keys double as lock-table identities, so they must hash, compare and cross
/// thread boundaries.
pub trait CorrelationKey: Eq + std::hash::Hash + Clone + std::fmt::Debug + Send + Sync + 'static {}

impl<K> CorrelationKey for K where K: Eq + std::hash::Hash + Clone + std::fmt::Debug + Send + Sync + 'static {}

/// Bounds every message held by a barrier must satisfy.
///
/// Removal from a group matches by `PartialEq`, so the implementation defines
/// message identity.
pub trait GroupedMessage: Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static {}

impl<M> GroupedMessage for M where M: Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static {}
