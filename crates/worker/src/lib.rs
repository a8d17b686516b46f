//! Polling driver for correlation barriers.
//!
//! The barrier never schedules its own releases. A [`Poller`] pulls from any
//! [`MessageSource`](corral_barrier::MessageSource) on a fixed cadence and
//! forwards what comes out to a bounded channel.

mod config;
mod poller;

pub use config::PollerConfig;
pub use poller::{PollReport, Poller, PollerExit, PollerHandle};
