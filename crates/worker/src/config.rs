use std::time::Duration;

use corral_barrier::ConfigError;
use serde::Deserialize;

/// Cadence and batching for a [`Poller`](crate::Poller).
///
/// ```toml
/// interval_ms = 50
/// max_messages_per_poll = 32
/// error_backoff_ms = 1000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollerConfig {
	/// Delay between polls.
	pub interval_ms: u64,
	/// Upper bound on pulls per poll; a poll also ends at the first empty pull.
	pub max_messages_per_poll: usize,
	/// Extra pause after a pull fails.
	pub error_backoff_ms: u64,
}

impl Default for PollerConfig {
	fn default() -> Self {
		Self {
			interval_ms: 100,
			max_messages_per_poll: 1,
			error_backoff_ms: 1_000,
		}
	}
}

impl PollerConfig {
	/// Parses and validates a config from TOML; missing fields take their defaults.
	pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(src)?;
		config.validate()?;
		Ok(config)
	}

	/// Rejects values the poll loop cannot run with.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.interval_ms == 0 {
			return Err(ConfigError::Invalid {
				field: "interval_ms",
				reason: "must be at least 1".into(),
			});
		}
		if self.max_messages_per_poll == 0 {
			return Err(ConfigError::Invalid {
				field: "max_messages_per_poll",
				reason: "must be at least 1".into(),
			});
		}
		Ok(())
	}

	/// Delay between polls.
	pub fn interval(&self) -> Duration {
		Duration::from_millis(self.interval_ms)
	}

	/// Extra pause after a pull fails.
	pub fn error_backoff(&self) -> Duration {
		Duration::from_millis(self.error_backoff_ms)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_pull_one_message_per_poll() {
		let config = PollerConfig::from_toml_str("").unwrap();
		assert_eq!(config, PollerConfig::default());
		assert_eq!(config.interval(), Duration::from_millis(100));
		assert_eq!(config.max_messages_per_poll, 1);
	}

	#[test]
	fn parses_overrides() {
		let config = PollerConfig::from_toml_str("interval_ms = 5\nmax_messages_per_poll = 8\nerror_backoff_ms = 20\n").unwrap();
		assert_eq!(config.interval(), Duration::from_millis(5));
		assert_eq!(config.max_messages_per_poll, 8);
		assert_eq!(config.error_backoff(), Duration::from_millis(20));
	}

	#[test]
	fn rejects_zero_interval_and_batch() {
		let err = PollerConfig::from_toml_str("interval_ms = 0").unwrap_err();
		assert!(matches!(err, ConfigError::Invalid { field: "interval_ms", .. }));

		let err = PollerConfig::from_toml_str("max_messages_per_poll = 0").unwrap_err();
		assert!(matches!(err, ConfigError::Invalid {
			field: "max_messages_per_poll",
			..
		}));
	}
}
