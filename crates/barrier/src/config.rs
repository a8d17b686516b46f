//! Barrier configuration.

use serde::Deserialize;
use thiserror::Error;

use crate::barrier::ReleaseMode;
use crate::lock::TokenPolicy;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error parsing TOML syntax or mapping it onto the config shape.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// A value parsed but is out of range.
	#[error("invalid value for `{field}`: {reason}")]
	Invalid {
		/// Offending field name.
		field: &'static str,
		/// Why the value was rejected.
		reason: String,
	},
}

/// Tunables for one [`Barrier`](crate::Barrier).
///
/// ```toml
/// token_policy = "tolerant"
/// release_mode = "remove"
/// store_capacity = 10000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BarrierConfig {
	/// Handling of tokens forgotten while a thread waited on them.
	pub token_policy: TokenPolicy,
	/// Whether released messages leave their group or are marked in it.
	pub release_mode: ReleaseMode,
	/// Maximum number of buffered messages in the default memory store; zero means unbounded.
	pub store_capacity: usize,
}

impl Default for BarrierConfig {
	fn default() -> Self {
		Self {
			token_policy: TokenPolicy::Validated,
			release_mode: ReleaseMode::Mark,
			store_capacity: 0,
		}
	}
}

impl BarrierConfig {
	/// Parses a config from TOML; missing fields take their defaults.
	pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(src)?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_document_is_default() {
		let config = BarrierConfig::from_toml_str("").unwrap();
		assert_eq!(config, BarrierConfig::default());
		assert_eq!(config.token_policy, TokenPolicy::Validated);
		assert_eq!(config.release_mode, ReleaseMode::Mark);
	}

	#[test]
	fn parses_every_field() {
		let config =
			BarrierConfig::from_toml_str("token_policy = \"tolerant\"\nrelease_mode = \"remove\"\nstore_capacity = 64\n").unwrap();
		assert_eq!(config.token_policy, TokenPolicy::Tolerant);
		assert_eq!(config.release_mode, ReleaseMode::Remove);
		assert_eq!(config.store_capacity, 64);
	}

	#[test]
	fn rejects_unknown_fields_and_policies() {
		assert!(matches!(BarrierConfig::from_toml_str("capacity = 1"), Err(ConfigError::Toml(_))));
		assert!(matches!(BarrierConfig::from_toml_str("token_policy = \"global\""), Err(ConfigError::Toml(_))));
	}
}
