//! Session construction settings.
//!
//! Settings are read from the process environment once per
//! [`SessionCache`](crate::pool::SessionCache) and forwarded verbatim to the
//! connector whenever a new session is established.

use std::time::Duration;

use accel_protocol::{DEFAULT_COMPRESSION_LEVEL, RpcOptions};
use tracing::warn;

/// Wire compression algorithm (`gzip` or `deflate`). Unset disables compression.
pub const COMPRESSION_ENV: &str = "ACCEL_RPC_COMPRESSION";
/// Compression level used when [`COMPRESSION_ENV`] is set.
pub const COMPRESSION_LEVEL_ENV: &str = "ACCEL_RPC_COMPRESSION_LEVEL";
/// Connect timeout in milliseconds for new sessions.
pub const CONNECT_TIMEOUT_ENV: &str = "ACCEL_CONNECT_TIMEOUT_MS";

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Inputs to session creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
	/// Compression algorithm name, forwarded uninterpreted to the transport.
	pub compression: Option<String>,
	pub compression_level: i32,
	pub connect_timeout: Duration,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			compression: None,
			compression_level: DEFAULT_COMPRESSION_LEVEL,
			connect_timeout: DEFAULT_CONNECT_TIMEOUT,
		}
	}
}

impl SessionConfig {
	/// Reads settings from the process environment.
	pub fn from_env() -> Self {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Reads settings through `lookup`, falling back to defaults for unset or
	/// unparsable values.
	pub fn from_lookup<F>(lookup: F) -> Self
	where
		F: Fn(&str) -> Option<String>,
	{
		let mut config = Self::default();

		config.compression = lookup(COMPRESSION_ENV)
			.map(|value| value.trim().to_string())
			.filter(|value| !value.is_empty());

		if let Some(raw) = lookup(COMPRESSION_LEVEL_ENV) {
			match raw.trim().parse::<i32>() {
				Ok(level) => config.compression_level = level,
				Err(_) => warn!(
					target = "accel.config",
					var = COMPRESSION_LEVEL_ENV,
					value = %raw,
					"ignoring invalid compression level"
				),
			}
		}

		if let Some(raw) = lookup(CONNECT_TIMEOUT_ENV) {
			match raw.trim().parse::<u64>() {
				Ok(ms) => config.connect_timeout = Duration::from_millis(ms),
				Err(_) => warn!(
					target = "accel.config",
					var = CONNECT_TIMEOUT_ENV,
					value = %raw,
					"ignoring invalid connect timeout"
				),
			}
		}

		config
	}

	/// Sets the compression algorithm.
	pub fn with_compression(mut self, algorithm: impl Into<String>) -> Self {
		self.compression = Some(algorithm.into());
		self
	}

	/// Sets the compression level.
	pub fn with_compression_level(mut self, level: i32) -> Self {
		self.compression_level = level;
		self
	}

	/// Sets the connect timeout.
	pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
		self.connect_timeout = timeout;
		self
	}

	/// Options announced to the runtime during the handshake.
	///
	/// The level is only sent alongside an algorithm.
	pub fn rpc_options(&self) -> RpcOptions {
		match &self.compression {
			Some(algorithm) => RpcOptions {
				compression_algorithm: Some(algorithm.clone()),
				compression_level: Some(self.compression_level),
			},
			None => RpcOptions::default(),
		}
	}
}
