//! Error types for the accel runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while establishing or using remote sessions.
#[derive(Debug, Error)]
pub enum Error {
	/// A brand-new session for `target` could not be established.
	#[error("Failed to connect to {target}: {reason}")]
	ConnectionFailed { target: String, reason: String },

	/// The configured compression algorithm is not supported by the transport.
	#[error("Unsupported compression algorithm '{0}' (expected gzip or deflate)")]
	UnsupportedCompression(String),

	/// Transport-level error (framing, codec, socket).
	#[error("Transport error: {0}")]
	TransportError(String),

	/// Protocol-level error (malformed or uncorrelated messages).
	#[error("Protocol error: {0}")]
	ProtocolError(String),

	/// Remote runtime error with full context.
	#[error("{name}: {message}")]
	Remote {
		/// Error type name reported by the runtime (e.g., "InvalidArgument")
		name: String,
		/// Human-readable error message
		message: String,
		/// Runtime-side stack trace (if available)
		stack: Option<String>,
	},

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	/// Timeout waiting for an operation.
	#[error("Timeout: {0}")]
	Timeout(String),

	/// Channel closed unexpectedly.
	#[error("Channel closed unexpectedly")]
	ChannelClosed,

	/// Invalid argument provided to method.
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
}

impl Error {
	pub(crate) fn connection_failed(target: &str, reason: impl std::fmt::Display) -> Self {
		Error::ConnectionFailed {
			target: target.to_string(),
			reason: reason.to_string(),
		}
	}

	/// Returns the error name if this is a Remote error.
	pub fn error_name(&self) -> Option<&str> {
		match self {
			Error::Remote { name, .. } => Some(name),
			_ => None,
		}
	}

	/// Returns the stack trace if this is a Remote error with a stack.
	pub fn stack_trace(&self) -> Option<&str> {
		match self {
			Error::Remote { stack, .. } => stack.as_deref(),
			_ => None,
		}
	}

	/// Returns true if this is a timeout error.
	pub fn is_timeout(&self) -> bool {
		match self {
			Error::Timeout(_) => true,
			Error::Remote { name, .. } => name == "DeadlineExceeded",
			_ => false,
		}
	}

	/// Returns true if session establishment failed.
	pub fn is_connection_failure(&self) -> bool {
		matches!(self, Error::ConnectionFailed { .. } | Error::UnsupportedCompression(_))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn remote_deadline_counts_as_timeout() {
		let err = Error::Remote {
			name: "DeadlineExceeded".to_string(),
			message: "execute took too long".to_string(),
			stack: None,
		};
		assert!(err.is_timeout());
		assert_eq!(err.error_name(), Some("DeadlineExceeded"));
		assert!(!err.is_connection_failure());
	}

	#[test]
	fn connection_failed_names_target() {
		let err = Error::connection_failed("host:1", "connection refused");
		assert!(err.is_connection_failure());
		assert_eq!(err.to_string(), "Failed to connect to host:1: connection refused");
	}
}
