use thiserror::Error;

use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error(transparent)]
	Runtime(#[from] accel_runtime::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl CliError {
	pub fn code(&self) -> ErrorCode {
		match self {
			CliError::InvalidInput(_) | CliError::Json(_) => ErrorCode::InvalidInput,
			CliError::Runtime(err) if err.is_connection_failure() => ErrorCode::ConnectionFailed,
			CliError::Runtime(err) if err.is_timeout() => ErrorCode::Timeout,
			CliError::Runtime(accel_runtime::Error::Remote { .. }) => ErrorCode::RemoteError,
			CliError::Runtime(accel_runtime::Error::InvalidArgument(_)) => ErrorCode::InvalidInput,
			CliError::Runtime(_) | CliError::Anyhow(_) => ErrorCode::InternalError,
		}
	}

	/// Converts to the structured error carried in the output envelope.
	pub fn to_command_error(&self) -> CommandError {
		let details = match self {
			CliError::Runtime(err) => err.error_name().map(|name| {
				serde_json::json!({
					"name": name,
					"stack": err.stack_trace(),
				})
			}),
			_ => None,
		};

		CommandError {
			code: self.code(),
			message: self.to_string(),
			details,
		}
	}
}
