//! Structured output envelope for CLI commands.
//!
//! Every command produces a result envelope on stdout:
//!
//! ```json
//! {
//!   "ok": true,
//!   "command": "ping",
//!   "data": { ... },
//!   "timings": { "durationMs": 12 }
//! }
//! ```
//!
//! On failure `data` is replaced by `error` with a stable code.


use std::io::{self, Write};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Output format for CLI results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// JSON envelope (default)
	#[default]
	Json,
	/// Human-readable text
	Text,
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OutputFormat::Json => write!(f, "json"),
			OutputFormat::Text => write!(f, "text"),
		}
	}
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	pub ok: bool,

	/// Command name (e.g., "ping", "exec", "soak")
	pub command: String,

	/// Command-specific result data (only present on success)
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,

	/// Error information (only present on failure)
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub timings: Option<Timings>,
}

impl<T: Serialize> CommandResult<T> {
	pub fn success(command: &str, data: T, elapsed: Duration) -> Self {
		Self {
			ok: true,
			command: command.to_string(),
			data: Some(data),
			error: None,
			timings: Some(elapsed.into()),
		}
	}

	pub fn failure(command: &str, error: CommandError) -> Self {
		Self {
			ok: false,
			command: command.to_string(),
			data: None,
			error: Some(error),
			timings: None,
		}
	}
}

/// Error information for failed commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
	pub code: ErrorCode,

	pub message: String,

	/// Remote error name and stack, when the runtime reported one
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// Standardized error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	/// A new session could not be established
	ConnectionFailed,
	Timeout,
	/// The runtime rejected or failed the request
	RemoteError,
	InvalidInput,
	InternalError,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ErrorCode::ConnectionFailed => write!(f, "CONNECTION_FAILED"),
			ErrorCode::Timeout => write!(f, "TIMEOUT"),
			ErrorCode::RemoteError => write!(f, "REMOTE_ERROR"),
			ErrorCode::InvalidInput => write!(f, "INVALID_INPUT"),
			ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
		}
	}
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
	pub duration_ms: u64,
}

impl From<Duration> for Timings {
	fn from(duration: Duration) -> Self {
		Timings {
			duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
		}
	}
}

/// Prints a result envelope to stdout.
///
/// Text format prints only the data payload.
pub fn print_result<T: Serialize>(result: &CommandResult<T>, format: OutputFormat) {
	let rendered = match format {
		OutputFormat::Json => serde_json::to_string_pretty(result),
		OutputFormat::Text => match &result.data {
			Some(data) => render_text(data),
			None => return,
		},
	};

	let mut stdout = io::stdout().lock();
	match rendered {
		Ok(text) => {
			let _ = writeln!(stdout, "{text}");
		}
		Err(e) => tracing::error!(target = "accel.cli", error = %e, "failed to render output"),
	}
}

/// Renders a JSON object as `key: value` lines.
fn render_text<T: Serialize>(data: &T) -> serde_json::Result<String> {
	let value = serde_json::to_value(data)?;
	let serde_json::Value::Object(map) = value else {
		return serde_json::to_string_pretty(&value);
	};

	let lines: Vec<String> = map
		.iter()
		.map(|(key, value)| match value {
			serde_json::Value::String(s) => format!("{key}: {s}"),
			other => format!("{key}: {other}"),
		})
		.collect();
	Ok(lines.join("\n"))
}

pub fn print_error_stderr(error: &CommandError) {
	eprintln!("error[{}]: {}", error.code, error.message);
}

/// Prints a successful result in the requested format.
pub fn emit_success<T: Serialize>(command: &str, data: T, elapsed: Duration, format: OutputFormat) {
	print_result(&CommandResult::success(command, data, elapsed), format);
}
