
use std::time::Duration;

use accel_runtime::SessionConfig;
use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;

/// Root CLI for accel.
#[derive(Parser, Debug)]
#[command(name = "accel")]
#[command(about = "Run requests against remote accelerator runtimes through a session pool")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: json (default) or text
	#[arg(short = 'f', long, global = true, value_enum, default_value = "json")]
	pub format: OutputFormat,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Check out a session and ping the runtime.
	Ping(PingArgs),
	/// Send one request through a pooled session.
	Exec(ExecArgs),
	/// Hammer one target with concurrent checkouts.
	Soak(SoakArgs),
}

impl Commands {
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Ping(_) => "ping",
			Commands::Exec(_) => "exec",
			Commands::Soak(_) => "soak",
		}
	}
}

/// Target and session settings shared by every command.
///
/// Flags override values read from `ACCEL_RPC_COMPRESSION`,
/// `ACCEL_RPC_COMPRESSION_LEVEL` and `ACCEL_CONNECT_TIMEOUT_MS`.
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
	/// Runtime endpoint, e.g. localhost:51000 or grpc://10.0.0.2:8470
	#[arg(short, long, value_name = "TARGET")]
	pub target: String,

	/// Frame compression: gzip, deflate or identity
	#[arg(long, value_name = "ALGORITHM")]
	pub compression: Option<String>,

	/// Compression level (0-9), used only with --compression
	#[arg(long, value_name = "LEVEL", value_parser = clap::value_parser!(i32).range(0..=9))]
	pub compression_level: Option<i32>,

	/// Connect and handshake timeout in milliseconds
	#[arg(long, value_name = "MS")]
	pub connect_timeout_ms: Option<u64>,
}

impl SessionArgs {
	/// Environment settings with any flags applied on top.
	pub fn session_config(&self) -> SessionConfig {
		self.apply(SessionConfig::from_env())
	}

	/// True when any flag changes a session setting.
	pub fn overrides_env(&self) -> bool {
		self.compression.is_some() || self.compression_level.is_some() || self.connect_timeout_ms.is_some()
	}

	pub fn apply(&self, mut config: SessionConfig) -> SessionConfig {
		if let Some(algorithm) = &self.compression {
			config = config.with_compression(algorithm.clone());
		}
		if let Some(level) = self.compression_level {
			config = config.with_compression_level(level);
		}
		if let Some(ms) = self.connect_timeout_ms {
			config = config.with_connect_timeout(Duration::from_millis(ms));
		}
		config
	}
}

#[derive(Args, Debug, Clone)]
pub struct PingArgs {
	#[command(flatten)]
	pub session: SessionArgs,

	/// Number of checkout/ping rounds
	#[arg(short = 'n', long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
	pub count: u32,
}

#[derive(Args, Debug, Clone)]
pub struct ExecArgs {
	#[command(flatten)]
	pub session: SessionArgs,

	/// Method name, e.g. execute or createNode
	#[arg(short, long, value_name = "METHOD")]
	pub method: String,

	/// JSON params for the request
	#[arg(long, value_name = "JSON")]
	pub params: Option<String>,

	/// Object the request is addressed to
	#[arg(long, value_name = "GUID", default_value = accel_protocol::ROOT_GUID)]
	pub guid: String,
}

#[derive(Args, Debug, Clone)]
pub struct SoakArgs {
	#[command(flatten)]
	pub session: SessionArgs,

	/// Concurrent workers
	#[arg(short, long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
	pub workers: u32,

	/// Checkout/ping/release rounds per worker
	#[arg(short, long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..))]
	pub rounds: u32,
}
