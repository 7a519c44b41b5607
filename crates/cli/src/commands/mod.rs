//! Command implementations.

mod exec;
mod ping;
mod soak;

use std::sync::Arc;

use accel_runtime::{SessionCache, TcpConnector};

use crate::cli::{Cli, Commands, SessionArgs};
use crate::error::Result;

pub async fn dispatch(cli: Cli) -> Result<()> {
	let format = cli.format;
	match cli.command {
		Commands::Ping(args) => ping::run(args, format).await,
		Commands::Exec(args) => exec::run(args, format).await,
		Commands::Soak(args) => soak::run(args, format).await,
	}
}

/// Pool for one invocation.
///
/// The process-wide cache already reflects the environment, so it is used
/// unless a flag overrides a session setting.
fn session_cache(args: &SessionArgs) -> SessionCache {
	if !args.overrides_env() {
		return SessionCache::global().clone();
	}
	let config = args.session_config();
	tracing::debug!(target = "accel.cli", ?config, "session config overridden by flags");
	SessionCache::new(Arc::new(TcpConnector), config)
}
