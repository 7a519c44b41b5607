//! Establishing connections for new sessions.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use accel_protocol::{InitializeParams, InitializeResult, ROOT_GUID, methods};
use tokio::net::TcpStream;

use crate::compression::FrameCodec;
use crate::config::SessionConfig;
use crate::connection::{Connection, ConnectionLike};
use crate::error::{Error, Result};
use crate::transport::PipeTransport;

/// Name announced to the runtime during the handshake.
pub const CLIENT_NAME: &str = "accel-rs";

/// Creates the connection a brand-new session wraps.
///
/// Called by the pool without holding its lock, so implementations may block
/// on network I/O.
pub trait Connector: Send + Sync {
	fn establish<'a>(
		&'a self,
		target: &'a str,
		config: &'a SessionConfig,
	) -> Pin<Box<dyn Future<Output = Result<Arc<dyn ConnectionLike>>> + Send + 'a>>;
}

/// Dials `host:port` targets over TCP and performs the `initialize` handshake.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl TcpConnector {
	async fn connect(target: &str, config: &SessionConfig) -> Result<Arc<dyn ConnectionLike>> {
		let codec = FrameCodec::from_config(config)?;
		let address = dial_address(target);
		if address.is_empty() {
			return Err(Error::connection_failed(target, "missing host:port"));
		}

		let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(address))
			.await
			.map_err(|_| Error::connection_failed(target, format!("timed out after {}ms", config.connect_timeout.as_millis())))?
			.map_err(|e| Error::connection_failed(target, e))?;
		stream.set_nodelay(true).map_err(|e| Error::connection_failed(target, e))?;

		let (read_half, write_half) = stream.into_split();
		let (transport, message_rx) = PipeTransport::with_codec(write_half, read_half, codec);
		let connection = Arc::new(Connection::new(transport.into_transport_parts(message_rx)));
		let guard = CloseGuard::new(Arc::clone(&connection));

		let runner = Arc::clone(&connection);
		tokio::spawn(async move { runner.run().await });

		let params = serde_json::to_value(InitializeParams {
			client_name: CLIENT_NAME.to_string(),
			client_version: env!("CARGO_PKG_VERSION").to_string(),
			rpc_options: config.rpc_options(),
		})?;

		let result = tokio::time::timeout(config.connect_timeout, connection.send_message(ROOT_GUID, methods::INITIALIZE, params))
			.await
			.map_err(|_| Error::connection_failed(target, "handshake timed out"))?
			.map_err(|e| Error::connection_failed(target, format!("handshake failed: {e}")))?;
		guard.disarm();

		let info = match serde_json::from_value::<InitializeResult>(result) {
			Ok(info) => info,
			Err(e) => {
				tracing::warn!(target = "accel.connector", endpoint = target, error = %e, "malformed initialize result");
				InitializeResult::default()
			}
		};
		tracing::info!(
			target = "accel.connector",
			endpoint = target,
			runtime_version = info.runtime_version.as_deref().unwrap_or("unknown"),
			devices = ?info.devices,
			compression = ?codec.codec(),
			"session established"
		);

		Ok(connection)
	}
}

/// Closes a half-established connection unless disarmed.
///
/// Covers handshake failure and the establishing future being dropped
/// mid-handshake, both of which would otherwise leave the run loop and
/// socket alive.
struct CloseGuard {
	connection: Option<Arc<Connection>>,
}

impl CloseGuard {
	fn new(connection: Arc<Connection>) -> Self {
		Self {
			connection: Some(connection),
		}
	}

	fn disarm(mut self) {
		self.connection = None;
	}
}

impl Drop for CloseGuard {
	fn drop(&mut self) {
		if let Some(connection) = self.connection.take() {
			tracing::debug!(target = "accel.connector", "abandoning unfinished handshake");
			connection.close();
		}
	}
}

impl Connector for TcpConnector {
	fn establish<'a>(
		&'a self,
		target: &'a str,
		config: &'a SessionConfig,
	) -> Pin<Box<dyn Future<Output = Result<Arc<dyn ConnectionLike>>> + Send + 'a>> {
		Box::pin(Self::connect(target, config))
	}
}

/// Socket address for `target`, without a `grpc://` or `tcp://` scheme.
///
/// Only used for dialing; the pool keys sessions by the verbatim target.
pub fn dial_address(target: &str) -> &str {
	target
		.strip_prefix("grpc://")
		.or_else(|| target.strip_prefix("tcp://"))
		.unwrap_or(target)
		.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;

	#[test]
	fn dial_address_strips_known_schemes() {
		assert_eq!(dial_address("grpc://localhost:51000"), "localhost:51000");
		assert_eq!(dial_address("tcp://10.0.0.2:8470/"), "10.0.0.2:8470");
		assert_eq!(dial_address("host:1"), "host:1");
	}

	#[tokio::test]
	async fn unsupported_compression_fails_before_dialing() {
		let config = SessionConfig::default().with_compression("snappy");
		let err = TcpConnector.establish("127.0.0.1:1", &config).await.err().unwrap();
		assert!(matches!(err, Error::UnsupportedCompression(_)));
	}

	#[tokio::test]
	async fn refused_connection_is_a_connection_failure() {
		// Bind then drop to get a local port with nothing listening.
		let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
		let address = listener.local_addr().unwrap().to_string();
		drop(listener);

		let config = SessionConfig::default().with_connect_timeout(Duration::from_secs(2));
		let err = TcpConnector.establish(&address, &config).await.err().unwrap();
		assert!(err.is_connection_failure(), "unexpected error: {err:?}");
	}

	#[tokio::test]
	async fn schemeless_empty_target_is_rejected() {
		let err = TcpConnector.establish("grpc://", &SessionConfig::default()).await.err().unwrap();
		assert!(err.is_connection_failure());
	}
}
