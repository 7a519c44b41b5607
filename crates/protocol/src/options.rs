//! Connection handshake options.

use serde::{Deserialize, Serialize};

/// Default compression level applied when an algorithm is configured.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// RPC channel options negotiated at connection time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcOptions {
	/// Wire compression scheme (`gzip` or `deflate`)
	#[serde(skip_serializing_if = "Option::is_none")]
	pub compression_algorithm: Option<String>,
	/// Compression level, only meaningful with an algorithm set
	#[serde(skip_serializing_if = "Option::is_none")]
	pub compression_level: Option<i32>,
}

/// Parameters for the `initialize` handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
	pub client_name: String,
	pub client_version: String,
	#[serde(default)]
	pub rpc_options: RpcOptions,
}

/// Result of the `initialize` handshake.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
	#[serde(default)]
	pub runtime_version: Option<String>,
	/// Devices the runtime exposes, e.g. `TPU:0`
	#[serde(default)]
	pub devices: Vec<String>,
}
