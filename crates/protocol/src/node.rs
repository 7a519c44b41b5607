//! Computation-graph node types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reference to a node built on the remote runtime.
///
/// Nodes are owned by the connection that created them and stay valid for
/// the connection's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeHandle {
	pub guid: String,
}

impl NodeHandle {
	pub fn new(guid: impl Into<String>) -> Self {
		Self { guid: guid.into() }
	}
}

/// Parameters for `createNode`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNodeParams {
	/// Node kind, e.g. `placeholder`, `compile`, `execute`, `read_literal`
	pub kind: String,
	/// Cache key the client files this node under
	pub name: String,
	#[serde(default, skip_serializing_if = "Value::is_null")]
	pub params: Value,
}

/// Parameters for `execute`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteParams {
	/// Input node GUIDs fed to the executed node, in order
	#[serde(default)]
	pub inputs: Vec<String>,
	#[serde(default, skip_serializing_if = "Value::is_null")]
	pub options: Value,
}
