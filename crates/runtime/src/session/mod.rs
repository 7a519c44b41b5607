//! A single stateful session bound to one remote target.

pub mod node_cache;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use accel_protocol::{CreateNodeParams, ExecuteParams, NodeHandle, ROOT_GUID, methods};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use self::node_cache::{CachedNodes, NodeCache};
use crate::connection::ConnectionLike;
use crate::error::Result;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Open connection to one target plus the graph nodes built against it.
///
/// A `Session` is a move-only value. Dropping it closes its connection, so
/// the pool keeps sessions alive by moving them in and out of its idle
/// stacks rather than dropping them.
pub struct Session {
	id: u64,
	target: Arc<str>,
	connection: Arc<dyn ConnectionLike>,
	node_cache: NodeCache,
	resets: u64,
}

impl Session {
	pub fn new(target: impl Into<Arc<str>>, connection: Arc<dyn ConnectionLike>) -> Self {
		Self {
			id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
			target: target.into(),
			connection,
			node_cache: NodeCache::new(),
			resets: 0,
		}
	}

	/// Process-unique session identity.
	pub fn id(&self) -> u64 {
		self.id
	}

	/// Target identifier this session is bound to, used as the pool key.
	pub fn target(&self) -> &str {
		&self.target
	}

	pub(crate) fn target_key(&self) -> Arc<str> {
		Arc::clone(&self.target)
	}

	pub fn connection(&self) -> &Arc<dyn ConnectionLike> {
		&self.connection
	}

	pub fn node_cache(&self) -> &NodeCache {
		&self.node_cache
	}

	pub fn node_cache_mut(&mut self) -> &mut NodeCache {
		&mut self.node_cache
	}

	/// Invalidates the node cache for a new borrower.
	///
	/// Local bookkeeping only; the connection is left untouched.
	pub fn reset(&mut self) {
		self.node_cache.rewind_all();
		self.resets += 1;
		tracing::trace!(target = "accel.session", session_id = self.id, resets = self.resets, "session reset");
	}

	/// Number of times [`reset`](Self::reset) has run.
	pub fn reset_count(&self) -> u64 {
		self.resets
	}

	/// Sends a method call to `guid` and decodes the response.
	pub async fn send<P: Serialize, R: DeserializeOwned>(&self, guid: &str, method: &str, params: P) -> Result<R> {
		let params_value = serde_json::to_value(params)?;
		let response = self.connection.send_message(guid, method, params_value).await?;
		serde_json::from_value(response).map_err(Into::into)
	}

	/// Liveness probe against the root runtime object.
	pub async fn ping(&self) -> Result<Value> {
		self.send(ROOT_GUID, methods::PING, Value::Null).await
	}

	/// Returns the next node cached under `key`, building it on the runtime
	/// when the cache has none left since the last reset.
	pub async fn cached_node(&mut self, key: &str, kind: &str, params: Value) -> Result<NodeHandle> {
		if let Some(node) = self.node_cache.entry(key).next() {
			return Ok(node);
		}

		let request = CreateNodeParams {
			kind: kind.to_string(),
			name: key.to_string(),
			params,
		};
		let node: NodeHandle = self.send(ROOT_GUID, methods::CREATE_NODE, request).await?;
		tracing::debug!(target = "accel.session", session_id = self.id, key, guid = %node.guid, "built node");

		self.node_cache.entry(key).push(node.clone());
		Ok(node)
	}

	/// Runs `node` with the given inputs.
	pub async fn execute(&self, node: &NodeHandle, params: &ExecuteParams) -> Result<Value> {
		self.send(&node.guid, methods::EXECUTE, params).await
	}
}

impl fmt::Debug for Session {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Session")
			.field("id", &self.id)
			.field("target", &self.target)
			.field("node_cache", &self.node_cache)
			.field("resets", &self.resets)
			.finish_non_exhaustive()
	}
}

impl Drop for Session {
	fn drop(&mut self) {
		tracing::debug!(target = "accel.session", session_id = self.id, endpoint = %self.target, "closing session");
		self.connection.close();
	}
}
