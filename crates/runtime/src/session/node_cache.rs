//! Per-session cache of remote graph nodes.
//!
//! Nodes are filed under a caller-chosen key and handed out in creation
//! order. A rewind makes every entry look empty again while keeping the
//! built nodes, so the next borrower of the session re-acquires them in the
//! same order instead of asking the runtime to rebuild them.

use std::collections::HashMap;

use accel_protocol::NodeHandle;

/// Nodes built under one cache key.
#[derive(Debug, Default)]
pub struct CachedNodes {
	nodes: Vec<NodeHandle>,
	position: usize,
}

impl CachedNodes {
	/// Hands out the next retained node, if any remain since the last rewind.
	pub fn next(&mut self) -> Option<NodeHandle> {
		let node = self.nodes.get(self.position)?.clone();
		self.position += 1;
		Some(node)
	}

	/// Records a freshly built node as the next live one.
	///
	/// Retained nodes not yet handed out since the last rewind stay behind
	/// it, still available to [`next`](Self::next).
	pub(crate) fn push(&mut self, node: NodeHandle) {
		self.nodes.insert(self.position, node);
		self.position += 1;
	}

	pub fn rewind(&mut self) {
		self.position = 0;
	}

	/// Nodes handed out since the last rewind.
	pub fn live(&self) -> &[NodeHandle] {
		&self.nodes[..self.position]
	}

	/// All nodes kept for reuse, live or not.
	pub fn retained(&self) -> usize {
		self.nodes.len()
	}
}

/// Node cache keyed by name.
#[derive(Debug, Default)]
pub struct NodeCache {
	entries: HashMap<String, CachedNodes>,
}

impl NodeCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn entry(&mut self, key: &str) -> &mut CachedNodes {
		self.entries.entry(key.to_string()).or_default()
	}

	pub fn get(&self, key: &str) -> Option<&CachedNodes> {
		self.entries.get(key)
	}

	pub fn rewind_all(&mut self) {
		for nodes in self.entries.values_mut() {
			nodes.rewind();
		}
	}

	/// True when no entry has handed out a node since the last rewind.
	pub fn is_rewound(&self) -> bool {
		self.entries.values().all(|nodes| nodes.position == 0)
	}

	pub fn live_len(&self) -> usize {
		self.entries.values().map(|nodes| nodes.position).sum()
	}

	pub fn retained_len(&self) -> usize {
		self.entries.values().map(CachedNodes::retained).sum()
	}
}
