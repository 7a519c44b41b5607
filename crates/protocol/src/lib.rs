//! Wire types for the accel remote runtime protocol.
//!
//! This crate contains the serde-serializable types exchanged between the
//! client runtime and a remote accelerator runtime. These types describe the
//! shapes of data as they appear on the wire; framing, compression and
//! request correlation live in `accel-runtime`.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! - **Pure data**: No behavior beyond serialization/deserialization
//! - **Forward compatible**: Unknown messages deserialize into a catch-all
//! - **Stable**: Changes only when the wire protocol changes

pub mod message;
pub mod node;
pub mod options;

pub use message::*;
pub use node::*;
pub use options::*;

/// GUID of the root runtime object every connection starts with.
pub const ROOT_GUID: &str = "runtime";

/// Protocol method names understood by the remote runtime.
pub mod methods {
	/// Handshake sent once per connection with the client's RPC options.
	pub const INITIALIZE: &str = "initialize";
	/// Builds a computation-graph node on the remote side.
	pub const CREATE_NODE: &str = "createNode";
	/// Runs a previously built node.
	pub const EXECUTE: &str = "execute";
	/// Liveness probe against the root object.
	pub const PING: &str = "ping";
}
