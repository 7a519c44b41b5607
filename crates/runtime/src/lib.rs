//! Accel runtime - pooled RPC sessions to remote accelerator targets
//!
//! This crate provides the client side of the accelerator runtime protocol:
//!
//! - **Transport**: Length-prefixed frames over any async byte stream, with
//!   optional gzip/deflate compression per frame
//! - **Connection**: Request/response correlation and event handling
//! - **Session**: One open connection to a target plus its cached graph nodes
//! - **Pool**: Thread-safe `target -> idle sessions` registry with scoped,
//!   return-on-drop handles
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ SessionCache │  checkout(target) -> SessionRef
//! └──────┬───────┘
//!        │ establishes through Connector
//! ┌──────▼───────┐
//! │   Session    │  node cache, reset, execute
//! └──────┬───────┘
//!        │ Arc<dyn ConnectionLike>
//! ┌──────▼───────┐
//! │  Connection  │  request correlation
//! └──────┬───────┘
//! ┌──────▼───────┐
//! │  Transport   │  framed TCP
//! └──────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! let cache = SessionCache::global();
//! let mut session = cache.checkout("localhost:51000").await?;
//! let node = session.cached_node("matmul", "kernel", params).await?;
//! session.execute(&node, &ExecuteParams::default()).await?;
//! // session goes back to the pool here
//! ```

pub mod compression;
pub mod config;
pub mod connection;
pub mod connector;
pub mod error;
pub mod pool;
pub mod session;
pub mod transport;

pub use compression::{Codec, FrameCodec};
pub use config::SessionConfig;
pub use connection::{Connection, ConnectionLike, Event, Message, Metadata, Request, Response};
pub use connector::{Connector, TcpConnector};
pub use error::{Error, Result};
pub use pool::{SessionCache, SessionRef};
pub use session::{CachedNodes, NodeCache, Session};
pub use transport::{PipeTransport, PipeTransportReceiver, PipeTransportSender, Transport, TransportParts, TransportReceiver};
