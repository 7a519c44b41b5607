//! Process-wide pool of idle sessions keyed by target.
//!
//! [`SessionCache::checkout`] hands out a [`SessionRef`] that exclusively
//! owns one [`Session`]; dropping the handle pushes the session back onto the
//! idle stack for its target. Idle stacks are consumed LIFO so the most
//! recently used (warmest) connection is reused first.
//!
//! One mutex guards the whole target map. It is held only for stack
//! bookkeeping; establishing a new session and using a checked-out session
//! both happen outside of it.

mod handle;
#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use tracing::debug;

pub use self::handle::SessionRef;
use crate::config::SessionConfig;
use crate::connector::{Connector, TcpConnector};
use crate::error::{Error, Result};
use crate::session::Session;

static GLOBAL_CACHE: LazyLock<SessionCache> = LazyLock::new(|| SessionCache::new(Arc::new(TcpConnector), SessionConfig::from_env()));

type IdleMap = HashMap<Arc<str>, Vec<Session>>;

pub(crate) struct CacheInner {
	connector: Arc<dyn Connector>,
	config: SessionConfig,
	idle: Mutex<IdleMap>,
}

impl CacheInner {
	/// Returns `session` to the idle stack for its target.
	///
	/// The only way a session re-enters the pool.
	pub(crate) fn checkin(&self, session: Session) {
		let session_id = session.id();
		let mut idle = self.idle.lock();
		let stack = idle.entry(session.target_key()).or_default();
		stack.push(session);
		debug!(target = "accel.pool", session_id, idle = stack.len(), "session checked in");
	}
}

/// Shared pool of sessions to remote targets.
///
/// Cloning is cheap and every clone refers to the same pool.
#[derive(Clone)]
pub struct SessionCache {
	inner: Arc<CacheInner>,
}

impl SessionCache {
	pub fn new(connector: Arc<dyn Connector>, config: SessionConfig) -> Self {
		Self {
			inner: Arc::new(CacheInner {
				connector,
				config,
				idle: Mutex::new(HashMap::new()),
			}),
		}
	}

	/// The process-wide cache, dialing targets over TCP with settings read
	/// from the environment on first use.
	pub fn global() -> &'static SessionCache {
		&GLOBAL_CACHE
	}

	pub fn config(&self) -> &SessionConfig {
		&self.inner.config
	}

	/// Checks out a session for `target`, reusing an idle one when available.
	///
	/// Reused sessions are [`reset`](Session::reset) before being returned.
	/// Otherwise a new session is established without holding the pool lock,
	/// so a slow connect only delays this caller. Establishment errors are
	/// returned as-is and leave the pool untouched.
	pub async fn checkout(&self, target: &str) -> Result<SessionRef> {
		if target.is_empty() {
			return Err(Error::InvalidArgument("session target must not be empty".to_string()));
		}

		if let Some(session) = self.pop_idle(target) {
			debug!(target = "accel.pool", endpoint = target, session_id = session.id(), "reusing idle session");
			return Ok(SessionRef::new(Arc::clone(&self.inner), session));
		}

		debug!(target = "accel.pool", endpoint = target, "no idle session; establishing");
		let connection = self.inner.connector.establish(target, &self.inner.config).await?;
		let session = Session::new(target, connection);
		debug!(target = "accel.pool", endpoint = target, session_id = session.id(), "created session");

		Ok(SessionRef::new(Arc::clone(&self.inner), session))
	}

	fn pop_idle(&self, target: &str) -> Option<Session> {
		let mut idle = self.inner.idle.lock();
		let mut session = idle.get_mut(target)?.pop()?;
		session.reset();
		Some(session)
	}

	/// Number of idle sessions for `target`.
	pub fn idle_count(&self, target: &str) -> usize {
		self.inner.idle.lock().get(target).map_or(0, Vec::len)
	}

	/// Number of idle sessions across all targets.
	pub fn total_idle(&self) -> usize {
		self.inner.idle.lock().values().map(Vec::len).sum()
	}

	/// Targets that have been seen by check-in, sorted.
	pub fn targets(&self) -> Vec<String> {
		let mut targets: Vec<String> = self.inner.idle.lock().keys().map(|key| key.to_string()).collect();
		targets.sort();
		targets
	}

	/// Removes and closes every idle session, returning how many were closed.
	///
	/// Sessions currently checked out are unaffected and still return to the
	/// pool when their handles drop.
	pub fn drain(&self) -> usize {
		let drained: Vec<Session> = {
			let mut idle = self.inner.idle.lock();
			idle.drain().flat_map(|(_, stack)| stack).collect()
		};
		let count = drained.len();
		drop(drained);
		debug!(target = "accel.pool", closed = count, "drained idle sessions");
		count
	}
}

impl std::fmt::Debug for SessionCache {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionCache")
			.field("config", &self.inner.config)
			.field("idle", &self.total_idle())
			.finish_non_exhaustive()
	}
}
