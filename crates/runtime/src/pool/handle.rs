//! Scoped ownership of a checked-out session.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use super::CacheInner;
use crate::session::Session;

/// Exclusive handle to a checked-out [`Session`].
///
/// Dereferences to the session. When dropped, the session goes back to the
/// pool it came from; this happens exactly once, on every exit path, and is
/// skipped entirely after [`detach`](Self::detach). Handles cannot be cloned.
#[must_use = "dropping the handle immediately returns the session to the pool"]
pub struct SessionRef {
	/// `None` once the return obligation is resolved.
	cache: Option<Arc<CacheInner>>,
	session: Option<Session>,
}

impl SessionRef {
	pub(crate) fn new(cache: Arc<CacheInner>, session: Session) -> Self {
		Self {
			cache: Some(cache),
			session: Some(session),
		}
	}

	/// Returns the session to the pool now instead of at end of scope.
	pub fn release(mut self) {
		self.check_in();
	}

	/// Takes the session out of the pool's custody.
	///
	/// Nothing is returned to the pool; the caller owns the session and its
	/// connection closes when it is dropped.
	pub fn detach(mut self) -> Session {
		self.cache = None;
		match self.session.take() {
			Some(session) => session,
			None => unreachable!("live SessionRef without a session"),
		}
	}

	/// True while the handle still owes its session back to the pool.
	pub fn is_attached(&self) -> bool {
		self.cache.is_some()
	}

	fn check_in(&mut self) {
		if let (Some(cache), Some(session)) = (self.cache.take(), self.session.take()) {
			cache.checkin(session);
		}
	}
}

impl Deref for SessionRef {
	type Target = Session;

	fn deref(&self) -> &Session {
		match &self.session {
			Some(session) => session,
			None => unreachable!("live SessionRef without a session"),
		}
	}
}

impl DerefMut for SessionRef {
	fn deref_mut(&mut self) -> &mut Session {
		match &mut self.session {
			Some(session) => session,
			None => unreachable!("live SessionRef without a session"),
		}
	}
}

impl Drop for SessionRef {
	fn drop(&mut self) {
		self.check_in();
	}
}

impl std::fmt::Debug for SessionRef {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionRef")
			.field("attached", &self.is_attached())
			.field("session", &self.session)
			.finish()
	}
}
