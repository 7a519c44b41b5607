use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use accel_protocol::NodeHandle;
use serde_json::Value;
use tokio::sync::{Barrier, Semaphore};

use super::*;
use crate::connection::ConnectionLike;

#[derive(Default)]
struct FakeConnection {
	closed: AtomicBool,
}

impl ConnectionLike for FakeConnection {
	fn send_message(&self, _guid: &str, method: &str, _params: Value) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + '_>> {
		let method = method.to_string();
		Box::pin(async move {
			if self.is_closed() {
				return Err(Error::ChannelClosed);
			}
			Ok(serde_json::json!({ "method": method }))
		})
	}

	fn close(&self) {
		self.closed.store(true, Ordering::SeqCst);
	}

	fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}
}

/// In-memory connector that counts establishments and can be made to fail
/// or to block on one target.
struct FakeConnector {
	established: AtomicUsize,
	fail: AtomicBool,
	delay: Duration,
	gated_target: Option<&'static str>,
	gate: Semaphore,
	connections: parking_lot::Mutex<Vec<Arc<FakeConnection>>>,
}

impl FakeConnector {
	fn new() -> Self {
		Self {
			established: AtomicUsize::new(0),
			fail: AtomicBool::new(false),
			delay: Duration::ZERO,
			gated_target: None,
			gate: Semaphore::new(0),
			connections: parking_lot::Mutex::new(Vec::new()),
		}
	}

	fn with_delay(mut self, delay: Duration) -> Self {
		self.delay = delay;
		self
	}

	fn gated_on(mut self, target: &'static str) -> Self {
		self.gated_target = Some(target);
		self
	}

	fn established(&self) -> usize {
		self.established.load(Ordering::SeqCst)
	}

	fn closed_connections(&self) -> usize {
		self.connections.lock().iter().filter(|c| c.is_closed()).count()
	}
}

impl Connector for FakeConnector {
	fn establish<'a>(
		&'a self,
		target: &'a str,
		_config: &'a SessionConfig,
	) -> Pin<Box<dyn Future<Output = Result<Arc<dyn ConnectionLike>>> + Send + 'a>> {
		Box::pin(async move {
			if self.gated_target == Some(target) {
				let permit = self.gate.acquire().await.map_err(|e| Error::connection_failed(target, e))?;
				permit.forget();
			}
			if !self.delay.is_zero() {
				tokio::time::sleep(self.delay).await;
			}
			if self.fail.load(Ordering::SeqCst) {
				return Err(Error::connection_failed(target, "connection refused"));
			}
			self.established.fetch_add(1, Ordering::SeqCst);
			let connection = Arc::new(FakeConnection::default());
			self.connections.lock().push(Arc::clone(&connection));
			Ok(connection as Arc<dyn ConnectionLike>)
		})
	}
}

fn cache_with(connector: FakeConnector) -> (SessionCache, Arc<FakeConnector>) {
	let connector = Arc::new(connector);
	let cache = SessionCache::new(Arc::clone(&connector) as Arc<dyn Connector>, SessionConfig::default());
	(cache, connector)
}

fn cache() -> (SessionCache, Arc<FakeConnector>) {
	cache_with(FakeConnector::new())
}

#[tokio::test]
async fn fresh_checkout_creates_session_for_target() {
	let (cache, connector) = cache();

	let session = cache.checkout("host:1").await.unwrap();
	assert_eq!(session.target(), "host:1");
	assert_eq!(session.reset_count(), 0);
	assert!(session.node_cache().is_rewound());
	assert!(session.is_attached());
	assert_eq!(connector.established(), 1);
	assert_eq!(cache.idle_count("host:1"), 0);
}

#[tokio::test]
async fn released_session_is_reused_after_reset() {
	let (cache, connector) = cache();

	let first_id = {
		let mut session = cache.checkout("host:1").await.unwrap();
		session.node_cache_mut().entry("execute").push(NodeHandle::new("node@1"));
		assert_eq!(session.node_cache().live_len(), 1);
		session.id()
	};
	assert_eq!(cache.idle_count("host:1"), 1);

	let other = cache.checkout("host:2").await.unwrap();
	assert_ne!(other.id(), first_id);
	assert_eq!(other.target(), "host:2");

	let session = cache.checkout("host:1").await.unwrap();
	assert_eq!(session.id(), first_id);
	assert_eq!(session.reset_count(), 1);
	assert!(session.node_cache().is_rewound());
	assert_eq!(session.node_cache().retained_len(), 1);
	drop(session);

	let session = cache.checkout("host:1").await.unwrap();
	assert_eq!(session.id(), first_id);
	assert_eq!(session.reset_count(), 2);
	assert_eq!(connector.established(), 2);
}

#[tokio::test]
async fn idle_sessions_are_reused_lifo() {
	let (cache, _) = cache();

	let s1 = cache.checkout("host:1").await.unwrap();
	let s2 = cache.checkout("host:1").await.unwrap();
	let (id1, id2) = (s1.id(), s2.id());
	drop(s1);
	drop(s2);

	let next = cache.checkout("host:1").await.unwrap();
	assert_eq!(next.id(), id2);
	let after = cache.checkout("host:1").await.unwrap();
	assert_eq!(after.id(), id1);
}

#[tokio::test]
async fn targets_are_isolated_partitions() {
	let (cache, connector) = cache();

	drop(cache.checkout("host:B").await.unwrap());
	assert_eq!(cache.idle_count("host:B"), 1);

	let a = cache.checkout("host:A").await.unwrap();
	assert_eq!(a.target(), "host:A");
	assert_eq!(cache.idle_count("host:B"), 1);
	assert_eq!(connector.established(), 2);

	// Spelling differences are distinct partitions.
	let spelled = cache.checkout("grpc://host:B").await.unwrap();
	assert_eq!(spelled.target(), "grpc://host:B");
	assert_eq!(cache.idle_count("host:B"), 1);
}

#[tokio::test]
async fn moved_handle_returns_exactly_once() {
	let (cache, _) = cache();

	let handle = cache.checkout("host:1").await.unwrap();
	let moved = handle;
	let held = vec![moved];
	assert_eq!(cache.idle_count("host:1"), 0);
	drop(held);
	assert_eq!(cache.idle_count("host:1"), 1);

	fn consume(handle: SessionRef) -> u64 {
		handle.id()
	}
	let handle = cache.checkout("host:1").await.unwrap();
	consume(handle);
	assert_eq!(cache.idle_count("host:1"), 1);
}

#[tokio::test]
async fn reassigning_a_handle_returns_the_previous_session() {
	let (cache, _) = cache();

	let mut handle = cache.checkout("host:1").await.unwrap();
	let first = handle.id();
	handle = cache.checkout("host:1").await.unwrap();
	assert_ne!(handle.id(), first);
	assert_eq!(cache.idle_count("host:1"), 1);

	drop(handle);
	assert_eq!(cache.idle_count("host:1"), 2);
}

#[tokio::test]
async fn release_returns_early() {
	let (cache, _) = cache();

	let handle = cache.checkout("host:1").await.unwrap();
	handle.release();
	assert_eq!(cache.idle_count("host:1"), 1);
}

#[tokio::test]
async fn detached_session_is_never_returned() {
	let (cache, connector) = cache();

	let handle = cache.checkout("host:1").await.unwrap();
	let session = handle.detach();
	assert_eq!(cache.idle_count("host:1"), 0);
	assert_eq!(connector.closed_connections(), 0);

	drop(session);
	assert_eq!(cache.idle_count("host:1"), 0);
	assert_eq!(connector.closed_connections(), 1);
}

#[tokio::test]
async fn early_return_and_error_paths_return_session() {
	let (cache, _) = cache();

	async fn run(cache: &SessionCache, fail: bool) -> Result<u64> {
		let session = cache.checkout("host:1").await?;
		if fail {
			return Err(Error::InvalidArgument("rejected".to_string()));
		}
		session.ping().await?;
		Ok(session.id())
	}

	let id = run(&cache, false).await.unwrap();
	assert_eq!(cache.idle_count("host:1"), 1);

	assert!(run(&cache, true).await.is_err());
	assert_eq!(cache.idle_count("host:1"), 1);
	assert_eq!(cache.checkout("host:1").await.unwrap().id(), id);
}

#[tokio::test]
async fn panicking_scope_still_returns_session() {
	let (cache, _) = cache();

	let handle = cache.checkout("host:1").await.unwrap();
	let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
		let _session = handle;
		panic!("kernel builder failed");
	}));
	assert!(result.is_err());
	assert_eq!(cache.idle_count("host:1"), 1);
}

#[tokio::test]
async fn failed_creation_leaves_pool_intact() {
	let (cache, connector) = cache();

	drop(cache.checkout("host:1").await.unwrap());
	connector.fail.store(true, Ordering::SeqCst);

	let err = cache.checkout("host:2").await.unwrap_err();
	assert!(err.is_connection_failure());
	assert_eq!(cache.idle_count("host:2"), 0);
	assert_eq!(cache.targets(), vec!["host:1".to_string()]);

	// Reuse never dials, so it keeps working.
	let session = cache.checkout("host:1").await.unwrap();
	assert_eq!(session.reset_count(), 1);
}

#[tokio::test]
async fn empty_target_is_rejected() {
	let (cache, connector) = cache();

	let err = cache.checkout("").await.unwrap_err();
	assert!(matches!(err, Error::InvalidArgument(_)));
	assert_eq!(connector.established(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_checkouts_of_empty_pool_get_distinct_sessions() {
	let (cache, connector) = cache_with(FakeConnector::new().with_delay(Duration::from_millis(20)));
	let barrier = Arc::new(Barrier::new(2));

	let spawn = |cache: SessionCache, barrier: Arc<Barrier>| {
		tokio::spawn(async move {
			let session = cache.checkout("host:1").await.unwrap();
			// Both sessions are held at the same time.
			barrier.wait().await;
			session.id()
		})
	};
	let a = spawn(cache.clone(), Arc::clone(&barrier));
	let b = spawn(cache.clone(), Arc::clone(&barrier));

	let (a, b) = (a.await.unwrap(), b.await.unwrap());
	assert_ne!(a, b);
	assert_eq!(connector.established(), 2);
	assert_eq!(cache.idle_count("host:1"), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn no_session_is_shared_by_live_handles() {
	let (cache, connector) = cache();
	let live: Arc<parking_lot::Mutex<HashSet<u64>>> = Arc::default();

	let mut tasks = Vec::new();
	for worker in 0..8 {
		let cache = cache.clone();
		let live = Arc::clone(&live);
		tasks.push(tokio::spawn(async move {
			let target = if worker % 2 == 0 { "host:1" } else { "host:2" };
			for _ in 0..50 {
				let session = cache.checkout(target).await.unwrap();
				assert_eq!(session.target(), target);
				assert!(session.node_cache().is_rewound());
				assert!(live.lock().insert(session.id()), "session {} handed out twice", session.id());
				tokio::task::yield_now().await;
				live.lock().remove(&session.id());
			}
		}));
	}
	for task in tasks {
		task.await.unwrap();
	}

	assert!(live.lock().is_empty());
	assert_eq!(cache.total_idle(), connector.established());
	assert!(connector.established() <= 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_creation_does_not_block_other_checkouts() {
	let (cache, connector) = cache_with(FakeConnector::new().gated_on("host:slow"));
	drop(cache.checkout("host:fast").await.unwrap());

	let slow = {
		let cache = cache.clone();
		tokio::spawn(async move { cache.checkout("host:slow").await.map(|s| s.id()) })
	};
	tokio::task::yield_now().await;

	let fast = tokio::time::timeout(Duration::from_secs(2), cache.checkout("host:fast")).await;
	assert!(fast.is_ok(), "checkout for an idle target waited on a slow connect");
	drop(fast);
	assert_eq!(cache.idle_count("host:fast"), 1);

	connector.gate.add_permits(1);
	slow.await.unwrap().unwrap();
	assert_eq!(cache.idle_count("host:slow"), 1);
}

#[tokio::test]
async fn drain_closes_idle_sessions_only() {
	let (cache, connector) = cache();

	let held = cache.checkout("host:1").await.unwrap();
	drop(cache.checkout("host:2").await.unwrap());
	assert_eq!(cache.total_idle(), 1);

	assert_eq!(cache.drain(), 1);
	assert_eq!(cache.total_idle(), 0);
	assert_eq!(connector.closed_connections(), 1);
	assert!(!held.connection().is_closed());

	drop(held);
	assert_eq!(cache.idle_count("host:1"), 1);
}

#[tokio::test]
async fn reused_session_replays_cached_nodes() {
	let (cache, _) = cache();

	let mut session = cache.checkout("host:1").await.unwrap();
	session.node_cache_mut().entry("compile").push(NodeHandle::new("node@compile"));
	drop(session);

	let mut session = cache.checkout("host:1").await.unwrap();
	let node = session.cached_node("compile", "compile", Value::Null).await.unwrap();
	assert_eq!(node, NodeHandle::new("node@compile"));
	assert_eq!(session.node_cache().live_len(), 1);
}
