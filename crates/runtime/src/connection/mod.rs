//! Request/response correlation on top of a [`Transport`](crate::transport::Transport).
//!
//! It handles:
//! - Generating unique request IDs
//! - Correlating responses with pending requests
//! - Distinguishing events from responses
//! - Shutting down the message loop and failing in-flight requests on close
//!
//! # Message Flow
//!
//! 1. Caller invokes `send_message()` with GUID, method, and params
//! 2. Connection generates a unique ID and registers a oneshot channel
//! 3. Request is serialized and queued for the writer task
//! 4. The run loop receives the response from the transport
//! 5. Response is correlated by ID and delivered through the oneshot channel


use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::task::{Context, Poll};

pub use accel_protocol::{ErrorPayload, ErrorWrapper, Event, Message, Metadata, Request, Response};
use parking_lot::Mutex as ParkingLotMutex;
use serde_json::Value;
use tokio::sync::Mutex as TokioMutex;
use tokio::sync::{mpsc, oneshot, watch};

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportParts, TransportReceiver};

/// Interface sessions need from a connection.
///
/// Kept object-safe so sessions can hold `Arc<dyn ConnectionLike>` and tests
/// can substitute in-memory connections.
pub trait ConnectionLike: Send + Sync {
	/// Sends a request to the remote runtime and awaits the response.
	fn send_message(&self, guid: &str, method: &str, params: Value) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + '_>>;

	/// Stops the connection. Pending and future requests fail with
	/// [`Error::ChannelClosed`].
	///
	/// Synchronous so it can run from `Drop`.
	fn close(&self);

	fn is_closed(&self) -> bool;
}

/// Pending request callbacks keyed by request ID.
type CallbackMap = Arc<ParkingLotMutex<HashMap<u32, oneshot::Sender<Result<Value>>>>>;

/// RAII guard ensuring callback cleanup when a request future is dropped.
struct CancelGuard {
	id: u32,
	callbacks: CallbackMap,
	completed: bool,
}

impl CancelGuard {
	fn new(id: u32, callbacks: CallbackMap) -> Self {
		Self {
			id,
			callbacks,
			completed: false,
		}
	}

	fn complete(&mut self) {
		self.completed = true;
	}
}

impl Drop for CancelGuard {
	fn drop(&mut self) {
		if self.completed {
			return;
		}
		if self.callbacks.lock().remove(&self.id).is_some() {
			tracing::debug!(target = "accel.connection", id = self.id, "removed orphaned callback");
		}
	}
}

/// Future returned by [`Connection::send_message`] with automatic cancellation cleanup.
struct ResponseFuture {
	rx: oneshot::Receiver<Result<Value>>,
	guard: CancelGuard,
}

impl Future for ResponseFuture {
	type Output = Result<Value>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(result) => {
				self.guard.complete();
				Poll::Ready(result.map_err(|_| Error::ChannelClosed).and_then(|r| r))
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

/// Resolves once `rx` observes `true` or its sender is gone.
async fn closed(mut rx: watch::Receiver<bool>) {
	while !*rx.borrow_and_update() {
		if rx.changed().await.is_err() {
			return;
		}
	}
}

/// Connection to one remote runtime.
///
/// Uses sequential request IDs and oneshot channels for correlation.
pub struct Connection {
	/// Sequential request ID counter
	last_id: AtomicU32,
	/// Pending request callbacks keyed by request ID
	callbacks: CallbackMap,
	/// Channel for sending outbound messages to the writer task
	outbound_tx: mpsc::UnboundedSender<Value>,
	/// Transport halves and channels, taken once by run()
	transport_sender: TokioMutex<Option<Box<dyn Transport>>>,
	transport_receiver: TokioMutex<Option<Box<dyn TransportReceiver>>>,
	outbound_rx: TokioMutex<Option<mpsc::UnboundedReceiver<Value>>>,
	message_rx: TokioMutex<Option<mpsc::UnboundedReceiver<Value>>>,
	/// Flips to `true` exactly once, on close or transport EOF
	shutdown: watch::Sender<bool>,
}

impl Connection {
	/// Creates a new Connection with the given transport.
	pub fn new(parts: TransportParts) -> Self {
		let TransportParts {
			sender,
			receiver,
			message_rx,
		} = parts;

		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
		let (shutdown, _) = watch::channel(false);

		Self {
			last_id: AtomicU32::new(0),
			callbacks: Arc::new(ParkingLotMutex::new(HashMap::new())),
			outbound_tx,
			transport_sender: TokioMutex::new(Some(sender)),
			transport_receiver: TokioMutex::new(Some(receiver)),
			outbound_rx: TokioMutex::new(Some(outbound_rx)),
			message_rx: TokioMutex::new(Some(message_rx)),
			shutdown,
		}
	}

	/// Sends a request to the remote runtime and awaits the response.
	pub async fn send_message(&self, guid: &str, method: &str, params: Value) -> Result<Value> {
		if self.is_closed() {
			return Err(Error::ChannelClosed);
		}

		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		tracing::debug!(target = "accel.connection", id, guid, method, "sending request");

		let (tx, rx) = oneshot::channel();
		self.callbacks.lock().insert(id, tx);
		let guard = CancelGuard::new(id, Arc::clone(&self.callbacks));

		// close() flips the flag before draining callbacks, so a request
		// registered after the drain is caught here.
		if self.is_closed() {
			return Err(Error::ChannelClosed);
		}

		let request = Request {
			id,
			guid: Arc::from(guid),
			method: method.to_string(),
			params,
			metadata: Metadata::now(),
		};
		let request_value = serde_json::to_value(&request)?;

		if self.outbound_tx.send(request_value).is_err() {
			tracing::error!(target = "accel.connection", "failed to queue request: outbound channel closed");
			return Err(Error::ChannelClosed);
		}

		ResponseFuture { rx, guard }.await
	}

	/// Runs the message dispatch loop until close or transport EOF.
	pub async fn run(self: &Arc<Self>) {
		let transport_receiver = self.transport_receiver.lock().await.take();
		let transport_sender = self.transport_sender.lock().await.take();
		let outbound_rx = self.outbound_rx.lock().await.take();
		let message_rx = self.message_rx.lock().await.take();

		let (Some(transport_receiver), Some(mut transport_sender), Some(mut outbound_rx), Some(mut message_rx)) =
			(transport_receiver, transport_sender, outbound_rx, message_rx)
		else {
			tracing::warn!(target = "accel.connection", "run() called more than once; ignoring");
			return;
		};

		let reader_handle = tokio::spawn(async move {
			if let Err(e) = transport_receiver.run().await {
				tracing::debug!(target = "accel.connection", error = %e, "transport reader stopped");
			}
		});

		let writer_shutdown = closed(self.shutdown.subscribe());
		let writer_handle = tokio::spawn(async move {
			tokio::pin!(writer_shutdown);
			loop {
				tokio::select! {
					biased;
					_ = &mut writer_shutdown => break,
					message = outbound_rx.recv() => {
						let Some(message) = message else { break };
						if let Err(e) = transport_sender.send(message).await {
							tracing::error!(target = "accel.connection", error = %e, "transport write error");
							break;
						}
					}
				}
			}
		});

		let shutdown = closed(self.shutdown.subscribe());
		tokio::pin!(shutdown);
		loop {
			tokio::select! {
				biased;
				_ = &mut shutdown => break,
				message = message_rx.recv() => {
					let Some(message_value) = message else {
						tracing::debug!(target = "accel.connection", "transport closed by peer");
						break;
					};
					match serde_json::from_value::<Message>(message_value) {
						Ok(message) => {
							if let Err(e) = self.dispatch_internal(message) {
								tracing::error!(target = "accel.connection", error = %e, "error dispatching message");
							}
						}
						Err(e) => tracing::error!(target = "accel.connection", error = %e, "failed to parse message"),
					}
				}
			}
		}

		self.close();
		reader_handle.abort();
		let _ = writer_handle.await;
	}

	/// Dispatches an incoming message (test-only public version).
	#[cfg(test)]
	pub fn dispatch(&self, message: Message) -> Result<()> {
		self.dispatch_internal(message)
	}

	fn dispatch_internal(&self, message: Message) -> Result<()> {
		match message {
			Message::Response(response) => {
				let callback = self.callbacks.lock().remove(&response.id).ok_or_else(|| {
					Error::ProtocolError(format!("Cannot find request to respond: id={}", response.id))
				})?;

				let result = match response.error {
					Some(error_wrapper) => Err(parse_protocol_error(error_wrapper.error)),
					None => Ok(response.result.unwrap_or(Value::Null)),
				};

				let _ = callback.send(result);
				Ok(())
			}
			Message::Event(event) => {
				tracing::debug!(
					target = "accel.connection",
					guid = %event.guid,
					method = %event.method,
					"runtime event"
				);
				Ok(())
			}
			Message::Unknown(value) => {
				tracing::debug!(
					target = "accel.connection",
					message = %value,
					"unknown message type (forward-compatible, ignored)"
				);
				Ok(())
			}
		}
	}

	/// Number of requests awaiting a response.
	pub fn pending_requests(&self) -> usize {
		self.callbacks.lock().len()
	}
}

/// Converts an [`ErrorPayload`] from the runtime into [`Error::Remote`].
fn parse_protocol_error(error: ErrorPayload) -> Error {
	Error::Remote {
		name: error.name.unwrap_or_else(|| "Error".to_string()),
		message: error.message,
		stack: error.stack,
	}
}

impl ConnectionLike for Connection {
	fn send_message(&self, guid: &str, method: &str, params: Value) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + '_>> {
		let guid = guid.to_string();
		let method = method.to_string();
		Box::pin(async move { Connection::send_message(self, &guid, &method, params).await })
	}

	fn close(&self) {
		if self.shutdown.send_replace(true) {
			return;
		}
		let dropped = std::mem::take(&mut *self.callbacks.lock());
		tracing::debug!(target = "accel.connection", pending = dropped.len(), "connection closed");
	}

	fn is_closed(&self) -> bool {
		*self.shutdown.borrow()
	}
}
