//! Framed message transport.
//!
//! Frames are `[u32 little-endian payload length][u8 codec tag][payload]`,
//! where the payload is one JSON message, optionally compressed (see
//! [`crate::compression`]). The same framing runs over TCP halves in
//! production and over in-memory duplex pipes in tests.


use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::compression::{self, FrameCodec};
use crate::error::{Error, Result};

/// Frames larger than this are treated as corrupt.
pub const MAX_FRAME_LEN: usize = 512 * 1024 * 1024;

/// Sending half of a transport.
pub trait Transport: Send {
	/// Writes one message frame.
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Receiving half of a transport.
///
/// `run` reads frames until the peer closes the stream or the message
/// receiver is dropped.
pub trait TransportReceiver: Send {
	fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>;
}

/// Both halves plus the channel decoded messages are delivered on.
pub struct TransportParts {
	pub sender: Box<dyn Transport>,
	pub receiver: Box<dyn TransportReceiver>,
	pub message_rx: mpsc::UnboundedReceiver<Value>,
}

/// Length-prefixed transport over an async reader/writer pair.
pub struct PipeTransport<W, R> {
	sender: PipeTransportSender<W>,
	receiver: PipeTransportReceiver<R>,
}

impl<W, R> PipeTransport<W, R>
where
	W: AsyncWrite + Unpin + Send + 'static,
	R: AsyncRead + Unpin + Send + 'static,
{
	/// Creates an uncompressed transport. Decoded inbound messages arrive on
	/// the returned receiver once [`run`](Self::run) is polled.
	pub fn new(writer: W, reader: R) -> (Self, mpsc::UnboundedReceiver<Value>) {
		Self::with_codec(writer, reader, FrameCodec::identity())
	}

	/// Creates a transport that compresses outbound frames with `codec`.
	pub fn with_codec(writer: W, reader: R, codec: FrameCodec) -> (Self, mpsc::UnboundedReceiver<Value>) {
		let (message_tx, message_rx) = mpsc::unbounded_channel();
		let transport = Self {
			sender: PipeTransportSender { writer, codec },
			receiver: PipeTransportReceiver { reader, message_tx },
		};
		(transport, message_rx)
	}

	/// Splits into independently owned halves.
	pub fn into_parts(self) -> (PipeTransportSender<W>, PipeTransportReceiver<R>) {
		(self.sender, self.receiver)
	}

	/// Boxes both halves for [`Connection::new`](crate::connection::Connection::new).
	pub fn into_transport_parts(self, message_rx: mpsc::UnboundedReceiver<Value>) -> TransportParts {
		TransportParts {
			sender: Box::new(self.sender),
			receiver: Box::new(self.receiver),
			message_rx,
		}
	}

	/// Reads frames until EOF or until the message receiver is dropped.
	pub async fn run(&mut self) -> Result<()> {
		self.receiver.read_loop().await
	}

	pub async fn send(&mut self, message: Value) -> Result<()> {
		self.sender.write_frame(message).await
	}
}

/// Writing half of a [`PipeTransport`].
pub struct PipeTransportSender<W> {
	writer: W,
	codec: FrameCodec,
}

impl<W> PipeTransportSender<W>
where
	W: AsyncWrite + Unpin + Send,
{
	async fn write_frame(&mut self, message: Value) -> Result<()> {
		let bytes = serde_json::to_vec(&message)?;
		let (tag, payload) = self.codec.encode(bytes)?;
		let length = u32::try_from(payload.len())
			.map_err(|_| Error::TransportError(format!("Message too large: {} bytes", payload.len())))?;

		self.writer
			.write_all(&length.to_le_bytes())
			.await
			.map_err(|e| Error::TransportError(format!("Failed to write length prefix: {e}")))?;
		self.writer
			.write_all(&[tag])
			.await
			.map_err(|e| Error::TransportError(format!("Failed to write codec tag: {e}")))?;
		self.writer
			.write_all(&payload)
			.await
			.map_err(|e| Error::TransportError(format!("Failed to write message: {e}")))?;
		self.writer
			.flush()
			.await
			.map_err(|e| Error::TransportError(format!("Failed to flush: {e}")))?;

		tracing::trace!(target = "accel.transport", bytes = payload.len(), tag, "frame written");
		Ok(())
	}

	pub async fn send(&mut self, message: Value) -> Result<()> {
		self.write_frame(message).await
	}
}

impl<W> Transport for PipeTransportSender<W>
where
	W: AsyncWrite + Unpin + Send,
{
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(self.write_frame(message))
	}
}

/// Reading half of a [`PipeTransport`].
pub struct PipeTransportReceiver<R> {
	reader: R,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl<R> PipeTransportReceiver<R>
where
	R: AsyncRead + Unpin + Send,
{
	async fn read_loop(&mut self) -> Result<()> {
		loop {
			let mut len_buf = [0u8; 4];
			self.reader
				.read_exact(&mut len_buf)
				.await
				.map_err(|e| Error::TransportError(format!("Failed to read length prefix: {e}")))?;
			let length = u32::from_le_bytes(len_buf) as usize;
			if length > MAX_FRAME_LEN {
				return Err(Error::TransportError(format!("Frame of {length} bytes exceeds limit")));
			}

			let tag = self
				.reader
				.read_u8()
				.await
				.map_err(|e| Error::TransportError(format!("Failed to read codec tag: {e}")))?;

			let mut payload = vec![0u8; length];
			self.reader
				.read_exact(&mut payload)
				.await
				.map_err(|e| Error::TransportError(format!("Failed to read message: {e}")))?;

			let bytes = compression::decode(tag, payload)?;
			let message: Value = serde_json::from_slice(&bytes)?;

			if self.message_tx.send(message).is_err() {
				tracing::debug!(target = "accel.transport", "message receiver dropped; stopping reader");
				return Ok(());
			}
		}
	}
}

impl<R> TransportReceiver for PipeTransportReceiver<R>
where
	R: AsyncRead + Unpin + Send + 'static,
{
	fn run(mut self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
		Box::pin(async move { self.read_loop().await })
	}
}
