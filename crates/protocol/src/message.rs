//! Request, response, and event envelopes.
//!
//! Every frame carries exactly one of these as JSON. Requests are
//! client-to-runtime; responses echo the request `id`; events carry no `id`
//! and are unsolicited.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
	/// Milliseconds since the Unix epoch when the request was issued
	pub wall_time: i64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
}

impl Metadata {
	pub fn now() -> Self {
		let wall_time = std::time::SystemTime::now()
			.duration_since(std::time::UNIX_EPOCH)
			.map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
			.unwrap_or_default();
		Self { wall_time, title: None }
	}
}

/// Client-to-runtime call addressed to an object by guid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
	pub id: u32,
	/// [`ROOT_GUID`](crate::ROOT_GUID) or a graph node guid
	pub guid: Arc<str>,
	pub method: String,
	pub params: Value,
	pub metadata: Metadata,
}

/// Runtime reply; exactly one of `result` and `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
	pub id: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<ErrorWrapper>,
}

impl Response {
	pub fn ok(id: u32, result: Value) -> Self {
		Self {
			id,
			result: Some(result),
			error: None,
		}
	}

	pub fn err(id: u32, name: impl Into<String>, message: impl Into<String>) -> Self {
		let error = ErrorPayload {
			message: message.into(),
			name: Some(name.into()),
			stack: None,
		};
		Self {
			id,
			result: None,
			error: Some(ErrorWrapper { error }),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorWrapper {
	pub error: ErrorPayload,
}

/// Failure reported by the runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
	pub message: String,
	/// Status name such as `InvalidArgument` or `DeadlineExceeded`
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stack: Option<String>,
}

/// Unsolicited notification, e.g. device or allocation status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
	pub guid: Arc<str>,
	pub method: String,
	#[serde(default)]
	pub params: Value,
}

/// Any inbound frame.
///
/// Untagged: a frame with an `id` is a response, one with `guid` and `method`
/// is an event, anything else is kept as raw JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
	Response(Response),
	Event(Event),
	Unknown(Value),
}
