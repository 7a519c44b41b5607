use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use crate::cli::ExecArgs;
use crate::error::{CliError, Result};
use crate::output::{self, OutputFormat};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecData {
	target: String,
	guid: String,
	method: String,
	session_id: u64,
	result: Value,
}

pub async fn run(args: ExecArgs, format: OutputFormat) -> Result<()> {
	let started = Instant::now();
	let params = parse_params(args.params.as_deref())?;

	let cache = super::session_cache(&args.session);
	let session = cache.checkout(&args.session.target).await?;
	let result: Value = session.send(&args.guid, &args.method, params).await?;
	let session_id = session.id();
	session.release();

	let data = ExecData {
		target: args.session.target,
		guid: args.guid,
		method: args.method,
		session_id,
		result,
	};
	output::emit_success("exec", data, started.elapsed(), format);
	Ok(())
}

fn parse_params(raw: Option<&str>) -> Result<Value> {
	match raw {
		None => Ok(Value::Null),
		Some(raw) => serde_json::from_str(raw).map_err(|e| CliError::InvalidInput(format!("--params is not valid JSON: {e}"))),
	}
}
