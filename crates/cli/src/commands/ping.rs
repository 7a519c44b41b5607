use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use crate::cli::PingArgs;
use crate::error::Result;
use crate::output::{self, OutputFormat};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PingRound {
	session_id: u64,
	resets: u64,
	response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PingData {
	target: String,
	rounds: Vec<PingRound>,
	idle: usize,
}

pub async fn run(args: PingArgs, format: OutputFormat) -> Result<()> {
	let started = Instant::now();
	let cache = super::session_cache(&args.session);
	let target = args.session.target;

	let mut rounds = Vec::with_capacity(args.count as usize);
	for _ in 0..args.count {
		let session = cache.checkout(&target).await?;
		let response = session.ping().await?;
		rounds.push(PingRound {
			session_id: session.id(),
			resets: session.reset_count(),
			response,
		});
	}

	let idle = cache.idle_count(&target);
	output::emit_success("ping", PingData { target, rounds, idle }, started.elapsed(), format);
	Ok(())
}
