//! Concurrent checkout stress against one target.

use std::collections::HashSet;
use std::time::Instant;

use serde::Serialize;
use tokio::task::JoinSet;

use crate::cli::SoakArgs;
use crate::error::Result;
use crate::output::{self, OutputFormat};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SoakData {
	target: String,
	workers: u32,
	rounds: u32,
	checkouts: usize,
	/// Sessions the pool had to establish; bounded by peak concurrency.
	distinct_sessions: usize,
	idle: usize,
}

pub async fn run(args: SoakArgs, format: OutputFormat) -> Result<()> {
	let started = Instant::now();
	let cache = super::session_cache(&args.session);
	let target = args.session.target;

	let mut tasks = JoinSet::new();
	for worker in 0..args.workers {
		let cache = cache.clone();
		let target = target.clone();
		let rounds = args.rounds;
		tasks.spawn(async move {
			let mut seen = Vec::with_capacity(rounds as usize);
			for _ in 0..rounds {
				let session = cache.checkout(&target).await?;
				session.ping().await?;
				seen.push(session.id());
			}
			tracing::debug!(target = "accel.cli", worker, rounds, "soak worker finished");
			Ok::<_, accel_runtime::Error>(seen)
		});
	}

	let mut checkouts = 0;
	let mut sessions = HashSet::new();
	while let Some(joined) = tasks.join_next().await {
		let seen = joined.map_err(anyhow::Error::from)??;
		checkouts += seen.len();
		sessions.extend(seen);
	}

	let data = SoakData {
		target: target.clone(),
		workers: args.workers,
		rounds: args.rounds,
		checkouts,
		distinct_sessions: sessions.len(),
		idle: cache.idle_count(&target),
	};
	let closed = cache.drain();
	tracing::info!(target = "accel.cli", closed, "soak complete");

	output::emit_success("soak", data, started.elapsed(), format);
	Ok(())
}
