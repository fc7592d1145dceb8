//! # Demo: proxy_race
//!
//! Races one request across many replicas where only one of them answers.
//! Every other replica either refuses or panics at a random moment.
//!
//! Shows how to:
//! - Build workers with [`WorkerFn`] that honour their [`CancellationToken`].
//! - Attach the built-in [`LogWriter`] and route it through `tracing-subscriber`.
//! - Read the single aggregate result of a race.
//!
//! ## Run
//! ```bash
//! cargo run --example proxy_race --features logging -- 10000
//! RUST_LOG=racevisor=debug cargo run --example proxy_race --features logging -- 8
//! ```

use std::{sync::Arc, time::Duration};

use racevisor::{Coordinator, LogWriter, RaceConfig, Subscribe, WorkerError, WorkerFn, WorkerRef};
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const DEFAULT_REPLICAS: usize = 10_000;

fn replica(id: usize, lucky: usize) -> WorkerRef<String, String> {
    let delay = Duration::from_millis(rand::rng().random_range(1..=250));
    let panics = rand::rng().random_bool(0.5);

    WorkerFn::arc(
        format!("replica-{id}"),
        move |req: Arc<String>, ctx: CancellationToken| async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = ctx.cancelled() => return Err(WorkerError::Canceled),
            }
            if id == lucky {
                return Ok(format!("replica-{id} served {req}"));
            }
            if panics {
                panic!("replica-{id} lost its upstream");
            }
            Err(WorkerError::fail(format!("replica-{id} refused")))
        },
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("proxy_race=info,racevisor=info")),
        )
        .init();

    // replica panics are expected; keep stderr readable
    std::panic::set_hook(Box::new(|_| {}));

    let replicas = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => DEFAULT_REPLICAS,
    };
    let lucky = rand::rng().random_range(0..replicas.max(1));

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let cfg = RaceConfig {
        timeout: Duration::from_secs(10),
        ..RaceConfig::default()
    };
    let coordinator = Coordinator::builder(cfg).with_subscribers(subs).build();

    let workers = (0..replicas).map(|id| replica(id, lucky)).collect();
    match coordinator.race("GET /".to_string(), workers).await {
        Ok(answer) => tracing::info!(%answer, replicas, "race won"),
        Err(err) => tracing::error!(error = %err, label = err.as_label(), "race lost"),
    }

    // give the subscriber a moment to flush the tail of the event stream
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}
