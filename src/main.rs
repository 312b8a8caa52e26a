//! Interaction console
//!
//! Replays JSON-lines interaction events from stdin against an in-memory
//! guild and prints what the engine sent back for each one.

use futures::future::join_all;
use interaction_core::adapter::memory::{GuildFixture, MemoryPlatform, Recorded};
use interaction_core::config::EngineConfig;
use interaction_core::flows;
use interaction_core::router::InteractionEvent;
use serde::Serialize;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Serialize)]
struct Transcript<'a> {
    interaction_id: &'a str,
    outcome: String,
    responses: Vec<Recorded>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr; stdout carries transcripts
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "interaction_core=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = EngineConfig::from_env();
    tracing::info!(?config, "Engine configuration");

    let platform = match std::env::var("INTERACTION_FIXTURE") {
        Ok(path) => {
            tracing::info!(path = %path, "Loading guild fixture");
            MemoryPlatform::from_fixture(GuildFixture::load(&path)?)
        }
        Err(_) => {
            tracing::warn!("INTERACTION_FIXTURE not set; starting with an empty guild");
            MemoryPlatform::new()
        }
    };
    let services = platform.services_with(config);
    let router = Arc::new(flows::router()?);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut handles = Vec::new();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let event: InteractionEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed event line");
                continue;
            }
        };
        let router = router.clone();
        let services = services.clone();
        handles.push(tokio::spawn(async move {
            let outcome = router.dispatch(&event, &services).await;
            (event.interaction_id, outcome)
        }));
    }

    for joined in join_all(handles).await {
        let (interaction_id, outcome) = joined?;
        let transcript = Transcript {
            interaction_id: &interaction_id,
            outcome: format!("{outcome:?}"),
            responses: platform.take_responses(&interaction_id),
        };
        println!("{}", serde_json::to_string(&transcript)?);
    }
    Ok(())
}
