use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use tracing::{error, info};

use shared::db::repositories::{
    ArtifactRepository, BotRepository, MeetingRepository, TranscriptChunkRepository,
};
use shared::telemetry::{self, TelemetryConfig};
use shared::DbPool;

use parley_notetaker::api::{create_router, ApiState};
use parley_notetaker::config::Config;
use parley_notetaker::finalize::Finalizer;
use parley_notetaker::meetings::MeetingService;
use parley_notetaker::recall::RecallClient;
use parley_notetaker::sequencer::Sequencer;
use parley_notetaker::summarize::OpenAiSummarizer;
use parley_notetaker::webhook::WebhookProcessor;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    telemetry::init_telemetry(TelemetryConfig::from_env("parley-notetaker"))?;

    info!("Starting notetaker service");

    let config = Config::from_env()?;

    let db = DbPool::connect(&config.database_url).await?;
    db.migrate().await?;
    let pool = db.pool();

    let summarizer = Arc::new(OpenAiSummarizer::new(config.openai.clone()));

    let finalizer = Arc::new(Finalizer::new(
        MeetingRepository::new(pool),
        TranscriptChunkRepository::new(pool),
        ArtifactRepository::new(pool),
        summarizer,
    ));

    let webhooks = Arc::new(WebhookProcessor::new(
        MeetingRepository::new(pool),
        BotRepository::new(pool),
        Sequencer::new(TranscriptChunkRepository::new(pool)),
        Arc::clone(&finalizer),
    ));

    let meetings = Arc::new(MeetingService::new(
        MeetingRepository::new(pool),
        BotRepository::new(pool),
        TranscriptChunkRepository::new(pool),
        ArtifactRepository::new(pool),
        RecallClient::new(config.recall.clone()),
        Arc::clone(&finalizer),
    ));

    let app = create_router(ApiState { meetings, webhooks });

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("HTTP server listening on {}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!("HTTP server stopped: {:?}", e);
    }

    Ok(())
}
