use std::sync::Arc;

use chrono::Utc;
use textahbar_gateway::{
    api::{start_server, AppState},
    audit::TransactionLog,
    bedrock::BedrockClient,
    chat::{sessions::SessionStore, ChatRouter},
    config::GatewayConfig,
    hedera::SimulatedLedger,
    sms::{AfricasTalkingClient, SmsNotifier},
    state::InMemoryTracker,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = Arc::new(GatewayConfig::from_env());

    info!("🚀 TextAHBAR Trading Gateway - API Server");
    info!("📍 Port: {}", config.port);

    let report = config.report();
    if report.all_valid {
        info!("✅ Configuration valid");
    } else {
        warn!("⚠️  Configuration incomplete - running with simulated services");
        for recommendation in &report.recommendations {
            warn!("📌 {}", recommendation);
        }
    }

    // Create components
    let tracker = Arc::new(InMemoryTracker::new());
    let ledger = Arc::new(SimulatedLedger::new(config.hedera.clone()));
    let sms_client = Arc::new(AfricasTalkingClient::new(config.sms.clone()));
    let notifier = Arc::new(SmsNotifier::new(sms_client));
    let log = Arc::new(TransactionLog::open(&config.log_file));
    let llm = Arc::new(BedrockClient::new(
        config.bedrock.bearer_token.clone(),
        config.bedrock.model_id.clone(),
        &config.bedrock.region,
    ));

    let chat = Arc::new(ChatRouter::new(
        tracker.clone(),
        Arc::new(SessionStore::new()),
        ledger.clone(),
        notifier.clone(),
        log.clone(),
        llm,
    ));

    let state = AppState {
        chat,
        tracker,
        ledger,
        notifier,
        log,
        config: config.clone(),
        started_at: Utc::now(),
    };

    info!("✅ Gateway initialized");
    info!("📡 Starting API server...");

    start_server(state, config.port).await?;

    Ok(())
}
