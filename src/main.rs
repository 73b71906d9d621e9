use std::sync::Arc;

use lead_intake::channels::CliChannel;
use lead_intake::config::{IntakeConfig, ServerConfig};
use lead_intake::conversation::{
    ChatRouteState, ConversationEngine, HandoffTrigger, SessionManager, chat_routes,
};
use lead_intake::crm;
use lead_intake::intake::IntakeAgent;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Bad configuration stops us here, before any conversation starts.
    let intake_config = IntakeConfig::from_env()?;
    let server_config = ServerConfig::from_env()?;

    let crm = crm::create_client_from_env()?;

    eprintln!("⚡ Lead Intake v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   CRM: {}", crm.name());
    eprintln!(
        "   Qualification: {} (max {} messages per email)",
        intake_config
            .min_qualification_criteria
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(" + "),
        intake_config.max_messages_per_email,
    );
    eprintln!("   Chat API: http://{}/api/sessions", server_config.bind_addr());
    eprintln!("   Type anything to start, /reset to start over, /quit to exit.\n");

    let engine = ConversationEngine::from_config(&intake_config);
    let sessions = Arc::new(SessionManager::new(engine, HandoffTrigger::new(crm)));
    sessions.spawn_idle_sweeper(
        intake_config.session_idle_ttl,
        intake_config.idle_sweep_interval(),
    );

    // ── HTTP API ─────────────────────────────────────────────────────────
    let app = chat_routes(ChatRouteState {
        manager: Arc::clone(&sessions),
    });
    let listener = tokio::net::TcpListener::bind(server_config.bind_addr()).await?;
    tokio::spawn(async move {
        tracing::info!(port = server_config.port, "Chat API server started");
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Chat API server stopped: {}", e);
        }
    });

    // ── CLI ──────────────────────────────────────────────────────────────
    let agent = IntakeAgent::new(sessions, Box::new(CliChannel::new()));
    agent.run().await?;

    Ok(())
}
