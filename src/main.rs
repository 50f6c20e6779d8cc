use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::CorsLayer;

use chat_router::api::{AppState, routes};
use chat_router::config::RouterConfig;
use chat_router::escalation::OverdueSweep;
use chat_router::llm::{LlmConfig, LlmProvider, create_provider};
use chat_router::notify::{BroadcastNotifier, FanoutNotifier, Notifier, WebhookNotifier};
use chat_router::pipeline::MessageRouter;
use chat_router::store::{CandidateStore, LibSqlStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    // Keep the guard alive so the file writer flushes on exit.
    let _log_guard = init_tracing();

    let config = RouterConfig::from_env().context("Invalid CHAT_ROUTER_* configuration")?;

    let port: u16 = std::env::var("CHAT_ROUTER_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .context("CHAT_ROUTER_PORT must be a port number")?;

    eprintln!("💬 Chat Router v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api/messages", port);
    eprintln!("   Admin WS: ws://0.0.0.0:{}/ws/admin", port);

    // ── Database ─────────────────────────────────────────────────────────
    let db_path = std::env::var("CHAT_ROUTER_DB_PATH")
        .unwrap_or_else(|_| "./data/chat-router.db".to_string());
    let store: Arc<dyn CandidateStore> = Arc::new(
        LibSqlStore::new_local(std::path::Path::new(&db_path))
            .await
            .with_context(|| format!("Failed to open database at {db_path}"))?,
    );
    eprintln!("   Database: {}", db_path);

    // ── LLM ──────────────────────────────────────────────────────────────
    let llm: Option<Arc<dyn LlmProvider>> = match LlmConfig::from_env() {
        Some(llm_config) => {
            eprintln!("   Model: {}", llm_config.model);
            Some(create_provider(&llm_config)?)
        }
        None => {
            eprintln!("   Model: none (generative fallback escalates)");
            None
        }
    };

    // ── Notifications ────────────────────────────────────────────────────
    let events = BroadcastNotifier::default();
    let mut sinks: Vec<Arc<dyn Notifier>> = vec![Arc::new(events.clone())];
    if let Ok(url) = std::env::var("CHAT_ROUTER_ADMIN_WEBHOOK") {
        if !url.trim().is_empty() {
            sinks.push(Arc::new(WebhookNotifier::new(url.trim())?));
            eprintln!("   Admin webhook: enabled");
        }
    }
    let notifier: Arc<dyn Notifier> = Arc::new(FanoutNotifier::new(sinks));

    // ── Router + sweep ───────────────────────────────────────────────────
    let router = Arc::new(MessageRouter::new(
        &config,
        Arc::clone(&store),
        Arc::clone(&notifier),
        llm,
    ));

    let sweep = Arc::new(OverdueSweep::new(
        Arc::clone(&store),
        notifier,
        config.reminder_interval,
    ));
    let _sweep_handle = sweep.spawn(config.sweep_interval);

    // ── Server ───────────────────────────────────────────────────────────
    let app = routes(AppState {
        router,
        store,
        events,
    })
    .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;
    tracing::info!(port, "Chat router listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Stderr logging filtered by `RUST_LOG`, plus a daily rolling file when
/// `CHAT_ROUTER_LOG_DIR` is set.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = fmt::layer().with_target(false).with_writer(std::io::stderr);

    match std::env::var("CHAT_ROUTER_LOG_DIR") {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir.trim(), "chat-router.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        _ => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
    }
}
