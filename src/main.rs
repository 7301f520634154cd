use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use storefront_api::{
    app,
    config::{init_tracing, load_config},
    db::establish_connection_from_app_config,
    events::{self, LiveFeed, OrderFanout, WebhookSink},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    init_tracing(&config.log_level, config.log_json);

    info!(
        environment = %config.environment,
        port = config.port,
        "starting storefront api"
    );

    let db = Arc::new(
        establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?,
    );

    let (event_sender, event_rx) = events::channel(config.event_channel_capacity);

    let live_feed = LiveFeed::new();
    let webhook = match &config.order_webhook_url {
        Some(url) => Some(WebhookSink::new(
            url.clone(),
            Duration::from_secs(config.webhook_timeout_secs),
        )),
        None => {
            warn!("order webhook url not configured, outbound notifications disabled");
            None
        }
    };
    let fanout = OrderFanout::new(Some(live_feed.clone()), webhook);
    tokio::spawn(events::process_events(event_rx, fanout));

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(
        db,
        config,
        Some(Arc::new(event_sender)),
        Some(live_feed),
    ));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install sigterm handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
