//! printwarden server
//!
//! Access-control supervisor for a fleet of Moonraker printers: one monitor
//! per printer enforces the registration policy, an optional connector
//! reports to the central controller, and an Axum facade serves the UI.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tracing::info;

use printwarden_core::ControllerFailMode;
use printwarden_hub::{Connector, HubClient};
use printwarden_moonraker::Monitor;

mod config;
mod routes;
mod signals;
mod state;
mod terminal;

use config::Config;
use state::AppState;

/// printwarden fleet supervisor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "./config.yaml")]
    config: String,

    /// Directory holding the prebuilt UI bundle
    #[arg(long, default_value = "./frontend/out")]
    ui_dir: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,printwarden=debug".into()),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Parse CLI args
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args.config)?;
    info!(
        path = %args.config,
        printers = config.printers.len(),
        "configuration loaded"
    );

    let root = CancellationToken::new();

    // Build and start one monitor per configured printer
    let monitor_config = config.monitor_config();
    let mut monitors: HashMap<String, Arc<Monitor>> = HashMap::new();
    let mut keys = Vec::with_capacity(config.printers.len());

    for printer in &config.printers {
        let monitor = Arc::new(Monitor::new(
            &printer.name,
            &printer.url,
            monitor_config.clone(),
        )?);

        // Until the controller says otherwise, the configured failure policy
        // decides whether unregistered prints may run.
        monitor
            .set_allow_no_reg_print(printer.controller_fail_mode != ControllerFailMode::NoPrint)
            .await;

        monitor.start(&root);
        info!(printer = %printer.key, url = %printer.url, "monitor started");

        keys.push(printer.key.clone());
        monitors.insert(printer.key.clone(), monitor);
    }

    // Connect to the central controller when one is configured
    let connector = match &config.controller {
        Some(controller) => {
            let client = HubClient::new(&controller.url, &controller.hub_id)?;
            let connector = Arc::new(Connector::new(client, monitors.clone()));
            connector.start(&root);
            info!(
                hub = %controller.hub_id,
                url = %controller.url,
                fail_mode = %controller.fail_mode,
                "controller connector started"
            );
            Some(connector)
        }
        None => None,
    };

    let state = Arc::new(AppState::new(monitors, keys, connector, root.clone()));

    // Terminal control path (TTY only)
    terminal::spawn(Arc::clone(&state), root.child_token());

    // Build the facade router
    let app = Router::new()
        .nest("/api/v1", routes::api_routes())
        .nest_service("/ui", ServeDir::new(&args.ui_dir))
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                },
            ),
        )
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(Arc::clone(&state));

    // Start the facade
    let addr = config.server.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "server listening");

    // Translate SIGINT/SIGTERM into root cancellation
    let signal_token = root.clone();
    tokio::spawn(async move {
        let _ = signals::wait_for_shutdown_signal().await;
        info!("shutdown signal received");
        signal_token.cancel();
    });

    let drain = root.clone();
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move { drain.cancelled().await })
        .await?;

    // The facade has drained; take down the connector and the monitors.
    state.shutdown();
    info!("server exiting");

    Ok(())
}
