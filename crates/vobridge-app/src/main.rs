//! vobridge application binary - composition root.
//!
//! 1. Parse CLI args and load configuration from TOML
//! 2. Build the VoiceOver adapters and the enablement signal
//! 3. Attach the listener controller to the signal
//! 4. Serve the HTTP API on port 80 until Ctrl-C

mod cli;

use std::sync::Arc;

use clap::Parser;

use vobridge_core::config::{BridgeConfig, BRIDGE_PORT};

use vobridge_automation::{
    EnablementSignal, ManualEnablementSignal, VoiceOverInjector, VoiceOverQuery,
    VoiceOverStatusMonitor,
};
use vobridge_listener::{ListenerController, PollTiming};

use vobridge_api::start_server;
use vobridge_api::state::AppState;

use crate::cli::CliArgs;

/// Resolves on Ctrl-C. If the handler cannot be installed the server runs
/// until killed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing starts so its log level can apply.
    let config_file = args.resolve_config_path();
    let (config, load_error) = BridgeConfig::load_or_default(&config_file);
    let log_level = args.resolve_log_level(&config.general.log_level);

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    tracing::info!("Starting vobridge v{}", env!("CARGO_PKG_VERSION"));

    match load_error {
        None => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Some(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load config, using defaults"
        ),
    }

    tracing::info!(
        port = BRIDGE_PORT,
        "Port {} must be free and may need elevated privileges",
        BRIDGE_PORT
    );
    tracing::info!(
        "VoiceOver automation needs Accessibility access and \
         \"Allow VoiceOver to be controlled with AppleScript\""
    );

    // Adapters.
    let timeout = config.automation.timeout();
    let query = Arc::new(VoiceOverQuery::new(timeout));
    let injector = Arc::new(VoiceOverInjector::new(timeout));

    // Enablement signal.
    let mut monitor = None;
    let signal: Arc<dyn EnablementSignal> = if args.assume_enabled {
        tracing::info!("Narrator assumed enabled");
        Arc::new(ManualEnablementSignal::new(true))
    } else {
        let status = Arc::new(VoiceOverStatusMonitor::new(
            config.automation.status_interval(),
            timeout,
        ));
        status.refresh().await;

        let runner = Arc::clone(&status);
        tokio::spawn(async move {
            runner.run().await;
        });
        monitor = Some(Arc::clone(&status));
        status
    };

    // Listener.
    let listener = Arc::new(ListenerController::new(
        query,
        PollTiming::from(&config.polling),
    ));
    let driver = listener.attach(signal);

    // === API server ===

    let state = AppState::new(Arc::clone(&listener), injector);
    let result = start_server(state, shutdown_signal()).await;

    listener.shutdown();
    if let Some(monitor) = monitor {
        monitor.shutdown();
    }
    if let Err(e) = driver.await {
        tracing::warn!(error = %e, "Listener driver ended abnormally");
    }

    match result {
        Ok(()) => {
            tracing::info!("vobridge stopped");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            Err(e.into())
        }
    }
}
