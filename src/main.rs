use std::net::SocketAddr;
use std::process::ExitCode;

use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use tracing::{error, info, warn};

use mptcpkit_api::cli::Args;
use mptcpkit_api::config::LoggingConfig;
use mptcpkit_api::{AppState, Config, CredentialSet, build_router, metrics, telemetry, utils};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::from(exitcode::OK as u8),
        Err(exit_code) => ExitCode::from(exit_code as u8),
    }
}

/// Run the gateway, returning an exit code on error.
async fn run(args: Args) -> Result<(), exitcode::ExitCode> {
    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            telemetry::init_tracing(&LoggingConfig::default());
            error!(path = %args.config.display(), "Configuration error: {e}");
            return Err(exitcode::CONFIG);
        }
    };
    telemetry::init_tracing(&config.logging);

    info!("Starting mptcpkit-api v{}", env!("CARGO_PKG_VERSION"));
    info!(
        path = %args.config.display(),
        script_dir = %config.api.script_dir.display(),
        key_file = %config.api.key_file.display(),
        dry_run = config.api.dry,
        https = config.server.https,
        "Configuration loaded"
    );
    if config.api.dry {
        warn!("Dry-run mode: endpoint scripts are told not to apply changes");
    }

    let credentials = CredentialSet::load(&config.api.key_file).await.map_err(|e| {
        error!("Failed to load key file: {e}");
        exitcode::CONFIG
    })?;

    if let Some(metrics_addr) = config.metrics_addr() {
        metrics::try_init_metrics(metrics_addr);
    }

    let addr: SocketAddr = config.server_addr().parse().map_err(|e| {
        error!("Invalid server address: {e}");
        exitcode::CONFIG
    })?;

    let tls = if config.server.https {
        Some(load_tls(&config).await?)
    } else {
        None
    };

    let app = build_router(AppState::new(config, credentials))
        .into_make_service_with_connect_info::<SocketAddr>();

    let handle = Handle::new();
    tokio::spawn(utils::shutdown_signal(handle.clone()));

    info!("API endpoints:");
    info!("  GET  /ip          - Caller address");
    info!("  POST /wan/update  - Update WAN addresses");
    info!("  GET  /ss/key      - Service key");
    info!("  GET  /ping        - Liveness");

    let served = match tls {
        Some(tls) => {
            info!("Server listening on https://{addr}");
            axum_server::bind_rustls(addr, tls)
                .handle(handle)
                .serve(app)
                .await
        }
        None => {
            info!("Server listening on http://{addr}");
            axum_server::bind(addr).handle(handle).serve(app).await
        }
    };

    served.map_err(|e| {
        error!("Server error on {addr}: {e}");
        exitcode::UNAVAILABLE
    })?;

    info!("Server shutdown complete");
    Ok(())
}

async fn load_tls(config: &Config) -> Result<RustlsConfig, exitcode::ExitCode> {
    // Presence of both paths is checked by Config::validate
    let (Some(cert), Some(key)) = (&config.server.tls_cert, &config.server.tls_key) else {
        error!("TLS enabled without certificate and key paths");
        return Err(exitcode::CONFIG);
    };

    RustlsConfig::from_pem_file(cert, key).await.map_err(|e| {
        error!(
            cert = %cert.display(),
            key = %key.display(),
            "Failed to load TLS certificate: {e}"
        );
        exitcode::CONFIG
    })
}
