//! `hcc-gateway`: the HTTP surface over `GatewayService` (§6.1).

use hcc_bootstrap::exit_code::BootstrapError;
use hcc_bootstrap::shutdown::ShutdownCoordinator;
use hcc_bootstrap::{logger, result_to_exit_code, signals};
use hcc_pipeline::application::gateway_service::GatewayService;
use hcc_pipeline::infrastructure::http::{router, GatewayMetrics};
use hcc_pipeline::infrastructure::wiring::build_adapters;

#[derive(clap::Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct GatewayCli {
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    use clap::Parser;
    let cli = GatewayCli::parse();
    result_to_exit_code(run(cli).await)
}

async fn run(cli: GatewayCli) -> Result<(), BootstrapError> {
    let config = hcc_bootstrap::AppConfig::load(cli.config.as_deref())?;
    logger::init_tracing(&config.logging.format, &config.logging.level);

    let adapters = build_adapters(&config).await.map_err(|e| BootstrapError::Connection(e.to_string()))?;
    let gateway = GatewayService::new(adapters.registry, adapters.artifacts, adapters.bus);
    let metrics = GatewayMetrics::new().map_err(|e| BootstrapError::Configuration(e.to_string()))?;
    let app = router(gateway, metrics);

    let listener = tokio::net::TcpListener::bind(&config.http.bind_address)
        .await
        .map_err(|e| BootstrapError::Connection(format!("failed to bind {}: {e}", config.http.bind_address)))?;
    tracing::info!(bind_address = %config.http.bind_address, "gateway listening");

    let coordinator = ShutdownCoordinator::default();
    signals::install(coordinator.clone());
    let token = coordinator.token();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await
        .map_err(|e| BootstrapError::Connection(format!("gateway server error: {e}")))?;

    coordinator.complete_shutdown();
    Ok(())
}
