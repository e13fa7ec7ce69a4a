//! `hcc-extractor`: consumes `document.uploaded` and produces
//! `document.extraction.completed` (§4.4.1).

use std::sync::Arc;

use hcc_bootstrap::exit_code::BootstrapError;
use hcc_bootstrap::{logger, signals, result_to_exit_code, Mode, StageCli};
use hcc_bootstrap::shutdown::ShutdownCoordinator;
use hcc_domain::entities::document::{Document, DocumentStatus};
use hcc_pipeline::application::extractor_stage::{document_uploaded_message, ExtractorStage};
use hcc_pipeline::application::stage_runner::{run_batch_pass, run_consumer_loop};
use hcc_pipeline::infrastructure::wiring::{build_adapters, build_llm};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = StageCli::parse_args();
    result_to_exit_code(run(cli).await)
}

async fn run(cli: StageCli) -> Result<(), BootstrapError> {
    let config = hcc_bootstrap::AppConfig::load(cli.config.as_deref())?;
    logger::init_tracing(&config.logging.format, &config.logging.level);

    let adapters = build_adapters(&config).await.map_err(|e| BootstrapError::Connection(e.to_string()))?;
    let llm = build_llm(&config.llm).map_err(|e| BootstrapError::Configuration(e.to_string()))?;
    let stage = Arc::new(ExtractorStage::new(adapters.registry.clone(), adapters.artifacts.clone(), adapters.bus.clone(), llm, adapters.hcc.clone()));

    if matches!(cli.mode, Mode::Batch | Mode::Both) {
        let processed = run_batch_pass(adapters.bus.clone(), stage.clone(), adapters.registry.clone(), DocumentStatus::Pending, document_uploaded_payload)
            .await
            .map_err(|e| BootstrapError::Connection(e.to_string()))?;
        tracing::info!(processed, "batch pass complete");
    }

    if matches!(cli.mode, Mode::Consumer | Mode::Both) {
        let coordinator = ShutdownCoordinator::default();
        signals::install(coordinator.clone());
        run_consumer_loop(adapters.bus, stage, coordinator.token()).await;
        coordinator.complete_shutdown();
    }

    Ok(())
}

fn document_uploaded_payload(document: &Document) -> Option<serde_json::Value> {
    let message = document_uploaded_message(
        document.id.as_uuid(),
        document.storage.path.clone(),
        document.storage.kind,
        document.content_type.clone(),
        None,
        false,
    );
    serde_json::to_value(message).ok()
}
