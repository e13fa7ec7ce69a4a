//! `hcc-validator`: consumes `document.analysis.completed`, runs the Rules
//! Engine, and transitions the document to its terminal status (§4.7).

use std::sync::Arc;

use hcc_bootstrap::exit_code::BootstrapError;
use hcc_bootstrap::shutdown::ShutdownCoordinator;
use hcc_bootstrap::{logger, result_to_exit_code, signals, Mode, StageCli};
use hcc_domain::entities::document::{Document, DocumentStatus};
use hcc_domain::events::{AnalysisCompletedPayload, Envelope, StageMessage};
use hcc_pipeline::application::stage_runner::{run_batch_pass, run_consumer_loop};
use hcc_pipeline::application::validator_stage::ValidatorStage;
use hcc_pipeline::infrastructure::wiring::build_adapters;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = StageCli::parse_args();
    result_to_exit_code(run(cli).await)
}

async fn run(cli: StageCli) -> Result<(), BootstrapError> {
    let config = hcc_bootstrap::AppConfig::load(cli.config.as_deref())?;
    logger::init_tracing(&config.logging.format, &config.logging.level);

    let adapters = build_adapters(&config).await.map_err(|e| BootstrapError::Connection(e.to_string()))?;
    let stage = Arc::new(ValidatorStage::new(adapters.registry.clone(), adapters.artifacts.clone(), adapters.bus.clone(), adapters.hcc.clone()));

    if matches!(cli.mode, Mode::Batch | Mode::Both) {
        let processed = run_batch_pass(adapters.bus.clone(), stage.clone(), adapters.registry.clone(), DocumentStatus::Analyzing, analysis_completed_payload)
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

fn analysis_completed_payload(document: &Document) -> Option<serde_json::Value> {
    let path = document.analysis_result_path.clone()?;
    let relevant = document.hcc_relevant_conditions?;
    let message = StageMessage::AnalysisCompleted(AnalysisCompletedPayload {
        envelope: Envelope::new(document.id.as_uuid()),
        analysis_result_path: path,
        hcc_relevant_conditions: relevant,
    });
    serde_json::to_value(message).ok()
}
