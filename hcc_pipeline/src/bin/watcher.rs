//! `hcc-watcher`: polls a local directory for new files and feeds them into
//! the pipeline through the same `GatewayService::upload` path the HTTP
//! surface uses (§10 of the expanded spec — "treated as an alternate
//! upload source that creates a registry row and publishes
//! `document.uploaded`"). Polling cadence and directory layout are not
//! part of the pipeline contract; only the fact that it ends at `upload`
//! is.

use std::path::{Path, PathBuf};

use hcc_bootstrap::exit_code::BootstrapError;
use hcc_bootstrap::shutdown::ShutdownCoordinator;
use hcc_bootstrap::{logger, signals};
use hcc_pipeline::application::gateway_service::GatewayService;
use hcc_pipeline::infrastructure::wiring::build_adapters;

#[derive(clap::Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct WatcherCli {
    /// Optional layered config file (TOML or YAML); environment variables
    /// still win, per §7.2.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, short = 'v')]
    verbose: bool,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    use clap::Parser;
    let cli = WatcherCli::parse();
    hcc_bootstrap::result_to_exit_code(run(cli).await)
}

async fn run(cli: WatcherCli) -> Result<(), BootstrapError> {
    let config = hcc_bootstrap::AppConfig::load(cli.config.as_deref())?;
    logger::init_tracing(&config.logging.format, &config.logging.level);

    let adapters = build_adapters(&config).await.map_err(|e| BootstrapError::Connection(e.to_string()))?;
    let gateway = GatewayService::new(adapters.registry, adapters.artifacts, adapters.bus);

    tokio::fs::create_dir_all(&config.watcher.watch_dir)
        .await
        .map_err(|e| BootstrapError::Configuration(format!("failed to create watch_dir {}: {e}", config.watcher.watch_dir.display())))?;
    tokio::fs::create_dir_all(config.watcher.processed_dir())
        .await
        .map_err(|e| BootstrapError::Configuration(format!("failed to create processed dir: {e}")))?;

    tracing::info!(
        watch_dir = %config.watcher.watch_dir.display(),
        poll_interval_secs = config.watcher.poll_interval_secs,
        "watcher starting"
    );

    let coordinator = ShutdownCoordinator::default();
    signals::install(coordinator.clone());
    let token = coordinator.token();

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = scan_once(&gateway, &config.watcher.watch_dir, &config.watcher.processed_dir()) => {}
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(config.watcher.poll_interval()) => {}
        }
    }

    coordinator.complete_shutdown();
    tracing::info!("watcher shut down");
    Ok(())
}

/// One polling pass: every regular file directly inside `watch_dir`
/// (ignoring `processed_dir`, which lives underneath it) is uploaded
/// through the gateway and then moved into `processed_dir`, mirroring how
/// the original filesystem watchers avoid replaying a file they already
/// published. A file that fails to upload is left in place and retried on
/// the next pass.
async fn scan_once(gateway: &GatewayService, watch_dir: &Path, processed_dir: &Path) {
    let mut entries = match tokio::fs::read_dir(watch_dir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, watch_dir = %watch_dir.display(), "failed to list watch directory");
            return;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read directory entry");
                break;
            }
        };

        let path = entry.path();
        if path.starts_with(processed_dir) {
            continue;
        }
        match entry.file_type().await {
            Ok(file_type) if file_type.is_file() => {}
            _ => continue,
        }

        if let Err(e) = ingest_one(gateway, &path, processed_dir).await {
            tracing::warn!(error = %e, path = %path.display(), "failed to ingest watched file, will retry next pass");
        }
    }
}

async fn ingest_one(gateway: &GatewayService, path: &Path, processed_dir: &Path) -> Result<(), hcc_domain::HccError> {
    let filename = path.file_name().and_then(|f| f.to_str()).unwrap_or("upload").to_string();
    let bytes = tokio::fs::read(path).await?;
    let content_type = guess_content_type(&filename);

    let document = gateway.upload(bytes, &filename, content_type, None).await?;
    tracing::info!(document_id = %document.id.as_uuid(), filename = %filename, "watcher enqueued document");

    let dest = processed_dir.join(&filename);
    if let Err(e) = tokio::fs::rename(path, &dest).await {
        tracing::warn!(error = %e, path = %path.display(), "upload succeeded but moving the source file failed; it may be re-ingested next pass");
    }
    Ok(())
}

fn guess_content_type(filename: &str) -> &'static str {
    match filename.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "json" => "application/json",
        Some(ext) if ext == "txt" || ext == "md" => "text/plain",
        Some(ext) if ext == "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
