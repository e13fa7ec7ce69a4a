//! # Adapter Wiring
//!
//! Builds the production adapters every binary needs from a loaded
//! [`AppConfig`], selecting concrete backends the way §7.2 describes:
//! Postgres for the registry, durable RabbitMQ for the bus, the
//! configured `local`/`s3`/`gcs` backend for artifacts, and the CSV
//! reference with its TTL reload. Shared here so the five binaries stay
//! thin dispatchers rather than each re-deriving the same wiring.

use std::sync::Arc;

use deadpool_lapin::{Config as LapinConfig, Runtime as LapinRuntime};
use object_store::aws::AmazonS3Builder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::ObjectStore;
use sqlx::postgres::PgPoolOptions;

use hcc_bootstrap::config::{ArtifactBackend, ArtifactStoreConfig, AppConfig, LlmConfig};
use hcc_domain::repositories::{ArtifactStore, DocumentRegistry, HccReferenceProvider, LlmClient, MessageBus};
use hcc_domain::value_objects::StorageKind;
use hcc_domain::{HccError, Result};

use crate::infrastructure::artifact_store::local::LocalArtifactStore;
use crate::infrastructure::artifact_store::object_store_backend::ObjectStoreArtifactStore;
use crate::infrastructure::bus::rabbitmq::RabbitMqBus;
use crate::infrastructure::hcc_reference::csv_loader::CsvHccReference;
use crate::infrastructure::llm::http_client::HttpLlmClient;
use crate::infrastructure::registry::postgres::PostgresDocumentRegistry;

/// The adapters shared by every stage worker and the gateway. The LLM
/// client is wired separately by [`build_llm`] since only the extractor
/// and analyzer need one.
pub struct Adapters {
    pub registry: Arc<dyn DocumentRegistry>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub bus: Arc<dyn MessageBus>,
    pub hcc: Arc<dyn HccReferenceProvider>,
}

pub async fn build_adapters(config: &AppConfig) -> Result<Adapters> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .map_err(|e| HccError::Registry(format!("failed to connect to the document registry database: {e}")))?;
    let registry = PostgresDocumentRegistry::new(pool);
    registry.migrate().await?;
    let registry: Arc<dyn DocumentRegistry> = Arc::new(registry);

    let artifacts = build_artifact_store(&config.artifact_store)?;
    let bus = build_bus(&config.broker.url)?;

    let hcc: Arc<dyn HccReferenceProvider> = Arc::new(CsvHccReference::load(config.hcc_reference.csv_path.clone(), config.hcc_reference.ttl())?);

    Ok(Adapters { registry, artifacts, bus, hcc })
}

pub fn build_llm(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let client = HttpLlmClient::new(config.endpoint.clone(), config.api_key.clone(), config.model.clone(), config.timeout())?;
    Ok(Arc::new(client))
}

fn build_bus(broker_url: &str) -> Result<Arc<dyn MessageBus>> {
    let mut cfg = LapinConfig::default();
    cfg.url = Some(broker_url.to_string());
    let pool = cfg
        .create_pool(Some(LapinRuntime::Tokio1))
        .map_err(|e| HccError::MessageBus(format!("failed to build the broker connection pool: {e}")))?;
    Ok(Arc::new(RabbitMqBus::new(pool)))
}

fn build_artifact_store(config: &ArtifactStoreConfig) -> Result<Arc<dyn ArtifactStore>> {
    match config.backend {
        ArtifactBackend::Local => Ok(Arc::new(LocalArtifactStore::new(config.local_root.clone()))),
        ArtifactBackend::S3 => {
            let bucket = require_bucket(config, "s3")?;
            let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
            if let Some(region) = &config.region {
                builder = builder.with_region(region.clone());
            }
            let store: Box<dyn ObjectStore> = Box::new(builder.build().map_err(|e| HccError::Configuration(format!("failed to build the S3 artifact store: {e}")))?);
            Ok(Arc::new(ObjectStoreArtifactStore::new(store, StorageKind::S3)))
        }
        ArtifactBackend::Gcs => {
            let bucket = require_bucket(config, "gcs")?;
            let store: Box<dyn ObjectStore> = Box::new(
                GoogleCloudStorageBuilder::from_env()
                    .with_bucket_name(bucket)
                    .build()
                    .map_err(|e| HccError::Configuration(format!("failed to build the GCS artifact store: {e}")))?,
            );
            Ok(Arc::new(ObjectStoreArtifactStore::new(store, StorageKind::Gcs)))
        }
    }
}

fn require_bucket(config: &ArtifactStoreConfig, backend: &str) -> Result<String> {
    config
        .bucket
        .clone()
        .ok_or_else(|| HccError::Configuration(format!("artifact_store.bucket is required for the {backend} backend")))
}
