//! # Application Layer
//!
//! Orchestrates the domain and infrastructure ports into the three stage
//! handlers (§4.4), the shared stage-runner skeleton they all plug into,
//! and the gateway's document use cases (§6.1). Nothing in this module
//! talks to Postgres, RabbitMQ, or an HTTP socket directly — it holds
//! `Arc<dyn Trait>` collaborators from `hcc_domain::repositories` and calls
//! through them.

pub mod analyzer_stage;
pub mod extractor_stage;
pub mod gateway_service;
pub mod llm_support;
pub mod stage_runner;
pub mod validator_stage;

pub use analyzer_stage::AnalyzerStage;
pub use extractor_stage::ExtractorStage;
pub use gateway_service::GatewayService;
pub use stage_runner::{run_consumer_loop, StageHandler};
pub use validator_stage::ValidatorStage;
