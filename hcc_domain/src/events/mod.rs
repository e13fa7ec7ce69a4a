pub mod message;

pub use message::{
    AnalysisCompletedPayload, DocumentUploadedPayload, Envelope, ErrorPayload, ExtractionCompletedPayload,
    StageMessage, ValidationCompletedPayload,
};
