pub mod backend;
pub mod client;
pub mod orchestrator;

pub use backend::{HttpTranslationBackend, TranslationBackend};
pub use client::{BatchOutcome, BatchTranslationClient};
pub use orchestrator::{TranslatedDocument, TranslationOrchestrator, TranslationSummary};
