use anyhow::Result;
use async_trait::async_trait;
use shared::protocol::{GenerateRequest, GenerateResponse, PrintRequest};
use tracing::info;

pub mod config;
pub mod history;
pub mod orchestrator;
pub mod runtime;
pub mod transport;

pub use config::{load_settings, Settings};
pub use history::{HistoryStore, HISTORY_STORAGE_KEY};
pub use orchestrator::{
    Notice, NoticeLevel, Orchestrator, OrchestratorConfig, Outcome, WorkflowCommand,
    WorkflowError, WorkflowEvent, WorkflowState,
};
pub use transport::{HttpStudioClient, TransportError};

/// Text-to-image backend.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse>;
}

/// Physical output device. Success carries no payload.
#[async_trait]
pub trait PrintClient: Send + Sync {
    async fn submit_print(&self, request: PrintRequest) -> Result<()>;
}

/// Print client that only logs the job; nothing reaches a plotter.
pub struct DryRunPrintClient;

#[async_trait]
impl PrintClient for DryRunPrintClient {
    async fn submit_print(&self, request: PrintRequest) -> Result<()> {
        info!(
            image = %request.image_reference,
            x_mm = request.x_mm,
            y_mm = request.y_mm,
            width_mm = request.width_mm,
            height_mm = request.height_mm,
            rotation = request.rotation,
            "print: dry run, job not sent"
        );
        Ok(())
    }
}

/// Transport failures as reqwest and hyper word them.
const UNREACHABLE_PHRASES: &[&str] = &[
    "error sending request",
    "tcp connect error",
    "connection refused",
    "dns error",
    "operation timed out",
];

fn is_unreachable(lower: &str) -> bool {
    UNREACHABLE_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

/// Maps a raw generation failure to the text shown in the conversation.
pub fn classify_generation_failure(cause: &str) -> String {
    let lower = cause.to_ascii_lowercase();
    if is_unreachable(&lower) {
        "Sorry, the drawing service is unreachable right now. Check the connection and try again."
            .to_string()
    } else if lower.contains("status 400")
        || lower.contains("status 422")
        || lower.contains("validation")
    {
        "Sorry, the drawing service rejected that prompt. Try rephrasing it.".to_string()
    } else if lower.contains("status 429") {
        "Sorry, the drawing service is busy. Wait a moment and try again.".to_string()
    } else {
        "Sorry, something went wrong while generating the drawing.".to_string()
    }
}

/// Maps a raw print failure to the notice shown after a failed submission.
pub fn classify_print_failure(cause: &str) -> String {
    let lower = cause.to_ascii_lowercase();
    if is_unreachable(&lower) {
        "Plotter unreachable; the job was discarded. Reopen the composer to try again.".to_string()
    } else {
        format!("Print failed and the job was discarded: {cause}")
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
