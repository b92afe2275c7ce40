//! Background worker that executes queued workflow commands against the external clients.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::{
    sync::mpsc::{self, Receiver, Sender, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    orchestrator::{Orchestrator, WorkflowCommand, WorkflowEvent},
    GenerationClient, PrintClient,
};

pub const DEFAULT_COMMAND_CAPACITY: usize = 16;

pub fn command_channel(capacity: usize) -> (Sender<WorkflowCommand>, Receiver<WorkflowCommand>) {
    mpsc::channel(capacity.max(1))
}

/// Drains `commands` until every sender is dropped. Each command runs on its own task so a slow
/// generation never delays a print submission.
pub fn spawn_worker(
    generator: Arc<dyn GenerationClient>,
    printer: Arc<dyn PrintClient>,
    mut commands: Receiver<WorkflowCommand>,
    events: UnboundedSender<WorkflowEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(command) = commands.recv().await {
            let generator = Arc::clone(&generator);
            let printer = Arc::clone(&printer);
            let events = events.clone();
            tokio::spawn(async move {
                let event = execute_command(generator.as_ref(), printer.as_ref(), command).await;
                if events.send(event).is_err() {
                    debug!("worker: event receiver dropped");
                }
            });
        }
        info!("worker: command queue closed");
    })
}

pub async fn execute_command(
    generator: &dyn GenerationClient,
    printer: &dyn PrintClient,
    command: WorkflowCommand,
) -> WorkflowEvent {
    match command {
        WorkflowCommand::Generate { token, request } => match generator.generate(request).await {
            Ok(response) => WorkflowEvent::GenerationSucceeded {
                token,
                image_url: response.image_url,
            },
            Err(err) => {
                warn!(token = token.0, error = %err, "worker: generation request failed");
                WorkflowEvent::GenerationFailed {
                    token,
                    cause: format!("{err:#}"),
                }
            }
        },
        WorkflowCommand::Print { token, request } => match printer.submit_print(request).await {
            Ok(()) => WorkflowEvent::PrintSucceeded { token },
            Err(err) => {
                warn!(token = token.0, error = %err, "worker: print request failed");
                WorkflowEvent::PrintFailed {
                    token,
                    cause: format!("{err:#}"),
                }
            }
        },
    }
}

/// Applies events until the orchestrator has no request in flight.
pub async fn drive_until_settled(
    orchestrator: &mut Orchestrator,
    events: &mut UnboundedReceiver<WorkflowEvent>,
) -> Result<()> {
    while orchestrator.is_busy() {
        let event = events
            .recv()
            .await
            .ok_or_else(|| anyhow!("worker stopped while a request was in flight"))?;
        orchestrator.handle_event(event).await;
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
