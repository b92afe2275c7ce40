//! Workflow state machine: prompt → generation → composition → print confirmation → submission.
//!
//! Network calls never run here. Operations that need one push a [`WorkflowCommand`]
//! on the worker queue, and the host feeds the matching [`WorkflowEvent`] back through
//! [`Orchestrator::handle_event`]. Each command carries a fresh [`RequestToken`]; an event
//! is applied only if its token is the one currently outstanding.

use std::sync::Arc;

use chrono::Utc;
use composer::{Composer, ComposerError, Viewport, ViewportPadding};
use shared::{
    domain::{
        ConversationMessage, GenerationStyle, MessageId, PageSize, PrintJob, PromptOrigin,
        RequestToken, Role,
    },
    protocol::{GenerateRequest, PrintRequest},
};
use storage::KeyValueStore;
use thiserror::Error;
use tokio::sync::mpsc::{error::TrySendError, Sender};
use tracing::{debug, info, warn};

use crate::{classify_generation_failure, classify_print_failure, history::HistoryStore};

pub const GENERATION_SUCCESS_TEXT: &str = "Here is your drawing:";
pub const PRINT_SENT_TEXT: &str = "Sent to the plotter.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    AwaitingGeneration,
    Composing,
    AwaitingPrintConfirmation,
    Submitting,
}

/// Result of an operation that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Deliberate no-op: blank prompt, duplicate request, or stale completion.
    Ignored,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{operation} is not valid while {state:?}")]
    InvalidTransition {
        operation: &'static str,
        state: WorkflowState,
    },
    #[error("no assistant message carries image '{0}'")]
    UnknownImage(String),
    #[error("unknown message id {0}")]
    UnknownMessage(i64),
    #[error("message {0} has no prompt to regenerate")]
    NothingToRegenerate(i64),
    #[error(transparent)]
    Composer(#[from] ComposerError),
    #[error("failed to dispatch {command} request: {reason}")]
    Dispatch {
        command: &'static str,
        reason: &'static str,
    },
}

#[derive(Debug, Clone)]
pub enum WorkflowCommand {
    Generate {
        token: RequestToken,
        request: GenerateRequest,
    },
    Print {
        token: RequestToken,
        request: PrintRequest,
    },
}

impl WorkflowCommand {
    pub fn token(&self) -> RequestToken {
        match self {
            WorkflowCommand::Generate { token, .. } | WorkflowCommand::Print { token, .. } => *token,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            WorkflowCommand::Generate { .. } => "generate",
            WorkflowCommand::Print { .. } => "print",
        }
    }
}

#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    GenerationSucceeded {
        token: RequestToken,
        image_url: String,
    },
    GenerationFailed {
        token: RequestToken,
        cause: String,
    },
    PrintSucceeded {
        token: RequestToken,
    },
    PrintFailed {
        token: RequestToken,
        cause: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Transient user-facing status line; not part of the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    pub page: PageSize,
    pub padding: ViewportPadding,
    pub viewport: Viewport,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            page: PageSize::A4,
            padding: ViewportPadding::default(),
            viewport: Viewport::default(),
        }
    }
}

pub struct Orchestrator {
    state: WorkflowState,
    history: HistoryStore,
    commands: Sender<WorkflowCommand>,
    config: OrchestratorConfig,
    composer: Option<Composer>,
    pending_job: Option<PrintJob>,
    pending_origin: Option<PromptOrigin>,
    pending_generation: Option<RequestToken>,
    pending_print: Option<RequestToken>,
    next_token: u64,
    notice: Option<Notice>,
}

impl Orchestrator {
    /// Restores history from `store` and starts in `Idle`.
    pub async fn init(
        store: Arc<dyn KeyValueStore>,
        commands: Sender<WorkflowCommand>,
        config: OrchestratorConfig,
    ) -> Self {
        let history = HistoryStore::restore(store).await;
        info!(messages = history.len(), "orchestrator: ready");
        Self {
            state: WorkflowState::Idle,
            history,
            commands,
            config,
            composer: None,
            pending_job: None,
            pending_origin: None,
            pending_generation: None,
            pending_print: None,
            next_token: 0,
            notice: None,
        }
    }

    /// History is written through on every append, so there is nothing to flush.
    pub fn shutdown(self) {
        info!(state = ?self.state, "orchestrator: shut down");
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        self.history.messages()
    }

    pub fn composer(&self) -> Option<&Composer> {
        self.composer.as_ref()
    }

    pub fn composer_mut(&mut self) -> Option<&mut Composer> {
        self.composer.as_mut()
    }

    pub fn pending_print_job(&self) -> Option<&PrintJob> {
        self.pending_job.as_ref()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    /// Whether a generation or print request is outstanding.
    pub fn is_busy(&self) -> bool {
        matches!(
            self.state,
            WorkflowState::AwaitingGeneration | WorkflowState::Submitting
        )
    }

    /// Image of the most recent assistant message that has one.
    pub fn latest_image(&self) -> Option<&str> {
        self.history
            .messages()
            .iter()
            .rev()
            .filter(|m| m.role == Role::Assistant)
            .find_map(|m| m.image_url.as_deref())
    }

    pub async fn submit_prompt(
        &mut self,
        text: &str,
        style: GenerationStyle,
    ) -> Result<Outcome, WorkflowError> {
        let prompt = text.trim();
        if prompt.is_empty() {
            debug!("orchestrator: ignoring blank prompt");
            return Ok(Outcome::Ignored);
        }
        match self.state {
            WorkflowState::Idle => {}
            WorkflowState::AwaitingGeneration => {
                debug!("orchestrator: generation already in flight; prompt ignored");
                return Ok(Outcome::Ignored);
            }
            state => {
                return Err(WorkflowError::InvalidTransition {
                    operation: "submit_prompt",
                    state,
                })
            }
        }

        let origin = PromptOrigin {
            prompt: prompt.to_string(),
            style,
        };
        let now = Utc::now();
        let id = self.history.next_id(now);
        self.record(ConversationMessage::user(id, origin.clone(), now))
            .await;

        let token = self.issue_token();
        self.pending_generation = Some(token);
        self.pending_origin = Some(origin.clone());
        self.transition(WorkflowState::AwaitingGeneration);

        let command = WorkflowCommand::Generate {
            token,
            request: GenerateRequest {
                prompt: origin.prompt.clone(),
                style,
            },
        };
        if let Err(err) = self.dispatch(command) {
            self.pending_generation = None;
            self.pending_origin = None;
            self.record_assistant(
                classify_generation_failure(&err.to_string()),
                None,
                Some(origin),
            )
            .await;
            self.transition(WorkflowState::Idle);
            return Err(err);
        }
        Ok(Outcome::Applied)
    }

    /// Replays the prompt and style that produced `message_id`.
    pub async fn regenerate(&mut self, message_id: MessageId) -> Result<Outcome, WorkflowError> {
        let message = self
            .history
            .get(message_id)
            .ok_or(WorkflowError::UnknownMessage(message_id.0))?;
        let origin = message
            .origin
            .clone()
            .ok_or(WorkflowError::NothingToRegenerate(message_id.0))?;
        self.submit_prompt(&origin.prompt, origin.style).await
    }

    /// Stops waiting for the outstanding generation. Its late result is dropped by the token check.
    pub fn cancel_generation(&mut self) -> Result<Outcome, WorkflowError> {
        self.expect_state(WorkflowState::AwaitingGeneration, "cancel_generation")?;
        self.pending_generation = None;
        self.pending_origin = None;
        self.transition(WorkflowState::Idle);
        Ok(Outcome::Applied)
    }

    pub async fn handle_event(&mut self, event: WorkflowEvent) -> Outcome {
        match event {
            WorkflowEvent::GenerationSucceeded { token, image_url } => {
                self.on_generation_result(token, image_url).await
            }
            WorkflowEvent::GenerationFailed { token, cause } => {
                self.on_generation_error(token, &cause).await
            }
            WorkflowEvent::PrintSucceeded { token } => self.on_print_result(token),
            WorkflowEvent::PrintFailed { token, cause } => self.on_print_error(token, &cause),
        }
    }

    pub async fn on_generation_result(
        &mut self,
        token: RequestToken,
        image_url: String,
    ) -> Outcome {
        if !self.accepts_generation(token) {
            return Outcome::Ignored;
        }
        self.pending_generation = None;
        let origin = self.pending_origin.take();
        self.record_assistant(GENERATION_SUCCESS_TEXT.to_string(), Some(image_url), origin)
            .await;
        self.transition(WorkflowState::Idle);
        Outcome::Applied
    }

    pub async fn on_generation_error(&mut self, token: RequestToken, cause: &str) -> Outcome {
        if !self.accepts_generation(token) {
            return Outcome::Ignored;
        }
        warn!(cause, "orchestrator: generation failed");
        self.pending_generation = None;
        let origin = self.pending_origin.take();
        self.record_assistant(classify_generation_failure(cause), None, origin)
            .await;
        self.transition(WorkflowState::Idle);
        Outcome::Applied
    }

    /// Opens a composer session on an image an earlier assistant message produced.
    pub fn open_composer(&mut self, image_url: &str) -> Result<Outcome, WorkflowError> {
        self.expect_state(WorkflowState::Idle, "open_composer")?;
        let known = self
            .history
            .messages()
            .iter()
            .any(|m| m.role == Role::Assistant && m.image_url.as_deref() == Some(image_url));
        if !known {
            return Err(WorkflowError::UnknownImage(image_url.to_string()));
        }

        let mut composer =
            Composer::open(self.config.page, self.config.viewport, self.config.padding)?;
        composer.load_image(image_url);
        self.composer = Some(composer);
        self.notice = None;
        self.transition(WorkflowState::Composing);
        Ok(Outcome::Applied)
    }

    /// Records the latest viewport and refits an open session.
    pub fn resize_viewport(&mut self, viewport: Viewport) {
        self.config.viewport = viewport;
        if let Some(composer) = self.composer.as_mut() {
            composer.resize_viewport(viewport);
        }
    }

    pub fn cancel_composer(&mut self) -> Result<Outcome, WorkflowError> {
        self.expect_state(WorkflowState::Composing, "cancel_composer")?;
        self.composer = None;
        self.transition(WorkflowState::Idle);
        Ok(Outcome::Applied)
    }

    /// Freezes the current placement into a print job and moves to the confirmation gate.
    pub fn confirm_composition(&mut self) -> Result<PrintJob, WorkflowError> {
        self.expect_state(WorkflowState::Composing, "confirm_composition")?;
        let job = match self.composer.as_ref() {
            Some(composer) => composer.compute_print_job()?,
            None => return Err(ComposerError::NoImage.into()),
        };
        self.composer = None;
        self.pending_job = Some(job.clone());
        self.transition(WorkflowState::AwaitingPrintConfirmation);
        Ok(job)
    }

    pub fn cancel_print_confirmation(&mut self) -> Result<Outcome, WorkflowError> {
        self.expect_state(
            WorkflowState::AwaitingPrintConfirmation,
            "cancel_print_confirmation",
        )?;
        self.pending_job = None;
        self.transition(WorkflowState::Idle);
        Ok(Outcome::Applied)
    }

    pub fn confirm_print(&mut self) -> Result<Outcome, WorkflowError> {
        match self.state {
            WorkflowState::AwaitingPrintConfirmation => {}
            WorkflowState::Submitting => {
                debug!("orchestrator: print already submitting; confirm ignored");
                return Ok(Outcome::Ignored);
            }
            state => {
                return Err(WorkflowError::InvalidTransition {
                    operation: "confirm_print",
                    state,
                })
            }
        }
        let Some(job) = self.pending_job.as_ref() else {
            return Err(WorkflowError::InvalidTransition {
                operation: "confirm_print",
                state: self.state,
            });
        };

        let request = PrintRequest::from(job);
        let token = self.issue_token();
        let command = WorkflowCommand::Print { token, request };
        self.pending_print = Some(token);
        self.transition(WorkflowState::Submitting);

        if let Err(err) = self.dispatch(command) {
            self.pending_print = None;
            self.pending_job = None;
            self.notice = Some(Notice {
                level: NoticeLevel::Error,
                message: classify_print_failure(&err.to_string()),
            });
            self.transition(WorkflowState::Idle);
            return Err(err);
        }
        Ok(Outcome::Applied)
    }

    pub fn on_print_result(&mut self, token: RequestToken) -> Outcome {
        if !self.accepts_print(token) {
            return Outcome::Ignored;
        }
        self.finish_print(Notice {
            level: NoticeLevel::Info,
            message: PRINT_SENT_TEXT.to_string(),
        });
        Outcome::Applied
    }

    /// The failed job is discarded, not kept for resubmission.
    pub fn on_print_error(&mut self, token: RequestToken, cause: &str) -> Outcome {
        if !self.accepts_print(token) {
            return Outcome::Ignored;
        }
        warn!(cause, "orchestrator: print failed");
        self.finish_print(Notice {
            level: NoticeLevel::Error,
            message: classify_print_failure(cause),
        });
        Outcome::Applied
    }

    fn finish_print(&mut self, notice: Notice) {
        self.pending_print = None;
        self.pending_job = None;
        self.notice = Some(notice);
        self.transition(WorkflowState::Idle);
    }

    fn accepts_generation(&self, token: RequestToken) -> bool {
        let accepted = self.state == WorkflowState::AwaitingGeneration
            && self.pending_generation == Some(token);
        if !accepted {
            debug!(
                token = token.0,
                state = ?self.state,
                "orchestrator: stale generation completion ignored"
            );
        }
        accepted
    }

    fn accepts_print(&self, token: RequestToken) -> bool {
        let accepted =
            self.state == WorkflowState::Submitting && self.pending_print == Some(token);
        if !accepted {
            debug!(
                token = token.0,
                state = ?self.state,
                "orchestrator: stale print completion ignored"
            );
        }
        accepted
    }

    fn expect_state(
        &self,
        expected: WorkflowState,
        operation: &'static str,
    ) -> Result<(), WorkflowError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(WorkflowError::InvalidTransition {
                operation,
                state: self.state,
            })
        }
    }

    fn transition(&mut self, next: WorkflowState) {
        if self.state != next {
            info!(from = ?self.state, to = ?next, "orchestrator: state changed");
            self.state = next;
        }
    }

    fn issue_token(&mut self) -> RequestToken {
        self.next_token += 1;
        RequestToken(self.next_token)
    }

    fn dispatch(&self, command: WorkflowCommand) -> Result<(), WorkflowError> {
        let name = command.name();
        let token = command.token();
        match self.commands.try_send(command) {
            Ok(()) => {
                debug!(command = name, token = token.0, "queued workflow command");
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(WorkflowError::Dispatch {
                command: name,
                reason: "worker queue is full",
            }),
            Err(TrySendError::Closed(_)) => Err(WorkflowError::Dispatch {
                command: name,
                reason: "worker disconnected",
            }),
        }
    }

    async fn record_assistant(
        &mut self,
        text: String,
        image_url: Option<String>,
        origin: Option<PromptOrigin>,
    ) {
        let now = Utc::now();
        let id = self.history.next_id(now);
        self.record(ConversationMessage::assistant(id, text, image_url, origin, now))
            .await;
    }

    async fn record(&mut self, message: ConversationMessage) {
        if let Err(err) = self.history.append(message).await {
            warn!(error = %err, "orchestrator: conversation not persisted");
        }
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
