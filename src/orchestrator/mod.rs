//! Launch orchestration
//!
//! The pipeline is a finite-state machine driven by one controller loop:
//!
//! ```text
//! Pinging -> Reconciling -+-> Launching -> Succeeded
//!                         +-> AwaitingUserDecision -> (Purging | Launching | Closed)
//!                         +-> Purging -> Downloading -> Extracting -> Launching
//! any stage --error--> Failed
//! ```
//!
//! - [`pipeline`]: the controller and the stage functions
//! - [`observer`]: notifications to the presentation layer, cross-thread channel
//! - [`worker`]: running the controller on a dedicated thread

pub mod observer;
pub mod pipeline;
pub mod worker;

use std::fmt;
use std::sync::Arc;

use crate::config::ResourceDescriptor;
use crate::error::{ErrorClass, LauncherError};
use crate::loader::ApplicationHandle;

pub use observer::{
    ChannelObserver, CollectingObserver, EventPump, PipelineEvent, PipelineObserver,
};
pub use pipeline::Pipeline;
pub use worker::{DecisionMaker, Orchestrator, RunningPipeline};

/// Pipeline stages; exactly one is current at any time
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Pinging,
    Reconciling,
    AwaitingUserDecision,
    Purging,
    Downloading,
    Extracting,
    Launching,
    Succeeded,
    Failed,
    Closed,
}

impl Stage {
    /// Title shown while the stage is active
    pub fn title(self) -> Option<&'static str> {
        match self {
            Stage::Pinging => Some("Ping Server Connection"),
            Stage::Reconciling => Some("Checking For Updates"),
            Stage::AwaitingUserDecision => Some("Update Available"),
            Stage::Purging => Some("Deleting Application Resources"),
            Stage::Downloading => Some("Downloading Application Resources"),
            Stage::Extracting => Some("Extracting Application Resources"),
            Stage::Launching => Some("Loading & Starting Application"),
            Stage::Idle | Stage::Succeeded | Stage::Failed | Stage::Closed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Succeeded | Stage::Failed | Stage::Closed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Pinging => "pinging",
            Stage::Reconciling => "reconciling",
            Stage::AwaitingUserDecision => "awaiting a decision",
            Stage::Purging => "purging",
            Stage::Downloading => "downloading",
            Stage::Extracting => "extracting",
            Stage::Launching => "launching",
            Stage::Succeeded => "succeeded",
            Stage::Failed => "failed",
            Stage::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// What the user may do after a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum RecoveryAction {
    /// Launch the installed copy without updating
    SkipUpdate,
    Close,
}

impl RecoveryAction {
    pub fn label(self) -> &'static str {
        match self {
            RecoveryAction::SkipUpdate => "Skip Update",
            RecoveryAction::Close => "Close",
        }
    }
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Input from the presentation layer at a decision point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Install the update
    Proceed,
    /// Launch the installed copy without updating
    Skip,
    /// Stop without launching
    Close,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Proceed => f.write_str("proceed"),
            Decision::Skip => f.write_str("skip"),
            Decision::Close => f.write_str("close"),
        }
    }
}

/// A failed stage, as reported to the presentation layer
#[derive(Debug, Clone)]
pub struct Failure {
    /// Stage that failed
    pub stage: Stage,
    /// Short user-facing message
    pub message: String,
    pub class: ErrorClass,
    pub recovery: RecoveryAction,
    /// Original error, for detailed inspection
    pub cause: Arc<LauncherError>,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.message, self.cause)
    }
}

/// The orchestrator's own state; the single source of truth for observers
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub stage: Stage,
    pub last_error: Option<Failure>,
    /// Stage-local progress, 0.0..=1.0
    pub progress: f64,
    pub message: String,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            stage: Stage::Idle,
            last_error: None,
            progress: 0.0,
            message: String::new(),
        }
    }
}

/// Where a call into the pipeline left it
#[derive(Debug)]
pub enum Outcome {
    /// Waiting for [`Decision::Proceed`], [`Decision::Skip`] or [`Decision::Close`]
    AwaitingDecision {
        can_skip: bool,
        stale: Vec<ResourceDescriptor>,
    },
    /// The application is running
    Launched(ApplicationHandle),
    Failed(Failure),
    /// Closed by the user
    Closed,
}

impl Outcome {
    /// Whether the pipeline can still act on a [`Decision`]
    pub fn awaits_decision(&self) -> bool {
        match self {
            Outcome::AwaitingDecision { .. } => true,
            Outcome::Failed(failure) => failure.recovery == RecoveryAction::SkipUpdate,
            Outcome::Launched(_) | Outcome::Closed => false,
        }
    }
}
