//! Running a pipeline on a dedicated worker thread
//!
//! The worker owns the [`Pipeline`]; the calling thread owns the presentation
//! layer. Notifications flow worker -> caller through an [`EventPump`];
//! decisions flow caller -> worker through a second channel.

use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use super::observer::{ChannelObserver, EventPump, PipelineEvent, PipelineObserver};
use super::{Decision, Failure, Outcome, Pipeline, RecoveryAction};
use crate::config::ResourceDescriptor;
use crate::error::{LauncherError, Result};

const WORKER_THREAD_NAME: &str = "appcontainer-pipeline";

/// Answers the pipeline's questions on behalf of the user
pub trait DecisionMaker {
    /// An update is available and the user must be asked first
    fn decide_update(&mut self, can_skip: bool, stale: &[ResourceDescriptor]) -> Decision;

    /// A stage failed but the installed copy could still be launched
    fn decide_after_failure(&mut self, failure: &Failure) -> Decision;
}

/// Entry point for background runs
#[derive(Debug)]
pub struct Orchestrator;

impl Orchestrator {
    /// Start `pipeline` on a worker thread
    ///
    /// Fails immediately if another run holds the runtime context.
    pub fn spawn(mut pipeline: Pipeline) -> Result<RunningPipeline> {
        pipeline.acquire()?;

        let (event_tx, event_rx) = mpsc::channel();
        let (decision_tx, decision_rx) = mpsc::channel::<Decision>();

        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || -> Result<Outcome> {
                let mut observer = ChannelObserver::new(event_tx);
                let mut outcome = pipeline.run(&mut observer)?;
                while outcome.awaits_decision() {
                    let decision = decision_rx.recv().unwrap_or_else(|_| {
                        tracing::debug!("Decision channel closed, closing pipeline");
                        Decision::Close
                    });
                    outcome = pipeline.resume(decision, &mut observer)?;
                }
                Ok(outcome)
            })
            .map_err(|e| LauncherError::WorkerFailed {
                message: e.to_string(),
            })?;

        Ok(RunningPipeline {
            events: EventPump::new(event_rx),
            decisions: decision_tx,
            worker,
        })
    }
}

/// Handle to a pipeline running on its worker thread
#[derive(Debug)]
pub struct RunningPipeline {
    events: EventPump,
    decisions: Sender<Decision>,
    worker: JoinHandle<Result<Outcome>>,
}

impl RunningPipeline {
    pub fn events(&self) -> &EventPump {
        &self.events
    }

    /// Send a decision to the worker
    pub fn decide(&self, decision: Decision) -> Result<()> {
        self.decisions
            .send(decision)
            .map_err(|_| LauncherError::WorkerFailed {
                message: "pipeline worker is no longer running".to_string(),
            })
    }

    /// Render events on `observer` and answer questions with `decider` until the worker ends
    pub fn drive(
        self,
        observer: &mut dyn PipelineObserver,
        decider: &mut dyn DecisionMaker,
    ) -> Result<Outcome> {
        while let Some(batch) = self.events.next_batch() {
            for event in batch {
                event.dispatch(observer);
                let decision = match &event {
                    PipelineEvent::UpdateAvailable { can_skip, stale } => {
                        Some(decider.decide_update(*can_skip, stale))
                    }
                    PipelineEvent::StageFailed(failure)
                        if failure.recovery == RecoveryAction::SkipUpdate =>
                    {
                        Some(decider.decide_after_failure(failure))
                    }
                    _ => None,
                };
                if let Some(decision) = decision {
                    // The worker may already have ended on its own
                    let _ = self.decide(decision);
                }
            }
        }
        self.join()
    }

    /// Wait for the worker and take its outcome
    pub fn join(self) -> Result<Outcome> {
        drop(self.decisions);
        self.worker.join().map_err(|panic| {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "worker panicked".to_string());
            LauncherError::WorkerFailed { message }
        })?
    }
}
