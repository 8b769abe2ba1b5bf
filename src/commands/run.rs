//! Run command implementation
//!
//! Runs the whole pipeline on a worker thread, renders it on the terminal and
//! waits for the started application.

use std::path::Path;

use appcontainer::error::Result;
use appcontainer::orchestrator::{DecisionMaker, Orchestrator, Outcome, PipelineObserver};
use appcontainer::ui::{AutoDecider, PromptDecider, SilentObserver, TerminalObserver};

use super::helpers::open_pipeline;
use super::{EXIT_CLOSED, EXIT_FAILED};
use crate::cli::RunArgs;

/// Run the run command; returns the process exit code
pub fn run(base: &Path, args: RunArgs) -> Result<i32> {
    let pipeline = open_pipeline(base)?.with_params(args.params);
    let version_description_url = pipeline.settings().version_description_url.clone();

    let mut observer: Box<dyn PipelineObserver> = if args.quiet {
        Box::new(SilentObserver)
    } else {
        Box::new(TerminalObserver::new(version_description_url))
    };
    let mut decider: Box<dyn DecisionMaker> = if args.yes || args.skip_update {
        Box::new(AutoDecider {
            prefer_skip: args.skip_update,
        })
    } else {
        Box::new(PromptDecider)
    };

    let running = Orchestrator::spawn(pipeline)?;
    let outcome = running.drive(observer.as_mut(), decider.as_mut())?;
    drop(observer);

    match outcome {
        Outcome::Launched(handle) => {
            tracing::info!(
                entry_point = handle.entry_point(),
                artifact = %handle.artifact().display(),
                "Application started"
            );
            handle.wait()
        }
        Outcome::Failed(failure) => {
            tracing::error!(stage = %failure.stage, "Run failed: {}", failure.cause);
            Ok(EXIT_FAILED)
        }
        Outcome::Closed | Outcome::AwaitingDecision { .. } => {
            tracing::info!("Launcher closed by the user");
            Ok(EXIT_CLOSED)
        }
    }
}
