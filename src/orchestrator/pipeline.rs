//! The controller loop and its stages
//!
//! Each stage is a method returning the next [`Stage`] or an error; the loop in
//! [`Pipeline::drive`] applies the transition, notifies the observer and stops
//! at decision points and terminal stages.

use std::path::PathBuf;
use std::sync::Arc;

use super::observer::PipelineObserver;
use super::{Decision, Failure, Outcome, PipelineState, RecoveryAction, Stage};
use crate::config::{ResourceRegistry, Settings};
use crate::context::{RunGuard, RuntimeContext};
use crate::error::{LauncherError, Result};
use crate::loader::{ApplicationHandle, EntryPointRegistry, Loader};
use crate::manifest::{MetadataSource, read_metadata};
use crate::reconcile::{LocalInstall, UpdatePlan, UpdatePolicy, reconcile};
use crate::sync::{self, StageProgress};
use crate::transport::{FetchProgress, Transport};

/// One orchestration run over a runtime context
pub struct Pipeline {
    ctx: RuntimeContext,
    settings: Settings,
    registry: ResourceRegistry,
    policy: UpdatePolicy,
    transport: Box<dyn Transport>,
    loader: Loader,
    params: Vec<String>,
    keep: Vec<PathBuf>,
    state: PipelineState,
    local: LocalInstall,
    plan: Option<UpdatePlan>,
    staged: Vec<PathBuf>,
    launched: Option<ApplicationHandle>,
    guard: Option<RunGuard>,
}

impl Pipeline {
    pub fn new(ctx: RuntimeContext, settings: Settings, transport: Box<dyn Transport>) -> Self {
        let loader = Loader::new(settings.launch.clone(), EntryPointRegistry::default());
        let keep = settings
            .keep_paths
            .iter()
            .map(|path| ctx.app_dir.join(path))
            .collect();
        Self {
            registry: settings.registry(),
            policy: UpdatePolicy::from_settings(&settings),
            ctx,
            settings,
            transport,
            loader,
            params: Vec::new(),
            keep,
            state: PipelineState::default(),
            local: LocalInstall::default(),
            plan: None,
            staged: Vec::new(),
            launched: None,
            guard: None,
        }
    }

    /// Replace the loader, e.g. to register custom entry points
    #[must_use]
    pub fn with_loader(mut self, loader: Loader) -> Self {
        self.loader = loader;
        self
    }

    /// Parameters handed to the launched application
    #[must_use]
    pub fn with_params(mut self, params: Vec<String>) -> Self {
        self.params = params;
        self
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn plan(&self) -> Option<&UpdatePlan> {
        self.plan.as_ref()
    }

    pub fn context(&self) -> &RuntimeContext {
        &self.ctx
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Claim the runtime context for this pipeline
    ///
    /// Fails with [`LauncherError::RunInProgress`] while another run holds it.
    pub fn acquire(&mut self) -> Result<()> {
        if self.guard.is_none() {
            self.guard = Some(self.ctx.begin_run()?);
        }
        Ok(())
    }

    /// Run from the start until the application is launched, a decision is
    /// needed, or the run ends
    pub fn run(&mut self, observer: &mut dyn PipelineObserver) -> Result<Outcome> {
        self.acquire()?;
        self.reset();
        self.enter(Stage::Pinging, observer);
        Ok(self.drive(observer))
    }

    /// Continue after [`Outcome::AwaitingDecision`] or a skippable failure
    pub fn resume(
        &mut self,
        decision: Decision,
        observer: &mut dyn PipelineObserver,
    ) -> Result<Outcome> {
        let stage = self.state.stage;
        let skippable_failure = stage == Stage::Failed
            && self
                .state
                .last_error
                .as_ref()
                .is_some_and(|f| f.recovery == RecoveryAction::SkipUpdate);
        let can_skip = self
            .plan
            .as_ref()
            .is_some_and(UpdatePlan::may_resume_without_update);

        let next = match (stage, decision) {
            (Stage::AwaitingUserDecision, Decision::Proceed) => Stage::Purging,
            (Stage::AwaitingUserDecision, Decision::Skip) if can_skip => Stage::Launching,
            (Stage::AwaitingUserDecision, Decision::Skip) => {
                tracing::warn!("Skipping this update is not allowed");
                let stale = self.stale();
                observer.on_update_available(false, &stale);
                return Ok(self.drive(observer));
            }
            (Stage::AwaitingUserDecision, Decision::Close) => Stage::Closed,
            (Stage::Failed, Decision::Skip) if skippable_failure => Stage::Launching,
            (Stage::Failed, Decision::Close) => Stage::Closed,
            _ => {
                return Err(LauncherError::UnexpectedDecision {
                    decision: decision.to_string(),
                    stage: stage.to_string(),
                });
            }
        };

        tracing::info!(%decision, "Resuming pipeline");
        if !next.is_terminal() {
            self.acquire()?;
        }
        self.enter(next, observer);
        Ok(self.drive(observer))
    }

    /// Ping and reconcile only; the application directory is left untouched
    pub fn check(&mut self, observer: &mut dyn PipelineObserver) -> Result<UpdatePlan> {
        self.acquire()?;
        self.reset();
        let result = self.check_stages(observer);
        self.guard = None;
        result
    }

    fn check_stages(&mut self, observer: &mut dyn PipelineObserver) -> Result<UpdatePlan> {
        self.enter(Stage::Pinging, observer);
        self.ping(observer)?;
        self.enter(Stage::Reconciling, observer);
        self.reconcile(observer)?;
        self.plan
            .clone()
            .ok_or_else(|| LauncherError::WorkerFailed {
                message: "reconciliation produced no plan".to_string(),
            })
    }

    fn reset(&mut self) {
        self.state = PipelineState::default();
        self.plan = None;
        self.staged.clear();
        self.launched = None;
        self.local = LocalInstall::detect(&self.ctx, &self.settings);
    }

    /// Controller loop
    fn drive(&mut self, observer: &mut dyn PipelineObserver) -> Outcome {
        loop {
            let stage = self.state.stage;
            match stage {
                Stage::AwaitingUserDecision => {
                    let (can_skip, stale) = self.plan.as_ref().map_or_else(
                        || (false, Vec::new()),
                        |p| (p.may_resume_without_update(), p.stale_resources().to_vec()),
                    );
                    return Outcome::AwaitingDecision { can_skip, stale };
                }
                Stage::Succeeded => {
                    return match self.launched.take() {
                        Some(handle) => Outcome::Launched(handle),
                        None => Outcome::Closed,
                    };
                }
                Stage::Failed => {
                    if let Some(failure) = self.state.last_error.clone() {
                        return Outcome::Failed(failure);
                    }
                    return Outcome::Closed;
                }
                Stage::Closed | Stage::Idle => return Outcome::Closed,
                _ => {}
            }

            let result = match stage {
                Stage::Pinging => self.ping(observer),
                Stage::Reconciling => self.reconcile(observer),
                Stage::Purging => self.purge(observer),
                Stage::Downloading => self.download(observer),
                Stage::Extracting => self.extract(observer),
                Stage::Launching => self.launch(observer),
                _ => Ok(Stage::Closed),
            };

            match result {
                Ok(next) => self.enter(next, observer),
                Err(err) => self.fail(stage, err, observer),
            }
        }
    }

    /// Apply a transition and tell the observer
    fn enter(&mut self, stage: Stage, observer: &mut dyn PipelineObserver) {
        tracing::info!(from = %self.state.stage, to = %stage, "Pipeline transition");
        self.state.stage = stage;

        if let Some(title) = stage.title() {
            observer.report_title(title);
            self.state.progress = 0.0;
            observer.report_progress(0.0);
        }
        if stage.is_terminal() {
            self.guard = None;
        }
    }

    fn fail(&mut self, stage: Stage, err: LauncherError, observer: &mut dyn PipelineObserver) {
        let recovery = match stage {
            Stage::Pinging if self.local.is_usable() => RecoveryAction::SkipUpdate,
            Stage::Reconciling if self.local.is_valid() => RecoveryAction::SkipUpdate,
            _ => RecoveryAction::Close,
        };
        let message = match stage {
            Stage::Pinging => "Cannot connect to host server.",
            _ => "Task failed.",
        };

        tracing::error!(
            stage = %stage,
            class = %err.class(),
            error = ?err,
            "Pipeline stage failed"
        );

        let failure = Failure {
            stage,
            message: message.to_string(),
            class: err.class(),
            recovery,
            cause: Arc::new(err),
        };
        self.set_message(message, observer);
        self.state.progress = 0.0;
        observer.report_progress(0.0);
        observer.on_stage_failed(&failure);
        self.state.last_error = Some(failure);
        self.enter(Stage::Failed, observer);
    }

    fn set_message(&mut self, text: &str, observer: &mut dyn PipelineObserver) {
        self.state.message = text.to_string();
        observer.report_message(text);
    }

    fn finish_stage(&mut self, observer: &mut dyn PipelineObserver) {
        self.state.progress = 1.0;
        observer.report_progress(1.0);
    }

    fn ping(&mut self, observer: &mut dyn PipelineObserver) -> Result<Stage> {
        let location = self.settings.manifest_location.clone();
        self.set_message(
            &format!("Pinging {} ({})", location, self.transport.name()),
            observer,
        );
        self.transport.ping(&location)?;
        self.set_message(
            "Server ping succeeded. The host server is reachable. Proceeding with update check...",
            observer,
        );
        self.finish_stage(observer);
        Ok(Stage::Reconciling)
    }

    fn reconcile(&mut self, observer: &mut dyn PipelineObserver) -> Result<Stage> {
        self.set_message(
            "Downloading application manifest file from server. This may take a few seconds.",
            observer,
        );

        let staged = self.ctx.staged_manifest();
        let fetched = {
            let mut progress = StateProgress {
                state: &mut self.state,
                observer: &mut *observer,
            };
            self.transport.open_session().and_then(|mut session| {
                session.fetch(
                    &self.settings.manifest_location,
                    &staged,
                    &mut |p: FetchProgress| {
                        if let FetchProgress::Percent(percent) = p {
                            progress.progress(f64::from(percent) / 100.0);
                        }
                    },
                )
            })
        };
        let remote = match fetched {
            Ok(_) => Some(read_metadata(&MetadataSource::File(staged))),
            Err(e) => {
                tracing::warn!(error = %e, "Could not fetch remote metadata");
                None
            }
        };

        let plan = reconcile(&self.local, remote.as_ref(), &self.registry, &self.policy)?;
        let app_name = self.settings.app_name.clone();

        let next = if plan.is_up_to_date() {
            self.set_message(
                &format!("Your {app_name} is up to date! No new update is available."),
                observer,
            );
            Stage::Launching
        } else {
            self.set_message(
                &format!(
                    "A newer version of {app_name} is available ({} resource(s) to update).",
                    plan.stale_resources().len()
                ),
                observer,
            );
            if plan.must_notify() {
                observer.on_update_available(
                    plan.may_resume_without_update(),
                    plan.stale_resources(),
                );
                Stage::AwaitingUserDecision
            } else {
                Stage::Purging
            }
        };

        self.plan = Some(plan);
        self.finish_stage(observer);
        Ok(next)
    }

    fn stale(&self) -> Vec<crate::config::ResourceDescriptor> {
        self.plan
            .as_ref()
            .map(|p| p.stale_resources().to_vec())
            .unwrap_or_default()
    }

    fn purge(&mut self, observer: &mut dyn PipelineObserver) -> Result<Stage> {
        let stale = self.stale();
        let mut progress = StateProgress {
            state: &mut self.state,
            observer,
        };
        sync::purge::purge(&self.ctx, &stale, &self.keep, &mut progress)?;
        progress.progress(1.0);
        Ok(Stage::Downloading)
    }

    fn download(&mut self, observer: &mut dyn PipelineObserver) -> Result<Stage> {
        let stale = self.stale();
        let mut progress = StateProgress {
            state: &mut self.state,
            observer,
        };
        self.staged = sync::download::download(
            &self.ctx,
            self.transport.as_ref(),
            &stale,
            &self.settings.manifest_location,
            &mut progress,
        )?;
        Ok(Stage::Extracting)
    }

    fn extract(&mut self, observer: &mut dyn PipelineObserver) -> Result<Stage> {
        {
            let mut progress = StateProgress {
                state: &mut self.state,
                observer: &mut *observer,
            };
            sync::extract::extract(&self.ctx, &self.staged, &mut progress)?;
        }
        self.local = LocalInstall::detect(&self.ctx, &self.settings);
        self.set_message("Task completed.", observer);
        Ok(Stage::Launching)
    }

    fn launch(&mut self, observer: &mut dyn PipelineObserver) -> Result<Stage> {
        self.set_message("Locating application artifact", observer);
        let handle = self.loader.load_and_start(
            &self.settings.app_name,
            &self.ctx.app_dir,
            &self.ctx.config_file,
            &self.params,
        )?;
        self.set_message("Task completed.", observer);
        self.finish_stage(observer);
        self.launched = Some(handle);
        Ok(Stage::Succeeded)
    }
}

/// Forwards sync stage progress into the pipeline state and the observer
struct StateProgress<'a> {
    state: &'a mut PipelineState,
    observer: &'a mut dyn PipelineObserver,
}

impl StageProgress for StateProgress<'_> {
    fn progress(&mut self, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0);
        // Stage progress never moves backwards
        if fraction < self.state.progress {
            return;
        }
        self.state.progress = fraction;
        self.observer.report_progress(fraction);
    }

    fn message(&mut self, text: &str) {
        text.clone_into(&mut self.state.message);
        self.observer.report_message(text);
    }
}
