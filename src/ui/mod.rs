//! Terminal presentation of a pipeline run
//!
//! This module handles:
//! - Rendering stage titles, messages and progress with indicatif
//! - A silent observer for `--quiet` runs
//! - Asking the user what to do when an update is available (inquire)
//!
//! Everything here implements the orchestrator's [`PipelineObserver`] and
//! [`DecisionMaker`] seams, so the core never touches the terminal.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Confirm, Select};

use crate::config::ResourceDescriptor;
use crate::orchestrator::{Decision, DecisionMaker, Failure, PipelineObserver, RecoveryAction};

const BAR_LENGTH: u64 = 100;

/// Interactive observer with a single progress bar
///
/// The bar is reused across stages; each new title resets it.
pub struct TerminalObserver {
    bar: ProgressBar,
    version_description_url: Option<String>,
}

impl TerminalObserver {
    pub fn new(version_description_url: Option<String>) -> Self {
        let style = ProgressStyle::with_template(
            "{prefix:.bold} [{bar:40.cyan/blue}] {percent:>3}% {wide_msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");

        let bar = ProgressBar::new(BAR_LENGTH);
        bar.set_style(style);

        Self {
            bar,
            version_description_url,
        }
    }

    /// Stop drawing; called before prompting or exiting
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Drop for TerminalObserver {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish();
        }
    }
}

impl PipelineObserver for TerminalObserver {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn report_progress(&mut self, fraction: f64) {
        let position = (fraction.clamp(0.0, 1.0) * BAR_LENGTH as f64).round() as u64;
        self.bar.set_position(position);
    }

    fn report_message(&mut self, text: &str) {
        self.bar.set_message(text.to_string());
    }

    fn report_title(&mut self, text: &str) {
        self.bar
            .println(format!("{}", Style::new().bold().green().apply_to(text)));
        self.bar.set_prefix(text.to_string());
        self.bar.reset();
    }

    fn on_stage_failed(&mut self, failure: &Failure) {
        self.bar.abandon();
        eprintln!(
            "{} {}",
            Style::new().bold().red().apply_to(&failure.message),
            Style::new().dim().apply_to(format!("({})", failure.stage))
        );
        eprintln!("  {}", failure.cause);
    }

    fn on_update_available(&mut self, can_skip: bool, stale: &[ResourceDescriptor]) {
        self.bar.suspend(|| {
            println!("{}", Style::new().bold().yellow().apply_to("Update Available"));
            for resource in stale {
                println!("  - {}", resource.display_name());
            }
            if let Some(url) = &self.version_description_url {
                println!("  {} {url}", Style::new().bold().apply_to("What's new:"));
            }
            if !can_skip {
                println!("  This update is required.");
            }
        });
    }
}

/// Observer that renders nothing
///
/// Used with `--quiet`; notifications still reach the log.
#[derive(Debug, Default)]
pub struct SilentObserver;

impl PipelineObserver for SilentObserver {
    fn report_progress(&mut self, _fraction: f64) {}

    fn report_message(&mut self, text: &str) {
        tracing::debug!(message = text, "Pipeline message");
    }

    fn report_title(&mut self, _text: &str) {}

    fn on_stage_failed(&mut self, _failure: &Failure) {}

    fn on_update_available(&mut self, _can_skip: bool, _stale: &[ResourceDescriptor]) {}
}

const UPDATE_NOW: &str = "Update Now";
const CLOSE: &str = "Close";

/// Asks the user on the terminal
#[derive(Debug, Default)]
pub struct PromptDecider;

impl DecisionMaker for PromptDecider {
    fn decide_update(&mut self, can_skip: bool, _stale: &[ResourceDescriptor]) -> Decision {
        let mut options = vec![UPDATE_NOW];
        if can_skip {
            options.push(RecoveryAction::SkipUpdate.label());
        }
        options.push(CLOSE);

        match Select::new("A newer version is available", options)
            .with_starting_cursor(0)
            .without_filtering()
            .with_help_message("↑↓ to move, ENTER to select, ESC to close")
            .prompt_skippable()
        {
            Ok(Some(UPDATE_NOW)) => Decision::Proceed,
            Ok(Some(choice)) if choice == RecoveryAction::SkipUpdate.label() => Decision::Skip,
            Ok(_) => Decision::Close,
            Err(e) => {
                tracing::warn!(error = %e, "Prompt failed, closing");
                Decision::Close
            }
        }
    }

    fn decide_after_failure(&mut self, failure: &Failure) -> Decision {
        match Confirm::new("Start the installed version without updating?")
            .with_default(true)
            .with_help_message(&failure.message)
            .prompt_skippable()
        {
            Ok(Some(true)) => Decision::Skip,
            Ok(_) => Decision::Close,
            Err(e) => {
                tracing::warn!(error = %e, "Prompt failed, closing");
                Decision::Close
            }
        }
    }
}

/// Answers without asking, for unattended runs
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoDecider {
    /// Prefer keeping the installed version when the update may be skipped
    pub prefer_skip: bool,
}

impl DecisionMaker for AutoDecider {
    fn decide_update(&mut self, can_skip: bool, _stale: &[ResourceDescriptor]) -> Decision {
        if self.prefer_skip && can_skip {
            Decision::Skip
        } else {
            Decision::Proceed
        }
    }

    fn decide_after_failure(&mut self, _failure: &Failure) -> Decision {
        Decision::Skip
    }
}
