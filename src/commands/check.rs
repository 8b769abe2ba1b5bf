//! Check command implementation
//!
//! Pings the server and reconciles versions without touching the
//! application directory.

use std::path::Path;

use console::Style;

use appcontainer::error::{LauncherError, Result};
use appcontainer::reconcile::UpdatePlan;
use appcontainer::ui::{SilentObserver, TerminalObserver};

use super::helpers::open_pipeline;
use crate::cli::CheckArgs;

/// Run check command
pub fn run(base: &Path, args: &CheckArgs) -> Result<()> {
    let mut pipeline = open_pipeline(base)?;
    let app_name = pipeline.settings().app_name.clone();

    let plan = if args.json {
        pipeline.check(&mut SilentObserver)?
    } else {
        let mut observer = TerminalObserver::new(None);
        let plan = pipeline.check(&mut observer);
        observer.finish();
        plan?
    };

    if args.json {
        let json = serde_json::to_string_pretty(&plan).map_err(|e| LauncherError::IoError {
            message: format!("Failed to serialize update plan: {e}"),
        })?;
        println!("{json}");
    } else {
        print_plan(&app_name, &plan);
    }

    Ok(())
}

fn print_plan(app_name: &str, plan: &UpdatePlan) {
    if plan.is_up_to_date() {
        println!("Your {app_name} is up to date! No new update is available.");
        return;
    }

    println!(
        "{}",
        Style::new()
            .bold()
            .yellow()
            .apply_to(format!("A newer version of {app_name} is available."))
    );
    for resource in plan.stale_resources() {
        println!(
            "  - {} {}",
            resource.display_name(),
            Style::new()
                .dim()
                .apply_to(format!("({})", resource.metadata_key()))
        );
    }
    if plan.must_notify() {
        let policy = if plan.may_resume_without_update() {
            "optional"
        } else {
            "required"
        };
        println!("  {} {policy}", Style::new().bold().apply_to("Update:"));
    }
}
