//! Paths command implementation

use std::path::Path;

use console::Style;

use appcontainer::error::Result;

use super::helpers::open_context;

/// Print the runtime context
pub fn run(base: &Path) -> Result<()> {
    let (ctx, settings) = open_context(base)?;
    let label = |text: &str| Style::new().bold().apply_to(format!("{text:<14}"));

    let settings_note = if ctx.settings_file.is_file() {
        String::new()
    } else {
        " (not present, using defaults)".to_string()
    };

    println!("{} {}", label("Application:"), settings.app_name);
    println!("{} {}", label("Hosting:"), settings.hosting);
    println!("{} {}", label("Manifest:"), settings.manifest_location);
    println!("{} {}", label("Base:"), ctx.base_dir.display());
    println!(
        "{} {}{settings_note}",
        label("Settings:"),
        ctx.settings_file.display()
    );
    println!("{} {}", label("App dir:"), ctx.app_dir.display());
    println!("{} {}", label("Temp dir:"), ctx.temp_dir.display());
    println!("{} {}", label("Log file:"), ctx.log_file.display());
    println!("{} {}", label("Config file:"), ctx.config_file.display());

    Ok(())
}
