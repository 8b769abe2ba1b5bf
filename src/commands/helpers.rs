//! Command helper utilities

use std::path::Path;

use appcontainer::config::Settings;
use appcontainer::context::{RuntimeContext, SETTINGS_FILE};
use appcontainer::error::Result;
use appcontainer::orchestrator::Pipeline;
use appcontainer::transport::open_transport;

/// Load and validate the settings found in `base`, then build the runtime context
///
/// A missing settings file yields the defaults.
pub fn open_context(base: &Path) -> Result<(RuntimeContext, Settings)> {
    let settings = Settings::load(&base.join(SETTINGS_FILE))?;
    settings.validate()?;
    let ctx = RuntimeContext::new(base, &settings.app_name);
    Ok((ctx, settings))
}

/// Prepare the runtime directories and build a pipeline over the configured transport
pub fn open_pipeline(base: &Path) -> Result<Pipeline> {
    let (ctx, settings) = open_context(base)?;
    ctx.prepare()?;
    let transport = open_transport(&settings)?;
    Ok(Pipeline::new(ctx, settings, transport))
}
