//! Download stage: stage stale resources in the temp directory

use std::path::PathBuf;

use super::{StageProgress, fraction, staged_path};
use crate::config::ResourceDescriptor;
use crate::context::RuntimeContext;
use crate::error::Result;
use crate::transport::{FetchProgress, NoProgress, Transport};

/// Fetch every stale resource into the temp directory
///
/// Also stages the remote metadata file if reconciliation did not already.
/// The session is opened here and closed before returning, on every path.
pub fn download(
    ctx: &RuntimeContext,
    transport: &dyn Transport,
    stale: &[ResourceDescriptor],
    manifest_location: &str,
    progress: &mut dyn StageProgress,
) -> Result<Vec<PathBuf>> {
    let mut session = transport.open_session()?;
    let total = stale.len();
    let mut staged = Vec::with_capacity(total);

    for (i, resource) in stale.iter().enumerate() {
        let dest = staged_path(ctx, resource);
        let name = resource.display_name();
        progress.message(&format!("Downloading {name} ({}/{total})", i + 1));
        progress.progress(fraction(i, total));

        let bytes = session.fetch(resource.location(), &dest, &mut |p: FetchProgress| {
            if let FetchProgress::Percent(percent) = p {
                let within = f64::from(percent) / 100.0;
                #[allow(clippy::cast_precision_loss)]
                let overall = (i as f64 + within) / total as f64;
                progress.progress(overall);
            }
        })?;

        tracing::info!(resource = %name, bytes, "Downloaded resource");
        staged.push(dest);
    }

    let manifest = ctx.staged_manifest();
    if !manifest.is_file() {
        progress.message("Downloading update metadata");
        session.fetch(manifest_location, &manifest, &mut NoProgress)?;
        tracing::debug!(path = %manifest.display(), "Staged remote metadata");
    }

    progress.progress(1.0);
    Ok(staged)
}
