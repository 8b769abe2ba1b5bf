//! Version reconciliation
//!
//! Compares the installed metadata against the server's and derives the
//! resources that must be synced plus the update policy flags.
//!
//! Versions are opaque strings: a resource is stale when its local value is
//! absent or differs from the remote value.

use serde::Serialize;

use crate::config::{ResourceDescriptor, ResourceRegistry, Settings};
use crate::context::{RuntimeContext, find_by_extension};
use crate::error::Result;
use crate::manifest::{MetadataSnapshot, MetadataSource, read_metadata};

/// Remote metadata attributes that steer an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePolicy {
    /// Remote metadata location, used in error reports
    pub manifest_location: String,
    /// Attribute asking the user to be notified before updating
    pub notify_attribute: String,
    /// Attribute allowing the user to skip the update
    pub skip_attribute: String,
}

impl UpdatePolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            manifest_location: settings.manifest_location.clone(),
            notify_attribute: settings.notify_attribute.clone(),
            skip_attribute: settings.skip_attribute.clone(),
        }
    }
}

/// What is currently installed in the application directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalInstall {
    /// Installed resource versions; empty on first install
    pub snapshot: MetadataSnapshot,
    /// Whether a launch artifact is present
    pub has_artifact: bool,
}

impl LocalInstall {
    /// Inspect the application directory
    ///
    /// Only the registry's version keys are kept from the installed metadata.
    pub fn detect(ctx: &RuntimeContext, settings: &Settings) -> Self {
        let registry = settings.registry();
        let snapshot = ctx
            .find_installed_manifest()
            .map(|path| read_metadata(&MetadataSource::File(path)))
            .unwrap_or_default()
            .restricted_to(registry.metadata_keys());
        let has_artifact =
            !find_by_extension(&ctx.app_dir, &settings.launch.artifact_extension).is_empty();

        tracing::debug!(
            attributes = snapshot.len(),
            has_artifact,
            "Local installation inspected"
        );
        Self {
            snapshot,
            has_artifact,
        }
    }

    /// Something can be launched without updating
    pub fn is_usable(&self) -> bool {
        self.has_artifact
    }

    /// Installed resource versions and a launch artifact are both present
    pub fn is_valid(&self) -> bool {
        self.has_artifact && !self.snapshot.is_empty()
    }
}

/// Result of one reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdatePlan {
    stale_resources: Vec<ResourceDescriptor>,
    must_notify: bool,
    may_resume_without_update: bool,
}

impl UpdatePlan {
    /// Plan that launches the installed copy as-is
    pub fn up_to_date() -> Self {
        Self {
            stale_resources: Vec::new(),
            must_notify: false,
            may_resume_without_update: true,
        }
    }

    pub fn stale_resources(&self) -> &[ResourceDescriptor] {
        &self.stale_resources
    }

    pub fn is_up_to_date(&self) -> bool {
        self.stale_resources.is_empty()
    }

    pub fn must_notify(&self) -> bool {
        self.must_notify
    }

    pub fn may_resume_without_update(&self) -> bool {
        self.may_resume_without_update
    }
}

/// Resources whose local version is absent or differs from the remote one
pub fn stale_resources(
    local: &MetadataSnapshot,
    remote: &MetadataSnapshot,
    registry: &ResourceRegistry,
) -> Vec<ResourceDescriptor> {
    registry
        .iter()
        .filter(|resource| {
            let key = resource.metadata_key();
            match local.get(key) {
                None => true,
                Some(installed) => remote.get(key) != Some(installed),
            }
        })
        .cloned()
        .collect()
}

/// Derive the update plan
///
/// `remote` is `None` when the remote metadata could not be fetched. That is
/// only survivable with a valid local installation, which is then launched
/// without updating. A remote snapshot carrying none of the registry's version
/// keys is treated the same way when a valid installation exists; otherwise
/// every resource is stale.
pub fn reconcile(
    local: &LocalInstall,
    remote: Option<&MetadataSnapshot>,
    registry: &ResourceRegistry,
    policy: &UpdatePolicy,
) -> Result<UpdatePlan> {
    let Some(remote) = remote else {
        if local.is_valid() {
            tracing::warn!("Remote metadata unavailable, keeping the installed version");
            return Ok(UpdatePlan::up_to_date());
        }
        return Err(crate::error::remote_metadata_unavailable(
            &policy.manifest_location,
        ));
    };

    let remote_versions = remote.restricted_to(registry.metadata_keys());
    if remote_versions.is_empty() && local.is_valid() {
        tracing::warn!("Remote metadata lists no resource versions, keeping the installed version");
        return Ok(UpdatePlan::up_to_date());
    }

    let stale = stale_resources(&local.snapshot, remote, registry);
    let notify = parse_flag(remote.get(&policy.notify_attribute));
    let skip = parse_flag(remote.get(&policy.skip_attribute));

    let must_notify = match notify {
        Flag::Absent => false,
        Flag::Set(value) => value,
        Flag::Malformed(raw) => {
            tracing::warn!(
                attribute = %policy.notify_attribute,
                value = %raw,
                "Unrecognized flag value, notifying before update"
            );
            true
        }
    };
    let skip_allowed = match skip {
        Flag::Absent => false,
        Flag::Set(value) => value,
        Flag::Malformed(raw) => {
            tracing::warn!(
                attribute = %policy.skip_attribute,
                value = %raw,
                "Unrecognized flag value, update is required"
            );
            false
        }
    };

    let plan = UpdatePlan {
        stale_resources: stale,
        must_notify,
        may_resume_without_update: local.is_valid() && skip_allowed,
    };

    tracing::info!(
        stale = plan.stale_resources.len(),
        must_notify = plan.must_notify,
        may_skip = plan.may_resume_without_update,
        "Reconciled resource versions"
    );
    Ok(plan)
}

#[derive(Debug, PartialEq, Eq)]
enum Flag {
    Absent,
    Set(bool),
    Malformed(String),
}

fn parse_flag(value: Option<&str>) -> Flag {
    match value.map(str::trim) {
        None => Flag::Absent,
        Some(v) if v.eq_ignore_ascii_case("true") => Flag::Set(true),
        Some(v) if v.eq_ignore_ascii_case("false") => Flag::Set(false),
        Some(v) => Flag::Malformed(v.to_string()),
    }
}
