//! Versioned application resources
//!
//! A resource is one independently versioned unit of the installed application,
//! e.g. `libs.zip` tracked by the `Lib-Version` metadata attribute and unpacked
//! into `libs/`.

use serde::{Deserialize, Serialize};

/// One resource kept in sync with the server
///
/// Two descriptors are the same resource iff location, metadata key and file
/// names all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Remote location (URL for web hosting, absolute path for SFTP hosting)
    location: String,

    /// Metadata attribute holding this resource's version
    metadata_key: String,

    /// Paths, relative to the application directory, owned by this resource
    files: Vec<String>,
}

impl ResourceDescriptor {
    pub fn new(
        location: impl Into<String>,
        metadata_key: impl Into<String>,
        files: Vec<String>,
    ) -> Self {
        Self {
            location: location.into(),
            metadata_key: metadata_key.into(),
            files,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn metadata_key(&self) -> &str {
        &self.metadata_key
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// File name component of the remote location (`.../libs.zip` -> `libs.zip`)
    ///
    /// Used to name the staged download and in progress messages.
    pub fn display_name(&self) -> &str {
        let without_query = self
            .location
            .split(['?', '#'])
            .next()
            .unwrap_or(&self.location);
        without_query
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or(without_query)
    }
}

impl std::fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Ordered set of resources loaded from settings
///
/// Order only matters for deterministic logging and messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceRegistry {
    resources: Vec<ResourceDescriptor>,
}

impl ResourceRegistry {
    /// Build a registry, dropping exact duplicates while keeping first-seen order
    pub fn new(resources: Vec<ResourceDescriptor>) -> Self {
        let mut unique: Vec<ResourceDescriptor> = Vec::with_capacity(resources.len());
        for resource in resources {
            if !unique.contains(&resource) {
                unique.push(resource);
            }
        }
        Self { resources: unique }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResourceDescriptor> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn as_slice(&self) -> &[ResourceDescriptor] {
        &self.resources
    }

    /// Metadata keys of all resources, in registry order
    pub fn metadata_keys(&self) -> impl Iterator<Item = &str> {
        self.resources.iter().map(ResourceDescriptor::metadata_key)
    }
}

impl<'a> IntoIterator for &'a ResourceRegistry {
    type Item = &'a ResourceDescriptor;
    type IntoIter = std::slice::Iter<'a, ResourceDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.resources.iter()
    }
}
