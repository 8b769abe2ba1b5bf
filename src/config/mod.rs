//! Launcher configuration
//!
//! This module contains data structures for:
//! - `appcontainer.yaml` - launcher settings (hosting mode, metadata location, policy attributes)
//! - the resource registry - the versioned resources kept in sync with the server

pub mod resource;
pub mod settings;

// Re-export commonly used types
pub use resource::{ResourceDescriptor, ResourceRegistry};
pub use settings::{HostingMode, LaunchSettings, Settings, SftpSettings};
