//! Identifier ↔ physical location mapping

pub mod extension;

pub use extension::{ExtensionBasedMapper, ResourceLink};
