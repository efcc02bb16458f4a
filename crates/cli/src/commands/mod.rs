//! Command handlers for the Sift CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod knowledge;
pub mod session;

// Re-export command types for convenience
pub use knowledge::KnowledgeCommand;
pub use session::SessionCommand;
