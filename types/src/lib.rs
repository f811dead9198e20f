//! Core domain types for the J language server.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the server.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod document;
mod finding;
mod invocation;
mod project;

pub use document::DocumentId;
pub use finding::{FULL_LINE_END, Finding, FindingSet, Severity};
pub use invocation::{ExitStatus, InvocationOutput, InvocationRequest, ToolAction};
pub use project::{ProjectName, ProjectNameError};

/// Language identifier editors use for J buffers.
pub const LANGUAGE_ID: &str = "j";
