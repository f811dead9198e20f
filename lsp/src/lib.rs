//! Language Server Protocol front end for the J toolchain.
//!
//! [`Server`] speaks LSP over any async byte stream. Document lifecycle
//! notifications trigger `check` runs whose findings land in the
//! [`DiagnosticStore`] and are published back to the editor; commands run the
//! toolchain on the user's behalf.

pub mod codec;

mod catalog;
mod client;
mod commands;
mod completion;
mod context;
mod documents;
mod formatting;
mod hover;
mod protocol;
mod server;
mod store;
mod text;
mod validation;

#[cfg(test)]
mod testing;

pub use catalog::{Catalog, StaticCatalog};
pub use client::OUTPUT_NOTIFICATION;
pub use commands::{
    BUILD_PROJECT, CHECK_SYNTAX, COMMANDS, CommandError, FORMAT_DOCUMENT, NEW_PROJECT, RUN_FILE,
    RUN_REPL,
};
pub use formatting::{BraceFormatter, FormatOutcome, Formatter};
pub use protocol::{FormattingOptions, Position, Range, ResponseError, TextEdit};
pub use server::{ExitReason, Server};
pub use store::{DiagnosticStore, DiagnosticsSnapshot, Replaced, Ticket};
pub use validation::Trigger;
