//! The `j` toolchain as seen from the language server.
//!
//! - [`Toolchain`] builds the argument vectors for each subcommand.
//! - [`Invoker`] runs them; [`ProcessInvoker`] is the real subprocess backend.
//! - [`DiagnosticParser`] turns `check` output into findings.

mod args;
mod invoker;
mod parser;
mod process;

pub use args::{BUILD_ENTRY_POINT, Toolchain};
pub use invoker::{InvokeError, Invoker, ProcessInvoker};
pub use parser::{CLEAN_CHECK_SENTINEL, DiagnosticParser, LineNumberParser};
