//! Argument construction for each toolchain subcommand.

use std::path::Path;

use jls_types::{InvocationRequest, ProjectName, ToolAction};

/// Entry point compiled by `build`, relative to the workspace root.
pub const BUILD_ENTRY_POINT: &str = "main.j";

/// The configured toolchain executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    program: String,
}

impl Toolchain {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// `<exe> check <file>`
    #[must_use]
    pub fn check(&self, file: &Path) -> InvocationRequest {
        self.request(ToolAction::Check, vec!["check".into(), path_arg(file)])
    }

    /// `<exe> run <file>`
    #[must_use]
    pub fn run(&self, file: &Path) -> InvocationRequest {
        self.request(ToolAction::Run, vec!["run".into(), path_arg(file)])
    }

    /// `<exe> repl`, handed to the editor to launch in a terminal.
    #[must_use]
    pub fn repl(&self) -> InvocationRequest {
        self.request(ToolAction::Repl, vec!["repl".into()])
    }

    /// `<exe> build main.j` in the workspace root.
    #[must_use]
    pub fn build(&self, workspace_root: &Path) -> InvocationRequest {
        self.request(
            ToolAction::Build,
            vec!["build".into(), BUILD_ENTRY_POINT.into()],
        )
        .in_dir(workspace_root)
    }

    /// `<exe> jolt init <name>` in the destination folder.
    #[must_use]
    pub fn init(&self, name: &ProjectName, destination: &Path) -> InvocationRequest {
        self.request(
            ToolAction::Init,
            vec!["jolt".into(), "init".into(), name.as_str().to_string()],
        )
        .in_dir(destination)
    }

    fn request(&self, action: ToolAction, args: Vec<String>) -> InvocationRequest {
        InvocationRequest::new(action, self.program.clone(), args)
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
