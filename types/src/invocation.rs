use std::path::PathBuf;

/// Toolchain subcommands the server knows how to invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolAction {
    /// `run <file>`
    Run,
    /// `repl`: interactive, never captured.
    Repl,
    /// `check <file>`
    Check,
    /// `build main.j` in the workspace root.
    Build,
    /// `jolt init <name>` in the destination folder.
    Init,
}

/// A fully-constructed toolchain invocation. Built per call, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRequest {
    action: ToolAction,
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl InvocationRequest {
    #[must_use]
    pub fn new(action: ToolAction, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            action,
            program: program.into(),
            args,
            working_dir: None,
        }
    }

    #[must_use]
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn action(&self) -> ToolAction {
        self.action
    }

    /// Executable as configured (bare name or path).
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub fn working_dir(&self) -> Option<&PathBuf> {
        self.working_dir.as_ref()
    }

    /// Render as a shell-like command line for logs (paths with spaces quoted).
    #[must_use]
    pub fn command_line(&self) -> String {
        let mut line = quote_arg(&self.program);
        for arg in &self.args {
            line.push(' ');
            line.push_str(&quote_arg(arg));
        }
        line
    }
}

fn quote_arg(arg: &str) -> String {
    if arg.is_empty() || arg.chars().any(char::is_whitespace) {
        format!("\"{arg}\"")
    } else {
        arg.to_string()
    }
}

/// How a toolchain process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Succeeded,
    /// Non-zero exit; `code` is `None` when the process was killed by a signal.
    Failed { code: Option<i32> },
}

/// Captured output of a toolchain process that ran to completion.
///
/// A non-zero exit is still an `InvocationOutput`; callers interpret it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl InvocationOutput {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == ExitStatus::Succeeded
    }

    /// A one-line reason for a failed run: the first non-empty stderr line,
    /// else the exit status.
    #[must_use]
    pub fn failure_message(&self) -> String {
        if let Some(line) = self.stderr.lines().map(str::trim).find(|l| !l.is_empty()) {
            return line.to_string();
        }
        match self.status {
            ExitStatus::Failed { code: Some(code) } => format!("exited with status {code}"),
            ExitStatus::Failed { code: None } => "terminated by signal".to_string(),
            ExitStatus::Succeeded => "exited successfully".to_string(),
        }
    }
}
