//! `workspace/executeCommand` dispatch.
//!
//! Arguments supplied by the client stand in for the editor's active document
//! and input dialogs: document commands take the document URI, `newProject`
//! takes the project name and destination folder.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use jls_toolchain::Invoker;
use jls_types::{DocumentId, InvocationOutput, ProjectName, ProjectNameError};
use serde_json::{Value, json};
use thiserror::Error;

use crate::context::Context;
use crate::documents::OpenDocument;
use crate::formatting::FormatOutcome;
use crate::protocol::{
    self, ExecuteCommandParams, FormattingOptions, MessageType, ResponseError, WorkspaceEdit,
};
use crate::validation::{self, Trigger};

pub const RUN_FILE: &str = "j-lang.runFile";
pub const RUN_REPL: &str = "j-lang.runREPL";
pub const CHECK_SYNTAX: &str = "j-lang.checkSyntax";
pub const BUILD_PROJECT: &str = "j-lang.buildProject";
pub const NEW_PROJECT: &str = "j-lang.newProject";
pub const FORMAT_DOCUMENT: &str = "j-lang.formatDocument";

/// Every command advertised in `executeCommandProvider`.
pub const COMMANDS: &[&str] = &[
    RUN_FILE,
    RUN_REPL,
    CHECK_SYNTAX,
    BUILD_PROJECT,
    NEW_PROJECT,
    FORMAT_DOCUMENT,
];

const REPL_TITLE: &str = "J REPL";
const RULE_WIDTH: usize = 50;

/// User-facing failure of a command, shown with `window/showMessage`.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("No J file is currently open")]
    NoDocument,
    #[error("No workspace folder open")]
    NoWorkspace,
    #[error("Invalid project name: {0}")]
    InvalidProjectName(#[from] ProjectNameError),
    #[error("Failed to run J file: {0}")]
    Run(String),
    #[error("Build failed: {0}")]
    Build(String),
    #[error("Failed to create project: {0}")]
    NewProject(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NewProjectArgs {
    name: String,
    folder: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    RunFile(Option<DocumentId>),
    RunRepl,
    CheckSyntax(Option<DocumentId>),
    BuildProject,
    /// `None` when the user cancelled one of the prompts.
    NewProject(Option<NewProjectArgs>),
    FormatDocument(Option<DocumentId>),
}

impl Command {
    pub(crate) fn parse(params: ExecuteCommandParams) -> Result<Self, ResponseError> {
        let args = params.arguments;
        let command = match params.command.as_str() {
            RUN_FILE => Self::RunFile(document_arg(&args)),
            RUN_REPL => Self::RunRepl,
            CHECK_SYNTAX => Self::CheckSyntax(document_arg(&args)),
            BUILD_PROJECT => Self::BuildProject,
            NEW_PROJECT => Self::NewProject(new_project_args(&args)),
            FORMAT_DOCUMENT => Self::FormatDocument(document_arg(&args)),
            other => {
                return Err(ResponseError::invalid_params(format!(
                    "Unknown command: {other}"
                )));
            }
        };
        Ok(command)
    }

    pub(crate) fn id(&self) -> &'static str {
        match self {
            Self::RunFile(_) => RUN_FILE,
            Self::RunRepl => RUN_REPL,
            Self::CheckSyntax(_) => CHECK_SYNTAX,
            Self::BuildProject => BUILD_PROJECT,
            Self::NewProject(_) => NEW_PROJECT,
            Self::FormatDocument(_) => FORMAT_DOCUMENT,
        }
    }
}

/// First argument as a document: a URI string or an object with a `uri`.
fn document_arg(args: &[Value]) -> Option<DocumentId> {
    let uri = match args.first()? {
        Value::String(uri) => uri.as_str(),
        Value::Object(object) => object.get("uri")?.as_str()?,
        _ => return None,
    };
    Some(DocumentId::new(uri))
}

fn new_project_args(args: &[Value]) -> Option<NewProjectArgs> {
    let name = args.first()?.as_str().filter(|n| !n.is_empty())?;
    let folder = match args.get(1)? {
        Value::String(folder) => folder.as_str(),
        Value::Object(object) => object.get("uri")?.as_str()?,
        _ => return None,
    };
    if folder.is_empty() {
        return None;
    }
    let folder = if folder.starts_with("file:") {
        protocol::file_uri_to_path(folder)?
    } else {
        PathBuf::from(folder)
    };
    Some(NewProjectArgs {
        name: name.to_string(),
        folder,
    })
}

pub(crate) async fn execute<I: Invoker>(
    ctx: &Context<I>,
    command: Command,
) -> Result<Value, CommandError> {
    tracing::debug!(command = command.id(), "Executing command");
    match command {
        Command::RunFile(doc) => run_file(ctx, doc.as_ref()).await,
        Command::RunRepl => Ok(repl(ctx)),
        Command::CheckSyntax(doc) => {
            let doc = doc.ok_or(CommandError::NoDocument)?;
            ctx.documents
                .eligible_path(&doc)
                .ok_or(CommandError::NoDocument)?;
            validation::validate(ctx, &doc, Trigger::Explicit).await;
            Ok(Value::Null)
        }
        Command::BuildProject => build_project(ctx).await,
        Command::NewProject(None) => {
            tracing::debug!("New project cancelled");
            Ok(Value::Null)
        }
        Command::NewProject(Some(args)) => new_project(ctx, args).await,
        Command::FormatDocument(doc) => format_document(ctx, doc.as_ref()).await,
    }
}

fn rule() -> String {
    "─".repeat(RULE_WIDTH)
}

fn eligible_path<I: Invoker>(
    ctx: &Context<I>,
    doc: Option<&DocumentId>,
) -> Result<PathBuf, CommandError> {
    doc.and_then(|doc| ctx.documents.eligible_path(doc))
        .ok_or(CommandError::NoDocument)
}

async fn run_file<I: Invoker>(
    ctx: &Context<I>,
    doc: Option<&DocumentId>,
) -> Result<Value, CommandError> {
    let path = eligible_path(ctx, doc)?;
    let client = &ctx.client;

    client.clear_output(ctx.settings().show_output_on_run).await;
    client
        .output_line(&format!("Running: {}", path.display()))
        .await;
    client.output_line(&rule()).await;

    let request = ctx.toolchain().run(&path);
    let message = match ctx.invoker.invoke(&request, None).await {
        Ok(output) if output.succeeded() => {
            if !output.stdout.is_empty() {
                client.output_line(output.stdout.trim_end()).await;
            }
            if !output.stderr.is_empty() {
                client.output_line("Errors:").await;
                client.output_line(output.stderr.trim_end()).await;
            }
            client.output_line(&rule()).await;
            client.output_line("✓ Execution completed").await;
            return Ok(Value::Null);
        }
        Ok(output) => output.failure_message(),
        Err(e) => e.to_string(),
    };

    tracing::warn!(path = %path.display(), "Run failed: {message}");
    client.output_line("❌ Execution failed:").await;
    client.output_line(&message).await;
    Err(CommandError::Run(message))
}

fn repl<I: Invoker>(ctx: &Context<I>) -> Value {
    let request = ctx.toolchain().repl();
    json!({
        "command": request.program(),
        "args": request.args(),
        "title": REPL_TITLE,
    })
}

async fn build_project<I: Invoker>(ctx: &Context<I>) -> Result<Value, CommandError> {
    let root = ctx.workspace_root().ok_or(CommandError::NoWorkspace)?;
    let client = &ctx.client;

    client.clear_output(true).await;
    client.output_line("Building project...").await;

    let request = ctx.toolchain().build(&root);
    let message = match ctx.invoker.invoke(&request, None).await {
        Ok(output) if output.succeeded() => {
            write_streams(ctx, &output).await;
            client
                .show_message(MessageType::Info, "Build completed successfully")
                .await;
            return Ok(Value::Null);
        }
        Ok(output) => output.failure_message(),
        Err(e) => e.to_string(),
    };

    tracing::warn!(root = %root.display(), "Build failed: {message}");
    client.output_line(&format!("Build failed: {message}")).await;
    Err(CommandError::Build(message))
}

async fn write_streams<I: Invoker>(ctx: &Context<I>, output: &InvocationOutput) {
    for stream in [&output.stdout, &output.stderr] {
        if !stream.is_empty() {
            ctx.client.output_line(stream.trim_end()).await;
        }
    }
}

async fn new_project<I: Invoker>(
    ctx: &Context<I>,
    args: NewProjectArgs,
) -> Result<Value, CommandError> {
    let name = ProjectName::new(args.name)?;
    let request = ctx.toolchain().init(&name, &args.folder);

    let outcome = match ctx.invoker.invoke(&request, None).await {
        Ok(output) if output.succeeded() => Ok(()),
        Ok(output) => Err(output.failure_message()),
        Err(e) => Err(e.to_string()),
    };
    if let Err(message) = outcome {
        tracing::warn!(project = name.as_str(), "Project creation failed: {message}");
        return Err(CommandError::NewProject(message));
    }

    tracing::info!(project = name.as_str(), folder = %args.folder.display(), "Project created");
    ctx.client
        .show_message(
            MessageType::Info,
            &format!("Project '{}' created successfully", name.as_str()),
        )
        .await;

    let choice = ctx
        .client
        .show_message_request(MessageType::Info, "Open new project?", &["Yes", "No"])
        .await;
    if choice.as_deref() == Some("Yes") {
        open_folder(ctx, &args.folder.join(name.as_str())).await;
    }
    Ok(Value::Null)
}

async fn open_folder<I: Invoker>(ctx: &Context<I>, folder: &Path) {
    match protocol::path_to_file_uri(folder) {
        Ok(uri) => ctx.client.show_document_external(uri.as_str()).await,
        Err(e) => tracing::warn!("Cannot open new project: {e}"),
    }
}

async fn format_document<I: Invoker>(
    ctx: &Context<I>,
    doc: Option<&DocumentId>,
) -> Result<Value, CommandError> {
    let doc = doc.ok_or(CommandError::NoDocument)?;
    let open = ctx
        .documents
        .get(doc)
        .filter(OpenDocument::is_j)
        .ok_or(CommandError::NoDocument)?;

    match ctx.formatter.format(&open.text, &FormattingOptions::default()) {
        FormatOutcome::Unchanged => {
            tracing::debug!(uri = %doc, "Document already formatted");
        }
        FormatOutcome::Edits(edits) => {
            let edit = WorkspaceEdit {
                changes: HashMap::from([(doc.as_str().to_string(), edits)]),
            };
            ctx.client.apply_edit("Format J document", edit).await;
        }
    }
    Ok(Value::Null)
}
