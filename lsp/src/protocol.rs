//! JSON-RPC envelopes and the subset of LSP types the server speaks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use jls_types::Finding;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use url::Url;

const JSONRPC_VERSION: &str = "2.0";

// ── JSON-RPC envelopes ───────────────────────────────────────────────

/// Error object of a failed JSON-RPC request.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message} (code {code})")]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
}

impl ResponseError {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    pub const SERVER_NOT_INITIALIZED: i64 = -32002;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(Self::PARSE_ERROR, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_REQUEST, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(Self::METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_PARAMS, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Self::INTERNAL_ERROR, message)
    }

    pub fn not_initialized() -> Self {
        Self::new(Self::SERVER_NOT_INITIALIZED, "Server not initialized")
    }
}

/// A decoded message from the client.
#[derive(Debug)]
pub(crate) enum Incoming {
    Request {
        id: Value,
        method: String,
        params: Value,
    },
    Notification {
        method: String,
        params: Value,
    },
    /// Reply to a request the server sent. Only numeric ids are ours.
    Response {
        id: u64,
        result: Result<Value, ResponseError>,
    },
}

impl Incoming {
    /// Classify a raw message. `None` for anything that is not JSON-RPC shaped.
    pub(crate) fn classify(mut message: Value) -> Option<Self> {
        let object = message.as_object_mut()?;
        let id = object.remove("id");
        let method = object
            .remove("method")
            .and_then(|m| m.as_str().map(String::from));
        let params = object.remove("params").unwrap_or(Value::Null);

        match (id, method) {
            (Some(id), Some(method)) => Some(Self::Request { id, method, params }),
            (None, Some(method)) => Some(Self::Notification { method, params }),
            (Some(id), None) => {
                let id = id.as_u64()?;
                let result = match object.remove("error") {
                    Some(error) => Err(serde_json::from_value(error).unwrap_or_else(|_| {
                        ResponseError::internal("malformed error object")
                    })),
                    None => Ok(object.remove("result").unwrap_or(Value::Null)),
                };
                Some(Self::Response { id, result })
            }
            (None, None) => None,
        }
    }
}

#[derive(Serialize)]
struct OutgoingResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ResponseError>,
}

#[derive(Serialize)]
struct OutgoingRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Serialize)]
struct OutgoingNotification<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
}

pub(crate) fn response(id: Value, outcome: Result<Value, ResponseError>) -> Value {
    let (result, error) = match outcome {
        Ok(result) => (Some(result), None),
        Err(error) => (None, Some(error)),
    };
    to_value(&OutgoingResponse {
        jsonrpc: JSONRPC_VERSION,
        id,
        result,
        error,
    })
}

pub(crate) fn request(id: u64, method: &str, params: Value) -> Value {
    to_value(&OutgoingRequest {
        jsonrpc: JSONRPC_VERSION,
        id,
        method,
        params,
    })
}

pub(crate) fn notification(method: &str, params: Value) -> Value {
    to_value(&OutgoingNotification {
        jsonrpc: JSONRPC_VERSION,
        method,
        params,
    })
}

/// Serialize protocol structs; these contain only strings, numbers and maps.
pub(crate) fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Decode request or notification params, mapping failures to `InvalidParams`.
pub(crate) fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, ResponseError> {
    serde_json::from_value(params)
        .map_err(|e| ResponseError::invalid_params(format!("invalid params: {e}")))
}

// ── LSP: lifecycle ───────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InitializeParams {
    #[serde(default)]
    pub root_uri: Option<String>,
    #[serde(default)]
    pub root_path: Option<String>,
    #[serde(default)]
    pub workspace_folders: Option<Vec<WorkspaceFolder>>,
    #[serde(default)]
    pub initialization_options: Option<Value>,
}

impl InitializeParams {
    /// First usable workspace folder: `workspaceFolders[0]`, then `rootUri`,
    /// then the deprecated `rootPath`.
    pub(crate) fn workspace_root(&self) -> Option<PathBuf> {
        self.workspace_folders
            .iter()
            .flatten()
            .find_map(|folder| file_uri_to_path(&folder.uri))
            .or_else(|| self.root_uri.as_deref().and_then(file_uri_to_path))
            .or_else(|| self.root_path.as_ref().map(PathBuf::from))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkspaceFolder {
    pub uri: String,
}

/// The `initialize` result advertising what this server supports.
pub(crate) fn initialize_result(commands: &[&str]) -> Value {
    json!({
        "capabilities": {
            "textDocumentSync": {
                "openClose": true,
                "change": 1,
                "save": { "includeText": false }
            },
            "hoverProvider": true,
            "completionProvider": {
                "triggerCharacters": [".", "|", ">"]
            },
            "documentFormattingProvider": true,
            "executeCommandProvider": {
                "commands": commands
            }
        },
        "serverInfo": {
            "name": "jls",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

// ── LSP: documents ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub const fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TextDocumentIdentifier {
    pub uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TextDocumentItem {
    pub uri: String,
    pub language_id: String,
    pub version: i32,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VersionedTextDocumentIdentifier {
    pub uri: String,
    pub version: i32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TextDocumentContentChangeEvent {
    /// Present only for incremental changes, which this server does not request.
    #[serde(default)]
    pub range: Option<Range>,
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DidOpenTextDocumentParams {
    pub text_document: TextDocumentItem,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DidChangeTextDocumentParams {
    pub text_document: VersionedTextDocumentIdentifier,
    pub content_changes: Vec<TextDocumentContentChangeEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DidSaveTextDocumentParams {
    pub text_document: TextDocumentIdentifier,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DidCloseTextDocumentParams {
    pub text_document: TextDocumentIdentifier,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DidChangeConfigurationParams {
    #[serde(default)]
    pub settings: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TextDocumentPositionParams {
    pub text_document: TextDocumentIdentifier,
    pub position: Position,
}

/// Indentation preferences sent with a formatting request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattingOptions {
    pub tab_size: u32,
    pub insert_spaces: bool,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            tab_size: 4,
            insert_spaces: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DocumentFormattingParams {
    pub text_document: TextDocumentIdentifier,
    #[serde(default)]
    pub options: FormattingOptions,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExecuteCommandParams {
    pub command: String,
    #[serde(default)]
    pub arguments: Vec<Value>,
}

// ── LSP: results and server → client payloads ────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Diagnostic {
    pub range: Range,
    pub severity: u8,
    pub source: &'static str,
    pub message: String,
}

/// Diagnostics produced from the toolchain carry this source.
pub(crate) const DIAGNOSTIC_SOURCE: &str = "j";

impl From<&Finding> for Diagnostic {
    fn from(finding: &Finding) -> Self {
        Self {
            range: Range::new(
                Position::new(finding.line(), finding.start_col()),
                Position::new(finding.line(), finding.end_col()),
            ),
            severity: finding.severity().to_lsp(),
            source: DIAGNOSTIC_SOURCE,
            message: finding.message().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PublishDiagnosticsParams {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkupContent {
    pub kind: &'static str,
    pub value: String,
}

impl MarkupContent {
    pub fn markdown(value: impl Into<String>) -> Self {
        Self {
            kind: "markdown",
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hover {
    pub contents: MarkupContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
}

/// `CompletionItemKind` values used by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum CompletionItemKind {
    Function,
    Keyword,
    TypeParameter,
}

impl From<CompletionItemKind> for u8 {
    fn from(kind: CompletionItemKind) -> Self {
        match kind {
            CompletionItemKind::Function => 3,
            CompletionItemKind::Keyword => 14,
            CompletionItemKind::TypeParameter => 25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionItem {
    pub label: String,
    pub kind: CompletionItemKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEdit {
    pub range: Range,
    pub new_text: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct WorkspaceEdit {
    pub changes: HashMap<String, Vec<TextEdit>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApplyWorkspaceEditParams {
    pub label: &'static str,
    pub edit: WorkspaceEdit,
}

/// `window/showMessage` and `window/logMessage` severities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum MessageType {
    Error,
    Warning,
    Info,
    Log,
}

impl From<MessageType> for u8 {
    fn from(kind: MessageType) -> Self {
        match kind {
            MessageType::Error => 1,
            MessageType::Warning => 2,
            MessageType::Info => 3,
            MessageType::Log => 4,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct MessageParams<'a> {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub message: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct MessageActionItem<'a> {
    pub title: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ShowMessageRequestParams<'a> {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub message: &'a str,
    pub actions: Vec<MessageActionItem<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ShowDocumentParams {
    pub uri: String,
    pub external: bool,
}

/// Params of the `j-lang/output` notification that drives the client's
/// output panel.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct OutputParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clear: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reveal: Option<bool>,
}

// ── URIs ─────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
#[error("cannot convert path to file URI: {}", path.display())]
pub(crate) struct PathToUriError {
    path: PathBuf,
}

pub(crate) fn path_to_file_uri(path: &Path) -> Result<Url, PathToUriError> {
    Url::from_file_path(path).map_err(|()| PathToUriError {
        path: path.to_path_buf(),
    })
}

/// Filesystem path of a `file:` URI; `None` for other schemes or garbage.
pub(crate) fn file_uri_to_path(uri: &str) -> Option<PathBuf> {
    Url::parse(uri).ok().and_then(|u| u.to_file_path().ok())
}
