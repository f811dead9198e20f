//! The language server loop: lifecycle, routing and task spawning.

use std::sync::Arc;

use anyhow::Result;
use jls_config::{ClientSettings, Settings};
use jls_toolchain::{DiagnosticParser, Invoker, LineNumberParser, ProcessInvoker};
use jls_types::{DocumentId, FindingSet};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::catalog::{Catalog, StaticCatalog};
use crate::client::{self, Client, WRITER_CHANNEL_CAPACITY};
use crate::codec::MessageReader;
use crate::commands::{self, COMMANDS, Command};
use crate::completion;
use crate::context::{Components, Context};
use crate::documents::OpenDocument;
use crate::formatting::{BraceFormatter, Formatter};
use crate::hover;
use crate::protocol::{
    self, DidChangeConfigurationParams, DidChangeTextDocumentParams, DidCloseTextDocumentParams,
    DidOpenTextDocumentParams, DidSaveTextDocumentParams, DocumentFormattingParams,
    ExecuteCommandParams, Incoming, InitializeParams, MessageType, ResponseError,
    TextDocumentPositionParams,
};
use crate::store::DiagnosticStore;
use crate::validation::{self, Trigger};

/// Why [`Server::serve`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// `exit` after `shutdown`.
    Exit,
    /// `exit` without a preceding `shutdown`.
    ExitWithoutShutdown,
    /// The input stream ended before `exit`.
    Disconnected,
}

impl ExitReason {
    /// Process exit code the LSP specification asks for.
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Exit => 0,
            Self::ExitWithoutShutdown | Self::Disconnected => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Running,
    ShuttingDown,
}

/// A J language server, ready to serve one client connection.
pub struct Server<I: Invoker = ProcessInvoker> {
    components: Components<I>,
}

impl Server {
    /// Server running the real toolchain as subprocesses.
    pub fn new(settings: Settings) -> Self {
        Self::with_invoker(ProcessInvoker, settings)
    }
}

impl<I: Invoker> Server<I> {
    pub fn with_invoker(invoker: I, settings: Settings) -> Self {
        Self {
            components: Components {
                invoker,
                parser: Arc::new(LineNumberParser),
                catalog: Arc::new(StaticCatalog),
                formatter: Arc::new(BraceFormatter),
                store: Arc::new(DiagnosticStore::new()),
                settings,
            },
        }
    }

    #[must_use]
    pub fn with_parser(mut self, parser: impl DiagnosticParser) -> Self {
        self.components.parser = Arc::new(parser);
        self
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: impl Catalog) -> Self {
        self.components.catalog = Arc::new(catalog);
        self
    }

    #[must_use]
    pub fn with_formatter(mut self, formatter: impl Formatter) -> Self {
        self.components.formatter = Arc::new(formatter);
        self
    }

    /// The store this server publishes from.
    #[must_use]
    pub fn diagnostics(&self) -> Arc<DiagnosticStore> {
        Arc::clone(&self.components.store)
    }

    /// Serve one client until `exit` or end of input.
    ///
    /// A framing error ends the session and is returned as an error. A
    /// well-framed body that is not JSON is answered with a parse error and
    /// skipped.
    pub async fn serve<R, W>(self, input: R, output: W) -> Result<ExitReason>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (writer_tx, writer_rx) = mpsc::channel(WRITER_CHANNEL_CAPACITY);
        let writer = tokio::spawn(client::write_loop(output, writer_rx));
        let ctx = Arc::new(Context::new(self.components, Client::new(writer_tx)));
        let mut session = Session {
            ctx: Arc::clone(&ctx),
            lifecycle: Lifecycle::Uninitialized,
        };

        let mut reader = MessageReader::new(input);
        let outcome = loop {
            match reader.read_frame().await {
                Ok(Some(body)) => match serde_json::from_slice::<Value>(&body) {
                    Ok(message) => {
                        if let Some(reason) = session.handle(message).await {
                            break Ok(reason);
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Discarding message that is not JSON: {e}");
                        ctx.client
                            .respond(Value::Null, Err(ResponseError::parse_error(e.to_string())))
                            .await;
                    }
                },
                Ok(None) => {
                    tracing::info!("Client closed the connection");
                    break Ok(ExitReason::Disconnected);
                }
                Err(e) => break Err(e.context("reading from client")),
            }
        };

        ctx.client.shutdown().await;
        if let Err(e) = writer.await {
            tracing::warn!("LSP writer task failed: {e}");
        }
        outcome
    }
}

struct Session<I> {
    ctx: Arc<Context<I>>,
    lifecycle: Lifecycle,
}

impl<I: Invoker> Session<I> {
    async fn handle(&mut self, message: Value) -> Option<ExitReason> {
        let Some(incoming) = Incoming::classify(message) else {
            tracing::warn!("Ignoring malformed JSON-RPC message");
            return None;
        };

        match incoming {
            Incoming::Request { id, method, params } => {
                self.handle_request(id, &method, params).await;
                None
            }
            Incoming::Notification { method, params } => {
                self.handle_notification(&method, params).await
            }
            Incoming::Response { id, result } => {
                self.ctx.client.complete(id, result);
                None
            }
        }
    }

    async fn handle_request(&mut self, id: Value, method: &str, params: Value) {
        let client = self.ctx.client.clone();
        match (self.lifecycle, method) {
            (Lifecycle::Uninitialized, "initialize") => {
                let outcome = self.initialize(params);
                client.respond(id, outcome).await;
            }
            (Lifecycle::Uninitialized, _) => {
                client.respond(id, Err(ResponseError::not_initialized())).await;
            }
            (Lifecycle::Running, "initialize") => {
                client
                    .respond(id, Err(ResponseError::invalid_request("Server already initialized")))
                    .await;
            }
            (Lifecycle::ShuttingDown, _) => {
                client
                    .respond(id, Err(ResponseError::invalid_request("Server is shutting down")))
                    .await;
            }
            (Lifecycle::Running, "shutdown") => {
                tracing::info!("Shutdown requested");
                self.lifecycle = Lifecycle::ShuttingDown;
                client.respond(id, Ok(Value::Null)).await;
            }
            (Lifecycle::Running, "workspace/executeCommand") => {
                match protocol::parse_params::<ExecuteCommandParams>(params)
                    .and_then(Command::parse)
                {
                    Ok(command) => self.spawn_command(id, command),
                    Err(error) => client.respond(id, Err(error)).await,
                }
            }
            (Lifecycle::Running, _) => {
                let outcome = self.query(method, params);
                client.respond(id, outcome).await;
            }
        }
    }

    fn initialize(&mut self, params: Value) -> Result<Value, ResponseError> {
        let params: InitializeParams = protocol::parse_params(params)?;
        let root = params.workspace_root();
        tracing::info!(root = ?root, "Initializing");
        self.ctx.set_workspace_root(root);

        if let Some(options) = &params.initialization_options {
            self.apply_settings(options);
        }

        self.lifecycle = Lifecycle::Running;
        Ok(protocol::initialize_result(COMMANDS))
    }

    /// Requests answered from in-memory state without touching the toolchain.
    fn query(&self, method: &str, params: Value) -> Result<Value, ResponseError> {
        match method {
            "textDocument/hover" => {
                let params: TextDocumentPositionParams = protocol::parse_params(params)?;
                let Some(open) = self.open_document(&params.text_document.uri) else {
                    return Ok(Value::Null);
                };
                let hover = hover::hover(self.ctx.catalog.as_ref(), &open.text, params.position);
                Ok(hover.map_or(Value::Null, |h| protocol::to_value(&h)))
            }
            "textDocument/completion" => {
                let params: TextDocumentPositionParams = protocol::parse_params(params)?;
                let items = self
                    .open_document(&params.text_document.uri)
                    .map(|open| {
                        completion::completions(
                            self.ctx.catalog.as_ref(),
                            &open.text,
                            params.position,
                        )
                    })
                    .unwrap_or_default();
                Ok(protocol::to_value(&items))
            }
            "textDocument/formatting" => {
                let params: DocumentFormattingParams = protocol::parse_params(params)?;
                let edits = self
                    .open_document(&params.text_document.uri)
                    .map(|open| {
                        self.ctx
                            .formatter
                            .format(&open.text, &params.options)
                            .into_edits()
                    })
                    .unwrap_or_default();
                Ok(protocol::to_value(&edits))
            }
            _ => {
                tracing::debug!(method, "Unsupported request");
                Err(ResponseError::method_not_found(method))
            }
        }
    }

    fn open_document(&self, uri: &str) -> Option<OpenDocument> {
        self.ctx.documents.get(&DocumentId::new(uri))
    }

    fn spawn_command(&self, id: Value, command: Command) {
        let ctx = Arc::clone(&self.ctx);
        tokio::spawn(async move {
            let id_str = command.id();
            let result = match commands::execute(&ctx, command).await {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(command = id_str, "Command failed: {e}");
                    ctx.client.show_message(MessageType::Error, &e.to_string()).await;
                    Value::Null
                }
            };
            ctx.client.respond(id, Ok(result)).await;
        });
    }

    fn spawn_validation(&self, doc: DocumentId, trigger: Trigger) {
        let ctx = Arc::clone(&self.ctx);
        tokio::spawn(async move {
            validation::validate(&ctx, &doc, trigger).await;
        });
    }

    fn apply_settings(&self, value: &Value) {
        match ClientSettings::from_json(value) {
            Ok(Some(client)) => self.ctx.apply_client_settings(&client),
            Ok(None) => tracing::debug!("Configuration change carried no settings; keeping current"),
            Err(e) => tracing::warn!("Ignoring invalid client settings: {e}"),
        }
    }

    async fn handle_notification(&mut self, method: &str, params: Value) -> Option<ExitReason> {
        if method == "exit" {
            return Some(if self.lifecycle == Lifecycle::ShuttingDown {
                ExitReason::Exit
            } else {
                tracing::warn!("Exit without shutdown");
                ExitReason::ExitWithoutShutdown
            });
        }
        if self.lifecycle == Lifecycle::Uninitialized {
            tracing::debug!(method, "Dropping notification before initialize");
            return None;
        }

        let outcome = match method {
            "initialized" => {
                tracing::info!("Client initialized");
                Ok(())
            }
            "textDocument/didOpen" => protocol::parse_params(params).map(|p| self.did_open(p)),
            "textDocument/didChange" => protocol::parse_params(params).map(|p| self.did_change(p)),
            "textDocument/didSave" => protocol::parse_params(params).map(|p| self.did_save(p)),
            "textDocument/didClose" => match protocol::parse_params(params) {
                Ok(p) => {
                    self.did_close(p).await;
                    Ok(())
                }
                Err(e) => Err(e),
            },
            "workspace/didChangeConfiguration" => protocol::parse_params(params)
                .map(|p: DidChangeConfigurationParams| self.apply_settings(&p.settings)),
            _ => {
                tracing::trace!(method, "Ignoring notification");
                Ok(())
            }
        };

        if let Err(e) = outcome {
            tracing::warn!(method, "Bad notification: {e}");
        }
        None
    }

    fn did_open(&self, params: DidOpenTextDocumentParams) {
        let item = params.text_document;
        let doc = DocumentId::new(item.uri);
        let open = OpenDocument {
            language_id: item.language_id,
            version: item.version,
            text: item.text,
        };
        let is_j = open.is_j();
        tracing::debug!(uri = %doc, language = %open.language_id, "Opened");
        self.ctx.documents.open(doc.clone(), open);
        if is_j {
            self.spawn_validation(doc, Trigger::Opened);
        }
    }

    fn did_change(&self, params: DidChangeTextDocumentParams) {
        let doc = DocumentId::new(params.text_document.uri);
        // Full sync: the last change holds the whole text.
        let Some(change) = params.content_changes.into_iter().last() else {
            return;
        };
        if change.range.is_some() {
            tracing::debug!(uri = %doc, "Ignoring range of incremental change");
        }
        if !self
            .ctx
            .documents
            .change(&doc, params.text_document.version, change.text)
        {
            tracing::debug!(uri = %doc, "Change for a document that is not open");
        }
    }

    fn did_save(&self, params: DidSaveTextDocumentParams) {
        let doc = DocumentId::new(params.text_document.uri);
        let is_j = self
            .ctx
            .documents
            .get(&doc)
            .is_some_and(|open| open.is_j());
        if is_j {
            self.spawn_validation(doc, Trigger::Saved);
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let doc = DocumentId::new(params.text_document.uri);
        self.ctx.documents.close(&doc);
        self.ctx.store.close(&doc);
        self.ctx
            .client
            .publish_diagnostics(doc.as_str(), &FindingSet::empty())
            .await;
        tracing::debug!(uri = %doc, "Closed");
    }
}
