//! Handle for everything the server sends to the editor.
//!
//! A single writer task owns the output stream; every clone of [`Client`]
//! feeds it through a channel. Requests to the editor are correlated with its
//! responses through the pending map.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use jls_types::FindingSet;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, oneshot};
use tokio::time;

use crate::codec::MessageWriter;
use crate::protocol::{
    self, ApplyWorkspaceEditParams, Diagnostic, MessageActionItem, MessageParams, MessageType,
    OutputParams, PublishDiagnosticsParams, ResponseError, ShowDocumentParams,
    ShowMessageRequestParams, WorkspaceEdit,
};

/// Custom notification that drives the editor's J output panel.
pub const OUTPUT_NOTIFICATION: &str = "j-lang/output";

pub(crate) const WRITER_CHANNEL_CAPACITY: usize = 256;

/// How long to wait for the editor to answer a request. Covers prompts the
/// user has to click through.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub(crate) enum WriterCommand {
    Send(Value),
    Shutdown,
}

type PendingMap = HashMap<u64, oneshot::Sender<Result<Value, ResponseError>>>;

#[derive(Debug, Error)]
pub(crate) enum ClientError {
    #[error("connection to the editor is closed")]
    Closed,
    #[error("editor did not answer {method} in time")]
    TimedOut { method: String },
    #[error("editor rejected the request: {0}")]
    Rejected(ResponseError),
}

#[derive(Clone)]
pub(crate) struct Client {
    writer_tx: mpsc::Sender<WriterCommand>,
    pending: Arc<Mutex<PendingMap>>,
    next_id: Arc<AtomicU64>,
}

/// Drain `rx` into `output` until shutdown or a write failure.
pub(crate) async fn write_loop<W: AsyncWrite + Unpin>(
    output: W,
    mut rx: mpsc::Receiver<WriterCommand>,
) {
    let mut writer = MessageWriter::new(output);
    while let Some(command) = rx.recv().await {
        match command {
            WriterCommand::Send(message) => {
                if let Err(e) = writer.write_message(&message).await {
                    tracing::warn!("LSP write error: {e:#}");
                    break;
                }
            }
            WriterCommand::Shutdown => break,
        }
    }
}

impl Client {
    pub(crate) fn new(writer_tx: mpsc::Sender<WriterCommand>) -> Self {
        Self {
            writer_tx,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn pending(&self) -> MutexGuard<'_, PendingMap> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn send(&self, message: Value) -> bool {
        let sent = self
            .writer_tx
            .send(WriterCommand::Send(message))
            .await
            .is_ok();
        if !sent {
            tracing::debug!("Dropping outgoing message: writer is gone");
        }
        sent
    }

    pub(crate) async fn respond(&self, id: Value, outcome: Result<Value, ResponseError>) {
        self.send(protocol::response(id, outcome)).await;
    }

    pub(crate) async fn notify<P: Serialize>(&self, method: &str, params: &P) {
        self.send(protocol::notification(method, protocol::to_value(params)))
            .await;
    }

    /// Send a request and wait for the editor's answer.
    pub(crate) async fn request<P: Serialize>(
        &self,
        method: &str,
        params: &P,
    ) -> Result<Value, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending().insert(id, tx);

        if !self
            .send(protocol::request(id, method, protocol::to_value(params)))
            .await
        {
            self.pending().remove(&id);
            return Err(ClientError::Closed);
        }

        match time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(error))) => Err(ClientError::Rejected(error)),
            Ok(Err(_)) => Err(ClientError::Closed),
            Err(_) => {
                self.pending().remove(&id);
                Err(ClientError::TimedOut {
                    method: method.to_string(),
                })
            }
        }
    }

    /// Route the editor's response to the request waiting for it.
    pub(crate) fn complete(&self, id: u64, result: Result<Value, ResponseError>) {
        match self.pending().remove(&id) {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => tracing::debug!(id, "Response for unknown request"),
        }
    }

    pub(crate) async fn publish_diagnostics(&self, uri: &str, findings: &FindingSet) {
        let params = PublishDiagnosticsParams {
            uri: uri.to_string(),
            version: None,
            diagnostics: findings.iter().map(Diagnostic::from).collect(),
        };
        self.notify("textDocument/publishDiagnostics", &params)
            .await;
    }

    pub(crate) async fn log_message(&self, kind: MessageType, message: &str) {
        self.notify("window/logMessage", &MessageParams { kind, message })
            .await;
    }

    pub(crate) async fn show_message(&self, kind: MessageType, message: &str) {
        self.notify("window/showMessage", &MessageParams { kind, message })
            .await;
    }

    /// Ask the user to pick one of `actions`; `None` when dismissed.
    pub(crate) async fn show_message_request(
        &self,
        kind: MessageType,
        message: &str,
        actions: &[&str],
    ) -> Option<String> {
        let params = ShowMessageRequestParams {
            kind,
            message,
            actions: actions
                .iter()
                .map(|title| MessageActionItem { title: *title })
                .collect(),
        };
        match self.request("window/showMessageRequest", &params).await {
            Ok(choice) => choice
                .get("title")
                .and_then(Value::as_str)
                .map(String::from),
            Err(e) => {
                tracing::debug!("showMessageRequest failed: {e}");
                None
            }
        }
    }

    /// Ask the editor to open `uri` outside the current window.
    pub(crate) async fn show_document_external(&self, uri: &str) {
        let params = ShowDocumentParams {
            uri: uri.to_string(),
            external: true,
        };
        if let Err(e) = self.request("window/showDocument", &params).await {
            tracing::warn!(uri, "showDocument failed: {e}");
        }
    }

    pub(crate) async fn apply_edit(&self, label: &'static str, edit: WorkspaceEdit) {
        let params = ApplyWorkspaceEditParams { label, edit };
        match self.request("workspace/applyEdit", &params).await {
            Ok(result) if result.get("applied") == Some(&Value::Bool(false)) => {
                tracing::debug!(label, "Editor declined workspace edit");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(label, "applyEdit failed: {e}"),
        }
    }

    /// Empty the output panel, bringing it to front when `reveal` is set.
    pub(crate) async fn clear_output(&self, reveal: bool) {
        let params = OutputParams {
            clear: Some(true),
            reveal: reveal.then_some(true),
            ..OutputParams::default()
        };
        self.notify(OUTPUT_NOTIFICATION, &params).await;
    }

    /// Append a line to the output panel, mirrored to the editor's log.
    pub(crate) async fn output_line(&self, text: &str) {
        let params = OutputParams {
            text: Some(text.to_string()),
            ..OutputParams::default()
        };
        self.notify(OUTPUT_NOTIFICATION, &params).await;
        self.log_message(MessageType::Log, text).await;
    }

    /// Stop the writer after already-queued messages and fail waiting requests.
    pub(crate) async fn shutdown(&self) {
        self.pending().clear();
        let _ = self.writer_tx.send(WriterCommand::Shutdown).await;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::task;

    use super::*;

    fn client() -> (Client, mpsc::Receiver<WriterCommand>) {
        let (tx, rx) = mpsc::channel(16);
        (Client::new(tx), rx)
    }

    fn sent(rx: &mut mpsc::Receiver<WriterCommand>) -> Value {
        match rx.try_recv() {
            Ok(WriterCommand::Send(message)) => message,
            Ok(WriterCommand::Shutdown) => panic!("unexpected shutdown"),
            Err(e) => panic!("nothing sent: {e}"),
        }
    }

    #[tokio::test]
    async fn request_resolves_with_matching_response() {
        let (client, mut rx) = client();
        let waiter = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .show_message_request(MessageType::Info, "Open new project?", &["Yes", "No"])
                    .await
            })
        };

        let request = loop {
            if let Ok(WriterCommand::Send(message)) = rx.try_recv() {
                break message;
            }
            task::yield_now().await;
        };
        assert_eq!(request["method"], "window/showMessageRequest");
        assert_eq!(request["params"]["actions"][0]["title"], "Yes");
        let id = request["id"].as_u64().unwrap();

        client.complete(id, Ok(json!({"title": "Yes"})));
        assert_eq!(waiter.await.unwrap().as_deref(), Some("Yes"));
        assert!(client.pending().is_empty());
    }

    #[tokio::test]
    async fn dismissed_prompt_is_none() {
        let (client, mut rx) = client();
        let waiter = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .show_message_request(MessageType::Info, "Open new project?", &["Yes", "No"])
                    .await
            })
        };
        let id = loop {
            if let Ok(WriterCommand::Send(message)) = rx.try_recv() {
                break message["id"].as_u64().unwrap();
            }
            task::yield_now().await;
        };
        client.complete(id, Ok(Value::Null));
        assert_eq!(waiter.await.unwrap(), None);
    }

    #[tokio::test]
    async fn shutdown_fails_waiting_requests() {
        let (client, _rx) = client();
        let waiter = {
            let client = client.clone();
            tokio::spawn(async move { client.request("window/showDocument", &json!({})).await })
        };
        while client.pending().is_empty() {
            task::yield_now().await;
        }
        client.shutdown().await;
        assert!(matches!(waiter.await.unwrap(), Err(ClientError::Closed)));
    }

    #[tokio::test]
    async fn unknown_response_ids_are_ignored() {
        let (client, _rx) = client();
        client.complete(42, Ok(Value::Null));
        assert!(client.pending().is_empty());
    }

    #[tokio::test]
    async fn output_lines_are_mirrored_to_the_log() {
        let (client, mut rx) = client();
        client.output_line("Running: /w/a.j").await;

        let output = sent(&mut rx);
        assert_eq!(output["method"], OUTPUT_NOTIFICATION);
        assert_eq!(output["params"], json!({"text": "Running: /w/a.j"}));

        let log = sent(&mut rx);
        assert_eq!(log["method"], "window/logMessage");
        assert_eq!(log["params"]["type"], 4);
        assert_eq!(log["params"]["message"], "Running: /w/a.j");
    }

    #[tokio::test]
    async fn clear_output_reveals_only_when_asked() {
        let (client, mut rx) = client();
        client.clear_output(false).await;
        assert_eq!(sent(&mut rx)["params"], json!({"clear": true}));
        client.clear_output(true).await;
        assert_eq!(sent(&mut rx)["params"], json!({"clear": true, "reveal": true}));
    }

    #[tokio::test]
    async fn closed_writer_is_reported() {
        let (client, rx) = client();
        drop(rx);
        let err = client
            .request("workspace/applyEdit", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Closed));
        assert!(client.pending().is_empty());
    }
}
