//! Shared test utilities and fixtures
//!
//! An in-memory editor that drives a [`Server`] over a duplex stream.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use jls_config::Settings;
use jls_lsp::codec::{MessageReader, MessageWriter};
use jls_lsp::{ExitReason, Server};
use jls_toolchain::{InvokeError, Invoker};
use jls_types::{ExitStatus, InvocationOutput, InvocationRequest};
use serde_json::{Value, json};
use tokio::io::{self, DuplexStream, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;
use tokio::time;

pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Invoker that replays scripted outputs and records every request.
#[derive(Clone, Default)]
pub struct FakeInvoker {
    script: Arc<Mutex<VecDeque<InvocationOutput>>>,
    calls: Arc<Mutex<Vec<InvocationRequest>>>,
}

impl FakeInvoker {
    pub fn push(&self, output: InvocationOutput) {
        self.script.lock().unwrap().push_back(output);
    }

    pub fn calls(&self) -> Vec<InvocationRequest> {
        self.calls.lock().unwrap().clone()
    }
}

impl Invoker for FakeInvoker {
    async fn invoke(
        &self,
        request: &InvocationRequest,
        _timeout: Option<Duration>,
    ) -> Result<InvocationOutput, InvokeError> {
        self.calls.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| InvocationOutput {
            status: ExitStatus::Succeeded,
            stdout: "No syntax errors found.\n".to_string(),
            stderr: String::new(),
        }))
    }
}

pub fn check_failure(stderr: &str) -> InvocationOutput {
    InvocationOutput {
        status: ExitStatus::Failed { code: Some(1) },
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

/// The client end of a running server.
pub struct Editor {
    reader: MessageReader<ReadHalf<DuplexStream>>,
    writer: MessageWriter<WriteHalf<DuplexStream>>,
    /// Messages read while waiting for something else.
    backlog: VecDeque<Value>,
    next_id: u64,
    server: JoinHandle<anyhow::Result<ExitReason>>,
}

impl Editor {
    pub fn start<I: Invoker>(server: Server<I>) -> Self {
        let (client_io, server_io) = io::duplex(64 * 1024);
        let (server_read, server_write) = io::split(server_io);
        let (client_read, client_write) = io::split(client_io);
        let server = tokio::spawn(server.serve(server_read, server_write));
        Self {
            reader: MessageReader::new(client_read),
            writer: MessageWriter::new(client_write),
            backlog: VecDeque::new(),
            next_id: 1,
            server,
        }
    }

    pub fn with_fake(invoker: FakeInvoker, settings: Settings) -> Self {
        Self::start(Server::with_invoker(invoker, settings))
    }

    async fn read(&mut self) -> Value {
        time::timeout(READ_TIMEOUT, self.reader.read_message())
            .await
            .expect("timed out waiting for the server")
            .expect("framing error")
            .expect("server closed the stream")
    }

    /// Next message from the server, whatever it is.
    pub async fn next_message(&mut self) -> Value {
        self.read().await
    }

    /// Send a framed body verbatim, valid JSON or not.
    pub async fn send_raw(&mut self, body: &[u8]) {
        self.writer.write_frame(body).await.unwrap();
    }

    pub async fn send(&mut self, message: Value) {
        self.writer.write_message(&message).await.unwrap();
    }

    pub async fn notify(&mut self, method: &str, params: Value) {
        self.send(json!({"jsonrpc": "2.0", "method": method, "params": params}))
            .await;
    }

    /// Send a request and return the whole response message.
    pub async fn request(&mut self, method: &str, params: Value) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        self.send(json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}))
            .await;
        loop {
            let message = self.read().await;
            if message["id"] == id && message.get("method").is_none() {
                return message;
            }
            self.backlog.push_back(message);
        }
    }

    /// Next notification (or server request) with `method`, skipping others.
    pub async fn expect(&mut self, method: &str) -> Value {
        if let Some(pos) = self.backlog.iter().position(|m| m["method"] == method) {
            return self.backlog.remove(pos).unwrap();
        }
        loop {
            let message = self.read().await;
            if message["method"] == method {
                return message;
            }
            self.backlog.push_back(message);
        }
    }

    /// Messages with `method` received so far, without waiting.
    pub fn received(&self, method: &str) -> Vec<Value> {
        self.backlog
            .iter()
            .filter(|m| m["method"] == method)
            .cloned()
            .collect()
    }

    pub async fn initialize(&mut self, options: Value) -> Value {
        let response = self
            .request(
                "initialize",
                json!({
                    "processId": null,
                    "rootUri": "file:///work",
                    "capabilities": {},
                    "initializationOptions": options,
                }),
            )
            .await;
        self.notify("initialized", json!({})).await;
        response
    }

    pub async fn open(&mut self, uri: &str, language_id: &str, text: &str) {
        self.notify(
            "textDocument/didOpen",
            json!({"textDocument": {
                "uri": uri, "languageId": language_id, "version": 1, "text": text
            }}),
        )
        .await;
    }

    /// `shutdown` then `exit`; returns how the server loop ended.
    pub async fn shutdown(mut self) -> ExitReason {
        let response = self.request("shutdown", Value::Null).await;
        assert_eq!(response["result"], Value::Null);
        self.notify("exit", Value::Null).await;
        self.finish().await
    }

    /// Wait for the server loop to end.
    pub async fn finish(self) -> ExitReason {
        time::timeout(READ_TIMEOUT, self.server)
            .await
            .expect("server did not stop")
            .expect("server task panicked")
            .expect("server failed")
    }
}
