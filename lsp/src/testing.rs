//! Fixtures shared by the unit tests of this crate.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use jls_config::Settings;
use jls_toolchain::{InvokeError, Invoker, LineNumberParser};
use jls_types::{ExitStatus, InvocationOutput, InvocationRequest};
use serde_json::Value;
use tokio::sync::{Notify, mpsc};

use crate::catalog::StaticCatalog;
use crate::client::{Client, WriterCommand};
use crate::context::{Components, Context};
use crate::formatting::BraceFormatter;
use crate::store::DiagnosticStore;

type Script = VecDeque<Result<InvocationOutput, InvokeError>>;

/// Invoker that replays scripted results and records every request.
///
/// Once the script runs out it answers with a clean check.
#[derive(Clone, Default)]
pub(crate) struct FakeInvoker {
    script: Arc<Mutex<Script>>,
    calls: Arc<Mutex<Vec<(InvocationRequest, Option<Duration>)>>>,
    gate: Arc<Mutex<Option<Arc<Notify>>>>,
}

impl FakeInvoker {
    pub(crate) fn push(&self, result: Result<InvocationOutput, InvokeError>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
    }

    /// Make every later invocation wait for a permit on the returned gate.
    pub(crate) fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&gate));
        gate
    }

    pub(crate) fn calls(&self) -> Vec<(InvocationRequest, Option<Duration>)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Invoker for FakeInvoker {
    async fn invoke(
        &self,
        request: &InvocationRequest,
        timeout: Option<Duration>,
    ) -> Result<InvocationOutput, InvokeError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((request.clone(), timeout));
        let gate = self
            .gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        next.unwrap_or_else(|| Ok(clean()))
    }
}

pub(crate) fn output(status: ExitStatus, stdout: &str, stderr: &str) -> InvocationOutput {
    InvocationOutput {
        status,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    }
}

pub(crate) fn clean() -> InvocationOutput {
    output(ExitStatus::Succeeded, "No syntax errors found.\n", "")
}

pub(crate) fn failed(stderr: &str) -> InvocationOutput {
    output(ExitStatus::Failed { code: Some(1) }, "", stderr)
}

pub(crate) fn context(settings: Settings) -> (Context<FakeInvoker>, mpsc::Receiver<WriterCommand>) {
    let (tx, rx) = mpsc::channel(256);
    let components = Components {
        invoker: FakeInvoker::default(),
        parser: Arc::new(LineNumberParser),
        catalog: Arc::new(StaticCatalog),
        formatter: Arc::new(BraceFormatter),
        store: Arc::new(DiagnosticStore::new()),
        settings,
    };
    (Context::new(components, Client::new(tx)), rx)
}

/// Everything queued for the writer so far.
pub(crate) fn drain(rx: &mut mpsc::Receiver<WriterCommand>) -> Vec<Value> {
    let mut sent = Vec::new();
    while let Ok(command) = rx.try_recv() {
        if let WriterCommand::Send(message) = command {
            sent.push(message);
        }
    }
    sent
}

/// Messages in `sent` with the given method.
pub(crate) fn with_method<'a>(sent: &'a [Value], method: &str) -> Vec<&'a Value> {
    sent.iter().filter(|m| m["method"] == method).collect()
}
