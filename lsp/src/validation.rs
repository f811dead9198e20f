//! Validation trigger: run `check` on a document and publish what it finds.

use jls_toolchain::Invoker;
use jls_types::DocumentId;

use crate::context::Context;
use crate::protocol::{self, MessageType};
use crate::store::Replaced;

/// What caused a validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The document was opened.
    Opened,
    /// The document was saved; gated by `enable_linting`.
    Saved,
    /// The user asked for a syntax check.
    Explicit,
}

impl Trigger {
    fn is_background(self) -> bool {
        !matches!(self, Self::Explicit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Validation {
    /// Nothing was invoked.
    Skipped,
    /// The result became the document's current state and was published.
    Published,
    /// A newer result, or a close, got there first.
    Stale,
    /// The toolchain did not run to completion; the store is unchanged.
    Failed,
}

pub(crate) async fn validate<I: Invoker>(
    ctx: &Context<I>,
    doc: &DocumentId,
    trigger: Trigger,
) -> Validation {
    let settings = ctx.settings();
    if trigger == Trigger::Saved && !settings.enable_linting {
        return Validation::Skipped;
    }
    let Some(path) = protocol::file_uri_to_path(doc.as_str()) else {
        tracing::debug!(uri = %doc, "Skipping validation of non-file document");
        return Validation::Skipped;
    };

    let ticket = ctx.store.begin(doc);
    let request = ctx.toolchain().check(&path);
    let timeout = if trigger.is_background() {
        settings.check_timeout
    } else {
        None
    };

    let output = match ctx.invoker.invoke(&request, timeout).await {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(uri = %doc, ?trigger, "Syntax check failed: {e}");
            let message = format!("Syntax check failed: {e}");
            ctx.client.log_message(MessageType::Error, &message).await;
            return Validation::Failed;
        }
    };

    let findings = ctx.parser.parse(&output);
    for finding in &findings {
        tracing::debug!("{}", finding.display_with_path(&path));
    }
    let count = findings.len();

    match ctx.store.replace(doc, ticket, findings) {
        Replaced::Stored => {
            let current = ctx.store.get(doc);
            ctx.client.publish_diagnostics(doc.as_str(), &current).await;
            tracing::debug!(
                uri = %doc,
                count,
                status = %ctx.store.snapshot().status_string(),
                "Published diagnostics"
            );
            Validation::Published
        }
        Replaced::Stale => Validation::Stale,
    }
}
