//! State shared by the server loop and the tasks it spawns.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use jls_config::{ClientSettings, Settings};
use jls_toolchain::{DiagnosticParser, Invoker, Toolchain};

use crate::catalog::Catalog;
use crate::client::Client;
use crate::documents::DocumentTable;
use crate::formatting::Formatter;
use crate::store::DiagnosticStore;

pub(crate) struct Context<I> {
    pub invoker: I,
    pub parser: Arc<dyn DiagnosticParser>,
    pub catalog: Arc<dyn Catalog>,
    pub formatter: Arc<dyn Formatter>,
    pub store: Arc<DiagnosticStore>,
    pub documents: DocumentTable,
    pub client: Client,
    /// Defaults plus the user file; client settings are layered on top of it.
    base_settings: Settings,
    settings: Mutex<Settings>,
    workspace_root: Mutex<Option<PathBuf>>,
}

pub(crate) struct Components<I> {
    pub invoker: I,
    pub parser: Arc<dyn DiagnosticParser>,
    pub catalog: Arc<dyn Catalog>,
    pub formatter: Arc<dyn Formatter>,
    pub store: Arc<DiagnosticStore>,
    pub settings: Settings,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<I: Invoker> Context<I> {
    pub(crate) fn new(components: Components<I>, client: Client) -> Self {
        Self {
            invoker: components.invoker,
            parser: components.parser,
            catalog: components.catalog,
            formatter: components.formatter,
            store: components.store,
            documents: DocumentTable::default(),
            client,
            settings: Mutex::new(components.settings.clone()),
            base_settings: components.settings,
            workspace_root: Mutex::new(None),
        }
    }

    /// Current effective settings.
    pub(crate) fn settings(&self) -> Settings {
        lock(&self.settings).clone()
    }

    /// Re-layer client settings over the base layer. Each update replaces the
    /// previous client layer instead of stacking on it.
    pub(crate) fn apply_client_settings(&self, client: &ClientSettings) {
        let settings = self.base_settings.with_client(client);
        tracing::info!(
            executable = %settings.executable_path,
            enable_linting = settings.enable_linting,
            show_output_on_run = settings.show_output_on_run,
            "Settings updated"
        );
        *lock(&self.settings) = settings;
    }

    pub(crate) fn toolchain(&self) -> Toolchain {
        Toolchain::new(lock(&self.settings).executable_path.clone())
    }

    pub(crate) fn workspace_root(&self) -> Option<PathBuf> {
        lock(&self.workspace_root).clone()
    }

    pub(crate) fn set_workspace_root(&self, root: Option<PathBuf>) {
        *lock(&self.workspace_root) = root;
    }
}
