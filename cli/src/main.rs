//! `jls`: the J language server, speaking LSP over stdin/stdout.
//!
//! Logs never go to stdout since that carries the protocol. They go to
//! `--log-file` when given, stderr otherwise, filtered by `JLS_LOG` (falling
//! back to `RUST_LOG`, then `info`).

use std::fs::{self, File, OpenOptions};
use std::io::stderr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use jls_config::{FileConfig, Settings};
use jls_lsp::Server;
use tokio::io::{stdin, stdout};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_ENV: &str = "JLS_LOG";

#[derive(Debug, Parser)]
#[command(name = "jls")]
#[command(version, about = "Language server for the J programming language")]
struct Cli {
    /// Speak LSP over stdin/stdout (the only transport)
    #[arg(long)]
    stdio: bool,
    /// Append logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
    /// Parent process id appended by vscode-languageclient; unused
    #[arg(long = "clientProcessId", hide = true)]
    client_process_id: Option<String>,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))
}

fn init_tracing(log_file: Option<&Path>) {
    let file = log_file.map(|path| (path, open_log_file(path)));
    match file {
        Some((path, Ok(file))) => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(env_filter())
                .init();
            tracing::debug!(path = %path.display(), "Logging to file");
        }
        Some((_, Err(e))) => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(stderr))
                .with(env_filter())
                .init();
            tracing::warn!("Falling back to stderr logging: {e:#}");
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(stderr))
                .with(env_filter())
                .init();
        }
    }
}

fn load_settings() -> Settings {
    match FileConfig::load() {
        Ok(file) => Settings::with_file(file.as_ref()),
        Err(e) => {
            tracing::warn!(path = %e.path().display(), "Ignoring config file: {e}");
            Settings::default()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.log_file.as_deref());
    let settings = load_settings();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        executable = %settings.executable_path,
        stdio = cli.stdio,
        client_process_id = ?cli.client_process_id,
        "Starting J language server"
    );

    match Server::new(settings).serve(stdin(), stdout()).await {
        Ok(reason) => {
            tracing::info!(?reason, "Server stopped");
            if reason.exit_code() == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use std::iter;

    use clap::CommandFactory;
    use clap::error::ErrorKind;

    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(iter::once("jls").chain(args.iter().copied()))
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_arguments_means_stdio_without_log_file() {
        let cli = parse(&[]).unwrap();
        assert!(!cli.stdio);
        assert_eq!(cli.log_file, None);
        assert!(parse(&["--stdio"]).unwrap().stdio);
    }

    #[test]
    fn log_file_in_both_spellings() {
        let expected = Some(PathBuf::from("/tmp/jls.log"));
        assert_eq!(parse(&["--log-file", "/tmp/jls.log"]).unwrap().log_file, expected);
        assert_eq!(
            parse(&["--stdio", "--log-file=/tmp/jls.log"]).unwrap().log_file,
            expected
        );
    }

    #[test]
    fn log_file_needs_a_value() {
        assert!(parse(&["--log-file"]).is_err());
    }

    #[test]
    fn client_process_id_is_accepted() {
        let cli = parse(&["--stdio", "--clientProcessId=4242"]).unwrap();
        assert_eq!(cli.client_process_id.as_deref(), Some("4242"));
        assert_eq!(cli.log_file, None);
    }

    #[test]
    fn unknown_arguments_are_rejected() {
        let err = parse(&["--tcp"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn version_flag_is_handled_by_clap() {
        let err = parse(&["--version"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn log_file_parent_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("jls.log");
        open_log_file(&path).unwrap();
        assert!(path.exists());
    }
}
