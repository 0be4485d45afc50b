//! Process lifecycle helpers for services hosting token verification.
//!
//! These sit at the edge of the process: read required configuration once at
//! startup, and run cleanup when the orchestrator asks the process to stop.
//! The verification core never calls into this module.

use std::env;
use std::future::Future;
use tracing::{error, info, warn};

use crate::GuardError;

/// Reads a required environment variable.
///
/// # Errors
///
/// Returns [`GuardError::MissingEnv`] when the variable is unset or not unicode.
pub fn require_env(key: &str) -> Result<String, GuardError> {
    env::var(key).map_err(|e| GuardError::MissingEnv {
        name: key.to_string(),
        reason: e.to_string(),
    })
}

/// Reads a required environment variable or terminates the process.
///
/// Meant for startup code, where a missing setting leaves nothing sensible to do.
pub fn env_or_exit(key: &str) -> String {
    match require_env(key) {
        Ok(value) => value,
        Err(e) => {
            error!(variable = key, error = %e, "required environment variable not found");
            std::process::exit(1);
        }
    }
}

/// Which signal asked the process to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

/// Waits for Ctrl+C or, on unix, SIGTERM.
///
/// If a handler cannot be installed the failure is logged and that signal is
/// never reported.
pub async fn shutdown_signal() -> ShutdownSignal {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => ShutdownSignal::Interrupt,
        _ = terminate => ShutdownSignal::Terminate,
    }
}

/// Runs `run`, waits for `signal`, then runs `on_exit`.
///
/// `on_exit` runs even when `run` fails or panics; in that case the process
/// does not wait for a signal and the error from `run` is returned after
/// cleanup. Dropping the returned future before the signal arrives also runs
/// `on_exit`.
pub async fn with_shutdown_signal<R, E, S, T>(run: R, on_exit: E, signal: S) -> Result<T, GuardError>
where
    R: FnOnce() -> Result<(), GuardError>,
    E: FnOnce(),
    S: Future<Output = T>,
{
    let cleanup = OnExit(Some(on_exit));

    if let Err(e) = run() {
        error!(error = %e, "startup failed, running cleanup");
        return Err(e);
    }

    let received = signal.await;
    info!("shutdown requested, running cleanup");
    drop(cleanup);
    Ok(received)
}

/// Calls the wrapped cleanup exactly once, when dropped.
struct OnExit<E: FnOnce()>(Option<E>);

impl<E: FnOnce()> Drop for OnExit<E> {
    fn drop(&mut self) {
        if let Some(on_exit) = self.0.take() {
            on_exit();
        }
    }
}

/// Runs `run`, then blocks until Ctrl+C or SIGTERM and runs `on_exit`.
///
/// # Example
///
/// ```no_run
/// use tokenguard::lifecycle::with_graceful_shutdown;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), tokenguard::GuardError> {
///     with_graceful_shutdown(
///         || {
///             // open connections, spawn the server
///             Ok(())
///         },
///         || {
///             // close connections
///         },
///     )
///     .await?;
///     Ok(())
/// }
/// ```
pub async fn with_graceful_shutdown<R, E>(run: R, on_exit: E) -> Result<ShutdownSignal, GuardError>
where
    R: FnOnce() -> Result<(), GuardError>,
    E: FnOnce(),
{
    with_shutdown_signal(run, on_exit, shutdown_signal()).await
}
