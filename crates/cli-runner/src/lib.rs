//! Entrypoint for running long-lived commands until the process is asked to stop.

use std::{future::Future, io, pin::pin, time::Duration};

use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long a command may keep running after a shutdown signal was received.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// How long the runtime waits for detached tasks once the command has returned.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Context handed to every command.
#[derive(Debug, Clone)]
pub struct CliContext {
    /// Process-wide cancellation signal, fired on SIGINT/SIGTERM.
    pub cancel: CancellationToken,
}

/// Executes commands on a multi-threaded tokio runtime.
#[derive(Debug)]
pub struct CliRunner {
    tokio_runtime: Runtime,
    grace_period: Duration,
}

impl CliRunner {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            tokio_runtime: tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?,
            grace_period: DEFAULT_GRACE_PERIOD,
        })
    }

    /// Runs the command until it finishes or the process receives a shutdown signal.
    ///
    /// On shutdown the context's cancellation token fires and the command is given
    /// [`DEFAULT_GRACE_PERIOD`] to return.
    pub fn run_command_until_exit<F, E>(
        self,
        command: impl FnOnce(CliContext) -> F,
    ) -> Result<(), E>
    where
        F: Future<Output = Result<(), E>>,
        E: From<io::Error>,
    {
        let Self {
            tokio_runtime,
            grace_period,
        } = self;

        let cancel = CancellationToken::new();
        let context = CliContext {
            cancel: cancel.clone(),
        };

        let result = tokio_runtime.block_on(run_until_shutdown(
            command(context),
            shutdown_signal(),
            cancel,
            grace_period,
        ));

        debug!("Shutting down tokio runtime");
        tokio_runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);

        result
    }
}

async fn run_until_shutdown<F, S, E>(
    command: F,
    shutdown: S,
    cancel: CancellationToken,
    grace_period: Duration,
) -> Result<(), E>
where
    F: Future<Output = Result<(), E>>,
    S: Future<Output = io::Result<&'static str>>,
    E: From<io::Error>,
{
    let mut command = pin!(command);

    tokio::select! {
        res = &mut command => return res,
        signal = shutdown => {
            let signal = signal?;
            info!(signal, "Received shutdown signal, stopping");
        }
    }

    cancel.cancel();

    match tokio::time::timeout(grace_period, command).await {
        Ok(res) => res,
        Err(_) => {
            warn!(?grace_period, "Command did not stop within the grace period");
            Ok(())
        }
    }
}

async fn shutdown_signal() -> io::Result<&'static str> {
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

        tokio::select! {
            res = tokio::signal::ctrl_c() => res.map(|_| "SIGINT"),
            _ = terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.map(|_| "ctrl-c")
    }
}
