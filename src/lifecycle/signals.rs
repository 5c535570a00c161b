//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for Ctrl-C (SIGINT) or SIGTERM
//! - Report which one arrived so the caller can stop the run cleanly
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A handler that cannot be installed never fires, rather than
//!   ending the run early

use std::fmt;

/// The signal that interrupted a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopSignal::Interrupt => f.write_str("interrupt"),
            StopSignal::Terminate => f.write_str("terminate"),
        }
    }
}

/// Resolve when the process is asked to stop.
pub async fn stop_signal() -> StopSignal {
    tokio::select! {
        _ = interrupt() => StopSignal::Interrupt,
        _ = terminate() => StopSignal::Terminate,
    }
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_no_signal_keeps_waiting() {
        let waited = tokio::time::timeout(Duration::from_millis(20), stop_signal()).await;
        assert!(waited.is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(StopSignal::Interrupt.to_string(), "interrupt");
    }
}
