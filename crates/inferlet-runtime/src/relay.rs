//! Container log relay
//!
//! Drains a container's output stream on its own task and forwards every line,
//! in arrival order, to a log sink. The relay ends when the stream does; read
//! errors are logged and end the relay without reaching the supervisor.

use futures::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::traits::LogStream;

/// Destination for relayed container output
pub trait LogSink: Send + Sync {
    fn emit(&self, line: &str);
}

/// Forwards container output to the process-wide tracing subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, line: &str) {
        info!(target: "container", "{}", line);
    }
}

/// What a finished relay did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelaySummary {
    /// Lines forwarded to the sink
    pub lines: u64,
    /// Whether the stream ended on a read error
    pub interrupted: bool,
}

/// Forward every line of `stream` to `sink` until the stream closes
pub async fn relay(mut stream: LogStream, sink: Arc<dyn LogSink>) -> RelaySummary {
    let mut summary = RelaySummary::default();

    while let Some(item) = stream.next().await {
        match item {
            Ok(line) => {
                sink.emit(&line);
                summary.lines += 1;
            }
            Err(e) => {
                warn!(error = %e, "Container output stream failed, stopping log relay");
                summary.interrupted = true;
                break;
            }
        }
    }

    debug!(lines = summary.lines, "Log relay finished");
    summary
}

/// Run [`relay`] as an independent task
pub fn spawn_relay(stream: LogStream, sink: Arc<dyn LogSink>) -> JoinHandle<RelaySummary> {
    tokio::spawn(relay(stream, sink))
}
