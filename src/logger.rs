//! Application logging collaborator.
//!
//! Components report recoverable failures through the [`Logger`] trait
//! instead of returning them, so the transport (local `tracing` output or a
//! remote log endpoint) is chosen once at startup.
//!
//! TRADE-OFFS
//! ==========
//! Remote shipping is best-effort: an entry that cannot be posted falls back
//! to local output and is never retried.

use std::error::Error as StdError;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::fact::format_timestamp;

/// Severity of a [`LogEntry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Structured log record, the body posted to the remote log endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// `Display` of the reported error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The error's `source()` chain, outermost cause first, one per line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl LogEntry {
    #[must_use]
    pub fn new(
        level: LogLevel,
        message: &str,
        err: Option<&(dyn StdError + 'static)>,
        context: Option<&str>,
    ) -> Self {
        Self {
            timestamp: format_timestamp(OffsetDateTime::now_utc()),
            level,
            message: message.to_owned(),
            context: context.map(str::to_owned),
            error: err.map(ToString::to_string),
            stack: err.and_then(source_chain),
        }
    }
}

fn source_chain(err: &(dyn StdError + 'static)) -> Option<String> {
    let mut causes = Vec::new();
    let mut current = err.source();
    while let Some(cause) = current {
        causes.push(cause.to_string());
        current = cause.source();
    }
    if causes.is_empty() { None } else { Some(causes.join("\n")) }
}

/// Logging collaborator consumed by services.
pub trait Logger: Send + Sync {
    /// Emit a fully built entry.
    fn log(&self, entry: LogEntry);

    fn debug(&self, message: &str, context: Option<&str>) {
        self.log(LogEntry::new(LogLevel::Debug, message, None, context));
    }

    fn info(&self, message: &str, context: Option<&str>) {
        self.log(LogEntry::new(LogLevel::Info, message, None, context));
    }

    fn warn(&self, message: &str, err: Option<&(dyn StdError + 'static)>, context: Option<&str>) {
        self.log(LogEntry::new(LogLevel::Warn, message, err, context));
    }

    fn error(&self, message: &str, err: &(dyn StdError + 'static), context: &str) {
        self.log(LogEntry::new(LogLevel::Error, message, Some(err), Some(context)));
    }

    /// Hand over deliveries still in flight. Transports that write
    /// synchronously have none.
    fn take_pending(&self) -> Vec<JoinHandle<()>> {
        Vec::new()
    }
}

/// Wait for every in-flight delivery of `logger`. Call before the runtime
/// shuts down, or queued entries are aborted with it.
pub async fn flush(logger: &dyn Logger) {
    for task in logger.take_pending() {
        if let Err(e) = task.await {
            warn!(error = %e, "log delivery task failed");
        }
    }
}

// =============================================================================
// TRACING
// =============================================================================

/// Writes entries to the process `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, entry: LogEntry) {
        emit_local(&entry);
    }
}

fn emit_local(entry: &LogEntry) {
    let context = entry.context.as_deref().unwrap_or("");
    let err = entry.error.as_deref().unwrap_or("");
    let stack = entry.stack.as_deref().unwrap_or("");
    match entry.level {
        LogLevel::Debug => debug!(context, ts = %entry.timestamp, "{}", entry.message),
        LogLevel::Info => info!(context, ts = %entry.timestamp, "{}", entry.message),
        LogLevel::Warn => warn!(context, error = err, ts = %entry.timestamp, "{}", entry.message),
        LogLevel::Error => error!(context, error = err, stack, ts = %entry.timestamp, "{}", entry.message),
    }
}

// =============================================================================
// REMOTE
// =============================================================================

/// Posts entries to a log endpoint; falls back to local output on failure.
///
/// Each post runs on its own task. Clones share the set of in-flight tasks,
/// which [`flush`] drains.
#[derive(Debug, Clone)]
pub struct RemoteLogger {
    client: reqwest::Client,
    url: Arc<str>,
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl RemoteLogger {
    #[must_use]
    pub fn new(client: reqwest::Client, url: &str) -> Self {
        Self { client, url: Arc::from(url), pending: Arc::default() }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Post one entry and wait for the response.
    ///
    /// # Errors
    ///
    /// Returns the transport error or a non-success status as `reqwest::Error`.
    pub async fn send(&self, entry: &LogEntry) -> Result<(), reqwest::Error> {
        self.client
            .post(&*self.url)
            .json(entry)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

impl Logger for RemoteLogger {
    fn log(&self, entry: LogEntry) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            emit_local(&entry);
            return;
        };
        let this = self.clone();
        let task = handle.spawn(async move {
            if let Err(e) = this.send(&entry).await {
                error!(error = %e, url = %this.url, "Failed to send log to server");
                emit_local(&entry);
            }
        });
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|t| !t.is_finished());
        pending.push(task);
    }

    fn take_pending(&self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Pick the transport: remote in production, local otherwise.
#[must_use]
pub fn for_environment(production: bool, client: reqwest::Client, log_url: &str) -> Arc<dyn Logger> {
    if production {
        Arc::new(RemoteLogger::new(client, log_url))
    } else {
        Arc::new(TracingLogger)
    }
}

#[cfg(test)]
#[path = "logger_test.rs"]
mod tests;
