//! Fire-and-forget error reporting.
//!
//! Request handlers hold an [`ErrorReporter`] and call
//! [`ErrorReporter::capture_error`], which only enqueues. A background
//! [`report_worker`](crate::worker::report_worker) drains the queue into a
//! [`ReportSink`], so a slow or unreachable backend never holds up a response.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::MonitorError;
use crate::metrics::{ESCALATIONS, ESCALATIONS_DROPPED};

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorReport {
    pub message: String,
    pub context: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorReport {
    pub fn new(message: impl Into<String>, context: Map<String, Value>) -> Self {
        Self {
            message: message.into(),
            context,
            timestamp: Utc::now(),
        }
    }

    // "component" tag used to group reports, "unknown" when absent
    pub fn component(&self) -> &str {
        self.context
            .get("component")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
    }
}

// Where queued reports end up
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn deliver(&self, report: &ErrorReport) -> Result<(), MonitorError>;
}

// Used when no monitoring backend is configured
pub struct LogSink;

#[async_trait]
impl ReportSink for LogSink {
    async fn deliver(&self, report: &ErrorReport) -> Result<(), MonitorError> {
        tracing::error!(
            component = report.component(),
            context = %serde_json::Value::Object(report.context.clone()),
            "{}",
            report.message
        );
        Ok(())
    }
}

/// Cloneable handle onto the report queue.
#[derive(Clone)]
pub struct ErrorReporter {
    tx: mpsc::Sender<ErrorReport>,
}

impl ErrorReporter {
    pub fn new(tx: mpsc::Sender<ErrorReport>) -> Self {
        Self { tx }
    }

    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ErrorReport>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Queues a report without waiting. Never fails: a full or closed queue
    /// drops the report and logs a warning.
    pub fn capture_error(&self, message: impl Into<String>, context: Map<String, Value>) {
        let report = ErrorReport::new(message, context);

        match self.tx.try_send(report) {
            Ok(()) => ESCALATIONS.inc(),
            Err(TrySendError::Full(report)) => {
                ESCALATIONS_DROPPED.inc();
                tracing::warn!(message = %report.message, "error report queue full, dropping report");
            }
            Err(TrySendError::Closed(report)) => {
                ESCALATIONS_DROPPED.inc();
                tracing::warn!(message = %report.message, "error report worker gone, dropping report");
            }
        }
    }
}
