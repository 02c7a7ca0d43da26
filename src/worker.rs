use std::sync::Arc;
use tokio::sync::mpsc;

use crate::metrics::ESCALATION_FAILURES;
use crate::monitor::{ErrorReport, ReportSink};

// Background worker -> delivers queued error reports one by one
pub async fn report_worker(mut rx: mpsc::Receiver<ErrorReport>, sink: Arc<dyn ReportSink>) {
    tracing::info!("error report worker started");

    while let Some(report) = rx.recv().await {
        // delivery failures stop here, callers already got their response
        if let Err(e) = sink.deliver(&report).await {
            ESCALATION_FAILURES.inc();
            tracing::warn!(error = %e, message = %report.message, "failed to deliver error report");
        }
    }

    tracing::info!("error report queue closed, worker exiting");
}
