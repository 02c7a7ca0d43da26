use axum::body::Bytes;
use serde_json::{Map, Value, json};
use std::fmt::Display;
use std::sync::Arc;

use crate::error::VitalsError;
use crate::metrics::{ACCEPTED, RATE_LIMIT_CLIENTS};
use crate::models::{MetricName, WebVitalMetric, display_value};
use crate::monitor::ErrorReporter;
use crate::rate_limit::RateLimiter;

// Checked in this order, the first missing one is reported
pub const REQUIRED_FIELDS: [&str; 4] = ["name", "value", "id", "url"];

/// Admission, validation and escalation for one vitals submission.
#[derive(Clone)]
pub struct VitalsPipeline {
    limiter: Arc<RateLimiter>,
    reporter: ErrorReporter,
}

impl VitalsPipeline {
    pub fn new(limiter: Arc<RateLimiter>, reporter: ErrorReporter) -> Self {
        Self { limiter, reporter }
    }

    #[cfg(test)]
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Runs one submission through the pipeline and returns the accepted
    /// metric name.
    ///
    /// The rate limit is charged before anything else is looked at, so
    /// invalid submissions still count against the client. `body` is only
    /// awaited once the content type checks out; a read failure or a body
    /// that is not valid JSON is reported as `Internal`, not as a bad request.
    pub async fn ingest<B, E>(
        &self,
        client_id: &str,
        content_type: Option<&str>,
        body: B,
    ) -> Result<MetricName, VitalsError>
    where
        B: Future<Output = Result<Bytes, E>>,
        E: Display,
    {
        self.admit(client_id)?;
        check_content_type(content_type)?;

        let body = body.await.map_err(VitalsError::internal)?;
        self.process(&body)
    }

    fn admit(&self, client_id: &str) -> Result<(), VitalsError> {
        let admitted = self.limiter.check(client_id);
        RATE_LIMIT_CLIENTS.set(self.limiter.len() as f64);
        if !admitted {
            tracing::debug!(client_id, "rate limit exceeded");
            return Err(VitalsError::RateLimited);
        }
        Ok(())
    }

    // Parse, validate and accept an admitted JSON body
    fn process(&self, body: &[u8]) -> Result<MetricName, VitalsError> {
        let data: Value = serde_json::from_slice(body).map_err(VitalsError::internal)?;

        let fields = match data {
            Value::Object(fields) => fields,
            // an array has none of the required keys
            Value::Array(_) => Map::new(),
            _ => return Err(VitalsError::internal("request body is not a JSON object")),
        };

        let name = validate_fields(&fields)?;
        let metric = WebVitalMetric::from_fields(name, &fields);

        self.accept(&metric);
        Ok(metric.name)
    }

    fn accept(&self, metric: &WebVitalMetric) {
        ACCEPTED.with_label_values(&[metric.name.as_str()]).inc();
        tracing::info!(
            metric = %metric.name,
            value = %display_value(&metric.value),
            rating = ?metric.rating,
            delta = ?metric.delta,
            id = %display_value(&metric.id),
            url = %display_value(&metric.url),
            user_agent = ?metric.user_agent,
            timestamp = ?metric.timestamp,
            library_version = ?metric.library_version,
            "web vital received"
        );

        if metric.is_poor() {
            self.reporter.capture_error(
                format!("Poor {} performance: {}", metric.name, display_value(&metric.value)),
                escalation_context(metric),
            );
        }
    }
}

fn check_content_type(content_type: Option<&str>) -> Result<(), VitalsError> {
    if content_type.is_some_and(|ct| ct.contains("application/json")) {
        Ok(())
    } else {
        Err(VitalsError::UnsupportedContentType)
    }
}

fn validate_fields(fields: &Map<String, Value>) -> Result<MetricName, VitalsError> {
    if let Some(missing) = REQUIRED_FIELDS.into_iter().find(|f| !fields.contains_key(*f)) {
        return Err(VitalsError::MissingField(missing));
    }

    fields
        .get("name")
        .and_then(Value::as_str)
        .and_then(MetricName::parse)
        .ok_or(VitalsError::InvalidMetricName)
}

fn escalation_context(metric: &WebVitalMetric) -> Map<String, Value> {
    let mut context = Map::new();
    context.insert("component".into(), json!("web-vitals"));
    context.insert("metric".into(), json!(metric.name));
    context.insert("value".into(), metric.value.clone());
    context.insert("url".into(), metric.url.clone());
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::ErrorReport;
    use std::convert::Infallible;
    use std::future::{Ready, ready};
    use std::time::Duration;
    use tokio::sync::mpsc;

    const JSON: Option<&str> = Some("application/json");

    fn pipeline(max: u32) -> (VitalsPipeline, mpsc::Receiver<ErrorReport>) {
        let (reporter, rx) = ErrorReporter::channel(16);
        let limiter = Arc::new(RateLimiter::new(max, Duration::from_secs(3600)));
        (VitalsPipeline::new(limiter, reporter), rx)
    }

    fn raw(bytes: &[u8]) -> Ready<Result<Bytes, Infallible>> {
        ready(Ok(Bytes::copy_from_slice(bytes)))
    }

    fn body(value: Value) -> Ready<Result<Bytes, Infallible>> {
        raw(value.to_string().as_bytes())
    }

    fn valid(rating: &str) -> Value {
        json!({
            "name": "LCP",
            "value": 4200.5,
            "rating": rating,
            "delta": 4200.5,
            "id": "v4-1",
            "url": "https://docs.example.com/",
            "userAgent": "Mozilla/5.0",
            "timestamp": 1700000000000_i64
        })
    }

    #[tokio::test]
    async fn missing_url_is_named() {
        let (p, _rx) = pipeline(100);
        let err = p
            .ingest("c", JSON, body(json!({ "name": "XXX", "value": "nope", "id": 1 })))
            .await
            .expect_err("missing url");
        assert!(matches!(err, VitalsError::MissingField("url")));
        assert_eq!(err.to_string(), "Missing required field: url");
    }

    #[tokio::test]
    async fn first_missing_field_wins() {
        let (p, _rx) = pipeline(100);
        let err = p.ingest("c", JSON, body(json!({ "id": "x" }))).await.expect_err("missing");
        assert!(matches!(err, VitalsError::MissingField("name")));
    }

    #[tokio::test]
    async fn array_body_is_missing_every_field() {
        let (p, _rx) = pipeline(100);
        let err = p.ingest("c", JSON, raw(b"[1,2,3]")).await.expect_err("array");
        assert!(matches!(err, VitalsError::MissingField("name")));
    }

    #[tokio::test]
    async fn unknown_metric_name_is_rejected() {
        let (p, _rx) = pipeline(100);
        let payload = json!({ "name": "XXX", "value": 1.0, "id": "x", "url": "/" });
        let err = p.ingest("c", JSON, body(payload)).await.expect_err("invalid");
        assert!(matches!(err, VitalsError::InvalidMetricName));

        let payload = json!({ "name": null, "value": 1.0, "id": "x", "url": "/" });
        let err = p.ingest("c", JSON, body(payload)).await.expect_err("invalid");
        assert!(matches!(err, VitalsError::InvalidMetricName));
    }

    #[tokio::test]
    async fn content_type_must_be_json() {
        let (p, _rx) = pipeline(100);
        for ct in [None, Some("text/plain"), Some("application/x-www-form-urlencoded")] {
            let err = p.ingest("c", ct, body(valid("good"))).await.expect_err("bad content type");
            assert!(matches!(err, VitalsError::UnsupportedContentType));
        }
        let ok = p.ingest("c", Some("application/json; charset=utf-8"), body(valid("good"))).await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn malformed_json_is_internal() {
        let (p, _rx) = pipeline(100);
        let err = p.ingest("c", JSON, raw(b"{\"name\":")).await.expect_err("parse");
        assert!(matches!(err, VitalsError::Internal(_)));

        let err = p.ingest("c", JSON, raw(b"null")).await.expect_err("not an object");
        assert!(matches!(err, VitalsError::Internal(_)));
    }

    #[tokio::test]
    async fn body_read_failure_is_internal() {
        let (p, _rx) = pipeline(100);
        let failing = ready(Err::<Bytes, _>("length limit exceeded"));
        let err = p.ingest("c", JSON, failing).await.expect_err("read failure");
        assert!(matches!(err, VitalsError::Internal(_)));
    }

    #[tokio::test]
    async fn loosely_typed_payloads_are_accepted() {
        let (p, mut rx) = pipeline(100);
        for payload in [
            json!({ "name": "LCP", "value": 1, "id": 123, "url": "/" }),
            json!({ "name": "CLS", "value": "0.1", "id": "x", "url": "/" }),
            json!({ "name": "FCP", "value": 1, "id": "x", "url": "/", "rating": 3 }),
            json!({ "name": "TTFB", "value": 1, "id": "x", "url": "/", "libraryVersion": 7 }),
        ] {
            assert!(p.ingest("c", JSON, body(payload)).await.is_ok());
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn null_value_is_rendered_in_the_report() {
        let (p, mut rx) = pipeline(100);
        let payload = json!({ "name": "INP", "value": null, "id": "x", "url": "/", "rating": "poor" });
        assert_eq!(p.ingest("c", JSON, body(payload)).await.expect("accepted"), MetricName::Inp);

        let report = rx.try_recv().expect("one report");
        assert_eq!(report.message, "Poor INP performance: null");
        assert_eq!(report.context["value"], Value::Null);
    }

    #[tokio::test]
    async fn poor_rating_escalates_once() {
        let (p, mut rx) = pipeline(100);
        let processed = p.ingest("c", JSON, body(valid("poor"))).await.expect("accepted");
        assert_eq!(processed, MetricName::Lcp);

        let report = rx.try_recv().expect("one report");
        assert_eq!(report.message, "Poor LCP performance: 4200.5");
        assert_eq!(report.context["component"], json!("web-vitals"));
        assert_eq!(report.context["metric"], json!("LCP"));
        assert_eq!(report.context["value"], json!(4200.5));
        assert_eq!(report.context["url"], json!("https://docs.example.com/"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn good_rating_does_not_escalate() {
        let (p, mut rx) = pipeline(100);
        for rating in ["good", "needs-improvement"] {
            let processed = p.ingest("c", JSON, body(valid(rating))).await.expect("accepted");
            assert_eq!(processed, MetricName::Lcp);
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn escalation_failure_does_not_affect_acceptance() {
        let (p, rx) = pipeline(100);
        drop(rx);
        assert!(p.ingest("c", JSON, body(valid("poor"))).await.is_ok());
    }

    #[tokio::test]
    async fn repeated_submissions_are_not_deduplicated() {
        let (p, _rx) = pipeline(100);
        assert!(p.ingest("c", JSON, body(valid("good"))).await.is_ok());
        assert!(p.ingest("c", JSON, body(valid("good"))).await.is_ok());
        assert_eq!(p.limiter().entry("c").map(|e| e.count), Some(2));
    }

    #[tokio::test]
    async fn rate_limit_is_checked_before_validation() {
        let (p, _rx) = pipeline(1);
        // invalid submissions still use up the allowance
        assert!(matches!(
            p.ingest("c", None, raw(b"")).await,
            Err(VitalsError::UnsupportedContentType)
        ));
        assert!(matches!(
            p.ingest("c", JSON, body(valid("good"))).await,
            Err(VitalsError::RateLimited)
        ));
        assert!(p.ingest("other", JSON, body(valid("good"))).await.is_ok());
    }
}
