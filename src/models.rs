use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// Metric names a browser may report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum MetricName {
    #[serde(rename = "CLS")]
    Cls,
    #[serde(rename = "FID")]
    Fid,
    #[serde(rename = "FCP")]
    Fcp,
    #[serde(rename = "LCP")]
    Lcp,
    #[serde(rename = "TTFB")]
    Ttfb,
    #[serde(rename = "INP")]
    Inp,
}

impl MetricName {
    pub const ALL: [MetricName; 6] = [
        MetricName::Cls,
        MetricName::Fid,
        MetricName::Fcp,
        MetricName::Lcp,
        MetricName::Ttfb,
        MetricName::Inp,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricName::Cls => "CLS",
            MetricName::Fid => "FID",
            MetricName::Fcp => "FCP",
            MetricName::Lcp => "LCP",
            MetricName::Ttfb => "TTFB",
            MetricName::Inp => "INP",
        }
    }

    // Exact, case-sensitive match
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Good,
    NeedsImprovement,
    Poor,
    // Anything else a client sends; accepted but never escalated
    Unrecognized,
}

impl Rating {
    pub fn parse(rating: &str) -> Self {
        match rating {
            "good" => Rating::Good,
            "needs-improvement" => Rating::NeedsImprovement,
            "poor" => Rating::Poor,
            _ => Rating::Unrecognized,
        }
    }
}

/// One Web Vitals report as posted by the browser.
///
/// Only `name` is typed strictly. `value`, `id` and `url` are kept as the
/// client sent them, and optional fields of an unexpected type are treated
/// as absent, so a loosely typed payload is still accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct WebVitalMetric {
    pub name: MetricName,
    pub value: Value,
    pub rating: Option<Rating>,
    pub delta: Option<f64>,
    pub id: Value,
    pub url: Value,
    pub user_agent: Option<String>,
    pub timestamp: Option<f64>,
    pub library_version: Option<String>,
}

impl WebVitalMetric {
    pub fn from_fields(name: MetricName, fields: &Map<String, Value>) -> Self {
        let field = |key: &str| fields.get(key).cloned().unwrap_or(Value::Null);
        let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_owned);

        Self {
            name,
            value: field("value"),
            rating: fields.get("rating").and_then(Value::as_str).map(Rating::parse),
            delta: fields.get("delta").and_then(Value::as_f64),
            id: field("id"),
            url: field("url"),
            user_agent: text("userAgent"),
            timestamp: fields.get("timestamp").and_then(Value::as_f64),
            library_version: text("libraryVersion"),
        }
    }

    pub fn is_poor(&self) -> bool {
        self.rating == Some(Rating::Poor)
    }
}

/// Renders a JSON value the way a browser would interpolate it into a
/// string: `null`, bare numbers, unquoted strings.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (_, Some(u), _) => u.to_string(),
            (_, _, Some(f)) => f.to_string(),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => display_value(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

// Success body: { "success": true, "processed": "LCP" }
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct IngestAck {
    pub success: bool,
    pub processed: MetricName,
}

// Failure body: { "error": "..." }
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
}
