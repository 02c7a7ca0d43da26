use async_trait::async_trait;
use reqwest::Url;
use serde_json::{Value, json};
use std::time::Duration;

use crate::error::MonitorError;
use crate::monitor::{ErrorReport, ReportSink};

const SENTRY_VERSION: u8 = 7;
const LIBRARY_TAG: &str = "liquidify";

// Parts of a DSN: https://<public_key>@<host>/<project_id>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentryDsn {
    pub public_key: String,
    pub store_url: Url,
}

impl SentryDsn {
    pub fn parse(dsn: &str) -> Result<Self, MonitorError> {
        let invalid = |why: &str| MonitorError::InvalidDsn(format!("{why}: {dsn}"));

        let url = Url::parse(dsn).map_err(|_| invalid("not a url"))?;

        let public_key = url.username();
        if public_key.is_empty() {
            return Err(invalid("missing public key"));
        }

        let project_id = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| invalid("missing project id"))?;

        let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let store_url = Url::parse(&format!(
            "{}://{}/api/{}/store/",
            url.scheme(),
            authority,
            project_id
        ))
        .map_err(|_| invalid("cannot build store url"))?;

        Ok(Self {
            public_key: public_key.to_string(),
            store_url,
        })
    }

    pub fn auth_header(&self) -> String {
        format!(
            "Sentry sentry_version={}, sentry_key={}",
            SENTRY_VERSION, self.public_key
        )
    }
}

/// Posts reports to a Sentry store endpoint.
pub struct SentrySink {
    client: reqwest::Client,
    dsn: SentryDsn,
    version: String,
}

impl SentrySink {
    pub fn new(dsn: SentryDsn, version: impl Into<String>) -> Result<Self, MonitorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            dsn,
            version: version.into(),
        })
    }

    pub fn event(&self, report: &ErrorReport) -> Value {
        json!({
            "message": report.message,
            "level": "error",
            "platform": "other",
            "timestamp": report.timestamp.to_rfc3339(),
            "exception": {
                "values": [{ "type": "Error", "value": report.message }]
            },
            "extra": report.context,
            "tags": {
                "component": report.component(),
                "library": LIBRARY_TAG,
                "version": self.version,
            },
        })
    }
}

#[async_trait]
impl ReportSink for SentrySink {
    async fn deliver(&self, report: &ErrorReport) -> Result<(), MonitorError> {
        let res = self
            .client
            .post(self.dsn.store_url.clone())
            .header("X-Sentry-Auth", self.dsn.auth_header())
            .json(&self.event(report))
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(MonitorError::Rejected(res.status()));
        }
        Ok(())
    }
}
