use clap::Parser;
use std::time::Duration;

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "vitals-gateway")]
#[command(about = "Web Vitals ingestion endpoint with per-client rate limiting")]
pub struct Args {
    /// Port to run the server on
    #[arg(short, long, env = "VITALS_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Max admitted submissions per client per window
    #[arg(long, env = "VITALS_RATE_LIMIT", default_value_t = 100,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub rate_limit: u32,

    /// Rate limit window in seconds
    #[arg(long, env = "VITALS_RATE_WINDOW", default_value_t = 3600)]
    pub rate_window: u64,

    /// How often expired rate limit entries are swept, in seconds
    #[arg(long, env = "VITALS_SWEEP_INTERVAL", default_value_t = 300,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub sweep_interval: u64,

    /// Largest request body accepted, in bytes
    #[arg(long, env = "VITALS_MAX_BODY_BYTES", default_value_t = 64 * 1024)]
    pub max_body_bytes: usize,

    /// Take the client id from X-Forwarded-For (only behind a trusted proxy)
    #[arg(long, env = "VITALS_TRUST_FORWARDED_FOR", default_value_t = false)]
    pub trust_forwarded_for: bool,

    /// Sentry DSN, e.g. "https://<key>@o0.ingest.sentry.io/<project>"
    #[arg(long, env = "SENTRY_DSN")]
    pub sentry_dsn: Option<String>,

    /// Deployment environment; Sentry delivery only happens in "production"
    #[arg(long, env = "VITALS_ENV", default_value = "production")]
    pub environment: String,

    /// Version tag attached to forwarded error reports
    #[arg(long, env = "VITALS_APP_VERSION", default_value = env!("CARGO_PKG_VERSION"))]
    pub app_version: String,

    /// Capacity of the error report queue
    #[arg(long, env = "VITALS_REPORT_QUEUE", default_value_t = 256)]
    pub report_queue: usize,

    /// Default log filter, overridden by RUST_LOG
    #[arg(long, env = "VITALS_LOG", default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval)
    }

    // Sentry is only used when a DSN is set and we run in production
    pub fn sentry_enabled(&self) -> bool {
        self.environment == "production" && self.sentry_dsn.as_deref().is_some_and(|d| !d.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_limits() {
        let args = Args::try_parse_from(["vitals-gateway"]).expect("defaults parse");
        assert_eq!(args.port, 8080);
        assert_eq!(args.rate_limit, 100);
        assert_eq!(args.rate_window(), Duration::from_secs(3600));
        assert_eq!(args.sweep_interval(), Duration::from_secs(300));
        assert_eq!(args.environment, "production");
        assert!(!args.trust_forwarded_for);
    }

    #[test]
    fn zero_rate_limit_is_rejected() {
        assert!(Args::try_parse_from(["vitals-gateway", "--rate-limit", "0"]).is_err());
    }

    #[test]
    fn sentry_requires_dsn_and_production() {
        let dsn = "https://key@sentry.example.com/42";
        let prod = Args::try_parse_from(["vitals-gateway", "--sentry-dsn", dsn]).expect("parse");
        assert!(prod.sentry_enabled());

        let dev = Args::try_parse_from([
            "vitals-gateway",
            "--sentry-dsn",
            dsn,
            "--environment",
            "development",
        ])
        .expect("parse");
        assert!(!dev.sentry_enabled());

        let no_dsn = Args::try_parse_from(["vitals-gateway"]).expect("parse");
        assert!(!no_dsn.sentry_enabled());
    }
}
