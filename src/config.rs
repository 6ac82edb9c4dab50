use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub log_level: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned()),
        }
    }

    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a production Postgres instance")
    }
}

/// `RUST_LOG` wins; otherwise the configured `LOG_LEVEL` carries through.
fn filter_directive(rust_log: Option<String>, default_level: &str) -> String {
    rust_log
        .filter(|directive| !directive.trim().is_empty())
        .unwrap_or_else(|| default_level.to_owned())
}

pub fn init_tracing(default_level: &str) {
    let directive = filter_directive(std::env::var("RUST_LOG").ok(), default_level);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Literal cut-offs used by the hypotheses.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Agent utilization a seat upsell candidate must exceed.
    pub high_utilization: f64,
    /// Quantile used for "top of the distribution" comparisons.
    pub upper_quantile: f64,
    pub min_customer_age_quarters: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            high_utilization: 0.8,
            upper_quantile: 0.75,
            min_customer_age_quarters: 2.0,
        }
    }
}

impl Thresholds {
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let thresholds: Thresholds =
            serde_json::from_str(raw).context("invalid thresholds JSON")?;
        if !(0.0..=1.0).contains(&thresholds.upper_quantile) {
            anyhow::bail!(
                "upper_quantile must be within 0..=1, got {}",
                thresholds.upper_quantile
            );
        }
        Ok(thresholds)
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&raw)
    }

    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_path(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_log_overrides_configured_level() {
        assert_eq!(filter_directive(None, "debug"), "debug");
        assert_eq!(filter_directive(Some("warn".to_owned()), "debug"), "warn");
        assert_eq!(filter_directive(Some("  ".to_owned()), "debug"), "debug");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let thresholds = Thresholds::from_json(r#"{ "high_utilization": 0.9 }"#).unwrap();
        assert_eq!(thresholds.high_utilization, 0.9);
        assert_eq!(thresholds.upper_quantile, 0.75);
        assert_eq!(thresholds.min_customer_age_quarters, 2.0);
    }

    #[test]
    fn rejects_out_of_range_quantile() {
        assert!(Thresholds::from_json(r#"{ "upper_quantile": 1.5 }"#).is_err());
    }

    #[test]
    fn missing_file_is_reported() {
        let err = Thresholds::load(Some(Path::new("/nonexistent/thresholds.json"))).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn database_url_required_only_on_demand() {
        let config = AppConfig {
            database_url: None,
            log_level: "info".to_owned(),
        };
        assert!(config.require_database_url().is_err());

        let config = AppConfig {
            database_url: Some("postgres://localhost/upsell".to_owned()),
            log_level: "debug".to_owned(),
        };
        assert_eq!(
            config.require_database_url().unwrap(),
            "postgres://localhost/upsell"
        );
    }
}
