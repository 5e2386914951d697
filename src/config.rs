use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::extractor::{DEFAULT_MARKER, DEFAULT_SHEET_NAME, PriceSeriesLayout};
use crate::rates::{CurrencyPair, DEFAULT_FALLBACK_RATE, FixedRates, RateLookup};
use crate::window::TimeWindow;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartSettings {
    pub width: u32,
    pub height: u32,
}

impl Default for ChartSettings {
    fn default() -> Self {
        ChartSettings {
            width: 1000,
            height: 500,
        }
    }
}

/// Dashboard settings. Every field has a default, so an empty JSON object
/// (or no file at all) is a valid configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Directory of baseline `.xlsx` files read on every pass.
    pub data_dir: PathBuf,
    pub sheet_name: String,
    pub marker: String,
    pub window: TimeWindow,
    pub chart: ChartSettings,
    /// EUR/USD rate to quote. When unset the fallback rate is shown.
    pub eur_usd: Option<f64>,
    pub fallback_rate: f64,
    pub rate_ttl_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            data_dir: PathBuf::from("data"),
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            marker: DEFAULT_MARKER.to_string(),
            window: TimeWindow::default(),
            chart: ChartSettings::default(),
            eur_usd: None,
            fallback_rate: DEFAULT_FALLBACK_RATE,
            rate_ttl_secs: 3600,
        }
    }
}

impl DashboardConfig {
    /// Load a JSON configuration file.
    ///
    /// # Examples
    /// ```no_run
    /// use price_dashboard::config::DashboardConfig;
    ///
    /// let config = DashboardConfig::load("dashboard.json").unwrap_or_default();
    /// println!("reading baseline files from {}", config.data_dir.display());
    /// ```
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn layout(&self) -> PriceSeriesLayout {
        PriceSeriesLayout::new(self.sheet_name.clone(), self.marker.clone())
    }

    pub fn rate_ttl(&self) -> Duration {
        Duration::from_secs(self.rate_ttl_secs)
    }

    /// Rate lookup for `pair` backed by the configured rate, if any, with the
    /// configured TTL and fallback.
    pub fn rate_lookup(&self, pair: &CurrencyPair) -> RateLookup<FixedRates> {
        let source = match self.eur_usd {
            Some(rate) => FixedRates::new().with_rate(pair.clone(), rate, None),
            None => FixedRates::new(),
        };
        RateLookup::new(source, self.rate_ttl(), self.fallback_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::SeriesExtractor;
    use crate::rates::{ExchangeRate, Quote};
    use std::io::Write;

    #[test]
    fn empty_object_is_all_defaults() {
        let config: DashboardConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, DashboardConfig::default());
        assert_eq!(config.layout().sheet_name(), "Price Series");
        assert_eq!(config.rate_ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn partial_override() {
        let config: DashboardConfig = serde_json::from_str(
            r#"{ "data_dir": "/srv/kallanish", "window": "3m", "chart": { "width": 640 } }"#,
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/kallanish"));
        assert_eq!(config.window, TimeWindow::Months(3));
        assert_eq!(config.chart.width, 640);
        assert_eq!(config.chart.height, 500);
        assert_eq!(config.marker, "Dates");
    }

    #[test]
    fn load_reports_path_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboard.json");

        let missing = DashboardConfig::load(&path).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));

        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(br#"{ "window": "fortnight" }"#).unwrap();
        let invalid = DashboardConfig::load(&path).unwrap_err();
        assert!(matches!(invalid, ConfigError::Parse { .. }));
        assert!(invalid.to_string().contains("dashboard.json"));
    }

    #[test]
    fn configured_rate_is_quoted() {
        let config: DashboardConfig =
            serde_json::from_str(r#"{ "eur_usd": 1.0842, "rate_ttl_secs": 60 }"#).unwrap();
        let pair = CurrencyPair::eur_usd();
        let mut rates = config.rate_lookup(&pair);

        let quote = rates.quote(&pair);
        assert_eq!(quote, Quote::Live(ExchangeRate { rate: 1.0842, as_of: None }));

        let fallback = DashboardConfig::default().rate_lookup(&pair).quote(&pair);
        assert_eq!(fallback, Quote::Fallback(1.10));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboard.json");
        std::fs::write(&path, r#"{ "sheet_name": "Prices", "fallback_rate": 1.05 }"#).unwrap();

        let config = DashboardConfig::load(&path).unwrap();
        assert_eq!(config.sheet_name, "Prices");
        assert_eq!(config.fallback_rate, 1.05);
        assert_eq!(config.eur_usd, None);
    }
}
