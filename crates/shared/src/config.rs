//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Financing engine configuration.
    pub financing: FinancingConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How the template's `down_payment_percentage` is applied when opening an agreement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownPaymentPolicy {
    /// The percentage is only surfaced as a recommendation.
    #[default]
    Advisory,
    /// Down payments below the recommended minimum are rejected.
    Enforced,
}

/// Financing engine configuration.
///
/// The grace period and default threshold have no built-in values; they must
/// come from a config file or the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct FinancingConfig {
    /// Days an overdue installment may stay unpaid before it defaults.
    pub grace_period_days: u32,
    /// Number of defaulted installments that puts the whole agreement in default.
    pub default_threshold: u32,
    /// Enforcement of the template's down payment percentage.
    #[serde(default)]
    pub down_payment_policy: DownPaymentPolicy,
    /// Decimal places money amounts are rounded to.
    #[serde(default = "default_money_scale")]
    pub money_scale: u32,
}

fn default_money_scale() -> u32 {
    2
}

impl FinancingConfig {
    /// Creates a configuration with advisory down payments and a two decimal money scale.
    #[must_use]
    pub fn new(grace_period_days: u32, default_threshold: u32) -> Self {
        Self {
            grace_period_days,
            default_threshold,
            down_payment_policy: DownPaymentPolicy::default(),
            money_scale: default_money_scale(),
        }
    }

    /// Sets the down payment policy.
    #[must_use]
    pub fn with_down_payment_policy(mut self, policy: DownPaymentPolicy) -> Self {
        self.down_payment_policy = policy;
        self
    }

    /// Checks values that deserialization alone cannot reject.
    ///
    /// # Errors
    ///
    /// Returns an error if the default threshold is zero or the money scale
    /// exceeds what `rust_decimal` can represent.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.default_threshold == 0 {
            return Err(config::ConfigError::Message(
                "financing.default_threshold must be at least 1".to_string(),
            ));
        }
        if self.money_scale > 10 {
            return Err(config::ConfigError::Message(
                "financing.money_scale must be at most 10".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_filter() -> String {
    "medfin=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, later ones overriding earlier ones:
    /// `config/default`, `config/{RUN_MODE}`, then `MEDFIN__*` variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("MEDFIN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app: Self = config.try_deserialize()?;
        app.financing.validate()?;
        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn with_required_env<F: FnOnce()>(extra: &[(&str, Option<&str>)], f: F) {
        let mut vars = vec![
            ("MEDFIN__FINANCING__GRACE_PERIOD_DAYS", Some("15")),
            ("MEDFIN__FINANCING__DEFAULT_THRESHOLD", Some("2")),
            ("RUN_MODE", Some("test-nonexistent")),
        ];
        vars.extend_from_slice(extra);
        temp_env::with_vars(vars, f);
    }

    #[test]
    fn test_load_reads_financing_from_environment() {
        with_required_env(&[], || {
            let config = AppConfig::load().unwrap();
            assert_eq!(config.financing.grace_period_days, 15);
            assert_eq!(config.financing.default_threshold, 2);
            assert_eq!(
                config.financing.down_payment_policy,
                DownPaymentPolicy::Advisory
            );
            assert_eq!(config.financing.money_scale, 2);
            assert_eq!(config.logging.filter, "medfin=info");
            assert!(!config.logging.json);
        });
    }

    #[rstest]
    #[case("advisory", DownPaymentPolicy::Advisory)]
    #[case("enforced", DownPaymentPolicy::Enforced)]
    fn test_load_parses_down_payment_policy(
        #[case] raw: &str,
        #[case] expected: DownPaymentPolicy,
    ) {
        with_required_env(
            &[("MEDFIN__FINANCING__DOWN_PAYMENT_POLICY", Some(raw))],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.financing.down_payment_policy, expected);
            },
        );
    }

    #[test]
    fn test_load_fails_without_grace_period() {
        temp_env::with_vars(
            [
                ("MEDFIN__FINANCING__GRACE_PERIOD_DAYS", None),
                ("MEDFIN__FINANCING__DEFAULT_THRESHOLD", Some("2")),
                ("RUN_MODE", Some("test-nonexistent")),
            ],
            || {
                assert!(AppConfig::load().is_err());
            },
        );
    }

    #[test]
    fn test_load_rejects_zero_threshold() {
        with_required_env(
            &[("MEDFIN__FINANCING__DEFAULT_THRESHOLD", Some("0"))],
            || {
                let err = AppConfig::load().unwrap_err();
                assert!(err.to_string().contains("default_threshold"));
            },
        );
    }

    #[test]
    fn test_financing_config_builder() {
        let config = FinancingConfig::new(30, 3).with_down_payment_policy(DownPaymentPolicy::Enforced);
        assert_eq!(config.grace_period_days, 30);
        assert_eq!(config.default_threshold, 3);
        assert_eq!(config.down_payment_policy, DownPaymentPolicy::Enforced);
        assert_eq!(config.money_scale, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_money_scale_upper_bound() {
        let mut config = FinancingConfig::new(30, 3);
        config.money_scale = 11;
        assert!(config.validate().is_err());
    }
}
