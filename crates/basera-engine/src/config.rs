//! # Engine Configuration
//!
//! TOML-backed configuration for payment gateways and OTA channels.
//!
//! ## Configuration File Format
//! ```toml
//! # basera.toml
//! [property]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Basera Boutique Hotel"
//!
//! [khalti]
//! base_url = "https://khalti.com/api/v2"
//! secret_key = "live_secret_key_..."
//! timeout_secs = 30
//!
//! [esewa]
//! base_url = "https://epay.esewa.com.np"
//! product_code = "EPAYTEST"
//! secret_key = "8gBm/:&EnhH.1/q"
//! timeout_secs = 30
//!
//! [[channel]]
//! name = "booking.com"
//! base_url = "https://supply-xml.booking.com"
//! api_key = "..."
//! push_rates = true
//! push_availability = true
//!
//! [reconcile]
//! interval_secs = 300
//! min_age_secs = 600
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Sections
// =============================================================================

/// The property this engine instance serves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyConfig {
    pub id: String,
    pub name: String,
}

/// Khalti gateway settings (ePayment API v2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KhaltiConfig {
    pub base_url: String,
    pub secret_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// eSewa gateway settings (ePay v2, HMAC-signed form post).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsewaConfig {
    pub base_url: String,
    pub product_code: String,
    pub secret_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// One OTA channel connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    /// Include rate updates in push syncs.
    #[serde(default = "default_true")]
    pub push_rates: bool,
    /// Include availability updates in push syncs.
    #[serde(default = "default_true")]
    pub push_availability: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Settings for the stranded-payment reconciliation sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// How often the sweep runs.
    #[serde(default = "default_reconcile_interval")]
    pub interval_secs: u64,

    /// Minimum age before a pending gateway payment is swept. Younger
    /// intents may still be mid-redirect at the guest's browser.
    #[serde(default = "default_reconcile_min_age")]
    pub min_age_secs: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        ReconcileConfig {
            interval_secs: default_reconcile_interval(),
            min_age_secs: default_reconcile_min_age(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_reconcile_interval() -> u64 {
    300
}

fn default_reconcile_min_age() -> u64 {
    600
}

// =============================================================================
// EngineConfig
// =============================================================================

/// Top-level engine configuration.
///
/// Gateways and channels are optional: a property taking only cash and
/// card runs with neither section present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub property: PropertyConfig,

    #[serde(default)]
    pub khalti: Option<KhaltiConfig>,

    #[serde(default)]
    pub esewa: Option<EsewaConfig>,

    #[serde(default, rename = "channel")]
    pub channels: Vec<ChannelConfig>,

    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

impl EngineConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading engine configuration");

        let raw = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&raw)?;
        config.validate()?;

        Ok(config)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(raw: &str) -> EngineResult<Self> {
        let config: EngineConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field constraints.
    fn validate(&self) -> EngineResult<()> {
        if self.property.id.trim().is_empty() {
            return Err(EngineError::InvalidConfig(
                "property.id must not be empty".to_string(),
            ));
        }

        if let Some(khalti) = &self.khalti {
            if khalti.secret_key.trim().is_empty() {
                return Err(EngineError::InvalidConfig(
                    "khalti.secret_key must not be empty".to_string(),
                ));
            }
        }

        if let Some(esewa) = &self.esewa {
            if esewa.secret_key.trim().is_empty() || esewa.product_code.trim().is_empty() {
                return Err(EngineError::InvalidConfig(
                    "esewa.secret_key and esewa.product_code must not be empty".to_string(),
                ));
            }
        }

        for channel in &self.channels {
            if channel.name.trim().is_empty() {
                return Err(EngineError::InvalidConfig(
                    "channel.name must not be empty".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Reconcile sweep interval as a Duration.
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile.interval_secs)
    }

    /// Minimum pending-payment age before the sweep touches it.
    pub fn reconcile_min_age(&self) -> Duration {
        Duration::from_secs(self.reconcile.min_age_secs)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let raw = r#"
            [property]
            id = "prop-1"
            name = "Basera Boutique Hotel"

            [khalti]
            base_url = "https://khalti.com/api/v2"
            secret_key = "test_secret"

            [esewa]
            base_url = "https://rc-epay.esewa.com.np"
            product_code = "EPAYTEST"
            secret_key = "8gBm/:&EnhH.1/q"

            [[channel]]
            name = "booking.com"
            base_url = "https://supply-xml.booking.com"
            api_key = "key-1"

            [[channel]]
            name = "agoda"
            base_url = "https://affiliateapi.agoda.com"
            api_key = "key-2"
            push_rates = false
        "#;

        let config = EngineConfig::from_toml(raw).unwrap();
        assert_eq!(config.property.name, "Basera Boutique Hotel");
        assert!(config.khalti.is_some());
        assert_eq!(config.esewa.as_ref().unwrap().product_code, "EPAYTEST");
        assert_eq!(config.channels.len(), 2);
        assert!(config.channels[0].push_rates);
        assert!(!config.channels[1].push_rates);
        assert_eq!(config.reconcile.interval_secs, 300);
    }

    #[test]
    fn test_minimal_config_cash_only() {
        let raw = r#"
            [property]
            id = "prop-1"
            name = "Cash Only Lodge"
        "#;

        let config = EngineConfig::from_toml(raw).unwrap();
        assert!(config.khalti.is_none());
        assert!(config.esewa.is_none());
        assert!(config.channels.is_empty());
    }

    #[test]
    fn test_empty_secret_rejected() {
        let raw = r#"
            [property]
            id = "prop-1"
            name = "Hotel"

            [khalti]
            base_url = "https://khalti.com/api/v2"
            secret_key = ""
        "#;

        assert!(matches!(
            EngineConfig::from_toml(raw),
            Err(EngineError::InvalidConfig(_))
        ));
    }
}
