//! # Station Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TALLY_STATION_ID=st-2                                              │
//! │     TALLY_STORE_ID=store-001                                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/tally-station/station.toml (Linux)                       │
//! │     ~/Library/Application Support/com.tally.station/station.toml       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [station]
//! id = "st-2"
//! name = "Bar"
//! is_main = false
//!
//! [store]
//! id = "store-001"
//! merchant_id = "m-77"
//! name = "Downtown"
//!
//! [ledger]
//! max_order_items = 99
//! order_total_ceiling_cents = 100000000
//! group_gratuity_tax_bps = 0
//! group_gratuities = [
//!     { number = 6, percent_bps = 1800 },
//!     { number = 10, percent_bps = 2000 },
//! ]
//!
//! [locking]
//! reconcile_interval_secs = 30
//! release_on_start = true
//! release_on_shutdown = true
//!
//! [database]
//! url = "sqlite://tally.db"
//! max_connections = 5
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tally_core::context::{StationRef, StoreRef};
use tally_core::model::{GroupGratuity, OrderLimits};
use tally_core::money::{Money, Percent};
use tally_core::{DEFAULT_ORDER_TOTAL_CEILING, MAX_ORDER_ITEMS};
use tracing::{debug, info, warn};

use crate::error::{StationError, StationResult};

// =============================================================================
// Station / Store
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationSettings {
    pub id: String,

    #[serde(default = "default_station_name")]
    pub name: String,

    /// The main station clears every lock of the store when it starts;
    /// other stations clear only their own.
    #[serde(default)]
    pub is_main: bool,
}

fn default_station_name() -> String {
    "Station".to_string()
}

impl Default for StationSettings {
    fn default() -> Self {
        StationSettings {
            id: "station-1".to_string(),
            name: default_station_name(),
            is_main: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    pub id: String,

    #[serde(default)]
    pub merchant_id: String,

    #[serde(default)]
    pub name: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            id: "default-store".to_string(),
            merchant_id: String::new(),
            name: "Default Store".to_string(),
        }
    }
}

// =============================================================================
// Ledger Settings
// =============================================================================

/// One party-size service fee tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GratuityTier {
    /// Minimum guests for the tier.
    pub number: u32,
    /// Rate in basis points (1800 = 18%).
    pub percent_bps: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// Most lines an order may hold.
    /// Default: 99
    #[serde(default = "default_max_order_items")]
    pub max_order_items: usize,

    /// An order whose total reaches this stops taking items.
    /// Default: $1,000,000.00
    #[serde(default = "default_order_total_ceiling")]
    pub order_total_ceiling_cents: i64,

    #[serde(default)]
    pub group_gratuities: Vec<GratuityTier>,

    /// Tax on the group gratuity, basis points.
    #[serde(default)]
    pub group_gratuity_tax_bps: u32,
}

fn default_max_order_items() -> usize {
    MAX_ORDER_ITEMS
}

fn default_order_total_ceiling() -> i64 {
    DEFAULT_ORDER_TOTAL_CEILING.cents()
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            max_order_items: default_max_order_items(),
            order_total_ceiling_cents: default_order_total_ceiling(),
            group_gratuities: Vec::new(),
            group_gratuity_tax_bps: 0,
        }
    }
}

impl LedgerSettings {
    pub fn limits(&self) -> OrderLimits {
        OrderLimits {
            max_items: self.max_order_items,
            total_ceiling: Money::from_cents(self.order_total_ceiling_cents),
        }
    }

    pub fn group_gratuities(&self) -> Vec<GroupGratuity> {
        self.group_gratuities
            .iter()
            .map(|tier| GroupGratuity {
                number: tier.number,
                percent: Percent::from_bps(tier.percent_bps),
            })
            .collect()
    }

    pub fn group_gratuity_tax(&self) -> Percent {
        Percent::from_bps(self.group_gratuity_tax_bps)
    }
}

// =============================================================================
// Locking / Database
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockingSettings {
    /// Seconds between reconcile passes.
    /// Default: 30
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,

    /// Clear stale locks when the reconciler starts.
    #[serde(default = "default_true")]
    pub release_on_start: bool,

    /// Drop this station's locks when the reconciler stops.
    #[serde(default = "default_true")]
    pub release_on_shutdown: bool,
}

fn default_reconcile_interval() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for LockingSettings {
    fn default() -> Self {
        LockingSettings {
            reconcile_interval_secs: default_reconcile_interval(),
            release_on_start: true,
            release_on_shutdown: true,
        }
    }
}

impl LockingSettings {
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url() -> String {
    "sqlite://tally.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Main Station Configuration
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationConfig {
    #[serde(default)]
    pub station: StationSettings,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub ledger: LedgerSettings,

    #[serde(default)]
    pub locking: LockingSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl StationConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (station.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> StationResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading station config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load station config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> StationResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| StationError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Station config saved");
        Ok(())
    }

    pub fn validate(&self) -> StationResult<()> {
        if self.station.id.is_empty() {
            return Err(StationError::InvalidConfig("station.id must be set".into()));
        }
        if self.store.id.is_empty() {
            return Err(StationError::InvalidConfig("store.id must be set".into()));
        }
        if self.locking.reconcile_interval_secs == 0 {
            return Err(StationError::InvalidConfig(
                "reconcile_interval_secs must be at least 1".into(),
            ));
        }
        if self.ledger.order_total_ceiling_cents <= 0 {
            return Err(StationError::InvalidConfig(
                "order_total_ceiling_cents must be greater than 0".into(),
            ));
        }
        if self.ledger.max_order_items == 0 || self.ledger.max_order_items > MAX_ORDER_ITEMS {
            return Err(StationError::InvalidConfig(format!(
                "max_order_items must be between 1 and {MAX_ORDER_ITEMS}"
            )));
        }
        if self.database.max_connections == 0 {
            return Err(StationError::InvalidConfig(
                "max_connections must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("TALLY_STATION_ID") {
            debug!(station_id = %id, "Overriding station ID from environment");
            self.station.id = id;
        }

        if let Ok(name) = std::env::var("TALLY_STATION_NAME") {
            self.station.name = name;
        }

        if let Ok(id) = std::env::var("TALLY_STORE_ID") {
            debug!(store_id = %id, "Overriding store ID from environment");
            self.store.id = id;
        }

        if let Ok(main) = std::env::var("TALLY_MAIN_STATION") {
            match main.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.station.is_main = true,
                "0" | "false" | "no" => self.station.is_main = false,
                _ => warn!(value = %main, "Unknown TALLY_MAIN_STATION value"),
            }
        }

        if let Ok(url) = std::env::var("TALLY_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(secs) = std::env::var("TALLY_RECONCILE_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                debug!(secs, "Overriding reconcile interval from environment");
                self.locking.reconcile_interval_secs = secs;
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tally", "station")
            .map(|dirs| dirs.config_dir().join("station.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn station_ref(&self) -> StationRef {
        StationRef::new(&self.station.id, &self.station.name)
    }

    pub fn store_ref(&self) -> StoreRef {
        StoreRef {
            id: self.store.id.clone(),
            merchant_id: self.store.merchant_id.clone(),
            name: self.store.name.clone(),
        }
    }
}
