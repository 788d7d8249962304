//! Rollup Configuration
//!
//! Handles loading configuration from:
//! 1. ROLLUP_CONFIG env var (explicit path)
//! 2. ./rollup.toml (current directory)
//! 3. ~/.nft-rollup/rollup.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result, bail};
use rollup_primitives::{BATCH_SIZE, TRIE_CAPACITY};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use std::{env, fs};

/// Global config instance for convenience access
pub static GLOBAL_CONFIG: OnceLock<RollupConfig> = OnceLock::new();

const CONFIG_FILE_NAME: &str = "rollup.toml";
const CONFIG_DIR_NAME: &str = ".nft-rollup";

// ============================================================================
// Default Constants
// ============================================================================

const DEFAULT_MAX_BATCH_AGE_MS: u64 = 2_000;
const DEFAULT_SETUP_SEED: &str = "nft-rollup-devnet";
const DEFAULT_PROVER_LATENCY_MS: u64 = 0;
const DEFAULT_PROVER_TIMEOUT_SECS: u64 = 30;
const DEFAULT_GENESIS_ACCOUNTS: usize = 5;
const DEFAULT_GENESIS_ASSETS: u64 = 5;

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollupConfig {
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub prover: ProverConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub genesis: GenesisConfig,
}

/// Batch sealing policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Seal as soon as this many requests are queued (at most BATCH_SIZE)
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,
    /// Seal a non-empty queue once its oldest request is this old
    #[serde(default = "default_max_batch_age_ms")]
    pub max_batch_age_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_requests: BATCH_SIZE,
            max_batch_age_ms: DEFAULT_MAX_BATCH_AGE_MS,
        }
    }
}

fn default_max_requests() -> usize {
    BATCH_SIZE
}
fn default_max_batch_age_ms() -> u64 {
    DEFAULT_MAX_BATCH_AGE_MS
}

/// Proof oracle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProverConfig {
    /// Seed for the mock trusted setup; prover and verifier must share it
    #[serde(default = "default_setup_seed")]
    pub setup_seed: String,
    /// Artificial proving delay
    #[serde(default)]
    pub simulated_latency_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            setup_seed: DEFAULT_SETUP_SEED.into(),
            simulated_latency_ms: DEFAULT_PROVER_LATENCY_MS,
            timeout_secs: DEFAULT_PROVER_TIMEOUT_SECS,
        }
    }
}

fn default_setup_seed() -> String {
    DEFAULT_SETUP_SEED.into()
}
fn default_timeout_secs() -> u64 {
    DEFAULT_PROVER_TIMEOUT_SECS
}

/// Ledger settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Where to write the RootChanged log (JSON)
    #[serde(default)]
    pub event_log_path: Option<String>,
}

/// Devnet genesis: `accounts` seeded identities, assets 1..=`assets` minted
/// to the first one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisConfig {
    #[serde(default = "default_genesis_accounts")]
    pub accounts: usize,
    #[serde(default = "default_genesis_assets")]
    pub assets: u64,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            accounts: DEFAULT_GENESIS_ACCOUNTS,
            assets: DEFAULT_GENESIS_ASSETS,
        }
    }
}

fn default_genesis_accounts() -> usize {
    DEFAULT_GENESIS_ACCOUNTS
}
fn default_genesis_assets() -> u64 {
    DEFAULT_GENESIS_ASSETS
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Set field from env var if present
fn env_string(key: &str, field: &mut String) {
    if let Ok(v) = env::var(key) {
        *field = v;
    }
}

/// Set Option<String> from env var if present
fn env_option_string(key: &str, field: &mut Option<String>) {
    if let Ok(v) = env::var(key) {
        *field = Some(v);
    }
}

/// Set field from env var if present and parseable
fn env_parse<T: std::str::FromStr>(key: &str, field: &mut T) {
    if let Ok(v) = env::var(key) {
        match v.parse() {
            Ok(parsed) => *field = parsed,
            Err(_) => log::warn!("Ignoring unparseable {}={}", key, v),
        }
    }
}

// ============================================================================
// Implementation
// ============================================================================

impl RollupConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::parse_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::parse_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        // 1. Check ROLLUP_CONFIG env var
        if let Ok(path) = env::var("ROLLUP_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check ./rollup.toml (current directory)
        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        // 3. Check ~/.nft-rollup/rollup.toml
        Self::default_config_path().filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Batch
        env_parse("ROLLUP_BATCH_MAX_REQUESTS", &mut self.batch.max_requests);
        env_parse("ROLLUP_BATCH_MAX_AGE_MS", &mut self.batch.max_batch_age_ms);

        // Prover
        env_string("ROLLUP_PROVER_SEED", &mut self.prover.setup_seed);
        env_parse(
            "ROLLUP_PROVER_LATENCY_MS",
            &mut self.prover.simulated_latency_ms,
        );
        env_parse("ROLLUP_PROVER_TIMEOUT_SECS", &mut self.prover.timeout_secs);

        // Ledger
        env_option_string("ROLLUP_EVENT_LOG", &mut self.ledger.event_log_path);

        // Genesis
        env_parse("ROLLUP_GENESIS_ACCOUNTS", &mut self.genesis.accounts);
        env_parse("ROLLUP_GENESIS_ASSETS", &mut self.genesis.assets);
    }

    /// Reject values the protocol cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.batch.max_requests == 0 || self.batch.max_requests > BATCH_SIZE {
            bail!(
                "batch.max_requests must be in 1..={}, got {}",
                BATCH_SIZE,
                self.batch.max_requests
            );
        }
        if self.batch.max_batch_age_ms == 0 {
            bail!("batch.max_batch_age_ms must be positive");
        }
        if self.prover.timeout_secs == 0 {
            bail!("prover.timeout_secs must be positive");
        }
        if self.genesis.accounts == 0 {
            bail!("genesis.accounts must be at least 1");
        }
        if self.genesis.assets >= TRIE_CAPACITY {
            bail!(
                "genesis.assets must be below {}, got {}",
                TRIE_CAPACITY,
                self.genesis.assets
            );
        }
        Ok(())
    }

    pub fn max_batch_age(&self) -> Duration {
        Duration::from_millis(self.batch.max_batch_age_ms)
    }

    pub fn prover_timeout(&self) -> Duration {
        Duration::from_secs(self.prover.timeout_secs)
    }

    pub fn prover_latency(&self) -> Duration {
        Duration::from_millis(self.prover.simulated_latency_ms)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        let mut sample = Self::default();
        sample.ledger.event_log_path = Some("./rollup-events.json".into());
        toml::to_string_pretty(&sample).unwrap_or_default()
    }

    /// Get the global config instance, initializing it if necessary.
    ///
    /// Falls back to defaults if loading fails.
    pub fn global() -> &'static RollupConfig {
        GLOBAL_CONFIG.get_or_init(|| {
            Self::load().unwrap_or_else(|e| {
                log::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            })
        })
    }

    /// Initialize the global config with a specific instance.
    ///
    /// Returns `Err(config)` if already initialized.
    pub fn set_global(config: RollupConfig) -> Result<(), RollupConfig> {
        GLOBAL_CONFIG.set(config)
    }
}

/// Shorthand for `RollupConfig::global()`.
#[inline]
pub fn global_config() -> &'static RollupConfig {
    RollupConfig::global()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = RollupConfig::default();
        assert_eq!(config.batch.max_requests, BATCH_SIZE);
        assert_eq!(config.prover.setup_seed, DEFAULT_SETUP_SEED);
        assert_eq!(config.genesis.assets, DEFAULT_GENESIS_ASSETS);
        assert!(config.ledger.event_log_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_generate_sample() {
        let sample = RollupConfig::generate_sample();
        assert!(sample.contains("[batch]"));
        assert!(sample.contains("[prover]"));
        assert!(sample.contains("[ledger]"));
        assert!(sample.contains("[genesis]"));
    }

    #[test]
    fn test_parse_sample() {
        let sample = RollupConfig::generate_sample();
        let parsed: RollupConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.batch.max_requests, BATCH_SIZE);
        assert_eq!(
            parsed.ledger.event_log_path.as_deref(),
            Some("./rollup-events.json")
        );
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let parsed: RollupConfig = toml::from_str("[batch]\nmax_requests = 3\n").unwrap();
        assert_eq!(parsed.batch.max_requests, 3);
        assert_eq!(parsed.batch.max_batch_age_ms, DEFAULT_MAX_BATCH_AGE_MS);
        assert_eq!(parsed.prover.timeout_secs, DEFAULT_PROVER_TIMEOUT_SECS);
    }

    #[test]
    fn test_validate_rejects_oversized_batch() {
        let mut config = RollupConfig::default();
        config.batch.max_requests = BATCH_SIZE + 1;
        assert!(config.validate().is_err());
        config.batch.max_requests = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_too_many_assets() {
        let mut config = RollupConfig::default();
        config.genesis.assets = TRIE_CAPACITY;
        assert!(config.validate().is_err());
        config.genesis.assets = TRIE_CAPACITY - 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[prover]\ntimeout_secs = 7\n\n[genesis]\nassets = 12").unwrap();

        let config = RollupConfig::load_from(file.path()).unwrap();
        assert_eq!(config.prover_timeout(), Duration::from_secs(7));
        assert_eq!(config.genesis.assets, 12);
    }

    #[test]
    fn test_load_from_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[batch]\nmax_requests = 99").unwrap();
        assert!(RollupConfig::load_from(file.path()).is_err());
    }

    #[test]
    fn test_global_set_once() {
        let mut config = RollupConfig::default();
        config.genesis.accounts = 7;
        assert!(RollupConfig::set_global(config).is_ok());
        assert_eq!(global_config().genesis.accounts, 7);

        assert!(RollupConfig::set_global(RollupConfig::default()).is_err());
        assert_eq!(RollupConfig::global().genesis.accounts, 7);
    }
}
