// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Engine Configuration
 * File loading (YAML/JSON), env overrides, defaults and validation
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::probes::VendorKind;

/// Immutable engine configuration snapshot. Loaded once at startup; the
/// dynamic scaler mutates only the live worker count, never this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub input_file: String,
    pub output_file: String,
    pub vendor: VendorKind,

    /// Initial worker count.
    pub threads: usize,
    pub min_threads: usize,
    pub max_threads: usize,

    /// Target request rate in requests per second. Zero disables the limiter.
    pub rate_limit: u32,

    /// Per-attempt timeout in seconds.
    pub timeout_secs: u64,

    /// How often the dynamic scaler re-evaluates the worker count.
    pub scale_interval_secs: u64,

    /// Connection pool sizing passed to the HTTP client.
    pub max_idle_conns_per_host: usize,
    pub idle_conn_timeout_secs: u64,

    /// Log every valid credential as it is found.
    pub verbose: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let cpus = num_cpus::get();
        Self {
            input_file: "credentials.txt".to_string(),
            output_file: "valid.txt".to_string(),
            vendor: VendorKind::Fortinet,
            threads: cpus * 100,
            min_threads: cpus * 50,
            max_threads: cpus * 300,
            rate_limit: 5000,
            timeout_secs: 3,
            scale_interval_secs: 10,
            max_idle_conns_per_host: 200,
            idle_conn_timeout_secs: 15,
            verbose: false,
        }
    }
}

impl EngineConfig {
    /// Load a config file, detecting YAML or JSON from the extension,
    /// then apply env overrides and normalize the thread bounds.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        let mut config: EngineConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).context("failed to parse YAML config")?
            }
            Some("json") => {
                serde_json::from_str(&content).context("failed to parse JSON config")?
            }
            other => anyhow::bail!("unsupported config format: {:?}", other),
        };

        config.apply_env_overrides()?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Env vars sit between the config file and CLI flags in precedence.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(input) = std::env::var("GATEPROBE_INPUT") {
            self.input_file = input;
        }
        if let Ok(output) = std::env::var("GATEPROBE_OUTPUT") {
            self.output_file = output;
        }
        if let Ok(threads) = std::env::var("GATEPROBE_THREADS") {
            self.threads = threads.parse().context("invalid GATEPROBE_THREADS")?;
        }
        if let Ok(rate) = std::env::var("GATEPROBE_RATE_LIMIT") {
            self.rate_limit = rate.parse().context("invalid GATEPROBE_RATE_LIMIT")?;
        }
        Ok(())
    }

    /// Clamp thread settings into a viable `min <= threads <= max` window,
    /// mirroring how zeroed fields fall back to CPU-scaled defaults.
    pub fn normalize(&mut self) {
        let cpus = num_cpus::get();

        if self.threads == 0 {
            self.threads = cpus * 100;
        }
        if self.max_threads == 0 {
            self.max_threads = cpus * 300;
        }
        if self.min_threads == 0 {
            self.min_threads = cpus * 50;
        }

        if self.min_threads > self.max_threads {
            self.min_threads = self.max_threads;
        }
        self.threads = self.threads.clamp(self.min_threads, self.max_threads);
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be greater than zero");
        }
        if self.scale_interval_secs == 0 {
            anyhow::bail!("scale_interval_secs must be greater than zero");
        }
        if self.input_file.is_empty() || self.output_file.is_empty() {
            anyhow::bail!("input_file and output_file must be set");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn defaults_satisfy_thread_invariant() {
        let cfg = EngineConfig::default();
        assert!(cfg.min_threads <= cfg.threads);
        assert!(cfg.threads <= cfg.max_threads);
    }

    #[test]
    fn normalize_clamps_threads_into_bounds() {
        let mut cfg = EngineConfig {
            threads: 10_000,
            min_threads: 4,
            max_threads: 64,
            ..Default::default()
        };
        cfg.normalize();
        assert_eq!(cfg.threads, 64);

        let mut cfg = EngineConfig {
            threads: 1,
            min_threads: 8,
            max_threads: 64,
            ..Default::default()
        };
        cfg.normalize();
        assert_eq!(cfg.threads, 8);
    }

    #[test]
    fn normalize_resolves_inverted_bounds() {
        let mut cfg = EngineConfig {
            threads: 16,
            min_threads: 128,
            max_threads: 32,
            ..Default::default()
        };
        cfg.normalize();
        assert_eq!(cfg.min_threads, 32);
        assert!(cfg.threads >= cfg.min_threads && cfg.threads <= cfg.max_threads);
    }

    #[test]
    fn load_yaml_config() -> Result<()> {
        let yaml = r#"
input_file: "combos.txt"
output_file: "hits.txt"
vendor: "cisco"
threads: 32
min_threads: 8
max_threads: 64
rate_limit: 100
timeout_secs: 5
"#;
        let mut file = Builder::new().suffix(".yaml").tempfile()?;
        file.write_all(yaml.as_bytes())?;
        file.flush()?;

        let cfg = EngineConfig::load(file.path())?;
        assert_eq!(cfg.input_file, "combos.txt");
        assert_eq!(cfg.vendor, VendorKind::Cisco);
        assert_eq!(cfg.threads, 32);
        assert_eq!(cfg.timeout(), Duration::from_secs(5));
        Ok(())
    }

    #[test]
    fn load_rejects_unknown_vendor() -> Result<()> {
        let yaml = "vendor: \"frobnicator\"\n";
        let mut file = Builder::new().suffix(".yaml").tempfile()?;
        file.write_all(yaml.as_bytes())?;
        file.flush()?;

        assert!(EngineConfig::load(file.path()).is_err());
        Ok(())
    }

    #[test]
    fn zero_timeout_rejected() {
        let cfg = EngineConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_scale_interval_rejected() {
        let cfg = EngineConfig {
            scale_interval_secs: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
