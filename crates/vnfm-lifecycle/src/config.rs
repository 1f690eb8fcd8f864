//! Orchestrator configuration.
//!
//! Loaded from the process environment with strict validation. Every key is
//! optional; absent keys take the defaults below.
//!
//! | Key | Default |
//! |-----|---------|
//! | `VNFM_INFRA_DRIVERS` | `noop` |
//! | `VNFM_MGMT_DRIVERS` | `noop` |
//! | `VNFM_BOOT_WAIT_SECS` | `30` |
//! | `VNFM_EXECUTOR_POOL_SIZE` | `1000` |
//! | `VNFM_MONITOR_CHECK_INTERVAL_SECS` | `10` |
//! | `VNFM_LOG_FORMAT` | `pretty` |

use std::time::Duration;

use vnfm_core::LogFormat;

use crate::error::{Error, Result};

const ENV_INFRA_DRIVERS: &str = "VNFM_INFRA_DRIVERS";
const ENV_MGMT_DRIVERS: &str = "VNFM_MGMT_DRIVERS";
const ENV_BOOT_WAIT_SECS: &str = "VNFM_BOOT_WAIT_SECS";
const ENV_EXECUTOR_POOL_SIZE: &str = "VNFM_EXECUTOR_POOL_SIZE";
const ENV_MONITOR_CHECK_INTERVAL_SECS: &str = "VNFM_MONITOR_CHECK_INTERVAL_SECS";
const ENV_LOG_FORMAT: &str = "VNFM_LOG_FORMAT";

const DEFAULT_DRIVER: &str = "noop";
const DEFAULT_BOOT_WAIT_SECS: u64 = 30;
const DEFAULT_EXECUTOR_POOL_SIZE: u64 = 1000;
const DEFAULT_MONITOR_CHECK_INTERVAL_SECS: u64 = 10;

/// Configuration consumed by [`VnfmOrchestrator`](crate::orchestrator::VnfmOrchestrator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VnfmConfig {
    /// Enabled infrastructure driver names.
    pub infra_drivers: Vec<String>,
    /// Enabled management driver names.
    pub mgmt_drivers: Vec<String>,
    /// Delay before re-applying post-boot configuration.
    pub boot_wait: Duration,
    /// Maximum number of concurrently running continuations.
    pub executor_pool_size: usize,
    /// Health monitor tick interval.
    pub monitor_check_interval: Duration,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for VnfmConfig {
    fn default() -> Self {
        Self {
            infra_drivers: vec![DEFAULT_DRIVER.to_string()],
            mgmt_drivers: vec![DEFAULT_DRIVER.to_string()],
            boot_wait: Duration::from_secs(DEFAULT_BOOT_WAIT_SECS),
            executor_pool_size: usize::try_from(DEFAULT_EXECUTOR_POOL_SIZE).unwrap_or(1000),
            monitor_check_interval: Duration::from_secs(DEFAULT_MONITOR_CHECK_INTERVAL_SECS),
            log_format: LogFormat::default(),
        }
    }
}

impl VnfmConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a value is malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Loads configuration with a custom key lookup.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a driver list is empty, a count or
    /// interval is not a positive integer, or the log format is unknown.
    pub fn from_env_with<F>(get_env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let infra_drivers =
            parse_list_env(&get_env, ENV_INFRA_DRIVERS)?.unwrap_or(defaults.infra_drivers);
        let mgmt_drivers =
            parse_list_env(&get_env, ENV_MGMT_DRIVERS)?.unwrap_or(defaults.mgmt_drivers);

        let boot_wait_secs = match get_env(ENV_BOOT_WAIT_SECS) {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                Error::configuration(format!(
                    "{ENV_BOOT_WAIT_SECS} must be a non-negative integer, got '{raw}'"
                ))
            })?,
            None => DEFAULT_BOOT_WAIT_SECS,
        };

        let pool_size =
            parse_positive_u64_env(&get_env, ENV_EXECUTOR_POOL_SIZE, DEFAULT_EXECUTOR_POOL_SIZE)?;
        let executor_pool_size = usize::try_from(pool_size).map_err(|_| {
            Error::configuration(format!(
                "{ENV_EXECUTOR_POOL_SIZE} value {pool_size} exceeds supported range"
            ))
        })?;

        let check_interval_secs = parse_positive_u64_env(
            &get_env,
            ENV_MONITOR_CHECK_INTERVAL_SECS,
            DEFAULT_MONITOR_CHECK_INTERVAL_SECS,
        )?;

        let log_format = match get_env(ENV_LOG_FORMAT) {
            Some(raw) => raw.trim().parse::<LogFormat>()?,
            None => defaults.log_format,
        };

        Ok(Self {
            infra_drivers,
            mgmt_drivers,
            boot_wait: Duration::from_secs(boot_wait_secs),
            executor_pool_size,
            monitor_check_interval: Duration::from_secs(check_interval_secs),
            log_format,
        })
    }

    /// Sets the enabled infrastructure drivers.
    #[must_use]
    pub fn with_infra_drivers<I, S>(mut self, drivers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.infra_drivers = drivers.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the enabled management drivers.
    #[must_use]
    pub fn with_mgmt_drivers<I, S>(mut self, drivers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mgmt_drivers = drivers.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the boot wait.
    #[must_use]
    pub const fn with_boot_wait(mut self, boot_wait: Duration) -> Self {
        self.boot_wait = boot_wait;
        self
    }

    /// Sets the executor pool size.
    #[must_use]
    pub const fn with_executor_pool_size(mut self, size: usize) -> Self {
        self.executor_pool_size = size;
        self
    }

    /// Sets the health monitor tick interval.
    #[must_use]
    pub const fn with_monitor_check_interval(mut self, interval: Duration) -> Self {
        self.monitor_check_interval = interval;
        self
    }

    /// Sets the log output format.
    #[must_use]
    pub const fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Installs the global subscriber in the configured format.
    ///
    /// Only the first call in a process has an effect.
    pub fn init_logging(&self) {
        vnfm_core::init_logging(self.log_format);
        tracing::debug!(format = ?self.log_format, "logging initialized");
    }
}

fn parse_list_env<F>(get_env: &F, key: &str) -> Result<Option<Vec<String>>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = get_env(key) else {
        return Ok(None);
    };
    let names: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ToString::to_string)
        .collect();
    if names.is_empty() {
        return Err(Error::configuration(format!(
            "{key} must list at least one driver name"
        )));
    }
    Ok(Some(names))
}

fn parse_positive_u64_env<F>(get_env: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = get_env(key) else {
        return Ok(default);
    };

    let parsed = raw.trim().parse::<u64>().map_err(|_| {
        Error::configuration(format!("{key} must be a positive integer, got '{raw}'"))
    })?;
    if parsed == 0 {
        return Err(Error::configuration(format!(
            "{key} must be greater than zero"
        )));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() -> Result<()> {
        let config = VnfmConfig::from_env_with(|_| None)?;
        assert_eq!(config, VnfmConfig::default());
        assert_eq!(config.infra_drivers, vec!["noop"]);
        assert_eq!(config.boot_wait, Duration::from_secs(30));
        assert_eq!(config.executor_pool_size, 1000);
        Ok(())
    }

    #[test]
    fn reads_all_keys() -> Result<()> {
        let config = VnfmConfig::from_env_with(lookup(&[
            ("VNFM_INFRA_DRIVERS", "heat, openstack"),
            ("VNFM_MGMT_DRIVERS", "openwrt"),
            ("VNFM_BOOT_WAIT_SECS", "0"),
            ("VNFM_EXECUTOR_POOL_SIZE", "8"),
            ("VNFM_MONITOR_CHECK_INTERVAL_SECS", "5"),
            ("VNFM_LOG_FORMAT", "json"),
        ]))?;
        assert_eq!(config.infra_drivers, vec!["heat", "openstack"]);
        assert_eq!(config.mgmt_drivers, vec!["openwrt"]);
        assert_eq!(config.boot_wait, Duration::ZERO);
        assert_eq!(config.executor_pool_size, 8);
        assert_eq!(config.monitor_check_interval, Duration::from_secs(5));
        assert_eq!(config.log_format, LogFormat::Json);
        Ok(())
    }

    #[test]
    fn logging_init_is_repeatable() -> Result<()> {
        let config =
            VnfmConfig::from_env_with(lookup(&[("VNFM_LOG_FORMAT", "json")]))?;
        config.init_logging();
        config.with_log_format(LogFormat::Pretty).init_logging();
        Ok(())
    }

    #[test]
    fn rejects_malformed_values() {
        for pairs in [
            [("VNFM_EXECUTOR_POOL_SIZE", "0")],
            [("VNFM_EXECUTOR_POOL_SIZE", "lots")],
            [("VNFM_MONITOR_CHECK_INTERVAL_SECS", "-1")],
            [("VNFM_BOOT_WAIT_SECS", "soon")],
            [("VNFM_INFRA_DRIVERS", " , ")],
            [("VNFM_LOG_FORMAT", "xml")],
        ] {
            let err = VnfmConfig::from_env_with(lookup(&pairs)).unwrap_err();
            assert!(
                matches!(err, Error::Configuration { .. } | Error::Core(_)),
                "unexpected error for {pairs:?}: {err}"
            );
        }
    }
}
