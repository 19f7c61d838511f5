//! # Pool configuration.
//!
//! Provides [`PoolConfig`] centralized settings for a pool [`Server`](crate::Server).
//!
//! Config is used in two ways:
//! 1. **Pool creation**: `Server::builder(config).build(spawner)`
//! 2. **Worker parameters**: [`PoolConfig::worker_args`] renders the allow-listed
//!    keys as `--key=value` command-line parameters shared by every worker.
//!
//! ## Sentinel values
//! - `rtc_min_port < 1024` → reset to `10000`
//! - `rtc_max_port > 65535` → reset to `59999`
//!
//! ## Loading
//! ```
//! use poolvisor::PoolConfig;
//!
//! let cfg = PoolConfig::from_json(r#"{ "numWorkers": 2, "rtcMinPort": 80 }"#).unwrap();
//! assert_eq!(cfg.num_workers, 2);
//! assert_eq!(cfg.normalized().rtc_min_port, 10000);
//! ```

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::partition::PortRange;

/// Lowest port accepted as `rtc_min_port`.
pub const MIN_RTC_PORT: u32 = 1024;
/// Highest port accepted as `rtc_max_port`.
pub const MAX_RTC_PORT: u32 = 65535;
/// Default lower bound of the RTC port range.
pub const DEFAULT_RTC_MIN_PORT: u32 = 10000;
/// Default upper bound of the RTC port range.
pub const DEFAULT_RTC_MAX_PORT: u32 = 59999;

/// Keys forwarded to workers; anything else stays inside the control plane.
pub const FORWARDED_KEYS: [&str; 7] = [
    "logLevel",
    "rtcListenIPv4",
    "rtcListenIPv6",
    "rtcMinPort",
    "rtcMaxPort",
    "dtlsCertificateFile",
    "dtlsPrivateKeyFile",
];

/// Worker log level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything, including debug output.
    #[default]
    Debug,
    /// Warnings and errors.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    /// Returns the level as passed on the worker command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!(
                "unknown log level '{s}'; valid options: debug, warn, error"
            )),
        }
    }
}

/// Configuration of a worker pool.
///
/// ## Field semantics
/// - `num_workers`: Pool size (defaults to the number of CPU cores; `0` is rejected at build)
/// - `rtc_min_port`/`rtc_max_port`: RTC port range split across workers
/// - `rtc_listen_ipv4`/`rtc_listen_ipv6`: Optional listen addresses forwarded to workers
/// - `dtls_certificate_file`/`dtls_private_key_file`: Optional DTLS material (made absolute)
/// - `log_level`: Worker log level
/// - `bus_capacity`: Pool event bus ring buffer size (min 1)
///
/// Unknown keys in JSON input are ignored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PoolConfig {
    /// Number of workers in the pool.
    pub num_workers: usize,
    /// Lower bound of the RTC port range.
    pub rtc_min_port: u32,
    /// Upper bound of the RTC port range.
    pub rtc_max_port: u32,
    /// IPv4 address workers listen on for RTC traffic.
    #[serde(rename = "rtcListenIPv4")]
    pub rtc_listen_ipv4: Option<Ipv4Addr>,
    /// IPv6 address workers listen on for RTC traffic.
    #[serde(rename = "rtcListenIPv6")]
    pub rtc_listen_ipv6: Option<Ipv6Addr>,
    /// DTLS certificate file.
    pub dtls_certificate_file: Option<PathBuf>,
    /// DTLS private key file.
    pub dtls_private_key_file: Option<PathBuf>,
    /// Worker log level.
    pub log_level: LogLevel,
    /// Capacity of the pool event bus.
    pub bus_capacity: usize,
}

impl PoolConfig {
    /// Parses a configuration from JSON, filling omitted keys with defaults.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Returns a copy with the port bounds reset and file paths made absolute.
    pub fn normalized(&self) -> Self {
        let mut cfg = self.clone();
        if cfg.rtc_min_port < MIN_RTC_PORT {
            cfg.rtc_min_port = DEFAULT_RTC_MIN_PORT;
        }
        if cfg.rtc_max_port > MAX_RTC_PORT {
            cfg.rtc_max_port = DEFAULT_RTC_MAX_PORT;
        }
        cfg.dtls_certificate_file = cfg.dtls_certificate_file.map(absolute);
        cfg.dtls_private_key_file = cfg.dtls_private_key_file.map(absolute);
        cfg
    }

    /// Returns the pool port range.
    ///
    /// Call on a [`normalized`](Self::normalized) config; out-of-range bounds are clamped.
    pub fn port_range(&self) -> PortRange {
        let min = self.rtc_min_port.min(MAX_RTC_PORT) as u16;
        let max = self.rtc_max_port.min(MAX_RTC_PORT) as u16;
        PortRange::new(min, max)
    }

    /// Returns the bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Renders the allow-listed keys as `--key=value` worker parameters.
    ///
    /// Unset optional keys are omitted. Order follows [`FORWARDED_KEYS`].
    pub fn worker_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(FORWARDED_KEYS.len());
        for key in FORWARDED_KEYS {
            if let Some(value) = self.forwarded_value(key) {
                args.push(format!("--{key}={value}"));
            }
        }
        args
    }

    fn forwarded_value(&self, key: &str) -> Option<String> {
        match key {
            "logLevel" => Some(self.log_level.to_string()),
            "rtcListenIPv4" => self.rtc_listen_ipv4.map(|ip| ip.to_string()),
            "rtcListenIPv6" => self.rtc_listen_ipv6.map(|ip| ip.to_string()),
            "rtcMinPort" => Some(self.rtc_min_port.to_string()),
            "rtcMaxPort" => Some(self.rtc_max_port.to_string()),
            "dtlsCertificateFile" => self
                .dtls_certificate_file
                .as_ref()
                .map(|p| p.display().to_string()),
            "dtlsPrivateKeyFile" => self
                .dtls_private_key_file
                .as_ref()
                .map(|p| p.display().to_string()),
            _ => None,
        }
    }
}

impl Default for PoolConfig {
    /// Default configuration:
    ///
    /// - `num_workers` = available CPU cores (1 if unknown)
    /// - `rtc_min_port = 10000`, `rtc_max_port = 59999`
    /// - no listen addresses, no DTLS files
    /// - `log_level = debug`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            num_workers: num_cpus(),
            rtc_min_port: DEFAULT_RTC_MIN_PORT,
            rtc_max_port: DEFAULT_RTC_MAX_PORT,
            rtc_listen_ipv4: None,
            rtc_listen_ipv6: None,
            dtls_certificate_file: None,
            dtls_private_key_file: None,
            log_level: LogLevel::default(),
            bus_capacity: 1024,
        }
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}
