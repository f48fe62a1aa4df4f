//! # Configuration Module
//!
//! Handles loading, validating and saving configuration from TOML files,
//! and merging command line overrides on top.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::aprs::passcode::passcode;
use crate::aprs::protocol::{APRS_IS_DEFAULT_HOST, APRS_IS_DEFAULT_PORT, NOCALL, RECEIVE_ONLY_PASSCODE};
use crate::error::{BridgeError, Result};

/// Settings file name looked up in each search directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Longest callsign APRS-IS accepts, including SSID
const MAX_CALLSIGN_LEN: usize = 9;

/// Longest geohash tag; a 12 character cell is a few centimetres wide
const MAX_GEOHASH_PRECISION: usize = 12;

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub aprsis: AprsIsConfig,
    #[serde(default)]
    pub influx: InfluxConfig,
    #[serde(default)]
    pub translate: TranslateConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// APRS-IS feed configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AprsIsConfig {
    #[serde(default = "default_callsign")]
    pub callsign: String,

    #[serde(default = "default_aprsis_host")]
    pub host: String,

    #[serde(default = "default_aprsis_port")]
    pub port: u16,

    /// Heartbeat interval in minutes
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Server-side filter, e.g. `r/41.7/-72.7/100`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Explicit passcode; computed from the callsign when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passcode: Option<i32>,
}

/// InfluxDB configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct InfluxConfig {
    #[serde(default = "default_influx_host")]
    pub host: String,

    #[serde(default = "default_influx_port")]
    pub port: u16,

    #[serde(default = "default_influx_user")]
    pub user: String,

    #[serde(default = "default_influx_password")]
    pub password: String,

    #[serde(default = "default_dbname")]
    pub dbname: String,

    /// Share one HTTP client across writes instead of one per packet
    #[serde(default = "default_reuse_client")]
    pub reuse_client: bool,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Line protocol translation configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TranslateConfig {
    #[serde(default = "default_measurement")]
    pub measurement: String,

    /// Characters of the position geohash tag; 0 leaves the tag out
    #[serde(default)]
    pub geohash_precision: usize,
}

/// Log output configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,

    #[serde(default = "default_log_file")]
    pub file: String,

    #[serde(default)]
    pub debug: bool,
}

// Default value functions
fn default_callsign() -> String { NOCALL.to_string() }
fn default_aprsis_host() -> String { APRS_IS_DEFAULT_HOST.to_string() }
fn default_aprsis_port() -> u16 { APRS_IS_DEFAULT_PORT }
fn default_interval() -> u64 { 15 }

fn default_influx_host() -> String { "localhost".to_string() }
fn default_influx_port() -> u16 { 8086 }
fn default_influx_user() -> String { "root".to_string() }
fn default_influx_password() -> String { "root".to_string() }
fn default_dbname() -> String { "mydb".to_string() }
fn default_reuse_client() -> bool { true }
fn default_timeout_ms() -> u64 { 5000 }

fn default_measurement() -> String { "packet".to_string() }

fn default_log_dir() -> String { "./logs".to_string() }
fn default_log_file() -> String { "aprs2influxdb.log".to_string() }

impl Default for AprsIsConfig {
    fn default() -> Self {
        Self {
            callsign: default_callsign(),
            host: default_aprsis_host(),
            port: default_aprsis_port(),
            interval: default_interval(),
            filter: None,
            passcode: None,
        }
    }
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            host: default_influx_host(),
            port: default_influx_port(),
            user: default_influx_user(),
            password: default_influx_password(),
            dbname: default_dbname(),
            reuse_client: default_reuse_client(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            measurement: default_measurement(),
            geohash_precision: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            file: default_log_file(),
            debug: false,
        }
    }
}

impl AprsIsConfig {
    /// Passcode sent at login
    ///
    /// An explicit `passcode` wins. `NOCALL` logs in receive-only; any other
    /// callsign uses its computed passcode.
    pub fn login_passcode(&self) -> i32 {
        if let Some(passcode) = self.passcode {
            return passcode;
        }
        if self.is_nocall() {
            RECEIVE_ONLY_PASSCODE
        } else {
            passcode(&self.callsign) as i32
        }
    }

    /// Whether the callsign is the placeholder APRS-IS ignores
    pub fn is_nocall(&self) -> bool {
        self.callsign
            .split('-')
            .next()
            .is_some_and(|base| base.eq_ignore_ascii_case(NOCALL))
    }
}

/// Command line values that take precedence over the settings file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub dbhost: Option<String>,
    pub dbport: Option<u16>,
    pub dbuser: Option<String>,
    pub dbpassword: Option<String>,
    pub dbname: Option<String>,
    pub callsign: Option<String>,
    pub port: Option<u16>,
    pub interval: Option<u64>,
    pub debug: bool,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use aprs2influxdb::config::Config;
    ///
    /// let config = Config::load("config.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Directories searched for the settings file, in order
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".").join(CONFIG_FILE_NAME)];
        if let Ok(home) = std::env::var("HOME") {
            paths.push(
                PathBuf::from(home)
                    .join(".local/etc/aprs2influxdb")
                    .join(CONFIG_FILE_NAME),
            );
        }
        paths.push(PathBuf::from("/etc/aprs2influxdb").join(CONFIG_FILE_NAME));
        paths
    }

    /// First settings file that exists in the search paths
    pub fn locate() -> Option<PathBuf> {
        Self::search_paths().into_iter().find(|path| path.is_file())
    }

    /// Load the given settings file, or the first one found, or defaults
    ///
    /// # Returns
    ///
    /// * `Result<(Config, Option<PathBuf>)>` - Configuration and the file it
    ///   came from, if any
    ///
    /// # Errors
    ///
    /// Returns error if an explicitly given file cannot be loaded, or if a
    /// located file is invalid.
    pub fn load_or_default(path: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::locate(),
        };

        match path {
            Some(path) => Ok((Self::load(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }

    /// Write the configuration as TOML, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns error if serialization or any file operation fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Apply command line overrides, then re-validate
    ///
    /// # Errors
    ///
    /// Returns error if the merged configuration is invalid.
    pub fn apply_overrides(&mut self, overrides: &Overrides) -> Result<()> {
        if let Some(host) = &overrides.dbhost {
            self.influx.host = host.clone();
        }
        if let Some(port) = overrides.dbport {
            self.influx.port = port;
        }
        if let Some(user) = &overrides.dbuser {
            self.influx.user = user.clone();
        }
        if let Some(password) = &overrides.dbpassword {
            self.influx.password = password.clone();
        }
        if let Some(dbname) = &overrides.dbname {
            self.influx.dbname = dbname.clone();
        }
        if let Some(callsign) = &overrides.callsign {
            self.aprsis.callsign = callsign.clone();
            // A new callsign invalidates a passcode saved for the old one
            self.aprsis.passcode = None;
        }
        if let Some(port) = overrides.port {
            self.aprsis.port = port;
        }
        if let Some(interval) = overrides.interval {
            self.aprsis.interval = interval;
        }
        if overrides.debug {
            self.logging.debug = true;
        }

        self.normalize();
        self.validate()
    }

    fn normalize(&mut self) {
        self.aprsis.callsign = self.aprsis.callsign.trim().to_ascii_uppercase();
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        let callsign = &self.aprsis.callsign;
        if callsign.is_empty() || callsign.len() > MAX_CALLSIGN_LEN {
            return Err(BridgeError::InvalidConfig(format!(
                "callsign must be 1 to {} characters",
                MAX_CALLSIGN_LEN
            )));
        }
        if !callsign.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(BridgeError::InvalidConfig(format!(
                "callsign {:?} may only contain letters, digits and '-'",
                callsign
            )));
        }

        if self.aprsis.host.is_empty() {
            return Err(BridgeError::InvalidConfig("aprsis host cannot be empty".to_string()));
        }
        if self.aprsis.port == 0 {
            return Err(BridgeError::InvalidConfig("aprsis port cannot be 0".to_string()));
        }
        if self.aprsis.interval == 0 || self.aprsis.interval > 1440 {
            return Err(BridgeError::InvalidConfig(
                "interval must be between 1 and 1440 minutes".to_string(),
            ));
        }

        if self.influx.host.is_empty() {
            return Err(BridgeError::InvalidConfig("influx host cannot be empty".to_string()));
        }
        if self.influx.port == 0 {
            return Err(BridgeError::InvalidConfig("influx port cannot be 0".to_string()));
        }
        if self.influx.dbname.is_empty() {
            return Err(BridgeError::InvalidConfig("influx dbname cannot be empty".to_string()));
        }
        if self.influx.timeout_ms == 0 || self.influx.timeout_ms > 60000 {
            return Err(BridgeError::InvalidConfig(
                "timeout_ms must be between 1 and 60000".to_string(),
            ));
        }

        if self.translate.measurement.is_empty() {
            return Err(BridgeError::InvalidConfig("measurement cannot be empty".to_string()));
        }
        if self.translate.geohash_precision > MAX_GEOHASH_PRECISION {
            return Err(BridgeError::InvalidConfig(format!(
                "geohash_precision must be between 0 and {}",
                MAX_GEOHASH_PRECISION
            )));
        }

        if self.logging.dir.is_empty() || self.logging.file.is_empty() {
            return Err(BridgeError::InvalidConfig("log dir and file cannot be empty".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.aprsis.callsign, "NOCALL");
        assert_eq!(config.aprsis.host, "rotate.aprs.net");
        assert_eq!(config.aprsis.port, 10152);
        assert_eq!(config.aprsis.interval, 15);
        assert_eq!(config.influx.host, "localhost");
        assert_eq!(config.influx.port, 8086);
        assert_eq!(config.influx.dbname, "mydb");
        assert!(config.influx.reuse_client);
        assert_eq!(config.translate.measurement, "packet");
        assert!(!config.logging.debug);
    }

    #[test]
    fn test_load_config_from_file() {
        let file = write_config(
            r#"
[aprsis]
callsign = "w1aw-9"
port = 14580
interval = 5
filter = "r/41.7/-72.7/100"

[influx]
host = "influx.local"
dbname = "aprs"
reuse_client = false

[translate]
measurement = "aprs"
geohash_precision = 6
"#,
        );

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.aprsis.callsign, "W1AW-9", "callsign is upper-cased");
        assert_eq!(config.aprsis.port, 14580);
        assert_eq!(config.aprsis.interval, 5);
        assert_eq!(config.aprsis.filter.as_deref(), Some("r/41.7/-72.7/100"));
        assert_eq!(config.influx.host, "influx.local");
        assert_eq!(config.influx.port, 8086, "unset values take defaults");
        assert_eq!(config.influx.dbname, "aprs");
        assert!(!config.influx.reuse_client);
        assert_eq!(config.translate.measurement, "aprs");
        assert_eq!(config.translate.geohash_precision, 6);
        assert_eq!(config.logging, LoggingConfig::default(), "missing sections take defaults");
    }

    #[test]
    fn test_load_empty_file() {
        let file = write_config("");
        assert_eq!(Config::load(file.path()).unwrap(), Config::default());
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = write_config("[aprsis\ncallsign = ");
        match Config::load(file.path()) {
            Err(BridgeError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    #[test]
    fn test_load_missing_file() {
        match Config::load("/nonexistent/aprs2influxdb/config.toml") {
            Err(BridgeError::Io(_)) => {}
            other => panic!("Expected Io error, got: {:?}", other),
        }
    }

    #[test]
    fn test_load_invalid_values() {
        let file = write_config("[aprsis]\ninterval = 0\n");
        match Config::load(file.path()) {
            Err(BridgeError::InvalidConfig(msg)) => assert!(msg.contains("interval")),
            other => panic!("Expected InvalidConfig error, got: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_callsigns() {
        for callsign in ["", "W1AW/P", "TOOLONGCALL", "W1 AW"] {
            let mut config = Config::default();
            config.aprsis.callsign = callsign.to_string();
            assert!(config.validate().is_err(), "{:?} accepted", callsign);
        }
    }

    #[test]
    fn test_invalid_ranges() {
        let mut config = Config::default();
        config.influx.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.translate.measurement.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.translate.geohash_precision = 13;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.influx.dbname.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides_win_over_file() {
        let file = write_config(
            r#"
[aprsis]
callsign = "W1AW"
passcode = 12345

[influx]
host = "from-file"
port = 9999
"#,
        );
        let mut config = Config::load(file.path()).unwrap();

        let overrides = Overrides {
            dbhost: Some("from-cli".to_string()),
            dbname: Some("cli_db".to_string()),
            callsign: Some("kb1lqc-9".to_string()),
            interval: Some(30),
            debug: true,
            ..Default::default()
        };
        config.apply_overrides(&overrides).unwrap();

        assert_eq!(config.influx.host, "from-cli");
        assert_eq!(config.influx.port, 9999, "unset overrides keep file values");
        assert_eq!(config.influx.dbname, "cli_db");
        assert_eq!(config.aprsis.callsign, "KB1LQC-9");
        assert_eq!(config.aprsis.passcode, None);
        assert_eq!(config.aprsis.interval, 30);
        assert!(config.logging.debug);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let mut config = Config::default();
        let overrides = Overrides {
            port: Some(0),
            ..Default::default()
        };
        assert!(config.apply_overrides(&overrides).is_err());
    }

    #[test]
    fn test_login_passcode() {
        let mut aprsis = AprsIsConfig::default();
        assert!(aprsis.is_nocall());
        assert_eq!(aprsis.login_passcode(), -1);

        aprsis.callsign = "NOCALL-5".to_string();
        assert_eq!(aprsis.login_passcode(), -1);

        aprsis.callsign = "N0CALL".to_string();
        assert!(!aprsis.is_nocall());
        assert_eq!(aprsis.login_passcode(), 13023);

        aprsis.passcode = Some(42);
        assert_eq!(aprsis.login_passcode(), 42);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = Config::default();
        config.aprsis.callsign = "W1AW".to_string();
        config.aprsis.filter = Some("p/W1".to_string());
        config.influx.reuse_client = false;
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_or_default_explicit_path() {
        let file = write_config("[influx]\ndbname = \"explicit\"\n");
        let (config, source) = Config::load_or_default(Some(file.path())).unwrap();

        assert_eq!(config.influx.dbname, "explicit");
        assert_eq!(source.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_search_paths_order() {
        let paths = Config::search_paths();
        assert_eq!(paths.first(), Some(&PathBuf::from("./config.toml")));
        assert_eq!(paths.last(), Some(&PathBuf::from("/etc/aprs2influxdb/config.toml")));
    }
}
