//! `Config`: flags and defaults, mirroring `settings.Config` / `settings.DefaultConfig`.

use std::path::PathBuf;

pub const DEFAULT_ACCOUNT_NUMBER: &str = "271828182845";
pub const DEFAULT_REGION: &str = "us-west-2";
pub const DEFAULT_PORT: u16 = 9050;
pub const DEFAULT_DATA_PATH: &str = "data";
pub const DEFAULT_DEV_CONFIG: &str = "functions.yml";
pub const DEFAULT_SQS_ENDPOINT: &str = "http://localhost:9324";
pub const DEFAULT_NETWORKS: &str = "lambda";

#[derive(Debug, Clone)]
pub struct Config {
    pub account_number: String,
    pub region: String,
    pub port: u16,
    pub data_path: String,
    pub dev_config_file: String,
    pub sqs_endpoint: String,
    pub networks: Vec<String>,
    pub is_local: bool,
    pub is_debug: bool,
    /// `NAME` env var: this process's own container name, used for host-path translation
    /// when `is_local` is false.
    pub own_container_name: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            account_number: DEFAULT_ACCOUNT_NUMBER.to_string(),
            region: DEFAULT_REGION.to_string(),
            port: DEFAULT_PORT,
            data_path: DEFAULT_DATA_PATH.to_string(),
            dev_config_file: DEFAULT_DEV_CONFIG.to_string(),
            sqs_endpoint: DEFAULT_SQS_ENDPOINT.to_string(),
            networks: vec![DEFAULT_NETWORKS.to_string()],
            is_local: true,
            is_debug: false,
            own_container_name: None,
        }
    }
}

impl Config {
    pub fn arn_fragment(&self) -> String {
        format!("{}:{}", self.region, self.account_number)
    }

    /// Absolute data path; relative paths are resolved against the current working
    /// directory, matching `Config.DataPath()`.
    pub fn data_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.data_path);
        if path.is_absolute() {
            path
        } else {
            std::env::current_dir()
                .expect("unable to determine current working directory")
                .join(path)
        }
    }

    pub fn port_pool_base(&self) -> u16 {
        self.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.account_number, "271828182845");
        assert_eq!(cfg.region, "us-west-2");
        assert_eq!(cfg.port, 9050);
        assert!(cfg.is_local);
        assert!(!cfg.is_debug);
    }

    #[test]
    fn arn_fragment_combines_region_and_account() {
        let cfg = Config::default();
        assert_eq!(cfg.arn_fragment(), "us-west-2:271828182845");
    }
}
