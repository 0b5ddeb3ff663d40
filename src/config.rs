//! Configuration management via environment variables
//!
//! Loads configuration from environment variables with .env file support.
//! Follows 12-factor app principles for cloud-native deployments.

use std::env;
use std::time::Duration;

use crate::error::{JudgeError, Result};

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub trust: TrustConfig,
    pub reverse_dns: ReverseDnsConfig,
    /// Verbose logging only; has no effect on judgement output
    pub debug_enabled: bool,
}

/// Server binding configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Trusted network settings
///
/// `cdn_trust_enabled` controls whether the judge considers itself deployed
/// behind the CDN edge: its published ranges are stripped from the forwarding
/// chain and its client headers are honored for remote IP and country.
/// `trusted_gateways` lists operator gateways (load balancers) which append
/// their own address to X-Forwarded-For.
#[derive(Debug, Clone)]
pub struct TrustConfig {
    pub cdn_trust_enabled: bool,
    pub trusted_gateways: Vec<String>,
}

/// Reverse DNS lookup settings
#[derive(Debug, Clone)]
pub struct ReverseDnsConfig {
    pub lookup_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Reads .env file if present, then parses environment variables.
    /// Returns error if variables are present but invalid.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let debug_enabled = env::var("DEBUG_ENABLED")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .map_err(|e| JudgeError::Config(format!("Invalid DEBUG_ENABLED: {}", e)))?;

        Ok(Self {
            server: ServerConfig::from_env()?,
            trust: TrustConfig::from_env()?,
            reverse_dns: ReverseDnsConfig::from_env()?,
            debug_enabled,
        })
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self> {
        let host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|e| JudgeError::Config(format!("Invalid SERVER_PORT: {}", e)))?;

        Ok(Self { host, port })
    }
}

impl TrustConfig {
    fn from_env() -> Result<Self> {
        let cdn_trust_enabled = env::var("CDN_TRUST_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .map_err(|e| JudgeError::Config(format!("Invalid CDN_TRUST_ENABLED: {}", e)))?;

        let trusted_gateways = env::var("TRUSTED_GATEWAYS")
            .unwrap_or_else(|_| String::new())
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().to_string())
            .collect();

        Ok(Self {
            cdn_trust_enabled,
            trusted_gateways,
        })
    }
}

impl ReverseDnsConfig {
    fn from_env() -> Result<Self> {
        let timeout_secs = env::var("REVERSE_DNS_TIMEOUT_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u64>()
            .map_err(|e| JudgeError::Config(format!("Invalid REVERSE_DNS_TIMEOUT_SECS: {}", e)))?;

        Ok(Self {
            lookup_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        temp_env::with_vars_unset(vec!["SERVER_HOST", "SERVER_PORT"], || {
            let config = ServerConfig::from_env().unwrap();
            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.port, 8080);
        });
    }

    #[test]
    fn test_server_config_custom() {
        temp_env::with_vars(
            vec![
                ("SERVER_HOST", Some("0.0.0.0")),
                ("SERVER_PORT", Some("3000")),
            ],
            || {
                let config = ServerConfig::from_env().unwrap();
                assert_eq!(config.host, "0.0.0.0");
                assert_eq!(config.port, 3000);
            },
        );
    }

    #[test]
    fn test_server_config_invalid_port() {
        temp_env::with_vars(vec![("SERVER_PORT", Some("not-a-port"))], || {
            let result = ServerConfig::from_env();
            assert!(result.is_err());
            assert!(result.unwrap_err().to_string().contains("SERVER_PORT"));
        });
    }

    #[test]
    fn test_trust_config_defaults() {
        temp_env::with_vars_unset(vec!["CDN_TRUST_ENABLED", "TRUSTED_GATEWAYS"], || {
            let config = TrustConfig::from_env().unwrap();
            assert!(config.cdn_trust_enabled);
            assert!(config.trusted_gateways.is_empty());
        });
    }

    #[test]
    fn test_trust_config_gateway_parsing() {
        temp_env::with_vars(
            vec![
                ("CDN_TRUST_ENABLED", Some("false")),
                ("TRUSTED_GATEWAYS", Some(" 10.0.0.1 , 10.0.0.2 , ")),
            ],
            || {
                let config = TrustConfig::from_env().unwrap();
                assert!(!config.cdn_trust_enabled);
                assert_eq!(config.trusted_gateways.len(), 2);
                assert!(config.trusted_gateways.contains(&"10.0.0.1".to_string()));
                assert!(config.trusted_gateways.contains(&"10.0.0.2".to_string()));
            },
        );
    }

    #[test]
    fn test_reverse_dns_defaults() {
        temp_env::with_vars_unset(vec!["REVERSE_DNS_TIMEOUT_SECS"], || {
            let config = ReverseDnsConfig::from_env().unwrap();
            assert_eq!(config.lookup_timeout, Duration::from_secs(5));
        });
    }

    #[test]
    fn test_reverse_dns_custom() {
        temp_env::with_vars(vec![("REVERSE_DNS_TIMEOUT_SECS", Some("2"))], || {
            let config = ReverseDnsConfig::from_env().unwrap();
            assert_eq!(config.lookup_timeout, Duration::from_secs(2));
        });
    }
}
