use std::fmt;

use config::{Config, ConfigError, Environment};
use dotenv::dotenv;
use serde::Deserialize;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    #[default]
    Development,
    Test,
    Production,
}

#[derive(Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub database_pool_size: u32,
    pub jwt_secret: String,
    pub app_env: AppEnv,
    pub payment_key_id: Option<String>,
    pub payment_key_secret: Option<String>,
    pub payment_gateway_url: String,
    /// Accept `order_test_` orders without a gateway signature.
    pub payment_test_mode: bool,
    pub upload_dir: String,
    pub public_base_url: String,
    pub max_upload_bytes: usize,
    pub cors_origin: Option<String>,
}

// Secrets stay out of the startup log.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("database_pool_size", &self.database_pool_size)
            .field("app_env", &self.app_env)
            .field("payment_key_id", &self.payment_key_id)
            .field("payment_test_mode", &self.payment_test_mode)
            .field("upload_dir", &self.upload_dir)
            .field("public_base_url", &self.public_base_url)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("cors_origin", &self.cors_origin)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Reads `.env` (if present) and then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv().ok(); // Load .env file if present
        Self::from_environment(Environment::default().try_parsing(true))
    }

    pub fn from_environment(source: Environment) -> Result<Self, ConfigError> {
        let config: AppConfig = Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8080)?
            .set_default("database_pool_size", 10)?
            .set_default("app_env", "development")?
            .set_default("payment_gateway_url", "https://api.razorpay.com")?
            .set_default("payment_test_mode", false)?
            .set_default("upload_dir", "uploads")?
            .set_default("public_base_url", "http://127.0.0.1:8080")?
            .set_default("max_upload_bytes", DEFAULT_MAX_UPLOAD_BYTES as u64)?
            .add_source(source)
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration for local runs and tests: in-memory store, test payments.
    pub fn local(jwt_secret: &str) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_url: None,
            database_pool_size: 10,
            jwt_secret: jwt_secret.to_string(),
            app_env: AppEnv::Test,
            payment_key_id: None,
            payment_key_secret: None,
            payment_gateway_url: "https://api.razorpay.com".to_string(),
            payment_test_mode: true,
            upload_dir: "uploads".to_string(),
            public_base_url: "http://127.0.0.1:8080".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            cors_origin: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Message("JWT_SECRET must be set".to_string()));
        }
        let has_gateway_keys = self.payment_key_id.is_some() && self.payment_key_secret.is_some();
        if self.payment_key_id.is_some() != self.payment_key_secret.is_some() {
            return Err(ConfigError::Message(
                "PAYMENT_KEY_ID and PAYMENT_KEY_SECRET must be set together".to_string(),
            ));
        }
        // Without a gateway, orders are local test orders that only the bypass can settle.
        if !has_gateway_keys && !self.payment_test_mode && !self.is_production() {
            return Err(ConfigError::Message(
                "Set PAYMENT_KEY_ID and PAYMENT_KEY_SECRET, or PAYMENT_TEST_MODE=true for local runs"
                    .to_string(),
            ));
        }
        if self.app_env == AppEnv::Production {
            if self.database_url.is_none() {
                return Err(ConfigError::Message(
                    "DATABASE_URL is required in production".to_string(),
                ));
            }
            if self.payment_key_id.is_none() || self.payment_key_secret.is_none() {
                return Err(ConfigError::Message(
                    "PAYMENT_KEY_ID and PAYMENT_KEY_SECRET are required in production".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.app_env == AppEnv::Production
    }

    /// Test orders may skip signature checks, never in production.
    pub fn payment_bypass_enabled(&self) -> bool {
        self.payment_test_mode && !self.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::default().try_parsing(true).source(Some(map))
    }

    #[test]
    fn defaults_fill_unset_keys() {
        let config = AppConfig::from_environment(env(&[
            ("JWT_SECRET", "s3cret"),
            ("PAYMENT_TEST_MODE", "true"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.app_env, AppEnv::Development);
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn production_requires_database_and_gateway() {
        let err = AppConfig::from_environment(env(&[
            ("JWT_SECRET", "s3cret"),
            ("APP_ENV", "production"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn development_needs_gateway_keys_or_test_mode() {
        let err = AppConfig::from_environment(env(&[("JWT_SECRET", "s3cret")])).unwrap_err();
        assert!(err.to_string().contains("PAYMENT_TEST_MODE"));

        let err = AppConfig::from_environment(env(&[
            ("JWT_SECRET", "s3cret"),
            ("PAYMENT_KEY_ID", "rzp_test_key"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("set together"));

        let config = AppConfig::from_environment(env(&[
            ("JWT_SECRET", "s3cret"),
            ("PAYMENT_KEY_ID", "rzp_test_key"),
            ("PAYMENT_KEY_SECRET", "gateway-secret"),
        ]))
        .unwrap();
        assert!(!config.payment_bypass_enabled());
    }

    #[test]
    fn bypass_is_never_enabled_in_production() {
        let mut config = AppConfig::local("s3cret");
        assert!(config.payment_bypass_enabled());
        config.app_env = AppEnv::Production;
        assert!(!config.payment_bypass_enabled());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let mut config = AppConfig::local("super-secret-value");
        config.payment_key_secret = Some("gateway-secret".to_string());
        let printed = format!("{:?}", config);
        assert!(!printed.contains("super-secret-value"));
        assert!(!printed.contains("gateway-secret"));
    }
}
