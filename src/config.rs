use anyhow::{bail, Context, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Testnet,
    Production,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    Memory,
    Redis,
}

/// Profile created at startup so a fresh instance is usable.
#[derive(Debug, Clone)]
pub struct SeedProfile {
    pub user_id: String,
    pub api_id: String,
    pub api_key: String,
    pub balance: i64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub host: String,
    pub port: u16,

    // Payment provider
    pub upstream_api_base: String,
    pub upstream_timeout_secs: u64,

    // Storage
    pub storage_backend: StorageBackend,
    pub redis_url: String,

    pub credential_cache_ttl_secs: u64,
    pub seed_profile: Option<SeedProfile>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let environment = Self::parse_environment(&var_or("ENVIRONMENT", "development"))?;

        let config = Self {
            environment,
            host: var_or("HOST", "0.0.0.0"),
            port: var_or("PORT", "8080").parse().context("Invalid PORT")?,

            upstream_api_base: var_or("UPSTREAM_API_BASE", "https://kobaru-api.vercel.app/api/v1")
                .trim_end_matches('/')
                .to_string(),
            upstream_timeout_secs: var_or("UPSTREAM_TIMEOUT_SECS", "15")
                .parse()
                .context("Invalid UPSTREAM_TIMEOUT_SECS")?,

            storage_backend: Self::parse_backend(&var_or("STORAGE_BACKEND", "memory"))?,
            redis_url: var_or("REDIS_URL", "redis://localhost:6379"),

            credential_cache_ttl_secs: var_or("CREDENTIAL_CACHE_TTL_SECS", "30")
                .parse()
                .context("Invalid CREDENTIAL_CACHE_TTL_SECS")?,
            seed_profile: Self::parse_seed(&lookup)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn parse_environment(env: &str) -> Result<Environment> {
        match env.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "testnet" | "test" => Ok(Environment::Testnet),
            "production" | "prod" => Ok(Environment::Production),
            _ => bail!("Unknown environment: {}", env),
        }
    }

    fn parse_backend(backend: &str) -> Result<StorageBackend> {
        match backend.to_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "redis" => Ok(StorageBackend::Redis),
            _ => bail!("Unknown STORAGE_BACKEND: {}", backend),
        }
    }

    fn parse_seed<F>(lookup: &F) -> Result<Option<SeedProfile>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let user_id = lookup("SEED_USER_ID");
        let api_id = lookup("SEED_API_ID");
        let api_key = lookup("SEED_API_KEY");

        match (user_id, api_id, api_key) {
            (None, None, None) => Ok(None),
            (Some(user_id), Some(api_id), Some(api_key)) => {
                let balance = lookup("SEED_BALANCE")
                    .unwrap_or_else(|| "0".to_string())
                    .parse()
                    .context("Invalid SEED_BALANCE")?;
                Ok(Some(SeedProfile {
                    user_id,
                    api_id,
                    api_key,
                    balance,
                }))
            }
            _ => bail!("SEED_USER_ID, SEED_API_ID and SEED_API_KEY must be set together"),
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.upstream_api_base.starts_with("http") {
            bail!("UPSTREAM_API_BASE must be HTTP(S) URL");
        }

        if self.environment == Environment::Production && self.storage_backend == StorageBackend::Memory {
            bail!("STORAGE_BACKEND=memory is not allowed in production");
        }

        tracing::info!(
            "Configuration validated for {:?} environment",
            self.environment
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_are_usable() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.port, 8080);
        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert_eq!(config.upstream_api_base, "https://kobaru-api.vercel.app/api/v1");
        assert!(config.seed_profile.is_none());
    }

    #[test]
    fn production_requires_redis() {
        assert!(config_from(&[("ENVIRONMENT", "prod")]).is_err());
        let config = config_from(&[("ENVIRONMENT", "prod"), ("STORAGE_BACKEND", "redis")]).unwrap();
        assert_eq!(config.storage_backend, StorageBackend::Redis);
    }

    #[test]
    fn partial_seed_is_rejected() {
        assert!(config_from(&[("SEED_USER_ID", "u1")]).is_err());

        let config = config_from(&[
            ("SEED_USER_ID", "u1"),
            ("SEED_API_ID", "id"),
            ("SEED_API_KEY", "key"),
            ("SEED_BALANCE", "2500"),
        ])
        .unwrap();
        assert_eq!(config.seed_profile.unwrap().balance, 2500);
    }

    #[test]
    fn upstream_base_must_be_http() {
        assert!(config_from(&[("UPSTREAM_API_BASE", "ftp://provider")]).is_err());
        let config = config_from(&[("UPSTREAM_API_BASE", "http://localhost:9000/api/")]).unwrap();
        assert_eq!(config.upstream_api_base, "http://localhost:9000/api");
    }
}
