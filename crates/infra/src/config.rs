//! Configuration loading and representation.

use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::Invalid {
                key: "ENV",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub port: u16,
    pub jwt_secret: String,
    /// Token lifetime in days.
    pub jwt_expires_in_days: i64,
    /// Cookie `Max-Age` in days.
    pub jwt_cookie_expires_in_days: i64,
    pub webhook_secret: String,
    /// Origin used in emailed links and redirect URLs, no trailing slash.
    pub public_url: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("port", &self.port)
            .field("jwt_expires_in_days", &self.jwt_expires_in_days)
            .field("jwt_cookie_expires_in_days", &self.jwt_cookie_expires_in_days)
            .field("public_url", &self.public_url)
            .finish_non_exhaustive()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            env: Environment::Development,
            port: 8080,
            jwt_secret: "dev-secret".to_string(),
            jwt_expires_in_days: 90,
            jwt_cookie_expires_in_days: 90,
            webhook_secret: "whsec_dev".to_string(),
            public_url: "http://localhost:8080".to_string(),
        }
    }
}

impl AppConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let env = match lookup("ENV") {
            Some(raw) => raw.parse()?,
            None => defaults.env,
        };
        let port = parse_or(&lookup, "PORT", defaults.port)?;

        let jwt_secret = lookup("JWT_SECRET").filter(|s| !s.is_empty()).unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            defaults.jwt_secret.clone()
        });
        let webhook_secret = lookup("STRIPE_WEBHOOK_SECRET")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                tracing::warn!("STRIPE_WEBHOOK_SECRET not set; using insecure dev default");
                defaults.webhook_secret.clone()
            });

        let jwt_expires_in_days = parse_or(&lookup, "JWT_EXPIRES_IN", defaults.jwt_expires_in_days)?;
        let jwt_cookie_expires_in_days =
            parse_or(&lookup, "JWT_COOKIE_EXPIRES_IN", defaults.jwt_cookie_expires_in_days)?;

        let public_url = lookup("PUBLIC_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| format!("http://localhost:{port}"));

        Ok(Self {
            env,
            port,
            jwt_secret,
            jwt_expires_in_days,
            jwt_cookie_expires_in_days,
            webhook_secret,
            public_url,
        })
    }

    pub fn is_production(&self) -> bool {
        self.env == Environment::Production
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = from(&[]).unwrap();
        assert_eq!(cfg.env, Environment::Development);
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.jwt_expires_in_days, 90);
        assert_eq!(cfg.public_url, "http://localhost:8080");
    }

    #[test]
    fn values_are_read() {
        let cfg = from(&[
            ("ENV", "production"),
            ("PORT", "3000"),
            ("JWT_EXPIRES_IN", "7"),
            ("PUBLIC_URL", "https://natours.example.com/"),
        ])
        .unwrap();
        assert!(cfg.is_production());
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.jwt_expires_in_days, 7);
        assert_eq!(cfg.public_url, "https://natours.example.com");
    }

    #[test]
    fn bad_number_is_an_error() {
        let err = from(&[("PORT", "eighty")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "PORT",
                value: "eighty".into()
            }
        );
    }

    #[test]
    fn unknown_env_is_an_error() {
        assert!(from(&[("ENV", "staging")]).is_err());
    }
}
