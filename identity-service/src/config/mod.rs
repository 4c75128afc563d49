use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

use crate::middleware::session::DEFAULT_SESSION_TTL_MINUTES;
use crate::services::{FeatureFlags, FederationConfig};

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    /// Lifetime of an interactive session, in minutes.
    pub session_ttl_minutes: i64,
    pub bootstrap: BootstrapConfig,
    pub flags: FeatureFlags,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

/// Seed data for a fresh store.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub admin_email: String,
    pub org_name: String,
}

impl IdentityConfig {
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_ttl_minutes)
    }

    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let federation = FederationConfig {
            enabled: get_bool("FEDERATION_ENABLED", "false", is_prod)?,
            default_org: Some(get_env("FEDERATION_DEFAULT_ORG", Some(""), is_prod)?)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            use_default_org: get_bool("FEDERATION_USE_DEFAULT_ORG", "false", is_prod)?,
            mail_attr: get_env("FEDERATION_MAIL_ATTR", Some("Email-Tag"), is_prod)?,
            org_attr: get_env("FEDERATION_ORG_ATTR", Some("Federation-Tag"), is_prod)?,
            group_attr: get_env("FEDERATION_GROUP_ATTR", Some("Group-Tag"), is_prod)?,
            group_separator: get_env("FEDERATION_GROUP_SEPARATOR", Some(","), is_prod)?,
            group_to_role: FederationConfig::parse_group_map(&get_env(
                "FEDERATION_GROUP_ROLE_MAP",
                Some(""),
                is_prod,
            )?)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?,
        };

        let flags = FeatureFlags {
            allow_self_registration: get_bool("SECURITY_ALLOW_SELF_REGISTRATION", "false", is_prod)?,
            disable_user_login_change: get_bool("DISABLE_USER_LOGIN_CHANGE", "false", is_prod)?,
            disable_user_password_change: get_bool("DISABLE_USER_PASSWORD_CHANGE", "false", is_prod)?,
            disable_user_add: get_bool("DISABLE_USER_ADD", "false", is_prod)?,
            advanced_authkeys_required: get_bool("SECURITY_ADVANCED_AUTHKEYS", "false", is_prod)?,
            platform_live: get_bool("PLATFORM_LIVE", "true", is_prod)?,
            auth_enforced: get_bool("SECURITY_AUTH_ENFORCED", "false", is_prod)?,
            site_admin_bypasses_user_locks: get_bool(
                "SITE_ADMIN_BYPASSES_USER_LOCKS",
                "false",
                is_prod,
            )?,
            default_role: get_env("DEFAULT_ROLE", Some("user"), is_prod)?,
            federation,
        };

        let config = IdentityConfig {
            common: common_config,
            environment,
            service_name: get_env("SERVICE_NAME", Some("identity-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            session_ttl_minutes: get_minutes(
                "SESSION_TTL_MINUTES",
                &DEFAULT_SESSION_TTL_MINUTES.to_string(),
                is_prod,
            )?,
            bootstrap: BootstrapConfig {
                admin_email: get_env("BOOTSTRAP_ADMIN_EMAIL", Some("admin@admin.test"), is_prod)?,
                org_name: get_env("BOOTSTRAP_ORG_NAME", Some("ORGNAME"), is_prod)?,
            },
            flags,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.session_ttl_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_TTL_MINUTES must be greater than 0"
            )));
        }

        if self.bootstrap.org_name.trim().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "BOOTSTRAP_ORG_NAME must not be empty"
            )));
        }

        self.flags
            .validate()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;

        if self.environment == Environment::Prod && self.flags.allow_self_registration {
            tracing::warn!("Self registration is enabled in production");
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn get_bool(key: &str, default: &str, is_prod: bool) -> Result<bool, AppError> {
    let raw = get_env(key, Some(default), is_prod)?;
    parse_bool(&raw).ok_or_else(|| {
        AppError::ConfigError(anyhow::anyhow!("{} must be a boolean, got '{}'", key, raw))
    })
}

fn get_minutes(key: &str, default: &str, is_prod: bool) -> Result<i64, AppError> {
    let raw = get_env(key, Some(default), is_prod)?;
    raw.trim().parse().map_err(|_| {
        AppError::ConfigError(anyhow::anyhow!("{} must be a whole number of minutes, got '{}'", key, raw))
    })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_values() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn minutes_values() {
        std::env::set_var("IDENTITY_TEST_TTL_OK", " 30 ");
        std::env::set_var("IDENTITY_TEST_TTL_BAD", "soon");
        assert_eq!(get_minutes("IDENTITY_TEST_TTL_OK", "5", false).unwrap(), 30);
        assert_eq!(get_minutes("IDENTITY_TEST_TTL_UNSET", "5", false).unwrap(), 5);
        assert!(get_minutes("IDENTITY_TEST_TTL_BAD", "5", false).is_err());
        assert!(get_minutes("IDENTITY_TEST_TTL_UNSET", "5", true).is_err());
    }

    #[test]
    fn environment_parsing() {
        assert_eq!("PROD".parse::<Environment>(), Ok(Environment::Prod));
        assert!("staging".parse::<Environment>().is_err());
    }
}
