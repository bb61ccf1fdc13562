use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct RosterConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub mongodb: MongoConfig,
    pub auth: AuthConfig,
    pub backup: BackupConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC signing secret for session credentials.
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
    pub session_cookie: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackupConfig {
    /// Start the scheduler at bootstrap.
    pub enabled: bool,
    pub interval_minutes: u64,
    pub storage_dir: String,
    /// Keep at most this many artifacts; oldest are deleted first.
    pub max_count: Option<u64>,
    /// Delete artifacts older than this many days.
    pub max_age_days: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

impl RosterConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let config = RosterConfig {
            common: common_config,
            service_name: get_env("SERVICE_NAME", Some("roster-service"), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", Some("mongodb://localhost:27017"), is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("roster_db"), is_prod)?,
            },
            auth: AuthConfig {
                jwt_secret: get_env("JWT_SECRET", None, is_prod)?,
                session_ttl_hours: get_env("SESSION_TTL_HOURS", Some("24"), is_prod)?
                    .parse()
                    .map_err(|e: std::num::ParseIntError| {
                        AppError::ConfigError(anyhow::anyhow!(e.to_string()))
                    })?,
                session_cookie: get_env("SESSION_COOKIE_NAME", Some("roster_session"), is_prod)?,
            },
            backup: BackupConfig {
                enabled: get_env("BACKUP_ENABLED", Some("true"), is_prod)?
                    .parse()
                    .unwrap_or(true),
                interval_minutes: get_env("BACKUP_INTERVAL_MINUTES", Some("60"), is_prod)?
                    .parse()
                    .map_err(|e: std::num::ParseIntError| {
                        AppError::ConfigError(anyhow::anyhow!(e.to_string()))
                    })?,
                storage_dir: get_env("BACKUP_DIR", Some("backups"), is_prod)?,
                max_count: env::var("BACKUP_MAX_COUNT")
                    .ok()
                    .map(|v| {
                        v.parse().map_err(|e: std::num::ParseIntError| {
                            AppError::ConfigError(anyhow::anyhow!(
                                "Invalid BACKUP_MAX_COUNT: {}",
                                e
                            ))
                        })
                    })
                    .transpose()?,
                max_age_days: env::var("BACKUP_MAX_AGE_DAYS")
                    .ok()
                    .map(|v| {
                        v.parse().map_err(|e: std::num::ParseIntError| {
                            AppError::ConfigError(anyhow::anyhow!(
                                "Invalid BACKUP_MAX_AGE_DAYS: {}",
                                e
                            ))
                        })
                    })
                    .transpose()?,
            },
            security: SecurityConfig {
                allowed_origins: get_env("ALLOWED_ORIGINS", Some("http://localhost:3000"), is_prod)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
            },
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

        if self.auth.jwt_secret.len() < 32 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 bytes"
            )));
        }

        if self.auth.session_ttl_hours <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_TTL_HOURS must be positive"
            )));
        }

        if self.backup.interval_minutes == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "BACKUP_INTERVAL_MINUTES must be greater than 0"
            )));
        }

        if self.backup.max_count == Some(0) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "BACKUP_MAX_COUNT must be greater than 0 when set"
            )));
        }

        if matches!(self.backup.max_age_days, Some(d) if d <= 0) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "BACKUP_MAX_AGE_DAYS must be positive when set"
            )));
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
