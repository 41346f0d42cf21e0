//! Process configuration read from the environment.
//!
//! # Responsibility
//! - Resolve store locations, credential cost and logging settings.
//! - Reject malformed values instead of silently falling back.
//!
//! Unset variables use the defaults below.

use crate::credential::{CredentialError, CredentialManager};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const USERS_DB_VAR: &str = "WAVES_USERS_DB";
pub const DOCUMENTS_DB_VAR: &str = "WAVES_DOCUMENTS_DB";
pub const HASH_COST_VAR: &str = "WAVES_HASH_COST";
pub const HASH_MEMORY_VAR: &str = "WAVES_HASH_MEMORY_KIB";
pub const LOG_LEVEL_VAR: &str = "WAVES_LOG_LEVEL";
pub const LOG_DIR_VAR: &str = "WAVES_LOG_DIR";

const DEFAULT_USERS_DB: &str = "waves-users.db";
const DEFAULT_DOCUMENTS_DB: &str = "waves-documents.db";
const DEFAULT_HASH_COST: u32 = 2;
const DEFAULT_HASH_MEMORY_KIB: u32 = 19 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidNumber { key: &'static str, value: String },
    OutOfRange { key: &'static str, min: u32, value: u32 },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNumber { key, value } => {
                write!(f, "{key} must be an unsigned integer, got `{value}`")
            }
            Self::OutOfRange { key, min, value } => {
                write!(f, "{key} must be at least {min}, got {value}")
            }
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Relational user store location.
    pub users_db: PathBuf,
    /// Document store location.
    pub documents_db: PathBuf,
    /// Credential hashing iteration cost.
    pub hash_cost: u32,
    pub hash_memory_kib: u32,
    pub log_level: Option<String>,
    /// File logging is disabled when unset.
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Self {
            users_db: read(USERS_DB_VAR).map_or_else(|| DEFAULT_USERS_DB.into(), PathBuf::from),
            documents_db: read(DOCUMENTS_DB_VAR)
                .map_or_else(|| DEFAULT_DOCUMENTS_DB.into(), PathBuf::from),
            hash_cost: parse_u32(HASH_COST_VAR, read(HASH_COST_VAR), DEFAULT_HASH_COST, 1)?,
            hash_memory_kib: parse_u32(
                HASH_MEMORY_VAR,
                read(HASH_MEMORY_VAR),
                DEFAULT_HASH_MEMORY_KIB,
                8,
            )?,
            log_level: read(LOG_LEVEL_VAR),
            log_dir: read(LOG_DIR_VAR).map(PathBuf::from),
        })
    }

    pub fn credential_manager(&self) -> Result<CredentialManager, CredentialError> {
        CredentialManager::with_cost(self.hash_cost, self.hash_memory_kib)
    }
}

fn parse_u32(
    key: &'static str,
    raw: Option<String>,
    default: u32,
    min: u32,
) -> Result<u32, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let value = raw
        .trim()
        .parse::<u32>()
        .map_err(|_| ConfigError::InvalidNumber {
            key,
            value: raw.clone(),
        })?;
    if value < min {
        return Err(ConfigError::OutOfRange { key, min, value });
    }
    Ok(value)
}
