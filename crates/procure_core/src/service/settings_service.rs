//! Typed application settings.
//!
//! # Responsibility
//! - Parse the `settings` key/value rows into `AppSettings`.
//! - Validate ranges before anything is written.
//!
//! # Invariants
//! - Missing keys fall back to `AppSettings::default()`.
//! - Only superadmins write settings.
//! - A stored value that no longer parses is reported, never silently reset.

use crate::model::directory::UserId;
use crate::money::Rate;
use crate::repo::directory_repo::{SqliteUserRepository, UserRepository};
use crate::repo::settings_repo::{SettingsRepository, SqliteSettingsRepository};
use crate::repo::RepoResult;
use crate::service::{require_superadmin, ServiceError, ServiceResult};
use log::info;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

pub const KEY_VAT_RATE: &str = "vat_rate";
pub const KEY_PO_NUMBER_START: &str = "po_number_start";
pub const KEY_SESSION_TIMEOUT_MINUTES: &str = "session_timeout_minutes";
pub const KEY_MAX_LOGIN_ATTEMPTS: &str = "max_login_attempts";
pub const KEY_PASSWORD_MIN_LENGTH: &str = "password_min_length";

pub const SETTING_KEYS: [&str; 5] = [
    KEY_VAT_RATE,
    KEY_PO_NUMBER_START,
    KEY_SESSION_TIMEOUT_MINUTES,
    KEY_MAX_LOGIN_ATTEMPTS,
    KEY_PASSWORD_MIN_LENGTH,
];

const SESSION_TIMEOUT_RANGE: RangeInclusive<u32> = 1..=1440;
const LOGIN_ATTEMPTS_RANGE: RangeInclusive<u32> = 1..=100;
const PASSWORD_LENGTH_RANGE: RangeInclusive<u32> = 4..=128;

/// Business and security settings.
///
/// Security values are stored for the front end that enforces them;
/// this crate only validates and serves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Default VAT rate for new purchase orders.
    pub vat_rate: Rate,
    /// Lowest number handed out to a new PO.
    pub po_number_start: i64,
    pub session_timeout_minutes: u32,
    pub max_login_attempts: u32,
    pub password_min_length: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            vat_rate: Rate::from_bps(1200).unwrap_or(Rate::ZERO),
            po_number_start: 1,
            session_timeout_minutes: 30,
            max_login_attempts: 5,
            password_min_length: 8,
        }
    }
}

impl AppSettings {
    /// Builds settings from raw rows. Unknown keys are ignored.
    pub fn from_rows(rows: &BTreeMap<String, String>) -> ServiceResult<Self> {
        let mut settings = Self::default();
        for (key, value) in rows {
            if SETTING_KEYS.contains(&key.as_str()) {
                settings.apply(key, value)?;
            }
        }
        Ok(settings)
    }

    /// Parses and range-checks one value, then stores it on `self`.
    pub fn apply(&mut self, key: &str, value: &str) -> ServiceResult<()> {
        let value = value.trim();
        match key {
            KEY_VAT_RATE => {
                self.vat_rate = value
                    .parse::<Rate>()
                    .map_err(|err| invalid_setting(key, err.to_string()))?;
            }
            KEY_PO_NUMBER_START => {
                let start = value
                    .parse::<i64>()
                    .map_err(|_| invalid_setting(key, format!("`{value}` is not an integer")))?;
                if start < 1 {
                    return Err(invalid_setting(key, "must be at least 1".to_string()));
                }
                self.po_number_start = start;
            }
            KEY_SESSION_TIMEOUT_MINUTES => {
                self.session_timeout_minutes = parse_in_range(key, value, SESSION_TIMEOUT_RANGE)?;
            }
            KEY_MAX_LOGIN_ATTEMPTS => {
                self.max_login_attempts = parse_in_range(key, value, LOGIN_ATTEMPTS_RANGE)?;
            }
            KEY_PASSWORD_MIN_LENGTH => {
                self.password_min_length = parse_in_range(key, value, PASSWORD_LENGTH_RANGE)?;
            }
            _ => return Err(invalid_setting(key, "unknown setting".to_string())),
        }
        Ok(())
    }

    /// Canonical text form of every setting, keyed like the storage rows.
    pub fn to_rows(&self) -> Vec<(&'static str, String)> {
        vec![
            (KEY_VAT_RATE, self.vat_rate.to_string()),
            (KEY_PO_NUMBER_START, self.po_number_start.to_string()),
            (
                KEY_SESSION_TIMEOUT_MINUTES,
                self.session_timeout_minutes.to_string(),
            ),
            (KEY_MAX_LOGIN_ATTEMPTS, self.max_login_attempts.to_string()),
            (KEY_PASSWORD_MIN_LENGTH, self.password_min_length.to_string()),
        ]
    }
}

fn parse_in_range(key: &str, value: &str, range: RangeInclusive<u32>) -> ServiceResult<u32> {
    let parsed = value
        .parse::<u32>()
        .map_err(|_| invalid_setting(key, format!("`{value}` is not a whole number")))?;
    if !range.contains(&parsed) {
        return Err(invalid_setting(
            key,
            format!("must be between {} and {}", range.start(), range.end()),
        ));
    }
    Ok(parsed)
}

fn invalid_setting(key: &str, reason: String) -> ServiceError {
    ServiceError::InvalidSetting {
        key: key.to_string(),
        reason,
    }
}

/// Settings facade over storage.
pub struct SettingsService<U: UserRepository, S: SettingsRepository> {
    users: U,
    settings: S,
}

impl<U: UserRepository, S: SettingsRepository> SettingsService<U, S> {
    pub fn new(users: U, settings: S) -> Self {
        Self { users, settings }
    }

    /// Current settings. Readable by anyone.
    pub fn load(&self) -> ServiceResult<AppSettings> {
        load_settings(&self.settings)
    }

    /// Validates and stores one setting.
    pub fn set_value(&self, actor_id: UserId, key: &str, value: &str) -> ServiceResult<AppSettings> {
        require_superadmin(&self.users, actor_id, "change settings")?;
        let mut current = self.load()?;
        current.apply(key, value)?;
        self.store(&current)?;
        info!("event=settings_update module=service status=ok key={key}");
        Ok(current)
    }

    /// Replaces every setting at once.
    pub fn replace(&self, actor_id: UserId, settings: &AppSettings) -> ServiceResult<AppSettings> {
        require_superadmin(&self.users, actor_id, "change settings")?;
        // Round-trip through the text form so the same range checks apply.
        let mut validated = AppSettings::default();
        for (key, value) in settings.to_rows() {
            validated.apply(key, &value)?;
        }
        self.store(&validated)?;
        info!("event=settings_update module=service status=ok key=all");
        Ok(validated)
    }

    fn store(&self, settings: &AppSettings) -> ServiceResult<()> {
        self.settings.put_settings(&settings.to_rows())?;
        Ok(())
    }
}

impl<'conn> SettingsService<SqliteUserRepository<'conn>, SqliteSettingsRepository<'conn>> {
    pub fn from_connection(conn: &'conn Connection) -> RepoResult<Self> {
        Ok(Self::new(
            SqliteUserRepository::try_new(conn)?,
            SqliteSettingsRepository::try_new(conn)?,
        ))
    }
}

/// Reads settings through any settings repository.
pub(crate) fn load_settings<S: SettingsRepository>(settings: &S) -> ServiceResult<AppSettings> {
    let rows = settings.all_settings()?;
    AppSettings::from_rows(&rows)
}
