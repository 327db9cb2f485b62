use std::path::PathBuf;
use std::str::FromStr;

use lyra_core::checkpointing::{DEFAULT_STALE_MAX_AGE_HOURS, MAX_FAILURE_COUNT};

/// Default location of the journal database.
const DEFAULT_DATABASE_PATH: &str = "data/lyra.db";

/// Recovery configuration loaded from environment variables.
///
/// Every field has a default, and an unparseable value falls back to that
/// default with a warning: a bad setting must never stop the application
/// from starting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryConfig {
    /// SQLite file holding the checkpoint journal.
    pub database_path: PathBuf,
    /// Pending checkpoints older than this many hours are swept without repair.
    pub stale_max_age_hours: i64,
    /// Failure count at which a checkpoint is dead-lettered.
    pub max_failures: i32,
    /// When `false` the startup pass is skipped entirely.
    pub enabled: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            stale_max_age_hours: DEFAULT_STALE_MAX_AGE_HOURS,
            max_failures: MAX_FAILURE_COUNT,
            enabled: true,
        }
    }
}

impl RecoveryConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default        |
    /// |-------------------------|----------------|
    /// | `LYRA_DB_PATH`          | `data/lyra.db` |
    /// | `RECOVERY_STALE_HOURS`  | `24`           |
    /// | `RECOVERY_MAX_FAILURES` | `3`            |
    /// | `RECOVERY_ENABLED`      | `true`         |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let database_path = lookup("LYRA_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);

        let stale_max_age_hours = parse_or(&lookup, "RECOVERY_STALE_HOURS", defaults.stale_max_age_hours)
            .max(1);

        let max_failures = parse_or(&lookup, "RECOVERY_MAX_FAILURES", defaults.max_failures).max(1);

        let enabled = parse_or(&lookup, "RECOVERY_ENABLED", defaults.enabled);

        Self {
            database_path,
            stale_max_age_hours,
            max_failures,
            enabled,
        }
    }

    /// Age past which a pending checkpoint counts as abandoned.
    pub fn stale_max_age(&self) -> chrono::Duration {
        chrono::Duration::hours(self.stale_max_age_hours)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, ?default, "Invalid config value, using default");
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = RecoveryConfig::from_lookup(|_| None);
        assert_eq!(config, RecoveryConfig::default());
        assert_eq!(config.stale_max_age(), chrono::Duration::hours(24));
        assert_eq!(config.max_failures, 3);
    }

    #[test]
    fn values_are_read_from_lookup() {
        let config = RecoveryConfig::from_lookup(lookup_from(&[
            ("LYRA_DB_PATH", "/var/lib/lyra/journal.db"),
            ("RECOVERY_STALE_HOURS", "48"),
            ("RECOVERY_MAX_FAILURES", "5"),
            ("RECOVERY_ENABLED", "false"),
        ]));
        assert_eq!(config.database_path, PathBuf::from("/var/lib/lyra/journal.db"));
        assert_eq!(config.stale_max_age_hours, 48);
        assert_eq!(config.max_failures, 5);
        assert!(!config.enabled);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = RecoveryConfig::from_lookup(lookup_from(&[
            ("RECOVERY_STALE_HOURS", "a day"),
            ("RECOVERY_MAX_FAILURES", "-"),
            ("RECOVERY_ENABLED", "maybe"),
        ]));
        assert_eq!(config, RecoveryConfig::default());
    }

    #[test]
    fn non_positive_limits_are_clamped() {
        let config = RecoveryConfig::from_lookup(lookup_from(&[
            ("RECOVERY_STALE_HOURS", "0"),
            ("RECOVERY_MAX_FAILURES", "-2"),
        ]));
        assert_eq!(config.stale_max_age_hours, 1);
        assert_eq!(config.max_failures, 1);
    }
}
