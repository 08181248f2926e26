use std::env;
use std::path::PathBuf;

/// Runtime knobs for the outreach worker, all overridable through the
/// environment. Absent or unparseable values fall back to the documented
/// defaults.
#[derive(Debug, Clone)]
pub struct OutreachConfig {
    pub db_path: PathBuf,
    pub max_connections_per_day: i64,
    pub max_messages_per_day: i64,
    pub working_start_hour: u32,
    pub working_end_hour: u32,
    /// UTC hour at which nightly maintenance runs.
    pub nightly_hour: u32,
    pub min_sleep_secs: u64,
    pub max_sleep_secs: u64,
    pub relation_poll_minutes: i64,
    pub error_backoff_secs: u64,
}

impl Default for OutreachConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("outreach.db"),
            max_connections_per_day: 25,
            max_messages_per_day: 100,
            working_start_hour: 9,
            working_end_hour: 17,
            nightly_hour: 3,
            min_sleep_secs: 60,
            max_sleep_secs: 300,
            relation_poll_minutes: 30,
            error_backoff_secs: 60,
        }
    }
}

impl OutreachConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let db_path = env::var("OUTREACH_DB_PATH")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        Self {
            db_path,
            max_connections_per_day: env_i64(
                "MAX_CONNECTIONS_PER_DAY",
                defaults.max_connections_per_day,
            ),
            max_messages_per_day: env_i64("MAX_MESSAGES_PER_DAY", defaults.max_messages_per_day),
            working_start_hour: env_u32("WORKING_START_HOUR", defaults.working_start_hour),
            working_end_hour: env_u32("WORKING_END_HOUR", defaults.working_end_hour),
            nightly_hour: env_u32("NIGHTLY_JOB_UTC_HOUR", defaults.nightly_hour),
            min_sleep_secs: env_u64("SCHEDULER_MIN_SLEEP_SECS", defaults.min_sleep_secs),
            max_sleep_secs: env_u64("SCHEDULER_MAX_SLEEP_SECS", defaults.max_sleep_secs),
            relation_poll_minutes: env_i64(
                "RELATION_POLL_INTERVAL_MINUTES",
                defaults.relation_poll_minutes,
            ),
            error_backoff_secs: env_u64("SCHEDULER_ERROR_BACKOFF_SECS", defaults.error_backoff_secs),
        }
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .filter(|value| *value >= 0)
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|value| *value <= 24)
        .unwrap_or(default)
}
