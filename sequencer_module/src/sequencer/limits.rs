use chrono::Utc;
use tracing::debug;

use crate::config::OutreachConfig;

use super::store::{SqliteOutreachStore, UsageKind};
use super::types::{RateUsage, SequencerError};

/// Admission control over the persisted per-account, per-day counters.
pub struct RateLimiter {
    store: SqliteOutreachStore,
    max_connections_per_day: i64,
    max_messages_per_day: i64,
}

impl RateLimiter {
    pub fn new(store: SqliteOutreachStore, config: &OutreachConfig) -> Self {
        Self {
            store,
            max_connections_per_day: config.max_connections_per_day,
            max_messages_per_day: config.max_messages_per_day,
        }
    }

    pub fn usage_today(&self, account_id: &str) -> Result<RateUsage, SequencerError> {
        Ok(self
            .store
            .usage_on(account_id, Utc::now().date_naive())?
            .unwrap_or_default())
    }

    pub fn can_send_invite(&self, account_id: &str) -> Result<bool, SequencerError> {
        let usage = self.usage_today(account_id)?;
        Ok(usage.invites_sent < self.max_connections_per_day)
    }

    /// First-level connections never needed an invite, so they pass straight
    /// through the message gate without any invite-specific gating.
    pub fn can_send_message(
        &self,
        account_id: &str,
        first_level: bool,
    ) -> Result<bool, SequencerError> {
        if first_level {
            debug!(
                "first-level connection bypasses invite gating for account {}",
                account_id
            );
        }
        let usage = self.usage_today(account_id)?;
        Ok(usage.messages_sent < self.max_messages_per_day)
    }

    pub fn record_invite(&self, account_id: &str) -> Result<(), SequencerError> {
        self.store
            .increment_usage(account_id, Utc::now().date_naive(), UsageKind::Invite)
    }

    pub fn record_message(&self, account_id: &str) -> Result<(), SequencerError> {
        self.store
            .increment_usage(account_id, Utc::now().date_naive(), UsageKind::Message)
    }
}
