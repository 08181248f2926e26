use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::calendar;

use super::types::{Campaign, Step};

/// Conservative fallback when a step's delay cannot be computed: a malformed
/// step must never fire early.
pub(crate) const FALLBACK_DELAY_HOURS: i64 = 24;

/// The wait a lead must observe after its previous step before this one may
/// fire.
pub fn step_delay(step: &Step, campaign: Option<&Campaign>) -> Duration {
    delay_from(
        step.delay_hours,
        step.delay_working_days,
        campaign,
        Utc::now(),
    )
}

/// Same computation sourced from the optional minimum-delay fields. Absent
/// fields mean zero delay; absence is valid, so no 24 h fallback here.
pub fn minimum_delay(step: &Step, campaign: Option<&Campaign>) -> Duration {
    let hours = step.min_delay_hours.unwrap_or(0).max(0);
    let working_days = step.min_delay_working_days.unwrap_or(0).max(0);
    let mut total = Duration::hours(hours);
    if let Some(campaign) = campaign {
        total = total + working_days_delay(campaign, working_days, Utc::now());
    }
    total
}

pub(super) fn delay_from(
    delay_hours: i64,
    delay_working_days: i64,
    campaign: Option<&Campaign>,
    now: DateTime<Utc>,
) -> Duration {
    if delay_hours < 0 || delay_working_days < 0 {
        warn!(
            "negative step delay ({} h, {} working days), using {} h fallback",
            delay_hours, delay_working_days, FALLBACK_DELAY_HOURS
        );
        return Duration::hours(FALLBACK_DELAY_HOURS);
    }
    let mut total = Duration::hours(delay_hours);
    if let Some(campaign) = campaign {
        total = total + working_days_delay(campaign, delay_working_days, now);
    }
    total
}

fn working_days_delay(campaign: &Campaign, days: i64, now: DateTime<Utc>) -> Duration {
    if days <= 0 {
        return Duration::zero();
    }
    let target = calendar::add_working_days(campaign.tz(), now, days);
    let delta = target - now;
    if delta < Duration::zero() {
        warn!(
            "working-day delay for campaign {} computed negative, using {} h fallback",
            campaign.id, FALLBACK_DELAY_HOURS
        );
        return Duration::hours(FALLBACK_DELAY_HOURS);
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::types::{CampaignStatus, StepAction};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn campaign(timezone: &str) -> Campaign {
        Campaign {
            id: Uuid::new_v4(),
            name: "Q3 outreach".to_string(),
            client_id: "client-1".to_string(),
            status: CampaignStatus::Active,
            timezone: timezone.to_string(),
            sequence: Vec::new(),
        }
    }

    fn step(delay_hours: i64, delay_working_days: i64) -> Step {
        Step {
            step_order: 0,
            action: StepAction::Message,
            message: "hello".to_string(),
            delay_hours,
            delay_working_days,
            min_delay_hours: None,
            min_delay_working_days: None,
        }
    }

    #[test]
    fn hours_only_delay() {
        let campaign = campaign("UTC");
        let now = Utc.with_ymd_and_hms(2026, 8, 5, 12, 0, 0).unwrap();
        let delay = delay_from(6, 0, Some(&campaign), now);
        assert_eq!(delay, Duration::hours(6));
    }

    #[test]
    fn working_days_extend_the_delay() {
        let campaign = campaign("UTC");
        // Wednesday noon + 3 working days = Monday noon, 5 calendar days out.
        let wednesday = Utc.with_ymd_and_hms(2026, 8, 5, 12, 0, 0).unwrap();
        let delay = delay_from(0, 3, Some(&campaign), wednesday);
        assert_eq!(delay, Duration::days(5));
    }

    #[test]
    fn negative_delay_uses_conservative_fallback() {
        let campaign = campaign("UTC");
        let now = Utc::now();
        let delay = delay_from(-1, 0, Some(&campaign), now);
        assert_eq!(delay, Duration::hours(FALLBACK_DELAY_HOURS));
    }

    #[test]
    fn no_campaign_skips_working_day_arithmetic() {
        let now = Utc::now();
        let delay = delay_from(2, 3, None, now);
        assert_eq!(delay, Duration::hours(2));
    }

    #[test]
    fn minimum_delay_defaults_to_zero() {
        let campaign = campaign("UTC");
        let step = step(48, 0);
        assert_eq!(minimum_delay(&step, Some(&campaign)), Duration::zero());
    }

    #[test]
    fn minimum_delay_reads_min_fields() {
        let campaign = campaign("UTC");
        let mut step = step(48, 0);
        step.min_delay_hours = Some(12);
        assert_eq!(minimum_delay(&step, Some(&campaign)), Duration::hours(12));
    }
}
