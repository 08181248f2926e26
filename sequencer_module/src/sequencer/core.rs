use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration as StdDuration;

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use linkedin_module::LinkedInProvider;
use rand::Rng;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::calendar;
use crate::config::OutreachConfig;

use super::delay;
use super::engine::SequenceEngine;
use super::executor::StepExecutor;
use super::limits::RateLimiter;
use super::store::SqliteOutreachStore;
use super::types::{
    Campaign, CampaignStatus, Lead, LeadStatus, LinkedInAccount, SequencerError, Step, StepAction,
};

const WEEKEND_SLEEP_SECS: u64 = 3600;

const PROCESSABLE_STATUSES: &[LeadStatus] = &[
    LeadStatus::PendingInvite,
    LeadStatus::Connected,
    LeadStatus::Messaged,
];

/// Everything a due step needs, resolved during the readiness check.
pub(super) struct ReadyStep {
    pub(super) campaign: Campaign,
    pub(super) account: LinkedInAccount,
    pub(super) step: Step,
}

/// The single long-running worker: iterates candidate leads, gates each on
/// time and rate limits, executes due steps through the sequence engine and
/// applies the resulting state transitions. Constructed explicitly by the
/// process composition root; started and stopped through `SchedulerControl`.
pub struct OutreachScheduler<P: LinkedInProvider> {
    store: SqliteOutreachStore,
    engine: SequenceEngine<P>,
    limiter: RateLimiter,
    provider: P,
    config: OutreachConfig,
    last_relation_poll: Option<DateTime<Utc>>,
    last_maintenance_day: Option<NaiveDate>,
    current_day: NaiveDate,
}

impl<P: LinkedInProvider + Clone> OutreachScheduler<P> {
    pub fn new(store: SqliteOutreachStore, provider: P, config: OutreachConfig) -> Self {
        let executor = StepExecutor::new(store.clone(), provider.clone());
        let engine = SequenceEngine::new(store.clone(), executor);
        let limiter = RateLimiter::new(store.clone(), &config);
        Self {
            store,
            engine,
            limiter,
            provider,
            config,
            last_relation_poll: None,
            last_maintenance_day: None,
            current_day: Utc::now().date_naive(),
        }
    }

    /// Runs until the stop flag is set. Iteration-level failures are logged
    /// and followed by a backoff; the loop itself never terminates on error.
    pub fn run_loop(&mut self, stop: &AtomicBool) {
        info!("outreach scheduler started");
        while !stop.load(Ordering::Relaxed) {
            if let Err(err) = self.run_iteration(stop) {
                error!("scheduler iteration failed: {}", err);
                sleep_with_stop(
                    StdDuration::from_secs(self.config.error_backoff_secs),
                    stop,
                );
            }
        }
        info!("outreach scheduler stopped");
    }

    fn run_iteration(&mut self, stop: &AtomicBool) -> Result<(), SequencerError> {
        let now = Utc::now();

        if calendar::is_weekend(Tz::UTC, now) {
            info!("weekend in UTC, skipping outreach for this iteration");
            sleep_with_stop(StdDuration::from_secs(WEEKEND_SLEEP_SECS), stop);
            return Ok(());
        }

        self.roll_over_day(now);
        self.poll_relations_if_due(now);
        self.run_nightly_jobs_if_due(now);
        self.process_leads(now)?;

        let upper = self.config.max_sleep_secs.max(self.config.min_sleep_secs);
        let sleep_secs = rand::thread_rng().gen_range(self.config.min_sleep_secs..=upper);
        sleep_with_stop(StdDuration::from_secs(sleep_secs), stop);
        Ok(())
    }

    /// Day-boundary bookkeeping; telemetry only, correctness comes from the
    /// persisted rate_usage rows.
    fn roll_over_day(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today != self.current_day {
            info!("day rolled over from {} to {}", self.current_day, today);
            self.current_day = today;
        }
    }

    pub(super) fn process_leads(&self, now: DateTime<Utc>) -> Result<(), SequencerError> {
        let leads = self.store.leads_with_status(PROCESSABLE_STATUSES)?;
        if !leads.is_empty() {
            info!("evaluating {} candidate lead(s)", leads.len());
        }
        for lead in leads {
            // One failing lead must not abort the batch.
            if let Err(err) = self.process_lead(lead.id, now) {
                error!("processing lead {} failed: {}", lead.id, err);
            }
        }
        Ok(())
    }

    fn process_lead(&self, lead_id: Uuid, now: DateTime<Utc>) -> Result<(), SequencerError> {
        let lead = self.store.get_lead(lead_id)?;
        let Some(ready) = self.evaluate_readiness(&lead, now)? else {
            return Ok(());
        };
        let result = self.engine.execute_step(lead.id, &ready.step, &ready.account)?;
        self.apply_transition(&lead, &ready, now, result.success, result.terminal, result.error)
    }

    /// The readiness predicate, evaluated fresh every iteration.
    pub(super) fn evaluate_readiness(
        &self,
        lead: &Lead,
        now: DateTime<Utc>,
    ) -> Result<Option<ReadyStep>, SequencerError> {
        if !lead.status.is_processable() {
            return Ok(None);
        }

        let Some(campaign) = self.store.get_campaign(lead.campaign_id)? else {
            debug!("lead {} has no campaign, skipping", lead.id);
            return Ok(None);
        };
        if campaign.status != CampaignStatus::Active {
            return Ok(None);
        }

        let Some(account) = self
            .store
            .connected_account_for_client(&campaign.client_id)?
        else {
            debug!(
                "no connected account for client {}, skipping lead {}",
                campaign.client_id, lead.id
            );
            return Ok(None);
        };

        if lead.current_step >= campaign.sequence.len() {
            self.store.update_lead_status(lead.id, LeadStatus::Completed)?;
            info!("lead {} completed its sequence", lead.id);
            return Ok(None);
        }
        let step = campaign.sequence[lead.current_step].clone();

        if let Some(sent_at) = lead.last_step_sent_at {
            let required = delay::delay_from(
                step.delay_hours,
                step.delay_working_days,
                Some(&campaign),
                now,
            );
            if now - sent_at < required {
                return Ok(None);
            }
        }

        let admitted = match lead.status {
            LeadStatus::PendingInvite => self.limiter.can_send_invite(&account.account_id)?,
            _ => self
                .limiter
                .can_send_message(&account.account_id, lead.first_level)?,
        };
        if !admitted {
            info!(
                "daily limit reached for account {}, deferring lead {}",
                account.account_id, lead.id
            );
            return Ok(None);
        }

        Ok(Some(ReadyStep {
            campaign,
            account,
            step,
        }))
    }

    fn apply_transition(
        &self,
        lead: &Lead,
        ready: &ReadyStep,
        now: DateTime<Utc>,
        success: bool,
        terminal: bool,
        error: Option<String>,
    ) -> Result<(), SequencerError> {
        if success {
            let next_step = lead.current_step + 1;
            self.store.advance_lead_step(lead.id, next_step, now)?;
            match ready.step.action {
                StepAction::ConnectionRequest => {
                    self.limiter.record_invite(&ready.account.account_id)?
                }
                StepAction::Message => self.limiter.record_message(&ready.account.account_id)?,
            }
            info!(
                "lead {} advanced to step {}/{}",
                lead.id,
                next_step,
                ready.campaign.sequence.len()
            );
        } else if terminal {
            self.store.update_lead_status(lead.id, LeadStatus::Error)?;
            warn!(
                "lead {} marked error: {}",
                lead.id,
                error.as_deref().unwrap_or("unknown")
            );
        } else {
            warn!(
                "{} step for lead {} failed, will retry: {}",
                ready.step.action.as_str(),
                lead.id,
                error.as_deref().unwrap_or("unknown")
            );
        }
        Ok(())
    }

    fn poll_relations_if_due(&mut self, now: DateTime<Utc>) {
        if let Some(last) = self.last_relation_poll {
            if now - last < chrono::Duration::minutes(self.config.relation_poll_minutes) {
                return;
            }
        }
        self.last_relation_poll = Some(now);
        if let Err(err) = self.poll_relations() {
            warn!("relation polling failed: {}", err);
        }
    }

    /// Out-of-band detection of accepted connections: any invite_sent lead
    /// whose member id shows up in the account's relations is connected now.
    pub(super) fn poll_relations(&self) -> Result<(), SequencerError> {
        for account in self.store.connected_accounts()? {
            let relations = match self.provider.get_relations(&account.account_id) {
                Ok(relations) => relations,
                Err(err) => {
                    warn!(
                        "relation fetch failed for account {}: {}",
                        account.account_id, err
                    );
                    continue;
                }
            };
            let connected_members: HashSet<String> = relations
                .into_iter()
                .map(|relation| relation.member_id)
                .collect();

            let mut accepted = 0usize;
            for lead in self.store.invite_sent_leads_for_client(&account.client_id)? {
                let Some(member_id) = lead.member_id.as_deref() else {
                    continue;
                };
                if connected_members.contains(member_id) {
                    self.store.update_lead_status(lead.id, LeadStatus::Connected)?;
                    accepted += 1;
                }
            }
            if accepted > 0 {
                info!(
                    "{} invitation(s) accepted for account {}",
                    accepted, account.account_id
                );
            }

            match self.provider.get_sent_invitations(&account.account_id) {
                Ok(invitations) => debug!(
                    "account {} has {} tracked invitation(s)",
                    account.account_id,
                    invitations.len()
                ),
                Err(err) => warn!(
                    "sent-invitation fetch failed for account {}: {}",
                    account.account_id, err
                ),
            }
        }
        Ok(())
    }

    fn run_nightly_jobs_if_due(&mut self, now: DateTime<Utc>) {
        if now.hour() != self.config.nightly_hour {
            return;
        }
        let today = now.date_naive();
        if self.last_maintenance_day == Some(today) {
            return;
        }
        self.last_maintenance_day = Some(today);

        info!("running nightly maintenance for {}", today);
        if let Err(err) = self.backfill_conversation_ids() {
            warn!("conversation-id backfill failed: {}", err);
        }
        if let Err(err) = self.backfill_rate_usage(today) {
            warn!("rate-usage backfill failed: {}", err);
        }
    }

    pub(super) fn backfill_conversation_ids(&self) -> Result<(), SequencerError> {
        let leads = self.store.leads_missing_conversation_id()?;
        if leads.is_empty() {
            return Ok(());
        }
        let mut by_campaign: HashMap<Uuid, Vec<Lead>> = HashMap::new();
        for lead in leads {
            by_campaign.entry(lead.campaign_id).or_default().push(lead);
        }
        for (campaign_id, leads) in by_campaign {
            // Campaign failures stay isolated from each other.
            if let Err(err) = self.backfill_campaign_conversations(campaign_id, &leads) {
                warn!(
                    "conversation backfill failed for campaign {}: {}",
                    campaign_id, err
                );
            }
        }
        Ok(())
    }

    fn backfill_campaign_conversations(
        &self,
        campaign_id: Uuid,
        leads: &[Lead],
    ) -> Result<(), SequencerError> {
        let Some(campaign) = self.store.get_campaign(campaign_id)? else {
            return Ok(());
        };
        let Some(account) = self
            .store
            .connected_account_for_client(&campaign.client_id)?
        else {
            return Ok(());
        };
        let mut found = 0usize;
        for lead in leads {
            if let Some(conversation_id) = self
                .provider
                .get_conversation_id(&account.account_id, &lead.public_identifier)?
            {
                self.store.set_conversation_id(lead.id, &conversation_id)?;
                found += 1;
            }
        }
        if found > 0 {
            info!(
                "backfilled {} conversation id(s) for campaign {}",
                found, campaign_id
            );
        }
        Ok(())
    }

    /// Zero-fill rate_usage rows for the trailing week, repairing gaps left
    /// by downtime or migration.
    pub(super) fn backfill_rate_usage(&self, today: NaiveDate) -> Result<(), SequencerError> {
        for account in self.store.connected_accounts()? {
            for offset in 0..7i64 {
                let day = today - chrono::Duration::days(offset);
                self.store.ensure_usage_row(&account.account_id, day)?;
            }
        }
        Ok(())
    }
}

fn sleep_with_stop(total: StdDuration, stop: &AtomicBool) {
    const SLICE: StdDuration = StdDuration::from_secs(1);
    let mut remaining = total;
    while !stop.load(Ordering::Relaxed) && remaining > StdDuration::ZERO {
        let chunk = remaining.min(SLICE);
        thread::sleep(chunk);
        remaining = remaining.saturating_sub(chunk);
    }
}

/// Handle for the background worker; stop is cooperative and bounded by the
/// one-second sleep slices the loop waits in.
pub struct SchedulerControl {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SchedulerControl {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn stop_and_join(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("scheduler worker panicked during shutdown");
            }
        }
    }
}

pub fn start_scheduler<P>(mut scheduler: OutreachScheduler<P>) -> SchedulerControl
where
    P: LinkedInProvider + Clone + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let worker_stop = stop.clone();
    let handle = thread::spawn(move || scheduler.run_loop(&worker_stop));
    SchedulerControl {
        stop,
        handle: Some(handle),
    }
}
