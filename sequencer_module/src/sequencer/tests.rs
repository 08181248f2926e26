use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use linkedin_module::{LinkedInProvider, ProviderError, Relation, SendOutcome, SentInvitation};
use tempfile::TempDir;
use uuid::Uuid;

use crate::config::OutreachConfig;

use super::store::SqliteOutreachStore;
use super::types::{
    AccountStatus, Campaign, CampaignStatus, EventKind, Lead, LeadStatus, LinkedInAccount, Step,
    StepAction,
};
use super::OutreachScheduler;

#[derive(Clone, Default)]
struct MockProvider {
    calls: Arc<Mutex<Vec<String>>>,
    member_ids: Arc<Mutex<HashMap<String, String>>>,
    conversation_ids: Arc<Mutex<HashMap<String, String>>>,
    relations: Arc<Mutex<Vec<Relation>>>,
    fail_sends: Arc<AtomicBool>,
}

impl MockProvider {
    fn with_member(self, public_identifier: &str, member_id: &str) -> Self {
        self.member_ids
            .lock()
            .expect("lock")
            .insert(public_identifier.to_string(), member_id.to_string());
        self
    }

    fn with_conversation(self, public_identifier: &str, conversation_id: &str) -> Self {
        self.conversation_ids
            .lock()
            .expect("lock")
            .insert(public_identifier.to_string(), conversation_id.to_string());
        self
    }

    fn with_relation(self, member_id: &str) -> Self {
        self.relations.lock().expect("lock").push(Relation {
            member_id: member_id.to_string(),
            status: "connected".to_string(),
        });
        self
    }

    fn failing_sends(self) -> Self {
        self.fail_sends.store(true, Ordering::Relaxed);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("lock").push(call);
    }
}

impl LinkedInProvider for MockProvider {
    fn resolve_member_id(
        &self,
        _account_id: &str,
        public_identifier: &str,
    ) -> Result<Option<String>, ProviderError> {
        self.record(format!("resolve:{public_identifier}"));
        Ok(self
            .member_ids
            .lock()
            .expect("lock")
            .get(public_identifier)
            .cloned())
    }

    fn send_connection_request(
        &self,
        _account_id: &str,
        member_id: &str,
        _message: &str,
    ) -> Result<SendOutcome, ProviderError> {
        self.record(format!("invite:{member_id}"));
        if self.fail_sends.load(Ordering::Relaxed) {
            Ok(SendOutcome::rejected("provider returned status 500", None))
        } else {
            Ok(SendOutcome::ok(Some(
                serde_json::json!({"invitation_id": "inv-1"}),
            )))
        }
    }

    fn send_message(
        &self,
        _account_id: &str,
        conversation_id: &str,
        _message: &str,
    ) -> Result<SendOutcome, ProviderError> {
        self.record(format!("message:{conversation_id}"));
        if self.fail_sends.load(Ordering::Relaxed) {
            Ok(SendOutcome::rejected("provider returned status 500", None))
        } else {
            Ok(SendOutcome::ok(Some(
                serde_json::json!({"message_id": "msg-1"}),
            )))
        }
    }

    fn get_conversation_id(
        &self,
        _account_id: &str,
        public_identifier: &str,
    ) -> Result<Option<String>, ProviderError> {
        self.record(format!("conversation:{public_identifier}"));
        Ok(self
            .conversation_ids
            .lock()
            .expect("lock")
            .get(public_identifier)
            .cloned())
    }

    fn get_relations(&self, _account_id: &str) -> Result<Vec<Relation>, ProviderError> {
        self.record("relations".to_string());
        Ok(self.relations.lock().expect("lock").clone())
    }

    fn get_sent_invitations(
        &self,
        _account_id: &str,
    ) -> Result<Vec<SentInvitation>, ProviderError> {
        self.record("invitations".to_string());
        Ok(Vec::new())
    }
}

fn test_store(temp: &TempDir) -> SqliteOutreachStore {
    SqliteOutreachStore::new(temp.path().join("outreach.db")).expect("store")
}

fn sample_step(order: usize, action: StepAction, message: &str) -> Step {
    Step {
        step_order: order,
        action,
        message: message.to_string(),
        delay_hours: 0,
        delay_working_days: 0,
        min_delay_hours: None,
        min_delay_working_days: None,
    }
}

fn sample_sequence() -> Vec<Step> {
    let mut follow_up = sample_step(1, StepAction::Message, "Thanks {{first_name}}!");
    follow_up.delay_hours = 24;
    let mut nudge = sample_step(2, StepAction::Message, "Any thoughts at {{company}}?");
    nudge.delay_working_days = 3;
    let mut last = sample_step(3, StepAction::Message, "Last try, {{first_name}}");
    last.delay_hours = 48;
    vec![
        sample_step(0, StepAction::ConnectionRequest, "Hi {{first_name}}, let's connect"),
        follow_up,
        nudge,
        last,
    ]
}

fn insert_campaign(store: &SqliteOutreachStore, client_id: &str) -> Campaign {
    let campaign = Campaign {
        id: Uuid::new_v4(),
        name: "Founders Q3".to_string(),
        client_id: client_id.to_string(),
        status: CampaignStatus::Active,
        timezone: "UTC".to_string(),
        sequence: sample_sequence(),
    };
    store.insert_campaign(&campaign).expect("insert campaign");
    campaign
}

fn insert_account(store: &SqliteOutreachStore, client_id: &str, account_id: &str) {
    store
        .insert_account(&LinkedInAccount {
            account_id: account_id.to_string(),
            client_id: client_id.to_string(),
            status: AccountStatus::Connected,
        })
        .expect("insert account");
}

fn sample_lead(campaign_id: Uuid) -> Lead {
    Lead {
        id: Uuid::new_v4(),
        campaign_id,
        public_identifier: "jane-doe".to_string(),
        member_id: None,
        conversation_id: None,
        first_name: "Jane".to_string(),
        last_name: "Doe".to_string(),
        company: "Acme".to_string(),
        position: "CTO".to_string(),
        location: "Berlin".to_string(),
        industry: "Software".to_string(),
        first_level: false,
        status: LeadStatus::PendingInvite,
        current_step: 0,
        last_step_sent_at: None,
        invite_sent_at: None,
        last_message_sent_at: None,
    }
}

fn scheduler(
    store: &SqliteOutreachStore,
    provider: &MockProvider,
    config: OutreachConfig,
) -> OutreachScheduler<MockProvider> {
    OutreachScheduler::new(store.clone(), provider.clone(), config)
}

#[test]
fn first_step_sends_invite_and_advances() {
    let temp = TempDir::new().expect("tempdir");
    let store = test_store(&temp);
    let campaign = insert_campaign(&store, "client-1");
    insert_account(&store, "client-1", "acct-1");
    let lead = sample_lead(campaign.id);
    store.insert_lead(&lead).expect("insert lead");

    let provider = MockProvider::default().with_member("jane-doe", "m-42");
    let scheduler = scheduler(&store, &provider, OutreachConfig::default());
    scheduler.process_leads(Utc::now()).expect("process");

    let updated = store.get_lead(lead.id).expect("reload");
    assert_eq!(updated.status, LeadStatus::InviteSent);
    assert_eq!(updated.current_step, 1);
    assert!(updated.last_step_sent_at.is_some());
    assert!(updated.invite_sent_at.is_some());
    assert_eq!(updated.member_id.as_deref(), Some("m-42"));

    let kinds: Vec<EventKind> = store
        .events_for_lead(lead.id)
        .expect("events")
        .into_iter()
        .map(|event| event.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![EventKind::ConnectionRequestSent, EventKind::StepExecuted]
    );

    let usage = store
        .usage_on("acct-1", Utc::now().date_naive())
        .expect("usage")
        .expect("row");
    assert_eq!(usage.invites_sent, 1);
    assert_eq!(usage.messages_sent, 0);

    let calls = provider.calls();
    assert!(calls.contains(&"resolve:jane-doe".to_string()));
    assert!(calls.contains(&"invite:m-42".to_string()));
}

#[test]
fn working_day_delay_defers_even_after_minutes() {
    let temp = TempDir::new().expect("tempdir");
    let store = test_store(&temp);
    let campaign = insert_campaign(&store, "client-1");
    insert_account(&store, "client-1", "acct-1");

    let mut lead = sample_lead(campaign.id);
    lead.status = LeadStatus::Connected;
    lead.current_step = 2;
    lead.conversation_id = Some("conv-1".to_string());
    lead.last_step_sent_at = Some(Utc::now() - Duration::minutes(30));
    store.insert_lead(&lead).expect("insert lead");

    let provider = MockProvider::default();
    let scheduler = scheduler(&store, &provider, OutreachConfig::default());
    scheduler.process_leads(Utc::now()).expect("process");

    let updated = store.get_lead(lead.id).expect("reload");
    assert_eq!(updated.status, LeadStatus::Connected);
    assert_eq!(updated.current_step, 2);
    assert!(store.events_for_lead(lead.id).expect("events").is_empty());
    assert!(provider.calls().is_empty());
}

#[test]
fn elapsed_hour_delay_sends_follow_up() {
    let temp = TempDir::new().expect("tempdir");
    let store = test_store(&temp);
    let campaign = insert_campaign(&store, "client-1");
    insert_account(&store, "client-1", "acct-1");

    let mut lead = sample_lead(campaign.id);
    lead.status = LeadStatus::Connected;
    lead.current_step = 1;
    lead.conversation_id = Some("conv-1".to_string());
    lead.last_step_sent_at = Some(Utc::now() - Duration::hours(25));
    store.insert_lead(&lead).expect("insert lead");

    let provider = MockProvider::default();
    let scheduler = scheduler(&store, &provider, OutreachConfig::default());
    scheduler.process_leads(Utc::now()).expect("process");

    let updated = store.get_lead(lead.id).expect("reload");
    assert_eq!(updated.status, LeadStatus::Messaged);
    assert_eq!(updated.current_step, 2);
    assert!(updated.last_message_sent_at.is_some());
    assert!(provider.calls().contains(&"message:conv-1".to_string()));

    let usage = store
        .usage_on("acct-1", Utc::now().date_naive())
        .expect("usage")
        .expect("row");
    assert_eq!(usage.messages_sent, 1);
}

#[test]
fn invite_rate_limit_defers_lead() {
    let temp = TempDir::new().expect("tempdir");
    let store = test_store(&temp);
    let campaign = insert_campaign(&store, "client-1");
    insert_account(&store, "client-1", "acct-1");
    let lead = sample_lead(campaign.id);
    store.insert_lead(&lead).expect("insert lead");

    let config = OutreachConfig {
        max_connections_per_day: 1,
        ..OutreachConfig::default()
    };
    store
        .increment_usage("acct-1", Utc::now().date_naive(), super::store::UsageKind::Invite)
        .expect("exhaust");

    let provider = MockProvider::default().with_member("jane-doe", "m-42");
    let scheduler = scheduler(&store, &provider, config);
    scheduler.process_leads(Utc::now()).expect("process");

    let updated = store.get_lead(lead.id).expect("reload");
    assert_eq!(updated.status, LeadStatus::PendingInvite);
    assert_eq!(updated.current_step, 0);
    assert!(provider.calls().is_empty());
}

#[test]
fn unresolvable_identifier_fails_without_send() {
    let temp = TempDir::new().expect("tempdir");
    let store = test_store(&temp);
    let campaign = insert_campaign(&store, "client-1");
    insert_account(&store, "client-1", "acct-1");
    let lead = sample_lead(campaign.id);
    store.insert_lead(&lead).expect("insert lead");

    let provider = MockProvider::default();
    let scheduler = scheduler(&store, &provider, OutreachConfig::default());
    scheduler.process_leads(Utc::now()).expect("process");

    let updated = store.get_lead(lead.id).expect("reload");
    assert_eq!(updated.status, LeadStatus::PendingInvite);
    assert_eq!(updated.current_step, 0);

    let events = store.events_for_lead(lead.id).expect("events");
    let failures = events
        .iter()
        .filter(|event| event.kind == EventKind::ConnectionRequestFailed)
        .count();
    assert_eq!(failures, 1);
    assert!(!provider
        .calls()
        .iter()
        .any(|call| call.starts_with("invite:")));
}

#[test]
fn provider_rejection_leaves_step_for_retry() {
    let temp = TempDir::new().expect("tempdir");
    let store = test_store(&temp);
    let campaign = insert_campaign(&store, "client-1");
    insert_account(&store, "client-1", "acct-1");
    let lead = sample_lead(campaign.id);
    store.insert_lead(&lead).expect("insert lead");

    let provider = MockProvider::default()
        .with_member("jane-doe", "m-42")
        .failing_sends();
    let scheduler = scheduler(&store, &provider, OutreachConfig::default());
    scheduler.process_leads(Utc::now()).expect("process");

    let updated = store.get_lead(lead.id).expect("reload");
    assert_eq!(updated.status, LeadStatus::PendingInvite);
    assert_eq!(updated.current_step, 0);
    assert!(updated.last_step_sent_at.is_none());

    let events = store.events_for_lead(lead.id).expect("events");
    assert!(events
        .iter()
        .any(|event| event.kind == EventKind::ConnectionRequestFailed));
    // No usage is recorded for a failed send.
    assert!(store
        .usage_on("acct-1", Utc::now().date_naive())
        .expect("usage")
        .is_none());
}

#[test]
fn missing_conversation_id_is_terminal() {
    let temp = TempDir::new().expect("tempdir");
    let store = test_store(&temp);
    let campaign = insert_campaign(&store, "client-1");
    insert_account(&store, "client-1", "acct-1");

    let mut lead = sample_lead(campaign.id);
    lead.status = LeadStatus::Connected;
    lead.current_step = 1;
    lead.last_step_sent_at = Some(Utc::now() - Duration::hours(25));
    store.insert_lead(&lead).expect("insert lead");

    let provider = MockProvider::default();
    let scheduler = scheduler(&store, &provider, OutreachConfig::default());
    scheduler.process_leads(Utc::now()).expect("process");

    let updated = store.get_lead(lead.id).expect("reload");
    assert_eq!(updated.status, LeadStatus::Error);
    assert_eq!(updated.current_step, 1);

    let events = store.events_for_lead(lead.id).expect("events");
    assert!(events
        .iter()
        .any(|event| event.kind == EventKind::MessageFailed));
}

#[test]
fn exhausted_sequence_marks_lead_completed() {
    let temp = TempDir::new().expect("tempdir");
    let store = test_store(&temp);
    let campaign = insert_campaign(&store, "client-1");
    insert_account(&store, "client-1", "acct-1");

    let mut lead = sample_lead(campaign.id);
    lead.status = LeadStatus::Messaged;
    lead.current_step = campaign.sequence.len();
    lead.conversation_id = Some("conv-1".to_string());
    store.insert_lead(&lead).expect("insert lead");

    let provider = MockProvider::default();
    let scheduler = scheduler(&store, &provider, OutreachConfig::default());
    scheduler.process_leads(Utc::now()).expect("process");

    let updated = store.get_lead(lead.id).expect("reload");
    assert_eq!(updated.status, LeadStatus::Completed);
    assert!(provider.calls().is_empty());
}

#[test]
fn paused_campaign_is_not_processed() {
    let temp = TempDir::new().expect("tempdir");
    let store = test_store(&temp);
    let campaign = Campaign {
        id: Uuid::new_v4(),
        name: "Paused".to_string(),
        client_id: "client-1".to_string(),
        status: CampaignStatus::Paused,
        timezone: "UTC".to_string(),
        sequence: sample_sequence(),
    };
    store.insert_campaign(&campaign).expect("insert campaign");
    insert_account(&store, "client-1", "acct-1");
    let lead = sample_lead(campaign.id);
    store.insert_lead(&lead).expect("insert lead");

    let provider = MockProvider::default().with_member("jane-doe", "m-42");
    let scheduler = scheduler(&store, &provider, OutreachConfig::default());
    scheduler.process_leads(Utc::now()).expect("process");

    let updated = store.get_lead(lead.id).expect("reload");
    assert_eq!(updated.status, LeadStatus::PendingInvite);
    assert!(provider.calls().is_empty());
}

#[test]
fn relation_poll_marks_accepted_invites_connected() {
    let temp = TempDir::new().expect("tempdir");
    let store = test_store(&temp);
    let campaign = insert_campaign(&store, "client-1");
    insert_account(&store, "client-1", "acct-1");

    let mut accepted = sample_lead(campaign.id);
    accepted.status = LeadStatus::InviteSent;
    accepted.member_id = Some("m-42".to_string());
    store.insert_lead(&accepted).expect("insert lead");

    let mut still_pending = sample_lead(campaign.id);
    still_pending.public_identifier = "john-smith".to_string();
    still_pending.status = LeadStatus::InviteSent;
    still_pending.member_id = Some("m-99".to_string());
    store.insert_lead(&still_pending).expect("insert lead");

    let provider = MockProvider::default().with_relation("m-42");
    let scheduler = scheduler(&store, &provider, OutreachConfig::default());
    scheduler.poll_relations().expect("poll");

    assert_eq!(
        store.get_lead(accepted.id).expect("reload").status,
        LeadStatus::Connected
    );
    assert_eq!(
        store.get_lead(still_pending.id).expect("reload").status,
        LeadStatus::InviteSent
    );
}

#[test]
fn nightly_backfill_fills_last_seven_days() {
    let temp = TempDir::new().expect("tempdir");
    let store = test_store(&temp);
    insert_account(&store, "client-1", "acct-1");

    let provider = MockProvider::default();
    let scheduler = scheduler(&store, &provider, OutreachConfig::default());
    let today = Utc::now().date_naive();
    scheduler.backfill_rate_usage(today).expect("backfill");

    for offset in 0..7 {
        let day = today - Duration::days(offset);
        let usage = store.usage_on("acct-1", day).expect("usage");
        assert!(usage.is_some(), "missing rate_usage row for {day}");
    }
}

#[test]
fn conversation_backfill_persists_found_ids() {
    let temp = TempDir::new().expect("tempdir");
    let store = test_store(&temp);
    let campaign = insert_campaign(&store, "client-1");
    insert_account(&store, "client-1", "acct-1");

    let mut lead = sample_lead(campaign.id);
    lead.status = LeadStatus::Connected;
    store.insert_lead(&lead).expect("insert lead");

    let mut unknown = sample_lead(campaign.id);
    unknown.public_identifier = "john-smith".to_string();
    unknown.status = LeadStatus::Connected;
    store.insert_lead(&unknown).expect("insert lead");

    let provider = MockProvider::default().with_conversation("jane-doe", "conv-9");
    let scheduler = scheduler(&store, &provider, OutreachConfig::default());
    scheduler.backfill_conversation_ids().expect("backfill");

    assert_eq!(
        store
            .get_lead(lead.id)
            .expect("reload")
            .conversation_id
            .as_deref(),
        Some("conv-9")
    );
    assert!(store
        .get_lead(unknown.id)
        .expect("reload")
        .conversation_id
        .is_none());
}

#[test]
fn store_round_trips_campaign_and_lead() {
    let temp = TempDir::new().expect("tempdir");
    let store = test_store(&temp);
    let campaign = insert_campaign(&store, "client-1");
    let lead = sample_lead(campaign.id);
    store.insert_lead(&lead).expect("insert lead");

    let loaded = store.get_campaign(campaign.id).expect("get").expect("campaign");
    assert_eq!(loaded.sequence.len(), 4);
    assert_eq!(loaded.sequence[0].action, StepAction::ConnectionRequest);
    assert_eq!(loaded.timezone, "UTC");

    let reloaded = store.get_lead(lead.id).expect("get lead");
    assert_eq!(reloaded.public_identifier, "jane-doe");
    assert_eq!(reloaded.status, LeadStatus::PendingInvite);
    assert!(!reloaded.first_level);
}
