use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;
use uuid::Uuid;

use super::types::{
    AccountStatus, Campaign, CampaignStatus, EventKind, EventRecord, Lead, LeadStatus,
    LinkedInAccount, RateUsage, SequencerError,
};
use super::utils::{bool_to_int, format_datetime, parse_datetime, parse_optional_datetime};

mod schema;

use schema::OUTREACH_SCHEMA;

/// Which daily counter an outbound action consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageKind {
    Invite,
    Message,
}

const LEAD_COLUMNS: &str = "id, campaign_id, public_identifier, member_id, conversation_id, \
     first_name, last_name, company, position, location, industry, first_level, status, \
     current_step, last_step_sent_at, invite_sent_at, last_message_sent_at";

const LEAD_COLUMNS_PREFIXED: &str = "l.id, l.campaign_id, l.public_identifier, l.member_id, \
     l.conversation_id, l.first_name, l.last_name, l.company, l.position, l.location, \
     l.industry, l.first_level, l.status, l.current_step, l.last_step_sent_at, \
     l.invite_sent_at, l.last_message_sent_at";

struct LeadRow {
    id: String,
    campaign_id: String,
    public_identifier: String,
    member_id: Option<String>,
    conversation_id: Option<String>,
    first_name: String,
    last_name: String,
    company: String,
    position: String,
    location: String,
    industry: String,
    first_level: i64,
    status: String,
    current_step: i64,
    last_step_sent_at: Option<String>,
    invite_sent_at: Option<String>,
    last_message_sent_at: Option<String>,
}

fn read_lead_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LeadRow> {
    Ok(LeadRow {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        public_identifier: row.get(2)?,
        member_id: row.get(3)?,
        conversation_id: row.get(4)?,
        first_name: row.get(5)?,
        last_name: row.get(6)?,
        company: row.get(7)?,
        position: row.get(8)?,
        location: row.get(9)?,
        industry: row.get(10)?,
        first_level: row.get(11)?,
        status: row.get(12)?,
        current_step: row.get(13)?,
        last_step_sent_at: row.get(14)?,
        invite_sent_at: row.get(15)?,
        last_message_sent_at: row.get(16)?,
    })
}

fn lead_from_row(raw: LeadRow) -> Result<Lead, SequencerError> {
    Ok(Lead {
        id: Uuid::parse_str(&raw.id)?,
        campaign_id: Uuid::parse_str(&raw.campaign_id)?,
        public_identifier: raw.public_identifier,
        member_id: raw.member_id,
        conversation_id: raw.conversation_id,
        first_name: raw.first_name,
        last_name: raw.last_name,
        company: raw.company,
        position: raw.position,
        location: raw.location,
        industry: raw.industry,
        first_level: raw.first_level != 0,
        status: LeadStatus::parse(&raw.status)?,
        current_step: raw.current_step.max(0) as usize,
        last_step_sent_at: parse_optional_datetime(raw.last_step_sent_at.as_deref())?,
        invite_sent_at: parse_optional_datetime(raw.invite_sent_at.as_deref())?,
        last_message_sent_at: parse_optional_datetime(raw.last_message_sent_at.as_deref())?,
    })
}

#[derive(Debug, Clone)]
pub struct SqliteOutreachStore {
    path: PathBuf,
}

impl SqliteOutreachStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, SequencerError> {
        let store = Self { path: path.into() };
        let _ = store.open()?;
        Ok(store)
    }

    fn open(&self) -> Result<Connection, SequencerError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(OUTREACH_SCHEMA)?;
        Ok(conn)
    }

    // ------------------------------------------------------------------
    // Campaigns
    // ------------------------------------------------------------------

    pub fn insert_campaign(&self, campaign: &Campaign) -> Result<(), SequencerError> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO campaigns (id, name, client_id, status, timezone, sequence, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                campaign.id.to_string(),
                campaign.name,
                campaign.client_id,
                campaign.status.as_str(),
                campaign.timezone,
                serde_json::to_string(&campaign.sequence)?,
                format_datetime(Utc::now()),
            ],
        )?;
        Ok(())
    }

    pub fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>, SequencerError> {
        let conn = self.open()?;
        let raw = conn
            .query_row(
                "SELECT id, name, client_id, status, timezone, sequence
                 FROM campaigns WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;
        let Some((id_raw, name, client_id, status_raw, timezone, sequence_raw)) = raw else {
            return Ok(None);
        };
        Ok(Some(Campaign {
            id: Uuid::parse_str(&id_raw)?,
            name,
            client_id,
            status: CampaignStatus::parse(&status_raw)?,
            timezone,
            sequence: serde_json::from_str(&sequence_raw)?,
        }))
    }

    // ------------------------------------------------------------------
    // Accounts
    // ------------------------------------------------------------------

    pub fn insert_account(&self, account: &LinkedInAccount) -> Result<(), SequencerError> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO linkedin_accounts (account_id, client_id, status)
             VALUES (?1, ?2, ?3)",
            params![
                account.account_id,
                account.client_id,
                account.status.as_str()
            ],
        )?;
        Ok(())
    }

    pub fn connected_account_for_client(
        &self,
        client_id: &str,
    ) -> Result<Option<LinkedInAccount>, SequencerError> {
        let conn = self.open()?;
        let raw = conn
            .query_row(
                "SELECT account_id, client_id, status FROM linkedin_accounts
                 WHERE client_id = ?1 AND status = 'connected'
                 LIMIT 1",
                params![client_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((account_id, client_id, status_raw)) = raw else {
            return Ok(None);
        };
        Ok(Some(LinkedInAccount {
            account_id,
            client_id,
            status: AccountStatus::parse(&status_raw)?,
        }))
    }

    pub fn connected_accounts(&self) -> Result<Vec<LinkedInAccount>, SequencerError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT account_id, client_id, status FROM linkedin_accounts
             WHERE status = 'connected'
             ORDER BY account_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut accounts = Vec::new();
        for row in rows {
            let (account_id, client_id, status_raw) = row?;
            accounts.push(LinkedInAccount {
                account_id,
                client_id,
                status: AccountStatus::parse(&status_raw)?,
            });
        }
        Ok(accounts)
    }

    // ------------------------------------------------------------------
    // Leads
    // ------------------------------------------------------------------

    pub fn insert_lead(&self, lead: &Lead) -> Result<(), SequencerError> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO leads (id, campaign_id, public_identifier, member_id, conversation_id,
                 first_name, last_name, company, position, location, industry, first_level,
                 status, current_step, last_step_sent_at, invite_sent_at, last_message_sent_at,
                 created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                lead.id.to_string(),
                lead.campaign_id.to_string(),
                lead.public_identifier,
                lead.member_id,
                lead.conversation_id,
                lead.first_name,
                lead.last_name,
                lead.company,
                lead.position,
                lead.location,
                lead.industry,
                bool_to_int(lead.first_level),
                lead.status.as_str(),
                lead.current_step as i64,
                lead.last_step_sent_at.map(format_datetime),
                lead.invite_sent_at.map(format_datetime),
                lead.last_message_sent_at.map(format_datetime),
                format_datetime(Utc::now()),
            ],
        )?;
        Ok(())
    }

    /// Fresh read of a lead's persisted state; the defense against stale
    /// in-memory copies across loop iterations.
    pub fn get_lead(&self, id: Uuid) -> Result<Lead, SequencerError> {
        let conn = self.open()?;
        let raw = conn
            .query_row(
                &format!("SELECT {} FROM leads WHERE id = ?1", LEAD_COLUMNS),
                params![id.to_string()],
                read_lead_row,
            )
            .optional()?;
        match raw {
            Some(raw) => lead_from_row(raw),
            None => Err(SequencerError::LeadNotFound(id)),
        }
    }

    pub fn leads_with_status(&self, statuses: &[LeadStatus]) -> Result<Vec<Lead>, SequencerError> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.open()?;
        let placeholders = vec!["?"; statuses.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM leads WHERE status IN ({}) ORDER BY created_at",
            LEAD_COLUMNS, placeholders
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params_from_iter(statuses.iter().map(|status| status.as_str())),
            read_lead_row,
        )?;
        let mut leads = Vec::new();
        for row in rows {
            leads.push(lead_from_row(row?)?);
        }
        Ok(leads)
    }

    pub fn invite_sent_leads_for_client(
        &self,
        client_id: &str,
    ) -> Result<Vec<Lead>, SequencerError> {
        let conn = self.open()?;
        let sql = format!(
            "SELECT {} FROM leads l
             JOIN campaigns c ON c.id = l.campaign_id
             WHERE c.client_id = ?1 AND l.status = 'invite_sent'
             ORDER BY l.created_at",
            LEAD_COLUMNS_PREFIXED
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![client_id], read_lead_row)?;
        let mut leads = Vec::new();
        for row in rows {
            leads.push(lead_from_row(row?)?);
        }
        Ok(leads)
    }

    pub fn leads_missing_conversation_id(&self) -> Result<Vec<Lead>, SequencerError> {
        let conn = self.open()?;
        let sql = format!(
            "SELECT {} FROM leads
             WHERE conversation_id IS NULL
               AND status IN ('connected', 'messaged', 'responded')
             ORDER BY created_at",
            LEAD_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], read_lead_row)?;
        let mut leads = Vec::new();
        for row in rows {
            leads.push(lead_from_row(row?)?);
        }
        Ok(leads)
    }

    pub fn update_lead_status(&self, id: Uuid, status: LeadStatus) -> Result<(), SequencerError> {
        let conn = self.open()?;
        conn.execute(
            "UPDATE leads SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id.to_string()],
        )?;
        Ok(())
    }

    pub fn advance_lead_step(
        &self,
        id: Uuid,
        next_step: usize,
        sent_at: DateTime<Utc>,
    ) -> Result<(), SequencerError> {
        let conn = self.open()?;
        conn.execute(
            "UPDATE leads SET current_step = ?1, last_step_sent_at = ?2 WHERE id = ?3",
            params![
                next_step as i64,
                format_datetime(sent_at),
                id.to_string()
            ],
        )?;
        Ok(())
    }

    pub fn mark_invite_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), SequencerError> {
        let conn = self.open()?;
        conn.execute(
            "UPDATE leads SET status = 'invite_sent', invite_sent_at = ?1 WHERE id = ?2",
            params![format_datetime(at), id.to_string()],
        )?;
        Ok(())
    }

    pub fn mark_message_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), SequencerError> {
        let conn = self.open()?;
        conn.execute(
            "UPDATE leads SET status = 'messaged', last_message_sent_at = ?1 WHERE id = ?2",
            params![format_datetime(at), id.to_string()],
        )?;
        Ok(())
    }

    pub fn set_member_id(&self, id: Uuid, member_id: &str) -> Result<(), SequencerError> {
        let conn = self.open()?;
        conn.execute(
            "UPDATE leads SET member_id = ?1 WHERE id = ?2",
            params![member_id, id.to_string()],
        )?;
        Ok(())
    }

    pub fn set_conversation_id(
        &self,
        id: Uuid,
        conversation_id: &str,
    ) -> Result<(), SequencerError> {
        let conn = self.open()?;
        conn.execute(
            "UPDATE leads SET conversation_id = ?1 WHERE id = ?2",
            params![conversation_id, id.to_string()],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Rate usage
    // ------------------------------------------------------------------

    pub fn usage_on(
        &self,
        account_id: &str,
        day: NaiveDate,
    ) -> Result<Option<RateUsage>, SequencerError> {
        let conn = self.open()?;
        let usage = conn
            .query_row(
                "SELECT invites_sent, messages_sent FROM rate_usage
                 WHERE account_id = ?1 AND day = ?2",
                params![account_id, day.to_string()],
                |row| {
                    Ok(RateUsage {
                        invites_sent: row.get(0)?,
                        messages_sent: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(usage)
    }

    /// Create-or-bump the day's counter row. Runs as an IMMEDIATE
    /// transaction so two workers racing on the same account/day serialize
    /// on the write lock instead of losing an update.
    pub fn increment_usage(
        &self,
        account_id: &str,
        day: NaiveDate,
        kind: UsageKind,
    ) -> Result<(), SequencerError> {
        let mut conn = self.open()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let sql = match kind {
            UsageKind::Invite => {
                "INSERT INTO rate_usage (account_id, day, invites_sent, messages_sent)
                 VALUES (?1, ?2, 1, 0)
                 ON CONFLICT (account_id, day) DO UPDATE SET invites_sent = invites_sent + 1"
            }
            UsageKind::Message => {
                "INSERT INTO rate_usage (account_id, day, invites_sent, messages_sent)
                 VALUES (?1, ?2, 0, 1)
                 ON CONFLICT (account_id, day) DO UPDATE SET messages_sent = messages_sent + 1"
            }
        };
        tx.execute(sql, params![account_id, day.to_string()])?;
        tx.commit()?;
        Ok(())
    }

    /// Zero-filled insert for backfill; existing rows are left untouched.
    pub fn ensure_usage_row(&self, account_id: &str, day: NaiveDate) -> Result<(), SequencerError> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO rate_usage (account_id, day, invites_sent, messages_sent)
             VALUES (?1, ?2, 0, 0)
             ON CONFLICT (account_id, day) DO NOTHING",
            params![account_id, day.to_string()],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Append one audit event. Each call commits on its own connection, so
    /// the record survives regardless of what happens to the step around it.
    pub fn insert_event<T: Serialize>(
        &self,
        lead_id: Uuid,
        kind: EventKind,
        payload: &T,
    ) -> Result<Uuid, SequencerError> {
        let conn = self.open()?;
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO events (id, lead_id, event_type, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id.to_string(),
                lead_id.to_string(),
                kind.as_str(),
                serde_json::to_string(payload)?,
                format_datetime(Utc::now()),
            ],
        )?;
        Ok(id)
    }

    pub fn events_for_lead(&self, lead_id: Uuid) -> Result<Vec<EventRecord>, SequencerError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, lead_id, event_type, metadata, created_at FROM events
             WHERE lead_id = ?1
             ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![lead_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;
        let mut events = Vec::new();
        for row in rows {
            let (id_raw, lead_raw, kind_raw, metadata_raw, created_at_raw) = row?;
            events.push(EventRecord {
                id: Uuid::parse_str(&id_raw)?,
                lead_id: Uuid::parse_str(&lead_raw)?,
                kind: EventKind::parse(&kind_raw)?,
                metadata: serde_json::from_str(&metadata_raw)?,
                created_at: parse_datetime(&created_at_raw)?,
            });
        }
        Ok(events)
    }
}
