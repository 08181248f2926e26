pub(crate) const OUTREACH_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS campaigns (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    client_id TEXT NOT NULL,
    status TEXT NOT NULL,
    timezone TEXT NOT NULL,
    sequence TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS leads (
    id TEXT PRIMARY KEY,
    campaign_id TEXT NOT NULL,
    public_identifier TEXT NOT NULL,
    member_id TEXT,
    conversation_id TEXT,
    first_name TEXT NOT NULL DEFAULT '',
    last_name TEXT NOT NULL DEFAULT '',
    company TEXT NOT NULL DEFAULT '',
    position TEXT NOT NULL DEFAULT '',
    location TEXT NOT NULL DEFAULT '',
    industry TEXT NOT NULL DEFAULT '',
    first_level INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    current_step INTEGER NOT NULL DEFAULT 0,
    last_step_sent_at TEXT,
    invite_sent_at TEXT,
    last_message_sent_at TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_leads_status ON leads (status);
CREATE INDEX IF NOT EXISTS idx_leads_campaign ON leads (campaign_id);

CREATE TABLE IF NOT EXISTS linkedin_accounts (
    account_id TEXT PRIMARY KEY,
    client_id TEXT NOT NULL,
    status TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_accounts_client ON linkedin_accounts (client_id);

CREATE TABLE IF NOT EXISTS rate_usage (
    account_id TEXT NOT NULL,
    day TEXT NOT NULL,
    invites_sent INTEGER NOT NULL DEFAULT 0,
    messages_sent INTEGER NOT NULL DEFAULT 0,
    UNIQUE (account_id, day)
);

CREATE TABLE IF NOT EXISTS events (
    id TEXT PRIMARY KEY,
    lead_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    metadata TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_events_lead ON events (lead_id);
";
