pub mod calendar;
pub mod config;

mod sequencer;

pub use sequencer::{
    minimum_delay, render_message, start_scheduler, step_delay, validate_sequence, AccountStatus,
    ActionResult, Campaign, CampaignStatus, EventKind, EventRecord, Lead, LeadStatus,
    LinkedInAccount, OutreachScheduler, RateLimiter, RateUsage, SchedulerControl, SequenceEngine,
    SequenceReport, SequencerError, SqliteOutreachStore, Step, StepAction, StepExecutor, UsageKind,
};
