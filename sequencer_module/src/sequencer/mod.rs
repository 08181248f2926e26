mod core;
mod delay;
mod engine;
mod executor;
mod formatter;
mod limits;
mod store;
mod types;
mod utils;

pub use self::core::{start_scheduler, OutreachScheduler, SchedulerControl};
pub use delay::{minimum_delay, step_delay};
pub use engine::{validate_sequence, SequenceEngine};
pub use executor::StepExecutor;
pub use formatter::render_message;
pub use limits::RateLimiter;
pub use store::{SqliteOutreachStore, UsageKind};
pub use types::{
    AccountStatus, ActionResult, Campaign, CampaignStatus, EventKind, EventRecord, Lead,
    LeadStatus, LinkedInAccount, RateUsage, SequenceReport, SequencerError, Step, StepAction,
};

#[cfg(test)]
mod tests;
