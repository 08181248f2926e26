use linkedin_module::LinkedInProvider;
use uuid::Uuid;

use super::executor::StepExecutor;
use super::formatter::{self, render_message};
use super::store::SqliteOutreachStore;
use super::types::{
    ActionResult, EventKind, LinkedInAccount, SequenceReport, SequencerError, Step, StepAction,
    StepExecutedPayload,
};

/// Executes one sequence step for one lead: reload, render, dispatch, audit.
/// The engine never advances `current_step`; the scheduler owns transitions.
pub struct SequenceEngine<P: LinkedInProvider> {
    store: SqliteOutreachStore,
    executor: StepExecutor<P>,
}

impl<P: LinkedInProvider> SequenceEngine<P> {
    pub fn new(store: SqliteOutreachStore, executor: StepExecutor<P>) -> Self {
        Self { store, executor }
    }

    pub fn execute_step(
        &self,
        lead_id: Uuid,
        step: &Step,
        account: &LinkedInAccount,
    ) -> Result<ActionResult, SequencerError> {
        let lead = self.store.get_lead(lead_id)?;
        let campaign = self
            .store
            .get_campaign(lead.campaign_id)?
            .ok_or(SequencerError::CampaignNotFound(lead.campaign_id))?;

        let message = render_message(&step.message, &lead, &campaign);

        let result = match step.action {
            StepAction::ConnectionRequest => {
                self.executor.send_connection_request(&lead, account, &message)?
            }
            StepAction::Message => self.executor.send_message(&lead, account, &message)?,
        };

        // Execution-audit event on top of the executor's domain event.
        self.store.insert_event(
            lead.id,
            EventKind::StepExecuted,
            &StepExecutedPayload {
                step,
                rendered_message: &message,
                success: result.success,
                error: result.error.clone(),
            },
        )?;

        Ok(result)
    }
}

/// Structural validation of a campaign sequence. Missing personalization is a
/// warning; everything else listed here blocks activation.
pub fn validate_sequence(steps: &[Step]) -> SequenceReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if steps.is_empty() {
        errors.push("sequence has no steps".to_string());
    }

    for step in steps {
        if step.message.trim().is_empty() {
            errors.push(format!("step {}: message is empty", step.step_order));
        }
        if step.delay_hours < 0 {
            errors.push(format!("step {}: negative delay_hours", step.step_order));
        }
        if step.delay_working_days < 0 {
            errors.push(format!(
                "step {}: negative delay_working_days",
                step.step_order
            ));
        }

        let found = formatter::placeholders(&step.message);
        if found.is_empty() && !step.message.trim().is_empty() {
            warnings.push(format!(
                "step {}: message has no personalization placeholders",
                step.step_order
            ));
        }
        for name in found {
            if !formatter::KNOWN_PLACEHOLDERS.contains(&name.as_str()) {
                warnings.push(format!(
                    "step {}: unrecognized placeholder {{{{{}}}}}",
                    step.step_order, name
                ));
            }
        }
    }

    SequenceReport {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}
