use chrono::Utc;
use linkedin_module::LinkedInProvider;
use tracing::{info, warn};

use super::store::SqliteOutreachStore;
use super::types::{
    ActionEventPayload, ActionResult, EventKind, Lead, LinkedInAccount, SequencerError,
};

/// Performs the provider calls for one step and records their outcomes as
/// immutable events. Every call writes exactly one domain event, committed
/// independently of what the caller does with the result.
pub struct StepExecutor<P: LinkedInProvider> {
    store: SqliteOutreachStore,
    provider: P,
}

impl<P: LinkedInProvider> StepExecutor<P> {
    pub fn new(store: SqliteOutreachStore, provider: P) -> Self {
        Self { store, provider }
    }

    pub fn send_connection_request(
        &self,
        lead: &Lead,
        account: &LinkedInAccount,
        message: &str,
    ) -> Result<ActionResult, SequencerError> {
        if lead.public_identifier.trim().is_empty() {
            return self.record_invite_failure(
                lead,
                None,
                ActionResult::terminal("lead has no public identifier"),
            );
        }
        if message.trim().is_empty() {
            return self.record_invite_failure(
                lead,
                None,
                ActionResult::terminal("connection request message is empty"),
            );
        }

        // The send must use the provider's opaque member id; a vanity
        // identifier is never a valid send target.
        let member_id = match &lead.member_id {
            Some(cached) => cached.clone(),
            None => {
                let resolved = match self
                    .provider
                    .resolve_member_id(&account.account_id, &lead.public_identifier)
                {
                    Ok(resolved) => resolved,
                    Err(err) => {
                        return self.record_invite_failure(
                            lead,
                            None,
                            ActionResult::failed(format!("member id resolution failed: {}", err)),
                        );
                    }
                };
                match resolved {
                    Some(member_id) => {
                        self.store.set_member_id(lead.id, &member_id)?;
                        member_id
                    }
                    None => {
                        return self.record_invite_failure(
                            lead,
                            None,
                            ActionResult::failed(format!(
                                "no member id found for {}",
                                lead.public_identifier
                            )),
                        );
                    }
                }
            }
        };

        match self
            .provider
            .send_connection_request(&account.account_id, &member_id, message)
        {
            Ok(outcome) if outcome.success => {
                self.store.mark_invite_sent(lead.id, Utc::now())?;
                self.store.insert_event(
                    lead.id,
                    EventKind::ConnectionRequestSent,
                    &ActionEventPayload {
                        member_id: Some(member_id),
                        conversation_id: None,
                        provider_response: outcome.response.clone(),
                        error: None,
                    },
                )?;
                info!("connection request sent for lead {}", lead.id);
                Ok(ActionResult::ok(outcome.response))
            }
            Ok(outcome) => {
                let error = outcome
                    .error
                    .unwrap_or_else(|| "provider rejected connection request".to_string());
                self.record_invite_failure(
                    lead,
                    Some(member_id),
                    ActionResult::failed(error),
                )
            }
            Err(err) => self.record_invite_failure(
                lead,
                Some(member_id),
                ActionResult::failed(err.to_string()),
            ),
        }
    }

    pub fn send_message(
        &self,
        lead: &Lead,
        account: &LinkedInAccount,
        message: &str,
    ) -> Result<ActionResult, SequencerError> {
        let Some(conversation_id) = lead
            .conversation_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        else {
            return self.record_message_failure(
                lead,
                None,
                ActionResult::terminal("lead has no conversation id"),
            );
        };
        if message.trim().is_empty() {
            return self.record_message_failure(
                lead,
                Some(conversation_id.to_string()),
                ActionResult::terminal("message body is empty"),
            );
        }

        match self
            .provider
            .send_message(&account.account_id, conversation_id, message)
        {
            Ok(outcome) if outcome.success => {
                self.store.mark_message_sent(lead.id, Utc::now())?;
                self.store.insert_event(
                    lead.id,
                    EventKind::MessageSent,
                    &ActionEventPayload {
                        member_id: None,
                        conversation_id: Some(conversation_id.to_string()),
                        provider_response: outcome.response.clone(),
                        error: None,
                    },
                )?;
                info!("message sent for lead {}", lead.id);
                Ok(ActionResult::ok(outcome.response))
            }
            Ok(outcome) => {
                let error = outcome
                    .error
                    .unwrap_or_else(|| "provider rejected message".to_string());
                self.record_message_failure(
                    lead,
                    Some(conversation_id.to_string()),
                    ActionResult::failed(error),
                )
            }
            Err(err) => self.record_message_failure(
                lead,
                Some(conversation_id.to_string()),
                ActionResult::failed(err.to_string()),
            ),
        }
    }

    fn record_invite_failure(
        &self,
        lead: &Lead,
        member_id: Option<String>,
        result: ActionResult,
    ) -> Result<ActionResult, SequencerError> {
        warn!(
            "connection request failed for lead {}: {}",
            lead.id,
            result.error.as_deref().unwrap_or("unknown error")
        );
        self.store.insert_event(
            lead.id,
            EventKind::ConnectionRequestFailed,
            &ActionEventPayload {
                member_id,
                conversation_id: None,
                provider_response: result.provider_response.clone(),
                error: result.error.clone(),
            },
        )?;
        Ok(result)
    }

    fn record_message_failure(
        &self,
        lead: &Lead,
        conversation_id: Option<String>,
        result: ActionResult,
    ) -> Result<ActionResult, SequencerError> {
        warn!(
            "message failed for lead {}: {}",
            lead.id,
            result.error.as_deref().unwrap_or("unknown error")
        );
        self.store.insert_event(
            lead.id,
            EventKind::MessageFailed,
            &ActionEventPayload {
                member_id: None,
                conversation_id,
                provider_response: result.provider_response.clone(),
                error: result.error.clone(),
            },
        )?;
        Ok(result)
    }
}
