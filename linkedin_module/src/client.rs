use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{ProviderError, Relation, SendOutcome, SentInvitation};
use crate::LinkedInProvider;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Blocking HTTP client for the LinkedIn messaging provider.
///
/// Authenticates with a bearer token; all endpoints exchange JSON bodies.
#[derive(Debug, Clone)]
pub struct HttpLinkedInClient {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Serialize)]
struct InviteRequest<'a> {
    account_id: &'a str,
    member_id: &'a str,
    message: &'a str,
}

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    account_id: &'a str,
    conversation_id: &'a str,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct MemberLookupResponse {
    #[serde(default)]
    member_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConversationLookupResponse {
    #[serde(default)]
    conversation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RelationsResponse {
    #[serde(default)]
    items: Vec<Relation>,
}

#[derive(Debug, Deserialize)]
struct InvitationsResponse {
    #[serde(default)]
    items: Vec<SentInvitation>,
}

impl HttpLinkedInClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        dotenvy::dotenv().ok();
        let base_url = env::var("LINKEDIN_API_BASE_URL")
            .map_err(|_| ProviderError::Config("LINKEDIN_API_BASE_URL not set".to_string()))?;
        let api_key = env::var("LINKEDIN_API_KEY")
            .map_err(|_| ProviderError::Config("LINKEDIN_API_KEY not set".to_string()))?;
        Self::new(base_url, api_key)
    }

    fn get(&self, path: &str) -> reqwest::blocking::RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
    }

    fn post(&self, path: &str) -> reqwest::blocking::RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
    }

    fn check(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(ProviderError::Api(format!("status {}: {}", status, body)))
    }

    /// Send-style calls map HTTP rejections to an unsuccessful outcome rather
    /// than an error, so the caller can record the provider's own payload.
    fn send_outcome(response: reqwest::blocking::Response) -> Result<SendOutcome, ProviderError> {
        let status = response.status();
        let payload: Option<serde_json::Value> = response.json().ok();
        if status.is_success() {
            Ok(SendOutcome::ok(payload))
        } else {
            Ok(SendOutcome::rejected(
                format!("provider returned status {}", status),
                payload,
            ))
        }
    }
}

impl LinkedInProvider for HttpLinkedInClient {
    fn resolve_member_id(
        &self,
        account_id: &str,
        public_identifier: &str,
    ) -> Result<Option<String>, ProviderError> {
        let response = self
            .get("/api/v1/users/lookup")
            .query(&[
                ("account_id", account_id),
                ("public_identifier", public_identifier),
            ])
            .send()?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(response)?;
        let body: MemberLookupResponse = response.json()?;
        Ok(body.member_id)
    }

    fn send_connection_request(
        &self,
        account_id: &str,
        member_id: &str,
        message: &str,
    ) -> Result<SendOutcome, ProviderError> {
        let response = self
            .post("/api/v1/invitations")
            .json(&InviteRequest {
                account_id,
                member_id,
                message,
            })
            .send()?;
        Self::send_outcome(response)
    }

    fn send_message(
        &self,
        account_id: &str,
        conversation_id: &str,
        message: &str,
    ) -> Result<SendOutcome, ProviderError> {
        let response = self
            .post("/api/v1/messages")
            .json(&MessageRequest {
                account_id,
                conversation_id,
                message,
            })
            .send()?;
        Self::send_outcome(response)
    }

    fn get_conversation_id(
        &self,
        account_id: &str,
        public_identifier: &str,
    ) -> Result<Option<String>, ProviderError> {
        let response = self
            .get("/api/v1/conversations/lookup")
            .query(&[
                ("account_id", account_id),
                ("public_identifier", public_identifier),
            ])
            .send()?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(response)?;
        let body: ConversationLookupResponse = response.json()?;
        Ok(body.conversation_id)
    }

    fn get_relations(&self, account_id: &str) -> Result<Vec<Relation>, ProviderError> {
        let response = self
            .get("/api/v1/relations")
            .query(&[("account_id", account_id)])
            .send()?;
        let response = Self::check(response)?;
        let body: RelationsResponse = response.json()?;
        Ok(body.items)
    }

    fn get_sent_invitations(
        &self,
        account_id: &str,
    ) -> Result<Vec<SentInvitation>, ProviderError> {
        let response = self
            .get("/api/v1/invitations/sent")
            .query(&[("account_id", account_id)])
            .send()?;
        let response = Self::check(response)?;
        let body: InvitationsResponse = response.json()?;
        Ok(body.items)
    }
}
