use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider api error: {0}")]
    Api(String),
    #[error("missing configuration: {0}")]
    Config(String),
}

/// Outcome of a send call. `success == false` means the provider accepted the
/// request transport-wise but rejected the action; transport failures surface
/// as `ProviderError` instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendOutcome {
    pub success: bool,
    #[serde(default)]
    pub response: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn ok(response: Option<serde_json::Value>) -> Self {
        Self {
            success: true,
            response,
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>, response: Option<serde_json::Value>) -> Self {
        Self {
            success: false,
            response,
            error: Some(error.into()),
        }
    }
}

/// One entry from the account's relations listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub member_id: String,
    #[serde(default)]
    pub status: String,
}

/// One entry from the account's sent-invitations listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentInvitation {
    pub member_id: String,
    #[serde(default)]
    pub status: String,
}
