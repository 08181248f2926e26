mod client;
mod types;

pub use client::HttpLinkedInClient;
pub use types::{ProviderError, Relation, SendOutcome, SentInvitation};

/// The messaging-provider surface consumed by the sequencing core. Every call
/// may fail with a transport-level `ProviderError`; callers treat any such
/// failure as an action failure, never as a crash.
pub trait LinkedInProvider {
    /// Resolve the provider-internal member id for a vanity public
    /// identifier. `Ok(None)` means the profile could not be found.
    fn resolve_member_id(
        &self,
        account_id: &str,
        public_identifier: &str,
    ) -> Result<Option<String>, ProviderError>;

    fn send_connection_request(
        &self,
        account_id: &str,
        member_id: &str,
        message: &str,
    ) -> Result<SendOutcome, ProviderError>;

    fn send_message(
        &self,
        account_id: &str,
        conversation_id: &str,
        message: &str,
    ) -> Result<SendOutcome, ProviderError>;

    /// Look up the conversation id for an already-connected profile, if the
    /// provider has one.
    fn get_conversation_id(
        &self,
        account_id: &str,
        public_identifier: &str,
    ) -> Result<Option<String>, ProviderError>;

    fn get_relations(&self, account_id: &str) -> Result<Vec<Relation>, ProviderError>;

    fn get_sent_invitations(&self, account_id: &str)
        -> Result<Vec<SentInvitation>, ProviderError>;
}
