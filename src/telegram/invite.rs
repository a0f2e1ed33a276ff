//! Single-use invite issuance
//!
//! Issuance is not idempotent: a call that failed on our side may still have
//! created a link server-side. Failures are therefore surfaced to the user
//! and never retried here.

use super::traits::{Credential, GroupId, MessagingClient, TransportError};
use tracing::{error, info};

/// Issuance errors
#[derive(Debug, thiserror::Error)]
pub enum IssuanceError {
    #[error("Failed to create invite link for group {group}: {source}")]
    Transport {
        group: GroupId,
        #[source]
        source: TransportError,
    },

    #[error("Transport returned an empty invite link for group {0}")]
    EmptyLink(GroupId),
}

/// Requests one-member invite links for the configured group.
#[derive(Clone)]
pub struct InviteIssuer<C: MessagingClient> {
    client: C,
    group: GroupId,
}

impl<C: MessagingClient> InviteIssuer<C> {
    pub fn new(client: C, group: GroupId) -> Self {
        Self { client, group }
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    /// Issue a fresh credential. Exactly one transport call per invocation.
    pub async fn issue(&self) -> Result<Credential, IssuanceError> {
        let credential = self
            .client
            .create_single_use_invite(&self.group)
            .await
            .map_err(|source| {
                error!("Invite creation for group {} failed: {}", self.group, source);
                IssuanceError::Transport {
                    group: self.group,
                    source,
                }
            })?;

        if credential.invite_link.trim().is_empty() {
            return Err(IssuanceError::EmptyLink(self.group));
        }

        info!("Issued single-use invite for group {}", self.group);
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::mock::MockMessagingClient;

    #[tokio::test]
    async fn test_issue_returns_credential() {
        let client = MockMessagingClient::new();
        let issuer = InviteIssuer::new(client.clone(), GroupId(-1003095501562));

        let credential = issuer.issue().await.unwrap();

        assert!(credential.invite_link.starts_with("https://t.me/"));
        assert_eq!(client.issued_invites(), vec![credential]);
    }

    #[tokio::test]
    async fn test_issue_does_not_retry_on_failure() {
        let client = MockMessagingClient::new();
        client.fail_next_invite(TransportError::Network("timeout".to_string()));
        let issuer = InviteIssuer::new(client.clone(), GroupId(-5));

        let result = issuer.issue().await;

        assert!(matches!(result, Err(IssuanceError::Transport { .. })));
        // A retry would have consumed the queued success and issued a link
        assert!(client.issued_invites().is_empty());
    }
}
