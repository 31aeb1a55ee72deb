use poll_ledger::{CoprocessorError, LedgerError};
use thiserror::Error;

use crate::config::NetworkId;

/// Everything a session can report back to its user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("no network connected")]
    NetworkUnavailable,
    #[error("no poll deployed on network {0}")]
    NotConfigured(NetworkId),
    #[error("no account connected")]
    NoAccount,
    #[error("encryption is not ready")]
    EncryptionUnavailable,
    #[error("a vote is already being submitted")]
    VoteInFlight,
    #[error("tallies are already loading")]
    RefreshInFlight,
    #[error("Already voted")]
    AlreadyVoted,
    #[error("invalid attestation")]
    InvalidAttestation,
    #[error("{0}")]
    RemoteCallFailed(String),
}

impl ClientError {
    /// Transport and execution failures may be retried by the user; ledger
    /// rejections may not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::RemoteCallFailed(_))
    }
}

impl From<LedgerError> for ClientError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::AlreadyVoted => ClientError::AlreadyVoted,
            LedgerError::InvalidAttestation => ClientError::InvalidAttestation,
            LedgerError::Coprocessor(err) => ClientError::RemoteCallFailed(err.to_string()),
        }
    }
}

impl From<CoprocessorError> for ClientError {
    fn from(err: CoprocessorError) -> Self {
        match err {
            CoprocessorError::InvalidAttestation => ClientError::InvalidAttestation,
            other => ClientError::RemoteCallFailed(other.to_string()),
        }
    }
}
