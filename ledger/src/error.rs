use thiserror::Error;

use crate::types::Handle;

/// Failures raised by a [`Coprocessor`](crate::Coprocessor).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoprocessorError {
    #[error("unknown ciphertext handle {0}")]
    UnknownHandle(Handle),
    #[error("attestation does not match handle, caller and ledger")]
    InvalidAttestation,
    #[error("input value {0} does not fit in 8 bits")]
    InvalidValue(u64),
}

/// Reasons the ledger rejects a ballot. A rejected ballot changes nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Already voted")]
    AlreadyVoted,
    #[error("Invalid attestation")]
    InvalidAttestation,
    #[error("coprocessor failure: {0}")]
    Coprocessor(CoprocessorError),
}

impl From<CoprocessorError> for LedgerError {
    fn from(err: CoprocessorError) -> Self {
        match err {
            CoprocessorError::InvalidAttestation => LedgerError::InvalidAttestation,
            other => LedgerError::Coprocessor(other),
        }
    }
}
