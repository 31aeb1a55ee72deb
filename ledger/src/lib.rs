//! Host-side model of the encrypted poll ledger.
//!
//! [`BallotLedger`] enforces the same voter state machine as the on-chain
//! program: every address moves from [`VoterState::NotVoted`] to
//! [`VoterState::Voted`] exactly once, and each accepted ballot moves the
//! encrypted tallies through a [`Coprocessor`] without the ledger ever seeing
//! a cleartext choice.

pub mod coprocessor;
pub mod error;
pub mod ledger;
pub mod mock;
pub mod types;

pub use coprocessor::Coprocessor;
pub use error::{CoprocessorError, LedgerError};
pub use ledger::BallotLedger;
pub use mock::MockCoprocessor;
pub use types::{
    Address, Attestation, EncryptedInput, Handle, ParseHexError, Tallies, VotedEvent, VoterState,
};

/// Identifier reported by `protocol_id`, used by tooling to negotiate the
/// coprocessor protocol version.
pub const PROTOCOL_ID: u64 = 10001;
