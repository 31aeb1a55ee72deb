use std::collections::HashMap;

use tracing::{debug, info};

use crate::coprocessor::Coprocessor;
use crate::error::LedgerError;
use crate::types::{Address, Attestation, Handle, Tallies, VotedEvent, VoterState};
use crate::PROTOCOL_ID;

/// One deployed poll.
///
/// Callers are expected to serialize access, as a chain does for a single
/// contract instance; every method runs to completion without suspending.
#[derive(Debug)]
pub struct BallotLedger<C> {
    address: Address,
    coprocessor: C,
    voters: HashMap<Address, VoterState>,
    tallies: Tallies,
    events: Vec<VotedEvent>,
}

impl<C: Coprocessor> BallotLedger<C> {
    /// Creates a poll at `address`. Both tallies start as the zero placeholder.
    pub fn deploy(address: Address, coprocessor: C) -> Self {
        info!(%address, "poll deployed");
        Self {
            address,
            coprocessor,
            voters: HashMap::new(),
            tallies: Tallies::default(),
            events: Vec::new(),
        }
    }

    /// Counts one encrypted ballot from `caller`.
    ///
    /// The new tallies are computed in full before anything is written, so a
    /// rejected ballot leaves voter state, tallies and the event log untouched.
    pub fn vote(
        &mut self,
        caller: Address,
        choice: Handle,
        attestation: &Attestation,
    ) -> Result<(), LedgerError> {
        if self.voter_state(caller) == VoterState::Voted {
            debug!(%caller, "ballot rejected: already voted");
            return Err(LedgerError::AlreadyVoted);
        }

        let choice = self
            .coprocessor
            .verify_input(choice, attestation, self.address, caller)?;
        let tallies = self.count(choice)?;

        self.tallies = tallies;
        self.voters.insert(caller, VoterState::Voted);
        self.events.push(VotedEvent { voter: caller });
        info!(%caller, "ballot counted");
        Ok(())
    }

    /// Routes +1 to exactly one counter, selected by the encrypted choice.
    fn count(&mut self, choice: Handle) -> Result<Tallies, LedgerError> {
        let cp = &mut self.coprocessor;
        let is_yes = cp.ne_scalar(choice, 0)?;
        let one = cp.trivial_encrypt(1);
        let zero = cp.trivial_encrypt(0);
        let yes_step = cp.select(is_yes, one, zero)?;
        let no_step = cp.select(is_yes, zero, one)?;
        Ok(Tallies {
            yes: cp.add(self.tallies.yes, yes_step)?,
            no: cp.add(self.tallies.no, no_step)?,
        })
    }

    pub fn has_voted(&self, address: Address) -> bool {
        self.voter_state(address) == VoterState::Voted
    }

    pub fn voter_state(&self, address: Address) -> VoterState {
        self.voters.get(&address).copied().unwrap_or_default()
    }

    /// The stored ciphertext handles. Never decrypts.
    pub fn get_tallies(&self) -> Tallies {
        self.tallies
    }

    pub fn protocol_id(&self) -> u64 {
        PROTOCOL_ID
    }

    /// Append-only log of accepted ballots.
    pub fn events(&self) -> &[VotedEvent] {
        &self.events
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn coprocessor(&self) -> &C {
        &self.coprocessor
    }

    pub fn coprocessor_mut(&mut self) -> &mut C {
        &mut self.coprocessor
    }
}
