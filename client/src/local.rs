use poll_ledger::{Address, BallotLedger, EncryptedInput, MockCoprocessor, Tallies};
use tracing::debug;

use crate::driver::PollBackend;
use crate::error::ClientError;

/// A single-poll network living in process, backed by the mock coprocessor.
///
/// Calls are executed immediately, so every submitted vote is "included" by
/// the time `submit_vote` returns.
#[derive(Debug)]
pub struct LocalNetwork {
    ledger: BallotLedger<MockCoprocessor>,
}

impl LocalNetwork {
    pub fn deploy(address: Address) -> Self {
        Self::with_coprocessor(address, MockCoprocessor::default())
    }

    pub fn with_coprocessor(address: Address, coprocessor: MockCoprocessor) -> Self {
        Self {
            ledger: BallotLedger::deploy(address, coprocessor),
        }
    }

    pub fn ledger(&self) -> &BallotLedger<MockCoprocessor> {
        &self.ledger
    }

    /// Decrypts a tally pair through the mock relayer.
    pub fn reveal(&self, tallies: Tallies) -> Option<(u64, u64)> {
        let coprocessor = self.ledger.coprocessor();
        Some((coprocessor.reveal(tallies.yes)?, coprocessor.reveal(tallies.no)?))
    }

    fn check_address(&self, ledger: Address) -> Result<(), ClientError> {
        if ledger == self.ledger.address() {
            Ok(())
        } else {
            Err(ClientError::RemoteCallFailed(format!(
                "no contract deployed at {ledger}"
            )))
        }
    }
}

impl PollBackend for LocalNetwork {
    fn has_voted(&mut self, ledger: Address, voter: Address) -> Result<bool, ClientError> {
        self.check_address(ledger)?;
        Ok(self.ledger.has_voted(voter))
    }

    fn encrypt_choice(
        &mut self,
        ledger: Address,
        voter: Address,
        value: u8,
    ) -> Result<EncryptedInput, ClientError> {
        let input = self
            .ledger
            .coprocessor_mut()
            .encrypt_input(ledger, voter, u64::from(value))?;
        debug!(%voter, handle = %input.handle, "encrypted ballot");
        Ok(input)
    }

    fn submit_vote(
        &mut self,
        ledger: Address,
        voter: Address,
        input: &EncryptedInput,
    ) -> Result<(), ClientError> {
        self.check_address(ledger)?;
        self.ledger.vote(voter, input.handle, &input.attestation)?;
        Ok(())
    }

    fn get_tallies(&mut self, ledger: Address) -> Result<Tallies, ClientError> {
        self.check_address(ledger)?;
        Ok(self.ledger.get_tallies())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLL: Address = Address([0x70; 32]);
    const ALICE: Address = Address([0xa1; 32]);

    #[test]
    fn wrong_address_is_a_remote_failure() {
        let mut network = LocalNetwork::deploy(POLL);
        let err = network.get_tallies(Address([1; 32])).unwrap_err();
        assert!(err.is_retryable());
        assert!(network.has_voted(POLL, ALICE).is_ok());
    }

    #[test]
    fn ledger_errors_are_mapped() {
        let mut network = LocalNetwork::deploy(POLL);
        let input = network.encrypt_choice(POLL, ALICE, 1).unwrap();
        network.submit_vote(POLL, ALICE, &input).unwrap();
        assert_eq!(
            network.submit_vote(POLL, ALICE, &input),
            Err(ClientError::AlreadyVoted)
        );

        let other = Address([0xb0; 32]);
        assert_eq!(
            network.submit_vote(POLL, other, &input),
            Err(ClientError::InvalidAttestation)
        );
        assert_eq!(network.reveal(network.ledger().get_tallies()), Some((1, 0)));
    }
}
