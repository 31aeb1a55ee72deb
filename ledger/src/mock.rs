use std::collections::HashMap;

use tracing::trace;

use crate::coprocessor::Coprocessor;
use crate::error::CoprocessorError;
use crate::types::{Address, Attestation, EncryptedInput, Handle};

const KEY_CONTEXT: &str = "fhe-poll 2025-06 mock coprocessor signing key";

/// In-process coprocessor for local networks and tests.
///
/// Ciphertexts are simulated: each handle is a keyed BLAKE3 digest that maps
/// to a cleartext in a private table. Attestations are keyed BLAKE3 MACs over
/// `(ledger, caller, handle)`, so a handle cannot be replayed by another
/// caller or against another ledger.
///
/// The handle table is never pruned: every counted ballot leaves its
/// intermediate handles behind.
#[derive(Debug, Clone)]
pub struct MockCoprocessor {
    key: [u8; 32],
    values: HashMap<Handle, u64>,
    counter: u64,
}

impl Default for MockCoprocessor {
    fn default() -> Self {
        Self::new(blake3::derive_key(KEY_CONTEXT, b"local"))
    }
}

impl MockCoprocessor {
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            key,
            values: HashMap::new(),
            counter: 0,
        }
    }

    /// Encryption capability: registers an 8-bit input for `caller` on
    /// `ledger` and returns its handle with the matching attestation.
    pub fn encrypt_input(
        &mut self,
        ledger: Address,
        caller: Address,
        value: u64,
    ) -> Result<EncryptedInput, CoprocessorError> {
        if value > u64::from(u8::MAX) {
            return Err(CoprocessorError::InvalidValue(value));
        }
        let handle = self.fresh("input", value);
        let attestation = Attestation(self.attest(ledger, caller, handle).as_bytes().to_vec());
        Ok(EncryptedInput {
            handle,
            attestation,
        })
    }

    /// Local stand-in for the relayer's decryption. The zero placeholder reads
    /// as 0, as an uninitialized encrypted counter would.
    pub fn reveal(&self, handle: Handle) -> Option<u64> {
        if handle.is_zero() {
            return Some(0);
        }
        self.values.get(&handle).copied()
    }

    fn fresh(&mut self, op: &str, value: u64) -> Handle {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(b"handle");
        hasher.update(op.as_bytes());
        hasher.update(&self.counter.to_le_bytes());
        self.counter += 1;
        let handle = Handle(*hasher.finalize().as_bytes());
        self.values.insert(handle, value);
        trace!(%handle, op, "allocated ciphertext");
        handle
    }

    fn value(&self, handle: Handle) -> Result<u64, CoprocessorError> {
        self.reveal(handle)
            .ok_or(CoprocessorError::UnknownHandle(handle))
    }

    fn attest(&self, ledger: Address, caller: Address, handle: Handle) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(b"input");
        hasher.update(ledger.as_bytes());
        hasher.update(caller.as_bytes());
        hasher.update(handle.as_bytes());
        hasher.finalize()
    }
}

impl Coprocessor for MockCoprocessor {
    fn verify_input(
        &mut self,
        input: Handle,
        attestation: &Attestation,
        ledger: Address,
        caller: Address,
    ) -> Result<Handle, CoprocessorError> {
        let presented: [u8; 32] = attestation
            .as_bytes()
            .try_into()
            .map_err(|_| CoprocessorError::InvalidAttestation)?;
        // blake3::Hash compares in constant time.
        if blake3::Hash::from(presented) != self.attest(ledger, caller, input) {
            return Err(CoprocessorError::InvalidAttestation);
        }
        if !self.values.contains_key(&input) {
            return Err(CoprocessorError::UnknownHandle(input));
        }
        Ok(input)
    }

    fn trivial_encrypt(&mut self, value: u64) -> Handle {
        self.fresh("trivial", value)
    }

    fn ne_scalar(&mut self, a: Handle, scalar: u64) -> Result<Handle, CoprocessorError> {
        let a = self.value(a)?;
        Ok(self.fresh("ne", u64::from(a != scalar)))
    }

    fn select(
        &mut self,
        cond: Handle,
        if_true: Handle,
        if_false: Handle,
    ) -> Result<Handle, CoprocessorError> {
        let cond = self.value(cond)?;
        let picked = if cond != 0 {
            self.value(if_true)?
        } else {
            self.value(if_false)?
        };
        Ok(self.fresh("select", picked))
    }

    fn add(&mut self, a: Handle, b: Handle) -> Result<Handle, CoprocessorError> {
        let sum = self.value(a)?.wrapping_add(self.value(b)?);
        Ok(self.fresh("add", sum))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEDGER: Address = Address([1; 32]);
    const ALICE: Address = Address([2; 32]);
    const BOB: Address = Address([3; 32]);

    #[test]
    fn attestation_is_bound_to_caller_and_ledger() {
        let mut cp = MockCoprocessor::default();
        let input = cp.encrypt_input(LEDGER, ALICE, 1).unwrap();

        assert_eq!(
            cp.verify_input(input.handle, &input.attestation, LEDGER, ALICE),
            Ok(input.handle)
        );
        assert_eq!(
            cp.verify_input(input.handle, &input.attestation, LEDGER, BOB),
            Err(CoprocessorError::InvalidAttestation)
        );
        assert_eq!(
            cp.verify_input(input.handle, &input.attestation, Address([9; 32]), ALICE),
            Err(CoprocessorError::InvalidAttestation)
        );
    }

    #[test]
    fn truncated_attestation_is_rejected() {
        let mut cp = MockCoprocessor::default();
        let input = cp.encrypt_input(LEDGER, ALICE, 0).unwrap();
        let short = Attestation(input.attestation.as_bytes()[..16].to_vec());
        assert_eq!(
            cp.verify_input(input.handle, &short, LEDGER, ALICE),
            Err(CoprocessorError::InvalidAttestation)
        );
    }

    #[test]
    fn attestation_from_another_key_is_rejected() {
        let mut ours = MockCoprocessor::default();
        let mut theirs = MockCoprocessor::new([42; 32]);
        let forged = theirs.encrypt_input(LEDGER, ALICE, 1).unwrap();
        assert_eq!(
            ours.verify_input(forged.handle, &forged.attestation, LEDGER, ALICE),
            Err(CoprocessorError::InvalidAttestation)
        );
    }

    #[test]
    fn inputs_must_fit_in_a_byte() {
        let mut cp = MockCoprocessor::default();
        assert_eq!(
            cp.encrypt_input(LEDGER, ALICE, 256),
            Err(CoprocessorError::InvalidValue(256))
        );
    }

    #[test]
    fn arithmetic_follows_cleartexts() {
        let mut cp = MockCoprocessor::default();
        let one = cp.trivial_encrypt(1);
        let zero = cp.trivial_encrypt(0);
        let choice = cp.encrypt_input(LEDGER, ALICE, 1).unwrap().handle;

        let is_yes = cp.ne_scalar(choice, 0).unwrap();
        let picked = cp.select(is_yes, one, zero).unwrap();
        let sum = cp.add(picked, Handle::ZERO).unwrap();

        assert_eq!(cp.reveal(is_yes), Some(1));
        assert_eq!(cp.reveal(picked), Some(1));
        assert_eq!(cp.reveal(sum), Some(1));
        assert_ne!(sum, picked);
    }

    #[test]
    fn unknown_handles_are_reported() {
        let mut cp = MockCoprocessor::default();
        let stray = Handle([5; 32]);
        assert_eq!(cp.reveal(stray), None);
        assert_eq!(
            cp.add(stray, Handle::ZERO),
            Err(CoprocessorError::UnknownHandle(stray))
        );
    }
}
