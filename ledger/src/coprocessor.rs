use crate::error::CoprocessorError;
use crate::types::{Address, Attestation, Handle};

/// The FHE arithmetic the ledger relies on.
///
/// Every method works on opaque handles and returns a fresh handle for its
/// result; nothing here ever yields a cleartext value to the caller.
pub trait Coprocessor {
    /// Checks that `attestation` binds `input` to `caller` and `ledger`, and
    /// returns the handle the ledger may compute with.
    fn verify_input(
        &mut self,
        input: Handle,
        attestation: &Attestation,
        ledger: Address,
        caller: Address,
    ) -> Result<Handle, CoprocessorError>;

    /// Encrypts a public constant.
    fn trivial_encrypt(&mut self, value: u64) -> Handle;

    /// Encrypted boolean `a != scalar`.
    fn ne_scalar(&mut self, a: Handle, scalar: u64) -> Result<Handle, CoprocessorError>;

    /// Encrypted `if cond { if_true } else { if_false }`.
    fn select(
        &mut self,
        cond: Handle,
        if_true: Handle,
        if_false: Handle,
    ) -> Result<Handle, CoprocessorError>;

    /// Encrypted wrapping `a + b`.
    fn add(&mut self, a: Handle, b: Handle) -> Result<Handle, CoprocessorError>;
}
