use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Failure to read an [`Address`] or [`Handle`] from its hex form.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseHexError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

fn parse_bytes32(s: &str) -> Result<[u8; 32], ParseHexError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s)?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| ParseHexError::InvalidLength(len))
}

macro_rules! bytes32 {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub const ZERO: Self = Self([0; 32]);

            pub fn is_zero(&self) -> bool {
                self.0 == [0; 32]
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = ParseHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_bytes32(s).map(Self)
            }
        }
    };
}

bytes32! {
    /// A 32-byte account address (voter or ledger).
    Address
}

bytes32! {
    /// Opaque reference to a ciphertext held by the coprocessor.
    ///
    /// The all-zero handle is the placeholder for a tally that has never been
    /// written.
    Handle
}

/// Proof binding a ciphertext handle to one caller and one ledger.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Attestation(pub Vec<u8>);

impl Attestation {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Attestation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Attestation(0x{})", hex::encode(&self.0))
    }
}

/// What the encryption capability hands back for one 8-bit input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedInput {
    pub handle: Handle,
    pub attestation: Attestation,
}

/// The encrypted tally pair as stored by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tallies {
    pub yes: Handle,
    pub no: Handle,
}

/// Emitted once per accepted ballot. Carries the voter only, never the choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VotedEvent {
    pub voter: Address,
}

/// Per-address ballot state. `Voted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoterState {
    #[default]
    NotVoted,
    Voted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_hex_accepts_optional_prefix() {
        let text = format!("{}", Address([0xab; 32]));
        assert!(text.starts_with("0x"));
        assert_eq!(text.parse::<Address>().unwrap(), Address([0xab; 32]));
        assert_eq!(text[2..].parse::<Address>().unwrap(), Address([0xab; 32]));
    }

    #[test]
    fn short_address_is_rejected() {
        assert_eq!(
            "0x1234".parse::<Address>(),
            Err(ParseHexError::InvalidLength(2))
        );
        assert!(matches!(
            "0xzz".parse::<Handle>(),
            Err(ParseHexError::InvalidHex(_))
        ));
    }

    #[test]
    fn default_tallies_are_placeholders() {
        let tallies = Tallies::default();
        assert!(tallies.yes.is_zero());
        assert!(tallies.no.is_zero());
        assert_eq!(VoterState::default(), VoterState::NotVoted);
    }
}
