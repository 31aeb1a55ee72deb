//! Client side of the encrypted poll.
//!
//! [`PollSession`] holds the protocol logic and performs no I/O: every network
//! step leaves it as a [`RemoteRequest`] tagged with a [`Ticket`], and comes
//! back as a [`RemoteResponse`] carrying the same ticket. [`Driver`] runs that
//! loop against any [`PollBackend`]; [`LocalNetwork`] is the in-process one.

pub mod config;
pub mod driver;
pub mod error;
pub mod local;
pub mod session;

#[cfg(test)]
mod scenarios;

pub use config::{AddressBook, ConfigError, Deployment, NetworkId};
pub use driver::{execute, Driver, PollBackend};
pub use error::ClientError;
pub use local::LocalNetwork;
pub use session::{
    Choice, Identity, PollSession, RemoteRequest, RemoteResponse, SessionInput, SessionOutput,
    Ticket,
};
