//! End-to-end runs of sessions against an in-process network.

use poll_ledger::{Address, EncryptedInput, Tallies, VotedEvent};

use crate::config::AddressBook;
use crate::driver::{Driver, PollBackend};
use crate::error::ClientError;
use crate::local::LocalNetwork;
use crate::session::{
    Choice, Identity, PollSession, SessionInput, SessionOutput, MSG_ALREADY_VOTED, MSG_SUBMITTED,
};

const NETWORK: u64 = 31337;
const POLL: Address = Address([0x70; 32]);
const ALICE: Address = Address([0xa1; 32]);
const BOB: Address = Address([0xb0; 32]);

/// Wraps a backend and lets a test break individual calls.
#[derive(Debug)]
struct Faulty<B> {
    inner: B,
    fail_encrypt: bool,
    stale_has_voted: bool,
    fail_tallies: bool,
}

impl<B> Faulty<B> {
    fn new(inner: B) -> Self {
        Self {
            inner,
            fail_encrypt: false,
            stale_has_voted: false,
            fail_tallies: false,
        }
    }
}

impl<B: PollBackend> PollBackend for Faulty<B> {
    fn has_voted(&mut self, ledger: Address, voter: Address) -> Result<bool, ClientError> {
        if self.stale_has_voted {
            return Ok(false);
        }
        self.inner.has_voted(ledger, voter)
    }

    fn encrypt_choice(
        &mut self,
        ledger: Address,
        voter: Address,
        value: u8,
    ) -> Result<EncryptedInput, ClientError> {
        if self.fail_encrypt {
            return Err(ClientError::RemoteCallFailed("relayer unreachable".into()));
        }
        self.inner.encrypt_choice(ledger, voter, value)
    }

    fn submit_vote(
        &mut self,
        ledger: Address,
        voter: Address,
        input: &EncryptedInput,
    ) -> Result<(), ClientError> {
        self.inner.submit_vote(ledger, voter, input)
    }

    fn get_tallies(&mut self, ledger: Address) -> Result<Tallies, ClientError> {
        if self.fail_tallies {
            return Err(ClientError::RemoteCallFailed("gateway timeout".into()));
        }
        self.inner.get_tallies(ledger)
    }
}

fn book() -> AddressBook {
    let mut book = AddressBook::new();
    book.insert(NETWORK, POLL, Some("hardhat".into()));
    book
}

fn identity(account: Address) -> Identity {
    Identity {
        network: Some(NETWORK),
        account: Some(account),
        encryption_ready: true,
    }
}

fn driver(account: Address, network: LocalNetwork) -> Driver<Faulty<LocalNetwork>> {
    let mut driver = Driver::new(PollSession::new(book()), Faulty::new(network));
    driver.submit(SessionInput::Connect(identity(account)));
    driver
}

/// Moves the network from one session to the next, as two users of the same
/// chain would share it.
fn handoff(
    previous: Driver<Faulty<LocalNetwork>>,
    account: Address,
) -> Driver<Faulty<LocalNetwork>> {
    let (_, backend) = previous.into_parts();
    driver(account, backend.inner)
}

#[test]
fn two_voters_and_a_double_vote() {
    let mut alice = driver(ALICE, LocalNetwork::deploy(POLL));
    assert_eq!(alice.session().has_voted(), Some(false));

    assert_eq!(alice.submit(SessionInput::Vote(Choice::Yes)), SessionOutput::Updated);
    assert_eq!(alice.session().status(), MSG_SUBMITTED);
    assert_eq!(alice.session().has_voted(), Some(true));
    let after_alice = alice.session().tallies().unwrap();
    assert!(!after_alice.yes.is_zero());

    // The advisory check catches the second attempt before any transaction.
    alice.submit(SessionInput::Vote(Choice::No));
    assert_eq!(alice.session().status(), MSG_ALREADY_VOTED);

    // With a stale check, the ledger itself refuses.
    alice.backend_mut().stale_has_voted = true;
    alice.submit(SessionInput::Vote(Choice::No));
    assert_eq!(alice.session().status(), MSG_ALREADY_VOTED);
    assert_eq!(alice.backend().inner.ledger().get_tallies(), after_alice);
    alice.backend_mut().stale_has_voted = false;

    let mut bob = handoff(alice, BOB);
    assert_eq!(bob.session().has_voted(), Some(false));
    bob.submit(SessionInput::Vote(Choice::No));
    assert_eq!(bob.session().has_voted(), Some(true));

    let network = &bob.backend().inner;
    assert!(network.ledger().has_voted(ALICE));
    assert!(network.ledger().has_voted(BOB));
    assert_eq!(
        network.ledger().events(),
        &[VotedEvent { voter: ALICE }, VotedEvent { voter: BOB }]
    );

    let tallies = bob.session().tallies().unwrap();
    assert_ne!(tallies, after_alice);
    assert_eq!(network.reveal(tallies), Some((1, 1)));
}

#[test]
fn unconfigured_network_cannot_vote_or_refresh() {
    let mut driver = Driver::new(
        PollSession::new(book()),
        Faulty::new(LocalNetwork::deploy(POLL)),
    );
    let output = driver.submit(SessionInput::Connect(Identity {
        network: Some(11155111),
        ..identity(ALICE)
    }));
    assert_eq!(output, SessionOutput::Updated);
    assert!(!driver.session().can_vote());
    assert!(!driver.session().can_load_tallies());
    assert_eq!(
        driver.submit(SessionInput::Vote(Choice::Yes)),
        SessionOutput::Rejected(ClientError::NotConfigured(11155111))
    );
    assert_eq!(
        driver.submit(SessionInput::RefreshTallies),
        SessionOutput::Rejected(ClientError::NotConfigured(11155111))
    );
    assert!(driver.backend().inner.ledger().events().is_empty());
}

#[test]
fn encryption_failure_then_retry() {
    let mut alice = driver(ALICE, LocalNetwork::deploy(POLL));
    alice.backend_mut().fail_encrypt = true;

    alice.submit(SessionInput::Vote(Choice::Yes));
    assert_eq!(alice.session().status(), "Vote failed: relayer unreachable");
    assert_eq!(alice.session().has_voted(), Some(false));
    assert!(!alice.session().is_voting());
    assert!(alice.backend().inner.ledger().events().is_empty());

    alice.backend_mut().fail_encrypt = false;
    alice.submit(SessionInput::Vote(Choice::Yes));
    assert_eq!(alice.session().status(), MSG_SUBMITTED);
    assert_eq!(alice.session().has_voted(), Some(true));
}

#[test]
fn tally_refresh_failure_keeps_handles() {
    let mut alice = driver(ALICE, LocalNetwork::deploy(POLL));
    alice.submit(SessionInput::Vote(Choice::No));
    let known = alice.session().tallies();
    assert!(known.is_some());

    alice.backend_mut().fail_tallies = true;
    alice.submit(SessionInput::RefreshTallies);
    assert_eq!(alice.session().tallies(), known);
    assert_eq!(alice.session().status(), "getTallies failed: gateway timeout");

    alice.backend_mut().fail_tallies = false;
    alice.submit(SessionInput::RefreshTallies);
    assert_eq!(alice.session().tallies(), known);
}

#[test]
fn many_voters_tally_correctly() {
    let mut network = LocalNetwork::deploy(POLL);
    let mut expected = (0, 0);
    for i in 0..10u8 {
        let choice = if i % 3 == 0 { Choice::Yes } else { Choice::No };
        match choice {
            Choice::Yes => expected.0 += 1,
            Choice::No => expected.1 += 1,
        }
        let mut session = driver(Address([i + 1; 32]), network);
        session.submit(SessionInput::Vote(choice));
        assert_eq!(session.session().status(), MSG_SUBMITTED);
        network = session.into_parts().1.inner;
    }
    assert_eq!(network.ledger().events().len(), 10);
    assert_eq!(network.reveal(network.ledger().get_tallies()), Some(expected));
}
