//! The submission protocol as an input/output state machine.
//!
//! A session drives one user through at most one vote at a time and keeps a
//! small cache of what the ledger last said: whether this account has voted
//! and the current encrypted tally handles. The session never talks to the
//! network itself. Each step that needs the ledger or the encryption
//! capability is emitted as [`SessionOutput::Dispatch`], and its result is fed
//! back as [`SessionInput::Response`] with the same [`Ticket`].
//!
//! Tickets are how stale results are dropped. Each request slot (status query,
//! tally query, vote flow) remembers the ticket it is waiting for; anything
//! else is discarded. Every [`SessionInput::Connect`] starts a new epoch, so
//! results that belong to a previous account or network can never land on
//! the new one.

use poll_ledger::{Address, EncryptedInput, Tallies};
use tracing::{debug, info, warn};

use crate::config::{AddressBook, Deployment, NetworkId};
use crate::error::ClientError;

/// Wallet-side facts the session depends on. Any change is a reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Identity {
    pub network: Option<NetworkId>,
    pub account: Option<Address>,
    /// Whether the encryption capability has finished loading.
    pub encryption_ready: bool,
}

/// The two answers this poll accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    No,
    Yes,
}

impl Choice {
    /// The 8-bit cleartext that gets encrypted.
    pub fn value(self) -> u8 {
        match self {
            Choice::No => 0,
            Choice::Yes => 1,
        }
    }
}

/// Correlates a dispatched request with its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub epoch: u64,
    pub seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteRequest {
    HasVoted {
        ledger: Address,
        voter: Address,
    },
    Encrypt {
        ledger: Address,
        voter: Address,
        value: u8,
    },
    SubmitVote {
        ledger: Address,
        voter: Address,
        input: EncryptedInput,
    },
    GetTallies {
        ledger: Address,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteResponse {
    HasVoted(Result<bool, ClientError>),
    Encrypted(Result<EncryptedInput, ClientError>),
    /// The vote transaction was included (or failed to be).
    Submitted(Result<(), ClientError>),
    Tallies(Result<Tallies, ClientError>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInput {
    /// Initial connection, or any change of account, network or encryption
    /// readiness.
    Connect(Identity),
    Vote(Choice),
    RefreshTallies,
    Response(Ticket, RemoteResponse),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutput {
    /// Perform this request and feed the result back under the same ticket.
    Dispatch(Ticket, RemoteRequest),
    /// Cached state or status changed; nothing to send.
    Updated,
    /// The action is not available right now. State is unchanged.
    Rejected(ClientError),
    /// The response was stale or unexpected and was ignored.
    Discarded(Ticket),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum VoteFlow {
    #[default]
    Idle,
    /// Advisory `hasVoted` check before spending effort on encryption.
    PreCheck { ticket: Ticket, choice: Choice },
    Encrypting { ticket: Ticket },
    Submitting { ticket: Ticket },
}

impl VoteFlow {
    fn ticket(&self) -> Option<Ticket> {
        match *self {
            VoteFlow::Idle => None,
            VoteFlow::PreCheck { ticket, .. }
            | VoteFlow::Encrypting { ticket }
            | VoteFlow::Submitting { ticket } => Some(ticket),
        }
    }
}

pub const MSG_NOT_DEPLOYED: &str = "No poll deployed on this network";
pub const MSG_NO_NETWORK: &str = "No network connected";
pub const MSG_ENCRYPTING: &str = "Encrypting vote...";
pub const MSG_SUBMITTING: &str = "Submitting vote...";
pub const MSG_SUBMITTED: &str = "Vote submitted";
pub const MSG_ALREADY_VOTED: &str = "You have already voted";
pub const MSG_INVALID_ATTESTATION: &str = "Vote rejected: invalid attestation";

/// One user's view of one poll.
#[derive(Debug, Clone)]
pub struct PollSession {
    book: AddressBook,
    identity: Identity,
    deployment: Deployment,
    epoch: u64,
    seq: u64,
    vote_flow: VoteFlow,
    status_query: Option<Ticket>,
    tally_query: Option<Ticket>,
    has_voted: Option<bool>,
    tallies: Option<Tallies>,
    status: String,
}

impl PollSession {
    pub fn new(book: AddressBook) -> Self {
        Self {
            book,
            identity: Identity::default(),
            deployment: Deployment::default(),
            epoch: 0,
            seq: 0,
            vote_flow: VoteFlow::Idle,
            status_query: None,
            tally_query: None,
            has_voted: None,
            tallies: None,
            status: String::new(),
        }
    }

    pub fn process_input(&mut self, input: SessionInput) -> SessionOutput {
        match input {
            SessionInput::Connect(identity) => self.connect(identity),
            SessionInput::Vote(choice) => self.start_vote(choice),
            SessionInput::RefreshTallies => self.refresh_tallies(),
            SessionInput::Response(ticket, response) => self.on_response(ticket, response),
        }
    }

    // --- Accessors ---

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    /// `None` until the ledger has answered, or after a failed query.
    pub fn has_voted(&self) -> Option<bool> {
        self.has_voted
    }

    pub fn tallies(&self) -> Option<Tallies> {
        self.tallies
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_voting(&self) -> bool {
        self.vote_flow != VoteFlow::Idle
    }

    pub fn is_loading(&self) -> bool {
        self.tally_query.is_some()
    }

    pub fn can_vote(&self) -> bool {
        self.vote_preconditions().is_ok()
    }

    pub fn can_load_tallies(&self) -> bool {
        self.deployment.is_configured() && !self.is_loading()
    }

    // --- Input handlers ---

    fn connect(&mut self, identity: Identity) -> SessionOutput {
        let deployment = self.book.resolve(identity.network);
        if deployment.ledger != self.deployment.ledger {
            self.tallies = None;
        }
        self.epoch += 1;
        self.seq = 0;
        self.vote_flow = VoteFlow::Idle;
        self.status_query = None;
        self.tally_query = None;
        self.has_voted = None;
        self.status.clear();
        self.identity = identity;
        self.deployment = deployment;
        debug!(epoch = self.epoch, deployment = ?self.deployment, "session reconnected");

        let Some(ledger) = self.deployment.ledger else {
            self.status = match self.deployment.network {
                Some(_) => MSG_NOT_DEPLOYED,
                None => MSG_NO_NETWORK,
            }
            .to_string();
            return SessionOutput::Updated;
        };
        let Some(voter) = self.identity.account else {
            return SessionOutput::Updated;
        };

        let ticket = self.next_ticket();
        self.status_query = Some(ticket);
        SessionOutput::Dispatch(ticket, RemoteRequest::HasVoted { ledger, voter })
    }

    fn start_vote(&mut self, choice: Choice) -> SessionOutput {
        let (ledger, voter) = match self.vote_preconditions() {
            Ok(target) => target,
            Err(err) => return SessionOutput::Rejected(err),
        };
        let ticket = self.next_ticket();
        self.vote_flow = VoteFlow::PreCheck { ticket, choice };
        self.status = MSG_ENCRYPTING.to_string();
        SessionOutput::Dispatch(ticket, RemoteRequest::HasVoted { ledger, voter })
    }

    fn refresh_tallies(&mut self) -> SessionOutput {
        let ledger = match self.ledger() {
            Ok(ledger) => ledger,
            Err(err) => return SessionOutput::Rejected(err),
        };
        if self.is_loading() {
            return SessionOutput::Rejected(ClientError::RefreshInFlight);
        }
        self.dispatch_tally_query(ledger)
    }

    fn on_response(&mut self, ticket: Ticket, response: RemoteResponse) -> SessionOutput {
        if self.status_query == Some(ticket) {
            if let RemoteResponse::HasVoted(result) = response {
                return self.on_status(result);
            }
        } else if self.vote_flow.ticket() == Some(ticket) {
            return self.on_vote_step(ticket, response);
        } else if self.tally_query == Some(ticket) {
            if let RemoteResponse::Tallies(result) = response {
                return self.on_tallies(result);
            }
        }
        debug!(?ticket, epoch = self.epoch, "discarding stale response");
        SessionOutput::Discarded(ticket)
    }

    fn on_status(&mut self, result: Result<bool, ClientError>) -> SessionOutput {
        self.status_query = None;
        match result {
            Ok(voted) => self.has_voted = Some(voted),
            Err(err) => {
                warn!(%err, "hasVoted query failed");
                self.has_voted = None;
                self.status = format!("hasVoted check failed: {err}");
            }
        }
        SessionOutput::Updated
    }

    fn on_vote_step(&mut self, ticket: Ticket, response: RemoteResponse) -> SessionOutput {
        // Preconditions held when the flow started and every reconnect resets
        // the flow, so the target is still resolvable here.
        let Ok((ledger, voter)) = self.vote_target() else {
            self.vote_flow = VoteFlow::Idle;
            return SessionOutput::Discarded(ticket);
        };

        match (self.vote_flow, response) {
            (VoteFlow::PreCheck { choice, .. }, RemoteResponse::HasVoted(result)) => {
                match result {
                    Ok(true) => {
                        self.settle_vote_state(true);
                        self.vote_flow = VoteFlow::Idle;
                        self.status = MSG_ALREADY_VOTED.to_string();
                        return SessionOutput::Updated;
                    }
                    Ok(false) => self.settle_vote_state(false),
                    // Advisory only: the ledger decides on submission.
                    Err(err) => debug!(%err, "pre-vote check failed, continuing"),
                }
                let ticket = self.next_ticket();
                self.vote_flow = VoteFlow::Encrypting { ticket };
                SessionOutput::Dispatch(
                    ticket,
                    RemoteRequest::Encrypt {
                        ledger,
                        voter,
                        value: choice.value(),
                    },
                )
            }

            (VoteFlow::Encrypting { .. }, RemoteResponse::Encrypted(result)) => match result {
                Ok(input) => {
                    let ticket = self.next_ticket();
                    self.vote_flow = VoteFlow::Submitting { ticket };
                    self.status = MSG_SUBMITTING.to_string();
                    SessionOutput::Dispatch(
                        ticket,
                        RemoteRequest::SubmitVote {
                            ledger,
                            voter,
                            input,
                        },
                    )
                }
                Err(err) => self.fail_vote(err),
            },

            (VoteFlow::Submitting { .. }, RemoteResponse::Submitted(result)) => match result {
                Ok(()) => {
                    info!(%voter, %ledger, "vote included");
                    self.vote_flow = VoteFlow::Idle;
                    self.settle_vote_state(true);
                    self.status = MSG_SUBMITTED.to_string();
                    // Supersedes any refresh already in flight.
                    self.dispatch_tally_query(ledger)
                }
                Err(err) => self.fail_vote(err),
            },

            (flow, response) => {
                warn!(?flow, ?response, "response does not match vote step");
                SessionOutput::Discarded(ticket)
            }
        }
    }

    fn fail_vote(&mut self, err: ClientError) -> SessionOutput {
        self.vote_flow = VoteFlow::Idle;
        self.status = match err {
            ClientError::AlreadyVoted => MSG_ALREADY_VOTED.to_string(),
            ClientError::InvalidAttestation => MSG_INVALID_ATTESTATION.to_string(),
            err => format!("Vote failed: {err}"),
        };
        warn!(status = %self.status, "vote did not go through");
        SessionOutput::Updated
    }

    fn on_tallies(&mut self, result: Result<Tallies, ClientError>) -> SessionOutput {
        self.tally_query = None;
        match result {
            Ok(tallies) => self.tallies = Some(tallies),
            // Previous handles stay visible.
            Err(err) => {
                warn!(%err, "getTallies failed");
                self.status = format!("getTallies failed: {err}");
            }
        }
        SessionOutput::Updated
    }

    // --- Helpers ---

    /// Records an answer newer than any status query still in flight, which
    /// is then dropped on arrival.
    fn settle_vote_state(&mut self, voted: bool) {
        self.has_voted = Some(voted);
        self.status_query = None;
    }

    fn next_ticket(&mut self) -> Ticket {
        self.seq += 1;
        Ticket {
            epoch: self.epoch,
            seq: self.seq,
        }
    }

    fn dispatch_tally_query(&mut self, ledger: Address) -> SessionOutput {
        let ticket = self.next_ticket();
        self.tally_query = Some(ticket);
        SessionOutput::Dispatch(ticket, RemoteRequest::GetTallies { ledger })
    }

    fn ledger(&self) -> Result<Address, ClientError> {
        match (self.deployment.ledger, self.deployment.network) {
            (Some(ledger), _) => Ok(ledger),
            (None, Some(network)) => Err(ClientError::NotConfigured(network)),
            (None, None) => Err(ClientError::NetworkUnavailable),
        }
    }

    fn vote_target(&self) -> Result<(Address, Address), ClientError> {
        let ledger = self.ledger()?;
        let voter = self.identity.account.ok_or(ClientError::NoAccount)?;
        Ok((ledger, voter))
    }

    fn vote_preconditions(&self) -> Result<(Address, Address), ClientError> {
        let target = self.vote_target()?;
        if !self.identity.encryption_ready {
            return Err(ClientError::EncryptionUnavailable);
        }
        if self.is_voting() {
            return Err(ClientError::VoteInFlight);
        }
        Ok(target)
    }
}
