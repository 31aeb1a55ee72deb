use poll_ledger::{Address, EncryptedInput, Tallies};
use tracing::trace;

use crate::error::ClientError;
use crate::session::{PollSession, RemoteRequest, RemoteResponse, SessionInput, SessionOutput};

/// The remote side of a session: ledger RPC plus the encryption capability.
pub trait PollBackend {
    fn has_voted(&mut self, ledger: Address, voter: Address) -> Result<bool, ClientError>;

    /// Encrypts `value` into an input bound to `(ledger, voter)`.
    fn encrypt_choice(
        &mut self,
        ledger: Address,
        voter: Address,
        value: u8,
    ) -> Result<EncryptedInput, ClientError>;

    /// Sends `vote(handle, attestation)` signed by `voter` and waits for inclusion.
    fn submit_vote(
        &mut self,
        ledger: Address,
        voter: Address,
        input: &EncryptedInput,
    ) -> Result<(), ClientError>;

    fn get_tallies(&mut self, ledger: Address) -> Result<Tallies, ClientError>;
}

/// Performs one request and wraps the result for the session.
pub fn execute<B: PollBackend + ?Sized>(backend: &mut B, request: &RemoteRequest) -> RemoteResponse {
    match request {
        RemoteRequest::HasVoted { ledger, voter } => {
            RemoteResponse::HasVoted(backend.has_voted(*ledger, *voter))
        }
        RemoteRequest::Encrypt {
            ledger,
            voter,
            value,
        } => RemoteResponse::Encrypted(backend.encrypt_choice(*ledger, *voter, *value)),
        RemoteRequest::SubmitVote {
            ledger,
            voter,
            input,
        } => RemoteResponse::Submitted(backend.submit_vote(*ledger, *voter, input)),
        RemoteRequest::GetTallies { ledger } => RemoteResponse::Tallies(backend.get_tallies(*ledger)),
    }
}

/// Runs a session against a backend, one request at a time, until the
/// session has nothing left to send.
#[derive(Debug)]
pub struct Driver<B> {
    session: PollSession,
    backend: B,
}

impl<B: PollBackend> Driver<B> {
    pub fn new(session: PollSession, backend: B) -> Self {
        Self { session, backend }
    }

    /// Feeds `input` and every follow-up response through the session.
    /// Returns the output that ended the exchange.
    pub fn submit(&mut self, input: SessionInput) -> SessionOutput {
        let mut output = self.session.process_input(input);
        while let SessionOutput::Dispatch(ticket, request) = output {
            trace!(?ticket, ?request, "dispatching");
            let response = execute(&mut self.backend, &request);
            output = self
                .session
                .process_input(SessionInput::Response(ticket, response));
        }
        output
    }

    pub fn session(&self) -> &PollSession {
        &self.session
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_parts(self) -> (PollSession, B) {
        (self.session, self.backend)
    }
}
