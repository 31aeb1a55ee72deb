use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use poll_client::{
    AddressBook, Choice, Driver, Identity, LocalNetwork, NetworkId, PollSession, SessionInput,
    SessionOutput,
};
use poll_ledger::Address;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Runs a local encrypted yes/no poll end to end.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Number of voters to simulate.
    #[arg(long, default_value_t = 20)]
    voters: u32,

    /// Network id the sessions connect to.
    #[arg(long, default_value_t = 31337)]
    network: NetworkId,

    /// Address book JSON. Without it the local poll is registered under `--network`.
    #[arg(long)]
    addresses: Option<PathBuf>,

    /// Seed for the simulated choices.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let poll = Address(blake3::hash(b"fhe-poll local deployment").into());
    let book = match &args.addresses {
        Some(path) => AddressBook::load(path)?,
        None => {
            let mut book = AddressBook::new();
            book.insert(args.network, poll, Some("local".into()));
            book
        }
    };

    let deployment = book.resolve(Some(args.network));
    let Some(ledger_address) = deployment.ledger else {
        println!("No poll deployed on network {}", args.network);
        return Ok(());
    };
    info!(%ledger_address, network = args.network, "using poll");

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut network = LocalNetwork::deploy(ledger_address);
    let mut cast = (0u64, 0u64);
    let mut last_session = None;

    for i in 0..args.voters {
        let account = Address(blake3::hash(&i.to_le_bytes()).into());
        let choice = if rng.gen_bool(0.5) {
            Choice::Yes
        } else {
            Choice::No
        };

        let mut driver = Driver::new(PollSession::new(book.clone()), network);
        driver.submit(SessionInput::Connect(Identity {
            network: Some(args.network),
            account: Some(account),
            encryption_ready: true,
        }));
        if let SessionOutput::Rejected(err) = driver.submit(SessionInput::Vote(choice)) {
            println!("voter {i}: {err}");
        }
        if driver.session().has_voted() == Some(true) {
            match choice {
                Choice::Yes => cast.0 += 1,
                Choice::No => cast.1 += 1,
            }
        }
        let (session, backend) = driver.into_parts();
        network = backend;
        last_session = Some(session);
    }

    // One voter tries again; the session reports it instead of failing.
    if let Some(session) = last_session {
        let mut driver = Driver::new(session, network);
        driver.submit(SessionInput::Vote(Choice::Yes));
        println!("repeat vote: {}", driver.session().status());
        network = driver.into_parts().1;
    }

    let tallies = network.ledger().get_tallies();
    println!("yes handle: {}", tallies.yes);
    println!("no handle:  {}", tallies.no);
    println!("votes accepted: {}", network.ledger().events().len());

    let (yes, no) = network
        .reveal(tallies)
        .ok_or("tally handles are unknown to the coprocessor")?;
    println!("revealed: {yes} yes / {no} no");
    if (yes, no) != cast {
        return Err(format!(
            "revealed tallies {yes}/{no} disagree with cast ballots {}/{}",
            cast.0, cast.1
        )
        .into());
    }

    Ok(())
}
