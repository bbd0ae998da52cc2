//! Seeded random simulation of many tandem clients against the matchmaker.
//!
//! # Usage
//!
//! ```bash
//! # Reproduce a run
//! tandem-sim --seed 42 --clients 8 --steps 5000
//!
//! # Watch every transition
//! RUST_LOG=tandem_client=debug tandem-sim --seed 42
//! ```
//!
//! Exits with a non-zero status on the first invariant violation.

use std::{process::ExitCode, time::Duration};

use clap::Parser;
use rand::{Rng, SeedableRng, seq::SliceRandom};
use rand_chacha::ChaCha8Rng;
use tandem_client::{ClientConfig, ClientEvent, SessionState};
use tandem_harness::SimWorld;
use tandem_proto::{Coordinates, Gender, MessageKind, UserPreferences};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Tandem session simulator
#[derive(Parser, Debug)]
#[command(name = "tandem-sim")]
#[command(about = "Deterministic simulation of tandem chat sessions")]
#[command(version)]
struct Args {
    /// Seed for every random choice in the run
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Number of simulated users
    #[arg(long, default_value = "6")]
    clients: usize,

    /// Number of random steps
    #[arg(long, default_value = "2000")]
    steps: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

const GENDERS: [Gender; 4] = [Gender::Any, Gender::Male, Gender::Female, Gender::Other];

fn random_preferences(rng: &mut ChaCha8Rng) -> UserPreferences {
    let gender = GENDERS.choose(rng).copied().unwrap_or_default();
    let looking_for = if rng.gen_bool(0.6) {
        Gender::Any
    } else {
        GENDERS.choose(rng).copied().unwrap_or_default()
    };
    let premium = rng.gen_bool(0.3);
    let location = rng
        .gen_bool(0.5)
        .then(|| Coordinates::new(rng.gen_range(46.0..48.0), rng.gen_range(6.0..10.0)));

    UserPreferences::new(gender, looking_for, "hello from the simulator", premium)
        .with_coordinates(location)
}

fn step(world: &mut SimWorld, rng: &mut ChaCha8Rng) {
    let index = rng.gen_range(0..world.num_clients());
    let state = world.client(index).map(|sim| sim.client().state());

    let event = match (rng.gen_range(0..100), state) {
        (0..15, Some(SessionState::Setup)) => {
            ClientEvent::SubmitPreferences(random_preferences(rng))
        },
        (15..40, _) => ClientEvent::SendMessage {
            kind: MessageKind::Text,
            payload: format!("message {}", rng.r#gen::<u16>()),
        },
        (40..43, _) => ClientEvent::SendMessage {
            kind: MessageKind::Image,
            payload: "A".repeat(if rng.gen_bool(0.2) { 2 * 1024 * 1024 + 1 } else { 1024 }),
        },
        (43..55, _) => ClientEvent::SkipPartner,
        (55..60, _) => {
            world.drop_connection(index);
            return;
        },
        (60..62, _) => ClientEvent::ReconnectExhausted,
        (62..80, _) => {
            world.deliver_pending();
            return;
        },
        _ => {
            world.advance(Duration::from_millis(rng.gen_range(0..2_500)));
            return;
        },
    };

    if let Err(error) = world.apply(index, event) {
        tracing::trace!(client = index, %error, "command rejected");
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!(
        seed = args.seed,
        clients = args.clients,
        steps = args.steps,
        "simulation starting"
    );

    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let mut world = SimWorld::new(args.clients.max(2), args.seed, ClientConfig::default());

    for n in 0..args.steps {
        step(&mut world, &mut rng);

        if let Err(violation) = world.check_invariants() {
            tracing::error!(step = n, %violation, "invariant violated");
            return ExitCode::FAILURE;
        }
    }

    world.deliver_pending();
    if let Err(violation) = world.check_invariants() {
        tracing::error!(%violation, "invariant violated after draining");
        return ExitCode::FAILURE;
    }

    let matched = (0..world.num_clients())
        .filter_map(|i| world.client(i))
        .filter(|sim| sim.client().state() == SessionState::Matched)
        .count();
    let joins: usize =
        (0..world.num_clients()).filter_map(|i| world.client(i)).map(|sim| sim.joins_sent()).sum();

    tracing::info!(
        matched,
        joins,
        queued = world.matchmaker().queue_len(),
        elapsed = ?tandem_client::Environment::now(world.env()).since_start(),
        "simulation finished"
    );

    ExitCode::SUCCESS
}
