//! Example: seed -> graph -> PR pipeline driven from stdin.
//!
//! Type a digit and press enter to submit an event:
//!
//! ```text
//! 0: SeedCheckedIn
//! 1: ValidationFailed
//! 2: ValidationSucceeded
//! 3: GraphCheckedIn
//! ```
//!
//! `q` or end of input shuts the machine down after the queue drains. Set
//! `RUST_LOG=debug` to see every dequeued event.

use std::convert::Infallible;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_fsm_engine::Fsm;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum State {
    WaitingForSeed,
    GraphGenerated,
    PrSubmitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Event {
    SeedCheckedIn,
    ValidationFailed,
    ValidationSucceeded,
    GraphCheckedIn,
}

impl Event {
    const ALL: [Event; 4] = [
        Event::SeedCheckedIn,
        Event::ValidationFailed,
        Event::ValidationSucceeded,
        Event::GraphCheckedIn,
    ];

    fn from_key(key: &str) -> Option<Self> {
        key.parse::<usize>()
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }
}

fn announce(lines: [&'static str; 2]) -> impl Fn() -> std::future::Ready<Result<(), Infallible>> {
    move || {
        for line in lines {
            println!("{line}");
        }
        std::future::ready(Ok(()))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    for (idx, event) in Event::ALL.iter().enumerate() {
        println!("{idx}: {event:?}");
    }

    let (handle, task) = Fsm::builder(State::WaitingForSeed)
        .name("seed-pipeline")
        .transition(
            State::WaitingForSeed,
            Event::SeedCheckedIn,
            State::GraphGenerated,
            announce([
                "Seed check-in detected, generating the graph.",
                "Graph generated, waiting for validation results.",
            ]),
        )
        .transition(
            State::GraphGenerated,
            Event::ValidationSucceeded,
            State::PrSubmitted,
            announce([
                "Validation succeeded, submitting the PR.",
                "PR submitted, waiting for completion.",
            ]),
        )
        .transition(
            State::PrSubmitted,
            Event::GraphCheckedIn,
            State::WaitingForSeed,
            announce([
                "PR completed.",
                "Graph checked in, waiting for a new seed.",
            ]),
        )
        .transition(
            State::GraphGenerated,
            Event::ValidationFailed,
            State::WaitingForSeed,
            announce([
                "Validation failed.",
                "Waiting for a new seed.",
            ]),
        )
        .build()
        .spawn();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "failed to read stdin");
                break;
            }
        };

        let key = line.trim();
        if key.eq_ignore_ascii_case("q") {
            break;
        }
        match Event::from_key(key) {
            Some(event) => handle.submit(event),
            None => println!("unknown key {key:?}, expected 0-3 or q"),
        }
    }

    handle.shutdown_graceful();
    match task.await {
        Ok(state) => println!("stopped in {state:?}"),
        Err(e) => tracing::error!(error = %e, "pipeline failed"),
    }
}
