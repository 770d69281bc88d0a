//! Event Config Generator
//!
//! Prints the 32-byte event bitmask for a list of enforcer events.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin configure_events -- HolographERC721Event.beforeSafeTransfer HolographERC721Event.afterBurn
//! cargo run --bin configure_events -- --all
//! ```
//!
//! Names may be given with or without the `HolographERC20Event.` /
//! `HolographERC721Event.` prefix; the first prefixed name picks the
//! standard, ERC721 otherwise.

use anyhow::Result;
use clap::Parser;
use holograph_deployer::events::{all_events_enabled, parse_event_config};

#[derive(Parser, Debug)]
#[command(name = "configure_events")]
#[command(about = "Print the event config bitmask for enforcer events")]
struct Args {
    /// Enable every event
    #[arg(long, conflicts_with = "events")]
    all: bool,

    /// Event names to enable
    #[arg(required_unless_present = "all")]
    events: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = if args.all {
        all_events_enabled()
    } else {
        parse_event_config(&args.events)?
    };

    println!("{}", config);
    Ok(())
}
