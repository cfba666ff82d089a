//! Decant Run - compiles a transfer request into a driver script
//!
//! Loads a deck description, a policy rule set and a transfer request
//! from JSON files, compiles, and prints the primitive script.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use decant_compiler::{Compiler, RuleSet, ScriptDriver, Transfer, TracingSink};
use decant_model::Deck;

#[derive(Parser, Debug)]
#[command(name = "decant-run")]
#[command(about = "Compile a liquid-handling transfer request into a driver script")]
struct Cli {
    /// Transfer request JSON
    request: PathBuf,

    /// Deck description JSON
    #[arg(long)]
    deck: PathBuf,

    /// Policy rule-set JSON
    #[arg(long)]
    policies: PathBuf,

    /// Skip the initialize/finalize lifecycle brackets
    #[arg(long)]
    bare: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "decant_run=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let deck_text = fs::read_to_string(&cli.deck)
        .with_context(|| format!("reading deck {}", cli.deck.display()))?;
    let deck: Deck = serde_json::from_str(&deck_text)
        .with_context(|| format!("parsing deck {}", cli.deck.display()))?;

    let policy_text = fs::read_to_string(&cli.policies)
        .with_context(|| format!("reading policies {}", cli.policies.display()))?;
    let rules = RuleSet::from_json(&policy_text)
        .with_context(|| format!("parsing policies {}", cli.policies.display()))?;

    let request_text = fs::read_to_string(&cli.request)
        .with_context(|| format!("reading request {}", cli.request.display()))?;
    let transfer: Transfer = serde_json::from_str(&request_text)
        .with_context(|| format!("parsing request {}", cli.request.display()))?;

    info!(
        transfers = transfer.entries.len(),
        heads = deck.heads.len(),
        "compiling"
    );

    let mut compiler = Compiler::new(rules, deck).with_sink(Box::new(TracingSink));
    let program = if cli.bare {
        compiler.compile(transfer)?
    } else {
        compiler.compile_program(transfer)?
    };

    info!(primitives = program.len(), "emitting");

    let mut driver = ScriptDriver::new();
    compiler.emit(&program, &mut driver);
    println!("{}", driver.into_script());

    Ok(())
}
