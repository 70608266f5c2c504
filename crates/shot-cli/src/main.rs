use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    average::{self, AverageArgs},
    generate::{self, GenerateArgs},
    inspect::{self, InspectArgs},
    rule::{self, RuleArgs},
};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "shot-agg", about = "Per-shot data aggregation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a deterministic synthetic run of shot files.
    Generate(GenerateArgs),
    /// Average a quantity over a run or run set, split by condition and rule.
    Average(AverageArgs),
    /// Compile a selection rule and optionally count the shots it selects.
    Rule(RuleArgs),
    /// List the datasets of a shot file.
    Inspect(InspectArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();
    let cli = Cli::parse();
    match cli.command {
        Command::Generate(args) => generate::run(&args),
        Command::Average(args) => average::run(&args),
        Command::Rule(args) => rule::run(&args),
        Command::Inspect(args) => inspect::run(&args),
    }
}
