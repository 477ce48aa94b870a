//! Command-line parsing.

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "tether")]
#[command(about = "Call the tether gateway through its C ABI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Generative inference
    Generate(CallArgs),
    /// Lightweight model invocation
    Invoke(CallArgs),
    /// Credential issuance (input is the challenge, instructions the audience)
    Credential(CallArgs),
    /// Report which call sites are available
    Status,
    /// Print the library version
    Version,
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct CallArgs {
    /// Input text
    pub input: String,
    /// Instructions or configuration text
    #[arg(long, short)]
    pub instructions: Option<String>,
    /// Sampling temperature
    #[arg(long, short, default_value_t = 0.0, allow_negative_numbers = true)]
    pub temperature: f64,
    /// Length cap; zero or below means none
    #[arg(long, short = 'n', default_value_t = 0, allow_negative_numbers = true)]
    pub max_tokens: i32,
}
