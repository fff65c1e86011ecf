use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "anonkit",
    about = "Anonymize sensitive database columns in place with realistic fake data",
    version,
    after_help = "Examples:\n  anonkit anonymize --db mysql://root@localhost/shop\n  anonkit anonymize --group customer,sales --seed 42 --yes\n  anonkit anonymize --config base.toml --config site.toml\n  anonkit check --db mysql://root@localhost/shop\n  anonkit formatters --locale fr_FR"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Overwrite configured columns with generated data
    Anonymize(AnonymizeArgs),

    /// Report configured tables and columns missing from the database
    Check(CheckArgs),

    /// List available formatter names
    Formatters(FormattersArgs),
}

#[derive(Parser, Debug)]
pub struct AnonymizeArgs {
    /// Database connection URL (postgres://, mysql://, sqlite://)
    /// Falls back to DATABASE_URL env var, .env file, or anonkit.toml
    #[arg(long)]
    pub db: Option<String>,

    /// Configuration file; repeat to layer several (later files win)
    #[arg(short, long)]
    pub config: Vec<PathBuf>,

    /// Only anonymize these groups (e.g., customer,sales)
    #[arg(short, long)]
    pub group: Option<String>,

    /// Locale for generated data (overrides the config file)
    #[arg(long)]
    pub locale: Option<String>,

    /// Random seed for reproducible output
    #[arg(long)]
    pub seed: Option<u64>,

    /// Rows fetched per chunk
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Database connection URL (postgres://, mysql://, sqlite://)
    #[arg(long)]
    pub db: Option<String>,

    /// Configuration file; repeat to layer several
    #[arg(short, long)]
    pub config: Vec<PathBuf>,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: CheckFormat,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum CheckFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
pub struct FormattersArgs {
    /// Locale whose built-in formatters to list
    #[arg(long, default_value = "en_US")]
    pub locale: String,
}
