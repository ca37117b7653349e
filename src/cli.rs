use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "proflens")]
#[command(about = "Annotate course schedule pages with RateMyProfessors ratings")]
#[command(version)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Look up one professor and print the candidates
    Lookup {
        /// Professor name, e.g. "Smith, Jane"
        name: String,
        /// Override the school identifier
        #[arg(long)]
        school: Option<String>,
        /// How many candidates to request
        #[arg(short = 'n', long)]
        count: Option<u32>,
        /// Print the response envelope as JSON
        #[arg(long)]
        json: bool,
    },
    /// Annotate every instructor slot in a saved schedule page
    Annotate {
        /// Schedule page HTML file
        file: PathBuf,
        /// Output path (default: <input>.annotated.html)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Re-annotate slots already marked processed
        #[arg(long)]
        force: bool,
        /// Annotate with the first candidate even when its name does not
        /// match the displayed name
        #[arg(long)]
        no_match_guard: bool,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Watch a schedule page file and re-annotate as it changes
    Watch {
        /// Schedule page HTML file
        file: PathBuf,
        /// Output path (default: <input>.annotated.html)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
        /// Override the settle delay before the first scan (ms)
        #[arg(long)]
        settle_ms: Option<u64>,
        /// Stop after this many enrichment cycles
        #[arg(long)]
        max_cycles: Option<u64>,
        /// Re-annotate slots already marked processed
        #[arg(long)]
        force: bool,
        /// Annotate with the first candidate without a name check
        #[arg(long)]
        no_match_guard: bool,
    },
}
