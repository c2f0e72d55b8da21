use clap::{
    Parser,
    Subcommand,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long)]
    pub config: PathBuf,

    /// Path to the peptide list (overrides config file)
    #[arg(short, long)]
    pub peptides: Option<PathBuf>,

    /// Path to the spectra (overrides config file)
    #[arg(short, long)]
    pub spectra: Option<PathBuf>,

    /// Output directory (overrides config file)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Worker threads, defaults to one per core
    #[arg(short, long)]
    pub threads: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Build the fragment mass index and report its statistics
    Build,
    /// Rank candidate peptides for every spectrum
    Candidates,
    /// Annotate peptide pairs and localise their crosslink sites
    Resolve,
}
