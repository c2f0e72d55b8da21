mod cli;
mod commands;
mod config;
mod errors;
mod progress;

use clap::Parser;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use cli::{
    Cli,
    Command,
};
use config::{
    Config,
    InputConfig,
    OutputConfig,
};
use errors::CliError;

#[cfg(target_os = "windows")]
use mimalloc::MiMalloc;

#[cfg(target_os = "windows")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn load_config(args: &Cli) -> Result<Config, CliError> {
    let conf = std::fs::File::open(&args.config).map_err(|e| CliError::io(e, &args.config))?;
    let mut config: Config =
        serde_json::from_reader(conf).map_err(|e| CliError::ParseError { msg: e.to_string() })?;

    // Command line arguments win over the config file
    if let Some(peptides) = &args.peptides {
        config.input = Some(match config.input.take() {
            Some(InputConfig::Json {
                spectra, matches, ..
            }) => InputConfig::Json {
                peptides: peptides.clone(),
                spectra,
                matches,
            },
            None => InputConfig::Json {
                peptides: peptides.clone(),
                spectra: None,
                matches: None,
            },
        });
    }
    if let Some(path) = &args.spectra {
        match config.input.as_mut() {
            Some(InputConfig::Json { spectra, .. }) => *spectra = Some(path.clone()),
            None => {
                return Err(CliError::Config {
                    source: "--spectra given without a peptide list".to_string(),
                });
            }
        }
    }
    if let Some(output_dir) = &args.output_dir {
        let dump_index = config.output.as_ref().is_some_and(|o| o.dump_index);
        config.output = Some(OutputConfig {
            directory: output_dir.clone(),
            dump_index,
        });
    }
    Ok(config)
}

fn main() -> std::result::Result<(), CliError> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        ) // This uses RUST_LOG environment variable
        .init();

    let args = Cli::parse();
    let config = load_config(&args)?;

    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| CliError::Config {
                source: e.to_string(),
            })?;
    }

    let Some(input) = config.input.clone() else {
        return Err(CliError::Config {
            source: "No input provided, please provide one in either the config file or with the --peptides flag".to_string(),
        });
    };
    let Some(output) = config.output.clone() else {
        return Err(CliError::Config {
            source: "No output directory provided, please provide one in either the config file or with the --output-dir flag".to_string(),
        });
    };
    info!("Parsed configuration: {:#?}", config);

    std::fs::create_dir_all(&output.directory)
        .map_err(|e| CliError::io(e, &output.directory))?;

    match args.command {
        Command::Build => commands::build(&config, input.peptides(), &output.directory),
        Command::Candidates => commands::candidates(
            &config,
            input.peptides(),
            input.spectra(),
            &output.directory,
        ),
        Command::Resolve => commands::resolve(
            &config,
            input.peptides(),
            input.spectra(),
            &output.directory,
        ),
    }
}
