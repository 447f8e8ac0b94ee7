use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use sigil_compiler::error::SchemaError;
use sigil_compiler::{compile_file, compile_str, Registry, DEFAULT_PREPROCESS_TIMEOUT};

#[derive(Parser)]
#[command(name = "sigil")]
#[command(about = "Compile and inspect sigil schema files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Skip the C preprocessor and read the input file verbatim
    #[arg(long, global = true)]
    no_preprocess: bool,

    /// Seconds the preprocessor may run before it is killed
    #[arg(long, global = true)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a schema file and report the first error, if any
    Check {
        /// Input schema file
        input: PathBuf,
    },

    /// Compile a schema file and print its definitions as JSON
    Dump {
        /// Input schema file
        input: PathBuf,

        /// Also print the builtin definitions
        #[arg(long)]
        all: bool,
    },
}

fn compile(cli: &Cli, input: &PathBuf) -> Result<Registry, SchemaError> {
    if cli.no_preprocess {
        let text = fs::read_to_string(input)?;
        compile_str(&text, &input.to_string_lossy())
    } else {
        let timeout = cli
            .timeout
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_PREPROCESS_TIMEOUT);
        compile_file(input, timeout)
    }
}

fn run(cli: &Cli) -> Result<(), SchemaError> {
    match &cli.command {
        Commands::Check { input } => {
            let registry = compile(cli, input)?;
            let count = registry.iter().filter(|(_, d)| !d.builtin).count();
            println!("{}: {} definitions", input.display(), count);
            Ok(())
        }

        Commands::Dump { input, all } => {
            let registry = compile(cli, input)?;
            let defs: Vec<_> = registry
                .iter()
                .map(|(_, d)| d)
                .filter(|d| *all || !d.builtin)
                .collect();
            let json = serde_json::to_string_pretty(&defs)
                .map_err(|e| SchemaError::Encode(e.to_string()))?;
            println!("{}", json);
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}
