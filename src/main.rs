//! buweld CLI
//!
//! Entry point for the `buweld` command-line tool.

use clap::Parser;
use std::path::PathBuf;
use std::process;

use buweld::{document, Assembler, AssemblyError, Config, Overrides};

#[derive(Parser)]
#[command(name = "buweld")]
#[command(about = "Merge layered Butane configs into a single Ignition config", version)]
struct Cli {
    /// Project root directory
    #[arg(long, short = 'C', default_value = ".")]
    root: PathBuf,

    /// Path to the tool config file (default: <root>/buweld.toml)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Output path for the translated artifact, relative to the root
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Translator binary to invoke
    #[arg(long)]
    translator: Option<PathBuf>,

    /// Translator timeout in seconds
    #[arg(long)]
    timeout_seconds: Option<u64>,

    /// Print the merged document instead of invoking the translator
    #[arg(long)]
    dry_run: bool,

    /// Increase log verbosity (-v: info, -vv: debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let overrides = Overrides {
        output: cli.output,
        translator: cli.translator,
        timeout_seconds: cli.timeout_seconds,
    };
    let config = Config::load(&cli.root, cli.config.as_deref(), &overrides)
        .map_err(AssemblyError::from)
        .unwrap_or_else(|err| fail(err));

    let assembler = Assembler::new(config);
    let result = if cli.dry_run {
        print_merged(&assembler)
    } else {
        assembler.run().map(|_| ())
    };

    if let Err(err) = result {
        fail(err);
    }
}

fn print_merged(assembler: &Assembler) -> Result<(), AssemblyError> {
    let merged = assembler.assemble()?;
    let yaml = document::to_yaml(&merged)?;
    print!("{yaml}");
    Ok(())
}

fn fail(err: AssemblyError) -> ! {
    eprintln!("buweld: {err}");
    process::exit(err.exit_code());
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
