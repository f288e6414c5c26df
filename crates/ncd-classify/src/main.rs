//! NCD k-nearest-neighbour text classifier.

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ncd_classify::app::{
    AppError, classify_once, evaluate, load_classifier, read_corpus, run_interactive,
};
use ncd_classify::config::{ClassifierConfig, write_example_config};

/// ncd-classify CLI.
#[derive(Debug, Parser)]
#[command(name = "ncd-classify")]
#[command(about = "Parameter-free text classification with compression distance")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Options shared by every command that loads a corpus.
#[derive(Debug, clap::Args)]
struct RunArgs {
    /// TOML config file path.
    #[arg(long, default_value = "ncd-classify.toml")]
    config: PathBuf,
    /// Neighbours consulted per vote (overrides `engine.k`).
    #[arg(long)]
    k: Option<usize>,
    /// Worker threads (overrides `engine.workers`).
    #[arg(long)]
    workers: Option<usize>,
}

impl RunArgs {
    fn load_config(&self) -> Result<ClassifierConfig, AppError> {
        let mut cfg = ClassifierConfig::from_toml_file(&self.config)?;
        cfg.apply_overrides(self.k, self.workers)?;
        Ok(cfg)
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Classify a single text.
    Classify {
        #[command(flatten)]
        run: RunArgs,
        /// Print the prediction as JSON.
        #[arg(long)]
        json: bool,
        /// Text to classify.
        text: String,
    },
    /// Classify one line of stdin at a time.
    Interactive {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Measure accuracy against a labeled corpus file.
    Evaluate {
        #[command(flatten)]
        run: RunArgs,
        /// Labeled test file in the same format as the training corpus.
        #[arg(long)]
        test: PathBuf,
    },
    /// Write the example configuration.
    InitConfig {
        /// Destination path.
        #[arg(long, default_value = "ncd-classify.toml")]
        path: PathBuf,
        /// Replace an existing file.
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(Cli::parse()) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let stdout = std::io::stdout();
    match cli.command {
        Command::Classify { run, json, text } => {
            let cfg = run.load_config()?;
            let classifier = load_classifier(&cfg)?;
            classify_once(&classifier, &cfg, text.as_bytes(), json, &mut stdout.lock())?;
        }
        Command::Interactive { run } => {
            let cfg = run.load_config()?;
            let classifier = load_classifier(&cfg)?;
            let stdin = std::io::stdin();
            let prompt = stdin.is_terminal();
            if prompt {
                eprintln!("enter text to classify, `quit` to exit");
            }
            run_interactive(&classifier, &cfg, stdin.lock(), &mut stdout.lock(), prompt)?;
        }
        Command::Evaluate { run, test } => {
            let cfg = run.load_config()?;
            let classifier = load_classifier(&cfg)?;
            let test_corpus = read_corpus(&test, &cfg.corpus.loader_options()?)?;
            let report = evaluate(&classifier, &test_corpus, cfg.engine.k)?;
            print!("{}", report.to_text(&cfg));
        }
        Command::InitConfig { path, force } => {
            write_example_config(&path, force)?;
            eprintln!("wrote {}", path.display());
        }
    }
    Ok(())
}
