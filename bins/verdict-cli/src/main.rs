mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use verdict_common::types::Language;

#[derive(Parser)]
#[command(name = "verdict-cli")]
#[command(about = "Verdict CLI - Run, validate and grade code locally", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a source file once
    Run {
        /// Language tag (e.g., PYTHON, javascript)
        #[arg(short, long, value_parser = parse_language)]
        language: Language,

        /// Source file
        #[arg(short, long)]
        file: PathBuf,

        /// File fed to the program's stdin
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Wall-clock limit in seconds (defaults from config)
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Memory limit in MB (defaults from config)
        #[arg(short, long)]
        memory: Option<u64>,
    },

    /// Syntax check a source file without running it
    Validate {
        #[arg(short, long, value_parser = parse_language)]
        language: Language,

        #[arg(short, long)]
        file: PathBuf,
    },

    /// Grade a source file against a requirements document
    Grade {
        #[arg(short, long, value_parser = parse_language)]
        language: Language,

        #[arg(short, long)]
        file: PathBuf,

        /// Requirements JSON with testCases, timeout, setupCode, teardownCode
        #[arg(short, long)]
        suite: PathBuf,

        /// Challenge id reported in the result
        #[arg(short, long, default_value = "local")]
        challenge_id: String,

        /// Print hidden cases unredacted
        #[arg(long, default_value = "false")]
        show_hidden: bool,
    },

    /// List languages with an executor
    Languages,
}

fn parse_language(value: &str) -> std::result::Result<Language, String> {
    value.parse::<Language>().map_err(|_| {
        let known: Vec<&str> = Language::all_variants().iter().map(|l| l.as_str()).collect();
        format!("unknown language '{}', expected one of {}", value, known.join(", "))
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Results go to stdout as JSON; logs stay on stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let engine = commands::Engine::from_default_config()?;

    match cli.command {
        Commands::Run {
            language,
            file,
            input,
            timeout,
            memory,
        } => {
            commands::run(&engine, language, &file, input.as_deref(), timeout, memory).await?;
        }
        Commands::Validate { language, file } => {
            commands::validate(&engine, language, &file).await?;
        }
        Commands::Grade {
            language,
            file,
            suite,
            challenge_id,
            show_hidden,
        } => {
            commands::grade(&engine, language, &file, &suite, &challenge_id, show_hidden).await?;
        }
        Commands::Languages => {
            commands::languages(&engine)?;
        }
    }

    Ok(())
}
