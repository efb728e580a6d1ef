use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use gbksync::{discover_settings, encoding, engine, Sniffer};

/// Inspect and convert GBK text files outside an editor.
#[derive(Debug, Parser)]
#[command(name = "gbksync", version)]
struct Cli {
    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Report how each file would be treated when opened.
    Sniff {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Sniffing time budget in milliseconds (overrides gbksync.toml).
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Print a file's text as UTF-8 with LF line endings.
    Decode {
        file: PathBuf,
        #[arg(short, long, default_value = "gbk")]
        encoding: String,
    },
    /// Write UTF-8 text from stdin to a file with CRLF line endings.
    Encode {
        file: PathBuf,
        #[arg(short, long, default_value = "gbk")]
        encoding: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("gbksync: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Sniff { files, timeout_ms } => {
            let cwd = std::env::current_dir()?;
            let (settings, _) = discover_settings(&cwd);
            let budget = timeout_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| settings.sniff_budget());
            let sniffer = Sniffer::new().budget(budget);

            let mut stdout = io::stdout().lock();
            for file in files {
                match sniffer.sniff_file(&file) {
                    Ok(decision) => writeln!(stdout, "{}: {:?}", file.display(), decision)?,
                    Err(err) => writeln!(stdout, "{}: {}", file.display(), err)?,
                }
            }
        }
        Command::Decode { file, encoding } => {
            let encoding = encoding::for_label(&encoding)?;
            let text = engine::decode_file(&file, encoding)?;
            io::stdout().lock().write_all(text.as_bytes())?;
        }
        Command::Encode { file, encoding } => {
            let encoding = encoding::for_label(&encoding)?;
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            engine::write_encoded(&file, &text, encoding)?;
        }
    }
    Ok(())
}

fn setup_tracing(verbose: bool) {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(if verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();
}
