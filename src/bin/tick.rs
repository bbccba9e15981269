//! Command-line front end.
//!
//! # Usage
//!
//! ```bash
//! # Order-book events for one symbol
//! tick convert -f bats-pitch-1.12 -s AAPL data/BATS_20120103.dat.gz out.tsv
//!
//! # Trades and quotes only, to stdout
//! tick convert -f nasdaq-itch-4.1 -s AAPL --shape taq data/S010312-v41.txt.gz
//!
//! # NYSE TAQ needs no exchange; the venue comes from each record
//! tick convert -f nyse-taq-1.7 -s IBM --shape taq data/taqtrade_20120103
//!
//! # Message counts
//! tick stat -f nasdaq-itch-4.1 data/S010312-v41.txt.gz
//! ```

use std::env;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use tick_normalizer::{convert_file, Format, MessageStats, OutputShape, Result, SessionConfig};

/// Parsed command line
enum Command {
    Convert {
        config: SessionConfig,
        input: PathBuf,
        /// Stdout when absent
        output: Option<PathBuf>,
    },
    Stat {
        format: Format,
        input: PathBuf,
        json: bool,
    },
}

fn parse_args() -> std::result::Result<Command, String> {
    let args: Vec<String> = env::args().collect();

    let command = match args.get(1).map(String::as_str) {
        Some("-h") | Some("--help") | None => {
            print_help();
            std::process::exit(0);
        }
        Some(cmd @ ("convert" | "stat")) => cmd.to_string(),
        Some(other) => return Err(format!("Unknown command: {}", other)),
    };

    let mut format: Option<Format> = None;
    let mut symbol: Option<String> = None;
    let mut date: Option<String> = None;
    let mut exchange: Option<String> = None;
    let mut time_zone: Option<String> = None;
    let mut shape = OutputShape::default();
    let mut progress = false;
    let mut json = false;
    let mut positional: Vec<PathBuf> = Vec::new();

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--format" | "-f" => {
                i += 1;
                let name = args.get(i).ok_or("--format requires a name")?;
                format = Some(Format::parse(name).map_err(|e| e.to_string())?);
            }
            "--symbol" | "-s" => {
                i += 1;
                symbol = Some(args.get(i).ok_or("--symbol requires a value")?.clone());
            }
            "--date" | "-d" => {
                i += 1;
                date = Some(args.get(i).ok_or("--date requires a value")?.clone());
            }
            "--exchange" | "-e" => {
                i += 1;
                exchange = Some(args.get(i).ok_or("--exchange requires a value")?.clone());
            }
            "--time-zone" | "-z" => {
                i += 1;
                time_zone = Some(args.get(i).ok_or("--time-zone requires a value")?.clone());
            }
            "--shape" | "-o" => {
                i += 1;
                let name = args.get(i).ok_or("--shape requires ob or taq")?;
                shape = OutputShape::parse(name)
                    .ok_or_else(|| format!("Unknown output shape: {}", name))?;
            }
            "--progress" | "-p" => {
                progress = true;
            }
            "--json" => {
                json = true;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            arg if arg.starts_with('-') && arg.len() > 1 => {
                return Err(format!("Unknown option: {}", arg));
            }
            arg => positional.push(PathBuf::from(arg)),
        }
        i += 1;
    }

    let format = format.ok_or("--format is required")?;
    let mut positional = positional.into_iter();
    let input = positional.next().ok_or("Input file is required")?;

    if command == "stat" {
        if positional.next().is_some() {
            return Err("stat takes a single input file".to_string());
        }
        return Ok(Command::Stat {
            format,
            input,
            json,
        });
    }

    let output = positional.next();
    if let Some(extra) = positional.next() {
        return Err(format!("Unknown argument: {}", extra.display()));
    }

    let symbol = symbol.ok_or("--symbol is required")?;
    let mut config = SessionConfig::new(format, symbol)
        .with_shape(shape)
        .with_progress(progress);
    if let Some(date) = date {
        config = config.with_date(date);
    }
    if let Some(exchange) = exchange {
        config = config.with_exchange(exchange);
    }
    if let Some(time_zone) = time_zone {
        config = config.with_time_zone(time_zone);
    }

    Ok(Command::Convert {
        config,
        input,
        output,
    })
}

fn print_help() {
    eprintln!(r#"
Tick Data Normalizer

Converts BATS PITCH, NASDAQ ITCH and NYSE TAQ feed files into a
tab-separated event stream for a single symbol.

USAGE:
    tick convert [OPTIONS] -f <FORMAT> -s <SYMBOL> <INPUT> [OUTPUT]
    tick stat [OPTIONS] -f <FORMAT> <INPUT>

COMMANDS:
    convert    Reconstruct events for one symbol
    stat       Print message counts per type

OPTIONS:
    -f, --format <FORMAT>    bats-pitch-1.12, nasdaq-itch-4.1 or nyse-taq-1.7
    -s, --symbol <SYMBOL>    Symbol to extract
    -d, --date <DATE>        Trading date (default: parsed from file name)
    -e, --exchange <MIC>     Exchange column (default: per format)
    -z, --time-zone <TZ>     Time zone column (default: America/New_York)
    -o, --shape <SHAPE>      Output columns: ob or taq (default: ob)
    -p, --progress           Show progress on stderr
        --json               Print stat output as JSON
    -h, --help               Print this help message

EXAMPLES:
    # Order-book events
    tick convert -f bats-pitch-1.12 -s AAPL BATS_20120103.dat.gz aapl.tsv

    # Trades and quotes
    tick convert -f nyse-taq-1.7 -s IBM -o taq taqquote_20120103 ibm.tsv

    # Message counts
    tick stat -f nasdaq-itch-4.1 S010312-v41.txt.gz
"#);
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Convert {
            config,
            input,
            output,
        } => {
            log::debug!("session config: {}", config.to_json()?);
            match output {
                Some(path) => {
                    let file = File::create(&path)
                        .map_err(|e| tick_normalizer::DecodeError::io(&path, &e))?;
                    convert_file(&input, &config, BufWriter::new(file))?;
                }
                None => {
                    let stdout = io::stdout();
                    convert_file(&input, &config, BufWriter::new(stdout.lock()))?;
                }
            }
        }
        Command::Stat {
            format,
            input,
            json,
        } => {
            let stats = MessageStats::from_file(format, &input)?;
            let text = if json { stats.to_json()? } else { stats.report() };
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{}", text.trim_end())?;
        }
    }
    Ok(())
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let command = match parse_args() {
        Ok(command) => command,
        Err(e) => {
            eprintln!("tick: error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(command) {
        eprintln!("tick: error: {}", e);
        std::process::exit(1);
    }
}
