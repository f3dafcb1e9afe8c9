//! Coachline CLI
//!
//! Usage:
//!   coachline --replay events.jsonl         # Replay recorded session events
//!   cat events.jsonl | coachline            # Replay from stdin
//!   coachline --serve                       # HTTP + WebSocket API server
//!   coachline --replay events.jsonl --json  # JSON output

use clap::Parser;
use colored::Colorize;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

use coachline::config::AppConfig;
use coachline::core::{advise, run_server, AdviceCache, FallbackAdvisor, Session};
use coachline::types::{EventOutcome, SessionEvent};
use coachline::VERSION;

#[derive(Parser, Debug)]
#[command(
    name = "coachline",
    version = VERSION,
    about = "Coachline - Aggregate emotion samples and speech into coaching context",
    long_about = "Coachline turns per-frame emotion scores and transcribed words into\n\
                  one-second intervals, keeps a rolling buffer of them, and builds a\n\
                  compact context for an advice generator when something changes.\n\n\
                  Modes:\n  \
                  --replay FILE  Replay JSON-lines session events (stdin when omitted)\n  \
                  --serve        HTTP + WebSocket API server mode\n\n\
                  Event lines:\n  \
                  {\"type\":\"sample\",\"timestamp\":1.0,\"scores\":{\"Interest\":0.6}}\n  \
                  {\"type\":\"word\",\"text\":\"hello\",\"timestamp\":1.2}\n  \
                  {\"type\":\"segment\",\"text\":\"tell me more\",\"start\":2.0,\"end\":3.0}\n  \
                  {\"type\":\"tick\",\"now\":3.0}"
)]
struct Args {
    /// JSON-lines file of session events
    #[arg(short, long)]
    replay: Option<PathBuf>,

    /// Run as HTTP API server
    #[arg(short, long)]
    serve: bool,

    /// Server address (overrides config)
    #[arg(long)]
    addr: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "coachline=debug" } else { "coachline=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = match AppConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {}", e);
            std::process::exit(2);
        }
    };
    if let Some(addr) = &args.addr {
        config.server.addr = addr.clone();
    }

    if args.no_color {
        colored::control::set_override(false);
    }

    let result = if args.serve {
        run_serve(config).await
    } else {
        run_replay(&args, &config).await
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Replay recorded events through one session
async fn run_replay(args: &Args, config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let reader: Box<dyn BufRead> = match &args.replay {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let mut session = Session::new("replay", config.pipeline.clone());
    let advisor = FallbackAdvisor::new();
    let cache = Mutex::new(AdviceCache::from_config(&config.server));

    if !args.json {
        print_header(args.no_color);
    }

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let event: SessionEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(line = index + 1, error = %e, "skipping unparseable event");
                continue;
            }
        };

        let outcome = match session.handle_event(event) {
            Ok(outcome) => outcome,
            Err(e) => {
                eprintln!("{} line {}: {}", "session reset".red(), index + 1, e);
                continue;
            }
        };

        if args.json {
            if outcome.interval.is_some() {
                println!("{}", serde_json::to_string(&outcome)?);
            }
        } else {
            print_outcome(&outcome, args.no_color);
        }

        if let Some(context) = &outcome.context {
            let rendered = session.render_context(context);
            let advice = advise(&advisor, &cache, context, &rendered).await;
            if args.json {
                println!("{}", serde_json::to_string(&advice)?);
            } else {
                println!();
                println!("{}", rendered);
                println!();
                println!("{} {}", "ADVICE:".bold().green(), advice.text);
                println!();
            }
        }
    }

    let status = session.status();
    if args.json {
        println!("{}", serde_json::to_string(&status)?);
    } else {
        println!();
        println!(
            "Session ended. Intervals: {} | Triggers: {} | Words mapped: {} | Stale words: {}",
            status.intervals_processed,
            status.triggers_fired,
            status.speech.total_words_mapped,
            status.speech.stale_words_discarded
        );
    }
    Ok(())
}

fn print_outcome(outcome: &EventOutcome, no_color: bool) {
    let Some(interval) = &outcome.interval else {
        return;
    };

    if no_color {
        println!("{}", interval.to_parseable_string());
    } else {
        println!("{}", interval.to_terminal_string());
        if !interval.full_text.is_empty() {
            println!("  {} \"{}\"", "said".dimmed(), interval.full_text);
        }
    }

    if let Some(trigger) = outcome.trigger.filter(|t| t.should_trigger) {
        let line = format!("  >> context trigger ({})", trigger.reason);
        if no_color {
            println!("{}", line);
        } else {
            println!("{}", line.cyan());
        }
    }
}

fn print_header(no_color: bool) {
    let title = format!("Coachline v{} - Replay", VERSION);
    println!("========================================");
    if no_color {
        println!("  {}", title);
    } else {
        println!("  {}", title.bold());
    }
    println!("========================================");
    println!();
}

/// Run HTTP API server
async fn run_serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!("========================================");
    println!("  Coachline API Server v{}", VERSION);
    println!("========================================");
    println!();
    run_server(config).await
}
