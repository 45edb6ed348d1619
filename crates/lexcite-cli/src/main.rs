mod display;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use lexcite_core::{SearchConfig, TriggerDetector, demo_suggestions};
use lexcite_search::{Aggregator, SuggestionEngine, SuggestionState};
use lexcite_sources::{CourtListenerClient, FederalRegisterClient, GovInfoClient};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "lexcite", version, about = "Legal citation search from the terminal")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct GlobalArgs {
    /// TOML file with a `SearchConfig`; flags below override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable the CourtListener adapter.
    #[arg(long, global = true)]
    courtlistener: bool,

    /// Enable the GovInfo adapter.
    #[arg(long, global = true)]
    govinfo: bool,

    #[arg(long, global = true)]
    no_federal_register: bool,

    /// Per-provider request timeout in milliseconds.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[arg(long, global = true, env = "COURTLISTENER_API_KEY", hide_env_values = true)]
    courtlistener_api_key: Option<String>,

    #[arg(long, global = true, env = "GOVINFO_API_KEY", hide_env_values = true)]
    govinfo_api_key: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search every enabled provider and print ranked suggestions.
    Search {
        query: String,
        #[arg(long)]
        max_results: Option<usize>,
        /// Return nothing instead of demo data when providers come up empty.
        #[arg(long)]
        no_demo: bool,
        #[arg(long)]
        json: bool,
    },
    /// Show which trigger, if any, ends at the cursor.
    Detect {
        text: String,
        /// Byte offset; defaults to the end of the text.
        #[arg(long)]
        cursor: Option<usize>,
    },
    /// Report which providers have credentials configured.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// List the built-in demo suggestions.
    Demo {
        #[arg(long)]
        json: bool,
    },
    /// Fetch one raw record from a provider.
    Fetch {
        #[command(subcommand)]
        kind: FetchKind,
    },
    /// Treat each stdin line as the editor text (cursor at end) and print
    /// every published suggestion state. `!accept N` inserts suggestion N
    /// into the previous line; `!dismiss` closes the dropdown.
    Watch,
}

#[derive(Subcommand)]
enum FetchKind {
    /// Federal Register document by document number.
    Document { id: String },
    /// CourtListener opinion by id.
    Opinion { id: String },
    /// GovInfo package by package id.
    Package { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = build_config(&cli.global)?;

    match cli.command {
        Commands::Search {
            query,
            max_results,
            no_demo,
            json,
        } => {
            if let Some(n) = max_results {
                config.max_results = n;
            }
            if no_demo {
                config.use_demo_fallback = false;
            }
            let aggregator = Aggregator::from_config(&config);
            tracing::info!(providers = ?aggregator.providers(), query = %query, "searching");
            let outcome = aggregator.search(&query).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                display::print_outcome(&query, &outcome);
            }
        }

        Commands::Detect { text, cursor } => {
            let detector = TriggerDetector::default().with_min_query_len(config.min_query_len);
            let cursor = cursor.unwrap_or(text.len());
            let trigger = detector.detect(&text, cursor);
            display::print_trigger(&text, cursor, trigger.as_ref());
        }

        Commands::Status { json } => {
            let status = config.api_status();
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                display::print_api_status(&status);
            }
        }

        Commands::Demo { json } => {
            let demo = demo_suggestions();
            if json {
                println!("{}", serde_json::to_string_pretty(&demo)?);
            } else {
                display::print_candidates(&demo);
            }
        }

        Commands::Fetch { kind } => {
            let client = reqwest::Client::builder()
                .timeout(config.request_timeout())
                .build()
                .context("building HTTP client")?;
            let record = match kind {
                FetchKind::Document { id } => {
                    FederalRegisterClient::new(client, &config.federal_register)
                        .get_document(&id)
                        .await
                }
                FetchKind::Opinion { id } => {
                    CourtListenerClient::new(client, &config.courtlistener)
                        .get_opinion(&id)
                        .await
                }
                FetchKind::Package { id } => {
                    GovInfoClient::new(client, &config.govinfo)
                        .get_package(&id)
                        .await
                }
            }
            .context("fetch failed")?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }

        Commands::Watch => run_watch(&config).await?,
    }

    Ok(())
}

/// Layer CLI flags and environment keys over the config file (or defaults).
fn build_config(args: &GlobalArgs) -> Result<SearchConfig> {
    let mut config = match &args.config {
        Some(path) => SearchConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SearchConfig::default(),
    };

    if args.courtlistener {
        config.courtlistener.enabled = true;
    }
    if args.govinfo {
        config.govinfo.enabled = true;
    }
    if args.no_federal_register {
        config.federal_register.enabled = false;
    }
    if let Some(ms) = args.timeout_ms {
        config.request_timeout_ms = ms;
    }
    if let Some(key) = &args.courtlistener_api_key {
        config.courtlistener.api_token = Some(key.clone());
    }
    if let Some(key) = &args.govinfo_api_key {
        config.govinfo.api_key = Some(key.clone());
    }
    Ok(config)
}

/// A stdin command for `watch`, or plain editor text.
#[derive(Debug, PartialEq, Eq)]
enum WatchLine<'a> {
    Text(&'a str),
    Accept(usize),
    Dismiss,
}

fn parse_watch_line(line: &str) -> WatchLine<'_> {
    let trimmed = line.trim();
    if trimmed == "!dismiss" {
        return WatchLine::Dismiss;
    }
    if let Some(n) = trimmed.strip_prefix("!accept")
        && let Ok(n) = n.trim().parse()
    {
        return WatchLine::Accept(n);
    }
    WatchLine::Text(line)
}

async fn run_watch(config: &SearchConfig) -> Result<()> {
    let aggregator = Arc::new(Aggregator::from_config(config));
    let detector = TriggerDetector::default().with_min_query_len(config.min_query_len);
    let engine = SuggestionEngine::new(detector, aggregator, config.debounce());

    let mut rx = engine.subscribe();
    let printer = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let line = display::render_state_line(&rx.borrow_and_update());
            println!("{line}");
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_text = String::new();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        match parse_watch_line(&line) {
            WatchLine::Text(text) => {
                engine.on_text_change(text, text.len());
                last_text = text.to_string();
            }
            WatchLine::Accept(n) => {
                match engine.accept(&last_text, last_text.len(), n) {
                    Some(splice) => {
                        println!("> {}", splice.text);
                        last_text = splice.text;
                    }
                    None => println!("> no suggestion {n}"),
                }
            }
            WatchLine::Dismiss => engine.dismiss(),
        }
    }

    // Let the last search land before exiting.
    let within = config.debounce() + config.request_timeout() + Duration::from_secs(1);
    wait_until_settled(&mut engine.subscribe(), within).await;
    drop(engine);
    if tokio::time::timeout(Duration::from_millis(200), printer).await.is_err() {
        tracing::debug!("state printer still busy at exit");
    }
    Ok(())
}

/// Wait for the published state to stop loading. Returns `false` (and logs)
/// when it does not within `within` or the engine is gone.
async fn wait_until_settled(rx: &mut watch::Receiver<SuggestionState>, within: Duration) -> bool {
    match tokio::time::timeout(within, rx.wait_for(|s| !s.loading)).await {
        Ok(Ok(_)) => true,
        Ok(Err(_)) => {
            tracing::debug!("suggestion engine closed before the last search settled");
            false
        }
        Err(_) => {
            tracing::debug!(?within, "last search still loading at exit");
            false
        }
    }
}
