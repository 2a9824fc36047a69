//! mpme command-line front end

use async_trait::async_trait;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use console::Term;
use mpme::export::RemovableDiskSink;
use mpme::fetch::YtDlpDownloader;
use mpme::runner::format_eta;
use mpme::stats::{DEFAULT_TOP_ARTISTS, LibraryStats};
use mpme::tag::Id3Tagger;
use mpme::{BatchRunner, Config, DiskSelector, Event, ExportError, ExportSink, Result, song_list};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mpme", version, about = "Fetch, tag and export music in batches")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true, env = "MPME_CONFIG")]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download every song in a list, then offer exports
    Fetch(FetchArgs),
    /// Export the current download directory
    Export {
        /// Sinks to run without asking (default: ask for each)
        #[arg(long = "sink", value_enum)]
        sinks: Vec<SinkArg>,
    },
    /// Show per-artist song counts
    Stats {
        /// Folder of songs (default: choose a removable disk)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Number of artists shown
        #[arg(long, default_value_t = DEFAULT_TOP_ARTISTS)]
        top: usize,
    },
}

#[derive(Args)]
struct FetchArgs {
    /// Song list: `[id~]name~artist` rows, or a `.json` document grouped by artist
    #[arg(long, required_unless_present = "stdin", conflicts_with = "stdin")]
    list: Option<PathBuf>,

    /// Read rows from standard input until EOF
    #[arg(long)]
    stdin: bool,

    /// 0-based position to resume from; keeps earlier downloads
    #[arg(long, default_value_t = 0)]
    start: usize,

    /// Skip ID3 tagging
    #[arg(long)]
    no_tag: bool,

    /// Keep files already in the download directory
    #[arg(long)]
    keep_downloads: bool,

    /// Sinks to run without asking (default: ask for each)
    #[arg(long = "export", value_enum)]
    export: Vec<SinkArg>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SinkArg {
    Disk,
    Local,
    Cloud,
}

impl SinkArg {
    fn of(sink: &ExportSink) -> Self {
        match sink {
            ExportSink::RemovableDisk(_) => SinkArg::Disk,
            ExportSink::LocalBackup(_) => SinkArg::Local,
            ExportSink::Cloud => SinkArg::Cloud,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "mpme failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "mpme=warn",
        1 => "mpme=info",
        _ => "mpme=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path).await?,
        None => Config::default(),
    };

    match cli.command {
        Command::Fetch(args) => {
            if args.no_tag {
                config.download.tag_songs = false;
            }
            if args.keep_downloads || args.start > 0 {
                config.download.reset_download_dir = false;
            }
            let config = Arc::new(config);
            fetch(&config, &args).await?;
            offer_exports(&config, &args.export).await;
            println!("Finished.");
            Ok(())
        }
        Command::Export { sinks } => {
            offer_exports(&Arc::new(config), &sinks).await;
            Ok(())
        }
        Command::Stats { dir, top } => stats(Arc::new(config), dir, top).await,
    }
}

async fn fetch(config: &Arc<Config>, args: &FetchArgs) -> Result<()> {
    let songs = match &args.list {
        Some(path) => song_list::load_file(path).await?,
        None => {
            println!("Paste song rows, one per line (Ctrl+D when done):");
            song_list::read_lines(tokio::io::BufReader::new(tokio::io::stdin())).await?
        }
    };

    let downloader = Arc::new(YtDlpDownloader::from_config(&config.tools)?);
    let runner = BatchRunner::new(config.clone(), downloader).with_tagger(Arc::new(Id3Tagger::new()));
    let printer = tokio::spawn(print_events(runner.subscribe()));

    println!("Preparing {}...", config.download_dir().display());
    runner.prepare().await?;
    let report = runner.fetch_all(&songs, args.start).await;

    // closing the channel lets the printer drain and stop
    drop(runner);
    printer.await.ok();

    println!();
    print!("{}", report?);
    Ok(())
}

async fn print_events(mut events: broadcast::Receiver<Event>) {
    loop {
        match events.recv().await {
            Ok(event) => print_event(&event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "progress output lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_event(event: &Event) {
    match event {
        Event::BatchStarted { total, start_index } => {
            println!("Fetching {} of {total} songs...", total - start_index);
        }
        Event::Fetching {
            index,
            total,
            song,
            eta_seconds,
        } => {
            println!("({index}/{total}) ETA {}  {song}", format_eta(*eta_seconds));
        }
        Event::AttemptFailed {
            attempt,
            max_attempts,
            error,
            ..
        } => {
            println!("  Issue: {error}");
            println!("  Attempt {attempt}/{max_attempts} failed");
        }
        Event::FetchFailed { attempts, .. } => {
            println!("  Unable to fetch song after {attempts} attempts. Skipping...");
        }
        Event::TagFailed { error, .. } => println!("  Tagging failed: {error}"),
        Event::Oversized { size_mb, .. } => println!("  Large file: {size_mb:.1} MB"),
        Event::Fetched { .. } | Event::Tagged { .. } | Event::BatchFinished { .. } => {}
    }
}

/// Offer every sink in turn; `chosen` skips the questions
async fn offer_exports(config: &Arc<Config>, chosen: &[SinkArg]) {
    let cancel = CancellationToken::new();
    let signals = tokio::spawn(cancel_then_quit(cancel.clone()));

    let selector: Arc<dyn DiskSelector> = Arc::new(ConsoleSelector);
    for sink in ExportSink::all(config, selector, cancel) {
        let wanted = if chosen.is_empty() {
            confirm(format!("Export to {} [y]: ", sink.name())).await
        } else {
            chosen.contains(&SinkArg::of(&sink))
        };
        if !wanted {
            continue;
        }

        match sink.export(config.download_dir()).await {
            Ok(report) => println!(
                "Exported {} files to {}",
                report.files_copied,
                report.destination.display()
            ),
            Err(e) => {
                tracing::warn!(sink = sink.name(), error = %e, "export failed");
                println!("Export to {} failed: {e}", sink.name());
            }
        }
    }

    signals.abort();
}

/// First signal stops the disk search, a second one quits
async fn cancel_then_quit(cancel: CancellationToken) {
    mpme::cancel_on_signal(cancel).await;
    println!("Disk search cancelled. Press Ctrl+C again to quit.");
    mpme::wait_for_signal().await;
    std::process::exit(130);
}

async fn stats(config: Arc<Config>, dir: Option<PathBuf>, top: usize) -> Result<()> {
    let dir = match dir {
        Some(dir) => dir,
        None => {
            let cancel = CancellationToken::new();
            let signals = tokio::spawn(cancel_then_quit(cancel.clone()));
            let sink = RemovableDiskSink::new(config, Arc::new(ConsoleSelector), cancel);
            let mounted = sink.resolve_mount().await;
            signals.abort();
            mounted?
        }
    };

    let songs = mpme::stats::load_songs(&dir).await?;
    println!();
    print!("{}", LibraryStats::from_songs(&songs).display_top(top));
    Ok(())
}

/// Disk selection on the terminal
struct ConsoleSelector;

#[async_trait]
impl DiskSelector for ConsoleSelector {
    async fn prompt(&self, candidates: &[String]) -> std::result::Result<String, ExportError> {
        let mut text = String::from("Which disk?\n");
        for (i, disk) in candidates.iter().enumerate() {
            text.push_str(&format!(" ({}) {disk}\n", i + 1));
        }
        text.push_str(": ");

        match read_answer(text).await {
            Ok(Some(answer)) => Ok(answer),
            Ok(None) => Err(ExportError::Prompt("standard input is not a terminal".into())),
            Err(e) => Err(ExportError::Prompt(e.to_string())),
        }
    }
}

/// Yes unless the operator answers something other than `y`
async fn confirm(question: String) -> bool {
    match read_answer(question).await {
        Ok(Some(answer)) => {
            let answer = answer.trim();
            answer.is_empty() || answer.eq_ignore_ascii_case("y")
        }
        Ok(None) => false,
        Err(e) => {
            tracing::warn!(error = %e, "could not read answer");
            false
        }
    }
}

/// Print `prompt` and read one line; None when there is no terminal to ask
async fn read_answer(prompt: String) -> std::io::Result<Option<String>> {
    tokio::task::spawn_blocking(move || {
        let term = Term::stdout();
        if !term.is_term() {
            return Ok(None);
        }
        term.write_str(&prompt)?;
        term.read_line().map(Some)
    })
    .await
    .map_err(std::io::Error::other)?
}

