use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use dialign::cli::{Cli, Commands};
use dialign::config::Config;
use dialign::engine::{Engine, TrackOutcome};
use dialign::output::render_alignment;
use dialign::recognition::{ProgressObserver, Recognizer};
use dialign::session::{Manifest, Session};
use dialign::store::{ContentHash, FfmpegTranscoder, MediaKind};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "dialign", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(cli.quiet, cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let manifest_path = cli.project.unwrap_or_else(Manifest::default_path);

    match cli.command {
        Commands::Import { files } => {
            let mut engine = open_engine(config, &manifest_path)?;
            let report = engine.import(&files).await?;
            for item in &report.items {
                let status = if item.hashed {
                    "ok".green().to_string()
                } else {
                    "not hashed".yellow().to_string()
                };
                println!("  {} {}", item.path.display(), status);
            }
            for (path, reason) in &report.failed {
                println!("  {} {}", path.display(), reason.red());
            }
        }
        Commands::Transcribe {
            concurrency,
            timeout,
            language,
            force,
        } => {
            let mut config = config;
            if let Some(n) = concurrency {
                config.recognition.concurrency = n;
            }
            if let Some(secs) = timeout {
                config.recognition.request_timeout_secs = secs;
            }
            if let Some(language) = language {
                config.recognition.language = language;
            }
            config.validate()?;

            // Backend problems are fatal before any work starts
            let recognizer = build_recognizer(&config)?;
            let engine = open_engine(config, &manifest_path)?;
            let observer = BarObserver::new(!cli.quiet);
            let report = engine.transcribe(recognizer, force, &observer).await?;

            let mut failed = 0;
            for (hash, outcome) in &report.tracks {
                match outcome {
                    TrackOutcome::Cached => println!("  {} {}", hash.short(), "cached".dimmed()),
                    TrackOutcome::Transcribed { words, report } => println!(
                        "  {} {} words ({}/{} segments)",
                        hash.short(),
                        words,
                        report.succeeded,
                        report.segments
                    ),
                    TrackOutcome::Failed(reason) => {
                        failed += 1;
                        println!("  {} {}", hash.short(), reason.red());
                    }
                }
            }
            if failed > 0 {
                bail!("{} track(s) could not be transcribed", failed);
            }
        }
        Commands::Match { script } => {
            let engine = open_engine(config, &manifest_path)?;
            let script = script
                .map(|s| resolve_script(&engine, &s))
                .transpose()?;
            let aligned = engine.align(script.as_ref()).await?;
            for (hash, alignment) in &aligned {
                println!(
                    "{} ({}): {}/{} lines matched",
                    alignment.title.bold(),
                    hash.short(),
                    alignment.matched_count(),
                    alignment.lines.len()
                );
            }
        }
        Commands::Export { output } => {
            let engine = open_engine(config, &manifest_path)?;
            let doc = engine.export().await?;
            let json = serde_json::to_string_pretty(&doc)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    eprintln!("Wrote {}", path.display());
                }
                None => println!("{}", json),
            }
        }
        Commands::Report { output } => {
            let engine = open_engine(config, &manifest_path)?;
            let text = render_report(&engine, output.is_none()).await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, text)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    eprintln!("Wrote {}", path.display());
                }
                None => print!("{}", text),
            }
        }
        Commands::Clean => {
            let mut engine = open_engine(config, &manifest_path)?;
            engine.clear().await?;
            println!("{}", "Project cache cleared".green());
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

fn init_tracing(quiet: bool, verbose: u8) {
    let level = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,dialign={level}")));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

/// Load configuration from file and environment.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else {
        Config::load_or_default(&Config::default_path())?
    };
    Ok(config.with_env_overrides())
}

fn open_engine(config: Config, manifest_path: &Path) -> Result<Engine> {
    let session = Session::open(config, manifest_path, Arc::new(FfmpegTranscoder::system()))
        .with_context(|| format!("Failed to open project {}", manifest_path.display()))?;
    Ok(Engine::new(session))
}

#[cfg(feature = "http-backend")]
fn build_recognizer(config: &Config) -> Result<Arc<dyn Recognizer>> {
    let recognizer = dialign::recognition::HttpRecognizer::new(&config.recognition)?;
    Ok(Arc::new(recognizer))
}

#[cfg(not(feature = "http-backend"))]
fn build_recognizer(_config: &Config) -> Result<Arc<dyn Recognizer>> {
    bail!("dialign was built without a recognition backend (enable the http-backend feature)")
}

/// Accept either a content hash or the path a script was imported from.
fn resolve_script(engine: &Engine, arg: &str) -> Result<ContentHash> {
    let table = engine.session().store().table();
    let scripts = table.hashes_of(MediaKind::Script);
    if let Ok(hash) = arg.parse::<ContentHash>() {
        if !scripts.contains(&hash) {
            bail!("{} is not an imported script", arg);
        }
        return Ok(hash);
    }
    let path = Path::new(arg);
    let item = table
        .by_path(path)
        .or_else(|| {
            let absolute = std::fs::canonicalize(path).ok()?;
            table.iter().find(|item| {
                std::fs::canonicalize(&item.path).is_ok_and(|p| p == absolute)
            })
        })
        .with_context(|| format!("{} has not been imported", arg))?;
    if item.kind != Some(MediaKind::Script) {
        bail!("{} is not a script", arg);
    }
    item.usable_hash()
        .cloned()
        .with_context(|| format!("{} was imported but could not be hashed", arg))
}

/// Project media and stored alignments as text; `color` styles it for a
/// terminal.
async fn render_report(engine: &Engine, color: bool) -> Result<String> {
    let session = engine.session();
    let mut out = String::new();
    let title = if color {
        "Project".bold().to_string()
    } else {
        "Project".to_string()
    };
    writeln!(out, "{} {} ({})", title, session.manifest().name, session.dir().display())?;

    let table = session.store().table();
    if table.is_empty() {
        writeln!(out, "  no media imported")?;
        return Ok(out);
    }
    for item in table.iter() {
        let kind = item.kind.map_or("unsupported".to_string(), |k| k.to_string());
        let hash = item.hash.as_ref().map_or("-", |h| h.short());
        let status = match (item.hashed, color) {
            (true, true) => "ok".green().to_string(),
            (true, false) => "ok".to_string(),
            (false, true) => "not hashed".yellow().to_string(),
            (false, false) => "not hashed".to_string(),
        };
        writeln!(out, "  {:<8} {:<11} {} {}", hash, kind, status, item.path.display())?;
    }

    let doc = engine.export().await?;
    for (hash, alignment) in &doc {
        out.push('\n');
        out.push_str(&render_alignment(hash, alignment));
    }
    Ok(out)
}

/// Shows one progress bar per track while segments are recognized.
struct BarObserver {
    enabled: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl BarObserver {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            bar: Mutex::new(None),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&mut Option<ProgressBar>)) {
        match self.bar.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl ProgressObserver for BarObserver {
    fn track_started(&self, track: &str, segments: usize) {
        if !self.enabled {
            return;
        }
        let bar = ProgressBar::new(segments as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{prefix} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.set_prefix(track.chars().take(8).collect::<String>());
        self.with_bar(|slot| *slot = Some(bar));
    }

    fn segment_finished(&self, _index: usize, _ok: bool) {
        self.with_bar(|slot| {
            if let Some(bar) = slot {
                bar.inc(1);
            }
        });
    }

    fn track_finished(&self, _track: &str, words: usize) {
        self.with_bar(|slot| {
            if let Some(bar) = slot.take() {
                bar.finish_with_message(format!("{words} words"));
            }
        });
    }
}
