use std::io::{self, BufReader, Stdin, Stdout};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use diskspeed::bench::BenchmarkOrchestrator;
use diskspeed::config::{resolve_size, BenchmarkConfig, BenchmarkSettings};
use diskspeed::console::{ConsoleSink, Prompter, Summary};
use diskspeed::error::{exit_code, user_friendly_message};
use diskspeed::io::volume::{self, list_volumes, volume_for_path};
use diskspeed::io::{DdRunner, SystemCachePurger};
use diskspeed::models::{BenchmarkReport, VolumeInfo};
use diskspeed::report::{export_json, write_log_report};
use diskspeed::util::units::{format_bytes, format_duration};
use diskspeed::{DiskSpeedError, Result};

type Engine = BenchmarkOrchestrator<DdRunner, SystemCachePurger>;
type StdPrompter = Prompter<BufReader<Stdin>, Stdout>;

/// Sequential write/read throughput benchmark for mounted volumes
#[derive(Parser, Debug)]
#[command(name = "diskspeed", version, about)]
struct Cli {
    /// Directory to benchmark (skips the volume menu)
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Test size: 1g, 5g, 10g or a byte size such as 512MiB (rounded down to whole MiB)
    #[arg(short, long)]
    size: Option<String>,

    /// Number of write+read rounds
    #[arg(short, long)]
    rounds: Option<u32>,

    /// Progress sampling interval, e.g. 100ms
    #[arg(long, value_parser = humantime::parse_duration)]
    interval: Option<Duration>,

    /// Pause between rounds, e.g. 1s
    #[arg(long, value_parser = humantime::parse_duration)]
    round_delay: Option<Duration>,

    /// Directory for .log reports
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Save the report without asking
    #[arg(long, conflicts_with = "no_save")]
    save: bool,

    /// Never save a report
    #[arg(long)]
    no_save: bool,

    /// Also export the report as JSON to this file
    #[arg(long, value_name = "FILE")]
    json: Option<PathBuf>,

    /// Start without the confirmation prompt
    #[arg(short = 'y', long)]
    yes: bool,

    /// Write the effective settings to the config file and exit
    #[arg(long)]
    save_settings: bool,

    /// Log progress details to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn is_scripted(&self) -> bool {
        self.path.is_some() && self.size.is_some()
    }

    /// Explicit save choice from the flags, if any
    fn save_choice(&self) -> Option<bool> {
        if self.save {
            Some(true)
        } else if self.no_save {
            Some(false)
        } else {
            None
        }
    }

    fn apply_to(&self, mut settings: BenchmarkSettings) -> BenchmarkSettings {
        if let Some(rounds) = self.rounds {
            settings = settings.with_rounds(rounds);
        }
        if let Some(interval) = self.interval {
            settings = settings.with_sample_interval(interval);
        }
        if let Some(delay) = self.round_delay {
            settings = settings.with_round_delay(delay);
        }
        if let Some(dir) = &self.log_dir {
            settings = settings.with_log_dir(dir.clone());
        }
        settings
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(DiskSpeedError::Cancelled) => {
            warn!("Interrupted by user");
            eprintln!("\n{}", user_friendly_message(&DiskSpeedError::Cancelled));
            0
        }
        Err(e) => {
            eprintln!("Error: {}", user_friendly_message(&e));
            exit_code(&e)
        }
    };

    std::process::exit(code);
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let settings = cli.apply_to(BenchmarkSettings::load()?);
    settings.validate()?;

    if cli.save_settings {
        settings.save()?;
        println!(
            "Settings saved to {}",
            BenchmarkSettings::config_file_path()?.display()
        );
        return Ok(());
    }

    print_banner();
    volume::ensure_supported_platform()?;
    volume::ensure_tools_available()?;

    let cancel = CancellationToken::new();
    spawn_signal_listener(cancel.clone());

    let engine = Engine::new(DdRunner::new(), SystemCachePurger::new(), settings);

    if cli.is_scripted() {
        run_scripted(&cli, &engine, &cancel).await
    } else {
        run_interactive(&cli, &engine, &cancel).await
    }
}

fn print_banner() {
    println!("==========================================");
    println!("  diskspeed - sequential throughput test");
    println!("==========================================");
}

/// Cancel `token` on Ctrl-C, and on SIGTERM where available
fn spawn_signal_listener(token: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                        _ = sigterm.recv() => info!("Received SIGTERM"),
                    }
                }
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!("Received SIGINT");
                    }
                }
            }
        }
        #[cfg(not(unix))]
        {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl-C");
            }
        }

        token.cancel();
    });
}

/// Single run from `--path` and `--size`
async fn run_scripted(cli: &Cli, engine: &Engine, cancel: &CancellationToken) -> Result<()> {
    let (Some(path), Some(size)) = (&cli.path, &cli.size) else {
        return Err(DiskSpeedError::ConfigError(
            "--path and --size are both required".to_string(),
        ));
    };

    let config = BenchmarkConfig::new(path.clone(), resolve_size(size)?);
    let volume = lookup_volume(&config.target_path);

    let report = run_benchmark(engine, config, volume, cancel).await?;
    persist(cli, engine, &report, cli.save_choice().unwrap_or(true))
}

async fn run_interactive(cli: &Cli, engine: &Engine, cancel: &CancellationToken) -> Result<()> {
    let mut prompter = Some(Prompter::new(BufReader::new(io::stdin()), io::stdout()));

    loop {
        let (target, volume) = match &cli.path {
            Some(path) => (path.clone(), lookup_volume(path)),
            None => {
                let volumes = list_volumes()?;
                let choices = volumes.clone();
                let index = prompt(&mut prompter, cancel, move |p| p.select_volume(&choices)).await?;
                let volume = volumes.get(index).cloned().ok_or_else(|| {
                    DiskSpeedError::ConfigError("Invalid volume selection".to_string())
                })?;
                (volume.mount_path.clone(), Some(volume))
            }
        };

        let size = match &cli.size {
            Some(size) => resolve_size(size)?,
            None => prompt(&mut prompter, cancel, |p| p.select_size()).await?.bytes(),
        };

        let config = BenchmarkConfig::new(target, size);
        config.validate()?;
        print_plan(&config, engine.settings());

        let start = cli.yes
            || prompt(&mut prompter, cancel, |p| p.confirm("Start the benchmark?", true)).await?;
        if start {
            let report = run_benchmark(engine, config, volume, cancel).await?;
            let save = match cli.save_choice() {
                Some(choice) => choice,
                None => {
                    prompt(&mut prompter, cancel, |p| p.confirm("Save the report?", true)).await?
                }
            };
            persist(cli, engine, &report, save)?;
        }

        let again =
            prompt(&mut prompter, cancel, |p| p.confirm("Run another benchmark?", false)).await?;
        if !again {
            return Ok(());
        }
    }
}

/// Run a blocking prompt off the async workers so a signal can still end the program
async fn prompt<T, F>(
    prompter: &mut Option<StdPrompter>,
    cancel: &CancellationToken,
    ask: F,
) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut StdPrompter) -> Result<T> + Send + 'static,
{
    let mut current = prompter.take().ok_or(DiskSpeedError::Cancelled)?;
    let task = tokio::task::spawn_blocking(move || {
        let answer = ask(&mut current);
        (current, answer)
    });

    tokio::select! {
        _ = cancel.cancelled() => Err(DiskSpeedError::Cancelled),
        joined = task => {
            let (current, answer) = joined.map_err(io::Error::other)?;
            *prompter = Some(current);
            answer
        }
    }
}

fn lookup_volume(path: &std::path::Path) -> Option<VolumeInfo> {
    match list_volumes() {
        Ok(volumes) => volume_for_path(&volumes, path).cloned(),
        Err(e) => {
            warn!("Could not list volumes: {}", e);
            None
        }
    }
}

fn print_plan(config: &BenchmarkConfig, settings: &BenchmarkSettings) {
    println!();
    println!("Target:      {}", config.target_path.display());
    println!("Size:        {}", format_bytes(config.target_size));
    println!("Rounds:      {}", settings.rounds);
    println!("Round delay: {}", format_duration(settings.round_delay));
}

async fn run_benchmark(
    engine: &Engine,
    config: BenchmarkConfig,
    volume: Option<VolumeInfo>,
    cancel: &CancellationToken,
) -> Result<BenchmarkReport> {
    let mut sink = ConsoleSink::new();
    let result = engine.run(&config, &mut sink, cancel).await?;
    drop(sink);

    print!("{}", Summary(&result));
    Ok(BenchmarkReport::new(config, volume, result))
}

fn persist(cli: &Cli, engine: &Engine, report: &BenchmarkReport, save: bool) -> Result<()> {
    if save {
        let path = write_log_report(&engine.settings().log_dir, report)?;
        println!("Report saved to {}", path.display());
    }

    if let Some(json) = &cli.json {
        export_json(json, report)?;
        println!("JSON report saved to {}", json.display());
    }

    Ok(())
}
