//! Logdeck Demo - Many Producers, One Screen
//!
//! Starts a render server on the current terminal and drives it from a mix of
//! OS threads and tokio tasks, each with its own progress bar and log output.
//! Halfway through, one worker reports a failure and the message area is
//! resized at runtime.
//!
//! # Usage
//!
//! ```bash
//! # Defaults (config file, then LOGDECK_* environment, then flags)
//! logdeck-demo
//!
//! # More workers, faster repaints
//! logdeck-demo --threads 6 --tasks 4 --redraw-interval-ms 100
//!
//! # Render diagnostics go to a file; the terminal belongs to the renderer
//! RUST_LOG=logdeck_core=trace logdeck-demo --diagnostics demo-trace.log
//! ```

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use tracing::info;

use logdeck_core::sink::sink_from_config;
use logdeck_core::{
    command_channel, default_config_path, load_config_from_path, ConfigOverrides, LogLevel,
    Logger, RenderConfig, RenderServer, Renderer, TaskSpec, Terminal, TrackProgress,
};

/// Logdeck demo - concurrent producers sharing one terminal
#[derive(Parser, Debug)]
#[command(name = "logdeck-demo")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "LOGDECK_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of OS-thread producers
    #[arg(long, default_value_t = 3)]
    threads: usize,

    /// Number of tokio task producers
    #[arg(long, default_value_t = 2)]
    tasks: usize,

    /// Iterations per producer
    #[arg(long, default_value_t = 40)]
    steps: u64,

    /// Messages kept on screen
    #[arg(long, value_name = "N")]
    message_capacity: Option<usize>,

    /// Bar rows reserved even when idle
    #[arg(long, value_name = "N")]
    permanent_slots: Option<usize>,

    /// Minimum time between repaints
    #[arg(long, value_name = "MS")]
    redraw_interval_ms: Option<u64>,

    /// Console level (debug, info, warning, error, critical)
    #[arg(long, value_name = "LEVEL")]
    console_level: Option<LogLevel>,

    /// Durable log file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// File receiving the renderer's own diagnostics
    #[arg(long, value_name = "PATH", default_value = "logdeck-demo.trace.log")]
    diagnostics: PathBuf,

    /// Diagnostics level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "LOGDECK_DIAGNOSTICS_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(n) = self.message_capacity {
            overrides = overrides.with_message_capacity(n);
        }
        if let Some(n) = self.permanent_slots {
            overrides = overrides.with_permanent_slots(n);
        }
        if let Some(ms) = self.redraw_interval_ms {
            overrides = overrides.with_redraw_interval_ms(ms);
        }
        if let Some(level) = self.console_level {
            overrides = overrides.with_console_level(level);
        }
        if let Some(path) = &self.log_file {
            overrides = overrides.with_log_file(path.clone());
        }
        overrides
    }
}

/// Send tracing output to a file; stdout is owned by the renderer
fn init_logging(path: &Path, level: &str) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create diagnostics file: {path:?}"))?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("logdeck_demo={level},logdeck_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .init();

    Ok(())
}

fn step_delay() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(20..120))
}

/// Producer on a plain OS thread, driving its bar by explicit updates
fn thread_worker(logger: &Logger, id: usize, steps: u64) -> Result<()> {
    let key = logger.new_task(
        TaskSpec::new(steps)
            .with_prefix(format!("thread {id}"))
            .with_elapsed(true),
    )?;

    for step in 1..=steps {
        std::thread::sleep(step_delay());
        logger.update(&key, i64::try_from(step)?)?;

        if step % 10 == 0 {
            logger.info(format!("thread {id} reached step {step}"))?;
        }
        if id == 0 && step == steps / 2 {
            let failure = anyhow::anyhow!("connection reset by peer")
                .context(format!("fetching batch {step}"));
            logger.exception(format!("{failure:?}"), Some("fetcher"))?;
            logger.warning(format!("thread {id} retrying after failure"))?;
        }
    }

    logger.debug(format!("thread {id} finished"))?;
    Ok(())
}

/// Producer on a tokio task, driving its bar through an iterator
async fn async_worker(logger: Logger, id: usize, steps: u64) -> Result<()> {
    let spec = TaskSpec::new(steps)
        .with_prefix(format!("task {id}"))
        .with_suffix("async")
        .with_decimals(1);

    for step in (0..steps).track_with(&logger, spec)? {
        tokio::time::sleep(step_delay()).await;
        if step % 15 == 14 {
            logger.info(format!("task {id} checkpoint {}", step + 1))?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(config_path).context("Failed to load config")?;
    args.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;

    init_logging(&args.diagnostics, &args.log_level)?;
    info!(source = %config.source(), "Configuration loaded");

    let sink = sink_from_config(&config.sink)
        .with_context(|| format!("Failed to open log file: {:?}", config.sink.path))?;
    let renderer = Renderer::new(Terminal::stdout(), sink, config.render.clone());

    let (tx, rx) = command_channel();
    let handle = RenderServer::new(renderer, rx)
        .start()
        .context("Failed to start render server")?;
    let logger = Logger::new(tx);

    logger.info(format!(
        "starting {} thread and {} task producers",
        args.threads, args.tasks
    ))?;

    let threads: Vec<_> = (0..args.threads)
        .map(|id| {
            let logger = logger.clone();
            let steps = args.steps;
            std::thread::spawn(move || thread_worker(&logger, id, steps))
        })
        .collect();

    let tasks: Vec<_> = (0..args.tasks)
        .map(|id| tokio::spawn(async_worker(logger.clone(), id, args.steps)))
        .collect();

    tokio::time::sleep(Duration::from_secs(2)).await;
    let shrunk = config.render.message_capacity.min(5);
    logger.configure(RenderConfig {
        message_capacity: shrunk,
        ..config.render.clone()
    })?;
    logger.info(format!("message area resized to {shrunk}"))?;

    for task in tasks {
        task.await.context("Task producer panicked")??;
    }
    for thread in threads {
        thread
            .join()
            .map_err(|_| anyhow::anyhow!("Thread producer panicked"))??;
    }

    logger.info("all producers finished")?;
    logger.flush()?;
    logger.shutdown()?;

    let renderer = tokio::task::spawn_blocking(move || handle.join())
        .await
        .context("Render thread join failed")??;
    let stats = renderer.stats();
    info!(
        commands = stats.commands,
        repaints = stats.repaints,
        "Demo finished"
    );

    Ok(())
}
