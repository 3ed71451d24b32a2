//! LessonXR player - command-line entry point
//!
//! `play` loads a lesson headlessly and reports the pipeline outcome, `serve`
//! additionally exposes the HTTP control interface, `probe` only runs
//! capability detection.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use lessonxr_common::config::{
    default_session_cache_path, resolve_path, ConfigResolver, TomlConfig,
};
use lessonxr_common::events::{EventBus, PlayerEvent};
use lessonxr_player::bundle::{
    ContentStore, FileContentStore, FileSessionCache, HttpContentStore, LessonIds,
};
use lessonxr_player::capability::{recommend, CapabilityDetector};
use lessonxr_player::config::PlayerSettings;
use lessonxr_player::fetch::SourceFetcher;
use lessonxr_player::narration::SimulatedAudio;
use lessonxr_player::pipeline::PipelineReport;
use lessonxr_player::scene::HeadlessSurface;
use lessonxr_player::xr::SimulatedXrPlatform;
use lessonxr_player::{api, LessonPlayer, PlayerDeps};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for lessonxr-player
#[derive(Parser, Debug)]
#[command(name = "lessonxr-player")]
#[command(about = "Immersive lesson player")]
#[command(version)]
struct Cli {
    /// TOML config file (overrides LESSONXR_CONFIG and the default location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a lesson and report the pipeline outcome
    Play(PlayArgs),
    /// Load a lesson and serve the HTTP control interface
    Serve(ServeArgs),
    /// Detect immersive capability only
    Probe(ProbeArgs),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum HeadsetPreset {
    Quest,
    Pico,
    Generic,
    Desktop,
    None,
}

impl HeadsetPreset {
    fn platform(self) -> SimulatedXrPlatform {
        match self {
            HeadsetPreset::Quest => SimulatedXrPlatform::quest(),
            HeadsetPreset::Pico => SimulatedXrPlatform::pico(),
            HeadsetPreset::Generic => SimulatedXrPlatform::generic_headset(),
            HeadsetPreset::Desktop => SimulatedXrPlatform::desktop_without_headset(),
            HeadsetPreset::None => SimulatedXrPlatform::none(),
        }
    }
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Chapter identifier (requires --topic)
    #[arg(long)]
    chapter: Option<String>,

    /// Topic identifier (requires --chapter)
    #[arg(long)]
    topic: Option<String>,

    /// Directory of <chapter>/<topic>.json lesson records [env: LESSONXR_CONTENT_ROOT]
    #[arg(long)]
    content: Option<PathBuf>,

    /// Base URL of a remote content store
    #[arg(long, env = "LESSONXR_CONTENT_URL")]
    content_url: Option<String>,

    /// Session cache file holding the "activeLesson" slot [env: LESSONXR_SESSION_CACHE]
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Simulated immersive platform
    #[arg(long, value_enum, default_value = "quest", env = "LESSONXR_HEADSET")]
    headset: HeadsetPreset,
}

impl SourceArgs {
    fn lesson_ids(&self) -> Result<Option<LessonIds>> {
        match (&self.chapter, &self.topic) {
            (Some(chapter), Some(topic)) => Ok(Some(LessonIds::new(chapter, topic))),
            (None, None) => Ok(None),
            _ => bail!("--chapter and --topic must be given together"),
        }
    }
}

#[derive(Args, Debug)]
struct PlayArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Request an immersive session once the lesson is ready
    #[arg(long)]
    enter_immersive: bool,

    /// Play narration through to the end before exiting
    #[arg(long)]
    narrate: bool,

    /// Print the pipeline report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Control interface port
    #[arg(short, long, env = "LESSONXR_PORT")]
    port: Option<u16>,
}

#[derive(Args, Debug)]
struct ProbeArgs {
    /// Simulated immersive platform
    #[arg(long, value_enum, default_value = "quest", env = "LESSONXR_HEADSET")]
    headset: HeadsetPreset,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = ConfigResolver::new("player").resolve(cli.config.as_deref());
    let config = TomlConfig::load_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;

    init_tracing(&config)?;
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("No configuration file, using built-in defaults"),
    }

    let settings =
        PlayerSettings::from_table(&config.player).context("Invalid [player] configuration")?;

    match cli.command {
        Command::Play(args) => play(args, &config, settings).await,
        Command::Serve(args) => serve(args, &config, settings).await,
        Command::Probe(args) => probe(args).await,
    }
}

/// Initialize tracing: RUST_LOG wins over the configured level
fn init_tracing(config: &TomlConfig) -> Result<()> {
    let level = &config.logging.level;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "lessonxr_player={level},lessonxr_common={level},tower_http=info",
            level = level
        )
        .into()
    });

    let file = match &config.logging.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
            }
            Some(
                std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("Failed to open log file {}", path.display()))?,
            )
        }
        None => None,
    };

    let (stderr_layer, file_layer) = match file {
        Some(file) => (
            None,
            Some(
                fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            ),
        ),
        None => (Some(fmt::layer().with_writer(std::io::stderr)), None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

fn build_player(
    source: &SourceArgs,
    config: &TomlConfig,
    settings: PlayerSettings,
) -> Result<Arc<LessonPlayer>> {
    let content_root = resolve_path(
        source.content.as_deref(),
        "LESSONXR_CONTENT_ROOT",
        config.content_root.as_deref(),
    );
    let content_url = source.content_url.clone().or_else(|| config.content_url.clone());

    let (store, fetcher): (Arc<dyn ContentStore>, SourceFetcher) = match (content_root, content_url) {
        (Some(root), _) => {
            info!("Content root: {}", root.display());
            let fetcher = SourceFetcher::new(&root)?;
            (Arc::new(FileContentStore::new(root)) as Arc<dyn ContentStore>, fetcher)
        }
        (None, Some(url)) => {
            info!("Content store: {}", url);
            let fetcher = SourceFetcher::new(".")?.with_base_url(&url);
            (Arc::new(HttpContentStore::new(&url)?) as Arc<dyn ContentStore>, fetcher)
        }
        (None, None) => bail!(
            "No content source: pass --content or --content-url, or set content_root in the config file"
        ),
    };
    let fetcher = Arc::new(fetcher);

    let cache_path = resolve_path(
        source.cache.as_deref(),
        "LESSONXR_SESSION_CACHE",
        config.session_cache_path.as_deref(),
    )
    .unwrap_or_else(default_session_cache_path);
    info!("Session cache: {}", cache_path.display());

    let (audio, audio_events) = SimulatedAudio::new(fetcher.clone(), settings.playback_rate);

    let deps = PlayerDeps {
        platform: Arc::new(source.headset.platform()),
        store,
        cache: Arc::new(FileSessionCache::new(cache_path)),
        fetcher,
        audio,
        audio_events,
        surface: Arc::new(HeadlessSurface::default()),
    };
    Ok(Arc::new(LessonPlayer::new(deps, settings, EventBus::default())))
}

fn print_report(report: &PipelineReport) {
    println!(
        "Stage: {} ({}%) - {}",
        report.status.stage, report.status.progress, report.status.message
    );
    if let Some(env) = &report.environment {
        println!(
            "Environment: {:?}{}",
            env.kind,
            if env.fallback { " (fallback)" } else { "" }
        );
    }
    println!("Narration segments: {}", report.segments.len());
    for segment in &report.segments {
        println!(
            "  {:<12} loaded={} duration={}",
            segment.section.to_string(),
            segment.loaded,
            segment
                .duration_secs
                .map(|d| format!("{:.1}s", d))
                .unwrap_or_else(|| "-".to_string())
        );
    }
    let failed = report.assets.iter().filter(|a| a.error.is_some()).count();
    println!("Assets: {} ({} failed)", report.assets.len(), failed);
    for error in &report.stage_errors {
        println!("  ! {}: {}", error.stage, error.message);
    }
}

async fn play(args: PlayArgs, config: &TomlConfig, settings: PlayerSettings) -> Result<()> {
    let ids = args.source.lesson_ids()?;
    let player = build_player(&args.source, config, settings)?;
    let mut events = player.subscribe();

    let report = match player.mount(ids).await {
        Ok(report) => report,
        Err(e) => {
            if args.json {
                if let Some(report) = player.last_report().await {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
            }
            return Err(e).context("Lesson could not be played");
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if args.enter_immersive {
        match player.enter_immersive().await {
            Ok(handle) => println!("Immersive session {} started", handle.id),
            Err(e) => println!("Immersive mode unavailable: {}", e),
        }
    }

    if args.narrate && !report.segments.is_empty() {
        player
            .narration()
            .play()
            .await
            .context("Failed to start narration")?;
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(PlayerEvent::NarrationSegmentStarted { section, text, .. }) => {
                        println!("[{}] {}", section, text);
                    }
                    Ok(PlayerEvent::NarrationFinished { .. }) => break,
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Event receiver lagged by {} events", n);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
                _ = shutdown_signal() => break,
            }
        }
    }

    player.unmount().await;
    Ok(())
}

async fn serve(args: ServeArgs, config: &TomlConfig, settings: PlayerSettings) -> Result<()> {
    let ids = args.source.lesson_ids()?;
    let port = args.port.unwrap_or(settings.server_port);
    let player = build_player(&args.source, config, settings)?;

    // A failed mount stays visible through /status; /lesson/retry can recover
    if let Err(e) = player.mount(ids).await {
        error!("Initial lesson load failed: {}", e);
    }

    api::run(Arc::clone(&player), port, shutdown_signal())
        .await
        .context("Control interface error")?;

    player.unmount().await;
    info!("Shutdown complete");
    Ok(())
}

async fn probe(args: ProbeArgs) -> Result<()> {
    let detector = CapabilityDetector::new(Arc::new(args.headset.platform()));
    let descriptor = detector.detect().await;
    let recommendation = recommend(&descriptor);

    if args.json {
        let body = serde_json::json!({
            "descriptor": descriptor,
            "recommendation": recommendation,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!("Immersive supported: {}", descriptor.immersive_supported);
        println!("API present:         {}", descriptor.api_present);
        println!("Device class:        {}", descriptor.device_class);
        if let Some(message) = &descriptor.diagnostic_message {
            println!("Diagnostic:          {}", message);
        }
        println!("Recommendation:      {}", recommendation.message);
    }
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
