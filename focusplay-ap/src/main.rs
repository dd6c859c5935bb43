//! focusplay Audio Player (focusplay-ap) - demo entry point
//!
//! Runs two players against the simulated platform and prints every player
//! event as a JSON line: a looping "music" player that holds focus, and an
//! "alert" player that first collides with it, then mixes in while the
//! platform ducks the music.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use focusplay_ap::platform::simulated::{SimulatedContext, SimulatedFocusPlatform, SimulatedSource, TrackSpec};
use focusplay_ap::platform::Collaborators;
use focusplay_ap::{AudioPlayer, FocusArbitrator, LoadRequest, PlaybackError, Settings};
use focusplay_common::config::TomlConfig;
use focusplay_common::{FocusChangeKind, PlayerEvent};
use futures::StreamExt;
use tokio::signal;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for focusplay-ap
#[derive(Parser, Debug)]
#[command(name = "focusplay-ap")]
#[command(about = "Audio player with cooperative audio focus")]
#[command(version)]
struct Args {
    /// Configuration file (overrides FOCUSPLAY_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Source name of the music track
    #[arg(short, long, default_value = "track.mp3")]
    track: String,

    /// Length of the simulated music track in seconds
    #[arg(short, long, default_value = "3.0", env = "FOCUSPLAY_DURATION_SECS")]
    duration_secs: f64,

    /// Override the configured duck level (0.0-1.0)
    #[arg(long)]
    duck_level: Option<f32>,

    /// Loop the music track instead of completing
    #[arg(long)]
    loop_playback: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(duck_level) = args.duck_level {
        config.focus.duck_level = duck_level;
    }

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "Starting focusplay Audio Player (focusplay-ap) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let settings = Settings::from_toml(&config).context("Invalid configuration")?;
    if !(args.duration_secs.is_finite() && args.duration_secs > 0.0) {
        bail!("--duration-secs must be positive, got {}", args.duration_secs);
    }
    info!(
        duck_level = settings.focus.duck_level,
        duration_hint = %settings.focus.duration_hint,
        "Settings resolved"
    );

    tokio::select! {
        result = run_demo(&args, settings) => result,
        _ = shutdown_signal() => {
            info!("Demo interrupted");
            Ok(())
        }
    }
}

async fn run_demo(args: &Args, settings: Settings) -> Result<()> {
    let focus_platform = Arc::new(SimulatedFocusPlatform::new());
    let arbitrator = Arc::new(FocusArbitrator::new(focus_platform.clone(), settings.focus));
    let source = Arc::new(
        SimulatedSource::real_time()
            .with_track(&args.track, TrackSpec::new(args.duration_secs))
            .with_track("alert", TrackSpec::new((args.duration_secs / 4.0).max(0.1))),
    );
    let collaborators = Collaborators::new(source, Arc::new(SimulatedContext::ready()));

    let music = AudioPlayer::new(arbitrator.clone(), collaborators.clone(), settings.player);
    let alert = AudioPlayer::new(arbitrator.clone(), collaborators, settings.player);

    let printer_stop = CancellationToken::new();
    let printer = tokio::spawn(print_events(
        futures::stream::select(music.events(), alert.events()),
        printer_stop.clone(),
    ));
    let mut music_events = music.subscribe();
    let mut alert_events = alert.subscribe();

    music
        .load(LoadRequest::new(args.track.as_str()).with_loop(args.loop_playback).with_auto_play(true))
        .await
        .context("Failed to load music")?;

    // Exclusive request while music holds focus
    alert.load(LoadRequest::new("alert")).await.context("Failed to load alert")?;
    match alert.play().await {
        Err(PlaybackError::FocusDenied) => info!("Alert denied while music plays"),
        other => warn!(?other, "Expected the exclusive alert to be denied"),
    }

    // Platform asks the session to duck; the alert mixes in meanwhile
    focus_platform.emit(FocusChangeKind::LossCanDuck);
    tokio::time::sleep(Duration::from_millis(50)).await;
    info!(volume = music.volume().await, "Music ducked");

    alert
        .load(LoadRequest::new("alert").with_mix_with_others(true).with_auto_play(true))
        .await
        .context("Failed to reload alert")?;
    wait_for_terminal(&mut alert_events, Duration::from_secs_f64(args.duration_secs + 2.0)).await;

    focus_platform.emit(FocusChangeKind::Gain);
    tokio::time::sleep(Duration::from_millis(50)).await;
    info!(volume = music.volume().await, "Music restored");

    // Transient interruption and automatic resume
    focus_platform.emit(FocusChangeKind::TransientLoss);
    tokio::time::sleep(Duration::from_millis(200)).await;
    focus_platform.emit(FocusChangeKind::Gain);

    if args.loop_playback {
        tokio::time::sleep(Duration::from_secs_f64(args.duration_secs * 2.0)).await;
    } else {
        wait_for_terminal(&mut music_events, Duration::from_secs_f64(args.duration_secs * 2.0 + 2.0))
            .await;
    }

    music.dispose().await;
    alert.dispose().await;
    info!(
        session_active = arbitrator.has_session().await,
        "Players disposed"
    );

    // Let the printer drain whatever is buffered
    tokio::time::sleep(Duration::from_millis(20)).await;
    printer_stop.cancel();
    printer.await.context("Event printer panicked")?;
    Ok(())
}

async fn print_events<S>(events: S, stop: CancellationToken)
where
    S: futures::Stream<Item = PlayerEvent>,
{
    let mut events = std::pin::pin!(events);
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            event = events.next() => match event {
                Some(event) => match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => warn!("Failed to serialize event: {}", e),
                },
                None => break,
            },
        }
    }
}

/// Wait until the player completes or errors, or the timeout passes
async fn wait_for_terminal(events: &mut broadcast::Receiver<PlayerEvent>, timeout: Duration) {
    let waited = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) if event.is_terminal() => return,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    })
    .await;
    if waited.is_err() {
        warn!("Timed out waiting for playback to finish");
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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
