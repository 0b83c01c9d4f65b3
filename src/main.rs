use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fluency_recorder::audio::{AudioFeed, AudioRef, FileFeed, SilenceFeed, WavCaptureAdapter};
use fluency_recorder::pipeline::{AssessmentOutcome, AssessmentPipeline, HttpAssessmentClient};
use fluency_recorder::session::{RecordingSessionController, SessionState, StopReason};
use fluency_recorder::{create_router, AppState, Config};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fluency-recorder")]
#[command(about = "Timed verbal-fluency recording and assessment")]
#[command(version)]
struct Cli {
    /// Config file (extension optional)
    #[arg(short, long, global = true, default_value = "config/fluency-recorder")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record one countdown session (Ctrl-C stops early, twice cancels)
    Record {
        /// WAV file replayed as microphone input (default: config, else silence)
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Countdown in seconds (default: config)
        #[arg(short, long)]
        duration: Option<u32>,

        /// Send the recording through the assessment pipeline afterwards
        #[arg(short, long)]
        assess: bool,
    },
    /// Transcribe and analyze an existing recording
    Assess {
        /// WAV file to assess
        input: PathBuf,
    },
    /// Serve the HTTP control API
    Serve,
    /// Check whether the assessment backend is reachable
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("Fluency Recorder v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    match cli.command {
        Commands::Record {
            source,
            duration,
            assess,
        } => {
            let source = source.or_else(|| cfg.audio.source.clone());
            let duration = duration.unwrap_or(cfg.session.duration_seconds);
            let controller = build_controller(&cfg, source);

            let audio = record(&controller, duration).await?;
            println!("{}", audio);

            if assess {
                let outcome = build_pipeline(&cfg)?.run(&audio).await;
                print_outcome(&outcome)?;
            }
        }
        Commands::Assess { input } => {
            if !input.exists() {
                anyhow::bail!("Recording not found: {}", input.display());
            }
            let outcome = build_pipeline(&cfg)?
                .run(&AudioRef::from_path(&input))
                .await;
            print_outcome(&outcome)?;
        }
        Commands::Serve => serve(&cfg).await?,
        Commands::Health => {
            let client = HttpAssessmentClient::new(&cfg.backend)?;
            if client.health_check().await {
                println!("Assessment backend at {} is reachable", client.base_url());
            } else {
                anyhow::bail!("Assessment backend at {} is not reachable", client.base_url());
            }
        }
    }

    Ok(())
}

fn build_controller(cfg: &Config, source: Option<PathBuf>) -> RecordingSessionController {
    let feed: Arc<dyn AudioFeed> = match source {
        Some(path) => {
            info!("Audio source: {}", path.display());
            Arc::new(FileFeed::new(path))
        }
        None => {
            info!("Audio source: silence");
            Arc::new(SilenceFeed::default())
        }
    };

    let adapter = WavCaptureAdapter::new(feed, &cfg.audio.recordings_path);
    RecordingSessionController::new(Arc::new(adapter), cfg.session.settings())
}

fn build_pipeline(cfg: &Config) -> Result<AssessmentPipeline> {
    let client = Arc::new(HttpAssessmentClient::new(&cfg.backend)?);
    Ok(AssessmentPipeline::new(
        client.clone(),
        client,
        cfg.pipeline.degradation,
    ))
}

/// Run one session to its end, following notifications
async fn record(controller: &RecordingSessionController, duration: u32) -> Result<AudioRef> {
    let mut updates = controller.subscribe();
    controller.begin(duration).await?;

    info!(
        "Recording for {}s. Press Ctrl+C to stop early, twice to discard",
        duration
    );

    let mut interrupts = 0u32;
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(update) => {
                    match update.state {
                        SessionState::Active => {
                            info!(
                                "{}s remaining ({}%)",
                                update.remaining_seconds,
                                update.progress_percent()
                            );
                        }
                        SessionState::Completed(audio) => {
                            info!("Recording saved: {}", audio);
                            return Ok(audio);
                        }
                        SessionState::Failed(reason) => {
                            anyhow::bail!("Recording failed: {:?}", reason);
                        }
                        SessionState::Terminated => anyhow::bail!("Recording cancelled"),
                        _ => {}
                    }
                }
                Err(RecvError::Lagged(n)) => warn!("Missed {} session updates", n),
                Err(RecvError::Closed) => anyhow::bail!("Session controller went away"),
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                interrupts += 1;

                if interrupts == 1 {
                    info!("Stopping recording...");
                    let controller = controller.clone();
                    tokio::spawn(async move {
                        if let Err(e) = controller.request_stop(StopReason::UserRequested).await {
                            error!("Stop failed: {}", e);
                        }
                    });
                } else {
                    info!("Discarding recording...");
                    controller.cancel().await;
                }
            }
        }
    }
}

async fn serve(cfg: &Config) -> Result<()> {
    let controller = build_controller(cfg, cfg.audio.source.clone());
    let state = AppState::new(
        controller.clone(),
        Arc::new(build_pipeline(cfg)?),
        cfg.session.duration_seconds,
    );

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP API listening on {}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            // Err: no signal handler, so only an external kill ends the server
            if tokio::signal::ctrl_c().await.is_err() {
                futures::future::pending::<()>().await;
            }
        })
        .await
        .context("HTTP server failed")?;

    // Release the device if a session was still running
    controller.cancel().await;
    info!("Shut down");
    Ok(())
}

fn print_outcome(outcome: &AssessmentOutcome) -> Result<()> {
    if outcome.is_degraded() {
        warn!("Results below are fallback values, not a live assessment");
    }
    info!(
        "Score level: {}",
        outcome.analysis.score_level().label()
    );
    println!("{}", serde_json::to_string_pretty(outcome)?);
    Ok(())
}
