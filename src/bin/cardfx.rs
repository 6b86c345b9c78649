//! cardfx CLI: replay recorded game event streams through the sequencer.

use anyhow::Context as _;
use cardfx::config::Config;
use cardfx::model::{AnimationEvent, EventKind, GameEventMessage};
use cardfx::playback::{Choreography, Stage, StageBackend};
use cardfx::producer::{CueSink, Producer, SoundCue};
use cardfx::sequencer::Sequencer;
use cardfx::telemetry::{TelemetryConfig, init_telemetry};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "cardfx", about = "Serialized card game animation playback")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a JSON-lines stream of game events
    Replay {
        /// File with one game event JSON object per line
        events: PathBuf,
        /// TOML file overriding effect durations
        #[arg(long)]
        choreography: Option<PathBuf>,
        /// Participants on stage (defaults to everyone the stream mentions)
        #[arg(long, value_delimiter = ',')]
        players: Vec<String>,
        /// Playback speed multiplier (overrides CARDFX_SPEED)
        #[arg(long)]
        speed: Option<f64>,
        /// Print sequencer lifecycle events as JSON lines on stdout
        #[arg(long)]
        trace_events: bool,
    },
    /// Parse a stream and summarize its event kinds
    Check {
        /// File with one game event JSON object per line
        events: PathBuf,
    },
}

/// Cue sink that only logs; the CLI has no audio device.
struct LogCues;

impl CueSink for LogCues {
    fn cue(&self, cue: SoundCue) {
        info!(sound = cue.name(), "sound cue");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Replay {
            events,
            choreography,
            players,
            speed,
            trace_events,
        } => {
            let _guard = init_telemetry(TelemetryConfig {
                endpoint: config.otel_endpoint.clone(),
                service_name: "cardfx".to_string(),
                log_level: config.log_level.clone(),
            })?;
            cmd_replay(
                &config,
                &events,
                choreography,
                players,
                speed,
                trace_events,
            )
            .await
        }
        Command::Check { events } => cmd_check(&events),
    }
}

async fn cmd_replay(
    config: &Config,
    path: &Path,
    choreography: Option<PathBuf>,
    players: Vec<String>,
    speed: Option<f64>,
    trace_events: bool,
) -> anyhow::Result<()> {
    let messages = read_stream(path)?;

    let choreography = match choreography {
        Some(path) => Choreography::load(&path)?,
        None => Choreography::default(),
    };

    let stage = if players.is_empty() {
        Stage::with_participants(
            messages
                .iter()
                .flat_map(|m| [m.source_player_id.clone(), m.target_player_id.clone()])
                .flatten(),
        )
    } else {
        Stage::with_participants(players)
    };

    let backend = StageBackend::new(stage, choreography).speed(speed.unwrap_or(config.speed));
    info!(speed = backend.current_speed(), "stage backend ready");
    let sequencer = Sequencer::new(backend, config.sequencer())?;
    let producer = Producer::new(sequencer.clone()).with_cues(LogCues);

    let printer = trace_events.then(|| {
        let mut events = sequencer.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(line) => println!("{line}"),
                        Err(e) => warn!("cannot serialize sequencer event: {e}"),
                    },
                    Err(RecvError::Lagged(n)) => warn!(skipped = n, "event trace lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
        })
    });

    info!(events = messages.len(), file = %path.display(), "replaying");
    for msg in messages {
        producer.handle_game_event(msg);
    }
    producer.enqueue(AnimationEvent::state_apply(|| info!("replay reached end of stream")));

    tokio::select! {
        _ = sequencer.wait_idle() => {}
        _ = tokio::signal::ctrl_c() => {
            warn!(pending = sequencer.pending(), "interrupted, abandoning queue");
        }
    }

    if let Some(printer) = printer {
        printer.abort();
    }

    let stats = sequencer.stats();
    eprintln!(
        "{} event(s) enqueued, {} completed, {} soft failure(s)",
        stats.enqueued, stats.completed, stats.soft_failures
    );
    Ok(())
}

fn cmd_check(path: &Path) -> anyhow::Result<()> {
    let messages = read_stream(path)?;

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut unknown = 0;
    for msg in &messages {
        let kind = msg.kind();
        if kind == EventKind::Unknown {
            unknown += 1;
        }
        let event = AnimationEvent::from(msg.clone());
        // Known names with unreadable payloads degrade to Unknown too.
        let label = if event.kind() == kind {
            kind.to_string()
        } else {
            format!("{kind} (unplayable)")
        };
        *counts.entry(label).or_default() += 1;
    }

    println!("{:<32}  COUNT", "KIND");
    println!("{}", "-".repeat(40));
    for (kind, count) in &counts {
        println!("{kind:<32}  {count}");
    }
    println!("\n{} event(s), {} of unknown kind", messages.len(), unknown);
    Ok(())
}

fn read_stream(path: &Path) -> anyhow::Result<Vec<GameEventMessage>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read event stream {}", path.display()))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: bad game event", path.display(), n + 1))
        })
        .collect()
}
