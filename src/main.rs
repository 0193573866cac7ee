//! Application entry point — voice-lights.
//!
//! # Startup sequence
//!
//! 1. Parse the command line.
//! 2. Initialise logging (`info`, or `debug` with `--verbose`; `RUST_LOG`
//!    wins).
//! 3. Load [`AppConfig`] from disk (default on first run), apply CLI
//!    overrides and validate.
//! 4. Create the [`tokio`] runtime (multi-thread, 2 workers).
//! 5. Run the selected subcommand; `run` (the default) wires wake word →
//!    orchestrator → relay board and blocks until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use voice_lights::{
    config::{AppConfig, AppPaths},
    context::AppContext,
    indicator::LogIndicator,
    intent::{ActuationRequest, HttpIntentClient, IntentParser},
    orchestrator::{event_queue, SessionOrchestrator},
    recognition::{transcribe_wav, LiveRecognizer, Recognizer, WsConnector},
    relay::{JsonStateStore, LogBus, RelayActuator, RelayBoard, SwitchMode},
    wakeword::WakewordListener,
};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(name = "voice-lights", version, about = "Voice-controlled light switching")]
struct Cli {
    /// Settings file (defaults to the platform config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Input device: index or name substring.
    #[arg(long, global = true, env = "VOICE_LIGHTS_DEVICE")]
    device: Option<String>,

    #[arg(long, global = true)]
    sample_rate: Option<u32>,

    /// Speech recognition websocket URI.
    #[arg(long, global = true, env = "VOICE_LIGHTS_ASR_URI")]
    asr_uri: Option<String>,

    /// Intent service base URI.
    #[arg(long, global = true, env = "VOICE_LIGHTS_NLU_URI")]
    nlu_uri: Option<String>,

    /// 0 (least) to 3 (most aggressive).
    #[arg(long, global = true)]
    vad_aggressiveness: Option<u8>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Wake word → recognition → intent → relay, until Ctrl-C.
    Run,
    /// One live recognition session; prints the transcript.
    Listen,
    /// Replay a 16-bit mono WAV file through the recognition service.
    Transcribe {
        wav: PathBuf,
        /// Replay the file this many times, one connection each.
        #[arg(long, default_value_t = 1)]
        repeat: u32,
    },
    /// Send one utterance to the intent service.
    Parse { text: String },
    /// Drive the relay board directly.
    Relay {
        #[command(subcommand)]
        action: RelayCommand,
    },
}

#[derive(Debug, Subcommand)]
enum RelayCommand {
    /// Switch channels (1-4) on or off.
    Switch {
        #[arg(required = true)]
        channels: Vec<u8>,
        #[arg(long, value_enum)]
        mode: ModeArg,
    },
    /// Print the persisted channel states.
    Read,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    On,
    Off,
}

impl From<ModeArg> for SwitchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::On => SwitchMode::On,
            ModeArg::Off => SwitchMode::Off,
        }
    }
}

impl Cli {
    fn load_config(&self) -> Result<AppConfig> {
        let (mut config, path) = match &self.config {
            Some(path) => (AppConfig::load_from(path)?, path.clone()),
            None => (AppConfig::load()?, AppPaths::new().settings_file),
        };

        if let Some(device) = &self.device {
            config.audio.device = Some(device.clone());
        }
        if let Some(rate) = self.sample_rate {
            config.audio.sample_rate = rate;
        }
        if let Some(uri) = &self.asr_uri {
            config.recognition.uri = uri.clone();
        }
        if let Some(uri) = &self.nlu_uri {
            config.intent.uri = uri.clone();
        }
        if let Some(level) = self.vad_aggressiveness {
            config.vad.aggressiveness = level;
        }

        config
            .validate()
            .with_context(|| format!("invalid configuration ({})", path.display()))?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn open_board(ctx: &AppContext) -> Result<RelayBoard<LogBus, JsonStateStore>> {
    let path = ctx.config.relay.state_path();
    RelayBoard::open(LogBus, JsonStateStore::new(&path))
        .with_context(|| format!("opening relay state {}", path.display()))
}

async fn run_assistant(ctx: AppContext) -> Result<()> {
    let connector = Arc::new(WsConnector::from_config(&ctx.config.recognition)?);
    let recognizer = Arc::new(LiveRecognizer::new(ctx.clone(), connector));
    let parser = Arc::new(HttpIntentClient::from_config(&ctx.config.intent)?);
    let board = open_board(&ctx)?;

    let (events, rx) = event_queue();
    let mut orchestrator =
        SessionOrchestrator::new(&ctx, recognizer, parser, Box::new(board), events.clone());

    // The engine thread only enqueues; it never waits on the orchestrator.
    let listener_ctx = ctx.clone();
    let _wakeword = tokio::task::spawn_blocking(move || {
        WakewordListener::start(&listener_ctx, move || {
            events.activate();
        })
    })
    .await?
    .context("starting wake-word listener")?;

    log::info!("voice-lights: ready, say the wake word (Ctrl-C to quit)");
    tokio::select! {
        _ = orchestrator.run(rx) => {}
        res = tokio::signal::ctrl_c() => {
            res.context("waiting for Ctrl-C")?;
            log::info!("voice-lights: shutting down");
        }
    }
    Ok(())
}

async fn listen_once(ctx: AppContext) -> Result<()> {
    let connector = Arc::new(WsConnector::from_config(&ctx.config.recognition)?);
    let recognizer = LiveRecognizer::new(ctx, connector);
    let transcript = recognizer.listen().await?;
    println!("[{}] {}", transcript.status.label(), transcript.text);
    Ok(())
}

async fn transcribe(ctx: AppContext, wav: PathBuf, repeat: u32) -> Result<()> {
    let connector = WsConnector::from_config(&ctx.config.recognition)?;
    for i in 1..=repeat.max(1) {
        let transcript =
            transcribe_wav(&connector, &wav, ctx.config.recognition.replay_window_secs)
                .await
                .with_context(|| format!("transcribing {}", wav.display()))?;
        println!("#{i}: {}", transcript.text);
    }
    Ok(())
}

async fn parse(ctx: AppContext, text: String) -> Result<()> {
    let client = HttpIntentClient::from_config(&ctx.config.intent)?;
    let result = client.parse(&text).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    match ActuationRequest::from_intent(&result, &ctx.config.relay.channels) {
        Some(req) => println!("actuation: switch {:?} {}", req.channels, req.mode),
        None => println!("actuation: none"),
    }
    Ok(())
}

fn relay(ctx: AppContext, action: RelayCommand) -> Result<()> {
    let mut board = open_board(&ctx)?;
    let state = match action {
        RelayCommand::Switch { channels, mode } => board.switch(&channels, mode.into())?,
        RelayCommand::Read => board.read()?,
    };
    println!("{state}");
    Ok(())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = cli.load_config()?;
    let ctx = AppContext::new(config, Arc::new(LogIndicator));

    let command = cli.command.unwrap_or(Command::Run);
    if let Command::Relay { action } = command {
        return relay(ctx, action);
    }

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    rt.block_on(async move {
        match command {
            Command::Run => run_assistant(ctx).await,
            Command::Listen => listen_once(ctx).await,
            Command::Transcribe { wav, repeat } => transcribe(ctx, wav, repeat).await,
            Command::Parse { text } => parse(ctx, text).await,
            Command::Relay { .. } => Ok(()),
        }
    })
}
