//! Local text simulation against the realtime model.
//!
//! No phone is involved: lines typed on stdin become user messages, text
//! deltas are echoed to stdout and the synthesized µ-law audio of each
//! response is saved as a WAV file (and played, when possible).

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::core::agent::AgentClient;
use crate::core::audio::mulaw_to_wav;
use crate::core::call::tools::{self, CallContext, FunctionCall, ToolOutput};
use crate::core::call::{CallLogger, LogSource, new_call_id};
use crate::core::realtime::{
    self, ClientEvent, ConversationItem, RealtimeConfig, RealtimeEvent, RealtimeHandle,
    ServerEvent, SessionSettings,
};

pub const BANNER: &str = "vox simulate: type messages and press enter (Ctrl+C to quit)";

#[derive(Debug, Clone)]
pub struct SimulateOptions {
    /// Directory receiving the simulation's log directory
    pub out_dir: PathBuf,
    pub play_audio: bool,
}

/// Why a typed line was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InputRejected {
    #[error("session not ready yet")]
    NotReady,
    #[error("response in flight; wait for completion")]
    InFlight,
}

/// Results of the background work done after each response.
#[derive(Debug)]
enum TurnEvent {
    ToolOutput(ToolOutput),
    AudioSaved(PathBuf),
}

/// Session settings for the simulation, with voice/transcription/greeting
/// taken from the server configuration.
pub fn simulation_settings(config: &ServerConfig) -> SessionSettings {
    let mut settings = SessionSettings::simulation();
    settings.voice = config.openai_realtime_voice.clone();
    settings.transcription_model = config.openai_transcription_model.clone();
    settings.initial_greeting = config.initial_greeting.clone();
    settings
}

/// Run the interactive simulation until Ctrl+C or the realtime side closes.
pub async fn run(config: &ServerConfig, options: SimulateOptions) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&options.out_dir)
        .await
        .with_context(|| format!("Failed to create {}", options.out_dir.display()))?;
    let logger = CallLogger::create(&options.out_dir, new_call_id("simulate"))
        .await
        .context("Failed to open simulation log")?;
    let agent = AgentClient::from_config(config)?;
    let (realtime, mut events) = realtime::connect(&RealtimeConfig::from(config)).await?;

    let (turn_tx, mut turn_rx) = mpsc::unbounded_channel();
    let mut simulation = Simulation::new(
        simulation_settings(config),
        realtime,
        agent,
        logger,
        options.play_audio,
        turn_tx,
        std::io::stdout(),
    );
    info!(dir = %simulation.logger.dir().display(), "Simulation started");
    println!("{BANNER}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if let Err(rejected) = simulation.handle_line(&line) {
                        eprintln!("vox simulate: {rejected}");
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    stdin_open = false;
                }
            },

            event = events.recv() => match event {
                Some(RealtimeEvent::Message(value)) => simulation.handle_realtime_event(value),
                Some(RealtimeEvent::Closed { reason }) => {
                    eprintln!(
                        "vox simulate: realtime connection closed{}",
                        reason.map(|r| format!(" ({r})")).unwrap_or_default()
                    );
                    break;
                }
                None => break,
            },

            Some(turn) = turn_rx.recv() => simulation.handle_turn_event(turn),
        }
    }

    simulation.close().await;
    Ok(())
}

struct Simulation<W: Write> {
    settings: SessionSettings,
    realtime: RealtimeHandle,
    agent: Option<AgentClient>,
    logger: CallLogger,
    play_audio: bool,
    turn_tx: mpsc::UnboundedSender<TurnEvent>,
    out: W,

    session_ready: bool,
    greeting_sent: bool,
    response_in_flight: bool,
    assistant_text: String,
    pending_audio: Vec<u8>,
}

impl<W: Write> Simulation<W> {
    fn new(
        settings: SessionSettings,
        realtime: RealtimeHandle,
        agent: Option<AgentClient>,
        logger: CallLogger,
        play_audio: bool,
        turn_tx: mpsc::UnboundedSender<TurnEvent>,
        out: W,
    ) -> Self {
        Self {
            settings,
            realtime,
            agent,
            logger,
            play_audio,
            turn_tx,
            out,
            session_ready: false,
            greeting_sent: false,
            response_in_flight: false,
            assistant_text: String::new(),
            pending_audio: Vec::new(),
        }
    }

    /// Send a typed line as a user message. Blank lines are ignored.
    fn handle_line(&mut self, line: &str) -> Result<(), InputRejected> {
        let text = line.trim();
        if text.is_empty() {
            return Ok(());
        }
        if !self.session_ready {
            return Err(InputRejected::NotReady);
        }
        if self.response_in_flight {
            return Err(InputRejected::InFlight);
        }

        self.logger
            .event(LogSource::Vox, json!({ "type": "simulate.user", "text": text }));
        self.send(ClientEvent::ConversationItemCreate {
            item: ConversationItem::user_text(text),
        });
        self.send(self.followup_response());
        self.response_in_flight = true;
        Ok(())
    }

    fn handle_realtime_event(&mut self, value: Value) {
        let event = ServerEvent::from_value(&value);
        self.logger.event(LogSource::OpenAI, value);

        let event = match event {
            Ok(event) => event,
            Err(e) => {
                warn!("Discarding malformed realtime event: {}", e);
                return;
            }
        };

        match event {
            ServerEvent::SessionCreated => {
                let tools = tools::tool_definitions();
                self.send(ClientEvent::session_update(&self.settings, tools));
            }
            ServerEvent::SessionUpdated => {
                self.session_ready = true;
                if !self.greeting_sent
                    && let Some(greeting) = self.settings.initial_greeting.clone()
                {
                    self.greeting_sent = true;
                    self.send(ClientEvent::response_create_with(
                        Some(greeting),
                        Some(self.settings.output_modalities.clone()),
                    ));
                    self.response_in_flight = true;
                }
            }
            ServerEvent::ResponseCreated => self.response_in_flight = true,
            ServerEvent::TextDelta { delta } => self.print_text(&delta),
            ServerEvent::TextDone => {
                if !self.assistant_text.is_empty() {
                    self.write_out("\n");
                }
                self.assistant_text.clear();
            }
            ServerEvent::AudioDelta { delta, .. } => {
                let Some(delta) = delta.filter(|d| !d.is_empty()) else {
                    return;
                };
                match BASE64_STANDARD.decode(delta.as_bytes()) {
                    Ok(bytes) => self.pending_audio.extend_from_slice(&bytes),
                    Err(e) => warn!("Discarding undecodable audio delta: {}", e),
                }
            }
            ServerEvent::ResponseDone { response } => {
                self.response_in_flight = false;
                let calls = tools::function_calls(response.as_ref());
                let audio = std::mem::take(&mut self.pending_audio);
                tokio::spawn(finish_turn(
                    calls,
                    audio,
                    self.agent.clone(),
                    self.logger.dir().to_path_buf(),
                    self.play_audio,
                    self.turn_tx.clone(),
                ));
            }
            ServerEvent::Error { error } => {
                let error = error.unwrap_or_default();
                warn!(
                    code = ?error.code,
                    "Realtime error: {}",
                    error.message.as_deref().unwrap_or("unknown")
                );
            }
            ServerEvent::SpeechStarted | ServerEvent::AudioDone | ServerEvent::Unknown => {}
        }
    }

    fn handle_turn_event(&mut self, event: TurnEvent) {
        match event {
            TurnEvent::ToolOutput(output) => {
                if let Some(error) = &output.error {
                    warn!(tool = %output.name, "Tool failed: {}", error);
                    self.logger
                        .event(LogSource::Vox, json!({ "type": "tool.error", "error": error }));
                }
                self.send(ClientEvent::function_call_output(
                    output.call_id,
                    &output.output,
                ));
                self.send(self.followup_response());
                self.response_in_flight = true;
            }
            TurnEvent::AudioSaved(path) => {
                debug!(path = %path.display(), "Assistant audio saved");
                self.logger.event(
                    LogSource::Vox,
                    json!({ "type": "simulate.audio", "path": path.to_string_lossy() }),
                );
            }
        }
    }

    fn followup_response(&self) -> ClientEvent {
        ClientEvent::response_create_with(None, Some(self.settings.output_modalities.clone()))
    }

    fn print_text(&mut self, delta: &str) {
        if delta.is_empty() {
            return;
        }
        if self.assistant_text.is_empty() {
            self.write_out("assistant> ");
        }
        self.write_out(delta);
        self.assistant_text.push_str(delta);
    }

    fn write_out(&mut self, text: &str) {
        if let Err(e) = self
            .out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush())
        {
            debug!("Failed to write to stdout: {}", e);
        }
    }

    fn send(&self, event: ClientEvent) {
        if let Err(e) = self.realtime.send(event) {
            debug!("Dropping realtime event: {}", e);
        }
    }

    async fn close(&mut self) {
        self.realtime.close();
        if let Some(agent) = &self.agent {
            agent.close().await;
        }
        self.logger.close().await;
    }
}

/// Run the tools requested by a response, then save (and play) its audio.
async fn finish_turn(
    calls: Vec<FunctionCall>,
    audio: Vec<u8>,
    agent: Option<AgentClient>,
    log_dir: PathBuf,
    play_audio: bool,
    turn_tx: mpsc::UnboundedSender<TurnEvent>,
) {
    let context = CallContext::default();
    for call in calls {
        if let Some(output) = tools::execute(&call, agent.as_ref(), &log_dir, &context).await {
            let _ = turn_tx.send(TurnEvent::ToolOutput(output));
        }
    }

    if audio.is_empty() {
        return;
    }

    let path = log_dir.join(wav_file_name());
    if let Err(e) = tokio::fs::write(&path, mulaw_to_wav(&audio)).await {
        warn!(path = %path.display(), "Failed to write assistant audio: {}", e);
        return;
    }
    let _ = turn_tx.send(TurnEvent::AudioSaved(path.clone()));

    if play_audio {
        play_wav(&path).await;
    }
}

fn wav_file_name() -> String {
    let millis = time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    format!("assistant_{millis}.wav")
}

/// System audio player for this platform, if there is one.
pub fn playback_command() -> Option<&'static str> {
    if cfg!(target_os = "macos") {
        Some("afplay")
    } else if cfg!(target_os = "linux") {
        Some("aplay")
    } else {
        None
    }
}

async fn play_wav(path: &Path) {
    let Some(player) = playback_command() else {
        eprintln!(
            "vox simulate: audio playback not supported on platform {}",
            std::env::consts::OS
        );
        return;
    };

    let status = Command::new(player)
        .arg(path)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await;
    if let Err(e) = status {
        debug!(player, "Audio playback failed: {}", e);
    }
}
