use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use colored::*;
use confer::client::{
    CallConfig, CallDeps, CallError, CallHandle, CallObserver, CallStatus, ReceivedChat,
    RemoteTrack, SampleMediaSource, TransportConfig, WebRtcTransportFactory, WsConnector,
};
use confer::model::ConnectionQuality;
use confer::server::{DEFAULT_MAX_PARTICIPANTS, HubConfig, serve};
use confer::{Participant, ParticipantId};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "confer")]
#[command(about = "Call session coordination: signaling hub and headless participant")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling hub.
    Serve {
        #[arg(long, env = "CONFER_ADDR", default_value = "0.0.0.0:8000")]
        addr: String,

        #[arg(long, env = "CONFER_ENDPOINT", default_value = "video/ws")]
        endpoint: String,

        #[arg(long, env = "CONFER_MAX_PARTICIPANTS", default_value_t = DEFAULT_MAX_PARTICIPANTS)]
        max_participants: usize,
    },

    /// Join a room as a headless participant.
    Join {
        #[arg(long, env = "CONFER_SERVER", default_value = "ws://127.0.0.1:8000")]
        server: String,

        #[arg(short, long)]
        room: String,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(long, env = "CONFER_USER_ID")]
        user_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match Cli::parse().command {
        Commands::Serve {
            addr,
            endpoint,
            max_participants,
        } => {
            let config = HubConfig::default()
                .with_endpoint(endpoint)
                .with_max_participants(max_participants);
            let listener = TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;

            println!(
                "{} ws://{}{}",
                "📡 Signaling hub on".green().bold(),
                listener.local_addr()?,
                config.route()
            );
            serve(listener, config).await.context("Hub stopped")?;
        }

        Commands::Join {
            server,
            room,
            name,
            user_id,
        } => {
            let name = match name {
                Some(name) => name,
                None => dialoguer::Input::<String>::new()
                    .with_prompt("Display name")
                    .interact_text()?,
            };
            join(server, room, name, user_id).await?;
        }
    }

    Ok(())
}

async fn join(server: String, room: String, name: String, user_id: Option<String>) -> Result<()> {
    let mut config = CallConfig::new(server);
    if let Some(user_id) = user_id {
        config = config.with_user_id(user_id);
    }

    let call = CallHandle::new(
        config,
        CallDeps {
            media: Arc::new(SampleMediaSource::new()),
            transports: Arc::new(WebRtcTransportFactory::new(TransportConfig::from_env())),
            connector: Arc::new(WsConnector),
            observer: Arc::new(ConsoleObserver),
        },
    );

    call.join_call(&room, &name)
        .await
        .with_context(|| format!("Failed to join room {}", room))?;

    println!(
        "{} {} as {} ({})",
        "✅ Joined".green().bold(),
        room.bold(),
        name,
        call.local_id()
    );
    println!(
        "{}",
        "Type to chat; /mute, /video, /screen, /who, /quit. Ctrl-C leaves.".dimmed()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !run_command(&call, line.trim()).await {
                    break;
                }
            }
        }
    }

    call.leave_call().await;
    println!("{}", "👋 Left the call".cyan());
    Ok(())
}

/// `false` завершает сеанс.
async fn run_command(call: &CallHandle, line: &str) -> bool {
    let outcome = match line {
        "" => return true,
        "/quit" => return false,
        "/mute" => call
            .toggle_mute()
            .await
            .map(|muted| format!("microphone {}", if muted { "muted" } else { "on" })),
        "/video" => call
            .toggle_video()
            .await
            .map(|on| format!("camera {}", if on { "on" } else { "off" })),
        "/screen" => call
            .toggle_screen_share()
            .await
            .map(|on| format!("screen share {}", if on { "started" } else { "stopped" })),
        "/who" => call.participants().await.map(|list| {
            list.iter()
                .map(describe)
                .collect::<Vec<_>>()
                .join("\n")
        }),
        text => call.send_chat(text).map(|_| String::new()),
    };

    match outcome {
        Ok(message) if message.is_empty() => {}
        Ok(message) => println!("{}", message.cyan()),
        Err(CallError::NotJoined | CallError::CoordinatorGone) => {
            println!("{}", "Call is over".red());
            return false;
        }
        Err(e) => println!("{} {}", "⚠".yellow(), e),
    }
    true
}

fn describe(p: &Participant) -> String {
    format!(
        "  {}{} [{}] {:?}/{:?}{}{}",
        p.display_name,
        if p.is_local { " (you)" } else { "" },
        p.id,
        p.connection_state,
        p.quality,
        if p.media.muted { " muted" } else { "" },
        if p.media.screen_sharing { " sharing" } else { "" },
    )
}

struct ConsoleObserver;

#[async_trait]
impl CallObserver for ConsoleObserver {
    async fn on_participants_changed(&self, participants: &[Participant]) {
        let remotes = participants.iter().filter(|p| !p.is_local).count();
        println!("{} {} remote participant(s)", "👥".blue(), remotes);
    }

    async fn on_media_attached(&self, participant: &ParticipantId, track: RemoteTrack) {
        println!(
            "{} {:?} track {} from {}",
            "🎥".green(),
            track.kind,
            track.id,
            participant
        );
    }

    async fn on_media_detached(&self, participant: &ParticipantId) {
        println!("{} media from {} removed", "🎥".dimmed(), participant);
    }

    async fn on_status_changed(&self, status: CallStatus, quality: ConnectionQuality) {
        let line = format!("status {:?}, quality {:?}", status, quality);
        match status {
            CallStatus::Connected => println!("{}", line.green()),
            CallStatus::Connecting | CallStatus::Reconnecting => println!("{}", line.yellow()),
            CallStatus::Disconnected | CallStatus::Left => println!("{}", line.red()),
        }
    }

    async fn on_chat_message(&self, message: &ReceivedChat) {
        let from = message
            .user_name
            .clone()
            .or_else(|| message.from.as_ref().map(ToString::to_string))
            .unwrap_or_else(|| "?".to_owned());
        println!("{} {}", format!("[{}]", from).bold(), message.text);
    }

    async fn on_error(&self, error: &CallError) {
        eprintln!("{} {}", "❌".red(), error);
    }
}
