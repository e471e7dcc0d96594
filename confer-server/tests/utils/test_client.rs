use anyhow::{Context, Result, bail};
use confer_core::SignalMessage;
use confer_server::{HubConfig, serve};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// Timeout for a single expected frame (ms).
pub const FRAME_TIMEOUT_MS: u64 = 3000;

/// Start the hub on an ephemeral local port.
pub async fn start_hub(config: HubConfig) -> Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = serve(listener, config).await {
            tracing::error!("[TestHub] serve failed: {}", e);
        }
    });
    Ok(addr)
}

/// What the client saw instead of a message.
#[derive(Debug, PartialEq)]
pub enum Frame {
    Message(SignalMessage),
    Closed { code: Option<u16>, reason: String },
}

/// Raw WebSocket participant talking to the hub.
pub struct TestClient {
    pub user_id: String,
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr, room: &str, user_id: &str) -> Result<Self> {
        Self::connect_url(format!("ws://{}/video/ws/{}?user_id={}", addr, room, user_id), user_id).await
    }

    /// Join with a display name carried in the query.
    pub async fn connect_as(addr: SocketAddr, room: &str, user_id: &str, user_name: &str) -> Result<Self> {
        let url = format!(
            "ws://{}/video/ws/{}?user_id={}&user_name={}",
            addr, room, user_id, user_name
        );
        Self::connect_url(url, user_id).await
    }

    async fn connect_url(url: String, user_id: &str) -> Result<Self> {
        let (ws, _) = connect_async(url.as_str())
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;
        Ok(Self {
            user_id: user_id.to_owned(),
            ws,
        })
    }

    pub async fn send(&mut self, msg: &SignalMessage) -> Result<()> {
        self.send_raw(&serde_json::to_string(msg)?).await
    }

    pub async fn send_raw(&mut self, text: &str) -> Result<()> {
        self.ws.send(Message::text(text)).await?;
        Ok(())
    }

    pub async fn close(mut self) -> Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }

    /// Next message or close frame; pings and binary frames are skipped.
    pub async fn next_frame(&mut self) -> Result<Frame> {
        let timeout = Duration::from_millis(FRAME_TIMEOUT_MS);
        loop {
            let next = tokio::time::timeout(timeout, self.ws.next())
                .await
                .with_context(|| format!("{}: timeout waiting for a frame", self.user_id))?;

            match next {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Frame::Message(serde_json::from_str(text.as_str())?));
                }
                Some(Ok(Message::Close(frame))) => {
                    return Ok(Frame::Closed {
                        code: frame.as_ref().map(|f| u16::from(f.code)),
                        reason: frame.map(|f| f.reason.as_str().to_owned()).unwrap_or_default(),
                    });
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => bail!("{}: websocket error: {}", self.user_id, e),
                None => bail!("{}: stream ended", self.user_id),
            }
        }
    }

    /// Skip frames until a message of `kind` arrives.
    pub async fn next_of_kind(&mut self, kind: &str) -> Result<SignalMessage> {
        loop {
            match self.next_frame().await? {
                Frame::Message(msg) if msg.kind() == kind => return Ok(msg),
                Frame::Message(_) => continue,
                Frame::Closed { .. } => bail!("{}: closed while waiting for {}", self.user_id, kind),
            }
        }
    }
}
