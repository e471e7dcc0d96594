use crate::error::ConnectError;
use crate::signaling::signal_connector::{LinkFrame, SignalConnector, SignalLink};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use url::Url;

type WebSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket-соединение с хабом. Переподключением не занимается.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl SignalConnector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<SignalLink, ConnectError> {
        info!("Connecting to signaling hub {}", url);
        let (ws_stream, _) = connect_async(url.as_str()).await?;
        let (ws_writer, ws_reader) = ws_stream.split();

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();

        tokio::spawn(write_task(outbound_rx, ws_writer));
        tokio::spawn(read_task(ws_reader, inbound_tx));

        Ok(SignalLink { outbound, inbound })
    }
}

async fn write_task(
    mut outbound_rx: mpsc::UnboundedReceiver<LinkFrame>,
    mut ws_writer: SplitSink<WebSocket, Message>,
) {
    while let Some(frame) = outbound_rx.recv().await {
        match frame {
            LinkFrame::Text(text) => {
                if let Err(e) = ws_writer.send(Message::Text(text.into())).await {
                    warn!("Failed to write signaling frame: {}", e);
                    break;
                }
            }
            LinkFrame::Close => {
                let close = CloseFrame {
                    code: CloseCode::Normal,
                    reason: "leave".into(),
                };
                let _ = ws_writer.send(Message::Close(Some(close))).await;
                break;
            }
        }
    }

    let _ = ws_writer.close().await;
}

async fn read_task(
    mut ws_reader: SplitStream<WebSocket>,
    inbound_tx: mpsc::UnboundedSender<String>,
) {
    while let Some(msg) = ws_reader.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if inbound_tx.send(text.as_str().to_owned()).is_err() {
                    break;
                }
            }
            Ok(Message::Close(close)) => {
                debug!("Hub closed the connection: {:?}", close);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Signaling socket error: {}", e);
                break;
            }
        }
    }
}
