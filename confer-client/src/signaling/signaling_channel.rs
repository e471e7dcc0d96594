use crate::config::ReconnectPolicy;
use crate::error::{ConnectError, SignalingError};
use crate::signaling::signal_connector::{LinkFrame, SignalConnector, SignalLink};
use crate::signaling::signaling_output::SignalingOutput;
use async_trait::async_trait;
use confer_core::SignalMessage;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Ready,
    Reconnecting { attempt: u32 },
    Closed,
}

/// То, что канал отдаёт владельцу.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalEvent {
    Message(SignalMessage),
    Reconnecting { attempt: u32 },
    Reconnected,
    /// Попытки исчерпаны. Приходит ровно один раз, после него событий нет.
    Lost(SignalingError),
}

/// Поток событий канала. Заканчивается, когда канал закрыт.
pub struct SignalEvents {
    rx: mpsc::UnboundedReceiver<SignalEvent>,
}

impl SignalEvents {
    pub fn new(rx: mpsc::UnboundedReceiver<SignalEvent>) -> Self {
        Self { rx }
    }

    pub fn channel() -> (mpsc::UnboundedSender<SignalEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(rx))
    }

    pub async fn recv(&mut self) -> Option<SignalEvent> {
        self.rx.recv().await
    }
}

#[derive(Debug, Clone)]
pub struct SignalingConfig {
    pub url: Url,
    pub reconnect: ReconnectPolicy,
    /// Отправляется после каждого успешного подключения.
    pub handshake: Vec<SignalMessage>,
}

enum ChannelCommand {
    Send(String),
    Close,
}

/// Сторона канала, через которую пишут. Клонируется свободно.
#[derive(Clone)]
pub struct SignalingHandle {
    cmd_tx: mpsc::UnboundedSender<ChannelCommand>,
    state: watch::Receiver<ChannelState>,
}

impl SignalingHandle {
    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Отправить сообщение. Пока канал не Ready, сообщение молча отбрасывается.
    pub fn send_message(&self, message: &SignalMessage) {
        if !self.is_ready() {
            debug!("Dropping {} while channel is {:?}", message.kind(), self.state());
            return;
        }
        match serde_json::to_string(message) {
            Ok(text) => {
                let _ = self.cmd_tx.send(ChannelCommand::Send(text));
            }
            Err(e) => error!("Failed to serialize signal message: {}", e),
        }
    }

    /// Закрыть канал с кодом 1000 и дождаться остановки.
    pub async fn close_channel(&self) {
        let _ = self.cmd_tx.send(ChannelCommand::Close);
        let mut state = self.state.clone();
        let _ = state.wait_for(|s| *s == ChannelState::Closed).await;
    }
}

#[async_trait]
impl SignalingOutput for SignalingHandle {
    async fn send(&self, message: SignalMessage) {
        self.send_message(&message);
    }

    fn is_ready(&self) -> bool {
        self.state() == ChannelState::Ready
    }

    async fn close(&self) {
        self.close_channel().await;
    }
}

pub struct SignalingChannel;

impl SignalingChannel {
    /// Первое подключение без повторов: его ограничивает таймаут входа в звонок.
    pub async fn connect(
        config: SignalingConfig,
        connector: Arc<dyn SignalConnector>,
    ) -> Result<(SignalingHandle, SignalEvents), ConnectError> {
        let link = connector.connect(&config.url).await?;
        info!("Signaling channel ready: {}", config.url);

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ChannelState::Ready);
        let (events_tx, events) = SignalEvents::channel();

        let driver = ChannelDriver {
            connector,
            config,
            link,
            cmd_rx,
            events_tx,
            state_tx,
        };
        tokio::spawn(driver.run());

        Ok((
            SignalingHandle {
                cmd_tx,
                state: state_rx,
            },
            events,
        ))
    }
}

enum Reconnect {
    Restored,
    Closed,
    Exhausted,
}

struct ChannelDriver {
    connector: Arc<dyn SignalConnector>,
    config: SignalingConfig,
    link: SignalLink,
    cmd_rx: mpsc::UnboundedReceiver<ChannelCommand>,
    events_tx: mpsc::UnboundedSender<SignalEvent>,
    state_tx: watch::Sender<ChannelState>,
}

impl ChannelDriver {
    async fn run(mut self) {
        self.send_handshake();

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(ChannelCommand::Send(text)) => {
                        let _ = self.link.outbound.send(LinkFrame::Text(text));
                    }
                    Some(ChannelCommand::Close) | None => {
                        info!("Closing signaling channel");
                        let _ = self.link.outbound.send(LinkFrame::Close);
                        break;
                    }
                },

                frame = self.link.inbound.recv() => match frame {
                    Some(text) => self.dispatch(&text),
                    None => {
                        warn!("Signaling connection closed unexpectedly");
                        match self.reconnect().await {
                            Reconnect::Restored => {}
                            Reconnect::Closed | Reconnect::Exhausted => break,
                        }
                    }
                },
            }
        }

        self.state_tx.send_replace(ChannelState::Closed);
        debug!("Signaling driver finished");
    }

    fn dispatch(&self, text: &str) {
        match serde_json::from_str::<SignalMessage>(text) {
            Ok(message) => {
                let _ = self.events_tx.send(SignalEvent::Message(message));
            }
            Err(e) => {
                let err = SignalingError::MalformedMessage(e.to_string());
                warn!("{}; dropping frame", err);
            }
        }
    }

    fn send_handshake(&self) {
        for message in &self.config.handshake {
            match serde_json::to_string(message) {
                Ok(text) => {
                    let _ = self.link.outbound.send(LinkFrame::Text(text));
                }
                Err(e) => error!("Failed to serialize handshake: {}", e),
            }
        }
    }

    async fn reconnect(&mut self) -> Reconnect {
        let policy = self.config.reconnect;

        for attempt in 1..=policy.max_attempts {
            self.state_tx
                .send_replace(ChannelState::Reconnecting { attempt });
            let _ = self.events_tx.send(SignalEvent::Reconnecting { attempt });

            let delay = policy.delay(attempt);
            info!(
                "Reconnecting to signaling hub in {:?} (attempt {}/{})",
                delay, attempt, policy.max_attempts
            );
            if self.unless_closed(tokio::time::sleep(delay)).await.is_none() {
                return Reconnect::Closed;
            }

            let connector = self.connector.clone();
            let url = self.config.url.clone();
            let result = match self
                .unless_closed(async move { connector.connect(&url).await })
                .await
            {
                Some(result) => result,
                None => return Reconnect::Closed,
            };

            match result {
                Ok(link) => {
                    self.link = link;
                    self.state_tx.send_replace(ChannelState::Ready);
                    info!("Signaling channel restored after {} attempt(s)", attempt);
                    self.send_handshake();
                    let _ = self.events_tx.send(SignalEvent::Reconnected);
                    return Reconnect::Restored;
                }
                Err(e) => warn!("Reconnect attempt {} failed: {}", attempt, e),
            }
        }

        let lost = SignalingError::ConnectionLost {
            attempts: policy.max_attempts,
        };
        error!("{}", lost);
        let _ = self.events_tx.send(SignalEvent::Lost(lost));
        Reconnect::Exhausted
    }

    /// Ждёт `fut`, пока владелец не закрыл канал. Отправки в это время отбрасываются.
    async fn unless_closed<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        tokio::pin!(fut);
        loop {
            tokio::select! {
                out = &mut fut => return Some(out),
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(ChannelCommand::Send(_)) => {
                        debug!("Dropping outbound frame while reconnecting");
                    }
                    Some(ChannelCommand::Close) | None => return None,
                },
            }
        }
    }
}
