use crate::error::ConnectError;
use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkFrame {
    Text(String),
    /// Закрыть соединение с кодом 1000.
    Close,
}

/// Одно установленное соединение с хабом.
///
/// Закрытие `inbound` означает, что соединение оборвалось.
pub struct SignalLink {
    pub outbound: mpsc::UnboundedSender<LinkFrame>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
pub trait SignalConnector: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<SignalLink, ConnectError>;
}
