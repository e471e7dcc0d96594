use crate::config::HubConfig;
use crate::room::RoomManager;
use crate::signaling::{SignalingService, ws_handler};
use axum::Router;
use axum::routing::get;
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Общее состояние хаба для axum обработчиков.
#[derive(Clone)]
pub struct HubState {
    pub signaling: SignalingService,
    pub rooms: RoomManager,
}

impl HubState {
    pub fn new(config: &HubConfig) -> Self {
        let signaling = SignalingService::new();
        let rooms = RoomManager::new(Arc::new(signaling.clone()), config.max_participants);
        Self { signaling, rooms }
    }
}

pub fn router(config: &HubConfig) -> Router {
    Router::new()
        .route(&config.route(), get(ws_handler))
        .with_state(HubState::new(config))
}

/// Обслуживать хаб на уже открытом сокете, пока не упадёт сервер.
pub async fn serve(listener: TcpListener, config: HubConfig) -> io::Result<()> {
    info!(
        "Signaling hub listening on {:?} at {}",
        listener.local_addr().ok(),
        config.route()
    );
    axum::serve(listener, router(&config)).await
}
