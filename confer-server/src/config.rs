/// Лимит участников комнаты по умолчанию.
pub const DEFAULT_MAX_PARTICIPANTS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Путь WebSocket эндпоинта без ведущего `/`; комната добавляется последним сегментом.
    pub endpoint: String,
    pub max_participants: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            endpoint: "video/ws".to_owned(),
            max_participants: DEFAULT_MAX_PARTICIPANTS,
        }
    }
}

impl HubConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_max_participants(mut self, max_participants: usize) -> Self {
        self.max_participants = max_participants;
        self
    }

    /// Маршрут axum вида `/video/ws/{room_id}`.
    pub fn route(&self) -> String {
        format!("/{}/{{room_id}}", self.endpoint.trim_matches('/'))
    }
}
