use confer_core::ConnectionQuality;
use std::time::Duration;
use tokio::time::Instant;

/// Порог задержки, ниже которого связь считается отличной.
pub const EXCELLENT_RTT: Duration = Duration::from_millis(150);

/// Качество по времени ожидания `pong`:
/// меньше периода — excellent/good (по RTT), до двух периодов — poor, дальше — bad.
pub fn classify_quality(
    waiting: Duration,
    rtt: Option<Duration>,
    period: Duration,
) -> ConnectionQuality {
    if waiting < period {
        match rtt {
            Some(rtt) if rtt > EXCELLENT_RTT => ConnectionQuality::Good,
            _ => ConnectionQuality::Excellent,
        }
    } else if waiting <= period * 2 {
        ConnectionQuality::Poor
    } else {
        ConnectionQuality::Bad
    }
}

/// Учёт ping/pong. Таймером не владеет: его дёргает цикл координатора.
///
/// Время ожидания отсчитывается от самого старого `ping` без ответа,
/// так что опоздание тика не портит качество живого канала.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    period: Duration,
    started_at: Instant,
    last_ping: Option<Instant>,
    unanswered_since: Option<Instant>,
    last_pong: Option<Instant>,
    rtt: Option<Duration>,
    quality: ConnectionQuality,
}

impl HeartbeatMonitor {
    pub fn new(period: Duration, now: Instant) -> Self {
        Self {
            period,
            started_at: now,
            last_ping: None,
            unanswered_since: None,
            last_pong: None,
            rtt: None,
            quality: ConnectionQuality::Connecting,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn quality(&self) -> ConnectionQuality {
        self.quality
    }

    pub fn rtt(&self) -> Option<Duration> {
        self.rtt
    }

    pub fn ping_sent(&mut self, now: Instant) {
        self.last_ping = Some(now);
        self.unanswered_since.get_or_insert(now);
    }

    /// Возвращает новое качество, если оно изменилось.
    pub fn pong_received(&mut self, now: Instant) -> Option<ConnectionQuality> {
        if self.unanswered_since.take().is_some() {
            self.rtt = self
                .last_ping
                .map(|ping| now.saturating_duration_since(ping));
        }
        self.last_pong = Some(now);
        self.evaluate(now)
    }

    /// Возвращает новое качество, если оно изменилось.
    pub fn evaluate(&mut self, now: Instant) -> Option<ConnectionQuality> {
        let next = match (self.last_pong, self.unanswered_since) {
            (Some(_), Some(ping)) => {
                classify_quality(now.saturating_duration_since(ping), self.rtt, self.period)
            }
            (Some(_), None) => classify_quality(Duration::ZERO, self.rtt, self.period),
            (None, _) => {
                let since_start = now.saturating_duration_since(self.started_at);
                if since_start < self.period {
                    ConnectionQuality::Connecting
                } else {
                    classify_quality(since_start, None, self.period)
                }
            }
        };

        if next == self.quality {
            return None;
        }
        self.quality = next;
        Some(next)
    }

    /// Начать отсчёт заново, например после переподключения канала.
    pub fn reset(&mut self, now: Instant) {
        *self = Self::new(self.period, now);
    }
}
