use std::sync::Arc;

use dashmap::DashMap;

/// Receives the send period whenever the controller changes it.
/// Observability only; nothing flows back into the controller.
pub trait StatisticsSink: std::fmt::Debug + Send + Sync {
    fn set_send_period(&self, send_period_us: f64);
}

#[derive(Debug, Default)]
pub struct NoopStatistics;

impl StatisticsSink for NoopStatistics {
    fn set_send_period(&self, _send_period_us: f64) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SendPeriodStats {
    pub send_period_us: f64,
    pub updates: u64,
}

/// Per-connection send period statistics, shared by every controller
/// task of an endpoint.
#[derive(Debug, Default)]
pub struct StatisticsRegistry {
    conns: DashMap<u64, SendPeriodStats>,
}

impl StatisticsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink(self: &Arc<Self>, conn_id: u64) -> Arc<dyn StatisticsSink> {
        self.conns.entry(conn_id).or_default();

        Arc::new(ConnStatistics {
            conn_id,
            registry: Arc::clone(self),
        })
    }

    pub fn get(&self, conn_id: u64) -> Option<SendPeriodStats> {
        self.conns.get(&conn_id).map(|stats| *stats)
    }

    pub fn remove(&self, conn_id: u64) -> Option<SendPeriodStats> {
        self.conns.remove(&conn_id).map(|(_, stats)| stats)
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }
}

#[derive(Debug)]
struct ConnStatistics {
    conn_id: u64,
    registry: Arc<StatisticsRegistry>,
}

impl StatisticsSink for ConnStatistics {
    fn set_send_period(&self, send_period_us: f64) {
        let mut stats = self.registry.conns.entry(self.conn_id).or_default();
        stats.send_period_us = send_period_us;
        stats.updates += 1;
    }
}
