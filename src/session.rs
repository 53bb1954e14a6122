use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

use rand::Rng;
use tokio::task::JoinHandle;

use crate::{
    config::Config,
    congestion_controller::{is_valid_seq, udt::UDT, SeqNo},
    error::ControllerError,
    stats::{NoopStatistics, StatisticsRegistry, StatisticsSink},
    task::{self, ControllerHandle},
};

/// Largest data sequence number handed to the network so far.
#[derive(Debug)]
pub struct SentSequence(AtomicI64);

impl SentSequence {
    pub fn new(seq: SeqNo) -> Self {
        Self(AtomicI64::new(seq))
    }

    /// Never moves backwards.
    pub fn advance(&self, seq: SeqNo) {
        self.0.fetch_max(seq, Ordering::AcqRel);
    }

    pub fn current(&self) -> SeqNo {
        self.0.load(Ordering::Acquire)
    }
}

/// Per-connection owner of the congestion controller.
#[derive(Debug)]
pub struct Session {
    pub id: u64,
    pub initial_seq: SeqNo,
    config: Config,
    stats: Arc<dyn StatisticsSink>,
    sent_seq: Arc<SentSequence>,
}

impl Session {
    pub fn new(
        id: u64,
        initial_seq: SeqNo,
        config: Config,
        registry: &Arc<StatisticsRegistry>,
    ) -> Result<Self, ControllerError> {
        config.validate()?;
        if !is_valid_seq(initial_seq) {
            return Err(ControllerError::InvalidInitialSequence(initial_seq));
        }
        Self::with_stats(id, initial_seq, config, registry.sink(id))
    }

    /// A session whose send period updates go nowhere.
    pub fn unobserved(
        id: u64,
        initial_seq: SeqNo,
        config: Config,
    ) -> Result<Self, ControllerError> {
        Self::with_stats(id, initial_seq, config, Arc::new(NoopStatistics))
    }

    pub fn with_stats(
        id: u64,
        initial_seq: SeqNo,
        config: Config,
        stats: Arc<dyn StatisticsSink>,
    ) -> Result<Self, ControllerError> {
        config.validate()?;
        if !is_valid_seq(initial_seq) {
            return Err(ControllerError::InvalidInitialSequence(initial_seq));
        }

        Ok(Self {
            id,
            initial_seq,
            config,
            stats,
            sent_seq: Arc::new(SentSequence::new(initial_seq - 1)),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared with the sender, which advances it as packets go out.
    pub fn sent_sequence(&self) -> &Arc<SentSequence> {
        &self.sent_seq
    }

    pub fn controller(&self) -> UDT {
        UDT::new(self.initial_seq, self.config.clone(), self.stats.clone())
    }

    pub fn spawn(&self) -> (ControllerHandle, JoinHandle<UDT>) {
        task::spawn(
            self.controller(),
            self.sent_seq.clone(),
            self.config.event_queue_size,
        )
    }

    pub fn spawn_with_rng<R>(&self, rng: R) -> (ControllerHandle, JoinHandle<UDT<R>>)
    where
        R: Rng + Send + 'static,
    {
        let controller =
            UDT::with_rng(self.initial_seq, self.config.clone(), self.stats.clone(), rng);
        task::spawn(controller, self.sent_seq.clone(), self.config.event_queue_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sent_sequence_only_advances() {
        let sent = SentSequence::new(9);
        sent.advance(15);
        sent.advance(12);
        assert_eq!(sent.current(), 15);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let registry = Arc::new(StatisticsRegistry::new());
        let config = Config {
            syn_period_us: 0,
            ..Config::default()
        };

        assert!(matches!(
            Session::new(1, 0, config, &registry),
            Err(ControllerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn initial_sequence_must_fit_wire_space() {
        for seq in [SeqNo::MIN, -1, SeqNo::from(crate::proto::MAX_SEQ_NO) + 1] {
            assert!(matches!(
                Session::unobserved(1, seq, Config::default()),
                Err(ControllerError::InvalidInitialSequence(s)) if s == seq
            ));
        }

        let registry = Arc::new(StatisticsRegistry::new());
        assert!(Session::new(2, -1, Config::default(), &registry).is_err());
        assert!(registry.is_empty());

        let session = Session::unobserved(1, 0, Config::default()).unwrap();
        assert_eq!(session.sent_sequence().current(), -1);
    }

    #[test]
    fn controller_starts_before_initial_sequence() {
        let registry = Arc::new(StatisticsRegistry::new());
        let session = Session::new(3, 500, Config::default(), &registry).unwrap();

        assert_eq!(session.sent_sequence().current(), 499);
        assert_eq!(session.controller().last_decrease_seq(), 499);
        assert!(registry.get(3).is_some());
    }
}
