use std::sync::Arc;

use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, trace};

use crate::{config::Config, stats::StatisticsSink};

use super::{CongestionController, LossReport, Phase, SeqNo};

/// Multiplicative decrease applied to the send period on loss.
const DECREASE_FACTOR: f64 = 1.125;

/// EWMA weights for the average number of NAKs per congestion epoch.
const NAK_AVG_HISTORY_WEIGHT: f64 = 0.875;
const NAK_AVG_SAMPLE_WEIGHT: f64 = 0.125;

/// Further decreases allowed inside one congestion epoch.
const MAX_EPOCH_DECREASES: u64 = 5;

/// Additive increase scale, in packets per bit of spare capacity per byte
/// of datagram; divided by the datagram size to get β.
const INCREASE_SCALE: f64 = 0.0000015;

/// Packets per second assumed before the receiver reports a rate.
const DEFAULT_ARRIVAL_RATE: u64 = 100;

/// Initial RTT estimate, in SYN periods.
const INITIAL_RTT_SYNS: u64 = 10;

/// Bounds of the send period, in microseconds.
const MIN_SEND_PERIOD: f64 = 1e-6;
const MAX_SEND_PERIOD: f64 = 1e9;

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug)]
pub struct UDT<R = StdRng> {
    config: Config,
    stats: Arc<dyn StatisticsSink>,
    rng: R,
    rtt: u64,
    arrival_rate: u64,
    link_capacity: u64,
    snd: f64,
    cwnd: u64,
    phase: Phase,
    last_ack_seq: SeqNo,
    last_dec_seq: SeqNo,
    nak_count: u64,
    dec_count: u64,
    dec_random: u64,
    avg_nak_num: u64,
    is_closed: bool,
}

impl UDT<StdRng> {
    pub fn new(initial_seq: SeqNo, config: Config, stats: Arc<dyn StatisticsSink>) -> Self {
        Self::with_rng(initial_seq, config, stats, StdRng::from_os_rng())
    }
}

impl<R: Rng> UDT<R> {
    pub fn with_rng(
        initial_seq: SeqNo,
        config: Config,
        stats: Arc<dyn StatisticsSink>,
        rng: R,
    ) -> Self {
        let mut controller = Self {
            rtt: INITIAL_RTT_SYNS.saturating_mul(config.syn_period_us),
            arrival_rate: DEFAULT_ARRIVAL_RATE,
            link_capacity: 0,
            snd: config.initial_send_period_us,
            cwnd: config.initial_window.max(1),
            phase: Phase::SlowStart,
            last_ack_seq: -1,
            last_dec_seq: initial_seq.saturating_sub(1),
            nak_count: 1,
            dec_count: 1,
            dec_random: 1,
            avg_nak_num: 0,
            is_closed: false,
            config,
            stats,
            rng,
        };

        controller.init();
        controller
    }

    pub fn last_ack_seq(&self) -> SeqNo {
        self.last_ack_seq
    }

    pub fn last_decrease_seq(&self) -> SeqNo {
        self.last_dec_seq
    }

    pub fn nak_count(&self) -> u64 {
        self.nak_count
    }

    pub fn epoch_decrease_count(&self) -> u64 {
        self.dec_count
    }

    pub fn decrease_threshold(&self) -> u64 {
        self.dec_random
    }

    pub fn average_nak_per_epoch(&self) -> u64 {
        self.avg_nak_num
    }

    pub fn rtt(&self) -> u64 {
        self.rtt
    }

    pub fn is_closed(&self) -> bool {
        self.is_closed
    }

    fn syn_period(&self) -> f64 {
        self.config.syn_period_us.max(1) as f64
    }

    fn datagram_size(&self) -> f64 {
        self.config.datagram_size.max(1) as f64
    }

    /// Packets to add to the send rate over the next SYN period.
    fn increase_per_syn(&self) -> f64 {
        let size = self.datagram_size();
        let min_increase = 1.0 / size;

        if self.link_capacity <= self.arrival_rate {
            return min_increase;
        }

        let spare_bits = size * (self.link_capacity - self.arrival_rate) as f64 * 8.0;
        let beta = INCREASE_SCALE / size;
        let increase = 10f64.powf(spare_bits.log10().ceil()) * beta;

        if increase.is_finite() {
            increase.max(min_increase)
        } else {
            min_increase
        }
    }

    fn set_snd(&mut self, snd: f64) {
        self.snd = if snd.is_nan() {
            MIN_SEND_PERIOD
        } else {
            snd.clamp(MIN_SEND_PERIOD, MAX_SEND_PERIOD)
        };
        self.stats.set_send_period(self.snd);
    }

    fn increase_snd(&mut self, current_seq: SeqNo) {
        self.set_snd((self.snd * DECREASE_FACTOR).ceil());
        self.last_dec_seq = self.last_dec_seq.max(current_seq);
    }

    /// Rounds up a uniform draw over `[1, avg)`, so the threshold is 1 only
    /// when the average is.
    fn draw_decrease_threshold(&mut self) -> u64 {
        let r: f64 = self.rng.random();
        let threshold = ((self.avg_nak_num - 1) as f64 * r + 1.0).ceil() as u64;
        threshold.clamp(1, self.avg_nak_num)
    }

    fn start_congestion_epoch(&mut self, current_seq: SeqNo) {
        self.increase_snd(current_seq);

        let avg = self.avg_nak_num as f64 * NAK_AVG_HISTORY_WEIGHT
            + self.nak_count as f64 * NAK_AVG_SAMPLE_WEIGHT;
        self.avg_nak_num = (avg.ceil() as u64).max(1);
        self.nak_count = 1;
        self.dec_random = self.draw_decrease_threshold();

        debug!(
            snd = self.snd,
            avg_nak_num = self.avg_nak_num,
            dec_random = self.dec_random,
            last_dec_seq = self.last_dec_seq,
            "new congestion epoch"
        );
    }
}

impl<R: Rng> CongestionController for UDT<R> {
    fn set_rtt(&mut self, rtt: u64, _rtt_var: u64) {
        self.rtt = rtt;
    }

    fn set_arrival_rate(&mut self, rate: u64, link_capacity: u64) {
        self.arrival_rate = rate;
        self.link_capacity = link_capacity;
    }

    fn send_interval(&self) -> f64 {
        self.snd
    }

    fn congestion_window(&self) -> u64 {
        self.cwnd
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn on_ack(&mut self, ack_seq: SeqNo) {
        if self.phase == Phase::SlowStart {
            self.cwnd = self.config.initial_window.max(1);
            self.phase = Phase::CongestionAvoidance;
            debug!(ack_seq, cwnd = self.cwnd, "slow start ended by ACK");
            return;
        }

        self.cwnd = self
            .arrival_rate
            .saturating_mul(self.rtt.saturating_add(self.config.syn_period_us))
            .saturating_add(self.config.initial_window)
            .max(1);

        let increase = self.increase_per_syn();
        let syn = self.syn_period();
        self.set_snd(self.snd * syn / (self.snd * increase + syn));

        trace!(
            ack_seq,
            cwnd = self.cwnd,
            snd = self.snd,
            increase,
            "rate increased"
        );
    }

    fn on_nak(&mut self, loss: &LossReport, current_seq: SeqNo) {
        let biggest_loss_seq = loss.highest();
        self.last_ack_seq = current_seq;
        self.nak_count += 1;

        if self.phase == Phase::SlowStart {
            let snd = if self.arrival_rate > 0 {
                1e6 / self.arrival_rate as f64
            } else {
                self.cwnd as f64 * (self.rtt as f64 + self.syn_period())
            };
            self.set_snd(snd);
            self.phase = Phase::CongestionAvoidance;
            debug!(
                biggest_loss_seq,
                snd = self.snd,
                "slow start ended by NAK"
            );
            return;
        }

        if biggest_loss_seq > self.last_dec_seq {
            self.start_congestion_epoch(current_seq);
            return;
        }

        if self.dec_count <= MAX_EPOCH_DECREASES
            && self.nak_count == self.dec_count * self.dec_random
        {
            self.increase_snd(current_seq);
            self.dec_count += 1;
            debug!(
                snd = self.snd,
                dec_count = self.dec_count,
                nak_count = self.nak_count,
                "decrease within congestion epoch"
            );
        }
    }

    fn close(&mut self) {
        if self.is_closed {
            trace!("congestion controller already closed");
            return;
        }

        self.is_closed = true;
        debug!(snd = self.snd, cwnd = self.cwnd, "congestion controller closed");
    }
}
