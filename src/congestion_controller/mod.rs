pub mod udt;

use crate::{error::LossListError, proto::MAX_SEQ_NO};

/// Data sequence number. Wire values fit in 31 bits; the wider type keeps
/// `initial - 1` representable for an initial sequence number of zero.
pub type SeqNo = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    SlowStart,
    CongestionAvoidance,
}

/// Event-driven sender-side rate control.
///
/// The hooks with default bodies are extension points for controller
/// variants; the base algorithm leaves them empty.
pub trait CongestionController {
    /// Called once when the controller is constructed.
    fn init(&mut self) {}

    /// Stores the latest RTT estimate, in microseconds.
    fn set_rtt(&mut self, rtt: u64, rtt_var: u64);

    /// Stores the receiver's packet arrival rate and the estimated link
    /// capacity, both in packets per second.
    fn set_arrival_rate(&mut self, rate: u64, link_capacity: u64);

    /// Inter-packet send interval, in microseconds.
    fn send_interval(&self) -> f64;

    /// Number of packets allowed in flight.
    fn congestion_window(&self) -> u64;

    fn phase(&self) -> Phase;

    fn on_ack(&mut self, ack_seq: SeqNo);

    /// `current_seq` is the largest sequence number sent so far.
    fn on_nak(&mut self, loss: &LossReport, current_seq: SeqNo);

    fn on_timeout(&mut self) {}

    fn on_packet_send(&mut self, _seq: SeqNo) {}

    fn on_packet_receive(&mut self, _seq: SeqNo) {}

    fn close(&mut self) {}
}

/// Whether `seq` fits the 31-bit wire sequence space.
pub fn is_valid_seq(seq: SeqNo) -> bool {
    (0..=SeqNo::from(MAX_SEQ_NO)).contains(&seq)
}

fn check_seq(seq: SeqNo) -> Result<SeqNo, LossListError> {
    if is_valid_seq(seq) {
        Ok(seq)
    } else {
        Err(LossListError::OutOfRange(seq))
    }
}

/// Lost sequence numbers carried by one NAK, kept in report order as
/// inclusive ranges. Never empty; every number is a valid wire sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LossReport {
    ranges: Vec<(SeqNo, SeqNo)>,
}

impl LossReport {
    pub fn new(seqs: Vec<SeqNo>) -> Result<Self, LossListError> {
        let mut iter = seqs.into_iter();
        let first = check_seq(iter.next().ok_or(LossListError::Empty)?)?;

        let mut ranges = vec![];
        let mut start = first;
        let mut end = first;
        for seq in iter {
            let seq = check_seq(seq)?;
            if seq == end + 1 {
                end = seq;
            } else {
                ranges.push((start, end));
                start = seq;
                end = seq;
            }
        }
        ranges.push((start, end));

        Ok(Self { ranges })
    }

    pub fn from_ranges(ranges: Vec<(SeqNo, SeqNo)>) -> Result<Self, LossListError> {
        if ranges.is_empty() {
            return Err(LossListError::Empty);
        }

        for &(start, end) in &ranges {
            check_seq(start)?;
            check_seq(end)?;
            if end < start {
                return Err(LossListError::InvalidRange { start, end });
            }
        }

        Ok(Self { ranges })
    }

    pub fn ranges(&self) -> &[(SeqNo, SeqNo)] {
        &self.ranges
    }

    /// The last reported sequence number, compared against the last
    /// decrease point to detect a new congestion epoch.
    pub fn highest(&self) -> SeqNo {
        // ranges is never empty
        self.ranges.last().map_or(SeqNo::MIN, |&(_, end)| end)
    }

    pub fn len(&self) -> usize {
        self.ranges
            .iter()
            .map(|&(start, end)| (end - start + 1) as usize)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = SeqNo> + '_ {
        self.ranges.iter().flat_map(|&(start, end)| start..=end)
    }
}
