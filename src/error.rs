use thiserror::Error;

use crate::congestion_controller::SeqNo;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LossListError {
    #[error("loss report contains no sequence numbers")]
    Empty,
    #[error("loss list ends in the middle of a word")]
    Truncated,
    #[error("loss range start has no end word")]
    UnterminatedRange,
    #[error("loss range end {end} is before start {start}")]
    InvalidRange { start: SeqNo, end: SeqNo },
    #[error("loss range end word carries the range flag")]
    FlaggedRangeEnd,
    #[error("sequence number {0} is outside the 31-bit sequence space")]
    OutOfRange(SeqNo),
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    #[error("initial sequence number {0} is outside the 31-bit sequence space")]
    InvalidInitialSequence(SeqNo),
    #[error("event queue is full")]
    QueueFull,
    #[error("controller is closed")]
    Closed,
    #[error("loss list error: {0}")]
    LossList(#[from] LossListError),
}
