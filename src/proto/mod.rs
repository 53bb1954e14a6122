pub mod loss_list;

/// Base rate-control interval, in microseconds.
pub const SYN_PERIOD_US: u64 = 10_000;

/// Fixed payload size of a data datagram, in bytes.
pub const DATAGRAM_SIZE: usize = 1400;

/// Sequence numbers occupy the low 31 bits of a header word.
pub const MAX_SEQ_NO: u32 = 0x7FFF_FFFF;

/// Top bit of a loss-list word marks the first word of a range.
pub const LOSS_RANGE_FLAG: u32 = 0x8000_0000;
