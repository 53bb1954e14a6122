use bytes::{Buf, BufMut, Bytes};

use crate::{
    congestion_controller::{LossReport, SeqNo},
    error::LossListError,
};

use super::{LOSS_RANGE_FLAG, MAX_SEQ_NO};

/// Decoding of the NAK control information: a run of big-endian words,
/// where a word with the top bit set opens an inclusive range closed by
/// the next word, and any other word is a single lost sequence number.
pub trait LossListBuf {
    fn try_get_loss_list(&mut self) -> Result<LossReport, LossListError>;
}

impl LossListBuf for Bytes {
    fn try_get_loss_list(&mut self) -> Result<LossReport, LossListError> {
        if self.remaining() % 4 != 0 {
            return Err(LossListError::Truncated);
        }

        let mut ranges = Vec::with_capacity(self.remaining() / 4);

        while self.has_remaining() {
            let word = self
                .try_get_u32()
                .map_err(|_| LossListError::Truncated)?;

            if word & LOSS_RANGE_FLAG == 0 {
                let seq = SeqNo::from(word);
                ranges.push((seq, seq));
                continue;
            }

            let start = SeqNo::from(word & MAX_SEQ_NO);
            let end = self
                .try_get_u32()
                .map_err(|_| LossListError::UnterminatedRange)?;

            if end & LOSS_RANGE_FLAG != 0 {
                return Err(LossListError::FlaggedRangeEnd);
            }

            let end = SeqNo::from(end);
            if end < start {
                return Err(LossListError::InvalidRange { start, end });
            }

            ranges.push((start, end));
        }

        LossReport::from_ranges(ranges)
    }
}

pub trait LossListBufMut: BufMut {
    fn put_loss_list(&mut self, report: &LossReport) {
        for &(start, end) in report.ranges() {
            let start = (start as u32) & MAX_SEQ_NO;
            let end = (end as u32) & MAX_SEQ_NO;

            if start == end {
                self.put_u32(start);
            } else {
                self.put_u32(start | LOSS_RANGE_FLAG);
                self.put_u32(end);
            }
        }
    }
}

impl<T: BufMut> LossListBufMut for T {}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;

    #[test]
    fn decodes_singles_and_ranges() {
        let mut buf = BytesMut::new();
        buf.put_u32(7);
        buf.put_u32(10 | LOSS_RANGE_FLAG);
        buf.put_u32(13);
        buf.put_u32(20);

        let report = buf.freeze().try_get_loss_list().unwrap();

        assert_eq!(report.ranges(), &[(7, 7), (10, 13), (20, 20)]);
        assert_eq!(report.len(), 6);
        assert_eq!(report.highest(), 20);
        assert_eq!(
            report.iter().collect::<Vec<_>>(),
            vec![7, 10, 11, 12, 13, 20]
        );
    }

    #[test]
    fn encoding_compresses_consecutive_runs() {
        let report = LossReport::new(vec![3, 4, 5, 9, 11, 12]).unwrap();

        let mut buf = BytesMut::new();
        buf.put_loss_list(&report);
        let mut bytes = buf.freeze();

        assert_eq!(bytes.len(), 5 * 4);
        assert_eq!(bytes.try_get_loss_list().unwrap(), report);
    }

    #[test]
    fn rejects_empty_payload() {
        assert_eq!(
            Bytes::new().try_get_loss_list(),
            Err(LossListError::Empty)
        );
    }

    #[test]
    fn rejects_partial_word() {
        let mut bytes = Bytes::from_static(&[0, 0, 0, 1, 0, 0]);
        assert_eq!(bytes.try_get_loss_list(), Err(LossListError::Truncated));
    }

    #[test]
    fn rejects_range_without_end() {
        let mut buf = BytesMut::new();
        buf.put_u32(5 | LOSS_RANGE_FLAG);

        assert_eq!(
            buf.freeze().try_get_loss_list(),
            Err(LossListError::UnterminatedRange)
        );
    }

    #[test]
    fn rejects_malformed_range_end() {
        let mut buf = BytesMut::new();
        buf.put_u32(5 | LOSS_RANGE_FLAG);
        buf.put_u32(9 | LOSS_RANGE_FLAG);
        assert_eq!(
            buf.freeze().try_get_loss_list(),
            Err(LossListError::FlaggedRangeEnd)
        );

        let mut buf = BytesMut::new();
        buf.put_u32(9 | LOSS_RANGE_FLAG);
        buf.put_u32(5);
        assert_eq!(
            buf.freeze().try_get_loss_list(),
            Err(LossListError::InvalidRange { start: 9, end: 5 })
        );
    }
}
