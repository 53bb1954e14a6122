use crate::{
    error::ControllerError,
    proto::{DATAGRAM_SIZE, SYN_PERIOD_US},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Rate-control interval, in microseconds.
    pub syn_period_us: u64,
    /// Payload size of a data datagram, in bytes.
    pub datagram_size: usize,
    /// Window at construction and when slow start ends on an ACK. Also the
    /// headroom added on top of the arrival-rate window afterwards.
    pub initial_window: u64,
    /// Send interval before the first loss, in microseconds.
    pub initial_send_period_us: f64,
    /// Capacity of the controller task's event queue.
    pub event_queue_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            syn_period_us: SYN_PERIOD_US,
            datagram_size: DATAGRAM_SIZE,
            initial_window: 16,
            initial_send_period_us: 1.0,
            event_queue_size: 8192,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ControllerError> {
        if self.syn_period_us == 0 {
            return Err(ControllerError::InvalidConfig("syn period must be positive"));
        }
        if self.datagram_size == 0 {
            return Err(ControllerError::InvalidConfig(
                "datagram size must be positive",
            ));
        }
        if self.initial_window == 0 {
            return Err(ControllerError::InvalidConfig(
                "initial window must be at least one packet",
            ));
        }
        if !(self.initial_send_period_us.is_finite() && self.initial_send_period_us > 0.0) {
            return Err(ControllerError::InvalidConfig(
                "initial send period must be positive",
            ));
        }
        if self.event_queue_size == 0 {
            return Err(ControllerError::InvalidConfig(
                "event queue size must be positive",
            ));
        }

        Ok(())
    }
}
