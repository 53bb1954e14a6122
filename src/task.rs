use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use bytes::Bytes;
use crossbeam_queue::ArrayQueue;
use tokio::{
    sync::{watch, Notify},
    task::JoinHandle,
};
use tracing::{debug, trace};

use crate::{
    congestion_controller::{CongestionController, LossReport, Phase, SeqNo},
    error::ControllerError,
    proto::loss_list::LossListBuf,
    session::SentSequence,
};

#[derive(Debug)]
pub enum CongestionEvent {
    Ack { seq: SeqNo },
    Nak { loss: LossReport },
    Timeout,
    PacketSent { seq: SeqNo },
    PacketReceived { seq: SeqNo },
    Rtt { rtt: u64, rtt_var: u64 },
    ArrivalRate { rate: u64, link_capacity: u64 },
}

/// What the sender needs to pace transmission, published as one value so
/// readers never see the interval of one update with the window of another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacing {
    pub send_interval_us: f64,
    pub congestion_window: u64,
    pub phase: Phase,
}

impl Pacing {
    fn of<C: CongestionController>(controller: &C) -> Self {
        Self {
            send_interval_us: controller.send_interval(),
            congestion_window: controller.congestion_window(),
            phase: controller.phase(),
        }
    }

    pub fn send_interval(&self) -> Duration {
        Duration::from_secs_f64(self.send_interval_us / 1_000_000.0)
    }
}

#[derive(Debug, Clone)]
pub struct ControllerHandle {
    event_queue: Arc<ArrayQueue<CongestionEvent>>,
    event_notify: Arc<Notify>,
    is_closed: Arc<AtomicBool>,
    pacing: watch::Receiver<Pacing>,
}

impl ControllerHandle {
    /// Queues `event` for the controller task. An event that races with
    /// [`close`](Self::close) is reported as `Closed` even if the task still
    /// applies it.
    pub fn push(&self, event: CongestionEvent) -> Result<(), ControllerError> {
        if self.is_closed.load(Ordering::SeqCst) {
            return Err(ControllerError::Closed);
        }

        self.event_queue
            .push(event)
            .map_err(|_| ControllerError::QueueFull)?;

        if self.is_closed.load(Ordering::SeqCst) {
            return Err(ControllerError::Closed);
        }
        self.event_notify.notify_one();

        Ok(())
    }

    pub fn on_ack(&self, seq: SeqNo) -> Result<(), ControllerError> {
        self.push(CongestionEvent::Ack { seq })
    }

    pub fn on_nak(&self, loss: LossReport) -> Result<(), ControllerError> {
        self.push(CongestionEvent::Nak { loss })
    }

    /// Decodes the loss list of a NAK control packet and queues it.
    pub fn on_nak_payload(&self, mut payload: Bytes) -> Result<(), ControllerError> {
        let loss = payload.try_get_loss_list()?;
        self.on_nak(loss)
    }

    pub fn on_timeout(&self) -> Result<(), ControllerError> {
        self.push(CongestionEvent::Timeout)
    }

    pub fn on_packet_send(&self, seq: SeqNo) -> Result<(), ControllerError> {
        self.push(CongestionEvent::PacketSent { seq })
    }

    pub fn on_packet_receive(&self, seq: SeqNo) -> Result<(), ControllerError> {
        self.push(CongestionEvent::PacketReceived { seq })
    }

    pub fn set_rtt(&self, rtt: u64, rtt_var: u64) -> Result<(), ControllerError> {
        self.push(CongestionEvent::Rtt { rtt, rtt_var })
    }

    pub fn set_arrival_rate(&self, rate: u64, link_capacity: u64) -> Result<(), ControllerError> {
        self.push(CongestionEvent::ArrivalRate {
            rate,
            link_capacity,
        })
    }

    pub fn pacing(&self) -> Pacing {
        *self.pacing.borrow()
    }

    pub fn send_interval(&self) -> Duration {
        self.pacing().send_interval()
    }

    pub fn congestion_window(&self) -> u64 {
        self.pacing().congestion_window
    }

    /// Waits until the controller task publishes a new pacing value.
    pub async fn changed(&mut self) -> Result<Pacing, ControllerError> {
        self.pacing
            .changed()
            .await
            .map_err(|_| ControllerError::Closed)?;
        Ok(*self.pacing.borrow_and_update())
    }

    /// Stops the controller task once the queued events are applied.
    /// Later calls have no effect.
    pub fn close(&self) {
        if !self.is_closed.swap(true, Ordering::SeqCst) {
            self.event_notify.notify_one();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.is_closed.load(Ordering::SeqCst)
    }
}

/// Moves `controller` into a task that owns every mutation of it. The
/// task ends on [`ControllerHandle::close`] or when every handle is
/// dropped, and yields the closed controller.
pub fn spawn<C>(
    mut controller: C,
    sent_seq: Arc<SentSequence>,
    queue_size: usize,
) -> (ControllerHandle, JoinHandle<C>)
where
    C: CongestionController + Send + 'static,
{
    let event_queue = Arc::new(ArrayQueue::new(queue_size.max(1)));
    let event_notify = Arc::new(Notify::new());
    let is_closed = Arc::new(AtomicBool::new(false));
    let (pacing_tx, pacing_rx) = watch::channel(Pacing::of(&controller));

    let handle = ControllerHandle {
        event_queue: event_queue.clone(),
        event_notify: event_notify.clone(),
        is_closed: is_closed.clone(),
        pacing: pacing_rx,
    };

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                _ = event_notify.notified() => {}
                _ = pacing_tx.closed() => {
                    debug!("all controller handles dropped");
                    controller.close();
                    break;
                }
            }

            let is_closing = is_closed.load(Ordering::SeqCst);

            // a push that saw the flag clear is in the queue by now
            let mut count = 0;
            while let Some(event) = event_queue.pop() {
                apply(&mut controller, event, &sent_seq);
                count += 1;
            }

            if count > 0 {
                let pacing = Pacing::of(&controller);
                pacing_tx.send_if_modified(|current| {
                    if *current == pacing {
                        false
                    } else {
                        *current = pacing;
                        true
                    }
                });
                trace!(count, ?pacing, "applied congestion events");
            }

            if is_closing {
                controller.close();
                break;
            }
        }

        controller
    });

    (handle, task)
}

fn apply<C: CongestionController>(
    controller: &mut C,
    event: CongestionEvent,
    sent_seq: &SentSequence,
) {
    match event {
        CongestionEvent::Ack { seq } => controller.on_ack(seq),
        CongestionEvent::Nak { loss } => controller.on_nak(&loss, sent_seq.current()),
        CongestionEvent::Timeout => controller.on_timeout(),
        CongestionEvent::PacketSent { seq } => {
            sent_seq.advance(seq);
            controller.on_packet_send(seq);
        }
        CongestionEvent::PacketReceived { seq } => controller.on_packet_receive(seq),
        CongestionEvent::Rtt { rtt, rtt_var } => controller.set_rtt(rtt, rtt_var),
        CongestionEvent::ArrivalRate {
            rate,
            link_capacity,
        } => controller.set_arrival_rate(rate, link_capacity),
    }
}
