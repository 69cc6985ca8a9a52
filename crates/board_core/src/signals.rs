use shared::{
    domain::EventId,
    protocol::{ScheduleSignal, SignalKind},
};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

const DEFAULT_SIGNAL_CAPACITY: usize = 256;

/// Broadcast surface every board component publishes to and listens on.
/// Publishers never learn who is subscribed.
#[derive(Clone)]
pub struct SignalBus {
    sender: broadcast::Sender<ScheduleSignal>,
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNAL_CAPACITY)
    }
}

impl SignalBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns how many subscribers saw the signal. Zero is not an error.
    pub fn publish(&self, signal: ScheduleSignal) -> usize {
        match self.sender.send(signal) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(signal)) => {
                debug!(
                    event_id = %signal.event_id,
                    kind = ?signal.kind,
                    "schedule signal had no subscribers"
                );
                0
            }
        }
    }

    pub fn emit(&self, event_id: &EventId, kind: SignalKind) -> usize {
        self.publish(ScheduleSignal::new(event_id.clone(), kind))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScheduleSignal> {
        self.sender.subscribe()
    }

    pub fn stream(&self) -> BroadcastStream<ScheduleSignal> {
        BroadcastStream::new(self.sender.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[path = "tests/signals_tests.rs"]
mod tests;
