use tokio::sync::broadcast;
use tracing::trace;

use crate::events::TransferCreated;

const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out of committed transfers to whoever is listening.
///
/// Publishing never fails a transfer: with no subscribers the event is dropped,
/// and slow subscribers lag rather than block the sender.
pub struct TransferNotifier {
    sender: broadcast::Sender<TransferCreated>
}

impl TransferNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransferCreated> {
        self.sender.subscribe()
    }

    /// Returns how many subscribers received the event.
    pub fn publish(&self, event: TransferCreated) -> usize {
        let transfer_id = event.transfer.id;

        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                trace!("No subscribers for transfer [{transfer_id}]");
                0
            }
        }
    }
}

impl Default for TransferNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
