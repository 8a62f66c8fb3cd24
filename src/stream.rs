//! External interface layer: event stream subscriptions.
//!
//! A subscription is an unbounded channel the dispatcher pushes sealed
//! events into; the simulator never waits on a consumer. `subscribe_since`
//! adds catch-up: the in-memory log is replayed into the channel before it
//! goes live, so a resuming consumer sees a gapless `seq` run for the
//! lifetime of the combat instance.

use tokio::sync::mpsc;

use crate::battle::Simulator;
use crate::event::EventRecord;

pub struct EventStream {
    rx: mpsc::UnboundedReceiver<EventRecord>,
}

impl EventStream {
    pub async fn next(&mut self) -> Option<EventRecord> {
        self.rx.recv().await
    }

    /// Non-blocking drain step.
    pub fn try_next(&mut self) -> Option<EventRecord> {
        self.rx.try_recv().ok()
    }

    /// Drain everything currently buffered.
    pub fn drain(&mut self) -> Vec<EventRecord> {
        let mut out = Vec::new();
        while let Ok(ev) = self.rx.try_recv() {
            out.push(ev);
        }
        out
    }
}

/// Live subscription from this point on.
pub fn subscribe(sim: &mut Simulator) -> EventStream {
    subscribe_since(sim, u64::MAX)
}

/// Subscription resuming after `after_seq`: already-sealed events are
/// replayed into the channel first, then the channel is attached live.
/// Pass 0 to receive the full stream from `seq` 1.
pub fn subscribe_since(sim: &mut Simulator, after_seq: u64) -> EventStream {
    let (tx, rx) = mpsc::unbounded_channel();
    if after_seq != u64::MAX {
        for event in sim.events_since(after_seq) {
            // Receiver is in hand; this cannot fail.
            let _ = tx.send(event);
        }
    }
    sim.add_consumer(tx);
    EventStream { rx }
}
