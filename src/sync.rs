//! Synchronization relay: answers a peer's "what is your transmit counter"
//! queries without ever blocking the transmit worker.
//!
//! Both input sources (the TX worker's counter notifications and the
//! inbound query channel) are forwarded onto one merged channel by two
//! lightweight forwarder threads, so the relay's state is only ever touched
//! by the single loop draining the merge. No lock, no multi-source poll.

use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::tx::TxUpdate;
use crate::Error;

/// Commands accepted by `SyncTask`.
pub enum SyncEvent {
    /// Report the last known transmit counter on the response channel.
    Query,
    /// Terminate the relay.
    Exit,
}

/// A source-tagged message on the merged channel.
enum Relayed {
    Counter(u64),
    Query,
    Exit,
}

pub struct SyncTask {
    updates: Receiver<TxUpdate>,
    events: Receiver<SyncEvent>,
    responses: Sender<Option<u64>>,
}

impl SyncTask {
    pub fn new(
        updates: Receiver<TxUpdate>,
        events: Receiver<SyncEvent>,
        responses: Sender<Option<u64>>,
    ) -> Self {
        SyncTask {
            updates,
            events,
            responses,
        }
    }

    /// Run the relay until `Exit` or until both input sources hang up.
    ///
    /// A query that arrives before the first counter notification is
    /// answered with `None`.
    pub fn run(self) -> Result<(), Error> {
        let SyncTask {
            updates,
            events,
            responses,
        } = self;

        let (merged_tx, merged) = unbounded();

        let fwd = merged_tx.clone();
        thread::Builder::new()
            .name("sync-fwd-tx".to_string())
            .spawn(move || {
                for TxUpdate::Counter(c) in updates.iter() {
                    if fwd.send(Relayed::Counter(c)).is_err() {
                        return;
                    }
                }
            })
            .expect("unable to spawn forwarder thread");

        let fwd = merged_tx;
        thread::Builder::new()
            .name("sync-fwd-peer".to_string())
            .spawn(move || {
                for event in events.iter() {
                    let relayed = match event {
                        SyncEvent::Query => Relayed::Query,
                        SyncEvent::Exit => Relayed::Exit,
                    };

                    if fwd.send(relayed).is_err() {
                        return;
                    }
                }
            })
            .expect("unable to spawn forwarder thread");

        let mut tx_counter = None;

        for msg in merged.iter() {
            match msg {
                Relayed::Counter(c) => tx_counter = Some(c),
                Relayed::Query => {
                    responses.send(tx_counter).map_err(|_| Error::Disconnected)?;
                }
                Relayed::Exit => return Ok(()),
            }
        }

        // Both forwarders hung up without an Exit: the TX worker and the
        // card handle are gone.
        Err(Error::Disconnected)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    struct Relay {
        updates: Sender<TxUpdate>,
        events: Sender<SyncEvent>,
        responses: Receiver<Option<u64>>,
        thread: thread::JoinHandle<Result<(), Error>>,
    }

    fn spawn_relay() -> Relay {
        let (update_tx, update_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        let (resp_tx, resp_rx) = unbounded();

        let task = SyncTask::new(update_rx, event_rx, resp_tx);
        let thread = thread::spawn(move || task.run());

        Relay {
            updates: update_tx,
            events: event_tx,
            responses: resp_rx,
            thread,
        }
    }

    impl Relay {
        fn query(&self) -> Option<u64> {
            self.events.send(SyncEvent::Query).unwrap();
            self.responses
                .recv_timeout(Duration::from_secs(5))
                .unwrap()
        }

        /// Query until the relay reports the expected counter. The two
        /// forwarders race, so a fresh notification may land after an
        /// in-flight query.
        fn query_until(&self, expect: u64) {
            for _ in 0..100 {
                if self.query() == Some(expect) {
                    return;
                }

                thread::sleep(Duration::from_millis(10));
            }

            panic!("relay never reported counter {}", expect);
        }
    }

    #[test]
    fn query_before_any_update_is_none() {
        let relay = spawn_relay();

        assert_eq!(relay.query(), None);

        relay.events.send(SyncEvent::Exit).unwrap();
        assert_eq!(relay.thread.join().unwrap(), Ok(()));
    }

    #[test]
    fn query_reports_latest_counter() {
        let relay = spawn_relay();

        relay.updates.send(TxUpdate::Counter(5)).unwrap();
        relay.query_until(5);

        relay.updates.send(TxUpdate::Counter(64)).unwrap();
        relay.updates.send(TxUpdate::Counter(128)).unwrap();
        relay.query_until(128);

        relay.events.send(SyncEvent::Exit).unwrap();
        assert_eq!(relay.thread.join().unwrap(), Ok(()));
    }

    #[test]
    fn hangup_without_exit_is_a_fault() {
        let relay = spawn_relay();

        drop(relay.updates);
        drop(relay.events);

        assert_eq!(relay.thread.join().unwrap(), Err(Error::Disconnected));
    }
}
