//! Per-card handle over the three worker threads.

use crossbeam_channel::{Receiver, Sender};

use crate::rx::{Batch, RxEvent};
use crate::sync::SyncEvent;
use crate::tx::TxEvent;
use crate::{Error, Worker};

/// One card's worker set and its synchronous control API.
///
/// Every call here is request/response over the worker channels: each send
/// has exactly one matching receive, so a `Card` must not be shared between
/// callers without external serialization. If a worker has died, the calls
/// that would wait on it fail with [`Error::Disconnected`] instead of
/// hanging.
pub struct Card {
    serial: String,
    tx: Sender<TxEvent>,
    rx: Sender<RxEvent>,
    rx_batches: Receiver<Batch>,
    sync: Sender<SyncEvent>,
    sync_responses: Receiver<Option<u64>>,
    workers: [Worker; 3],
    /// Per-call batch size used to flush stale in-flight samples.
    batch_samps: usize,
}

impl Card {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        serial: String,
        tx: Sender<TxEvent>,
        rx: Sender<RxEvent>,
        rx_batches: Receiver<Batch>,
        sync: Sender<SyncEvent>,
        sync_responses: Receiver<Option<u64>>,
        workers: [Worker; 3],
        batch_samps: usize,
    ) -> Self {
        Card {
            serial,
            tx,
            rx,
            rx_batches,
            sync,
            sync_responses,
            workers,
            batch_samps,
        }
    }

    /// Serial this card was opened with.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Capture exactly `count` samples per channel, starting at the receive
    /// worker's next observed batch.
    pub fn get_samples(&self, count: usize) -> Result<Batch, Error> {
        assert!(count > 0);

        self.rx
            .send(RxEvent::Request(count))
            .map_err(|_| Error::Disconnected)?;
        self.rx_batches.recv().map_err(|_| Error::Disconnected)
    }

    /// Like [`get_samples`](Card::get_samples), but first requests and
    /// discards one per-call batch so stale in-flight samples never reach
    /// the caller. Use when fresh alignment matters more than latency.
    pub fn clear_buffer_get_samples(&self, count: usize) -> Result<Batch, Error> {
        assert!(count > 0);

        self.rx
            .send(RxEvent::Request(self.batch_samps))
            .map_err(|_| Error::Disconnected)?;
        self.rx
            .send(RxEvent::Request(count))
            .map_err(|_| Error::Disconnected)?;

        self.rx_batches.recv().map_err(|_| Error::Disconnected)?;
        self.rx_batches.recv().map_err(|_| Error::Disconnected)
    }

    /// Replace the transmit worker's loaded waveform.
    ///
    /// `data` is a packed interleaved SC16_Q11 buffer; see
    /// [`pack_sc16`](crate::pack_sc16). Transmission starts with the next
    /// cycle and repeats the buffer until it is replaced.
    pub fn set_tx_data(&self, data: Vec<u8>) -> Result<(), Error> {
        self.tx
            .send(TxEvent::SetData(data))
            .map_err(|_| Error::Disconnected)
    }

    /// Set the gain of both TX channels (dB).
    pub fn set_tx_gain(&self, gain: i32) -> Result<(), Error> {
        self.tx
            .send(TxEvent::SetGain(gain))
            .map_err(|_| Error::Disconnected)
    }

    /// Retune both directions to a new center frequency (Hz).
    pub fn set_freq(&self, freq: u64) -> Result<(), Error> {
        self.tx
            .send(TxEvent::SetFreq(freq))
            .map_err(|_| Error::Disconnected)?;
        self.rx
            .send(RxEvent::SetFreq(freq))
            .map_err(|_| Error::Disconnected)
    }

    /// Ask the sync relay for this card's last known transmit counter.
    ///
    /// `None` means the transmit worker has not sent a progress notification
    /// yet (no waveform loaded). A peer card's control logic uses this value
    /// as the shared time reference.
    pub fn tx_counter(&self) -> Result<Option<u64>, Error> {
        self.sync
            .send(SyncEvent::Query)
            .map_err(|_| Error::Disconnected)?;
        self.sync_responses.recv().map_err(|_| Error::Disconnected)
    }

    /// Check whether any worker has died, without blocking.
    ///
    /// Returns the first observed terminal fault, or `None` while all three
    /// workers are running or have exited cleanly.
    pub fn fault(&mut self) -> Option<Error> {
        self.workers
            .iter_mut()
            .filter_map(|w| w.poll())
            .find_map(|res| res.err())
    }

    /// Stop all three workers and wait for them to terminate.
    ///
    /// Send failures are ignored here: a dead worker cannot be told to exit,
    /// and its terminal state is collected from the join either way. Returns
    /// the first worker fault, if any.
    pub fn shutdown(self) -> Result<(), Error> {
        log::info!("shutting down card {}", self.serial);

        self.tx.send(TxEvent::Exit).ok();
        self.rx.send(RxEvent::Exit).ok();
        self.sync.send(SyncEvent::Exit).ok();

        let mut first = None;

        for worker in self.workers {
            if let Err(e) = worker.join() {
                first.get_or_insert(e);
            }
        }

        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
