//! Streaming harness for one or more 2x2 bladeRF cards.
//!
//! Each card gets three free-running worker threads: a transmit worker that
//! keeps the TX path fed with the most recently loaded waveform, a receive
//! worker that keeps a capture counter advancing and answers exact-count
//! sample requests, and a sync relay that lets a peer card query the transmit
//! counter for software-level time alignment. All control flows over
//! unbounded FIFO channels; the workers poll for commands without ever
//! blocking their hardware I/O loop.
//!
//! [`setup`] is the entry point: it opens every requested card, wires the
//! channels, starts the workers, and hands back one [`Card`] per device.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, TryRecvError};

mod card;
mod consts;
mod dev;
mod rx;
mod sync;
mod tx;

#[cfg(test)]
mod mock;

pub use card::Card;
pub use consts::{BUF_COUNT, BUF_SIZE, CAPTURE_SAMPS, FLUSH_SAMPS};
pub use dev::{pack_sc16, ChannelLayout, Device, GainMode, SampleFormat, RX_CHANNELS, TX_CHANNELS};
pub use rx::{Batch, RxEvent, RxTask};
pub use sync::{SyncEvent, SyncTask};
pub use tx::{TxEvent, TxTask, TxUpdate};

/// Faults surfaced by the harness.
///
/// Device-side failures are fail-stop: the affected worker terminates and
/// reports its terminal error through its completion channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Opening the device failed.
    #[error("device open failed: {0}")]
    Open(String),
    /// Stream or channel configuration was rejected during worker startup.
    #[error("stream configuration failed: {0}")]
    Config(String),
    /// A blocking transmit or capture call failed mid-stream.
    #[error("streaming failed: {0}")]
    Stream(String),
    /// The far side of a command channel hung up, which means the worker
    /// behind it is gone.
    #[error("worker channel disconnected")]
    Disconnected,
}

/// A supervised worker thread.
///
/// The thread body runs to completion and sends its terminal
/// `Result` on a one-shot channel before exiting, so a dead worker is
/// distinguishable from a slow one without joining it.
pub struct Worker {
    thread: JoinHandle<()>,
    done: Receiver<Result<(), Error>>,
    result: Option<Result<(), Error>>,
}

impl Worker {
    /// Spawn a named worker thread around the given run closure.
    fn spawn<F>(name: String, body: F) -> Worker
    where
        F: FnOnce() -> Result<(), Error> + Send + 'static,
    {
        let (done_tx, done_rx) = unbounded();

        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let res = body();

                match &res {
                    Ok(()) => log::info!("[{}] exited", name),
                    Err(e) => log::warn!("[{}] died: {}", name, e),
                }

                // Nobody listening just means the card was already dropped.
                done_tx.send(res).ok();
            })
            .expect("unable to spawn worker thread");

        Worker {
            thread,
            done: done_rx,
            result: None,
        }
    }

    /// Check whether the worker has terminated, without blocking.
    ///
    /// Returns `None` while the worker is still running, and its terminal
    /// result once it has stopped.
    pub fn poll(&mut self) -> Option<Result<(), Error>> {
        if self.result.is_none() {
            self.result = match self.done.try_recv() {
                Ok(res) => Some(res),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => Some(Err(Error::Disconnected)),
            };
        }

        self.result.clone()
    }

    /// Wait for the worker to terminate and return its result.
    pub fn join(mut self) -> Result<(), Error> {
        if self.result.is_none() {
            self.result = Some(self.done.recv().unwrap_or(Err(Error::Disconnected)));
        }

        self.thread.join().map_err(|_| Error::Disconnected)?;
        self.result.unwrap_or(Err(Error::Disconnected))
    }
}

/// Open every listed card and start its worker set.
///
/// `open` is the device driver boundary: it maps a serial to a live
/// [`Device`] handle. Returns one [`Card`] per serial, in order, plus the
/// per-call batch size used by [`Card::clear_buffer_get_samples`].
///
/// Workers are started fire-and-forget; there is no ready handshake.
/// Commands sent to a card before its workers reach their receive point
/// simply queue in FIFO order.
pub fn setup<F>(
    serials: &[&str],
    sps: u32,
    freq: u64,
    initial_tx_gain: i32,
    open: F,
) -> Result<(Vec<Card>, usize), Error>
where
    F: Fn(&str) -> Result<Arc<dyn Device>, Error>,
{
    let mut cards = Vec::with_capacity(serials.len());

    for &serial in serials {
        let dev = open(serial)?;

        let (tx_cmd, tx_cmd_rx) = unbounded();
        let (tx_update, tx_update_rx) = unbounded();
        let (rx_cmd, rx_cmd_rx) = unbounded();
        let (rx_resp, rx_resp_rx) = unbounded();
        let (sync_cmd, sync_cmd_rx) = unbounded();
        let (sync_resp, sync_resp_rx) = unbounded();

        let mut tx_task = TxTask::new(dev.clone(), freq, sps, initial_tx_gain,
            tx_cmd_rx, tx_update);
        let mut rx_task = RxTask::new(dev.clone(), freq, sps, CAPTURE_SAMPS,
            rx_cmd_rx, rx_resp);
        let sync_task = SyncTask::new(tx_update_rx, sync_cmd_rx, sync_resp);

        let tx_th = Worker::spawn(format!("tx-{}", serial), move || tx_task.run());
        let rx_th = Worker::spawn(format!("rx-{}", serial), move || rx_task.run());
        let sync_th = Worker::spawn(format!("sync-{}", serial), move || sync_task.run());

        cards.push(Card::new(
            serial.to_string(),
            tx_cmd,
            rx_cmd,
            rx_resp_rx,
            sync_cmd,
            sync_resp_rx,
            [tx_th, rx_th, sync_th],
            FLUSH_SAMPS,
        ));
    }

    Ok((cards, FLUSH_SAMPS))
}
