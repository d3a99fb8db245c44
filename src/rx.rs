//! Receive worker: keeps a continuous capture counter advancing and serves
//! exact-count sample requests on demand.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::consts::{BUF_COUNT, BUF_SIZE, DEFAULT_RX_GAIN, STREAM_TIMEOUT_MS, XFER_COUNT};
use crate::dev::{ChannelLayout, Device, GainMode, SampleFormat, RX_CHANNELS};
use crate::Error;

/// Commands accepted by `RxTask`.
pub enum RxEvent {
    /// Terminate the worker.
    Exit,
    /// Retune both RX channels (Hz).
    SetFreq(u64),
    /// Capture exactly this many samples per channel, starting at the batch
    /// in flight when the command is observed.
    Request(usize),
}

/// Response to [`RxEvent::Request`].
#[derive(Debug, PartialEq)]
pub struct Batch {
    /// Sample index of the first returned sample, counted from worker start.
    pub start: u64,
    pub chan_a: Vec<f32>,
    pub chan_b: Vec<f32>,
}

pub struct RxTask {
    dev: Arc<dyn Device>,
    freq: u64,
    sps: u32,
    /// Per-channel samples pulled by each blocking capture.
    batch_samps: usize,
    events: Receiver<RxEvent>,
    batches: Sender<Batch>,
}

impl RxTask {
    pub fn new(
        dev: Arc<dyn Device>,
        freq: u64,
        sps: u32,
        batch_samps: usize,
        events: Receiver<RxEvent>,
        batches: Sender<Batch>,
    ) -> Self {
        RxTask {
            dev,
            freq,
            sps,
            batch_samps,
            events,
            batches,
        }
    }

    fn configure(&self) -> Result<(), Error> {
        self.dev.sync_config(
            ChannelLayout::RxX2,
            SampleFormat::Sc16Q11,
            BUF_COUNT,
            BUF_SIZE,
            XFER_COUNT,
            STREAM_TIMEOUT_MS,
        )?;

        for ch in RX_CHANNELS {
            self.dev.set_gain_mode(ch, GainMode::Manual)?;
            self.dev.set_bias_tee(ch, false)?;
            self.dev.set_frequency(ch, self.freq)?;
            self.dev.set_bandwidth(ch, self.sps)?;
            self.dev.set_sample_rate(ch, self.sps)?;
            self.dev.set_gain(ch, DEFAULT_RX_GAIN)?;
            self.dev.enable_module(ch, true)?;
        }

        Ok(())
    }

    fn capture(&self) -> Result<(Vec<f32>, Vec<f32>), Error> {
        self.dev.sample_as_f32(self.batch_samps, 2, 4, 0)
    }

    /// Configure the RX stream and run the capture loop until `Exit` or a
    /// device fault.
    ///
    /// One blocking capture runs every iteration whether or not anyone asked
    /// for samples; that keeps the counter live and the hardware pipe from
    /// backing up. Unrequested batches are dropped. The command poll after
    /// each capture never blocks.
    pub fn run(&mut self) -> Result<(), Error> {
        self.configure()?;

        log::info!("rx worker streaming at {} Hz", self.freq);

        let mut counter = 0u64;

        loop {
            let (sa, sb) = self.capture()?;
            let start = counter;
            counter += sa.len() as u64;

            match self.events.try_recv() {
                Ok(RxEvent::Request(count)) => {
                    let mut abuf = sa;
                    let mut bbuf = sb;

                    // Keep capturing until the accumulated run covers the
                    // request, then slice to exactly `count`. Anything past
                    // the slice is dropped, not carried to the next request.
                    while abuf.len() < count {
                        let (sa, sb) = self.capture()?;
                        counter += sa.len() as u64;
                        abuf.extend_from_slice(&sa);
                        bbuf.extend_from_slice(&sb);
                    }

                    abuf.truncate(count);
                    bbuf.truncate(count);

                    self.batches
                        .send(Batch {
                            start,
                            chan_a: abuf,
                            chan_b: bbuf,
                        })
                        .map_err(|_| Error::Disconnected)?;
                }
                Ok(RxEvent::SetFreq(freq)) => {
                    log::debug!("rx freq -> {} Hz", freq);

                    self.freq = freq;

                    for ch in RX_CHANNELS {
                        self.dev.set_frequency(ch, freq)?;
                    }
                }
                Ok(RxEvent::Exit) => return Ok(()),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => return Err(Error::Disconnected),
            }
        }
    }
}
