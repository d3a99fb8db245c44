//! Transmit worker: keeps the TX path fed with the most recently loaded
//! waveform while staying responsive to control commands.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::consts::{BUF_COUNT, BUF_SIZE, STREAM_TIMEOUT_MS, XFER_COUNT};
use crate::dev::{ChannelLayout, Device, GainMode, SampleFormat, TX_CHANNELS};
use crate::Error;

/// Commands accepted by `TxTask`.
pub enum TxEvent {
    /// Terminate the worker.
    Exit,
    /// Retune both TX channels (Hz).
    SetFreq(u64),
    /// Set the gain of both TX channels (dB).
    SetGain(i32),
    /// Replace the loaded waveform with a packed SC16_Q11 buffer.
    SetData(Vec<u8>),
}

/// Progress notifications emitted by `TxTask`, consumed by the sync relay.
pub enum TxUpdate {
    /// Transmit counter at the start of the upcoming transmit call.
    Counter(u64),
}

pub struct TxTask {
    dev: Arc<dyn Device>,
    freq: u64,
    sps: u32,
    gain: i32,
    events: Receiver<TxEvent>,
    updates: Sender<TxUpdate>,
}

impl TxTask {
    pub fn new(
        dev: Arc<dyn Device>,
        freq: u64,
        sps: u32,
        gain: i32,
        events: Receiver<TxEvent>,
        updates: Sender<TxUpdate>,
    ) -> Self {
        TxTask {
            dev,
            freq,
            sps,
            gain,
            events,
            updates,
        }
    }

    fn configure(&self) -> Result<(), Error> {
        self.dev.sync_config(
            ChannelLayout::TxX2,
            SampleFormat::Sc16Q11,
            BUF_COUNT,
            BUF_SIZE,
            XFER_COUNT,
            STREAM_TIMEOUT_MS,
        )?;

        for ch in TX_CHANNELS {
            self.dev.set_gain_mode(ch, GainMode::Manual)?;
            self.dev.set_bias_tee(ch, false)?;
            self.dev.set_frequency(ch, self.freq)?;
            self.dev.set_bandwidth(ch, self.sps)?;
            self.dev.set_sample_rate(ch, self.sps)?;
            // The board only reliably latches the gain set before the module
            // is enabled, hence the initial-gain parameter.
            self.dev.set_gain(ch, self.gain)?;
            self.dev.enable_module(ch, true)?;
        }

        Ok(())
    }

    /// Configure the TX stream and run the transmit loop until `Exit` or a
    /// device fault.
    ///
    /// With a waveform loaded, commands are polled without blocking so the
    /// stream never stalls waiting on control traffic; each observed command
    /// skips one transmit cycle. With no waveform there is nothing to send,
    /// so the loop parks on the command channel.
    pub fn run(&mut self) -> Result<(), Error> {
        self.configure()?;

        log::info!("tx worker streaming at {} Hz", self.freq);

        let mut counter = 0u64;
        let mut data: Option<Vec<u8>> = None;

        loop {
            let event = match data {
                Some(ref buf) => match self.events.try_recv() {
                    Ok(event) => Some(event),
                    Err(TryRecvError::Empty) => {
                        let samps = buf.len() / 4;

                        // The relay is advisory; if it is already gone the
                        // stream keeps running.
                        self.updates.send(TxUpdate::Counter(counter)).ok();

                        // Two channels count as one time step.
                        counter += samps as u64 / 2;

                        self.dev.sync_tx(buf, samps)?;
                        None
                    }
                    Err(TryRecvError::Disconnected) => return Err(Error::Disconnected),
                },
                None => Some(self.events.recv().map_err(|_| Error::Disconnected)?),
            };

            match event {
                Some(TxEvent::Exit) => return Ok(()),
                Some(TxEvent::SetFreq(freq)) => {
                    log::debug!("tx freq -> {} Hz", freq);

                    self.freq = freq;

                    for ch in TX_CHANNELS {
                        self.dev.set_frequency(ch, freq)?;
                    }
                }
                Some(TxEvent::SetGain(gain)) => {
                    log::debug!("tx gain -> {} dB", gain);

                    for ch in TX_CHANNELS {
                        self.dev.set_gain(ch, gain)?;
                    }
                }
                Some(TxEvent::SetData(buf)) => {
                    log::debug!("tx waveform -> {} bytes", buf.len());
                    data = Some(buf);
                }
                None => {}
            }
        }
    }
}
