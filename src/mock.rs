//! Scripted in-memory `Device` used by the worker tests.

use std::sync::Mutex;

use crate::dev::{ChannelLayout, Device, GainMode, SampleFormat};
use crate::Error;

/// A recorded driver call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SyncConfig(ChannelLayout),
    SetGainMode(u32, GainMode),
    SetBiasTee(u32, bool),
    SetFrequency(u32, u64),
    SetBandwidth(u32, u32),
    SetSampleRate(u32, u32),
    SetGain(u32, i32),
    EnableModule(u32, bool),
    SyncTx(usize),
}

#[derive(Default)]
struct Inner {
    calls: Vec<Call>,
    /// Next ramp value handed out by `sample_as_f32`.
    pos: u64,
    captures: usize,
    transmits: usize,
    fail_capture_after: Option<usize>,
    fail_tx_after: Option<usize>,
}

/// Mock 2x2 card.
///
/// Captures produce a per-channel ramp (`0.0, 1.0, 2.0, ...`) shared by all
/// batches, so tests can check counter continuity against sample values.
/// `fail_*_after(n)` lets a test inject a fail-stop streaming fault after
/// `n` successful calls.
pub struct MockDev {
    expected_batch: usize,
    inner: Mutex<Inner>,
}

impl MockDev {
    pub fn new(expected_batch: usize) -> Self {
        MockDev {
            expected_batch,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Successful transmit calls so far.
    pub fn tx_count(&self) -> usize {
        self.inner.lock().unwrap().transmits
    }

    pub fn fail_capture_after(&self, n: usize) {
        self.inner.lock().unwrap().fail_capture_after = Some(n);
    }

    pub fn fail_tx_after(&self, n: usize) {
        self.inner.lock().unwrap().fail_tx_after = Some(n);
    }

    fn record(&self, call: Call) -> Result<(), Error> {
        self.inner.lock().unwrap().calls.push(call);
        Ok(())
    }
}

impl Device for MockDev {
    fn sync_config(
        &self,
        layout: ChannelLayout,
        _format: SampleFormat,
        _num_buffers: usize,
        _buffer_size: usize,
        _num_transfers: usize,
        _stream_timeout_ms: u32,
    ) -> Result<(), Error> {
        self.record(Call::SyncConfig(layout))
    }

    fn set_gain_mode(&self, channel: u32, mode: GainMode) -> Result<(), Error> {
        self.record(Call::SetGainMode(channel, mode))
    }

    fn set_bias_tee(&self, channel: u32, enable: bool) -> Result<(), Error> {
        self.record(Call::SetBiasTee(channel, enable))
    }

    fn set_frequency(&self, channel: u32, freq: u64) -> Result<(), Error> {
        self.record(Call::SetFrequency(channel, freq))
    }

    fn set_bandwidth(&self, channel: u32, bandwidth: u32) -> Result<(), Error> {
        self.record(Call::SetBandwidth(channel, bandwidth))
    }

    fn set_sample_rate(&self, channel: u32, rate: u32) -> Result<(), Error> {
        self.record(Call::SetSampleRate(channel, rate))
    }

    fn set_gain(&self, channel: u32, gain: i32) -> Result<(), Error> {
        self.record(Call::SetGain(channel, gain))
    }

    fn enable_module(&self, channel: u32, enable: bool) -> Result<(), Error> {
        self.record(Call::EnableModule(channel, enable))
    }

    fn sync_tx(&self, buf: &[u8], num_samples: usize) -> Result<(), Error> {
        assert_eq!(num_samples, buf.len() / 4);

        let mut inner = self.inner.lock().unwrap();

        if inner.fail_tx_after == Some(inner.transmits) {
            return Err(Error::Stream("mock tx fault".to_string()));
        }

        inner.transmits += 1;
        inner.calls.push(Call::SyncTx(num_samples));

        Ok(())
    }

    fn sample_as_f32(
        &self,
        count: usize,
        num_channels: usize,
        bytes_per_samp: usize,
        flags: u32,
    ) -> Result<(Vec<f32>, Vec<f32>), Error> {
        assert_eq!(count, self.expected_batch);
        assert_eq!(num_channels, 2);
        assert_eq!(bytes_per_samp, 4);
        assert_eq!(flags, 0);

        let mut inner = self.inner.lock().unwrap();

        if inner.fail_capture_after == Some(inner.captures) {
            return Err(Error::Stream("mock capture fault".to_string()));
        }

        inner.captures += 1;

        let start = inner.pos;
        inner.pos += count as u64;

        let chan: Vec<f32> = (start..start + count as u64).map(|i| i as f32).collect();

        Ok((chan.clone(), chan))
    }
}
