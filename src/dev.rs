//! Device driver boundary.
//!
//! The harness drives hardware exclusively through [`Device`], which mirrors
//! the libbladeRF synchronous streaming API for a 2x2 card. The real
//! implementation lives with the caller (FFI bindings); tests implement it
//! with a scripted mock.

use crate::Error;

/// RX analog paths on a 2x2 card.
pub const RX_CHANNELS: [u32; 2] = [0, 2];
/// TX analog paths on a 2x2 card.
pub const TX_CHANNELS: [u32; 2] = [1, 3];

/// Stream channel layout.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChannelLayout {
    RxX2,
    TxX2,
}

/// Wire sample format.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SampleFormat {
    /// Interleaved 16-bit fixed point, 12 significant bits.
    Sc16Q11,
}

/// Per-channel gain control mode.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GainMode {
    Manual,
    Auto,
}

/// One physical 2x2 transceiver.
///
/// The TX worker and RX worker of a card share one handle but touch disjoint
/// channel sets ([`TX_CHANNELS`] vs [`RX_CHANNELS`]), so implementations only
/// need the interior synchronization libbladeRF itself provides.
pub trait Device: Send + Sync {
    /// Configure one stream direction's buffer geometry.
    fn sync_config(
        &self,
        layout: ChannelLayout,
        format: SampleFormat,
        num_buffers: usize,
        buffer_size: usize,
        num_transfers: usize,
        stream_timeout_ms: u32,
    ) -> Result<(), Error>;

    fn set_gain_mode(&self, channel: u32, mode: GainMode) -> Result<(), Error>;
    fn set_bias_tee(&self, channel: u32, enable: bool) -> Result<(), Error>;
    fn set_frequency(&self, channel: u32, freq: u64) -> Result<(), Error>;
    fn set_bandwidth(&self, channel: u32, bandwidth: u32) -> Result<(), Error>;
    fn set_sample_rate(&self, channel: u32, rate: u32) -> Result<(), Error>;
    fn set_gain(&self, channel: u32, gain: i32) -> Result<(), Error>;
    fn enable_module(&self, channel: u32, enable: bool) -> Result<(), Error>;

    /// Blocking transmit of a packed interleaved buffer.
    ///
    /// `num_samples` counts individual channel samples, `buf.len() / 4`.
    fn sync_tx(&self, buf: &[u8], num_samples: usize) -> Result<(), Error>;

    /// Blocking capture of `count` samples per channel, deinterleaved to
    /// floats.
    fn sample_as_f32(
        &self,
        count: usize,
        num_channels: usize,
        bytes_per_samp: usize,
        flags: u32,
    ) -> Result<(Vec<f32>, Vec<f32>), Error>;
}

/// Pack two channels of (I, Q) pairs into the interleaved SC16_Q11 wire
/// buffer accepted by [`TxEvent::SetData`](crate::TxEvent::SetData).
///
/// Inputs are clamped to [-1.0, 1.0] and scaled to 12-bit fixed point.
/// Each time step is 8 bytes on the wire: channel A's complex sample
/// followed by channel B's, 16-bit little endian each.
pub fn pack_sc16(chan_a: &[(f32, f32)], chan_b: &[(f32, f32)]) -> Vec<u8> {
    assert_eq!(chan_a.len(), chan_b.len());

    fn quantize(s: f32) -> i16 {
        (s.clamp(-1.0, 1.0) * 2047.0) as i16
    }

    let mut buf = Vec::with_capacity(chan_a.len() * 8);

    for (&(ai, aq), &(bi, bq)) in chan_a.iter().zip(chan_b.iter()) {
        buf.extend_from_slice(&quantize(ai).to_le_bytes());
        buf.extend_from_slice(&quantize(aq).to_le_bytes());
        buf.extend_from_slice(&quantize(bi).to_le_bytes());
        buf.extend_from_slice(&quantize(bq).to_le_bytes());
    }

    buf
}
