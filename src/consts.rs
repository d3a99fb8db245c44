/// Number of hardware stream buffers to allocate per direction.
pub const BUF_COUNT: usize = 16;
/// Size of each stream buffer (samples).
pub const BUF_SIZE: usize = 32 * 1024;
/// Number of in-flight USB transfers.
pub const XFER_COUNT: usize = 8;
/// Timeout for one blocking stream call (ms).
pub const STREAM_TIMEOUT_MS: u32 = 20_000;

/// Per-channel samples pulled by each blocking capture call.
pub const CAPTURE_SAMPS: usize = BUF_COUNT * BUF_SIZE / 8;
/// Per-call batch size: the request used to flush stale in-flight samples
/// before a fresh capture.
pub const FLUSH_SAMPS: usize = BUF_COUNT * BUF_SIZE / 4;

/// Manual RX gain applied to both receive channels at startup (dB).
pub const DEFAULT_RX_GAIN: i32 = 60;
