use std::sync::atomic::{AtomicU64, Ordering};

/// Track framing metrics without external dependencies.
pub(crate) struct Metrics;

static FRAMES_ENCODED: AtomicU64 = AtomicU64::new(0);
static FRAMES_DECODED: AtomicU64 = AtomicU64::new(0);
static BYTES_ENCODED: AtomicU64 = AtomicU64::new(0);
static BYTES_DECODED: AtomicU64 = AtomicU64::new(0);
static COMPRESSED_FRAMES: AtomicU64 = AtomicU64::new(0);
static MALFORMED_COUNT: AtomicU64 = AtomicU64::new(0);
static ENCODING_ERROR_COUNT: AtomicU64 = AtomicU64::new(0);
static LARGEST_FRAME: AtomicU64 = AtomicU64::new(0);

/// Direction of a frame for counting.
#[derive(Clone, Copy)]
pub(crate) enum FrameDirection {
    Encoded,
    Decoded,
}

impl Metrics {
    #[inline]
    pub(crate) fn record_frame(direction: FrameDirection, frame_size: usize, compressed: bool) {
        let size = frame_size as u64;
        match direction {
            FrameDirection::Encoded => {
                FRAMES_ENCODED.fetch_add(1, Ordering::Relaxed);
                BYTES_ENCODED.fetch_add(size, Ordering::Relaxed);
                update_max(&LARGEST_FRAME, size);
            }
            FrameDirection::Decoded => {
                FRAMES_DECODED.fetch_add(1, Ordering::Relaxed);
                BYTES_DECODED.fetch_add(size, Ordering::Relaxed);
            }
        }
        if compressed {
            COMPRESSED_FRAMES.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn record_error(err: &super::Error) {
        if err.is_malformed() {
            MALFORMED_COUNT.fetch_add(1, Ordering::Relaxed);
        } else {
            ENCODING_ERROR_COUNT.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn totals() -> MetricsSnapshot {
        MetricsSnapshot {
            frames_encoded: FRAMES_ENCODED.load(Ordering::Relaxed),
            frames_decoded: FRAMES_DECODED.load(Ordering::Relaxed),
            bytes_encoded: BYTES_ENCODED.load(Ordering::Relaxed),
            bytes_decoded: BYTES_DECODED.load(Ordering::Relaxed),
            compressed_frames: COMPRESSED_FRAMES.load(Ordering::Relaxed),
            malformed_messages: MALFORMED_COUNT.load(Ordering::Relaxed),
            encoding_errors: ENCODING_ERROR_COUNT.load(Ordering::Relaxed),
            largest_frame: LARGEST_FRAME.load(Ordering::Relaxed),
        }
    }
}

fn update_max(target: &AtomicU64, candidate: u64) {
    let mut current = target.load(Ordering::Relaxed);
    while candidate > current {
        match target.compare_exchange_weak(
            current,
            candidate,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return,
            Err(old) => current = old,
        }
    }
}

/// Process-wide framing counters.
pub fn metrics_snapshot() -> MetricsSnapshot {
    Metrics::totals()
}

/// Lightweight snapshot of framing counters.
#[derive(Default, Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    /// Frames built by command encoders
    pub frames_encoded: u64,
    /// Frame bodies decoded successfully
    pub frames_decoded: u64,
    /// Sum of encoded frame sizes (before padding)
    pub bytes_encoded: u64,
    /// Sum of decoded body lengths
    pub bytes_decoded: u64,
    /// Frames that went through snappy in either direction
    pub compressed_frames: u64,
    /// Inbound bodies rejected as malformed
    pub malformed_messages: u64,
    /// Outbound payloads rejected before framing
    pub encoding_errors: u64,
    /// Largest encoded frame size seen
    pub largest_frame: u64,
}

impl MetricsSnapshot {
    /// Average encoded frame size in bytes.
    #[must_use]
    pub fn avg_encoded_frame(&self) -> Option<u64> {
        self.bytes_encoded.checked_div(self.frames_encoded)
    }
}
