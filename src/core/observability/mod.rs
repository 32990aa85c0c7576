//! Process-wide relaxed counters. Content-free by construction: nothing
//! here sees addresses, principals or key material.

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservabilityLevel {
    OBS_NONE,
    OBS_SAFE,
    OBS_DEV,
}

/// Outcome classes a request can end in, one per error layer.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    FRAME,
    AUTH,
    AUTHORIZATION,
    CODEC,
    EXECUTION,
    SEAL,
    UNKNOWN_OP,
}

impl ErrorClass {
    pub const ALL: [ErrorClass; ERROR_CLASSES] = [
        ErrorClass::FRAME,
        ErrorClass::AUTH,
        ErrorClass::AUTHORIZATION,
        ErrorClass::CODEC,
        ErrorClass::EXECUTION,
        ErrorClass::SEAL,
        ErrorClass::UNKNOWN_OP,
    ];
}

#[cfg(feature = "obs_none")]
pub const OBS_LEVEL: ObservabilityLevel = ObservabilityLevel::OBS_NONE;

#[cfg(feature = "obs_dev")]
pub const OBS_LEVEL: ObservabilityLevel = ObservabilityLevel::OBS_DEV;

#[cfg(all(not(feature = "obs_none"), not(feature = "obs_dev")))]
pub const OBS_LEVEL: ObservabilityLevel = ObservabilityLevel::OBS_SAFE;

pub const OBS_NONE: bool = matches!(OBS_LEVEL, ObservabilityLevel::OBS_NONE);
/// Byte-size histograms are only kept at the dev level.
pub const OBS_DEV: bool = matches!(OBS_LEVEL, ObservabilityLevel::OBS_DEV);

use std::sync::atomic::{AtomicU64, Ordering};

const ERROR_CLASSES: usize = 7;
static ERROR_CLASS_COUNT: [AtomicU64; ERROR_CLASSES] = [const { AtomicU64::new(0) }; ERROR_CLASSES];
static REQUESTS_SUCCEEDED: AtomicU64 = AtomicU64::new(0);

static TOTAL_CONNECTIONS_OPENED: AtomicU64 = AtomicU64::new(0);
static TOTAL_CONNECTIONS_CLOSED: AtomicU64 = AtomicU64::new(0);
static CONNECTIONS_REJECTED: AtomicU64 = AtomicU64::new(0);
static FRAMES_SENT: AtomicU64 = AtomicU64::new(0);
static FRAMES_RECEIVED: AtomicU64 = AtomicU64::new(0);

const BYTE_BUCKETS: usize = 17;
static BYTES_SENT_COARSE: [AtomicU64; BYTE_BUCKETS] = [const { AtomicU64::new(0) }; BYTE_BUCKETS];
static BYTES_RECEIVED_COARSE: [AtomicU64; BYTE_BUCKETS] = [const { AtomicU64::new(0) }; BYTE_BUCKETS];

#[inline]
fn bump(counter: &AtomicU64) {
    if !OBS_NONE {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[inline]
fn bump_dev(counter: &AtomicU64) {
    if OBS_DEV {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[inline]
pub fn record_error(class: ErrorClass) {
    bump(&ERROR_CLASS_COUNT[class as usize]);
}

#[inline]
pub fn record_success() {
    bump(&REQUESTS_SUCCEEDED);
}

#[inline]
pub fn record_connection_opened() {
    bump(&TOTAL_CONNECTIONS_OPENED);
}

#[inline]
pub fn record_connection_closed() {
    bump(&TOTAL_CONNECTIONS_CLOSED);
}

/// A connection dropped at the acceptor for not speaking the protocol.
#[inline]
pub fn record_connection_rejected() {
    bump(&CONNECTIONS_REJECTED);
}

#[inline]
pub fn record_frame_sent(byte_len: usize) {
    bump(&FRAMES_SENT);
    bump_dev(&BYTES_SENT_COARSE[coarse_bucket_index(byte_len)]);
}

#[inline]
pub fn record_frame_received(byte_len: usize) {
    bump(&FRAMES_RECEIVED);
    bump_dev(&BYTES_RECEIVED_COARSE[coarse_bucket_index(byte_len)]);
}

/// log2 bucket; frames never exceed 64 KiB so the last bucket is 2^16.
#[inline]
const fn coarse_bucket_index(byte_len: usize) -> usize {
    if byte_len == 0 {
        return 0;
    }
    let mut v = byte_len;
    let mut idx: usize = 0;
    while v > 1 && idx + 1 < BYTE_BUCKETS {
        v >>= 1;
        idx += 1;
    }
    idx
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilitySnapshot {
    pub total_connections_opened: u64,
    pub total_connections_closed: u64,
    pub connections_rejected: u64,
    pub frames_sent: u64,
    pub frames_received: u64,
    pub bytes_sent_coarse: [u64; BYTE_BUCKETS],
    pub bytes_received_coarse: [u64; BYTE_BUCKETS],
    pub requests_succeeded: u64,
    pub errors_by_class: [u64; ERROR_CLASSES],
}

impl ObservabilitySnapshot {
    pub fn errors(&self, class: ErrorClass) -> u64 {
        self.errors_by_class[class as usize]
    }
}

fn load_all<const N: usize>(counters: &[AtomicU64; N]) -> [u64; N] {
    std::array::from_fn(|i| counters[i].load(Ordering::Relaxed))
}

pub fn snapshot() -> ObservabilitySnapshot {
    ObservabilitySnapshot {
        total_connections_opened: TOTAL_CONNECTIONS_OPENED.load(Ordering::Relaxed),
        total_connections_closed: TOTAL_CONNECTIONS_CLOSED.load(Ordering::Relaxed),
        connections_rejected: CONNECTIONS_REJECTED.load(Ordering::Relaxed),
        frames_sent: FRAMES_SENT.load(Ordering::Relaxed),
        frames_received: FRAMES_RECEIVED.load(Ordering::Relaxed),
        bytes_sent_coarse: load_all(&BYTES_SENT_COARSE),
        bytes_received_coarse: load_all(&BYTES_RECEIVED_COARSE),
        requests_succeeded: REQUESTS_SUCCEEDED.load(Ordering::Relaxed),
        errors_by_class: load_all(&ERROR_CLASS_COUNT),
    }
}
