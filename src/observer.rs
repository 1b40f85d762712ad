//! Fire-and-forget event sink (`spec.md` §5 "Shared resources", §7).
//!
//! The only thing the core reports outward besides its return value is a
//! non-fatal allocation failure while building an `mdat` buffer. A clean
//! rewrite passes this in as a single callback rather than a global event
//! emitter (`spec.md` §9 "Event bus coupling").

/// A non-fatal `mdat` allocation failure.
#[derive(Debug, Clone)]
pub struct AllocErrorEvent {
    /// Requested buffer size, in bytes.
    pub bytes: usize,
    /// Human-readable reason (OOM, size overflow, ...).
    pub reason: String,
    /// Which track the failed allocation belonged to.
    pub track: &'static str,
}

/// Outbound event sink for the remuxer core.
pub trait RemuxObserver: Send + Sync {
    fn on_alloc_error(&self, event: &AllocErrorEvent);
}

/// Default observer: logs through `tracing`, same as the teacher's
/// non-fatal `Fmp4Muxer` trailer-write failures.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RemuxObserver for TracingObserver {
    fn on_alloc_error(&self, event: &AllocErrorEvent) {
        tracing::warn!(
            track = event.track,
            bytes = event.bytes,
            reason = %event.reason,
            "REMUX_ALLOC_ERROR"
        );
    }
}

/// Observer that drops every event. Useful for tests that only care about
/// the returned `RemuxOutput`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl RemuxObserver for NullObserver {
    fn on_alloc_error(&self, _event: &AllocErrorEvent) {}
}
