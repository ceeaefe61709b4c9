//! Device clock with deferred wall-time sync.
//!
//! The wearable has no RTC battery; it boots knowing only monotonic time
//! and learns the wall clock when a host connects. Chunks opened before
//! that carry monotonic timestamps and are marked unsynced so they can be
//! retimestamped once real time arrives.

use std::sync::Mutex;
use std::time::Instant;

/// Trait for time operations, allowing mock time in tests.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Real system clock using `std::time::Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A chunk timestamp in seconds, tagged with whether it is wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub secs: u32,
    pub synced: bool,
}

#[derive(Debug, Clone, Copy)]
struct EpochAnchor {
    epoch: u32,
    at: Instant,
}

/// Clock state shared between the recorder and the connection handler.
pub struct DeviceClock<C: Clock = SystemClock> {
    clock: C,
    origin: Instant,
    anchor: Mutex<Option<EpochAnchor>>,
}

impl<C: Clock> DeviceClock<C> {
    /// Creates a device clock over the given time source.
    pub fn with_clock(clock: C) -> Self {
        let origin = clock.now();
        Self {
            clock,
            origin,
            anchor: Mutex::new(None),
        }
    }

    fn anchor(&self) -> Option<EpochAnchor> {
        match self.anchor.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Current timestamp: wall-clock seconds once synced, otherwise
    /// monotonic seconds since clock creation.
    pub fn now(&self) -> Timestamp {
        let now = self.clock.now();
        match self.anchor() {
            Some(a) => Timestamp {
                secs: a.epoch.saturating_add(now.duration_since(a.at).as_secs() as u32),
                synced: true,
            },
            None => Timestamp {
                secs: now.duration_since(self.origin).as_secs() as u32,
                synced: false,
            },
        }
    }

    /// Anchors the wall clock; called when the host writes its epoch time.
    /// Re-anchoring is allowed and simply replaces the reference point.
    pub fn sync(&self, epoch_secs: u32) {
        let at = self.clock.now();
        match self.anchor.lock() {
            Ok(mut guard) => *guard = Some(EpochAnchor { epoch: epoch_secs, at }),
            Err(poisoned) => *poisoned.into_inner() = Some(EpochAnchor { epoch: epoch_secs, at }),
        }
        tracing::info!(epoch = epoch_secs, "device clock synced");
    }

    pub fn is_synced(&self) -> bool {
        self.anchor().is_some()
    }

    /// Converts a monotonic timestamp recorded before sync into wall time:
    /// `corrected = wall_now - (mono_now - mono_at_open)`.
    ///
    /// Returns None until the clock is synced, or if the monotonic
    /// timestamp lies in the future (which would mean it came from a
    /// different boot and cannot be corrected).
    pub fn correct_unsynced(&self, mono_secs: u32) -> Option<u32> {
        self.anchor()?;
        let now = self.clock.now();
        let mono_now = now.duration_since(self.origin).as_secs() as u32;
        let elapsed = mono_now.checked_sub(mono_secs)?;
        Some(self.now().secs.saturating_sub(elapsed))
    }
}

impl DeviceClock<SystemClock> {
    /// Creates a device clock using the system monotonic clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for DeviceClock<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}
