//! Edge capture and the pulse window shared with the analyzer.
//!
//! The window is the only state crossing from the edge handler into the
//! analysis task. Every access happens inside one critical section, so an
//! append is either fully before a [`WindowDrain::take_into`] or fully after it.
//!
//! Overflow policy: when the window is full the oldest timestamp is
//! dropped and counted. At the modeled wind speeds this never happens.
use core::cell::RefCell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use heapless::Deque;

use crate::config::PULSE_WINDOW_CAPACITY;

/// Monotonic millisecond timestamp of one falling edge.
pub type PulseEvent = u64;

/// Edges captured since the last drain, in arrival order.
pub type PulseWindow = Deque<PulseEvent, PULSE_WINDOW_CAPACITY>;

struct Shared {
    window: PulseWindow,
    enabled: bool,
    dropped: u32,
}

/// Owner of the pulse window. Lives for the whole program and is split
/// once into the two handles.
pub struct PulseChannel {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Shared>>,
}

impl PulseChannel {
    pub const fn new() -> Self {
        PulseChannel {
            inner: Mutex::new(RefCell::new(Shared {
                window: Deque::new(),
                enabled: false,
                dropped: 0,
            })),
        }
    }

    pub fn split(&self) -> (EdgeCapture<'_>, WindowDrain<'_>) {
        (EdgeCapture { channel: self }, WindowDrain { channel: self })
    }

    fn with<R>(&self, f: impl FnOnce(&mut Shared) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }
}

impl Default for PulseChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Append-only handle given to the edge handler.
#[derive(Clone, Copy)]
pub struct EdgeCapture<'a> {
    channel: &'a PulseChannel,
}

impl EdgeCapture<'_> {
    /// Records one falling edge. Bounded time, no allocation, no filtering.
    /// Returns `false` when capture is disabled and the edge was ignored.
    pub fn on_edge(&self, now_ms: PulseEvent) -> bool {
        self.channel.with(|shared| {
            if !shared.enabled {
                return false;
            }
            if shared.window.is_full() {
                shared.window.pop_front();
                shared.dropped = shared.dropped.saturating_add(1);
            }
            shared.window.push_back(now_ms).is_ok()
        })
    }

    pub fn enable(&self) {
        self.channel.with(|shared| shared.enabled = true);
        log::info!("wind capture enabled");
    }

    /// Stops recording. Edges already in the window stay there until the
    /// next drain.
    pub fn disable(&self) {
        self.channel.with(|shared| shared.enabled = false);
        log::info!("wind capture disabled");
    }

    pub fn is_enabled(&self) -> bool {
        self.channel.with(|shared| shared.enabled)
    }
}

/// Read side, owned by the analyzer.
pub struct WindowDrain<'a> {
    channel: &'a PulseChannel,
}

impl WindowDrain<'_> {
    /// Moves the captured edges into `window` and leaves the shared one
    /// empty. Whatever `window` held before is discarded. Returns the number
    /// of oldest events dropped on overflow since the previous drain.
    ///
    /// Only live entries are moved, so the time spent with interrupts masked
    /// grows with the edges captured this cycle (a few dozen in normal wind,
    /// at most the window capacity). The caller keeps `window` around
    /// between cycles, so no full-size buffer is built on the stack.
    pub fn take_into(&mut self, window: &mut PulseWindow) -> u32 {
        window.clear();
        self.channel.with(|shared| {
            while let Some(at) = shared.window.pop_front() {
                // Both sides share one capacity.
                window.push_back(at).ok();
            }
            core::mem::take(&mut shared.dropped)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_capture_ignores_edges() {
        let channel = PulseChannel::new();
        let (capture, mut drain) = channel.split();

        assert!(!capture.on_edge(5));
        capture.enable();
        assert!(capture.on_edge(10));
        capture.disable();
        assert!(!capture.on_edge(20));

        let mut window = PulseWindow::new();
        drain.take_into(&mut window);
        assert_eq!(window.iter().copied().collect::<Vec<_>>(), vec![10]);
    }

    #[test]
    fn take_leaves_window_empty() {
        let channel = PulseChannel::new();
        let (capture, mut drain) = channel.split();
        capture.enable();
        for t in [100, 150, 210] {
            capture.on_edge(t);
        }

        let mut window = PulseWindow::new();
        drain.take_into(&mut window);
        assert_eq!(window.len(), 3);
        drain.take_into(&mut window);
        assert!(window.is_empty());
    }

    #[test]
    fn take_replaces_stale_scratch_contents() {
        let channel = PulseChannel::new();
        let (capture, mut drain) = channel.split();
        capture.enable();

        let mut window = PulseWindow::new();
        for t in [1, 2, 3] {
            window.push_back(t).unwrap();
        }
        capture.on_edge(40);
        capture.on_edge(90);

        assert_eq!(drain.take_into(&mut window), 0);
        assert_eq!(window.iter().copied().collect::<Vec<_>>(), vec![40, 90]);

        capture.on_edge(130);
        drain.take_into(&mut window);
        assert_eq!(window.iter().copied().collect::<Vec<_>>(), vec![130]);
    }

    #[test]
    fn overflow_drops_oldest() {
        let channel = PulseChannel::new();
        let (capture, mut drain) = channel.split();
        capture.enable();
        let extra = 3;
        for t in 0..(PULSE_WINDOW_CAPACITY + extra) as u64 {
            capture.on_edge(t);
        }

        let mut window = PulseWindow::new();
        assert_eq!(drain.take_into(&mut window), extra as u32);
        assert_eq!(window.len(), PULSE_WINDOW_CAPACITY);
        assert_eq!(window.front(), Some(&(extra as u64)));
        assert_eq!(drain.take_into(&mut window), 0);
    }
}
