//! Wind speed from the anemometer pulse train.
//!
//! Once per analysis period the analyzer drains the captured timestamps,
//! walks consecutive pairs, rejects bounce and turns what is left into an
//! average speed over the measured period and a peak speed from the
//! shortest plausible interval.
//!
//! Only pairs inside one drained window are evaluated. The first edge of a
//! cycle has no predecessor (the previous cycle's last edge is gone with
//! the drain), so N edges give at most N - 1 ticks.
use log::{debug, warn};

use crate::capture::{PulseEvent, PulseWindow, WindowDrain};
use crate::config::{WindConfig, MIN_ELAPSED_MS, MIN_INTERVAL_SENTINEL_MS};

/// Result of one analysis cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindReading {
    /// Average speed over the cycle.
    pub speed: f64,
    /// Speed implied by the shortest accepted interval.
    pub peak_speed: f64,
    /// Accepted pulses.
    pub ticks: u32,
    /// Edges seen in the drained window, bounces included.
    pub edges: usize,
    /// Measured cycle duration after clamping.
    pub elapsed_ms: u64,
    /// Edges lost to window overflow.
    pub dropped: u32,
}

/// Values carried from one cycle into the next.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorState {
    pub tick_count: u32,
    pub min_interval_ms: f64,
    pub last_accepted_delta_ms: f64,
    pub cycle_speed: f64,
    pub cycle_peak_speed: f64,
    pub last_cycle_end_ms: u64,
}

impl EstimatorState {
    pub fn new(config: &WindConfig, now_ms: u64) -> Self {
        EstimatorState {
            tick_count: 0,
            min_interval_ms: MIN_INTERVAL_SENTINEL_MS,
            last_accepted_delta_ms: config.debounce_threshold_ms as f64,
            cycle_speed: 0.0,
            cycle_peak_speed: 0.0,
            last_cycle_end_ms: now_ms,
        }
    }

    /// Runs one cycle over an already drained window and resets for the
    /// next one. All fields are committed together at the end.
    pub fn apply<I>(&mut self, config: &WindConfig, window: I, now_ms: u64) -> WindReading
    where
        I: IntoIterator<Item = PulseEvent>,
    {
        let (elapsed_ms, clamped) = match now_ms.checked_sub(self.last_cycle_end_ms) {
            Some(ms) if ms >= MIN_ELAPSED_MS => (ms, false),
            _ => {
                warn!(
                    "wind: degenerate cycle ({} -> {} ms), clamping",
                    self.last_cycle_end_ms, now_ms
                );
                (MIN_ELAPSED_MS, true)
            }
        };
        let elapsed_s = elapsed_ms as f64 / 1000.0;

        let mut ticks = self.tick_count;
        let mut min_interval = self.min_interval_ms;
        let mut last_accepted = self.last_accepted_delta_ms;
        let mut edges = 0usize;
        let mut previous: Option<PulseEvent> = None;

        for at in window {
            edges += 1;
            if let Some(before) = previous {
                // Out of order counts as zero, i.e. bounce.
                let delta = at.saturating_sub(before);
                if delta > config.debounce_threshold_ms {
                    ticks += 1;
                    let delta = delta as f64;
                    if delta < min_interval && delta > last_accepted / config.hysteresis_divisor {
                        min_interval = delta;
                    }
                    last_accepted = delta;
                }
            }
            previous = Some(at);
        }

        let speed = ticks as f64 * (config.speed_factor / elapsed_s);
        let peak_speed = 1000.0 / min_interval * config.speed_factor;

        self.tick_count = 0;
        self.min_interval_ms = if clamped {
            MIN_INTERVAL_SENTINEL_MS
        } else {
            elapsed_ms as f64
        };
        self.last_accepted_delta_ms = config.debounce_threshold_ms as f64;
        self.cycle_speed = speed;
        self.cycle_peak_speed = peak_speed;
        self.last_cycle_end_ms = now_ms;

        debug!(
            "wind: {} edges, {} ticks in {} ms, speed {}, peak {}",
            edges, ticks, elapsed_ms, speed, peak_speed
        );

        WindReading {
            speed,
            peak_speed,
            ticks,
            edges,
            elapsed_ms,
            dropped: 0,
        }
    }
}

/// Periodic consumer of the pulse window.
pub struct WindAnalyzer<'a> {
    config: WindConfig,
    state: EstimatorState,
    drain: WindowDrain<'a>,
    window: &'a mut PulseWindow,
}

impl<'a> WindAnalyzer<'a> {
    /// `window` is scratch space the drained edges are swapped into; it
    /// should live in static memory on target.
    pub fn new(
        config: WindConfig,
        drain: WindowDrain<'a>,
        window: &'a mut PulseWindow,
        now_ms: u64,
    ) -> Self {
        WindAnalyzer {
            state: EstimatorState::new(&config, now_ms),
            config,
            drain,
            window,
        }
    }

    pub fn run_cycle(&mut self, now_ms: u64) -> WindReading {
        let dropped = self.drain.take_into(self.window);
        if dropped > 0 {
            warn!("wind: pulse window overflowed, {} oldest edges dropped", dropped);
        }
        let mut reading = self
            .state
            .apply(&self.config, self.window.iter().copied(), now_ms);
        reading.dropped = dropped;
        reading
    }

    pub fn state(&self) -> &EstimatorState {
        &self.state
    }

    pub fn config(&self) -> &WindConfig {
        &self.config
    }
}
